//! Graph mutation and task transitions.
//!
//! [`Canvas`] owns the [`GraphStore`] and is the only place it changes.
//! Every operation either completes or returns a [`TransitionError`] with the
//! store untouched.

use std::collections::BTreeMap;

use crate::config::LayoutConfig;
use crate::error::TransitionError;
use crate::ir::{
    Entity, Flowline, FlowlineType, Node, NodeKind, Point, Priority, START_TEXT, Tag, TagCategory,
    Task, TaskDetails,
};
use crate::layout::{EstimatedMeasure, Measure, SlotLayout};
use crate::store::{GraphStore, WorkflowStats};

type Result<T> = std::result::Result<T, TransitionError>;

/// Category for bare tag names that match nothing more specific.
pub const GENERAL_TAG_CATEGORY: &str = "general";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The task already sat under the requested node.
    Unchanged,
    Moved {
        from: String,
        to: String,
        slot: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceCandidate {
    pub target: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Moved(MoveOutcome),
    /// Several outbound flowlines: the caller picks one and calls
    /// [`Canvas::advance_task_to`].
    Choose(Vec<AdvanceCandidate>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeDeletion {
    Deleted { flowlines_removed: usize },
    /// Tasks still sit under the node. Nothing was removed; supply new
    /// anchors through [`Canvas::reassign_and_delete`].
    NeedsReassignment { tasks: Vec<String> },
}

pub struct Canvas<M: Measure = EstimatedMeasure> {
    store: GraphStore,
    config: LayoutConfig,
    measure: M,
    /// Named tags from `/tag-create`, keyed by lowercase name. Not saved
    /// with the document.
    tag_definitions: BTreeMap<String, Tag>,
}

impl Canvas<EstimatedMeasure> {
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        let measure = EstimatedMeasure::from_config(&config);
        Self::with_measure(config, measure)
    }
}

impl Default for Canvas<EstimatedMeasure> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Measure> std::fmt::Debug for Canvas<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<M: Measure> Canvas<M> {
    pub fn with_measure(config: LayoutConfig, measure: M) -> Self {
        Self {
            store: GraphStore::new(),
            config,
            measure,
            tag_definitions: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn measure(&self) -> &M {
        &self.measure
    }

    pub fn measure_mut(&mut self) -> &mut M {
        &mut self.measure
    }

    pub fn layout(&self) -> SlotLayout<'_> {
        SlotLayout::new(&self.config, &self.measure)
    }

    pub(crate) fn parts(&mut self) -> (&mut GraphStore, SlotLayout<'_>) {
        (&mut self.store, SlotLayout::new(&self.config, &self.measure))
    }

    pub fn stats(&self) -> WorkflowStats {
        self.store.stats()
    }

    pub fn set_default_flowline_type(&mut self, kind: FlowlineType) {
        self.store.settings.flowline_type = kind;
    }

    /// Drops everything and starts over from a lone Start node. The default
    /// flowline type survives.
    pub fn clear(&mut self) {
        let settings = self.store.settings;
        self.store = GraphStore::new();
        self.store.settings = settings;
        tracing::info!("workflow cleared");
    }

    /// Registers `tag` under `name`. Returns the definition it replaced.
    pub fn define_tag(&mut self, name: &str, tag: Tag) -> Option<Tag> {
        tracing::debug!(name, category = tag.category.as_str(), "defined tag");
        self.tag_definitions.insert(name.trim().to_ascii_lowercase(), tag)
    }

    pub fn tag_definition(&self, name: &str) -> Option<&Tag> {
        self.tag_definitions.get(&name.trim().to_ascii_lowercase())
    }

    /// Reads a tag token: `category:option`, a name registered with
    /// [`Canvas::define_tag`], or a bare option. Bare urgency and importance
    /// options land in their category, anything else in `general`.
    pub fn tag_from_token(&self, token: &str) -> Tag {
        if let Some(tag) = Tag::from_token(token) {
            return tag;
        }
        if let Some(tag) = self.tag_definition(token) {
            return tag.clone();
        }
        let option = token.trim().to_ascii_lowercase();
        let category = match option.as_str() {
            "urgent" | "not-urgent" => TagCategory::Urgency,
            "important" | "not-important" => TagCategory::Importance,
            _ => TagCategory::from(GENERAL_TAG_CATEGORY),
        };
        Tag::new(category, option)
    }

    fn require_node(&self, id: &str) -> Result<&Node> {
        match self.store.entity(id) {
            Some(Entity::Node(node)) => Ok(node),
            Some(Entity::Task(_)) => Err(TransitionError::NotANode(id.to_string())),
            None => Err(TransitionError::NodeNotFound(id.to_string())),
        }
    }

    /// The Start node is the only terminal named Start.
    fn ensure_not_second_start(&self, kind: NodeKind, text: &str) -> Result<()> {
        if kind == NodeKind::Terminal && text == START_TEXT {
            return Err(TransitionError::DuplicateStart(
                self.store.start_id().to_string(),
            ));
        }
        Ok(())
    }

    fn require_task(&self, id: &str) -> Result<&Task> {
        self.store
            .task(id)
            .ok_or_else(|| TransitionError::TaskNotFound(id.to_string()))
    }

    pub fn create_node(&mut self, kind: NodeKind, text: &str, position: Point) -> Result<String> {
        self.ensure_not_second_start(kind, text)?;
        let id = self.store.next_id();
        self.store.insert(Entity::Node(Node {
            id: id.clone(),
            kind,
            text: text.to_string(),
            position,
        }));
        tracing::debug!(node = %id, kind = kind.as_str(), "created node");
        Ok(id)
    }

    /// Creates a task under `anchor`, or under Start when `anchor` is `None`.
    pub fn create_task(&mut self, text: &str, anchor: Option<&str>) -> Result<String> {
        let anchor = match anchor {
            Some(anchor) => self.require_node(anchor)?.id.clone(),
            None => self.store.start_id().to_string(),
        };
        let id = self.store.next_id();
        self.store.insert(Entity::Task(Task::new(id.clone(), text, anchor.clone())));
        let (store, layout) = self.parts();
        layout.assign_slot(store, &id);
        layout.position_in_slot(store, &id);
        tracing::debug!(task = %id, anchor = %anchor, "created task");
        Ok(id)
    }

    pub fn rename(&mut self, id: &str, text: &str) -> Result<()> {
        if id == self.store.start_id() {
            return Err(TransitionError::StartNodeProtected);
        }
        if let Some(Entity::Node(node)) = self.store.entity(id) {
            self.ensure_not_second_start(node.kind, text)?;
        }
        match self.store.entity_mut(id) {
            Some(Entity::Node(node)) => node.text = text.to_string(),
            Some(Entity::Task(task)) => {
                task.text = text.to_string();
                let (store, layout) = self.parts();
                layout.reposition_after_height_change(store, id);
            }
            None => return Err(TransitionError::ElementNotFound(id.to_string())),
        }
        Ok(())
    }

    pub fn set_node_kind(&mut self, id: &str, kind: NodeKind) -> Result<()> {
        let text = self.require_node(id)?.text.clone();
        if id == self.store.start_id() {
            return Err(TransitionError::StartNodeProtected);
        }
        self.ensure_not_second_start(kind, &text)?;
        if let Some(node) = self.store.node_mut(id) {
            node.kind = kind;
        }
        Ok(())
    }

    /// Moves a node and every task stacked under it.
    pub fn move_node(&mut self, id: &str, position: Point) -> Result<()> {
        self.require_node(id)?;
        if let Some(node) = self.store.node_mut(id) {
            node.position = position;
        }
        let (store, layout) = self.parts();
        layout.reposition_anchor(store, id);
        Ok(())
    }

    pub fn delete_node(&mut self, id: &str) -> Result<NodeDeletion> {
        self.require_node(id)?;
        if id == self.store.start_id() {
            return Err(TransitionError::StartNodeProtected);
        }
        let tasks = self.store.task_ids_anchored_to(id);
        if !tasks.is_empty() {
            tracing::debug!(node = id, tasks = tasks.len(), "node deletion needs reassignment");
            return Ok(NodeDeletion::NeedsReassignment { tasks });
        }
        let flowlines_removed = self.store.remove_flowlines_touching(id);
        self.store.remove(id);
        tracing::debug!(node = id, flowlines_removed, "deleted node");
        Ok(NodeDeletion::Deleted { flowlines_removed })
    }

    /// Moves every task under `id` to the node named in `assignments`, then
    /// deletes `id`. The whole mapping is checked before anything moves.
    pub fn reassign_and_delete(
        &mut self,
        id: &str,
        assignments: &BTreeMap<String, String>,
    ) -> Result<usize> {
        self.require_node(id)?;
        if id == self.store.start_id() {
            return Err(TransitionError::StartNodeProtected);
        }
        let tasks = self.store.task_ids_anchored_to(id);
        for task in &tasks {
            let target = assignments
                .get(task)
                .ok_or_else(|| TransitionError::MissingReassignment {
                    task: task.clone(),
                    node: id.to_string(),
                })?;
            if target == id {
                return Err(TransitionError::ReassignedToDeletedNode {
                    task: task.clone(),
                    target: target.clone(),
                });
            }
            self.require_node(target)?;
        }
        for task in &tasks {
            self.move_task(task, &assignments[task])?;
        }
        match self.delete_node(id)? {
            NodeDeletion::Deleted { flowlines_removed } => Ok(flowlines_removed),
            NodeDeletion::NeedsReassignment { tasks } => Err(TransitionError::MissingReassignment {
                task: tasks.join(", "),
                node: id.to_string(),
            }),
        }
    }

    pub fn delete_task(&mut self, id: &str) -> Result<Task> {
        self.require_task(id)?;
        let Some(Entity::Task(task)) = self.store.remove(id) else {
            return Err(TransitionError::TaskNotFound(id.to_string()));
        };
        let (store, layout) = self.parts();
        layout.compact_slots(store, &task.anchored_to);
        tracing::debug!(task = id, anchor = %task.anchored_to, "deleted task");
        Ok(task)
    }

    /// Re-anchors a task. Moving a task to the node it already sits under
    /// changes nothing.
    pub fn move_task(&mut self, task_id: &str, target: &str) -> Result<MoveOutcome> {
        let from = self.require_task(task_id)?.anchored_to.clone();
        if from == target {
            return Ok(MoveOutcome::Unchanged);
        }
        self.require_node(target)?;

        let (store, layout) = self.parts();
        let slot = SlotLayout::first_free_slot(store, target, Some(task_id));
        if let Some(task) = store.task_mut(task_id) {
            task.previous_anchor = Some(from.clone());
            task.anchored_to = target.to_string();
            task.slot = slot;
        }
        layout.position_in_slot(store, task_id);
        layout.compact_slots(store, &from);
        tracing::debug!(task = task_id, from = %from, to = target, slot, "moved task");
        Ok(MoveOutcome::Moved {
            from,
            to: target.to_string(),
            slot,
        })
    }

    /// Live targets of the flowlines leaving the task's anchor, in flowline
    /// order and without duplicates.
    pub fn advance_candidates(&self, task_id: &str) -> Result<Vec<AdvanceCandidate>> {
        let anchor = &self.require_task(task_id)?.anchored_to;
        let mut candidates: Vec<AdvanceCandidate> = Vec::new();
        for line in self.store.outbound(anchor) {
            if candidates.iter().any(|c| c.target == line.target) {
                continue;
            }
            let Some(node) = self.store.node(&line.target) else {
                tracing::warn!(source = %line.source, target = %line.target, "flowline points at a missing node");
                continue;
            };
            let label = if node.text.trim().is_empty() {
                fallback_text(node.kind.as_str(), &node.id)
            } else {
                node.text.clone()
            };
            candidates.push(AdvanceCandidate {
                target: node.id.clone(),
                label,
            });
        }
        Ok(candidates)
    }

    pub fn advance_task(&mut self, task_id: &str) -> Result<Advance> {
        let mut candidates = self.advance_candidates(task_id)?;
        match candidates.len() {
            0 => {
                let anchor = self.require_task(task_id)?.anchored_to.clone();
                Err(TransitionError::NoOutboundFlowline(anchor))
            }
            1 => {
                let target = candidates.remove(0).target;
                self.move_task(task_id, &target).map(Advance::Moved)
            }
            _ => Ok(Advance::Choose(candidates)),
        }
    }

    /// Completes an advance that offered several targets.
    pub fn advance_task_to(&mut self, task_id: &str, target: &str) -> Result<MoveOutcome> {
        let candidates = self.advance_candidates(task_id)?;
        if !candidates.iter().any(|c| c.target == target) {
            let anchor = self.require_task(task_id)?.anchored_to.clone();
            if candidates.is_empty() {
                return Err(TransitionError::NoOutboundFlowline(anchor));
            }
            return Err(TransitionError::NotAnAdvanceTarget {
                anchor,
                target: target.to_string(),
            });
        }
        self.move_task(task_id, target)
    }

    /// Sends a task back to the node it left last. One level only: the
    /// previous anchor is cleared, so a second reverse fails.
    pub fn reverse_task(&mut self, task_id: &str) -> Result<MoveOutcome> {
        let Some(previous) = self.require_task(task_id)?.previous_anchor.clone() else {
            return Err(TransitionError::NoPreviousAnchor(task_id.to_string()));
        };
        if self.store.node(&previous).is_none() {
            return Err(TransitionError::PreviousAnchorMissing {
                task: task_id.to_string(),
                anchor: previous,
            });
        }
        let outcome = self.move_task(task_id, &previous)?;
        if let Some(task) = self.store.task_mut(task_id) {
            task.previous_anchor = None;
        }
        Ok(outcome)
    }

    /// Adds or replaces the tag of `tag.category`. Returns the replaced tag.
    pub fn add_tag(&mut self, task_id: &str, tag: Tag) -> Result<Option<Tag>> {
        self.require_task(task_id)?;
        let replaced = self
            .store
            .task_mut(task_id)
            .and_then(|task| task.set_tag(tag));
        let (store, layout) = self.parts();
        layout.reposition_after_height_change(store, task_id);
        Ok(replaced)
    }

    pub fn remove_tag(&mut self, task_id: &str, category: &TagCategory) -> Result<Option<Tag>> {
        self.require_task(task_id)?;
        let removed = self
            .store
            .task_mut(task_id)
            .and_then(|task| task.remove_tag(category));
        if removed.is_some() {
            let (store, layout) = self.parts();
            layout.reposition_after_height_change(store, task_id);
        }
        Ok(removed)
    }

    pub fn update_details(
        &mut self,
        task_id: &str,
        update: impl FnOnce(&mut TaskDetails),
    ) -> Result<()> {
        self.require_task(task_id)?;
        if let Some(task) = self.store.task_mut(task_id) {
            update(&mut task.details);
            task.details.last_modified = Some(chrono::Utc::now().to_rfc3339());
        }
        Ok(())
    }

    pub fn set_priority(&mut self, task_id: &str, priority: Priority) -> Result<()> {
        self.update_details(task_id, |details| {
            details.priority = Some(priority.as_str().to_string());
        })
    }

    /// A renderer reports that a task's card changed height.
    pub fn notify_resized(&mut self, task_id: &str) {
        let (store, layout) = self.parts();
        layout.reposition_after_height_change(store, task_id);
    }

    /// Adds a flowline. Returns false when the same connection exists already.
    pub fn connect(
        &mut self,
        source: &str,
        target: &str,
        kind: Option<FlowlineType>,
    ) -> Result<bool> {
        self.require_node(source)?;
        self.require_node(target)?;
        if source == target {
            return Err(TransitionError::SelfLoop(source.to_string()));
        }
        if self.store.find_flowline(source, target).is_some() {
            return Ok(false);
        }
        let kind = kind.unwrap_or(self.store.settings.flowline_type);
        self.store
            .flowlines_mut()
            .push(Flowline::new(source, target, kind));
        tracing::debug!(source, target, kind = kind.as_str(), "connected nodes");
        Ok(true)
    }

    pub fn disconnect(&mut self, source: &str, target: &str) -> Result<bool> {
        self.require_node(source)?;
        self.require_node(target)?;
        match self.store.find_flowline(source, target) {
            Some(idx) => {
                self.store.flowlines_mut().remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn set_flowline_kind(&mut self, source: &str, target: &str, kind: FlowlineType) -> Result<bool> {
        self.require_node(source)?;
        self.require_node(target)?;
        match self.store.find_flowline(source, target) {
            Some(idx) => {
                self.store.flowlines_mut()[idx].kind = kind;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn disconnect_all(&mut self) -> usize {
        let removed = self.store.flowlines().len();
        self.store.flowlines_mut().clear();
        removed
    }
}

/// `"{Type} {id}"`, the label used when an entity has no text.
pub(crate) fn fallback_text(type_name: &str, id: &str) -> String {
    let mut chars = type_name.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("{capitalized} {id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas_with_chain() -> (Canvas, String, String) {
        let mut canvas = Canvas::new();
        let review = canvas.create_node(NodeKind::Process, "Review", Point::new(400.0, 100.0)).unwrap();
        let done = canvas.create_node(NodeKind::Terminal, "Done", Point::new(700.0, 100.0)).unwrap();
        canvas.connect("1", &review, None).unwrap();
        canvas.connect(&review, &done, None).unwrap();
        (canvas, review, done)
    }

    #[test]
    fn created_tasks_default_to_start() {
        let mut canvas = Canvas::new();
        let id = canvas.create_task("Draft", None).unwrap();
        let task = canvas.store().task(&id).unwrap();
        assert_eq!(task.anchored_to, "1");
        assert_eq!(task.slot, 0);
        assert_eq!(task.position, Point::new(100.0, 180.0));
    }

    #[test]
    fn tasks_cannot_anchor_to_tasks() {
        let mut canvas = Canvas::new();
        let id = canvas.create_task("Draft", None).unwrap();
        assert_eq!(
            canvas.create_task("Nested", Some(&id)),
            Err(TransitionError::NotANode(id))
        );
    }

    #[test]
    fn single_outbound_flowline_advances_directly() {
        let (mut canvas, review, _) = canvas_with_chain();
        let task = canvas.create_task("Draft", None).unwrap();
        let outcome = canvas.advance_task(&task).unwrap();
        assert_eq!(
            outcome,
            Advance::Moved(MoveOutcome::Moved {
                from: "1".to_string(),
                to: review.clone(),
                slot: 0
            })
        );
        let moved = canvas.store().task(&task).unwrap();
        assert_eq!(moved.previous_anchor.as_deref(), Some("1"));
        assert_eq!(moved.position, Point::new(400.0, 180.0));
    }

    #[test]
    fn advance_without_flowlines_is_refused() {
        let mut canvas = Canvas::new();
        let task = canvas.create_task("Draft", None).unwrap();
        let before = canvas.store().clone();
        assert_eq!(
            canvas.advance_task(&task),
            Err(TransitionError::NoOutboundFlowline("1".to_string()))
        );
        assert_eq!(canvas.store(), &before);
    }

    #[test]
    fn reverse_is_a_single_level_undo() {
        let (mut canvas, review, done) = canvas_with_chain();
        let task = canvas.create_task("Draft", None).unwrap();
        canvas.move_task(&task, &review).unwrap();
        canvas.move_task(&task, &done).unwrap();

        canvas.reverse_task(&task).unwrap();
        let back = canvas.store().task(&task).unwrap();
        assert_eq!(back.anchored_to, review);
        assert_eq!(back.previous_anchor, None);
        assert_eq!(
            canvas.reverse_task(&task),
            Err(TransitionError::NoPreviousAnchor(task.clone()))
        );
    }

    #[test]
    fn reverse_to_deleted_anchor_is_refused() {
        let (mut canvas, review, done) = canvas_with_chain();
        let task = canvas.create_task("Draft", Some(&review)).unwrap();
        canvas.move_task(&task, &done).unwrap();
        assert_eq!(
            canvas.delete_node(&review).unwrap(),
            NodeDeletion::Deleted {
                flowlines_removed: 2
            }
        );
        assert_eq!(
            canvas.reverse_task(&task),
            Err(TransitionError::PreviousAnchorMissing {
                task: task.clone(),
                anchor: review
            })
        );
    }

    #[test]
    fn deleting_a_node_with_tasks_waits_for_reassignment() {
        let (mut canvas, review, done) = canvas_with_chain();
        let a = canvas.create_task("A", Some(&review)).unwrap();
        let b = canvas.create_task("B", Some(&review)).unwrap();

        assert_eq!(
            canvas.delete_node(&review).unwrap(),
            NodeDeletion::NeedsReassignment {
                tasks: vec![a.clone(), b.clone()]
            }
        );
        assert!(canvas.store().node(&review).is_some());

        let mut partial = BTreeMap::new();
        partial.insert(a.clone(), done.clone());
        let before = canvas.store().clone();
        assert!(matches!(
            canvas.reassign_and_delete(&review, &partial),
            Err(TransitionError::MissingReassignment { .. })
        ));
        assert_eq!(canvas.store(), &before);

        partial.insert(b.clone(), "1".to_string());
        assert_eq!(canvas.reassign_and_delete(&review, &partial), Ok(2));
        assert!(canvas.store().node(&review).is_none());
        assert_eq!(canvas.store().task(&a).unwrap().anchored_to, done);
        assert_eq!(canvas.store().task(&b).unwrap().anchored_to, "1");
        assert!(canvas.store().flowlines().is_empty());
    }

    #[test]
    fn start_node_is_protected() {
        let mut canvas = Canvas::new();
        assert_eq!(canvas.delete_node("1"), Err(TransitionError::StartNodeProtected));
        assert_eq!(canvas.rename("1", "Begin"), Err(TransitionError::StartNodeProtected));
    }

    #[test]
    fn only_one_terminal_may_be_named_start() {
        let (mut canvas, review, done) = canvas_with_chain();
        let duplicate = Err(TransitionError::DuplicateStart("1".to_string()));
        assert_eq!(
            canvas.create_node(NodeKind::Terminal, START_TEXT, Point::new(900.0, 100.0)),
            duplicate
        );
        assert_eq!(canvas.rename(&done, START_TEXT), Err(TransitionError::DuplicateStart("1".to_string())));

        canvas.rename(&review, START_TEXT).unwrap();
        let before = canvas.store().clone();
        assert_eq!(
            canvas.set_node_kind(&review, NodeKind::Terminal),
            Err(TransitionError::DuplicateStart("1".to_string()))
        );
        assert_eq!(canvas.store(), &before);
        assert_eq!(canvas.store().nodes().filter(|node| node.is_start()).count(), 1);

        canvas
            .create_node(NodeKind::Process, START_TEXT, Point::new(900.0, 100.0))
            .unwrap();
    }

    #[test]
    fn renaming_a_missing_element_names_no_kind() {
        let mut canvas = Canvas::new();
        assert_eq!(
            canvas.rename("999", "Ghost"),
            Err(TransitionError::ElementNotFound("999".to_string()))
        );
    }

    #[test]
    fn moving_a_node_carries_its_tasks() {
        let mut canvas = Canvas::new();
        let task = canvas.create_task("Draft", None).unwrap();
        canvas.move_node("1", Point::new(250.0, 40.0)).unwrap();
        assert_eq!(canvas.store().task(&task).unwrap().position, Point::new(250.0, 120.0));
    }

    #[test]
    fn duplicate_and_self_flowlines() {
        let (mut canvas, review, _) = canvas_with_chain();
        assert_eq!(canvas.connect("1", &review, None), Ok(false));
        assert_eq!(
            canvas.connect(&review, &review, None),
            Err(TransitionError::SelfLoop(review.clone()))
        );
        assert_eq!(
            canvas.set_flowline_kind("1", &review, FlowlineType::Perpendicular),
            Ok(true)
        );
        assert_eq!(canvas.store().flowlines()[0].kind, FlowlineType::Perpendicular);
        assert_eq!(canvas.disconnect_all(), 2);
    }

    #[test]
    fn tag_tokens_resolve_through_definitions() {
        let mut canvas = Canvas::new();
        assert_eq!(canvas.tag_from_token("urgent"), Tag::new(TagCategory::Urgency, "urgent"));
        assert_eq!(canvas.tag_from_token("phase:beta"), Tag::new("phase", "beta"));
        assert_eq!(canvas.tag_from_token("Blocked"), Tag::new(GENERAL_TAG_CATEGORY, "blocked"));

        canvas.define_tag("blocked", Tag::new("status", "blocked"));
        assert_eq!(canvas.tag_from_token("BLOCKED").category, TagCategory::from("status"));
    }

    #[test]
    fn fallback_text_capitalizes_type() {
        assert_eq!(fallback_text("process", "7"), "Process 7");
        assert_eq!(fallback_text("task", "node_3"), "Task node_3");
    }
}
