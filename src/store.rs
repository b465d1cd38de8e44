use std::collections::BTreeMap;

use serde::Serialize;

use crate::ir::{
    Entity, Flowline, Node, NodeKind, Opportunity, Point, START_TEXT, Settings, Task,
};

pub const DEFAULT_START_POSITION: Point = Point { x: 100.0, y: 100.0 };

/// The live canvas state: every node and task keyed by id, the flowlines
/// between nodes, and the document-level extras carried through saves.
///
/// Only [`crate::canvas::Canvas`] mutates a store that is in use; the layout
/// engine and the codec borrow it for the duration of a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStore {
    entities: BTreeMap<String, Entity>,
    flowlines: Vec<Flowline>,
    node_counter: u64,
    start_id: String,
    pub settings: Settings,
    pub opportunities: Vec<Opportunity>,
    pub relationships: Option<serde_json::Value>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::with_start(DEFAULT_START_POSITION)
    }

    pub fn with_start(position: Point) -> Self {
        let mut store = Self::bare();
        let id = store.next_id();
        store.entities.insert(
            id.clone(),
            Entity::Node(Node {
                id: id.clone(),
                kind: NodeKind::Terminal,
                text: START_TEXT.to_string(),
                position,
            }),
        );
        store.start_id = id;
        store
    }

    /// A store with no entities at all. Callers must install a Start node
    /// through [`GraphStore::set_start`] before handing it out.
    pub(crate) fn bare() -> Self {
        Self {
            entities: BTreeMap::new(),
            flowlines: Vec::new(),
            node_counter: 0,
            start_id: String::new(),
            settings: Settings::default(),
            opportunities: Vec::new(),
            relationships: None,
        }
    }

    pub fn start_id(&self) -> &str {
        &self.start_id
    }

    pub fn start(&self) -> Option<&Node> {
        self.node(&self.start_id)
    }

    pub(crate) fn set_start(&mut self, id: &str) {
        self.start_id = id.to_string();
    }

    pub fn node_counter(&self) -> u64 {
        self.node_counter
    }

    /// Raises the id counter to at least `value`. The counter never goes back.
    pub(crate) fn bump_counter(&mut self, value: u64) {
        self.node_counter = self.node_counter.max(value);
    }

    /// Allocates the next counter-derived id that is not already taken.
    pub fn next_id(&mut self) -> String {
        loop {
            self.node_counter += 1;
            let id = self.node_counter.to_string();
            if !self.entities.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub(crate) fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.entities.get(id).and_then(Entity::as_node)
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.entities.get_mut(id).and_then(Entity::as_node_mut)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.entities.get(id).and_then(Entity::as_task)
    }

    pub(crate) fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.entities.get_mut(id).and_then(Entity::as_task_mut)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.entities.values().filter_map(Entity::as_node)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.entities.values().filter_map(Entity::as_task)
    }

    /// Tasks under `anchor`, ordered by slot.
    pub fn tasks_anchored_to(&self, anchor: &str) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks()
            .filter(|task| task.anchored_to == anchor)
            .collect();
        tasks.sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    pub fn task_ids_anchored_to(&self, anchor: &str) -> Vec<String> {
        self.tasks_anchored_to(anchor)
            .into_iter()
            .map(|task| task.id.clone())
            .collect()
    }

    pub fn flowlines(&self) -> &[Flowline] {
        &self.flowlines
    }

    pub(crate) fn flowlines_mut(&mut self) -> &mut Vec<Flowline> {
        &mut self.flowlines
    }

    pub fn outbound<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Flowline> + 'a {
        self.flowlines.iter().filter(move |line| line.source == node_id)
    }

    pub fn find_flowline(&self, source: &str, target: &str) -> Option<usize> {
        self.flowlines
            .iter()
            .position(|line| line.source == source && line.target == target)
    }

    pub(crate) fn insert(&mut self, entity: Entity) -> Option<Entity> {
        self.entities.insert(entity.id().to_string(), entity)
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Entity> {
        self.entities.remove(id)
    }

    pub(crate) fn remove_flowlines_touching(&mut self, id: &str) -> usize {
        let before = self.flowlines.len();
        self.flowlines.retain(|line| !line.touches(id));
        before - self.flowlines.len()
    }

    /// Looks an element up by exact id first, then by case-insensitive text.
    pub fn resolve(&self, ident: &str) -> Option<&Entity> {
        let ident = ident.trim().trim_matches('"');
        if let Some(entity) = self.entities.get(ident) {
            return Some(entity);
        }
        self.entities
            .values()
            .find(|entity| entity.text().trim().eq_ignore_ascii_case(ident))
    }

    pub fn opportunity(&self, id: &str) -> Option<&Opportunity> {
        self.opportunities.iter().find(|opp| opp.id == id)
    }

    pub fn stats(&self) -> WorkflowStats {
        let mut stats = WorkflowStats {
            flowlines: self.flowlines.len(),
            opportunities: self.opportunities.len(),
            ..WorkflowStats::default()
        };
        for entity in self.entities.values() {
            match entity {
                Entity::Node(node) => match node.kind {
                    NodeKind::Terminal => stats.terminal_nodes += 1,
                    NodeKind::Process => stats.process_nodes += 1,
                    NodeKind::Decision => stats.decision_nodes += 1,
                },
                Entity::Task(task) => {
                    stats.tasks += 1;
                    stats.tags += task.tags.len();
                    stats.completed_tags += task.tags.iter().filter(|tag| tag.completed).count();
                    *stats
                        .tasks_per_anchor
                        .entry(task.anchored_to.clone())
                        .or_insert(0) += 1;
                    if self.node(&task.anchored_to).is_none() {
                        stats.orphaned_tasks += 1;
                    }
                }
            }
        }
        stats
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Trailing decimal digits of an id: `"12"` and `"node_12"` both yield 12.
pub(crate) fn id_number(id: &str) -> Option<u64> {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, ch)| ch.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;
    id[digits_start..].parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    pub terminal_nodes: usize,
    pub process_nodes: usize,
    pub decision_nodes: usize,
    pub tasks: usize,
    pub flowlines: usize,
    pub tags: usize,
    pub completed_tags: usize,
    pub opportunities: usize,
    pub orphaned_tasks: usize,
    pub tasks_per_anchor: BTreeMap<String, usize>,
}

impl WorkflowStats {
    pub fn regular_nodes(&self) -> usize {
        self.terminal_nodes + self.process_nodes + self.decision_nodes
    }

    pub fn status_line(&self) -> String {
        format!(
            "{} nodes, {} tasks, {} flowlines, {} tags",
            self.regular_nodes(),
            self.tasks,
            self.flowlines,
            self.tags
        )
    }
}
