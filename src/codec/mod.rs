//! Workflow document codec: save, load and append.
//!
//! Load and append parse, validate and upgrade the whole document and build
//! their result off to the side. The live store is only touched once nothing
//! can fail anymore.

mod append;
mod document;

pub use append::AppendReport;
pub use document::{
    CURRENT_VERSION, FlowlineRecord, LegacyDocument, NodeRecord, NodeRecordV1, NodeRecordV1_1,
    StructuredNode, StructuredSummary, StructuredTag, StructuredTask, StructuredView,
    VersionedDocument, WorkflowDocument,
};

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::canvas::{Canvas, fallback_text};
use crate::error::DocumentError;
use crate::ir::{Entity, Flowline, Node, NodeKind, Opportunity, Point, START_TEXT, Settings, Task};
use crate::layout::{Measure, SlotLayout};
use crate::store::{DEFAULT_START_POSITION, GraphStore, id_number};

/// What a load did to the document on its way in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub source_version: String,
    pub nodes: usize,
    pub tasks: usize,
    pub flowlines: usize,
    /// Repairs applied to stale references, one line each.
    pub warnings: Vec<String>,
}

/// Title given to a Start node that arrives while another Start is live.
pub const IMPORTED_START_TEXT: &str = "Start (imported)";

/// Retitles Start nodes in `entities`, sparing the first one when
/// `keep_first` is set. Returns the ids of the retitled nodes.
pub(crate) fn retitle_extra_starts<'a>(
    entities: impl IntoIterator<Item = &'a mut Entity>,
    keep_first: bool,
) -> Vec<String> {
    let mut spare_next = keep_first;
    let mut retitled = Vec::new();
    for entity in entities {
        let Entity::Node(node) = entity else {
            continue;
        };
        if !node.is_start() {
            continue;
        }
        if spare_next {
            spare_next = false;
            continue;
        }
        node.text = IMPORTED_START_TEXT.to_string();
        retitled.push(node.id.clone());
    }
    retitled
}

/// `workflow-{ISO 8601 timestamp}.json` with the colons replaced.
pub fn default_file_name(now: DateTime<Utc>) -> String {
    format!("workflow-{}.json", now.format("%Y-%m-%dT%H-%M-%S%.3fZ"))
}

/// Parses any supported version and upgrades it to the current shape.
pub fn parse_document(input: &str) -> Result<WorkflowDocument, DocumentError> {
    let versioned = VersionedDocument::parse(input)?;
    tracing::debug!(version = versioned.version(), "parsed workflow document");
    Ok(versioned.upgrade())
}

pub fn serialize(store: &GraphStore, layout: &SlotLayout<'_>) -> WorkflowDocument {
    // The Start record leads so a reload identifies the same Start.
    let start = store.entity(store.start_id());
    let nodes: Vec<NodeRecord> = start
        .into_iter()
        .chain(store.entities().filter(|entity| entity.id() != store.start_id()))
        .map(|entity| node_record(entity, layout))
        .collect();
    let flowlines: Vec<FlowlineRecord> = store
        .flowlines()
        .iter()
        .map(|line| FlowlineRecord {
            source_id: line.source.clone(),
            target_id: line.target.clone(),
            kind: line.kind,
        })
        .collect();
    let structured = structured_view(store);
    WorkflowDocument {
        version: CURRENT_VERSION.to_string(),
        node_counter: store.node_counter(),
        nodes,
        flowlines,
        settings: store.settings,
        opportunities: store.opportunities.clone(),
        relationships: store.relationships.clone(),
        structured: Some(structured),
        saved_at: Some(Utc::now().to_rfc3339()),
    }
}

fn display_text(entity: &Entity) -> String {
    if entity.text().trim().is_empty() {
        fallback_text(entity.type_name(), entity.id())
    } else {
        entity.text().to_string()
    }
}

fn node_record(entity: &Entity, layout: &SlotLayout<'_>) -> NodeRecord {
    let size = layout.entity_size(entity);
    let position = entity.position();
    let mut record = NodeRecord {
        id: entity.id().to_string(),
        kind: entity.type_name().to_string(),
        text: display_text(entity),
        left: position.x,
        top: position.y,
        anchored_to: None,
        previous_anchor: None,
        slot: None,
        tags: Vec::new(),
        is_task_node: entity.is_task(),
        class_name: format!("node {}", entity.type_name()),
        width: Some(size.width),
        height: Some(size.height),
        container_position: None,
        next_action_slot_position: None,
        details: Default::default(),
    };
    if let Entity::Task(task) = entity {
        record.anchored_to = Some(task.anchored_to.clone());
        record.previous_anchor = task.previous_anchor.clone();
        record.slot = Some(task.slot);
        record.tags = task.tags.clone();
        record.container_position = Some(json!({ "left": position.x, "top": position.y }));
        record.next_action_slot_position = Some(json!(task.slot));
        record.details = task.details.clone();
    }
    record
}

fn structured_view(store: &GraphStore) -> StructuredView {
    let stats = store.stats();
    let tasks = store
        .tasks()
        .map(|task| StructuredTask {
            id: task.id.clone(),
            text: task.text.clone(),
            anchored_to: task.anchored_to.clone(),
            previous_anchor: task.previous_anchor.clone(),
            slot: task.slot,
            tag_count: task.tags.len(),
            details: task.details.clone(),
        })
        .collect();
    let tags = store
        .tasks()
        .flat_map(|task| {
            task.tags.iter().map(|tag| StructuredTag {
                task_id: task.id.clone(),
                tag: tag.clone(),
            })
        })
        .collect();
    let regular_nodes = store
        .nodes()
        .map(|node| StructuredNode {
            id: node.id.clone(),
            kind: node.kind.as_str().to_string(),
            text: node.text.clone(),
            left: node.position.x,
            top: node.position.y,
            task_count: stats.tasks_per_anchor.get(&node.id).copied().unwrap_or(0),
        })
        .collect();
    StructuredView {
        tasks,
        tags,
        regular_nodes,
        summary: StructuredSummary {
            total_nodes: stats.regular_nodes(),
            total_tasks: stats.tasks,
            total_tags: stats.tags,
            total_flowlines: stats.flowlines,
            total_opportunities: stats.opportunities,
        },
    }
}

/// A document turned into entities, before any reference is checked.
pub(crate) struct Decoded {
    /// Entities in record order, each task with the slot its record asked for.
    pub entities: Vec<(Entity, Option<usize>)>,
    pub flowlines: Vec<Flowline>,
    pub node_counter: u64,
    pub settings: Settings,
    pub opportunities: Vec<Opportunity>,
    pub relationships: Option<serde_json::Value>,
}

pub(crate) fn decode(doc: WorkflowDocument) -> Result<Decoded, DocumentError> {
    let mut seen = HashSet::new();
    let mut entities = Vec::with_capacity(doc.nodes.len());
    for record in doc.nodes {
        if record.id.trim().is_empty() {
            return Err(DocumentError::Invalid("node record with empty id".to_string()));
        }
        if !seen.insert(record.id.clone()) {
            return Err(DocumentError::DuplicateId(record.id));
        }
        let position = Point::new(record.left, record.top);
        if record.is_task() {
            let slot = record.slot;
            let task = Task {
                anchored_to: record.anchored_to.unwrap_or_default(),
                previous_anchor: record.previous_anchor,
                slot: slot.unwrap_or(0),
                tags: record.tags,
                position,
                details: record.details,
                ..Task::new(record.id, record.text, "")
            };
            entities.push((Entity::Task(task), slot));
        } else {
            let kind = NodeKind::from_token(&record.kind).ok_or_else(|| {
                DocumentError::Invalid(format!(
                    "node '{}' has unknown type '{}'",
                    record.id, record.kind
                ))
            })?;
            entities.push((
                Entity::Node(Node {
                    id: record.id,
                    kind,
                    text: record.text,
                    position,
                }),
                None,
            ));
        }
    }
    let flowlines = doc
        .flowlines
        .into_iter()
        .map(|line| Flowline::new(line.source_id, line.target_id, line.kind))
        .collect();
    Ok(Decoded {
        entities,
        flowlines,
        node_counter: doc.node_counter,
        settings: doc.settings,
        opportunities: doc.opportunities,
        relationships: doc.relationships,
    })
}

/// Renumbers every anchor's tasks to `0..n-1`. Requested slots order the
/// tasks; ties and tasks without a slot fall back to record order.
pub(crate) fn normalize_slots(store: &mut GraphStore, requested: &[(String, Option<usize>)]) {
    let mut per_anchor: BTreeMap<String, Vec<(usize, usize, String)>> = BTreeMap::new();
    for (order, (id, slot)) in requested.iter().enumerate() {
        if let Some(task) = store.task(id) {
            per_anchor.entry(task.anchored_to.clone()).or_default().push((
                slot.unwrap_or(usize::MAX),
                order,
                id.clone(),
            ));
        }
    }
    for mut tasks in per_anchor.into_values() {
        tasks.sort();
        for (slot, (_, _, id)) in tasks.into_iter().enumerate() {
            if let Some(task) = store.task_mut(&id) {
                task.slot = slot;
            }
        }
    }
}

/// Builds a fresh store from a decoded document, repairing what can be
/// repaired and logging each repair.
fn build_store(
    decoded: Decoded,
    layout: &SlotLayout<'_>,
) -> (GraphStore, Vec<String>) {
    let mut warnings = Vec::new();
    let mut store = GraphStore::bare();
    store.settings = decoded.settings;
    store.opportunities = decoded.opportunities;
    store.relationships = decoded.relationships;

    let highest_id = decoded
        .entities
        .iter()
        .filter_map(|(entity, _)| id_number(entity.id()))
        .max()
        .unwrap_or(0);
    store.bump_counter(decoded.node_counter.max(highest_id));

    let mut entities = decoded.entities;
    let start = entities
        .iter()
        .find_map(|(entity, _)| entity.as_node().filter(|node| node.is_start()))
        .map(|node| node.id.clone());
    for id in retitle_extra_starts(entities.iter_mut().map(|(entity, _)| entity), true) {
        let message = format!("node '{id}' was a second Start; retitled '{IMPORTED_START_TEXT}'");
        tracing::warn!("{message}");
        warnings.push(message);
    }

    let mut requested = Vec::new();
    for (entity, slot) in entities {
        if let Entity::Task(task) = &entity {
            requested.push((task.id.clone(), slot));
        }
        store.insert(entity);
    }

    let start = match start {
        Some(id) => id,
        None => {
            let id = store.next_id();
            store.insert(Entity::Node(Node {
                id: id.clone(),
                kind: NodeKind::Terminal,
                text: START_TEXT.to_string(),
                position: DEFAULT_START_POSITION,
            }));
            let message = format!("document had no Start node; created one as '{id}'");
            tracing::warn!("{message}");
            warnings.push(message);
            id
        }
    };
    store.set_start(&start);

    let stale: Vec<String> = store
        .tasks()
        .filter(|task| store.node(&task.anchored_to).is_none())
        .map(|task| task.id.clone())
        .collect();
    for id in stale {
        if let Some(task) = store.task_mut(&id) {
            let message = format!(
                "task '{id}' was anchored to missing node '{}'; moved to Start",
                task.anchored_to
            );
            tracing::warn!("{message}");
            warnings.push(message);
            task.anchored_to = start.clone();
        }
        if let Some(entry) = requested.iter_mut().find(|(task, _)| *task == id) {
            entry.1 = None;
        }
    }

    let mut flowlines: Vec<Flowline> = Vec::with_capacity(decoded.flowlines.len());
    for line in decoded.flowlines {
        let live = store.node(&line.source).is_some() && store.node(&line.target).is_some();
        let duplicate = flowlines
            .iter()
            .any(|kept| kept.source == line.source && kept.target == line.target);
        if !live || duplicate {
            let message = format!(
                "dropped flowline '{}' -> '{}'",
                line.source, line.target
            );
            tracing::warn!("{message}");
            warnings.push(message);
            continue;
        }
        flowlines.push(line);
    }
    *store.flowlines_mut() = flowlines;

    normalize_slots(&mut store, &requested);
    layout.reposition_all(&mut store);
    (store, warnings)
}

/// Replaces `store` with the document in `input`. On error `store` is
/// untouched.
pub fn load(
    store: &mut GraphStore,
    layout: &SlotLayout<'_>,
    input: &str,
) -> Result<LoadReport, DocumentError> {
    let versioned = VersionedDocument::parse(input)?;
    let source_version = versioned.version().to_string();
    let decoded = decode(versioned.upgrade())?;
    let (fresh, warnings) = build_store(decoded, layout);
    let stats = fresh.stats();
    let report = LoadReport {
        source_version,
        nodes: stats.regular_nodes(),
        tasks: stats.tasks,
        flowlines: stats.flowlines,
        warnings,
    };
    *store = fresh;
    tracing::info!(
        version = %report.source_version,
        nodes = report.nodes,
        tasks = report.tasks,
        flowlines = report.flowlines,
        "loaded workflow"
    );
    Ok(report)
}

impl<M: Measure> Canvas<M> {
    pub fn save(&self) -> WorkflowDocument {
        serialize(self.store(), &self.layout())
    }

    pub fn save_json(&self) -> Result<String, DocumentError> {
        let document = self.save();
        tracing::info!(entities = document.nodes.len(), "saved workflow");
        serde_json::to_string_pretty(&document).map_err(|err| DocumentError::Invalid(err.to_string()))
    }

    /// Replaces the whole canvas with a document. Destructive.
    pub fn load_json(&mut self, input: &str) -> Result<LoadReport, DocumentError> {
        let (store, layout) = self.parts();
        load(store, &layout, input)
    }

    /// Merges a document into the canvas, renaming colliding ids.
    pub fn append_json(&mut self, input: &str) -> Result<AppendReport, DocumentError> {
        let (store, layout) = self.parts();
        append::append(store, &layout, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Tag;

    #[test]
    fn file_name_has_no_colons() {
        let now = DateTime::parse_from_rfc3339("2026-03-04T05:06:07.890Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(default_file_name(now), "workflow-2026-03-04T05-06-07.890Z.json");
    }

    #[test]
    fn structured_view_agrees_with_records() {
        let mut canvas = Canvas::new();
        let task = canvas.create_task("Draft", None).unwrap();
        canvas.add_tag(&task, Tag::new("urgency", "urgent")).unwrap();
        let doc = canvas.save();
        assert!(doc.structured_is_consistent());
        let view = doc.structured.as_ref().unwrap();
        assert_eq!(view.summary.total_tags, 1);
        assert_eq!(view.regular_nodes[0].task_count, 1);
    }

    #[test]
    fn blank_text_gets_a_fallback_label() {
        let mut canvas = Canvas::new();
        let id = canvas.create_node(NodeKind::Process, "  ", Point::new(0.0, 0.0)).unwrap();
        let doc = canvas.save();
        let record = doc.nodes.iter().find(|r| r.id == id).unwrap();
        assert_eq!(record.text, format!("Process {id}"));
    }

    #[test]
    fn failed_load_keeps_the_store() {
        let mut canvas = Canvas::new();
        canvas.create_task("Keep me", None).unwrap();
        let before = canvas.store().clone();
        let err = canvas
            .load_json(r#"{"version": "2.0.0", "nodeCounter": 1, "nodes": [{"id": "1"}]}"#)
            .unwrap_err();
        assert!(matches!(err, DocumentError::Invalid(_)));
        assert_eq!(canvas.store(), &before);
    }

    #[test]
    fn dangling_anchor_is_moved_to_start() {
        let mut canvas = Canvas::new();
        let report = canvas
            .load_json(
                r#"{
                    "version": "1.1",
                    "nodeCounter": 3,
                    "nodes": [
                        {"id": "1", "type": "terminal", "text": "Start", "left": 10, "top": 20},
                        {"id": "3", "type": "task", "text": "Lost", "left": 0, "top": 0,
                         "anchoredTo": "2", "slot": 4, "isTaskNode": true}
                    ],
                    "flowlines": [{"sourceId": "1", "targetId": "2", "type": "straight"}],
                    "settings": {"flowlineType": "straight"}
                }"#,
            )
            .unwrap();
        assert_eq!(report.warnings.len(), 2);
        let task = canvas.store().task("3").unwrap();
        assert_eq!(task.anchored_to, "1");
        assert_eq!(task.slot, 0);
        assert_eq!(task.position, Point::new(10.0, 100.0));
        assert!(canvas.store().flowlines().is_empty());
    }
}
