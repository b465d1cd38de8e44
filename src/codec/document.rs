//! On-disk shapes of the workflow document, one per supported version.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DocumentError;
use crate::ir::{FlowlineType, Opportunity, Settings, Tag, TaskDetails};

pub const CURRENT_VERSION: &str = "2.0.0";

/// The current (`2.0.0`) document. Every older version upgrades into this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    pub version: String,
    pub node_counter: u64,
    pub nodes: Vec<NodeRecord>,
    pub flowlines: Vec<FlowlineRecord>,
    pub settings: Settings,
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Value>,
    /// Derived on save and ignored on load.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    pub left: f32,
    pub top: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchored_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_anchor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub is_task_node: bool,
    #[serde(default)]
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    /// Rendering hints. Written on save, recomputed rather than read on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_position: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action_slot_position: Option<Value>,
    #[serde(flatten)]
    pub details: TaskDetails,
}

impl NodeRecord {
    pub fn is_task(&self) -> bool {
        self.is_task_node || self.kind.eq_ignore_ascii_case("task")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowlineRecord {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type", default)]
    pub kind: FlowlineType,
}

/// `1.0` node record: no slots, no previous anchor, no tags.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecordV1 {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    pub left: f32,
    pub top: f32,
    #[serde(default)]
    pub anchored_to: Option<String>,
    #[serde(default)]
    pub is_task_node: bool,
    #[serde(default)]
    pub class_name: String,
}

/// `1.1` node record: `1.0` plus one-step history, slot and tags.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecordV1_1 {
    #[serde(flatten)]
    pub base: NodeRecordV1,
    #[serde(default)]
    pub previous_anchor: Option<String>,
    #[serde(default)]
    pub slot: Option<usize>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDocument<R> {
    pub node_counter: u64,
    pub nodes: Vec<R>,
    pub flowlines: Vec<FlowlineRecord>,
    pub settings: Settings,
}

#[derive(Debug, Clone)]
pub enum VersionedDocument {
    V1(LegacyDocument<NodeRecordV1>),
    V1_1(LegacyDocument<NodeRecordV1_1>),
    V2(WorkflowDocument),
}

impl VersionedDocument {
    /// Parses and validates a document of any supported version.
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        let value: Value =
            serde_json::from_str(input).map_err(|err| DocumentError::Parse(err.to_string()))?;
        if !value.is_object() {
            return Err(DocumentError::Invalid(
                "top level must be a JSON object".to_string(),
            ));
        }
        let version = match value.get("version") {
            None | Some(Value::Null) => return Err(DocumentError::MissingVersion),
            Some(Value::String(version)) => version.trim().to_string(),
            Some(other) => other.to_string(),
        };
        let parsed = match version.as_str() {
            "1.0" => serde_json::from_value(value).map(Self::V1),
            "1.1" => serde_json::from_value(value).map(Self::V1_1),
            CURRENT_VERSION => serde_json::from_value(value).map(Self::V2),
            v if v.starts_with("0.") => {
                return Err(DocumentError::DeprecatedVersion(version.clone()));
            }
            _ => return Err(DocumentError::UnsupportedVersion(version.clone())),
        };
        parsed.map_err(|err| DocumentError::Invalid(err.to_string()))
    }

    pub fn version(&self) -> &str {
        match self {
            Self::V1(_) => "1.0",
            Self::V1_1(_) => "1.1",
            Self::V2(doc) => &doc.version,
        }
    }

    pub fn upgrade(self) -> WorkflowDocument {
        match self {
            Self::V1(doc) => WorkflowDocument {
                version: CURRENT_VERSION.to_string(),
                node_counter: doc.node_counter,
                nodes: doc.nodes.into_iter().map(upgrade_v1).collect(),
                flowlines: doc.flowlines,
                settings: doc.settings,
                opportunities: Vec::new(),
                relationships: None,
                structured: None,
                saved_at: None,
            },
            Self::V1_1(doc) => WorkflowDocument {
                version: CURRENT_VERSION.to_string(),
                node_counter: doc.node_counter,
                nodes: doc.nodes.into_iter().map(upgrade_v1_1).collect(),
                flowlines: doc.flowlines,
                settings: doc.settings,
                opportunities: Vec::new(),
                relationships: None,
                structured: None,
                saved_at: None,
            },
            Self::V2(doc) => doc,
        }
    }
}

fn upgrade_v1(record: NodeRecordV1) -> NodeRecord {
    NodeRecord {
        id: record.id,
        kind: record.kind,
        text: record.text,
        left: record.left,
        top: record.top,
        anchored_to: record.anchored_to,
        previous_anchor: None,
        slot: None,
        tags: Vec::new(),
        is_task_node: record.is_task_node,
        class_name: record.class_name,
        width: None,
        height: None,
        container_position: None,
        next_action_slot_position: None,
        details: TaskDetails::default(),
    }
}

fn upgrade_v1_1(record: NodeRecordV1_1) -> NodeRecord {
    NodeRecord {
        previous_anchor: record.previous_anchor,
        slot: record.slot,
        tags: record.tags,
        ..upgrade_v1(record.base)
    }
}

/// Flattened projection of the document for consumers that do not want to
/// walk `nodes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredView {
    pub tasks: Vec<StructuredTask>,
    pub tags: Vec<StructuredTag>,
    pub regular_nodes: Vec<StructuredNode>,
    pub summary: StructuredSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredTask {
    pub id: String,
    pub text: String,
    pub anchored_to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_anchor: Option<String>,
    pub slot: usize,
    pub tag_count: usize,
    #[serde(flatten)]
    pub details: TaskDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredTag {
    pub task_id: String,
    #[serde(flatten)]
    pub tag: Tag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredSummary {
    pub total_nodes: usize,
    pub total_tasks: usize,
    pub total_tags: usize,
    pub total_flowlines: usize,
    pub total_opportunities: usize,
}

impl WorkflowDocument {
    /// True when `structured` describes exactly the records in `nodes` and
    /// `flowlines`. Documents without a projection are trivially consistent.
    pub fn structured_is_consistent(&self) -> bool {
        let Some(view) = &self.structured else {
            return true;
        };
        let tasks: Vec<&NodeRecord> = self.nodes.iter().filter(|r| r.is_task()).collect();
        let regular: Vec<&NodeRecord> = self.nodes.iter().filter(|r| !r.is_task()).collect();
        let tag_count: usize = tasks.iter().map(|r| r.tags.len()).sum();

        let same_ids = |a: Vec<&str>, b: Vec<&str>| {
            let mut a = a;
            let mut b = b;
            a.sort_unstable();
            b.sort_unstable();
            a == b
        };

        same_ids(
            tasks.iter().map(|r| r.id.as_str()).collect(),
            view.tasks.iter().map(|t| t.id.as_str()).collect(),
        ) && same_ids(
            regular.iter().map(|r| r.id.as_str()).collect(),
            view.regular_nodes.iter().map(|n| n.id.as_str()).collect(),
        ) && view.tags.len() == tag_count
            && view.summary.total_tasks == tasks.len()
            && view.summary.total_nodes == regular.len()
            && view.summary.total_tags == tag_count
            && view.summary.total_flowlines == self.flowlines.len()
            && view.summary.total_opportunities == self.opportunities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_field_selects_the_shape() {
        let base = r#""nodeCounter": 1, "nodes": [], "flowlines": [], "settings": {"flowlineType": "straight"}"#;
        let v1 = VersionedDocument::parse(&format!(r#"{{"version": "1.0", {base}}}"#)).unwrap();
        assert!(matches!(v1, VersionedDocument::V1(_)));
        let v11 = VersionedDocument::parse(&format!(r#"{{"version": 1.1, {base}}}"#)).unwrap();
        assert!(matches!(v11, VersionedDocument::V1_1(_)));
        let v2 = VersionedDocument::parse(&format!(r#"{{"version": "2.0.0", {base}}}"#)).unwrap();
        assert_eq!(v2.version(), "2.0.0");
    }

    #[test]
    fn version_errors_are_distinct() {
        assert_eq!(
            VersionedDocument::parse(r#"{"nodes": []}"#).unwrap_err(),
            DocumentError::MissingVersion
        );
        assert_eq!(
            VersionedDocument::parse(r#"{"version": "0.9"}"#).unwrap_err(),
            DocumentError::DeprecatedVersion("0.9".to_string())
        );
        assert_eq!(
            VersionedDocument::parse(r#"{"version": "9.9"}"#).unwrap_err(),
            DocumentError::UnsupportedVersion("9.9".to_string())
        );
        assert!(matches!(
            VersionedDocument::parse("{not json").unwrap_err(),
            DocumentError::Parse(_)
        ));
        assert!(matches!(
            VersionedDocument::parse(r#"{"version": "1.1", "nodes": []}"#).unwrap_err(),
            DocumentError::Invalid(_)
        ));
    }

    #[test]
    fn v1_upgrade_leaves_slots_open() {
        let doc = VersionedDocument::parse(
            r#"{
                "version": "1.0",
                "nodeCounter": 2,
                "nodes": [
                    {"id": "1", "type": "terminal", "text": "Start", "left": 100, "top": 100},
                    {"id": "2", "type": "task", "text": "Draft", "left": 0, "top": 0,
                     "anchoredTo": "1", "isTaskNode": true}
                ],
                "flowlines": [],
                "settings": {"flowlineType": "perpendicular"}
            }"#,
        )
        .unwrap()
        .upgrade();
        assert_eq!(doc.version, CURRENT_VERSION);
        assert_eq!(doc.nodes[1].slot, None);
        assert!(doc.nodes[1].is_task());
        assert_eq!(doc.settings.flowline_type, FlowlineType::Perpendicular);
    }
}
