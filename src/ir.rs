use serde::{Deserialize, Serialize};

/// Text of the terminal node every canvas starts from.
pub const START_TEXT: &str = "Start";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Terminal,
    Process,
    Decision,
}

impl NodeKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "terminal" | "start" | "end" => Some(Self::Terminal),
            "process" => Some(Self::Process),
            "decision" => Some(Self::Decision),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Process => "process",
            Self::Decision => "decision",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub text: String,
    pub position: Point,
}

impl Node {
    pub fn is_start(&self) -> bool {
        self.kind == NodeKind::Terminal && self.text == START_TEXT
    }
}

/// Tag category. `urgency` and `importance` drive the Eisenhower matrix; any
/// other category is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TagCategory {
    Urgency,
    Importance,
    Custom(String),
}

impl TagCategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Urgency => "urgency",
            Self::Importance => "importance",
            Self::Custom(name) => name.as_str(),
        }
    }
}

impl From<String> for TagCategory {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "urgency" => Self::Urgency,
            "importance" => Self::Importance,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for TagCategory {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<TagCategory> for String {
    fn from(value: TagCategory) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub category: TagCategory,
    pub option: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl Tag {
    pub fn new(category: impl Into<TagCategory>, option: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            option: option.into(),
            date: None,
            description: None,
            link: None,
            completed: false,
        }
    }

    /// Parses the `category:option` shorthand used by the command language.
    pub fn from_token(token: &str) -> Option<Self> {
        let (category, option) = token.split_once(':')?;
        let category = category.trim();
        let option = option.trim();
        if category.is_empty() || option.is_empty() {
            return None;
        }
        Some(Self::new(category, option))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Normal, Self::High, Self::Urgent];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" | "medium" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

/// Optional task fields introduced by the `2.0.0` document format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opportunity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl TaskDetails {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub anchored_to: String,
    pub previous_anchor: Option<String>,
    pub slot: usize,
    pub tags: Vec<Tag>,
    pub position: Point,
    pub details: TaskDetails,
}

impl Task {
    pub fn new(id: impl Into<String>, text: impl Into<String>, anchored_to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            anchored_to: anchored_to.into(),
            previous_anchor: None,
            slot: 0,
            tags: Vec::new(),
            position: Point::default(),
            details: TaskDetails::default(),
        }
    }

    pub fn tag(&self, category: &TagCategory) -> Option<&Tag> {
        self.tags.iter().find(|tag| &tag.category == category)
    }

    /// Adds `tag`, replacing an existing tag of the same category in place.
    /// Returns the replaced tag.
    pub fn set_tag(&mut self, tag: Tag) -> Option<Tag> {
        match self.tags.iter_mut().find(|existing| existing.category == tag.category) {
            Some(existing) => Some(std::mem::replace(existing, tag)),
            None => {
                self.tags.push(tag);
                None
            }
        }
    }

    pub fn remove_tag(&mut self, category: &TagCategory) -> Option<Tag> {
        let idx = self.tags.iter().position(|tag| &tag.category == category)?;
        Some(self.tags.remove(idx))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowlineType {
    #[default]
    Straight,
    Perpendicular,
}

impl FlowlineType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "straight" => Some(Self::Straight),
            "perpendicular" | "orthogonal" => Some(Self::Perpendicular),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Straight => "straight",
            Self::Perpendicular => "perpendicular",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flowline {
    pub source: String,
    pub target: String,
    pub kind: FlowlineType,
}

impl Flowline {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: FlowlineType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub flowline_type: FlowlineType,
}

/// An opportunity linked from tasks through `TaskDetails::opportunity_id`.
/// Fields this crate does not interpret survive round trips in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One canvas entity. Regular nodes and tasks share a single id space.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Node(Node),
    Task(Task),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Self::Node(node) => &node.id,
            Self::Task(task) => &task.id,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Node(node) => &node.text,
            Self::Task(task) => &task.text,
        }
    }

    pub fn position(&self) -> Point {
        match self {
            Self::Node(node) => node.position,
            Self::Task(task) => task.position,
        }
    }

    /// The `type` discriminator written to workflow documents.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Node(node) => node.kind.as_str(),
            Self::Task(_) => "task",
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(node),
            Self::Task(_) => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Self::Node(node) => Some(node),
            Self::Task(_) => None,
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(task) => Some(task),
            Self::Node(_) => None,
        }
    }

    pub fn as_task_mut(&mut self) -> Option<&mut Task> {
        match self {
            Self::Task(task) => Some(task),
            Self::Node(_) => None,
        }
    }

    pub fn is_task(&self) -> bool {
        matches!(self, Self::Task(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_tag_replaces_same_category_in_place() {
        let mut task = Task::new("t1", "Draft", "1");
        task.set_tag(Tag::new("urgency", "urgent"));
        task.set_tag(Tag::new("owner", "sam"));
        let replaced = task.set_tag(Tag::new("Urgency", "not-urgent"));

        assert_eq!(replaced.map(|t| t.option), Some("urgent".to_string()));
        assert_eq!(task.tags.len(), 2);
        assert_eq!(task.tags[0].category, TagCategory::Urgency);
        assert_eq!(task.tags[0].option, "not-urgent");
    }

    #[test]
    fn tag_category_serializes_as_plain_string() {
        let tag = Tag::new("importance", "important");
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["category"], "importance");

        let custom: Tag = serde_json::from_str(r#"{"category":"phase","option":"beta"}"#).unwrap();
        assert_eq!(custom.category, TagCategory::Custom("phase".to_string()));
        assert!(!custom.completed);
    }

    #[test]
    fn tag_token_requires_both_halves() {
        assert!(Tag::from_token("urgency:urgent").is_some());
        assert!(Tag::from_token("urgency:").is_none());
        assert!(Tag::from_token("urgent").is_none());
    }

    #[test]
    fn node_kind_accepts_start_alias() {
        assert_eq!(NodeKind::from_token("Start"), Some(NodeKind::Terminal));
        assert_eq!(NodeKind::from_token("loop"), None);
    }
}
