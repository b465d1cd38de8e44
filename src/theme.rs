use serde::{Deserialize, Serialize};

use crate::ir::{NodeKind, TagCategory};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub text_color: String,
    pub line_color: String,
    pub border_color: String,
    pub terminal_fill: String,
    pub process_fill: String,
    pub decision_fill: String,
    pub task_fill: String,
    pub task_border: String,
    pub tag_background: String,
    pub tag_text_color: String,
    pub urgency_color: String,
    pub importance_color: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 14.0,
            background: "#FFFFFF".to_string(),
            text_color: "#333333".to_string(),
            line_color: "#333333".to_string(),
            border_color: "#9370DB".to_string(),
            terminal_fill: "#D5F5E3".to_string(),
            process_fill: "#ECECFF".to_string(),
            decision_fill: "#FFFFDE".to_string(),
            task_fill: "#FFFFFF".to_string(),
            task_border: "#AAAA33".to_string(),
            tag_background: "#E8E8E8".to_string(),
            tag_text_color: "#333333".to_string(),
            urgency_color: "#F5B7B1".to_string(),
            importance_color: "#AED6F1".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            background: "#FFFFFF".to_string(),
            text_color: "#1C2430".to_string(),
            line_color: "#7A8AA6".to_string(),
            border_color: "#C7D2E5".to_string(),
            terminal_fill: "#E7F8EF".to_string(),
            process_fill: "#F8FAFF".to_string(),
            decision_fill: "#FFF8E6".to_string(),
            task_fill: "#FFFFFF".to_string(),
            task_border: "#D7E0F0".to_string(),
            tag_background: "#EEF2F8".to_string(),
            tag_text_color: "#1C2430".to_string(),
            urgency_color: "#FDE2E1".to_string(),
            importance_color: "#DCEBFF".to_string(),
        }
    }

    pub fn node_fill(&self, kind: NodeKind) -> &str {
        match kind {
            NodeKind::Terminal => &self.terminal_fill,
            NodeKind::Process => &self.process_fill,
            NodeKind::Decision => &self.decision_fill,
        }
    }

    pub fn tag_fill(&self, category: &TagCategory) -> &str {
        match category {
            TagCategory::Urgency => &self.urgency_color,
            TagCategory::Importance => &self.importance_color,
            TagCategory::Custom(_) => &self.tag_background,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::modern()
    }
}
