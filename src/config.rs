use crate::ir::FlowlineType;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Distance from an anchor's top edge to its slot-0 task.
    pub slot_base_offset: f32,
    /// Floor applied to measured task heights when stacking slots.
    pub slot_min_height: f32,
    pub slot_gap: f32,
    pub task_offset_x: f32,
    pub node_width: f32,
    pub node_height: f32,
    pub task_width: f32,
    pub task_padding_x: f32,
    pub task_padding_y: f32,
    pub tag_row_height: f32,
    pub tags_per_row: usize,
    pub font_size: f32,
    pub label_line_height: f32,
    pub max_label_width_chars: usize,
    /// Horizontal gap between existing content and appended workflows.
    pub append_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            slot_base_offset: 80.0,
            slot_min_height: 40.0,
            slot_gap: 10.0,
            task_offset_x: 0.0,
            node_width: 140.0,
            node_height: 60.0,
            task_width: 160.0,
            task_padding_x: 10.0,
            task_padding_y: 8.0,
            tag_row_height: 20.0,
            tags_per_row: 2,
            font_size: 14.0,
            label_line_height: 1.4,
            max_label_width_chars: 22,
            append_gap: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
    pub flowline_type: FlowlineType,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::modern();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            render,
            flowline_type: FlowlineType::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    background: Option<String>,
    text_color: Option<String>,
    line_color: Option<String>,
    border_color: Option<String>,
    terminal_fill: Option<String>,
    process_fill: Option<String>,
    decision_fill: Option<String>,
    task_fill: Option<String>,
    task_border: Option<String>,
    tag_background: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    slot_base_offset: Option<f32>,
    slot_min_height: Option<f32>,
    slot_gap: Option<f32>,
    task_offset_x: Option<f32>,
    node_width: Option<f32>,
    node_height: Option<f32>,
    task_width: Option<f32>,
    tag_row_height: Option<f32>,
    tags_per_row: Option<usize>,
    font_size: Option<f32>,
    append_gap: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    width: Option<f32>,
    height: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    render: Option<RenderConfigFile>,
    flowline_type: Option<FlowlineType>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses a config file body. Comments and trailing commas are accepted.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "modern" {
            config.theme = Theme::modern();
        } else if theme_name == "classic" || theme_name == "default" {
            config.theme = Theme::classic();
        } else {
            tracing::warn!(theme = theme_name, "unknown theme name, keeping default");
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.border_color {
            config.theme.border_color = v;
        }
        if let Some(v) = vars.terminal_fill {
            config.theme.terminal_fill = v;
        }
        if let Some(v) = vars.process_fill {
            config.theme.process_fill = v;
        }
        if let Some(v) = vars.decision_fill {
            config.theme.decision_fill = v;
        }
        if let Some(v) = vars.task_fill {
            config.theme.task_fill = v;
        }
        if let Some(v) = vars.task_border {
            config.theme.task_border = v;
        }
        if let Some(v) = vars.tag_background {
            config.theme.tag_background = v;
        }
    }
    config.render.background = config.theme.background.clone();

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.slot_base_offset {
            config.layout.slot_base_offset = v;
        }
        if let Some(v) = layout.slot_min_height {
            config.layout.slot_min_height = v;
        }
        if let Some(v) = layout.slot_gap {
            config.layout.slot_gap = v;
        }
        if let Some(v) = layout.task_offset_x {
            config.layout.task_offset_x = v;
        }
        if let Some(v) = layout.node_width {
            config.layout.node_width = v;
        }
        if let Some(v) = layout.node_height {
            config.layout.node_height = v;
        }
        if let Some(v) = layout.task_width {
            config.layout.task_width = v;
        }
        if let Some(v) = layout.tag_row_height {
            config.layout.tag_row_height = v;
        }
        if let Some(v) = layout.tags_per_row {
            config.layout.tags_per_row = v.max(1);
        }
        if let Some(v) = layout.font_size {
            config.layout.font_size = v;
        }
        if let Some(v) = layout.append_gap {
            config.layout.append_gap = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
    }

    if let Some(kind) = parsed.flowline_type {
        config.flowline_type = kind;
    }

    Ok(config)
}
