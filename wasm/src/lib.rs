use serde::Deserialize;
use wasm_bindgen::prelude::*;
use workflow_canvas::config::LayoutConfig;
use workflow_canvas::ir::Size;
use workflow_canvas::layout::{EstimatedMeasure, MeasuredSizes};
use workflow_canvas::theme::Theme;
use workflow_canvas::{Canvas, CommandOutput};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanvasOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
}

fn build_theme(options: &CanvasOptions) -> Theme {
    let mut theme = if matches!(options.theme.as_deref(), Some("classic" | "default")) {
        Theme::classic()
    } else {
        Theme::modern()
    };
    if let Some(font_family) = options.font_family.clone() {
        theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        theme.font_size = font_size;
    }
    theme
}

fn js_error(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// A canvas whose task heights come from the browser's rendered cards.
#[wasm_bindgen]
pub struct WorkflowCanvas {
    canvas: Canvas<MeasuredSizes>,
    theme: Theme,
}

#[wasm_bindgen]
impl WorkflowCanvas {
    #[wasm_bindgen(constructor)]
    pub fn new(options_json: Option<String>) -> Result<WorkflowCanvas, JsValue> {
        let options = match options_json {
            Some(raw) => serde_json::from_str::<CanvasOptions>(&raw).map_err(js_error)?,
            None => CanvasOptions::default(),
        };
        let config = LayoutConfig::default();
        let measure = MeasuredSizes::new(EstimatedMeasure::from_config(&config));
        Ok(Self {
            canvas: Canvas::with_measure(config, measure),
            theme: build_theme(&options),
        })
    }

    /// Replaces the canvas with a saved document. Returns the load warnings
    /// as a JSON array.
    pub fn load(&mut self, json: &str) -> Result<String, JsValue> {
        let report = self.canvas.load_json(json).map_err(js_error)?;
        serde_json::to_string(&report.warnings).map_err(js_error)
    }

    /// Merges a document into the canvas. Returns the old-to-new id map.
    pub fn append(&mut self, json: &str) -> Result<String, JsValue> {
        let report = self.canvas.append_json(json).map_err(js_error)?;
        serde_json::to_string(&report.id_map).map_err(js_error)
    }

    pub fn save(&self) -> Result<String, JsValue> {
        self.canvas.save_json().map_err(js_error)
    }

    /// Runs one slash command and returns its printable output.
    pub fn run(&mut self, line: &str) -> Result<String, JsValue> {
        let output = self.canvas.run(line).map_err(js_error)?;
        if let CommandOutput::Created { id, .. } = &output {
            return Ok(id.clone());
        }
        Ok(output.to_string())
    }

    /// Reports a task card's rendered size. Siblings below it move when the
    /// height changed.
    #[wasm_bindgen(js_name = reportSize)]
    pub fn report_size(&mut self, task_id: &str, width: f32, height: f32) -> bool {
        let changed = self
            .canvas
            .measure_mut()
            .record(task_id, Size::new(width, height));
        if changed {
            self.canvas.notify_resized(task_id);
        }
        changed
    }

    pub fn stats(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.canvas.stats()).map_err(js_error)
    }

    #[wasm_bindgen(js_name = toSvg)]
    pub fn to_svg(&self) -> String {
        self.canvas.to_svg(&self.theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_height_pushes_lower_slots_down() {
        let mut handle = WorkflowCanvas::new(None).unwrap();
        let first = handle.run("/task-create \"Draft\"").unwrap();
        let second = handle.run("/task-create \"Review\"").unwrap();
        let before = handle.canvas.store().task(&second).unwrap().position.y;

        assert!(handle.report_size(&first, 200.0, 300.0));
        let after = handle.canvas.store().task(&second).unwrap().position.y;
        assert!(after > before, "{before} -> {after}");

        assert!(!handle.report_size(&first, 200.0, 300.0));
    }

    #[test]
    fn classic_theme_is_selectable() {
        let options = CanvasOptions {
            theme: Some("classic".to_string()),
            ..CanvasOptions::default()
        };
        assert_eq!(build_theme(&options).background, Theme::classic().background);
    }
}
