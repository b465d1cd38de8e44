use crate::config::LayoutConfig;
use crate::ir::{Size, Task};

use super::Measure;

/// Size estimate for a task card when no renderer reports real sizes: the
/// wrapped label plus one row per `tags_per_row` tag chips.
#[derive(Debug, Clone)]
pub struct EstimatedMeasure {
    pub font_size: f32,
    pub line_height: f32,
    pub max_label_width_chars: usize,
    pub task_width: f32,
    pub padding_x: f32,
    pub padding_y: f32,
    pub tag_row_height: f32,
    pub tags_per_row: usize,
}

impl EstimatedMeasure {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            font_size: config.font_size,
            line_height: config.label_line_height,
            max_label_width_chars: config.max_label_width_chars,
            task_width: config.task_width,
            padding_x: config.task_padding_x,
            padding_y: config.task_padding_y,
            tag_row_height: config.tag_row_height,
            tags_per_row: config.tags_per_row.max(1),
        }
    }

    pub fn label_lines(&self, text: &str) -> Vec<String> {
        let inner = (self.task_width - self.padding_x * 2.0).max(self.font_size);
        let max_width = max_label_width_px(self.max_label_width_chars, self.font_size).min(inner);
        let mut lines = Vec::new();
        for line in split_lines(text) {
            lines.extend(wrap_line(&line, max_width, self.font_size));
        }
        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }
}

impl Default for EstimatedMeasure {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

impl Measure for EstimatedMeasure {
    fn measure(&self, task: &Task) -> Size {
        let lines = self.label_lines(&task.text);
        let text_height = lines.len() as f32 * self.font_size * self.line_height;
        let tag_rows = task.tags.len().div_ceil(self.tags_per_row.max(1));
        let height = self.padding_y * 2.0 + text_height + tag_rows as f32 * self.tag_row_height;
        Size::new(self.task_width, height)
    }
}

pub(crate) fn char_width_factor(ch: char) -> f32 {
    match ch {
        ' ' => 0.306,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => 0.321,
        'i' | 'j' | 'l' | 'I' => 0.25,
        'f' | 't' | 'r' => 0.34,
        'm' | 'w' => 0.84,
        'M' | 'W' => 0.93,
        'A'..='Z' => 0.66,
        'a'..='z' => 0.56,
        '0'..='9' => 0.6,
        '@' | '#' | '%' | '&' => 0.946,
        _ => 0.568,
    }
}

pub(crate) fn split_lines(text: &str) -> Vec<String> {
    text.replace("\\n", "\n")
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect()
}

pub(crate) fn wrap_line(line: &str, max_width: f32, font_size: f32) -> Vec<String> {
    if text_width(line, font_size) <= max_width {
        return vec![line.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if text_width(&candidate, font_size) > max_width {
            if !current.is_empty() {
                lines.push(current.clone());
                current.clear();
            }
            current.push_str(word);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width_factor).sum::<f32>() * font_size
}

fn max_label_width_px(max_chars: usize, font_size: f32) -> f32 {
    (max_chars.max(1) as f32) * font_size * 0.56
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Tag;

    #[test]
    fn split_lines_trims_whitespace() {
        assert_eq!(split_lines("  hello  \n  world  "), vec!["hello", "world"]);
        assert_eq!(split_lines("a\\nb"), vec!["a", "b"]);
    }

    #[test]
    fn text_width_scales_with_font_size() {
        let w14 = text_width("Hello", 14.0);
        let w28 = text_width("Hello", 28.0);
        assert!((w28 - w14 * 2.0).abs() < 0.01);
    }

    #[test]
    fn wrap_line_splits_long_text() {
        let result = wrap_line("this is a rather long line that should be wrapped", 100.0, 14.0);
        assert!(result.len() > 1, "expected wrapping, got {:?}", result);
        assert_eq!(wrap_line("short", 1000.0, 14.0).len(), 1);
    }

    #[test]
    fn tags_grow_the_estimate() {
        let measure = EstimatedMeasure::default();
        let mut task = Task::new("2", "Call supplier", "1");
        let bare = measure.measure(&task).height;
        task.set_tag(Tag::new("urgency", "urgent"));
        let one_row = measure.measure(&task).height;
        task.set_tag(Tag::new("importance", "important"));
        let still_one_row = measure.measure(&task).height;
        task.set_tag(Tag::new("phase", "beta"));
        let two_rows = measure.measure(&task).height;

        assert!(one_row > bare);
        assert_eq!(one_row, still_one_row);
        assert!(two_rows > one_row);
    }

    #[test]
    fn zero_tags_per_row_counts_as_one() {
        let measure = EstimatedMeasure {
            tags_per_row: 0,
            ..EstimatedMeasure::default()
        };
        let mut task = Task::new("2", "Call supplier", "1");
        let bare = measure.measure(&task).height;
        task.set_tag(Tag::new("urgency", "urgent"));
        task.set_tag(Tag::new("importance", "important"));
        assert_eq!(measure.measure(&task).height, bare + 2.0 * measure.tag_row_height);
    }

    #[test]
    fn long_labels_wrap_into_taller_cards() {
        let measure = EstimatedMeasure::default();
        let short = Task::new("2", "Ship", "1");
        let long = Task::new(
            "3",
            "Collect signatures from every regional office before the quarterly review",
            "1",
        );
        assert!(measure.measure(&long).height > measure.measure(&short).height);
        assert_eq!(measure.measure(&long).width, measure.task_width);
    }
}
