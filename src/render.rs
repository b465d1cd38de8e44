use crate::canvas::Canvas;
use crate::config::RenderConfig;
use crate::ir::{FlowlineType, Node, NodeKind, Point, Size, Task};
use crate::layout::{EstimatedMeasure, Measure, SlotLayout};
use crate::store::GraphStore;
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

const MARGIN: f32 = 40.0;

pub fn render_svg(store: &GraphStore, layout: &SlotLayout<'_>, theme: &Theme) -> String {
    let mut svg = String::new();
    let (origin_x, origin_y, width, height) = match layout.content_bounds(store) {
        Some(bounds) => (
            bounds.min_x - MARGIN,
            bounds.min_y - MARGIN,
            (bounds.width() + MARGIN * 2.0).max(200.0),
            (bounds.height() + MARGIN * 2.0).max(200.0),
        ),
        None => (0.0, 0.0, 200.0, 200.0),
    };

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"{origin_x:.2} {origin_y:.2} {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect x=\"{origin_x:.2}\" y=\"{origin_y:.2}\" width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    svg.push_str("<defs>");
    svg.push_str(&format!(
        "<marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        theme.line_color
    ));
    svg.push_str("</defs>");

    for line in store.flowlines() {
        let (Some(source), Some(target)) = (store.node(&line.source), store.node(&line.target))
        else {
            tracing::warn!(source = %line.source, target = %line.target, "skipping flowline with missing endpoint");
            continue;
        };
        let points = flowline_points(
            (source.position, layout.node_size(source)),
            (target.position, layout.node_size(target)),
            line.kind,
        );
        svg.push_str(&format!(
            "<path class=\"flowline {}\" d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.4\" marker-end=\"url(#arrow)\" />",
            line.kind.as_str(),
            points_to_path(&points),
            theme.line_color
        ));
    }

    for node in store.nodes() {
        svg.push_str(&node_svg(node, layout.node_size(node), theme));
    }

    let estimate = EstimatedMeasure::from_config(layout.config());
    for anchor in store.nodes() {
        for task in store.tasks_anchored_to(&anchor.id) {
            svg.push_str(&task_svg(task, layout.task_size(task), &estimate, theme));
        }
    }

    svg.push_str("</svg>");
    svg
}

fn node_svg(node: &Node, size: Size, theme: &Theme) -> String {
    let Point { x, y } = node.position;
    let fill = theme.node_fill(node.kind);
    let mut out = match node.kind {
        NodeKind::Decision => {
            let cx = x + size.width / 2.0;
            let cy = y + size.height / 2.0;
            format!(
                "<polygon class=\"node decision\" points=\"{cx:.2},{y:.2} {:.2},{cy:.2} {cx:.2},{:.2} {x:.2},{cy:.2}\" fill=\"{fill}\" stroke=\"{}\" stroke-width=\"1.4\"/>",
                x + size.width,
                y + size.height,
                theme.border_color
            )
        }
        NodeKind::Terminal | NodeKind::Process => {
            let radius = if node.kind == NodeKind::Terminal {
                size.height / 2.0
            } else {
                6.0
            };
            format!(
                "<rect class=\"node {}\" x=\"{x:.2}\" y=\"{y:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"{radius:.2}\" ry=\"{radius:.2}\" fill=\"{fill}\" stroke=\"{}\" stroke-width=\"1.4\"/>",
                node.kind.as_str(),
                size.width,
                size.height,
                theme.border_color
            )
        }
    };
    let lines = vec![node.text.clone()];
    out.push_str(&text_block_svg(
        x + size.width / 2.0,
        y + size.height / 2.0,
        &lines,
        theme,
        &theme.text_color,
    ));
    out
}

fn task_svg(task: &Task, size: Size, estimate: &EstimatedMeasure, theme: &Theme) -> String {
    let Point { x, y } = task.position;
    let mut out = format!(
        "<g class=\"task\" data-id=\"{}\"><rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"4\" ry=\"4\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1\"/>",
        escape_xml(&task.id),
        size.width,
        size.height,
        theme.task_fill,
        theme.task_border
    );

    let lines = estimate.label_lines(&task.text);
    let text_height = lines.len() as f32 * estimate.font_size * estimate.line_height;
    out.push_str(&text_block_svg(
        x + size.width / 2.0,
        y + estimate.padding_y + text_height / 2.0,
        &lines,
        theme,
        &theme.text_color,
    ));

    let per_row = estimate.tags_per_row.max(1);
    let chip_gap = 4.0;
    let inner = size.width - estimate.padding_x * 2.0;
    let chip_width = (inner - chip_gap * (per_row - 1) as f32) / per_row as f32;
    let chip_height = estimate.tag_row_height - 4.0;
    let tags_top = y + estimate.padding_y + text_height;
    for (idx, tag) in task.tags.iter().enumerate() {
        let row = idx / per_row;
        let col = idx % per_row;
        let chip_x = x + estimate.padding_x + col as f32 * (chip_width + chip_gap);
        let chip_y = tags_top + row as f32 * estimate.tag_row_height + 2.0;
        let opacity = if tag.completed { "0.5" } else { "1" };
        out.push_str(&format!(
            "<rect class=\"tag\" x=\"{chip_x:.2}\" y=\"{chip_y:.2}\" width=\"{chip_width:.2}\" height=\"{chip_height:.2}\" rx=\"{:.2}\" ry=\"{:.2}\" fill=\"{}\" opacity=\"{opacity}\"/>",
            chip_height / 2.0,
            chip_height / 2.0,
            theme.tag_fill(&tag.category)
        ));
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{:.2}\" fill=\"{}\">{}</text>",
            chip_x + chip_width / 2.0,
            chip_y + chip_height * 0.72,
            theme.font_family,
            theme.font_size * 0.8,
            theme.tag_text_color,
            escape_xml(&tag.option)
        ));
    }
    out.push_str("</g>");
    out
}

/// Path of a flowline from the source box to the target box. Perpendicular
/// lines bend twice at the horizontal midpoint.
fn flowline_points(
    (source, source_size): (Point, Size),
    (target, target_size): (Point, Size),
    kind: FlowlineType,
) -> Vec<(f32, f32)> {
    let from = center(source, source_size);
    let to = center(target, target_size);
    match kind {
        FlowlineType::Straight => vec![
            boundary_point(from, source_size, to),
            boundary_point(to, target_size, from),
        ],
        FlowlineType::Perpendicular => {
            let mid_x = (from.0 + to.0) / 2.0;
            let first = (mid_x, from.1);
            let second = (mid_x, to.1);
            vec![
                boundary_point(from, source_size, first),
                first,
                second,
                boundary_point(to, target_size, second),
            ]
        }
    }
}

fn center(position: Point, size: Size) -> (f32, f32) {
    (position.x + size.width / 2.0, position.y + size.height / 2.0)
}

/// Where the ray from `center` toward `toward` leaves a box of `size`.
fn boundary_point(center: (f32, f32), size: Size, toward: (f32, f32)) -> (f32, f32) {
    let dx = toward.0 - center.0;
    let dy = toward.1 - center.1;
    if dx == 0.0 && dy == 0.0 {
        return center;
    }
    let half_w = size.width / 2.0;
    let half_h = size.height / 2.0;
    let scale_x = if dx != 0.0 { half_w / dx.abs() } else { f32::INFINITY };
    let scale_y = if dy != 0.0 { half_h / dy.abs() } else { f32::INFINITY };
    let scale = scale_x.min(scale_y).min(1.0);
    (center.0 + dx * scale, center.1 + dy * scale)
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

fn text_block_svg(x: f32, y: f32, lines: &[String], theme: &Theme, fill: &str) -> String {
    let line_height = theme.font_size * 1.3;
    let total_height = lines.len() as f32 * line_height;
    let start_y = y - total_height / 2.0 + theme.font_size;
    let mut text = String::new();

    text.push_str(&format!(
        "<text x=\"{x:.2}\" y=\"{start_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">",
        theme.font_family, theme.font_size, fill
    ));

    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { line_height };
        text.push_str(&format!(
            "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            escape_xml(line)
        ));
    }

    text.push_str("</text>");
    text
}

impl<M: Measure> Canvas<M> {
    pub fn to_svg(&self, theme: &Theme) -> String {
        render_svg(self.store(), &self.layout(), theme)
    }
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(
    svg: &str,
    output: &Path,
    render_cfg: &RenderConfig,
    theme: &Theme,
) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .next()
        .map(|name| name.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "Inter".to_string());
    opt.fontdb_mut().load_system_fonts();
    if let Some(size) = usvg::Size::from_wh(render_cfg.width, render_cfg.height) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(
    _svg: &str,
    _output: &Path,
    _render_cfg: &RenderConfig,
    _theme: &Theme,
) -> Result<()> {
    Err(anyhow::anyhow!(
        "PNG output requires the 'png' feature"
    ))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Tag;

    #[test]
    fn render_svg_draws_nodes_tasks_and_flowlines() {
        let mut canvas = Canvas::new();
        let review = canvas.create_node(NodeKind::Decision, "Approve <fast>", Point::new(400.0, 100.0)).unwrap();
        canvas.connect("1", &review, Some(FlowlineType::Perpendicular)).unwrap();
        let task = canvas.create_task("Draft", None).unwrap();
        canvas.add_tag(&task, Tag::new("urgency", "urgent")).unwrap();

        let svg = canvas.to_svg(&Theme::modern());
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Approve &lt;fast&gt;"));
        assert!(svg.contains("class=\"node decision\""));
        assert!(svg.contains("class=\"flowline perpendicular\""));
        assert!(svg.contains("class=\"tag\""));
        assert!(svg.contains(">urgent</text>"));
    }

    #[test]
    fn straight_flowlines_leave_through_the_box_edge() {
        let size = Size::new(100.0, 50.0);
        let points = flowline_points(
            (Point::new(0.0, 0.0), size),
            (Point::new(300.0, 0.0), size),
            FlowlineType::Straight,
        );
        assert_eq!(points, vec![(100.0, 25.0), (300.0, 25.0)]);
    }

    #[test]
    fn perpendicular_flowlines_bend_at_the_midpoint() {
        let size = Size::new(100.0, 50.0);
        let points = flowline_points(
            (Point::new(0.0, 0.0), size),
            (Point::new(300.0, 200.0), size),
            FlowlineType::Perpendicular,
        );
        assert_eq!(points.len(), 4);
        assert_eq!(points[1], (200.0, 25.0));
        assert_eq!(points[2], (200.0, 225.0));
        assert_eq!(points[3], (300.0, 225.0));
    }
}
