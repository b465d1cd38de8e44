use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use workflow_canvas::Canvas;
use workflow_canvas::ir::{NodeKind, Point, Tag};
use workflow_canvas::theme::Theme;

/// A chain of `nodes` process nodes with `tasks_per_node` tagged tasks each.
fn chain_canvas(nodes: usize, tasks_per_node: usize) -> Canvas {
    let mut canvas = Canvas::new();
    let mut previous = canvas.store().start_id().to_string();
    for i in 0..nodes {
        let id = canvas.create_node(
            NodeKind::Process,
            &format!("Step {i}"),
            Point::new(100.0 + 250.0 * (i + 1) as f32, 100.0),
        )
        .expect("create failed");
        canvas.connect(&previous, &id, None).expect("connect failed");
        for t in 0..tasks_per_node {
            let task = canvas
                .create_task(&format!("Task {i}.{t} with a longer label"), Some(&id))
                .expect("create failed");
            if t % 2 == 0 {
                canvas
                    .add_tag(&task, Tag::new("urgency", "high"))
                    .expect("tag failed");
            }
        }
        previous = id;
    }
    canvas
}

fn bench_save_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("save_load");
    for (nodes, tasks) in [(10usize, 5usize), (50, 10), (100, 20)] {
        let name = format!("chain_{nodes}x{tasks}");
        let mut canvas = chain_canvas(nodes, tasks);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let json = canvas.save_json().expect("save failed");
                canvas.load_json(black_box(&json)).expect("load failed");
                black_box(canvas.store().len());
            });
        });
    }
    group.finish();
}

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");
    for tasks in [10usize, 50, 200] {
        let canvas = chain_canvas(2, tasks);
        let start = canvas.store().start_id().to_string();
        group.bench_with_input(BenchmarkId::from_parameter(tasks), &canvas, |b, base| {
            b.iter(|| {
                let mut canvas = Canvas::new();
                canvas.load_json(&base.save_json().expect("save failed")).expect("load failed");
                let first = canvas.store().task_ids_anchored_to("2");
                for id in &first {
                    canvas.move_task(id, &start).expect("move failed");
                }
                black_box(canvas.stats().tasks);
            });
        });
    }
    group.finish();
}

fn bench_svg(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_svg");
    let theme = Theme::modern();
    for (nodes, tasks) in [(10usize, 5usize), (50, 10)] {
        let name = format!("chain_{nodes}x{tasks}");
        let canvas = chain_canvas(nodes, tasks);
        group.bench_with_input(BenchmarkId::from_parameter(name), &canvas, |b, canvas| {
            b.iter(|| {
                let svg = canvas.to_svg(black_box(&theme));
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_save_load, bench_advance, bench_svg);
criterion_main!(benches);
