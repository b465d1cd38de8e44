use std::collections::BTreeMap;

use proptest::prelude::*;
use workflow_canvas::Canvas;
use workflow_canvas::ir::{NodeKind, Point, Tag};

#[derive(Debug, Clone)]
enum Op {
    CreateNode,
    CreateTask(usize),
    DeleteTask(usize),
    DeleteNode(usize),
    MoveTask(usize, usize),
    Advance(usize),
    Reverse(usize),
    Connect(usize, usize),
    Tag(usize),
    Rename(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::CreateNode),
        any::<usize>().prop_map(Op::CreateTask),
        any::<usize>().prop_map(Op::DeleteTask),
        any::<usize>().prop_map(Op::DeleteNode),
        (any::<usize>(), any::<usize>()).prop_map(|(t, n)| Op::MoveTask(t, n)),
        any::<usize>().prop_map(Op::Advance),
        any::<usize>().prop_map(Op::Reverse),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Connect(a, b)),
        any::<usize>().prop_map(Op::Tag),
        any::<usize>().prop_map(Op::Rename),
    ]
}

fn pick(ids: &[String], index: usize) -> Option<&str> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[index % ids.len()].as_str())
    }
}

fn node_ids(canvas: &Canvas) -> Vec<String> {
    canvas.store().nodes().map(|node| node.id.clone()).collect()
}

fn task_ids(canvas: &Canvas) -> Vec<String> {
    canvas.store().tasks().map(|task| task.id.clone()).collect()
}

/// Refused operations are part of the sequence too; only the store's shape
/// is checked afterwards.
fn apply(canvas: &mut Canvas, op: &Op) {
    let nodes = node_ids(canvas);
    let tasks = task_ids(canvas);
    match *op {
        Op::CreateNode => {
            let x = 200.0 * (nodes.len() + 1) as f32;
            let _ = canvas.create_node(NodeKind::Process, "Step", Point::new(x, 100.0));
        }
        Op::CreateTask(n) => {
            let _ = canvas.create_task("Task", pick(&nodes, n));
        }
        Op::DeleteTask(t) => {
            if let Some(task) = pick(&tasks, t) {
                let _ = canvas.delete_task(task);
            }
        }
        Op::DeleteNode(n) => {
            if let Some(node) = pick(&nodes, n) {
                let start = canvas.store().start_id().to_string();
                let plan: BTreeMap<String, String> = canvas
                    .store()
                    .task_ids_anchored_to(node)
                    .into_iter()
                    .map(|task| (task, start.clone()))
                    .collect();
                let _ = canvas.reassign_and_delete(node, &plan);
            }
        }
        Op::MoveTask(t, n) => {
            if let (Some(task), Some(node)) = (pick(&tasks, t), pick(&nodes, n)) {
                let _ = canvas.move_task(task, node);
            }
        }
        Op::Advance(t) => {
            if let Some(task) = pick(&tasks, t) {
                let _ = canvas.advance_task(task);
            }
        }
        Op::Reverse(t) => {
            if let Some(task) = pick(&tasks, t) {
                let _ = canvas.reverse_task(task);
            }
        }
        Op::Connect(a, b) => {
            if let (Some(source), Some(target)) = (pick(&nodes, a), pick(&nodes, b)) {
                let _ = canvas.connect(source, target, None);
            }
        }
        Op::Tag(t) => {
            if let Some(task) = pick(&tasks, t) {
                let _ = canvas.add_tag(task, Tag::new("urgency", "urgent"));
            }
        }
        Op::Rename(t) => {
            if let Some(task) = pick(&tasks, t) {
                let _ = canvas.rename(task, "A much longer task label that wraps onto more lines");
            }
        }
    }
}

fn assert_well_formed(canvas: &Canvas) {
    let store = canvas.store();
    let starts: Vec<&str> = store
        .nodes()
        .filter(|node| node.is_start())
        .map(|node| node.id.as_str())
        .collect();
    assert_eq!(starts, vec![store.start_id()]);

    for task in store.tasks() {
        assert!(
            store.node(&task.anchored_to).is_some(),
            "task {} anchored to missing {}",
            task.id,
            task.anchored_to
        );
    }
    for node in store.nodes() {
        let mut slots: Vec<usize> = store
            .tasks_anchored_to(&node.id)
            .iter()
            .map(|task| task.slot)
            .collect();
        slots.sort_unstable();
        let expected: Vec<usize> = (0..slots.len()).collect();
        assert_eq!(slots, expected, "slots under {}", node.id);
    }
    for line in store.flowlines() {
        assert!(store.node(&line.source).is_some() && store.node(&line.target).is_some());
    }
}

const INCOMING: &str = r#"{
    "version": "2.0.0",
    "nodeCounter": 4,
    "nodes": [
        {"id": "1", "type": "terminal", "text": "Start", "left": 100, "top": 100},
        {"id": "2", "type": "process", "text": "Pack", "left": 300, "top": 100},
        {"id": "3", "type": "task", "text": "Box it", "left": 0, "top": 0,
         "anchoredTo": "2", "slot": 0, "isTaskNode": true},
        {"id": "4", "type": "task", "text": "Stray", "left": 0, "top": 0,
         "anchoredTo": "9", "slot": 0, "isTaskNode": true}
    ],
    "flowlines": [{"sourceId": "1", "targetId": "2", "type": "straight"}],
    "settings": {"flowlineType": "straight"}
}"#;

proptest! {
    #[test]
    fn random_edits_keep_slots_contiguous_and_anchors_live(ops in prop::collection::vec(op(), 1..40)) {
        let mut canvas = Canvas::new();
        for op in &ops {
            apply(&mut canvas, op);
            assert_well_formed(&canvas);
        }
    }

    #[test]
    fn any_edited_canvas_reloads_to_the_same_store(ops in prop::collection::vec(op(), 1..40)) {
        let mut canvas = Canvas::new();
        for op in &ops {
            apply(&mut canvas, op);
        }
        let mut reloaded = Canvas::new();
        let report = reloaded.load_json(&canvas.save_json().unwrap()).unwrap();
        prop_assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        prop_assert_eq!(reloaded.store(), canvas.store());
    }

    #[test]
    fn append_leaves_live_entities_untouched(ops in prop::collection::vec(op(), 0..30)) {
        let mut canvas = Canvas::new();
        for op in &ops {
            apply(&mut canvas, op);
        }
        let before = canvas.store().clone();
        canvas.append_json(INCOMING).unwrap();

        for entity in before.entities() {
            prop_assert_eq!(canvas.store().entity(entity.id()), Some(entity));
        }
        prop_assert_eq!(canvas.store().start_id(), before.start_id());
        assert_well_formed(&canvas);

        let mut reloaded = Canvas::new();
        reloaded.load_json(&canvas.save_json().unwrap()).unwrap();
        prop_assert_eq!(reloaded.store(), canvas.store());
    }
}
