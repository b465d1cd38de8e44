//! Slot layout for tasks anchored beneath nodes.
//!
//! A task's position is a pure function of its anchor's position, its slot
//! and the measured heights of the siblings in lower slots:
//!
//! ```text
//! y(slot 0) = anchor.y + slot_base_offset
//! y(slot k) = y(slot k-1) + max(height(k-1), slot_min_height) + slot_gap
//! ```
//!
//! Nothing here is cached. Every call re-reads the store, because tag edits
//! change task heights between calls.

mod text;

pub use text::{EstimatedMeasure, text_width};

use std::collections::{BTreeSet, HashMap};

use crate::config::LayoutConfig;
use crate::ir::{Entity, Node, Point, Size, Task};
use crate::store::GraphStore;

/// Source of rendered task sizes.
pub trait Measure {
    fn measure(&self, task: &Task) -> Size;
}

impl<F> Measure for F
where
    F: Fn(&Task) -> Size,
{
    fn measure(&self, task: &Task) -> Size {
        self(task)
    }
}

/// Sizes reported by a renderer, falling back to an estimate for tasks that
/// have not been measured yet.
#[derive(Debug, Clone, Default)]
pub struct MeasuredSizes {
    sizes: HashMap<String, Size>,
    fallback: EstimatedMeasure,
}

impl MeasuredSizes {
    pub fn new(fallback: EstimatedMeasure) -> Self {
        Self {
            sizes: HashMap::new(),
            fallback,
        }
    }

    /// Records a rendered size. Returns true when the height changed, which
    /// is when siblings below need repositioning.
    pub fn record(&mut self, task_id: &str, size: Size) -> bool {
        let previous = self.sizes.insert(task_id.to_string(), size);
        previous.is_none_or(|old| old.height != size.height)
    }

    pub fn forget(&mut self, task_id: &str) {
        self.sizes.remove(task_id);
    }
}

impl Measure for MeasuredSizes {
    fn measure(&self, task: &Task) -> Size {
        self.sizes
            .get(&task.id)
            .copied()
            .unwrap_or_else(|| self.fallback.measure(task))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    fn include(&mut self, position: Point, size: Size) {
        self.min_x = self.min_x.min(position.x);
        self.min_y = self.min_y.min(position.y);
        self.max_x = self.max_x.max(position.x + size.width);
        self.max_y = self.max_y.max(position.y + size.height);
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

/// The slot layout engine. Borrows its configuration and measurement source
/// for one operation; the store is passed to every call.
pub struct SlotLayout<'a> {
    config: &'a LayoutConfig,
    measure: &'a dyn Measure,
}

impl<'a> SlotLayout<'a> {
    pub fn new(config: &'a LayoutConfig, measure: &'a dyn Measure) -> Self {
        Self { config, measure }
    }

    pub fn config(&self) -> &LayoutConfig {
        self.config
    }

    /// Smallest slot under `anchor` not held by another task.
    pub fn first_free_slot(store: &GraphStore, anchor: &str, exclude: Option<&str>) -> usize {
        let used: BTreeSet<usize> = store
            .tasks()
            .filter(|task| task.anchored_to == anchor && Some(task.id.as_str()) != exclude)
            .map(|task| task.slot)
            .collect();
        let mut slot = 0;
        while used.contains(&slot) {
            slot += 1;
        }
        slot
    }

    pub fn assign_slot(&self, store: &mut GraphStore, task_id: &str) -> Option<usize> {
        let Some(task) = store.task(task_id) else {
            tracing::warn!(task = task_id, "cannot assign slot to unknown task");
            return None;
        };
        let anchor = task.anchored_to.clone();
        let slot = Self::first_free_slot(store, &anchor, Some(task_id));
        store.task_mut(task_id)?.slot = slot;
        tracing::debug!(task = task_id, anchor = %anchor, slot, "assigned slot");
        Some(slot)
    }

    /// Height a task occupies in its anchor's stack.
    pub fn slot_height(&self, task: &Task) -> f32 {
        self.measure.measure(task).height.max(self.config.slot_min_height)
    }

    pub fn task_size(&self, task: &Task) -> Size {
        let measured = self.measure.measure(task);
        Size::new(measured.width, self.slot_height(task))
    }

    pub fn node_size(&self, node: &Node) -> Size {
        let label = text_width(&node.text, self.config.font_size) + self.config.task_padding_x * 2.0;
        Size::new(self.config.node_width.max(label), self.config.node_height)
    }

    pub fn entity_size(&self, entity: &Entity) -> Size {
        match entity {
            Entity::Node(node) => self.node_size(node),
            Entity::Task(task) => self.task_size(task),
        }
    }

    /// Where `task_id` belongs right now, without writing it back.
    pub fn compute_position(&self, store: &GraphStore, task_id: &str) -> Option<Point> {
        let Some(task) = store.task(task_id) else {
            tracing::warn!(task = task_id, "cannot position unknown task");
            return None;
        };
        let Some(anchor) = store.node(&task.anchored_to) else {
            tracing::warn!(task = task_id, anchor = %task.anchored_to, "anchor node not found");
            return None;
        };
        let offset = store
            .tasks()
            .filter(|sibling| {
                sibling.anchored_to == task.anchored_to
                    && sibling.slot < task.slot
                    && sibling.id != task.id
            })
            .fold(self.config.slot_base_offset, |offset, sibling| {
                offset + self.slot_height(sibling) + self.config.slot_gap
            });
        Some(Point::new(
            anchor.position.x + self.config.task_offset_x,
            anchor.position.y + offset,
        ))
    }

    pub fn position_in_slot(&self, store: &mut GraphStore, task_id: &str) -> Option<Point> {
        let position = self.compute_position(store, task_id)?;
        store.task_mut(task_id)?.position = position;
        Some(position)
    }

    /// Renumbers the tasks under `anchor_id` to `0..n-1`, keeping their
    /// order, and repositions them.
    pub fn compact_slots(&self, store: &mut GraphStore, anchor_id: &str) {
        if store.node(anchor_id).is_none() {
            tracing::warn!(anchor = anchor_id, "cannot compact slots of missing anchor");
            return;
        }
        let ids = store.task_ids_anchored_to(anchor_id);
        for (slot, id) in ids.iter().enumerate() {
            if let Some(task) = store.task_mut(id) {
                task.slot = slot;
            }
        }
        self.reposition_siblings(store, anchor_id, 0);
    }

    /// Moves every sibling strictly below `task_id`. Lower slots keep their
    /// positions.
    pub fn reposition_after_height_change(&self, store: &mut GraphStore, task_id: &str) {
        let Some(task) = store.task(task_id) else {
            tracing::warn!(task = task_id, "cannot reposition siblings of unknown task");
            return;
        };
        let anchor = task.anchored_to.clone();
        let from_slot = task.slot + 1;
        self.reposition_siblings(store, &anchor, from_slot);
    }

    /// Repositions every task under `anchor_id`, e.g. after the anchor moved.
    pub fn reposition_anchor(&self, store: &mut GraphStore, anchor_id: &str) {
        self.reposition_siblings(store, anchor_id, 0);
    }

    pub fn reposition_all(&self, store: &mut GraphStore) {
        let anchors: Vec<String> = store.nodes().map(|node| node.id.clone()).collect();
        for anchor in anchors {
            self.reposition_siblings(store, &anchor, 0);
        }
    }

    fn reposition_siblings(&self, store: &mut GraphStore, anchor_id: &str, from_slot: usize) {
        let Some(origin) = store.node(anchor_id).map(|node| node.position) else {
            tracing::warn!(anchor = anchor_id, "anchor node not found");
            return;
        };
        let mut offset = self.config.slot_base_offset;
        let mut updates = Vec::new();
        for task in store.tasks_anchored_to(anchor_id) {
            if task.slot >= from_slot {
                updates.push((
                    task.id.clone(),
                    Point::new(origin.x + self.config.task_offset_x, origin.y + offset),
                ));
            }
            offset += self.slot_height(task) + self.config.slot_gap;
        }
        for (id, position) in updates {
            if let Some(task) = store.task_mut(&id) {
                task.position = position;
            }
        }
    }

    /// Extent of everything on the canvas.
    pub fn content_bounds(&self, store: &GraphStore) -> Option<Bounds> {
        let mut entities = store.entities();
        let first = entities.next()?;
        let position = first.position();
        let size = self.entity_size(first);
        let mut bounds = Bounds {
            min_x: position.x,
            min_y: position.y,
            max_x: position.x + size.width,
            max_y: position.y + size.height,
        };
        for entity in entities {
            bounds.include(entity.position(), self.entity_size(entity));
        }
        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Tag;

    fn fixed(height: f32) -> impl Fn(&Task) -> Size {
        move |_task: &Task| Size::new(100.0, height)
    }

    fn store_with_tasks(count: usize) -> GraphStore {
        let mut store = GraphStore::new();
        for slot in 0..count {
            let id = store.next_id();
            let mut task = Task::new(id, format!("task {slot}"), "1");
            task.slot = slot;
            store.insert(Entity::Task(task));
        }
        store
    }

    #[test]
    fn first_free_slot_fills_holes_before_extending() {
        let mut store = store_with_tasks(3);
        store.task_mut("3").unwrap().slot = 5;
        assert_eq!(SlotLayout::first_free_slot(&store, "1", None), 1);
        assert_eq!(SlotLayout::first_free_slot(&store, "1", Some("2")), 0);
        assert_eq!(SlotLayout::first_free_slot(&store, "missing", None), 0);
    }

    #[test]
    fn slot_zero_sits_at_base_offset() {
        let config = LayoutConfig::default();
        let measure = fixed(30.0);
        let layout = SlotLayout::new(&config, &measure);
        let mut store = store_with_tasks(1);
        let position = layout.position_in_slot(&mut store, "2").unwrap();
        assert_eq!(position, Point::new(100.0, 180.0));
        assert_eq!(store.task("2").unwrap().position, position);
    }

    #[test]
    fn stacking_uses_measured_height_with_floor() {
        let config = LayoutConfig::default();
        let measure = |task: &Task| {
            if task.id == "2" {
                Size::new(100.0, 70.0)
            } else {
                Size::new(100.0, 12.0)
            }
        };
        let layout = SlotLayout::new(&config, &measure);
        let mut store = store_with_tasks(3);
        layout.reposition_all(&mut store);
        assert_eq!(store.task("2").unwrap().position.y, 180.0);
        assert_eq!(store.task("3").unwrap().position.y, 180.0 + 70.0 + 10.0);
        assert_eq!(store.task("4").unwrap().position.y, 180.0 + 70.0 + 10.0 + 40.0 + 10.0);
    }

    #[test]
    fn height_change_only_moves_lower_siblings() {
        let config = LayoutConfig::default();
        let measure = EstimatedMeasure::default();
        let layout = SlotLayout::new(&config, &measure);
        let mut store = store_with_tasks(3);
        layout.reposition_all(&mut store);
        let before: Vec<Point> = ["2", "3", "4"]
            .iter()
            .map(|id| store.task(id).unwrap().position)
            .collect();

        let task = store.task_mut("3").unwrap();
        task.set_tag(Tag::new("urgency", "urgent"));
        task.position = Point::new(-1.0, -1.0);
        layout.reposition_after_height_change(&mut store, "3");

        assert_eq!(store.task("2").unwrap().position, before[0]);
        assert_eq!(store.task("3").unwrap().position, Point::new(-1.0, -1.0));
        assert!(store.task("4").unwrap().position.y > before[2].y);
    }

    #[test]
    fn compact_renumbers_in_slot_order() {
        let config = LayoutConfig::default();
        let measure = fixed(40.0);
        let layout = SlotLayout::new(&config, &measure);
        let mut store = store_with_tasks(4);
        store.remove("3");
        layout.compact_slots(&mut store, "1");
        let slots: Vec<(String, usize)> = store
            .tasks_anchored_to("1")
            .iter()
            .map(|task| (task.id.clone(), task.slot))
            .collect();
        assert_eq!(
            slots,
            vec![("2".to_string(), 0), ("4".to_string(), 1), ("5".to_string(), 2)]
        );
        assert_eq!(store.task("4").unwrap().position.y, 180.0 + 50.0);
    }

    #[test]
    fn missing_anchor_is_a_logged_noop() {
        let config = LayoutConfig::default();
        let measure = fixed(40.0);
        let layout = SlotLayout::new(&config, &measure);
        let mut store = store_with_tasks(1);
        store.task_mut("2").unwrap().anchored_to = "99".to_string();
        let snapshot = store.clone();
        assert!(layout.position_in_slot(&mut store, "2").is_none());
        layout.compact_slots(&mut store, "99");
        assert_eq!(store, snapshot);
    }

    #[test]
    fn measured_sizes_override_estimate() {
        let mut sizes = MeasuredSizes::default();
        let task = Task::new("2", "Draft", "1");
        let estimate = sizes.measure(&task);
        assert!(sizes.record("2", Size::new(160.0, 90.0)));
        assert!(!sizes.record("2", Size::new(170.0, 90.0)));
        assert_eq!(sizes.measure(&task).height, 90.0);
        sizes.forget("2");
        assert_eq!(sizes.measure(&task), estimate);
    }

    #[test]
    fn bounds_cover_nodes_and_tasks() {
        let config = LayoutConfig::default();
        let measure = fixed(40.0);
        let layout = SlotLayout::new(&config, &measure);
        let mut store = store_with_tasks(2);
        layout.reposition_all(&mut store);
        let bounds = layout.content_bounds(&store).unwrap();
        assert_eq!(bounds.min_x, 100.0);
        assert_eq!(bounds.min_y, 100.0);
        assert_eq!(bounds.max_x, 100.0 + config.node_width);
        assert_eq!(bounds.max_y, 180.0 + 50.0 + 40.0);
    }
}
