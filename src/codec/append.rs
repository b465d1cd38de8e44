use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::DocumentError;
use crate::ir::{Entity, Flowline, Opportunity};
use crate::layout::SlotLayout;
use crate::store::{GraphStore, id_number};

use super::{IMPORTED_START_TEXT, decode, parse_document, retitle_extra_starts};

/// Outcome of merging a document into a live canvas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppendReport {
    /// Every incoming id and the id it was stored under.
    pub id_map: BTreeMap<String, String>,
    pub nodes_added: usize,
    pub tasks_added: usize,
    pub flowlines_added: usize,
    /// Horizontal shift applied to the incoming entities.
    pub offset_x: f32,
    /// Stored ids of incoming Start nodes, retitled so the live Start stays
    /// the only one.
    pub retitled_starts: Vec<String>,
    pub warnings: Vec<String>,
}

impl AppendReport {
    /// Incoming ids that had to be renamed.
    pub fn renamed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.id_map
            .iter()
            .filter(|(old, new)| old != new)
            .map(|(old, new)| (old.as_str(), new.as_str()))
    }
}

/// Merges `input` into `store` without touching existing entities. The id
/// mapping, offsets and repairs are planned in full before the first insert.
pub fn append(
    store: &mut GraphStore,
    layout: &SlotLayout<'_>,
    input: &str,
) -> Result<AppendReport, DocumentError> {
    let mut decoded = decode(parse_document(input)?)?;
    let mut report = AppendReport::default();

    // Plan ids.
    let incoming_ids: HashSet<String> = decoded
        .entities
        .iter()
        .map(|(entity, _)| entity.id().to_string())
        .collect();
    let mut taken: HashSet<String> = store.entities().map(|e| e.id().to_string()).collect();
    taken.extend(incoming_ids.iter().cloned());
    let mut running = taken
        .iter()
        .filter_map(|id| id_number(id))
        .chain([store.node_counter(), decoded.node_counter])
        .max()
        .unwrap_or(0);
    for (entity, _) in &decoded.entities {
        let old = entity.id().to_string();
        let new = if store.contains(&old) {
            loop {
                running += 1;
                let candidate = format!("node_{running}");
                if !taken.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            old.clone()
        };
        taken.insert(new.clone());
        report.id_map.insert(old, new);
    }

    let incoming_nodes: HashSet<String> = decoded
        .entities
        .iter()
        .filter(|(entity, _)| !entity.is_task())
        .map(|(entity, _)| entity.id().to_string())
        .collect();
    let existing_max_x = layout
        .content_bounds(store)
        .map(|bounds| bounds.max_x)
        .unwrap_or(0.0);
    report.offset_x = existing_max_x + layout.config().append_gap;

    let opportunity_map = plan_opportunities(store, &decoded.opportunities);

    for old in retitle_extra_starts(decoded.entities.iter_mut().map(|(entity, _)| entity), false) {
        let new = report.id_map[&old].clone();
        let message = format!("appended Start '{old}' stored as '{new}' and retitled '{IMPORTED_START_TEXT}'");
        tracing::warn!("{message}");
        report.warnings.push(message);
        report.retitled_starts.push(new);
    }

    // Rewrite the incoming entities against the plan.
    let start = store.start_id().to_string();
    let mut nodes = Vec::new();
    let mut tasks = Vec::new();
    for (mut entity, slot) in decoded.entities {
        let new_id = report.id_map[entity.id()].clone();
        match &mut entity {
            Entity::Node(node) => {
                node.id = new_id;
                node.position = node.position.translate(report.offset_x, 0.0);
            }
            Entity::Task(task) => {
                if incoming_nodes.contains(task.anchored_to.as_str()) {
                    task.anchored_to = report.id_map[&task.anchored_to].clone();
                } else {
                    let message = format!(
                        "appended task '{}' referenced missing node '{}'; anchored to Start",
                        task.id, task.anchored_to
                    );
                    tracing::warn!("{message}");
                    report.warnings.push(message);
                    task.anchored_to = start.clone();
                }
                task.previous_anchor = task
                    .previous_anchor
                    .as_ref()
                    .filter(|prev| incoming_nodes.contains(prev.as_str()))
                    .map(|prev| report.id_map[prev].clone());
                if let Some(opp) = task.details.opportunity_id.as_mut()
                    && let Some(renamed) = opportunity_map.get(opp.as_str())
                {
                    *opp = renamed.clone();
                }
                task.id = new_id;
            }
        }
        if entity.is_task() {
            tasks.push((entity, slot));
        } else {
            nodes.push(entity);
        }
    }

    let mut flowlines = Vec::new();
    for line in decoded.flowlines {
        if incoming_nodes.contains(line.source.as_str())
            && incoming_nodes.contains(line.target.as_str())
        {
            flowlines.push(Flowline::new(
                report.id_map[&line.source].clone(),
                report.id_map[&line.target].clone(),
                line.kind,
            ));
        } else {
            let message = format!(
                "dropped appended flowline '{}' -> '{}'",
                line.source, line.target
            );
            tracing::warn!("{message}");
            report.warnings.push(message);
        }
    }

    // Tasks keep their relative order within each anchor.
    tasks.sort_by_key(|(entity, slot)| {
        let anchor = entity.as_task().map(|t| t.anchored_to.clone()).unwrap_or_default();
        (anchor, slot.unwrap_or(usize::MAX))
    });

    // Apply.
    store.bump_counter(running);
    report.nodes_added = nodes.len();
    for node in nodes {
        store.insert(node);
    }
    report.flowlines_added = flowlines.len();
    store.flowlines_mut().extend(flowlines);
    for opp in decoded.opportunities {
        let id = opportunity_map.get(&opp.id).cloned().unwrap_or_else(|| opp.id.clone());
        store.opportunities.push(Opportunity { id, ..opp });
    }
    if store.relationships.is_none() {
        store.relationships = decoded.relationships;
    } else if decoded.relationships.is_some() {
        let message = "appended relationships dropped; the canvas keeps its own".to_string();
        tracing::warn!("{message}");
        report.warnings.push(message);
    }

    let mut anchors = BTreeSet::new();
    report.tasks_added = tasks.len();
    for (entity, _) in tasks {
        let id = entity.id().to_string();
        if let Some(task) = entity.as_task() {
            anchors.insert(task.anchored_to.clone());
        }
        store.insert(entity);
        layout.assign_slot(store, &id);
    }
    for anchor in anchors {
        layout.reposition_anchor(store, &anchor);
    }

    tracing::info!(
        nodes = report.nodes_added,
        tasks = report.tasks_added,
        flowlines = report.flowlines_added,
        renamed = report.renamed().count(),
        "appended workflow"
    );
    Ok(report)
}

/// New ids for incoming opportunities whose id is already in use.
fn plan_opportunities(store: &GraphStore, incoming: &[Opportunity]) -> BTreeMap<String, String> {
    let mut taken: HashSet<String> = store.opportunities.iter().map(|o| o.id.clone()).collect();
    taken.extend(incoming.iter().map(|o| o.id.clone()));
    let mut renames = BTreeMap::new();
    for opp in incoming {
        if store.opportunity(&opp.id).is_none() {
            continue;
        }
        let mut suffix = 2;
        let renamed = loop {
            let candidate = format!("{}_{suffix}", opp.id);
            if !taken.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        taken.insert(renamed.clone());
        renames.insert(opp.id.clone(), renamed);
    }
    renames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;

    const SMALL: &str = r#"{
        "version": "2.0.0",
        "nodeCounter": 3,
        "nodes": [
            {"id": "1", "type": "terminal", "text": "Start", "left": 100, "top": 100},
            {"id": "2", "type": "process", "text": "Pack", "left": 300, "top": 100},
            {"id": "3", "type": "task", "text": "Box it", "left": 0, "top": 0,
             "anchoredTo": "2", "previousAnchor": "1", "slot": 0, "isTaskNode": true,
             "opportunityId": "opp-1"}
        ],
        "flowlines": [{"sourceId": "1", "targetId": "2", "type": "straight"}],
        "settings": {"flowlineType": "straight"},
        "opportunities": [{"id": "opp-1", "title": "Acme"}]
    }"#;

    #[test]
    fn colliding_ids_are_renamed_and_references_follow() {
        let mut canvas = Canvas::new();
        canvas.load_json(SMALL).unwrap();
        let report = canvas.append_json(SMALL).unwrap();

        assert_eq!(report.id_map["1"], "node_4");
        assert_eq!(report.id_map["2"], "node_5");
        assert_eq!(report.id_map["3"], "node_6");
        let task = canvas.store().task("node_6").unwrap();
        assert_eq!(task.anchored_to, "node_5");
        assert_eq!(task.previous_anchor.as_deref(), Some("node_4"));
        assert_eq!(task.details.opportunity_id.as_deref(), Some("opp-1_2"));
        assert!(canvas.store().find_flowline("node_4", "node_5").is_some());
        assert_eq!(canvas.store().start_id(), "1");
        assert_eq!(canvas.store().len(), 6);

        assert_eq!(report.retitled_starts, vec!["node_4".to_string()]);
        assert_eq!(canvas.store().node("node_4").unwrap().text, IMPORTED_START_TEXT);
        assert_eq!(canvas.store().nodes().filter(|node| node.is_start()).count(), 1);
    }

    #[test]
    fn incoming_relationships_never_replace_live_ones() {
        let with_relationships = |owner: &str| {
            SMALL.replacen(
                r#""opportunities""#,
                &format!(r#""relationships": {{"owner": "{owner}"}}, "opportunities""#),
                1,
            )
        };
        let mut canvas = Canvas::new();
        canvas.load_json(&with_relationships("live")).unwrap();
        let report = canvas.append_json(&with_relationships("incoming")).unwrap();

        assert_eq!(
            canvas.store().relationships,
            Some(serde_json::json!({"owner": "live"}))
        );
        assert!(
            report.warnings.iter().any(|w| w.contains("relationships")),
            "{:?}",
            report.warnings
        );
    }

    #[test]
    fn failed_append_changes_nothing() {
        let mut canvas = Canvas::new();
        canvas.load_json(SMALL).unwrap();
        let before = canvas.store().clone();
        assert!(canvas.append_json(r#"{"version": "3.0"}"#).is_err());
        assert_eq!(canvas.store(), &before);
    }
}
