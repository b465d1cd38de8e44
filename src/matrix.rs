//! Eisenhower matrix view over task urgency and importance tags.

use std::collections::BTreeMap;

use crate::ir::{Tag, TagCategory, Task};
use crate::store::GraphStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quadrant {
    UrgentImportant,
    UrgentNotImportant,
    NotUrgentImportant,
    NotUrgentNotImportant,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Self::UrgentImportant,
        Self::UrgentNotImportant,
        Self::NotUrgentImportant,
        Self::NotUrgentNotImportant,
    ];

    pub fn new(urgent: bool, important: bool) -> Self {
        match (urgent, important) {
            (true, true) => Self::UrgentImportant,
            (true, false) => Self::UrgentNotImportant,
            (false, true) => Self::NotUrgentImportant,
            (false, false) => Self::NotUrgentNotImportant,
        }
    }

    pub fn of(task: &Task) -> Self {
        let urgent = task
            .tag(&TagCategory::Urgency)
            .is_some_and(|tag| matches!(tag.option.as_str(), "urgent" | "high" | "critical"));
        let important = task
            .tag(&TagCategory::Importance)
            .is_some_and(|tag| matches!(tag.option.as_str(), "important" | "high" | "critical"));
        Self::new(urgent, important)
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|q| q.as_str() == token)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UrgentImportant => "urgent-important",
            Self::UrgentNotImportant => "urgent-not-important",
            Self::NotUrgentImportant => "not-urgent-important",
            Self::NotUrgentNotImportant => "not-urgent-not-important",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::UrgentImportant => "Do first",
            Self::UrgentNotImportant => "Delegate",
            Self::NotUrgentImportant => "Schedule",
            Self::NotUrgentNotImportant => "Eliminate",
        }
    }

    pub fn is_urgent(self) -> bool {
        matches!(self, Self::UrgentImportant | Self::UrgentNotImportant)
    }

    pub fn is_important(self) -> bool {
        matches!(self, Self::UrgentImportant | Self::NotUrgentImportant)
    }

    /// The urgency and importance tags that place a task here.
    pub fn tags(self) -> [Tag; 2] {
        let urgency = if self.is_urgent() { "urgent" } else { "not-urgent" };
        let importance = if self.is_important() {
            "important"
        } else {
            "not-important"
        };
        [
            Tag::new(TagCategory::Urgency, urgency),
            Tag::new(TagCategory::Importance, importance),
        ]
    }
}

/// Task ids grouped by quadrant, each group in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EisenhowerMatrix {
    quadrants: BTreeMap<Quadrant, Vec<String>>,
}

impl EisenhowerMatrix {
    pub fn from_store(store: &GraphStore) -> Self {
        let mut quadrants: BTreeMap<Quadrant, Vec<String>> =
            Quadrant::ALL.into_iter().map(|q| (q, Vec::new())).collect();
        for task in store.tasks() {
            quadrants
                .entry(Quadrant::of(task))
                .or_default()
                .push(task.id.clone());
        }
        Self { quadrants }
    }

    pub fn tasks(&self, quadrant: Quadrant) -> &[String] {
        self.quadrants
            .get(&quadrant)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Quadrant, &[String])> {
        self.quadrants.iter().map(|(q, ids)| (*q, ids.as_slice()))
    }

    /// One line per quadrant, naming each task by its text.
    pub fn describe(&self, store: &GraphStore) -> String {
        let mut out = String::new();
        for (quadrant, ids) in self.iter() {
            let names: Vec<&str> = ids
                .iter()
                .filter_map(|id| store.task(id).map(|task| task.text.as_str()))
                .collect();
            out.push_str(&format!(
                "{} ({}): {}\n",
                quadrant.as_str(),
                quadrant.label(),
                if names.is_empty() {
                    "-".to_string()
                } else {
                    names.join(", ")
                }
            ));
        }
        out
    }
}
