use serde::Serialize;
use std::collections::BTreeSet;

use crate::ir::{ChartVariant, Item};
use crate::layout::Layout;

/// Host-supplied search term and classification filter.
///
/// Filters never hide nodes; matching visible nodes are highlighted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub term: Option<String>,
    pub level: Option<String>,
}

impl Filters {
    pub fn is_active(&self) -> bool {
        self.term.is_some() || self.level.is_some()
    }

    pub fn set_term(&mut self, term: &str) {
        let term = term.trim();
        self.term = (!term.is_empty()).then(|| term.to_string());
    }

    pub fn set_level(&mut self, level: &str) {
        let level = level.trim();
        self.level = (!level.is_empty()).then(|| level.to_string());
    }

    pub fn clear(&mut self) {
        self.term = None;
        self.level = None;
    }

    /// Case-insensitive substring match over name, position, level and code;
    /// the level filter must match exactly.
    pub fn matches(&self, item: &Item, variant: ChartVariant) -> bool {
        if !self.is_active() {
            return false;
        }
        let level = item.level(variant);
        if let Some(wanted) = &self.level
            && level.as_deref() != Some(wanted.as_str())
        {
            return false;
        }
        let Some(term) = &self.term else {
            return true;
        };
        let needle = term.to_lowercase();
        let haystack = [
            Some(item.name().to_string()),
            item.text("position"),
            level,
            item.semantic_key(variant),
        ];
        haystack
            .iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub visible_items: usize,
    pub total_items: usize,
    /// Distinct classification labels among visible items.
    pub distinct_levels: usize,
    /// Visible items matching the active filters.
    pub matches: usize,
    pub initialized: bool,
}

impl Stats {
    pub fn collect(
        layout: &Layout<'_>,
        total_items: usize,
        filters: &Filters,
        initialized: bool,
    ) -> Self {
        let levels: BTreeSet<String> = layout
            .nodes
            .iter()
            .filter_map(|node| node.item.level(layout.variant))
            .collect();
        let matches = layout
            .nodes
            .iter()
            .filter(|node| filters.matches(node.item, layout.variant))
            .count();
        Self {
            visible_items: layout.nodes.len(),
            total_items,
            distinct_levels: levels.len(),
            matches,
            initialized,
        }
    }
}
