//! Hierarchical placement of the visible part of a forest.
//!
//! Placement is depth-first: every root gets a slot in a centered row, every
//! disclosed child is placed relative to its parent, and a per-depth placer
//! keeps cards from landing on top of each other. The result depends only on
//! the forest, the expansion set and the configuration; all scratch state is
//! created per call.

mod occupancy;
pub(crate) mod types;
pub use types::*;

use log::{debug, warn};
use std::collections::HashSet;

use crate::config::LayoutConfig;
use crate::expansion::ExpansionSet;
use crate::identity::Identity;
use crate::ir::{ChartVariant, Forest, Item};
use crate::theme::Theme;
use occupancy::Placer;

pub fn compute_layout<'a>(
    forest: &'a Forest,
    expansion: &ExpansionSet,
    theme: &Theme,
    config: &LayoutConfig,
) -> Layout<'a> {
    if forest.is_empty() {
        return Layout::empty(forest.variant);
    }

    let mut state = LayoutState {
        variant: forest.variant,
        expansion,
        theme,
        config,
        placer: Placer::new(config),
        placed: HashSet::new(),
        layout: Layout::empty(forest.variant),
    };

    let root_count = forest.roots.len();
    for (idx, root) in forest.roots.iter().enumerate() {
        let x = centered_offset(idx, root_count) * config.root_spacing;
        state.visit(root, 1, x, None, idx);
    }

    let mut layout = state.layout;
    update_bounds(&mut layout);
    debug!(
        "laid out {} nodes and {} edges ({} open)",
        layout.nodes.len(),
        layout.edges.len(),
        expansion.len()
    );
    layout
}

/// Offset of slot `idx` in a row of `count` slots centered on zero, in slot
/// units.
fn centered_offset(idx: usize, count: usize) -> f32 {
    idx as f32 - (count as f32 - 1.0) / 2.0
}

fn depth_y(depth: usize, config: &LayoutConfig) -> f32 {
    let spacing = config.vertical_spacing + depth as f32 * config.vertical_growth;
    (depth as f32 - 1.0) * spacing
}

/// Lone children sit slightly off their parent's axis, alternating sides by
/// depth, so long single-report chains do not stack on one line.
fn single_child_jitter(depth: usize, config: &LayoutConfig) -> f32 {
    if depth.is_multiple_of(2) {
        config.single_child_offset
    } else {
        -config.single_child_offset
    }
}

struct ParentRef<'p> {
    id: &'p Identity,
    color: &'p str,
    anchor: (f32, f32),
}

struct LayoutState<'a, 'c> {
    variant: ChartVariant,
    expansion: &'c ExpansionSet,
    theme: &'c Theme,
    config: &'c LayoutConfig,
    placer: Placer,
    placed: HashSet<Identity>,
    layout: Layout<'a>,
}

impl<'a> LayoutState<'a, '_> {
    fn visit(
        &mut self,
        item: &'a Item,
        depth: usize,
        preferred_x: f32,
        parent: Option<ParentRef<'_>>,
        sibling_index: usize,
    ) {
        if !self.placed.insert(item.identity.clone()) {
            warn!("`{}` already placed; skipping duplicate", item.identity);
            self.layout.skipped.push(item.identity.clone());
            return;
        }

        let config = self.config;
        let preferred = (preferred_x, depth_y(depth, config));
        let (x, y) = self.placer.place(depth, preferred);
        let is_expanded = self.expansion.contains(&item.identity);
        let color = self.theme.accent_color(item, depth, self.variant);

        if let Some(parent) = &parent {
            let (from_x, from_y) = parent.anchor;
            self.layout.edges.push(EdgeLayout {
                id: format!("edge-{}-{}", parent.id, item.identity),
                from: parent.id.clone(),
                to: item.identity.clone(),
                color: parent.color.to_string(),
                stroke_width: config.edge_stroke_width,
                points: vec![(from_x, from_y), (x + config.card_width / 2.0, y)],
            });
        }

        self.layout.nodes.push(NodeLayout {
            id: item.identity.clone(),
            item,
            parent: parent.as_ref().map(|parent| parent.id.clone()),
            x,
            y,
            width: config.card_width,
            height: config.card_height,
            depth,
            sibling_index,
            has_children: item.has_children(),
            is_expanded,
            child_count: item.children.len(),
            color: color.clone(),
        });

        if !is_expanded || !item.has_children() {
            return;
        }

        let anchor = (x + config.card_width / 2.0, y + config.card_height);
        let child_depth = depth + 1;
        let count = item.children.len();
        for (idx, child) in item.children.iter().enumerate() {
            let child_x = if count == 1 {
                x + single_child_jitter(child_depth, config)
            } else {
                x + centered_offset(idx, count) * config.sibling_spacing()
            };
            self.visit(
                child,
                child_depth,
                child_x,
                Some(ParentRef {
                    id: &item.identity,
                    color: &color,
                    anchor,
                }),
                idx,
            );
        }
    }
}

fn update_bounds(layout: &mut Layout<'_>) {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for node in &layout.nodes {
        min_x = min_x.min(node.x);
        min_y = min_y.min(node.y);
        max_x = max_x.max(node.x + node.width);
        max_y = max_y.max(node.y + node.height);
    }
    if min_x == f32::MAX {
        return;
    }
    layout.min_x = min_x;
    layout.min_y = min_y;
    layout.width = (max_x - min_x).max(1.0);
    layout.height = (max_y - min_y).max(1.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlapStrategy;
    use crate::identity::IdentityStrategy;
    use serde_json::{Value, json};

    fn forest(value: Value) -> Forest {
        Forest::from_value(&value, ChartVariant::OrgChart, IdentityStrategy::Path).unwrap()
    }

    fn abcd() -> Forest {
        forest(json!({
            "name": "A",
            "children": [{"name": "B", "children": [{"name": "D"}]}, {"name": "C"}]
        }))
    }

    fn ids(values: &[&str]) -> Vec<Identity> {
        values.iter().map(|value| Identity::from(*value)).collect()
    }

    fn run<'a>(forest: &'a Forest, expansion: &ExpansionSet) -> Layout<'a> {
        compute_layout(forest, expansion, &Theme::classic(), &LayoutConfig::default())
    }

    fn edge_pairs(layout: &Layout<'_>) -> Vec<(String, String)> {
        layout
            .edges
            .iter()
            .map(|edge| (edge.from.to_string(), edge.to.to_string()))
            .collect()
    }

    #[test]
    fn disclosure_walkthrough() {
        let forest = abcd();
        let mut open = ExpansionSet::new();

        let layout = run(&forest, &open);
        assert_eq!(layout.nodes.len(), 1);
        assert!(layout.edges.is_empty());

        open.toggle(&Identity::from("root-A-0"));
        let layout = run(&forest, &open);
        assert_eq!(layout.nodes.len(), 3);
        assert_eq!(
            edge_pairs(&layout),
            vec![
                ("root-A-0".to_string(), "root-A-0-B-0".to_string()),
                ("root-A-0".to_string(), "root-A-0-C-1".to_string()),
            ]
        );

        open.toggle(&Identity::from("root-A-0-B-0"));
        let layout = run(&forest, &open);
        assert_eq!(layout.nodes.len(), 4);
        assert_eq!(layout.edges.len(), 3);
        assert!(layout.edge("root-A-0-B-0", "root-A-0-B-0-D-0").is_some());
    }

    #[test]
    fn expanding_a_leaf_changes_nothing() {
        let forest = abcd();
        let partial: ExpansionSet = ids(&["root-A-0", "root-A-0-B-0"]).into_iter().collect();
        let mut all = ExpansionSet::new();
        all.expand_all(&forest);
        assert_eq!(all.len(), 4);

        let before = run(&forest, &partial);
        let after = run(&forest, &all);
        assert_eq!(after.nodes.len(), 4);
        assert_eq!(after.edges, before.edges);
        for (left, right) in before.nodes.iter().zip(&after.nodes) {
            assert_eq!((left.x, left.y), (right.x, right.y));
        }
    }

    #[test]
    fn layout_is_idempotent() {
        let forest = forest(json!([
            {"name": "R1", "children": [{"name": "A"}, {"name": "B"}, {"name": "C"}]},
            {"name": "R2", "children": [{"name": "D"}, {"name": "E"}, {"name": "F"}]}
        ]));
        let mut open = ExpansionSet::new();
        open.expand_all(&forest);
        let first = run(&forest, &open);
        let second = run(&forest, &open);
        assert_eq!(first.edges, second.edges);
        let positions = |layout: &Layout<'_>| -> Vec<(String, f32, f32)> {
            layout
                .nodes
                .iter()
                .map(|node| (node.id.to_string(), node.x, node.y))
                .collect()
        };
        assert_eq!(positions(&first), positions(&second));
    }

    #[test]
    fn expand_all_and_collapse_all_counts() {
        let forest = forest(json!([
            {"name": "R1", "children": [{"name": "A", "children": [{"name": "A1"}]}]},
            {"name": "R2"},
            {"name": "R3", "children": [{"name": "B"}]}
        ]));
        let mut open = ExpansionSet::new();
        open.expand_all(&forest);
        assert_eq!(run(&forest, &open).nodes.len(), forest.len());
        open.collapse_all();
        assert_eq!(run(&forest, &open).nodes.len(), forest.roots.len());
    }

    #[test]
    fn roots_are_centered_as_a_group() {
        let forest = forest(json!([{"name": "A"}, {"name": "B"}, {"name": "C"}]));
        let layout = run(&forest, &ExpansionSet::new());
        let xs: Vec<f32> = layout.nodes.iter().map(|node| node.x).collect();
        assert_eq!(xs, vec![-530.0, 0.0, 530.0]);
        assert!(layout.nodes.iter().all(|node| node.y == 0.0));
    }

    #[test]
    fn siblings_spread_around_parent_and_lone_child_is_jittered() {
        let forest = forest(json!({
            "name": "A",
            "children": [
                {"name": "B", "children": [{"name": "D"}]},
                {"name": "C"}
            ]
        }));
        let mut open = ExpansionSet::new();
        open.expand_all(&forest);
        let layout = run(&forest, &open);

        let b = layout.node("root-A-0-B-0").unwrap();
        let c = layout.node("root-A-0-C-1").unwrap();
        assert_eq!(b.x, -265.0);
        assert_eq!(c.x, 265.0);
        assert_eq!(b.y, 400.0);

        let d = layout.node("root-A-0-B-0-D-0").unwrap();
        assert_eq!(d.x, b.x - 50.0);
        assert_eq!(d.y, 900.0);
        assert_eq!(d.parent.as_ref().map(Identity::as_str), Some("root-A-0-B-0"));
    }

    #[test]
    fn grid_strategy_keeps_cousins_apart() {
        let forest = forest(json!({
            "name": "A",
            "children": [
                {"name": "B", "children": [{"name": "B1"}, {"name": "B2"}, {"name": "B3"}]},
                {"name": "C", "children": [{"name": "C1"}, {"name": "C2"}, {"name": "C3"}]}
            ]
        }));
        let mut open = ExpansionSet::new();
        open.expand_all(&forest);
        let config = LayoutConfig::default();
        let layout = compute_layout(&forest, &open, &Theme::classic(), &config);
        assert_eq!(layout.nodes.len(), 9);
        for (i, left) in layout.nodes.iter().enumerate() {
            for right in layout.nodes.iter().skip(i + 1) {
                let overlap_x = (left.x - right.x).abs() < config.card_width;
                let overlap_y = (left.y - right.y).abs() < config.card_height;
                assert!(
                    !(overlap_x && overlap_y),
                    "{} overlaps {}",
                    left.id,
                    right.id
                );
            }
        }
    }

    #[test]
    fn shift_strategy_respects_min_distance() {
        let forest = forest(json!({
            "name": "A",
            "children": [
                {"name": "B", "children": [{"name": "B1"}, {"name": "B2"}]},
                {"name": "C", "children": [{"name": "C1"}, {"name": "C2"}]}
            ]
        }));
        let mut open = ExpansionSet::new();
        open.expand_all(&forest);
        let config = LayoutConfig {
            overlap: OverlapStrategy::Shift,
            group_separation: 0.0,
            ..LayoutConfig::default()
        };
        let layout = compute_layout(&forest, &open, &Theme::classic(), &config);
        let row: Vec<f32> = layout
            .nodes
            .iter()
            .filter(|node| node.depth == 3)
            .map(|node| node.x)
            .collect();
        assert_eq!(row.len(), 4);
        for (i, left) in row.iter().enumerate() {
            for right in row.iter().skip(i + 1) {
                assert!((left - right).abs() >= config.shift_min_distance);
            }
        }
    }

    #[test]
    fn edges_take_the_parent_color() {
        let forest = abcd();
        let mut open = ExpansionSet::new();
        open.expand_all(&forest);
        let layout = run(&forest, &open);
        let root = layout.node("root-A-0").unwrap();
        let b = layout.node("root-A-0-B-0").unwrap();
        assert_eq!(layout.edge("root-A-0", "root-A-0-B-0").unwrap().color, root.color);
        assert_eq!(
            layout.edge("root-A-0-B-0", "root-A-0-B-0-D-0").unwrap().color,
            b.color
        );
        assert_ne!(root.color, b.color);
    }

    #[test]
    fn empty_forest_yields_empty_layout() {
        let forest = Forest::empty(ChartVariant::OrgChart, IdentityStrategy::Path);
        let layout = run(&forest, &ExpansionSet::new());
        assert!(layout.is_empty());
        assert!(layout.edges.is_empty());
        assert_eq!(layout.width, 0.0);
    }

    #[test]
    fn duplicate_semantic_identities_are_drawn_once() {
        let forest = Forest::from_value(
            &json!({
                "name": "A", "job_title_code": 1,
                "children": [
                    {"name": "B", "job_title_code": 7},
                    {"name": "C", "job_title_code": 7}
                ]
            }),
            ChartVariant::OrgChart,
            IdentityStrategy::Semantic,
        )
        .unwrap();
        let open: ExpansionSet = ids(&["1"]).into_iter().collect();
        let layout = run(&forest, &open);
        assert_eq!(layout.nodes.len(), 2);
        assert_eq!(layout.edges.len(), 1);
        assert_eq!(layout.skipped, ids(&["7"]));
    }

    #[test]
    fn collapsed_subtrees_are_not_materialized() {
        let forest = abcd();
        let open: ExpansionSet = ids(&["root-A-0-B-0"]).into_iter().collect();
        let layout = run(&forest, &open);
        assert_eq!(layout.nodes.len(), 1);
        assert!(layout.node("root-A-0-B-0-D-0").is_none());
        assert!(layout.nodes[0].has_children);
        assert!(!layout.nodes[0].is_expanded);
    }
}
