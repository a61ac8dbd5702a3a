use crate::identity::Identity;
use crate::ir::{ChartVariant, Item};

/// A materialized item: a root, or a child of an expanded visible item.
#[derive(Debug, Clone)]
pub struct NodeLayout<'a> {
    pub id: Identity,
    pub item: &'a Item,
    pub parent: Option<Identity>,
    /// Top-left corner of the card.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Roots are depth 1.
    pub depth: usize,
    pub sibling_index: usize,
    pub has_children: bool,
    pub is_expanded: bool,
    pub child_count: usize,
    pub color: String,
}

impl NodeLayout<'_> {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLayout {
    pub id: String,
    pub from: Identity,
    pub to: Identity,
    /// Accent color of the parent card.
    pub color: String,
    pub stroke_width: f32,
    pub points: Vec<(f32, f32)>,
}

#[derive(Debug, Clone)]
pub struct Layout<'a> {
    pub variant: ChartVariant,
    pub nodes: Vec<NodeLayout<'a>>,
    pub edges: Vec<EdgeLayout>,
    /// Items not drawn because an earlier item already claimed their identity.
    pub skipped: Vec<Identity>,
    pub min_x: f32,
    pub min_y: f32,
    pub width: f32,
    pub height: f32,
}

impl<'a> Layout<'a> {
    pub fn empty(variant: ChartVariant) -> Self {
        Self {
            variant,
            nodes: Vec::new(),
            edges: Vec::new(),
            skipped: Vec::new(),
            min_x: 0.0,
            min_y: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&NodeLayout<'a>> {
        self.nodes.iter().find(|node| node.id.as_str() == id)
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&EdgeLayout> {
        self.edges
            .iter()
            .find(|edge| edge.from.as_str() == from && edge.to.as_str() == to)
    }
}
