use crate::expansion::ExpansionSet;
use crate::ir::ChartVariant;
use crate::layout::Layout;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub chart_type: ChartVariant,
    pub min_x: f32,
    pub min_y: f32,
    pub width: f32,
    pub height: f32,
    pub expanded: Vec<String>,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub name: String,
    pub parent: Option<String>,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: String,
    pub has_children: bool,
    pub is_expanded: bool,
    pub child_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub id: String,
    pub from: String,
    pub to: String,
    pub color: String,
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout<'_>, expansion: &ExpansionSet) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.to_string(),
                name: node.item.name().to_string(),
                parent: node.parent.as_ref().map(ToString::to_string),
                depth: node.depth,
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
                color: node.color.clone(),
                has_children: node.has_children,
                is_expanded: node.is_expanded,
                child_count: node.child_count,
            })
            .collect();

        let edges = layout
            .edges
            .iter()
            .map(|edge| EdgeDump {
                id: edge.id.clone(),
                from: edge.from.to_string(),
                to: edge.to.to_string(),
                color: edge.color.clone(),
                points: edge.points.iter().map(|(x, y)| [*x, *y]).collect(),
            })
            .collect();

        LayoutDump {
            chart_type: layout.variant,
            min_x: layout.min_x,
            min_y: layout.min_y,
            width: layout.width,
            height: layout.height,
            expanded: expansion.iter().map(ToString::to_string).collect(),
            nodes,
            edges,
            skipped: layout.skipped.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Writes any serializable value as pretty JSON to `path`, or stdout.
pub fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, value)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, value)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

pub fn write_layout_dump(
    path: Option<&Path>,
    layout: &Layout<'_>,
    expansion: &ExpansionSet,
) -> anyhow::Result<()> {
    write_json(&LayoutDump::from_layout(layout, expansion), path)
}
