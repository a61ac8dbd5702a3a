use crate::config::{LayoutConfig, RenderConfig};
use crate::ir::{ChartVariant, Item};
use crate::layout::{Layout, NodeLayout};
use crate::search::Filters;
use crate::theme::Theme;
use crate::viewport::FitViewOptions;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Capabilities a drawing library exposes to the chart.
pub trait RenderSurface {
    /// Replaces the drawn nodes and edges.
    fn apply(&mut self, drawing: &Drawing);
    fn fit_view(&mut self, options: &FitViewOptions);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    pub name: String,
    pub position: Option<String>,
    pub code: Option<String>,
    pub level: Option<String>,
}

impl DisplayInfo {
    pub fn for_item(item: &Item, variant: ChartVariant) -> Self {
        match variant {
            ChartVariant::OrgChart => Self {
                name: item.name().to_string(),
                position: item.text("position"),
                code: item
                    .text("job_title_code")
                    .or_else(|| item.text("jobTitleCode")),
                level: item.level(variant),
            },
            ChartVariant::CompanyChart => {
                let kind = item.text("type");
                let position = kind.as_deref().map(|kind| match kind {
                    "company" => format!(
                        "{} employees",
                        item.text("number_employees").unwrap_or_else(|| "0".to_string())
                    ),
                    "branch" => format!(
                        "Location: {}",
                        item.text("location").unwrap_or_default()
                    ),
                    "department" => "Department".to_string(),
                    "section" => "Section".to_string(),
                    "job_title" => format!("Level: {}", item.text("level").unwrap_or_default()),
                    other => other.to_string(),
                });
                Self {
                    name: item.name().to_string(),
                    position,
                    code: item.text("code").or_else(|| item.text("id")),
                    level: kind,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub item: Value,
    pub display: DisplayInfo,
    pub chart_type: ChartVariant,
    pub has_children: bool,
    pub is_expanded: bool,
    pub child_count: usize,
    pub depth: usize,
    pub level_border_color: String,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawableNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub position: Position,
    pub data: NodeData,
    pub draggable: bool,
    pub selectable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStroke {
    pub stroke: String,
    pub stroke_width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeMarker {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub width: f32,
    pub height: f32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawableEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub animated: bool,
    pub style: EdgeStroke,
    pub marker_end: EdgeMarker,
}

/// Node and edge records in the shape a JS graph library consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Drawing {
    pub nodes: Vec<DrawableNode>,
    pub edges: Vec<DrawableEdge>,
}

impl Drawing {
    pub fn from_layout(layout: &Layout<'_>, filters: &Filters, config: &LayoutConfig) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .map(|node| drawable_node(node, layout.variant, filters))
            .collect();
        let edges = layout
            .edges
            .iter()
            .map(|edge| DrawableEdge {
                id: edge.id.clone(),
                source: edge.from.to_string(),
                target: edge.to.to_string(),
                kind: "smoothstep",
                animated: false,
                style: EdgeStroke {
                    stroke: edge.color.clone(),
                    stroke_width: edge.stroke_width,
                },
                marker_end: EdgeMarker {
                    kind: "arrowclosed",
                    width: config.edge_marker_size,
                    height: config.edge_marker_size,
                    color: edge.color.clone(),
                },
            })
            .collect();
        Self { nodes, edges }
    }
}

fn drawable_node(node: &NodeLayout<'_>, variant: ChartVariant, filters: &Filters) -> DrawableNode {
    DrawableNode {
        id: node.id.to_string(),
        kind: "employee",
        position: Position {
            x: node.x,
            y: node.y,
        },
        data: NodeData {
            item: Value::Object(node.item.fields.clone()),
            display: DisplayInfo::for_item(node.item, variant),
            chart_type: variant,
            has_children: node.has_children,
            is_expanded: node.is_expanded,
            child_count: node.child_count,
            depth: node.depth,
            level_border_color: node.color.clone(),
            highlighted: filters.matches(node.item, variant),
        },
        draggable: false,
        selectable: false,
    }
}

/// Static SVG preview of a layout. Cards show name, position and code; an
/// expandable card carries a `+N` / `-` badge.
pub fn render_svg(layout: &Layout<'_>, theme: &Theme, config: &RenderConfig) -> String {
    let mut svg = String::new();
    let pad = config.padding;
    let width = (layout.width + pad * 2.0).max(200.0);
    let height = (layout.height + pad * 2.0).max(200.0);
    let ox = pad - layout.min_x;
    let oy = pad - layout.min_y;

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        config.background
    ));

    let mut markers: BTreeMap<&str, usize> = BTreeMap::new();
    for edge in &layout.edges {
        let next = markers.len();
        markers.entry(edge.color.as_str()).or_insert(next);
    }
    svg.push_str("<defs>");
    for (color, idx) in &markers {
        svg.push_str(&format!(
            "<marker id=\"arrow-{idx}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{color}\"/></marker>",
        ));
    }
    svg.push_str("</defs>");

    for edge in &layout.edges {
        let shifted: Vec<(f32, f32)> = edge
            .points
            .iter()
            .map(|(x, y)| (x + ox, y + oy))
            .collect();
        let marker = markers.get(edge.color.as_str()).copied().unwrap_or(0);
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" marker-end=\"url(#arrow-{marker})\"/>",
            step_path(&shifted),
            edge.color,
            edge.stroke_width
        ));
    }

    for node in &layout.nodes {
        svg.push_str(&card_svg(node, layout.variant, theme, ox, oy));
    }

    svg.push_str("</svg>");
    svg
}

fn card_svg(
    node: &NodeLayout<'_>,
    variant: ChartVariant,
    theme: &Theme,
    ox: f32,
    oy: f32,
) -> String {
    let x = node.x + ox;
    let y = node.y + oy;
    let cx = x + node.width / 2.0;
    let info = DisplayInfo::for_item(node.item, variant);
    let font = escape_xml(&theme.font_family);
    let mut out = format!(
        "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\"/>",
        node.width, node.height, theme.card_fill, node.color
    );
    let lines = [
        (Some(info.name), theme.font_size * 1.2, theme.card_text_color.as_str(), "bold"),
        (info.position, theme.font_size, node.color.as_str(), "normal"),
        (
            info.code.map(|code| format!("Code: {code}")),
            theme.font_size * 0.85,
            theme.card_muted_text_color.as_str(),
            "normal",
        ),
    ];
    let mut line_y = y + node.height * 0.3;
    for (text, size, fill, weight) in lines {
        if let Some(text) = text.filter(|text| !text.is_empty()) {
            out.push_str(&format!(
                "<text x=\"{cx:.2}\" y=\"{line_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{size}\" font-weight=\"{weight}\" fill=\"{fill}\">{}</text>",
                font,
                escape_xml(&text)
            ));
        }
        line_y += size * 1.5;
    }
    if node.has_children {
        let badge = if node.is_expanded {
            "-".to_string()
        } else {
            format!("+{}", node.child_count)
        };
        out.push_str(&format!(
            "<text x=\"{cx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            y + node.height - 8.0,
            font,
            theme.font_size * 0.85,
            node.color,
            badge
        ));
    }
    out
}

/// Orthogonal connector: down from the parent, across at mid height, down
/// into the child.
fn step_path(points: &[(f32, f32)]) -> String {
    let (Some(start), Some(end)) = (points.first(), points.last()) else {
        return String::new();
    };
    let mid_y = (start.1 + end.1) / 2.0;
    format!(
        "M {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2}",
        start.0, start.1, start.0, mid_y, end.0, mid_y, end.0, end.1
    )
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
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
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
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
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
    use crate::expansion::ExpansionSet;
    use crate::identity::IdentityStrategy;
    use crate::ir::Forest;
    use crate::layout::compute_layout;
    use quick_xml::Reader;
    use quick_xml::events::Event;
    use serde_json::json;

    /// Walks every element and attribute; returns the number of elements.
    fn parse_svg(svg: &str) -> usize {
        let mut reader = Reader::from_str(svg);
        let mut elements = 0;
        loop {
            match reader.read_event().expect("svg should be well-formed") {
                Event::Start(tag) | Event::Empty(tag) => {
                    elements += 1;
                    for attr in tag.attributes() {
                        attr.expect("attribute should be well-formed");
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        elements
    }

    fn forest() -> Forest {
        Forest::from_value(
            &json!({
                "name": "Sarah <CEO>",
                "position": "Chief Executive Officer",
                "job_title_code": 1,
                "level": "Executive",
                "children": [{"name": "Michael", "position": "CTO", "job_title_code": 2}]
            }),
            ChartVariant::OrgChart,
            IdentityStrategy::Path,
        )
        .unwrap()
    }

    #[test]
    fn drawing_matches_graph_library_shape() {
        let forest = forest();
        let mut open = ExpansionSet::new();
        open.expand_all(&forest);
        let config = LayoutConfig::default();
        let layout = compute_layout(&forest, &open, &Theme::classic(), &config);
        let mut filters = Filters::default();
        filters.set_term("cto");
        let drawing = Drawing::from_layout(&layout, &filters, &config);

        let value = serde_json::to_value(&drawing).unwrap();
        let root = &value["nodes"][0];
        assert_eq!(root["id"], "root-Sarah <CEO>-0");
        assert_eq!(root["type"], "employee");
        assert_eq!(root["data"]["hasChildren"], true);
        assert_eq!(root["data"]["chartType"], "orgChart");
        assert_eq!(root["data"]["display"]["code"], "1");
        assert_eq!(root["data"]["highlighted"], false);
        assert_eq!(value["nodes"][1]["data"]["highlighted"], true);

        let edge = &value["edges"][0];
        assert_eq!(edge["source"], "root-Sarah <CEO>-0");
        assert_eq!(edge["type"], "smoothstep");
        assert_eq!(edge["markerEnd"]["type"], "arrowclosed");
        assert_eq!(edge["style"]["stroke"], root["data"]["levelBorderColor"]);
    }

    #[test]
    fn company_positions_follow_entity_type() {
        let forest = Forest::from_value(
            &json!([
                {"name": "Acme", "type": "company", "number_employees": 120, "id": 1},
                {"name": "North", "type": "branch", "location": "Oslo", "code": "BR-1"},
                {"name": "Ops", "type": "team"}
            ]),
            ChartVariant::CompanyChart,
            IdentityStrategy::Path,
        )
        .unwrap();
        let info: Vec<DisplayInfo> = forest
            .roots
            .iter()
            .map(|item| DisplayInfo::for_item(item, ChartVariant::CompanyChart))
            .collect();
        assert_eq!(info[0].position.as_deref(), Some("120 employees"));
        assert_eq!(info[0].code.as_deref(), Some("1"));
        assert_eq!(info[1].position.as_deref(), Some("Location: Oslo"));
        assert_eq!(info[1].code.as_deref(), Some("BR-1"));
        assert_eq!(info[2].position.as_deref(), Some("team"));
    }

    #[test]
    fn render_svg_basic() {
        let forest = forest();
        let mut open = ExpansionSet::new();
        open.expand_all(&forest);
        let theme = Theme::classic();
        let layout = compute_layout(&forest, &open, &theme, &LayoutConfig::default());
        let svg = render_svg(&layout, &theme, &RenderConfig::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Sarah &lt;CEO&gt;"));
        assert!(svg.contains("marker-end=\"url(#arrow-0)\""));
        assert!(parse_svg(&svg) > 0);
    }

    #[test]
    fn quoted_font_families_stay_inside_their_attribute() {
        let forest = forest();
        let mut open = ExpansionSet::new();
        open.expand_all(&forest);
        let mut theme = Theme::classic();
        theme.font_family = "\"Segoe UI\", 'Noto Sans', sans-serif".to_string();
        let layout = compute_layout(&forest, &open, &theme, &LayoutConfig::default());
        let svg = render_svg(&layout, &theme, &RenderConfig::default());
        assert!(svg.contains("font-family=\"&quot;Segoe UI&quot;, &apos;Noto Sans&apos;, sans-serif\""));
        // svg, background, defs, marker and its path, one edge, then rect +
        // three lines + badge for the root and rect + three lines for the leaf
        assert_eq!(parse_svg(&svg), 15);
    }

    #[test]
    fn step_path_has_two_bends() {
        let d = step_path(&[(0.0, 0.0), (10.0, 20.0)]);
        assert_eq!(d, "M 0.00 0.00 L 0.00 10.00 L 10.00 10.00 L 10.00 20.00");
        assert!(step_path(&[]).is_empty());
    }
}
