use crate::identity::IdentityStrategy;
use crate::ir::ChartVariant;
use crate::theme::{ColorMode, Theme};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Overlap avoidance applied to each candidate position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapStrategy {
    None,
    /// Push right in fixed steps until clear of same-depth neighbours.
    Shift,
    /// Coarse per-depth occupancy grid with a ring search around the
    /// preferred position.
    #[default]
    Grid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub card_width: f32,
    pub card_height: f32,
    pub min_horizontal_gap: f32,
    pub min_vertical_gap: f32,
    pub group_separation: f32,
    pub root_spacing: f32,
    pub vertical_spacing: f32,
    pub vertical_growth: f32,
    pub single_child_offset: f32,
    pub overlap: OverlapStrategy,
    pub grid_cell: f32,
    pub max_attempts: usize,
    pub shift_min_distance: f32,
    pub shift_step: f32,
    pub edge_stroke_width: f32,
    pub edge_marker_size: f32,
}

impl LayoutConfig {
    /// Horizontal distance between neighbouring siblings.
    pub fn sibling_spacing(&self) -> f32 {
        self.card_width + self.min_horizontal_gap + self.group_separation
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            card_width: 280.0,
            card_height: 120.0,
            min_horizontal_gap: 100.0,
            min_vertical_gap: 200.0,
            group_separation: 150.0,
            root_spacing: 530.0,
            vertical_spacing: 300.0,
            vertical_growth: 50.0,
            single_child_offset: 50.0,
            overlap: OverlapStrategy::Grid,
            grid_cell: 50.0,
            max_attempts: 50,
            shift_min_distance: 380.0,
            shift_step: 380.0,
            edge_stroke_width: 2.0,
            edge_marker_size: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Delay between a disclosure change and the camera move.
    pub debounce_ms: u64,
    pub padding: f32,
    pub duration_ms: u64,
    pub expand_max_zoom: f32,
    pub focus_max_zoom: f32,
    pub min_zoom: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            padding: 0.2,
            duration_ms: 800,
            expand_max_zoom: 0.8,
            focus_max_zoom: 1.2,
            min_zoom: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Origins allowed to post messages. `"*"` accepts any origin.
    pub trusted_origins: Vec<String>,
    pub default_variant: ChartVariant,
    pub identity_strategy: IdentityStrategy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            trusted_origins: Vec::new(),
            default_variant: ChartVariant::OrgChart,
            identity_strategy: IdentityStrategy::Path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub padding: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#F9FAFB".to_string(),
            padding: 40.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub viewport: ViewportConfig,
    pub bridge: BridgeConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            viewport: ViewportConfig::default(),
            bridge: BridgeConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    background: Option<String>,
    card_fill: Option<String>,
    card_text_color: Option<String>,
    card_muted_text_color: Option<String>,
    fallback_color: Option<String>,
    color_mode: Option<ColorMode>,
    level_colors: Option<Vec<String>>,
    card_colors: Option<Vec<String>>,
    classification_colors: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    card_width: Option<f32>,
    card_height: Option<f32>,
    min_horizontal_gap: Option<f32>,
    min_vertical_gap: Option<f32>,
    group_separation: Option<f32>,
    root_spacing: Option<f32>,
    vertical_spacing: Option<f32>,
    vertical_growth: Option<f32>,
    single_child_offset: Option<f32>,
    overlap: Option<OverlapStrategy>,
    grid_cell: Option<f32>,
    max_attempts: Option<usize>,
    shift_min_distance: Option<f32>,
    shift_step: Option<f32>,
    edge_stroke_width: Option<f32>,
    edge_marker_size: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ViewportConfigFile {
    debounce_ms: Option<u64>,
    padding: Option<f32>,
    duration_ms: Option<u64>,
    expand_max_zoom: Option<f32>,
    focus_max_zoom: Option<f32>,
    min_zoom: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BridgeConfigFile {
    trusted_origins: Option<Vec<String>>,
    chart_type: Option<ChartVariant>,
    identity_strategy: Option<IdentityStrategy>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    viewport: Option<ViewportConfigFile>,
    bridge: Option<BridgeConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Applies a JSON config document on top of the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "modern" {
            config.theme = Theme::modern();
        } else if theme_name == "classic" || theme_name == "default" {
            config.theme = Theme::classic();
        } else {
            log::warn!("unknown theme `{theme_name}`, keeping the classic theme");
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
        if let Some(v) = vars.card_fill {
            config.theme.card_fill = v;
        }
        if let Some(v) = vars.card_text_color {
            config.theme.card_text_color = v;
        }
        if let Some(v) = vars.card_muted_text_color {
            config.theme.card_muted_text_color = v;
        }
        if let Some(v) = vars.fallback_color {
            config.theme.fallback_color = v;
        }
        if let Some(v) = vars.color_mode {
            config.theme.color_mode = v;
        }
        if let Some(v) = vars.level_colors {
            config.theme.level_colors = v;
        }
        if let Some(v) = vars.card_colors {
            config.theme.card_colors = v;
        }
        if let Some(v) = vars.classification_colors {
            config.theme.classification_colors = v;
        }
    }
    config.render.background = config.theme.background.clone();

    if let Some(layout) = parsed.layout {
        let target = &mut config.layout;
        if let Some(v) = layout.card_width {
            target.card_width = v.max(1.0);
        }
        if let Some(v) = layout.card_height {
            target.card_height = v.max(1.0);
        }
        if let Some(v) = layout.min_horizontal_gap {
            target.min_horizontal_gap = v.max(0.0);
        }
        if let Some(v) = layout.min_vertical_gap {
            target.min_vertical_gap = v.max(0.0);
        }
        if let Some(v) = layout.group_separation {
            target.group_separation = v.max(0.0);
        }
        if let Some(v) = layout.root_spacing {
            target.root_spacing = v.max(0.0);
        }
        if let Some(v) = layout.vertical_spacing {
            target.vertical_spacing = v.max(0.0);
        }
        if let Some(v) = layout.vertical_growth {
            target.vertical_growth = v;
        }
        if let Some(v) = layout.single_child_offset {
            target.single_child_offset = v;
        }
        if let Some(v) = layout.overlap {
            target.overlap = v;
        }
        if let Some(v) = layout.grid_cell {
            target.grid_cell = v.max(1.0);
        }
        if let Some(v) = layout.max_attempts {
            target.max_attempts = v;
        }
        if let Some(v) = layout.shift_min_distance {
            target.shift_min_distance = v.max(0.0);
        }
        if let Some(v) = layout.shift_step {
            target.shift_step = v.max(1.0);
        }
        if let Some(v) = layout.edge_stroke_width {
            target.edge_stroke_width = v;
        }
        if let Some(v) = layout.edge_marker_size {
            target.edge_marker_size = v;
        }
    }

    if let Some(viewport) = parsed.viewport {
        let target = &mut config.viewport;
        if let Some(v) = viewport.debounce_ms {
            target.debounce_ms = v;
        }
        if let Some(v) = viewport.padding {
            target.padding = v;
        }
        if let Some(v) = viewport.duration_ms {
            target.duration_ms = v;
        }
        if let Some(v) = viewport.expand_max_zoom {
            target.expand_max_zoom = v;
        }
        if let Some(v) = viewport.focus_max_zoom {
            target.focus_max_zoom = v;
        }
        if let Some(v) = viewport.min_zoom {
            target.min_zoom = v;
        }
    }

    if let Some(bridge) = parsed.bridge {
        if let Some(v) = bridge.trusted_origins {
            config.bridge.trusted_origins = v;
        }
        if let Some(v) = bridge.chart_type {
            config.bridge.default_variant = v;
        }
        if let Some(v) = bridge.identity_strategy {
            config.bridge.identity_strategy = v;
        }
    }

    Ok(config)
}
