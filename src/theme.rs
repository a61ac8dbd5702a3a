use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ir::{ChartVariant, Item};

const LEVEL_COLORS: [&str; 8] = [
    "#8b5cf6", "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#ec4899", "#6366f1", "#84cc16",
];

const CARD_COLORS: [&str; 36] = [
    "#a855f7", "#8b5cf6", "#6366f1", "#d946ef", "#ec4899", "#f43f5e", "#3b82f6", "#0ea5e9",
    "#06b6d4", "#14b8a6", "#64748b", "#71717a", "#10b981", "#059669", "#65a30d", "#eab308",
    "#f59e0b", "#ea580c", "#ef4444", "#f97316", "#d97706", "#ca8a04", "#6b7280", "#78716c",
    "#737373", "#059669", "#0d9488", "#0891b2", "#0284c7", "#2563eb", "#4f46e5", "#7c3aed",
    "#9333ea", "#c026d3", "#db2777", "#e11d48",
];

const CLASSIFICATION_COLORS: [(&str, &str); 7] = [
    ("Executive", "#a855f7"),
    ("Senior Management", "#3b82f6"),
    ("Middle Management", "#10b981"),
    ("Junior Management", "#f59e0b"),
    ("Senior Staff", "#ef4444"),
    ("Staff", "#ec4899"),
    ("Entry Level", "#6366f1"),
];

/// How a card picks its accent color. Edges inherit the parent's accent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorMode {
    /// One color per tree depth.
    #[default]
    Depth,
    /// Color picked from the item's code, id or name hash.
    Code,
    /// Color keyed by classification label (`Executive`, `Staff`, ...).
    Classification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub card_fill: String,
    pub card_text_color: String,
    pub card_muted_text_color: String,
    pub fallback_color: String,
    pub color_mode: ColorMode,
    pub level_colors: Vec<String>,
    pub card_colors: Vec<String>,
    pub classification_colors: BTreeMap<String, String>,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "system-ui, -apple-system, \"Segoe UI\", sans-serif".to_string(),
            font_size: 14.0,
            background: "#F9FAFB".to_string(),
            card_fill: "#FFFFFF".to_string(),
            card_text_color: "#111827".to_string(),
            card_muted_text_color: "#6B7280".to_string(),
            fallback_color: "#6b7280".to_string(),
            color_mode: ColorMode::Depth,
            level_colors: LEVEL_COLORS.iter().map(|value| value.to_string()).collect(),
            card_colors: CARD_COLORS.iter().map(|value| value.to_string()).collect(),
            classification_colors: CLASSIFICATION_COLORS
                .iter()
                .map(|(label, color)| (label.to_string(), color.to_string()))
                .collect(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            background: "#FFFFFF".to_string(),
            card_fill: "#F8FAFF".to_string(),
            card_text_color: "#1C2430".to_string(),
            card_muted_text_color: "#7A8AA6".to_string(),
            color_mode: ColorMode::Code,
            ..Self::classic()
        }
    }

    /// Accent color for `item` placed at `depth` (roots are depth 1).
    pub fn accent_color(&self, item: &Item, depth: usize, variant: ChartVariant) -> String {
        let picked = match self.color_mode {
            ColorMode::Depth => pick(&self.level_colors, depth.saturating_sub(1)),
            ColorMode::Code => pick(&self.card_colors, item.color_seed(variant) as usize),
            ColorMode::Classification => item
                .level(variant)
                .and_then(|level| self.classification_colors.get(&level))
                .map(String::as_str),
        };
        picked.unwrap_or(self.fallback_color.as_str()).to_string()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}

fn pick(values: &[String], idx: usize) -> Option<&str> {
    if values.is_empty() {
        return None;
    }
    Some(values[idx % values.len()].as_str())
}
