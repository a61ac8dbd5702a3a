//! Stable keys for hierarchy items.
//!
//! An [`Identity`] is the single source of truth for node ids, edge ids and
//! membership in the expansion set, so it has to come out the same every time
//! the same data is normalized.

use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use std::hash::Hasher;

use crate::ir::ChartVariant;

const UNNAMED: &str = "item";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStrategy {
    /// Keyed by position: `root-{name}-{index}` / `{parent}-{name}-{index}`,
    /// with any `-` in a name doubled.
    #[default]
    Path,
    /// Keyed by the record's own code or id. Distinct items that share a code
    /// resolve to the same identity.
    Semantic,
}

impl IdentityStrategy {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "path" => Some(Self::Path),
            "semantic" | "code" => Some(Self::Semantic),
            _ => None,
        }
    }
}

/// FNV-1a over the UTF-8 bytes of `text`, xor-folded from 64 to 32 bits.
///
/// Non-cryptographic; used to seed colors and as a last-resort key where
/// collisions are tolerable.
pub fn stable_hash(text: &str) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(text.as_bytes());
    let hash = hasher.finish();
    (hash ^ (hash >> 32)) as u32
}

pub fn display_name(fields: &Map<String, Value>) -> Option<&str> {
    fields
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// The record's own identifier (job-title code for org records, id or code
/// for company records), rendered as a string.
pub fn semantic_key(fields: &Map<String, Value>, variant: ChartVariant) -> Option<String> {
    let candidates: &[&str] = match variant {
        ChartVariant::OrgChart => &["job_title_code", "jobTitleCode"],
        ChartVariant::CompanyChart => &["id", "code"],
    };
    candidates
        .iter()
        .find_map(|key| fields.get(*key).and_then(scalar_to_string))
}

pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// `-` separates path segments, so a dash inside a name is written twice.
fn escape_segment(name: &str) -> Cow<'_, str> {
    if name.contains('-') {
        Cow::Owned(name.replace('-', "--"))
    } else {
        Cow::Borrowed(name)
    }
}

pub fn path_identity(
    fields: &Map<String, Value>,
    parent: Option<&Identity>,
    sibling_index: usize,
) -> Identity {
    let name = escape_segment(display_name(fields).unwrap_or(UNNAMED));
    match parent {
        Some(parent) => Identity(format!("{}-{}-{}", parent.0, name, sibling_index)),
        None => Identity(format!("root-{}-{}", name, sibling_index)),
    }
}

pub fn identify(
    strategy: IdentityStrategy,
    variant: ChartVariant,
    fields: &Map<String, Value>,
    parent: Option<&Identity>,
    sibling_index: usize,
) -> Identity {
    match strategy {
        IdentityStrategy::Path => path_identity(fields, parent, sibling_index),
        IdentityStrategy::Semantic => {
            if let Some(key) = semantic_key(fields, variant) {
                return Identity(key);
            }
            let seed = match display_name(fields) {
                Some(name) => stable_hash(name),
                None => stable_hash(path_identity(fields, parent, sibling_index).as_str()),
            };
            Identity(seed.to_string())
        }
    }
}
