//! Hierarchy model and the tree normalizer.
//!
//! Host data arrives as loosely typed JSON: a single root record, an array of
//! roots, or a flat list of records that point at their manager. All of these
//! end up as a [`Forest`] of [`Item`]s whose identities are resolved once, up
//! front.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::error::ChartError;
use crate::identity::{
    Identity, IdentityStrategy, display_name, identify, scalar_to_string, semantic_key,
    stable_hash,
};

const CHILDREN_KEY: &str = "children";
const PARENT_KEYS: [&str; 4] = ["managerId", "manager_id", "parentId", "parent_id"];
/// Deepest reporting chain accepted from a flat listing. Nested input is
/// already bounded by the JSON parser's recursion limit.
const MAX_FLAT_DEPTH: usize = 512;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartVariant {
    #[default]
    #[serde(rename = "orgChart")]
    OrgChart,
    #[serde(rename = "companyChart")]
    CompanyChart,
}

impl ChartVariant {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "orgChart" | "org" => Some(Self::OrgChart),
            "companyChart" | "company" => Some(Self::CompanyChart),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrgChart => "orgChart",
            Self::CompanyChart => "companyChart",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub identity: Identity,
    /// The record as received, minus its `children` array.
    pub fields: Map<String, Value>,
    pub children: Vec<Item>,
}

impl Item {
    pub fn name(&self) -> &str {
        display_name(&self.fields).unwrap_or("")
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(scalar_to_string)
    }

    /// Classification label: `level`/`job_level` for people, `type` for
    /// company entities.
    pub fn level(&self, variant: ChartVariant) -> Option<String> {
        match variant {
            ChartVariant::OrgChart => self.text("level").or_else(|| self.text("job_level")),
            ChartVariant::CompanyChart => self.text("type"),
        }
    }

    pub fn semantic_key(&self, variant: ChartVariant) -> Option<String> {
        semantic_key(&self.fields, variant)
    }

    /// Small deterministic integer used to pick palette entries.
    pub fn color_seed(&self, variant: ChartVariant) -> u32 {
        let code_keys: &[&str] = match variant {
            ChartVariant::OrgChart => &["job_title_code", "jobTitleCode"],
            ChartVariant::CompanyChart => &["id", "code"],
        };
        for key in code_keys {
            match self.fields.get(*key) {
                Some(Value::Number(number)) => {
                    if let Some(value) = number.as_i64() {
                        return (value.unsigned_abs() % u64::from(u32::MAX)) as u32;
                    }
                    if let Some(value) = number.as_f64() {
                        return (value.abs() as u64 % u64::from(u32::MAX)) as u32;
                    }
                }
                Some(Value::String(text)) if !text.trim().is_empty() => {
                    return stable_hash(text.trim());
                }
                _ => {}
            }
        }
        match display_name(&self.fields) {
            Some(name) => stable_hash(name),
            None => stable_hash(self.identity.as_str()),
        }
    }

    /// Roots flagged `firstNode` + `expanded` start out open.
    pub fn auto_expand(&self) -> bool {
        let flagged = |key: &str| self.fields.get(key).and_then(Value::as_bool).unwrap_or(false);
        (flagged("firstNode") || flagged("first_node")) && flagged("expanded")
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Number of items in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Item::subtree_len).sum::<usize>()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    pub variant: ChartVariant,
    pub strategy: IdentityStrategy,
    pub roots: Vec<Item>,
    /// Identities produced by more than one item. Only possible with
    /// [`IdentityStrategy::Semantic`].
    pub collisions: Vec<Identity>,
}

impl Forest {
    pub fn empty(variant: ChartVariant, strategy: IdentityStrategy) -> Self {
        Self {
            variant,
            strategy,
            roots: Vec::new(),
            collisions: Vec::new(),
        }
    }

    pub fn from_value(
        value: &Value,
        variant: ChartVariant,
        strategy: IdentityStrategy,
    ) -> Result<Self, ChartError> {
        let records: Vec<&Map<String, Value>> = match value {
            Value::Object(record) => vec![record],
            Value::Array(entries) => entries
                .iter()
                .enumerate()
                .map(|(idx, entry)| {
                    entry.as_object().ok_or_else(|| {
                        ChartError::MalformedData(format!(
                            "root entry {idx} is {}, expected an object",
                            json_kind(entry)
                        ))
                    })
                })
                .collect::<Result<_, _>>()?,
            Value::Null => {
                return Err(ChartError::MalformedData("no chart data provided".to_string()));
            }
            other => {
                return Err(ChartError::MalformedData(format!(
                    "expected an object or an array of objects, found {}",
                    json_kind(other)
                )));
            }
        };

        let mut builder = ForestBuilder {
            variant,
            strategy,
            seen: HashSet::new(),
            collisions: Vec::new(),
        };
        let roots = if is_flat_listing(&records) {
            debug!("assembling {} flat {} records by manager id", records.len(), variant.as_str());
            assemble_flat(&records, variant)?
                .iter()
                .enumerate()
                .map(|(idx, record)| builder.build(record, None, idx))
                .collect()
        } else {
            records
                .iter()
                .enumerate()
                .map(|(idx, record)| builder.build(record, None, idx))
                .collect()
        };

        Ok(Self {
            variant,
            strategy,
            roots,
            collisions: builder.collisions,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of items across all roots.
    pub fn len(&self) -> usize {
        self.roots.iter().map(Item::subtree_len).sum()
    }

    /// Depth-first, pre-order walk over every item.
    pub fn iter(&self) -> Walk<'_> {
        Walk {
            stack: self.roots.iter().rev().collect(),
        }
    }

    /// Chain of items from a root down to the first item (depth-first) whose
    /// identity or semantic key equals `target`.
    pub fn find_chain(&self, target: &str) -> Option<Vec<&Item>> {
        let mut chain = Vec::new();
        for root in &self.roots {
            if self.search(root, target, &mut chain) {
                return Some(chain);
            }
        }
        None
    }

    fn search<'a>(&self, item: &'a Item, target: &str, chain: &mut Vec<&'a Item>) -> bool {
        chain.push(item);
        let hit = item.identity.as_str() == target
            || item.semantic_key(self.variant).as_deref() == Some(target);
        if hit {
            return true;
        }
        for child in &item.children {
            if self.search(child, target, chain) {
                return true;
            }
        }
        chain.pop();
        false
    }
}

pub struct Walk<'a> {
    stack: Vec<&'a Item>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.stack.pop()?;
        self.stack.extend(item.children.iter().rev());
        Some(item)
    }
}

struct ForestBuilder {
    variant: ChartVariant,
    strategy: IdentityStrategy,
    seen: HashSet<Identity>,
    collisions: Vec<Identity>,
}

impl ForestBuilder {
    fn build(
        &mut self,
        record: &Map<String, Value>,
        parent: Option<&Identity>,
        sibling_index: usize,
    ) -> Item {
        let identity = identify(self.strategy, self.variant, record, parent, sibling_index);
        if !self.seen.insert(identity.clone()) {
            warn!(
                "identity `{identity}` is shared by more than one item; only the first will be drawn"
            );
            self.collisions.push(identity.clone());
        }

        let fields: Map<String, Value> = record
            .iter()
            .filter(|(key, _)| key.as_str() != CHILDREN_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let children = match record.get(CHILDREN_KEY) {
            Some(Value::Array(entries)) => {
                let mut children = Vec::with_capacity(entries.len());
                for (raw_idx, entry) in entries.iter().enumerate() {
                    let Some(child) = entry.as_object() else {
                        warn!(
                            "skipping child {raw_idx} of `{identity}`: {} is not a record",
                            json_kind(entry)
                        );
                        continue;
                    };
                    let idx = children.len();
                    children.push(self.build(child, Some(&identity), idx));
                }
                children
            }
            None | Some(Value::Null) => Vec::new(),
            Some(other) => {
                warn!(
                    "ignoring `children` of `{identity}`: expected an array, found {}",
                    json_kind(other)
                );
                Vec::new()
            }
        };

        Item {
            identity,
            fields,
            children,
        }
    }
}

fn parent_key(record: &Map<String, Value>) -> Option<String> {
    PARENT_KEYS
        .iter()
        .find_map(|key| record.get(*key).and_then(scalar_to_string))
}

fn record_key(record: &Map<String, Value>, variant: ChartVariant) -> Option<String> {
    record
        .get("id")
        .and_then(scalar_to_string)
        .or_else(|| semantic_key(record, variant))
}

fn is_flat_listing(records: &[&Map<String, Value>]) -> bool {
    records.len() > 1
        && !records.iter().any(|record| record.contains_key(CHILDREN_KEY))
        && records.iter().any(|record| parent_key(record).is_some())
}

/// Turns a flat manager-linked listing into nested records.
///
/// Records with a missing or unknown manager become roots. Records only
/// reachable through a manager cycle are promoted to roots in input order and
/// the cycle is cut where it closes. Chains deeper than [`MAX_FLAT_DEPTH`]
/// are rejected.
fn assemble_flat(
    records: &[&Map<String, Value>],
    variant: ChartVariant,
) -> Result<Vec<Map<String, Value>>, ChartError> {
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        if let Some(key) = record_key(record, variant) {
            index_by_key.entry(key).or_insert(idx);
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    let mut starts = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let parent = parent_key(record)
            .and_then(|key| index_by_key.get(&key).copied())
            .filter(|parent| *parent != idx);
        match parent {
            Some(parent) => children[parent].push(idx),
            None => starts.push(idx),
        }
    }

    let mut reached = vec![false; records.len()];
    let mut deepest = 0;
    for &root in &starts {
        deepest = deepest.max(reach(root, &children, &mut reached));
    }
    for idx in 0..records.len() {
        if !reached[idx] {
            warn!(
                "record {idx} is only reachable through a manager cycle; promoting it to a root"
            );
            deepest = deepest.max(reach(idx, &children, &mut reached));
            starts.push(idx);
        }
    }
    if deepest > MAX_FLAT_DEPTH {
        return Err(ChartError::MalformedData(format!(
            "reporting chain is {deepest} levels deep, at most {MAX_FLAT_DEPTH} are supported"
        )));
    }

    let mut placed = vec![false; records.len()];
    Ok(starts
        .into_iter()
        .map(|start| materialize(start, records, &children, &mut placed))
        .collect())
}

/// Marks everything reachable from `start` and returns the depth of the
/// deepest record, counting `start` as 1.
fn reach(start: usize, children: &[Vec<usize>], reached: &mut [bool]) -> usize {
    reached[start] = true;
    let mut deepest = 0;
    let mut stack = vec![(start, 1)];
    while let Some((idx, depth)) = stack.pop() {
        deepest = deepest.max(depth);
        for &child in &children[idx] {
            if !reached[child] {
                reached[child] = true;
                stack.push((child, depth + 1));
            }
        }
    }
    deepest
}

fn materialize(
    idx: usize,
    records: &[&Map<String, Value>],
    children: &[Vec<usize>],
    placed: &mut [bool],
) -> Map<String, Value> {
    placed[idx] = true;
    let mut record = records[idx].clone();
    let mut nested = Vec::new();
    for &child in &children[idx] {
        if placed[child] {
            continue;
        }
        nested.push(Value::Object(materialize(child, records, children, placed)));
    }
    if !nested.is_empty() {
        record.insert(CHILDREN_KEY.to_string(), Value::Array(nested));
    }
    record
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
