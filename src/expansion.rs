use log::debug;
use std::collections::BTreeSet;

use crate::identity::Identity;
use crate::ir::Forest;

/// The set of identities whose children are currently disclosed.
///
/// This is the only state that survives a re-layout. Unknown identities are
/// accepted everywhere; they simply never match an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionSet {
    open: BTreeSet<Identity>,
}

impl ExpansionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state for `forest`: every root flagged as auto-expanding.
    pub fn seeded(forest: &Forest) -> Self {
        let mut set = Self::new();
        set.reset(forest);
        set
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.open.contains(id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> + '_ {
        self.open.iter()
    }

    /// Flips membership and reports whether `id` is expanded afterwards.
    pub fn toggle(&mut self, id: &Identity) -> bool {
        if self.open.remove(id) {
            debug!("collapsing {id}");
            false
        } else {
            debug!("expanding {id}");
            self.open.insert(id.clone());
            true
        }
    }

    /// Returns `true` if `id` was not already expanded.
    pub fn expand(&mut self, id: &Identity) -> bool {
        self.open.insert(id.clone())
    }

    /// Returns `true` if `id` was expanded.
    pub fn collapse(&mut self, id: &Identity) -> bool {
        self.open.remove(id)
    }

    /// Opens every item in `forest`, leaves included.
    pub fn expand_all(&mut self, forest: &Forest) {
        self.open.extend(forest.iter().map(|item| item.identity.clone()));
    }

    pub fn collapse_all(&mut self) {
        self.open.clear();
    }

    /// Replaces the set with the chain from a root down to `target`
    /// (inclusive), leaving siblings along the way closed.
    ///
    /// Returns the chain on success. On a miss the set is left untouched.
    pub fn focus(&mut self, forest: &Forest, target: &str) -> Option<Vec<Identity>> {
        let chain: Vec<Identity> = forest
            .find_chain(target)?
            .into_iter()
            .map(|item| item.identity.clone())
            .collect();
        self.open = chain.iter().cloned().collect();
        Some(chain)
    }

    /// Drops all state and re-seeds from auto-expanding roots.
    pub fn reset(&mut self, forest: &Forest) {
        self.open.clear();
        for root in forest.roots.iter().filter(|root| root.auto_expand()) {
            self.open.insert(root.identity.clone());
        }
    }
}

impl FromIterator<Identity> for ExpansionSet {
    fn from_iter<T: IntoIterator<Item = Identity>>(iter: T) -> Self {
        Self {
            open: iter.into_iter().collect(),
        }
    }
}
