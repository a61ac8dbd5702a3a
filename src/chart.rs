//! The chart controller: one forest, its disclosure state, the active
//! filters and the pending camera move.

use log::{debug, info, warn};
use serde_json::Value;

use crate::config::Config;
use crate::error::ChartError;
use crate::expansion::ExpansionSet;
use crate::identity::Identity;
use crate::ir::{ChartVariant, Forest};
use crate::layout::{Layout, compute_layout};
use crate::render::{Drawing, RenderSurface};
use crate::search::{Filters, Stats};
use crate::viewport::{Clock, FitReason, FitViewOptions, FitViewScheduler, SystemClock};

pub struct OrgChart {
    config: Config,
    forest: Forest,
    expansion: ExpansionSet,
    filters: Filters,
    initialized: bool,
    scheduler: FitViewScheduler,
    clock: Box<dyn Clock>,
}

impl OrgChart {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Box<dyn Clock>) -> Self {
        let forest = Forest::empty(config.bridge.default_variant, config.bridge.identity_strategy);
        let scheduler = FitViewScheduler::new(config.viewport.clone());
        Self {
            config,
            forest,
            expansion: ExpansionSet::new(),
            filters: Filters::default(),
            initialized: false,
            scheduler,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn expansion(&self) -> &ExpansionSet {
        &self.expansion
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn variant(&self) -> ChartVariant {
        self.forest.variant
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Replaces the forest, re-seeds the expansion set and marks the chart
    /// initialized. Malformed data leaves every piece of state untouched.
    pub fn set_data(
        &mut self,
        data: &Value,
        variant: Option<ChartVariant>,
    ) -> Result<usize, ChartError> {
        let variant = variant.unwrap_or(self.config.bridge.default_variant);
        let forest = self.normalize(data, variant)?;
        let before = self.visible_count();
        self.expansion = ExpansionSet::seeded(&forest);
        self.forest = forest;
        self.initialized = true;
        info!(
            "loaded {} {} items in {} roots",
            self.forest.len(),
            variant.as_str(),
            self.forest.roots.len()
        );
        self.fit_if_grown(before, FitReason::Expand);
        Ok(self.forest.len())
    }

    /// Replaces the forest but keeps the initialized flag and the expansion
    /// set; identities that no longer exist simply stop matching.
    pub fn update_data(
        &mut self,
        data: &Value,
        variant: Option<ChartVariant>,
    ) -> Result<usize, ChartError> {
        let variant = variant.unwrap_or(self.forest.variant);
        let forest = self.normalize(data, variant)?;
        let before = self.visible_count();
        self.forest = forest;
        debug!("updated chart data to {} items", self.forest.len());
        self.fit_if_grown(before, FitReason::Expand);
        Ok(self.forest.len())
    }

    fn normalize(&self, data: &Value, variant: ChartVariant) -> Result<Forest, ChartError> {
        let forest = Forest::from_value(data, variant, self.config.bridge.identity_strategy)?;
        if !forest.collisions.is_empty() {
            warn!(
                "{} duplicate identities in {} data; later occurrences will not be drawn",
                forest.collisions.len(),
                variant.as_str()
            );
        }
        Ok(forest)
    }

    pub fn clear(&mut self) {
        self.forest = Forest::empty(self.forest.variant, self.config.bridge.identity_strategy);
        self.expansion.collapse_all();
        self.filters.clear();
        self.scheduler.cancel();
        self.initialized = false;
        info!("chart cleared");
    }

    /// Maps a host-supplied key to an item identity. Semantic keys (job title
    /// codes, company ids) resolve to the first item carrying them; anything
    /// else is taken verbatim.
    pub fn resolve(&self, key: &str) -> Identity {
        self.forest
            .find_chain(key)
            .and_then(|chain| chain.last().map(|item| item.identity.clone()))
            .unwrap_or_else(|| Identity::from(key))
    }

    /// Returns whether `id` is expanded afterwards.
    pub fn toggle(&mut self, id: &Identity) -> bool {
        let before = self.visible_count();
        let expanded = self.expansion.toggle(id);
        self.fit_if_grown(before, FitReason::Expand);
        expanded
    }

    pub fn expand_node(&mut self, id: &Identity) -> bool {
        let before = self.visible_count();
        let changed = self.expansion.expand(id);
        self.fit_if_grown(before, FitReason::Expand);
        changed
    }

    pub fn collapse_node(&mut self, id: &Identity) -> bool {
        self.expansion.collapse(id)
    }

    pub fn expand_all(&mut self) {
        let before = self.visible_count();
        self.expansion.expand_all(&self.forest);
        self.fit_if_grown(before, FitReason::Expand);
    }

    pub fn collapse_all(&mut self) {
        self.expansion.collapse_all();
    }

    /// Sets the search term and returns the number of visible matches.
    pub fn search(&mut self, term: &str) -> usize {
        self.filters.set_term(term);
        self.stats().matches
    }

    pub fn filter_by_level(&mut self, level: &str) -> usize {
        self.filters.set_level(level);
        self.stats().matches
    }

    pub fn reset_filters(&mut self) {
        self.filters.clear();
    }

    /// Discloses exactly the chain down to `target` and schedules a closer
    /// camera fit. A miss changes nothing.
    pub fn focus(&mut self, target: &str) -> Option<Vec<Identity>> {
        let Some(chain) = self.expansion.focus(&self.forest, target) else {
            debug!("focus target `{target}` not found");
            return None;
        };
        self.scheduler.request(FitReason::Focus, self.clock.now_ms());
        Some(chain)
    }

    pub fn stats(&self) -> Stats {
        Stats::collect(&self.layout(), self.forest.len(), &self.filters, self.initialized)
    }

    pub fn layout(&self) -> Layout<'_> {
        compute_layout(
            &self.forest,
            &self.expansion,
            &self.config.theme,
            &self.config.layout,
        )
    }

    pub fn drawing(&self) -> Drawing {
        Drawing::from_layout(&self.layout(), &self.filters, &self.config.layout)
    }

    pub fn fit_view_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn poll_fit_view(&mut self) -> Option<FitViewOptions> {
        self.scheduler.poll(self.clock.now_ms())
    }

    /// Pushes the current drawing to `surface` and fires the camera move if
    /// it has come due.
    pub fn present(&mut self, surface: &mut dyn RenderSurface) {
        surface.apply(&self.drawing());
        if let Some(options) = self.poll_fit_view() {
            surface.fit_view(&options);
        }
    }

    fn visible_count(&self) -> usize {
        self.layout().nodes.len()
    }

    fn fit_if_grown(&mut self, before: usize, reason: FitReason) {
        let after = self.visible_count();
        if after > before {
            self.scheduler.request(reason, self.clock.now_ms());
        }
    }
}
