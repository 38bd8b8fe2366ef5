//! Tier Configuration Cache.
//!
//! One explicit object per ingestion run, passed into the pipeline — never a
//! process-wide static. Configuration can change between runs, so cross-run
//! caching is a correctness hazard; the caller builds a fresh cache (or calls
//! `load` again on a fresh one) at the start of every run.

use crate::{
    error::ReconResult,
    store::{ReconStore, TierConfigRow},
    types::FiscalYear,
};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TierCache {
    /// year → (payment_category → configs), in store order.
    by_year: HashMap<FiscalYear, HashMap<String, Vec<TierConfigRow>>>,
}

impl TierCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch and index all tier configuration for `fiscal_year`.
    /// Idempotent per year: a second load for a cached year is a no-op.
    /// Storage errors propagate — this is a read-through cache, not
    /// resilient to partial loads.
    pub fn load(&mut self, store: &ReconStore, fiscal_year: FiscalYear) -> ReconResult<()> {
        if self.by_year.contains_key(&fiscal_year) {
            return Ok(());
        }
        let mut by_category: HashMap<String, Vec<TierConfigRow>> = HashMap::new();
        for row in store.tier_configs_for_year(fiscal_year)? {
            by_category
                .entry(row.payment_category.clone())
                .or_default()
                .push(row);
        }
        log::debug!(
            "tier cache: year {fiscal_year} loaded, {} categories",
            by_category.len()
        );
        self.by_year.insert(fiscal_year, by_category);
        Ok(())
    }

    /// Configs for one (year, category). Empty for an unknown category.
    /// Calling with a year that was never loaded is a caller bug.
    pub fn configs_for(&self, fiscal_year: FiscalYear, payment_category: &str) -> &[TierConfigRow] {
        let year = self
            .by_year
            .get(&fiscal_year)
            .unwrap_or_else(|| panic!("tier cache: load({fiscal_year}) must be called first"));
        year.get(payment_category).map_or(&[], Vec::as_slice)
    }
}
