//! Aggregation / Pivot Builder.
//!
//! Configuration drives the shape, data fills the cells: the column set
//! comes from the year's tier configuration, never from observed records,
//! so the pivot keeps a stable layout across reporting periods even when a
//! configured tier has zero matching records that month.
//!
//! Zero-filling policy: category totals and grand totals are explicit zeros;
//! only the finest-grained (category, tier) cells are omitted when empty.

use crate::{
    error::ReconResult,
    store::ReconStore,
    types::FiscalYear,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// One configured (category, tier) pair. Every pair for the year appears in
/// `PivotResult::columns`, records or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierColumn {
    pub payment_category: String,
    pub tier_name: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TierCell {
    pub count: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryTotals {
    pub count: i64,
    pub amount: f64,
    /// Only tiers with at least one record; zero cells are omitted here.
    pub tiers: BTreeMap<String, TierCell>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JurisdictionSummary {
    /// Zero-filled for every configured category.
    pub categories: BTreeMap<String, CategoryTotals>,
    pub total_count: i64,
    pub total_amount: f64,
}

/// Nested cross-tabulation of jurisdiction × category × tier, ready for
/// direct serialization or spreadsheet rendering downstream.
#[derive(Debug, Clone, Serialize)]
pub struct PivotResult {
    pub fiscal_year: FiscalYear,
    pub columns: Vec<TierColumn>,
    pub jurisdictions: BTreeMap<String, JurisdictionSummary>,
    pub grand_count: i64,
    pub grand_amount: f64,
}

/// Build the pivot for one fiscal year: one grouped aggregate query over
/// tier-matched records plus one query for the configured column set.
pub fn summarize(store: &ReconStore, fiscal_year: FiscalYear) -> ReconResult<PivotResult> {
    let columns: Vec<TierColumn> = store
        .tier_columns_for_year(fiscal_year)?
        .into_iter()
        .map(|(payment_category, tier_name)| TierColumn {
            payment_category,
            tier_name,
        })
        .collect();
    let cells = store.aggregate_matched(fiscal_year)?;

    let mut jurisdictions: BTreeMap<String, JurisdictionSummary> = BTreeMap::new();
    let mut grand_count = 0i64;
    let mut grand_amount = 0f64;

    for cell in cells {
        let summary = jurisdictions.entry(cell.jurisdiction).or_default();
        let category = summary
            .categories
            .entry(cell.payment_category)
            .or_default();
        category.count += cell.count;
        category.amount += cell.amount;
        category.tiers.insert(
            cell.tier_name,
            TierCell {
                count: cell.count,
                amount: cell.amount,
            },
        );
        summary.total_count += cell.count;
        summary.total_amount += cell.amount;
        grand_count += cell.count;
        grand_amount += cell.amount;
    }

    // Zero-fill category rows: every configured category appears for every
    // jurisdiction, even with no matching records.
    for summary in jurisdictions.values_mut() {
        for column in &columns {
            summary
                .categories
                .entry(column.payment_category.clone())
                .or_default();
        }
    }

    log::debug!(
        "pivot year={fiscal_year}: {} jurisdictions, {} columns, grand count {grand_count}",
        jurisdictions.len(),
        columns.len(),
    );

    Ok(PivotResult {
        fiscal_year,
        columns,
        jurisdictions,
        grand_count,
        grand_amount,
    })
}
