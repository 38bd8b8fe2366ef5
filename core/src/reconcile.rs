//! Multi-Stage Reconciliation.
//!
//! Three independent passes over existing payment records, each fed by its
//! own external row source keyed by id number, each owning exactly one
//! sub-status column:
//!
//!   identity pass     → identity_status
//!   jurisdiction pass → jurisdiction_status
//!   tier pass         → tier_status (re-verification on the personal-paid
//!                        amount; may overwrite the ingestion-time tier)
//!
//! The store recomputes the composite status inside the same UPDATE as every
//! sub-status write, so the AND-of-three invariant holds after any pass in
//! any order. A missing record is a per-row error, never a pass abort.

use crate::{
    config::CategoryAliasTable,
    error::ReconResult,
    ingest::RowSkip,
    matcher::{self, AmountField, TierResolution},
    status::MatchStatus,
    store::ReconStore,
    tier_cache::TierCache,
    types::{FiscalYear, IdNumber, RowNumber},
};
use serde::{Deserialize, Serialize};

/// One row of the identity-category source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub row_number: RowNumber,
    pub id_number: IdNumber,
    pub claimed_category: String,
}

/// One row of the jurisdiction source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JurisdictionClaim {
    pub row_number: RowNumber,
    pub id_number: IdNumber,
    pub claimed_jurisdiction: String,
}

/// One row of the tier re-verification source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalPaymentClaim {
    pub row_number: RowNumber,
    pub id_number: IdNumber,
    pub personal_paid_amount: f64,
}

/// Outcome of one pass: counters plus the full per-row error list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub matched: u64,
    pub unmatched: u64,
    /// Claims whose (fiscal_year, id_number) has no payment record.
    pub missing: u64,
    pub errors: Vec<RowSkip>,
}

impl PassReport {
    fn record_missing(&mut self, row_number: RowNumber, id_number: &str) {
        self.missing += 1;
        self.errors.push(RowSkip {
            row_number,
            reason: format!("no payment record for id {id_number}"),
        });
    }

    fn count(&mut self, status: MatchStatus) {
        match status {
            MatchStatus::Matched => self.matched += 1,
            _ => self.unmatched += 1,
        }
    }
}

/// Identity-category pass: a claim matches when it names the record's
/// payment category directly or through a configured alias.
pub fn run_identity_pass(
    store: &ReconStore,
    aliases: &CategoryAliasTable,
    fiscal_year: FiscalYear,
    claims: &[IdentityClaim],
) -> ReconResult<PassReport> {
    let mut report = PassReport::default();

    for claim in claims {
        let record = match store.get_payment_record(fiscal_year, &claim.id_number)? {
            Some(r) => r,
            None => {
                report.record_missing(claim.row_number, &claim.id_number);
                continue;
            }
        };
        let status = if aliases.matches(&record.payment_category, &claim.claimed_category) {
            MatchStatus::Matched
        } else {
            MatchStatus::Unmatched
        };
        store.set_identity_status(fiscal_year, &claim.id_number, status)?;
        report.count(status);
    }

    log::info!(
        "identity pass year={fiscal_year}: matched={} unmatched={} missing={}",
        report.matched,
        report.unmatched,
        report.missing
    );
    Ok(report)
}

/// Jurisdiction pass: the deployment accepts exactly one jurisdiction value
/// (its own administrative scope); anything else is unmatched.
pub fn run_jurisdiction_pass(
    store: &ReconStore,
    accepted_jurisdiction: &str,
    fiscal_year: FiscalYear,
    claims: &[JurisdictionClaim],
) -> ReconResult<PassReport> {
    let mut report = PassReport::default();

    for claim in claims {
        let status = if claim.claimed_jurisdiction == accepted_jurisdiction {
            MatchStatus::Matched
        } else {
            MatchStatus::Unmatched
        };
        let updated = store.set_jurisdiction_status(fiscal_year, &claim.id_number, status)?;
        if updated {
            report.count(status);
        } else {
            report.record_missing(claim.row_number, &claim.id_number);
        }
    }

    log::info!(
        "jurisdiction pass year={fiscal_year}: matched={} unmatched={} missing={}",
        report.matched,
        report.unmatched,
        report.missing
    );
    Ok(report)
}

/// Tier re-verification pass: re-resolves against the record's category
/// using the person's personal-paid amount (not the payment amount used at
/// ingestion), matching on the configured personal amount. Overwrites the
/// ingestion-time resolution, ambiguity policy included.
pub fn run_tier_pass(
    store: &ReconStore,
    cache: &mut TierCache,
    fiscal_year: FiscalYear,
    claims: &[PersonalPaymentClaim],
) -> ReconResult<PassReport> {
    cache.load(store, fiscal_year)?;
    let mut report = PassReport::default();

    for claim in claims {
        let record = match store.get_payment_record(fiscal_year, &claim.id_number)? {
            Some(r) => r,
            None => {
                report.record_missing(claim.row_number, &claim.id_number);
                continue;
            }
        };
        let resolution = matcher::resolve(
            cache,
            fiscal_year,
            &record.payment_category,
            claim.personal_paid_amount,
            AmountField::Personal,
        );
        if let TierResolution::Ambiguous { candidates } = &resolution {
            log::warn!(
                "tier pass year={fiscal_year} row {}: {candidates} tiers share \
                 category '{}' personal amount {:.2}; refusing to pick",
                claim.row_number,
                record.payment_category,
                claim.personal_paid_amount,
            );
        }
        let (resolved_tier, resolved_personal_amount, status) = resolution.into_record_fields();
        store.set_tier_result(
            fiscal_year,
            &claim.id_number,
            resolved_tier.as_deref(),
            resolved_personal_amount,
            status,
        )?;
        report.count(status);
    }

    log::info!(
        "tier pass year={fiscal_year}: matched={} unmatched={} missing={}",
        report.matched,
        report.unmatched,
        report.missing
    );
    Ok(report)
}
