//! Matching Engine.
//!
//! Resolves a (year, category, amount) triple to the unique configured tier.
//! The three-way outcome is the core policy: "no candidate" and "ambiguous
//! candidates" need different remediation (seed the missing config vs. fix
//! the duplicated one), so they are never collapsed into each other.

use crate::status::MatchStatus;
use crate::tier_cache::TierCache;
use crate::types::FiscalYear;

/// Currency comparison tolerance. Amounts arrive as floating point from
/// spreadsheet cells, so equality is |Δ| < 0.01.
pub const AMOUNT_EPSILON: f64 = 0.01;

/// Which configured amount a resolution compares against.
/// Ingestion matches the subsidy amount; the tier re-verification pass
/// matches the personal-paid amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountField {
    Subsidy,
    Personal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TierResolution {
    Matched {
        tier_name: String,
        personal_amount: f64,
    },
    NoMatch,
    Ambiguous {
        candidates: usize,
    },
}

impl TierResolution {
    /// Flatten into the persisted record fields. This is the single place
    /// encoding the NULL-vs-empty-string contract: no-match stores NULL,
    /// ambiguous stores an empty tier name so operators can tell "no
    /// config" apart from "too many configs" in downstream review.
    pub fn into_record_fields(self) -> (Option<String>, f64, MatchStatus) {
        match self {
            TierResolution::Matched {
                tier_name,
                personal_amount,
            } => (Some(tier_name), personal_amount, MatchStatus::Matched),
            TierResolution::NoMatch => (None, 0.0, MatchStatus::Unmatched),
            TierResolution::Ambiguous { .. } => {
                (Some(String::new()), 0.0, MatchStatus::Unmatched)
            }
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, TierResolution::Matched { .. })
    }
}

/// Resolve `amount` against the year/category tier list.
///
/// Exactly one candidate within epsilon → `Matched`.
/// Zero candidates → `NoMatch`.
/// Two or more → `Ambiguous`; the engine refuses to pick arbitrarily.
/// Callers log ambiguity as a data-quality signal distinct from no-match.
pub fn resolve(
    cache: &TierCache,
    fiscal_year: FiscalYear,
    payment_category: &str,
    amount: f64,
    field: AmountField,
) -> TierResolution {
    let mut candidates = cache
        .configs_for(fiscal_year, payment_category)
        .iter()
        .filter(|cfg| {
            let configured = match field {
                AmountField::Subsidy => cfg.subsidy_amount,
                AmountField::Personal => cfg.personal_amount,
            };
            (configured - amount).abs() < AMOUNT_EPSILON
        });

    let first = match candidates.next() {
        Some(cfg) => cfg,
        None => return TierResolution::NoMatch,
    };
    let extra = candidates.count();
    if extra > 0 {
        return TierResolution::Ambiguous {
            candidates: extra + 1,
        };
    }
    TierResolution::Matched {
        tier_name: first.tier_name.clone(),
        personal_amount: first.personal_amount,
    }
}
