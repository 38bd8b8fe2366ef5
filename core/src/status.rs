//! Match status tri-state.
//!
//! RULE: the composite status is never written independently — every store
//! method that sets a sub-status recomputes the composite in the same SQL
//! statement, so the invariant below is mechanically enforced:
//!
//!   composite = Matched  iff  tier ∧ identity ∧ jurisdiction all Matched
//!   composite = Unmatched otherwise (once anything has been written)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Unmatched,
    /// Column default before the owning pass has run. Never written by code.
    Unset,
}

impl MatchStatus {
    /// Stable TEXT form stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Unmatched => "unmatched",
            MatchStatus::Unset => "unset",
        }
    }

    /// Parse the stored TEXT form. Unknown text maps to `Unset` so a
    /// hand-edited database degrades to "pass has not run" rather than
    /// poisoning reads.
    pub fn from_db(s: &str) -> MatchStatus {
        match s {
            "matched" => MatchStatus::Matched,
            "unmatched" => MatchStatus::Unmatched,
            _ => MatchStatus::Unset,
        }
    }

    pub fn is_matched(self) -> bool {
        self == MatchStatus::Matched
    }
}

/// The composite rule, in one place for tests and in-memory checks.
/// The store mirrors this with a SQL CASE in its status-update statements.
pub fn composite_of(tier: MatchStatus, identity: MatchStatus, jurisdiction: MatchStatus) -> MatchStatus {
    if tier.is_matched() && identity.is_matched() && jurisdiction.is_matched() {
        MatchStatus::Matched
    } else {
        MatchStatus::Unmatched
    }
}
