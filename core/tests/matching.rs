//! Matching engine behaviour:
//! 1. Exactly one candidate within epsilon resolves to that tier
//! 2. No candidate is a distinct no-match (NULL tier)
//! 3. Two candidates sharing an amount is ambiguous (empty-string tier),
//!    never an arbitrary pick
//! 4. The personal-amount field drives the re-verification variant

use subsidy_recon_core::{
    matcher::{self, AmountField, TierResolution},
    status::MatchStatus,
    store::{ReconStore, TierConfigRow},
    tier_cache::TierCache,
};

fn tier(category: &str, name: &str, subsidy: f64, personal: f64) -> TierConfigRow {
    TierConfigRow {
        fiscal_year: 2025,
        payment_category: category.into(),
        tier_name: name.into(),
        subsidy_amount: subsidy,
        personal_amount: personal,
        effective_period: "2025".into(),
        paying_department: String::new(),
    }
}

fn cache_with(configs: &[TierConfigRow]) -> TierCache {
    let store = ReconStore::in_memory().expect("in_memory");
    store.migrate().expect("migrate");
    for cfg in configs {
        store.upsert_tier_config(cfg).expect("upsert");
    }
    let mut cache = TierCache::new();
    cache.load(&store, 2025).expect("load");
    cache
}

#[test]
fn unique_amount_resolves_to_its_tier() {
    let cache = cache_with(&[
        tier("CategoryA", "Tier1", 360.00, 40.00),
        tier("CategoryA", "Tier2", 600.00, 60.00),
    ]);
    let r = matcher::resolve(&cache, 2025, "CategoryA", 360.00, AmountField::Subsidy);
    assert_eq!(
        r,
        TierResolution::Matched {
            tier_name: "Tier1".into(),
            personal_amount: 40.00,
        }
    );
}

#[test]
fn no_candidate_is_no_match_with_null_tier() {
    let cache = cache_with(&[tier("CategoryA", "Tier1", 360.00, 40.00)]);
    let r = matcher::resolve(&cache, 2025, "CategoryA", 999.00, AmountField::Subsidy);
    assert_eq!(r, TierResolution::NoMatch);
    let (tier_name, personal, status) = r.into_record_fields();
    assert_eq!(tier_name, None);
    assert_eq!(personal, 0.0);
    assert_eq!(status, MatchStatus::Unmatched);
}

#[test]
fn unknown_category_is_no_match() {
    let cache = cache_with(&[tier("CategoryA", "Tier1", 360.00, 40.00)]);
    let r = matcher::resolve(&cache, 2025, "CategoryZ", 360.00, AmountField::Subsidy);
    assert_eq!(r, TierResolution::NoMatch);
}

#[test]
fn shared_amount_is_ambiguous_with_empty_tier_string() {
    let cache = cache_with(&[
        tier("CategoryA", "Tier1", 360.00, 40.00),
        tier("CategoryA", "Tier1b", 360.00, 45.00),
    ]);
    let r = matcher::resolve(&cache, 2025, "CategoryA", 360.00, AmountField::Subsidy);
    assert_eq!(r, TierResolution::Ambiguous { candidates: 2 });
    // Empty string, not NULL: operators must be able to tell "too many
    // configs" apart from "no config".
    let (tier_name, personal, status) = r.into_record_fields();
    assert_eq!(tier_name, Some(String::new()));
    assert_eq!(personal, 0.0);
    assert_eq!(status, MatchStatus::Unmatched);
}

#[test]
fn epsilon_admits_sub_cent_drift_only() {
    let cache = cache_with(&[tier("CategoryA", "Tier1", 360.00, 40.00)]);
    // Spreadsheet float drift well under a cent still matches.
    let close = matcher::resolve(&cache, 2025, "CategoryA", 360.005, AmountField::Subsidy);
    assert!(close.is_matched());
    // Two cents off is a different amount.
    let far = matcher::resolve(&cache, 2025, "CategoryA", 360.02, AmountField::Subsidy);
    assert_eq!(far, TierResolution::NoMatch);
}

#[test]
fn personal_field_selects_the_personal_amount_column() {
    let cache = cache_with(&[
        tier("CategoryA", "Tier1", 360.00, 40.00),
        tier("CategoryA", "Tier2", 600.00, 60.00),
    ]);
    let r = matcher::resolve(&cache, 2025, "CategoryA", 60.00, AmountField::Personal);
    assert_eq!(
        r,
        TierResolution::Matched {
            tier_name: "Tier2".into(),
            personal_amount: 60.00,
        }
    );
    // 360.00 is a subsidy amount, not a personal amount.
    let r = matcher::resolve(&cache, 2025, "CategoryA", 360.00, AmountField::Personal);
    assert_eq!(r, TierResolution::NoMatch);
}
