//! Multi-stage reconciliation behaviour:
//! 1. Identity pass honours the category-alias table
//! 2. Jurisdiction pass accepts exactly the configured value
//! 3. Tier pass re-resolves on the personal-paid amount and overwrites the
//!    ingestion-time tier
//! 4. The composite status is the AND of the three sub-statuses after every
//!    write, in any pass order
//! 5. A claim without a record is a per-row error, not a pass abort

use std::collections::HashMap;
use subsidy_recon_core::{
    config::CategoryAliasTable,
    reconcile::{
        run_identity_pass, run_jurisdiction_pass, run_tier_pass, IdentityClaim,
        JurisdictionClaim, PersonalPaymentClaim,
    },
    status::MatchStatus,
    store::{PaymentRecordRow, ReconStore, TierConfigRow},
    tier_cache::TierCache,
};

fn seeded_store() -> ReconStore {
    let store = ReconStore::in_memory().expect("in_memory");
    store.migrate().expect("migrate");
    for (tier, subsidy, personal) in [("Tier1", 360.00, 40.00), ("Tier2", 600.00, 60.00)] {
        store
            .upsert_tier_config(&TierConfigRow {
                fiscal_year: 2025,
                payment_category: "CategoryA".into(),
                tier_name: tier.into(),
                subsidy_amount: subsidy,
                personal_amount: personal,
                effective_period: "2025".into(),
                paying_department: String::new(),
            })
            .expect("upsert");
    }
    store
}

/// A record as ingestion leaves it: tier matched, other passes unset.
fn ingested_record(id: &str) -> PaymentRecordRow {
    PaymentRecordRow {
        fiscal_year: 2025,
        id_number: id.into(),
        name: format!("Person {id}"),
        jurisdiction: "Town".into(),
        payment_category: "CategoryA".into(),
        payment_amount: 360.00,
        resolved_tier: Some("Tier1".into()),
        resolved_personal_amount: 40.00,
        tier_status: MatchStatus::Matched,
        identity_status: MatchStatus::Unset,
        jurisdiction_status: MatchStatus::Unset,
        composite_status: MatchStatus::Unmatched,
    }
}

fn aliases() -> CategoryAliasTable {
    let mut m = HashMap::new();
    m.insert(
        "CategoryA".to_string(),
        vec!["Category A (legacy)".to_string(), "Cat-A".to_string()],
    );
    CategoryAliasTable::new(m)
}

fn identity_claim(n: usize, id: &str, category: &str) -> IdentityClaim {
    IdentityClaim {
        row_number: n,
        id_number: id.into(),
        claimed_category: category.into(),
    }
}

#[test]
fn identity_pass_accepts_canonical_and_aliases() {
    let store = seeded_store();
    for id in ["X1", "X2", "X3"] {
        store.insert_payment_record(&ingested_record(id)).expect("insert");
    }
    let claims = vec![
        identity_claim(1, "X1", "CategoryA"),
        identity_claim(2, "X2", "Cat-A"),
        identity_claim(3, "X3", "CategoryB"),
    ];
    let report = run_identity_pass(&store, &aliases(), 2025, &claims).expect("pass");
    assert_eq!(report.matched, 2);
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.missing, 0);

    let rec = store.get_payment_record(2025, "X2").expect("q").expect("rec");
    assert_eq!(rec.identity_status, MatchStatus::Matched);
    let rec = store.get_payment_record(2025, "X3").expect("q").expect("rec");
    assert_eq!(rec.identity_status, MatchStatus::Unmatched);
    assert_eq!(rec.composite_status, MatchStatus::Unmatched);
}

#[test]
fn jurisdiction_pass_accepts_only_the_configured_value() {
    let store = seeded_store();
    store.insert_payment_record(&ingested_record("X1")).expect("insert");
    store.insert_payment_record(&ingested_record("X2")).expect("insert");

    let claims = vec![
        JurisdictionClaim {
            row_number: 1,
            id_number: "X1".into(),
            claimed_jurisdiction: "Town".into(),
        },
        JurisdictionClaim {
            row_number: 2,
            id_number: "X2".into(),
            claimed_jurisdiction: "Elsewhere".into(),
        },
    ];
    let report = run_jurisdiction_pass(&store, "Town", 2025, &claims).expect("pass");
    assert_eq!(report.matched, 1);
    assert_eq!(report.unmatched, 1);

    let rec = store.get_payment_record(2025, "X1").expect("q").expect("rec");
    assert_eq!(rec.jurisdiction_status, MatchStatus::Matched);
    let rec = store.get_payment_record(2025, "X2").expect("q").expect("rec");
    assert_eq!(rec.jurisdiction_status, MatchStatus::Unmatched);
}

#[test]
fn tier_pass_reresolves_on_personal_amount_and_overwrites() {
    let store = seeded_store();
    store.insert_payment_record(&ingested_record("X1")).expect("insert");
    store.insert_payment_record(&ingested_record("X2")).expect("insert");

    let claims = vec![
        // Personal 60.00 belongs to Tier2: the ingestion-time Tier1 is replaced.
        PersonalPaymentClaim {
            row_number: 1,
            id_number: "X1".into(),
            personal_paid_amount: 60.00,
        },
        // No tier has personal 75.00: resolution is cleared to NULL.
        PersonalPaymentClaim {
            row_number: 2,
            id_number: "X2".into(),
            personal_paid_amount: 75.00,
        },
    ];
    let mut cache = TierCache::new();
    let report = run_tier_pass(&store, &mut cache, 2025, &claims).expect("pass");
    assert_eq!(report.matched, 1);
    assert_eq!(report.unmatched, 1);

    let rec = store.get_payment_record(2025, "X1").expect("q").expect("rec");
    assert_eq!(rec.resolved_tier.as_deref(), Some("Tier2"));
    assert_eq!(rec.resolved_personal_amount, 60.00);
    assert_eq!(rec.tier_status, MatchStatus::Matched);

    let rec = store.get_payment_record(2025, "X2").expect("q").expect("rec");
    assert_eq!(rec.resolved_tier, None);
    assert_eq!(rec.resolved_personal_amount, 0.0);
    assert_eq!(rec.tier_status, MatchStatus::Unmatched);
}

#[test]
fn composite_is_the_and_of_all_three_after_every_write() {
    let store = seeded_store();
    store.insert_payment_record(&ingested_record("X1")).expect("insert");

    // Identity matched: 2 of 3 → still unmatched.
    run_identity_pass(&store, &aliases(), 2025, &[identity_claim(1, "X1", "CategoryA")])
        .expect("identity");
    let rec = store.get_payment_record(2025, "X1").expect("q").expect("rec");
    assert_eq!(rec.composite_status, MatchStatus::Unmatched);

    // Jurisdiction matched: all 3 → composite flips to matched.
    run_jurisdiction_pass(
        &store,
        "Town",
        2025,
        &[JurisdictionClaim {
            row_number: 1,
            id_number: "X1".into(),
            claimed_jurisdiction: "Town".into(),
        }],
    )
    .expect("jurisdiction");
    let rec = store.get_payment_record(2025, "X1").expect("q").expect("rec");
    assert_eq!(rec.composite_status, MatchStatus::Matched);

    // Tier re-verification fails: composite must fall back with it.
    let mut cache = TierCache::new();
    run_tier_pass(
        &store,
        &mut cache,
        2025,
        &[PersonalPaymentClaim {
            row_number: 1,
            id_number: "X1".into(),
            personal_paid_amount: 75.00,
        }],
    )
    .expect("tier");
    let rec = store.get_payment_record(2025, "X1").expect("q").expect("rec");
    assert_eq!(rec.tier_status, MatchStatus::Unmatched);
    assert_eq!(rec.composite_status, MatchStatus::Unmatched);
}

#[test]
fn composite_holds_regardless_of_pass_order() {
    let store = seeded_store();
    store.insert_payment_record(&ingested_record("X1")).expect("insert");

    // Jurisdiction first, identity second — same end state.
    run_jurisdiction_pass(
        &store,
        "Town",
        2025,
        &[JurisdictionClaim {
            row_number: 1,
            id_number: "X1".into(),
            claimed_jurisdiction: "Town".into(),
        }],
    )
    .expect("jurisdiction");
    let rec = store.get_payment_record(2025, "X1").expect("q").expect("rec");
    assert_eq!(rec.composite_status, MatchStatus::Unmatched);

    run_identity_pass(&store, &aliases(), 2025, &[identity_claim(1, "X1", "CategoryA")])
        .expect("identity");
    let rec = store.get_payment_record(2025, "X1").expect("q").expect("rec");
    assert_eq!(rec.composite_status, MatchStatus::Matched);
}

#[test]
fn missing_record_is_reported_and_the_pass_continues() {
    let store = seeded_store();
    store.insert_payment_record(&ingested_record("X1")).expect("insert");

    let claims = vec![
        identity_claim(1, "GHOST", "CategoryA"),
        identity_claim(2, "X1", "CategoryA"),
    ];
    let report = run_identity_pass(&store, &aliases(), 2025, &claims).expect("pass");
    assert_eq!(report.missing, 1);
    assert_eq!(report.matched, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row_number, 1);
    assert!(report.errors[0].reason.contains("GHOST"));

    // The surviving claim was still applied.
    let rec = store.get_payment_record(2025, "X1").expect("q").expect("rec");
    assert_eq!(rec.identity_status, MatchStatus::Matched);
}
