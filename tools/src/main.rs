//! recon-runner: headless driver for the subsidy reconciliation core.
//!
//! Row files are JSON produced by the spreadsheet-decoding collaborator —
//! this binary never parses spreadsheets itself.
//!
//! Usage:
//!   recon-runner --db recon.db --year 2025 --seed-tiers tiers.json
//!   recon-runner --db recon.db --year 2025 --ingest rows.json --mode full
//!   recon-runner --db recon.db --year 2025 --identity claims.json
//!   recon-runner --db recon.db --year 2025 --jurisdiction claims.json
//!   recon-runner --db recon.db --year 2025 --tier claims.json
//!   recon-runner --db recon.db --year 2025 --pivot

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::Path;
use subsidy_recon_core::{
    config::PipelineConfig,
    ingest::{IngestMode, IngestPipeline},
    pivot,
    reconcile::{
        run_identity_pass, run_jurisdiction_pass, run_tier_pass, IdentityClaim,
        JurisdictionClaim, PersonalPaymentClaim,
    },
    row::SourceRow,
    store::{ReconStore, TierConfigRow},
    tier_cache::TierCache,
    types::FiscalYear,
};

#[derive(serde::Deserialize)]
struct TierSeed {
    payment_category: String,
    tier_name: String,
    subsidy_amount: f64,
    personal_amount: f64,
    #[serde(default)]
    effective_period: String,
    #[serde(default)]
    paying_department: String,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let year: FiscalYear = flag_value(&args, "--year")
        .context("--year is required")?
        .parse()
        .context("--year must be an integer")?;

    let config = match flag_value(&args, "--config") {
        Some(path) => PipelineConfig::load(Path::new(path))?,
        None => PipelineConfig::default(),
    };

    let store = ReconStore::open(db)?;
    store.migrate()?;

    let mut did_anything = false;

    if let Some(path) = flag_value(&args, "--seed-tiers") {
        let seeds: Vec<TierSeed> = read_json(path)?;
        for seed in &seeds {
            store.upsert_tier_config(&TierConfigRow {
                fiscal_year: year,
                payment_category: seed.payment_category.clone(),
                tier_name: seed.tier_name.clone(),
                subsidy_amount: seed.subsidy_amount,
                personal_amount: seed.personal_amount,
                effective_period: seed.effective_period.clone(),
                paying_department: seed.paying_department.clone(),
            })?;
        }
        log::info!("seeded {} tier configs for year {year}", seeds.len());
        did_anything = true;
    }

    if let Some(path) = flag_value(&args, "--ingest") {
        let mode = match flag_value(&args, "--mode").unwrap_or("incremental") {
            "incremental" => IngestMode::Incremental,
            "full" => IngestMode::Full,
            other => bail!("unknown --mode '{other}' (expected incremental|full)"),
        };
        let rows: Vec<SourceRow> = read_json(path)?;
        let mut cache = TierCache::new();
        let pipeline = IngestPipeline::new(&store, &config);
        let report = pipeline.run(&mut cache, &rows, year, mode)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        did_anything = true;
    }

    if let Some(path) = flag_value(&args, "--identity") {
        let claims: Vec<IdentityClaim> = read_json(path)?;
        let report = run_identity_pass(&store, &config.category_aliases, year, &claims)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        did_anything = true;
    }

    if let Some(path) = flag_value(&args, "--jurisdiction") {
        let claims: Vec<JurisdictionClaim> = read_json(path)?;
        let report =
            run_jurisdiction_pass(&store, &config.accepted_jurisdiction, year, &claims)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        did_anything = true;
    }

    if let Some(path) = flag_value(&args, "--tier") {
        let claims: Vec<PersonalPaymentClaim> = read_json(path)?;
        let mut cache = TierCache::new();
        let report = run_tier_pass(&store, &mut cache, year, &claims)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        did_anything = true;
    }

    if args.iter().any(|a| a == "--pivot") {
        let result = pivot::summarize(&store, year)?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        did_anything = true;
    }

    if !did_anything {
        bail!(
            "nothing to do: pass --seed-tiers, --ingest, --identity, \
             --jurisdiction, --tier, or --pivot"
        );
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {path}"))
}
