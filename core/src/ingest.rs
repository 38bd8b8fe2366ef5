//! Batch Ingestion Pipeline.
//!
//! Converts decoded source rows into persisted payment records in
//! fixed-size batches, each inside its own transaction:
//!
//!   1. duplicate pre-check (incremental mode, one bulk query per batch)
//!   2. row validation (row-local skips, never batch-fatal)
//!   3. tier resolution through the matching engine
//!   4. bulk persist, with row-by-row fallback when the bulk insert fails
//!
//! Batches run strictly sequentially: a batch's duplicate pre-check must see
//! the commits of every earlier batch. A batch-fatal error rolls back only
//! its own batch; the run records the failure against that batch's row range
//! and continues. Concurrent runs for the same fiscal year are the caller's
//! responsibility to serialize.

use crate::{
    config::PipelineConfig,
    error::{ReconError, ReconResult},
    matcher::{self, AmountField, TierResolution},
    row::{SourceRow, ValidatedRow},
    status::{composite_of, MatchStatus},
    store::{IngestRunRow, PaymentRecordRow, ReconStore},
    tier_cache::TierCache,
    types::{FiscalYear, RowNumber},
};
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Skip rows whose (fiscal_year, id_number) already exists.
    Incremental,
    /// Delete all records for the year first, then load everything.
    Full,
}

impl IngestMode {
    pub fn as_str(self) -> &'static str {
        match self {
            IngestMode::Incremental => "incremental",
            IngestMode::Full => "full",
        }
    }
}

/// One row that did not make it into the database, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct RowSkip {
    pub row_number: RowNumber,
    pub reason: String,
}

/// One batch whose transaction rolled back entirely.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub first_row: RowNumber,
    pub last_row: RowNumber,
    pub reason: String,
}

/// Wall-clock spent per pipeline stage, summed across batches.
/// Used for tuning batch size against dataset size.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    pub precheck: Duration,
    pub validate: Duration,
    pub resolve: Duration,
    pub persist: Duration,
}

/// Everything a caller needs to render the outcome of one run.
/// Silent partial failure is never acceptable for a bulk tool, so the full
/// per-row skip list rides along with the counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub imported: u64,
    pub skipped: u64,
    pub matched: u64,
    pub unmatched: u64,
    /// Rows whose category/amount pair hit two or more configured tiers.
    /// A data-quality signal distinct from plain no-match.
    pub ambiguous: u64,
    pub skips: Vec<RowSkip>,
    pub failed_batches: Vec<BatchFailure>,
    pub timings: StageTimings,
}

/// Counters and prepared records for one batch, merged into the report only
/// after the batch's transaction commits.
#[derive(Debug, Default)]
struct BatchSummary {
    imported: u64,
    matched: u64,
    unmatched: u64,
    ambiguous: u64,
    skips: Vec<RowSkip>,
    timings: StageTimings,
}

/// A resolved row waiting to be persisted. The resolution outcome rides
/// along so match counters can be tallied per persisted record — a row that
/// fails the persist fallback counts as a skip, never as matched.
#[derive(Debug)]
struct PreparedRow {
    row_number: RowNumber,
    ambiguous: bool,
    record: PaymentRecordRow,
}

impl BatchSummary {
    fn tally_persisted(&mut self, prepared: &PreparedRow) {
        self.imported += 1;
        if prepared.record.tier_status.is_matched() {
            self.matched += 1;
        } else {
            self.unmatched += 1;
            if prepared.ambiguous {
                self.ambiguous += 1;
            }
        }
    }
}

pub struct IngestPipeline<'a> {
    store: &'a ReconStore,
    config: &'a PipelineConfig,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(store: &'a ReconStore, config: &'a PipelineConfig) -> Self {
        Self { store, config }
    }

    /// Run one ingestion. Loads the tier cache for the year (idempotent),
    /// then processes `rows` in `config.batch_size` chunks.
    pub fn run(
        &self,
        cache: &mut TierCache,
        rows: &[SourceRow],
        fiscal_year: FiscalYear,
        mode: IngestMode,
    ) -> ReconResult<IngestReport> {
        let started = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();
        cache.load(self.store, fiscal_year)?;
        let cache = &*cache;

        if mode == IngestMode::Full {
            let deleted = self.store.delete_records_for_year(fiscal_year)?;
            log::info!("ingest year={fiscal_year} full mode: deleted {deleted} existing records");
        }

        let mut report = IngestReport::default();
        let mut timed_out: Option<ReconError> = None;

        for batch in rows.chunks(self.config.batch_size.max(1)) {
            if let Err(e) = self.check_budget(started) {
                timed_out = Some(e);
                break;
            }

            let first_row = batch.first().map(|r| r.row_number).unwrap_or(0);
            let last_row = batch.last().map(|r| r.row_number).unwrap_or(0);

            let outcome = self
                .store
                .in_transaction(|store| self.process_batch(store, cache, batch, fiscal_year, mode));

            match outcome {
                Ok(summary) => {
                    report.imported += summary.imported;
                    report.matched += summary.matched;
                    report.unmatched += summary.unmatched;
                    report.ambiguous += summary.ambiguous;
                    report.skipped += summary.skips.len() as u64;
                    report.skips.extend(summary.skips);
                    report.timings.precheck += summary.timings.precheck;
                    report.timings.validate += summary.timings.validate;
                    report.timings.resolve += summary.timings.resolve;
                    report.timings.persist += summary.timings.persist;
                }
                Err(e) => {
                    // The whole batch rolled back. Earlier batches are
                    // committed and later batches still run.
                    log::warn!(
                        "ingest year={fiscal_year} batch rows {first_row}-{last_row} failed: {e}"
                    );
                    report.failed_batches.push(BatchFailure {
                        first_row,
                        last_row,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // The audit row is written for every run, timed-out ones included:
        // committed batches are retained, so the partial counters are real.
        let elapsed = started.elapsed();
        self.store.insert_ingest_run(&IngestRunRow {
            run_id: uuid::Uuid::new_v4().to_string(),
            fiscal_year,
            mode: mode.as_str().to_string(),
            started_at,
            imported: report.imported as i64,
            skipped: report.skipped as i64,
            elapsed_ms: elapsed.as_millis() as i64,
        })?;

        if let Some(e) = timed_out {
            log::warn!(
                "ingest year={fiscal_year} aborted: {e}; imported={} so far is retained",
                report.imported
            );
            return Err(e);
        }

        log::info!(
            "ingest year={fiscal_year} mode={} done in {elapsed:?}: \
             imported={} skipped={} matched={} unmatched={} ambiguous={} failed_batches={}",
            mode.as_str(),
            report.imported,
            report.skipped,
            report.matched,
            report.unmatched,
            report.ambiguous,
            report.failed_batches.len(),
        );

        Ok(report)
    }

    fn check_budget(&self, started: Instant) -> ReconResult<()> {
        let elapsed = started.elapsed();
        if elapsed.as_secs() >= self.config.run_budget_secs {
            return Err(ReconError::Timeout {
                elapsed_secs: elapsed.as_secs(),
                budget_secs: self.config.run_budget_secs,
            });
        }
        Ok(())
    }

    /// One batch, already inside its transaction.
    fn process_batch(
        &self,
        store: &ReconStore,
        cache: &TierCache,
        batch: &[SourceRow],
        fiscal_year: FiscalYear,
        mode: IngestMode,
    ) -> ReconResult<BatchSummary> {
        let mut summary = BatchSummary::default();
        let columns = &self.config.columns;

        // Stage 1: duplicate pre-check — one bulk query for the whole batch
        // instead of one round-trip per row.
        let stage = Instant::now();
        let existing: HashSet<String> = if mode == IngestMode::Incremental {
            let ids: Vec<String> = batch
                .iter()
                .filter_map(|r| r.value(&columns.id_number))
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
            store.existing_id_numbers(fiscal_year, &ids)?
        } else {
            HashSet::new()
        };
        summary.timings.precheck += stage.elapsed();

        // Stage 2: validation. Failures are row-local skips.
        let stage = Instant::now();
        let mut valid: Vec<ValidatedRow> = Vec::with_capacity(batch.len());
        // Duplicates within one source file: first occurrence wins.
        let mut seen_in_batch: HashSet<String> = HashSet::new();
        for row in batch {
            match ValidatedRow::from_source(row, columns) {
                Ok(v) => {
                    if existing.contains(&v.id_number) {
                        summary.skips.push(RowSkip {
                            row_number: v.row_number,
                            reason: format!("duplicate: id {} already imported", v.id_number),
                        });
                    } else if !seen_in_batch.insert(v.id_number.clone()) {
                        summary.skips.push(RowSkip {
                            row_number: v.row_number,
                            reason: format!("duplicate: id {} repeated in source", v.id_number),
                        });
                    } else {
                        valid.push(v);
                    }
                }
                Err(reason) => {
                    summary.skips.push(RowSkip {
                        row_number: row.row_number,
                        reason,
                    });
                }
            }
        }
        summary.timings.validate += stage.elapsed();

        // Stage 3: tier resolution. The outcome rides along with each row;
        // counters are tallied in stage 4, per record actually persisted.
        let stage = Instant::now();
        let mut prepared: Vec<PreparedRow> = Vec::with_capacity(valid.len());
        for v in valid {
            let resolution = matcher::resolve(
                cache,
                fiscal_year,
                &v.payment_category,
                v.payment_amount,
                AmountField::Subsidy,
            );
            let ambiguous = matches!(resolution, TierResolution::Ambiguous { .. });
            if let TierResolution::Ambiguous { candidates } = &resolution {
                log::warn!(
                    "ingest year={fiscal_year} row {}: {candidates} tiers share \
                     category '{}' amount {:.2}; refusing to pick",
                    v.row_number,
                    v.payment_category,
                    v.payment_amount,
                );
            }
            let (resolved_tier, resolved_personal_amount, tier_status) =
                resolution.into_record_fields();
            prepared.push(PreparedRow {
                row_number: v.row_number,
                ambiguous,
                record: PaymentRecordRow {
                    fiscal_year,
                    id_number: v.id_number,
                    name: v.name,
                    jurisdiction: v.jurisdiction,
                    payment_category: v.payment_category,
                    payment_amount: v.payment_amount,
                    resolved_tier,
                    resolved_personal_amount,
                    tier_status,
                    identity_status: MatchStatus::Unset,
                    jurisdiction_status: MatchStatus::Unset,
                    // Identity and jurisdiction passes have not run yet, so
                    // this always starts Unmatched.
                    composite_status: composite_of(
                        tier_status,
                        MatchStatus::Unset,
                        MatchStatus::Unset,
                    ),
                },
            });
        }
        summary.timings.resolve += stage.elapsed();

        // Stage 4: persist. One bulk insert; on failure fall back to single
        // inserts so one malformed row does not discard the batch. A row the
        // fallback still cannot insert is a skip and must not inflate the
        // match counters.
        let stage = Instant::now();
        let rows_only: Vec<PaymentRecordRow> =
            prepared.iter().map(|p| p.record.clone()).collect();
        match store.insert_payment_records_bulk(&rows_only) {
            Ok(()) => {
                for p in &prepared {
                    summary.tally_persisted(p);
                }
            }
            Err(bulk_err) => {
                log::warn!(
                    "ingest year={fiscal_year}: bulk insert of {} rows failed ({bulk_err}), \
                     retrying row by row",
                    rows_only.len()
                );
                for p in &prepared {
                    match store.insert_payment_record(&p.record) {
                        Ok(()) => summary.tally_persisted(p),
                        Err(e) => summary.skips.push(RowSkip {
                            row_number: p.row_number,
                            reason: format!("insert failed: {e}"),
                        }),
                    }
                }
            }
        }
        summary.timings.persist += stage.elapsed();

        log::debug!(
            "ingest year={fiscal_year} batch of {}: imported={} skipped={}",
            batch.len(),
            summary.imported,
            summary.skips.len(),
        );

        Ok(summary)
    }
}
