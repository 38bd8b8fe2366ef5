//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Pipeline code calls store methods — it never executes SQL directly.

use crate::{
    error::ReconResult,
    status::MatchStatus,
    types::{FiscalYear, IdNumber},
};
use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ToSql};

mod payment_record;
mod tier_config;

pub struct ReconStore {
    conn: Connection,
}

impl ReconStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> ReconResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ReconResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ReconResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_tier_config.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_payment_record.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_ingest_run.sql"))?;
        Ok(())
    }

    /// Run `f` inside one transaction. Commit on Ok, roll back on Err.
    /// Batch ingestion wraps each batch in one of these so a bad batch
    /// cannot disturb previously committed batches.
    pub fn in_transaction<T>(
        &self,
        f: impl FnOnce(&Self) -> ReconResult<T>,
    ) -> ReconResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        match f(self) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            // Dropping the transaction rolls it back.
            Err(e) => Err(e),
        }
    }

    /// Lower this connection's bound-variable cap (test helper). Statements
    /// that bind more parameters than `n` fail at prepare time, which lets
    /// tests force a batch-fatal store error on demand.
    pub fn set_max_bound_variables(&self, n: i32) {
        let _ = self
            .conn
            .set_limit(rusqlite::limits::Limit::SQLITE_LIMIT_VARIABLE_NUMBER, n);
    }

    // ── Ingest run audit ───────────────────────────────────────

    pub fn insert_ingest_run(&self, run: &IngestRunRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO ingest_run
             (run_id, fiscal_year, mode, started_at, imported, skipped, elapsed_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run.run_id,
                run.fiscal_year,
                run.mode,
                run.started_at,
                run.imported,
                run.skipped,
                run.elapsed_ms,
            ],
        )?;
        Ok(())
    }

    pub fn ingest_runs_for_year(&self, fiscal_year: FiscalYear) -> ReconResult<Vec<IngestRunRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, fiscal_year, mode, started_at, imported, skipped, elapsed_ms
             FROM ingest_run WHERE fiscal_year = ?1
             ORDER BY started_at ASC",
        )?;
        let rows = stmt
            .query_map(params![fiscal_year], |row| {
                Ok(IngestRunRow {
                    run_id: row.get(0)?,
                    fiscal_year: row.get(1)?,
                    mode: row.get(2)?,
                    started_at: row.get(3)?,
                    imported: row.get(4)?,
                    skipped: row.get(5)?,
                    elapsed_ms: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// Status columns are TEXT; the enum binds and reads directly so row structs
// can carry MatchStatus instead of raw strings.
impl ToSql for MatchStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MatchStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(MatchStatus::from_db)
    }
}

// ── Row structs ────────────────────────────────────────────────

/// One subsidy tier for one (year, category). Multiple rows may share
/// (fiscal_year, payment_category) with distinct subsidy amounts.
#[derive(Debug, Clone, PartialEq)]
pub struct TierConfigRow {
    pub fiscal_year: FiscalYear,
    pub payment_category: String,
    pub tier_name: String,
    pub subsidy_amount: f64,
    pub personal_amount: f64,
    pub effective_period: String,
    pub paying_department: String,
}

/// One person's one-year subsidized payment with its reconciliation state.
#[derive(Debug, Clone)]
pub struct PaymentRecordRow {
    pub fiscal_year: FiscalYear,
    pub id_number: IdNumber,
    pub name: String,
    pub jurisdiction: String,
    pub payment_category: String,
    pub payment_amount: f64,
    /// None = no tier resolved; Some("") = ambiguous configuration, held
    /// for operator review. The distinction is deliberate.
    pub resolved_tier: Option<String>,
    pub resolved_personal_amount: f64,
    pub tier_status: MatchStatus,
    pub identity_status: MatchStatus,
    pub jurisdiction_status: MatchStatus,
    pub composite_status: MatchStatus,
}

/// One grouped aggregate cell from the pivot query.
#[derive(Debug, Clone)]
pub struct PivotCellRow {
    pub jurisdiction: String,
    pub payment_category: String,
    pub tier_name: String,
    pub count: i64,
    pub amount: f64,
}

/// Audit row written at the end of every ingestion run.
#[derive(Debug, Clone)]
pub struct IngestRunRow {
    pub run_id: String,
    pub fiscal_year: FiscalYear,
    pub mode: String,
    pub started_at: String,
    pub imported: i64,
    pub skipped: i64,
    pub elapsed_ms: i64,
}
