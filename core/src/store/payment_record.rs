use super::{PaymentRecordRow, PivotCellRow, ReconStore};
use crate::{
    error::ReconResult,
    status::MatchStatus,
    types::{FiscalYear, IdNumber},
};
use rusqlite::{params, OptionalExtension, ToSql};
use std::collections::HashSet;

const INSERT_COLUMNS: &str = "fiscal_year, id_number, name, jurisdiction, \
     payment_category, payment_amount, resolved_tier, resolved_personal_amount, \
     tier_status, identity_status, jurisdiction_status, composite_status";

impl ReconStore {
    pub fn insert_payment_record(&self, row: &PaymentRecordRow) -> ReconResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO payment_record ({INSERT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                row.fiscal_year,
                row.id_number,
                row.name,
                row.jurisdiction,
                row.payment_category,
                row.payment_amount,
                row.resolved_tier,
                row.resolved_personal_amount,
                row.tier_status,
                row.identity_status,
                row.jurisdiction_status,
                row.composite_status,
            ],
        )?;
        Ok(())
    }

    /// Insert a whole batch with one multi-row statement. Callers fall back
    /// to `insert_payment_record` per row when this fails, so one malformed
    /// row does not discard the batch.
    pub fn insert_payment_records_bulk(&self, rows: &[PaymentRecordRow]) -> ReconResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["(?,?,?,?,?,?,?,?,?,?,?,?)"; rows.len()].join(",");
        let sql = format!("INSERT INTO payment_record ({INSERT_COLUMNS}) VALUES {placeholders}");
        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(rows.len() * 12);
        for row in rows {
            values.push(&row.fiscal_year);
            values.push(&row.id_number);
            values.push(&row.name);
            values.push(&row.jurisdiction);
            values.push(&row.payment_category);
            values.push(&row.payment_amount);
            values.push(&row.resolved_tier);
            values.push(&row.resolved_personal_amount);
            values.push(&row.tier_status);
            values.push(&row.identity_status);
            values.push(&row.jurisdiction_status);
            values.push(&row.composite_status);
        }
        self.conn.execute(&sql, values.as_slice())?;
        Ok(())
    }

    /// Which of `id_numbers` already exist for the year. One round-trip for
    /// the whole batch — the incremental-mode duplicate pre-check.
    pub fn existing_id_numbers(
        &self,
        fiscal_year: FiscalYear,
        id_numbers: &[IdNumber],
    ) -> ReconResult<HashSet<IdNumber>> {
        if id_numbers.is_empty() {
            return Ok(HashSet::new());
        }
        let placeholders = vec!["?"; id_numbers.len()].join(",");
        let sql = format!(
            "SELECT id_number FROM payment_record
             WHERE fiscal_year = ? AND id_number IN ({placeholders})"
        );
        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(id_numbers.len() + 1);
        values.push(&fiscal_year);
        for id in id_numbers {
            values.push(id);
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let found = stmt
            .query_map(values.as_slice(), |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(found)
    }

    /// Full-mode overwrite: drop every record for the year in one statement.
    pub fn delete_records_for_year(&self, fiscal_year: FiscalYear) -> ReconResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM payment_record WHERE fiscal_year = ?1",
            params![fiscal_year],
        )?;
        Ok(n)
    }

    pub fn record_count(&self, fiscal_year: FiscalYear) -> ReconResult<i64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM payment_record WHERE fiscal_year = ?1",
            params![fiscal_year],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    pub fn get_payment_record(
        &self,
        fiscal_year: FiscalYear,
        id_number: &str,
    ) -> ReconResult<Option<PaymentRecordRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INSERT_COLUMNS} FROM payment_record
             WHERE fiscal_year = ?1 AND id_number = ?2"
        ))?;
        let row = stmt
            .query_row(params![fiscal_year, id_number], Self::map_payment_record)
            .optional()?;
        Ok(row)
    }

    /// All records for a year, ordered by id (test helper).
    pub fn records_for_year(&self, fiscal_year: FiscalYear) -> ReconResult<Vec<PaymentRecordRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INSERT_COLUMNS} FROM payment_record
             WHERE fiscal_year = ?1 ORDER BY id_number ASC"
        ))?;
        let rows = stmt
            .query_map(params![fiscal_year], Self::map_payment_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Reconciliation status updates ──────────────────────────
    //
    // Each statement writes one sub-status AND recomputes the composite in
    // the same UPDATE, so no reader can observe a sub-status change with a
    // stale composite. Returns false when no record exists for the key.

    pub fn set_identity_status(
        &self,
        fiscal_year: FiscalYear,
        id_number: &str,
        status: MatchStatus,
    ) -> ReconResult<bool> {
        let n = self.conn.execute(
            "UPDATE payment_record
             SET identity_status = ?3,
                 composite_status = CASE
                     WHEN tier_status = 'matched'
                      AND ?3 = 'matched'
                      AND jurisdiction_status = 'matched'
                     THEN 'matched' ELSE 'unmatched' END
             WHERE fiscal_year = ?1 AND id_number = ?2",
            params![fiscal_year, id_number, status],
        )?;
        Ok(n > 0)
    }

    pub fn set_jurisdiction_status(
        &self,
        fiscal_year: FiscalYear,
        id_number: &str,
        status: MatchStatus,
    ) -> ReconResult<bool> {
        let n = self.conn.execute(
            "UPDATE payment_record
             SET jurisdiction_status = ?3,
                 composite_status = CASE
                     WHEN tier_status = 'matched'
                      AND identity_status = 'matched'
                      AND ?3 = 'matched'
                     THEN 'matched' ELSE 'unmatched' END
             WHERE fiscal_year = ?1 AND id_number = ?2",
            params![fiscal_year, id_number, status],
        )?;
        Ok(n > 0)
    }

    /// Tier re-verification result: overwrites the ingestion-time resolution
    /// along with the status.
    pub fn set_tier_result(
        &self,
        fiscal_year: FiscalYear,
        id_number: &str,
        resolved_tier: Option<&str>,
        resolved_personal_amount: f64,
        status: MatchStatus,
    ) -> ReconResult<bool> {
        let n = self.conn.execute(
            "UPDATE payment_record
             SET resolved_tier = ?3,
                 resolved_personal_amount = ?4,
                 tier_status = ?5,
                 composite_status = CASE
                     WHEN ?5 = 'matched'
                      AND identity_status = 'matched'
                      AND jurisdiction_status = 'matched'
                     THEN 'matched' ELSE 'unmatched' END
             WHERE fiscal_year = ?1 AND id_number = ?2",
            params![
                fiscal_year,
                id_number,
                resolved_tier,
                resolved_personal_amount,
                status
            ],
        )?;
        Ok(n > 0)
    }

    // ── Pivot aggregate ────────────────────────────────────────

    /// One grouped query over tier-matched records with all three pivot
    /// dimensions present. Per-cell queries would not survive real volumes.
    pub fn aggregate_matched(&self, fiscal_year: FiscalYear) -> ReconResult<Vec<PivotCellRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT jurisdiction, payment_category, resolved_tier,
                    COUNT(*), COALESCE(SUM(payment_amount), 0.0)
             FROM payment_record
             WHERE fiscal_year = ?1
               AND tier_status = 'matched'
               AND jurisdiction <> ''
               AND payment_category <> ''
               AND COALESCE(resolved_tier, '') <> ''
             GROUP BY jurisdiction, payment_category, resolved_tier
             ORDER BY jurisdiction ASC, payment_category ASC, resolved_tier ASC",
        )?;
        let rows = stmt
            .query_map(params![fiscal_year], |row| {
                Ok(PivotCellRow {
                    jurisdiction: row.get(0)?,
                    payment_category: row.get(1)?,
                    tier_name: row.get(2)?,
                    count: row.get(3)?,
                    amount: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Sum of payment amounts over tier-matched records with all pivot
    /// dimensions present (test helper for the pivot totals invariant).
    pub fn sum_matched_amount(&self, fiscal_year: FiscalYear) -> ReconResult<f64> {
        let total: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(payment_amount), 0.0)
             FROM payment_record
             WHERE fiscal_year = ?1
               AND tier_status = 'matched'
               AND jurisdiction <> ''
               AND payment_category <> ''
               AND COALESCE(resolved_tier, '') <> ''",
            params![fiscal_year],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn map_payment_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentRecordRow> {
        Ok(PaymentRecordRow {
            fiscal_year: row.get(0)?,
            id_number: row.get(1)?,
            name: row.get(2)?,
            jurisdiction: row.get(3)?,
            payment_category: row.get(4)?,
            payment_amount: row.get(5)?,
            resolved_tier: row.get(6)?,
            resolved_personal_amount: row.get(7)?,
            tier_status: row.get(8)?,
            identity_status: row.get(9)?,
            jurisdiction_status: row.get(10)?,
            composite_status: row.get(11)?,
        })
    }
}
