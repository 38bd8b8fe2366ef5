use super::{ReconStore, TierConfigRow};
use crate::{error::ReconResult, types::FiscalYear};
use rusqlite::params;

impl ReconStore {
    /// Insert or replace one tier configuration row. Configuration screens
    /// own the data; the pipeline (and tests) only seed it through here.
    pub fn upsert_tier_config(&self, row: &TierConfigRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO tier_config
             (fiscal_year, payment_category, tier_name, subsidy_amount,
              personal_amount, effective_period, paying_department)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.fiscal_year,
                row.payment_category,
                row.tier_name,
                row.subsidy_amount,
                row.personal_amount,
                row.effective_period,
                row.paying_department,
            ],
        )?;
        Ok(())
    }

    /// All tier configuration for one fiscal year, ordered for stable
    /// cache and pivot-column layout.
    pub fn tier_configs_for_year(&self, fiscal_year: FiscalYear) -> ReconResult<Vec<TierConfigRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT fiscal_year, payment_category, tier_name, subsidy_amount,
                    personal_amount, effective_period, paying_department
             FROM tier_config
             WHERE fiscal_year = ?1
             ORDER BY payment_category ASC, tier_name ASC",
        )?;
        let rows = stmt
            .query_map(params![fiscal_year], |row| {
                Ok(TierConfigRow {
                    fiscal_year: row.get(0)?,
                    payment_category: row.get(1)?,
                    tier_name: row.get(2)?,
                    subsidy_amount: row.get(3)?,
                    personal_amount: row.get(4)?,
                    effective_period: row.get(5)?,
                    paying_department: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every configured (payment_category, tier_name) pair for the year.
    /// The pivot builder uses this so configuration, not observed data,
    /// decides the column set.
    pub fn tier_columns_for_year(
        &self,
        fiscal_year: FiscalYear,
    ) -> ReconResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT payment_category, tier_name
             FROM tier_config
             WHERE fiscal_year = ?1
             ORDER BY payment_category ASC, tier_name ASC",
        )?;
        let rows = stmt
            .query_map(params![fiscal_year], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
