//! Pipeline configuration.
//!
//! Loaded once per run from a JSON file (or built in code for tests) and
//! passed explicitly into the pipeline — no process-wide config statics.

use crate::error::{ReconError, ReconResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Maps the pipeline's logical fields to the (localized) column headers the
/// spreadsheet collaborator produces. Header text is deployment detail, so it
/// lives here rather than in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMap {
    pub name: String,
    pub id_number: String,
    pub jurisdiction: String,
    pub payment_category: String,
    pub payment_amount: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            name: "姓名".into(),
            id_number: "身份证号".into(),
            jurisdiction: "所属街道".into(),
            payment_category: "缴费类别".into(),
            payment_amount: "缴费金额".into(),
        }
    }
}

/// Category-equivalence table: canonical payment category → accepted textual
/// aliases. The canonical name always counts as its own alias.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryAliasTable {
    #[serde(default)]
    aliases: HashMap<String, Vec<String>>,
}

impl CategoryAliasTable {
    pub fn new(aliases: HashMap<String, Vec<String>>) -> Self {
        Self { aliases }
    }

    /// True when `claim` names `canonical` either directly or through a
    /// configured alias.
    pub fn matches(&self, canonical: &str, claim: &str) -> bool {
        if canonical == claim {
            return true;
        }
        self.aliases
            .get(canonical)
            .map_or(false, |alts| alts.iter().any(|a| a == claim))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rows per transaction. Bounds transaction size and memory.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Overall wall-clock budget for one ingestion run, in seconds.
    #[serde(default = "default_run_budget_secs")]
    pub run_budget_secs: u64,

    /// The single jurisdiction value this deployment administers.
    /// The jurisdiction pass accepts exactly this value and nothing else.
    pub accepted_jurisdiction: String,

    #[serde(default)]
    pub columns: ColumnMap,

    #[serde(default)]
    pub category_aliases: CategoryAliasTable,
}

fn default_batch_size() -> usize {
    100
}

fn default_run_budget_secs() -> u64 {
    1800
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            run_budget_secs: default_run_budget_secs(),
            accepted_jurisdiction: String::new(),
            columns: ColumnMap::default(),
            category_aliases: CategoryAliasTable::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> ReconResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ReconError::Config(format!("{}: {e}", path.display())))?;
        let cfg: PipelineConfig = serde_json::from_str(&text)?;
        if cfg.batch_size == 0 {
            return Err(ReconError::Config("batch_size must be >= 1".into()));
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_table_matches_canonical_and_aliases() {
        let mut m = HashMap::new();
        m.insert("低保户".to_string(), vec!["低保".to_string(), "城乡低保".to_string()]);
        let table = CategoryAliasTable::new(m);
        assert!(table.matches("低保户", "低保户"));
        assert!(table.matches("低保户", "城乡低保"));
        assert!(!table.matches("低保户", "特困"));
        assert!(table.matches("未配置类别", "未配置类别"));
    }
}
