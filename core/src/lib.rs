//! Subsidy payment reconciliation core.
//!
//! The pipeline, end to end:
//!
//!   decoded rows → ingestion (matching engine ← tier cache)
//!               → persisted payment records
//!               → reconciliation passes (identity / jurisdiction / tier)
//!               → pivot builder → external rendering
//!
//! RULES:
//!   - Only the store talks to the database.
//!   - The tier cache is an explicit per-run object, never a static.
//!   - Row-local problems are report entries; `Err` means the run itself
//!     cannot continue (storage loss, timeout, bad configuration).

pub mod config;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod pivot;
pub mod reconcile;
pub mod row;
pub mod status;
pub mod store;
pub mod tier_cache;
pub mod types;
