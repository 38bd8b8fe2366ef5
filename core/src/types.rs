//! Shared primitive types used across the reconciliation core.

/// A fiscal year, e.g. 2025. Every table and every operation is scoped to one.
pub type FiscalYear = i32;

/// External identity number. Unique per person within a fiscal year.
pub type IdNumber = String;

/// 1-based position of a row in its source file, used in skip/error reports.
pub type RowNumber = usize;
