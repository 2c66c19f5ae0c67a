//! climind: computation of standardized climate indices over gridded daily
//! time series.
//!
//! The engine lives in the `climind-core` crate: calendar-aware frequencies,
//! percentile thresholds with leave-one-year-out bootstrap, and the indicator
//! operator algebra. This crate adds the user-facing layer: the user-defined
//! index dispatcher and the orchestration that resolves thresholds, runs one
//! operator and attaches reproducibility metadata for downstream CF-attribute
//! generation.
//!
//! The engine performs no I/O. Callers supply in-memory arrays with a time
//! axis and unit metadata and receive per-period values back.

pub mod index;
pub mod user_index;

pub use index::{compute, compute_user_index, IndexConfig, IndexMetadata, IndexResult, Operator};
pub use user_index::{UserIndex, UserIndexConfig, CALC_OPERATIONS};
