//! Persistent derived-state cache.
//!
//! One JSON file per site memoizes values that are expensive to obtain (coordinates, geometry)
//! along with the output settings of the last run.

/// Closed key set and output consumers.
pub mod keys;
/// File-backed key/value store with dirty tracking.
pub mod state;
