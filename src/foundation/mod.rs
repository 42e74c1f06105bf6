/// Validated domain values shared by every layer.
pub mod core;
/// Error taxonomy.
pub mod error;
