//! Numbered output frames and their reconciliation against a requested count.

/// Directory scan and surplus deletion.
pub mod reconcile;
/// Frame naming template.
pub mod template;
