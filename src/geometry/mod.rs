//! Site coordinates and the bounds derived from them.

/// Direct geodesic solution and the default bounds calculator.
pub mod geodesy;
/// Site coordinate lookup.
pub mod locator;
/// Memoized derivation of coordinates and bounds.
pub mod pipeline;
