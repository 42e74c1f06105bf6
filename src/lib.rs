//! mr-radar derives and caches the geometry that radar imagery is rendered against.
//!
//! The public API is job-oriented:
//!
//! - Build [`Settings`] once at process start
//! - Open a [`RenderJob`] for a [`Consumer`] and a site
//! - [`RenderJob::prepare`] derives (or reuses) coordinates and bounds and returns a
//!   [`RenderManifest`] for the renderer
//! - [`RenderJob::finish`] trims surplus frames and flushes the per-site [`StateStore`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod artifacts;
pub mod config;
mod foundation;
pub mod geometry;
pub mod job;
pub mod store;

pub use crate::foundation::core::{
    BoundingBox, Envelope, FrameCount, GeoJsonPolygon, LatLon, Radius, Rect, SiteId,
};
pub use crate::foundation::error::{RadarError, RadarResult};

pub use crate::artifacts::reconcile::{ReconcileReport, discover, reconcile};
pub use crate::artifacts::template::FrameTemplate;
pub use crate::config::Settings;
pub use crate::geometry::geodesy::{BoundsCalculator, GeodesicBounds, destination};
pub use crate::geometry::locator::{NoLocator, SiteLocator, StationTable};
pub use crate::geometry::pipeline::{Bounds, GeometryPipeline};
pub use crate::job::{OutputLayout, RenderJob, RenderManifest, StateSnapshot};
pub use crate::store::keys::{CacheKey, Consumer};
pub use crate::store::state::StateStore;
