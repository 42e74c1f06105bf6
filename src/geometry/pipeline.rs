use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::foundation::core::{BoundingBox, Envelope, LatLon, Radius, SiteId};
use crate::foundation::error::{RadarError, RadarResult};
use crate::geometry::geodesy::{BoundsCalculator, GeodesicBounds, bounds_from_points};
use crate::geometry::locator::SiteLocator;
use crate::store::keys::CacheKey;
use crate::store::state::StateStore;

/// Bounds derived for the current radius.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Bounds {
    /// Radius the bounds were derived for.
    pub radius: Radius,
    /// `[west, south, east, north]`.
    pub bbox: BoundingBox,
    /// Rectangle polygon of `bbox`.
    pub envelope: Envelope,
}

/// Derives and memoizes site coordinates and bounds in the site's [`StateStore`].
///
/// Lifecycle per run: `set_site_id` binds the store, `set_radius` records the radius (dropping
/// bounds derived for a different one), `ensure_geometry` fills whatever is missing. Coordinates
/// do not depend on the radius and survive radius changes.
pub struct GeometryPipeline {
    output_root: PathBuf,
    store: StateStore,
    site: Option<SiteId>,
    locator: Box<dyn SiteLocator>,
    bounds: Box<dyn BoundsCalculator>,
}

impl GeometryPipeline {
    /// Create a pipeline whose store files live under `output_root`.
    pub fn new(output_root: impl Into<PathBuf>, locator: Box<dyn SiteLocator>) -> Self {
        Self {
            output_root: output_root.into(),
            store: StateStore::new(),
            site: None,
            locator,
            bounds: Box::new(GeodesicBounds),
        }
    }

    /// Replace the bounds calculator.
    pub fn with_bounds(mut self, bounds: Box<dyn BoundsCalculator>) -> Self {
        self.bounds = bounds;
        self
    }

    /// Validate `raw` and bind the store to `<output_root>/<site>.json`.
    pub fn set_site_id(&mut self, raw: &str) -> RadarResult<&SiteId> {
        let site = SiteId::parse(raw)?;
        self.store.load(StateStore::stem_for(&self.output_root, &site))?;
        tracing::info!(site = %site, "site id set");
        Ok(self.site.insert(site))
    }

    /// Validate and record the radius in miles.
    ///
    /// A value different from the cached one drops the cached bbox and envelope before the new
    /// radius is stored. Returns whether the radius changed.
    pub fn set_radius(&mut self, miles: i64) -> RadarResult<bool> {
        let radius = Radius::new(miles)?;
        let cached: Option<Radius> = self.cached(CacheKey::Radius)?;
        if cached == Some(radius) {
            return Ok(false);
        }

        for key in CacheKey::GEOMETRY {
            self.store.remove(key)?;
        }
        self.store.set_typed(CacheKey::Radius, &radius)?;
        tracing::info!(radius = %radius, previous = ?cached.map(Radius::miles), "radius set");
        Ok(true)
    }

    /// Return the cached site coordinates, looking them up once when absent.
    pub fn ensure_coordinates(&mut self) -> RadarResult<LatLon> {
        let site = self.require_site()?.clone();
        if let Some(coords) = self.cached::<LatLon>(CacheKey::SiteCoords)? {
            return Ok(coords);
        }

        let coords = self.locator.locate(&site)?.ok_or_else(|| {
            RadarError::upstream(format!(
                "empty response while requesting coordinates for site {site}"
            ))
        })?;
        self.store.set_typed(CacheKey::SiteCoords, &coords)?;
        tracing::info!(site = %site, coords = %coords, "site coordinates resolved");
        Ok(coords)
    }

    /// Return the bounds for the current radius, deriving them when not fully cached.
    ///
    /// A half-populated cache (bbox without envelope or the reverse), or an envelope that does not
    /// span the cached bbox, is recomputed in full.
    #[tracing::instrument(skip(self), fields(site = ?self.site))]
    pub fn ensure_geometry(&mut self) -> RadarResult<Bounds> {
        self.require_site()?;
        let radius: Radius = self
            .cached(CacheKey::Radius)?
            .ok_or(RadarError::RadiusNotSet)?;

        let bbox = self.cached::<BoundingBox>(CacheKey::Bbox)?;
        let envelope = self.cached::<Envelope>(CacheKey::Envelope)?;
        if let (Some(bbox), Some(envelope)) = (bbox, envelope)
            && envelope.bounds().ok() == Some(bbox)
        {
            return Ok(Bounds {
                radius,
                bbox,
                envelope,
            });
        }

        let center = self.ensure_coordinates()?;
        let points = self.bounds.cardinal_points(center, radius)?;
        let (bbox, envelope) = bounds_from_points(&points)?;
        self.store.set_typed(CacheKey::Bbox, &bbox)?;
        self.store.set_typed(CacheKey::Envelope, &envelope)?;
        let corners: [f64; 4] = bbox.into();
        tracing::info!(radius = %radius, bbox = ?corners, "bounds derived");

        Ok(Bounds {
            radius,
            bbox,
            envelope,
        })
    }

    /// Bound site, if any.
    pub fn site_id(&self) -> Option<&SiteId> {
        self.site.as_ref()
    }

    /// Cached coordinates. Never triggers a lookup.
    pub fn site_coords(&self) -> RadarResult<Option<LatLon>> {
        self.store.get_typed(CacheKey::SiteCoords)
    }

    /// Cached radius.
    pub fn radius(&self) -> RadarResult<Option<Radius>> {
        self.store.get_typed(CacheKey::Radius)
    }

    /// Cached bounding box.
    pub fn bbox(&self) -> RadarResult<Option<BoundingBox>> {
        self.store.get_typed(CacheKey::Bbox)
    }

    /// Cached envelope.
    pub fn envelope(&self) -> RadarResult<Option<Envelope>> {
        self.store.get_typed(CacheKey::Envelope)
    }

    /// Root directory holding the per-site store files.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Underlying store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Underlying store, for persisting consumer settings.
    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    /// Flush the store if it changed during this run.
    pub fn flush(&mut self) -> RadarResult<bool> {
        self.store.flush(false)
    }

    fn require_site(&self) -> RadarResult<&SiteId> {
        self.site
            .as_ref()
            .ok_or_else(|| RadarError::not_loaded("site id has not been set"))
    }

    /// Typed read where an undecodable value counts as absent, so it gets re-derived.
    fn cached<T: DeserializeOwned>(&self, key: CacheKey) -> RadarResult<Option<T>> {
        match self.store.get_typed(key) {
            Err(RadarError::Serde(msg)) => {
                tracing::warn!(key = %key, %msg, "discarding malformed cache entry");
                Ok(None)
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/pipeline.rs"]
mod tests;
