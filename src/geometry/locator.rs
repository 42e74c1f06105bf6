use std::collections::BTreeMap;
use std::path::Path;

use crate::foundation::core::{LatLon, SiteId};
use crate::foundation::error::{RadarError, RadarResult};

/// Resolves a site to its ground coordinate.
///
/// `Ok(None)` means the source has no data for the site; retrying is the source's concern.
pub trait SiteLocator {
    /// Look up the `(lat, lon)` of `site`.
    fn locate(&self, site: &SiteId) -> RadarResult<Option<LatLon>>;
}

/// Station coordinates loaded from a JSON object of `"KSJT": [lat, lon]` entries.
#[derive(Clone, Debug, Default)]
pub struct StationTable {
    stations: BTreeMap<String, LatLon>,
}

impl StationTable {
    /// Read a station table file. Site codes are matched case-insensitively.
    pub fn from_path(path: impl AsRef<Path>) -> RadarResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RadarError::upstream(format!("read station table '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
            .map_err(|e| RadarError::upstream(format!("station table '{}': {e}", path.display())))
    }

    /// Parse a station table from JSON text.
    pub fn from_json(text: &str) -> RadarResult<Self> {
        let raw: BTreeMap<String, LatLon> =
            serde_json::from_str(text).map_err(|e| RadarError::serde(e.to_string()))?;
        Ok(raw.into_iter().collect())
    }

    /// Number of known stations.
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// `true` when no stations are known.
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl FromIterator<(String, LatLon)> for StationTable {
    fn from_iter<I: IntoIterator<Item = (String, LatLon)>>(iter: I) -> Self {
        Self {
            stations: iter
                .into_iter()
                .map(|(k, v)| (k.to_ascii_uppercase(), v))
                .collect(),
        }
    }
}

impl SiteLocator for StationTable {
    fn locate(&self, site: &SiteId) -> RadarResult<Option<LatLon>> {
        Ok(self.stations.get(site.as_str()).copied())
    }
}

/// Locator with no data, for runs that must rely on cached coordinates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLocator;

impl SiteLocator for NoLocator {
    fn locate(&self, _site: &SiteId) -> RadarResult<Option<LatLon>> {
        Ok(None)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/locator.rs"]
mod tests;
