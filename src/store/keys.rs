use std::fmt;

/// Output consumer that owns a distinct file-name entry in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consumer {
    /// Static base map, a single image.
    Map,
    /// Numbered radar frames for the animation loop.
    Frames,
}

impl Consumer {
    /// Human label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Frames => "frames",
        }
    }
}

/// Closed set of keys persisted in a site's derived-state file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `[lat, lon]` of the site.
    SiteCoords,
    /// Radius in miles the geometry was derived for.
    Radius,
    /// `[west, south, east, north]`.
    Bbox,
    /// Polygon mapping of the bbox.
    Envelope,
    /// Absolute output root.
    OutputPath,
    /// Absolute image directory.
    ImagePath,
    /// Per-consumer file template.
    FileName(Consumer),
    /// Radar product name.
    Product,
    /// Requested frame count.
    Frames,
}

impl CacheKey {
    /// Keys that depend on the radius and must be dropped when it changes.
    pub const GEOMETRY: [CacheKey; 2] = [CacheKey::Bbox, CacheKey::Envelope];

    /// Persisted key name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SiteCoords => "site_coords",
            Self::Radius => "radius",
            Self::Bbox => "bbox",
            Self::Envelope => "envelope",
            Self::OutputPath => "output_path",
            Self::ImagePath => "image_path",
            Self::FileName(Consumer::Map) => "map_file_name",
            Self::FileName(Consumer::Frames) => "frames_file_name",
            Self::Product => "product",
            Self::Frames => "frames",
        }
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
