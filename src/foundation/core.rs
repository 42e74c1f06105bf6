use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::foundation::error::{RadarError, RadarResult};

pub use kurbo::Rect;

static SITE_ID_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[KPRTkprt][A-Za-z]{3}$").expect("site id pattern")
});

/// Four-character radar site code, e.g. `KSJT`.
///
/// Stored upper-case. The first character is one of `K`, `P`, `R`, `T`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    /// Validate and normalize a raw site code.
    pub fn parse(raw: &str) -> RadarResult<Self> {
        if raw.is_empty() {
            return Err(RadarError::validation("site id is not set"));
        }
        if !SITE_ID_RE.is_match(raw) {
            return Err(RadarError::validation(format!(
                "site id '{raw}' does not match expected format (e.g. KSJT)"
            )));
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    /// Upper-case form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used for file and directory names.
    pub fn lower(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SiteId {
    type Err = RadarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Distance in statute miles around the site, within `[1, 500]`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "i64", into = "u16")]
pub struct Radius(u16);

impl Radius {
    /// Smallest accepted radius.
    pub const MIN: u16 = 1;
    /// Largest accepted radius.
    pub const MAX: u16 = 500;
    /// Radius used when none is requested.
    pub const DEFAULT: Self = Self(150);

    /// Meters per statute mile.
    pub const METERS_PER_MILE: f64 = 1609.344;

    /// Create a validated radius.
    pub fn new(miles: i64) -> RadarResult<Self> {
        if miles < i64::from(Self::MIN) || miles > i64::from(Self::MAX) {
            return Err(RadarError::validation(format!(
                "radius must be an integer between {} and {} miles, got {miles}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(miles as u16))
    }

    /// Radius in miles.
    pub fn miles(self) -> u16 {
        self.0
    }

    /// Radius in meters.
    pub fn meters(self) -> f64 {
        f64::from(self.0) * Self::METERS_PER_MILE
    }
}

impl TryFrom<i64> for Radius {
    type Error = RadarError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<Radius> for u16 {
    fn from(r: Radius) -> Self {
        r.0
    }
}

impl fmt::Display for Radius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mi", self.0)
    }
}

/// Number of radar frames in an animation, within `[1, 100]`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "i64", into = "u8")]
pub struct FrameCount(u8);

impl FrameCount {
    /// Smallest accepted count.
    pub const MIN: u8 = 1;
    /// Largest accepted count.
    pub const MAX: u8 = 100;
    /// Count used when none is requested.
    pub const DEFAULT: Self = Self(12);

    /// Create a validated frame count.
    pub fn new(frames: i64) -> RadarResult<Self> {
        if frames < i64::from(Self::MIN) || frames > i64::from(Self::MAX) {
            return Err(RadarError::validation(format!(
                "the quantity of frames must be an integer between {} and {}, got {frames}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(frames as u8))
    }

    /// Count as `usize`.
    pub fn get(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<i64> for FrameCount {
    type Error = RadarError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<FrameCount> for u8 {
    fn from(n: FrameCount) -> Self {
        n.0
    }
}

/// Geographic coordinate in degrees. Persisted as `[lat, lon]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLon {
    /// Latitude, positive north.
    pub lat: f64,
    /// Longitude, positive east.
    pub lon: f64,
}

impl LatLon {
    /// Create a validated coordinate.
    pub fn new(lat: f64, lon: f64) -> RadarResult<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(RadarError::validation(format!(
                "latitude {lat} out of range"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(RadarError::validation(format!(
                "longitude {lon} out of range"
            )));
        }
        Ok(Self { lat, lon })
    }
}

impl TryFrom<[f64; 2]> for LatLon {
    type Error = RadarError;

    fn try_from([lat, lon]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(lat, lon)
    }
}

impl From<LatLon> for [f64; 2] {
    fn from(p: LatLon) -> Self {
        [p.lat, p.lon]
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// Axis-aligned box in degrees. Persisted as `[west, south, east, north]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Maximum latitude.
    pub north: f64,
}

impl BoundingBox {
    /// Create a validated box with `west <= east` and `south <= north`.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> RadarResult<Self> {
        if ![west, south, east, north].iter().all(|v| v.is_finite()) {
            return Err(RadarError::validation("bounding box values must be finite"));
        }
        if west > east || south > north {
            return Err(RadarError::validation(format!(
                "bounding box [{west}, {south}, {east}, {north}] is inverted"
            )));
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// The smallest box enclosing every point.
    pub fn enclosing(points: &[LatLon]) -> RadarResult<Self> {
        let first = points
            .first()
            .ok_or_else(|| RadarError::validation("cannot bound an empty point set"))?;
        let mut b = Self {
            west: first.lon,
            south: first.lat,
            east: first.lon,
            north: first.lat,
        };
        for p in &points[1..] {
            b.west = b.west.min(p.lon);
            b.south = b.south.min(p.lat);
            b.east = b.east.max(p.lon);
            b.north = b.north.max(p.lat);
        }
        Ok(b)
    }

    /// `x` is longitude, `y` is latitude.
    pub fn as_rect(&self) -> Rect {
        Rect::new(self.west, self.south, self.east, self.north)
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: LatLon) -> bool {
        (self.west..=self.east).contains(&p.lon) && (self.south..=self.north).contains(&p.lat)
    }

    /// Grow (positive) or shrink (negative) every edge by `degrees`.
    ///
    /// Returns `None` when shrinking collapses the box.
    pub fn buffer(&self, degrees: f64) -> Option<Self> {
        let r = self.as_rect().inset(kurbo::Insets::uniform(degrees));
        if r.width() < 0.0 || r.height() < 0.0 {
            return None;
        }
        Some(Self {
            west: r.x0,
            south: r.y0,
            east: r.x1,
            north: r.y1,
        })
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = RadarError;

    fn try_from([w, s, e, n]: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(w, s, e, n)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.west, b.south, b.east, b.north]
    }
}

/// Bounding polygon: a closed ring of `(lon, lat)` pairs.
///
/// Persisted as a GeoJSON-style mapping; the in-memory form is always the ring.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "GeoJsonPolygon", into = "GeoJsonPolygon")]
pub struct Envelope {
    ring: Vec<(f64, f64)>,
}

impl Envelope {
    /// Rectangle polygon for a box, counter-clockwise from the south-east corner.
    pub fn from_bbox(b: &BoundingBox) -> Self {
        Self {
            ring: vec![
                (b.east, b.south),
                (b.east, b.north),
                (b.west, b.north),
                (b.west, b.south),
                (b.east, b.south),
            ],
        }
    }

    /// Build from an explicit ring, which must be closed and have at least four points.
    pub fn from_ring(ring: Vec<(f64, f64)>) -> RadarResult<Self> {
        if ring.len() < 4 {
            return Err(RadarError::validation(
                "polygon ring needs at least four points",
            ));
        }
        if ring.first() != ring.last() {
            return Err(RadarError::validation("polygon ring is not closed"));
        }
        if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(RadarError::validation("polygon coordinates must be finite"));
        }
        Ok(Self { ring })
    }

    /// Ordered `(lon, lat)` vertices, first repeated last.
    pub fn ring(&self) -> &[(f64, f64)] {
        &self.ring
    }

    /// Bounds of the ring.
    pub fn bounds(&self) -> RadarResult<BoundingBox> {
        let points = self
            .ring
            .iter()
            .map(|&(lon, lat)| LatLon { lat, lon })
            .collect::<Vec<_>>();
        BoundingBox::enclosing(&points)
    }
}

/// Persistence shape of [`Envelope`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoJsonPolygon {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<Vec<[f64; 2]>>,
}

impl TryFrom<GeoJsonPolygon> for Envelope {
    type Error = RadarError;

    fn try_from(g: GeoJsonPolygon) -> Result<Self, Self::Error> {
        if g.kind != "Polygon" {
            return Err(RadarError::serde(format!(
                "expected a Polygon mapping, got '{}'",
                g.kind
            )));
        }
        let Some(outer) = g.coordinates.into_iter().next() else {
            return Err(RadarError::serde("polygon mapping has no rings"));
        };
        Self::from_ring(outer.into_iter().map(|[x, y]| (x, y)).collect())
    }
}

impl From<Envelope> for GeoJsonPolygon {
    fn from(e: Envelope) -> Self {
        Self {
            kind: "Polygon".to_string(),
            coordinates: vec![e.ring.into_iter().map(|(x, y)| [x, y]).collect()],
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
