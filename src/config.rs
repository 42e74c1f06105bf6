//! Process-wide settings, built once at startup and passed into every job.

use std::path::PathBuf;

use crate::foundation::core::{FrameCount, Radius};
use crate::foundation::error::RadarResult;

/// Set to a truthy value when running inside the container image.
pub const ENV_DOCKERIZED: &str = "RLG_DOCKERIZED";
/// Overrides the output root.
pub const ENV_OUTPUT_ROOT: &str = "RLG_OUTPUT_ROOT";
/// Path of the station table used for coordinate lookups.
pub const ENV_STATIONS: &str = "RLG_STATIONS";

/// Output root inside the container image.
pub const DOCKER_OUTPUT_ROOT: &str = "/data";
/// Output root everywhere else.
pub const LOCAL_OUTPUT_ROOT: &str = "./out";

/// Default radar product.
pub const DEFAULT_PRODUCT: &str = "Reflectivity";
/// Default base name of the map image.
pub const DEFAULT_MAP_FILE_NAME: &str = "map";
/// Default base name of the frame images.
pub const DEFAULT_FRAME_FILE_NAME: &str = "frame";

/// Immutable run configuration.
///
/// Values come from defaults, then the environment, then the command line. Output settings left
/// as `None` reuse what the site's store recorded on an earlier run, falling back to the
/// defaults above. Nothing mutates a `Settings` once a job holds it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Settings {
    /// Root directory for per-site store files and image directories.
    pub output_root: PathBuf,
    /// Image directory. Relative paths resolve against `output_root`; `None` means
    /// `<output_root>/<site>`.
    pub image_dir: Option<PathBuf>,
    /// Requested radius of the area of interest.
    pub radius: Option<Radius>,
    /// Requested number of frames to keep.
    pub frames: Option<FrameCount>,
    /// Requested radar product.
    pub product: Option<String>,
    /// Requested map image base name or file name.
    pub map_file_name: Option<String>,
    /// Requested frame image base name or `%d` template.
    pub frame_file_name: Option<String>,
    /// Station table for coordinate lookups.
    pub stations: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_root: default_output_root(false),
            image_dir: None,
            radius: None,
            frames: None,
            product: None,
            map_file_name: None,
            frame_file_name: None,
            stations: None,
        }
    }
}

impl Settings {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with variables resolved by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let dockerized = lookup(ENV_DOCKERIZED).is_some_and(|v| is_truthy(&v));
        let output_root = lookup(ENV_OUTPUT_ROOT)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_output_root(dockerized));

        Self {
            output_root,
            stations: lookup(ENV_STATIONS)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            ..Self::default()
        }
    }

    /// Request a radius, validating the range.
    pub fn with_radius(mut self, miles: i64) -> RadarResult<Self> {
        self.radius = Some(Radius::new(miles)?);
        Ok(self)
    }

    /// Request a frame count, validating the range.
    pub fn with_frames(mut self, frames: i64) -> RadarResult<Self> {
        self.frames = Some(FrameCount::new(frames)?);
        Ok(self)
    }
}

fn default_output_root(dockerized: bool) -> PathBuf {
    PathBuf::from(if dockerized {
        DOCKER_OUTPUT_ROOT
    } else {
        LOCAL_OUTPUT_ROOT
    })
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
