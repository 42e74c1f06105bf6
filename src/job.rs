//! Output layout and render jobs.
//!
//! A [`RenderJob`] is what a renderer drives: it binds one [`Consumer`] to a site, records the
//! consumer's output settings in the site's store, hands out a [`RenderManifest`] with the
//! derived geometry, and afterwards trims surplus frames and flushes the store.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::artifacts::reconcile::{ReconcileReport, reconcile};
use crate::artifacts::template::{DEFAULT_EXTENSION, FrameTemplate, PLACEHOLDER};
use crate::config::{DEFAULT_FRAME_FILE_NAME, DEFAULT_MAP_FILE_NAME, DEFAULT_PRODUCT, Settings};
use crate::foundation::core::{BoundingBox, Envelope, FrameCount, LatLon, Radius, SiteId};
use crate::foundation::error::{RadarError, RadarResult};
use crate::geometry::geodesy::BoundsCalculator;
use crate::geometry::locator::{NoLocator, SiteLocator};
use crate::geometry::pipeline::GeometryPipeline;
use crate::store::keys::{CacheKey, Consumer};
use crate::store::state::StateStore;

/// Label of the legend image that sits next to the frames.
pub const LEGEND_LABEL: &str = "legend";

/// Resolved directories for one site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    image_dir: PathBuf,
    store_path: PathBuf,
}

impl OutputLayout {
    /// Make `root` absolute. A root that exists as a file is rejected.
    pub fn resolve_root(root: &Path) -> RadarResult<PathBuf> {
        let abs = std::path::absolute(root).map_err(|e| {
            RadarError::filesystem(format!("resolve output path '{}': {e}", root.display()))
        })?;
        if abs.is_file() {
            return Err(RadarError::validation(format!(
                "output path '{}' is a file",
                abs.display()
            )));
        }
        Ok(abs)
    }

    /// Lay out `site` under `root`.
    ///
    /// `image_dir` defaults to `<root>/<site>`; a relative one is taken relative to `root`.
    pub fn resolve(root: &Path, image_dir: Option<&Path>, site: &SiteId) -> RadarResult<Self> {
        let root = Self::resolve_root(root)?;
        let image_dir = match image_dir {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => root.join(dir),
            None => root.join(site.lower()),
        };
        if image_dir.is_file() {
            return Err(RadarError::validation(format!(
                "image path '{}' is a file",
                image_dir.display()
            )));
        }

        let store_path = root.join(format!("{}.json", site.lower()));
        Ok(Self {
            root,
            image_dir,
            store_path,
        })
    }

    /// Create the root and image directories.
    pub fn create(&self) -> RadarResult<()> {
        for dir in [&self.root, &self.image_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                RadarError::filesystem(format!("create directory '{}': {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    /// Absolute output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the renderer writes images into.
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Backing file of the site's store.
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }
}

/// Everything a renderer needs for one consumer and site.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RenderManifest {
    /// Which output this manifest is for.
    pub consumer: Consumer,
    /// Site identifier.
    pub site: SiteId,
    /// Site coordinates.
    pub coords: LatLon,
    /// Radius the bounds were derived for.
    pub radius: Radius,
    /// `[west, south, east, north]`.
    pub bbox: BoundingBox,
    /// Query polygon for external data.
    pub envelope: Envelope,
    /// Directory to write images into.
    pub image_path: PathBuf,
    /// File name (map) or `%d` template (frames).
    pub file_name: String,
    /// Number of frames to render.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<FrameCount>,
    /// Radar product.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// Legend image next to the frames, e.g. `frame_legend.png`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend_file_name: Option<String>,
}

/// Read-only view of a site's derived state.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StateSnapshot {
    /// Bound site, if any.
    pub site: Option<SiteId>,
    /// Backing file, if bound.
    pub store_path: Option<PathBuf>,
    /// Whether there are unflushed changes.
    pub dirty: bool,
    /// Every cached entry.
    pub entries: Map<String, Value>,
}

impl StateSnapshot {
    /// Snapshot whatever `pipeline` currently holds. Never triggers a lookup.
    pub fn capture(pipeline: &GeometryPipeline) -> Self {
        let store = pipeline.store();
        Self {
            site: pipeline.site_id().cloned(),
            store_path: store.path().map(Path::to_path_buf),
            dirty: store.is_dirty(),
            entries: store.entries().cloned().unwrap_or_default(),
        }
    }

    /// Read the persisted state of `site` under `root`.
    pub fn load(root: &Path, site: &str) -> RadarResult<Self> {
        let root = OutputLayout::resolve_root(root)?;
        let mut pipeline = GeometryPipeline::new(root, Box::new(NoLocator));
        pipeline.set_site_id(site)?;
        Ok(Self::capture(&pipeline))
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> RadarResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RadarError::serde(e.to_string()))
    }
}

impl fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

/// One consumer's run against one site.
pub struct RenderJob {
    consumer: Consumer,
    settings: Settings,
    pipeline: GeometryPipeline,
    layout: Option<OutputLayout>,
}

impl RenderJob {
    /// Create a job whose store and images live under `settings.output_root`.
    pub fn new(
        consumer: Consumer,
        settings: Settings,
        locator: Box<dyn SiteLocator>,
    ) -> RadarResult<Self> {
        let root = OutputLayout::resolve_root(&settings.output_root)?;
        Ok(Self {
            consumer,
            settings,
            pipeline: GeometryPipeline::new(root, locator),
            layout: None,
        })
    }

    /// Replace the bounds calculator.
    pub fn with_bounds(mut self, bounds: Box<dyn BoundsCalculator>) -> Self {
        self.pipeline = self.pipeline.with_bounds(bounds);
        self
    }

    /// Bind `site`, create its directories and record this consumer's output settings.
    ///
    /// Settings left unset reuse the values recorded by an earlier run; a first run records the
    /// defaults.
    #[tracing::instrument(skip(self), fields(consumer = self.consumer.label()))]
    pub fn open(&mut self, site: &str) -> RadarResult<&OutputLayout> {
        let requested_name = self.requested_file_name()?;
        let site = self.pipeline.set_site_id(site)?.clone();
        let layout = OutputLayout::resolve(
            self.pipeline.output_root(),
            self.settings.image_dir.as_deref(),
            &site,
        )?;
        layout.create()?;

        let radius = match self.settings.radius {
            Some(radius) => radius,
            None => self.pipeline.radius().ok().flatten().unwrap_or(Radius::DEFAULT),
        };
        self.pipeline.set_radius(i64::from(radius.miles()))?;

        let consumer = self.consumer;
        let store = self.pipeline.store_mut();
        store.set_typed(CacheKey::OutputPath, &layout.root)?;
        store.set_typed(CacheKey::ImagePath, &layout.image_dir)?;

        let key = CacheKey::FileName(consumer);
        let file_name = match consumer {
            Consumer::Map => {
                let default = map_file_name(DEFAULT_MAP_FILE_NAME)?;
                map_file_name(&resolve(store, key, requested_name, default)?)?
            }
            Consumer::Frames => {
                let default = frame_template(DEFAULT_FRAME_FILE_NAME)?.to_string();
                frame_template(&resolve(store, key, requested_name, default)?)?.to_string()
            }
        };
        store.set_typed(key, &file_name)?;
        if consumer == Consumer::Frames {
            let frames = resolve(
                store,
                CacheKey::Frames,
                self.settings.frames,
                FrameCount::DEFAULT,
            )?;
            let product = resolve(
                store,
                CacheKey::Product,
                self.settings.product.clone(),
                DEFAULT_PRODUCT.to_string(),
            )?;
            tracing::debug!(
                frames = frames.get(),
                product = %product,
                "frame settings resolved"
            );
        }

        tracing::info!(
            radius = %radius,
            image_dir = %layout.image_dir.display(),
            file_name = %file_name,
            "output configured"
        );
        Ok(self.layout.insert(layout))
    }

    /// Derive (or reuse) the geometry and describe the render.
    pub fn prepare(&mut self) -> RadarResult<RenderManifest> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| RadarError::not_loaded("render job has not been opened"))?;
        let image_path = layout.image_dir.clone();
        let site = self
            .pipeline
            .site_id()
            .cloned()
            .ok_or_else(|| RadarError::not_loaded("site id has not been set"))?;

        let bounds = self.pipeline.ensure_geometry()?;
        let coords = self.pipeline.ensure_coordinates()?;
        let store = self.pipeline.store();
        let file_name: String = store
            .get_typed(CacheKey::FileName(self.consumer))?
            .ok_or_else(|| RadarError::not_loaded("file name has not been recorded"))?;

        let (frames, product, legend_file_name) = match self.consumer {
            Consumer::Map => (None, None, None),
            Consumer::Frames => (
                store.get_typed(CacheKey::Frames)?,
                store.get_typed(CacheKey::Product)?,
                Some(FrameTemplate::parse(&file_name)?.sibling(LEGEND_LABEL)),
            ),
        };

        Ok(RenderManifest {
            consumer: self.consumer,
            site,
            coords,
            radius: bounds.radius,
            bbox: bounds.bbox,
            envelope: bounds.envelope,
            image_path,
            file_name,
            frames,
            product,
            legend_file_name,
        })
    }

    /// Trim surplus frames (frames consumer only), then flush the store.
    pub fn finish(&mut self) -> RadarResult<Option<ReconcileReport>> {
        let report = match self.consumer {
            Consumer::Map => None,
            Consumer::Frames => Some(self.reconcile_frames()?),
        };
        self.pipeline.flush()?;
        Ok(report)
    }

    /// Snapshot of the derived state held by this job.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::capture(&self.pipeline)
    }

    /// Consumer this job renders for.
    pub fn consumer(&self) -> Consumer {
        self.consumer
    }

    /// Settings the job was created with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Layout, once opened.
    pub fn layout(&self) -> Option<&OutputLayout> {
        self.layout.as_ref()
    }

    /// Underlying geometry pipeline.
    pub fn pipeline(&self) -> &GeometryPipeline {
        &self.pipeline
    }

    /// Underlying geometry pipeline.
    pub fn pipeline_mut(&mut self) -> &mut GeometryPipeline {
        &mut self.pipeline
    }

    /// Validated file name requested on the command line, if any.
    fn requested_file_name(&self) -> RadarResult<Option<String>> {
        let requested = match self.consumer {
            Consumer::Map => self.settings.map_file_name.as_deref().map(map_file_name),
            Consumer::Frames => self
                .settings
                .frame_file_name
                .as_deref()
                .map(|raw| frame_template(raw).map(|t| t.to_string())),
        };
        requested.transpose()
    }

    fn reconcile_frames(&self) -> RadarResult<ReconcileReport> {
        let store = self.pipeline.store();
        let dir: PathBuf = store
            .get_typed(CacheKey::ImagePath)?
            .ok_or_else(|| RadarError::not_loaded("image path has not been recorded"))?;
        let template: FrameTemplate = store
            .get_typed(CacheKey::FileName(Consumer::Frames))?
            .ok_or_else(|| RadarError::not_loaded("frame template has not been recorded"))?;
        let frames: FrameCount = store
            .get_typed(CacheKey::Frames)?
            .ok_or_else(|| RadarError::not_loaded("frame count has not been recorded"))?;

        reconcile(&dir, &template, frames.get())
    }
}

/// `requested` when given, else the value recorded under `key`, else `default`.
///
/// Whatever is returned is also what the store holds afterwards. A recorded value that no
/// longer decodes is replaced by `default`.
fn resolve<T>(
    store: &mut StateStore,
    key: CacheKey,
    requested: Option<T>,
    default: T,
) -> RadarResult<T>
where
    T: Serialize + DeserializeOwned,
{
    if let Some(value) = requested {
        store.set_typed(key, &value)?;
        return Ok(value);
    }

    let fallback = serde_json::to_value(&default)
        .map_err(|e| RadarError::serde(format!("cannot encode '{key}': {e}")))?;
    match store.get_or_init(key, Some(fallback))? {
        Some(stored) => match serde_json::from_value(stored) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding malformed setting");
                store.set_typed(key, &default)?;
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

/// Frame template from a base name (`frame`) or a full template (`frame_%d.png`).
fn frame_template(raw: &str) -> RadarResult<FrameTemplate> {
    if raw.contains(PLACEHOLDER) {
        FrameTemplate::parse(raw)
    } else {
        FrameTemplate::parse(&format!("{raw}_{PLACEHOLDER}"))
    }
}

fn map_file_name(raw: &str) -> RadarResult<String> {
    if raw.is_empty() || raw.contains(['/', '\\']) {
        return Err(RadarError::validation(format!(
            "map file name '{raw}' must be a non-empty file name"
        )));
    }
    if raw.contains('.') {
        Ok(raw.to_string())
    } else {
        Ok(format!("{raw}.{DEFAULT_EXTENSION}"))
    }
}

#[cfg(test)]
#[path = "../tests/unit/job.rs"]
mod tests;
