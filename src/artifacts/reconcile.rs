use std::path::{Path, PathBuf};

use crate::artifacts::template::FrameTemplate;
use crate::foundation::error::{RadarError, RadarResult};

/// Outcome of one [`reconcile`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReconcileReport {
    /// Matching frames found before trimming.
    pub existing: usize,
    /// Requested frame count.
    pub desired: usize,
    /// Files removed, highest index first.
    pub deleted: Vec<PathBuf>,
}

/// Frames in `dir` matching `template`, sorted by index.
///
/// Candidates come from the loose glob and are then filtered through the strict numeric
/// pattern, so companions such as `frame_legend.png` never count.
pub fn discover(dir: &Path, template: &FrameTemplate) -> RadarResult<Vec<(usize, PathBuf)>> {
    let dir_str = dir.to_str().ok_or_else(|| {
        RadarError::validation(format!("image dir '{}' is not valid UTF-8", dir.display()))
    })?;
    let pattern = Path::new(&glob::Pattern::escape(dir_str)).join(template.glob_pattern());
    let pattern = pattern.to_string_lossy();

    let entries = glob::glob(&pattern)
        .map_err(|e| RadarError::validation(format!("frame pattern '{pattern}': {e}")))?;

    let mut frames = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| RadarError::filesystem(e.to_string()))?;
        if !path.is_file() {
            continue;
        }
        let index = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| template.index_of(n));
        if let Some(index) = index {
            frames.push((index, path));
        }
    }
    frames.sort();
    Ok(frames)
}

/// Delete surplus frames so that at most `desired` remain in `dir`.
///
/// Files go highest index first, so an interrupted run still leaves the lowest indices. Only
/// files that were actually discovered are deleted; gaps in the numbering are tolerated. Never
/// creates or renames files. Running it again with the same `desired` deletes nothing.
pub fn reconcile(
    dir: &Path,
    template: &FrameTemplate,
    desired: usize,
) -> RadarResult<ReconcileReport> {
    let frames = discover(dir, template)?;
    if frames.len() <= desired {
        tracing::debug!(
            dir = %dir.display(),
            existing = frames.len(),
            desired,
            "no surplus frames"
        );
    }
    trim(frames, desired)
}

/// Delete the highest-indexed entries of `frames` (sorted ascending) until `desired` remain.
///
/// Stops at the first failed deletion.
fn trim(frames: Vec<(usize, PathBuf)>, desired: usize) -> RadarResult<ReconcileReport> {
    let existing = frames.len();
    let mut report = ReconcileReport {
        existing,
        desired,
        deleted: Vec::new(),
    };
    if existing <= desired {
        return Ok(report);
    }

    tracing::info!(needed = desired, have = existing, "trimming surplus frames");
    for (_, path) in frames.into_iter().rev().take(existing - desired) {
        std::fs::remove_file(&path).map_err(|e| {
            RadarError::filesystem(format!("delete '{}': {e}", path.display()))
        })?;
        report.deleted.push(path);
    }
    tracing::info!(deleted = report.deleted.len(), "deleted extra frames");
    Ok(report)
}

#[cfg(test)]
#[path = "../../tests/unit/artifacts/reconcile.rs"]
mod tests;
