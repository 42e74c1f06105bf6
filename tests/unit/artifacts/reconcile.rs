use std::path::Path;

use super::*;

fn touch(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"png").unwrap();
}

fn names(dir: &Path) -> Vec<String> {
    let mut v: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    v.sort();
    v
}

fn seed_frames(dir: &Path, n: usize) {
    for i in 0..n {
        touch(dir, &format!("frame_{i}.png"));
    }
    touch(dir, "frame_legend.png");
}

#[test]
fn trims_highest_indices_and_spares_legend() {
    let dir = tempfile::tempdir().unwrap();
    seed_frames(dir.path(), 5);
    let t = FrameTemplate::parse("frame_%d").unwrap();

    let report = reconcile(dir.path(), &t, 2).unwrap();

    assert_eq!(report.existing, 5);
    assert_eq!(report.desired, 2);
    let deleted: Vec<String> = report
        .deleted
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(deleted, ["frame_4.png", "frame_3.png", "frame_2.png"]);
    assert_eq!(
        names(dir.path()),
        ["frame_0.png", "frame_1.png", "frame_legend.png"]
    );
}

#[test]
fn second_run_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    seed_frames(dir.path(), 5);
    let t = FrameTemplate::parse("frame_%d").unwrap();

    reconcile(dir.path(), &t, 2).unwrap();
    let again = reconcile(dir.path(), &t, 2).unwrap();

    assert_eq!(again.existing, 2);
    assert!(again.deleted.is_empty());
}

#[test]
fn never_creates_frames() {
    let dir = tempfile::tempdir().unwrap();
    seed_frames(dir.path(), 2);
    let t = FrameTemplate::parse("frame_%d").unwrap();

    let report = reconcile(dir.path(), &t, 12).unwrap();
    assert_eq!(report.existing, 2);
    assert!(report.deleted.is_empty());
    assert_eq!(names(dir.path()).len(), 3);
}

#[test]
fn gapped_numbering_trims_from_sorted_end() {
    let dir = tempfile::tempdir().unwrap();
    for i in [0, 1, 3, 7, 10] {
        touch(dir.path(), &format!("frame_{i}.png"));
    }
    let t = FrameTemplate::parse("frame_%d").unwrap();

    let report = reconcile(dir.path(), &t, 3).unwrap();

    assert_eq!(report.deleted.len(), 2);
    assert_eq!(
        names(dir.path()),
        ["frame_0.png", "frame_1.png", "frame_3.png"]
    );
}

#[test]
fn other_templates_are_untouched() {
    let dir = tempfile::tempdir().unwrap();
    seed_frames(dir.path(), 3);
    touch(dir.path(), "map.png");
    touch(dir.path(), "frames_0.png");
    let t = FrameTemplate::parse("frame_%d").unwrap();

    reconcile(dir.path(), &t, 1).unwrap();
    assert_eq!(
        names(dir.path()),
        ["frame_0.png", "frame_legend.png", "frames_0.png", "map.png"]
    );
}

#[test]
fn missing_directory_has_no_frames() {
    let dir = tempfile::tempdir().unwrap();
    let t = FrameTemplate::parse("frame_%d").unwrap();
    let report = reconcile(&dir.path().join("absent"), &t, 1).unwrap();
    assert_eq!(report, ReconcileReport {
        existing: 0,
        desired: 1,
        deleted: vec![],
    });
}

#[test]
fn discover_sorts_numerically() {
    let dir = tempfile::tempdir().unwrap();
    for i in [10, 2, 1] {
        touch(dir.path(), &format!("frame_{i}.png"));
    }
    let t = FrameTemplate::parse("frame_%d").unwrap();
    let idx: Vec<usize> = discover(dir.path(), &t)
        .unwrap()
        .into_iter()
        .map(|(i, _)| i)
        .collect();
    assert_eq!(idx, [1, 2, 10]);
}

#[test]
fn failed_deletion_is_a_filesystem_error() {
    let dir = tempfile::tempdir().unwrap();
    seed_frames(dir.path(), 5);
    let t = FrameTemplate::parse("frame_%d").unwrap();
    let frames = discover(dir.path(), &t).unwrap();

    // frame_4.png turns into a non-empty directory between discovery and deletion
    let swapped = dir.path().join("frame_4.png");
    std::fs::remove_file(&swapped).unwrap();
    std::fs::create_dir(&swapped).unwrap();
    touch(&swapped, "inner");

    let err = trim(frames, 2).unwrap_err();
    assert!(matches!(err, RadarError::Filesystem(_)), "{err}");
    assert!(swapped.is_dir());
    assert!(dir.path().join("frame_3.png").exists());
    assert!(dir.path().join("frame_2.png").exists());
}
