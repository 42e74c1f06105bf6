use std::cell::Cell;
use std::rc::Rc;

use super::*;
use crate::geometry::locator::StationTable;

struct CountingTable {
    calls: Rc<Cell<usize>>,
    table: StationTable,
}

impl SiteLocator for CountingTable {
    fn locate(&self, site: &SiteId) -> RadarResult<Option<LatLon>> {
        self.calls.set(self.calls.get() + 1);
        self.table.locate(site)
    }
}

fn stations() -> StationTable {
    [("ksjt".to_string(), LatLon::new(31.3713, -100.4925).unwrap())]
        .into_iter()
        .collect()
}

fn settings(root: &Path) -> Settings {
    Settings {
        output_root: root.to_path_buf(),
        ..Settings::default()
    }
}

fn job(consumer: Consumer, settings: Settings, calls: &Rc<Cell<usize>>) -> RenderJob {
    RenderJob::new(
        consumer,
        settings,
        Box::new(CountingTable {
            calls: calls.clone(),
            table: stations(),
        }),
    )
    .unwrap()
}

#[test]
fn root_that_is_a_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("out");
    std::fs::write(&file, b"").unwrap();

    let err = RenderJob::new(Consumer::Map, settings(&file), Box::new(NoLocator)).err();
    assert!(matches!(err, Some(RadarError::Validation(_))));
}

#[test]
fn layout_defaults_image_dir_to_site() {
    let dir = tempfile::tempdir().unwrap();
    let site = SiteId::parse("KSJT").unwrap();

    let layout = OutputLayout::resolve(dir.path(), None, &site).unwrap();
    assert_eq!(layout.image_dir(), dir.path().join("ksjt"));
    assert_eq!(layout.store_path(), dir.path().join("ksjt.json"));

    let rel = OutputLayout::resolve(dir.path(), Some(Path::new("img")), &site).unwrap();
    assert_eq!(rel.image_dir(), dir.path().join("img"));

    let elsewhere = tempfile::tempdir().unwrap();
    let abs = OutputLayout::resolve(dir.path(), Some(elsewhere.path()), &site).unwrap();
    assert_eq!(abs.image_dir(), elsewhere.path());
}

#[test]
fn map_job_records_its_own_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();
    let mut j = job(Consumer::Map, settings(dir.path()), &calls);

    let layout = j.open("ksjt").unwrap().clone();
    assert!(layout.image_dir().is_dir());

    let store = j.pipeline().store();
    assert_eq!(
        store.get_typed::<String>(CacheKey::FileName(Consumer::Map)).unwrap(),
        Some("map.png".to_string())
    );
    assert!(!store.contains(CacheKey::FileName(Consumer::Frames)).unwrap());
    assert!(!store.contains(CacheKey::Frames).unwrap());
    assert_eq!(
        store.get_typed::<PathBuf>(CacheKey::ImagePath).unwrap(),
        Some(layout.image_dir().to_path_buf())
    );
}

#[test]
fn frames_job_records_template_and_count() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();
    let s = Settings {
        product: Some("Velocity".into()),
        ..settings(dir.path()).with_frames(6).unwrap()
    };
    let mut j = job(Consumer::Frames, s, &calls);
    j.open("KSJT").unwrap();

    let store = j.pipeline().store();
    assert_eq!(
        store.get_typed::<String>(CacheKey::FileName(Consumer::Frames)).unwrap(),
        Some("frame_%d.png".to_string())
    );
    assert_eq!(
        store.get_typed::<FrameCount>(CacheKey::Frames).unwrap(),
        Some(FrameCount::new(6).unwrap())
    );
    assert_eq!(
        store.get_typed::<String>(CacheKey::Product).unwrap(),
        Some("Velocity".to_string())
    );
}

#[test]
fn bad_names_fail_before_anything_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();
    let s = Settings {
        map_file_name: Some("../map".into()),
        ..settings(dir.path())
    };
    let mut j = job(Consumer::Map, s, &calls);

    assert!(matches!(j.open("KSJT"), Err(RadarError::Validation(_))));
    assert!(j.layout().is_none());
    assert!(!dir.path().join("ksjt").exists());
}

#[test]
fn prepare_requires_open() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();
    let mut j = job(Consumer::Map, settings(dir.path()), &calls);
    assert!(matches!(j.prepare(), Err(RadarError::NotLoaded(_))));
}

#[test]
fn manifest_carries_derived_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();
    let mut j = job(Consumer::Frames, settings(dir.path()), &calls);
    j.open("KSJT").unwrap();

    let m = j.prepare().unwrap();
    assert_eq!(m.site.as_str(), "KSJT");
    assert_eq!(m.radius.miles(), 150);
    assert!(m.bbox.contains(m.coords));
    assert_eq!(m.envelope.bounds().unwrap(), m.bbox);
    assert_eq!(m.file_name, "frame_%d.png");
    assert_eq!(m.frames.map(FrameCount::get), Some(12));
    assert_eq!(m.product.as_deref(), Some("Reflectivity"));
    assert_eq!(m.legend_file_name.as_deref(), Some("frame_legend.png"));
    assert_eq!(calls.get(), 1);

    let json = serde_json::to_value(&m).unwrap();
    assert_eq!(json["envelope"]["type"], "Polygon");
    assert_eq!(json["radius"], 150);
}

#[test]
fn map_manifest_omits_frame_fields() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();
    let mut j = job(Consumer::Map, settings(dir.path()), &calls);
    j.open("KSJT").unwrap();

    let json = serde_json::to_value(j.prepare().unwrap()).unwrap();
    assert!(json.get("frames").is_none());
    assert!(json.get("product").is_none());
    assert!(json.get("legend_file_name").is_none());
    assert_eq!(json["file_name"], "map.png");
}

#[test]
fn finish_trims_surplus_frames_and_flushes() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();
    let mut j = job(
        Consumer::Frames,
        settings(dir.path()).with_frames(3).unwrap(),
        &calls,
    );
    let images = j.open("KSJT").unwrap().image_dir().to_path_buf();
    j.prepare().unwrap();

    for i in 0..5 {
        std::fs::write(images.join(format!("frame_{i}.png")), b"").unwrap();
    }
    std::fs::write(images.join("frame_legend.png"), b"").unwrap();

    let report = j.finish().unwrap().unwrap();
    assert_eq!(report.existing, 5);
    assert_eq!(report.deleted.len(), 2);
    assert!(images.join("frame_2.png").exists());
    assert!(!images.join("frame_3.png").exists());
    assert!(images.join("frame_legend.png").exists());

    assert!(!j.pipeline().store().is_dirty());
    assert!(dir.path().join("ksjt.json").is_file());
}

#[test]
fn map_finish_only_flushes() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();
    let mut j = job(Consumer::Map, settings(dir.path()), &calls);
    let images = j.open("KSJT").unwrap().image_dir().to_path_buf();
    std::fs::write(images.join("frame_0.png"), b"").unwrap();

    assert_eq!(j.finish().unwrap(), None);
    assert!(images.join("frame_0.png").exists());
    assert!(dir.path().join("ksjt.json").is_file());
}

#[test]
fn both_consumers_share_one_store() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();

    let mut map = job(Consumer::Map, settings(dir.path()), &calls);
    map.open("KSJT").unwrap();
    let first = map.prepare().unwrap();
    map.finish().unwrap();

    let mut frames = job(Consumer::Frames, settings(dir.path()), &calls);
    frames.open("KSJT").unwrap();
    let second = frames.prepare().unwrap();
    frames.finish().unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(first.bbox, second.bbox);

    let snap = StateSnapshot::load(dir.path(), "ksjt").unwrap();
    assert!(snap.entries.contains_key("map_file_name"));
    assert!(snap.entries.contains_key("frames_file_name"));
    assert!(!snap.dirty);
}

#[test]
fn snapshot_of_unknown_site_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let snap = StateSnapshot::load(dir.path(), "KABX").unwrap();
    assert_eq!(snap.site.as_ref().map(SiteId::as_str), Some("KABX"));
    assert!(snap.entries.is_empty());
    assert!(snap.to_json().unwrap().contains("\"entries\": {}"));
}

#[test]
fn first_run_records_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();
    let mut j = job(Consumer::Frames, settings(dir.path()), &calls);
    j.open("KSJT").unwrap();

    let store = j.pipeline().store();
    assert_eq!(store.get_typed::<Radius>(CacheKey::Radius).unwrap(), Some(Radius::DEFAULT));
    assert_eq!(
        store.get_typed::<FrameCount>(CacheKey::Frames).unwrap(),
        Some(FrameCount::DEFAULT)
    );
    assert_eq!(
        store.get_typed::<String>(CacheKey::Product).unwrap(),
        Some("Reflectivity".to_string())
    );
}

#[test]
fn later_run_without_overrides_keeps_recorded_settings() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();

    let first = Settings {
        product: Some("Velocity".into()),
        frame_file_name: Some("loop".into()),
        ..settings(dir.path()).with_radius(200).unwrap().with_frames(4).unwrap()
    };
    let mut j = job(Consumer::Frames, first, &calls);
    j.open("KSJT").unwrap();
    let before = j.prepare().unwrap();
    j.finish().unwrap();

    let mut j = job(Consumer::Frames, settings(dir.path()), &calls);
    j.open("KSJT").unwrap();
    let after = j.prepare().unwrap();

    assert_eq!(after.radius.miles(), 200);
    assert_eq!(after.frames.map(FrameCount::get), Some(4));
    assert_eq!(after.product.as_deref(), Some("Velocity"));
    assert_eq!(after.file_name, "loop_%d.png");
    assert_eq!(after.bbox, before.bbox);
    assert!(!j.pipeline().store().is_dirty());
    assert_eq!(calls.get(), 1);
}

#[test]
fn override_replaces_recorded_setting() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Rc::default();

    let mut j = job(
        Consumer::Frames,
        settings(dir.path()).with_radius(200).unwrap(),
        &calls,
    );
    j.open("KSJT").unwrap();
    let wide = j.prepare().unwrap();
    j.finish().unwrap();

    let mut j = job(
        Consumer::Frames,
        settings(dir.path()).with_radius(100).unwrap().with_frames(8).unwrap(),
        &calls,
    );
    j.open("KSJT").unwrap();
    let narrow = j.prepare().unwrap();

    assert_eq!(narrow.radius.miles(), 100);
    assert_eq!(narrow.frames.map(FrameCount::get), Some(8));
    assert!(narrow.bbox.height() < wide.bbox.height());
}

#[test]
fn malformed_recorded_setting_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("ksjt.json"),
        r#"{"frames": "many", "product": "Velocity"}"#,
    )
    .unwrap();
    let calls = Rc::default();
    let mut j = job(Consumer::Frames, settings(dir.path()), &calls);
    j.open("KSJT").unwrap();

    let store = j.pipeline().store();
    assert_eq!(
        store.get_typed::<FrameCount>(CacheKey::Frames).unwrap(),
        Some(FrameCount::DEFAULT)
    );
    assert_eq!(
        store.get_typed::<String>(CacheKey::Product).unwrap(),
        Some("Velocity".to_string())
    );
}
