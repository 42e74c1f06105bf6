use super::*;

#[test]
fn bare_template_gets_png_extension() {
    let t = FrameTemplate::parse("frame_%d").unwrap();
    assert_eq!(t.to_string(), "frame_%d.png");
    assert_eq!(t.file_name(3), "frame_3.png");
    assert_eq!(t, FrameTemplate::parse("frame_%d.png").unwrap());
    assert_eq!(t.index_of("frame_3.jpg"), None);
}

#[test]
fn explicit_extension_is_kept() {
    let t = FrameTemplate::parse("radar-%d.webp").unwrap();
    assert_eq!(t.file_name(0), "radar-0.webp");
    assert_eq!(t.glob_pattern(), "radar-*.webp");
}

#[test]
fn strict_pattern_only_accepts_digits() {
    let t = FrameTemplate::parse("frame_%d").unwrap();
    assert_eq!(t.index_of("frame_0.png"), Some(0));
    assert_eq!(t.index_of("frame_42.png"), Some(42));
    assert_eq!(t.index_of("frame_legend.png"), None);
    assert_eq!(t.index_of("frame_1.png.bak"), None);
    assert_eq!(t.index_of("frame_1xpng"), None);
    assert_eq!(t.index_of("xframe_1.png"), None);
}

#[test]
fn glob_metacharacters_are_escaped() {
    let t = FrameTemplate::parse("[a]_%d").unwrap();
    assert_eq!(t.glob_pattern(), "[[]a[]]_*.png");
    assert_eq!(t.index_of("[a]_7.png"), Some(7));
}

#[test]
fn rejects_bad_templates() {
    for bad in ["frame", "frame_%d_%d", "out/frame_%d", ""] {
        assert!(
            matches!(FrameTemplate::parse(bad), Err(RadarError::Validation(_))),
            "{bad:?}"
        );
    }
}

#[test]
fn legend_sibling_shares_prefix() {
    let t = FrameTemplate::parse("frame_%d").unwrap();
    assert_eq!(t.sibling("legend"), "frame_legend.png");
}

#[test]
fn persists_as_template_string() {
    let t = FrameTemplate::parse("frame_%d").unwrap();
    assert_eq!(serde_json::to_value(&t).unwrap(), "frame_%d.png");
    let back: FrameTemplate = serde_json::from_str("\"frame_%d.png\"").unwrap();
    assert_eq!(back, t);
    assert!(serde_json::from_str::<FrameTemplate>("\"frame\"").is_err());
}
