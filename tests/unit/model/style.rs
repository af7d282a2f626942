use super::*;

#[test]
fn empty_json_yields_built_in_style() {
    let s: SubtitleStyle = serde_json::from_str("{}").unwrap();
    assert_eq!(s, SubtitleStyle::default());
    assert_eq!(s.font_size, 84.0);
    assert_eq!(s.font_weight, 900);
    assert_eq!(s.animation, AnimationMode::Pop);
}

#[test]
fn partial_json_keeps_other_defaults() {
    let s: SubtitleStyle = serde_json::from_str(
        r##"{"fontSize": 60, "textColor": "#FF0000", "fontWeight": "700", "animation": "sentence"}"##,
    )
    .unwrap();
    assert_eq!(s.font_size, 60.0);
    assert_eq!(s.font_weight, 700);
    assert_eq!(s.text_color.to_straight_rgba8(), [255, 0, 0, 255]);
    assert_eq!(s.animation, AnimationMode::Sentence);
    assert_eq!(s.outline_width, 4.0);
}

#[test]
fn font_weight_accepts_numbers_and_keywords() {
    let s: SubtitleStyle = serde_json::from_str(r#"{"fontWeight": 800}"#).unwrap();
    assert_eq!(s.font_weight, 800);
    let s: SubtitleStyle = serde_json::from_str(r#"{"fontWeight": "bold"}"#).unwrap();
    assert_eq!(s.font_weight, 700);
    assert!(serde_json::from_str::<SubtitleStyle>(r#"{"fontWeight": "heavy"}"#).is_err());
}

#[test]
fn word_colors_fall_back() {
    let s = SubtitleStyle::default();
    assert_eq!(s.active_color(), DEFAULT_ACTIVE_WORD_COLOR);
    assert_eq!(s.inactive_color(), s.text_color);
    assert_eq!(s.active_color().to_straight_rgba8(), [255, 215, 0, 255]);
}

#[test]
fn chip_is_skipped_when_background_is_transparent() {
    let mut s = SubtitleStyle::default();
    assert!(s.chip_color().is_some());
    s.background_opacity = 0.0;
    assert!(s.chip_color().is_none());
}

#[test]
fn presets_are_known_by_name() {
    let viral = SubtitleStyle::preset("viral-pop").unwrap();
    assert_eq!(viral.text_transform, TextTransform::Uppercase);
    assert_eq!(viral.words_per_batch, Some(3));
    assert!(viral.chip_color().is_none());
    let umi = SubtitleStyle::preset("umi").unwrap();
    assert_eq!(umi.font_weight, 600);
    assert!(SubtitleStyle::preset("beast").is_some());
    assert!(SubtitleStyle::preset("tiktok").is_some());
    assert!(SubtitleStyle::preset("nope").is_none());
}

#[test]
fn text_transforms() {
    assert_eq!(TextTransform::Uppercase.apply("hey you"), "HEY YOU");
    assert_eq!(TextTransform::Lowercase.apply("HeY"), "hey");
    assert_eq!(TextTransform::Capitalize.apply("hello  big world"), "Hello  Big World");
    assert_eq!(TextTransform::None.apply("x Y"), "x Y");
}

#[test]
fn baseline_fraction_from_offset() {
    let s = SubtitleStyle::default();
    assert!((s.baseline_fraction() - 0.7).abs() < 1e-12);
}
