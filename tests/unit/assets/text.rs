use super::*;

#[test]
fn approx_measure_scales_with_chars_and_size() {
    let mut m = ApproxMeasure;
    assert_eq!(m.measure("", 10.0), 0.0);
    assert!((m.measure("abcd", 10.0) - 22.0).abs() < 1e-4);
    assert!(m.measure("abcd", 20.0) > m.measure("abcd", 10.0));
}

#[test]
fn garbage_font_bytes_are_rejected() {
    assert!(TextLayoutEngine::from_font_bytes(b"not a font".to_vec()).is_err());
}

#[test]
fn missing_explicit_font_falls_through() {
    // The explicit path does not exist; resolution continues with env/system candidates and
    // never returns the missing path.
    let found = resolve_font_bytes(Some(Path::new("/definitely/not/here.ttf")), None);
    if let Some((path, bytes)) = found {
        assert_ne!(path, PathBuf::from("/definitely/not/here.ttf"));
        assert!(!bytes.is_empty());
    }
}

#[test]
fn real_font_measures_wider_text_wider() {
    let Some((_, bytes)) = resolve_font_bytes(None, None) else {
        eprintln!("skipping: no system font found");
        return;
    };
    let mut engine = TextLayoutEngine::from_font_bytes(bytes).unwrap();
    assert!(!engine.family_name().is_empty());
    let short = engine.measure("Hi", 40.0);
    let long = engine.measure("Hello there", 40.0);
    assert!(short > 0.0);
    assert!(long > short);
    // Cached path returns the same value.
    assert_eq!(engine.measure("Hi", 40.0), short);
    assert!(engine.layout_line("x", 0.0).is_err());
}

#[test]
fn family_lookup_prefers_the_closest_file_name() {
    let root = std::env::temp_dir().join(format!("storyreel_fonts_{}", std::process::id()));
    let nested = root.join("truetype").join("kanit");
    std::fs::create_dir_all(&nested).unwrap();
    for name in ["KanitDisplay-Bold.ttf", "Kanit-Black.ttf", "Kanit-Regular.otf", "Kanit.txt"] {
        std::fs::write(nested.join(name), b"font").unwrap();
    }
    std::fs::write(root.join("Inter-Bold.ttf"), b"font").unwrap();

    let dirs = vec![root.clone()];
    assert_eq!(
        find_family_file("Kanit", &dirs),
        Some(nested.join("Kanit-Black.ttf"))
    );
    assert_eq!(
        find_family_file("inter", &dirs),
        Some(root.join("Inter-Bold.ttf"))
    );
    assert_eq!(find_family_file("Impact", &dirs), None);
    assert_eq!(find_family_file("  ", &dirs), None);
    let _ = std::fs::remove_dir_all(&root);
}
