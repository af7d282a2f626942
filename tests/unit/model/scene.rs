use super::*;

#[test]
fn estimate_falls_back_for_missing_or_non_positive_values() {
    assert_eq!(Scene::new(1, "a").estimated_secs(), FALLBACK_SCENE_SECS);
    assert_eq!(
        Scene::new(1, "a").with_duration_est(0.0).estimated_secs(),
        FALLBACK_SCENE_SECS
    );
    assert_eq!(
        Scene::new(1, "a").with_duration_est(-3.0).estimated_secs(),
        FALLBACK_SCENE_SECS
    );
    assert_eq!(
        Scene::new(1, "a").with_duration_est(f64::NAN).estimated_secs(),
        FALLBACK_SCENE_SECS
    );
    assert_eq!(Scene::new(1, "a").with_duration_est(2.5).estimated_secs(), 2.5);
}

#[test]
fn only_completed_scenes_are_active() {
    let scenes = vec![
        Scene::new(1, "a"),
        Scene::new(2, "b").with_status(SceneStatus::Generating),
        Scene::new(3, "c").with_status(SceneStatus::Failed),
        Scene::new(4, "d"),
    ];
    let ids: Vec<u64> = active_scenes(&scenes).map(|s| s.id.0).collect();
    assert_eq!(ids, vec![1, 4]);
}

#[test]
fn status_uses_lowercase_names() {
    let s: SceneStatus = serde_json::from_str("\"completed\"").unwrap();
    assert_eq!(s, SceneStatus::Completed);
    assert!(serde_json::from_str::<SceneStatus>("\"Completed\"").is_err());
}

#[test]
fn visual_ref_accessors() {
    let v = VisualRef::Video(PathBuf::from("a/b.mp4"));
    assert!(v.is_video());
    assert_eq!(v.path(), std::path::Path::new("a/b.mp4"));
    assert_eq!(SceneId(7).to_string(), "scene#7");
}
