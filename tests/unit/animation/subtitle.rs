use super::*;
use crate::model::style::TextTransform;

/// Every character advances half an em.
struct HalfEm;

impl TextMeasure for HalfEm {
    fn measure(&mut self, text: &str, size_px: f32) -> f32 {
        text.chars().count() as f32 * size_px * 0.5
    }
}

fn canvas() -> Canvas {
    Canvas {
        width: 1920,
        height: 1080,
    }
}

fn plan(text: &str, style: &SubtitleStyle, progress: f64, animating: bool) -> Option<SubtitleLayer> {
    plan_subtitles(
        &SubtitleParams {
            text,
            style,
            progress,
            animating,
            canvas: canvas(),
            scale: 1.0,
        },
        &mut HalfEm,
    )
}

fn words(layer: Option<SubtitleLayer>) -> Vec<String> {
    layer
        .map(|l| l.items.into_iter().map(|i| i.text).collect())
        .unwrap_or_default()
}

#[test]
fn tokenize_keeps_whitespace_runs() {
    assert_eq!(tokenize("Hello  big world"), vec!["Hello", "  ", "big", " ", "world"]);
    assert_eq!(tokenize(" lead"), vec![" ", "lead"]);
    assert!(tokenize("").is_empty());
}

#[test]
fn pop_reveals_nothing_at_start_and_everything_at_end() {
    let style = SubtitleStyle::default();
    assert!(plan("one two three", &style, 0.0, true).is_none());
    assert_eq!(words(plan("one two three", &style, 1.0, true)), vec!["one", "two", "three"]);
}

#[test]
fn pop_visible_word_count_is_monotonic() {
    let tokens = tokenize("a quick brown fox jumps over the lazy dog");
    let mut prev = 0;
    for step in 0..=200 {
        let n = pop_visible_words(&tokens, f64::from(step) / 200.0);
        assert!(n >= prev, "count dropped at step {step}");
        prev = n;
    }
    assert_eq!(prev, 9);
}

#[test]
fn pop_active_word_is_scaled_and_highlighted() {
    let style = SubtitleStyle::default();
    // Four words: count = floor(0.5 * 5) = 2, so the second word is active.
    let layer = plan("aa bb cc dd", &style, 0.5, true).unwrap();
    let texts: Vec<&str> = layer.items.iter().map(|i| i.text.as_str()).collect();
    assert_eq!(texts, vec!["aa", "bb"]);
    assert_eq!(layer.items[1].scale, ACTIVE_WORD_SCALE);
    assert_eq!(layer.items[1].color, style.active_color());
    assert_eq!(layer.items[0].scale, 1.0);
    assert_eq!(layer.items[0].color, style.inactive_color());
    assert_eq!(layer.chips.len(), 2);
}

#[test]
fn paused_pop_draws_all_words_at_rest() {
    let style = SubtitleStyle::default();
    let layer = plan("aa bb cc", &style, 0.4, false).unwrap();
    assert_eq!(layer.items.len(), 3);
    assert!(layer.items.iter().all(|i| i.scale == 1.0));
}

#[test]
fn pop_lines_are_centered_and_wrap() {
    let style = SubtitleStyle::default();
    // 84 px font at half an em per char: each 10-char word is 420 px, the wrap width is 1632.
    let text = "aaaaaaaaaa bbbbbbbbbb cccccccccc dddddddddd";
    let layer = plan(text, &style, 1.0, true).unwrap();
    let ys: Vec<f64> = layer.items.iter().map(|i| i.y).collect();
    assert!(ys[0] < ys[3], "last word should wrap to a second line");
    let lh = 84.0 * LINE_HEIGHT_EM;
    assert!((ys[3] - ys[0] - lh).abs() < 1e-9);
    // Block is centered on 70 % of the height.
    let mid = (ys[0] + ys[3]) / 2.0;
    assert!((mid - 1080.0 * 0.7).abs() < 1e-9);
    let first = &layer.items[0];
    // The trailing space stays on the first line.
    let line_w = 3.0 * 420.0 + 3.0 * 42.0;
    assert!((first.x - (1920.0 - line_w) / 2.0).abs() < 1e-9);
}

#[test]
fn pop_applies_text_transform() {
    let style = SubtitleStyle {
        text_transform: TextTransform::Uppercase,
        ..SubtitleStyle::default()
    };
    assert_eq!(words(plan("hi there", &style, 1.0, true)), vec!["HI", "THERE"]);
}

#[test]
fn chips_skipped_without_background() {
    let style = SubtitleStyle {
        background_opacity: 0.0,
        ..SubtitleStyle::default()
    };
    let layer = plan("aa bb", &style, 1.0, true).unwrap();
    assert!(layer.chips.is_empty());
}

#[test]
fn sentences_split_on_marker_and_punctuation() {
    assert_eq!(
        split_sentences("First one. Second one! third stays? Fourth > Fifth"),
        vec!["First one.", "Second one! third stays?", "Fourth", "Fifth"]
    );
    assert_eq!(split_sentences("   "), Vec::<String>::new());
    assert_eq!(split_sentences("a.b. C"), vec!["a.b.", "C"]);
}

#[test]
fn sentence_index_and_local_progress() {
    assert_eq!(sentence_at(0, 0.5), None);
    let (idx, local) = sentence_at(4, 0.3).unwrap();
    assert_eq!(idx, 1);
    assert!((local - 0.2).abs() < 1e-9);
    assert_eq!(sentence_at(4, 1.0).map(|(i, _)| i), Some(3));
}

#[test]
fn sentence_bounce_curve() {
    assert!((sentence_bounce_scale(0.0, true) - 0.5).abs() < 1e-9);
    assert!((sentence_bounce_scale(0.1, true) - 0.85).abs() < 1e-9);
    assert!((sentence_bounce_scale(0.3, true) - 1.1).abs() < 1e-9);
    assert_eq!(sentence_bounce_scale(0.5, true), 1.0);
    assert_eq!(sentence_bounce_scale(0.0, false), 1.0);
}

#[test]
fn sentence_mode_shows_one_centered_sentence_with_offset_shadow() {
    let style = SubtitleStyle {
        animation: AnimationMode::Sentence,
        ..SubtitleStyle::default()
    };
    let layer = plan("Hello there. General Kenobi", &style, 0.75, false).unwrap();
    assert_eq!(layer.items.len(), 1);
    let item = &layer.items[0];
    assert_eq!(item.text, "General Kenobi");
    assert!((item.x + item.width / 2.0 - 960.0).abs() < 1e-9);
    assert_eq!(layer.shadow.map(|s| s.offset), Some(Vec2::new(2.0, 2.0)));
    assert_eq!(layer.chips.len(), 1);
}

#[test]
fn char_wrap_breaks_before_overflow() {
    // 10 px per char at size 20, max 35 px: three chars per line.
    let lines = wrap_chars("abcdefg", 35.0, 20.0, &mut HalfEm);
    assert_eq!(lines, vec!["abc", "def", "g"]);
    assert!(wrap_chars("", 35.0, 20.0, &mut HalfEm).is_empty());
}

#[test]
fn static_modes_draw_all_text() {
    for animation in [AnimationMode::Typewriter, AnimationMode::Fade, AnimationMode::None] {
        let style = SubtitleStyle {
            animation,
            ..SubtitleStyle::default()
        };
        let layer = plan("static caption", &style, 0.0, true).unwrap();
        assert_eq!(layer.items.len(), 1, "{animation:?}");
        assert_eq!(layer.items[0].text, "static caption");
        assert_eq!(layer.shadow.map(|s| s.offset), Some(Vec2::ZERO));
    }
}

#[test]
fn blank_text_plans_nothing() {
    assert!(plan("   ", &SubtitleStyle::default(), 1.0, true).is_none());
}

#[test]
fn outline_zero_width_is_disabled() {
    let style = SubtitleStyle {
        outline_width: 0.0,
        ..SubtitleStyle::default()
    };
    let layer = plan("word", &style, 1.0, true).unwrap();
    assert!(layer.outline.is_none());
}
