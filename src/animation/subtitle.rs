//! Subtitle planners. They turn narration text, a style and a progress value into positioned
//! draw items; rasterization happens in `render::cpu`.

use crate::assets::color::Color;
use crate::assets::text::TextMeasure;
use crate::foundation::core::{Canvas, Point, Rect, Vec2};
use crate::model::style::{AnimationMode, SubtitleStyle};

/// Lines wrap under this fraction of the canvas width.
pub const WRAP_WIDTH_FRACTION: f64 = 0.85;
pub const LINE_HEIGHT_EM: f64 = 1.3;
/// Scale of the word being spoken in pop mode.
pub const ACTIVE_WORD_SCALE: f64 = 1.25;
const POP_CHIP_PAD_EM: f64 = 0.2;
const SENTENCE_CHIP_PAD_EM: f64 = 0.4;
const SENTENCE_SHADOW_OFFSET: Vec2 = Vec2::new(2.0, 2.0);

/// A run of text drawn on one line. `y` is the vertical middle of the em box.
#[derive(Clone, Debug, PartialEq)]
pub struct TextItem {
    pub text: String,
    /// Left edge before scaling.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub color: Color,
    /// Uniform scale applied around `pivot`.
    pub scale: f64,
    pub pivot: Point,
}

/// Background rectangle behind a word or sentence.
#[derive(Clone, Debug, PartialEq)]
pub struct Chip {
    pub rect: Rect,
    pub color: Color,
    pub scale: f64,
    pub pivot: Point,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextOutline {
    pub color: Color,
    /// Stroke width in canvas px; half of it extends outside the glyph.
    pub width: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextShadow {
    pub color: Color,
    /// Blur radius in canvas px.
    pub blur: f64,
    pub offset: Vec2,
}

/// Everything the rasterizer needs to draw one frame's subtitles.
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleLayer {
    pub font_size: f64,
    pub font_weight: u16,
    pub outline: Option<TextOutline>,
    pub shadow: Option<TextShadow>,
    pub chips: Vec<Chip>,
    pub items: Vec<TextItem>,
}

/// Inputs of one subtitle plan.
#[derive(Clone, Copy, Debug)]
pub struct SubtitleParams<'a> {
    pub text: &'a str,
    pub style: &'a SubtitleStyle,
    /// Progress through the active scene in `[0, 1]`.
    pub progress: f64,
    /// Playing or exporting; paused frames draw text at rest.
    pub animating: bool,
    pub canvas: Canvas,
    /// Canvas width divided by the base width the style was authored for.
    pub scale: f64,
}

/// Plan subtitles for the configured animation mode. `None` when there is nothing to draw.
pub fn plan_subtitles(params: &SubtitleParams<'_>, measure: &mut dyn TextMeasure) -> Option<SubtitleLayer> {
    if params.text.trim().is_empty() {
        return None;
    }
    let style = params.style;
    let font_size = style.font_size.max(1.0) * params.scale;
    let mut layer = SubtitleLayer {
        font_size,
        font_weight: style.font_weight,
        outline: (style.outline_width > 0.0 && style.outline_color.is_visible()).then(|| {
            TextOutline {
                color: style.outline_color,
                width: style.outline_width * params.scale,
            }
        }),
        shadow: None,
        chips: Vec::new(),
        items: Vec::new(),
    };
    let shadow_offset = match style.animation {
        AnimationMode::Sentence => SENTENCE_SHADOW_OFFSET,
        _ => Vec2::ZERO,
    };
    layer.shadow = (style.shadow_blur > 0.0 && style.shadow_color.is_visible()).then(|| TextShadow {
        color: style.shadow_color,
        blur: style.shadow_blur,
        offset: shadow_offset,
    });

    match style.animation {
        AnimationMode::Pop => plan_pop(params, font_size, measure, &mut layer),
        AnimationMode::Sentence => plan_sentence(params, font_size, measure, &mut layer),
        AnimationMode::Typewriter | AnimationMode::Fade | AnimationMode::None => {
            plan_static(params, font_size, measure, &mut layer)
        }
    }
    (!layer.items.is_empty()).then_some(layer)
}

/// Split into alternating word and whitespace tokens, keeping every character.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;
    for (i, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        if in_space.is_some_and(|s| s != space) {
            tokens.push(&text[start..i]);
            start = i;
        }
        in_space = Some(space);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

fn is_space_token(token: &str) -> bool {
    token.trim().is_empty()
}

/// Index (into the token list) of the word being spoken, or `None` before the first word.
///
/// With `n` words, `count = floor(progress * (n + 1))` words have been reached; the active word
/// is the last reached one, capped at the final word.
pub fn pop_active_token(tokens: &[&str], progress: f64) -> Option<usize> {
    let animatable: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !is_space_token(t))
        .map(|(i, _)| i)
        .collect();
    let n = animatable.len();
    if n == 0 {
        return None;
    }
    let count = (progress.clamp(0.0, 1.0) * (n as f64 + 1.0)).floor() as usize;
    if count == 0 {
        return None;
    }
    Some(animatable[(count - 1).min(n - 1)])
}

/// Number of words drawn while animating at `progress`; non-decreasing and equal to the word
/// count at `progress == 1`.
pub fn pop_visible_words(tokens: &[&str], progress: f64) -> usize {
    match pop_active_token(tokens, progress) {
        Some(active) => tokens[..=active].iter().filter(|t| !is_space_token(t)).count(),
        None => 0,
    }
}

struct Line {
    /// `(token index, width)`
    tokens: Vec<(usize, f64)>,
    width: f64,
}

fn wrap_tokens(tokens: &[&str], widths: &[f64], max_width: f64) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current = Line {
        tokens: Vec::new(),
        width: 0.0,
    };
    for (i, w) in widths.iter().copied().enumerate() {
        if current.width + w > max_width && !current.tokens.is_empty() {
            lines.push(std::mem::replace(
                &mut current,
                Line {
                    tokens: Vec::new(),
                    width: 0.0,
                },
            ));
        }
        current.tokens.push((i, w));
        current.width += w;
    }
    if !current.tokens.is_empty() {
        lines.push(current);
    }
    debug_assert!(lines.iter().map(|l| l.tokens.len()).sum::<usize>() == tokens.len());
    lines
}

fn first_line_y(canvas: Canvas, style: &SubtitleStyle, lines: usize, line_height: f64) -> f64 {
    let y_base = f64::from(canvas.height) * style.baseline_fraction();
    y_base - (lines as f64 * line_height) / 2.0 + line_height / 2.0
}

fn plan_pop(
    params: &SubtitleParams<'_>,
    font_size: f64,
    measure: &mut dyn TextMeasure,
    layer: &mut SubtitleLayer,
) {
    let style = params.style;
    let text = style.text_transform.apply(params.text);
    let tokens = tokenize(&text);
    let widths: Vec<f64> = tokens
        .iter()
        .map(|t| f64::from(measure.measure(t, font_size as f32)))
        .collect();
    let max_width = f64::from(params.canvas.width) * WRAP_WIDTH_FRACTION;
    let lines = wrap_tokens(&tokens, &widths, max_width);

    let active = pop_active_token(&tokens, params.progress);
    let line_height = font_size * LINE_HEIGHT_EM;
    let start_y = first_line_y(params.canvas, style, lines.len(), line_height);
    let chip_color = style.chip_color();
    let pad = font_size * POP_CHIP_PAD_EM;

    for (line_idx, line) in lines.iter().enumerate() {
        let y = start_y + line_idx as f64 * line_height;
        let mut x = (f64::from(params.canvas.width) - line.width) / 2.0;
        for &(idx, w) in &line.tokens {
            let token = tokens[idx];
            let hidden = params.animating && active.is_none_or(|a| idx > a);
            if !hidden && !is_space_token(token) {
                let is_active = active == Some(idx);
                let scale = if is_active && params.animating {
                    ACTIVE_WORD_SCALE
                } else {
                    1.0
                };
                let pivot = Point::new(x + w / 2.0, y);
                if let Some(color) = chip_color {
                    layer.chips.push(Chip {
                        rect: Rect::new(
                            x - pad,
                            y - font_size / 2.0 - pad / 2.0,
                            x + w + pad,
                            y + font_size / 2.0 + pad / 2.0,
                        ),
                        color,
                        scale,
                        pivot,
                    });
                }
                layer.items.push(TextItem {
                    text: token.to_owned(),
                    x,
                    y,
                    width: w,
                    color: if is_active {
                        style.active_color()
                    } else {
                        style.inactive_color()
                    },
                    scale,
                    pivot,
                });
            }
            x += w;
        }
    }
}

/// Split narration into sentences at ` > ` markers or after `.`, `!`, `?` followed by
/// whitespace and a capital letter.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == ' ' && chars.get(i + 1) == Some(&'>') && chars.get(i + 2) == Some(&' ') {
            out.push(std::mem::take(&mut current));
            i += 3;
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j].is_uppercase() {
                out.push(std::mem::take(&mut current));
                i = j;
                continue;
            }
        }
        i += 1;
    }
    out.push(current);
    out.into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Active sentence index and the progress through it.
pub fn sentence_at(count: usize, progress: f64) -> Option<(usize, f64)> {
    if count == 0 {
        return None;
    }
    let p = progress.clamp(0.0, 1.0);
    let idx = ((p * count as f64).floor() as usize).min(count - 1);
    let slot = 1.0 / count as f64;
    Some((idx, (p - idx as f64 * slot) / slot))
}

/// Entry bounce: 0.5 -> 1.2 over the first 20 % of a sentence, settling to 1.0 by 40 %.
pub fn sentence_bounce_scale(local_progress: f64, animating: bool) -> f64 {
    if !animating {
        return 1.0;
    }
    if local_progress < 0.2 {
        0.5 + (local_progress / 0.2) * 0.7
    } else if local_progress < 0.4 {
        1.2 - ((local_progress - 0.2) / 0.2) * 0.2
    } else {
        1.0
    }
}

fn plan_sentence(
    params: &SubtitleParams<'_>,
    font_size: f64,
    measure: &mut dyn TextMeasure,
    layer: &mut SubtitleLayer,
) {
    let style = params.style;
    let sentences = split_sentences(params.text);
    let Some((idx, local)) = sentence_at(sentences.len(), params.progress) else {
        return;
    };
    let sentence = style.text_transform.apply(&sentences[idx]);
    let scale = sentence_bounce_scale(local, params.animating);
    let cx = f64::from(params.canvas.width) / 2.0;
    let y = f64::from(params.canvas.height) * style.baseline_fraction();
    let width = f64::from(measure.measure(&sentence, font_size as f32));
    let pivot = Point::new(cx, y);

    if let Some(color) = style.chip_color() {
        let pad = font_size * SENTENCE_CHIP_PAD_EM;
        layer.chips.push(Chip {
            rect: Rect::new(
                cx - width / 2.0 - pad,
                y - font_size / 2.0 - pad / 2.0,
                cx + width / 2.0 + pad,
                y + font_size / 2.0 + pad / 2.0,
            ),
            color,
            scale,
            pivot,
        });
    }
    layer.items.push(TextItem {
        text: sentence,
        x: cx - width / 2.0,
        y,
        width,
        color: style.text_color,
        scale,
        pivot,
    });
}

/// Greedy character wrap: a line breaks before the character that would reach `max_width`.
pub fn wrap_chars(text: &str, max_width: f64, font_size: f64, measure: &mut dyn TextMeasure) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        let mut candidate = current.clone();
        candidate.push(ch);
        let w = f64::from(measure.measure(&candidate, font_size as f32));
        if w < max_width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    lines.push(current);
    lines
}

fn plan_static(
    params: &SubtitleParams<'_>,
    font_size: f64,
    measure: &mut dyn TextMeasure,
    layer: &mut SubtitleLayer,
) {
    let style = params.style;
    let text = style.text_transform.apply(params.text);
    let max_width = f64::from(params.canvas.width) * WRAP_WIDTH_FRACTION;
    let lines = wrap_chars(&text, max_width, font_size, measure);
    let line_height = font_size * LINE_HEIGHT_EM;
    let start_y = first_line_y(params.canvas, style, lines.len(), line_height);
    for (i, line) in lines.into_iter().enumerate() {
        let y = start_y + i as f64 * line_height;
        let width = f64::from(measure.measure(&line, font_size as f32));
        let x = (f64::from(params.canvas.width) - width) / 2.0;
        layer.items.push(TextItem {
            text: line,
            x,
            y,
            width,
            color: style.text_color,
            scale: 1.0,
            pivot: Point::new(x + width / 2.0, y),
        });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/subtitle.rs"]
mod tests;
