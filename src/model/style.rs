use serde::{Deserialize, Serialize};

use crate::assets::color::Color;

/// How subtitle text is revealed over a scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationMode {
    /// Word-by-word reveal with the spoken word highlighted.
    #[default]
    Pop,
    /// One sentence at a time with a bounce on entry.
    Sentence,
    Typewriter,
    Fade,
    None,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTransform {
    #[default]
    None,
    Uppercase,
    Lowercase,
    Capitalize,
}

impl TextTransform {
    pub fn apply(self, text: &str) -> String {
        match self {
            Self::None => text.to_owned(),
            Self::Uppercase => text.to_uppercase(),
            Self::Lowercase => text.to_lowercase(),
            Self::Capitalize => {
                let mut out = String::with_capacity(text.len());
                let mut at_word_start = true;
                for ch in text.chars() {
                    if ch.is_whitespace() {
                        at_word_start = true;
                        out.push(ch);
                    } else if at_word_start {
                        out.extend(ch.to_uppercase());
                        at_word_start = false;
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }
}

/// Subtitle look. Every field has a default, so partial JSON degrades to the built-in style.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubtitleStyle {
    /// Matched against font file names when the project names no font file.
    pub font_family: String,
    /// Size in px at the base canvas width.
    pub font_size: f64,
    #[serde(deserialize_with = "de_font_weight")]
    pub font_weight: u16,
    pub text_color: Color,
    pub outline_color: Color,
    pub outline_width: f64,
    pub shadow_color: Color,
    pub shadow_blur: f64,
    pub background_color: Color,
    pub background_opacity: f64,
    /// Distance of the text block's center from the bottom edge, percent of canvas height.
    pub vertical_offset: f64,
    #[serde(alias = "animationMode")]
    pub animation: AnimationMode,
    pub active_word_color: Option<Color>,
    pub inactive_word_color: Option<Color>,
    /// Carried for style editors; the compositor reveals the whole narration.
    pub words_per_batch: Option<u32>,
    pub text_transform: TextTransform,
}

pub const DEFAULT_ACTIVE_WORD_COLOR: Color = Color::rgba(1.0, 215.0 / 255.0, 0.0, 1.0);

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_family: "Kanit".to_owned(),
            font_size: 84.0,
            font_weight: 900,
            text_color: Color::rgba(1.0, 1.0, 1.0, 1.0),
            outline_color: Color::rgba(0.0, 0.0, 0.0, 1.0),
            outline_width: 4.0,
            shadow_color: Color::rgba(0.0, 0.0, 0.0, 0.8),
            shadow_blur: 5.0,
            background_color: Color::rgba(0.0, 0.0, 0.0, 1.0),
            background_opacity: 0.75,
            vertical_offset: 30.0,
            animation: AnimationMode::Pop,
            active_word_color: None,
            inactive_word_color: None,
            words_per_batch: None,
            text_transform: TextTransform::None,
        }
    }
}

impl SubtitleStyle {
    /// Named templates offered by the style picker.
    pub fn preset(name: &str) -> Option<Self> {
        let base = Self::default();
        let hex = |s: &str| Color::parse(s).ok();
        let style = match name {
            "viral-pop" => Self {
                font_size: 64.0,
                background_opacity: 0.0,
                vertical_offset: 13.0,
                outline_width: 5.0,
                shadow_blur: 8.0,
                shadow_color: Color::rgba(0.0, 0.0, 0.0, 0.9),
                active_word_color: hex("#ffcd00"),
                inactive_word_color: hex("#FFFFFF"),
                words_per_batch: Some(3),
                text_transform: TextTransform::Uppercase,
                ..base
            },
            "beast" => Self {
                font_family: "Impact".to_owned(),
                font_size: 68.0,
                text_color: hex("#00FF00")?,
                background_opacity: 0.0,
                vertical_offset: 15.0,
                outline_width: 6.0,
                shadow_blur: 10.0,
                shadow_color: Color::rgba(0.0, 0.0, 0.0, 0.9),
                active_word_color: hex("#FFFF00"),
                inactive_word_color: hex("#00FF00"),
                words_per_batch: Some(2),
                text_transform: TextTransform::Uppercase,
                ..base
            },
            "umi" => Self {
                font_family: "Inter".to_owned(),
                font_size: 56.0,
                font_weight: 600,
                text_color: hex("#87CEEB")?,
                background_opacity: 0.3,
                vertical_offset: 20.0,
                outline_color: Color::transparent(),
                outline_width: 0.0,
                shadow_blur: 0.0,
                shadow_color: Color::transparent(),
                active_word_color: hex("#FFFFFF"),
                inactive_word_color: hex("#87CEEB"),
                words_per_batch: Some(4),
                ..base
            },
            "tiktok" => Self {
                font_size: 60.0,
                font_weight: 800,
                background_opacity: 0.0,
                vertical_offset: 15.0,
                shadow_blur: 6.0,
                active_word_color: hex("#FF0050"),
                inactive_word_color: hex("#FFFFFF"),
                words_per_batch: Some(3),
                text_transform: TextTransform::Uppercase,
                ..base
            },
            _ => return None,
        };
        Some(style)
    }

    pub fn active_color(&self) -> Color {
        self.active_word_color.unwrap_or(DEFAULT_ACTIVE_WORD_COLOR)
    }

    pub fn inactive_color(&self) -> Color {
        self.inactive_word_color.unwrap_or(self.text_color)
    }

    /// Chip fill, or `None` when the background is fully transparent.
    pub fn chip_color(&self) -> Option<Color> {
        if self.background_opacity <= 0.0 {
            return None;
        }
        let c = self.background_color.with_opacity(self.background_opacity);
        c.is_visible().then_some(c)
    }

    /// Vertical center of the text block as a fraction of canvas height from the top.
    pub fn baseline_fraction(&self) -> f64 {
        let offset = if self.vertical_offset.is_finite() {
            self.vertical_offset.clamp(0.0, 100.0)
        } else {
            30.0
        };
        1.0 - offset / 100.0
    }
}

fn de_font_weight<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Text(String),
    }

    let w = match Repr::deserialize(deserializer)? {
        Repr::Num(n) => n,
        Repr::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "normal" => 400.0,
            "bold" => 700.0,
            other => other
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid font weight \"{s}\"")))?,
        },
    };
    if !w.is_finite() {
        return Err(serde::de::Error::custom("font weight must be finite"));
    }
    Ok(w.clamp(1.0, 1000.0).round() as u16)
}

#[cfg(test)]
#[path = "../../tests/unit/model/style.rs"]
mod tests;
