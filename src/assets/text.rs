use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::foundation::error::{ReelError, ReelResult};

/// Environment variable naming a subtitle font file.
pub const FONT_ENV: &str = "STORYREEL_FONT";

const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Horizontal advance of a single-line string.
///
/// Subtitle planning only needs widths; keeping it behind a trait lets layout logic run without
/// a font.
pub trait TextMeasure {
    fn measure(&mut self, text: &str, size_px: f32) -> f32;
}

const FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];
const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];
const FONT_DIR_DEPTH: usize = 4;

/// Locate subtitle font bytes: explicit path, then `STORYREEL_FONT`, then a file named after
/// `family` in the font directories, then common system fonts.
pub fn resolve_font_bytes(
    explicit: Option<&Path>,
    family: Option<&str>,
) -> Option<(PathBuf, Vec<u8>)> {
    let env_path = std::env::var_os(FONT_ENV).map(PathBuf::from);
    let by_family = family.and_then(|f| find_family_file(f, &font_dirs()));
    let candidates = explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(env_path)
        .chain(by_family)
        .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));
    for path in candidates {
        match std::fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => return Some((path, bytes)),
            Ok(_) => tracing::debug!(path = %path.display(), "skipping empty font file"),
            Err(_) => continue,
        }
    }
    None
}

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = FONT_DIRS.iter().map(PathBuf::from).collect();
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join(".fonts"));
        dirs.push(home.join("Library/Fonts"));
    }
    dirs
}

/// Lowercase ASCII alphanumerics only: `"Open Sans"` and `OpenSans-Bold` compare alike.
fn normalize_font_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Font file whose name starts with `family`, preferring the closest match (`Inter.ttf` over
/// `Inter-Bold.ttf` over `InterDisplay-Bold.ttf`).
pub fn find_family_file(family: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let wanted = normalize_font_name(family);
    if wanted.is_empty() {
        return None;
    }
    let mut best: Option<(usize, PathBuf)> = None;
    let mut pending: Vec<(PathBuf, usize)> = dirs.iter().map(|d| (d.clone(), 0)).collect();
    while let Some((dir, depth)) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.is_dir() {
                if depth < FONT_DIR_DEPTH {
                    pending.push((path, depth + 1));
                }
                continue;
            }
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| FONT_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)));
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let stem = normalize_font_name(stem);
            if !is_font || !stem.starts_with(&wanted) {
                continue;
            }
            let closer = best.as_ref().is_none_or(|(len, prev)| {
                stem.len() < *len || (stem.len() == *len && path < *prev)
            });
            if closer {
                best = Some((stem.len(), path));
            }
        }
    }
    best.map(|(_, path)| path)
}

/// Parley layout engine bound to one registered font.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
    family_name: String,
    weight: u16,
    font: vello_cpu::peniko::FontData,
    widths: HashMap<(String, u32), f32>,
}

impl TextLayoutEngine {
    pub fn from_font_bytes(font_bytes: Vec<u8>) -> ReelResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| ReelError::asset_decode("no font families registered from font bytes"))?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ReelError::asset_decode("registered font family has no name"))?
            .to_string();

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            weight: 400,
            font: vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0),
            widths: HashMap::new(),
        })
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub(crate) fn font_data(&self) -> &vello_cpu::peniko::FontData {
        &self.font
    }

    /// Requested weight; only has an effect when the registered font offers variations.
    pub fn set_weight(&mut self, weight: u16) {
        if weight != self.weight {
            self.weight = weight;
            self.widths.clear();
        }
    }

    /// Shape `text` as one unwrapped line.
    pub fn layout_line(&mut self, text: &str, size_px: f32) -> ReelResult<parley::Layout<()>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ReelError::validation("text size_px must be finite and > 0"));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::new(f32::from(self.weight)),
        ));

        let mut layout: parley::Layout<()> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

impl TextMeasure for TextLayoutEngine {
    fn measure(&mut self, text: &str, size_px: f32) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        let key = (text.to_owned(), size_px.to_bits());
        if let Some(w) = self.widths.get(&key) {
            return *w;
        }
        let w = match self.layout_line(text, size_px) {
            Ok(layout) => layout.full_width(),
            Err(e) => {
                tracing::debug!("text measure failed, estimating: {e}");
                approx_width(text, size_px)
            }
        };
        self.widths.insert(key, w);
        w
    }
}

/// Font-free width estimate (average glyph advance of 0.55 em).
pub(crate) fn approx_width(text: &str, size_px: f32) -> f32 {
    text.chars().count() as f32 * size_px * 0.55
}

/// Measurer used when no font could be loaded.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApproxMeasure;

impl TextMeasure for ApproxMeasure {
    fn measure(&mut self, text: &str, size_px: f32) -> f32 {
        approx_width(text, size_px)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/text.rs"]
mod tests;
