use std::{collections::HashMap, path::PathBuf};

use ab_glyph::{Font, FontArc, ScaleFont};
use anyhow::Context as _;

use crate::error::{FxError, FxResult};

/// Font selection for a caption. `bold` follows the caption convention:
/// every family is rendered bold except "impact", whose glyphs are already
/// heavy.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub bold: bool,
}

impl FontSpec {
    /// Builds the spec for a requested family name, applying the alias and
    /// weight rules ("roboto" resolves to Roboto Condensed).
    pub fn for_family(name: &str) -> Self {
        let family = if name.eq_ignore_ascii_case("roboto") {
            "Roboto Condensed".to_string()
        } else {
            name.to_string()
        };
        let bold = !name.eq_ignore_ascii_case("impact");
        Self { family, bold }
    }
}

/// White-on-transparent glyph layer, premultiplied RGBA8.
#[derive(Clone, Debug)]
pub struct TextLayer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Capability consumed by the stamp builder: rasterize a caption string as
/// centered white glyphs, wrapped to `max_width`. Returns `None` when the
/// string produces no visible glyphs.
pub trait TextRenderer {
    fn render(
        &self,
        text: &str,
        font: &FontSpec,
        size_px: u32,
        max_width: u32,
    ) -> FxResult<Option<TextLayer>>;
}

/// [`TextRenderer`] backed by fonts found on the host system via ab_glyph.
/// Families can be pinned to explicit font files with [`Self::register`];
/// otherwise a small set of well-known paths is probed, falling back to
/// DejaVu Sans.
#[derive(Clone, Debug, Default)]
pub struct SystemFontRenderer {
    overrides: HashMap<String, PathBuf>,
}

impl SystemFontRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `family` to a font file, bypassing system probing.
    pub fn register(mut self, family: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(family.into().to_lowercase(), path.into());
        self
    }

    fn load_font(&self, spec: &FontSpec) -> FxResult<FontArc> {
        let mut candidates = Vec::new();
        if let Some(path) = self.overrides.get(&spec.family.to_lowercase()) {
            candidates.push(path.clone());
        }
        candidates.extend(well_known_paths(&spec.family, spec.bold));

        for path in &candidates {
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            let font = FontArc::try_from_vec(bytes)
                .with_context(|| format!("parse font file '{}'", path.display()))?;
            return Ok(font);
        }
        Err(FxError::text(format!(
            "no usable font file found for family '{}'",
            spec.family
        )))
    }
}

fn well_known_paths(family: &str, bold: bool) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let lower = family.to_lowercase();
    let slug = lower.replace(' ', "");

    if lower == "impact" {
        paths.push(PathBuf::from(
            "/usr/share/fonts/truetype/msttcorefonts/Impact.ttf",
        ));
    }
    paths.push(PathBuf::from(format!(
        "/usr/share/fonts/truetype/{slug}/{family}{}.ttf",
        if bold { "-Bold" } else { "-Regular" }
    )));
    if bold {
        paths.push(PathBuf::from(
            "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
        ));
        paths.push(PathBuf::from(
            "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
        ));
    }
    paths.push(PathBuf::from(
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    ));
    paths.push(PathBuf::from(
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    ));
    paths.push(PathBuf::from("/System/Library/Fonts/Helvetica.ttc"));
    paths.push(PathBuf::from("C:\\Windows\\Fonts\\arial.ttf"));
    paths
}

impl TextRenderer for SystemFontRenderer {
    fn render(
        &self,
        text: &str,
        font: &FontSpec,
        size_px: u32,
        max_width: u32,
    ) -> FxResult<Option<TextLayer>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        if size_px == 0 || max_width == 0 {
            return Err(FxError::validation("text size and width must be non-zero"));
        }

        let face = self.load_font(font)?;
        let scale = ab_glyph::PxScale::from(size_px as f32);
        let scaled = face.as_scaled(scale);

        let lines = wrap_words(text, max_width as f32, |word| line_width(&scaled, word));
        if lines.is_empty() {
            return Ok(None);
        }

        let line_height = (scaled.ascent() - scaled.descent() + scaled.line_gap()).ceil();
        let widest = lines
            .iter()
            .map(|l| line_width(&scaled, l))
            .fold(0.0f32, f32::max);
        let layer_w = (widest.ceil() as u32).max(1);
        let layer_h = ((line_height * lines.len() as f32).ceil() as u32).max(1);

        let mut data = vec![0u8; layer_w as usize * layer_h as usize * 4];
        for (row, line) in lines.iter().enumerate() {
            let lw = line_width(&scaled, line);
            // Centered justification within the layer.
            let mut cursor_x = (layer_w as f32 - lw) / 2.0;
            let baseline = row as f32 * line_height + scaled.ascent();

            let mut prev: Option<ab_glyph::GlyphId> = None;
            for ch in line.chars() {
                let id = scaled.glyph_id(ch);
                if let Some(p) = prev {
                    cursor_x += scaled.kern(p, id);
                }
                let glyph = id.with_scale_and_position(scale, ab_glyph::point(cursor_x, baseline));
                if let Some(outlined) = face.outline_glyph(glyph) {
                    let bounds = outlined.px_bounds();
                    outlined.draw(|px, py, coverage| {
                        let x = bounds.min.x as i64 + i64::from(px);
                        let y = bounds.min.y as i64 + i64::from(py);
                        if x < 0 || y < 0 || x >= i64::from(layer_w) || y >= i64::from(layer_h) {
                            return;
                        }
                        let a = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                        let idx = ((y as usize) * layer_w as usize + x as usize) * 4;
                        // White glyphs premultiplied: every channel carries
                        // the coverage. Overlaps keep the strongest hit.
                        for c in 0..4 {
                            data[idx + c] = data[idx + c].max(a);
                        }
                    });
                }
                cursor_x += scaled.h_advance(id);
                prev = Some(id);
            }
        }

        if data.chunks_exact(4).all(|px| px[3] == 0) {
            return Ok(None);
        }
        Ok(Some(TextLayer {
            width: layer_w,
            height: layer_h,
            data,
        }))
    }
}

fn line_width<S: ScaleFont<F>, F: Font>(scaled: &S, line: &str) -> f32 {
    let mut w = 0.0f32;
    let mut prev: Option<ab_glyph::GlyphId> = None;
    for ch in line.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(p) = prev {
            w += scaled.kern(p, id);
        }
        w += scaled.h_advance(id);
        prev = Some(id);
    }
    w
}

/// Greedy word wrap. A single word wider than the limit gets its own line
/// and is clipped downstream rather than broken mid-word.
fn wrap_words(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if !current.is_empty() && measure(&candidate) > max_width {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_spec_applies_alias_and_weight_rules() {
        let roboto = FontSpec::for_family("roboto");
        assert_eq!(roboto.family, "Roboto Condensed");
        assert!(roboto.bold);

        let impact = FontSpec::for_family("Impact");
        assert_eq!(impact.family, "Impact");
        assert!(!impact.bold);

        assert!(FontSpec::for_family("futura").bold);
    }

    #[test]
    fn wrap_respects_width_and_keeps_word_order() {
        // Width of a string == its char count in this fake metric.
        let lines = wrap_words("aa bb cc dd", 5.0, |s| s.len() as f32);
        assert_eq!(lines, vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn wrap_puts_oversized_word_on_its_own_line() {
        let lines = wrap_words("x enormous y", 4.0, |s| s.len() as f32);
        assert_eq!(lines, vec!["x", "enormous", "y"]);
    }

    #[test]
    fn wrap_of_blank_text_is_empty() {
        assert!(wrap_words("   ", 10.0, |s| s.len() as f32).is_empty());
    }
}
