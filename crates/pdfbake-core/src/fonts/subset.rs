//! Custom font programs and glyph subsetting

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ttf_parser::{Face, GlyphId};

use crate::error::FontError;

/// Outline format of an embedded font program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineKind {
    /// `glyf` outlines, embedded as `FontFile2`
    TrueType,
    /// CFF outlines inside an OpenType wrapper, embedded as `FontFile3`
    Cff,
}

/// Face-wide metrics in 1000-unit glyph space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMetrics {
    pub ascent: f64,
    pub descent: f64,
    pub cap_height: f64,
    pub italic_angle: f64,
    pub bbox: [f64; 4],
    pub units_per_em: u16,
    pub fixed_pitch: bool,
}

/// A parsed custom font binary
#[derive(Debug)]
pub struct FontProgram {
    id: String,
    data: Arc<Vec<u8>>,
    index: u32,
    postscript_name: String,
    outline: OutlineKind,
    metrics: FaceMetrics,
}

impl FontProgram {
    /// Validate a font binary and read what the embedder needs from it
    pub fn parse(id: &str, data: Arc<Vec<u8>>) -> Result<Self, FontError> {
        let face = Face::parse(&data, 0).map_err(|e| FontError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

        let tables = face.tables();
        let outline = if tables.glyf.is_some() {
            OutlineKind::TrueType
        } else if tables.cff.is_some() {
            OutlineKind::Cff
        } else {
            return Err(FontError::Corrupt {
                id: id.to_string(),
                reason: "no glyf or CFF outlines".to_string(),
            });
        };

        let postscript_name = postscript_name(&face).unwrap_or_else(|| sanitize_name(id));
        let metrics = face_metrics(&face);

        Ok(Self {
            id: id.to_string(),
            data: data.clone(),
            index: 0,
            postscript_name,
            outline,
            metrics,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn outline(&self) -> OutlineKind {
        self.outline
    }

    pub fn metrics(&self) -> &FaceMetrics {
        &self.metrics
    }

    pub fn postscript_name(&self) -> &str {
        &self.postscript_name
    }

    /// Whether the font maps `ch` to a real glyph
    pub fn has_glyph(&self, ch: char) -> bool {
        self.face()
            .ok()
            .and_then(|face| face.glyph_index(ch))
            .is_some_and(|gid| gid.0 != 0)
    }

    fn face(&self) -> Result<Face<'_>, FontError> {
        Face::parse(&self.data, self.index).map_err(|e| FontError::Corrupt {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }

    /// Cut the font down to the glyphs needed for `chars`.
    ///
    /// Glyph 0 is always kept. Characters the font cannot map are reported
    /// in [`PreparedFont::missing`] and draw as `.notdef`.
    pub fn subset(&self, chars: &BTreeSet<char>) -> Result<PreparedFont, FontError> {
        let face = self.face()?;
        let mut remapper = subsetter::GlyphRemapper::new();
        let mut glyphs = BTreeMap::new();
        let mut widths = BTreeMap::new();
        let mut missing = Vec::new();

        for &ch in chars {
            match face.glyph_index(ch).filter(|gid| gid.0 != 0) {
                Some(gid) => {
                    let new_gid = remapper.remap(gid.0);
                    glyphs.insert(ch, new_gid);
                    widths.insert(new_gid, self.advance(&face, gid));
                }
                None => missing.push(ch),
            }
        }
        widths.insert(0, self.advance(&face, GlyphId(0)));

        let data = subsetter::subset(&self.data, self.index, &remapper).map_err(|e| FontError::Subset {
            id: self.id.clone(),
            reason: format!("{:?}", e),
        })?;

        Ok(PreparedFont {
            postscript_name: format!("{}+{}", subset_tag(&self.id, chars), self.postscript_name),
            outline: self.outline,
            data,
            subsetted: true,
            glyphs,
            widths,
            missing,
            metrics: self.metrics,
        })
    }

    /// Embed the whole program with its original glyph ids
    pub fn full(&self, chars: &BTreeSet<char>) -> Result<PreparedFont, FontError> {
        let face = self.face()?;
        let mut glyphs = BTreeMap::new();
        let mut widths = BTreeMap::new();
        let mut missing = Vec::new();

        for &ch in chars {
            match face.glyph_index(ch).filter(|gid| gid.0 != 0) {
                Some(gid) => {
                    glyphs.insert(ch, gid.0);
                    widths.insert(gid.0, self.advance(&face, gid));
                }
                None => missing.push(ch),
            }
        }
        widths.insert(0, self.advance(&face, GlyphId(0)));

        Ok(PreparedFont {
            postscript_name: self.postscript_name.clone(),
            outline: self.outline,
            data: self.data.as_ref().clone(),
            subsetted: false,
            glyphs,
            widths,
            missing,
            metrics: self.metrics,
        })
    }

    fn advance(&self, face: &Face<'_>, gid: GlyphId) -> f64 {
        let units = self.metrics.units_per_em.max(1) as f64;
        face.glyph_hor_advance(gid).unwrap_or(0) as f64 * 1000.0 / units
    }
}

/// A font program ready to be written into a PDF
#[derive(Debug, Clone)]
pub struct PreparedFont {
    pub postscript_name: String,
    pub outline: OutlineKind,
    pub data: Vec<u8>,
    pub subsetted: bool,
    /// Character to glyph id in `data`
    pub glyphs: BTreeMap<char, u16>,
    /// Advance per glyph id, 1000 units per em
    pub widths: BTreeMap<u16, f64>,
    pub missing: Vec<char>,
    pub metrics: FaceMetrics,
}

impl PreparedFont {
    pub fn glyph(&self, ch: char) -> u16 {
        self.glyphs.get(&ch).copied().unwrap_or(0)
    }

    pub fn glyph_width(&self, gid: u16) -> f64 {
        self.widths.get(&gid).copied().unwrap_or(0.0)
    }

    /// Width of `text` in 1000-unit glyph space
    pub fn text_width(&self, text: &str) -> f64 {
        text.chars().map(|ch| self.glyph_width(self.glyph(ch))).sum()
    }
}

fn postscript_name(face: &Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;

    face.names()
        .into_iter()
        .filter(|entry| entry.name_id == name_id::POST_SCRIPT_NAME)
        .find_map(|entry| entry.to_string())
        .map(|name| sanitize_name(&name))
        .filter(|name| !name.is_empty())
}

/// Keep only characters allowed in a PDF font name
fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}

fn face_metrics(face: &Face<'_>) -> FaceMetrics {
    let units_per_em = face.units_per_em().max(1);
    let scale = 1000.0 / units_per_em as f64;
    let ascent = face.ascender() as f64 * scale;
    let bbox = face.global_bounding_box();

    FaceMetrics {
        ascent,
        descent: face.descender() as f64 * scale,
        cap_height: face
            .capital_height()
            .map(|h| h as f64 * scale)
            .unwrap_or(ascent),
        italic_angle: face.italic_angle().map(|a| a as f64).unwrap_or(0.0),
        bbox: [
            bbox.x_min as f64 * scale,
            bbox.y_min as f64 * scale,
            bbox.x_max as f64 * scale,
            bbox.y_max as f64 * scale,
        ],
        units_per_em,
        fixed_pitch: face.is_monospaced(),
    }
}

/// Six uppercase letters derived from the font and its glyph set
fn subset_tag(id: &str, chars: &BTreeSet<char>) -> String {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    chars.hash(&mut hasher);
    let mut value = hasher.finish();
    (0..6)
        .map(|_| {
            let letter = (b'A' + (value % 26) as u8) as char;
            value /= 26;
            letter
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::outline_font;

    fn program() -> FontProgram {
        FontProgram::parse("body", Arc::new(outline_font())).unwrap()
    }

    fn chars(text: &str) -> BTreeSet<char> {
        text.chars().collect()
    }

    #[test]
    fn test_parse_reads_outlines_and_metrics() {
        let program = program();
        assert_eq!(program.outline(), OutlineKind::TrueType);
        assert!(!program.postscript_name().is_empty());
        assert!(program.metrics().ascent > 0.0);
        assert!(program.metrics().descent <= 0.0);
        assert!(program.has_glyph('A'));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = FontProgram::parse("junk", Arc::new(vec![0u8; 64])).unwrap_err();
        assert!(matches!(err, FontError::Corrupt { ref id, .. } if id == "junk"));
    }

    #[test]
    fn test_subset_keeps_advances_for_used_glyphs() {
        let program = program();
        let used = chars("Hello");
        let prepared = program.subset(&used).unwrap();
        assert!(prepared.subsetted);
        assert!(prepared.missing.is_empty());

        let full = outline_font();
        let original = Face::parse(&full, 0).unwrap();
        let subset = Face::parse(&prepared.data, 0).unwrap();
        for ch in used {
            let old_gid = original.glyph_index(ch).unwrap();
            let new_gid = GlyphId(prepared.glyph(ch));
            assert_ne!(new_gid.0, 0);
            assert_eq!(
                original.glyph_hor_advance(old_gid),
                subset.glyph_hor_advance(new_gid),
                "advance for {:?}",
                ch
            );
        }
    }

    #[test]
    fn test_subset_is_no_larger_than_full_font() {
        let program = program();
        let used = chars("Hello World");
        let subset = program.subset(&used).unwrap();
        let full = program.full(&used).unwrap();
        assert!(subset.data.len() <= full.data.len());
        assert_eq!(full.data.len(), program.len());
        assert!(!full.subsetted);
        assert_eq!(subset.text_width("Hello"), full.text_width("Hello"));
    }

    #[test]
    fn test_subset_name_carries_tag() {
        let program = program();
        let prepared = program.subset(&chars("abc")).unwrap();
        let (tag, rest) = prepared.postscript_name.split_once('+').unwrap();
        assert_eq!(tag.len(), 6);
        assert!(tag.chars().all(|c| c.is_ascii_uppercase()));
        assert_eq!(rest, program.postscript_name());
    }

    #[test]
    fn test_unmapped_chars_are_reported() {
        let program = program();
        let prepared = program.full(&chars("a\u{10FFFD}")).unwrap();
        assert_eq!(prepared.missing, vec!['\u{10FFFD}']);
        assert_eq!(prepared.glyph('\u{10FFFD}'), 0);
    }
}
