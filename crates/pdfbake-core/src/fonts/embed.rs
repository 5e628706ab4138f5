//! Writing font objects into the output document

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::standard::StandardFamily;
use super::subset::{OutlineKind, PreparedFont};
use crate::operations::TextStyle;

/// What text drawn with an embedded font is encoded and measured against
#[derive(Debug, Clone)]
pub enum FontFace {
    Standard { family: StandardFamily, bold: bool },
    Custom(Arc<PreparedFont>),
}

/// A font object present in the output document
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    pub object_id: ObjectId,
    pub base_font: String,
    pub face: FontFace,
}

impl EmbeddedFont {
    pub fn is_standard(&self) -> bool {
        matches!(self.face, FontFace::Standard { .. })
    }

    /// Bytes for a `Tj` string operand
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match &self.face {
            FontFace::Standard { family, .. } => family.encode(text).0,
            FontFace::Custom(font) => text
                .chars()
                .flat_map(|ch| font.glyph(ch).to_be_bytes())
                .collect(),
        }
    }

    /// Advance width of `text` in PDF units at `font_size`
    pub fn text_width(&self, text: &str, font_size: f64) -> f64 {
        let units = match &self.face {
            FontFace::Standard { family, bold } => family.text_width(text, *bold),
            FontFace::Custom(font) => font.text_width(text),
        };
        units * font_size / 1000.0
    }

    /// Ascender in 1000-unit glyph space
    pub fn ascent(&self) -> f64 {
        match &self.face {
            FontFace::Standard { family, .. } => family.ascent(),
            FontFace::Custom(font) => font.metrics.ascent,
        }
    }
}

/// Lookup key for an embedded font.
///
/// Standard families resolve to a different BaseFont per weight and style;
/// a custom font id already names one concrete face.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey {
    pub font_id: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn plain(font_id: &str) -> Self {
        Self {
            font_id: font_id.to_string(),
            bold: false,
            italic: false,
        }
    }

    pub fn for_style(style: &TextStyle) -> Self {
        Self {
            font_id: style.font_id.clone(),
            bold: style.is_bold(),
            italic: style.is_italic(),
        }
    }
}

/// Every font embedded for one export, written once per document
#[derive(Debug, Clone, Default)]
pub struct EmbeddedFonts {
    fonts: HashMap<FontKey, EmbeddedFont>,
}

impl EmbeddedFonts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: FontKey, font: EmbeddedFont) {
        self.fonts.insert(key, font);
    }

    /// Font to draw `style` with: the exact weight/style variant first, then
    /// the plain entry for the font id
    pub fn lookup(&self, style: &TextStyle) -> Option<&EmbeddedFont> {
        self.fonts
            .get(&FontKey::for_style(style))
            .or_else(|| self.fonts.get(&FontKey::plain(&style.font_id)))
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Add a standard-14 font dictionary
pub fn embed_standard(doc: &mut Document, family: StandardFamily, bold: bool, italic: bool) -> EmbeddedFont {
    let base_font = family.base_font(bold, italic);
    let mut font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
    };
    if family.uses_win_ansi() {
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    }
    let object_id = doc.add_object(Object::Dictionary(font));

    EmbeddedFont {
        object_id,
        base_font: base_font.to_string(),
        face: FontFace::Standard { family, bold },
    }
}

/// Add a composite font (Type0 over a CIDFont) with Identity-H encoding.
///
/// Content strings are two-byte glyph ids of `font.data`.
pub fn embed_custom(doc: &mut Document, font: Arc<PreparedFont>) -> EmbeddedFont {
    let ps_name = font.postscript_name.clone();
    let metrics = font.metrics;

    let file_dict = match font.outline {
        OutlineKind::TrueType => dictionary! {
            "Length1" => Object::Integer(font.data.len() as i64),
        },
        OutlineKind::Cff => dictionary! {
            "Subtype" => "OpenType",
        },
    };
    let file_id = doc.add_object(Stream::new(file_dict, font.data.clone()));

    let mut flags = 4;
    if metrics.fixed_pitch {
        flags |= 1;
    }
    if metrics.italic_angle != 0.0 {
        flags |= 64;
    }
    let file_key = match font.outline {
        OutlineKind::TrueType => "FontFile2",
        OutlineKind::Cff => "FontFile3",
    };
    let mut descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => ps_name.as_str(),
        "Flags" => Object::Integer(flags),
        "FontBBox" => metrics.bbox.iter().map(|v| Object::Real(*v as f32)).collect::<Vec<_>>(),
        "ItalicAngle" => Object::Real(metrics.italic_angle as f32),
        "Ascent" => Object::Real(metrics.ascent as f32),
        "Descent" => Object::Real(metrics.descent as f32),
        "CapHeight" => Object::Real(metrics.cap_height as f32),
        "StemV" => Object::Integer(80),
    };
    descriptor.set(file_key, Object::Reference(file_id));
    let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

    let subtype = match font.outline {
        OutlineKind::TrueType => "CIDFontType2",
        OutlineKind::Cff => "CIDFontType0",
    };
    let mut cid_font = dictionary! {
        "Type" => "Font",
        "Subtype" => subtype,
        "BaseFont" => ps_name.as_str(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::String(b"Adobe".to_vec(), StringFormat::Literal),
            "Ordering" => Object::String(b"Identity".to_vec(), StringFormat::Literal),
            "Supplement" => Object::Integer(0),
        },
        "FontDescriptor" => Object::Reference(descriptor_id),
        "DW" => Object::Integer(0),
        "W" => width_array(&font.widths),
    };
    if font.outline == OutlineKind::TrueType {
        cid_font.set("CIDToGIDMap", Object::Name(b"Identity".to_vec()));
    }
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let to_unicode = to_unicode_cmap(&font.glyphs);
    let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), to_unicode.into_bytes()));

    let object_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => ps_name.as_str(),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => Object::Reference(to_unicode_id),
    });

    EmbeddedFont {
        object_id,
        base_font: ps_name,
        face: FontFace::Custom(font),
    }
}

/// `W` array grouping consecutive glyph ids: `[first [w1 w2 ...] ...]`
fn width_array(widths: &BTreeMap<u16, f64>) -> Object {
    let mut out = Vec::new();
    let mut run_start: Option<u16> = None;
    let mut run: Vec<Object> = Vec::new();
    let mut previous = 0u16;

    for (&gid, &width) in widths {
        match run_start {
            Some(_) if gid == previous.wrapping_add(1) => {}
            Some(start) => {
                out.push(Object::Integer(start as i64));
                out.push(Object::Array(std::mem::take(&mut run)));
                run_start = Some(gid);
            }
            None => run_start = Some(gid),
        }
        run.push(Object::Real(width as f32));
        previous = gid;
    }
    if let Some(start) = run_start {
        out.push(Object::Integer(start as i64));
        out.push(Object::Array(run));
    }

    Object::Array(out)
}

/// ToUnicode CMap so extracted text maps back to the original characters
fn to_unicode_cmap(glyphs: &BTreeMap<char, u16>) -> String {
    let mut by_gid: BTreeMap<u16, char> = BTreeMap::new();
    for (&ch, &gid) in glyphs {
        if gid != 0 {
            by_gid.entry(gid).or_insert(ch);
        }
    }

    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );

    let entries: Vec<_> = by_gid.into_iter().collect();
    // At most 100 entries per bfchar block
    for chunk in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            let _ = writeln!(cmap, "<{:04X}> <{}>", gid, hex);
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}
