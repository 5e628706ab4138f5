//! PDF standard-14 fonts
//!
//! These ship with every PDF renderer, so they are referenced by name and
//! never embedded. Text drawn with the Latin families uses WinAnsiEncoding;
//! Symbol and ZapfDingbats use their built-in encodings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StandardFamily {
    Helvetica,
    Times,
    Courier,
    Symbol,
    ZapfDingbats,
}

impl StandardFamily {
    pub const ALL: [StandardFamily; 5] = [
        StandardFamily::Helvetica,
        StandardFamily::Times,
        StandardFamily::Courier,
        StandardFamily::Symbol,
        StandardFamily::ZapfDingbats,
    ];

    /// Registry id and display name for the family
    pub fn id(&self) -> &'static str {
        match self {
            StandardFamily::Helvetica => "helvetica",
            StandardFamily::Times => "times",
            StandardFamily::Courier => "courier",
            StandardFamily::Symbol => "symbol",
            StandardFamily::ZapfDingbats => "zapf-dingbats",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StandardFamily::Helvetica => "Helvetica",
            StandardFamily::Times => "Times",
            StandardFamily::Courier => "Courier",
            StandardFamily::Symbol => "Symbol",
            StandardFamily::ZapfDingbats => "Zapf Dingbats",
        }
    }

    pub fn css_family(&self) -> &'static str {
        match self {
            StandardFamily::Helvetica => "Helvetica, Arial, sans-serif",
            StandardFamily::Times => "'Times New Roman', Times, serif",
            StandardFamily::Courier => "'Courier New', Courier, monospace",
            StandardFamily::Symbol => "Symbol",
            StandardFamily::ZapfDingbats => "'Zapf Dingbats'",
        }
    }

    /// Concrete standard-14 BaseFont name for a weight/style combination
    pub fn base_font(&self, bold: bool, italic: bool) -> &'static str {
        match self {
            StandardFamily::Times => match (bold, italic) {
                (true, true) => "Times-BoldItalic",
                (true, false) => "Times-Bold",
                (false, true) => "Times-Italic",
                (false, false) => "Times-Roman",
            },
            StandardFamily::Helvetica => match (bold, italic) {
                (true, true) => "Helvetica-BoldOblique",
                (true, false) => "Helvetica-Bold",
                (false, true) => "Helvetica-Oblique",
                (false, false) => "Helvetica",
            },
            StandardFamily::Courier => match (bold, italic) {
                (true, true) => "Courier-BoldOblique",
                (true, false) => "Courier-Bold",
                (false, true) => "Courier-Oblique",
                (false, false) => "Courier",
            },
            StandardFamily::Symbol => "Symbol",
            StandardFamily::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Map a font family or font name to the closest standard family.
    ///
    /// Handles CSS generic families ("serif", "sans-serif", "monospace") and
    /// specific names as reported by PDF renderers ("Times-Roman",
    /// "BCDEEE+ArialMT", ...). Returns `None` when the name suggests no
    /// particular family.
    pub fn from_family_name(name: &str) -> Option<StandardFamily> {
        let lower = name.to_lowercase();

        match lower.trim() {
            "serif" => return Some(StandardFamily::Times),
            "sans-serif" | "cursive" | "fantasy" => return Some(StandardFamily::Helvetica),
            "monospace" => return Some(StandardFamily::Courier),
            _ => {}
        }

        if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
            return Some(StandardFamily::Times);
        }

        if lower.contains("courier")
            || lower.contains("mono")
            || lower.contains("consolas")
            || lower.contains("monaco")
        {
            return Some(StandardFamily::Courier);
        }

        if lower.contains("helvetica")
            || lower.contains("arial")
            || lower.contains("verdana")
            || lower.contains("sans")
        {
            return Some(StandardFamily::Helvetica);
        }

        if lower.contains("symbol") {
            return Some(StandardFamily::Symbol);
        }
        if lower.contains("zapf") || lower.contains("dingbat") {
            return Some(StandardFamily::ZapfDingbats);
        }

        None
    }

    /// Whether text for this family is encoded with WinAnsiEncoding
    pub fn uses_win_ansi(&self) -> bool {
        !matches!(self, StandardFamily::Symbol | StandardFamily::ZapfDingbats)
    }

    /// Encode text for a `Tj` operand in this family's encoding.
    ///
    /// Returns the bytes and the characters the encoding cannot represent.
    pub fn encode(&self, text: &str) -> (Vec<u8>, Vec<char>) {
        if self.uses_win_ansi() {
            encode_win_ansi(text)
        } else {
            encode_builtin(text)
        }
    }

    /// AFM ascender in 1000-unit glyph space
    pub fn ascent(&self) -> f64 {
        match self {
            StandardFamily::Helvetica => 718.0,
            StandardFamily::Times => 683.0,
            StandardFamily::Courier => 629.0,
            StandardFamily::Symbol => 800.0,
            StandardFamily::ZapfDingbats => 820.0,
        }
    }

    /// Advance width of `ch` in 1000-unit glyph space.
    ///
    /// Exact AFM values for printable ASCII; other characters use the
    /// family's typical lowercase width.
    pub fn char_width(&self, ch: char, bold: bool) -> f64 {
        let code = ch as u32;
        let ascii = (32..=126).contains(&code);
        match self {
            StandardFamily::Courier => 600.0,
            StandardFamily::Helvetica if ascii => {
                let table = if bold { &HELVETICA_BOLD_WIDTHS } else { &HELVETICA_WIDTHS };
                table[(code - 32) as usize] as f64
            }
            StandardFamily::Times if ascii => TIMES_WIDTHS[(code - 32) as usize] as f64,
            StandardFamily::Helvetica => 556.0,
            StandardFamily::Times => 500.0,
            StandardFamily::Symbol | StandardFamily::ZapfDingbats => 600.0,
        }
    }

    /// Width of `text` in 1000-unit glyph space
    pub fn text_width(&self, text: &str, bold: bool) -> f64 {
        text.chars().map(|c| self.char_width(c, bold)).sum()
    }
}

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

/// Encode text for a WinAnsiEncoding simple font.
///
/// Returns the encoded bytes and the characters that have no WinAnsi code
/// (drawn as `?`).
pub fn encode_win_ansi(text: &str) -> (Vec<u8>, Vec<char>) {
    let mut bytes = Vec::with_capacity(text.len());
    let mut missing = Vec::new();
    for ch in text.chars() {
        match win_ansi_code(ch) {
            Some(b) => bytes.push(b),
            None => {
                missing.push(ch);
                bytes.push(b'?');
            }
        }
    }
    (bytes, missing)
}

/// Encode text for a font with a built-in encoding.
///
/// Codes 0x20-0xFF are passed through as the glyph code (so `a` selects
/// Symbol's alpha); anything else is reported and drawn as a space.
pub fn encode_builtin(text: &str) -> (Vec<u8>, Vec<char>) {
    let mut bytes = Vec::with_capacity(text.len());
    let mut missing = Vec::new();
    for ch in text.chars() {
        match ch as u32 {
            code @ 0x20..=0xFF => bytes.push(code as u8),
            _ => {
                missing.push(ch);
                bytes.push(b' ');
            }
        }
    }
    (bytes, missing)
}

fn win_ansi_code(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => match ch {
            '€' => Some(0x80),
            '‚' => Some(0x82),
            'ƒ' => Some(0x83),
            '„' => Some(0x84),
            '…' => Some(0x85),
            '†' => Some(0x86),
            '‡' => Some(0x87),
            'ˆ' => Some(0x88),
            '‰' => Some(0x89),
            'Š' => Some(0x8A),
            '‹' => Some(0x8B),
            'Œ' => Some(0x8C),
            'Ž' => Some(0x8E),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '˜' => Some(0x98),
            '™' => Some(0x99),
            'š' => Some(0x9A),
            '›' => Some(0x9B),
            'œ' => Some(0x9C),
            'ž' => Some(0x9E),
            'Ÿ' => Some(0x9F),
            _ => None,
        },
    }
}
