//! Operation log for tracking PDF edit operations
//!
//! Operations are recorded by the editing surface in raster preview space
//! (pixels, top-left origin). Each record is an immutable snapshot: edits
//! replace the record with the same id, they never mutate it in place.

use crate::path::PathCommand;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type OpId = String;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// CSS-style font weight: a keyword or a number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FontWeight {
    Numeric(f64),
    Keyword(String),
}

impl Default for FontWeight {
    fn default() -> Self {
        FontWeight::Keyword("normal".to_string())
    }
}

impl FontWeight {
    pub fn is_bold(&self) -> bool {
        match self {
            FontWeight::Numeric(w) => *w >= 600.0,
            FontWeight::Keyword(k) => {
                let k = k.trim().to_lowercase();
                match k.as_str() {
                    "bold" | "bolder" => true,
                    _ => k.parse::<f64>().map(|w| w >= 600.0).unwrap_or(false),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_id: String,
    pub font_size: f64,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default = "default_font_style")]
    pub font_style: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub align: TextAlign,
}

fn default_font_style() -> String {
    "normal".to_string()
}

fn default_color() -> String {
    "#000000".to_string()
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_id: "helvetica".to_string(),
            font_size: 12.0,
            font_weight: FontWeight::default(),
            font_style: default_font_style(),
            color: default_color(),
            align: TextAlign::Left,
        }
    }
}

impl TextStyle {
    pub fn is_bold(&self) -> bool {
        self.font_weight.is_bold()
    }

    pub fn is_italic(&self) -> bool {
        let lower = self.font_style.to_lowercase();
        lower.contains("italic") || lower.contains("oblique")
    }
}

/// Raster image bytes carried by an `Image` operation.
///
/// On the wire this is either a `data:` URL or plain base64.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    /// MIME type from the data URL prefix, when one was given
    pub mime: Option<String>,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, mime: None }
    }

    pub fn from_data_url(input: &str) -> Result<Self, String> {
        let engine = base64::engine::general_purpose::STANDARD;
        match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| "data URL has no payload".to_string())?;
                let mime = header.split(';').next().filter(|m| !m.is_empty()).map(str::to_string);
                if !header.contains("base64") {
                    return Ok(Self {
                        bytes: payload.as_bytes().to_vec(),
                        mime,
                    });
                }
                let bytes = engine
                    .decode(payload.trim())
                    .map_err(|e| format!("invalid base64 image data: {}", e))?;
                Ok(Self { bytes, mime })
            }
            None => {
                let bytes = engine
                    .decode(input.trim())
                    .map_err(|e| format!("invalid base64 image data: {}", e))?;
                Ok(Self { bytes, mime: None })
            }
        }
    }

    pub fn to_data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        match &self.mime {
            Some(mime) => format!("data:{};base64,{}", mime, encoded),
            None => encoded,
        }
    }
}

impl Serialize for ImageData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for ImageData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ImageData::from_data_url(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EditOperation {
    /// Opaque rectangle covering original page content
    Mask {
        id: OpId,
        page_number: u32,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    TextEdit {
        id: OpId,
        page_number: u32,
        text: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        style: TextStyle,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original_text: Option<String>,
    },
    Image {
        id: OpId,
        page_number: u32,
        image_data: ImageData,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        #[serde(default)]
        rotation_degrees: f64,
    },
    DrawPath {
        id: OpId,
        page_number: u32,
        path: Vec<PathCommand>,
        #[serde(default = "default_color")]
        color: String,
        stroke_width: f64,
    },
}

impl EditOperation {
    pub fn id(&self) -> &str {
        match self {
            EditOperation::Mask { id, .. } => id,
            EditOperation::TextEdit { id, .. } => id,
            EditOperation::Image { id, .. } => id,
            EditOperation::DrawPath { id, .. } => id,
        }
    }

    pub fn page_number(&self) -> u32 {
        match self {
            EditOperation::Mask { page_number, .. } => *page_number,
            EditOperation::TextEdit { page_number, .. } => *page_number,
            EditOperation::Image { page_number, .. } => *page_number,
            EditOperation::DrawPath { page_number, .. } => *page_number,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EditOperation::Mask { .. } => "mask",
            EditOperation::TextEdit { .. } => "textEdit",
            EditOperation::Image { .. } => "image",
            EditOperation::DrawPath { .. } => "drawPath",
        }
    }
}

/// Ordered set of operations keyed by id.
///
/// Recorded order matters: the editor records a mask before the text that
/// sits on top of it, and the compositor replays in this order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationLog {
    operations: Vec<EditOperation>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the operation with the same id in place, or append it.
    ///
    /// Returns true when an existing operation was replaced.
    pub fn upsert(&mut self, op: EditOperation) -> bool {
        if let Some(existing) = self.operations.iter_mut().find(|o| o.id() == op.id()) {
            *existing = op;
            true
        } else {
            self.operations.push(op);
            false
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        if let Some(pos) = self.operations.iter().position(|op| op.id() == id) {
            self.operations.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: &str) -> Option<&EditOperation> {
        self.operations.iter().find(|op| op.id() == id)
    }

    pub fn operations(&self) -> &[EditOperation] {
        &self.operations
    }

    pub fn operations_for_page(&self, page: u32) -> Vec<&EditOperation> {
        self.operations
            .iter()
            .filter(|op| op.page_number() == page)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl FromIterator<EditOperation> for OperationLog {
    fn from_iter<I: IntoIterator<Item = EditOperation>>(iter: I) -> Self {
        let mut log = OperationLog::new();
        for op in iter {
            log.upsert(op);
        }
        log
    }
}
