//! Apply operations to PDF pages
//!
//! Each page gets one overlay content stream. Operations are compiled one at
//! a time and committed only when they compile, so a bad operation is
//! dropped on its own. The page's original content is wrapped in `q … Q`
//! so none of its graphics state reaches the overlay.

use std::collections::{BTreeMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::config::ExportConfig;
use crate::coords::PageTransform;
use crate::error::ComposeError;
use crate::fonts::{EmbeddedFont, EmbeddedFonts};
use crate::image::{embed_image, prepare_image};
use crate::operations::{EditOperation, ImageData, TextAlign, TextStyle};
use crate::path::{path_operations, scale_stroke_width, translate_path, PathCommand};

/// Parent chain depth limit when looking up inherited page attributes
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Group operations by page number, keeping recorded order within a page
pub fn group_by_page(ops: &[EditOperation]) -> BTreeMap<u32, Vec<&EditOperation>> {
    let mut pages: BTreeMap<u32, Vec<&EditOperation>> = BTreeMap::new();
    for op in ops {
        pages.entry(op.page_number()).or_default().push(op);
    }
    pages
}

/// Parse hex color string (e.g., "#FF0000", "FF0000" or "#f00") to RGB floats (0-1 range)
pub fn parse_hex_color(color: &str) -> (f32, f32, f32) {
    let hex = color.trim().trim_start_matches('#');
    let channel = |s: &str| u8::from_str_radix(s, 16).unwrap_or(0) as f32 / 255.0;
    match hex.len() {
        3 if hex.is_ascii() => {
            let expand = |i: usize| channel(hex[i..i + 1].repeat(2).as_str());
            (expand(0), expand(1), expand(2))
        }
        n if n >= 6 && hex.is_ascii() => (channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6])),
        _ => (0.0, 0.0, 0.0), // Default to black
    }
}

/// Look up a page attribute, following `Parent` links for inherited values
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value).ok();
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object, ComposeError> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(v) => Some(*v as f64),
        Object::Real(v) => Some(*v as f64),
        _ => None,
    }
}

/// The page's MediaBox, inherited if necessary; US Letter when absent
pub fn page_media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let values: Option<Vec<f64>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .map(|arr| arr.iter().filter_map(number).collect());
    match values.as_deref() {
        Some([llx, lly, urx, ury]) => [*llx, *lly, *urx, *ury],
        _ => [0.0, 0.0, 612.0, 792.0],
    }
}

/// Effective resource dictionary of a page with its `Font` and `XObject`
/// subdictionaries resolved to direct dictionaries
fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    for key in [b"Font".as_slice(), b"XObject".as_slice()] {
        let resolved = resources
            .get(key)
            .ok()
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_dict().ok())
            .cloned();
        if let Some(dict) = resolved {
            resources.set(key.to_vec(), Object::Dictionary(dict));
        }
    }
    resources
}

fn rgb((r, g, b): (f32, f32, f32)) -> Vec<Object> {
    vec![Object::Real(r), Object::Real(g), Object::Real(b)]
}

fn reals(values: &[f64]) -> Vec<Object> {
    values.iter().map(|v| Object::Real(*v as f32)).collect()
}

fn check_finite(values: &[f64]) -> Result<(), ComposeError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ComposeError::InvalidGeometry(format!("non-finite value in {:?}", values)))
    }
}

/// Accumulates the overlay for one page
pub struct PageBuilder<'a> {
    page_id: ObjectId,
    transform: PageTransform,
    fonts: &'a EmbeddedFonts,
    config: &'a ExportConfig,
    resources: Dictionary,
    used_names: HashSet<Vec<u8>>,
    font_names: BTreeMap<ObjectId, String>,
    new_fonts: BTreeMap<String, ObjectId>,
    new_xobjects: BTreeMap<String, ObjectId>,
    operations: Vec<Operation>,
    applied: usize,
}

impl<'a> PageBuilder<'a> {
    pub fn new(
        doc: &Document,
        page_id: ObjectId,
        transform: PageTransform,
        fonts: &'a EmbeddedFonts,
        config: &'a ExportConfig,
    ) -> Self {
        let resources = effective_resources(doc, page_id);
        let mut used_names = HashSet::new();
        for key in [b"Font".as_slice(), b"XObject".as_slice()] {
            if let Ok(Object::Dictionary(dict)) = resources.get(key) {
                used_names.extend(dict.iter().map(|(name, _)| name.clone()));
            }
        }

        Self {
            page_id,
            transform,
            fonts,
            config,
            resources,
            used_names,
            font_names: BTreeMap::new(),
            new_fonts: BTreeMap::new(),
            new_xobjects: BTreeMap::new(),
            operations: Vec::new(),
            applied: 0,
        }
    }

    pub fn transform(&self) -> &PageTransform {
        &self.transform
    }

    /// Operations committed so far, without the page-level `q`/`Q`
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Compile one operation and commit it if it compiles
    pub fn apply(&mut self, doc: &mut Document, op: &EditOperation) -> Result<(), ComposeError> {
        let ops = match op {
            EditOperation::Mask { x, y, width, height, .. } => self.compile_mask(*x, *y, *width, *height)?,
            EditOperation::TextEdit {
                text,
                x,
                y,
                width,
                style,
                ..
            } => self.compile_text(text, *x, *y, *width, style)?,
            EditOperation::Image {
                image_data,
                x,
                y,
                width,
                height,
                rotation_degrees,
                ..
            } => self.compile_image(doc, image_data, *x, *y, *width, *height, *rotation_degrees)?,
            EditOperation::DrawPath {
                path,
                color,
                stroke_width,
                ..
            } => self.compile_path(path, color, *stroke_width)?,
        };

        tracing::debug!("Compiled {} {} ({} content ops)", op.kind(), op.id(), ops.len());
        self.operations.extend(ops);
        self.applied += 1;
        Ok(())
    }

    fn compile_mask(&self, x: f64, y: f64, width: f64, height: f64) -> Result<Vec<Operation>, ComposeError> {
        check_finite(&[x, y, width, height])?;
        let rect = self.transform.rect(x, y, width, height);
        let (r, g, b) = parse_hex_color(&self.config.mask_color);

        Ok(vec![
            Operation::new("q", vec![]),
            Operation::new("rg", rgb((r, g, b))),
            Operation::new("re", reals(&[rect.x, rect.y, rect.width, rect.height])),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ])
    }

    fn compile_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        width: f64,
        style: &TextStyle,
    ) -> Result<Vec<Operation>, ComposeError> {
        check_finite(&[x, y, width, style.font_size])?;
        if style.font_size <= 0.0 {
            return Err(ComposeError::InvalidGeometry(format!(
                "font size must be positive, got {}",
                style.font_size
            )));
        }
        let fonts = self.fonts;
        let font = fonts.lookup(style).ok_or_else(|| {
            ComposeError::Document(format!("font '{}' was not prepared for this export", style.font_id))
        })?;
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let size = self.transform.length(style.font_size);
        let ratio = self.config.baseline.ratio(font.ascent());
        let (origin_x, origin_y) = self.transform.text_origin(x, y, size, ratio);
        let box_width = self.transform.length(width);
        let leading = size * self.config.line_height;
        let (r, g, b) = parse_hex_color(&style.color);
        let font_name = self.font_name(font);

        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new("rg", rgb((r, g, b))),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font_name.into_bytes()), Object::Real(size as f32)]),
        ];

        for (i, line) in text.split('\n').enumerate() {
            let line = line.trim_end_matches('\r');
            let line_width = font.text_width(line, size);
            let dx = match style.align {
                TextAlign::Left => 0.0,
                TextAlign::Center => (box_width - line_width) / 2.0,
                TextAlign::Right => box_width - line_width,
            };
            let line_y = origin_y - i as f64 * leading;
            ops.push(Operation::new(
                "Tm",
                reals(&[1.0, 0.0, 0.0, 1.0, origin_x + dx, line_y]),
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(font.encode(line), StringFormat::Hexadecimal)],
            ));
        }

        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));
        Ok(ops)
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_image(
        &mut self,
        doc: &mut Document,
        image_data: &ImageData,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        rotation_degrees: f64,
    ) -> Result<Vec<Operation>, ComposeError> {
        check_finite(&[x, y, width, height, rotation_degrees])?;
        if width <= 0.0 || height <= 0.0 {
            return Err(ComposeError::InvalidGeometry(format!(
                "image size must be positive, got {}x{}",
                width, height
            )));
        }
        let prepared = prepare_image(image_data)?;
        let image_id = embed_image(doc, &prepared);
        let name = self.fresh_name("EdIm");
        self.new_xobjects.insert(name.clone(), image_id);

        let w = self.transform.length(width);
        let h = self.transform.length(height);
        // Clockwise in raster space is a negative angle in PDF space
        let theta = (-rotation_degrees).to_radians();
        let (sin, cos) = theta.sin_cos();

        Ok(vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                reals(&[cos, sin, -sin, cos, self.transform.x(x), self.transform.y_top(y)]),
            ),
            Operation::new("cm", reals(&[w, 0.0, 0.0, h, 0.0, -h])),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ])
    }

    fn compile_path(&self, path: &[PathCommand], color: &str, stroke_width: f64) -> Result<Vec<Operation>, ComposeError> {
        check_finite(&[stroke_width])?;
        if stroke_width < 0.0 {
            return Err(ComposeError::InvalidGeometry(format!(
                "stroke width must not be negative, got {}",
                stroke_width
            )));
        }
        let commands = translate_path(path, self.transform.scale());
        for command in &commands {
            check_finite(&command.operands())?;
        }
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let (r, g, b) = parse_hex_color(color);

        let mut ops = vec![
            Operation::new("q", vec![]),
            // Origin at the page's top edge with y pointing down, matching raster space
            Operation::new(
                "cm",
                reals(&[1.0, 0.0, 0.0, -1.0, self.transform.x(0.0), self.transform.y_top(0.0)]),
            ),
            Operation::new("RG", rgb((r, g, b))),
            Operation::new(
                "w",
                vec![Object::Real(scale_stroke_width(stroke_width, self.transform.scale()) as f32)],
            ),
            Operation::new("J", vec![Object::Integer(1)]),
            Operation::new("j", vec![Object::Integer(1)]),
        ];
        ops.extend(path_operations(&commands));
        ops.push(Operation::new("S", vec![]));
        ops.push(Operation::new("Q", vec![]));
        Ok(ops)
    }

    fn font_name(&mut self, font: &EmbeddedFont) -> String {
        if let Some(name) = self.font_names.get(&font.object_id) {
            return name.clone();
        }
        let name = self.fresh_name("EdF");
        self.font_names.insert(font.object_id, name.clone());
        self.new_fonts.insert(name.clone(), font.object_id);
        name
    }

    /// First `{prefix}{n}` not already used by the page
    fn fresh_name(&mut self, prefix: &str) -> String {
        let mut n = 1;
        loop {
            let candidate = format!("{}{}", prefix, n);
            if self.used_names.insert(candidate.as_bytes().to_vec()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Write the overlay and merged resources into the page.
    ///
    /// Returns `false` (leaving the page untouched) when nothing was committed.
    pub fn finish(self, doc: &mut Document) -> Result<bool, ComposeError> {
        if self.operations.is_empty() {
            return Ok(false);
        }

        let mut resources = self.resources;
        merge_entries(&mut resources, b"Font", &self.new_fonts);
        merge_entries(&mut resources, b"XObject", &self.new_xobjects);

        let mut overlay_ops = Vec::with_capacity(self.operations.len() + 2);
        overlay_ops.push(Operation::new("q", vec![]));
        overlay_ops.extend(self.operations);
        overlay_ops.push(Operation::new("Q", vec![]));
        let overlay = Content { operations: overlay_ops }
            .encode()
            .map_err(|e| ComposeError::Content(e.to_string()))?;

        let original = original_contents(doc, self.page_id)?;

        let contents = if original.is_empty() {
            let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));
            vec![Object::Reference(overlay_id)]
        } else {
            let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            // The original stream may end mid-token; separate the closing Q from it
            let mut bytes = b"\nQ\n".to_vec();
            bytes.extend(overlay);
            let overlay_id = doc.add_object(Stream::new(Dictionary::new(), bytes));

            let mut contents = Vec::with_capacity(original.len() + 2);
            contents.push(Object::Reference(open_id));
            contents.extend(original);
            contents.push(Object::Reference(overlay_id));
            contents
        };

        let page = doc.get_object_mut(self.page_id)?.as_dict_mut()?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Array(contents));
        Ok(true)
    }
}

/// The page's content stream references, flattened.
///
/// `/Contents` may be a stream reference, an array, or a reference to an array.
fn original_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, ComposeError> {
    let contents = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(contents) => contents,
        Err(_) => return Ok(Vec::new()),
    };
    let items = match contents {
        Object::Array(items) => items.clone(),
        Object::Reference(id) => match doc.get_object(*id)? {
            Object::Array(items) => items.clone(),
            _ => vec![contents.clone()],
        },
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter(|item| matches!(item, Object::Reference(_)))
        .collect())
}

fn merge_entries(resources: &mut Dictionary, key: &[u8], entries: &BTreeMap<String, ObjectId>) {
    if entries.is_empty() {
        return;
    }
    let mut dict = match resources.get(key) {
        Ok(Object::Dictionary(existing)) => existing.clone(),
        _ => Dictionary::new(),
    };
    for (name, id) in entries {
        dict.set(name.as_bytes().to_vec(), Object::Reference(*id));
    }
    resources.set(key.to_vec(), Object::Dictionary(dict));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::embed::{embed_standard, FontKey};
    use crate::fonts::StandardFamily;
    use crate::test_support::sample_pdf;
    use pretty_assertions::assert_eq;

    fn load() -> (Document, ObjectId) {
        let doc = Document::load_mem(&sample_pdf()).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        (doc, page_id)
    }

    fn helvetica(doc: &mut Document) -> EmbeddedFonts {
        let mut fonts = EmbeddedFonts::new();
        fonts.insert(
            FontKey::plain("helvetica"),
            embed_standard(doc, StandardFamily::Helvetica, false, false),
        );
        fonts
    }

    fn mask(id: &str) -> EditOperation {
        EditOperation::Mask {
            id: id.to_string(),
            page_number: 1,
            x: 100.0,
            y: 200.0,
            width: 300.0,
            height: 40.0,
        }
    }

    fn text(id: &str, content: &str) -> EditOperation {
        EditOperation::TextEdit {
            id: id.to_string(),
            page_number: 1,
            text: content.to_string(),
            x: 100.0,
            y: 200.0,
            width: 300.0,
            height: 40.0,
            style: TextStyle {
                font_size: 16.0,
                ..TextStyle::default()
            },
            original_text: Some("old".to_string()),
        }
    }

    fn operators(ops: &[Operation]) -> Vec<&str> {
        ops.iter().map(|o| o.operator.as_str()).collect()
    }

    fn real(object: &Object) -> f32 {
        match object {
            Object::Real(v) => *v,
            Object::Integer(v) => *v as f32,
            _ => f32::NAN,
        }
    }

    #[test]
    fn test_group_by_page_keeps_recorded_order() {
        let mut second = mask("m2");
        if let EditOperation::Mask { page_number, .. } = &mut second {
            *page_number = 2;
        }
        let ops = vec![text("t1", "a"), second, mask("m1"), text("t2", "b")];
        let groups = group_by_page(&ops);
        let page1: Vec<_> = groups[&1].iter().map(|op| op.id()).collect();
        assert_eq!(page1, vec!["t1", "m1", "t2"]);
        assert_eq!(groups[&2].len(), 1);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF0000"), (1.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("00ff00"), (0.0, 1.0, 0.0));
        assert_eq!(parse_hex_color("#fff"), (1.0, 1.0, 1.0));
        assert_eq!(parse_hex_color("nope"), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_media_box_is_inherited() {
        let (doc, page_id) = load();
        assert_eq!(page_media_box(&doc, page_id), [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn test_mask_then_text_in_recorded_order() {
        let (mut doc, page_id) = load();
        let fonts = helvetica(&mut doc);
        let config = ExportConfig::default();
        let transform = PageTransform::new(792.0, 1000.0).unwrap();
        let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);

        builder.apply(&mut doc, &mask("m")).unwrap();
        builder.apply(&mut doc, &text("t", "Hello")).unwrap();

        let ops = operators(builder.operations());
        let fill = ops.iter().position(|o| *o == "f").unwrap();
        let text_start = ops.iter().position(|o| *o == "BT").unwrap();
        assert!(fill < text_start);
        assert_eq!(builder.applied(), 2);
    }

    #[test]
    fn test_text_position_and_size() {
        let (mut doc, page_id) = load();
        let fonts = helvetica(&mut doc);
        let config = ExportConfig::default();
        let transform = PageTransform::new(792.0, 1000.0).unwrap();
        let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);
        builder.apply(&mut doc, &text("t", "Hello")).unwrap();

        let ops = builder.operations();
        let tf = ops.iter().find(|o| o.operator == "Tf").unwrap();
        assert!((real(&tf.operands[1]) - 12.672).abs() < 1e-3);
        let tm = ops.iter().find(|o| o.operator == "Tm").unwrap();
        assert!((real(&tm.operands[4]) - 79.2).abs() < 1e-3);
        assert!((real(&tm.operands[5]) - 622.8288).abs() < 1e-2);
    }

    #[test]
    fn test_right_alignment_uses_measured_width() {
        let (mut doc, page_id) = load();
        let fonts = helvetica(&mut doc);
        let config = ExportConfig::default();
        let transform = PageTransform::new(1000.0, 1000.0).unwrap();
        let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);

        let mut op = text("t", "ii");
        if let EditOperation::TextEdit { style, .. } = &mut op {
            style.align = TextAlign::Right;
            style.font_size = 10.0;
        }
        builder.apply(&mut doc, &op).unwrap();

        // Two Helvetica 'i' glyphs are 222 units each
        let tm = builder.operations().iter().find(|o| o.operator == "Tm").unwrap();
        let expected = 100.0 + 300.0 - 4.44;
        assert!((real(&tm.operands[4]) - expected as f32).abs() < 1e-3);
    }

    #[test]
    fn test_multiline_text_steps_down_by_line_height() {
        let (mut doc, page_id) = load();
        let fonts = helvetica(&mut doc);
        let config = ExportConfig::default();
        let transform = PageTransform::new(1000.0, 1000.0).unwrap();
        let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);
        builder.apply(&mut doc, &text("t", "one\ntwo")).unwrap();

        let lines: Vec<f32> = builder
            .operations()
            .iter()
            .filter(|o| o.operator == "Tm")
            .map(|o| real(&o.operands[5]))
            .collect();
        assert_eq!(lines.len(), 2);
        assert!((lines[0] - lines[1] - 16.0 * 1.2).abs() < 1e-3);
    }

    #[test]
    fn test_failed_operation_is_isolated() {
        let (mut doc, page_id) = load();
        let fonts = helvetica(&mut doc);
        let config = ExportConfig::default();
        let transform = PageTransform::new(792.0, 1000.0).unwrap();
        let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);

        builder.apply(&mut doc, &mask("m")).unwrap();
        let bad_image = EditOperation::Image {
            id: "img".to_string(),
            page_number: 1,
            image_data: ImageData::new(b"not an image".to_vec()),
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            rotation_degrees: 0.0,
        };
        let err = builder.apply(&mut doc, &bad_image).unwrap_err();
        assert!(matches!(err, ComposeError::UnsupportedImage(_)));

        let mut bad_font = text("t", "x");
        if let EditOperation::TextEdit { style, .. } = &mut bad_font {
            style.font_id = "never-prepared".to_string();
        }
        assert!(builder.apply(&mut doc, &bad_font).is_err());

        assert_eq!(operators(builder.operations()), vec!["q", "rg", "re", "f", "Q"]);
        assert_eq!(builder.applied(), 1);
    }

    #[test]
    fn test_path_is_stroked_with_round_caps() {
        let (mut doc, page_id) = load();
        let fonts = EmbeddedFonts::new();
        let config = ExportConfig::default();
        let transform = PageTransform::new(500.0, 1000.0).unwrap();
        let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);

        let op: EditOperation = serde_json::from_str(
            r##"{"type":"drawPath","id":"p","pageNumber":1,"path":[["M",10,10],["L",20,20]],"color":"#0000ff","strokeWidth":4}"##,
        )
        .unwrap();
        builder.apply(&mut doc, &op).unwrap();

        let ops = builder.operations();
        assert_eq!(
            operators(ops),
            vec!["q", "cm", "RG", "w", "J", "j", "m", "l", "S", "Q"]
        );
        assert_eq!(real(&ops[3].operands[0]), 2.0);
        assert_eq!(real(&ops[6].operands[0]), 5.0);
        assert_eq!(real(&ops[7].operands[1]), 10.0);
        // Flip about the page's top edge
        assert_eq!(real(&ops[1].operands[3]), -1.0);
        assert_eq!(real(&ops[1].operands[5]), 500.0);
    }

    #[test]
    fn test_finish_wraps_original_content() {
        let (mut doc, page_id) = load();
        let fonts = helvetica(&mut doc);
        let config = ExportConfig::default();
        let transform = PageTransform::new(792.0, 1000.0).unwrap();
        let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);
        builder.apply(&mut doc, &text("t", "New")).unwrap();
        assert!(builder.finish(&mut doc).unwrap());

        let page = doc.get_dictionary(page_id).unwrap();
        let contents = page.get(b"Contents").unwrap().as_array().unwrap();
        assert_eq!(contents.len(), 3);

        let first = doc.get_object(contents[0].as_reference().unwrap()).unwrap().as_stream().unwrap();
        assert_eq!(first.content, b"q\n".to_vec());
        let last = doc.get_object(contents[2].as_reference().unwrap()).unwrap().as_stream().unwrap();
        assert!(last.content.starts_with(b"\nQ\n"));

        // Original resources survive, the new font is added beside them
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.get(b"F1").is_ok());
        assert!(fonts.get(b"EdF1").is_ok());
    }

    #[test]
    fn test_overlay_is_separated_from_unterminated_original() {
        let (mut doc, page_id) = load();
        let original_id = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_reference()
            .unwrap();
        // Ends on `f` with no trailing whitespace
        doc.objects.insert(
            original_id,
            Object::Stream(Stream::new(Dictionary::new(), b"0.5 g\n50 50 100 100 re\nf".to_vec())),
        );

        let fonts = EmbeddedFonts::new();
        let config = ExportConfig::default();
        let transform = PageTransform::new(792.0, 1000.0).unwrap();
        let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);
        builder.apply(&mut doc, &mask("m")).unwrap();
        assert!(builder.finish(&mut doc).unwrap());

        let content = doc.get_page_content(page_id).unwrap();
        let ops = Content::decode(&content).unwrap().operations;
        assert_eq!(
            operators(&ops),
            vec!["q", "g", "re", "f", "Q", "q", "q", "rg", "re", "f", "Q", "Q"]
        );
    }

    #[test]
    fn test_contents_reference_to_array_is_flattened() {
        let (mut doc, page_id) = load();
        let original = doc.get_dictionary(page_id).unwrap().get(b"Contents").unwrap().clone();
        let array_id = doc.add_object(Object::Array(vec![original.clone()]));
        doc.get_object_mut(page_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Contents", Object::Reference(array_id));

        let fonts = EmbeddedFonts::new();
        let config = ExportConfig::default();
        let transform = PageTransform::new(792.0, 1000.0).unwrap();
        let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);
        builder.apply(&mut doc, &mask("m")).unwrap();
        assert!(builder.finish(&mut doc).unwrap());

        let contents = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1], original);
        for entry in &contents {
            let id = entry.as_reference().unwrap();
            assert!(doc.get_object(id).unwrap().as_stream().is_ok());
        }

        let content = doc.get_page_content(page_id).unwrap();
        let ops = Content::decode(&content).unwrap().operations;
        assert!(operators(&ops).contains(&"Tj"));
    }

    #[test]
    fn test_resource_names_avoid_existing_entries() {
        let (mut doc, page_id) = load();
        let fonts = helvetica(&mut doc);
        let config = ExportConfig::default();
        let transform = PageTransform::new(792.0, 1000.0).unwrap();

        // First pass claims EdF1 on the page
        let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);
        builder.apply(&mut doc, &text("t", "A")).unwrap();
        builder.finish(&mut doc).unwrap();

        let other_fonts = helvetica(&mut doc);
        let mut builder = PageBuilder::new(&doc, page_id, transform, &other_fonts, &config);
        builder.apply(&mut doc, &text("t", "B")).unwrap();
        let tf = builder.operations().iter().find(|o| o.operator == "Tf").unwrap();
        assert_eq!(tf.operands[0].as_name().unwrap(), b"EdF2");
    }

    #[test]
    fn test_nothing_committed_leaves_page_untouched() {
        let (mut doc, page_id) = load();
        let fonts = EmbeddedFonts::new();
        let config = ExportConfig::default();
        let transform = PageTransform::new(792.0, 1000.0).unwrap();
        let contents = |doc: &Document| {
            doc.get_dictionary(page_id)
                .unwrap()
                .get(b"Contents")
                .unwrap()
                .as_reference()
                .unwrap()
        };
        let before = contents(&doc);

        let builder = PageBuilder::new(&doc, page_id, transform, &fonts, &config);
        assert!(!builder.finish(&mut doc).unwrap());
        assert_eq!(contents(&doc), before);
    }
}
