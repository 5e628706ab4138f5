//! Edit-operation PDF compositor
//!
//! Takes the operations an editing surface recorded over raster page
//! previews (masks, text edits, images, freehand strokes) and bakes them
//! into a new PDF with lopdf. The source document is never mutated.
//!
//! The entry point is [`Exporter::export`]. Fonts are resolved through a
//! [`FontManager`] over any [`FontCatalog`](fonts::FontCatalog), subset to the
//! characters actually used and embedded once per document.

pub mod apply_operations;
pub mod command;
pub mod config;
pub mod coords;
pub mod error;
pub mod export;
pub mod fonts;
pub mod image;
pub mod operations;
pub mod path;

pub use command::{ExportMetrics, ExportResult};
pub use config::{BaselineStrategy, ExportConfig, ImageFailurePolicy};
pub use coords::{pdf_to_raster, raster_to_pdf, PageTransform, PdfRect};
pub use error::{ComposeError, ExportError, FontError};
pub use export::{ExportOutcome, ExportReport, ExportWarning, Exporter};
pub use fonts::{FontConfig, FontData, FontManager, FontRegistry, StandardFamily};
pub use operations::{EditOperation, OperationLog, TextStyle};
pub use path::PathCommand;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, ExportError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExportError::SourceLoad(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};

    /// A bundled TrueType font with `glyf` outlines
    pub fn outline_font() -> Vec<u8> {
        typst_assets::fonts()
            .find(|data| {
                ttf_parser::Face::parse(data, 0)
                    .map(|face| face.tables().glyf.is_some() && face.glyph_index('A').is_some())
                    .unwrap_or(false)
            })
            .expect("typst-assets ships a glyf font")
            .to_vec()
    }

    /// [`outline_font`] with the `loca` entry for `ch` turned into an
    /// inverted range, so the glyph's outline cannot be read while the
    /// cmap and metrics stay intact.
    pub fn font_with_broken_glyph(ch: char) -> Vec<u8> {
        let mut data = outline_font();
        let gid = ttf_parser::Face::parse(&data, 0)
            .ok()
            .and_then(|face| face.glyph_index(ch))
            .expect("glyph present")
            .0 as usize;

        let table = |data: &[u8], tag: &[u8; 4]| -> usize {
            let count = u16::from_be_bytes([data[4], data[5]]) as usize;
            (0..count)
                .map(|i| 12 + 16 * i)
                .find(|&rec| &data[rec..rec + 4] == tag)
                .map(|rec| u32::from_be_bytes([data[rec + 8], data[rec + 9], data[rec + 10], data[rec + 11]]) as usize)
                .expect("table present")
        };
        let head = table(&data, b"head");
        let loca = table(&data, b"loca");

        if i16::from_be_bytes([data[head + 50], data[head + 51]]) == 0 {
            data[loca + 2 * gid..loca + 2 * gid + 2].copy_from_slice(&u16::MAX.to_be_bytes());
            data[loca + 2 * gid + 2..loca + 2 * gid + 4].copy_from_slice(&0u16.to_be_bytes());
        } else {
            data[loca + 4 * gid..loca + 4 * gid + 4].copy_from_slice(&u32::MAX.to_be_bytes());
            data[loca + 4 * gid + 4..loca + 4 * gid + 8].copy_from_slice(&0u32.to_be_bytes());
        }
        data
    }

    /// Two US Letter pages. MediaBox and resources (Helvetica as /F1) are
    /// inherited from the page tree; each page has one content stream.
    pub fn sample_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids = Vec::new();
        for n in 1..=2 {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Original page {}", n))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! {
                        "F1" => Object::Reference(font_id),
                    },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}
