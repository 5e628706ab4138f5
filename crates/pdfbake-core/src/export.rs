//! Export pipeline: source PDF + operation log → new PDF

use std::fmt;
use std::sync::Arc;

use lopdf::{Document, ObjectId};
use serde::Serialize;

use crate::apply_operations::{group_by_page, page_media_box, PageBuilder};
use crate::config::{ExportConfig, ImageFailurePolicy};
use crate::coords::PageTransform;
use crate::error::{ComposeError, ExportError};
use crate::fonts::{FontManager, FontPlan};
use crate::operations::{EditOperation, OperationLog};

/// Something that degraded during an export without failing it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ExportWarning {
    /// A font could not be used; text was drawn with a standard font
    FontFallback {
        font_id: String,
        fallback: String,
        reason: String,
    },
    /// Subsetting failed; the whole font program was embedded
    SubsetFallback { font_id: String, reason: String },
    /// Characters the chosen font cannot draw
    MissingGlyphs { font_id: String, chars: String },
    ImageSkipped { op_id: String, reason: String },
    OperationFailed { op_id: String, reason: String },
    PageNotFound { op_id: String, page_number: u32 },
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportWarning::FontFallback {
                font_id,
                fallback,
                reason,
            } => write!(f, "font {} replaced by {}: {}", font_id, fallback, reason),
            ExportWarning::SubsetFallback { font_id, reason } => {
                write!(f, "font {} embedded in full: {}", font_id, reason)
            }
            ExportWarning::MissingGlyphs { font_id, chars } => {
                write!(f, "font {} has no glyphs for {:?}", font_id, chars)
            }
            ExportWarning::ImageSkipped { op_id, reason } => {
                write!(f, "image {} skipped: {}", op_id, reason)
            }
            ExportWarning::OperationFailed { op_id, reason } => {
                write!(f, "operation {} failed: {}", op_id, reason)
            }
            ExportWarning::PageNotFound { op_id, page_number } => {
                write!(f, "operation {} targets missing page {}", op_id, page_number)
            }
        }
    }
}

/// Summary of what an export did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportReport {
    pub pages_touched: usize,
    pub operations_applied: usize,
    pub operations_skipped: usize,
    pub warnings: Vec<ExportWarning>,
}

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}

/// Bakes operation logs into PDFs.
///
/// Holds the session's [`FontManager`], so fonts loaded for one export are
/// reused by the next.
pub struct Exporter {
    fonts: Arc<FontManager>,
    config: ExportConfig,
}

impl Exporter {
    pub fn new(fonts: Arc<FontManager>, config: ExportConfig) -> Self {
        Self { fonts, config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn font_manager(&self) -> &Arc<FontManager> {
        &self.fonts
    }

    /// Apply `operations` to `source` and serialize the result.
    ///
    /// `raster_page_height` is the height in pixels of the preview the
    /// operations were recorded against. `source` is never modified.
    pub async fn export(
        &self,
        source: &[u8],
        operations: &[EditOperation],
        raster_page_height: f64,
    ) -> Result<ExportOutcome, ExportError> {
        if !raster_page_height.is_finite() || raster_page_height <= 0.0 {
            return Err(ExportError::InvalidRasterHeight(raster_page_height));
        }

        let mut doc = Document::load_mem(source).map_err(|e| ExportError::SourceLoad(e.to_string()))?;

        if operations.is_empty() {
            tracing::info!("No operations, returning source unchanged");
            return Ok(ExportOutcome {
                bytes: source.to_vec(),
                report: ExportReport::default(),
            });
        }

        tracing::info!(
            "Exporting {} operations onto {} bytes ({} pages)",
            operations.len(),
            source.len(),
            doc.get_pages().len()
        );

        let mut report = ExportReport::default();

        // Every font is ready before the first page is drawn
        let plan = FontPlan::collect(operations, &self.config.baseline_chars);
        let (planned, font_warnings) = plan.prepare(&self.fonts, self.config.subset_fonts).await;
        report.warnings.extend(font_warnings);
        let fonts = plan.embed(&mut doc, planned);

        // 0-indexed page list; operation page numbers are 1-indexed
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();

        for (page_number, page_ops) in group_by_page(operations) {
            let page_id = match page_number.checked_sub(1).and_then(|i| pages.get(i as usize)) {
                Some(id) => *id,
                None => {
                    tracing::warn!(
                        "Page {} not found ({} pages), skipping {} operations",
                        page_number,
                        pages.len(),
                        page_ops.len()
                    );
                    for op in &page_ops {
                        report.warnings.push(ExportWarning::PageNotFound {
                            op_id: op.id().to_string(),
                            page_number,
                        });
                    }
                    report.operations_skipped += page_ops.len();
                    continue;
                }
            };

            let transform = PageTransform::from_media_box(page_media_box(&doc, page_id), raster_page_height)?;
            tracing::debug!(
                "Page {}: {} operations, scale {:.4}",
                page_number,
                page_ops.len(),
                transform.scale()
            );

            let mut builder = PageBuilder::new(&doc, page_id, transform, &fonts, &self.config);
            for op in page_ops {
                match builder.apply(&mut doc, op) {
                    Ok(()) => report.operations_applied += 1,
                    Err(ComposeError::UnsupportedImage(reason)) => {
                        if self.config.image_failure == ImageFailurePolicy::Abort {
                            return Err(ExportError::UnsupportedImage {
                                id: op.id().to_string(),
                                reason,
                            });
                        }
                        tracing::warn!("Skipping image {}: {}", op.id(), reason);
                        report.warnings.push(ExportWarning::ImageSkipped {
                            op_id: op.id().to_string(),
                            reason,
                        });
                        report.operations_skipped += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Operation {} failed: {}", op.id(), e);
                        report.warnings.push(ExportWarning::OperationFailed {
                            op_id: op.id().to_string(),
                            reason: e.to_string(),
                        });
                        report.operations_skipped += 1;
                    }
                }
            }

            if builder
                .finish(&mut doc)
                .map_err(|e| ExportError::Embed(format!("page {}: {}", page_number, e)))?
            {
                report.pages_touched += 1;
            }
        }

        doc.compress();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| ExportError::Serialize(e.to_string()))?;

        tracing::info!(
            "Export finished: {} applied, {} skipped, {} warnings, {} bytes",
            report.operations_applied,
            report.operations_skipped,
            report.warnings.len(),
            bytes.len()
        );

        Ok(ExportOutcome { bytes, report })
    }

    /// [`Self::export`] over a recorded log, in recorded order
    pub async fn export_log(
        &self,
        source: &[u8],
        log: &OperationLog,
        raster_page_height: f64,
    ) -> Result<ExportOutcome, ExportError> {
        self.export(source, log.operations(), raster_page_height).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::TextStyle;
    use crate::test_support::sample_pdf;

    fn exporter() -> Exporter {
        Exporter::new(Arc::new(FontManager::with_standard_fonts()), ExportConfig::default())
    }

    fn mask(id: &str, page_number: u32) -> EditOperation {
        EditOperation::Mask {
            id: id.to_string(),
            page_number,
            x: 10.0,
            y: 10.0,
            width: 50.0,
            height: 20.0,
        }
    }

    #[tokio::test]
    async fn test_rejects_bad_raster_height() {
        let err = exporter().export(&sample_pdf(), &[], 0.0).await.unwrap_err();
        assert!(matches!(err, ExportError::InvalidRasterHeight(_)));
        let err = exporter().export(&sample_pdf(), &[], f64::NAN).await.unwrap_err();
        assert!(matches!(err, ExportError::InvalidRasterHeight(_)));
    }

    #[tokio::test]
    async fn test_rejects_unparseable_source() {
        let err = exporter().export(b"not a pdf", &[mask("m", 1)], 1000.0).await.unwrap_err();
        assert!(matches!(err, ExportError::SourceLoad(_)));
    }

    #[tokio::test]
    async fn test_empty_operations_return_copy() {
        let source = sample_pdf();
        let outcome = exporter().export(&source, &[], 1000.0).await.unwrap();
        assert_eq!(outcome.bytes, source);
        assert_eq!(outcome.report, ExportReport::default());
    }

    #[tokio::test]
    async fn test_missing_page_is_skipped_with_warning() {
        let source = sample_pdf();
        let ops = vec![mask("ok", 1), mask("gone", 9), mask("zero", 0)];
        let outcome = exporter().export(&source, &ops, 1000.0).await.unwrap();

        assert_eq!(outcome.report.operations_applied, 1);
        assert_eq!(outcome.report.operations_skipped, 2);
        assert_eq!(outcome.report.pages_touched, 1);
        assert!(outcome.report.warnings.contains(&ExportWarning::PageNotFound {
            op_id: "gone".to_string(),
            page_number: 9,
        }));
        assert!(outcome.report.warnings.contains(&ExportWarning::PageNotFound {
            op_id: "zero".to_string(),
            page_number: 0,
        }));
    }

    #[tokio::test]
    async fn test_image_policy_skip_and_abort() {
        let source = sample_pdf();
        let ops = vec![
            EditOperation::Image {
                id: "img".to_string(),
                page_number: 1,
                image_data: crate::operations::ImageData::new(b"garbage".to_vec()),
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                rotation_degrees: 0.0,
            },
            mask("m", 1),
        ];

        let outcome = exporter().export(&source, &ops, 1000.0).await.unwrap();
        assert_eq!(outcome.report.operations_applied, 1);
        assert!(matches!(
            outcome.report.warnings[0],
            ExportWarning::ImageSkipped { ref op_id, .. } if op_id == "img"
        ));

        let config = ExportConfig {
            image_failure: ImageFailurePolicy::Abort,
            ..ExportConfig::default()
        };
        let strict = Exporter::new(Arc::new(FontManager::with_standard_fonts()), config);
        let err = strict.export(&source, &ops, 1000.0).await.unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedImage { ref id, .. } if id == "img"));
    }

    #[tokio::test]
    async fn test_source_bytes_are_not_modified() {
        let source = sample_pdf();
        let snapshot = source.clone();
        let ops = vec![EditOperation::TextEdit {
            id: "t".to_string(),
            page_number: 2,
            text: "Second page".to_string(),
            x: 50.0,
            y: 50.0,
            width: 200.0,
            height: 20.0,
            style: TextStyle::default(),
            original_text: None,
        }];
        let outcome = exporter().export(&source, &ops, 1000.0).await.unwrap();
        assert_eq!(source, snapshot);
        assert_ne!(outcome.bytes, source);

        let doc = Document::load_mem(&outcome.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let warning = ExportWarning::PageNotFound {
            op_id: "x".to_string(),
            page_number: 4,
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "pageNotFound", "opId": "x", "pageNumber": 4})
        );
    }
}
