use base64::Engine;
use serde::Serialize;

use crate::error::ExportError;
use crate::export::{ExportOutcome, ExportWarning};

/// Serializable result of one export, for JSON consumers
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub success: bool,
    /// Base64-encoded PDF data
    pub data: Option<String>,
    pub error: Option<String>,
    pub metrics: Option<ExportMetrics>,
    pub warnings: Vec<ExportWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub operations_applied: usize,
    pub processing_time_ms: u64,
}

impl ExportResult {
    pub fn from_outcome(input_size_bytes: usize, outcome: &ExportOutcome, processing_time_ms: u64) -> Self {
        let page_count = crate::get_page_count(&outcome.bytes).unwrap_or(0);
        Self {
            success: true,
            data: Some(base64::engine::general_purpose::STANDARD.encode(&outcome.bytes)),
            error: None,
            metrics: Some(ExportMetrics {
                input_size_bytes,
                output_size_bytes: outcome.bytes.len(),
                page_count,
                operations_applied: outcome.report.operations_applied,
                processing_time_ms,
            }),
            warnings: outcome.report.warnings.clone(),
        }
    }

    pub fn failure(error: &ExportError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            metrics: None,
            warnings: Vec::new(),
        }
    }

    /// Drop the encoded document, keeping status and metrics
    pub fn without_data(mut self) -> Self {
        self.data = None;
        self
    }
}
