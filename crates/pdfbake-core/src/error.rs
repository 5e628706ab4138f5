use thiserror::Error;

/// Fatal export failures. Anything recoverable is reported as an
/// [`ExportWarning`](crate::export::ExportWarning) instead.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to load source PDF: {0}")]
    SourceLoad(String),

    #[error("Raster page height must be a positive number, got {0}")]
    InvalidRasterHeight(f64),

    #[error("Unsupported image in operation {id}: {reason}")]
    UnsupportedImage { id: String, reason: String },

    #[error("Failed to embed resources: {0}")]
    Embed(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FontError {
    #[error("Unknown font: {0}")]
    UnknownFont(String),

    #[error("Failed to load font {id}: {reason}")]
    Load { id: String, reason: String },

    #[error("Font {id} is not a usable outline font: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Failed to subset font {id}: {reason}")]
    Subset { id: String, reason: String },
}

/// Per-operation failures. The compositor catches these so that one bad
/// operation never discards the rest of the export.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Failed to encode content stream: {0}")]
    Content(String),

    #[error("PDF structure error: {0}")]
    Document(String),
}

impl From<lopdf::Error> for ComposeError {
    fn from(e: lopdf::Error) -> Self {
        ComposeError::Document(e.to_string())
    }
}
