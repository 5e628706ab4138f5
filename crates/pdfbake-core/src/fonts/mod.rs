//! Font catalog, loading and embedding
//!
//! A [`FontRegistry`] describes which fonts exist. The [`FontManager`] sits
//! on top of any [`FontCatalog`] and owns the per-session binary cache. The
//! export pre-pass ([`FontPlan`]) gathers code points, subsets and embeds
//! every font once before any page is drawn.

pub mod embed;
pub mod manager;
pub mod plan;
pub mod standard;
pub mod subset;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::FontError;

pub use embed::{EmbeddedFont, EmbeddedFonts};
pub use manager::{FontManager, ResolvedFont};
pub use plan::{FontPlan, PlannedFont};
pub use standard::StandardFamily;
pub use subset::{FontProgram, PreparedFont};

/// Callable that produces a font binary on demand
pub type FontLoader = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<u8>, FontError>> + Send + Sync>;

/// Where a font's data comes from
#[derive(Clone)]
pub enum FontData {
    /// Provided by every PDF renderer, never embedded
    Standard(StandardFamily),
    Bytes(Arc<Vec<u8>>),
    Lazy(FontLoader),
}

impl fmt::Debug for FontData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontData::Standard(family) => f.debug_tuple("Standard").field(family).finish(),
            FontData::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            FontData::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// A font known to the catalog
#[derive(Debug, Clone)]
pub struct FontConfig {
    pub id: String,
    pub name: String,
    /// CSS or display family used by the editing surface
    pub family: String,
    pub data: FontData,
}

impl FontConfig {
    pub fn standard(family: StandardFamily) -> Self {
        Self {
            id: family.id().to_string(),
            name: family.display_name().to_string(),
            family: family.css_family().to_string(),
            data: FontData::Standard(family),
        }
    }

    pub fn is_standard(&self) -> bool {
        matches!(self.data, FontData::Standard(_))
    }

    pub fn standard_font_ref(&self) -> Option<StandardFamily> {
        match self.data {
            FontData::Standard(family) => Some(family),
            _ => None,
        }
    }
}

/// Resolved payload for a font id
#[derive(Debug, Clone)]
pub enum FontSource {
    Standard(StandardFamily),
    Binary(Arc<Vec<u8>>),
}

/// The font subsystem as seen by the compositor
#[async_trait]
pub trait FontCatalog: Send + Sync {
    fn list_fonts(&self) -> Vec<FontConfig>;

    async fn resolve_font(&self, id: &str) -> Result<FontSource, FontError>;
}

/// In-process font catalog.
///
/// Standard fonts are registered up front; custom fonts are added during the
/// session, either with their bytes or with a lazy loader.
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    fonts: Vec<FontConfig>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the standard-14 families, Helvetica first
    pub fn with_standard_fonts() -> Self {
        let mut registry = Self::new();
        for family in StandardFamily::ALL {
            registry.register(FontConfig::standard(family));
        }
        registry
    }

    /// Add a font, replacing any existing entry with the same id
    pub fn register(&mut self, config: FontConfig) {
        if let Some(existing) = self.fonts.iter_mut().find(|f| f.id == config.id) {
            *existing = config;
        } else {
            self.fonts.push(config);
        }
    }

    pub fn register_bytes(&mut self, id: &str, name: &str, bytes: Vec<u8>) {
        self.register(FontConfig {
            id: id.to_string(),
            name: name.to_string(),
            family: name.to_string(),
            data: FontData::Bytes(Arc::new(bytes)),
        });
    }

    pub fn register_lazy(&mut self, id: &str, name: &str, loader: FontLoader) {
        self.register(FontConfig {
            id: id.to_string(),
            name: name.to_string(),
            family: name.to_string(),
            data: FontData::Lazy(loader),
        });
    }

    pub fn get(&self, id: &str) -> Option<&FontConfig> {
        self.fonts.iter().find(|f| f.id == id)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Recursively register every `.ttf`/`.otf` file under `dir`.
    ///
    /// Files are not read here; each entry loads its bytes on first use.
    /// The id is the lowercased file stem. Returns the number of fonts found.
    pub fn discover_dir(&mut self, dir: &Path) -> usize {
        let mut found = 0;
        self.scan_font_dir(dir, &mut found);
        tracing::info!("Discovered {} fonts under {}", found, dir.display());
        found
    }

    fn scan_font_dir(&mut self, dir: &Path, found: &mut usize) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();

            if path.is_dir() {
                self.scan_font_dir(&path, found);
            } else if let Some(ext) = path.extension() {
                let ext = ext.to_string_lossy().to_lowercase();
                if matches!(ext.as_str(), "ttf" | "otf") {
                    self.register_font_file(&path);
                    *found += 1;
                }
            }
        }
    }

    fn register_font_file(&mut self, path: &Path) {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            return;
        };
        let id = stem.to_lowercase();
        let owned = path.to_path_buf();
        let loader_id = id.clone();
        let loader: FontLoader = Arc::new(move || {
            let path = owned.clone();
            let id = loader_id.clone();
            async move {
                tokio::fs::read(&path).await.map_err(|e| FontError::Load {
                    id,
                    reason: format!("{}: {}", path.display(), e),
                })
            }
            .boxed()
        });
        self.register_lazy(&id, &stem, loader);
    }
}

#[async_trait]
impl FontCatalog for FontRegistry {
    fn list_fonts(&self) -> Vec<FontConfig> {
        self.fonts.clone()
    }

    async fn resolve_font(&self, id: &str) -> Result<FontSource, FontError> {
        let config = self
            .get(id)
            .ok_or_else(|| FontError::UnknownFont(id.to_string()))?;
        match &config.data {
            FontData::Standard(family) => Ok(FontSource::Standard(*family)),
            FontData::Bytes(bytes) => Ok(FontSource::Binary(bytes.clone())),
            FontData::Lazy(loader) => loader().await.map(|b| FontSource::Binary(Arc::new(b))),
        }
    }
}
