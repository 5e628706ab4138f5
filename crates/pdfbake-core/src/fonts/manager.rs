//! Font resolution with a per-session, coalescing cache

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use super::standard::StandardFamily;
use super::subset::FontProgram;
use super::{FontCatalog, FontRegistry, FontSource};
use crate::error::FontError;

/// A font id after resolution
#[derive(Debug, Clone)]
pub enum ResolvedFont {
    Standard(StandardFamily),
    Custom(Arc<FontProgram>),
}

type Slot = Arc<OnceCell<ResolvedFont>>;

/// Resolves font ids through a [`FontCatalog`] and caches the result.
///
/// Each font id owns one slot. Concurrent `resolve` calls for the same id
/// wait on that slot, so a font binary is fetched and parsed once; distinct
/// ids load independently. Failed loads are not cached.
pub struct FontManager {
    catalog: Arc<dyn FontCatalog>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl FontManager {
    pub fn new(catalog: Arc<dyn FontCatalog>) -> Self {
        Self {
            catalog,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Manager over a registry holding only the standard fonts
    pub fn with_standard_fonts() -> Self {
        Self::new(Arc::new(FontRegistry::with_standard_fonts()))
    }

    pub fn catalog(&self) -> &Arc<dyn FontCatalog> {
        &self.catalog
    }

    pub fn is_standard(&self, font_id: &str) -> bool {
        self.catalog
            .list_fonts()
            .iter()
            .any(|f| f.id == font_id && f.is_standard())
    }

    /// First standard font the catalog lists, Helvetica if it lists none
    pub fn fallback_standard(&self) -> StandardFamily {
        self.catalog
            .list_fonts()
            .iter()
            .find_map(|f| f.standard_font_ref())
            .unwrap_or(StandardFamily::Helvetica)
    }

    /// Standard family to draw with when `font_id` cannot be used.
    ///
    /// The font's catalog family name (or the id itself when the catalog
    /// does not know it) picks the closest standard family, so "arial"
    /// lands on Helvetica and "consolas" on Courier. Names that suggest no
    /// family fall back to [`FontManager::fallback_standard`].
    pub fn fallback_for(&self, font_id: &str) -> StandardFamily {
        let fonts = self.catalog.list_fonts();
        let family = fonts
            .iter()
            .find(|f| f.id == font_id)
            .map(|f| f.family.as_str())
            .unwrap_or(font_id);
        StandardFamily::from_family_name(family)
            .or_else(|| StandardFamily::from_family_name(font_id))
            .unwrap_or_else(|| self.fallback_standard())
    }

    pub async fn resolve(&self, font_id: &str) -> Result<ResolvedFont, FontError> {
        let slot = self.slot(font_id);
        let resolved = slot.get_or_try_init(|| self.load(font_id)).await?;
        Ok(resolved.clone())
    }

    /// Number of font ids with a completed load
    pub fn cached_len(&self) -> usize {
        self.lock_slots()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    async fn load(&self, font_id: &str) -> Result<ResolvedFont, FontError> {
        tracing::debug!(font_id, "Resolving font");
        match self.catalog.resolve_font(font_id).await? {
            FontSource::Standard(family) => Ok(ResolvedFont::Standard(family)),
            FontSource::Binary(data) => {
                let program = FontProgram::parse(font_id, data)?;
                tracing::debug!(font_id, bytes = program.len(), "Font binary loaded");
                Ok(ResolvedFont::Custom(Arc::new(program)))
            }
        }
    }

    fn slot(&self, font_id: &str) -> Slot {
        self.lock_slots()
            .entry(font_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for FontManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontManager")
            .field("cached", &self.cached_len())
            .finish()
    }
}
