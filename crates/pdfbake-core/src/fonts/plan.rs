//! Export-wide font pre-pass
//!
//! Runs before any page is drawn: every font referenced by a text edit is
//! resolved, subset to the characters actually used and embedded once.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;
use lopdf::Document;

use super::embed::{embed_custom, embed_standard, EmbeddedFonts, FontKey};
use super::manager::{FontManager, ResolvedFont};
use super::standard::StandardFamily;
use super::subset::PreparedFont;
use crate::export::ExportWarning;
use crate::operations::EditOperation;

/// Characters and style variants needed per font id
#[derive(Debug, Clone, Default)]
pub struct FontPlan {
    chars: BTreeMap<String, BTreeSet<char>>,
    variants: BTreeMap<String, BTreeSet<(bool, bool)>>,
}

/// Outcome of preparing one font id
#[derive(Debug, Clone)]
pub enum PlannedFont {
    Standard {
        font_id: String,
        family: StandardFamily,
    },
    Custom {
        font_id: String,
        font: Arc<PreparedFont>,
    },
}

impl PlannedFont {
    pub fn font_id(&self) -> &str {
        match self {
            PlannedFont::Standard { font_id, .. } => font_id,
            PlannedFont::Custom { font_id, .. } => font_id,
        }
    }
}

impl FontPlan {
    /// Gather the code points of every text edit, grouped by font id.
    ///
    /// `baseline_chars` are added to every font so spacing and punctuation
    /// always have glyphs.
    pub fn collect<'a>(ops: impl IntoIterator<Item = &'a EditOperation>, baseline_chars: &str) -> Self {
        let mut plan = Self::default();
        for op in ops {
            if let EditOperation::TextEdit { text, style, .. } = op {
                plan.chars
                    .entry(style.font_id.clone())
                    .or_default()
                    .extend(text.chars().filter(|c| !c.is_control()));
                plan.variants
                    .entry(style.font_id.clone())
                    .or_default()
                    .insert((style.is_bold(), style.is_italic()));
            }
        }
        for chars in plan.chars.values_mut() {
            chars.extend(baseline_chars.chars());
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn font_ids(&self) -> impl Iterator<Item = &str> {
        self.chars.keys().map(String::as_str)
    }

    pub fn chars_for(&self, font_id: &str) -> Option<&BTreeSet<char>> {
        self.chars.get(font_id)
    }

    /// Resolve every font id concurrently, then subset.
    ///
    /// Never fails: fonts that cannot be used fall back to the closest
    /// standard family by name and a subset failure falls back to the full
    /// program. Each degradation is reported as a warning.
    pub async fn prepare(&self, manager: &FontManager, subset_fonts: bool) -> (Vec<PlannedFont>, Vec<ExportWarning>) {
        let ids: Vec<&str> = self.font_ids().collect();
        let resolved = join_all(ids.iter().map(|id| manager.resolve(id))).await;

        let mut planned = Vec::with_capacity(ids.len());
        let mut warnings = Vec::new();

        for (font_id, result) in ids.into_iter().zip(resolved) {
            let chars = self.chars.get(font_id).cloned().unwrap_or_default();
            let entry = match result {
                Ok(ResolvedFont::Standard(family)) => {
                    let text: String = chars.iter().collect();
                    push_missing(&mut warnings, font_id, family.encode(&text).1);
                    PlannedFont::Standard {
                        font_id: font_id.to_string(),
                        family,
                    }
                }
                Ok(ResolvedFont::Custom(program)) => {
                    let prepared = if subset_fonts {
                        match program.subset(&chars) {
                            Ok(prepared) => Ok(prepared),
                            Err(e) => {
                                tracing::warn!("Subsetting {} failed, embedding full font: {}", font_id, e);
                                warnings.push(ExportWarning::SubsetFallback {
                                    font_id: font_id.to_string(),
                                    reason: e.to_string(),
                                });
                                program.full(&chars)
                            }
                        }
                    } else {
                        program.full(&chars)
                    };

                    match prepared {
                        Ok(prepared) => {
                            push_missing(&mut warnings, font_id, prepared.missing.clone());
                            PlannedFont::Custom {
                                font_id: font_id.to_string(),
                                font: Arc::new(prepared),
                            }
                        }
                        Err(e) => fallback(manager, font_id, e.to_string(), &mut warnings),
                    }
                }
                Err(e) => fallback(manager, font_id, e.to_string(), &mut warnings),
            };
            planned.push(entry);
        }

        (planned, warnings)
    }

    /// Write one font object per planned font (per variant for standard
    /// families) into `doc`
    pub fn embed(&self, doc: &mut Document, planned: Vec<PlannedFont>) -> EmbeddedFonts {
        let mut fonts = EmbeddedFonts::new();

        for entry in planned {
            match entry {
                PlannedFont::Standard { font_id, family } => {
                    let variants = self
                        .variants
                        .get(&font_id)
                        .cloned()
                        .unwrap_or_else(|| BTreeSet::from([(false, false)]));
                    for (bold, italic) in variants {
                        let font = embed_standard(doc, family, bold, italic);
                        fonts.insert(
                            FontKey {
                                font_id: font_id.clone(),
                                bold,
                                italic,
                            },
                            font,
                        );
                    }
                }
                PlannedFont::Custom { font_id, font } => {
                    tracing::debug!(
                        "Embedding {} as {} ({} bytes, subset: {})",
                        font_id,
                        font.postscript_name,
                        font.data.len(),
                        font.subsetted
                    );
                    fonts.insert(FontKey::plain(&font_id), embed_custom(doc, font));
                }
            }
        }

        fonts
    }
}

fn fallback(manager: &FontManager, font_id: &str, reason: String, warnings: &mut Vec<ExportWarning>) -> PlannedFont {
    let family = manager.fallback_for(font_id);
    tracing::warn!("Font {} unavailable, using {}: {}", font_id, family.display_name(), reason);
    warnings.push(ExportWarning::FontFallback {
        font_id: font_id.to_string(),
        fallback: family.id().to_string(),
        reason,
    });
    PlannedFont::Standard {
        font_id: font_id.to_string(),
        family,
    }
}

fn push_missing(warnings: &mut Vec<ExportWarning>, font_id: &str, missing: Vec<char>) {
    if missing.is_empty() {
        return;
    }
    let chars: String = missing.into_iter().collect();
    tracing::warn!("Font {} has no glyphs for {:?}", font_id, chars);
    warnings.push(ExportWarning::MissingGlyphs {
        font_id: font_id.to_string(),
        chars,
    });
}
