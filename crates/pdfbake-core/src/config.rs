//! Export configuration
//!
//! Every knob has a default, so an empty TOML document (or no file at all)
//! gives the standard behavior.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::coords::DEFAULT_BASELINE_RATIO;

/// Settings for one [`Exporter`](crate::export::Exporter)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// How the text baseline is placed below the top of its box
    pub baseline: BaselineStrategy,
    /// What happens when an image cannot be decoded
    pub image_failure: ImageFailurePolicy,
    /// Fill color for mask operations
    pub mask_color: String,
    /// Line advance for multi-line text, as a multiple of the font size
    pub line_height: f64,
    /// Embed only the glyphs that are used
    pub subset_fonts: bool,
    /// Characters added to every font's glyph set
    pub baseline_chars: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            baseline: BaselineStrategy::default(),
            image_failure: ImageFailurePolicy::default(),
            mask_color: "#ffffff".to_string(),
            line_height: 1.2,
            subset_fonts: true,
            baseline_chars: " .".to_string(),
        }
    }
}

impl ExportConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - A value is out of range
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pdfbake_core::config::ExportConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = ExportConfig::from_file("pdfbake.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use pdfbake_core::config::{BaselineStrategy, ExportConfig};
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = ExportConfig::from_toml_str(r#"baseline = { mode = "font-metrics" }"#)?;
    /// assert_eq!(config.baseline, BaselineStrategy::FontMetrics);
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.line_height.is_finite() || self.line_height <= 0.0 {
            anyhow::bail!("line_height must be positive, got {}", self.line_height);
        }
        if let BaselineStrategy::Fixed { ratio } = self.baseline {
            if !ratio.is_finite() || ratio < 0.0 {
                anyhow::bail!("baseline ratio must be a non-negative number, got {}", ratio);
            }
        }
        Ok(())
    }
}

/// Baseline placement for text edits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum BaselineStrategy {
    /// Baseline at `ratio` × font size below the box top
    Fixed {
        #[serde(default = "default_baseline_ratio")]
        ratio: f64,
    },
    /// Baseline at the font's own ascent below the box top
    FontMetrics,
}

impl Default for BaselineStrategy {
    fn default() -> Self {
        BaselineStrategy::Fixed {
            ratio: DEFAULT_BASELINE_RATIO,
        }
    }
}

fn default_baseline_ratio() -> f64 {
    DEFAULT_BASELINE_RATIO
}

impl BaselineStrategy {
    /// Fraction of the font size between box top and baseline, given the
    /// font's ascent in 1000-unit glyph space
    pub fn ratio(&self, font_ascent: f64) -> f64 {
        match self {
            BaselineStrategy::Fixed { ratio } => *ratio,
            BaselineStrategy::FontMetrics => font_ascent / 1000.0,
        }
    }
}

/// Policy for images that cannot be decoded or embedded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageFailurePolicy {
    /// Skip the operation and record a warning
    #[default]
    Skip,
    /// Fail the whole export
    Abort,
}
