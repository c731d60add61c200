use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::roles::RoleKey;

/// Upper bound on `max_colors`; median cut beyond this only produces near-duplicates.
pub const MAX_PALETTE_SIZE: usize = 16;

/// Policy constants for the whole pipeline. Every field has a default, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    /// Name used when the caller does not supply one.
    pub theme_name: String,
    pub sampler: SamplerConfig,
    /// How many of the most dominant swatches may become the background.
    pub background_candidates: usize,
    /// Minimum luminance a background candidate needs before the dominant-color fallback.
    pub background_luminance_floor: f32,
    /// Minimum contrast for every text role against its surface.
    pub contrast_threshold: f32,
    /// Palettes smaller than this produce a warning.
    pub min_distinct_colors: usize,
    /// Images with a shorter side produce a warning.
    pub preview_min_side: u32,
    /// Images with a longer side produce a warning.
    pub preview_max_side: u32,
    /// Images with a longer/shorter side ratio above this produce a warning.
    pub preview_max_aspect: f32,
    /// Alpha for roles that are drawn as overlays.
    pub overlay_alpha: u8,
    /// Attribute name -> `#RRGGBB` replacing the built-in fallback color.
    pub fallback_overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub max_colors: usize,
    /// Pixels with lower alpha are treated as invisible.
    pub min_alpha: u8,
    /// Images with more pixels than this are sampled on a fixed stride.
    pub subsample_threshold: u32,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            theme_name: "Custom Theme".to_string(),
            sampler: SamplerConfig::default(),
            background_candidates: 3,
            background_luminance_floor: 0.05,
            contrast_threshold: 4.5,
            min_distinct_colors: 3,
            preview_min_side: 200,
            preview_max_side: 4096,
            preview_max_aspect: 2.5,
            overlay_alpha: 0x33,
            fallback_overrides: BTreeMap::new(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_colors: 8,
            min_alpha: 16,
            subsample_threshold: 256 * 256,
        }
    }
}

impl ThemeConfig {
    /// Reads a JSON config file and validates it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config: ThemeConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let max_colors = self.sampler.max_colors;
        if max_colors == 0 || max_colors > MAX_PALETTE_SIZE {
            bail!("max_colors must be between 1 and {MAX_PALETTE_SIZE}, got {max_colors}");
        }
        if self.sampler.subsample_threshold == 0 {
            bail!("subsample_threshold must be positive");
        }
        if self.background_candidates == 0 {
            bail!("background_candidates must be positive");
        }
        if !(0.0..=1.0).contains(&self.background_luminance_floor) {
            bail!("background_luminance_floor must be within [0, 1]");
        }
        if self.contrast_threshold < 1.0 {
            bail!("contrast_threshold must be at least 1.0");
        }
        if self.preview_max_side < self.preview_min_side {
            bail!("preview_max_side must not be below preview_min_side");
        }
        if self.preview_max_aspect < 1.0 {
            bail!("preview_max_aspect must be at least 1.0");
        }
        for (attribute, hex) in &self.fallback_overrides {
            if RoleKey::from_attribute(attribute).is_none() {
                bail!("unknown theme key in fallback_overrides: {attribute}");
            }
            if Color::from_hex(hex).is_none() {
                bail!("invalid color {hex:?} for {attribute}, expected #RRGGBB");
            }
        }
        Ok(())
    }

    /// The fallback color for `key`, honoring overrides.
    pub fn fallback_color(&self, key: RoleKey) -> Color {
        self.fallback_overrides
            .get(key.attribute())
            .and_then(|hex| Color::from_hex(hex))
            .unwrap_or_else(|| key.fallback())
    }
}
