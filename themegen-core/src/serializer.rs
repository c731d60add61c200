use log::info;
use serde::Serialize;

use crate::color::{contrast_ratio, distance};
use crate::config::ThemeConfig;
use crate::error::ThemeError;
use crate::mapper::{Provenance, ThemeMapping};
use crate::roles::RoleKey;

pub const FILE_EXTENSION: &str = "attheme";

const OPAQUE: u8 = 0xFF;

/// Bubbles closer than this in RGB space are hard to tell apart.
const MIN_BUBBLE_DISTANCE: f32 = 12.0;

/// Structural errors and advisory warnings for a mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_usable(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first `n` warnings, for callers that only surface a few.
    pub fn top_warnings(&self, n: usize) -> &[String] {
        &self.warnings[..n.min(self.warnings.len())]
    }
}

/// The finished theme file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedTheme {
    name: String,
    content: String,
    validation: ValidationReport,
}

impl GeneratedTheme {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn validation(&self) -> &ValidationReport {
        &self.validation
    }

    /// `My Theme` -> `My_Theme.attheme`.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .name
            .trim()
            .chars()
            .map(|c| {
                if c.is_whitespace() || c == '/' || c == '\\' {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        let stem = if stem.is_empty() { "theme" } else { stem.as_str() };
        format!("{stem}.{FILE_EXTENSION}")
    }
}

pub fn validate(mapping: &ThemeMapping, config: &ThemeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    for key in mapping.missing_keys() {
        report.errors.push(format!("required key {key} is missing"));
    }

    for key in RoleKey::ALL {
        match mapping.provenance(key) {
            Some(Provenance::Synthesized) => report.warnings.push(format!(
                "{key}: text color synthesized, no high-contrast palette entry found"
            )),
            Some(Provenance::Default) => report.warnings.push(format!(
                "role {key} used default color, insufficient distinct colors in source image"
            )),
            _ => {}
        }
    }

    for key in RoleKey::ALL {
        let Some(surface) = key.text_surface() else {
            continue;
        };
        let (Some(text), Some(background)) = (mapping.get(key), mapping.get(surface)) else {
            continue;
        };
        let threshold = config.contrast_threshold;
        let ratio = contrast_ratio(text, background);
        if ratio < threshold {
            report.warnings.push(format!(
                "contrast between {key} and {surface} is {ratio:.2}:1, below {threshold}:1"
            ));
        }
    }

    if let (Some(incoming), Some(outgoing)) = (
        mapping.get(RoleKey::ChatInBubble),
        mapping.get(RoleKey::ChatOutBubble),
    ) {
        if distance(incoming, outgoing) < MIN_BUBBLE_DISTANCE {
            report.warnings.push(format!(
                "incoming and outgoing bubbles are nearly identical ({incoming} vs {outgoing})"
            ));
        }
    }

    let source = mapping.source();
    if source.palette_size < config.min_distinct_colors {
        report.warnings.push(format!(
            "source image yielded only {} distinct colors, at least {} recommended",
            source.palette_size, config.min_distinct_colors
        ));
    }

    let short_side = source.width.min(source.height);
    let long_side = source.width.max(source.height);
    if short_side < config.preview_min_side {
        report.warnings.push(format!(
            "image is {}x{}, below the recommended {}px preview size",
            source.width, source.height, config.preview_min_side
        ));
    }
    if long_side > config.preview_max_side {
        report.warnings.push(format!(
            "image is {}x{}, above the recommended {}px preview size",
            source.width, source.height, config.preview_max_side
        ));
    }
    if short_side > 0 {
        let aspect = long_side as f32 / short_side as f32;
        if aspect > config.preview_max_aspect {
            report.warnings.push(format!(
                "image aspect ratio {aspect:.2}:1 exceeds the recommended {}:1",
                config.preview_max_aspect
            ));
        }
    }

    report
}

/// Renders `mapping` as `.attheme` text, one `key: #AARRGGBB` line per required key in
/// fixed key order. A mapping with missing keys yields `IncompleteTheme` and no output.
pub fn serialize(
    mapping: &ThemeMapping,
    name: &str,
    config: &ThemeConfig,
) -> Result<GeneratedTheme, ThemeError> {
    let validation = validate(mapping, config);
    let missing = mapping.missing_keys();
    if !missing.is_empty() {
        return Err(ThemeError::IncompleteTheme { missing });
    }

    let content: String = mapping
        .iter()
        .map(|(key, color)| {
            let alpha = if key.is_overlay() { config.overlay_alpha } else { OPAQUE };
            format!("{}: {}\n", key.attribute(), color.argb_hex(alpha))
        })
        .collect();

    info!(
        "serialized theme {name:?}: {} keys, {} warnings",
        RoleKey::ALL.len(),
        validation.warnings.len()
    );

    Ok(GeneratedTheme {
        name: name.to_string(),
        content,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::mapper::map_roles;
    use crate::sampler::{Palette, Swatch};

    fn mapping_for(colors: &[Color], width: u32, height: u32) -> ThemeMapping {
        let swatches = colors
            .iter()
            .map(|color| Swatch {
                color: *color,
                population: 10,
                coverage: 1.0 / colors.len() as f32,
            })
            .collect();
        let palette = Palette {
            swatches,
            width,
            height,
            sampled_pixels: 10 * colors.len() as u32,
        };
        map_roles(&palette, &ThemeConfig::default()).unwrap()
    }

    fn rich_mapping() -> ThemeMapping {
        mapping_for(
            &[
                Color::new(245, 240, 230),
                Color::new(25, 20, 30),
                Color::new(200, 40, 90),
                Color::new(110, 110, 120),
                Color::new(180, 170, 160),
                Color::new(240, 235, 250),
                Color::new(200, 230, 200),
            ],
            800,
            600,
        )
    }

    #[test]
    fn emits_every_key_once_in_fixed_order() {
        let theme = serialize(&rich_mapping(), "Sunset", &ThemeConfig::default()).unwrap();
        let keys: Vec<&str> = theme
            .content()
            .lines()
            .map(|line| line.split_once(": ").unwrap().0)
            .collect();
        let expected: Vec<&str> = RoleKey::ALL.iter().map(|key| key.attribute()).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn values_are_eight_digit_argb() {
        let theme = serialize(&rich_mapping(), "Sunset", &ThemeConfig::default()).unwrap();
        for line in theme.content().lines() {
            let (key, value) = line.split_once(": ").unwrap();
            assert_eq!(value.len(), 9, "{line}");
            assert!(value.starts_with('#'));
            assert!(value[1..].chars().all(|c| c.is_ascii_hexdigit()));
            let expected_alpha = if key == "actionBarDefaultSelector" { "33" } else { "FF" };
            assert_eq!(&value[1..3], expected_alpha, "{line}");
        }
    }

    #[test]
    fn serialization_is_deterministic() {
        let mapping = rich_mapping();
        let config = ThemeConfig::default();
        let first = serialize(&mapping, "Sunset", &config).unwrap();
        let second = serialize(&mapping, "Sunset", &config).unwrap();
        assert_eq!(first.content(), second.content());
        assert_eq!(first, second);
    }

    #[test]
    fn missing_key_aborts_without_output() {
        let mut mapping = rich_mapping();
        mapping.remove(RoleKey::Divider);

        let report = validate(&mapping, &ThemeConfig::default());
        assert_eq!(report.errors, vec!["required key divider is missing".to_string()]);
        assert!(!report.is_usable());

        match serialize(&mapping, "Broken", &ThemeConfig::default()) {
            Err(ThemeError::IncompleteTheme { missing }) => {
                assert_eq!(missing, vec![RoleKey::Divider])
            }
            other => panic!("expected IncompleteTheme, got {other:?}"),
        }
    }

    #[test]
    fn rich_palette_validates_cleanly() {
        let report = validate(&rich_mapping(), &ThemeConfig::default());
        assert!(report.is_usable());
        assert!(
            report.warnings.iter().all(|w| !w.contains("default color")),
            "{:?}",
            report.warnings
        );
    }

    #[test]
    fn sparse_small_image_collects_warnings() {
        let mapping = mapping_for(&[Color::new(255, 0, 0)], 100, 100);
        let report = validate(&mapping, &ThemeConfig::default());
        assert!(report.is_usable());

        let warnings = &report.warnings;
        assert!(warnings[0].contains("text color synthesized"));
        assert!(warnings
            .iter()
            .any(|w| w == "role divider used default color, insufficient distinct colors in source image"));
        assert!(warnings.iter().any(|w| w.contains("only 1 distinct colors")));
        assert!(warnings.iter().any(|w| w.contains("100x100")));
        assert_eq!(report.top_warnings(2), &warnings[..2]);
        assert_eq!(report.top_warnings(100).len(), warnings.len());
    }

    #[test]
    fn flags_extreme_aspect_ratio() {
        let mapping = mapping_for(&[Color::WHITE, Color::BLACK, Color::new(0, 90, 200)], 3000, 400);
        let report = validate(&mapping, &ThemeConfig::default());
        assert!(report.warnings.iter().any(|w| w.contains("aspect ratio 7.50:1")));
    }

    #[test]
    fn low_contrast_pairs_are_warnings() {
        let mut config = ThemeConfig::default();
        config.contrast_threshold = 21.5;
        let report = validate(&rich_mapping(), &config);
        assert!(report.is_usable());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.starts_with("contrast between windowBackgroundWhiteBlackText and windowBackgroundWhite")));
    }

    #[test]
    fn secondary_text_is_held_to_the_full_threshold() {
        // (40,160,40) already sits in the secondary band and reads at about 3.4:1 on white.
        let mapping = mapping_for(
            &[Color::WHITE, Color::BLACK, Color::new(0, 0, 255), Color::new(40, 160, 40)],
            800,
            600,
        );
        let secondary = mapping.get(RoleKey::SecondaryText).unwrap();
        assert_eq!(secondary, Color::new(40, 160, 40));
        let ratio = contrast_ratio(secondary, Color::WHITE);
        assert!(ratio > 3.0 && ratio < 4.5, "{ratio}");

        let report = validate(&mapping, &ThemeConfig::default());
        assert!(report.warnings.iter().any(|w| w.starts_with(
            "contrast between windowBackgroundWhiteGrayText and windowBackgroundWhite"
        )));
    }

    #[test]
    fn flags_oversized_image() {
        let colors = [Color::WHITE, Color::BLACK, Color::new(0, 90, 200)];
        let report = validate(&mapping_for(&colors, 6000, 4000), &ThemeConfig::default());
        assert!(report
            .warnings
            .iter()
            .any(|w| w == "image is 6000x4000, above the recommended 4096px preview size"));

        let report = validate(&mapping_for(&colors, 4096, 3000), &ThemeConfig::default());
        assert!(!report.warnings.iter().any(|w| w.contains("above the recommended")));
    }

    #[test]
    fn flags_indistinguishable_bubbles() {
        let mapping = mapping_for(
            &[
                Color::WHITE,
                Color::BLACK,
                Color::new(0, 90, 200),
                Color::new(100, 100, 100),
                Color::new(210, 210, 210),
                Color::new(226, 226, 226),
                Color::new(228, 228, 228),
            ],
            800,
            800,
        );
        let report = validate(&mapping, &ThemeConfig::default());
        assert!(report.warnings.iter().any(|w| w.starts_with("incoming and outgoing bubbles")));
    }

    #[test]
    fn file_name_replaces_whitespace() {
        let theme = serialize(&rich_mapping(), "  Warm  Evening\tSky ", &ThemeConfig::default())
            .unwrap();
        assert_eq!(theme.file_name(), "Warm__Evening_Sky.attheme");

        let unnamed = serialize(&rich_mapping(), "   ", &ThemeConfig::default()).unwrap();
        assert_eq!(unnamed.file_name(), "theme.attheme");
    }
}
