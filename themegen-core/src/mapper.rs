use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use crate::color::{contrast_ratio, relative_luminance, Color};
use crate::config::ThemeConfig;
use crate::error::ThemeError;
use crate::roles::{lightness_band, RoleKey};
use crate::sampler::Palette;

/// Roles filled from leftover palette entries, in the order they claim them.
const LEFTOVER_ROLES: [RoleKey; 4] = [
    RoleKey::SecondaryText,
    RoleKey::Divider,
    RoleKey::ChatInBubble,
    RoleKey::ChatOutBubble,
];

const CONTRAST_STEP: f32 = 0.05;

/// Where a role's color came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    /// A palette color, used as is.
    Palette,
    /// A palette color moved into the role's lightness band.
    Adjusted,
    /// Computed from another role.
    Derived,
    /// Black or white because no palette color had enough contrast.
    Synthesized,
    /// Taken from the fallback table.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub palette_size: usize,
}

/// Assignment of theme keys to colors. `map_roles` always returns a total mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeMapping {
    colors: BTreeMap<RoleKey, (Color, Provenance)>,
    source: SourceInfo,
}

impl ThemeMapping {
    fn new(source: SourceInfo) -> Self {
        Self {
            colors: BTreeMap::new(),
            source,
        }
    }

    fn assign(&mut self, key: RoleKey, color: Color, provenance: Provenance) {
        debug!("{key} <- {color} ({provenance:?})");
        self.colors.insert(key, (color, provenance));
    }

    #[cfg(test)]
    pub(crate) fn remove(&mut self, key: RoleKey) {
        self.colors.remove(&key);
    }

    pub fn get(&self, key: RoleKey) -> Option<Color> {
        self.colors.get(&key).map(|(color, _)| *color)
    }

    pub fn provenance(&self, key: RoleKey) -> Option<Provenance> {
        self.colors.get(&key).map(|(_, provenance)| *provenance)
    }

    pub fn source(&self) -> &SourceInfo {
        &self.source
    }

    /// Required keys without a color, in serialization order.
    pub fn missing_keys(&self) -> Vec<RoleKey> {
        RoleKey::ALL
            .into_iter()
            .filter(|key| !self.colors.contains_key(key))
            .collect()
    }

    /// Assigned keys in serialization order.
    pub fn iter(&self) -> impl Iterator<Item = (RoleKey, Color)> + '_ {
        self.colors.iter().map(|(key, (color, _))| (*key, *color))
    }
}

/// Assigns palette colors to theme roles.
///
/// Every tie is broken by palette index, earlier wins:
/// 1. background: first of the top `background_candidates` swatches bright enough to
///    clear `background_luminance_floor`, else the dominant swatch;
/// 2. primary text: highest-contrast remaining swatch meeting `contrast_threshold`,
///    else black or white;
/// 3. accent: most saturated remaining swatch;
/// 4. secondary text, divider and bubbles: remaining swatches in palette order, moved
///    into a lightness band that depends on the background;
/// 5. anything left over: fallback table.
///
/// The remaining keys are derived from those roles.
pub fn map_roles(palette: &Palette, config: &ThemeConfig) -> Result<ThemeMapping, ThemeError> {
    if palette.is_empty() {
        return Err(ThemeError::InsufficientPalette);
    }

    let colors: Vec<Color> = palette.colors().collect();
    let mut used = vec![false; colors.len()];
    let mut mapping = ThemeMapping::new(SourceInfo {
        width: palette.width,
        height: palette.height,
        palette_size: palette.len(),
    });

    let background_index = colors
        .iter()
        .take(config.background_candidates.max(1))
        .position(|color| relative_luminance(*color) >= config.background_luminance_floor)
        .unwrap_or(0);
    used[background_index] = true;
    let background = colors[background_index];
    mapping.assign(RoleKey::WindowBackground, background, Provenance::Palette);

    match best_text(&colors, &used, background, config.contrast_threshold) {
        Some(index) => {
            used[index] = true;
            mapping.assign(RoleKey::PrimaryText, colors[index], Provenance::Palette);
        }
        None => {
            let text = Color::best_text_on(background);
            warn!(
                "no palette color reaches {}:1 on {background}, using {text}",
                config.contrast_threshold
            );
            mapping.assign(RoleKey::PrimaryText, text, Provenance::Synthesized);
        }
    }

    let accent = match most_saturated(&colors, &used) {
        Some(index) => {
            used[index] = true;
            mapping.assign(RoleKey::ActionBar, colors[index], Provenance::Palette);
            colors[index]
        }
        None => fill_default(&mut mapping, RoleKey::ActionBar, config),
    };

    let light_background = background.is_light();
    for key in LEFTOVER_ROLES {
        let Some(index) = used.iter().position(|taken| !taken) else {
            fill_default(&mut mapping, key, config);
            continue;
        };
        used[index] = true;
        let raw = colors[index];
        match lightness_band(key, light_background) {
            Some(band) if !band.contains(raw) => {
                mapping.assign(key, band.apply(raw), Provenance::Adjusted)
            }
            _ => mapping.assign(key, raw, Provenance::Palette),
        }
    }

    derive_dependent_roles(&mut mapping, background, accent, config);
    debug_assert!(mapping.missing_keys().is_empty());
    Ok(mapping)
}

fn derive_dependent_roles(
    mapping: &mut ThemeMapping,
    background: Color,
    accent: Color,
    config: &ThemeConfig,
) {
    let threshold = config.contrast_threshold;
    let on_accent = Color::best_text_on(accent);
    let in_bubble = mapping.get(RoleKey::ChatInBubble).unwrap_or(background);
    let out_bubble = mapping.get(RoleKey::ChatOutBubble).unwrap_or(background);

    let derived = [
        (RoleKey::LinkText, ensure_contrast(accent, background, threshold)),
        (RoleKey::ActionBarTitle, on_accent),
        (RoleKey::ActionBarSelector, on_accent),
        (RoleKey::ChatsActionBackground, accent),
        (RoleKey::ChatWallpaper, background),
        (RoleKey::ChatMessageTextIn, Color::best_text_on(in_bubble)),
        (RoleKey::ChatMessageTextOut, Color::best_text_on(out_bubble)),
        (RoleKey::ChatMessageLinkIn, ensure_contrast(accent, in_bubble, threshold)),
    ];
    for (key, color) in derived {
        mapping.assign(key, color, Provenance::Derived);
    }
}

fn fill_default(mapping: &mut ThemeMapping, key: RoleKey, config: &ThemeConfig) -> Color {
    let color = config.fallback_color(key);
    warn!("{key} falls back to {color}, source image has too few distinct colors");
    mapping.assign(key, color, Provenance::Default);
    color
}

/// Unused swatch with the highest contrast against `background`, if any reaches
/// `threshold`.
fn best_text(colors: &[Color], used: &[bool], background: Color, threshold: f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, color) in colors.iter().enumerate() {
        if used[index] {
            continue;
        }
        let ratio = contrast_ratio(*color, background);
        if ratio >= threshold && best.map_or(true, |(_, top)| ratio > top) {
            best = Some((index, ratio));
        }
    }
    best.map(|(index, _)| index)
}

fn most_saturated(colors: &[Color], used: &[bool]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, color) in colors.iter().enumerate() {
        if used[index] {
            continue;
        }
        let saturation = color.saturation();
        if best.map_or(true, |(_, top)| saturation > top) {
            best = Some((index, saturation));
        }
    }
    best.map(|(index, _)| index)
}

/// Walks lightness away from `surface` until `color` reaches `threshold`. Hue and
/// saturation never change. Returns the last attempt if the threshold is unreachable.
fn ensure_contrast(color: Color, surface: Color, threshold: f32) -> Color {
    if contrast_ratio(color, surface) >= threshold {
        return color;
    }
    let step = if surface.is_light() { -CONTRAST_STEP } else { CONTRAST_STEP };
    let mut lightness = color.to_hsl().l;
    let mut candidate = color;
    while (0.0..=1.0).contains(&(lightness + step)) {
        lightness += step;
        candidate = color.with_lightness(lightness);
        if contrast_ratio(candidate, surface) >= threshold {
            break;
        }
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Swatch;

    fn palette_of(colors: &[Color]) -> Palette {
        let swatches: Vec<Swatch> = colors
            .iter()
            .enumerate()
            .map(|(i, color)| Swatch {
                color: *color,
                population: (100 - i * 10) as u32,
                coverage: 0.0,
            })
            .collect();
        Palette {
            swatches,
            width: 400,
            height: 400,
            sampled_pixels: 1000,
        }
    }

    fn assert_total(mapping: &ThemeMapping) {
        assert!(mapping.missing_keys().is_empty());
        assert_eq!(mapping.iter().count(), RoleKey::ALL.len());
    }

    #[test]
    fn empty_palette_is_rejected() {
        let palette = palette_of(&[]);
        assert!(matches!(
            map_roles(&palette, &ThemeConfig::default()),
            Err(ThemeError::InsufficientPalette)
        ));
    }

    #[test]
    fn solid_red_synthesizes_text_and_defaults() {
        let red = Color::new(255, 0, 0);
        let mapping = map_roles(&palette_of(&[red]), &ThemeConfig::default()).unwrap();
        assert_total(&mapping);

        assert_eq!(mapping.get(RoleKey::WindowBackground), Some(red));
        let expected = if contrast_ratio(Color::WHITE, red) > contrast_ratio(Color::BLACK, red) {
            Color::WHITE
        } else {
            Color::BLACK
        };
        assert_eq!(mapping.get(RoleKey::PrimaryText), Some(expected));
        assert_eq!(mapping.provenance(RoleKey::PrimaryText), Some(Provenance::Synthesized));

        for key in [RoleKey::ActionBar, RoleKey::SecondaryText, RoleKey::Divider] {
            assert_eq!(mapping.provenance(key), Some(Provenance::Default));
            assert_eq!(mapping.get(key), Some(key.fallback()));
        }
    }

    #[test]
    fn dark_dominant_color_is_skipped_for_background() {
        let mapping =
            map_roles(&palette_of(&[Color::BLACK, Color::WHITE]), &ThemeConfig::default()).unwrap();
        assert_eq!(mapping.get(RoleKey::WindowBackground), Some(Color::WHITE));
        assert_eq!(mapping.get(RoleKey::PrimaryText), Some(Color::BLACK));
        assert_eq!(mapping.provenance(RoleKey::PrimaryText), Some(Provenance::Palette));
    }

    #[test]
    fn falls_back_to_dominant_when_all_candidates_are_dark() {
        let colors = [
            Color::new(5, 5, 10),
            Color::new(10, 5, 5),
            Color::new(8, 8, 8),
            Color::WHITE,
        ];
        let mapping = map_roles(&palette_of(&colors), &ThemeConfig::default()).unwrap();
        assert_eq!(mapping.get(RoleKey::WindowBackground), Some(colors[0]));
        assert_eq!(mapping.get(RoleKey::PrimaryText), Some(Color::WHITE));
    }

    #[test]
    fn text_prefers_highest_contrast_palette_color() {
        let background = Color::new(240, 240, 235);
        let colors = [background, Color::new(90, 90, 90), Color::new(20, 20, 30)];
        let mapping = map_roles(&palette_of(&colors), &ThemeConfig::default()).unwrap();
        assert_eq!(mapping.get(RoleKey::PrimaryText), Some(Color::new(20, 20, 30)));
    }

    #[test]
    fn accent_is_most_saturated_with_earlier_index_winning_ties() {
        let colors = [
            Color::new(245, 245, 245),
            Color::new(15, 15, 15),
            Color::new(120, 120, 130),
            Color::new(0, 0, 255),
            Color::new(255, 0, 0),
        ];
        let mapping = map_roles(&palette_of(&colors), &ThemeConfig::default()).unwrap();
        assert_eq!(mapping.get(RoleKey::ActionBar), Some(Color::new(0, 0, 255)));
        assert_eq!(mapping.get(RoleKey::ChatsActionBackground), Some(Color::new(0, 0, 255)));
    }

    #[test]
    fn leftovers_are_moved_into_lightness_bands() {
        let colors = [
            Color::new(250, 250, 250),
            Color::new(10, 10, 10),
            Color::new(230, 30, 60),
            Color::new(40, 90, 40),
            Color::new(30, 30, 120),
            Color::new(20, 120, 140),
            Color::new(200, 150, 30),
        ];
        let mapping = map_roles(&palette_of(&colors), &ThemeConfig::default()).unwrap();
        assert_total(&mapping);

        for (key, source) in LEFTOVER_ROLES.into_iter().zip(&colors[3..]) {
            let band = lightness_band(key, true).unwrap();
            let color = mapping.get(key).unwrap();
            assert!(band.contains(color), "{key} = {color} is outside {band:?}");
            assert!((color.to_hsl().h - source.to_hsl().h).abs() < 3.0);
        }
        assert_eq!(mapping.provenance(RoleKey::Divider), Some(Provenance::Adjusted));
    }

    #[test]
    fn exhausted_palette_uses_defaults_for_remaining_roles() {
        let colors = [Color::WHITE, Color::BLACK, Color::new(0, 120, 255), Color::new(90, 90, 90)];
        let mapping = map_roles(&palette_of(&colors), &ThemeConfig::default()).unwrap();
        assert_total(&mapping);
        assert_ne!(mapping.provenance(RoleKey::SecondaryText), Some(Provenance::Default));
        for key in [RoleKey::Divider, RoleKey::ChatInBubble, RoleKey::ChatOutBubble] {
            assert_eq!(mapping.provenance(key), Some(Provenance::Default));
        }
    }

    #[test]
    fn derived_text_reads_on_its_surface() {
        let colors = [Color::new(30, 30, 40), Color::new(230, 230, 230), Color::new(250, 200, 0)];
        let mapping = map_roles(&palette_of(&colors), &ThemeConfig::default()).unwrap();
        let accent = mapping.get(RoleKey::ActionBar).unwrap();
        assert_eq!(mapping.get(RoleKey::ActionBarTitle), Some(Color::best_text_on(accent)));
        assert_eq!(mapping.get(RoleKey::ChatWallpaper), mapping.get(RoleKey::WindowBackground));

        let link = mapping.get(RoleKey::LinkText).unwrap();
        assert_eq!(mapping.get(RoleKey::WindowBackground), Some(colors[1]));
        assert!(contrast_ratio(link, colors[1]) >= 4.5);
    }

    #[test]
    fn ensure_contrast_keeps_passing_colors() {
        let color = Color::new(0, 0, 200);
        assert_eq!(ensure_contrast(color, Color::WHITE, 4.5), color);
        let fixed = ensure_contrast(Color::new(120, 160, 255), Color::WHITE, 4.5);
        assert!(contrast_ratio(fixed, Color::WHITE) >= 4.5);
    }

    #[test]
    fn fallback_overrides_are_honored() {
        let mut config = ThemeConfig::default();
        config
            .fallback_overrides
            .insert("divider".to_string(), "#123456".to_string());
        let mapping = map_roles(&palette_of(&[Color::WHITE]), &config).unwrap();
        assert_eq!(mapping.get(RoleKey::Divider), Some(Color::new(0x12, 0x34, 0x56)));
    }
}
