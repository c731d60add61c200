use std::fmt;

use palette::{Hsl as PaletteHsl, IntoColor, LinSrgb, Srgb};
use serde::{Deserialize, Serialize};

/// Luminance at which black and white text have equal contrast.
const LIGHT_CROSSOVER: f32 = 0.179;

/// An opaque sRGB color. The hex form is derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// HSL components: hue in degrees `[0, 360)`, saturation and lightness in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::new(r, g, b))
    }

    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Alpha-inclusive `#AARRGGBB`, the encoding `.attheme` files use.
    pub fn argb_hex(&self, alpha: u8) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", alpha, self.r, self.g, self.b)
    }

    fn to_srgb(self) -> Srgb<f32> {
        Srgb::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }

    fn from_srgb(color: Srgb<f32>) -> Self {
        Self::new(
            channel_to_u8(color.red),
            channel_to_u8(color.green),
            channel_to_u8(color.blue),
        )
    }

    pub fn to_hsl(&self) -> Hsl {
        let hsl: PaletteHsl = self.to_srgb().into_color();
        Hsl {
            h: hsl.hue.into_positive_degrees(),
            s: hsl.saturation.clamp(0.0, 1.0),
            l: hsl.lightness.clamp(0.0, 1.0),
        }
    }

    pub fn saturation(&self) -> f32 {
        self.to_hsl().s
    }

    /// Same hue and saturation, lightness replaced (clamped to `[0, 1]`).
    pub fn with_lightness(&self, lightness: f32) -> Self {
        let hsl: PaletteHsl = self.to_srgb().into_color();
        let shifted = PaletteHsl::new(hsl.hue, hsl.saturation, lightness.clamp(0.0, 1.0));
        let rgb: Srgb = shifted.into_color();
        Self::from_srgb(rgb)
    }

    /// Moves lightness into `[low, high]`; colors already inside are returned untouched.
    pub fn clamp_lightness(&self, low: f32, high: f32) -> Self {
        let l = self.to_hsl().l;
        if (low..=high).contains(&l) {
            *self
        } else {
            self.with_lightness(l.clamp(low, high))
        }
    }

    pub fn is_light(&self) -> bool {
        relative_luminance(*self) > LIGHT_CROSSOVER
    }

    /// Black or white, whichever reads better on `background`. Black wins ties.
    pub fn best_text_on(background: Color) -> Color {
        let black = contrast_ratio(Color::BLACK, background);
        let white = contrast_ratio(Color::WHITE, background);
        if white > black {
            Color::WHITE
        } else {
            Color::BLACK
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

fn channel_to_u8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// WCAG relative luminance in `[0, 1]`.
pub fn relative_luminance(color: Color) -> f32 {
    let linear: LinSrgb = color.to_srgb().into_linear();
    (0.2126 * linear.red + 0.7152 * linear.green + 0.0722 * linear.blue).clamp(0.0, 1.0)
}

/// WCAG contrast ratio, always `>= 1` and independent of argument order.
pub fn contrast_ratio(a: Color, b: Color) -> f32 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    let (lighter, darker) = if la >= lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}

/// Euclidean distance in RGB space.
pub fn distance(a: Color, b: Color) -> f32 {
    let dr = a.r as f32 - b.r as f32;
    let dg = a.g as f32 - b.g as f32;
    let db = a.b as f32 - b.b as f32;
    (dr * dr + dg * dg + db * db).sqrt()
}
