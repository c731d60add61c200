use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// A Telegram theme attribute that every generated theme must define.
///
/// Declaration order is serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleKey {
    WindowBackground,
    PrimaryText,
    SecondaryText,
    LinkText,
    Divider,
    ActionBar,
    ActionBarTitle,
    ActionBarSelector,
    ChatsActionBackground,
    ChatWallpaper,
    ChatInBubble,
    ChatOutBubble,
    ChatMessageTextIn,
    ChatMessageTextOut,
    ChatMessageLinkIn,
}

impl RoleKey {
    pub const ALL: [RoleKey; 15] = [
        RoleKey::WindowBackground,
        RoleKey::PrimaryText,
        RoleKey::SecondaryText,
        RoleKey::LinkText,
        RoleKey::Divider,
        RoleKey::ActionBar,
        RoleKey::ActionBarTitle,
        RoleKey::ActionBarSelector,
        RoleKey::ChatsActionBackground,
        RoleKey::ChatWallpaper,
        RoleKey::ChatInBubble,
        RoleKey::ChatOutBubble,
        RoleKey::ChatMessageTextIn,
        RoleKey::ChatMessageTextOut,
        RoleKey::ChatMessageLinkIn,
    ];

    /// The key as written in the `.attheme` file.
    pub fn attribute(self) -> &'static str {
        match self {
            RoleKey::WindowBackground => "windowBackgroundWhite",
            RoleKey::PrimaryText => "windowBackgroundWhiteBlackText",
            RoleKey::SecondaryText => "windowBackgroundWhiteGrayText",
            RoleKey::LinkText => "windowBackgroundWhiteLinkText",
            RoleKey::Divider => "divider",
            RoleKey::ActionBar => "actionBarDefault",
            RoleKey::ActionBarTitle => "actionBarDefaultTitle",
            RoleKey::ActionBarSelector => "actionBarDefaultSelector",
            RoleKey::ChatsActionBackground => "chats_actionBackground",
            RoleKey::ChatWallpaper => "chat_wallpaper",
            RoleKey::ChatInBubble => "chat_inBubble",
            RoleKey::ChatOutBubble => "chat_outBubble",
            RoleKey::ChatMessageTextIn => "chat_messageTextIn",
            RoleKey::ChatMessageTextOut => "chat_messageTextOut",
            RoleKey::ChatMessageLinkIn => "chat_messageLinkIn",
        }
    }

    pub fn from_attribute(attribute: &str) -> Option<RoleKey> {
        RoleKey::ALL
            .into_iter()
            .find(|key| key.attribute() == attribute)
    }

    /// Built-in color used when the source image runs out of distinct colors.
    /// Values follow Telegram's default day theme.
    pub fn fallback(self) -> Color {
        match self {
            RoleKey::WindowBackground | RoleKey::ChatInBubble => Color::WHITE,
            RoleKey::PrimaryText | RoleKey::ChatMessageTextIn | RoleKey::ChatMessageTextOut => {
                Color::BLACK
            }
            RoleKey::SecondaryText => Color::new(0x8A, 0x8A, 0x8A),
            RoleKey::LinkText | RoleKey::ChatMessageLinkIn => Color::new(0x2A, 0x78, 0xC2),
            RoleKey::Divider => Color::new(0xD9, 0xD9, 0xD9),
            RoleKey::ActionBar | RoleKey::ChatsActionBackground => Color::new(0x52, 0x7D, 0xA3),
            RoleKey::ActionBarTitle => Color::WHITE,
            RoleKey::ActionBarSelector => Color::new(0x40, 0x6D, 0x94),
            RoleKey::ChatWallpaper => Color::new(0xD6, 0xE4, 0xEF),
            RoleKey::ChatOutBubble => Color::new(0xEF, 0xFF, 0xDE),
        }
    }

    /// Overlay roles are drawn on top of other surfaces and keep their configured alpha.
    pub fn is_overlay(self) -> bool {
        matches!(self, RoleKey::ActionBarSelector)
    }

    /// For text roles, the surface they are drawn on.
    pub fn text_surface(self) -> Option<RoleKey> {
        match self {
            RoleKey::PrimaryText | RoleKey::SecondaryText | RoleKey::LinkText => {
                Some(RoleKey::WindowBackground)
            }
            RoleKey::ActionBarTitle => Some(RoleKey::ActionBar),
            RoleKey::ChatMessageTextIn | RoleKey::ChatMessageLinkIn => Some(RoleKey::ChatInBubble),
            RoleKey::ChatMessageTextOut => Some(RoleKey::ChatOutBubble),
            _ => None,
        }
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

const BAND_MARGIN: f32 = 0.005;

/// Target HSL lightness range for a palette-filled role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightnessBand {
    pub low: f32,
    pub high: f32,
}

impl LightnessBand {
    const fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    /// Clamps lightness into the band. The target sits slightly inside the bounds so
    /// that rounding back to 8-bit channels cannot push the result out again.
    pub fn apply(self, color: Color) -> Color {
        color.clamp_lightness(self.low + BAND_MARGIN, self.high - BAND_MARGIN)
    }

    pub fn contains(self, color: Color) -> bool {
        (self.low..=self.high).contains(&color.to_hsl().l)
    }
}

/// Lightness bands for the roles filled from leftover palette entries. They depend on
/// whether the chosen background is light or dark.
pub fn lightness_band(key: RoleKey, light_background: bool) -> Option<LightnessBand> {
    let band = match (key, light_background) {
        (RoleKey::SecondaryText, true) => LightnessBand::new(0.25, 0.45),
        (RoleKey::SecondaryText, false) => LightnessBand::new(0.60, 0.80),
        (RoleKey::Divider, true) => LightnessBand::new(0.80, 0.92),
        (RoleKey::Divider, false) => LightnessBand::new(0.15, 0.30),
        (RoleKey::ChatInBubble, true) => LightnessBand::new(0.88, 0.97),
        (RoleKey::ChatInBubble, false) => LightnessBand::new(0.15, 0.28),
        (RoleKey::ChatOutBubble, true) => LightnessBand::new(0.75, 0.90),
        (RoleKey::ChatOutBubble, false) => LightnessBand::new(0.25, 0.40),
        _ => return None,
    };
    Some(band)
}
