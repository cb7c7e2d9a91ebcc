//! Secondary palette derivation from a single tenant color.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Channel offset for the darker shade.
pub const DARKER_OFFSET: i16 = 40;
/// Channel offset for the slightly darker shade.
pub const SLIGHTLY_DARKER_OFFSET: i16 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexColorError {
    #[error("color must be 6 hex digits, got {0:?}")]
    Length(String),
    #[error("color contains a non-hex digit: {0:?}")]
    Digit(String),
    #[error("color must start with '#', got {0:?}")]
    MissingHash(String),
}

/// A validated 24-bit RGB color, rendered as lowercase `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` or `rrggbb`.
    pub fn parse(raw: &str) -> Result<Self, HexColorError> {
        let digits = raw.strip_prefix('#').unwrap_or(raw);
        if digits.len() != 6 {
            return Err(HexColorError::Length(raw.to_string()));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HexColorError::Digit(raw.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| HexColorError::Digit(raw.to_string()))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Like [`HexColor::parse`] but insists on the leading `#`, which is how
    /// organization records store their color.
    pub fn parse_prefixed(raw: &str) -> Result<Self, HexColorError> {
        if !raw.starts_with('#') {
            return Err(HexColorError::MissingHash(raw.to_string()));
        }
        Self::parse(raw)
    }

    /// Adds `amount` to every channel, clamping to `0..=255`.
    pub fn shade(self, amount: i16) -> Self {
        let adjust = |channel: u8| i16::from(channel).saturating_add(amount).clamp(0, 255) as u8;
        Self {
            r: adjust(self.r),
            g: adjust(self.g),
            b: adjust(self.b),
        }
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = HexColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub base: HexColor,
    pub darker: HexColor,
    pub slightly_darker: HexColor,
}

impl Palette {
    pub fn derive(base: HexColor) -> Self {
        Self {
            base,
            darker: base.shade(-DARKER_OFFSET),
            slightly_darker: base.shade(-SLIGHTLY_DARKER_OFFSET),
        }
    }
}

/// Parses `base_hex` and derives its palette.
pub fn derive(base_hex: &str) -> Result<Palette, HexColorError> {
    HexColor::parse(base_hex).map(Palette::derive)
}
