//! Process-wide theme state.
//!
//! A single [`ThemeController`] owns the active theme and publishes immutable
//! [`ThemeSnapshot`]s. Presentational consumers hold a cloned [`ThemeHandle`]
//! and only ever read.

use std::{fmt, str::FromStr, sync::Arc};

use shared::protocol::Organization;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::palette::{HexColor, Palette};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThemeVariant {
    #[default]
    Default,
    Christmas,
    NewYear,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown theme {0:?}; expected default, christmas or new-year")]
pub struct UnknownThemeVariant(pub String);

impl ThemeVariant {
    pub const ALL: [ThemeVariant; 3] = [
        ThemeVariant::Default,
        ThemeVariant::Christmas,
        ThemeVariant::NewYear,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ThemeVariant::Default => "default",
            ThemeVariant::Christmas => "christmas",
            ThemeVariant::NewYear => "new-year",
        }
    }

    /// Seasonal variants ship fixed colors and never take a tenant color.
    pub fn is_customizable(self) -> bool {
        matches!(self, ThemeVariant::Default)
    }

    pub fn preset(self) -> ThemePreset {
        match self {
            ThemeVariant::Default => ThemePreset {
                display_name: "Default",
                primary: "blue-600",
                secondary: "purple-600",
                accent: "pink-600",
                header_gradient: "from-blue-600 to-purple-600",
                button_gradient: "from-blue-600 to-purple-600",
                main_emoji: "🎰",
                show_snow: false,
                show_confetti: false,
            },
            ThemeVariant::Christmas => ThemePreset {
                display_name: "🎄 Christmas",
                primary: "red-600",
                secondary: "green-700",
                accent: "yellow-500",
                header_gradient: "from-red-600 to-green-700",
                button_gradient: "from-red-600 to-green-700",
                main_emoji: "🎄",
                show_snow: true,
                show_confetti: false,
            },
            ThemeVariant::NewYear => ThemePreset {
                display_name: "🎆 New Year",
                primary: "purple-600",
                secondary: "yellow-500",
                accent: "pink-500",
                header_gradient: "from-purple-600 via-pink-500 to-yellow-500",
                button_gradient: "from-purple-600 via-pink-500 to-yellow-500",
                main_emoji: "🍾",
                show_snow: false,
                show_confetti: true,
            },
        }
    }
}

impl fmt::Display for ThemeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeVariant {
    type Err = UnknownThemeVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThemeVariant::ALL
            .into_iter()
            .find(|variant| variant.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownThemeVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemePreset {
    pub display_name: &'static str,
    pub primary: &'static str,
    pub secondary: &'static str,
    pub accent: &'static str,
    pub header_gradient: &'static str,
    pub button_gradient: &'static str,
    pub main_emoji: &'static str,
    pub show_snow: bool,
    pub show_confetti: bool,
}

pub const PRIMARY_COLOR_PROPERTY: &str = "--primary-color";
pub const PRIMARY_DARKER_PROPERTY: &str = "--primary-darker";
pub const PRIMARY_SLIGHTLY_DARKER_PROPERTY: &str = "--primary-slightly-darker";

/// What consumers render from. `palette` is only present when the variant is
/// customizable and a tenant color is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSnapshot {
    pub variant: ThemeVariant,
    pub custom_base: Option<HexColor>,
    pub palette: Option<Palette>,
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub header_gradient: String,
    pub button_gradient: String,
    pub main_emoji: &'static str,
    pub show_snow: bool,
    pub show_confetti: bool,
}

impl ThemeSnapshot {
    fn build(variant: ThemeVariant, custom_base: Option<HexColor>) -> Self {
        let preset = variant.preset();
        let palette = custom_base
            .filter(|_| variant.is_customizable())
            .map(Palette::derive);

        let mut snapshot = Self {
            variant,
            custom_base,
            palette,
            primary: preset.primary.to_string(),
            secondary: preset.secondary.to_string(),
            accent: preset.accent.to_string(),
            header_gradient: preset.header_gradient.to_string(),
            button_gradient: preset.button_gradient.to_string(),
            main_emoji: preset.main_emoji,
            show_snow: preset.show_snow,
            show_confetti: preset.show_confetti,
        };

        if let Some(palette) = palette {
            snapshot.primary = palette.base.to_string();
            snapshot.secondary = format!("var({PRIMARY_DARKER_PROPERTY})");
            snapshot.header_gradient = format!(
                "from-[var({PRIMARY_COLOR_PROPERTY})] to-[var({PRIMARY_DARKER_PROPERTY})]"
            );
            snapshot.button_gradient = format!(
                "from-[var({PRIMARY_SLIGHTLY_DARKER_PROPERTY})] to-[var({PRIMARY_DARKER_PROPERTY})]"
            );
        }

        snapshot
    }

    /// Custom-property bindings to install. Empty means every binding is removed.
    pub fn custom_properties(&self) -> Vec<(&'static str, String)> {
        match self.palette {
            Some(palette) => vec![
                (PRIMARY_COLOR_PROPERTY, palette.base.to_string()),
                (PRIMARY_DARKER_PROPERTY, palette.darker.to_string()),
                (
                    PRIMARY_SLIGHTLY_DARKER_PROPERTY,
                    palette.slightly_darker.to_string(),
                ),
            ],
            None => Vec::new(),
        }
    }
}

/// Read-only view of the theme.
#[derive(Debug, Clone)]
pub struct ThemeHandle {
    rx: watch::Receiver<Arc<ThemeSnapshot>>,
}

impl ThemeHandle {
    pub fn current(&self) -> Arc<ThemeSnapshot> {
        self.rx.borrow().clone()
    }

    /// Waits for the next published snapshot. Returns `None` once the
    /// controller is gone.
    pub async fn changed(&mut self) -> Option<Arc<ThemeSnapshot>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

pub struct ThemeController {
    tx: watch::Sender<Arc<ThemeSnapshot>>,
}

impl Default for ThemeController {
    fn default() -> Self {
        Self::new(ThemeVariant::Default)
    }
}

impl ThemeController {
    pub fn new(variant: ThemeVariant) -> Self {
        let (tx, _) = watch::channel(Arc::new(ThemeSnapshot::build(variant, None)));
        Self { tx }
    }

    pub fn handle(&self) -> ThemeHandle {
        ThemeHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn snapshot(&self) -> Arc<ThemeSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn set_variant(&self, variant: ThemeVariant) {
        self.publish(|current| {
            (current.variant != variant).then_some((variant, current.custom_base))
        });
    }

    /// Installs a tenant color. Input without a leading `#` or that is not six
    /// hex digits is ignored; returns whether the color was accepted.
    pub fn update_base_color(&self, raw: &str) -> bool {
        let color = match HexColor::parse_prefixed(raw.trim()) {
            Ok(color) => color,
            Err(error) => {
                warn!(%error, "ignoring tenant base color");
                return false;
            }
        };
        self.publish(|current| {
            (current.custom_base != Some(color)).then_some((current.variant, Some(color)))
        });
        true
    }

    pub fn clear_base_color(&self) {
        self.publish(|current| {
            current
                .custom_base
                .is_some()
                .then_some((current.variant, None))
        });
    }

    /// Applies the branding carried by a freshly fetched organization.
    pub fn apply_organization(&self, organization: &Organization) -> bool {
        match organization.base_color.as_deref() {
            Some(raw) => self.update_base_color(raw),
            None => {
                self.clear_base_color();
                false
            }
        }
    }

    fn publish<F>(&self, next: F)
    where
        F: FnOnce(&ThemeSnapshot) -> Option<(ThemeVariant, Option<HexColor>)>,
    {
        self.tx.send_if_modified(|current| match next(current) {
            Some((variant, custom_base)) => {
                *current = Arc::new(ThemeSnapshot::build(variant, custom_base));
                debug!(
                    variant = %variant,
                    palette = current.palette.is_some(),
                    "theme snapshot published"
                );
                true
            }
            None => false,
        });
    }
}

#[cfg(test)]
#[path = "tests/theme_tests.rs"]
mod tests;
