//! Prize-tier selection and send-now/send-later resolution for a pending winner.

use shared::{
    domain::{ordinal, DEFAULT_PLACES},
    protocol::PrizeTier,
};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierChoice {
    pub place: u32,
    pub label: String,
    pub prize_name: Option<String>,
}

impl TierChoice {
    fn default_place(place: u32) -> Self {
        Self {
            place,
            label: format!("{} Place", ordinal(place)),
            prize_name: None,
        }
    }
}

/// Choices in ascending place order, or places 1-3 when no tier is configured.
/// Duplicate places are kept.
pub fn tier_choices(tiers: &[PrizeTier]) -> Vec<TierChoice> {
    if tiers.is_empty() {
        return DEFAULT_PLACES.into_iter().map(TierChoice::default_place).collect();
    }

    let mut sorted = tiers.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|tier| tier.place);
    if sorted.windows(2).any(|pair| pair[0].place == pair[1].place) {
        warn!("prize tiers contain duplicate places");
    }

    sorted
        .into_iter()
        .map(|tier| TierChoice {
            place: tier.place,
            label: format!("{} Place", ordinal(tier.place)),
            prize_name: Some(tier.name.clone()),
        })
        .collect()
}

/// The operator's final answer to the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub place: u32,
    pub send_now: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogError {
    #[error("a resolution is already in flight")]
    Locked,
    #[error("place {place} is not offered; choose one of {available:?}")]
    UnknownPlace { place: u32, available: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DialogState {
    Choosing { selected_place: u32 },
    InFlight(Resolution),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationDialog {
    choices: Vec<TierChoice>,
    state: DialogState,
}

impl ConfirmationDialog {
    pub fn new(mut choices: Vec<TierChoice>) -> Self {
        if choices.is_empty() {
            choices = tier_choices(&[]);
        }
        let selected_place = choices.first().map_or(1, |choice| choice.place);
        Self {
            choices,
            state: DialogState::Choosing { selected_place },
        }
    }

    pub fn choices(&self) -> &[TierChoice] {
        &self.choices
    }

    pub fn selected_place(&self) -> u32 {
        match self.state {
            DialogState::Choosing { selected_place } => selected_place,
            DialogState::InFlight(resolution) => resolution.place,
        }
    }

    pub fn in_flight(&self) -> Option<Resolution> {
        match self.state {
            DialogState::InFlight(resolution) => Some(resolution),
            DialogState::Choosing { .. } => None,
        }
    }

    pub fn select_tier(&mut self, place: u32) -> Result<(), DialogError> {
        let DialogState::Choosing { selected_place } = &mut self.state else {
            return Err(DialogError::Locked);
        };
        if !self.choices.iter().any(|choice| choice.place == place) {
            return Err(DialogError::UnknownPlace {
                place,
                available: self.choices.iter().map(|choice| choice.place).collect(),
            });
        }
        *selected_place = place;
        Ok(())
    }

    /// Moves the dialog in flight. Returns `None` if it already is, so at
    /// most one resolution is ever produced per dialog.
    pub fn begin_resolution(&mut self, send_now: bool) -> Option<Resolution> {
        let DialogState::Choosing { selected_place } = self.state else {
            return None;
        };
        let resolution = Resolution {
            place: selected_place,
            send_now,
        };
        self.state = DialogState::InFlight(resolution);
        Some(resolution)
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::{OrganizationId, PrizeTierId};

    use super::*;

    fn tier(id: i64, place: u32, name: &str) -> PrizeTier {
        PrizeTier {
            id: PrizeTierId(id),
            place,
            name: name.into(),
            description: None,
            image_url: None,
            link: None,
            organization_id: OrganizationId(1),
        }
    }

    #[test]
    fn falls_back_to_three_default_places() {
        let dialog = ConfirmationDialog::new(tier_choices(&[]));
        let places = dialog.choices().iter().map(|c| c.place).collect::<Vec<_>>();
        assert_eq!(places, vec![1, 2, 3]);
        assert_eq!(dialog.choices()[1].label, "2nd Place");
        assert_eq!(dialog.selected_place(), 1);
    }

    #[test]
    fn configured_tiers_are_sorted_and_first_is_selected() {
        let choices = tier_choices(&[
            tier(1, 3, "Mug"),
            tier(2, 2, "Gift card"),
            tier(3, 4, "Sticker"),
        ]);
        let dialog = ConfirmationDialog::new(choices);
        let places = dialog.choices().iter().map(|c| c.place).collect::<Vec<_>>();
        assert_eq!(places, vec![2, 3, 4]);
        assert_eq!(dialog.selected_place(), 2);
        assert_eq!(dialog.choices()[2].label, "4th Place");
        assert_eq!(dialog.choices()[0].prize_name.as_deref(), Some("Gift card"));
    }

    #[test]
    fn duplicate_places_are_kept() {
        let choices = tier_choices(&[tier(1, 1, "Bike"), tier(2, 1, "Scooter")]);
        assert_eq!(choices.len(), 2);
    }

    #[test]
    fn selecting_unknown_place_is_rejected() {
        let mut dialog = ConfirmationDialog::new(Vec::new());
        let err = dialog.select_tier(5).expect_err("not offered");
        assert_eq!(
            err,
            DialogError::UnknownPlace {
                place: 5,
                available: vec![1, 2, 3]
            }
        );
        assert_eq!(dialog.selected_place(), 1);
    }

    #[test]
    fn resolves_exactly_once() {
        let mut dialog = ConfirmationDialog::new(Vec::new());
        dialog.select_tier(2).expect("offered");
        dialog.select_tier(3).expect("offered");

        let first = dialog.begin_resolution(true).expect("first resolution");
        assert_eq!(
            first,
            Resolution {
                place: 3,
                send_now: true
            }
        );
        assert_eq!(dialog.begin_resolution(false), None);
        assert_eq!(dialog.in_flight(), Some(first));
        assert_eq!(dialog.select_tier(1), Err(DialogError::Locked));
        assert_eq!(dialog.selected_place(), 3);
    }
}
