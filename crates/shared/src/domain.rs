use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EntrantId);
id_newtype!(OrganizationId);
id_newtype!(PrizeTierId);

/// Places offered by the confirmation dialog when a tenant has no prize tiers.
pub const DEFAULT_PLACES: [u32; 3] = [1, 2, 3];

/// English ordinal for a prize place: `1st`, `2nd`, `3rd`, `4th`, `11th`, `22nd`.
pub fn ordinal(place: u32) -> String {
    let suffix = match (place % 10, place % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{place}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_handles_teens_and_larger_places() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(102), "102nd");
        assert_eq!(ordinal(111), "111th");
    }

    #[test]
    fn ids_serialize_as_bare_integers() {
        let raw = serde_json::to_string(&EntrantId(7)).expect("serialize");
        assert_eq!(raw, "7");
        let parsed: PrizeTierId = serde_json::from_str("12").expect("deserialize");
        assert_eq!(parsed, PrizeTierId(12));
    }
}
