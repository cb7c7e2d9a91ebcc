use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{EntrantId, OrganizationId, PrizeTierId},
    error::ValidationError,
};

/// A submitted feedback record taking part in the draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entrant {
    pub id: EntrantId,
    pub name: String,
    pub email: String,
    pub feedback: String,
    pub is_winner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_place: Option<u32>,
    #[serde(default)]
    pub is_notified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entrant {
    /// `winner_place` is set iff `is_winner`, and `notified_at` implies `is_notified`.
    pub fn has_consistent_winner_fields(&self) -> bool {
        self.winner_place.is_some() == self.is_winner
            && (self.notified_at.is_none() || self.is_notified)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrantCreate {
    pub name: String,
    pub email: String,
    pub feedback: String,
    pub organization_slug: String,
}

impl EntrantCreate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > 255 {
            return Err(ValidationError::new(
                "name",
                "must be between 1 and 255 characters",
            ));
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(ValidationError::new("email", "is not a valid email address")),
        }
        if self.feedback.trim().is_empty() {
            return Err(ValidationError::new("feedback", "must not be empty"));
        }
        if self.organization_slug.trim().is_empty() {
            return Err(ValidationError::new("organization_slug", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntrantUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_winner: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrantPage {
    pub total: u64,
    #[serde(rename = "customers")]
    pub entrants: Vec<Entrant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerNotificationRequest {
    #[serde(rename = "customer_id")]
    pub entrant_id: EntrantId,
    pub send_immediately: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_sent_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeTier {
    pub id: PrizeTierId,
    pub place: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub organization_id: OrganizationId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrizeTierDraft {
    pub place: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrizeTierPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Tenant record. `slug` never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub slug: String,
    #[serde(default, rename = "primary_color", skip_serializing_if = "Option::is_none")]
    pub base_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "primary_color", skip_serializing_if = "Option::is_none")]
    pub base_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entrant_json() -> &'static str {
        r#"{
            "id": 7,
            "name": "Ana",
            "email": "a@x.com",
            "feedback": "Great coffee",
            "is_winner": true,
            "winner_place": 2,
            "is_notified": false,
            "notified_at": null,
            "created_at": "2026-01-05T10:00:00Z",
            "updated_at": null
        }"#
    }

    #[test]
    fn entrant_parses_service_payload() {
        let entrant: Entrant = serde_json::from_str(entrant_json()).expect("parse");
        assert_eq!(entrant.id, EntrantId(7));
        assert_eq!(entrant.winner_place, Some(2));
        assert!(entrant.has_consistent_winner_fields());
    }

    #[test]
    fn winner_place_without_winner_flag_is_inconsistent() {
        let mut entrant: Entrant = serde_json::from_str(entrant_json()).expect("parse");
        entrant.is_winner = false;
        assert!(!entrant.has_consistent_winner_fields());

        entrant.winner_place = None;
        assert!(entrant.has_consistent_winner_fields());

        entrant.notified_at = Some(entrant.created_at);
        assert!(!entrant.has_consistent_winner_fields());
    }

    #[test]
    fn organization_maps_primary_color_to_base_color() {
        let org: Organization = serde_json::from_str(
            r##"{"id":3,"name":"Cafe","slug":"cafe","primary_color":"#6366f1","logo_url":null,"created_at":"2026-01-01T00:00:00Z"}"##,
        )
        .expect("parse");
        assert_eq!(org.base_color.as_deref(), Some("#6366f1"));

        let update = OrganizationUpdate {
            base_color: Some("#112233".into()),
            ..OrganizationUpdate::default()
        };
        let raw = serde_json::to_value(&update).expect("serialize");
        assert_eq!(raw, serde_json::json!({ "primary_color": "#112233" }));
    }

    #[test]
    fn notification_request_uses_customer_id_on_the_wire() {
        let raw = serde_json::to_value(WinnerNotificationRequest {
            entrant_id: EntrantId(7),
            send_immediately: false,
        })
        .expect("serialize");
        assert_eq!(
            raw,
            serde_json::json!({ "customer_id": 7, "send_immediately": false })
        );
    }

    #[test]
    fn entrant_create_validation_rejects_bad_email() {
        let mut draft = EntrantCreate {
            name: "Ana".into(),
            email: "not-an-email".into(),
            feedback: "Lovely".into(),
            organization_slug: "cafe".into(),
        };
        let err = draft.validate().expect_err("must reject");
        assert_eq!(err.field, "email");

        draft.email = "ana@example.com".into();
        draft.validate().expect("valid");
    }
}
