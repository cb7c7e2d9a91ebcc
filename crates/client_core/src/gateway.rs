//! Remote operations the draw workflow depends on.

use async_trait::async_trait;
use shared::{
    domain::EntrantId,
    protocol::{Entrant, NotificationResponse},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("no eligible entrants: {detail}")]
    NoEligibleEntrants { detail: String },
    #[error("not found: {detail}")]
    NotFound { detail: String },
    #[error("conflict: {detail}")]
    Conflict { detail: String },
    #[error("unauthorized: {detail}")]
    Unauthorized { detail: String },
    #[error("request rejected: {detail}")]
    Rejected { detail: String },
    #[error("notification delivery failed: {detail}")]
    Delivery { detail: String },
    #[error("server error {status}: {detail}")]
    Server { status: u16, detail: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    pub fn detail(&self) -> &str {
        match self {
            GatewayError::NoEligibleEntrants { detail }
            | GatewayError::NotFound { detail }
            | GatewayError::Conflict { detail }
            | GatewayError::Unauthorized { detail }
            | GatewayError::Rejected { detail }
            | GatewayError::Delivery { detail }
            | GatewayError::Server { detail, .. } => detail,
            GatewayError::Transport(detail) => detail,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, GatewayError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        GatewayError::Transport(value.to_string())
    }
}

/// Result of a notification request that the service accepted.
///
/// `delivered == false` is the deferred ("send later") outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReceipt {
    pub delivered: bool,
    pub recipient: Option<String>,
    pub message: String,
}

impl NotificationReceipt {
    pub fn delivered_to(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            delivered: true,
            recipient: Some(recipient.into()),
            message: message.into(),
        }
    }

    pub fn deferred(message: impl Into<String>) -> Self {
        Self {
            delivered: false,
            recipient: None,
            message: message.into(),
        }
    }

    /// Interprets the service response for a request made with `send_immediately`.
    pub fn from_response(
        response: NotificationResponse,
        send_immediately: bool,
    ) -> Result<Self, GatewayError> {
        if !response.success {
            return Err(GatewayError::Delivery {
                detail: response.message,
            });
        }
        Ok(Self {
            delivered: send_immediately && response.email_sent_to.is_some(),
            recipient: response.email_sent_to,
            message: response.message,
        })
    }
}

#[async_trait]
pub trait DrawGateway: Send + Sync {
    /// Picks a random entrant that has not won yet. Successive calls may
    /// return different entrants.
    async fn fetch_random_eligible(&self) -> Result<Entrant, GatewayError>;

    /// Records `entrant_id` as the winner of `place`. Not assumed idempotent.
    async fn assign_winner(&self, entrant_id: EntrantId, place: u32)
        -> Result<Entrant, GatewayError>;

    async fn send_notification(
        &self,
        entrant_id: EntrantId,
        send_immediately: bool,
    ) -> Result<NotificationReceipt, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsuccessful_response_is_a_delivery_error() {
        let err = NotificationReceipt::from_response(
            NotificationResponse {
                success: false,
                message: "SMTP refused".into(),
                email_sent_to: None,
            },
            true,
        )
        .expect_err("must fail");
        assert_eq!(
            err,
            GatewayError::Delivery {
                detail: "SMTP refused".into()
            }
        );
    }

    #[test]
    fn deferred_request_is_never_reported_as_delivered() {
        let receipt = NotificationReceipt::from_response(
            NotificationResponse {
                success: true,
                message: "Notification queued".into(),
                email_sent_to: Some("a@x.com".into()),
            },
            false,
        )
        .expect("success");
        assert!(!receipt.delivered);
        assert_eq!(receipt.message, "Notification queued");
    }

    #[test]
    fn immediate_request_with_recipient_is_delivered() {
        let receipt = NotificationReceipt::from_response(
            NotificationResponse {
                success: true,
                message: "sent".into(),
                email_sent_to: Some("a@x.com".into()),
            },
            true,
        )
        .expect("success");
        assert_eq!(receipt, NotificationReceipt::delivered_to("a@x.com", "sent"));
    }
}
