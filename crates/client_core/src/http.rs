//! HTTP client for the draw service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{EntrantId, PrizeTierId},
    error::ErrorBody,
    protocol::{
        Entrant, EntrantCreate, EntrantPage, EntrantUpdate, LoginRequest, NotificationResponse,
        Organization, OrganizationUpdate, PrizeTier, PrizeTierDraft, PrizeTierPatch,
        TokenResponse, WinnerNotificationRequest,
    },
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    gateway::{DrawGateway, GatewayError, NotificationReceipt},
    tenant::TenantDirectory,
};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientSetupError {
    #[error("invalid api base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Trims whitespace and trailing slashes and checks for an http(s) URL.
/// An empty value falls back to [`DEFAULT_API_BASE_URL`].
pub fn normalize_api_base_url(raw: &str) -> Result<String, ClientSetupError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_API_BASE_URL.into());
    }

    let parsed = Url::parse(trimmed).map_err(|err| ClientSetupError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ClientSetupError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {:?}", parsed.scheme()),
        });
    }
    if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
        return Err(ClientSetupError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "missing host".into(),
        });
    }

    Ok(trimmed.to_string())
}

/// Endpoints whose failures map to something other than the generic taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    RandomEntrant,
    Notify,
    Other,
}

fn classify(status: StatusCode, detail: String, endpoint: Endpoint) -> GatewayError {
    match (status, endpoint) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            GatewayError::Unauthorized { detail }
        }
        (StatusCode::NOT_FOUND, Endpoint::RandomEntrant) => {
            GatewayError::NoEligibleEntrants { detail }
        }
        (StatusCode::NOT_FOUND, _) => GatewayError::NotFound { detail },
        (_, Endpoint::Notify) => GatewayError::Delivery { detail },
        (StatusCode::CONFLICT, _) => GatewayError::Conflict { detail },
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
            GatewayError::Rejected { detail }
        }
        (status, _) => GatewayError::Server {
            status: status.as_u16(),
            detail,
        },
    }
}

async fn error_from_response(response: Response, endpoint: Endpoint) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.detail_text())
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    classify(status, detail, endpoint)
}

pub struct DrawApiClient {
    http: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl DrawApiClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientSetupError> {
        let base_url = normalize_api_base_url(&settings.api_base_url)?;
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), GatewayError> {
        let body: TokenResponse = self
            .send_json(
                self.http.post(self.url("/auth/login")).json(&LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                }),
                Endpoint::Other,
            )
            .await
            .inspect_err(|_| warn!(email, "admin login failed"))?;
        if !body.token_type.eq_ignore_ascii_case("bearer") {
            warn!(token_type = %body.token_type, "unexpected token type; using it as bearer");
        }
        self.set_token(Some(body.access_token)).await;
        info!(email, "admin session established");
        Ok(())
    }

    pub async fn logout(&self) {
        self.set_token(None).await;
    }

    /// Public feedback form submission.
    pub async fn submit_feedback(&self, entry: &EntrantCreate) -> Result<Entrant, GatewayError> {
        entry.validate().map_err(|err| GatewayError::Rejected {
            detail: err.to_string(),
        })?;
        self.send_json(
            self.http.post(self.url("/customers/")).json(entry),
            Endpoint::Other,
        )
        .await
    }

    pub async fn list_entrants(&self, skip: u32, limit: u32) -> Result<EntrantPage, GatewayError> {
        self.send_json(
            self.http
                .get(self.url("/customers/"))
                .query(&[("skip", skip), ("limit", limit)]),
            Endpoint::Other,
        )
        .await
    }

    pub async fn get_entrant(&self, id: EntrantId) -> Result<Entrant, GatewayError> {
        self.send_json(
            self.http.get(self.url(&format!("/customers/{id}"))),
            Endpoint::Other,
        )
        .await
    }

    pub async fn update_entrant(
        &self,
        id: EntrantId,
        update: &EntrantUpdate,
    ) -> Result<Entrant, GatewayError> {
        self.send_json(
            self.http
                .put(self.url(&format!("/customers/{id}")))
                .json(update),
            Endpoint::Other,
        )
        .await
    }

    pub async fn delete_entrant(&self, id: EntrantId) -> Result<(), GatewayError> {
        self.send_empty(
            self.http.delete(self.url(&format!("/customers/{id}"))),
            Endpoint::Other,
        )
        .await
    }

    pub async fn public_organization(&self, slug: &str) -> Result<Organization, GatewayError> {
        self.send_json(
            self.http
                .get(self.url(&format!("/organizations/public/{slug}"))),
            Endpoint::Other,
        )
        .await
    }

    pub async fn my_prize_tiers(&self) -> Result<Vec<PrizeTier>, GatewayError> {
        self.send_json(
            self.http.get(self.url("/organizations/me/prizes")),
            Endpoint::Other,
        )
        .await
    }

    pub async fn create_prize_tier(&self, draft: &PrizeTierDraft) -> Result<PrizeTier, GatewayError> {
        self.send_json(
            self.http
                .post(self.url("/organizations/me/prizes"))
                .json(draft),
            Endpoint::Other,
        )
        .await
    }

    pub async fn update_prize_tier(
        &self,
        id: PrizeTierId,
        patch: &PrizeTierPatch,
    ) -> Result<PrizeTier, GatewayError> {
        self.send_json(
            self.http
                .put(self.url(&format!("/organizations/me/prizes/{id}")))
                .json(patch),
            Endpoint::Other,
        )
        .await
    }

    pub async fn delete_prize_tier(&self, id: PrizeTierId) -> Result<(), GatewayError> {
        self.send_empty(
            self.http
                .delete(self.url(&format!("/organizations/me/prizes/{id}"))),
            Endpoint::Other,
        )
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        endpoint: Endpoint,
    ) -> Result<Response, GatewayError> {
        let request = match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        debug!(%status, url = %response.url(), "draw service response");
        if status.is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response, endpoint).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: Endpoint,
    ) -> Result<T, GatewayError> {
        let response = self.execute(request, endpoint).await?;
        Ok(response.json().await?)
    }

    async fn send_empty(&self, request: RequestBuilder, endpoint: Endpoint) -> Result<(), GatewayError> {
        self.execute(request, endpoint).await.map(|_| ())
    }
}

#[async_trait]
impl DrawGateway for DrawApiClient {
    async fn fetch_random_eligible(&self) -> Result<Entrant, GatewayError> {
        self.send_json(
            self.http.get(self.url("/customers/winner/random")),
            Endpoint::RandomEntrant,
        )
        .await
    }

    async fn assign_winner(
        &self,
        entrant_id: EntrantId,
        place: u32,
    ) -> Result<Entrant, GatewayError> {
        self.send_json(
            self.http
                .post(self.url(&format!("/customers/{entrant_id}/mark-winner")))
                .query(&[("winner_place", place)]),
            Endpoint::Other,
        )
        .await
    }

    async fn send_notification(
        &self,
        entrant_id: EntrantId,
        send_immediately: bool,
    ) -> Result<NotificationReceipt, GatewayError> {
        let response: NotificationResponse = self
            .send_json(
                self.http
                    .post(self.url("/customers/notify-winner"))
                    .json(&WinnerNotificationRequest {
                        entrant_id,
                        send_immediately,
                    }),
                Endpoint::Notify,
            )
            .await?;
        NotificationReceipt::from_response(response, send_immediately)
    }
}

#[async_trait]
impl TenantDirectory for DrawApiClient {
    async fn my_organization(&self) -> Result<Organization, GatewayError> {
        self.send_json(
            self.http.get(self.url("/organizations/me")),
            Endpoint::Other,
        )
        .await
    }

    async fn update_my_organization(
        &self,
        update: &OrganizationUpdate,
    ) -> Result<Organization, GatewayError> {
        self.send_json(
            self.http.put(self.url("/organizations/me")).json(update),
            Endpoint::Other,
        )
        .await
    }

    async fn public_prize_tiers(&self, slug: &str) -> Result<Vec<PrizeTier>, GatewayError> {
        self.send_json(
            self.http
                .get(self.url(&format!("/organizations/public/{slug}/prizes"))),
            Endpoint::Other,
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
