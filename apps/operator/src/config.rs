use std::{fs, path::Path, time::Duration};

use client_core::{ClientSettings, ThemeVariant};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base_url: String,
    pub organization_slug: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub request_timeout_secs: u64,
    pub spin_duration_ms: u64,
    pub theme: ThemeVariant,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: client_core::http::DEFAULT_API_BASE_URL.into(),
            organization_slug: None,
            admin_email: None,
            admin_password: None,
            request_timeout_secs: 10,
            spin_duration_ms: 3000,
            theme: ThemeVariant::Default,
        }
    }
}

impl Settings {
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            api_base_url: self.api_base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn spin_duration(&self) -> Duration {
        Duration::from_millis(self.spin_duration_ms)
    }
}

/// Keys accepted in `operator.toml`. The admin password is only read from the
/// environment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_base_url: Option<String>,
    organization_slug: Option<String>,
    admin_email: Option<String>,
    request_timeout_secs: Option<u64>,
    spin_duration_ms: Option<u64>,
    theme: Option<String>,
}

pub fn load_settings(path: &Path) -> Settings {
    load_settings_with(path, |key| std::env::var(key).ok())
}

fn load_settings_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(err) => warn!(path = %path.display(), %err, "ignoring unreadable config file"),
        }
    }

    apply_env(&mut settings, lookup);
    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.organization_slug {
        settings.organization_slug = Some(v);
    }
    if let Some(v) = file_cfg.admin_email {
        settings.admin_email = Some(v);
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.spin_duration_ms {
        settings.spin_duration_ms = v;
    }
    if let Some(v) = file_cfg.theme {
        set_theme(settings, &v);
    }
}

/// Plain names first, then `APP__` names so the prefixed form wins.
fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let pick = |plain: &str, prefixed: &str| lookup(prefixed).or_else(|| lookup(plain));

    if let Some(v) = pick("API_BASE_URL", "APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = pick("ORGANIZATION_SLUG", "APP__ORGANIZATION_SLUG") {
        settings.organization_slug = Some(v);
    }
    if let Some(v) = pick("ADMIN_EMAIL", "APP__ADMIN_EMAIL") {
        settings.admin_email = Some(v);
    }
    if let Some(v) = pick("ADMIN_PASSWORD", "APP__ADMIN_PASSWORD") {
        settings.admin_password = Some(v);
    }
    if let Some(v) = pick("REQUEST_TIMEOUT_SECS", "APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(_) => warn!(value = %v, "ignoring non-numeric request timeout"),
        }
    }
    if let Some(v) = pick("SPIN_DURATION_MS", "APP__SPIN_DURATION_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.spin_duration_ms = parsed,
            Err(_) => warn!(value = %v, "ignoring non-numeric spin duration"),
        }
    }
    if let Some(v) = pick("THEME", "APP__THEME") {
        set_theme(settings, &v);
    }
}

fn set_theme(settings: &mut Settings, raw: &str) {
    match raw.parse::<ThemeVariant>() {
        Ok(theme) => settings.theme = theme,
        Err(err) => warn!(%err, "keeping theme {}", settings.theme),
    }
}
