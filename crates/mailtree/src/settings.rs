//! Account settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use mailtree_imap::{Config, PipelineMode, Security};
use mailtree_sasl::{Credentials, Mechanism};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the stored password.
pub const PASSWORD_ENV: &str = "MAILTREE_PASSWORD";

/// One IMAP account, as stored in `account.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AccountSettings {
    /// Server hostname.
    pub host: String,
    /// Server port; the security mode's default when absent.
    pub port: Option<u16>,
    /// Transport security.
    pub security: SecurityMode,
    /// Login name.
    pub username: String,
    /// Password for LOGIN / PLAIN.
    pub password: Option<String>,
    /// OAuth 2.0 access token; takes precedence over the password.
    pub access_token: Option<String>,
    /// SASL mechanisms in preference order, e.g. `["XOAUTH2"]`.
    pub mechanisms: Vec<String>,
    /// Pipelining: `auto`, `enabled` or `disabled`.
    pub pipelining: PipeliningMode,
    /// Seconds before IDLE is re-issued.
    pub idle_watchdog_secs: Option<u64>,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            security: SecurityMode::Tls,
            username: String::new(),
            password: None,
            access_token: None,
            mechanisms: Vec::new(),
            pipelining: PipeliningMode::Auto,
            idle_watchdog_secs: None,
        }
    }
}

/// Transport security as written in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    #[default]
    Tls,
    StartTls,
    None,
}

/// Pipelining as written in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipeliningMode {
    #[default]
    Auto,
    Enabled,
    Disabled,
}

/// Default location: `<config dir>/mailtree/account.json`.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtree")
        .join("account.json")
}

impl AccountSettings {
    /// Reads and validates the settings file.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let mut settings = Self::parse(&contents).with_context(|| format!("parsing {}", path.display()))?;
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            settings.password = Some(password);
        }
        tracing::debug!(path = %path.display(), host = %settings.host, "account settings loaded");
        Ok(settings)
    }

    fn parse(contents: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_json::from_str(contents)?;
        if settings.host.is_empty() {
            bail!("`host` is required");
        }
        if settings.username.is_empty() {
            bail!("`username` is required");
        }
        Ok(settings)
    }

    /// Connection configuration for these settings.
    pub fn config(&self) -> anyhow::Result<Config> {
        let security = match self.security {
            SecurityMode::Tls => Security::Implicit,
            SecurityMode::StartTls => Security::StartTls,
            SecurityMode::None => Security::None,
        };
        let pipelining = match self.pipelining {
            PipeliningMode::Auto => PipelineMode::Auto,
            PipeliningMode::Enabled => PipelineMode::Enabled,
            PipeliningMode::Disabled => PipelineMode::Disabled,
        };
        let mechanisms = self
            .mechanisms
            .iter()
            .map(|name| name.parse::<Mechanism>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = Config::builder(&self.host)
            .security(security)
            .pipelining(pipelining)
            .auth_mechanisms(mechanisms);
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(secs) = self.idle_watchdog_secs {
            builder = builder.idle_watchdog(Duration::from_secs(secs));
        }
        Ok(builder.build())
    }

    /// Credentials for AUTHENTICATE, preferring the access token.
    pub fn credentials(&self) -> anyhow::Result<Credentials> {
        if let Some(token) = &self.access_token {
            return Ok(Credentials::token(&self.username, token));
        }
        match &self.password {
            Some(password) => Ok(Credentials::password(&self.username, password)),
            None => bail!("no password or access token; set {PASSWORD_ENV} or add one to the settings"),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn minimal_settings_use_defaults() {
        let settings =
            AccountSettings::parse(r#"{"host": "imap.example.com", "username": "me"}"#).unwrap();
        assert_eq!(settings.security, SecurityMode::Tls);
        assert_eq!(settings.pipelining, PipeliningMode::Auto);

        let config = settings.config().unwrap();
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert!(settings.credentials().is_err());
    }

    #[test]
    fn full_settings() {
        let settings = AccountSettings::parse(
            r#"{
                "host": "mail.example.org",
                "port": 1143,
                "security": "starttls",
                "username": "me",
                "access_token": "ya29",
                "mechanisms": ["xoauth2"],
                "pipelining": "disabled",
                "idle_watchdog_secs": 600
            }"#,
        )
        .unwrap();
        let config = settings.config().unwrap();
        assert_eq!(config.port, 1143);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.pipelining, PipelineMode::Disabled);
        assert_eq!(config.auth_mechanisms, vec![Mechanism::XOAuth2]);
        assert_eq!(config.idle_watchdog, Duration::from_secs(600));
        assert!(settings.credentials().unwrap().is_token());
    }

    #[test]
    fn rejects_missing_fields_and_unknown_mechanisms() {
        assert!(AccountSettings::parse(r#"{"username": "me"}"#).is_err());
        assert!(AccountSettings::parse(r#"{"host": "h"}"#).is_err());

        let settings =
            AccountSettings::parse(r#"{"host": "h", "username": "me", "mechanisms": ["GSSAPI"]}"#)
                .unwrap();
        assert!(settings.config().is_err());
    }

    #[test]
    fn default_path_ends_in_account_json() {
        assert!(default_path().ends_with("mailtree/account.json"));
    }
}
