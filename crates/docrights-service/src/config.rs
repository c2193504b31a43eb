//! Service configuration.
//!
//! Provides centralized configuration for the engine identity, the staging
//! folders, the rights-code table and outbound notification. Configuration is
//! loaded from environment variables with defaults suitable for local
//! development.

use docrights_auth::ClientCredentialsConfig;
use docrights_model::RightsCodeTable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Rights map used when `DOCRIGHTS_RIGHTS_MAP` is not set.
pub const DEFAULT_RIGHTS_MAP: &str = "1=VIEW,2=EDIT,3=PRINT,4=EXTRACT,5=EXPORT,6=COMMENT";

/// Resource the protection engine authenticates against.
pub const DEFAULT_ENGINE_RESOURCE: &str = "https://api.aadrm.com";

/// Resource the mail notifier authenticates against.
pub const DEFAULT_GRAPH_RESOURCE: &str = "https://graph.microsoft.com";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// What to do when the configured label is not in the engine's catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingLabelPolicy {
    /// Apply protection without a label.
    #[default]
    Proceed,
    /// Fail the request before touching the document.
    Fail,
}

impl std::str::FromStr for MissingLabelPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proceed" => Ok(MissingLabelPolicy::Proceed),
            "fail" => Ok(MissingLabelPolicy::Fail),
            other => Err(ConfigError::InvalidValue {
                key: "DOCRIGHTS_MISSING_LABEL_POLICY".to_string(),
                message: format!("expected 'proceed' or 'fail', got '{}'", other),
            }),
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// App registration used for engine and mail tokens.
    pub identity: ClientCredentialsConfig,

    /// Protection engine settings.
    pub engine: EngineConfig,

    /// Staging folders and retention.
    pub staging: StagingConfig,

    /// Rights code to capability table.
    pub rights: RightsCodeTable,

    /// Outbound notification.
    pub notification: NotificationConfig,
}

/// Protection engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub engine_id: String,

    /// Engine state cache.
    pub cache_path: PathBuf,

    /// Resource the engine requests tokens for.
    pub resource: String,

    /// Service account. Default owner and delegated identity; also sends mail
    /// unless a sender is configured.
    pub service_account: String,

    /// Label applied on protect, matched by exact name.
    pub label_to_apply: String,

    pub missing_label_policy: MissingLabelPolicy,

    /// Deadline covering handle open through final commit.
    pub deadline_secs: u64,
}

/// Staging folders and retention defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Where request payloads are written.
    pub input_dir: PathBuf,

    /// Where protected outputs are committed.
    pub protected_dir: PathBuf,

    /// Where unprotected outputs are committed.
    pub unprotected_dir: PathBuf,

    pub retain_input: bool,
    pub retain_output: bool,

    /// Lowercase extensions including the dot, e.g. `.exe`.
    pub unsupported_extensions: Vec<String>,
}

/// Outbound notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,

    /// Mailbox messages are sent from; the service account when unset.
    #[serde(default)]
    pub sender: Option<String>,

    /// Mail API base URL.
    pub graph_base_url: String,

    /// Resource the notifier requests tokens for.
    pub graph_resource: String,

    pub subject_prefix: String,

    /// Body with `{fileName}` and `{action}` placeholders.
    pub body_template: String,

    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ServiceConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            identity: ClientCredentialsConfig::default(),
            engine: EngineConfig {
                app_id: String::new(),
                app_name: "docrights".to_string(),
                app_version: env!("CARGO_PKG_VERSION").to_string(),
                engine_id: "docrights-engine".to_string(),
                cache_path: PathBuf::from("data/cache"),
                resource: DEFAULT_ENGINE_RESOURCE.to_string(),
                service_account: "protection-service@localhost".to_string(),
                label_to_apply: "Confidential".to_string(),
                missing_label_policy: MissingLabelPolicy::Proceed,
                deadline_secs: 120,
            },
            staging: StagingConfig {
                input_dir: PathBuf::from("data/input"),
                protected_dir: PathBuf::from("data/protected"),
                unprotected_dir: PathBuf::from("data/unprotected"),
                retain_input: false,
                retain_output: false,
                unsupported_extensions: normalize_extensions(".exe,.dll,.bat,.cmd,.msi"),
            },
            rights: RightsCodeTable::parse(DEFAULT_RIGHTS_MAP).unwrap_or_default(),
            notification: NotificationConfig {
                enabled: false,
                sender: None,
                graph_base_url: "https://graph.microsoft.com".to_string(),
                graph_resource: DEFAULT_GRAPH_RESOURCE.to_string(),
                subject_prefix: "Notification - ".to_string(),
                body_template: "The file {fileName} has been {action}.".to_string(),
                timeout_secs: 30,
                max_retries: 3,
            },
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DOCRIGHTS_AUTH_INSTANCE`, `DOCRIGHTS_TENANT_ID`, `DOCRIGHTS_CLIENT_ID`,
    ///   `DOCRIGHTS_CLIENT_SECRET`, `DOCRIGHTS_SCOPES`: app registration
    /// - `DOCRIGHTS_APP_ID`, `DOCRIGHTS_APP_NAME`, `DOCRIGHTS_APP_VERSION`,
    ///   `DOCRIGHTS_ENGINE_ID`, `DOCRIGHTS_CACHE_PATH`, `DOCRIGHTS_ENGINE_RESOURCE`
    /// - `DOCRIGHTS_SERVICE_ACCOUNT`: default owner and delegated identity
    /// - `DOCRIGHTS_LABEL`: label to apply (default: Confidential)
    /// - `DOCRIGHTS_MISSING_LABEL_POLICY`: `proceed` or `fail` (default: proceed)
    /// - `DOCRIGHTS_DEADLINE_SECS`: workflow deadline (default: 120)
    /// - `DOCRIGHTS_INPUT_DIR`, `DOCRIGHTS_PROTECTED_DIR`, `DOCRIGHTS_UNPROTECTED_DIR`
    /// - `DOCRIGHTS_RETAIN_INPUT`, `DOCRIGHTS_RETAIN_OUTPUT` (default: false)
    /// - `DOCRIGHTS_UNSUPPORTED_EXTENSIONS`: e.g. `.exe,.dll`
    /// - `DOCRIGHTS_RIGHTS_MAP`: e.g. `1=VIEW,2=EDIT,3=PRINT`
    /// - `DOCRIGHTS_SEND_EMAIL` (default: false), `DOCRIGHTS_MAIL_SENDER`, `DOCRIGHTS_GRAPH_URL`,
    ///   `DOCRIGHTS_GRAPH_RESOURCE`, `DOCRIGHTS_MAIL_SUBJECT_PREFIX`,
    ///   `DOCRIGHTS_MAIL_BODY`, `DOCRIGHTS_MAIL_TIMEOUT_SECS`, `DOCRIGHTS_MAIL_RETRIES`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let string = |key: &str, fallback: String| lookup(key).unwrap_or(fallback);
        let path = |key: &str, fallback: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(fallback);
        let flag = |key: &str, fallback: bool| {
            lookup(key)
                .map(|s| {
                    let s = s.trim().to_ascii_lowercase();
                    s == "true" || s == "1" || s == "yes"
                })
                .unwrap_or(fallback)
        };

        let rights = match lookup("DOCRIGHTS_RIGHTS_MAP") {
            Some(spec) => RightsCodeTable::parse(&spec).map_err(|e| ConfigError::InvalidValue {
                key: "DOCRIGHTS_RIGHTS_MAP".to_string(),
                message: e.to_string(),
            })?,
            None => default.rights,
        };

        let missing_label_policy = match lookup("DOCRIGHTS_MISSING_LABEL_POLICY") {
            Some(value) => value.parse()?,
            None => default.engine.missing_label_policy,
        };

        Ok(Self {
            identity: ClientCredentialsConfig {
                instance: string("DOCRIGHTS_AUTH_INSTANCE", default.identity.instance),
                tenant_id: string("DOCRIGHTS_TENANT_ID", default.identity.tenant_id),
                client_id: string("DOCRIGHTS_CLIENT_ID", default.identity.client_id),
                client_secret: string("DOCRIGHTS_CLIENT_SECRET", default.identity.client_secret),
                scopes: lookup("DOCRIGHTS_SCOPES")
                    .map(|s| docrights_model::split_list(&s))
                    .unwrap_or(default.identity.scopes),
            },
            engine: EngineConfig {
                app_id: string("DOCRIGHTS_APP_ID", default.engine.app_id),
                app_name: string("DOCRIGHTS_APP_NAME", default.engine.app_name),
                app_version: string("DOCRIGHTS_APP_VERSION", default.engine.app_version),
                engine_id: string("DOCRIGHTS_ENGINE_ID", default.engine.engine_id),
                cache_path: path("DOCRIGHTS_CACHE_PATH", default.engine.cache_path),
                resource: string("DOCRIGHTS_ENGINE_RESOURCE", default.engine.resource),
                service_account: string("DOCRIGHTS_SERVICE_ACCOUNT", default.engine.service_account),
                label_to_apply: string("DOCRIGHTS_LABEL", default.engine.label_to_apply),
                missing_label_policy,
                deadline_secs: parse_or(&lookup, "DOCRIGHTS_DEADLINE_SECS", default.engine.deadline_secs)?,
            },
            staging: StagingConfig {
                input_dir: path("DOCRIGHTS_INPUT_DIR", default.staging.input_dir),
                protected_dir: path("DOCRIGHTS_PROTECTED_DIR", default.staging.protected_dir),
                unprotected_dir: path("DOCRIGHTS_UNPROTECTED_DIR", default.staging.unprotected_dir),
                retain_input: flag("DOCRIGHTS_RETAIN_INPUT", default.staging.retain_input),
                retain_output: flag("DOCRIGHTS_RETAIN_OUTPUT", default.staging.retain_output),
                unsupported_extensions: lookup("DOCRIGHTS_UNSUPPORTED_EXTENSIONS")
                    .map(|s| normalize_extensions(&s))
                    .unwrap_or(default.staging.unsupported_extensions),
            },
            rights,
            notification: NotificationConfig {
                enabled: flag("DOCRIGHTS_SEND_EMAIL", default.notification.enabled),
                sender: lookup("DOCRIGHTS_MAIL_SENDER")
                    .filter(|s| !s.trim().is_empty())
                    .or(default.notification.sender),
                graph_base_url: string("DOCRIGHTS_GRAPH_URL", default.notification.graph_base_url),
                graph_resource: string("DOCRIGHTS_GRAPH_RESOURCE", default.notification.graph_resource),
                subject_prefix: string(
                    "DOCRIGHTS_MAIL_SUBJECT_PREFIX",
                    default.notification.subject_prefix,
                ),
                body_template: string("DOCRIGHTS_MAIL_BODY", default.notification.body_template),
                timeout_secs: parse_or(
                    &lookup,
                    "DOCRIGHTS_MAIL_TIMEOUT_SECS",
                    default.notification.timeout_secs,
                )?,
                max_retries: parse_or(&lookup, "DOCRIGHTS_MAIL_RETRIES", default.notification.max_retries)?,
            },
        })
    }

    /// Workflow deadline as a Duration.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.engine.deadline_secs)
    }

    /// Mailbox notifications are sent from.
    pub fn mail_sender(&self) -> &str {
        self.notification
            .sender
            .as_deref()
            .unwrap_or(&self.engine.service_account)
    }

    /// Mail request timeout as a Duration.
    pub fn mail_timeout(&self) -> Duration {
        Duration::from_secs(self.notification.timeout_secs)
    }

    /// Validate the settings every deployment needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.service_account.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("DOCRIGHTS_SERVICE_ACCOUNT".to_string()));
        }
        for (key, dir) in [
            ("DOCRIGHTS_INPUT_DIR", &self.staging.input_dir),
            ("DOCRIGHTS_PROTECTED_DIR", &self.staging.protected_dir),
            ("DOCRIGHTS_UNPROTECTED_DIR", &self.staging.unprotected_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::MissingEnvVar(key.to_string()));
            }
        }
        if self.rights.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "DOCRIGHTS_RIGHTS_MAP".to_string(),
                message: "rights map has no entries".to_string(),
            });
        }
        if self.engine.deadline_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DOCRIGHTS_DEADLINE_SECS".to_string(),
                message: "deadline must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Validate that all required configuration is present for production.
    ///
    /// In production the app registration credentials must be configured.
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.identity.tenant_id.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("DOCRIGHTS_TENANT_ID".to_string()));
        }
        if self.identity.client_id.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("DOCRIGHTS_CLIENT_ID".to_string()));
        }
        if self.identity.client_secret.is_empty() {
            return Err(ConfigError::MissingEnvVar("DOCRIGHTS_CLIENT_SECRET".to_string()));
        }
        if self.engine.app_id.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("DOCRIGHTS_APP_ID".to_string()));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, fallback: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(fallback),
    }
}

/// Parse a comma-separated extension list into lowercase `.ext` entries.
pub fn normalize_extensions(list: &str) -> Vec<String> {
    docrights_model::split_list(list)
        .into_iter()
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            }
        })
        .collect()
}
