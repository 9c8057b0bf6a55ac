//! Server configuration file.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//! rate_limit = 120
//!
//! [documents]
//! root = "/var/lib/convenios/documents"
//!
//! [notifications]
//! webhook_url = "https://hooks.example.edu/convenios"
//! timeout_secs = 5
//!
//! [[accounts]]
//! id = "admin-1"
//! token_sha256 = "<output of `convenios hash-token`>"
//! role = "admin"
//! display_name = "Agreements Office"
//! email = "convenios@example.edu"
//!
//! [[agreement_types]]
//! id = 1
//! name = "Convenio Marco"
//! template = "Agreement between {{entidad_nombre}} and the university"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use convenios_storage::AgreementTypeRecord;
use convenios_workflow::identity::StaticAccount;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub accounts: Vec<StaticAccount>,
    #[serde(default)]
    pub agreement_types: Vec<AgreementTypeConfig>,
}

/// `[server]` section. Command-line flags and environment variables
/// override these.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub port: Option<u16>,
    /// Requests per minute per client IP.
    pub rate_limit: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_root")]
    pub root: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        DocumentsConfig {
            root: default_documents_root(),
        }
    }
}

fn default_documents_root() -> PathBuf {
    PathBuf::from("documents")
}

/// `[notifications]` section. Without a webhook, notifications are logged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    pub webhook_url: Option<String>,
    /// Per-delivery webhook timeout; 5 seconds when unset.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgreementTypeConfig {
    pub id: i64,
    pub name: String,
    pub template: String,
}

impl From<AgreementTypeConfig> for AgreementTypeRecord {
    fn from(config: AgreementTypeConfig) -> Self {
        AgreementTypeRecord {
            id: config.id,
            name: config.name,
            template: config.template,
        }
    }
}

impl Config {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The configuration at `path`, or defaults when there is none.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Config::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field rules. Reports every problem, not just the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let mut account_ids = HashSet::new();
        for account in &self.accounts {
            if account.id.trim().is_empty() {
                errors.push("account with empty id".to_string());
            } else if !account_ids.insert(account.id.as_str()) {
                errors.push(format!("duplicate account id '{}'", account.id));
            }
            if !is_sha256_hex(&account.token_sha256) {
                errors.push(format!(
                    "account '{}': token_sha256 must be 64 hex characters",
                    account.id
                ));
            }
        }

        let mut type_ids = HashSet::new();
        for agreement_type in &self.agreement_types {
            if !type_ids.insert(agreement_type.id) {
                errors.push(format!("duplicate agreement type id {}", agreement_type.id));
            }
            if agreement_type.template.trim().is_empty() {
                errors.push(format!(
                    "agreement type {}: template must not be empty",
                    agreement_type.id
                ));
            }
        }

        if let Some(url) = &self.notifications.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("webhook_url '{}' must be an http(s) URL", url));
            }
        }
        if self.notifications.timeout_secs == Some(0) {
            errors.push("notifications timeout_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    pub fn has_admin(&self) -> bool {
        self.accounts
            .iter()
            .any(|a| a.role.eq_ignore_ascii_case("admin"))
    }
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
