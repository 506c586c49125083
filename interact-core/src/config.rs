use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Global configuration for the engagement core service.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub environment: Environment,
    pub http_bind: String,
    /// Emails granted the owner role. Empty means nobody resolves to owner.
    pub owner_emails: Vec<String>,
    /// Shared secret accepted from trusted service-level callers.
    pub service_token: Option<String>,
    /// Optional YAML/JSON file or directory with rule definitions to seed.
    pub rules_path: Option<PathBuf>,
    /// Upper bound for processing a single rule during orchestration.
    pub rule_timeout: Duration,
    pub rate_limit_per_minute: u64,
}

impl CoreConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = env::var("INTERACT_ENV")
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();

        let http_bind =
            env::var("INTERACT_HTTP_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let owner_emails = env::var("INTERACT_OWNER_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|email| email.trim().to_ascii_lowercase())
                    .filter(|email| !email.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let service_token = env::var("INTERACT_SERVICE_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let rules_path = env::var("INTERACT_RULES_PATH").ok().map(PathBuf::from);

        let rule_timeout_secs = match env::var("INTERACT_RULE_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|err| ConfigError::InvalidEnvVar {
                    key: "INTERACT_RULE_TIMEOUT_SECS",
                    message: err.to_string(),
                })?,
            Err(_) => 5,
        };

        let rate_limit_per_minute = match env::var("INTERACT_RATE_LIMIT_PER_MINUTE") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|err| ConfigError::InvalidEnvVar {
                    key: "INTERACT_RATE_LIMIT_PER_MINUTE",
                    message: err.to_string(),
                })?,
            Err(_) => 120,
        };

        Ok(Self {
            environment,
            http_bind,
            owner_emails,
            service_token,
            rules_path,
            rule_timeout: Duration::from_secs(rule_timeout_secs),
            rate_limit_per_minute,
        })
    }

    /// Whether the service is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}
