//! Deployment Configuration
//!
//! Resolves the environment-specific settings every declaration depends on
//! into a single immutable [`AppConfig`]. The value is built once per
//! assembly run and passed by reference to each composing function.
//!
//! Required values that are absent (or blank) halt assembly immediately with
//! a [`ConfigError`] naming the variable, before any declaration is produced.
//!
//! ## Example
//! ```rust
//! use auth_stack::AppConfig;
//! use std::collections::HashMap;
//!
//! let vars = HashMap::from([
//!     ("STACK_NAME", "demo"),
//!     ("APP_NAME", "app1"),
//!     ("DEPLOY_ENV", "dev"),
//!     ("AWS_REGION", "us-east-1"),
//!     ("GOOGLE_CLIENT_ID", "id.apps.googleusercontent.com"),
//!     ("GOOGLE_CLIENT_SECRET", "secret"),
//!     ("SES_FROM_ADDRESS", "no-reply@example.org"),
//!     ("MAGIC_LINK_BASE_URL", "https://login.example.org"),
//! ]);
//! let config = AppConfig::from_reader(|key| {
//!     vars.get(key).map(|v| v.to_string()).ok_or(std::env::VarError::NotPresent)
//! })
//! .unwrap();
//! assert_eq!(config.stack_id(), "demo-cognitoStack");
//! ```
use crate::validation_utils::{
    is_valid_account_id, is_valid_email, is_valid_env_name, is_valid_name_segment,
    is_valid_region,
};
use std::env::VarError;
use std::fmt;

/// Default lifetime of a magic-link challenge, in minutes.
pub const DEFAULT_CHALLENGE_TIMEOUT_MINS: u32 = 15;

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Client credentials for the Google identity provider.
#[derive(Clone, PartialEq)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Settings passed to the challenge-creation function's environment.
///
/// The signing secret is not part of this: it is a deploy-time template
/// parameter so it never appears in the rendered template.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeSettings {
    /// Verified SES sender of the magic-link mail.
    pub ses_from_address: String,
    /// Page the magic link points at.
    pub base_url: String,
    pub timeout_mins: u32,
}

/// Immutable configuration for one assembly run.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Stack name, first segment of every physical resource name.
    pub stack_name: String,

    /// App name, second segment of every physical resource name.
    pub app: String,

    /// Deployment environment label (`dev`, `prod`, ...).
    pub environment: String,

    /// Target region.
    pub region: String,

    /// Target account. When unset the provisioning engine's credentials decide.
    pub account: Option<String>,

    pub google: GoogleCredentials,

    pub challenge: ChallengeSettings,

    /// Table the post-confirmation function writes new users to.
    pub users_table: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Tests supply variables through this without touching the process
    /// environment.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let stack_name = required(&reader, "STACK_NAME")?;
        check(&stack_name, "STACK_NAME", is_valid_name_segment)?;

        let app = required(&reader, "APP_NAME")?;
        check(&app, "APP_NAME", is_valid_name_segment)?;

        let environment = required(&reader, "DEPLOY_ENV")?;
        check(&environment, "DEPLOY_ENV", is_valid_env_name)?;

        let region = optional(&reader, "AWS_REGION")
            .or_else(|| optional(&reader, "CDK_DEFAULT_REGION"))
            .ok_or_else(|| ConfigError::MissingVar("AWS_REGION".into()))?;
        check(&region, "AWS_REGION", is_valid_region)?;

        let account = optional(&reader, "AWS_ACCOUNT_ID")
            .or_else(|| optional(&reader, "CDK_DEFAULT_ACCOUNT"));
        if let Some(account) = &account {
            check(account, "AWS_ACCOUNT_ID", is_valid_account_id)?;
        }

        let google = GoogleCredentials {
            client_id: required(&reader, "GOOGLE_CLIENT_ID")?,
            client_secret: required(&reader, "GOOGLE_CLIENT_SECRET")?,
        };

        let ses_from_address = required(&reader, "SES_FROM_ADDRESS")?;
        check(&ses_from_address, "SES_FROM_ADDRESS", is_valid_email)?;

        let base_url = required(&reader, "MAGIC_LINK_BASE_URL")?;
        if !base_url.starts_with("https://") || base_url.len() <= "https://".len() {
            return Err(ConfigError::InvalidValue(
                "MAGIC_LINK_BASE_URL".into(),
                "must be an https:// URL".into(),
            ));
        }

        let timeout_mins = match optional(&reader, "MAGIC_LINK_TIMEOUT_MINS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|mins| (1..=60).contains(mins))
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "MAGIC_LINK_TIMEOUT_MINS".into(),
                        format!("expected 1-60 minutes, got {raw:?}"),
                    )
                })?,
            None => DEFAULT_CHALLENGE_TIMEOUT_MINS,
        };

        let users_table = optional(&reader, "USERS_TABLE_NAME")
            .unwrap_or_else(|| format!("{stack_name}-{app}-users"));

        Ok(Self {
            stack_name,
            app,
            environment,
            region,
            account,
            google,
            challenge: ChallengeSettings {
                ses_from_address,
                base_url,
                timeout_mins,
            },
            users_table,
        })
    }

    /// Identifier of the deployed stack.
    pub fn stack_id(&self) -> String {
        format!("{}-cognitoStack", self.stack_name)
    }
}

fn optional<F>(reader: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    reader(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required<F>(reader: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    optional(reader, key).ok_or_else(|| ConfigError::MissingVar(key.into()))
}

fn check(value: &str, key: &str, valid: fn(&str) -> bool) -> Result<(), ConfigError> {
    if valid(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(
            key.into(),
            format!("{value:?} is not allowed"),
        ))
    }
}
