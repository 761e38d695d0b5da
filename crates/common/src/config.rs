//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Firebase project configuration.
    pub firebase: FirebaseConfig,
    /// Session token configuration.
    pub session: SessionConfig,
    /// Cloudinary image hosting configuration.
    pub cloudinary: Option<CloudinaryConfig>,
    /// Email delivery configuration.
    pub email: Option<EmailSettings>,
    /// Push notification configuration.
    #[serde(default)]
    pub fcm: FcmConfig,
    /// Generative AI configuration.
    pub ai: Option<AiConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance (used in verification links).
    pub public_url: String,
}

/// Firebase project credentials.
///
/// The service account key authorizes Firestore, Firebase Auth and FCM calls.
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseConfig {
    /// GCP project ID.
    pub project_id: String,
    /// Path to the service-account JSON key file.
    pub credentials_path: String,
}

/// Session token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret for session JWTs.
    pub secret: String,
    /// Token lifetime in hours.
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: i64,
}

/// Cloudinary configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudinaryConfig {
    /// Cloud name.
    pub cloud_name: String,
    /// API key.
    pub api_key: String,
    /// API secret (used to sign uploads).
    pub api_secret: String,
    /// Root folder for uploads.
    #[serde(default = "default_media_folder")]
    pub folder: String,
}

/// Email provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailProviderKind {
    /// SMTP relay.
    Smtp,
    /// SendGrid HTTP API.
    Sendgrid,
}

/// Email delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    /// Which provider to use.
    pub provider: EmailProviderKind,
    /// From address.
    pub from_address: String,
    /// From display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// SMTP host (smtp provider).
    pub smtp_host: Option<String>,
    /// SMTP port (smtp provider).
    pub smtp_port: Option<u16>,
    /// SMTP username (smtp provider).
    pub smtp_username: Option<String>,
    /// SMTP password (smtp provider).
    pub smtp_password: Option<String>,
    /// SendGrid API key (sendgrid provider).
    pub sendgrid_api_key: Option<String>,
}

/// Push notification configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FcmConfig {
    /// Whether FCM push delivery is enabled.
    #[serde(default)]
    pub enabled: bool,
}

/// Generative AI configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Gemini API key.
    pub gemini_api_key: String,
    /// Model name.
    #[serde(default = "default_ai_model")]
    pub model: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

const fn default_expiry_hours() -> i64 {
    24
}

fn default_media_folder() -> String {
    "comunimapp".to_string()
}

fn default_from_name() -> String {
    "Comunimapp".to_string()
}

fn default_ai_model() -> String {
    "gemini-flash-latest".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `COMUNIMAPP_ENV`)
    /// 3. Environment variables with `COMUNIMAPP_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("COMUNIMAPP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("COMUNIMAPP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("COMUNIMAPP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
