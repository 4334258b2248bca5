use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub studio: StudioConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Maximum age of a signed webhook timestamp, in seconds.
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StudioConfig {
    /// How long a waitlist offer stays claimable once extended.
    #[serde(default = "default_offer_window")]
    pub offer_window_hours: i64,
}

fn default_currency() -> String {
    "nok".to_string()
}

fn default_signature_tolerance() -> i64 {
    300
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "Shala <no-reply@shala.local>".to_string()
}

fn default_offer_window() -> i64 {
    24
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            enabled: false,
            currency: default_currency(),
            signature_tolerance_secs: default_signature_tolerance(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
        }
    }
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            offer_window_hours: default_offer_window(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://shala.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("stripe.enabled", false)?
            .set_default("email.enabled", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with SHALA__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("SHALA").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://shala.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            stripe: StripeConfig::default(),
            email: EmailConfig::default(),
            studio: StudioConfig::default(),
        }
    }
}
