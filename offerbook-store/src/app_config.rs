use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// One shared namespace, supports cross-domain listing.
    #[default]
    Kv,
    /// One actor per domain, no cross-domain listing.
    Actor,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    #[serde(default)]
    pub ledger: LedgerBackend,
    #[serde(default = "default_actor_mailbox")]
    pub actor_mailbox: usize,
    /// Seconds an unused domain actor stays alive.
    #[serde(default = "default_actor_idle")]
    pub actor_idle_seconds: u64,
    #[serde(default = "default_max_actors")]
    pub max_actors: usize,
}

fn default_actor_mailbox() -> usize { 32 }

fn default_actor_idle() -> u64 { 300 }

fn default_max_actors() -> usize { 10_000 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: "redis://127.0.0.1:6379".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Bearer secret for reading and deleting offers over the API.
    pub api_token: String,
    pub admin_password: String,
    /// HMAC key for the admin session token.
    pub session_secret: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    /// Marks session cookies `Secure`; leave off for plain-HTTP development.
    #[serde(default)]
    pub secure_cookies: bool,
}

fn default_session_ttl() -> u64 { 3600 }

#[derive(Debug, Deserialize, Clone)]
pub struct CaptchaConfig {
    pub secret_key: String,
    #[serde(default = "default_verify_url")]
    pub verify_url: String,
    #[serde(default = "default_verify_timeout")]
    pub timeout_seconds: u64,
}

fn default_verify_url() -> String {
    "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string()
}

fn default_verify_timeout() -> u64 { 10 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorsConfig {
    /// Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `OFFERBOOK__AUTH__API_TOKEN=...` sets `auth.api_token`
            .add_source(config::Environment::with_prefix("OFFERBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
