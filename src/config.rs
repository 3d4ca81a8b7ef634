//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `AUTOFISH_ADDRESS`, `AUTOFISH_PORT`,
//!    `AUTOFISH_USERNAME`, `AUTOFISH_BRIDGE_URL`
//! 2. **Config file** — path via `--config <path>`, or `autofish.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [host]
//! address = "play.example.net"
//! port = 25565
//! version = "1.16.4"
//! offline = false
//! realm = false              # true = look the address up by realm name
//! realm_name = "My Realm"
//!
//! [options]
//! profile_path = "profile.json"
//! gamedata_path = "gamedata.json"
//! username = "fisherman"     # offline mode only
//! print_catches = false
//! greet_message = "><(((('> AFK Fishing... ><(((('>"   # "" disables
//! fish_timeout_secs = 120
//! login_timeout_secs = 30
//! # primary_event_id = 272   # skip the per-version lookup
//!
//! [idle]
//! enabled = true
//! trigger_phrase = "sleep"
//! announcement = "Type 'sleep' to log me off for 10 seconds"
//! offline_secs = 10
//!
//! [wear]
//! enabled = true
//! increment_on_timeout = 2.5
//! decrement_on_catch = 2.0
//! ceiling = 30.0
//!
//! [transport]
//! bridge_url = "ws://127.0.0.1:25600/bridge"
//!
//! [resolver]
//! realms_endpoint = "https://pc.realms.minecraft.net"
//! retry_delay_secs = 5
//!
//! [auth]
//! endpoint = "https://authserver.mojang.com"
//!
//! [gamedata]
//! endpoint = "https://pokechu22.github.io/Burger"
//! download_attempts = 5
//! retry_delay_secs = 5
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub options: OptionsConfig,
    #[serde(default)]
    pub idle: IdleConfig,
    #[serde(default)]
    pub wear: WearConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub gamedata: GameDataConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which server to join.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// Server address for direct connections. Override with `AUTOFISH_ADDRESS`.
    #[serde(default)]
    pub address: Option<String>,
    /// Server port (default 25565). Override with `AUTOFISH_PORT`.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Protocol version string (default `1.16.4`).
    #[serde(default = "default_version")]
    pub version: String,
    /// Skip authentication and join with a plain username.
    #[serde(default)]
    pub offline: bool,
    /// Look the address up through the realms service instead of `address`.
    #[serde(default)]
    pub realm: bool,
    pub realm_name: Option<String>,
}

/// Session behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionsConfig {
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
    #[serde(default = "default_gamedata_path")]
    pub gamedata_path: String,
    /// Username for offline mode. Override with `AUTOFISH_USERNAME`.
    #[serde(default = "default_username")]
    pub username: String,
    /// Log every catch at info level (default false).
    #[serde(default)]
    pub print_catches: bool,
    /// Chat line sent on join. Empty disables.
    #[serde(default = "default_greet_message")]
    pub greet_message: String,
    /// Seconds without a catch before the fallback action fires (default 120).
    #[serde(default = "default_fish_timeout")]
    pub fish_timeout_secs: f64,
    /// Seconds to wait for the join event after connecting (default 30).
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,
    /// Fixed primary-event identifier, bypassing the per-version lookup.
    pub primary_event_id: Option<i32>,
}

/// Idle-request ("log me off for a while") feature.
#[derive(Debug, Clone, Deserialize)]
pub struct IdleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Chat body that requests the pause, compared for exact equality.
    #[serde(default = "default_trigger_phrase")]
    pub trigger_phrase: String,
    /// Chat line sent on join describing the trigger phrase.
    #[serde(default = "default_announcement")]
    pub announcement: String,
    /// Seconds to stay offline after a request (default 10).
    #[serde(default = "default_offline_secs")]
    pub offline_secs: f64,
}

/// Simulated wear model used to log out before the tool breaks.
#[derive(Debug, Clone, Deserialize)]
pub struct WearConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_wear_increment")]
    pub increment_on_timeout: f64,
    #[serde(default = "default_wear_decrement")]
    pub decrement_on_catch: f64,
    #[serde(default = "default_wear_ceiling")]
    pub ceiling: f64,
}

/// Link to the protocol bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// WebSocket URL of the bridge. Override with `AUTOFISH_BRIDGE_URL`.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
}

/// Realm lookup settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_realms_endpoint")]
    pub realms_endpoint: String,
    /// Fixed delay between retries of transient failures (default 5).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

/// Token service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_endpoint")]
    pub endpoint: String,
}

/// Where per-version identifiers are downloaded from when not built in or cached.
#[derive(Debug, Clone, Deserialize)]
pub struct GameDataConfig {
    #[serde(default = "default_gamedata_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_download_attempts")]
    pub download_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    25565
}
fn default_version() -> String {
    "1.16.4".to_string()
}
fn default_profile_path() -> String {
    "profile.json".to_string()
}
fn default_gamedata_path() -> String {
    "gamedata.json".to_string()
}
fn default_username() -> String {
    "fisherman".to_string()
}
fn default_greet_message() -> String {
    "><(((('> AFK Fishing... ><(((('>".to_string()
}
fn default_fish_timeout() -> f64 {
    120.0
}
fn default_login_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_trigger_phrase() -> String {
    "sleep".to_string()
}
fn default_announcement() -> String {
    "Type 'sleep' to log me off for 10 seconds".to_string()
}
fn default_offline_secs() -> f64 {
    10.0
}
fn default_wear_increment() -> f64 {
    2.5
}
fn default_wear_decrement() -> f64 {
    2.0
}
fn default_wear_ceiling() -> f64 {
    30.0
}
fn default_bridge_url() -> String {
    "ws://127.0.0.1:25600/bridge".to_string()
}
fn default_realms_endpoint() -> String {
    "https://pc.realms.minecraft.net".to_string()
}
fn default_retry_delay() -> u64 {
    5
}
fn default_auth_endpoint() -> String {
    "https://authserver.mojang.com".to_string()
}
fn default_gamedata_endpoint() -> String {
    "https://pokechu22.github.io/Burger".to_string()
}
fn default_download_attempts() -> u32 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            version: default_version(),
            offline: false,
            realm: false,
            realm_name: None,
        }
    }
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            profile_path: default_profile_path(),
            gamedata_path: default_gamedata_path(),
            username: default_username(),
            print_catches: false,
            greet_message: default_greet_message(),
            fish_timeout_secs: default_fish_timeout(),
            login_timeout_secs: default_login_timeout(),
            primary_event_id: None,
        }
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_phrase: default_trigger_phrase(),
            announcement: default_announcement(),
            offline_secs: default_offline_secs(),
        }
    }
}

impl Default for WearConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            increment_on_timeout: default_wear_increment(),
            decrement_on_catch: default_wear_decrement(),
            ceiling: default_wear_ceiling(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            realms_endpoint: default_realms_endpoint(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoint: default_auth_endpoint(),
        }
    }
}

impl Default for GameDataConfig {
    fn default() -> Self {
        Self {
            endpoint: default_gamedata_endpoint(),
            download_attempts: default_download_attempts(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file. Otherwise looks for
    /// `autofish.toml` in the current directory, falling back to compiled
    /// defaults. The result is validated before it is returned.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = if let Some(p) = path {
            Self::from_file(p)?
        } else if Path::new("autofish.toml").exists() {
            Self::from_file("autofish.toml")?
        } else {
            Config::default()
        };

        // Env var overrides
        if let Ok(address) = std::env::var("AUTOFISH_ADDRESS") {
            config.host.address = Some(address);
        }
        if let Ok(port) = std::env::var("AUTOFISH_PORT") {
            config.host.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("AUTOFISH_PORT '{port}' is not a port")))?;
        }
        if let Ok(username) = std::env::var("AUTOFISH_USERNAME") {
            config.options.username = username;
        }
        if let Ok(url) = std::env::var("AUTOFISH_BRIDGE_URL") {
            config.transport.bridge_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Parse a TOML document without env overrides or validation.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Reject configurations that can never produce a working session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !positive(self.options.fish_timeout_secs) {
            return invalid("options.fish_timeout_secs must be positive");
        }
        if !bounded(self.options.fish_timeout_secs) {
            return invalid("options.fish_timeout_secs is too large");
        }
        if self.options.login_timeout_secs == 0 {
            return invalid("options.login_timeout_secs must be positive");
        }
        if self.options.login_timeout_secs > MAX_WAIT_SECS {
            return invalid("options.login_timeout_secs is too large");
        }
        if !bounded(self.idle.offline_secs) {
            return invalid("idle.offline_secs is too large");
        }
        if self.idle.enabled {
            if !positive(self.idle.offline_secs) {
                return invalid("idle.offline_secs must be positive");
            }
            if self.idle.trigger_phrase.is_empty() {
                return invalid("idle.trigger_phrase must not be empty");
            }
        }
        if self.wear.enabled
            && (self.wear.increment_on_timeout < 0.0
                || self.wear.decrement_on_catch < 0.0
                || self.wear.ceiling < 0.0)
        {
            return invalid("wear values must not be negative");
        }

        if self.host.realm {
            if self.host.realm_name.as_deref().is_none_or(str::is_empty) {
                return invalid("host.realm is set but host.realm_name is missing");
            }
            if self.host.offline {
                return invalid("cannot connect to a realm in offline mode");
            }
        } else if self.host.address.as_deref().is_none_or(str::is_empty) {
            return invalid("host.address is missing");
        }

        if self.host.offline && self.options.username.is_empty() {
            return invalid("offline mode requires options.username");
        }

        Ok(())
    }
}

/// Upper bound for every configured wait, one year.
const MAX_WAIT_SECS: u64 = 365 * 24 * 60 * 60;

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn bounded(secs: f64) -> bool {
    secs.is_finite() && secs <= MAX_WAIT_SECS as f64
}
