//! Per-version identifier of the primary-success event (the bobber splash sound).
//!
//! Lookup order:
//!
//! 1. `[options] primary_event_id` from config
//! 2. built-in table for released versions
//! 3. JSON cache file (`gamedata.json`, keyed by version)
//! 4. download from the data endpoint, then write the cache back

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::GameDataError;

/// Sound id of the bobber splash per released version.
const SPLASH_SOUND_IDS: &[(&str, i32)] = &[
    ("1.9", 140),
    ("1.9.1", 140),
    ("1.9.2", 140),
    ("1.9.3", 140),
    ("1.9.4", 140),
    ("1.10", 141),
    ("1.10.1", 141),
    ("1.10.2", 141),
    ("1.11", 143),
    ("1.11.1", 143),
    ("1.11.2", 143),
    ("1.12", 153),
    ("1.12.1", 153),
    ("1.12.2", 153),
    ("1.13", 184),
    ("1.13.1", 184),
    ("1.13.2", 184),
    ("1.14", 62),
    ("1.14.1", 62),
    ("1.14.2", 62),
    ("1.14.3", 62),
    ("1.14.4", 62),
    ("1.15", 73),
    ("1.15.1", 73),
    ("1.15.2", 73),
    ("1.16", 272),
    ("1.16.1", 272),
    ("1.16.2", 272),
    ("1.16.3", 272),
    ("1.16.4", 272),
];

pub fn builtin_id(version: &str) -> Option<i32> {
    SPLASH_SOUND_IDS
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, id)| *id)
}

/// `(major, minor, pre-release)` of a version string like `1.13-pre5` or `1.16.4`.
fn parse_version(version: &str) -> Option<(u32, u32, Option<u32>)> {
    let (release, pre) = match version.split_once("-pre") {
        Some((r, p)) => (r, Some(p.parse().ok()?)),
        None => (version, None),
    };
    let mut parts = release.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    if let Some(patch) = parts.next() {
        patch.parse::<u32>().ok()?;
    }
    Some((major, minor, pre))
}

/// Name of the splash sound in the data files. Renamed in 1.13-pre5.
pub fn sound_name(version: &str) -> Result<&'static str, GameDataError> {
    let unsupported = || GameDataError::UnsupportedVersion(version.to_string());
    let (major, minor, pre) = parse_version(version).ok_or_else(unsupported)?;
    if (major, minor) < (1, 9) {
        return Err(unsupported());
    }
    let renamed = match (major, minor) {
        (1, 13) => pre.is_none_or(|n| n >= 5),
        (m, n) => (m, n) > (1, 13),
    };
    Ok(if renamed {
        "entity.fishing_bobber.splash"
    } else {
        "entity.bobber.splash"
    })
}

/// Pull `[0].sounds.<sound>.id` out of a data file.
fn extract_id(body: &Value, sound: &str) -> Result<i32, GameDataError> {
    body[0]["sounds"][sound]["id"]
        .as_i64()
        .and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| GameDataError::Malformed(format!("no id for sound '{sound}'")))
}

/// Version → id cache persisted as pretty, sorted JSON.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Cache(BTreeMap<String, i32>);

impl Cache {
    /// Load the cache. Unreadable files are logged and treated as empty.
    pub fn load(path: &Path) -> Self {
        let entries = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()));
        match entries {
            Ok(map) => Self(map),
            Err(e) => {
                warn!("GameData: could not read cache {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.0).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn get(&self, version: &str) -> Option<i32> {
        self.0.get(version).copied()
    }

    pub fn insert(&mut self, version: &str, id: i32) {
        self.0.insert(version.to_string(), id);
    }
}

/// Download the id, retrying transient failures with a fixed delay.
async fn download_id(
    endpoint: &str,
    version: &str,
    sound: &str,
    attempts: u32,
    delay: Duration,
) -> Result<i32, GameDataError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{version}.json", endpoint.trim_end_matches('/'));

    for attempt in 1..=attempts {
        match client.get(&url).send().await {
            Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                return Err(GameDataError::NotPublished(version.to_string()));
            }
            Ok(resp) if resp.status().is_success() => {
                let body: Value = resp
                    .json()
                    .await
                    .map_err(|e| GameDataError::Malformed(e.to_string()))?;
                return extract_id(&body, sound);
            }
            Ok(resp) => warn!(
                "GameData: request to {url} failed with status {} (attempt {attempt}/{attempts})",
                resp.status()
            ),
            Err(e) => warn!("GameData: request to {url} failed: {e} (attempt {attempt}/{attempts})"),
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(GameDataError::Exhausted {
        version: version.to_string(),
        attempts,
    })
}

/// Resolve the primary-success identifier for the configured version.
pub async fn primary_event_id(config: &Config) -> Result<i32, GameDataError> {
    if let Some(id) = config.options.primary_event_id {
        return Ok(id);
    }

    let version = config.host.version.as_str();
    let sound = sound_name(version)?;
    if let Some(id) = builtin_id(version) {
        return Ok(id);
    }

    let path = Path::new(&config.options.gamedata_path);
    let mut cache = Cache::load(path);
    if let Some(id) = cache.get(version) {
        return Ok(id);
    }

    info!("GameData: downloading sound id for version {version}");
    let id = download_id(
        &config.gamedata.endpoint,
        version,
        sound,
        config.gamedata.download_attempts,
        Duration::from_secs(config.gamedata.retry_delay_secs),
    )
    .await?;

    cache.insert(version, id);
    if let Err(e) = cache.save(path) {
        warn!("GameData: could not write cache {}: {e}", path.display());
    }
    Ok(id)
}
