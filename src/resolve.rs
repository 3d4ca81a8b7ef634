//! Host address resolution.
//!
//! A [`HostTarget`] is resolved once per reconnect attempt, either directly
//! from config or by looking a realm up by name through the realms service.

use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::auth::Credentials;
use crate::config::Config;
use crate::error::ResolveError;

/// Realms rejects requests without a client version in the session cookie.
const REALMS_CLIENT_VERSION: &str = "1.13.1";

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTarget {
    pub address: String,
    pub port: u16,
}

impl fmt::Display for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Address resolution capability.
#[allow(async_fn_in_trait)]
pub trait Resolve {
    async fn resolve(&self) -> Result<HostTarget, ResolveError>;
}

/// Resolver selected by `[host] realm`.
pub enum HostResolver {
    Direct(HostTarget),
    Realm(RealmLookup),
}

impl HostResolver {
    pub fn from_config(config: &Config, credentials: &Credentials) -> Self {
        if config.host.realm {
            Self::Realm(RealmLookup::new(
                config.resolver.realms_endpoint.clone(),
                config.host.realm_name.clone().unwrap_or_default(),
                credentials.clone(),
            ))
        } else {
            Self::Direct(HostTarget {
                address: config.host.address.clone().unwrap_or_default(),
                port: config.host.port,
            })
        }
    }
}

impl Resolve for HostResolver {
    async fn resolve(&self) -> Result<HostTarget, ResolveError> {
        match self {
            Self::Direct(target) if target.address.is_empty() => Err(ResolveError::NotFound(
                "no host address configured".to_string(),
            )),
            Self::Direct(target) => Ok(target.clone()),
            Self::Realm(lookup) => lookup.resolve().await,
        }
    }
}

/// Looks up a realm's current address by name.
pub struct RealmLookup {
    client: reqwest::Client,
    endpoint: String,
    realm_name: String,
    credentials: Credentials,
}

impl RealmLookup {
    pub fn new(endpoint: String, realm_name: String, credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            realm_name,
            credentials,
        }
    }

    fn cookie(&self) -> String {
        format!(
            "sid=token:{}:{}; user={}; version={REALMS_CLIENT_VERSION}",
            self.credentials.access_token.as_deref().unwrap_or(""),
            self.credentials.uuid.as_deref().unwrap_or(""),
            self.credentials.username,
        )
    }

    async fn get_json(&self, url: &str, hint: &str) -> Result<Value, ResolveError> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::COOKIE, self.cookie())
            .send()
            .await
            .map_err(|e| ResolveError::Transient(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(ResolveError::Transient(format!(
                "request to {url} failed with status {status}: '{body}'. {hint}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| ResolveError::Transient(format!("invalid JSON from {url}: {e}")))
    }
}

impl Resolve for RealmLookup {
    async fn resolve(&self) -> Result<HostTarget, ResolveError> {
        let worlds = self
            .get_json(
                &format!("{}/worlds", self.endpoint),
                "Are you authenticated?",
            )
            .await?;
        let realm_id = find_realm(&worlds, &self.realm_name)?;
        debug!("Resolve: realm '{}' has id {realm_id}", self.realm_name);

        let join = self
            .get_json(
                &format!("{}/worlds/v1/{realm_id}/join/pc", self.endpoint),
                "Is the realm active?",
            )
            .await?;
        let address = join["address"].as_str().ok_or_else(|| {
            ResolveError::Transient(format!("key 'address' not found in realm data: '{join}'"))
        })?;
        parse_address(address)
    }
}

/// Find the id of the realm called `name` in a `/worlds` response.
fn find_realm(worlds: &Value, name: &str) -> Result<i64, ResolveError> {
    let servers = worlds["servers"].as_array().ok_or_else(|| {
        ResolveError::Transient(format!(
            "key 'servers' not found in /worlds response: '{worlds}'"
        ))
    })?;
    servers
        .iter()
        .find(|s| s["name"].as_str() == Some(name))
        .and_then(|s| s["id"].as_i64())
        .ok_or_else(|| ResolveError::NotFound(format!("Realm with name '{name}' not found")))
}

/// Split `host:port`, splitting on the last colon.
fn parse_address(address: &str) -> Result<HostTarget, ResolveError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| ResolveError::Transient(format!("realm address '{address}' has no port")))?;
    let port = port
        .parse()
        .map_err(|_| ResolveError::Transient(format!("realm address '{address}' has a bad port")))?;
    Ok(HostTarget {
        address: host.to_string(),
        port,
    })
}
