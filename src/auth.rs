//! Credentials for the transport handshake.
//!
//! Offline mode joins with a plain username. Online mode keeps a token in a
//! JSON profile on disk and talks to the token service:
//!
//! 1. complete profile → `POST /validate`
//! 2. invalid token → `POST /refresh`
//! 3. still nothing → `POST /authenticate` with `AUTOFISH_PASSWORD`
//!
//! The profile is rewritten after every successful online login.

use std::path::Path;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AuthError;

/// What the transport needs to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub access_token: Option<String>,
    pub uuid: Option<String>,
}

impl Credentials {
    pub fn offline(username: &str) -> Self {
        Self {
            username: username.to_string(),
            access_token: None,
            uuid: None,
        }
    }
}

/// On-disk profile. Fields are declared in key order so the file is written sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(rename = "clientToken", skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl Profile {
    /// Every field needed to attempt token validation is present.
    pub fn is_complete(&self) -> bool {
        self.access_token.is_some()
            && self.client_token.is_some()
            && self.display_name.is_some()
            && self.username.is_some()
            && self.uuid.is_some()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            username: self.display_name.clone()?,
            access_token: Some(self.access_token.clone()?),
            uuid: Some(self.uuid.clone()?),
        })
    }

    /// Store a fresh token session. An existing client token is kept.
    pub fn apply(&mut self, session: &TokenSession) {
        if self.client_token.is_none() {
            self.client_token = Some(session.client_token.clone());
        }
        self.access_token = Some(session.access_token.clone());
        self.uuid = Some(session.selected_profile.id.clone());
        self.display_name = Some(session.selected_profile.name.clone());
    }
}

/// Read the profile at `path`. A missing or invalid file yields an empty profile.
pub fn read_profile(path: &Path) -> Profile {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Auth: cannot read profile {}: {e}", path.display());
            return Profile::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!("Auth: invalid JSON in {}: {e}", path.display());
        Profile::default()
    })
}

pub fn write_profile(path: &Path, profile: &Profile) -> Result<(), AuthError> {
    let write_err = |source| AuthError::WriteProfile {
        path: path.display().to_string(),
        source,
    };
    let json = serde_json::to_string_pretty(profile)
        .map_err(|e| write_err(std::io::Error::other(e)))?;
    std::fs::write(path, json).map_err(write_err)
}

/// Account profile returned by the token service.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectedProfile {
    pub id: String,
    pub name: String,
}

/// Response body of `/authenticate` and `/refresh`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSession {
    pub access_token: String,
    pub client_token: String,
    pub selected_profile: SelectedProfile,
}

/// Client for the token service.
pub struct TokenService {
    client: reqwest::Client,
    endpoint: String,
}

impl TokenService {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, AuthError> {
        self.client
            .post(format!("{}{path}", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))
    }

    /// `true` if the access token is still accepted.
    pub async fn validate(&self, access_token: &str, client_token: &str) -> Result<bool, AuthError> {
        let resp = self
            .post(
                "/validate",
                json!({"accessToken": access_token, "clientToken": client_token}),
            )
            .await?;
        Ok(resp.status() == StatusCode::NO_CONTENT || resp.status() == StatusCode::OK)
    }

    pub async fn refresh(
        &self,
        access_token: &str,
        client_token: &str,
    ) -> Result<TokenSession, AuthError> {
        let resp = self
            .post(
                "/refresh",
                json!({"accessToken": access_token, "clientToken": client_token}),
            )
            .await?;
        session_from(resp).await
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        client_token: Option<&str>,
    ) -> Result<TokenSession, AuthError> {
        let mut body = json!({
            "agent": {"name": "Minecraft", "version": 1},
            "username": username,
            "password": password,
            "requestUser": true,
        });
        if let Some(token) = client_token {
            body["clientToken"] = json!(token);
        }
        let resp = self.post("/authenticate", body).await?;
        session_from(resp).await
    }
}

async fn session_from(resp: reqwest::Response) -> Result<TokenSession, AuthError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::Rejected(format!("status {status}: {body}")));
    }
    resp.json()
        .await
        .map_err(|e| AuthError::Request(format!("invalid token response: {e}")))
}

/// Produce credentials for this run, authenticating if needed.
pub async fn obtain_credentials(config: &Config) -> Result<Credentials, AuthError> {
    if config.host.offline {
        info!("Auth: offline mode, skipping authentication");
        return Ok(Credentials::offline(&config.options.username));
    }

    let path = Path::new(&config.options.profile_path);
    let mut profile = read_profile(path);
    let service = TokenService::new(&config.auth.endpoint);
    let mut authenticated = false;

    if profile.is_complete() {
        let access = profile.access_token.clone().unwrap_or_default();
        let client = profile.client_token.clone().unwrap_or_default();
        if service.validate(&access, &client).await? {
            info!("Auth: stored token is valid");
            authenticated = true;
        } else {
            info!("Auth: stored token is invalid, attempting refresh");
            match service.refresh(&access, &client).await {
                Ok(session) => {
                    info!("Auth: token refreshed");
                    profile.apply(&session);
                    authenticated = true;
                }
                Err(e) => warn!("Auth: unable to refresh token: {e}"),
            }
        }
    }

    if !authenticated {
        let password = std::env::var("AUTOFISH_PASSWORD").map_err(|_| AuthError::MissingPassword)?;
        let username = profile
            .username
            .clone()
            .unwrap_or_else(|| config.options.username.clone());
        info!("Auth: authenticating {username} with password");
        let session = service
            .authenticate(&username, &password, profile.client_token.as_deref())
            .await?;
        profile.username = Some(username);
        profile.apply(&session);
    }

    write_profile(path, &profile)?;
    profile
        .credentials()
        .ok_or_else(|| AuthError::Rejected("token service returned an incomplete profile".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> TokenSession {
        serde_json::from_str(
            r#"{"accessToken":"new-access","clientToken":"server-client",
                "selectedProfile":{"id":"0f00","name":"Steve"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_profile_complete() {
        let mut profile = Profile {
            access_token: Some("a".into()),
            client_token: Some("c".into()),
            display_name: Some("Steve".into()),
            username: Some("steve@example.com".into()),
            uuid: Some("0f00".into()),
        };
        assert!(profile.is_complete());
        profile.uuid = None;
        assert!(!profile.is_complete());
    }

    #[test]
    fn test_apply_keeps_existing_client_token() {
        let mut profile = Profile {
            client_token: Some("mine".into()),
            ..Profile::default()
        };
        profile.apply(&session());
        assert_eq!(profile.client_token.as_deref(), Some("mine"));
        assert_eq!(profile.access_token.as_deref(), Some("new-access"));
        assert_eq!(profile.display_name.as_deref(), Some("Steve"));
    }

    #[test]
    fn test_apply_adopts_client_token_when_missing() {
        let mut profile = Profile::default();
        profile.apply(&session());
        assert_eq!(profile.client_token.as_deref(), Some("server-client"));
        let creds = profile.credentials().unwrap();
        assert_eq!(creds.username, "Steve");
        assert_eq!(creds.uuid.as_deref(), Some("0f00"));
    }

    #[test]
    fn test_profile_written_with_sorted_camel_case_keys() {
        let mut profile = Profile::default();
        profile.username = Some("steve@example.com".into());
        profile.apply(&session());

        let path = std::env::temp_dir().join(format!("autofish-profile-{}.json", std::process::id()));
        write_profile(&path, &profile).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let keys: Vec<usize> = ["accessToken", "clientToken", "displayName", "username", "uuid"]
            .iter()
            .map(|k| text.find(k).unwrap())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(read_profile(&path), profile);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_missing_profile_is_empty() {
        let profile = read_profile(Path::new("/nonexistent/autofish/profile.json"));
        assert_eq!(profile, Profile::default());
    }

    #[tokio::test]
    async fn test_offline_credentials() {
        let mut config = Config::default();
        config.host.offline = true;
        config.options.username = "testfisherman".to_string();
        let creds = obtain_credentials(&config).await.unwrap();
        assert_eq!(creds, Credentials::offline("testfisherman"));
    }
}
