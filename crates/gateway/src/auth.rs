use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use aerolens_core::config::GatewayConfig;

use crate::GatewayError;

enum AuthMode {
    Static(SecretString),
    ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: SecretString,
        scope: Option<String>,
    },
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Produces the bearer token for gateway calls. With a static token this is
/// a plain read; with client credentials it caches the issued token and
/// refreshes it once it enters the skew window. Concurrent queries share one
/// refresh through the cache lock.
pub struct TokenManager {
    mode: AuthMode,
    refresh_skew: Duration,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let auth = &config.auth;
        let mode = if auth.has_static_token() {
            AuthMode::Static(
                auth.static_token
                    .as_ref()
                    .map(|token| SecretString::from(token.expose_secret().to_string()))
                    .ok_or_else(|| GatewayError::Auth("static token missing".to_string()))?,
            )
        } else if auth.has_client_credentials() {
            AuthMode::ClientCredentials {
                token_url: auth.token_url.clone().unwrap_or_default(),
                client_id: auth.client_id.clone().unwrap_or_default(),
                client_secret: auth
                    .client_secret
                    .as_ref()
                    .map(|secret| SecretString::from(secret.expose_secret().to_string()))
                    .ok_or_else(|| GatewayError::Auth("client secret missing".to_string()))?,
                scope: auth.scope.clone(),
            }
        } else {
            return Err(GatewayError::Auth(
                "no gateway credentials configured (static token or client credentials)"
                    .to_string(),
            ));
        };

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        Ok(Self {
            mode,
            refresh_skew: Duration::seconds(auth.refresh_skew_secs as i64),
            http,
            cached: Mutex::new(None),
        })
    }

    pub async fn bearer_token(&self) -> Result<String, GatewayError> {
        match &self.mode {
            AuthMode::Static(token) => Ok(token.expose_secret().to_string()),
            AuthMode::ClientCredentials { .. } => {
                let mut cached = self.cached.lock().await;
                if let Some(entry) = cached.as_ref() {
                    if token_still_valid(entry.expires_at, self.refresh_skew, Utc::now()) {
                        return Ok(entry.token.expose_secret().to_string());
                    }
                }

                let refreshed = self.refresh().await?;
                let token = refreshed.token.expose_secret().to_string();
                *cached = Some(refreshed);
                Ok(token)
            }
        }
    }

    /// Exercised by health checks and `doctor`: proves a bearer token can be
    /// produced without issuing a tool call.
    pub async fn probe(&self) -> Result<(), GatewayError> {
        self.bearer_token().await.map(|_| ())
    }

    async fn refresh(&self) -> Result<CachedToken, GatewayError> {
        let AuthMode::ClientCredentials { token_url, client_id, client_secret, scope } = &self.mode
        else {
            return Err(GatewayError::Auth("refresh requires client credentials".to_string()));
        };

        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", client_id.clone()),
            ("client_secret", client_secret.expose_secret().to_string()),
        ];
        if let Some(scope) = scope {
            form.push(("scope", scope.clone()));
        }

        let response = self
            .http
            .post(token_url)
            .form(&form)
            .send()
            .await
            .map_err(|error| GatewayError::Auth(format!("token request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Auth(format!(
                "token endpoint returned {}: {body}",
                status.as_u16()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|error| GatewayError::Auth(format!("token response malformed: {error}")))?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in as i64);
        info!(
            event_name = "gateway.token_refreshed",
            expires_at = %expires_at.to_rfc3339(),
            "gateway access token refreshed"
        );

        Ok(CachedToken { token: token.access_token.into(), expires_at })
    }
}

/// A token is usable while `now` is still outside the skew window before
/// expiry, so a call started now will not ride an expiring token.
fn token_still_valid(expires_at: DateTime<Utc>, skew: Duration, now: DateTime<Utc>) -> bool {
    now < expires_at - skew
}
