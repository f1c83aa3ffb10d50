//! OAuth2 credentials for the installed-app flow: cached token file, refresh, and
//! first-time consent through a loopback redirect.

use crate::config::AuthConfig;
use axum::{extract::Query, routing::get, Router};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path:?} is not a valid {what}: {source}")]
    Decode {
        path: PathBuf,
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0:?} has neither an \"installed\" nor a \"web\" client section")]
    ClientSecretShape(PathBuf),
    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("consent flow failed: {0}")]
    Consent(String),
}

/// The `installed` (or `web`) section of a Google OAuth client-secret file.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path).map_err(|source| AuthError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ClientSecretFile =
            serde_json::from_str(&content).map_err(|source| AuthError::Decode {
                path: path.to_path_buf(),
                what: "client secret file",
                source,
            })?;
        file.installed
            .or(file.web)
            .ok_or_else(|| AuthError::ClientSecretShape(path.to_path_buf()))
    }
}

/// Cached credentials, in the same JSON layout Google's client libraries write.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Decodes the token file as plain JSON. `Ok(None)` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, AuthError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| AuthError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| AuthError::Decode {
                path: path.to_path_buf(),
                what: "token file",
                source,
            })
    }

    pub fn save(&self, path: &Path) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| AuthError::Decode {
            path: path.to_path_buf(),
            what: "token file",
            source,
        })?;
        std::fs::write(path, json).map_err(|source| AuthError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + ChronoDuration::seconds(EXPIRY_SKEW_SECS) >= expiry,
            None => false,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty()) && !self.is_expired(now)
    }

    fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    fn apply(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        self.token = Some(response.access_token);
        self.expiry = response
            .expires_in
            .map(|secs| now + ChronoDuration::seconds(secs));
        if let Some(refresh) = response.refresh_token {
            self.refresh_token = Some(refresh);
        }
        if let Some(scope) = response.scope {
            self.scopes = scope.split_whitespace().map(str::to_string).collect();
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Produces an access token from the cached file, a refresh, or an interactive consent.
pub struct Authenticator {
    http: reqwest::Client,
    config: AuthConfig,
}

impl Authenticator {
    pub fn new(config: AuthConfig, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }

    pub async fn access_token(&self) -> Result<String, AuthError> {
        let now = Utc::now();
        let token = match StoredToken::load(&self.config.token_file)? {
            Some(stored) if stored.is_valid(now) => {
                debug!("[auth] Using cached token from {:?}", self.config.token_file);
                return Ok(stored.token.unwrap_or_default());
            }
            Some(stored) if stored.is_expired(now) && stored.can_refresh() => {
                info!("[auth] Refreshing expired access token");
                self.refresh(stored).await?
            }
            _ => {
                let secret = ClientSecret::from_file(&self.config.client_secret)?;
                self.consent(&secret).await?
            }
        };

        token.save(&self.config.token_file)?;
        Ok(token.token.unwrap_or_default())
    }

    pub async fn refresh(&self, mut stored: StoredToken) -> Result<StoredToken, AuthError> {
        let refresh_token = stored.refresh_token.clone().unwrap_or_default();
        let response = self
            .token_request(
                &stored.token_uri,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                    ("client_id", stored.client_id.as_str()),
                    ("client_secret", stored.client_secret.as_str()),
                ],
            )
            .await?;
        stored.apply(response, Utc::now());
        Ok(stored)
    }

    async fn consent(&self, secret: &ClientSecret) -> Result<StoredToken, AuthError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| AuthError::Consent(format!("cannot bind loopback listener: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Consent(e.to_string()))?
            .port();
        let redirect_uri = format!("http://localhost:{port}/");
        let state = Uuid::new_v4().simple().to_string();

        let url = authorization_url(secret, &redirect_uri, &self.config.scopes, &state)?;
        println!("Please visit this URL to authorize this application: {url}");

        let code = wait_for_code(listener, &state, self.config.consent_timeout).await?;
        let response = self
            .token_request(
                &secret.token_uri,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("client_id", secret.client_id.as_str()),
                    ("client_secret", secret.client_secret.as_str()),
                ],
            )
            .await?;

        let mut token = StoredToken {
            token: None,
            refresh_token: None,
            token_uri: secret.token_uri.clone(),
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            scopes: self.config.scopes.clone(),
            expiry: None,
        };
        token.apply(response, Utc::now());
        if !token.can_refresh() {
            warn!("[auth] No refresh token granted; consent will be needed again after expiry");
        }
        Ok(token)
    }

    async fn token_request(
        &self,
        token_uri: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let response = self.http.post(token_uri).form(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

fn authorization_url(
    secret: &ClientSecret,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<url::Url, AuthError> {
    let scope = scopes.join(" ");
    url::Url::parse_with_params(
        &secret.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secret.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| AuthError::Consent(format!("invalid auth_uri {:?}: {e}", secret.auth_uri)))
}

/// Serves the loopback redirect until one callback arrives or `timeout` elapses.
async fn wait_for_code(
    listener: TcpListener,
    expected_state: &str,
    timeout: Duration,
) -> Result<String, AuthError> {
    let (params_tx, params_rx) = oneshot::channel::<CallbackParams>();
    let params_tx = Arc::new(Mutex::new(Some(params_tx)));

    let app = Router::new()
        .route(
            "/",
            get(move |Query(params): Query<CallbackParams>| {
                let params_tx = params_tx.clone();
                async move {
                    if let Some(tx) = params_tx.lock().ok().and_then(|mut slot| slot.take()) {
                        let _ = tx.send(params);
                    }
                    "The authentication flow has completed. You may close this window."
                }
            }),
        )
        .layer(TraceLayer::new_for_http());

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = tokio::time::timeout(timeout, params_rx).await;
    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;

    let params = match outcome {
        Ok(Ok(params)) => params,
        Ok(Err(_)) => return Err(AuthError::Consent("callback server stopped".to_string())),
        Err(_) => {
            return Err(AuthError::Consent(format!(
                "no authorization response within {}s",
                timeout.as_secs()
            )))
        }
    };

    if let Some(error) = params.error {
        return Err(AuthError::Consent(format!("authorization denied: {error}")));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(AuthError::Consent("state mismatch in authorization response".to_string()));
    }
    params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::Consent("authorization response has no code".to_string()))
}
