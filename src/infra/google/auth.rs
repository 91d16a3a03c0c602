// =============================================================================
// GOOGLE API AUTHENTICATION
// =============================================================================
//
// Two ways to obtain a bearer token for the Drive/Slides APIs:
//
// 1. **Service account (non-interactive):** sign an RS256 JWT with the key
//    from `service_account.json` and exchange it at the token URI. The
//    template must be shared with the service account email.
// 2. **Delegated user (interactive):** installed-app OAuth consent flow. The
//    resulting token is persisted through a `TokenCache` so later runs skip
//    the browser round-trip; an expired token is refreshed when a refresh
//    token is available.
//
// The token cache is a trait rather than a hardcoded file path so the
// delegated flow can be tested without touching a real filesystem.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::RwLock;

/// Scopes the pipeline needs: full Drive access (copy/export/delete) and
/// Slides editing.
const SCOPES: &str =
    "https://www.googleapis.com/auth/drive https://www.googleapis.com/auth/presentations";

/// Out-of-band redirect for the installed-app flow: Google shows the
/// authorization code for the operator to paste back.
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential material is malformed: {0}")]
    Malformed(String),

    #[error("token exchange failed ({status}): {body}")]
    Exchange { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("token cache error: {0}")]
    Cache(String),

    #[error("no cached token and no OAuth client descriptor available")]
    NoCredentials,
}

/// Port for anything that can mint a bearer token for the Google APIs.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Response from Google's token endpoint, shared by both variants.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
}

async fn exchange_token(
    http: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, AuthError> {
    let response = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Exchange { status, body });
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))
}

// =============================================================================
// SERVICE ACCOUNT VARIANT
// =============================================================================

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    /// The service account email (used as issuer in the JWT).
    client_email: String,
    /// The private key in PEM format.
    private_key: String,
    /// Where to exchange the JWT for an access token.
    token_uri: String,
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Non-interactive authenticator backed by a service account key.
#[derive(Debug)]
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    http: Client,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let key: ServiceAccountKey =
            serde_json::from_str(json).map_err(|e| AuthError::Malformed(e.to_string()))?;
        Ok(Self {
            key,
            http: Client::new(),
            cached: RwLock::new(None),
        })
    }

    pub async fn from_file(path: &str) -> Result<Self, AuthError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AuthError::Malformed(format!("cannot read {}: {}", path, e)))?;
        Self::from_json(&content)
    }

    /// Reads `GOOGLE_SERVICE_ACCOUNT_KEY` (a path) or
    /// `GOOGLE_SERVICE_ACCOUNT_JSON` (inline content).
    pub async fn from_env() -> Result<Self, AuthError> {
        if let Ok(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            return Self::from_file(&path).await;
        }
        if let Ok(json) = std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
            return Self::from_json(&json);
        }
        Err(AuthError::NoCredentials)
    }

    async fn fetch_new_token(&self) -> Result<TokenResponse, AuthError> {
        let now = unix_now();

        let claims = JwtClaims {
            iss: self.key.client_email.clone(),
            scope: SCOPES.to_string(),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        let jwt =
            encode(&header, &claims, &signing_key).map_err(|e| AuthError::Malformed(e.to_string()))?;

        exchange_token(
            &self.http,
            &self.key.token_uri,
            &[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ],
        )
        .await
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                // Refresh a minute early so a token never expires mid-request.
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let response = self.fetch_new_token().await?;
        let lifetime = if response.expires_in > 0 {
            response.expires_in
        } else {
            3600
        };

        let mut cached = self.cached.write().await;
        *cached = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at: SystemTime::now() + Duration::from_secs(lifetime),
        });

        Ok(response.access_token)
    }
}

// =============================================================================
// DELEGATED USER VARIANT
// =============================================================================

/// Serialized delegated token, persisted between runs by a [`TokenCache`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) past which `access_token` is stale.
    pub expires_at: u64,
}

impl StoredToken {
    fn from_response(response: TokenResponse, previous_refresh: Option<String>) -> Self {
        let lifetime = if response.expires_in > 0 {
            response.expires_in
        } else {
            3600
        };
        Self {
            access_token: response.access_token,
            // Google omits the refresh token on renewal; keep the old one.
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at: unix_now() + lifetime,
        }
    }

    /// Stale a minute early, same margin as the service account cache.
    pub fn is_expired(&self) -> bool {
        unix_now() + 60 >= self.expires_at
    }
}

/// Storage for the delegated token - the only state this tool persists
/// across runs.
pub trait TokenCache: Send + Sync {
    fn load(&self) -> Result<Option<StoredToken>, AuthError>;
    fn save(&self, token: &StoredToken) -> Result<(), AuthError>;
}

/// `TokenCache` backed by a JSON file.
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenCache for FileTokenCache {
    fn load(&self) -> Result<Option<StoredToken>, AuthError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| AuthError::Cache(e.to_string()))?;
        let token =
            serde_json::from_str(&content).map_err(|e| AuthError::Cache(e.to_string()))?;
        Ok(Some(token))
    }

    fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        let content =
            serde_json::to_string_pretty(token).map_err(|e| AuthError::Cache(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| AuthError::Cache(e.to_string()))
    }
}

/// OAuth client descriptor - the `installed` section of the client secret
/// JSON Google hands out for desktop apps.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct OAuthClientFile {
    installed: OAuthClient,
}

/// Interactive authenticator for user-delegated access.
///
/// Token resolution order: in-memory copy, then the cache, then a refresh
/// (when a refresh token and client descriptor exist), then the interactive
/// consent flow. Fails with [`AuthError::NoCredentials`] when there is no
/// usable cached token and no client descriptor to start a flow with.
pub struct AuthorizedUserAuth {
    client_desc: Option<OAuthClient>,
    cache: Box<dyn TokenCache>,
    http: Client,
    current: RwLock<Option<StoredToken>>,
}

impl AuthorizedUserAuth {
    pub fn new(client_desc: Option<OAuthClient>, cache: Box<dyn TokenCache>) -> Self {
        Self {
            client_desc,
            cache,
            http: Client::new(),
            current: RwLock::new(None),
        }
    }

    pub async fn from_client_file(
        path: &str,
        cache: Box<dyn TokenCache>,
    ) -> Result<Self, AuthError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AuthError::Malformed(format!("cannot read {}: {}", path, e)))?;
        let file: OAuthClientFile =
            serde_json::from_str(&content).map_err(|e| AuthError::Malformed(e.to_string()))?;
        Ok(Self::new(Some(file.installed), cache))
    }

    async fn refresh(
        &self,
        client: &OAuthClient,
        refresh_token: &str,
    ) -> Result<StoredToken, AuthError> {
        let response = exchange_token(
            &self.http,
            &client.token_uri,
            &[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
        )
        .await?;

        Ok(StoredToken::from_response(
            response,
            Some(refresh_token.to_string()),
        ))
    }

    /// Runs the installed-app consent flow: print the consent URL, read the
    /// authorization code from stdin, exchange it for tokens.
    async fn consent_flow(&self, client: &OAuthClient) -> Result<StoredToken, AuthError> {
        let consent_url = reqwest::Url::parse_with_params(
            &client.auth_uri,
            &[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", REDIRECT_URI),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("access_type", "offline"),
            ],
        )
        .map_err(|e| AuthError::Malformed(e.to_string()))?;

        println!("Open this URL in a browser and authorize access:");
        println!("  {}", consent_url);
        println!("Paste the authorization code here and press Enter:");

        let code = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .map(|_| line.trim().to_string())
        })
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?
        .map_err(|e| AuthError::Transport(e.to_string()))?;

        if code.is_empty() {
            return Err(AuthError::Malformed(
                "empty authorization code".to_string(),
            ));
        }

        let response = exchange_token(
            &self.http,
            &client.token_uri,
            &[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("code", code.as_str()),
                ("redirect_uri", REDIRECT_URI),
                ("grant_type", "authorization_code"),
            ],
        )
        .await?;

        Ok(StoredToken::from_response(response, None))
    }

    async fn obtain_token(&self) -> Result<StoredToken, AuthError> {
        if let Some(stored) = self.cache.load()? {
            if !stored.is_expired() {
                return Ok(stored);
            }
            if let (Some(refresh_token), Some(client)) =
                (stored.refresh_token.as_deref(), self.client_desc.as_ref())
            {
                tracing::info!("Cached Google token expired, refreshing");
                let refreshed = self.refresh(client, refresh_token).await?;
                self.cache.save(&refreshed)?;
                return Ok(refreshed);
            }
        }

        let Some(client) = self.client_desc.as_ref() else {
            return Err(AuthError::NoCredentials);
        };

        let token = self.consent_flow(client).await?;
        self.cache.save(&token)?;
        Ok(token)
    }
}

#[async_trait]
impl AccessTokenProvider for AuthorizedUserAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        {
            let current = self.current.read().await;
            if let Some(token) = current.as_ref() {
                if !token.is_expired() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let token = self.obtain_token().await?;

        let mut current = self.current.write().await;
        *current = Some(token.clone());
        Ok(token.access_token)
    }
}
