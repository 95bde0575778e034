//! Cycle de vie du token OAuth de l'hôte
//!
//! [`TokenManager`] est la seule source de vérité pour la question « avons-nous
//! un token utilisable maintenant ? ». Il échange le code d'autorisation,
//! persiste les tokens dans un [`CredentialStore`] et rafraîchit
//! silencieusement le token d'accès cinq minutes avant son expiration.
//!
//! Le rafraîchissement est *single-flight* : un seul appel au service de
//! comptes est émis même si plusieurs requêtes découvrent en même temps que
//! le token expire.

use crate::error::{Result, SpotifyError};
use crate::models::{AuthStatus, TokenErrorResponse, TokenResponse};
use crate::store::{CredentialRecord, CredentialStore};
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Durée de vie supposée quand Spotify n'indique pas `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Scopes demandés lors de l'autorisation de l'hôte
pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "streaming",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-library-read",
    "user-library-modify",
];

/// Identifiants de l'application Spotify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Causes d'échec du rafraîchissement
///
/// Elles sont seulement journalisées : [`TokenManager::get_valid_token`]
/// renvoie `None` quelle que soit la cause.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("no refresh token available, host needs to re-authenticate")]
    NoRefreshToken,

    #[error("client credentials not configured")]
    MissingCredentials,

    #[error("refresh rejected ({status}): {message}")]
    RefreshRejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("refresh response carried no access_token")]
    MissingAccessToken,

    #[error("credential store error: {0}")]
    Store(anyhow::Error),
}

/// Temps courant en millisecondes depuis l'epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn expires_at_from(now_ms: i64, expires_in: Option<i64>) -> i64 {
    let expires_in = expires_in
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    now_ms.saturating_add(expires_in.saturating_mul(1000))
}

/// Gestionnaire des tokens du compte hôte
pub struct TokenManager {
    http: Client,
    accounts_url: String,
    credentials: Option<ClientCredentials>,
    store: Arc<dyn CredentialStore>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    /// Crée un gestionnaire
    ///
    /// # Arguments
    ///
    /// * `http` - Client HTTP partagé (le timeout y est configuré)
    /// * `accounts_url` - URL de base du service de comptes, sans `/` final
    /// * `credentials` - `None` si l'application n'est pas configurée
    /// * `store` - Persistance de l'enregistrement de l'hôte
    pub fn new(
        http: Client,
        accounts_url: impl Into<String>,
        credentials: Option<ClientCredentials>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            http,
            accounts_url: accounts_url.into(),
            credentials,
            store,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Client ID public, nécessaire au client web pour lancer l'autorisation
    pub fn client_id(&self) -> Result<&str> {
        self.credentials
            .as_ref()
            .map(|c| c.client_id.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SpotifyError::Configuration("Spotify Client ID not configured".into()))
    }

    fn credentials(&self) -> Result<&ClientCredentials> {
        self.credentials
            .as_ref()
            .filter(|c| !c.client_id.is_empty() && !c.client_secret.is_empty())
            .ok_or_else(|| {
                SpotifyError::Configuration(
                    "Server configuration error - missing Spotify credentials".into(),
                )
            })
    }

    fn token_endpoint(&self) -> String {
        format!("{}/api/token", self.accounts_url)
    }

    /// URL d'autorisation vers laquelle rediriger l'hôte
    pub fn authorize_url(&self, redirect_uri: &str) -> Result<String> {
        let client_id = self.client_id()?;
        let scope = SCOPES.join(" ");
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.accounts_url),
            &[
                ("client_id", client_id),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri.trim()),
                ("scope", scope.as_str()),
                ("show_dialog", "true"),
            ],
        )
        .map_err(|e| SpotifyError::Configuration(format!("Invalid accounts URL: {}", e)))?;
        Ok(url.into())
    }

    /// Renvoie un token utilisable, en le rafraîchissant si nécessaire
    ///
    /// - aucun enregistrement : `None`, sans appel réseau ;
    /// - expiration dans plus de cinq minutes : le token stocké, sans appel réseau ;
    /// - sinon : rafraîchissement, `None` en cas d'échec (jamais d'erreur,
    ///   jamais de nouvelle tentative).
    pub async fn get_valid_token(&self) -> Option<String> {
        match self.load_valid_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to read Spotify credentials: {}", e);
                None
            }
        }
    }

    /// Comme [`get_valid_token`](Self::get_valid_token), mais une erreur de
    /// lecture du stockage est propagée
    pub async fn load_valid_token(&self) -> Result<Option<String>> {
        let Some(record) = self.store.load().await? else {
            return Ok(None);
        };

        if !record.needs_refresh(now_millis()) {
            return Ok(Some(record.access_token));
        }

        debug!("Spotify token expiring, refreshing");
        match self.refresh(record).await {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!("Failed to refresh Spotify token: {}", e);
                Ok(None)
            }
        }
    }

    /// Token valide ou [`SpotifyError::Unauthenticated`]
    pub async fn require_token(&self) -> Result<String> {
        self.get_valid_token()
            .await
            .ok_or(SpotifyError::Unauthenticated)
    }

    async fn refresh(&self, stale: CredentialRecord) -> std::result::Result<String, RefreshError> {
        if stale.refresh_token.is_none() {
            return Err(RefreshError::NoRefreshToken);
        }

        let _guard = self.refresh_lock.lock().await;

        // Un autre appelant a pu rafraîchir pendant l'attente du verrou
        let record = match self.store.load().await.map_err(RefreshError::Store)? {
            Some(current) if !current.needs_refresh(now_millis()) => {
                debug!("Spotify token already refreshed by a concurrent request");
                return Ok(current.access_token);
            }
            Some(current) => current,
            None => stale,
        };

        let refresh_token = record
            .refresh_token
            .as_deref()
            .ok_or(RefreshError::NoRefreshToken)?;
        let credentials = self
            .credentials
            .as_ref()
            .filter(|c| !c.client_id.is_empty() && !c.client_secret.is_empty())
            .ok_or(RefreshError::MissingCredentials)?;

        let response = self
            .http
            .post(self.token_endpoint())
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            return Err(RefreshError::RefreshRejected {
                status: status.as_u16(),
                message: error
                    .error_description
                    .or(error.error)
                    .unwrap_or_else(|| "Token refresh failed".to_string()),
            });
        }

        let data: TokenResponse = response.json().await?;
        let access_token = data
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::MissingAccessToken)?;

        let expires_at = expires_at_from(now_millis(), data.expires_in);
        self.store
            .save(&access_token, data.refresh_token.as_deref(), expires_at)
            .await
            .map_err(RefreshError::Store)?;

        info!(
            "Spotify token refreshed, new expiry {}",
            chrono::DateTime::from_timestamp_millis(expires_at)
                .map(|d| d.to_rfc3339())
                .unwrap_or_default()
        );
        Ok(access_token)
    }

    /// Échange un code d'autorisation contre des tokens
    ///
    /// Rien n'est persisté ; voir [`authorize`](Self::authorize).
    ///
    /// # Errors
    ///
    /// - [`SpotifyError::Configuration`] si le client ID ou le secret manque
    /// - [`SpotifyError::ExchangeFailed`] avec `error_description`, sinon
    ///   `error`, sinon « Token exchange failed »
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse> {
        let credentials = self.credentials()?;

        debug!("Exchanging Spotify authorization code");
        let response = self
            .http
            .post(self.token_endpoint())
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri.trim()),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!("Token exchange request failed: {}", e);
                SpotifyError::Transport("Token exchange failed".into())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            let message = error
                .error_description
                .filter(|m| !m.is_empty())
                .or(error.error.filter(|m| !m.is_empty()))
                .unwrap_or_else(|| "Token exchange failed".to_string());
            warn!("Token exchange rejected ({}): {}", status, message);
            return Err(SpotifyError::ExchangeFailed(message));
        }

        let tokens: TokenResponse = response.json().await.map_err(|e| {
            warn!("Invalid token exchange response: {}", e);
            SpotifyError::ExchangeFailed("Token exchange failed".into())
        })?;

        if tokens.access_token.as_deref().is_none_or(str::is_empty) {
            return Err(SpotifyError::ExchangeFailed("Token exchange failed".into()));
        }
        Ok(tokens)
    }

    /// Échange le code puis persiste les tokens obtenus
    pub async fn authorize(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let tokens = self.exchange_authorization_code(code, redirect_uri).await?;
        let access_token = tokens.access_token.as_deref().unwrap_or_default();

        let expires_at = expires_at_from(now_millis(), tokens.expires_in);
        self.store
            .save(access_token, tokens.refresh_token.as_deref(), expires_at)
            .await?;

        info!(
            "Server authenticated with Spotify, token expires at {}",
            chrono::DateTime::from_timestamp_millis(expires_at)
                .map(|d| d.to_rfc3339())
                .unwrap_or_default()
        );
        Ok(tokens)
    }

    /// Persiste des tokens obtenus par un autre canal (flux côté client)
    ///
    /// Renvoie l'expiration calculée (ms depuis l'epoch) ; `expires_in` vaut
    /// une heure par défaut.
    pub async fn store_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_in: Option<i64>,
    ) -> Result<i64> {
        if access_token.is_empty() {
            return Err(SpotifyError::BadRequest("Missing access token".into()));
        }
        let expires_at = expires_at_from(now_millis(), expires_in);
        self.store
            .save(access_token, refresh_token, expires_at)
            .await?;
        info!("Host tokens stored, has refresh token: {}", refresh_token.is_some());
        Ok(expires_at)
    }

    /// État d'authentification de l'hôte
    ///
    /// Passe d'abord par [`load_valid_token`](Self::load_valid_token) : un
    /// token proche de l'expiration est rafraîchi avant d'être rapporté.
    pub async fn status(&self) -> Result<AuthStatus> {
        let token = self.load_valid_token().await?;
        let record = self.store.load().await?;

        Ok(AuthStatus {
            authenticated: token.is_some(),
            has_token: record
                .as_ref()
                .is_some_and(|r| !r.access_token.is_empty()),
            expires_at: record.map(|r| r.expires_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;

    fn manager(credentials: Option<ClientCredentials>) -> TokenManager {
        TokenManager::new(
            Client::new(),
            "https://accounts.spotify.com",
            credentials,
            Arc::new(MemoryCredentialStore::new()),
        )
    }

    #[test]
    fn test_expires_at_saturates() {
        assert_eq!(expires_at_from(1_000, Some(i64::MAX)), i64::MAX);
        assert_eq!(expires_at_from(i64::MAX - 10, Some(60)), i64::MAX);
    }

    #[test]
    fn test_expires_at_defaults_to_one_hour() {
        assert_eq!(expires_at_from(1_000, None), 1_000 + 3_600_000);
        assert_eq!(expires_at_from(1_000, Some(0)), 1_000 + 3_600_000);
        assert_eq!(expires_at_from(1_000, Some(60)), 61_000);
    }

    #[test]
    fn test_authorize_url() {
        let manager = manager(Some(ClientCredentials::new("my-client", "secret")));
        let url = manager
            .authorize_url(" https://party.example/callback ")
            .unwrap();
        let parsed = Url::parse(&url).unwrap();

        assert_eq!(parsed.path(), "/authorize");
        let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "my-client");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["redirect_uri"], "https://party.example/callback");
        assert_eq!(params["show_dialog"], "true");
        assert!(params["scope"].contains("user-modify-playback-state"));
    }

    #[test]
    fn test_client_id_unconfigured() {
        let manager = manager(None);
        let err = manager.client_id().unwrap_err();
        assert_eq!(err.to_string(), "Spotify Client ID not configured");
        assert!(manager.authorize_url("http://localhost/cb").is_err());
    }

    #[tokio::test]
    async fn test_no_record_means_no_token() {
        let manager = manager(Some(ClientCredentials::new("id", "secret")));
        assert_eq!(manager.get_valid_token().await, None);
        assert!(matches!(
            manager.require_token().await,
            Err(SpotifyError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_exchange_without_credentials_is_configuration_error() {
        let manager = manager(Some(ClientCredentials::new("id", "")));
        let err = manager
            .exchange_authorization_code("code", "http://localhost/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, SpotifyError::Configuration(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_store_tokens_and_status() {
        let manager = manager(None);
        let before = now_millis();
        let expires_at = manager
            .store_tokens("A1", Some("R1"), Some(1800))
            .await
            .unwrap();
        assert!(expires_at >= before + 1_800_000);

        let status = manager.status().await.unwrap();
        assert!(status.authenticated);
        assert!(status.has_token);
        assert_eq!(status.expires_at, Some(expires_at));

        assert!(matches!(
            manager.store_tokens("", None, None).await,
            Err(SpotifyError::BadRequest(_))
        ));
    }
}
