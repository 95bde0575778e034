//! Client Spotify de haut niveau
//!
//! [`SpotifyClient`] combine le [`TokenManager`] et les adaptateurs de
//! [`SpotifyApi`] : chaque opération obtient d'abord un token valide, puis
//! délègue à l'adaptateur correspondant.
//!
//! # Exemple
//!
//! ```no_run
//! use jbxspotify::SpotifyClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SpotifyClient::from_config(jbxconfig::get_config())?;
//!
//!     for track in client.search("daft punk").await? {
//!         println!("{} - {}", track.artist_names(), track.name);
//!     }
//!     Ok(())
//! }
//! ```

use crate::api::player::pick_active_device;
use crate::api::{SpotifyApi, GET_QUEUE_FAILED, VOLUME_FAILED};
use crate::auth::{ClientCredentials, TokenManager};
use crate::config_ext::{
    ClearQueueMode, SpotifyConfigExt, DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL, DEFAULT_SEARCH_LIMIT,
    DEFAULT_TIMEOUT_SECS,
};
use crate::error::{Result, SpotifyError};
use crate::models::{Device, QueueSnapshot, Track};
use crate::store::{ConfigCredentialStore, CredentialStore, MemoryCredentialStore};
use jbxconfig::Config;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("Jukebox/", env!("CARGO_PKG_VERSION"), " (jbxspotify)");

/// Volume supposé quand l'appareil n'en rapporte pas
pub const DEFAULT_VOLUME: u32 = 50;

/// Client Spotify du compte hôte
pub struct SpotifyClient {
    pub(crate) auth: TokenManager,
    pub(crate) api: SpotifyApi,
    search_limit: u32,
    pub(crate) clear_queue_mode: ClearQueueMode,
}

impl SpotifyClient {
    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Crée un client depuis la configuration
    ///
    /// Les credentials de l'hôte sont persistés dans le même fichier. Un
    /// client ID ou un secret manquant n'est pas une erreur ici : les routes
    /// qui en ont besoin répondent alors par une erreur de configuration.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let credentials = match (
            config.get_spotify_client_id(),
            config.get_spotify_client_secret(),
        ) {
            (Ok(id), Ok(secret)) => Some(ClientCredentials::new(id, secret)),
            (Ok(id), Err(e)) => {
                warn!("Spotify client secret unavailable: {}", e);
                Some(ClientCredentials::new(id, ""))
            }
            (Err(e), _) => {
                warn!("Spotify application not configured: {}", e);
                None
            }
        };

        let mut builder = Self::builder()
            .accounts_url(config.get_spotify_accounts_url())
            .api_url(config.get_spotify_api_url())
            .timeout(config.get_spotify_request_timeout())
            .search_limit(config.get_spotify_search_limit())
            .clear_queue_mode(config.get_spotify_clear_queue_mode())
            .store(Arc::new(ConfigCredentialStore::new(config)));
        if let Some(credentials) = credentials {
            builder = builder.credentials(credentials);
        }
        builder.build()
    }

    pub fn auth(&self) -> &TokenManager {
        &self.auth
    }

    pub fn api(&self) -> &SpotifyApi {
        &self.api
    }

    pub fn search_limit(&self) -> u32 {
        self.search_limit
    }

    pub fn clear_queue_mode(&self) -> ClearQueueMode {
        self.clear_queue_mode
    }

    /// Token valide, sinon [`SpotifyError::Unauthenticated`]
    pub async fn ensure_authenticated(&self) -> Result<String> {
        self.auth.require_token().await
    }

    /// Recherche des pistes (limite configurée, 20 par défaut)
    pub async fn search(&self, query: &str) -> Result<Vec<Track>> {
        let token = self.ensure_authenticated().await?;
        if query.trim().is_empty() {
            return Err(SpotifyError::BadRequest("Missing query".into()));
        }
        self.api
            .search_tracks(&token, query, self.search_limit)
            .await
    }

    /// Ajoute une piste à la file, par URI ou par nom
    ///
    /// Un nom est résolu par une recherche limitée à un résultat ; l'URI
    /// l'emporte si les deux sont fournis. Renvoie l'URI ajoutée.
    ///
    /// # Errors
    ///
    /// - [`SpotifyError::BadRequest`] si ni URI ni nom n'est fourni
    /// - [`SpotifyError::NotFound`] si la recherche par nom est vide ; aucun
    ///   ajout n'est alors tenté
    pub async fn add_to_queue(&self, uri: Option<&str>, song_name: Option<&str>) -> Result<String> {
        let token = self.ensure_authenticated().await?;

        let uri = uri.map(str::trim).filter(|u| !u.is_empty());
        let song_name = song_name.map(str::trim).filter(|n| !n.is_empty());

        let track_uri = match (uri, song_name) {
            (Some(uri), _) => uri.to_string(),
            (None, Some(name)) => {
                let found = self.api.search_tracks(&token, name, 1).await?;
                match found.into_iter().next() {
                    Some(track) => track.uri,
                    None => return Err(SpotifyError::NotFound(format!("Song not found: {}", name))),
                }
            }
            (None, None) => {
                return Err(SpotifyError::BadRequest(
                    "Missing track URI or song name".into(),
                ));
            }
        };

        self.api.add_to_queue(&token, &track_uri).await?;
        info!("Queued {}", track_uri);
        Ok(track_uri)
    }

    pub async fn play(&self) -> Result<()> {
        let token = self.ensure_authenticated().await?;
        self.api.play(&token).await
    }

    pub async fn pause(&self) -> Result<()> {
        let token = self.ensure_authenticated().await?;
        self.api.pause(&token).await
    }

    pub async fn next(&self) -> Result<()> {
        let token = self.ensure_authenticated().await?;
        self.api.next(&token).await
    }

    /// Ajuste le volume de `delta` points et renvoie le volume calculé
    ///
    /// L'échec de l'appel set-volume est seulement journalisé : la valeur
    /// calculée est renvoyée quoi qu'il arrive.
    pub async fn adjust_volume(&self, delta: Option<i64>) -> Result<u32> {
        let token = self.ensure_authenticated().await?;
        let delta = delta.ok_or_else(|| SpotifyError::BadRequest("Missing delta".into()))?;

        let state = self
            .api
            .playback_state(&token, VOLUME_FAILED)
            .await?
            .ok_or(SpotifyError::NoActivePlayback)?;

        let current = state
            .device
            .and_then(|d| d.volume_percent)
            .unwrap_or(DEFAULT_VOLUME);
        let volume = clamp_volume(current, delta);

        if let Err(e) = self.api.set_volume(&token, volume).await {
            warn!("Set volume to {} failed: {}", volume, e);
        }
        Ok(volume)
    }

    /// Appareil actif, sinon le premier connu
    pub async fn active_device(&self) -> Result<Option<Device>> {
        let token = self.ensure_authenticated().await?;
        let devices = self.api.devices(&token).await?;
        Ok(pick_active_device(devices))
    }

    /// Piste courante et file d'attente
    pub async fn queue(&self) -> Result<QueueSnapshot> {
        let token = self.ensure_authenticated().await?;
        self.api.queue_snapshot(&token, GET_QUEUE_FAILED).await
    }
}

/// `current + delta` borné à 0..=100
pub fn clamp_volume(current: u32, delta: i64) -> u32 {
    (i64::from(current).saturating_add(delta)).clamp(0, 100) as u32
}

/// Builder for [`SpotifyClient`]
pub struct ClientBuilder {
    client: Option<Client>,
    accounts_url: String,
    api_url: String,
    timeout: Duration,
    user_agent: String,
    credentials: Option<ClientCredentials>,
    store: Option<Arc<dyn CredentialStore>>,
    search_limit: u32,
    clear_queue_mode: ClearQueueMode,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            credentials: None,
            store: None,
            search_limit: DEFAULT_SEARCH_LIMIT,
            clear_queue_mode: ClearQueueMode::default(),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client (the timeout is then the client's own)
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn accounts_url(mut self, url: impl Into<String>) -> Self {
        self.accounts_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn credentials(mut self, credentials: ClientCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Stockage des tokens (mémoire par défaut)
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn search_limit(mut self, limit: u32) -> Self {
        self.search_limit = limit.clamp(1, 50);
        self
    }

    pub fn clear_queue_mode(mut self, mode: ClearQueueMode) -> Self {
        self.clear_queue_mode = mode;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SpotifyClient> {
        let http = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()
                .map_err(|e| {
                    SpotifyError::Configuration(format!("Failed to build HTTP client: {}", e))
                })?,
        };

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));

        Ok(SpotifyClient {
            auth: TokenManager::new(http.clone(), self.accounts_url, self.credentials, store),
            api: SpotifyApi::new(http, self.api_url),
            search_limit: self.search_limit,
            clear_queue_mode: self.clear_queue_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_volume() {
        assert_eq!(clamp_volume(95, 10), 100);
        assert_eq!(clamp_volume(30, -60), 0);
        assert_eq!(clamp_volume(50, 5), 55);
        assert_eq!(clamp_volume(0, i64::MIN), 0);
        assert_eq!(clamp_volume(100, i64::MAX), 100);
    }

    #[test]
    fn test_builder_defaults() {
        let client = SpotifyClient::builder().build().unwrap();
        assert_eq!(client.search_limit(), 20);
        assert_eq!(client.clear_queue_mode(), ClearQueueMode::PreservePosition);
        assert_eq!(client.api().base_url(), DEFAULT_API_URL);
    }

    #[tokio::test]
    async fn test_operations_require_authentication() {
        let client = SpotifyClient::builder().build().unwrap();
        assert!(matches!(
            client.search("anything").await,
            Err(SpotifyError::Unauthenticated)
        ));
        assert!(matches!(
            client.adjust_volume(Some(10)).await,
            Err(SpotifyError::Unauthenticated)
        ));
        assert!(matches!(client.queue().await, Err(SpotifyError::Unauthenticated)));
    }
}
