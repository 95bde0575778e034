//! Couche d'accès à l'API Web Spotify
//!
//! Ce module fournit les adaptateurs bas-niveau, un par capacité distante.
//! Ils sont sans état : le token d'accès est passé à chaque appel.
//!
//! Mapping d'erreur commun :
//!
//! - réponse non-2xx : [`SpotifyError::Upstream`] avec le `error.message` de
//!   Spotify s'il est lisible, sinon le message de repli de l'adaptateur ;
//! - erreur réseau, timeout ou JSON illisible : [`SpotifyError::Transport`]
//!   avec le message de repli.

pub mod player;
pub mod queue;
pub mod search;

use crate::error::{Result, SpotifyError};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

pub const SEARCH_FAILED: &str = "Search failed";
pub const QUEUE_ADD_FAILED: &str = "Failed to add to queue";
pub const PLAY_FAILED: &str = "No active device. Open Spotify on a device first.";
pub const PAUSE_FAILED: &str = "Pause failed";
pub const SKIP_FAILED: &str = "Skip failed";
pub const VOLUME_FAILED: &str = "Volume change failed";
pub const GET_QUEUE_FAILED: &str = "Failed to get queue";
pub const DEVICES_FAILED: &str = "Failed to get devices";
pub const CLEAR_QUEUE_FAILED: &str = "Failed to clear queue";

/// Client API bas-niveau pour communiquer avec Spotify
#[derive(Debug, Clone)]
pub struct SpotifyApi {
    client: Client,
    base_url: String,
}

impl SpotifyApi {
    /// Crée une instance
    ///
    /// `base_url` est l'URL de l'API Web, par exemple
    /// `https://api.spotify.com/v1`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Effectue une requête sans corps
    pub(crate) async fn send(
        &self,
        method: Method,
        endpoint: &str,
        token: &str,
        query: &[(&str, String)],
        fallback: &str,
    ) -> Result<Response> {
        self.request::<()>(method, endpoint, token, query, None, fallback)
            .await
    }

    /// Effectue une requête avec un corps JSON
    pub(crate) async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        token: &str,
        body: &B,
        fallback: &str,
    ) -> Result<Response> {
        self.request(method, endpoint, token, &[], Some(body), fallback)
            .await
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        token: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        fallback: &str,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("{} {} with {} params", method, url, query.len());

        let mut request = self.client.request(method, &url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        // Spotify refuse les PUT/POST sans Content-Length
        request = match body {
            Some(body) => request.json(body),
            None => request.body(""),
        };

        let response = request.send().await.map_err(|e| {
            warn!("Spotify request {} failed: {}", endpoint, e);
            SpotifyError::Transport(fallback.to_string())
        })?;

        let status = response.status();
        debug!("Response status: {}", status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Spotify API error ({}) on {}: {}", status.as_u16(), endpoint, body);
        Err(SpotifyError::from_response(status.as_u16(), &body, fallback))
    }

    /// Décode un corps JSON, [`SpotifyError::Transport`] s'il est illisible
    pub(crate) async fn parse<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            warn!("Failed to parse Spotify response: {}", e);
            SpotifyError::Transport(fallback.to_string())
        })
    }
}
