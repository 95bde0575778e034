//! Extension de jbxserver::Server pour piloter Spotify
//!
//! Ce module fournit un trait d'extension permettant d'ajouter le client
//! Spotify et ses endpoints à un serveur `jbxserver` sans que celui-ci
//! dépende de `jbxspotify`.

use crate::client::SpotifyClient;
use anyhow::Result;
use std::sync::Arc;

/// Trait d'extension pour ajouter l'API Spotify à un serveur jbxserver
///
/// # Exemple
///
/// ```rust,no_run
/// use jbxspotify::SpotifyServerExt;
/// use jbxserver::ServerBuilder;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut server = ServerBuilder::new_configured().build();
///
///     server.init_spotify_api_configured().await?;
///
///     server.start().await?;
///     server.wait().await;
///     Ok(())
/// }
/// ```
pub trait SpotifyServerExt {
    /// Enregistre les routes HTTP pour un client déjà construit
    ///
    /// # Routes enregistrées
    ///
    /// - `GET /api/spotify/client-id` - Client ID public
    /// - `GET /api/spotify/authorize-url` - URL d'autorisation de l'hôte
    /// - `POST /api/spotify/token` - Échange du code d'autorisation
    /// - `POST /api/spotify/store-tokens` - Tokens obtenus côté client
    /// - `GET /api/spotify/status` - État d'authentification
    /// - `GET /api/spotify/search` - Recherche (query param: q)
    /// - `POST /api/spotify/queue` - Ajout à la file
    /// - `GET /api/spotify/get-queue` - File d'attente
    /// - `GET /api/spotify/devices` - Appareil actif
    /// - `POST /api/spotify/{play,pause,next}` - Contrôle de la lecture
    /// - `POST /api/spotify/volume` - Ajustement du volume
    /// - `POST /api/spotify/clear-queue` - Vide la file
    /// - `POST /api/spotify/delete-from-queue` - Retire une piste
    /// - `GET /swagger-ui/spotify` - Documentation interactive
    async fn init_spotify_api(&mut self, client: Arc<SpotifyClient>) -> Result<Arc<SpotifyClient>>;

    /// Construit le client depuis `jbxconfig` puis enregistre les routes
    ///
    /// Utilise les clés `accounts.spotify.*` ; les tokens de l'hôte sont
    /// persistés dans le même fichier.
    async fn init_spotify_api_configured(&mut self) -> Result<Arc<SpotifyClient>>;
}

// L'implémentation est dans server_impl.rs
