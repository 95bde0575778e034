//! Gestion des erreurs pour le client Spotify

use serde_json::Value;
use thiserror::Error;

/// Type Result personnalisé pour jbxspotify
pub type Result<T> = std::result::Result<T, SpotifyError>;

/// Erreurs possibles lors du pilotage du compte hôte
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Aucun token utilisable (absent, ou rafraîchissement impossible)
    #[error("Host not authenticated")]
    Unauthenticated,

    /// Paramètre manquant ou invalide dans la requête entrante
    #[error("{0}")]
    BadRequest(String),

    /// Ressource introuvable (recherche par nom sans résultat)
    #[error("{0}")]
    NotFound(String),

    /// Réponse non-2xx de l'API Spotify
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// Erreur réseau, timeout ou réponse illisible
    #[error("{0}")]
    Transport(String),

    /// Spotify ne connaît aucun appareil actif pour le compte hôte
    #[error("No active device. Open Spotify on a device first.")]
    NoActiveDevice,

    #[error("Nothing is currently playing")]
    NothingPlaying,

    #[error("No active playback")]
    NoActivePlayback,

    /// Le rejeu de la liste ordonnée a échoué
    #[error("Failed to update queue")]
    QueueUpdateFailed,

    /// L'échange du code d'autorisation a été refusé
    #[error("{0}")]
    ExchangeFailed(String),

    /// Client ID / secret absents
    #[error("{0}")]
    Configuration(String),

    /// Erreur de persistance des credentials
    #[error("Credential store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SpotifyError {
    /// Construit une erreur depuis une réponse non-2xx
    ///
    /// Reprend `error.message` du fournisseur si le corps en porte un, sinon
    /// `fallback`. Une raison `NO_ACTIVE_DEVICE` donne
    /// [`SpotifyError::NoActiveDevice`].
    pub fn from_response(status: u16, body: &str, fallback: &str) -> Self {
        let json = serde_json::from_str::<Value>(body).ok();
        let error = json.as_ref().and_then(|j| j.get("error"));

        if error
            .and_then(|e| e.get("reason"))
            .and_then(Value::as_str)
            == Some("NO_ACTIVE_DEVICE")
        {
            return Self::NoActiveDevice;
        }

        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback);

        Self::Upstream {
            status,
            message: message.to_string(),
        }
    }

    /// Code HTTP renvoyé au client de la jukebox
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::BadRequest(_) | Self::NothingPlaying | Self::NoActivePlayback => 400,
            Self::NotFound(_) | Self::NoActiveDevice => 404,
            Self::Upstream { status, .. } => *status,
            Self::Transport(_)
            | Self::QueueUpdateFailed
            | Self::ExchangeFailed(_)
            | Self::Configuration(_)
            | Self::Store(_) => 500,
        }
    }

    /// Vérifie si l'erreur impose une nouvelle authentification de l'hôte
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthenticated)
            || matches!(self, Self::Upstream { status: 401, .. })
    }
}
