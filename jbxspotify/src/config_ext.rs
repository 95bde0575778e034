//! Extension pour intégrer la configuration Spotify dans jbxconfig
//!
//! Ce module fournit le trait `SpotifyConfigExt` qui ajoute à
//! `jbxconfig::Config` les réglages du compte Spotify de l'hôte.

use anyhow::{anyhow, Result};
use jbxconfig::{encryption, Config};
use serde_yaml::Value;
use std::time::Duration;

const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";

pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Stratégie de "vidage" de la file d'attente
///
/// Spotify n'expose aucune opération de suppression : on rejoue la piste
/// courante seule, ce qui remplace la file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClearQueueMode {
    /// Rejoue la piste courante à sa position actuelle (`GET /me/player`)
    #[default]
    PreservePosition,
    /// Rejoue la piste courante depuis le début (`GET /me/player/queue`)
    RestartTrack,
}

impl ClearQueueMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "preserve_position" => Some(Self::PreservePosition),
            "restart_track" => Some(Self::RestartTrack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreservePosition => "preserve_position",
            Self::RestartTrack => "restart_track",
        }
    }
}

/// Trait d'extension pour gérer la configuration Spotify dans jbxconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use jbxconfig::get_config;
/// use jbxspotify::SpotifyConfigExt;
///
/// let config = get_config();
/// let client_id = config.get_spotify_client_id()?;
/// ```
pub trait SpotifyConfigExt {
    /// Récupère le Client ID de l'application Spotify
    ///
    /// `accounts.spotify.client_id`, sinon la variable `SPOTIFY_CLIENT_ID`.
    ///
    /// # Errors
    ///
    /// Retourne une erreur si aucun Client ID n'est configuré
    fn get_spotify_client_id(&self) -> Result<String>;

    fn set_spotify_client_id(&self, client_id: &str) -> Result<()>;

    /// Récupère le Client Secret (déchiffré si stocké au format `encrypted:`)
    ///
    /// `accounts.spotify.client_secret`, sinon `SPOTIFY_CLIENT_SECRET`.
    fn get_spotify_client_secret(&self) -> Result<String>;

    /// Définit le Client Secret ; il est chiffré avant d'être écrit quand
    /// l'identifiant machine est disponible
    fn set_spotify_client_secret(&self, secret: &str) -> Result<()>;

    /// URL de base du service de comptes (échange et rafraîchissement)
    fn get_spotify_accounts_url(&self) -> String;

    /// URL de base de l'API Web
    fn get_spotify_api_url(&self) -> String;

    /// Timeout appliqué à chaque requête sortante
    fn get_spotify_request_timeout(&self) -> Duration;

    /// Nombre de résultats renvoyés par la recherche
    fn get_spotify_search_limit(&self) -> u32;

    fn get_spotify_clear_queue_mode(&self) -> ClearQueueMode;

    fn set_spotify_clear_queue_mode(&self, mode: ClearQueueMode) -> Result<()>;
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn trimmed_url(config: &Config, key: &str, default: &str) -> String {
    config
        .get_string(&["accounts", "spotify", key])
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}

impl SpotifyConfigExt for Config {
    fn get_spotify_client_id(&self) -> Result<String> {
        self.get_string(&["accounts", "spotify", "client_id"])
            .or_else(|| env_non_empty(ENV_CLIENT_ID))
            .ok_or_else(|| anyhow!("Spotify Client ID not configured"))
    }

    fn set_spotify_client_id(&self, client_id: &str) -> Result<()> {
        self.set_value(
            &["accounts", "spotify", "client_id"],
            Value::String(client_id.to_string()),
        )
    }

    fn get_spotify_client_secret(&self) -> Result<String> {
        match self.get_string(&["accounts", "spotify", "client_secret"]) {
            Some(value) => encryption::get_secret(&value),
            None => env_non_empty(ENV_CLIENT_SECRET)
                .ok_or_else(|| anyhow!("Spotify Client Secret not configured")),
        }
    }

    fn set_spotify_client_secret(&self, secret: &str) -> Result<()> {
        let stored = match encryption::encrypt_secret(secret) {
            Ok(encrypted) => encrypted,
            Err(e) => {
                tracing::warn!("Storing Spotify client secret unencrypted: {}", e);
                secret.to_string()
            }
        };
        self.set_value(
            &["accounts", "spotify", "client_secret"],
            Value::String(stored),
        )
    }

    fn get_spotify_accounts_url(&self) -> String {
        trimmed_url(self, "accounts_url", DEFAULT_ACCOUNTS_URL)
    }

    fn get_spotify_api_url(&self) -> String {
        trimmed_url(self, "api_url", DEFAULT_API_URL)
    }

    fn get_spotify_request_timeout(&self) -> Duration {
        let secs = self
            .get_typed::<u64>(&["accounts", "spotify", "request_timeout_secs"])
            .ok()
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    fn get_spotify_search_limit(&self) -> u32 {
        // Spotify accepte 1..=50
        self.get_typed::<u32>(&["accounts", "spotify", "search_limit"])
            .map(|l| l.clamp(1, 50))
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
    }

    fn get_spotify_clear_queue_mode(&self) -> ClearQueueMode {
        match self.get_string(&["accounts", "spotify", "clear_queue_mode"]) {
            Some(value) => ClearQueueMode::parse(&value).unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown clear_queue_mode '{}', using {}",
                    value,
                    ClearQueueMode::default().as_str()
                );
                ClearQueueMode::default()
            }),
            None => ClearQueueMode::default(),
        }
    }

    fn set_spotify_clear_queue_mode(&self, mode: ClearQueueMode) -> Result<()> {
        self.set_value(
            &["accounts", "spotify", "clear_queue_mode"],
            Value::String(mode.as_str().to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults() {
        let (_dir, config) = test_config();
        assert_eq!(config.get_spotify_accounts_url(), DEFAULT_ACCOUNTS_URL);
        assert_eq!(config.get_spotify_api_url(), DEFAULT_API_URL);
        assert_eq!(config.get_spotify_request_timeout(), Duration::from_secs(10));
        assert_eq!(config.get_spotify_search_limit(), 20);
        assert_eq!(
            config.get_spotify_clear_queue_mode(),
            ClearQueueMode::PreservePosition
        );
    }

    #[test]
    fn test_client_id_round_trip() {
        let (_dir, config) = test_config();
        config.set_spotify_client_id("abc123").unwrap();
        assert_eq!(config.get_spotify_client_id().unwrap(), "abc123");
    }

    #[test]
    fn test_plain_client_secret() {
        let (_dir, config) = test_config();
        config
            .set_value(
                &["accounts", "spotify", "client_secret"],
                Value::String("s3cret".into()),
            )
            .unwrap();
        assert_eq!(config.get_spotify_client_secret().unwrap(), "s3cret");
    }

    #[test]
    fn test_urls_are_trimmed() {
        let (_dir, config) = test_config();
        config
            .set_value(
                &["accounts", "spotify", "api_url"],
                Value::String("http://127.0.0.1:9999/v1/".into()),
            )
            .unwrap();
        assert_eq!(config.get_spotify_api_url(), "http://127.0.0.1:9999/v1");
    }

    #[test]
    fn test_clear_queue_mode() {
        let (_dir, config) = test_config();
        config
            .set_spotify_clear_queue_mode(ClearQueueMode::RestartTrack)
            .unwrap();
        assert_eq!(
            config.get_spotify_clear_queue_mode(),
            ClearQueueMode::RestartTrack
        );

        config
            .set_value(
                &["accounts", "spotify", "clear_queue_mode"],
                Value::String("shuffle".into()),
            )
            .unwrap();
        assert_eq!(
            config.get_spotify_clear_queue_mode(),
            ClearQueueMode::PreservePosition
        );
    }

    #[test]
    fn test_search_limit_is_clamped() {
        let (_dir, config) = test_config();
        config
            .set_value(&["accounts", "spotify", "search_limit"], Value::from(500))
            .unwrap();
        assert_eq!(config.get_spotify_search_limit(), 50);
    }
}
