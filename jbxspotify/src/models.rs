//! Structures de données échangées avec l'API Spotify
//!
//! Les objets renvoyés par Spotify sont transmis tels quels aux clients de la
//! jukebox : chaque structure conserve les champs inconnus dans `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Image d'album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// Artiste (forme simplifiée)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Album (forme simplifiée)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Référence de piste
///
/// `id` est nul pour les fichiers locaux ; les épisodes de podcast n'ont ni
/// album ni artistes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artists: Vec<Artist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<Album>,
    pub uri: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Track {
    /// Noms des artistes séparés par des virgules
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Appareil Spotify Connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub volume_percent: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// État de lecture (`GET /me/player`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default)]
    pub item: Option<Track>,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Vue en lecture seule de la file d'attente (`GET /me/player/queue`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub currently_playing: Option<Track>,
    #[serde(default)]
    pub queue: Vec<Track>,
}

/// Réponse du endpoint `/api/token` des comptes Spotify
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Corps d'erreur du endpoint `/api/token`
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TokenErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// État d'authentification de l'hôte
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jbxserver", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    /// Un token valide est disponible (après rafraîchissement éventuel)
    pub authenticated: bool,
    /// Un enregistrement de credentials existe
    pub has_token: bool,
    /// Expiration en millisecondes depuis l'epoch
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub tracks: Option<Paging<Track>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_keeps_unknown_fields() {
        let json = r#"{
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "name": "Never Gonna Give You Up",
            "artists": [{"id": "0gxyHStUsqpMadRV0Di1Qt", "name": "Rick Astley", "type": "artist"}],
            "album": {"name": "Whenever You Need Somebody", "images": [{"url": "https://i.scdn.co/image/x", "height": 640, "width": 640}]},
            "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
            "duration_ms": 213573,
            "explicit": false
        }"#;

        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.artist_names(), "Rick Astley");
        assert_eq!(track.album.as_ref().unwrap().images.len(), 1);
        assert_eq!(track.extra["duration_ms"], 213573);

        let back = serde_json::to_value(&track).unwrap();
        assert_eq!(back["duration_ms"], 213573);
        assert_eq!(back["explicit"], false);
        assert_eq!(back["artists"][0]["type"], "artist");
    }

    #[test]
    fn test_episode_in_queue_parses() {
        let json = r#"{"currently_playing": null, "queue": [{"name": "Episode 1", "uri": "spotify:episode:abc", "type": "episode"}]}"#;
        let snapshot: QueueSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.currently_playing.is_none());
        assert_eq!(snapshot.queue[0].uri, "spotify:episode:abc");
        assert!(snapshot.queue[0].artists.is_empty());
        assert!(snapshot.queue[0].album.is_none());

        let back = serde_json::to_value(&snapshot.queue[0]).unwrap();
        assert!(back.get("album").is_none());
    }

    #[test]
    fn test_auth_status_is_camel_case() {
        let status = AuthStatus {
            authenticated: true,
            has_token: true,
            expires_at: Some(1_700_000_000_000),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["hasToken"], true);
        assert_eq!(json["expiresAt"], 1_700_000_000_000i64);
    }
}
