//! Contrôle de la lecture (`/me/player/*`)

use super::{
    SpotifyApi, DEVICES_FAILED, PAUSE_FAILED, PLAY_FAILED, SKIP_FAILED, VOLUME_FAILED,
};
use crate::error::Result;
use crate::models::{Device, DevicesResponse, PlaybackState};
use reqwest::{Method, StatusCode};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct StartPlaybackBody<'a> {
    uris: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    position_ms: Option<u64>,
}

impl SpotifyApi {
    /// Reprend la lecture sur l'appareil actif
    pub async fn play(&self, token: &str) -> Result<()> {
        self.send(Method::PUT, "/me/player/play", token, &[], PLAY_FAILED)
            .await?;
        Ok(())
    }

    pub async fn pause(&self, token: &str) -> Result<()> {
        self.send(Method::PUT, "/me/player/pause", token, &[], PAUSE_FAILED)
            .await?;
        Ok(())
    }

    /// Passe à la piste suivante
    pub async fn next(&self, token: &str) -> Result<()> {
        self.send(Method::POST, "/me/player/next", token, &[], SKIP_FAILED)
            .await?;
        Ok(())
    }

    /// État de lecture courant, `None` si rien ne joue (204)
    pub async fn playback_state(&self, token: &str, fallback: &str) -> Result<Option<PlaybackState>> {
        let response = self
            .send(Method::GET, "/me/player", token, &[], fallback)
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Self::parse(response, fallback).await.map(Some)
    }

    /// Fixe le volume de l'appareil actif (0..=100)
    pub async fn set_volume(&self, token: &str, volume_percent: u32) -> Result<()> {
        self.send(
            Method::PUT,
            "/me/player/volume",
            token,
            &[("volume_percent", volume_percent.to_string())],
            VOLUME_FAILED,
        )
        .await?;
        Ok(())
    }

    /// Liste des appareils Spotify Connect du compte
    pub async fn devices(&self, token: &str) -> Result<Vec<Device>> {
        let response = self
            .send(Method::GET, "/me/player/devices", token, &[], DEVICES_FAILED)
            .await?;
        let data: DevicesResponse = Self::parse(response, DEVICES_FAILED).await?;
        Ok(data.devices)
    }

    /// Remplace le contexte de lecture par la liste ordonnée `uris`
    ///
    /// Seule écriture que Spotify permet sur la file : la première URI
    /// démarre (à `position_ms` si fourni), les suivantes deviennent la file.
    pub async fn start_playback(
        &self,
        token: &str,
        uris: &[String],
        position_ms: Option<u64>,
        fallback: &str,
    ) -> Result<()> {
        let body = StartPlaybackBody { uris, position_ms };
        self.send_json(Method::PUT, "/me/player/play", token, &body, fallback)
            .await?;
        Ok(())
    }
}

/// Appareil marqué actif, sinon le premier de la liste
pub fn pick_active_device(devices: Vec<Device>) -> Option<Device> {
    let active = devices.iter().position(|d| d.is_active);
    devices.into_iter().nth(active.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, is_active: bool) -> Device {
        serde_json::from_value(serde_json::json!({
            "id": name,
            "name": name,
            "type": "Computer",
            "is_active": is_active,
            "volume_percent": 40
        }))
        .unwrap()
    }

    #[test]
    fn test_pick_active_device() {
        let picked = pick_active_device(vec![device("a", false), device("b", true)]);
        assert_eq!(picked.unwrap().name, "b");

        let picked = pick_active_device(vec![device("a", false), device("b", false)]);
        assert_eq!(picked.unwrap().name, "a");

        assert!(pick_active_device(Vec::new()).is_none());
    }

    #[test]
    fn test_start_playback_body() {
        let uris = vec!["spotify:track:A".to_string()];
        let body = serde_json::to_value(StartPlaybackBody {
            uris: &uris,
            position_ms: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"uris": ["spotify:track:A"]}));

        let body = serde_json::to_value(StartPlaybackBody {
            uris: &uris,
            position_ms: Some(42_000),
        })
        .unwrap();
        assert_eq!(body["position_ms"], 42_000);
    }
}
