//! Réconciliation de la file d'attente
//!
//! Spotify ne permet ni de retirer une piste de la file, ni de la vider. La
//! seule écriture possible est « joue cette liste ordonnée maintenant ». Les
//! deux opérations sont donc émulées selon le même schéma :
//!
//! 1. lecture de l'état (snapshot de la file ou état de lecture) ;
//! 2. calcul pur de l'ordre souhaité ([`plan_delete`], [`plan_clear`]) ;
//! 3. rejeu de cet ordre via `PUT /me/player/play`.
//!
//! Le résultat reste approximatif : le contexte de lecture (album, playlist)
//! est remplacé par la liste rejouée.

use crate::api::{CLEAR_QUEUE_FAILED, GET_QUEUE_FAILED};
use crate::client::SpotifyClient;
use crate::config_ext::ClearQueueMode;
use crate::error::{Result, SpotifyError};
use crate::models::{QueueSnapshot, Track};
use tracing::{debug, info, warn};

/// Liste ordonnée à rejouer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    pub uris: Vec<String>,
    /// Position de départ dans la première piste
    pub position_ms: Option<u64>,
}

/// Calcule le rejeu qui retire `target_uri` de la file
///
/// Toutes les occurrences de `target_uri` dans la file sont retirées.
///
/// - la cible est la piste courante : on rejoue la file restante, qui
///   démarre donc sur la piste suivante ; rien si la file est vide ;
/// - sinon : on rejoue la piste courante suivie de la file restante, mais
///   seulement si la file restante n'est pas vide. Rejouer la seule piste
///   courante la ferait repartir de zéro.
pub fn plan_delete(snapshot: &QueueSnapshot, target_uri: &str) -> Option<Replay> {
    let remaining: Vec<String> = snapshot
        .queue
        .iter()
        .filter(|t| t.uri != target_uri)
        .map(|t| t.uri.clone())
        .collect();

    if remaining.is_empty() {
        return None;
    }

    let uris = match snapshot.currently_playing.as_ref().map(|t| t.uri.as_str()) {
        Some(uri) if uri != target_uri => {
            std::iter::once(uri.to_string()).chain(remaining).collect()
        }
        _ => remaining,
    };

    Some(Replay {
        uris,
        position_ms: None,
    })
}

/// Calcule le rejeu qui vide la file
///
/// # Errors
///
/// [`SpotifyError::NothingPlaying`] sans piste courante.
pub fn plan_clear(current: Option<&Track>, position_ms: Option<u64>) -> Result<Replay> {
    let current = current.ok_or(SpotifyError::NothingPlaying)?;
    Ok(Replay {
        uris: vec![current.uri.clone()],
        position_ms,
    })
}

impl SpotifyClient {
    /// Vide la file d'attente en ne rejouant que la piste courante
    ///
    /// Selon [`ClearQueueMode`], la piste reprend à sa position actuelle ou
    /// depuis le début.
    ///
    /// # Errors
    ///
    /// - [`SpotifyError::NothingPlaying`] si rien ne joue (aucun rejeu émis)
    /// - [`SpotifyError::QueueUpdateFailed`] si le rejeu échoue
    pub async fn clear_queue(&self) -> Result<()> {
        let token = self.ensure_authenticated().await?;

        let replay = match self.clear_queue_mode {
            ClearQueueMode::PreservePosition => {
                let state = self
                    .api
                    .playback_state(&token, CLEAR_QUEUE_FAILED)
                    .await?;
                let item = state.as_ref().and_then(|s| s.item.as_ref());
                let progress = state.as_ref().and_then(|s| s.progress_ms);
                plan_clear(item, progress)?
            }
            ClearQueueMode::RestartTrack => {
                let snapshot = self
                    .api
                    .queue_snapshot(&token, CLEAR_QUEUE_FAILED)
                    .await?;
                plan_clear(snapshot.currently_playing.as_ref(), None)?
            }
        };

        self.replay(&token, &replay).await?;
        info!("Queue cleared ({})", self.clear_queue_mode.as_str());
        Ok(())
    }

    /// Retire une piste de la file
    ///
    /// Renvoie `true` si un rejeu a été émis, `false` s'il n'y avait rien à
    /// rejouer.
    ///
    /// # Errors
    ///
    /// - [`SpotifyError::BadRequest`] si `target_uri` est vide
    /// - [`SpotifyError::QueueUpdateFailed`] si le rejeu échoue
    pub async fn delete_from_queue(&self, target_uri: &str) -> Result<bool> {
        let token = self.ensure_authenticated().await?;
        let target_uri = target_uri.trim();
        if target_uri.is_empty() {
            return Err(SpotifyError::BadRequest("Missing track URI".into()));
        }

        let snapshot = self.api.queue_snapshot(&token, GET_QUEUE_FAILED).await?;

        match plan_delete(&snapshot, target_uri) {
            Some(replay) => {
                self.replay(&token, &replay).await?;
                info!("Removed {} from queue", target_uri);
                Ok(true)
            }
            None => {
                debug!("Nothing to replay after removing {}", target_uri);
                Ok(false)
            }
        }
    }

    async fn replay(&self, token: &str, replay: &Replay) -> Result<()> {
        debug!(
            "Replaying {} track(s) from {:?} ms",
            replay.uris.len(),
            replay.position_ms
        );
        self.api
            .start_playback(token, &replay.uris, replay.position_ms, CLEAR_QUEUE_FAILED)
            .await
            .map_err(|e| {
                warn!("Queue replay failed: {}", e);
                SpotifyError::QueueUpdateFailed
            })
    }
}
