//! File d'attente (`/me/player/queue`)

use super::{SpotifyApi, QUEUE_ADD_FAILED};
use crate::error::Result;
use crate::models::QueueSnapshot;
use reqwest::{Method, StatusCode};

impl SpotifyApi {
    /// Ajoute une piste en fin de file
    pub async fn add_to_queue(&self, token: &str, uri: &str) -> Result<()> {
        self.send(
            Method::POST,
            "/me/player/queue",
            token,
            &[("uri", uri.to_string())],
            QUEUE_ADD_FAILED,
        )
        .await?;
        Ok(())
    }

    /// Vue en lecture seule : piste courante et pistes à venir
    pub async fn queue_snapshot(&self, token: &str, fallback: &str) -> Result<QueueSnapshot> {
        let response = self
            .send(Method::GET, "/me/player/queue", token, &[], fallback)
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(QueueSnapshot::default());
        }
        Self::parse(response, fallback).await
    }
}
