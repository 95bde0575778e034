//! Recherche dans le catalogue

use super::{SpotifyApi, SEARCH_FAILED};
use crate::error::Result;
use crate::models::{SearchResponse, Track};
use reqwest::Method;

impl SpotifyApi {
    /// Recherche des pistes, dans l'ordre renvoyé par Spotify
    ///
    /// Une liste vide n'est pas une erreur.
    pub async fn search_tracks(&self, token: &str, query: &str, limit: u32) -> Result<Vec<Track>> {
        let params = [
            ("q", query.to_string()),
            ("type", "track".to_string()),
            ("limit", limit.to_string()),
        ];
        let response = self
            .send(Method::GET, "/search", token, &params, SEARCH_FAILED)
            .await?;
        let data: SearchResponse = Self::parse(response, SEARCH_FAILED).await?;

        Ok(data.tracks.map(|page| page.items).unwrap_or_default())
    }
}
