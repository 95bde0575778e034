//! Implémentation du trait SpotifyServerExt pour jbxserver::Server

use crate::api_rest::{create_router, SpotifyApiDoc, SpotifyState};
use crate::client::SpotifyClient;
use crate::server_ext::SpotifyServerExt;
use anyhow::Result;
use jbxserver::Server;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;

impl SpotifyServerExt for Server {
    async fn init_spotify_api(&mut self, client: Arc<SpotifyClient>) -> Result<Arc<SpotifyClient>> {
        let state = SpotifyState {
            client: client.clone(),
        };

        let router = create_router(state);
        self.add_openapi(router, SpotifyApiDoc::openapi(), "spotify")
            .await;

        info!("Spotify API endpoints available at /api/spotify/*");
        Ok(client)
    }

    async fn init_spotify_api_configured(&mut self) -> Result<Arc<SpotifyClient>> {
        info!("Initializing Spotify client from configuration");

        let config = jbxconfig::get_config();
        let client = SpotifyClient::from_config(config)?;

        self.init_spotify_api(Arc::new(client)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_routes_mounted_under_api_spotify() {
        let mut server = Server::new("test", "http://localhost:0", 0);
        let client = Arc::new(SpotifyClient::builder().build().unwrap());
        server.init_spotify_api(client).await.unwrap();

        let router = server.router().await;
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/spotify/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api-docs/spotify.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["paths"]["/clear-queue"].is_object());
    }
}
