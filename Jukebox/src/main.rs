use jbxserver::{LoggingOptions, ServerBuilder};
use jbxspotify::SpotifyServerExt;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = jbxconfig::get_config();

    // ========== PHASE 1 : Serveur HTTP et logs ==========

    let mut server = ServerBuilder::new_configured().build();
    server
        .init_logging(LoggingOptions::from_config(&config))
        .await;

    server
        .add_route("/info", || async {
            serde_json::json!({"version": env!("CARGO_PKG_VERSION")})
        })
        .await;

    // ========== PHASE 2 : Spotify ==========

    info!("🎵 Initializing Spotify API...");
    let client = server.init_spotify_api_configured().await?;
    match client.auth().status().await {
        Ok(status) if status.authenticated => info!("✅ Host already authenticated with Spotify"),
        Ok(_) => info!("Host not authenticated yet, waiting for /api/spotify/token"),
        Err(e) => warn!("⚠️ Failed to read stored Spotify credentials: {}", e),
    }

    // ========== PHASE 3 : Démarrage du serveur ==========

    info!("🌐 Starting HTTP server...");
    server.start().await?;

    let server_info = server.info();
    info!(
        "✅ Jukebox is ready at http://{}:{}",
        server_info.base_url, server_info.http_port
    );
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    Ok(())
}
