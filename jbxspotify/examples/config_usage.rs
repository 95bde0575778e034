//! Exemple d'utilisation du trait SpotifyConfigExt
//!
//! Usage:
//! ```bash
//! cargo run --example config_usage
//! ```

use jbxconfig::get_config;
use jbxspotify::SpotifyConfigExt;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== SpotifyConfigExt Example ===\n");

    let config = get_config();

    println!("--- Application Spotify ---");
    match config.get_spotify_client_id() {
        Ok(id) => println!("Client ID: {}", id),
        Err(e) => println!("Client ID non configuré: {}", e),
    }
    match config.get_spotify_client_secret() {
        Ok(secret) => println!("Client secret: {}", "*".repeat(secret.len())),
        Err(e) => println!("Client secret non configuré: {}", e),
    }

    println!("\n--- Réglages ---");
    println!("Accounts URL: {}", config.get_spotify_accounts_url());
    println!("API URL: {}", config.get_spotify_api_url());
    println!("Timeout: {:?}", config.get_spotify_request_timeout());
    println!("Search limit: {}", config.get_spotify_search_limit());
    println!(
        "Clear queue mode: {}",
        config.get_spotify_clear_queue_mode().as_str()
    );

    // Pour enregistrer l'application (le secret est chiffré si possible) :
    /*
    config.set_spotify_client_id("0123456789abcdef")?;
    config.set_spotify_client_secret("my_client_secret")?;
    */

    Ok(())
}
