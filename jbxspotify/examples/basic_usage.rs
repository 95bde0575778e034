//! Exemple d'utilisation basique de jbxspotify
//!
//! Cet exemple montre comment :
//! - Créer le client depuis la configuration (tokens de l'hôte inclus)
//! - Rechercher des pistes
//! - Afficher l'appareil actif et la file d'attente
//!
//! L'hôte doit s'être authentifié au moins une fois via `/api/spotify/token`.

use jbxspotify::{SpotifyClient, SpotifyError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== jbxspotify - Exemple d'utilisation basique ===\n");

    let client = SpotifyClient::from_config(jbxconfig::get_config())?;

    let status = client.auth().status().await?;
    if !status.authenticated {
        println!("Hôte non authentifié (token présent: {})", status.has_token);
        return Ok(());
    }
    println!("✓ Hôte authentifié");

    println!("\n--- Recherche ---");
    let query = "Daft Punk";
    for (i, track) in client.search(query).await?.iter().take(5).enumerate() {
        println!("  {}. {} - {}", i + 1, track.artist_names(), track.name);
        println!("     {}", track.uri);
    }

    println!("\n--- Appareil actif ---");
    match client.active_device().await? {
        Some(device) => println!(
            "  {} ({}) volume {:?}",
            device.name, device.device_type, device.volume_percent
        ),
        None => println!("  Aucun appareil"),
    }

    println!("\n--- File d'attente ---");
    match client.queue().await {
        Ok(snapshot) => {
            if let Some(current) = &snapshot.currently_playing {
                println!("  ▶ {} - {}", current.artist_names(), current.name);
            }
            for track in &snapshot.queue {
                println!("    {} - {}", track.artist_names(), track.name);
            }
        }
        Err(SpotifyError::NoActiveDevice) => println!("  Ouvrez Spotify sur un appareil"),
        Err(e) => println!("  Erreur {}: {}", e.status_code(), e),
    }

    Ok(())
}
