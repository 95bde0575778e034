//! # jbxspotify - Pilotage Spotify pour la jukebox
//!
//! Cette crate transforme un compte Spotify unique, celui de l'hôte, en
//! jukebox partagée : les invités recherchent et ajoutent des morceaux, un
//! administrateur contrôle la lecture, et le serveur garde le token de l'hôte
//! valide sans intervention.
//!
//! ## Architecture
//!
//! - `store` : persistance de l'enregistrement de l'hôte ([`CredentialStore`])
//! - `auth` : cycle de vie du token, rafraîchissement *single-flight* ([`TokenManager`])
//! - `api` : adaptateurs fins au-dessus de l'API Web Spotify ([`api::SpotifyApi`])
//! - `client` : façade qui authentifie puis délègue ([`SpotifyClient`])
//! - `reconcile` : suppression et vidage de la file par rejeu ordonné
//! - `api_rest` : endpoints HTTP (feature `jbxserver`)
//!
//! ```text
//! jbxspotify/
//! ├── src/
//! │   ├── lib.rs
//! │   ├── client.rs           # Façade SpotifyClient + builder
//! │   ├── auth.rs             # TokenManager
//! │   ├── store.rs            # CredentialStore (mémoire, config)
//! │   ├── reconcile.rs        # plan_delete / plan_clear + exécution
//! │   ├── models.rs           # Track, Device, QueueSnapshot...
//! │   ├── api/
//! │   │   ├── mod.rs          # Requêtes authentifiées, mapping d'erreurs
//! │   │   ├── search.rs
//! │   │   ├── player.rs
//! │   │   └── queue.rs
//! │   ├── config_ext.rs       # Clés accounts.spotify.*
//! │   ├── api_rest.rs         # Handlers axum + OpenAPI
//! │   ├── server_ext.rs       # Trait SpotifyServerExt
//! │   └── error.rs
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use jbxspotify::SpotifyClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = SpotifyClient::from_config(jbxconfig::get_config())?;
//!
//!     client.add_to_queue(None, Some("Around the World")).await?;
//!     let snapshot = client.queue().await?;
//!     println!("{} track(s) coming up", snapshot.queue.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Gestion des erreurs
//!
//! Toutes les opérations renvoient [`SpotifyError`], qui porte son code HTTP :
//!
//! ```rust,ignore
//! match client.clear_queue().await {
//!     Ok(()) => println!("Queue cleared"),
//!     Err(SpotifyError::NothingPlaying) => println!("Start something first"),
//!     Err(SpotifyError::Unauthenticated) => println!("Host must log in again"),
//!     Err(e) => println!("Error {}: {}", e.status_code(), e),
//! }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config_ext;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod store;

// Extension jbxserver (feature-gated)
#[cfg(feature = "jbxserver")]
pub mod api_rest;

#[cfg(feature = "jbxserver")]
pub mod server_ext;

#[cfg(feature = "jbxserver")]
mod server_impl;

pub use auth::{ClientCredentials, TokenManager};
pub use client::{ClientBuilder, SpotifyClient};
pub use config_ext::{ClearQueueMode, SpotifyConfigExt};
pub use error::{Result, SpotifyError};
pub use models::{AuthStatus, Device, PlaybackState, QueueSnapshot, Track};
pub use reconcile::{plan_clear, plan_delete, Replay};
pub use store::{ConfigCredentialStore, CredentialRecord, CredentialStore, MemoryCredentialStore};

/// Ré-exporte le trait d'extension jbxserver
#[cfg(feature = "jbxserver")]
pub use server_ext::SpotifyServerExt;
