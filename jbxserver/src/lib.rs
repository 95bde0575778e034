//! # jbxserver - Serveur HTTP de la jukebox
//!
//! Un [`Server`] axum que les autres crates enrichissent par traits
//! d'extension (`jbxspotify::SpotifyServerExt` par exemple), plus le
//! câblage `tracing` commun.
//!
//! | Méthode                   | Effet                                         |
//! |---------------------------|-----------------------------------------------|
//! | `add_route`               | GET JSON calculé à chaque requête             |
//! | `add_router`              | sous-router monté sous un chemin              |
//! | `add_openapi`             | API sous `/api/{name}` + Swagger UI           |
//! | `init_logging`            | subscriber, `/log-dump`, `/log-sse`           |
//! | `start` / `wait`          | écoute jusqu'à Ctrl+C                         |
//!
//! ```rust,no_run
//! use jbxserver::{LoggingOptions, ServerBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new("Jukebox", "localhost", 8080).build();
//!     server.init_logging(LoggingOptions::default()).await;
//!     server
//!         .add_route("/info", || async { serde_json::json!({ "version": "0.1.0" }) })
//!         .await;
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogEntry, LogState, LoggingOptions, SseLayer, log_dump, log_sse};
pub use server::{Server, ServerBuilder, ServerInfo};
