//! # Serveur HTTP
//!
//! [`Server`] assemble un `Router` axum au fil des appels (`add_route`,
//! `add_router`, `add_openapi`...) puis le sert avec [`Server::start`].
//! Les crates fonctionnelles s'y branchent par traits d'extension.
//!
//! Le router est figé au démarrage : une route ajoutée après `start()` n'est
//! pas servie.

use crate::logs::{self, LogState, LoggingOptions, LogsApiDoc};
use anyhow::{Context, Result};
use axum::handler::Handler;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const DEFAULT_SERVER_NAME: &str = "Jukebox";

/// Identité du serveur, telle qu'affichée dans les logs
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

pub struct Server {
    info: ServerInfo,
    router: RwLock<Router>,
    task: Option<JoinHandle<()>>,
    log_state: Option<LogState>,
}

impl Server {
    /// `base_url` n'est qu'un nom d'hôte pour les messages ; le serveur
    /// écoute toujours sur toutes les interfaces.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                base_url: base_url.into(),
                http_port,
            },
            router: RwLock::new(Router::new()),
            task: None,
            log_state: None,
        }
    }

    pub fn new_configured() -> Self {
        ServerBuilder::new_configured().build()
    }

    /// Sert en GET le JSON produit par `f`, réévalué à chaque requête
    ///
    /// ```rust,no_run
    /// # use jbxserver::Server;
    /// # #[tokio::main]
    /// # async fn main() {
    /// let mut server = Server::new("Jukebox", "localhost", 8080);
    /// server.add_route("/info", || async {
    ///     serde_json::json!({ "version": "0.1.0" })
    /// }).await;
    /// # }
    /// ```
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let handler = move || {
            let produce = f.clone();
            async move { Json(produce().await) }
        };
        self.attach(path, Router::new().route("/", get(handler)))
            .await;
    }

    /// Sert un handler GET qui reçoit `state` par `State<S>`
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route("/", get(handler)).with_state(state);
        self.attach(path, route).await;
    }

    /// Monte `sub_router` sous `path` (`"/"` ou `""` : à la racine)
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        self.attach(path, sub_router).await;
    }

    /// Monte une API documentée nommée `name`
    ///
    /// | Ressource        | Chemin                    |
    /// |------------------|---------------------------|
    /// | routes           | `/api/{name}/...`         |
    /// | document OpenAPI | `/api-docs/{name}.json`   |
    /// | Swagger UI       | `/swagger-ui/{name}`      |
    pub async fn add_openapi(
        &mut self,
        api_router: Router,
        openapi: utoipa::openapi::OpenApi,
        name: &str,
    ) {
        let docs = SwaggerUi::new(format!("/swagger-ui/{name}"))
            .url(format!("/api-docs/{name}.json"), openapi);

        self.attach(&format!("/api/{name}"), api_router).await;
        self.merge(docs.into()).await;
    }

    async fn attach(&mut self, path: &str, route: Router) {
        let path = path.trim_matches('/');
        if path.is_empty() {
            self.merge(route).await;
        } else {
            let mut router = self.router.write().await;
            *router = std::mem::take(&mut *router).nest(&format!("/{path}"), route);
        }
    }

    async fn merge(&mut self, other: Router) {
        let mut router = self.router.write().await;
        *router = std::mem::take(&mut *router).merge(other);
    }

    /// Copie du router tel qu'assemblé à cet instant
    pub async fn router(&self) -> Router {
        self.router.read().await.clone()
    }

    /// Ouvre le port puis sert le router en tâche de fond jusqu'à Ctrl+C
    ///
    /// # Errors
    ///
    /// Échoue si le port est déjà pris ou si le serveur tourne déjà.
    pub async fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            anyhow::bail!("Server {} already started", self.info.name);
        }

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.info.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Cannot listen on {addr}"))?;

        info!(
            "Server {} listening on {} (http://{}:{})",
            self.info.name, addr, self.info.base_url, self.info.http_port
        );

        let router = self.router().await;
        self.task = Some(tokio::spawn(serve_until(listener, router, ctrl_c())));

        Ok(())
    }

    /// Bloque jusqu'à l'arrêt du serveur ; rend la main tout de suite s'il
    /// n'a pas été démarré
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Server task failed: {}", e);
            }
        }
    }

    pub fn info(&self) -> ServerInfo {
        self.info.clone()
    }

    /// Tampon de logs, présent après [`Server::init_logging`]
    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }

    /// Installe le subscriber `tracing` et publie les logs
    ///
    /// - `GET /log-dump` : tampon en JSON
    /// - `GET /log-sse` : flux Server-Sent Events
    /// - `GET|POST /api/logs/level` : lecture et changement du niveau
    pub async fn init_logging(&mut self, options: LoggingOptions) {
        let state = logs::init_logging(options);

        self.add_handler_with_state("/log-dump", logs::log_dump, state.clone())
            .await;
        self.add_handler_with_state("/log-sse", logs::log_sse, state.clone())
            .await;
        self.add_openapi(
            logs::create_logs_router(state.clone()),
            LogsApiDoc::openapi(),
            "logs",
        )
        .await;

        self.log_state = Some(state);
    }
}

/// Sert `router` jusqu'à ce que `shutdown` se termine
///
/// L'arrêt n'attend pas les connexions ouvertes : un flux `/log-sse` ne se
/// termine jamais de lui-même.
async fn serve_until<F>(listener: tokio::net::TcpListener, router: Router, shutdown: F)
where
    F: Future<Output = ()> + Send,
{
    tokio::select! {
        served = axum::serve(listener, router).into_future() => {
            if let Err(e) = served {
                error!("HTTP server stopped: {}", e);
            }
        }
        _ = shutdown => info!("HTTP server stopped"),
    }
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received, shutting down"),
        Err(e) => {
            // Sans signal on ne peut plus s'arrêter proprement : on continue de servir
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Construction d'un [`Server`] depuis des valeurs explicites ou la configuration
pub struct ServerBuilder {
    info: ServerInfo,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                base_url: base_url.into(),
                http_port,
            },
        }
    }

    /// Lit `host.base_url` et `host.http_port`
    pub fn new_configured() -> Self {
        let config = jbxconfig::get_config();
        Self::new(
            DEFAULT_SERVER_NAME,
            config.get_base_url(),
            config.get_http_port(),
        )
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.info.name = name.into();
        self
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.info.http_port = port;
        self
    }

    pub fn build(self) -> Server {
        let ServerInfo {
            name,
            base_url,
            http_port,
        } = self.info;
        Server::new(name, base_url, http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_add_route_is_evaluated_per_request() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();

        let mut server = Server::new("Test", "localhost", 0);
        server
            .add_route("/hits", move || {
                let counter = counter.clone();
                async move { serde_json::json!({ "hits": counter.fetch_add(1, Ordering::SeqCst) + 1 }) }
            })
            .await;

        let router = server.router().await;
        assert_eq!(get(router.clone(), "/hits").await.1["hits"], 1);
        let (status, body) = get(router, "/hits").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hits"], 2);
    }

    #[tokio::test]
    async fn test_add_router_normalises_path() {
        let mut server = Server::new("Test", "localhost", 0);
        server
            .add_router("admin/", Router::new().route("/ping", axum::routing::get(|| async { "pong" })))
            .await;
        server
            .add_router("/", Router::new().route("/health", axum::routing::get(|| async { "ok" })))
            .await;

        let router = server.router().await;
        assert_eq!(get(router.clone(), "/admin/ping").await.0, StatusCode::OK);
        assert_eq!(get(router.clone(), "/health").await.0, StatusCode::OK);
        assert_eq!(get(router, "/ping").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_add_openapi_serves_routes_and_document() {
        #[derive(utoipa::OpenApi)]
        #[openapi(info(title = "demo"))]
        struct DemoDoc;

        let mut server = Server::new("Test", "localhost", 0);
        let api = Router::new().route("/hello", axum::routing::get(|| async { "hi" }));
        server.add_openapi(api, DemoDoc::openapi(), "demo").await;

        let router = server.router().await;
        assert_eq!(get(router.clone(), "/api/demo/hello").await.0, StatusCode::OK);

        let (status, doc) = get(router, "/api-docs/demo.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["info"]["title"], "demo");
    }

    #[tokio::test]
    async fn test_wait_without_start_returns() {
        let mut server = Server::new("Test", "localhost", 0);
        server.wait().await;
        assert!(server.log_state().is_none());
    }

    #[tokio::test]
    async fn test_start_reports_busy_port() {
        let taken = tokio::net::TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut server = ServerBuilder::new("Test", "localhost", port).build();
        assert!(server.start().await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_does_not_wait_for_open_streams() {
        use tokio::io::AsyncWriteExt;

        let router = Router::new().route(
            "/stream",
            axum::routing::get(|| std::future::pending::<&'static str>()),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(serve_until(listener, router, async {
            let _ = stopped.await;
        }));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /stream HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        stop.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .expect("server kept running with a client connected")
            .unwrap();
    }

    #[test]
    fn test_builder_overrides() {
        let info = ServerBuilder::new("Test", "localhost", 8080)
            .name("Party")
            .http_port(9000)
            .build()
            .info();
        assert_eq!(info.name, "Party");
        assert_eq!(info.base_url, "localhost");
        assert_eq!(info.http_port, 9000);
    }
}
