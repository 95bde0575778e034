//! Routes HTTP du tampon de logs

use super::{LEVELS, LogEntry, LogState, parse_level};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use utoipa::OpenApi;

/// Filtre des routes `/log-sse`
///
/// `GET /log-sse?levels=warn,error&search=spotify`
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    /// Niveaux retenus, séparés par des virgules ; tous si absent
    pub levels: Option<String>,
    /// Sous-chaîne cherchée dans le message ou la cible
    pub search: Option<String>,
}

impl LogQuery {
    fn matches(&self, entry: &LogEntry) -> bool {
        let level_ok = match self.levels.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(levels) => levels
                .split(',')
                .any(|level| level.trim().eq_ignore_ascii_case(&entry.level)),
        };

        level_ok
            && self.search.as_deref().is_none_or(|needle| {
                entry.message.contains(needle) || entry.target.contains(needle)
            })
    }

    fn event(&self, state: &LogState, entry: &LogEntry) -> Option<Event> {
        if !state.accepts(entry) || !self.matches(entry) {
            return None;
        }
        Event::default().json_data(entry).ok()
    }
}

/// Flux SSE : l'historique du tampon, puis les entrées au fil de l'eau
///
/// Un client trop lent reçoit un événement `lagged` portant le nombre
/// d'entrées perdues.
pub async fn log_sse(
    State(state): State<LogState>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    let (history, mut live) = state.follow();

    let stream = async_stream::stream! {
        for entry in &history {
            if let Some(event) = query.event(&state, entry) {
                yield Ok::<Event, Infallible>(event);
            }
        }

        loop {
            match live.recv().await {
                Ok(entry) => {
                    if let Some(event) = query.event(&state, &entry) {
                        yield Ok(event);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    yield Ok(Event::default().event("lagged").data(missed.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Contenu du tampon en JSON
pub async fn log_dump(State(state): State<LogState>) -> Json<Vec<LogEntry>> {
    Json(state.snapshot())
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LevelRequest {
    /// ERROR, WARN, INFO, DEBUG ou TRACE (casse indifférente)
    pub level: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LevelResponse {
    pub level: String,
    pub available: Vec<String>,
}

impl LevelResponse {
    fn current(state: &LogState) -> Self {
        Self {
            level: state.level().as_str().to_string(),
            available: LEVELS.iter().map(|l| l.as_str().to_string()).collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/level",
    responses(
        (status = 200, description = "Current log level", body = LevelResponse)
    ),
    tag = "logs"
)]
pub async fn get_level(State(state): State<LogState>) -> Json<LevelResponse> {
    Json(LevelResponse::current(&state))
}

#[utoipa::path(
    post,
    path = "/level",
    request_body = LevelRequest,
    responses(
        (status = 200, description = "Level changed", body = LevelResponse),
        (status = 400, description = "Unknown level")
    ),
    tag = "logs"
)]
pub async fn set_level(
    State(state): State<LogState>,
    Json(request): Json<LevelRequest>,
) -> Response {
    match parse_level(&request.level) {
        Some(level) => {
            state.set_level(level);
            tracing::info!("Log level set to {}", level);
            Json(LevelResponse::current(&state)).into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("Unknown log level '{}'", request.level)
            })),
        )
            .into_response(),
    }
}

/// Router monté sous `/api/logs`
pub fn create_logs_router(state: LogState) -> Router {
    Router::new()
        .route("/level", get(get_level).post(set_level))
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(get_level, set_level),
    components(schemas(LevelRequest, LevelResponse)),
    tags((name = "logs", description = "Runtime log level"))
)]
pub struct LogsApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use tower::ServiceExt;
    use tracing::Level;

    fn entry(level: Level, target: &str, message: &str) -> LogEntry {
        LogEntry::new(&level, target, message.to_string())
    }

    #[test]
    fn test_query_levels_and_search() {
        let e = entry(Level::WARN, "jbxspotify::auth", "Token refresh rejected");

        assert!(LogQuery::default().matches(&e));

        let errors = LogQuery {
            levels: Some("error".into()),
            ..Default::default()
        };
        assert!(!errors.matches(&e));

        let warn_refresh = LogQuery {
            levels: Some("error, warn".into()),
            search: Some("refresh".into()),
        };
        assert!(warn_refresh.matches(&e));

        let by_target = LogQuery {
            levels: Some(String::new()),
            search: Some("jbxspotify".into()),
        };
        assert!(by_target.matches(&e));
    }

    #[tokio::test]
    async fn test_set_level_route() {
        let state = LogState::new(8, Level::INFO, None);
        let router = create_logs_router(state.clone());

        let post = |body: &'static str| {
            Request::post("/level")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap()
        };

        let response = router.clone().oneshot(post(r#"{"level":"shout"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.level(), Level::INFO);

        let response = router.oneshot(post(r#"{"level":"debug"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["level"], "DEBUG");
        assert_eq!(body["available"].as_array().unwrap().len(), 5);
        assert_eq!(state.level(), Level::DEBUG);
    }

    #[tokio::test]
    async fn test_log_dump_returns_buffer() {
        let state = LogState::new(8, Level::INFO, None);
        state.record(entry(Level::INFO, "jukebox", "ready"));

        let Json(entries) = log_dump(State(state)).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "ready");
    }
}
