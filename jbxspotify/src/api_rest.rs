//! Endpoints API REST de la jukebox
//!
//! Ce module définit les handlers HTTP montés sous `/api/spotify`. Chaque
//! handler délègue au [`SpotifyClient`] partagé ; les erreurs sont converties
//! en `{ "error": "..." }` avec le code HTTP de [`SpotifyError::status_code`].
//!
//! Les corps JSON sont lus avec tolérance : un corps absent ou illisible est
//! traité comme un objet vide, et c'est la validation des champs qui répond.

use crate::client::SpotifyClient;
use crate::error::SpotifyError;
use crate::models::{AuthStatus, QueueSnapshot, Track};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

/// État partagé de l'application
#[derive(Clone)]
pub struct SpotifyState {
    pub client: Arc<SpotifyClient>,
}

// ============ Requêtes ============

/// Paramètres de recherche
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Texte recherché
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuthorizeUrlParams {
    /// URI de retour enregistrée dans l'application Spotify
    pub redirect_uri: Option<String>,
}

/// Code d'autorisation renvoyé par Spotify à l'hôte
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
}

/// Tokens obtenus côté client
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StoreTokensRequest {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Durée de validité en secondes (une heure par défaut)
    pub expires_in: Option<i64>,
}

/// Piste à ajouter : par URI, ou par nom (premier résultat de recherche)
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueRequest {
    pub uri: Option<String>,
    pub song_name: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VolumeRequest {
    /// Variation du volume, en points (peut être négative)
    pub delta: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub track_uri: Option<String>,
}

// ============ Réponses ============

#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    fn with_message(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdResponse {
    pub client_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenExchangeResponse {
    pub success: bool,
    pub message: String,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VolumeResponse {
    pub volume: u32,
}

/// Appareil actif, `null` si aucun
#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceResponse {
    #[schema(value_type = Option<Object>)]
    pub device: Option<crate::models::Device>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

// ============ Router ============

/// Crée le router Axum avec tous les endpoints Spotify
pub fn create_router(state: SpotifyState) -> Router {
    Router::new()
        // Authentification de l'hôte
        .route("/client-id", only(get(get_client_id)))
        .route("/authorize-url", only(get(get_authorize_url)))
        .route("/token", only(post(exchange_token)))
        .route("/store-tokens", only(post(store_tokens)))
        .route("/status", only(get(get_status)))
        // Invités
        .route("/search", only(get(search)))
        .route("/queue", only(post(add_to_queue)))
        .route("/get-queue", only(get(get_queue)))
        .route("/devices", only(get(get_devices)))
        // Lecture
        .route("/play", only(post(play)))
        .route("/pause", only(post(pause)))
        .route("/next", only(post(next)))
        .route("/volume", only(post(adjust_volume)))
        .route("/clear-queue", only(post(clear_queue)))
        .route("/delete-from-queue", only(post(delete_from_queue)))
        .with_state(state)
}

/// Toute autre méthode que celle déclarée répond 405 en JSON
fn only(route: MethodRouter<SpotifyState>) -> MethodRouter<SpotifyState> {
    route.fallback(method_not_allowed)
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorResponse {
            error: "Method not allowed".to_string(),
        }),
    )
        .into_response()
}

fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!("Ignoring unreadable request body: {}", rejection);
            T::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============ Handlers ============

#[utoipa::path(
    get,
    path = "/client-id",
    responses(
        (status = 200, description = "Public Spotify client ID", body = ClientIdResponse),
        (status = 500, description = "Client ID not configured", body = ErrorResponse)
    ),
    tag = "auth"
)]
async fn get_client_id(
    State(state): State<SpotifyState>,
) -> Result<Json<ClientIdResponse>, AppError> {
    let client_id = state.client.auth().client_id()?;
    Ok(Json(ClientIdResponse {
        client_id: client_id.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/authorize-url",
    params(AuthorizeUrlParams),
    responses(
        (status = 200, description = "Spotify authorization URL for the host", body = UrlResponse),
        (status = 400, description = "Missing redirectUri", body = ErrorResponse),
        (status = 500, description = "Client ID not configured", body = ErrorResponse)
    ),
    tag = "auth"
)]
async fn get_authorize_url(
    State(state): State<SpotifyState>,
    Query(params): Query<AuthorizeUrlParams>,
) -> Result<Json<UrlResponse>, AppError> {
    let redirect_uri = non_empty(params.redirect_uri)
        .ok_or_else(|| SpotifyError::BadRequest("Missing redirectUri".into()))?;
    let url = state.client.auth().authorize_url(&redirect_uri)?;
    Ok(Json(UrlResponse { url }))
}

#[utoipa::path(
    post,
    path = "/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Host authenticated", body = TokenExchangeResponse),
        (status = 400, description = "Missing code or redirectUri", body = ErrorResponse),
        (status = 500, description = "Exchange rejected or server misconfigured", body = ErrorResponse)
    ),
    tag = "auth"
)]
async fn exchange_token(
    State(state): State<SpotifyState>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenExchangeResponse>, AppError> {
    let request = body_or_default(body);
    let (Some(code), Some(redirect_uri)) =
        (non_empty(request.code), non_empty(request.redirect_uri))
    else {
        return Err(SpotifyError::BadRequest("Missing code or redirectUri".into()).into());
    };

    let tokens = state.client.auth().authorize(&code, &redirect_uri).await?;
    Ok(Json(TokenExchangeResponse {
        success: true,
        message: "Server authenticated with Spotify successfully".to_string(),
        expires_in: tokens.expires_in,
    }))
}

#[utoipa::path(
    post,
    path = "/store-tokens",
    request_body = StoreTokensRequest,
    responses(
        (status = 200, description = "Tokens stored", body = SuccessResponse),
        (status = 400, description = "Missing access token", body = ErrorResponse),
        (status = 500, description = "Credential store failure", body = ErrorResponse)
    ),
    tag = "auth"
)]
async fn store_tokens(
    State(state): State<SpotifyState>,
    body: Result<Json<StoreTokensRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let request = body_or_default(body);
    let access_token = request.access_token.unwrap_or_default();
    let refresh_token = non_empty(request.refresh_token);

    state
        .client
        .auth()
        .store_tokens(&access_token, refresh_token.as_deref(), request.expires_in)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Host authentication status", body = AuthStatus),
        (status = 500, description = "Credential store failure")
    ),
    tag = "auth"
)]
async fn get_status(State(state): State<SpotifyState>) -> Response {
    match state.client.auth().status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            error!("Failed to check authentication status: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Failed to check authentication status",
                    "authenticated": false,
                    "hasToken": false,
                })),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching tracks, in provider order"),
        (status = 400, description = "Missing query", body = ErrorResponse),
        (status = 401, description = "Host not authenticated", body = ErrorResponse)
    ),
    tag = "guests"
)]
async fn search(
    State(state): State<SpotifyState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Track>>, AppError> {
    let query = params.q.unwrap_or_default();
    let tracks = state.client.search(&query).await?;
    Ok(Json(tracks))
}

#[utoipa::path(
    post,
    path = "/queue",
    request_body = QueueRequest,
    responses(
        (status = 200, description = "Song added to queue", body = SuccessResponse),
        (status = 400, description = "Missing track URI or song name", body = ErrorResponse),
        (status = 401, description = "Host not authenticated", body = ErrorResponse),
        (status = 404, description = "Song not found", body = ErrorResponse)
    ),
    tag = "guests"
)]
async fn add_to_queue(
    State(state): State<SpotifyState>,
    body: Result<Json<QueueRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let request = body_or_default(body);
    state
        .client
        .add_to_queue(request.uri.as_deref(), request.song_name.as_deref())
        .await?;
    Ok(Json(SuccessResponse::with_message("Song added to queue")))
}

#[utoipa::path(
    get,
    path = "/get-queue",
    responses(
        (status = 200, description = "Current track and upcoming queue"),
        (status = 401, description = "Host not authenticated", body = ErrorResponse)
    ),
    tag = "guests"
)]
async fn get_queue(State(state): State<SpotifyState>) -> Result<Json<QueueSnapshot>, AppError> {
    Ok(Json(state.client.queue().await?))
}

#[utoipa::path(
    get,
    path = "/devices",
    responses(
        (status = 200, description = "Active device, or the first known one", body = DeviceResponse),
        (status = 401, description = "Host not authenticated", body = ErrorResponse)
    ),
    tag = "guests"
)]
async fn get_devices(State(state): State<SpotifyState>) -> Result<Json<DeviceResponse>, AppError> {
    let device = state.client.active_device().await?;
    Ok(Json(DeviceResponse { device }))
}

#[utoipa::path(
    post,
    path = "/play",
    responses(
        (status = 200, description = "Playback resumed", body = SuccessResponse),
        (status = 401, description = "Host not authenticated", body = ErrorResponse),
        (status = 404, description = "No active device", body = ErrorResponse)
    ),
    tag = "playback"
)]
async fn play(State(state): State<SpotifyState>) -> Result<Json<SuccessResponse>, AppError> {
    state.client.play().await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/pause",
    responses(
        (status = 200, description = "Playback paused", body = SuccessResponse),
        (status = 401, description = "Host not authenticated", body = ErrorResponse)
    ),
    tag = "playback"
)]
async fn pause(State(state): State<SpotifyState>) -> Result<Json<SuccessResponse>, AppError> {
    state.client.pause().await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/next",
    responses(
        (status = 200, description = "Skipped to next track", body = SuccessResponse),
        (status = 401, description = "Host not authenticated", body = ErrorResponse)
    ),
    tag = "playback"
)]
async fn next(State(state): State<SpotifyState>) -> Result<Json<SuccessResponse>, AppError> {
    state.client.next().await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/volume",
    request_body = VolumeRequest,
    responses(
        (status = 200, description = "New volume, clamped to 0..=100", body = VolumeResponse),
        (status = 400, description = "Missing delta or no active playback", body = ErrorResponse),
        (status = 401, description = "Host not authenticated", body = ErrorResponse)
    ),
    tag = "playback"
)]
async fn adjust_volume(
    State(state): State<SpotifyState>,
    body: Result<Json<VolumeRequest>, JsonRejection>,
) -> Result<Json<VolumeResponse>, AppError> {
    let request = body_or_default(body);
    let volume = state.client.adjust_volume(request.delta).await?;
    Ok(Json(VolumeResponse { volume }))
}

#[utoipa::path(
    post,
    path = "/clear-queue",
    responses(
        (status = 200, description = "Queue cleared", body = SuccessResponse),
        (status = 400, description = "Nothing is currently playing", body = ErrorResponse),
        (status = 401, description = "Host not authenticated", body = ErrorResponse),
        (status = 500, description = "Failed to update queue", body = ErrorResponse)
    ),
    tag = "playback"
)]
async fn clear_queue(State(state): State<SpotifyState>) -> Result<Json<SuccessResponse>, AppError> {
    state.client.clear_queue().await?;
    Ok(Json(SuccessResponse::with_message("Queue cleared")))
}

#[utoipa::path(
    post,
    path = "/delete-from-queue",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Song deleted from queue", body = SuccessResponse),
        (status = 400, description = "Missing track URI", body = ErrorResponse),
        (status = 401, description = "Host not authenticated", body = ErrorResponse),
        (status = 500, description = "Failed to update queue", body = ErrorResponse)
    ),
    tag = "playback"
)]
async fn delete_from_queue(
    State(state): State<SpotifyState>,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let request = body_or_default(body);
    let target = request.track_uri.unwrap_or_default();
    state.client.delete_from_queue(&target).await?;
    Ok(Json(SuccessResponse::with_message("Song deleted from queue")))
}

// ============ Erreurs ============

/// Conversion d'une [`SpotifyError`] en réponse HTTP
pub struct AppError(SpotifyError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!("Spotify request failed: {}", self.0);
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<SpotifyError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// API OpenAPI de la jukebox
#[derive(OpenApi)]
#[openapi(
    paths(
        get_client_id,
        get_authorize_url,
        exchange_token,
        store_tokens,
        get_status,
        search,
        add_to_queue,
        get_queue,
        get_devices,
        play,
        pause,
        next,
        adjust_volume,
        clear_queue,
        delete_from_queue,
    ),
    components(
        schemas(
            TokenRequest,
            StoreTokensRequest,
            QueueRequest,
            VolumeRequest,
            DeleteRequest,
            SuccessResponse,
            ClientIdResponse,
            UrlResponse,
            TokenExchangeResponse,
            VolumeResponse,
            DeviceResponse,
            ErrorResponse,
            AuthStatus,
        )
    ),
    tags(
        (name = "auth", description = "Host authentication with Spotify"),
        (name = "guests", description = "Search and queue requests from guests"),
        (name = "playback", description = "Playback control of the host account")
    )
)]
pub struct SpotifyApiDoc;
