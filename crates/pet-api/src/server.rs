//! HTTP control surface: command routes, favorites routes, a WebSocket tick
//! stream, and the 1-second tick driver that advances hunger while a pet is
//! active.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    ApiError, CommandRecord, EngineConfig, EngineError, EngineSnapshot, ErrorCode, FavoriteView,
    FeedingStarted, Pet, TickOutcome, SCHEMA_VERSION_V1,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};

use crate::favorites::FavoritesError;
use crate::provider::{ImageSource, ProviderError};
use crate::PresenterApi;

#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
    Favorites(FavoritesError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
            Self::Favorites(err) => write!(f, "favorites store error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<FavoritesError> for ServerError {
    fn from(value: FavoritesError) -> Self {
        Self::Favorites(value)
    }
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn from_engine(error: EngineError) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            error: ApiError::from_engine(error),
        }
    }

    fn from_provider(error: ProviderError) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            error: ApiError::new(
                ErrorCode::ImageFetchFailed,
                "failed to fetch a candidate image",
                Some(error.to_string()),
            ),
        }
    }

    fn from_favorites(error: FavoritesError) -> Self {
        match error {
            FavoritesError::DuplicateUrl(url) => Self {
                status: StatusCode::CONFLICT,
                error: ApiError::new(
                    ErrorCode::DuplicateFavorite,
                    "this pet is already in the favorites",
                    Some(format!("image_url={url}")),
                ),
            },
            FavoritesError::NoActivePet => Self {
                status: StatusCode::CONFLICT,
                error: ApiError::new(ErrorCode::NoPetActive, "no active pet to save", None),
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::new(
                    ErrorCode::InternalError,
                    "favorites operation failed",
                    Some(other.to_string()),
                ),
            },
        }
    }

    fn favorite_not_found(image_url: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::FavoriteNotFound,
                "no favorite saved for this url",
                Some(format!("image_url={image_url}")),
            ),
        }
    }

    fn invalid_query(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidQuery, message, details),
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StreamMessage {
    Tick {
        outcome: TickOutcome,
        snapshot: EngineSnapshot,
    },
    FeedingEnded {
        snapshot: EngineSnapshot,
    },
}

#[derive(Clone)]
struct AppState {
    api: Arc<Mutex<PresenterApi>>,
    source: Arc<ImageSource>,
    stream_tx: broadcast::Sender<StreamMessage>,
}

impl AppState {
    fn new(api: PresenterApi, source: ImageSource) -> Self {
        let (stream_tx, _) = broadcast::channel(1024);
        Self {
            api: Arc::new(Mutex::new(api)),
            source: Arc::new(source),
            stream_tx,
        }
    }
}

pub async fn serve(
    addr: SocketAddr,
    config: EngineConfig,
    source: ImageSource,
    favorites_db: Option<PathBuf>,
) -> Result<(), ServerError> {
    let mut api = PresenterApi::from_config(config.clone());
    if let Some(path) = favorites_db {
        api.attach_sqlite_store(&path)?;
        info!("favorites store attached at {}", path.display());
    }

    let state = AppState::new(api, source);
    spawn_tick_driver(state.clone(), config.tick_interval_ms);

    let app = router(state);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/pet", get(get_pet))
        .route("/api/v1/pet/acquire", post(acquire_pet))
        .route("/api/v1/pet/feed", post(feed_pet))
        .route("/api/v1/favorites", post(save_favorite).get(list_favorites))
        .route("/api/v1/favorites/load", post(load_favorite))
        .route("/api/v1/favorites/remove", post(remove_favorite))
        .route("/api/v1/commands", get(get_commands))
        .route("/api/v1/stream", get(stream_state))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

/// Issues one hunger tick per interval while a pet is active; the engine
/// no-ops otherwise, so an empty session costs nothing.
fn spawn_tick_driver(state: AppState, interval_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
        loop {
            interval.tick().await;
            let mut api = state.api.lock().await;
            if api.snapshot().active_pet.is_none() {
                continue;
            }
            let outcome = api.tick();
            let snapshot = api.snapshot();
            drop(api);

            if outcome == TickOutcome::BecameHungry {
                debug!("pet crossed the hungry threshold");
            }
            let _ = state.stream_tx.send(StreamMessage::Tick { outcome, snapshot });
        }
    });
}

fn spawn_cooldown(state: AppState, started: FeedingStarted) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(started.cooldown_ms)).await;
        let mut api = state.api.lock().await;
        if api.end_feeding(started.generation) {
            let snapshot = api.snapshot();
            drop(api);
            let _ = state.stream_tx.send(StreamMessage::FeedingEnded { snapshot });
        } else {
            debug!(
                "ignored stale feeding completion (generation {})",
                started.generation
            );
        }
    });
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("content-type"),
    );
}

#[derive(Debug, Serialize)]
struct PetResponse {
    schema_version: String,
    snapshot: EngineSnapshot,
}

#[derive(Debug, Serialize)]
struct AcquireResponse {
    schema_version: String,
    pet: Pet,
    snapshot: EngineSnapshot,
}

#[derive(Debug, Serialize)]
struct FeedResponse {
    schema_version: String,
    feeding: FeedingStarted,
    snapshot: EngineSnapshot,
}

#[derive(Debug, Serialize)]
struct SaveFavoriteResponse {
    schema_version: String,
    pet: Pet,
    count: usize,
}

#[derive(Debug, Serialize)]
struct RemoveFavoriteResponse {
    schema_version: String,
    removed: bool,
    count: usize,
}

#[derive(Debug, Serialize)]
struct FavoritesResponse {
    schema_version: String,
    view: FavoriteView,
    count: usize,
    favorites: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct CommandsResponse {
    schema_version: String,
    commands: Vec<CommandRecord>,
}

#[derive(Debug, Deserialize)]
struct FavoriteRef {
    image_url: String,
}

#[derive(Debug, Deserialize)]
struct FavoritesQuery {
    view: Option<String>,
}

async fn get_pet(State(state): State<AppState>) -> Json<PetResponse> {
    let api = state.api.lock().await;
    Json(PetResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        snapshot: api.snapshot(),
    })
}

/// Coin check, then fetch, then acquire. The deduction happens only inside
/// `acquire_pet`, so a failed fetch leaves the balance untouched.
async fn acquire_pet(State(state): State<AppState>) -> Result<Json<AcquireResponse>, HttpApiError> {
    {
        let api = state.api.lock().await;
        if api.snapshot().coins == 0 {
            return Err(HttpApiError::from_engine(EngineError::InsufficientFunds));
        }
    }

    let candidate = state.source.fetch_random().await.map_err(|err| {
        warn!("image fetch failed: {err}");
        HttpApiError::from_provider(err)
    })?;

    let mut api = state.api.lock().await;
    let pet = api
        .acquire_pet(&candidate)
        .map_err(HttpApiError::from_engine)?;
    if pet.is_special {
        info!("special pet acquired: {}", pet.name);
    }

    Ok(Json(AcquireResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        pet,
        snapshot: api.snapshot(),
    }))
}

async fn feed_pet(State(state): State<AppState>) -> Result<Json<FeedResponse>, HttpApiError> {
    let (started, snapshot) = {
        let mut api = state.api.lock().await;
        let started = api.feed().map_err(HttpApiError::from_engine)?;
        (started, api.snapshot())
    };

    spawn_cooldown(state.clone(), started);

    Ok(Json(FeedResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        feeding: started,
        snapshot,
    }))
}

async fn save_favorite(
    State(state): State<AppState>,
) -> Result<Json<SaveFavoriteResponse>, HttpApiError> {
    let mut api = state.api.lock().await;
    let pet = api.save_favorite().map_err(HttpApiError::from_favorites)?;
    Ok(Json(SaveFavoriteResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        pet,
        count: api.favorites().len(),
    }))
}

async fn list_favorites(
    State(state): State<AppState>,
    Query(query): Query<FavoritesQuery>,
) -> Result<Json<FavoritesResponse>, HttpApiError> {
    let view = parse_view(query.view.as_deref())?;
    let api = state.api.lock().await;
    let entries = api.favorites();

    Ok(Json(FavoritesResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        view,
        count: entries.len(),
        favorites: favorites_payload(view, entries),
    }))
}

async fn load_favorite(
    State(state): State<AppState>,
    Json(request): Json<FavoriteRef>,
) -> Result<Json<PetResponse>, HttpApiError> {
    let mut api = state.api.lock().await;
    if api.load_favorite(&request.image_url).is_none() {
        return Err(HttpApiError::favorite_not_found(&request.image_url));
    }

    Ok(Json(PetResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        snapshot: api.snapshot(),
    }))
}

async fn remove_favorite(
    State(state): State<AppState>,
    Json(request): Json<FavoriteRef>,
) -> Result<Json<RemoveFavoriteResponse>, HttpApiError> {
    let mut api = state.api.lock().await;
    let removed = api
        .remove_favorite(&request.image_url)
        .map_err(HttpApiError::from_favorites)?;
    if !removed {
        return Err(HttpApiError::favorite_not_found(&request.image_url));
    }

    Ok(Json(RemoveFavoriteResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        removed,
        count: api.favorites().len(),
    }))
}

async fn get_commands(State(state): State<AppState>) -> Json<CommandsResponse> {
    let api = state.api.lock().await;
    Json(CommandsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        commands: api.command_audit().to_vec(),
    })
}

async fn stream_state(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| forward_stream(socket, state))
}

async fn forward_stream(mut socket: WebSocket, state: AppState) {
    let mut updates = state.stream_tx.subscribe();
    loop {
        let message = match updates.recv().await {
            Ok(message) => message,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("stream subscriber lagged, skipped {skipped} updates");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let Ok(payload) = serde_json::to_string(&message) else {
            continue;
        };
        if socket.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
    }
}

fn parse_view(raw: Option<&str>) -> Result<FavoriteView, HttpApiError> {
    match raw {
        None => Ok(FavoriteView::Full),
        Some(raw) => FavoriteView::parse(raw)
            .ok_or_else(|| HttpApiError::invalid_query("unknown favorites view", Some(format!("view={raw}")))),
    }
}

/// Compact view is the list screen's dense mode: name and image only.
fn favorites_payload(view: FavoriteView, entries: &[Pet]) -> serde_json::Value {
    match view {
        FavoriteView::Full => json!(entries),
        FavoriteView::Compact => json!(entries
            .iter()
            .map(|pet| json!({ "name": pet.name, "image_url": pet.image_url }))
            .collect::<Vec<_>>()),
    }
}
