// HTTP API (axum)
//
// Thin transport over the core: decode request, run the store work on the
// blocking pool, map `StoreError` to a status code.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{FromRequest, FromRequestParts, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::db::{self, Store};
use crate::entities::{Category, Location, NewCategory, NewLocation, NewReview, ReviewLogEntry};
use crate::error::StoreError;
use crate::recommendations::{self, Recommendation};
use crate::{fanout, reviews};

const DEFAULT_PAGE_LIMIT: u32 = 100;
const DEFAULT_REVIEW_PAGE_LIMIT: u32 = 10;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        AppState {
            store: Arc::new(store),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error body: `{ "error": true, "status": 422, "message": ..., "field": ... }`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub field: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: bool,
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            field: None,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            field: None,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation { field, message } => ApiError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message,
                field: Some(field),
            },
            StoreError::Conflict { .. } => ApiError {
                status: StatusCode::CONFLICT,
                message: err.to_string(),
                field: None,
            },
            StoreError::NotFound { .. } => ApiError::not_found(err.to_string()),
            // Details stay in the logs, see `storage_failure`
            StoreError::Storage(_) | StoreError::LockPoisoned => {
                ApiError::internal("Internal storage error")
            }
        }
    }
}

macro_rules! rejection_into_api_error {
    ($($rejection:ty),*) => {$(
        impl From<$rejection> for ApiError {
            fn from(rejection: $rejection) -> Self {
                ApiError {
                    status: rejection.status(),
                    message: rejection.body_text(),
                    field: None,
                }
            }
        }
    )*};
}

rejection_into_api_error!(JsonRejection, QueryRejection, PathRejection);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: true,
            status: self.status.as_u16(),
            message: self.message,
            field: self.field,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Log a failed unit of work with the operation name, then convert it.
fn storage_failure(op: &'static str, err: StoreError) -> ApiError {
    if err.is_storage() {
        error!(op, error = %err, "storage error");
    }
    ApiError::from(err)
}

/// Run blocking SQLite work off the async executor.
async fn run_db<T, F>(state: &AppState, op: &'static str, operation: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> crate::error::Result<T> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || {
        let mut conn = store.lock()?;
        operation(&mut conn)
    })
    .await
    .map_err(|e| {
        error!(op, error = %e, "database task failed");
        ApiError::internal("Internal storage error")
    })?
    .map_err(|e| storage_failure(op, e))
}

// ============================================================================
// Extractors
// Same as axum's, but rejections use the `ErrorBody` JSON shape.
// ============================================================================

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct AppJson<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
struct AppQuery<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
struct AppPath<T>(T);

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    skip: Option<u32>,
    limit: Option<u32>,
}

impl PageParams {
    fn resolve(&self, default_limit: u32) -> (u32, u32) {
        (self.skip.unwrap_or(0), self.limit.unwrap_or(default_limit))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/v1/locations
async fn create_location(
    State(state): State<AppState>,
    AppJson(new): AppJson<NewLocation>,
) -> ApiResult<(StatusCode, Json<Location>)> {
    // Coordinates are validated by fanout before the transaction opens
    let location = run_db(&state, "create_location", move |conn| {
        fanout::create_location(conn, &new)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(location)))
}

/// GET /api/v1/locations?skip=&limit=
async fn list_locations(
    State(state): State<AppState>,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Vec<Location>>> {
    let (skip, limit) = page.resolve(DEFAULT_PAGE_LIMIT);
    let locations = run_db(&state, "list_locations", move |conn| {
        db::list_locations(conn, skip, limit)
    })
    .await?;
    Ok(Json(locations))
}

/// GET /api/v1/locations/:id
async fn read_location(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> ApiResult<Json<Location>> {
    run_db(&state, "get_location", move |conn| db::get_location(conn, id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Location not found"))
}

/// POST /api/v1/categories (get-or-create)
async fn create_category(
    State(state): State<AppState>,
    AppJson(new): AppJson<NewCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = run_db(&state, "create_category", move |conn| {
        fanout::create_category(conn, &new)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/v1/categories?skip=&limit=
async fn list_categories(
    State(state): State<AppState>,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Vec<Category>>> {
    let (skip, limit) = page.resolve(DEFAULT_PAGE_LIMIT);
    let categories = run_db(&state, "list_categories", move |conn| {
        db::list_categories(conn, skip, limit)
    })
    .await?;
    Ok(Json(categories))
}

/// GET /api/v1/categories/:id
async fn read_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> ApiResult<Json<Category>> {
    run_db(&state, "get_category", move |conn| db::get_category(conn, id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

/// POST /api/v1/reviews (create or update)
async fn create_or_update_review(
    State(state): State<AppState>,
    AppJson(review): AppJson<NewReview>,
) -> ApiResult<(StatusCode, Json<ReviewLogEntry>)> {
    let entry = run_db(&state, "record_review", move |conn| {
        reviews::record_review(conn, &review)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/v1/reviews?skip=&limit=
async fn list_reviews(
    State(state): State<AppState>,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Vec<ReviewLogEntry>>> {
    let (skip, limit) = page.resolve(DEFAULT_REVIEW_PAGE_LIMIT);
    let entries = run_db(&state, "list_reviews", move |conn| {
        db::list_reviews(conn, skip, limit)
    })
    .await?;
    Ok(Json(entries))
}

/// GET /api/v1/recommendations
async fn get_recommendations(State(state): State<AppState>) -> ApiResult<Json<Vec<Recommendation>>> {
    let recommendations = run_db(&state, "get_recommendations", |conn| {
        recommendations::get_recommendations(conn)
    })
    .await?;
    Ok(Json(recommendations))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/locations", get(list_locations).post(create_location))
        .route("/locations/:id", get(read_location))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id", get(read_category))
        .route("/reviews", get(list_reviews).post(create_or_update_review))
        .route("/recommendations", get(get_recommendations));

    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/v1", v1)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
