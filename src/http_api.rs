// HTTP REST API: auth, logbook CRUD, admin listing and Word export

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Form, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{CurrentUser, JwtKeys, MaybeUser};
use crate::db::Database;
use crate::error::AppError;
use crate::export::{self, image::ImageResolver, DOCX_MIME};
use crate::models::{
    GenerateBody, GenerateEntry, LogbookEntryIn, LogbookEntryOut, LoginForm, Token, UserCreate,
    UserOut,
};
use crate::services::{BlobStore, LogbookService, UserService};

/// Base64 images travel inside JSON bodies.
const BODY_LIMIT: usize = 25 * 1024 * 1024;

// Extractors whose rejections render as `{"detail": ...}` like every other error
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
struct AppJson<T>(T);

#[derive(FromRequest)]
#[from_request(via(Form), rejection(AppError))]
struct AppForm<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
struct AppPath<T>(T);

pub struct AppState {
    pub jwt: JwtKeys,
    pub users: UserService,
    pub logbook: LogbookService,
    pub storage: Option<Arc<dyn BlobStore>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        db: Database,
        jwt: JwtKeys,
        allow_admin_registration: bool,
        storage: Option<Arc<dyn BlobStore>>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            jwt,
            users: UserService::new(db.clone(), allow_admin_registration),
            logbook: LogbookService::new(db, storage.clone()),
            storage,
            http,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/logbook", get(list_entries).post(create_entry))
        .route("/logbook/{entry_id}", put(update_entry).delete(delete_entry))
        .route("/admin/logbook", get(admin_list_entries))
        .route(
            "/api/generate-word",
            post(generate_word).get(generate_word_status),
        )
        .route("/api/health", get(health_check))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(user_in): AppJson<UserCreate>,
) -> Result<Json<UserOut>, AppError> {
    let user = state.users.register(user_in).await?;
    Ok(Json(user))
}

async fn login(
    State(state): State<Arc<AppState>>,
    AppForm(form): AppForm<LoginForm>,
) -> Result<Json<Token>, AppError> {
    let user = state
        .users
        .authenticate(&form.username, &form.password)
        .await?;
    let token = state.jwt.issue(user.id)?;
    info!("User {} logged in", user.id);
    Ok(Json(Token::bearer(token)))
}

async fn list_entries(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<LogbookEntryOut>>, AppError> {
    Ok(Json(state.logbook.list(&user).await?))
}

async fn create_entry(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppJson(entry): AppJson<LogbookEntryIn>,
) -> Result<Json<LogbookEntryOut>, AppError> {
    Ok(Json(state.logbook.create(&user, entry).await?))
}

async fn update_entry(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(entry_id): AppPath<i64>,
    AppJson(entry): AppJson<LogbookEntryIn>,
) -> Result<Json<LogbookEntryOut>, AppError> {
    Ok(Json(state.logbook.update(&user, entry_id, entry).await?))
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(entry_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    state.logbook.delete(&user, entry_id).await?;
    Ok(Json(json!({ "status": "deleted" })))
}

async fn admin_list_entries(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<LogbookEntryOut>>, AppError> {
    if !user.is_admin {
        return Err(AppError::Forbidden("Admin only".to_string()));
    }
    Ok(Json(state.logbook.list_all().await?))
}

async fn generate_word_status() -> Json<Value> {
    Json(json!({ "status": "generate-word" }))
}

/// Authenticated callers export their stored entries; anyone else exports
/// the entries posted in the body.
async fn generate_word(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    body: Bytes,
) -> Result<Response, AppError> {
    let entries: Vec<GenerateEntry> = match user {
        Some(user) => {
            let rows = state
                .logbook
                .list_own(&user)
                .await
                .map_err(|e| AppError::Document(e.to_string()))?;
            info!("Exporting {} stored entries for user {}", rows.len(), user.id);
            rows.into_iter().map(GenerateEntry::from).collect()
        }
        None => {
            let mut entries = parse_generate_body(&body)?.entries;
            export::sort_entries(&mut entries);
            info!("Exporting {} posted entries", entries.len());
            entries
        }
    };

    let resolver = ImageResolver::new(&state.http, state.storage.as_deref());
    let rows = export::prepare_rows(entries, &resolver).await;
    let document = export::render(&rows)?;

    let filename = export::filename(chrono::Local::now().naive_local());
    Ok((
        [
            (header::CONTENT_TYPE, DOCX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        document,
    )
        .into_response())
}

fn parse_generate_body(body: &[u8]) -> Result<GenerateBody, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(GenerateBody::default());
    }
    match serde_json::from_slice::<Option<GenerateBody>>(body) {
        Ok(parsed) => Ok(parsed.unwrap_or_default()),
        Err(e) => Err(AppError::Validation(format!("invalid request body: {}", e))),
    }
}
