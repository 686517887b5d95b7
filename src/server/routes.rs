use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use http::HeaderValue;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::error::ApiError;
use super::pages;
use super::CollectionState;
use crate::library::{ImagePage, Navigation, WorkQuery};
use crate::paths;
use crate::status::StatusKind;

const DEFAULT_IMAGE_LIMIT: usize = 50;

type Params = HashMap<String, String>;

pub fn shell_router(frontend: Arc<Value>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/config", get(frontend_config))
        .with_state(frontend)
}

/// Routes for one collection under `/{category}`.
///
/// Everything below `/api/` shares one catch-all so that `list`, `detail/`,
/// `chapter/` and `status/` take precedence over a bare work path.
pub fn collection_router(state: CollectionState) -> Router {
    let prefix = format!("/{}", state.library.collection().category());
    Router::new()
        .route(&prefix, get(index_page))
        .route(&format!("{prefix}/"), get(index_page))
        .route(&format!("{prefix}/api/{{*path}}"), get(api_get).post(api_post))
        .route(&format!("{prefix}/image/{{*path}}"), get(serve_image))
        .route(&format!("{prefix}/reader/{{*path}}"), get(reader_page))
        .with_state(state)
}

#[derive(Debug, PartialEq, Eq)]
enum ApiEndpoint<'a> {
    List,
    Detail(&'a str),
    Chapter(&'a str),
    Status(&'a str),
}

impl<'a> ApiEndpoint<'a> {
    fn parse(path: &'a str) -> Self {
        let path = path.trim_start_matches('/');
        if path == "list" {
            ApiEndpoint::List
        } else if let Some(rest) = path.strip_prefix("detail/") {
            ApiEndpoint::Detail(rest)
        } else if let Some(rest) = path.strip_prefix("chapter/") {
            ApiEndpoint::Chapter(rest)
        } else if let Some(rest) = path.strip_prefix("status/") {
            ApiEndpoint::Status(rest)
        } else {
            ApiEndpoint::Detail(path)
        }
    }
}

async fn home() -> Redirect {
    Redirect::to("/manga/")
}

async fn frontend_config(State(frontend): State<Arc<Value>>) -> Json<Value> {
    Json(frontend.as_ref().clone())
}

async fn index_page(State(state): State<CollectionState>) -> Html<String> {
    Html(pages::index_page(state.library.collection()))
}

async fn reader_page(
    State(state): State<CollectionState>,
    Path(chapter_path): Path<String>,
) -> Html<String> {
    Html(pages::reader_page(state.library.collection(), &chapter_path))
}

async fn api_get(
    State(state): State<CollectionState>,
    Path(path): Path<String>,
    Query(params): Query<Params>,
) -> Result<Response, ApiError> {
    match ApiEndpoint::parse(&path) {
        ApiEndpoint::List => list_works(state, &params).await,
        ApiEndpoint::Detail(work_path) => work_detail(state, work_path, &params).await,
        ApiEndpoint::Chapter(chapter_path) => chapter_images(state, chapter_path, &params).await,
        ApiEndpoint::Status(item_path) => Ok(get_status(&state, item_path).into_response()),
    }
}

async fn api_post(
    State(state): State<CollectionState>,
    Path(path): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    match ApiEndpoint::parse(&path) {
        ApiEndpoint::Status(item_path) => set_status(state, item_path, body).await,
        _ => Err(ApiError::NotFound(format!("no POST endpoint at {path}"))),
    }
}

fn int_param(params: &Params, key: &str) -> Option<i64> {
    params.get(key).and_then(|value| value.trim().parse().ok())
}

fn flag_param(params: &Params, key: &str, default: bool) -> bool {
    params
        .get(key)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn text_param(params: &Params, key: &str) -> Option<String> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn status_param(params: &Params) -> Result<Option<StatusKind>, ApiError> {
    text_param(params, "status")
        .map(|value| {
            value
                .parse::<StatusKind>()
                .map_err(|err| ApiError::InvalidInput(err.to_string()))
        })
        .transpose()
}

/// Out-of-range or unparsable paging falls back to the collection defaults.
fn work_query(state: &CollectionState, params: &Params) -> Result<WorkQuery, ApiError> {
    let settings = &state.settings;
    let page = int_param(params, "page")
        .filter(|page| *page >= 1)
        .map(|page| page as usize)
        .unwrap_or(1);
    let per_page = int_param(params, "per_page")
        .filter(|per_page| *per_page >= 1)
        .map(|per_page| per_page as usize)
        .unwrap_or(settings.per_page)
        .min(settings.max_per_page);

    Ok(WorkQuery {
        page,
        per_page,
        skip_chapter_detail: flag_param(params, "skip_chapters", settings.skip_chapters_on_list),
        search: text_param(params, "search"),
        filter_tag: text_param(params, "filter_tag"),
        status: status_param(params)?,
    })
}

async fn list_works(state: CollectionState, params: &Params) -> Result<Response, ApiError> {
    let query = work_query(&state, params)?;
    debug!(collection = %state.library.collection(), ?query, "listing works");

    let page = tokio::task::spawn_blocking(move || {
        state.library.list_works(&query, state.status.as_deref())
    })
    .await?;
    Ok(Json(page).into_response())
}

async fn work_detail(
    state: CollectionState,
    work_path: &str,
    params: &Params,
) -> Result<Response, ApiError> {
    let filter = status_param(params)?;
    let work_path = work_path.to_string();

    let detail = tokio::task::spawn_blocking(move || {
        state
            .library
            .work_detail(&work_path, filter, state.status.as_deref())
    })
    .await?;

    detail
        .map(|detail| Json(detail).into_response())
        .ok_or_else(|| ApiError::NotFound("work not found".to_string()))
}

#[derive(Debug, Serialize)]
struct ChapterResponse {
    images: Vec<String>,
    total: usize,
    navigation: Navigation,
}

async fn chapter_images(
    state: CollectionState,
    chapter_path: &str,
    params: &Params,
) -> Result<Response, ApiError> {
    let paging = if params.contains_key("offset") || params.contains_key("limit") {
        let offset = int_param(params, "offset").unwrap_or(0).max(0) as usize;
        let limit = int_param(params, "limit")
            .filter(|limit| *limit >= 1)
            .map(|limit| limit as usize)
            .unwrap_or(DEFAULT_IMAGE_LIMIT);
        Some((offset, limit))
    } else {
        None
    };

    let max_age = state.settings.chapter_max_age;
    let chapter_path = chapter_path.to_string();
    let library = Arc::clone(&state.library);

    let response = tokio::task::spawn_blocking(move || {
        let page = match paging {
            Some((offset, limit)) => library.chapter_images_page(&chapter_path, offset, limit),
            None => library.chapter_images(&chapter_path).map(|images| ImagePage {
                total: images.len(),
                images,
            }),
        }?;
        Some(ChapterResponse {
            images: page.images,
            total: page.total,
            navigation: library.navigation(&chapter_path),
        })
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("chapter not found".to_string()))?;

    let mut response = Json(response).into_response();
    apply_max_age(&mut response, max_age);
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

fn status_item_id(item_path: &str) -> String {
    paths::encode(&paths::decode(item_path))
}

/// Without a status store every item reads as reviewed.
fn get_status(state: &CollectionState, item_path: &str) -> Json<Value> {
    let status = match &state.status {
        Some(store) => store.get_status(
            state.library.collection().category(),
            &status_item_id(item_path),
        ),
        None => StatusKind::Reviewed,
    };
    Json(json!({ "status": status }))
}

async fn set_status(
    state: CollectionState,
    item_path: &str,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|err| ApiError::InvalidInput(err.body_text()))?;
    let status = body
        .status
        .parse::<StatusKind>()
        .map_err(|err| ApiError::InvalidInput(err.to_string()))?;
    let store = state
        .status
        .clone()
        .ok_or_else(|| ApiError::Unconfigured("status store is not configured".to_string()))?;

    let category = state.library.collection().category();
    let item_id = status_item_id(item_path);
    tokio::task::spawn_blocking(move || store.set_status(category, &item_id, status)).await?;

    Ok(Json(json!({ "success": true, "status": status })).into_response())
}

async fn serve_image(
    State(state): State<CollectionState>,
    Path(image_path): Path<String>,
) -> Result<Response, ApiError> {
    let library = Arc::clone(&state.library);
    let lookup_path = image_path.clone();
    let file = tokio::task::spawn_blocking(move || library.image_file(&lookup_path))
        .await?
        .ok_or_else(|| ApiError::NotFound("image not found".to_string()))?;

    let bytes = tokio::fs::read(&file).await.map_err(|err| {
        debug!(path = %file.display(), error = %err, "failed to read image");
        ApiError::NotFound("image not found".to_string())
    })?;

    let mut response = ([(CONTENT_TYPE, HeaderValue::from_static(content_type(&file)))], bytes)
        .into_response();
    apply_max_age(&mut response, state.settings.image_max_age);
    Ok(response)
}

fn apply_max_age(response: &mut Response, max_age: Option<u32>) {
    if let Some(seconds) = max_age {
        if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={seconds}")) {
            response.headers_mut().insert(CACHE_CONTROL, value);
        }
    }
}

fn content_type(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}
