//! Maps HTTP methods to coordinator calls; translates coordinator outcomes
//! to status codes (§4.6, §6).

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use eoss_common::EossError;
use eoss_coordinator::{encode, Existence};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

const VERSION_HEADER: &str = "x-eoss-object-version";

fn object_version(headers: &HeaderMap) -> Option<String> {
    headers
        .get(VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn existence_to_error(existence: Existence) -> Option<EossError> {
    match existence {
        Existence::Absent => Some(EossError::NotFound),
        Existence::Init => Some(EossError::StateInit),
        Existence::Staged => Some(EossError::StateStaged),
        Existence::Lost => Some(EossError::Lost),
        Existence::Present => None,
    }
}

pub async fn put_object(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if state.config.safemode {
        return EossError::Safemode.into_response();
    }

    let version = object_version(&headers);
    let object_name = encode(&filename, version.as_deref(), &state.config.version_salt);

    let lock = match state.locks.acquire_exclusive(&object_name) {
        Ok(lock) => lock,
        Err(e) => return e.into_response(),
    };

    let result = state
        .coordinator
        .put(&object_name, &filename, version.as_deref(), &body)
        .await;
    state.locks.release(lock);

    match result {
        Ok(()) => (StatusCode::CREATED, "Object Uploaded").into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_object(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Response {
    let version = object_version(&headers);
    let object_name = encode(&filename, version.as_deref(), &state.config.version_salt);

    let lock = match state.locks.acquire_shared(&object_name) {
        Ok(lock) => lock,
        Err(e) => return e.into_response(),
    };

    let existence = match state.coordinator.check_exists(&object_name).await {
        Ok(existence) => existence,
        Err(e) => {
            state.locks.release(lock);
            return e.into_response();
        }
    };

    if let Some(err) = existence_to_error(existence) {
        state.locks.release(lock);
        return err.into_response();
    }

    let path = state.coordinator.storage_path().join(&object_name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(object_name, error = %e, "final file vanished between check_exists and read");
            state.locks.release(lock);
            return EossError::Lost.into_response();
        }
    };
    // Safe to drop the lock before the body is fully written to the
    // socket (§4.3/§9): the open file handle already kept the bytes alive.
    state.locks.release(lock);

    let disposition = format!("attachment; filename=\"{filename}\"");
    (
        [(header::CONTENT_DISPOSITION, disposition)],
        bytes,
    )
        .into_response()
}

pub async fn head_object(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Response {
    let version = object_version(&headers);
    let object_name = encode(&filename, version.as_deref(), &state.config.version_salt);

    let existence = match state.coordinator.check_exists(&object_name).await {
        Ok(existence) => existence,
        Err(e) => return e.into_response(),
    };

    match existence_to_error(existence) {
        Some(err) => err.into_response(),
        None => (StatusCode::OK, "Object Exists").into_response(),
    }
}

pub async fn delete_object(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Response {
    if state.config.safemode {
        return EossError::Safemode.into_response();
    }

    let version = object_version(&headers);
    let object_name = encode(&filename, version.as_deref(), &state.config.version_salt);

    let lock = match state.locks.acquire_exclusive(&object_name) {
        Ok(lock) => lock,
        Err(e) => return e.into_response(),
    };

    let existence = match state.coordinator.check_exists(&object_name).await {
        Ok(existence) => existence,
        Err(e) => {
            state.locks.release(lock);
            return e.into_response();
        }
    };

    let result = match existence_to_error(existence) {
        Some(err) => Err(err),
        None => state.coordinator.delete(&object_name).await,
    };
    state.locks.release(lock);

    match result {
        Ok(()) => (StatusCode::OK, "Object Deleted").into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn stats(State(state): State<AppState>) -> Response {
    let mut session = match state.coordinator.db().session().await {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let stats = match session.stats().await {
        Ok(stats) => stats,
        Err(e) => return e.into_response(),
    };
    session.close().await;

    Json(json!({
        "total_number_objects": stats.total,
        "total_storage_usage": stats.total_bytes,
        "youngest_object_updated_timestamp": stats.youngest,
        "oldest_object_updated_timestamp": stats.oldest,
        "number_object_uploaded": stats.closed,
        "number_object_upload_init": stats.init,
        "number_object_saved_in_temp_name": stats.staged,
    }))
    .into_response()
}

pub async fn bad_method() -> Response {
    EossError::BadMethod.into_response()
}

pub async fn fallback_unknown_route() -> Response {
    // §4.6: any bare 404 the framework would otherwise produce for an
    // unmatched route is hardened to 403, with no body.
    StatusCode::FORBIDDEN.into_response()
}
