//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the metadata store and staging disk

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::{collections::HashMap, path::Path};
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`: liveness only, no I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Pings the metadata store and round-trips a marker file through the
/// staging directory. 200 when both pass, 503 otherwise, with a per-check
/// breakdown in the body.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let store = match state.videos.ping().await {
        Ok(()) => CheckStatus::passed(),
        Err(e) => CheckStatus::failed(e),
    };
    let disk = disk_check(state.staging.dir()).await;

    let ready = store.ok && disk.ok;
    let checks = HashMap::from([("store", store), ("disk", disk)]);
    let (status, label) = if ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "error")
    };
    (
        status,
        Json(ReadyResponse {
            status: label.into(),
            checks,
        }),
    )
}

/// Write, read back and remove a marker file under `dir`.
async fn disk_check(dir: &Path) -> CheckStatus {
    const MARKER: &[u8] = b"readyz";
    let path = dir.join(format!(".readyz-{}", Uuid::new_v4()));

    if let Err(e) = fs::write(&path, MARKER).await {
        return CheckStatus::failed(format!("could not write marker: {e}"));
    }
    let read = fs::read(&path).await;
    let removed = fs::remove_file(&path).await;

    match (read, removed) {
        (Err(e), _) => CheckStatus::failed(format!("could not read marker: {e}")),
        (Ok(bytes), _) if bytes != MARKER => CheckStatus::failed("marker content mismatch"),
        // A leftover marker is worth reporting but does not make the disk unusable.
        (Ok(_), Err(e)) => CheckStatus {
            ok: true,
            error: Some(format!("could not remove marker: {e}")),
        },
        (Ok(_), Ok(())) => CheckStatus::passed(),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn passed() -> Self {
        Self { ok: true, error: None }
    }

    fn failed(reason: impl ToString) -> Self {
        Self {
            ok: false,
            error: Some(reason.to_string()),
        }
    }
}
