use axum::extract::{Path, State};
use axum::{Form, Json};
use fop_forwarder::Channel;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::{AppState, MirrorEntry};

fn receive(
    app: &AppState,
    channel: Channel,
    fields: BTreeMap<String, String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !app.mirror.authorizes(&fields) {
        warn!(channel = %channel, "mirror payload with missing or wrong update key");
        return Err(AppError::unauthorized("missing or invalid updateKey"));
    }
    match app.mirror.record(channel, fields) {
        Some(fop) => {
            debug!(fop = %fop, channel = %channel, "mirror payload stored");
            Ok(Json(serde_json::json!({ "ok": true })))
        }
        None => Err(AppError(anyhow::anyhow!("payload names no platform"))),
    }
}

/// POST /mirror/update
pub async fn receive_update(
    State(app): State<AppState>,
    Form(fields): Form<BTreeMap<String, String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    receive(&app, Channel::Update, fields)
}

/// POST /mirror/decision
pub async fn receive_decision(
    State(app): State<AppState>,
    Form(fields): Form<BTreeMap<String, String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    receive(&app, Channel::Decision, fields)
}

/// POST /mirror/timer
pub async fn receive_timer(
    State(app): State<AppState>,
    Form(fields): Form<BTreeMap<String, String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    receive(&app, Channel::Timer, fields)
}

/// GET /mirror/{fop}: latest mirrored state; 404 until the first update.
pub async fn get_mirror(
    State(app): State<AppState>,
    Path(fop): Path<String>,
) -> Result<Json<MirrorEntry>, AppError> {
    app.mirror
        .get(&fop)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("no update received for platform '{fop}'")))
}
