use axum::extract::{Path, State};
use axum::Json;
use fop_core::fop::FopStatus;
use fop_core::timer::TimerSnapshot;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/platforms: configured platform names.
pub async fn list_platforms(State(app): State<AppState>) -> Json<Vec<String>> {
    Json(app.registry.names())
}

/// GET /api/platforms/{fop}: current state, athletes, order, clocks and lights.
pub async fn get_platform(
    State(app): State<AppState>,
    Path(fop): Path<String>,
) -> Result<Json<FopStatus>, AppError> {
    let engine = app.registry.get(&fop)?;
    Ok(Json(engine.status().await?))
}

/// GET /api/platforms/{fop}/timer/athlete
pub async fn athlete_timer(
    State(app): State<AppState>,
    Path(fop): Path<String>,
) -> Result<Json<TimerSnapshot>, AppError> {
    Ok(Json(app.registry.get(&fop)?.resync_athlete_timer()))
}

/// GET /api/platforms/{fop}/timer/break
pub async fn break_timer(
    State(app): State<AppState>,
    Path(fop): Path<String>,
) -> Result<Json<TimerSnapshot>, AppError> {
    Ok(Json(app.registry.get(&fop)?.resync_break_timer()))
}
