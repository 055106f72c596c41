use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use fop_core::events::{FopEvent, Origin};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/platforms/{fop}/events: submit one FOP event.
///
/// Answers 202 once the engine has applied it. Rule violations come back to
/// this caller only and leave the platform unchanged.
pub async fn post_event(
    State(app): State<AppState>,
    Path(fop): Path<String>,
    Json(event): Json<FopEvent>,
) -> Result<impl IntoResponse, AppError> {
    let engine = app.registry.get(&fop)?;
    let name = event.kind.name();
    if let Err(e) = engine.submit(event).await {
        info!(fop = %fop, event = name, error = %e, "event refused");
        return Err(e.into());
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": name })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub origin: Option<String>,
}

/// GET /api/platforms/{fop}/events: SSE stream of UI events.
///
/// Events caused by `origin` that the caller already shows are left out. A
/// client that falls behind receives a `resync` event with both clocks.
pub async fn sse_events(
    State(app): State<AppState>,
    Path(fop): Path<String>,
    Query(q): Query<StreamQuery>,
) -> Result<impl IntoResponse, AppError> {
    let engine = app.registry.get(&fop)?;
    let origin = q.origin.map(Origin::new).unwrap_or_else(|| Origin::unique("sse"));
    debug!(fop = %fop, origin = %origin, "event stream opened");

    let rx = engine.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| {
        let event = match msg {
            Ok(ev) if ev.is_echo_for(&origin) => return None,
            Ok(ev) => Event::default().event(ev.kind.name()).json_data(&ev).ok(),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                warn!(fop = %engine.name(), origin = %origin, missed, "stream lagged, resyncing");
                let clocks = serde_json::json!({
                    "athlete": engine.resync_athlete_timer(),
                    "pause": engine.resync_break_timer(),
                });
                Event::default().event("resync").json_data(clocks).ok()
            }
        };
        event.map(Ok::<Event, Infallible>)
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
