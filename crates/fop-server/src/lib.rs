pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use fop_core::config::Config;
use fop_core::registry::EngineRegistry;
use fop_core::roster::Roster;
use fop_forwarder::{Forwarder, ForwarderConfig, HttpSink};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Platforms
        .route("/api/platforms", get(routes::platforms::list_platforms))
        .route("/api/platforms/{fop}", get(routes::platforms::get_platform))
        .route(
            "/api/platforms/{fop}/timer/athlete",
            get(routes::platforms::athlete_timer),
        )
        .route(
            "/api/platforms/{fop}/timer/break",
            get(routes::platforms::break_timer),
        )
        // Events (POST to emit, GET for the SSE stream)
        .route(
            "/api/platforms/{fop}/events",
            get(routes::events::sse_events).post(routes::events::post_event),
        )
        // Remote mirror receiver
        .route("/mirror/update", post(routes::mirror::receive_update))
        .route("/mirror/decision", post(routes::mirror::receive_decision))
        .route("/mirror/timer", post(routes::mirror::receive_timer))
        .route("/mirror/{fop}", get(routes::mirror::get_mirror))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start one engine per configured platform, mirror them when a remote URL
/// is configured, and serve HTTP until Ctrl-C. Engines and forwarders are
/// drained before returning.
pub async fn serve(config: Config, roster: Arc<dyn Roster>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(config, roster, listener).await
}

/// Like [`serve`], on a pre-bound listener so the caller can read the port
/// first (useful when `port = 0`).
pub async fn serve_on(
    config: Config,
    roster: Arc<dyn Roster>,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let registry = Arc::new(EngineRegistry::start(&config, roster));
    let forwarders = start_forwarders(&config, &registry)?;

    let app = build_router(state::AppState::new(
        registry.clone(),
        config.remote.update_key.clone(),
    ));
    let actual_port = listener.local_addr()?.port();
    tracing::info!(platforms = ?registry.names(), "FOP server listening on http://localhost:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    for f in forwarders {
        f.join().await;
    }
    tracing::info!("FOP server stopped");
    Ok(())
}

fn start_forwarders(config: &Config, registry: &EngineRegistry) -> anyhow::Result<Vec<Forwarder>> {
    let Some(url) = config.remote.update_url.as_deref().filter(|_| config.remote.is_enabled()) else {
        return Ok(Vec::new());
    };
    let sink = Arc::new(HttpSink::new(url, config.remote.timeout())?);
    tracing::info!(update = %sink.urls().update, "mirroring platforms to remote scoreboard");
    Ok(registry
        .handles()
        .map(|engine| {
            Forwarder::spawn(
                engine,
                ForwarderConfig::from_config(config, engine.name()),
                sink.clone(),
            )
        })
        .collect())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C, serving until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
