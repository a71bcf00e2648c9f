/// HTTP server setup and routing
use crate::{
    api::middleware::error_envelope,
    context::AppContext,
    error::{WardenError, WardenResult},
};
use axum::{
    http::{header, HeaderValue, Method, Uri},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Origin always allowed besides the configured client
const DEV_CLIENT_ORIGIN: &str = "http://localhost:3000";

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = cors_layer(&ctx.config.service.client_url);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .fallback(not_found)
        .with_state(ctx)
        .layer(middleware::from_fn(error_envelope))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Credentialed CORS for the web client
fn cors_layer(client_url: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = [client_url.trim_end_matches('/'), DEV_CLIENT_ORIGIN]
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Health check handler
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 404 handler
async fn not_found(method: Method, uri: Uri) -> WardenError {
    WardenError::NotFound(format!("Cannot {} {}", method, uri.path()))
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> WardenResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Warden listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WardenError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| WardenError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
