use std::{net::SocketAddr, path::PathBuf};

use axum::{
    routing::{get, post, put},
    Router,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use qrdada::{api, config::RenderConfig, openapi, state::AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let host = std::env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("BACKEND_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let defaults = RenderConfig::default();
    let config = RenderConfig {
        upload_root: std::env::var("UPLOAD_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_root),
        redirect_base_url: std::env::var("REDIRECT_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}")),
        default_font_path: std::env::var("DEFAULT_FONT_PATH").ok().map(PathBuf::from),
        max_logo_bytes: std::env::var("MAX_LOGO_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_logo_bytes),
    };

    let state = AppState::new(config);
    let openapi = openapi::ApiDoc::openapi();

    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi))
        .route("/health", get(api::health))
        .route("/qr", post(api::create_qr))
        .route("/qr/{id}", put(api::edit_qr).delete(api::delete_qr))
        .route("/qr/{id}/image", get(api::qr_image))
        .route("/qr/{id}/render", post(api::render_qr))
        .route("/preview", post(api::preview))
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}").parse().expect("bind addr");
    info!("Starting qrdada-backend on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind");
    axum::serve(listener, app).await.expect("serve");
}
