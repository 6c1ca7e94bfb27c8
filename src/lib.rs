pub mod api;
pub mod config;
pub mod services;
pub mod utils;

use crate::config::RelayConfig;
use crate::services::delivery::DocumentStore;
use crate::services::identity::IdentityVerifier;
use axum::{
    Router,
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_document,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::upload::UploadResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "upload", description = "Upload relay endpoint"),
        (name = "system", description = "Liveness endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<dyn IdentityVerifier>,
    pub documents: Arc<dyn DocumentStore>,
    pub config: RelayConfig,
}

pub fn create_app(state: AppState) -> Router {
    let cors = match state
        .config
        .allowed_origin
        .as_deref()
        .and_then(|origin| origin.parse::<HeaderValue>().ok())
    {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/upload",
            post(api::handlers::upload::upload_document)
                .options(preflight)
                .fallback(method_not_allowed)
                .route_layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                ))
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_file_size as usize + 10 * 1024 * 1024, // multipart overhead headroom
                )),
        )
        .layer(cors)
        .with_state(state)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> api::error::AppError {
    api::error::AppError::MethodNotAllowed
}
