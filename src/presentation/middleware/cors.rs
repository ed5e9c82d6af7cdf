//! CORS Middleware Configuration

use axum::http::{header, HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsSettings;

const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

/// Create CORS layer from settings
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins: Vec<_> = settings
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let headers: [HeaderName; 3] = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT_LANGUAGE,
    ];

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(ALLOWED_METHODS)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(ALLOWED_METHODS)
            .allow_headers(headers)
            .max_age(std::time::Duration::from_secs(3600))
    }
}
