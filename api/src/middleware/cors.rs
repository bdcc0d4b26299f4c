use axum::http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

/// Build the CORS layer for the API.
///
/// The handlers are called from mobile apps and the landing site, so any
/// origin is allowed. Preflight `OPTIONS` requests are answered by this layer.
///
/// - Methods: GET, POST, DELETE, OPTIONS
/// - Headers: Authorization, Content-Type
/// - Max age: 3600s
pub fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}
