use crate::config::{AllowedOrigins, CorsConfig};
use axum::http::{
    HeaderName, HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = match &config.allowed_origins {
        // A literal `*` is rejected by browsers when credentials are allowed.
        AllowedOrigins::Any if config.allow_credentials => AllowOrigin::mirror_request(),
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(origins) => AllowOrigin::list(origins.iter().filter_map(|o| {
            HeaderValue::from_str(o)
                .map_err(|e| warn!("ignoring invalid CORS origin {o:?}: {e}"))
                .ok()
        })),
    };

    let headers = [
        AUTHORIZATION,
        HeaderName::from_static("x-client-info"),
        HeaderName::from_static("apikey"),
        CONTENT_TYPE,
    ];

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(headers)
        .allow_credentials(config.allow_credentials)
        .max_age(Duration::from_secs(60 * 60))
}
