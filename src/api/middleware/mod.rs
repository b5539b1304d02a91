pub mod dev_only;

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

#[cfg(feature = "production")]
pub fn cors_layer(_allow_origins: &str) -> CorsLayer {
    use http::request::Parts as RequestParts;

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(
            |org: &HeaderValue, _rq_pts: &RequestParts| {
                org.as_bytes()
                    .ends_with(crate::constants::ORIGIN_URL_ENDSWITH)
            },
        ))
}

/// `*` allows any origin; otherwise a comma-separated list of accepted origin suffixes.
#[cfg(not(feature = "production"))]
pub fn cors_layer(allow_origins: &str) -> CorsLayer {
    use http::request::Parts as RequestParts;

    let allowed = if allow_origins.trim() == "*" {
        AllowOrigin::any()
    } else {
        let suffixes: Vec<String> = allow_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();

        AllowOrigin::predicate(move |org: &HeaderValue, _rq_pts: &RequestParts| {
            suffixes
                .iter()
                .any(|s| org.as_bytes().ends_with(s.as_bytes()))
        })
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(allowed)
}
