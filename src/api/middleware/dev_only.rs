use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::server::RouteError;

/// Guards routes that must never run in a production build.
#[cfg(feature = "production")]
pub async fn dev_only(_req: Request, _next: Next) -> Result<Response, RouteError> {
    Err(RouteError::Forbidden("Disabled in production"))
}

#[cfg(not(feature = "production"))]
pub async fn dev_only(req: Request, next: Next) -> Result<Response, RouteError> {
    Ok(next.run(req).await)
}
