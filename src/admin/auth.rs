use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppContext;

/// Require `Authorization: Bearer <admin.api_key>` on every admin route.
///
/// The key is read per request so reloaded configuration takes effect
/// without a restart.
pub async fn admin_auth_middleware(
    State(context): State<AppContext>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let config = context.config();

    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == config.admin.api_key);

    if authorized {
        return Ok(next.run(request).await);
    }

    tracing::warn!(path = %request.uri().path(), "Rejected unauthenticated admin request");
    Err(StatusCode::UNAUTHORIZED)
}
