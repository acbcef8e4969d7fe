pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppContext;

pub fn setup_admin_router(context: AppContext) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(list_breakers))
        .route("/admin/breakers/reset", post(reset_breakers))
        .route("/admin/breakers/{name}", get(get_breaker))
        .layer(middleware::from_fn_with_state(
            context.clone(),
            admin_auth_middleware,
        ))
        .with_state(context)
}
