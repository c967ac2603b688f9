//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::middleware::auth_middleware;
use crate::handlers::{addresses, auth, health};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create the API routes
///
/// Paths keep their trailing slash; `/addresses` and `/addresses/` are
/// distinct routes.
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/authentication/login/", post(auth::login_handler));

    // Protected routes (token required)
    let protected_routes = Router::new()
        .route("/authentication/logout/", post(auth::logout_handler))
        .route(
            "/addresses/",
            get(addresses::list_addresses)
                .post(addresses::create_address)
                .delete(addresses::delete_addresses),
        )
        .route(
            "/addresses/:id/",
            get(addresses::get_address).put(addresses::update_address),
        )
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
