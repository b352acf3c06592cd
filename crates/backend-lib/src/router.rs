// ============================
// authority-backend/src/router.rs
// ============================
//! HTTP routes of the account service.
use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, admin, auth, users};
use crate::middleware::login_throttle;
use crate::AppState;

/// Create the account service router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let login = post(auth::login).route_layer(from_fn_with_state(state.clone(), login_throttle));

    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/auth/signup", post(auth::signup))
        .route("/users", post(auth::signup))
        .route("/auth/login", login)
        .route("/auth/logout", post(auth::logout))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/verify-token", post(auth::verify_token))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/update-profile", post(auth::update_profile))
        .route("/users/me", get(users::me).delete(users::delete_me))
        .route("/admin/users", get(admin::list_users))
        // numeric id for lookup and edits, username for deletion
        .route(
            "/admin/users/{user}",
            get(admin::get_user).patch(admin::update_user).delete(admin::delete_user),
        )
        .route("/admin/users/{user}/toggle-active", post(admin::toggle_active))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
