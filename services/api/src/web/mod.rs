pub mod account;
pub mod auth;
pub mod chat;
pub mod middleware;
pub mod progress;
pub mod protocol;
pub mod state;
pub mod ws_handler;

// Re-export the pieces the binary needs to build the web server router.
pub use middleware::{attach_user_if_present, require_admin, require_auth};
pub use state::AppState;
pub use ws_handler::ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        account::me_handler,
        account::get_vault_handler,
        account::put_vault_handler,
        account::export_handler,
        account::delete_conversations_handler,
        account::delete_account_handler,
        chat::chat_handler,
        progress::get_progress_handler,
        progress::post_progress_handler,
        progress::assessment_handler,
        progress::admin_summary_handler,
    ),
    components(schemas(
        auth::RegisterRequest,
        auth::LoginRequest,
        account::DeleteAccountRequest,
        progress::MilestoneRequest,
        progress::AssessmentRequest,
    )),
    tags(
        (name = "Minimalism Coach API", description = "API endpoints for the encrypted-vault minimalism coach.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router Assembly
//=========================================================================================

/// Builds the full API router over a shared [`AppState`]. Used by the binary
/// and by the integration tests.
pub fn build_router(app_state: Arc<AppState>, cors: CorsLayer) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/register", post(auth::register_handler))
        .route("/api/login", post(auth::login_handler));

    // Routes that work anonymously but pick up vault context when signed in
    let optional_auth_routes = Router::new()
        .route("/api/chat", post(chat::chat_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            attach_user_if_present,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/logout", post(auth::logout_handler))
        .route("/api/account/me", get(account::me_handler))
        .route(
            "/api/account/vault",
            get(account::get_vault_handler).put(account::put_vault_handler),
        )
        .route("/api/account/export", post(account::export_handler))
        .route(
            "/api/account/conversations",
            delete(account::delete_conversations_handler),
        )
        .route("/api/account", delete(account::delete_account_handler))
        .route(
            "/api/progress",
            get(progress::get_progress_handler).post(progress::post_progress_handler),
        )
        .route("/api/assessment", post(progress::assessment_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Admin routes: require_auth runs first (outermost), then require_admin.
    let admin_routes = Router::new()
        .route(
            "/api/admin/progress-summary",
            get(progress::admin_summary_handler),
        )
        .layer(axum_middleware::from_fn(require_admin))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(optional_auth_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state)
}
