//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{FileCredentialStore, FileVaultStore, OpenAiCoachAdapter},
    auth::TokenManager,
    config::Config,
    error::ApiError,
    vault::VaultService,
    web::{
        build_router,
        state::{AppState, RateLimiter},
        ApiDoc,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Prepare the Data Directory & File Stores ---
    tokio::fs::create_dir_all(config.data_dir.join("vaults")).await?;
    let user_store = Arc::new(FileCredentialStore::new(&config.data_dir));
    let vault_store = Arc::new(FileVaultStore::new(&config.data_dir));
    info!("Data directory ready at {:?}", config.data_dir);

    // --- 3. Initialize the Coach Model Adapter ---
    let mut openai_config = OpenAIConfig::new().with_api_base(config.coach_api_base.clone());
    if let Some(api_key) = &config.coach_api_key {
        openai_config = openai_config.with_api_key(api_key);
    }
    let openai_client = Client::with_config(openai_config);
    let coach_adapter = Arc::new(OpenAiCoachAdapter::new(
        openai_client,
        config.coach_model.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        users: user_store,
        vaults: VaultService::new(
            vault_store,
            config.max_vault_size_bytes,
            config.conversation_history_limit,
            config.pbkdf2_iterations,
        ),
        coach: coach_adapter,
        tokens: TokenManager::new(&config.jwt_secret, config.token_expiry_secs),
        keys: Default::default(),
        session_contexts: Default::default(),
        profiles: Default::default(),
        progress: Default::default(),
        chat_limiter: RateLimiter::new(config.chat_rate_limit, config.chat_rate_window),
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = build_router(app_state, cors);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
