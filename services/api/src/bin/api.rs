//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, JsonFileStore, OpenAiModelAdapter},
    config::Config,
    error::ApiError,
    gateway::AiGateway,
    web::{self, middleware::USER_ID_HEADER, AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use medscan_core::ports::{GenerativeModel, KeyValueStore, ProfileRepository};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open Local Storage & (Optionally) the Profile Database ---
    let kv: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&config.data_dir)?);

    let profile_repository: Option<Arc<dyn ProfileRepository>> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Some(Arc::new(db_adapter) as Arc<dyn ProfileRepository>)
        }
        None => {
            warn!("DATABASE_URL is not set; signed-in profiles are kept in local storage.");
            None
        }
    };

    // --- 3. Initialize the Model Adapters ---
    let mut openai_config = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());
    if let Some(base_url) = &config.openai_base_url {
        openai_config = openai_config.with_api_base(base_url.clone());
    }
    let openai_client = Client::with_config(openai_config);

    let model = |name: &str| -> Arc<dyn GenerativeModel> {
        Arc::new(OpenAiModelAdapter::new(openai_client.clone(), name.to_string()))
    };
    let gateway = AiGateway::new(
        model(&config.report_model),
        model(&config.chat_model),
        model(&config.places_model),
        model(&config.message_model),
    );

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState::new(kv, profile_repository, gateway));

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static(USER_ID_HEADER)]);

    let app = web::router(app_state).layer(cors);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "OpenAPI document available at http://{}/api-docs/openapi.json",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
