use std::sync::Arc;

use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use medex_core::{
    AppConfig, CredentialsHandle, CredentialsProvider, CredentialsSource, EnvCredentials,
    JsonCredentials, Result,
};
use medex_extraction::{BatchExtractionPipeline, PipelineOptions};

mod handlers;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the process environment still applies.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("medex=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    config.validate()?;

    let provider: Box<dyn CredentialsProvider> = match config.credentials_source {
        CredentialsSource::Env => Box::new(EnvCredentials::new()),
        CredentialsSource::Json => Box::new(JsonCredentials::from_env()),
    };
    let credentials = CredentialsHandle::create(provider.as_ref())?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("medex/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(120))
        .build()?;
    let auth = Arc::new(medex_gcp::ServiceAccountTokenSource::new(client.clone(), credentials));

    let store = Arc::new(medex_gcp::GcsObjectStore::new(
        client.clone(),
        auth.clone(),
        config.gcp_bucket_name.clone(),
    ));
    let ocr = Arc::new(medex_gcp::DocumentAiClient::new(client, auth, &config.gcp_location));
    tracing::info!(
        bucket = store.bucket(),
        endpoint = ocr.endpoint(),
        processor = %config.processor_path(),
        "Google Cloud collaborators ready"
    );
    let pipeline = Arc::new(BatchExtractionPipeline::new(
        ocr,
        store.clone(),
        PipelineOptions::from_config(&config),
    ));
    let analysis = Arc::new(medex_analysis::OpenAiTransform::new(&config));

    let host = config.server_host.clone();
    let port = config.server_port;

    let state = AppState {
        config,
        store,
        pipeline,
        analysis,
        runs: Arc::new(RwLock::new(Vec::new())),
    };

    let app = routes::create_router()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{host}:{port}");
    tracing::info!("medex server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
