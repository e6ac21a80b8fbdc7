use pdf_triage_service::{ServiceConfig, create_app};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing: JSON by default, human-readable with LOG_FORMAT=pretty
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "pdf_triage_service=debug,triage_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServiceConfig::from_env();
    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY not set, parameter extraction will fail until it is provided");
    }

    let port = config.port;
    info!(
        archive_root = %config.archive_root.display(),
        local_model_url = %config.local_model_url,
        openai_model = %config.openai_model,
        "Loaded configuration"
    );

    let app = create_app(config)?;
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let addr = listener.local_addr()?;

    info!("PDF Triage Service starting on {}", addr);
    info!("Upload endpoint: POST http://{}/api/upload", addr);
    info!("Download endpoint: GET http://{}/api/download", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
