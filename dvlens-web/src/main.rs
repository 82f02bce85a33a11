use dvlens_core::analysis::AnalysisService;
use dvlens_core::config::CoreConfig;
use dvlens_web::{AppState, WebConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();

    dvlens_web::init_tracing();

    tracing::info!("Starting dvlens web server");

    let core_config = match CoreConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let web_config = WebConfig::load()?;
    tracing::info!("Configuration loaded successfully, port: {}", web_config.port);

    let service = AnalysisService::from_config(core_config)?;
    dvlens_web::serve(AppState::new(service, web_config)).await
}
