// dvlens CLI - analyze distributed-validator logs from disk or run the web server

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dvlens_core::analysis::{AnalysisMode, AnalysisRequest, AnalysisService};
use dvlens_core::config::CoreConfig;
use dvlens_core::corpus::{decode_log_bytes, infer_file_type, LogFile, GENERIC_FILE_TYPE};
use dvlens_core::error::classify;
use dvlens_core::response::AnalysisOutcome;
use dvlens_web::{AppState, WebConfig, DEFAULT_LOG_FILTER};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dvlens")]
#[command(about = "Health reports for Obol distributed validator logs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one or more log files
    Analyze {
        /// Log files to analyze
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// File type for files whose name does not reveal it (e.g. charon, validator)
        #[arg(long = "type")]
        file_type: Option<String>,

        /// Use local analysis instead of the AI provider
        #[arg(long)]
        local: bool,

        /// Print the JSON response envelope
        #[arg(long)]
        json: bool,
    },

    /// Start the web server
    Serve {
        /// Port to listen on (default: 3000)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze {
            files,
            file_type,
            local,
            json,
        } => {
            let succeeded = run_analyze(&files, file_type.as_deref(), local, json).await?;
            if !succeeded {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Serve { port } => {
            let core_config = CoreConfig::load()?;
            let mut web_config = WebConfig::load()?;
            if let Some(port) = port {
                web_config.port = port;
            }
            info!("Starting web server on port {}", web_config.port);

            let service = AnalysisService::from_config(core_config)?;
            if let Err(e) = dvlens_web::serve(AppState::new(service, web_config)).await {
                error!("Web server stopped: {}", e);
                eprintln!("❌ Failed to start web server: {}", e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Returns whether the analysis succeeded.
async fn run_analyze(
    paths: &[PathBuf],
    file_type: Option<&str>,
    local: bool,
    json: bool,
) -> Result<bool> {
    let files = paths
        .iter()
        .map(|path| read_log_file(path, file_type))
        .collect::<Result<Vec<_>>>()?;

    let config = CoreConfig::load()?;
    let service = AnalysisService::from_config(config)?;
    let mode = if local {
        AnalysisMode::Local
    } else {
        AnalysisMode::Remote
    };

    let outcome = match AnalysisRequest::from_parts(None, Some(files), mode) {
        Ok(request) => service.analyze(request).await,
        Err(e) => AnalysisOutcome::Failure(classify(&e)),
    };
    let succeeded = outcome.is_success();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.into_envelope())?);
        return Ok(succeeded);
    }

    match outcome {
        AnalysisOutcome::Success {
            text,
            model_used,
            notice,
            ..
        } => {
            if let Some(notice) = notice {
                eprintln!("⚠️  {}", notice);
            }
            info!("Analysis produced by {}", model_used);
            println!("{}", text);
        }
        AnalysisOutcome::Failure(failure) => {
            eprintln!("❌ {}", failure.message);
        }
    }
    Ok(succeeded)
}

fn read_log_file(path: &Path, declared_type: Option<&str>) -> Result<LogFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let file_type = infer_file_type(&name)
        .or(declared_type)
        .unwrap_or(GENERIC_FILE_TYPE)
        .to_string();

    Ok(LogFile::new(name, file_type, decode_log_bytes(&bytes)))
}
