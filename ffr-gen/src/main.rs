//! ffr-gen - Funded file generator
//!
//! Fetches the post-close tracker view, reconciles every loan against the
//! loan-servicing and document-parsing sources, and writes a timestamped
//! funded-file workbook plus processing notes to the output directory.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ffr_common::config::{load_toml_config, CliOverrides, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ffr-gen
#[derive(Parser, Debug)]
#[command(name = "ffr-gen")]
#[command(about = "Generate the funded-file workbook from Airtable, Vesta and Parseur")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "FFR_CONFIG")]
    config: Option<PathBuf>,

    /// Template workbook
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Directory for the workbook and processing notes
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Airtable view to export
    #[arg(long)]
    view: Option<String>,

    /// Airtable personal access token
    #[arg(long, env = "AIRTABLE_TOKEN", hide_env_values = true)]
    airtable_token: Option<String>,

    /// Vesta API key
    #[arg(long, env = "VESTA_API_KEY", hide_env_values = true)]
    vesta_api_key: Option<String>,

    /// Parseur API key
    #[arg(long, env = "PARSEUR_API_KEY", hide_env_values = true)]
    parseur_api_key: Option<String>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            airtable_token: self.airtable_token.clone(),
            vesta_api_key: self.vesta_api_key.clone(),
            parseur_api_key: self.parseur_api_key.clone(),
            view: self.view.clone(),
            template: self.template.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ffr_gen=info,ffr_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    match generate(&args).await {
        // Printed directly so RUST_LOG filtering never hides the outcome
        Ok(summary) => {
            println!("\n{}\n", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("FATAL ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn generate(args: &Args) -> anyhow::Result<ffr_gen::RunSummary> {
    let toml = load_toml_config(args.config.as_deref())?;
    let config = Config::resolve(toml, args.overrides())?;

    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Template: {}", config.output.template.display());

    ffr_gen::run(&config).await
}
