//! Agency CLI entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use agency::adapters::cli::CliChannel;
use agency::adapters::web::{AppState, WebChannel};
use agency::adapters::Channel;
use agency::agent::AgentRuntime;
use agency::config::Config;
use agency::ui;

#[derive(Parser)]
#[command(name = "agency")]
#[command(about = "🕵️ Agency - multi-step AI agent with a streaming chat backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and workspace
    Onboard,

    /// Start the web backend
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a task in the terminal
    Run {
        /// Task for the agent; omit for interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Forget previous conversation first
        #[arg(long)]
        reset: bool,
    },

    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agency=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            agency::config::onboard()?;
        }

        Commands::Serve { host, port } => {
            let mut config = agency::config::load()?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await?;
        }

        Commands::Run { message, reset } => {
            let config = agency::config::load()?;
            let runtime = AgentRuntime::from_config(&config).context("Failed to initialize the agent")?;
            let cli = CliChannel::new(Arc::new(runtime));

            match message {
                Some(task) => {
                    let outcome = cli.run_once(&task, reset).await;
                    if outcome.failed {
                        anyhow::bail!("Agent run failed");
                    }
                }
                None => {
                    ui::print_header("Interactive mode (type 'exit' to quit, 'reset' to forget)");
                    cli.start().await?;
                }
            }
        }

        Commands::Status => {
            let config = agency::config::load()?;
            print_status(&config);
        }
    }

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    ui::print_header("Web backend");

    std::fs::create_dir_all(&config.upload_dir)?;
    std::fs::create_dir_all(&config.output_dir)?;

    // The server still starts without an agent so the UI can report why.
    let runtime = match AgentRuntime::from_config(&config) {
        Ok(runtime) => {
            ui::print_success(&format!("Agent ready ({})", runtime.model()));
            Some(runtime)
        }
        Err(e) => {
            ui::print_warning(&format!("Agent not initialized: {}", e));
            None
        }
    };

    ui::print_step(&format!("http://{}:{}", config.server.host, config.server.port));
    let channel = WebChannel::new(AppState::new(config, runtime));
    channel.start().await?;

    ui::print_success("Server stopped");
    Ok(())
}

fn print_status(config: &Config) {
    ui::print_header("Status");
    ui::print_step(&format!("Config: {:?}", agency::config::config_path()));
    ui::print_step(&format!("Workspace: {:?}", config.workspace));
    ui::print_step(&format!("Provider: {}", config.provider));
    ui::print_step(&format!("Model: {}", config.model));
    ui::print_step(&format!("Max steps: {}", config.max_steps));
    ui::print_step(&format!("Uploads: {:?}", config.upload_dir));
    ui::print_step(&format!("Output: {:?}", config.output_dir));
    ui::print_step(&format!("Server: {}:{}", config.server.host, config.server.port));

    if config.gemini_api_key.is_empty() {
        ui::print_warning("Gemini API key not set (run 'agency onboard' or set GEMINI_API_KEY)");
    } else {
        ui::print_success("Gemini API key set");
    }

    if config.manifesto_path().exists() {
        ui::print_success("Agency manifesto found");
    } else {
        ui::print_warning("No agency manifesto in the workspace");
    }
}
