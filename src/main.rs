use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskboard::config::TaskboardConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about = "Kanban board service with optimistic drag-and-drop reconciliation")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory holding `.taskboard/` (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Explicit config file instead of `.taskboard/taskboard.toml`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the board HTTP + WebSocket server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Enable dev mode (CORS permissive for a local front-end dev server)
        #[arg(long)]
        dev: bool,
    },
    /// Create `.taskboard/` with a default config and an empty database
    Init {
        /// Also create an empty board with this name
        #[arg(long)]
        board: Option<String>,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Write a default taskboard.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = TaskboardConfig::resolve(&project_dir, cli.config.as_deref())?;
    let _log_guard = taskboard::logging::init_logging(&config.logging, cli.verbose)?;

    match &cli.command {
        Commands::Serve {
            port,
            host,
            db,
            dev,
        } => {
            let overrides = cmd::serve::ServeOverrides {
                port: *port,
                host: host.clone(),
                db_path: db.clone(),
                dev: *dev,
            };
            cmd::cmd_serve(&project_dir, config, overrides).await?;
        }
        Commands::Init { board } => cmd::cmd_init(&project_dir, &config, board.as_deref()).await?,
        Commands::Config { command } => {
            cmd::cmd_config(&project_dir, cli.config.as_deref(), &config, command.clone())?
        }
    }

    Ok(())
}
