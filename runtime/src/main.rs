// Copyright 2026 Quizchain Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use quizchain_runtime::cli;
use quizchain_runtime::config::Config;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "quizchain",
    about = "Quizchain — headless solver for chains of web quiz pages",
    version,
    after_help = "Configuration is read from QUIZCHAIN_* environment variables (and .env)."
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Override the per-chain time budget in seconds
    #[arg(long, global = true)]
    budget: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the solve API over HTTP
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        /// Port to listen on
        #[arg(long, short, default_value = "7860")]
        port: u16,
    },
    /// Solve one chain locally and print the trace as JSON
    Solve {
        /// Quiz URL to start from
        url: String,
        /// Email submitted with each answer
        #[arg(long)]
        email: String,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "quizchain={level},quizchain_runtime={level},tower_http=warn"
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    init_tracing(&cli.log_level, cli.log_format);

    let mut config = Config::from_env()?;
    if let Some(secs) = cli.budget {
        config.time_budget = Duration::from_secs(secs);
    }

    let result = match cli.command {
        Commands::Serve { bind, port } => cli::serve::run(config, SocketAddr::new(bind, port)).await,
        Commands::Solve { url, email } => cli::solve_cmd::run(&config, &url, &email).await,
        Commands::Doctor => cli::doctor::run(&config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "quizchain", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
