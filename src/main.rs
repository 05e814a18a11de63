use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scribe_service::cli::{Cli, Commands};
use scribe_service::config::{Config, Credentials};
use scribe_service::storage::probe_connection;
use scribe_service::wiring::Services;
use scribe_service::{output, server, utils};

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "scribe_service=debug,scribe=debug,tower_http=debug"
    } else {
        "scribe_service=info,scribe=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).await?;

    let credentials_path = cli
        .credentials
        .clone()
        .or_else(|| config.app.credentials_file.clone());
    if let Some(path) = credentials_path {
        let credentials = Credentials::load(&path)
            .with_context(|| format!("Failed to load credentials from {}", path.display()))?;
        config.resolve_secrets(&credentials);
    }

    Ok(config)
}

async fn warn_missing_dependencies() {
    let missing = utils::check_dependencies().await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - the audio fallback will fail without them)");
    }
}

/// Token cancelled by the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

fn spinner(quiet: bool, message: &str) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    progress.set_message(message.to_string());
    progress.enable_steady_tick(Duration::from_millis(120));
    Ok(progress)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).await?;

    init_tracing(cli.verbose, config.app.json_logs);

    match cli.command {
        Commands::Serve { host, port } => {
            warn_missing_dependencies().await;

            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

            let services = Services::from_config(&config).await?;
            let state = services.into_state(&config, CancellationToken::new());

            server::serve(state, addr).await?;
            tracing::info!("Server stopped");
        }
        Commands::Resolve {
            url,
            language,
            format,
            output: output_path,
        } => {
            warn_missing_dependencies().await;

            let services = Services::from_config(&config).await?;
            let cancel = cancel_on_ctrl_c();
            let progress = spinner(cli.quiet, "Resolving transcript...")?;
            let started = Instant::now();

            let outcome = services
                .resolver
                .resolve(&url, language.as_deref(), &cancel)
                .await;
            progress.finish_and_clear();
            let resolved = outcome?;

            tracing::info!(
                source = ?resolved.transcript.source,
                lines = resolved.transcript.utterances.len(),
                elapsed = %utils::format_duration(started.elapsed().as_secs_f64()),
                "Transcript resolved"
            );

            match output_path {
                Some(path) => {
                    output::save_to_file(&resolved, &path, format)?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => output::print_to_console(&resolved, format)?,
            }
        }
        Commands::Metadata { url } => {
            let services = Services::from_config(&config).await?;
            let metadata = services.metadata.fetch_video_metadata(&url).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Commands::TestConnection => {
            let services = Services::from_config(&config).await?;
            let report = probe_connection(services.store.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => Config::config_path()?,
                };
                println!("Configuration file: {}", path.display());
                println!("Edit it to set the S3 bucket, API keys and speaker range.");
            }
        }
    }

    Ok(())
}
