use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::arg;
use clap::command;
use clap::Parser;
use reqwest::Client;
use tokio::signal::unix::{signal, SignalKind};
use token_provider::helpers::time::SystemClock;
use token_provider::resilience::retry::RetrySettings;
use token_provider::server;
use token_provider::sinks::manager::SinkManager;
use token_provider::sinks::sink_file::FileSink;
use token_provider::sources::fetch::HttpTokenSource;
use token_provider::sources::{login_channel, LoginSender};
use token_provider::utils::config_loader;
use token_provider::utils::logging;
use token_provider::utils::logging::LogLevel;
use token_provider::TokenProvider;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "token-provider.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL" , value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Collaborators: source, login state, clock
    // -------------------------------

    let clock = Arc::new(SystemClock);
    let source = HttpTokenSource::new(Client::new(), service_config.source.clone(), clock.clone());
    let (login_tx, login_rx) = login_channel(service_config.settings.login.authenticated);
    let retry = RetrySettings::from_config(&service_config.settings.retry);
    info!(?retry, authenticated = login_rx.is_authenticated(), "token provider configured");

    let provider = TokenProvider::new(source, login_rx, clock, retry);

    // -------------------------------
    // 3. Consumer: file sink / log
    // -------------------------------

    let sink_manager = SinkManager::new(
        service_config.sink.as_ref().map(FileSink::new),
        Duration::from_millis(service_config.settings.resubscribe_delay_ms),
    );

    // -------------------------------
    // 4. Metrics server
    // -------------------------------

    let http_server = async {
        server::server::start(&service_config.settings).await?;
        // nothing to serve: keep the select below waiting on the other branches
        std::future::pending::<Result<()>>().await
    };

    info!("Service starting...");
    tokio::select! {
        _ = sink_manager.run(provider) => {}
        res = http_server => res?,
        res = handle_signals(login_tx) => res?,
    }

    sink_manager.cleanup().await;
    info!("Exiting application.");
    Ok(())
}

/// SIGUSR1 logs in, SIGUSR2 logs out, SIGINT/SIGTERM return.
async fn handle_signals(login_tx: LoginSender) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut login = signal(SignalKind::user_defined1())?;
    let mut logout = signal(SignalKind::user_defined2())?;

    loop {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C). Initiating graceful shutdown...");
                return Ok(());
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM. Initiating graceful shutdown...");
                return Ok(());
            }
            _ = login.recv() => {
                info!("Received SIGUSR1, login state: authenticated");
                login_tx.set(true);
            }
            _ = logout.recv() => {
                info!("Received SIGUSR2, login state: not authenticated");
                login_tx.set(false);
            }
        }
    }
}
