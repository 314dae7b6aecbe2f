//! `restgate <CONFIG_DIR> <TOOLS_DIR>`

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use restgate_core::{ConfigStore, GatewayConfig, ToolFactories};
use restgate_gateway::{shutdown_signal, GatewayServer, ShutdownOutcome, ToolSource};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const LOG_PREFIX: &str = "restgate";

#[derive(Debug, Parser)]
#[command(name = "restgate", version, about = "MCP gateway in front of a REST backend")]
struct Cli {
    /// Directory holding config.json
    config_dir: PathBuf,
    /// Directory of tool manifests
    tools_dir: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Development convenience only
    dotenvy::dotenv().ok();

    let config = match GatewayConfig::load(&cli.config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("restgate: {}", e);
            return ExitCode::from(1);
        }
    };

    let _guard = init_tracing(config.logging.directory.as_deref());

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("restgate: failed to start async runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli, config)) {
        Ok(ShutdownOutcome::Graceful) => ExitCode::SUCCESS,
        Ok(ShutdownOutcome::TimedOut) => {
            warn!("Connections still open after the grace period, exiting");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("restgate: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli, config: GatewayConfig) -> anyhow::Result<ShutdownOutcome> {
    let config = Arc::new(config);
    info!(
        config_dir = %cli.config_dir.display(),
        tools_dir = %cli.tools_dir.display(),
        "Starting restgate v{}",
        env!("CARGO_PKG_VERSION")
    );

    let tools = ToolSource::from_config(config.clone(), cli.tools_dir, ToolFactories::default())
        .await
        .context("Failed to load tools")?;

    let server = GatewayServer::new(
        config.as_ref().clone(),
        tools,
        ConfigStore::new(cli.config_dir),
    )?;
    server.run(shutdown_signal()).await
}

/// Console logging, plus daily-rotated files when `log_dir` is set
///
/// `RUST_LOG` takes precedence over the built-in defaults. The returned
/// guard flushes the file writer and must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,restgate_core=debug,restgate_gateway=debug"));

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let file = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: Failed to create logs directory: {}", e);
            return None;
        }
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_PREFIX)
            .filename_suffix("log")
            .build(dir)
        {
            Ok(appender) => Some(tracing_appender::non_blocking(appender)),
            Err(e) => {
                eprintln!("Warning: Failed to create log file appender: {}", e);
                None
            }
        }
    });

    let (file_writer, guard) = match file {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
