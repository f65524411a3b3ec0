use std::path::PathBuf;
use std::process::ExitCode;

use beacon::config::Config;
use beacon::http::connection::ServeContext;
use beacon::server::{Dispatcher, listener};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Exit status for bad arguments.
const EXIT_USAGE: u8 = 5;

const USAGE: &str = "
USAGE:
beacon <PORT> <DOCUMENT_ROOT> [--config FILE]

PORT: Port to listen on. Integer in [1024, 65535]
DOCUMENT_ROOT: Path to the server's document root. Must exist and be readable
";

#[derive(Debug, Parser)]
#[command(name = "beacon", version, about = "Concurrent HTTP/1.0 static file server")]
struct Cli {
    /// Port to listen on, in [1024, 65535]
    port: u16,

    /// Directory files are served from
    document_root: PathBuf,

    /// Optional YAML configuration file
    #[arg(long, env = "BEACON_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            tracing::error!(error = %e, "Invalid arguments");
            return Ok(usage());
        }
    };

    let cfg = match Config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg.with_cli(cli.port, cli.document_root),
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Ok(usage());
        }
    };
    if let Err(e) = cfg.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Ok(usage());
    }

    let listener = listener::bind(&cfg.server)?;
    let dispatcher = Dispatcher::new(
        listener,
        cfg.server.max_connections,
        ServeContext::from_config(&cfg),
    );
    tracing::info!(
        document_root = %cfg.static_files.document_root.display(),
        max_connections = cfg.server.max_connections,
        "Serving files"
    );

    tokio::select! {
        res = dispatcher.run() => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn usage() -> ExitCode {
    print!("{USAGE}");
    ExitCode::from(EXIT_USAGE)
}
