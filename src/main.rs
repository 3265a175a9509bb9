//! secureserve
//!
//! Shares a directory on the local network via HTTPS.

use std::path::{Path, PathBuf};

use clap::Parser;
use secureserve::config::{default_cert_dir, DEFAULT_WORD_LIST, USERNAME};
use secureserve::{ensure_certificate, generate_password, Credential, SecureServeResult, SecureServer};
use tracing_subscriber::EnvFilter;

/// Shares a directory via HTTPS, protected by a generated password.
#[derive(Parser, Debug)]
#[command(name = "secureserve")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The directory to serve
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub directory: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> SecureServeResult<()> {
    let cert_dir = default_cert_dir()?;
    let password = generate_password(Path::new(DEFAULT_WORD_LIST))?;
    let paths = ensure_certificate(&cert_dir)?;

    let server = SecureServer::builder(cli.directory)
        .load_certificates(paths.cert)
        .load_private_key(paths.key)
        .set_credential(Credential::new(USERNAME, password))
        .build()?;

    server.run(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        // without a signal handler, run until the process is killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
