use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use capstan_core::{CapabilityRegistry, MetricsRegistry};
use capstan_server::{build_platform, load_manifest, register_builtin};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "capstan-server", about = "Capstan capability runtime")]
struct Cli {
    /// Path to manifest TOML file
    #[arg(long, env = "CAPSTAN_MANIFEST", default_value = "./config/capstan.toml")]
    manifest: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!(version = capstan_core::VERSION, "Starting capstan-server");

    let cli = Cli::parse();
    let manifest_path = cli.manifest.canonicalize().with_context(|| {
        format!(
            "Manifest not found: {}. Create one or specify --manifest <path>",
            cli.manifest.display()
        )
    })?;
    tracing::info!(manifest = %manifest_path.display(), "Loading manifest");
    let manifest = load_manifest(&manifest_path)?;

    let metrics = Arc::new(MetricsRegistry::new());
    let registry = CapabilityRegistry::new();
    register_builtin(&registry, &metrics);

    let platform = build_platform(&registry, &manifest)?;
    platform.run_until(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
