use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use stream_compat::{
    config::VerifierConfig,
    memory::MemoryEndpoint,
    remote::RemoteEndpoint,
    server::CompatServer,
    verifier::Verifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = VerifierConfig::new(std::env::args())?;

    if let Some(serve_address) = &config.serve_address {
        let listener = TcpListener::bind(serve_address)
            .await
            .with_context(|| format!("binding candidate server to {}", serve_address))?;

        tracing::info!(address = %serve_address, "serving candidate engine");

        let server = CompatServer::new(Arc::new(MemoryEndpoint::new("candidate")));
        server.serve(listener).await;

        return Ok(());
    }

    let reference = RemoteEndpoint::connect("reference", &config.reference_address)
        .await
        .with_context(|| {
            format!(
                "connecting to reference endpoint at {}",
                config.reference_address
            )
        })?;
    let candidate = MemoryEndpoint::new("candidate");

    tracing::info!(
        reference = %config.reference_address,
        block_timeout_ms = config.block_timeout_ms,
        "running comparison suite"
    );

    let mut verifier = Verifier::new(Arc::new(reference), Arc::new(candidate));

    verifier
        .run_suite(config.block_timeout_ms)
        .await
        .context("running the comparison suite")?;

    verifier.print_summary();

    if !verifier.all_passed() {
        std::process::exit(1);
    }

    Ok(())
}
