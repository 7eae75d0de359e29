use anyhow::Context as _;
use clap::Parser as _;
use opendota_mcp_server::app::build_app;
use opendota_mcp_server::config::Cli;
use opendota_mcp_server::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format)?;

    let upstream = cli.upstream();
    let app = build_app(&upstream)
        .await
        .with_context(|| format!("build MCP app for {}", upstream.base_url))?;

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("bind {}", cli.bind))?;
    tracing::info!(addr = %listener.local_addr()?, "Serving MCP at /mcp");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
