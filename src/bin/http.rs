//! HTTP entry point for the leveling engine.
//!
//! Environment variables:
//! - `GANTT_LEVELER_HTTP_ADDR`: bind address (default `0.0.0.0:3000`)
//! - `RUST_LOG`: tracing filter directives, e.g. `gantt_leveler=debug` (default `info`)

#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::net::SocketAddr;

    use gantt_leveler::http_api;
    use tracing::info;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let addr: SocketAddr = std::env::var("GANTT_LEVELER_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;

    info!("gantt-leveler HTTP API listening on http://{addr}");
    http_api::serve(addr, http_api::AppState::new()).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
