use std::error::Error;

use cascade_core::{Core, bootstrap_from_env};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("cascade failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let boot = bootstrap_from_env().await?;
    let state = boot.state;
    let global = state.global.clone();
    let snapshot = state.snapshot();

    info!(
        host = %global.host,
        port = global.port,
        fallback_budget = global.fallback_budget,
        proxy = %global.proxy.as_deref().unwrap_or(""),
        stream_idle_timeout_secs = global.stream_idle_timeout_secs,
        "config loaded"
    );
    for (position, provider) in snapshot.providers().iter().enumerate() {
        info!(
            position,
            provider = %provider.name,
            model = %provider.model,
            base_url = %provider.base_url,
            timeout_ms = provider.timeout.as_millis() as u64,
            max_retries = provider.max_retries,
            "provider enabled"
        );
    }

    let core = Core::new(state);
    let app = core.router();

    let bind = global.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("cascade=info,cascade_core=info,cascade_provider_impl=info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
