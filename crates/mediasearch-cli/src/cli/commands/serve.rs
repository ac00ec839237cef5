//! Serve the HTTP API.

use std::net::SocketAddr;

use console::style;
use mediasearch::config::Settings;
use mediasearch_server::run_server;
use tracing::error;

use super::super::Runtime;

pub async fn cmd_serve(settings: Settings, port: u16) -> anyhow::Result<()> {
    let runtime = Runtime::initialize(settings)?;

    // The API schedules triage retries onto the in-process queue, so a
    // worker pool runs alongside the server.
    let worker = runtime.worker();
    tokio::spawn(async move {
        if let Err(e) = worker.run().await {
            error!(error = %e, "worker loop exited");
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!(
        "{} Search API on http://{addr} (openapi at /api/openapi.json)",
        style("▶").green()
    );
    run_server(runtime.app_state(), addr).await?;
    Ok(())
}
