//! Worker service for coordinator mode
//!
//! Runs on each worker host. The service:
//! - Listens for a coordinator connection
//! - Runs the worker loop on that connection until TERMINATE
//! - Goes back to accepting for the next run
//!
//! One coordinator is served at a time. A failed run is logged and does not
//! stop the service.

use crate::worker::{Worker, WorkerSummary};
use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

/// TCP worker service
pub struct WorkerService {
    /// Port to listen on
    listen_port: u16,

    /// Host label used in logs
    node_id: String,
}

impl WorkerService {
    /// Create a new worker service
    pub fn new(listen_port: u16) -> Self {
        Self {
            listen_port,
            node_id: node_id(),
        }
    }

    /// Bind the listen port and serve coordinators forever
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.listen_port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind worker service on {}", addr))?;

        info!(port = self.listen_port, node = %self.node_id, "worker service listening");

        loop {
            match self.serve_one(&listener).await {
                Ok(summary) => info!(units = summary.units_computed, "run complete, waiting for next coordinator"),
                Err(e) => error!("run failed: {:#}", e),
            }
        }
    }

    /// Accept one coordinator connection and serve it until TERMINATE
    pub async fn serve_one(&self, listener: &TcpListener) -> Result<WorkerSummary> {
        let (stream, peer) = listener.accept().await.context("Failed to accept connection")?;
        info!(%peer, "coordinator connected");
        self.handle_connection(stream).await
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<WorkerSummary> {
        stream
            .set_nodelay(true)
            .context("Failed to configure coordinator connection")?;
        let (reader, writer) = stream.into_split();

        Worker::new(self.node_id.clone(), reader, writer).run().await
    }
}

/// Host name, or "unknown" if it cannot be determined
fn node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
