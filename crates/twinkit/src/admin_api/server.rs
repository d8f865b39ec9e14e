//! Admin API server.

use crate::admin_api::router::route_request;
use crate::twin::Twin;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Admin API server for a twin
pub struct AdminApiServer {
    addr: SocketAddr,
    twin: Arc<Twin>,
}

impl AdminApiServer {
    pub fn new(addr: SocketAddr, twin: Arc<Twin>) -> Self {
        Self { addr, twin }
    }

    /// Bind the configured address and serve until the task is dropped.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener. Tests bind port 0 and read the
    /// assigned address before calling this.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!(
            "Admin API for twin '{}' listening on http://{}",
            self.twin.name(),
            listener.local_addr()?
        );

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let twin = Arc::clone(&self.twin);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let twin = Arc::clone(&twin);
                    async move { route_request(req, twin).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Admin API connection error: {}", e);
                }
            });
        }
    }
}
