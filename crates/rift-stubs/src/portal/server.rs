//! Stubs portal server.

use crate::portal::handler::handle_request;
use crate::stubs::StubRepository;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// HTTP listener serving stubbed responses
pub struct PortalServer {
    addr: SocketAddr,
    repository: Arc<StubRepository>,
}

impl PortalServer {
    pub fn new(addr: SocketAddr, repository: Arc<StubRepository>) -> Self {
        Self { addr, repository }
    }

    /// Run the portal server
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve stub requests on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!(
            "Stubs portal listening on http://{} ({} stubs loaded)",
            listener.local_addr()?,
            self.repository.len()
        );

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let repository = Arc::clone(&self.repository);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let repository = Arc::clone(&repository);
                    async move { handle_request(req, repository).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Portal connection error: {}", e);
                }
            });
        }
    }
}
