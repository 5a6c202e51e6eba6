//! Admin API server.

use crate::admin_api::router::route_request;
use crate::stubs::StubRepository;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// State shared by every admin request.
#[derive(Debug)]
pub struct AdminState {
    pub repository: Arc<StubRepository>,
    /// Directory relative body files in posted stubs resolve against.
    pub base_dir: PathBuf,
    pub started_at: Instant,
    /// Wall-clock start time reported by `/status`.
    pub started_at_utc: chrono::DateTime<chrono::Utc>,
}

impl AdminState {
    pub fn new(repository: Arc<StubRepository>, base_dir: PathBuf) -> Self {
        Self {
            repository,
            base_dir,
            started_at: Instant::now(),
            started_at_utc: chrono::Utc::now(),
        }
    }
}

/// Admin API server for the stub repository
pub struct AdminApiServer {
    addr: SocketAddr,
    state: Arc<AdminState>,
}

impl AdminApiServer {
    /// Create a new admin API server
    pub fn new(addr: SocketAddr, state: Arc<AdminState>) -> Self {
        Self { addr, state }
    }

    /// Run the admin API server
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve admin requests on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!("Admin API listening on http://{}", listener.local_addr()?);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { route_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Admin API connection error: {}", e);
                }
            });
        }
    }
}
