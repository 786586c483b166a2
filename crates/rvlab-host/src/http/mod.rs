pub mod api;

use std::sync::Arc;

use axum::Router;
use tokio::sync::broadcast;

use crate::error::HostError;
use crate::service::FolderService;

#[derive(Clone)]
pub struct HttpState {
    pub folders: Arc<FolderService>,
}

impl HttpState {
    pub fn new(folders: FolderService) -> Self {
        Self {
            folders: Arc::new(folders),
        }
    }
}

pub fn app(state: HttpState) -> Router {
    Router::new().nest("/api", api::router()).with_state(state)
}

pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), HostError> {
    let addr = listener
        .local_addr()
        .map_err(|e| HostError::Server(format!("local addr: {e}")))?;
    tracing::info!("HTTP server listening on http://{}", addr);
    let mut shutdown_rx = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| HostError::Server(format!("serve {addr}: {e}")))
}
