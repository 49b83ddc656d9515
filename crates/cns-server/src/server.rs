use std::future::{Future, IntoFuture};
use std::sync::Arc;

use cns_service::ObjectService;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Object store HTTP server.
///
/// Owns the object service lifecycle: the listener is bound first so probes
/// answer during recovery, then the service is set up, and after the server
/// drains on shutdown the service is torn down.
pub struct CnsServer {
    config: ServerConfig,
    service: Arc<ObjectService>,
}

impl CnsServer {
    pub fn new(config: ServerConfig, service: Arc<ObjectService>) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(Arc::clone(&self.service)))
    }

    /// Serve until Ctrl-C or SIGTERM.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "cns server listening");
        self.run(listener, signal).await
    }

    /// Serve on an already-bound listener until `signal` resolves.
    pub async fn run<F>(self, listener: TcpListener, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let stop = CancellationToken::new();
        let stopped = stop.clone();
        let shutdown = async move {
            tokio::select! {
                _ = signal => info!("shutdown signal received"),
                _ = stopped.cancelled() => {}
            }
        };

        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .into_future();
        let server = tokio::spawn(server);

        if let Err(e) = self.service.setup().await {
            error!(error = %e, "object service setup failed; stopping server");
            stop.cancel();
            let _ = server.await;
            return Err(ServerError::Setup(e));
        }
        info!("object service ready");

        let served = server
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        served?;

        info!("server drained; tearing down object service");
        self.service.teardown().map_err(ServerError::Teardown)
    }
}

/// Resolves on Ctrl-C, or on SIGTERM where supported.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use cns_crypto::EncryptionKey;
    use cns_service::Phase;
    use cns_store::ShardedStore;
    use tokio::sync::oneshot;

    use super::*;

    fn service() -> Arc<ObjectService> {
        let port = Arc::new(ShardedStore::new(NonZeroUsize::new(4).unwrap()));
        Arc::new(ObjectService::builder(EncryptionKey::generate(), port).build().unwrap())
    }

    #[test]
    fn server_construction() {
        let server = CnsServer::new(ServerConfig::default(), service());
        assert_eq!(server.config().bind_addr.port(), 8080);
        let _router = server.router();
    }

    #[tokio::test]
    async fn run_sets_up_serves_and_tears_down() {
        let service = service();
        let server = CnsServer::new(ServerConfig::default(), Arc::clone(&service));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(server.run(listener, async move {
            let _ = rx.await;
        }));

        while service.phase() != Phase::Serving {
            tokio::task::yield_now().await;
        }
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(service.phase(), Phase::Closed);
    }
}
