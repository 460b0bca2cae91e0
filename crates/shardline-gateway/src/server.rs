use std::future::{Future, IntoFuture};
use std::sync::Arc;

use shardline_store::ObjectStore;
use shardline_types::RequestContext;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::handler::AppState;
use crate::router::build_router;

/// Shardline HTTP gateway over an initialized object store.
pub struct ShardlineServer {
    config: GatewayConfig,
    store: Arc<dyn ObjectStore>,
    root: RequestContext,
}

impl ShardlineServer {
    pub fn new(config: GatewayConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            store,
            root: RequestContext::background(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Server-wide context every request context derives from.
    pub fn root_context(&self) -> &RequestContext {
        &self.root
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        let state = AppState::new(
            Arc::clone(&self.store),
            self.root.clone(),
            self.config.request_timeout(),
        );
        build_router(state, self.config.max_body_bytes)
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// Once `shutdown` resolves the listener stops accepting, the root
    /// context is cancelled so in-flight backend calls abort, and open
    /// connections get `shutdown_timeout_secs` to drain.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        info!(addr = %listener.local_addr()?, "gateway listening");

        let root = self.root.clone();
        let signal = async move {
            shutdown.await;
            info!("shutting down gateway");
            root.cancel();
        };

        let grace = self.config.shutdown_timeout();
        let stopping = self.root.clone();
        let drain_deadline = async move {
            stopping.token().cancelled().await;
            tokio::time::sleep(grace).await;
        };

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .into_future();
        tokio::select! {
            result = server => result?,
            _ = drain_deadline => warn!(?grace, "graceful shutdown timed out, dropping connections"),
        }
        info!("gateway stopped");
        Ok(())
    }
}

impl std::fmt::Debug for ShardlineServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardlineServer")
            .field("config", &self.config)
            .finish()
    }
}
