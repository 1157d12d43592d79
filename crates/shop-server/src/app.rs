//! Application wiring: hub, rate limiter, HTTP server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use shop_hub::spawn_hub;
use shop_ratelimit::RateLimiter;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::identity::{HeaderIdentityResolver, IdentityResolver};
use crate::routes::{create_router, AppState};

/// Main application.
pub struct Application {
    config: AppConfig,
    identity: Arc<dyn IdentityResolver>,
}

impl Application {
    /// Create a new application from validated configuration.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let identity = Arc::new(HeaderIdentityResolver::new(&config.identity));
        Ok(Self { config, identity })
    }

    /// Replace the identity resolver.
    pub fn with_identity_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.identity = resolver;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        let addr = self.config.server.bind_addr()?;
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Listening");

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// On shutdown the hub closes every session, which ends the open
    /// WebSocket connections so the HTTP server can drain.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (hub, hub_task) = spawn_hub(&self.config.hub);
        let limiter = Arc::new(RateLimiter::new(&self.config.rate_limit));
        let sweeper_shutdown = CancellationToken::new();
        let sweeper = limiter.spawn_sweeper(sweeper_shutdown.clone());

        info!(
            session_queue_capacity = self.config.hub.session_queue_capacity,
            heartbeat = self.config.hub.heartbeat.enabled,
            rate_limit = self.config.rate_limit.enabled,
            routes = self.config.rate_limit.routes.len(),
            "Realtime services started"
        );

        let state = AppState {
            hub: hub.clone(),
            limiter,
            identity: self.identity,
            heartbeat: self.config.hub.heartbeat.clone(),
        };
        let router = create_router(state, &self.config.server.cors_allowed_origins);

        let graceful = {
            let hub = hub.clone();
            let sweeper_shutdown = sweeper_shutdown.clone();
            async move {
                shutdown.await;
                info!("Shutdown signal received");
                sweeper_shutdown.cancel();
                hub.shutdown().await;
            }
        };

        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(graceful)
        .await;

        // Covers the server failing before a shutdown signal.
        sweeper_shutdown.cancel();
        hub.shutdown().await;
        drop(hub);

        if let Err(e) = sweeper.await {
            warn!(error = %e, "Rate limiter sweeper task failed");
        }
        if let Err(e) = hub_task.await {
            warn!(error = %e, "Hub task failed");
        }

        served?;
        info!("Shutdown complete");
        Ok(())
    }
}
