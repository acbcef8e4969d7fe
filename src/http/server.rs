//! Admin HTTP server and the process-scoped application context.
//!
//! # Responsibilities
//! - Build the application context (registry, executor, downstream clients)
//! - Create the Axum router with admin and health handlers
//! - Wire up middleware (tracing, timeout)
//! - Apply configuration reloads
//! - Serve until the shutdown signal fires

use arc_swap::ArcSwap;
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::{handlers::health, setup_admin_router};
use crate::clients::{ClientError, ServiceClients};
use crate::config::ManagerConfig;
use crate::resilience::{BreakerListener, BreakerRegistry, GuardedExecutor, TracingListener};

/// Everything a request handler or an outbound caller needs, shared via Arc.
///
/// Built once at startup by the composition root and injected wherever
/// breakers are used; there is no global registry.
#[derive(Clone)]
pub struct AppContext {
    config: Arc<ArcSwap<ManagerConfig>>,
    registry: Arc<BreakerRegistry>,
    executor: GuardedExecutor,
    clients: Arc<ArcSwap<ServiceClients>>,
}

impl AppContext {
    /// Context whose breakers report to the tracing/metrics listener.
    pub fn new(config: ManagerConfig) -> Result<Self, ClientError> {
        Self::with_listeners(config, vec![Arc::new(TracingListener)])
    }

    pub fn with_listeners(
        config: ManagerConfig,
        listeners: Vec<Arc<dyn BreakerListener>>,
    ) -> Result<Self, ClientError> {
        let registry = Arc::new(BreakerRegistry::with_listeners(
            config.breakers.clone(),
            listeners,
        ));
        let executor = GuardedExecutor::new(registry.clone());
        let clients = ServiceClients::from_config(&config.services, &executor)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            registry,
            executor,
            clients: Arc::new(ArcSwap::from_pointee(clients)),
        })
    }

    pub fn config(&self) -> Arc<ManagerConfig> {
        self.config.load_full()
    }

    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    pub fn executor(&self) -> &GuardedExecutor {
        &self.executor
    }

    pub fn clients(&self) -> Arc<ServiceClients> {
        self.clients.load_full()
    }

    /// Swap in a reloaded configuration.
    ///
    /// Breaker layers apply to breakers created from now on. If the new
    /// service endpoints cannot be turned into clients the old clients stay.
    pub fn apply_config(&self, config: ManagerConfig) {
        self.registry.reload(config.breakers.clone());

        match ServiceClients::from_config(&config.services, &self.executor) {
            Ok(clients) => self.clients.store(Arc::new(clients)),
            Err(e) => {
                tracing::error!(error = %e, "Keeping previous downstream clients");
            }
        }

        if config.admin.bind_address != self.config.load().admin.bind_address {
            tracing::warn!("admin.bind_address changes require a restart");
        }
        self.config.store(Arc::new(config));
    }
}

/// Admin HTTP server.
pub struct HttpServer {
    router: Router,
    context: AppContext,
}

impl HttpServer {
    pub fn new(context: AppContext) -> Self {
        let router = Self::build_router(&context);
        Self { router, context }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(context: &AppContext) -> Router {
        let timeout = Duration::from_secs(context.config().admin.request_timeout_secs);

        Router::new()
            .route("/health", get(health))
            .merge(setup_admin_router(context.clone()))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(timeout)),
            )
    }

    /// The router, for serving elsewhere or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Serve on `listener`, applying config updates, until shutdown fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ManagerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin server starting");

        let context = self.context.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        let reloader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => context.apply_config(config),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Admin server received shutdown signal");
            })
            .await?;

        reloader.abort();
        tracing::info!("Admin server stopped");
        Ok(())
    }
}
