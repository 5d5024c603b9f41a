//! Server lifecycle with deferred startup.
//!
//! `new()` allocates the shutdown controller, `start()` binds the listener,
//! and `serve()` runs the router until the shutdown future resolves. The
//! application wires its services between `start()` and `serve()`, once the
//! bound port is known.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::middleware::{build_http_layers, in_flight_middleware, trace_id_middleware};
use super::shutdown::ShutdownController;

pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Shared controller, handed to health handlers before serving starts.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Wraps `routes` in the trace-id, in-flight and transport layers.
    #[must_use]
    pub fn wrap(&self, routes: Router) -> Router {
        routes
            .layer(axum::middleware::from_fn_with_state(
                Arc::clone(&self.shutdown),
                in_flight_middleware,
            ))
            .layer(axum::middleware::from_fn(trace_id_middleware))
            .layer(build_http_layers(&self.config))
    }

    /// Binds the listener and returns the bound address. With port 0 the OS
    /// picks the port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let local = listener.local_addr()?;
        info!(%local, "listener bound");

        self.listener = Some(listener);
        Ok(local)
    }

    /// Serves `routes` until `shutdown` resolves or the controller is
    /// triggered directly, then drains.
    ///
    /// Once `shutdown` fires the state moves to Draining (readiness turns
    /// 503 and new API requests are refused), open connections finish, and
    /// in-flight requests get up to `drain_timeout` to complete.
    ///
    /// # Errors
    ///
    /// Returns an error when `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        self,
        routes: Router,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.wrap(routes);
        let listener = self
            .listener
            .context("start() must be called before serve()")?;
        let controller = self.shutdown;

        controller.set_ready();
        info!("serving HTTP");

        let signal = {
            let controller = Arc::clone(&controller);
            let mut triggered = controller.shutdown_receiver();
            async move {
                tokio::select! {
                    () = shutdown => {}
                    _ = triggered.wait_for(|stop| *stop) => {}
                }
                info!("shutdown requested, draining");
                controller.trigger_shutdown();
            }
        };
        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        if controller.wait_for_drain(self.config.drain_timeout).await {
            info!("all requests drained");
        } else {
            warn!(
                in_flight = controller.in_flight_count(),
                "drain timeout expired with requests outstanding"
            );
        }
        Ok(())
    }
}
