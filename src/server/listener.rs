//! Live tracking server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::live::LiveService;
use crate::server::auth::Authenticator;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::store::KvStore;
use crate::track::TrackRepository;
use crate::watch::{RegistryConfig, WatchRegistry};

/// Live tracking server
pub struct TrackServer<S: KvStore, A: Authenticator> {
    config: ServerConfig,
    service: Arc<LiveService<S>>,
    auth: Arc<A>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<S: KvStore, A: Authenticator> TrackServer<S, A> {
    /// Create a new server over a repository
    pub fn new(config: ServerConfig, repository: TrackRepository<S>, auth: A) -> Self {
        Self::with_registry_config(config, repository, auth, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(
        config: ServerConfig,
        repository: TrackRepository<S>,
        auth: A,
        registry_config: RegistryConfig,
    ) -> Self {
        let registry = Arc::new(WatchRegistry::with_config(registry_config));
        let service = LiveService::new(Arc::new(repository), registry);
        Self::with_service(config, Arc::new(service), auth)
    }

    /// Create a server around an existing service
    pub fn with_service(config: ServerConfig, service: Arc<LiveService<S>>, auth: A) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            service,
            auth: Arc::new(auth),
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get the live service
    pub fn service(&self) -> &Arc<LiveService<S>> {
        &self.service
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Track server listening");

        // Drop rooms members whose connection task died without leaving
        let prune_handle = self.service.registry().spawn_prune_task();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        prune_handle.abort();

        let stats = self.service.stats();
        tracing::info!(
            connections = stats.connections_total,
            points = stats.points_persisted,
            deliveries = stats.deliveries,
            dropped = stats.dropped_deliveries,
            "Track server stopped"
        );

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            conn = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let connection = Connection::new(
            connection_id,
            socket,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.service),
            Arc::clone(&self.auth),
        );

        tokio::spawn(async move {
            // Held for the lifetime of the connection
            let _permit = permit;

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    conn = connection_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(conn = connection_id, "Connection closed");
        });
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
