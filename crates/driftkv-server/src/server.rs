use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use driftkv_engine::Store;
use driftkv_replication::Replicator;

use crate::config::NodeConfig;
use crate::error::ServerResult;
use crate::handler;

/// A driftkv node: one store, one listening socket, and (on a replicating
/// master) the replication pipeline.
pub struct KvServer {
    config: NodeConfig,
    store: Arc<Store>,
    replicator: Option<Arc<Replicator>>,
}

impl KvServer {
    /// Open the store (running recovery) and build the replicator the
    /// configuration calls for. The node is not listening yet.
    pub fn new(config: NodeConfig) -> ServerResult<Self> {
        let replicator = config.replication_config().map(Replicator::start);
        let store = Store::open(config.store_config(), config.role, replicator.clone())?;
        Ok(Self {
            config,
            store,
            replicator,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn replicator(&self) -> Option<&Arc<Replicator>> {
        self.replicator.as_ref()
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an existing listener until `shutdown` resolves, then close
    /// the store (which stops workers and flushes state).
    pub async fn serve_on(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> ServerResult<()> {
        info!(
            addr = %listener.local_addr()?,
            role = %self.config.role,
            "driftkv listening"
        );
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        let store = Arc::clone(&self.store);
                        tokio::spawn(async move {
                            if let Err(e) = handler::handle_connection(store, stream).await {
                                debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }
        info!("shutting down");
        self.store.close()?;
        Ok(())
    }
}
