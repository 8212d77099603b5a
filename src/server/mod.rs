//! Local RPC server
//!
//! Binds the first free instance slot and serves each client on its own
//! task. Clients only ever talk to the UI through the [`EventRelay`].

mod connection;

pub use connection::{serve_connection, ConnectionState, RpcConnection};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, timeout};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::ipc::IpcListener;
use crate::relay::EventRelay;

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long live connections get to wind down before being aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// A running server bound to one instance slot
#[derive(Debug)]
pub struct RpcServer {
    address: String,
    slot: u8,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl RpcServer {
    /// Bind a slot and start accepting clients.
    ///
    /// Fails only when no slot can be bound or the config is invalid.
    pub async fn bind(config: RelayConfig, relay: EventRelay) -> Result<Self> {
        let listener = IpcListener::bind(&config).await?;
        let address = listener.address();
        let slot = listener.slot();

        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::new(config),
            relay,
            shutdown_rx,
        ));

        Ok(Self {
            address,
            slot,
            shutdown,
            accept_task,
        })
    }

    /// Socket path or pipe name clients connect to
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Stop accepting, end every live connection and release the slot
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.accept_task.await {
            warn!("Accept loop ended abnormally: {}", err);
        }
    }
}

async fn accept_loop(
    mut listener: IpcListener,
    config: Arc<RelayConfig>,
    relay: EventRelay,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(mut stream) => {
                    let conn = RpcConnection::new(&config, relay.clone());
                    info!("[{}] client connected", conn.id());
                    let config = Arc::clone(&config);
                    let shutdown = shutdown.clone();
                    connections.spawn(async move {
                        serve_connection(&mut *stream, conn, &config, shutdown).await;
                    });
                }
                Err(err) => {
                    warn!("Accept failed on {}: {}", listener.address(), err);
                    sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(err) = joined {
                    warn!("Connection task failed: {}", err);
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!("Waiting on {} live connections", connections.len());
    let drained = timeout(SHUTDOWN_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        connections.abort_all();
        while connections.join_next().await.is_some() {}
    }

    info!("Stopped listening on {}", listener.address());
}
