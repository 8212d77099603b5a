//! Server and process scanner started and stopped as one unit

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::catalog::Catalog;
use crate::config::RelayConfig;
use crate::error::Result;
use crate::process::ProcessSource;
use crate::relay::{EventRelay, RelayReceiver};
use crate::scanner::ProcessScanner;
use crate::server::RpcServer;

/// A running presence bridge.
///
/// Both halves feed the [`RelayReceiver`] returned from [`start`](Self::start).
/// The receiver yields `None` once the bridge is stopped and every event has
/// been read.
#[derive(Debug)]
pub struct PresenceBridge {
    server: RpcServer,
    scanner_shutdown: watch::Sender<bool>,
    scanner_task: JoinHandle<()>,
}

impl PresenceBridge {
    /// Bind the server, then start scanning with `source` against `catalog`
    pub async fn start(
        config: RelayConfig,
        catalog: Catalog,
        source: Box<dyn ProcessSource>,
    ) -> Result<(Self, RelayReceiver)> {
        config.validate()?;
        let (relay, receiver) = EventRelay::channel();

        let poll_interval = config.poll_interval();
        let server = RpcServer::bind(config, relay.clone()).await?;

        let scanner = ProcessScanner::new(source, Arc::new(catalog), relay, poll_interval);
        let (scanner_shutdown, shutdown_rx) = watch::channel(false);
        let scanner_task = tokio::spawn(scanner.run(shutdown_rx));

        info!("Presence bridge running on {}", server.address());
        Ok((
            Self {
                server,
                scanner_shutdown,
                scanner_task,
            },
            receiver,
        ))
    }

    pub fn address(&self) -> &str {
        self.server.address()
    }

    pub fn slot(&self) -> u8 {
        self.server.slot()
    }

    pub async fn stop(self) {
        let _ = self.scanner_shutdown.send(true);
        if let Err(err) = self.scanner_task.await {
            warn!("Process scanner ended abnormally: {}", err);
        }
        self.server.close().await;
        info!("Presence bridge stopped");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::catalog::ApplicationSignature;
    use crate::process::{ProcessRecord, StaticSource};
    use crate::relay::RelayEvent;
    use std::time::Duration;

    #[tokio::test]
    async fn detected_process_reaches_receiver() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::default()
            .with_socket_dir(dir.path())
            .with_poll_interval(100);
        let catalog = Catalog::new(vec![ApplicationSignature::new("game1", "Game One", ["game1.exe"])]);
        let source = StaticSource::new(vec![ProcessRecord::new(100, "/games/game1.exe")]);

        let (bridge, mut rx) = PresenceBridge::start(config, catalog, Box::new(source))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        match event {
            Some(RelayEvent::Activity(n)) => assert_eq!(n.socket_id, "game1:100"),
            other => panic!("unexpected event: {other:?}"),
        }

        bridge.stop().await;
        assert!(matches!(rx.recv().await, Some(RelayEvent::Activity(n)) if n.activity.is_none()));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_binding() {
        let catalog = Catalog::default();
        let source = StaticSource::new(Vec::new());
        let err = PresenceBridge::start(RelayConfig::default().with_max_sockets(0), catalog, Box::new(source))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, crate::error::RelayError::InvalidConfig(_)));
    }
}
