// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Online/offline state shared between the probe and the sync engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::remote::RemoteEndpoint;

/// Current connectivity, observable by any number of subscribers.
///
/// Repeated reports of the same state are swallowed, so subscribers only
/// wake on real transitions.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        ConnectivityMonitor { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the current state. Returns true if this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
        changed
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        ConnectivityMonitor::new(false)
    }
}

/// Poll `url` every `interval` and feed the result into `monitor`.
///
/// Returns when `cancel` fires.
pub async fn probe_loop<R: RemoteEndpoint>(
    remote: &R,
    url: &str,
    monitor: &ConnectivityMonitor,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        let online = tokio::select! {
            _ = cancel.cancelled() => return,
            online = remote.probe(url) => online,
        };
        monitor.set_online(online);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
