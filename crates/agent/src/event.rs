//! Lifecycle and fetch events delivered to the worker.

use std::fmt;
use std::future::Future;

use mikra_core::Request;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Event delivered by the host.
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Install => EventKind::Install,
            Event::Activate => EventKind::Activate,
            Event::Fetch(_) => EventKind::Fetch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Fetch => "fetch",
        })
    }
}

/// Signal from the worker asking the host to change client control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientSignal {
    /// Activate right after install instead of waiting for old clients to close.
    SkipWaiting,
    /// Take control of every open client without a reload.
    ClaimClients,
}

/// Extended lifetime of one event.
///
/// Work registered with `wait_until` runs in the background; the host awaits
/// `settled` before it treats the event as finished. Work spawned without
/// registration may be dropped when the host recycles the worker.
#[derive(Debug)]
pub struct Lifetime {
    tx: mpsc::UnboundedSender<JoinHandle<()>>,
    rx: mpsc::UnboundedReceiver<JoinHandle<()>>,
}

impl Lifetime {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Spawn `work` and keep the event alive until it completes.
    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(work);
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.tx.send(handle);
    }

    /// Wait for every registered task. Returns how many were awaited.
    pub async fn settled(self) -> usize {
        let Self { tx, mut rx } = self;
        drop(tx);

        let mut count = 0;
        while let Some(handle) = rx.recv().await {
            if let Err(e) = handle.await {
                tracing::warn!("extended event work failed: {}", e);
            }
            count += 1;
        }
        count
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_event_kind() {
        assert_eq!(Event::Install.kind(), EventKind::Install);
        assert_eq!(Event::Activate.kind().to_string(), "activate");
    }

    #[tokio::test]
    async fn test_settled_without_work() {
        assert_eq!(Lifetime::new().settled().await, 0);
    }

    #[tokio::test]
    async fn test_settled_waits_for_registered_work() {
        let done = Arc::new(AtomicUsize::new(0));
        let lifetime = Lifetime::new();

        for delay in [30, 10] {
            let done = done.clone();
            lifetime.wait_until(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(lifetime.settled().await, 2);
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_work_still_settles() {
        let lifetime = Lifetime::new();
        lifetime.wait_until(async { panic!("boom") });
        assert_eq!(lifetime.settled().await, 1);
    }
}
