//! Named periodic tickers.
//!
//! Every periodic task in the pipeline runs on its own timer and may
//! execute concurrently with the others; there is no shared event loop.
//! A tick returns [`ControlFlow`] so a ticker can cancel itself (the
//! registration handshake stops once confirmed or exhausted).

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

struct NamedTicker {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Owns the named tickers and their shutdown signal.
pub struct Scheduler {
    tickers: Vec<NamedTicker>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            tickers: Vec::new(),
            shutdown_tx,
        }
    }

    /// Spawn a ticker firing `tick` on the given period.
    ///
    /// The first tick fires immediately. The ticker stops when `tick`
    /// returns `Break` or when the scheduler shuts down.
    pub fn every<F, Fut>(&mut self, name: &'static str, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if tick().await.is_break() {
                            debug!("{} ticker cancelled itself", name);
                            break;
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
        self.tickers.push(NamedTicker { name, handle });
    }

    /// Signal all tickers and wait up to `grace` for each; tickers that
    /// outlive the grace period are aborted.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);
        for mut ticker in self.tickers {
            if time::timeout(grace, &mut ticker.handle).await.is_err() {
                warn!(
                    "{} ticker did not stop within the grace period, aborting",
                    ticker.name
                );
                ticker.handle.abort();
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
