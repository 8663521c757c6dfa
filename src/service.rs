//! Feed supervision and report routing.
//!
//! The poll ticker keeps the upstream connection alive and hands each
//! drained batch of sentences to a decode worker, so a tick never
//! blocks on decode or publish latency. Decoded movement reports are
//! coalesced in the downsample cache, except for known fishing vessels
//! which bypass the cache and are delivered immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::cache::{DownsampleCache, FailedDeliveryQueue};
use crate::config::FeedConfig;
use crate::decoder;
use crate::exchange::ExchangeService;
use crate::feed::AisFeed;
use crate::models::DecodedReport;
use crate::registration::RegistrationStateMachine;

pub struct AisService {
    config: FeedConfig,
    feed: Mutex<Box<dyn AisFeed>>,
    cache: Arc<DownsampleCache>,
    failed: Arc<FailedDeliveryQueue>,
    exchange: Arc<ExchangeService>,
    registration: Arc<RegistrationStateMachine>,
    decode_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AisService {
    pub fn new(
        config: FeedConfig,
        feed: Box<dyn AisFeed>,
        cache: Arc<DownsampleCache>,
        failed: Arc<FailedDeliveryQueue>,
        exchange: Arc<ExchangeService>,
        registration: Arc<RegistrationStateMachine>,
    ) -> Self {
        Self {
            config,
            feed: Mutex::new(feed),
            cache,
            failed,
            exchange,
            registration,
            decode_tasks: Mutex::new(Vec::new()),
        }
    }

    /// One feed-poll tick: reconnect if needed, drain buffered
    /// sentences and hand them to a decode worker.
    pub async fn poll_feed(&self) {
        if !self.config.enabled {
            return;
        }
        let mut feed = self.feed.lock().await;
        if !feed.is_open() {
            if let Err(e) = feed.open(&self.config).await {
                error!("Failed to open AIS feed: {}", e);
                return;
            }
        }
        let sentences = feed.take_sentences();
        drop(feed);

        let mut tasks = self.decode_tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        let count = sentences.len();
        tasks.push(tokio::spawn(Self::process_sentences(
            self.cache.clone(),
            self.failed.clone(),
            self.exchange.clone(),
            sentences,
        )));
        info!(
            "Got {} sentences from the AIS feed, {} decode batches in flight",
            count,
            tasks.len()
        );
    }

    /// Decode one batch and route the reports.
    async fn process_sentences(
        cache: Arc<DownsampleCache>,
        failed: Arc<FailedDeliveryQueue>,
        exchange: Arc<ExchangeService>,
        sentences: Vec<String>,
    ) {
        let mut immediate = Vec::new();
        for sentence in &sentences {
            match decoder::decode(sentence) {
                Ok(Some(DecodedReport::Movement(movement))) => {
                    if cache.is_known_fishing_vessel(&movement.mmsi).await {
                        immediate.push(movement);
                    } else {
                        cache.upsert_movement(movement).await;
                    }
                }
                Ok(Some(DecodedReport::Static(info))) => {
                    cache.mark_fishing_vessel(&info).await;
                    cache.upsert_static(info).await;
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("undecodable sentence: {}", e);
                    exchange.report_parse_error(sentence).await;
                }
            }
        }
        if !immediate.is_empty() {
            let failed_reports = exchange.deliver(immediate).await;
            failed.extend(failed_reports).await;
        }
    }

    /// Drain the downsample cache and deliver, queueing failures for
    /// the scheduled retry.
    pub async fn flush_movements(&self) {
        let movements = self.cache.flush_movements().await;
        if movements.is_empty() {
            return;
        }
        let failed = self.exchange.deliver(movements).await;
        self.failed.extend(failed).await;
    }

    /// Drain the static-info cache and deliver as one batch.
    pub async fn flush_assets(&self) {
        if !self.config.enabled {
            return;
        }
        let assets = self.cache.flush_assets().await;
        if assets.is_empty() {
            return;
        }
        self.exchange.send_asset_updates(assets).await;
    }

    /// Re-submit previously failed reports; whatever fails again goes
    /// back on the queue.
    pub async fn retry_failed_deliveries(&self) {
        if !self.registration.is_registered().await {
            return;
        }
        let pending = self.failed.drain().await;
        if pending.is_empty() {
            return;
        }
        info!("Retrying {} previously failed movement reports", pending.len());
        let failed_again = self.exchange.deliver(pending).await;
        self.failed.extend(failed_again).await;
    }

    /// Wait up to `grace` for in-flight decode batches, cancel the
    /// stragglers, close the feed. Results already placed in the cache
    /// or queue stay there.
    pub async fn shutdown(&self, grace: Duration) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut tasks = self.decode_tasks.lock().await;
            tasks.drain(..).collect()
        };
        for mut task in tasks {
            if time::timeout(grace, &mut task).await.is_err() {
                warn!("Decode batch did not finish within the grace period, cancelling");
                task.abort();
            }
        }
        self.feed.lock().await.close().await;
    }
}
