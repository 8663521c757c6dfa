//! Delivery pipeline towards the exchange bus.
//!
//! The core never talks to a transport directly: everything goes through
//! the [`ExchangePublisher`] trait, so the bus can be swapped or mocked.
//! Delivery is at-least-once; transport failures come back to the caller
//! as a failure list for scheduled retry, marshalling failures go to the
//! parsing-error destination and are never retried.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::errors::TransportError;
use crate::models::{MovementReport, MovementSource, VesselStaticInfo};

/// Logical destinations on the exchange bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Movement and asset reports.
    Exchange,
    /// Unparseable input, for data-quality follow-up.
    Error,
    /// Service registration handshake.
    EventBus,
}

/// Transport boundary towards the exchange bus.
#[async_trait]
pub trait ExchangePublisher: Send + Sync {
    async fn publish(&self, destination: Destination, payload: Vec<u8>)
        -> Result<(), TransportError>;
}

/// Envelope wrapping one movement report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MovementEnvelope<'a> {
    plugin_name: &'a str,
    timestamp: DateTime<Utc>,
    source: MovementSource,
    movement: &'a MovementReport,
}

/// Envelope wrapping an offending raw sentence.
#[derive(Debug, Serialize)]
struct ParseErrorEnvelope<'a> {
    source: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    payload: &'a str,
}

/// Batches decoded reports onto the exchange bus.
pub struct ExchangeService {
    publisher: Arc<dyn ExchangePublisher>,
    plugin_name: String,
}

impl ExchangeService {
    pub fn new(publisher: Arc<dyn ExchangePublisher>, plugin_name: String) -> Self {
        Self {
            publisher,
            plugin_name,
        }
    }

    /// Publish movement reports, returning the ones the transport
    /// rejected so the caller can queue them for retry.
    pub async fn deliver(&self, movements: Vec<MovementReport>) -> Vec<MovementReport> {
        if movements.is_empty() {
            return Vec::new();
        }
        info!("Sending {} positions to exchange", movements.len());

        let mut failed = Vec::new();
        for movement in movements {
            let envelope = MovementEnvelope {
                plugin_name: &self.plugin_name,
                timestamp: Utc::now(),
                source: MovementSource::Ais,
                movement: &movement,
            };
            let payload = match serde_json::to_vec(&envelope) {
                Ok(payload) => payload,
                Err(e) => {
                    // a malformed payload will not get better on retry
                    error!("could not serialise movement report: {}", e);
                    self.report_parse_error(&format!("{:?}", movement)).await;
                    continue;
                }
            };
            match self.publisher.publish(Destination::Exchange, payload).await {
                Ok(()) => {
                    counter!("ais_movements_delivered").increment(1);
                }
                Err(e) => {
                    debug!("movement publish failed: {}", e);
                    failed.push(movement);
                }
            }
        }
        if !failed.is_empty() {
            warn!("{} movement reports failed to publish", failed.len());
            counter!("ais_movements_failed").increment(failed.len() as u64);
        }
        failed
    }

    /// Publish a batch of static vessel info as one JSON array.
    ///
    /// Not retried on transport failure; the next flush carries newer
    /// data anyway.
    pub async fn send_asset_updates(&self, assets: Vec<VesselStaticInfo>) -> bool {
        if assets.is_empty() {
            return true;
        }
        let payload = match serde_json::to_vec(&assets) {
            Ok(payload) => payload,
            Err(e) => {
                error!("could not serialise asset batch: {}", e);
                self.report_parse_error(&format!("{:?}", assets)).await;
                return true;
            }
        };
        match self.publisher.publish(Destination::Exchange, payload).await {
            Ok(()) => {
                counter!("ais_asset_batches_delivered").increment(1);
                true
            }
            Err(e) => {
                error!("couldn't send asset updates: {}", e);
                false
            }
        }
    }

    /// Route an offending raw sentence to the parsing-error destination.
    pub async fn report_parse_error(&self, raw: &str) {
        let envelope = ParseErrorEnvelope {
            source: "AIS",
            kind: "byte",
            payload: raw,
        };
        match serde_json::to_vec(&envelope) {
            Ok(payload) => {
                if let Err(e) = self.publisher.publish(Destination::Error, payload).await {
                    error!("couldn't send to parsing error queue: {}", e);
                }
            }
            Err(e) => error!("could not serialise parse error envelope: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mmsi;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        fail_transport: AtomicBool,
        published: Mutex<Vec<(Destination, Vec<u8>)>>,
    }

    #[async_trait]
    impl ExchangePublisher for RecordingPublisher {
        async fn publish(
            &self,
            destination: Destination,
            payload: Vec<u8>,
        ) -> Result<(), TransportError> {
            if self.fail_transport.load(Ordering::SeqCst) {
                return Err(TransportError::Unavailable("broker down".to_string()));
            }
            self.published.lock().unwrap().push((destination, payload));
            Ok(())
        }
    }

    fn movement(mmsi: u32) -> MovementReport {
        MovementReport {
            mmsi: Mmsi::new(mmsi),
            position: None,
            reported_speed: Some(12.3),
            reported_course: 224.0,
            true_heading: Some(215),
            position_accuracy: true,
            position_time: Utc::now(),
            flag_state: "PAN".to_string(),
            source: MovementSource::Ais,
        }
    }

    #[tokio::test]
    async fn delivers_movement_envelopes() {
        let publisher = Arc::new(RecordingPublisher::default());
        let service = ExchangeService::new(publisher.clone(), "ais-forwarder".to_string());

        let failed = service.deliver(vec![movement(371798000)]).await;
        assert!(failed.is_empty());

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, Destination::Exchange);

        let envelope: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(envelope["pluginName"], "ais-forwarder");
        assert_eq!(envelope["source"], "AIS");
        assert_eq!(envelope["movement"]["mmsi"], "371798000");
        assert_eq!(envelope["movement"]["flagState"], "PAN");
    }

    #[tokio::test]
    async fn transport_failure_returns_reports_for_retry() {
        let publisher = Arc::new(RecordingPublisher::default());
        publisher.fail_transport.store(true, Ordering::SeqCst);
        let service = ExchangeService::new(publisher.clone(), "ais-forwarder".to_string());

        let failed = service
            .deliver(vec![movement(371798000), movement(356302000)])
            .await;

        assert_eq!(failed.len(), 2);
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn asset_batch_serialises_as_array() {
        let publisher = Arc::new(RecordingPublisher::default());
        let service = ExchangeService::new(publisher.clone(), "ais-forwarder".to_string());

        let info = VesselStaticInfo {
            name: Some("PROGUY".to_string()),
            ..VesselStaticInfo::new(Mmsi::new(271041815))
        };
        assert!(service.send_asset_updates(vec![info]).await);

        let published = publisher.published.lock().unwrap();
        let batch: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
        assert!(batch.is_array());
        assert_eq!(batch[0]["mmsi"], "271041815");
        assert_eq!(batch[0]["name"], "PROGUY");
    }

    #[tokio::test]
    async fn parse_errors_go_to_error_destination() {
        let publisher = Arc::new(RecordingPublisher::default());
        let service = ExchangeService::new(publisher.clone(), "ais-forwarder".to_string());

        service.report_parse_error("15RTgt0").await;

        let published = publisher.published.lock().unwrap();
        assert_eq!(published[0].0, Destination::Error);
        let envelope: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(envelope["source"], "AIS");
        assert_eq!(envelope["type"], "byte");
        assert_eq!(envelope["payload"], "15RTgt0");
    }
}
