//! NATS-backed exchange publisher.

use async_nats::Client;
use async_trait::async_trait;

use crate::config::ExchangeSubjects;
use crate::errors::TransportError;
use crate::exchange::{Destination, ExchangePublisher};

/// Publishes exchange envelopes onto NATS subjects.
pub struct NatsExchange {
    client: Client,
    subjects: ExchangeSubjects,
}

impl NatsExchange {
    pub fn new(client: Client, subjects: ExchangeSubjects) -> Self {
        Self { client, subjects }
    }

    fn subject(&self, destination: Destination) -> String {
        match destination {
            Destination::Exchange => self.subjects.exchange.clone(),
            Destination::Error => self.subjects.error.clone(),
            Destination::EventBus => self.subjects.event_bus.clone(),
        }
    }
}

#[async_trait]
impl ExchangePublisher for NatsExchange {
    async fn publish(
        &self,
        destination: Destination,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        let subject = self.subject(destination);
        self.client
            .publish(subject, payload.into())
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        // publish only queues client-side; flush so broker failures
        // surface to the retry logic
        self.client
            .flush()
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
