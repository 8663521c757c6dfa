//! Registration handshake with the exchange bus.
//!
//! The plugin announces itself on the event bus and retries on a fixed
//! period until the exchange confirms, with a capped attempt count.
//! Confirmation arrives as an external signal; exhausting the attempts
//! is terminal for registration but not for the process.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::PluginConfig;
use crate::exchange::{Destination, ExchangePublisher};

/// After this many failed registration attempts the plugin gives up.
pub const MAX_REGISTRATION_ATTEMPTS: u32 = 10;

/// Identity announced to the exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescription {
    pub service_class_name: String,
    pub name: String,
    pub description: String,
    pub response_message_name: String,
}

impl From<&PluginConfig> for ServiceDescription {
    fn from(config: &PluginConfig) -> Self {
        Self {
            service_class_name: config.group_id.clone(),
            name: config.application_name.clone(),
            description: "Plugin for receiving AIS positions".to_string(),
            response_message_name: config.response_subscription_name(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterServiceRequest<'a> {
    method: &'static str,
    service: &'a ServiceDescription,
    capabilities: &'a HashMap<String, String>,
    settings: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnregisterServiceRequest<'a> {
    method: &'static str,
    service: &'a ServiceDescription,
}

#[derive(Debug, Default)]
struct RegistrationState {
    registered: bool,
    awaiting_response: bool,
    attempts: u32,
}

/// Drives the register/confirm/retry lifecycle.
pub struct RegistrationStateMachine {
    publisher: Arc<dyn ExchangePublisher>,
    service: ServiceDescription,
    capabilities: HashMap<String, String>,
    settings: HashMap<String, String>,
    state: Mutex<RegistrationState>,
}

impl RegistrationStateMachine {
    pub fn new(publisher: Arc<dyn ExchangePublisher>, config: &PluginConfig) -> Self {
        Self {
            publisher,
            service: ServiceDescription::from(config),
            capabilities: config.capabilities.clone(),
            settings: config.settings.clone(),
            state: Mutex::new(RegistrationState::default()),
        }
    }

    /// One registration tick.
    ///
    /// Returns `Break` when the ticker should stop: either registration
    /// has been confirmed or all attempts are used up.
    pub async fn tick(&self) -> ControlFlow<()> {
        let mut state = self.state.lock().await;

        if state.registered {
            info!(
                "{} is registered, cancelling registration ticker",
                self.service.service_class_name
            );
            return ControlFlow::Break(());
        }
        if state.attempts >= MAX_REGISTRATION_ATTEMPTS {
            info!(
                "{} failed to register, maximum number of retries reached",
                self.service.service_class_name
            );
            return ControlFlow::Break(());
        }
        if state.awaiting_response {
            return ControlFlow::Continue(());
        }

        info!(
            "{} is not registered, trying to register",
            self.service.service_class_name
        );
        state.awaiting_response = true;
        state.attempts += 1;

        let request = RegisterServiceRequest {
            method: "REGISTER_SERVICE",
            service: &self.service,
            capabilities: &self.capabilities,
            settings: &self.settings,
        };
        if let Err(e) = self.send(&request).await {
            error!("Failed to send registration request: {}", e);
            // revert so the next tick can retry
            state.awaiting_response = false;
        }
        ControlFlow::Continue(())
    }

    /// External confirmation from the exchange.
    pub async fn confirm_registered(&self) {
        let mut state = self.state.lock().await;
        state.registered = true;
        state.awaiting_response = false;
        info!("{} registration confirmed", self.service.service_class_name);
    }

    pub async fn is_registered(&self) -> bool {
        self.state.lock().await.registered
    }

    pub async fn attempts_used(&self) -> u32 {
        self.state.lock().await.attempts
    }

    /// Best-effort unregistration on shutdown, never retried.
    pub async fn unregister(&self) {
        info!(
            "Unregistering {} from the exchange",
            self.service.service_class_name
        );
        let request = UnregisterServiceRequest {
            method: "UNREGISTER_SERVICE",
            service: &self.service,
        };
        if let Err(e) = self.send(&request).await {
            error!("Failed to send unregistration request: {}", e);
        }
    }

    async fn send<T: Serialize>(&self, request: &T) -> Result<(), String> {
        let payload = serde_json::to_vec(request).map_err(|e| e.to_string())?;
        self.publisher
            .publish(Destination::EventBus, payload)
            .await
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPublisher {
        fail: AtomicBool,
        sends: AtomicUsize,
    }

    #[async_trait]
    impl ExchangePublisher for CountingPublisher {
        async fn publish(
            &self,
            _destination: Destination,
            _payload: Vec<u8>,
        ) -> Result<(), TransportError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::Unavailable("broker down".to_string()));
            }
            Ok(())
        }
    }

    fn plugin_config() -> PluginConfig {
        PluginConfig {
            group_id: "fi.example.ais".to_string(),
            application_name: "ais".to_string(),
            response_topic: "PLUGIN_RESPONSE".to_string(),
            capabilities: HashMap::new(),
            settings: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn stops_after_exhausting_attempts() {
        let publisher = Arc::new(CountingPublisher::default());
        publisher.fail.store(true, Ordering::SeqCst);
        let machine = RegistrationStateMachine::new(publisher.clone(), &plugin_config());

        for _ in 0..MAX_REGISTRATION_ATTEMPTS {
            assert_eq!(machine.tick().await, ControlFlow::Continue(()));
        }
        // attempts used up: the next tick cancels the ticker
        assert_eq!(machine.tick().await, ControlFlow::Break(()));

        assert_eq!(
            publisher.sends.load(Ordering::SeqCst),
            MAX_REGISTRATION_ATTEMPTS as usize
        );
        assert!(!machine.is_registered().await);
        assert_eq!(machine.attempts_used().await, MAX_REGISTRATION_ATTEMPTS);
    }

    #[tokio::test]
    async fn successful_send_awaits_confirmation() {
        let publisher = Arc::new(CountingPublisher::default());
        let machine = RegistrationStateMachine::new(publisher.clone(), &plugin_config());

        assert_eq!(machine.tick().await, ControlFlow::Continue(()));
        assert_eq!(publisher.sends.load(Ordering::SeqCst), 1);

        // awaiting a response: no new request goes out
        assert_eq!(machine.tick().await, ControlFlow::Continue(()));
        assert_eq!(publisher.sends.load(Ordering::SeqCst), 1);

        machine.confirm_registered().await;
        assert_eq!(machine.tick().await, ControlFlow::Break(()));
        assert!(machine.is_registered().await);
    }

    #[tokio::test]
    async fn send_failure_allows_retry_on_next_tick() {
        let publisher = Arc::new(CountingPublisher::default());
        publisher.fail.store(true, Ordering::SeqCst);
        let machine = RegistrationStateMachine::new(publisher.clone(), &plugin_config());

        assert_eq!(machine.tick().await, ControlFlow::Continue(()));
        assert_eq!(machine.attempts_used().await, 1);

        publisher.fail.store(false, Ordering::SeqCst);
        assert_eq!(machine.tick().await, ControlFlow::Continue(()));
        assert_eq!(publisher.sends.load(Ordering::SeqCst), 2);
        assert_eq!(machine.attempts_used().await, 2);
    }
}
