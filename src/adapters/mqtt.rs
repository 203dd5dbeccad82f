//! MQTT telemetry transport.
//!
//! Implements [`TelemetryTransport`].  Messages are fire-and-forget at
//! QoS 0 (at most once).
//!
//! When an update inbox is attached, the client also subscribes to
//! `<prefix>/ota/+` and forwards those messages to the OTA adapter.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` from `esp_idf_svc::mqtt`.
//!   The client is created on the first `connect()`; session state is
//!   tracked from the client's event callback.
//! - **all other targets**: an in-memory broker that records every
//!   published message, with an injectable reachability flag.  Inbound
//!   messages are injected with [`MqttTransport::sim_deliver`].

use core::sync::atomic::{AtomicBool, Ordering};
use log::{info, warn};

use crate::adapters::ota::{self, OtaSender};
use crate::app::ports::TelemetryTransport;
use crate::config::SystemConfig;
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use std::sync::Arc;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
};

type OtaRoot = heapless::String<48>;

/// How long `connect()` waits for the broker's CONNACK.
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT_MS: u32 = 3000;
#[cfg(target_os = "espidf")]
const CONNECT_POLL_MS: u32 = 100;

#[cfg(not(target_os = "espidf"))]
static SIM_BROKER_REACHABLE: AtomicBool = AtomicBool::new(true);

/// Simulation: make the broker (un)reachable.  Dropping it while
/// connected reads as a lost session.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_broker_reachable(reachable: bool) {
    SIM_BROKER_REACHABLE.store(reachable, Ordering::Relaxed);
}

/// `<prefix>/ota/`, or `ota/` when no prefix is set.
fn ota_root(prefix: &str) -> OtaRoot {
    let mut root = OtaRoot::new();
    if root.push_str(prefix).is_err() {
        warn!("MQTT: topic prefix too long for update topics, using bare keys");
        root.clear();
    }
    if !root.is_empty() && !root.ends_with('/') {
        let _ = root.push('/');
    }
    let _ = root.push_str("ota/");
    root
}

/// Forward an inbound message to the update inbox when it is one of ours.
fn route_inbound(root: &str, updates: Option<&OtaSender>, topic: &str, payload: &[u8]) -> bool {
    match (updates, topic.strip_prefix(root)) {
        (Some(inbox), Some(verb)) => ota::deliver(inbox, verb, payload),
        _ => false,
    }
}

/// A message as the broker saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

pub struct MqttTransport {
    broker_url: heapless::String<96>,
    client_id: heapless::String<32>,
    username: heapless::String<32>,
    password: heapless::String<64>,
    ota_root: OtaRoot,
    updates: Option<OtaSender>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    session_up: Arc<AtomicBool>,
    /// Set by every CONNACK; the update subscription is renewed on the
    /// next publish.
    #[cfg(target_os = "espidf")]
    resubscribe: Arc<AtomicBool>,
    #[cfg(not(target_os = "espidf"))]
    session_up: bool,
    #[cfg(not(target_os = "espidf"))]
    published: Vec<PublishedMessage>,
}

impl MqttTransport {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            broker_url: config.mqtt_broker_url.clone(),
            client_id: config.mqtt_client_id.clone(),
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
            ota_root: ota_root(&config.topic_prefix),
            updates: None,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            session_up: Arc::new(AtomicBool::new(false)),
            #[cfg(target_os = "espidf")]
            resubscribe: Arc::new(AtomicBool::new(false)),
            #[cfg(not(target_os = "espidf"))]
            session_up: false,
            #[cfg(not(target_os = "espidf"))]
            published: Vec::new(),
        }
    }

    /// Forward `<prefix>/ota/+` messages to this inbox.  Must be attached
    /// before the first connect.
    pub fn with_update_inbox(mut self, inbox: OtaSender) -> Self {
        self.updates = Some(inbox);
        self
    }

    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }

    pub fn update_topic_root(&self) -> &str {
        &self.ota_root
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        use esp_idf_hal::delay::FreeRtos;

        if self.client.is_none() {
            let conf = MqttClientConfiguration {
                client_id: Some(self.client_id.as_str()),
                username: (!self.username.is_empty()).then_some(self.username.as_str()),
                password: (!self.password.is_empty()).then_some(self.password.as_str()),
                ..Default::default()
            };
            let flag = Arc::clone(&self.session_up);
            let resubscribe = Arc::clone(&self.resubscribe);
            let root = self.ota_root.clone();
            let updates = self.updates.clone();
            let client = EspMqttClient::new_cb(&self.broker_url, &conf, move |event| {
                match event.payload() {
                    EventPayload::Connected(_) => {
                        flag.store(true, Ordering::Release);
                        resubscribe.store(true, Ordering::Release);
                    }
                    EventPayload::Disconnected => flag.store(false, Ordering::Release),
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        details: Details::Complete,
                        ..
                    } => {
                        route_inbound(&root, updates.as_ref(), topic, data);
                    }
                    _ => {}
                }
            })
            .map_err(|_| CommsError::BrokerConnectFailed)?;
            self.client = Some(client);
        }

        let mut waited = 0;
        while !self.session_up.load(Ordering::Acquire) {
            if waited >= CONNECT_TIMEOUT_MS {
                return Err(CommsError::BrokerConnectFailed);
            }
            FreeRtos::delay_ms(CONNECT_POLL_MS);
            waited += CONNECT_POLL_MS;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        if !SIM_BROKER_REACHABLE.load(Ordering::Relaxed) {
            return Err(CommsError::BrokerConnectFailed);
        }
        self.session_up = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.session_up.load(Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.session_up && SIM_BROKER_REACHABLE.load(Ordering::Relaxed)
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::NotConnected)?;
        if self.updates.is_some() && self.resubscribe.swap(false, Ordering::AcqRel) {
            let mut filter = OtaRoot::new();
            let _ = filter.push_str(&self.ota_root);
            let _ = filter.push('+');
            if let Err(e) = client.subscribe(&filter, QoS::AtLeastOnce) {
                warn!("MQTT: subscribe to {} failed: {:?}", filter, e);
                self.resubscribe.store(true, Ordering::Release);
            }
        }
        client
            .enqueue(topic, QoS::AtMostOnce, retain, payload)
            .map(|_| ())
            .map_err(|_| CommsError::MqttPublishFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        self.published.push(PublishedMessage {
            topic: topic.into(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    /// Simulation: the broker delivers `payload` on `topic`.  Only a live
    /// session receives anything.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_deliver(&self, topic: &str, payload: &[u8]) -> bool {
        self.platform_is_connected()
            && route_inbound(&self.ota_root, self.updates.as_ref(), topic, payload)
    }

    /// Simulation: every message published so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[PublishedMessage] {
        &self.published
    }
}

impl TelemetryTransport for MqttTransport {
    fn connect(&mut self) -> Result<(), CommsError> {
        info!("MQTT: connecting to {} as '{}'", self.broker_url, self.client_id);
        match self.platform_connect() {
            Ok(()) => {
                info!("MQTT: connected");
                Ok(())
            }
            Err(e) => {
                warn!("MQTT: connect failed: {}", e);
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        if !self.platform_is_connected() {
            return Err(CommsError::NotConnected);
        }
        self.platform_publish(topic, payload, retain)
    }
}
