//! MQTT broker adapter.
//!
//! Implements [`ChannelPort`] over the ESP-IDF MQTT client.
//!
//! ```text
//!  ESP-IDF MQTT task                       control loop
//!  ┌──────────────────┐   Shared.inbound   ┌──────────────┐
//!  │ callback         │───────────────────▶│ poll_inbound │
//!  │  Connected  ─────┼─▶ connected edge ─▶│ service      │─▶ subscribe
//!  │  Received   ─────┼─▶ bounded channel  │ publish      │─▶ enqueue
//!  └──────────────────┘                    └──────────────┘
//! ```
//!
//! Topics for device `D`:
//!
//! | Topic               | Direction | Retained |
//! |---------------------|-----------|----------|
//! | `sensors/D`         | out       | no       |
//! | `sensors/D/config`  | in        | -        |
//! | `sensors/D/events`  | out       | yes      |
//!
//! The client reconnects on its own on a fixed interval; the control loop
//! never blocks on the broker.  After every (re)connection the adapter
//! re-subscribes and reports the edge through
//! [`ChannelPort::take_reconnected`] so the event log is republished.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::ports::{ChannelError, ChannelPort, Topic, INBOUND_MAX};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

#[cfg(not(target_os = "espidf"))]
use crate::config::MQTT_RETRY_INTERVAL_MS;

/// Inbound messages buffered between the client task and the loop.
const INBOUND_DEPTH: usize = 4;

pub type InboundPayload = heapless::Vec<u8, INBOUND_MAX>;

// ── Topics ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttTopics {
    pub telemetry: String,
    pub config: String,
    pub events: String,
}

impl MqttTopics {
    pub fn new(device_id: &str) -> Self {
        Self {
            telemetry: format!("sensors/{}", device_id),
            config: format!("sensors/{}/config", device_id),
            events: format!("sensors/{}/events", device_id),
        }
    }

    pub fn outbound(&self, topic: Topic) -> &str {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::Events => &self.events,
        }
    }
}

pub fn client_id(device_id: &str) -> String {
    format!("ESP32Client_{}", device_id)
}

// ── State shared with the client task ─────────────────────────

/// Written by the MQTT client task, read by the control loop.
pub struct Shared {
    inbound: Channel<CriticalSectionRawMutex, InboundPayload, INBOUND_DEPTH>,
    connected: AtomicBool,
    connect_edge: AtomicBool,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            inbound: Channel::new(),
            connected: AtomicBool::new(false),
            connect_edge: AtomicBool::new(false),
        }
    }

    fn on_connected(&self) {
        self.connected.store(true, Ordering::Release);
        self.connect_edge.store(true, Ordering::Release);
    }

    fn on_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Queue one inbound payload.  Oversized payloads and overflow are dropped.
    fn on_message(&self, data: &[u8]) {
        let Ok(payload) = InboundPayload::from_slice(data) else {
            warn!("MQTT: inbound payload of {} bytes dropped (max {})", data.len(), INBOUND_MAX);
            return;
        };
        if self.inbound.try_send(payload).is_err() {
            warn!("MQTT: inbound queue full, payload dropped");
        }
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

// ── Adapter ───────────────────────────────────────────────────

pub struct MqttAdapter {
    topics: MqttTopics,
    shared: Arc<Shared>,
    republish_due: bool,
    #[cfg(target_os = "espidf")]
    client: EspMqttClient<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

/// In-process stand-in for the broker.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimBroker {
    pub up: bool,
    pub next_retry_ms: u64,
    pub connect_attempts: u32,
    pub subscriptions: Vec<String>,
    /// `(topic, payload, retain)` in publish order.
    pub published: Vec<(String, Vec<u8>, bool)>,
}

impl MqttAdapter {
    /// Create the client and start connecting in the background.
    #[cfg(target_os = "espidf")]
    pub fn connect(
        url: &str,
        device_id: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, crate::error::CommsError> {
        use core::time::Duration;
        use crate::config::MQTT_RETRY_INTERVAL_MS;

        let topics = MqttTopics::new(device_id);
        let shared = Arc::new(Shared::new());
        let id = client_id(device_id);
        let conf = MqttClientConfiguration {
            client_id: Some(&id),
            username,
            password,
            reconnect_timeout: Some(Duration::from_millis(MQTT_RETRY_INTERVAL_MS)),
            ..Default::default()
        };

        let cb_shared = shared.clone();
        let config_topic = topics.config.clone();
        let client = EspMqttClient::new_cb(url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => {
                info!("MQTT: connected");
                cb_shared.on_connected();
            }
            EventPayload::Disconnected => {
                warn!("MQTT: disconnected");
                cb_shared.on_disconnected();
            }
            EventPayload::Received { topic, data, details, .. } => {
                if !matches!(details, Details::Complete) {
                    warn!("MQTT: fragmented payload dropped");
                    return;
                }
                if topic.is_some_and(|t| t != config_topic) {
                    return;
                }
                cb_shared.on_message(data);
            }
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init failed ({:?})", e);
            crate::error::CommsError::MqttClientInitFailed
        })?;

        info!("MQTT: client {} -> {}", id, url);
        Ok(Self {
            topics,
            shared,
            republish_due: false,
            client,
        })
    }

    /// Host-side adapter backed by [`SimBroker`].
    #[cfg(not(target_os = "espidf"))]
    pub fn simulated(device_id: &str) -> Self {
        Self {
            topics: MqttTopics::new(device_id),
            shared: Arc::new(Shared::new()),
            republish_due: false,
            sim: SimBroker {
                up: true,
                ..SimBroker::default()
            },
        }
    }

    pub fn topics(&self) -> &MqttTopics {
        &self.topics
    }

    fn on_session_start(&mut self) -> Result<(), ChannelError> {
        #[cfg(target_os = "espidf")]
        self.client
            .subscribe(&self.topics.config, QoS::AtLeastOnce)
            .map_err(|_| ChannelError::PublishFailed)?;

        #[cfg(not(target_os = "espidf"))]
        self.sim.subscriptions.push(self.topics.config.clone());

        info!("MQTT: subscribed to {}", self.topics.config);
        Ok(())
    }

    // ── Simulation hooks ──────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&self) -> &SimBroker {
        &self.sim
    }

    /// Bring the simulated broker up or down.  Going down drops the session.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_broker(&mut self, up: bool) {
        self.sim.up = up;
        if !up {
            self.shared.on_disconnected();
        }
    }

    /// Deliver a message as if the broker pushed it on `topic`.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_deliver(&self, topic: &str, data: &[u8]) {
        if topic == self.topics.config {
            self.shared.on_message(data);
        }
    }
}

impl ChannelPort for MqttAdapter {
    fn publish(&mut self, topic: Topic, payload: &[u8], retain: bool) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }

        #[cfg(target_os = "espidf")]
        {
            let name = self.topics.outbound(topic);
            self.client
                .enqueue(name, QoS::AtLeastOnce, retain, payload)
                .map_err(|e| {
                    warn!("MQTT: enqueue on {} failed ({:?})", name, e);
                    ChannelError::PublishFailed
                })?;
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let name = self.topics.outbound(topic).to_owned();
            self.sim.published.push((name, payload.to_vec(), retain));
        }

        Ok(())
    }

    fn poll_inbound(&mut self) -> Option<InboundPayload> {
        self.shared.inbound.try_receive().ok()
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn take_reconnected(&mut self) -> bool {
        core::mem::take(&mut self.republish_due)
    }

    fn service(&mut self, now_ms: u64) {
        #[cfg(not(target_os = "espidf"))]
        if !self.is_connected() && now_ms >= self.sim.next_retry_ms {
            self.sim.connect_attempts += 1;
            self.sim.next_retry_ms = now_ms + MQTT_RETRY_INTERVAL_MS;
            if self.sim.up {
                self.shared.on_connected();
            } else {
                warn!("MQTT: broker unreachable, retry in {} ms", MQTT_RETRY_INTERVAL_MS);
            }
        }
        #[cfg(target_os = "espidf")]
        let _ = now_ms;

        if self.shared.connect_edge.swap(false, Ordering::AcqRel) {
            match self.on_session_start() {
                Ok(()) => self.republish_due = true,
                Err(e) => warn!("MQTT: subscribe failed ({})", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_follow_device_id() {
        let t = MqttTopics::new("riego-01");
        assert_eq!(t.telemetry, "sensors/riego-01");
        assert_eq!(t.config, "sensors/riego-01/config");
        assert_eq!(t.events, "sensors/riego-01/events");
        assert_eq!(client_id("riego-01"), "ESP32Client_riego-01");
    }

    #[test]
    fn connects_subscribes_and_flags_republish() {
        let mut m = MqttAdapter::simulated("d1");
        assert!(!m.is_connected());
        m.service(0);
        assert!(m.is_connected());
        assert_eq!(m.sim().subscriptions, vec!["sensors/d1/config".to_string()]);
        assert!(m.take_reconnected());
        assert!(!m.take_reconnected());
    }

    #[test]
    fn publish_while_down_is_rejected() {
        let mut m = MqttAdapter::simulated("d1");
        assert_eq!(m.publish(Topic::Events, b"[]", true), Err(ChannelError::NotConnected));
        assert!(m.sim().published.is_empty());
    }

    #[test]
    fn publish_maps_topics_and_retain() {
        let mut m = MqttAdapter::simulated("d1");
        m.service(0);
        m.publish(Topic::Events, b"[]", true).unwrap();
        m.publish(Topic::Telemetry, b"{}", false).unwrap();
        assert_eq!(
            m.sim().published,
            vec![
                ("sensors/d1/events".to_string(), b"[]".to_vec(), true),
                ("sensors/d1".to_string(), b"{}".to_vec(), false),
            ]
        );
    }

    #[test]
    fn reconnect_waits_for_fixed_interval() {
        let mut m = MqttAdapter::simulated("d1");
        m.sim_set_broker(false);
        m.service(0);
        assert_eq!(m.sim().connect_attempts, 1);
        m.service(MQTT_RETRY_INTERVAL_MS - 1);
        assert_eq!(m.sim().connect_attempts, 1);

        m.sim_set_broker(true);
        m.service(MQTT_RETRY_INTERVAL_MS);
        assert_eq!(m.sim().connect_attempts, 2);
        assert!(m.is_connected());
        assert!(m.take_reconnected());
    }

    #[test]
    fn only_config_topic_reaches_the_loop() {
        let mut m = MqttAdapter::simulated("d1");
        m.sim_deliver("sensors/other/config", br#"{"umbral":1}"#);
        assert!(m.poll_inbound().is_none());
        m.sim_deliver("sensors/d1/config", br#"{"umbral":1}"#);
        assert_eq!(m.poll_inbound().unwrap().as_slice(), br#"{"umbral":1}"#);
    }

    #[test]
    fn oversized_and_overflowing_payloads_are_dropped() {
        let mut m = MqttAdapter::simulated("d1");
        m.sim_deliver("sensors/d1/config", &[b' '; INBOUND_MAX + 1]);
        assert!(m.poll_inbound().is_none());

        for _ in 0..INBOUND_DEPTH + 2 {
            m.sim_deliver("sensors/d1/config", b"{}");
        }
        let mut n = 0;
        while m.poll_inbound().is_some() {
            n += 1;
        }
        assert_eq!(n, INBOUND_DEPTH);
    }
}
