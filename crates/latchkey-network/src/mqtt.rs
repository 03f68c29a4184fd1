//! MQTT notification client.
//!
//! The camera node publishes security notifications to a broker and receives
//! remote unlock commands on a command topic. The broker transport itself
//! stays behind the [`MqttTransport`] trait; this module owns the connection
//! lifecycle policy: bounded reconnection with a cool-down, one subscription
//! per connection, and a hello notification announcing the device.
//!
//! All connection state lives in [`MqttClient`]; the owning node loop calls
//! [`update`](MqttClient::update) each tick and the client decides whether to
//! reconnect, back off, or service the connection.
//!
//! # Design Principles
//!
//! - **Bounded reconnection**: attempts are rate limited and capped; a
//!   cool-down period resets the budget so a broker outage does not turn
//!   into a tight connect loop
//! - **No publish retry**: a failed publish surfaces as an error and the
//!   caller decides; only reconnection is retried internally

#![allow(async_fn_in_trait)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use latchkey_core::constants::{
    MQTT_COOLDOWN_FACTOR, MQTT_MAX_RECONNECT_ATTEMPTS, MQTT_RECONNECT_INTERVAL_MS,
};
use latchkey_core::{Clock, Error, EventType, HardwareId, Result};
use latchkey_events::NotificationSink;

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub topic: String,
    pub payload: String,
}

/// Broker transport the client drives.
pub trait MqttTransport {
    async fn connect(&mut self, client_id: &str) -> Result<()>;
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<()>;
    async fn subscribe(&mut self, topic: &str) -> Result<()>;
    /// Service the connection and return the next delivered message, if any.
    async fn poll(&mut self) -> Result<Option<IncomingMessage>>;
    fn is_connected(&self) -> bool;
}

/// Topics and identity for one camera node.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub hardware_id: HardwareId,
    /// Topic notifications are published to.
    pub notify_topic: String,
    /// Topic remote unlock commands arrive on.
    pub command_topic: String,
}

/// Fixed JSON shape of a published notification.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationPayload<'a> {
    hardware_id: &'a str,
    event_type: &'a str,
    description: &'a str,
    media_url: &'a str,
    timestamp: &'a str,
}

/// MQTT client with bounded reconnection.
#[derive(Debug)]
pub struct MqttClient<T, C> {
    transport: T,
    clock: C,
    config: MqttConfig,
    client_id: Option<String>,
    reconnect_attempts: u32,
    last_attempt: Option<Instant>,
    subscribed: bool,
}

impl<T: MqttTransport, C: Clock> MqttClient<T, C> {
    pub fn new(transport: T, clock: C, config: MqttConfig) -> Self {
        Self {
            transport,
            clock,
            config,
            client_id: None,
            reconnect_attempts: 0,
            last_attempt: None,
            subscribed: false,
        }
    }

    /// Record the client identity. Does not connect; [`update`](Self::update)
    /// establishes the connection on the next tick.
    pub fn begin(&mut self, client_id: impl Into<String>) {
        self.client_id = Some(client_id.into());
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Drive the connection and collect delivered messages.
    ///
    /// While disconnected, attempts one reconnect per interval up to the
    /// attempt cap, then waits out the cool-down before trying again. While
    /// connected, subscribes to the command topic once and services the
    /// transport.
    pub async fn update(&mut self) -> Result<Vec<IncomingMessage>> {
        let Some(client_id) = self.client_id.clone() else {
            return Ok(Vec::new());
        };

        if !self.transport.is_connected() {
            self.subscribed = false;
            self.try_reconnect(&client_id).await;
            return Ok(Vec::new());
        }

        if !self.subscribed {
            self.transport.subscribe(&self.config.command_topic).await?;
            self.subscribed = true;
            debug!(topic = %self.config.command_topic, "subscribed to command topic");
        }

        let mut delivered = Vec::new();
        while let Some(message) = self.transport.poll().await? {
            delivered.push(message);
        }
        Ok(delivered)
    }

    async fn try_reconnect(&mut self, client_id: &str) {
        let now = self.clock.now();
        let since_last = self
            .last_attempt
            .map(|at| self.clock.elapsed_ms(at))
            .unwrap_or(u64::MAX);

        if self.reconnect_attempts >= MQTT_MAX_RECONNECT_ATTEMPTS {
            if since_last >= MQTT_RECONNECT_INTERVAL_MS * MQTT_COOLDOWN_FACTOR {
                debug!("reconnect cool-down elapsed, attempt budget reset");
                self.reconnect_attempts = 0;
            } else {
                return;
            }
        }

        if since_last < MQTT_RECONNECT_INTERVAL_MS {
            return;
        }

        self.last_attempt = Some(now);
        match self.transport.connect(client_id).await {
            Ok(()) => {
                info!(client_id, "connected to broker");
                self.reconnect_attempts = 0;
                if let Err(err) = self.publish_hello().await {
                    warn!(error = %err, "hello notification failed");
                }
            }
            Err(err) => {
                self.reconnect_attempts += 1;
                warn!(
                    attempt = self.reconnect_attempts,
                    error = %err,
                    "broker connection failed"
                );
            }
        }
    }

    async fn publish_hello(&mut self) -> Result<()> {
        self.publish_notification("device_online", "device online", "")
            .await
    }

    /// Publish one notification with the fixed JSON payload shape.
    ///
    /// Absent fields are serialized as empty strings. Failures surface as
    /// errors and are never retried here.
    pub async fn publish_notification(
        &mut self,
        event_type: &str,
        description: &str,
        media_url: &str,
    ) -> Result<()> {
        if !self.transport.is_connected() {
            return Err(Error::NotConnected("mqtt broker".into()));
        }

        let timestamp = chrono::Utc::now().to_rfc3339();
        let payload = serde_json::to_string(&NotificationPayload {
            hardware_id: self.config.hardware_id.as_str(),
            event_type,
            description,
            media_url,
            timestamp: &timestamp,
        })
        .map_err(|e| Error::PublishFailed(e.to_string()))?;

        let topic = self.config.notify_topic.clone();
        self.transport
            .publish(&topic, &payload)
            .await
            .map_err(|e| Error::PublishFailed(e.to_string()))?;
        debug!(%topic, event_type, "notification published");
        Ok(())
    }
}

impl<T: MqttTransport, C: Clock> NotificationSink for MqttClient<T, C> {
    async fn notify(&mut self, event: EventType, description: &str, media_url: &str) -> Result<()> {
        self.publish_notification(event.label(), description, media_url)
            .await
    }
}

#[derive(Debug, Default)]
struct TransportScript {
    /// Scripted connect outcomes; an empty queue means connects succeed.
    connects: VecDeque<std::result::Result<(), String>>,
    incoming: VecDeque<IncomingMessage>,
    publishes: Vec<(String, String)>,
    subscriptions: Vec<String>,
    connected: bool,
}

/// Scriptable in-memory transport.
#[derive(Debug)]
pub struct MockTransport {
    script: Arc<Mutex<TransportScript>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockTransportHandle) {
        let script = Arc::new(Mutex::new(TransportScript::default()));
        (
            Self {
                script: Arc::clone(&script),
            },
            MockTransportHandle { script },
        )
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut TransportScript) -> T) -> T {
        let mut script = self.script.lock().expect("script lock poisoned");
        f(&mut script)
    }
}

impl MqttTransport for MockTransport {
    async fn connect(&mut self, _client_id: &str) -> Result<()> {
        self.with_script(|s| match s.connects.pop_front() {
            Some(Ok(())) | None => {
                s.connected = true;
                Ok(())
            }
            Some(Err(msg)) => Err(Error::NotConnected(msg)),
        })
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        self.with_script(|s| {
            if !s.connected {
                return Err(Error::NotConnected("transport".into()));
            }
            s.publishes.push((topic.to_string(), payload.to_string()));
            Ok(())
        })
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.with_script(|s| {
            if !s.connected {
                return Err(Error::NotConnected("transport".into()));
            }
            s.subscriptions.push(topic.to_string());
            Ok(())
        })
    }

    async fn poll(&mut self) -> Result<Option<IncomingMessage>> {
        self.with_script(|s| Ok(s.incoming.pop_front()))
    }

    fn is_connected(&self) -> bool {
        self.with_script(|s| s.connected)
    }
}

/// Handle for scripting a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    script: Arc<Mutex<TransportScript>>,
}

impl MockTransportHandle {
    fn with_script<T>(&self, f: impl FnOnce(&mut TransportScript) -> T) -> T {
        let mut script = self.script.lock().expect("script lock poisoned");
        f(&mut script)
    }

    /// Fail the next connect attempt.
    pub fn fail_next_connect(&self, message: impl Into<String>) {
        let msg = message.into();
        self.with_script(|s| s.connects.push_back(Err(msg)));
    }

    /// Drop the connection out from under the client.
    pub fn disconnect(&self) {
        self.with_script(|s| s.connected = false);
    }

    /// Queue a message for delivery on the next poll.
    pub fn deliver(&self, topic: impl Into<String>, payload: impl Into<String>) {
        let message = IncomingMessage {
            topic: topic.into(),
            payload: payload.into(),
        };
        self.with_script(|s| s.incoming.push_back(message));
    }

    pub fn publishes(&self) -> Vec<(String, String)> {
        self.with_script(|s| s.publishes.clone())
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.with_script(|s| s.subscriptions.clone())
    }
}
