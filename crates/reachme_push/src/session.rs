//! Push session abstraction.
//!
//! A session is the broker connection. Its callbacks arrive as
//! [`PushEvent`]s on a tokio channel handed out when the session is built,
//! so the consumer is an ordinary task rather than a delegate.

use crate::config::PushConfig;
use crate::error::{PushError, PushResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Delivery guarantee for subscribe and publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce,
    /// Redelivered until acknowledged.
    AtLeastOnce,
}

/// Something the broker reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// A message arrived on a subscribed topic.
    MessageReceived {
        /// Topic the message arrived on.
        topic: String,
        /// Raw payload, usually JSON.
        payload: Vec<u8>,
    },
    /// The connection was lost.
    Disconnected,
    /// The session reported an error without dropping the connection.
    Error(String),
}

/// A connection to the push broker.
#[async_trait]
pub trait PushSession: Send + Sync {
    /// Opens the connection.
    async fn connect(&self, config: &PushConfig) -> PushResult<()>;

    /// Subscribes to a topic.
    async fn subscribe(&self, topic: &str, qos: QoS) -> PushResult<()>;

    /// Publishes a payload to a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> PushResult<()>;

    /// Closes the connection.
    async fn disconnect(&self) -> PushResult<()>;
}

/// A call recorded by [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    /// `connect` with the client id.
    Connect(String),
    /// `subscribe`.
    Subscribe(String, QoS),
    /// `publish`.
    Publish {
        /// Topic.
        topic: String,
        /// Payload.
        payload: Vec<u8>,
    },
    /// `disconnect`.
    Disconnect,
}

/// In-process session for tests.
///
/// Records every call and lets the test inject broker events.
#[derive(Debug)]
pub struct MockSession {
    calls: Mutex<Vec<SessionCall>>,
    events: Mutex<Option<UnboundedSender<PushEvent>>>,
    refuse_connect: Mutex<Option<String>>,
    refuse_subscribe: Mutex<Option<String>>,
}

impl MockSession {
    /// Creates a session and the receiver its events are delivered on.
    pub fn new() -> (Self, UnboundedReceiver<PushEvent>) {
        let (tx, rx) = unbounded_channel();
        let session = Self {
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Some(tx)),
            refuse_connect: Mutex::new(None),
            refuse_subscribe: Mutex::new(None),
        };
        (session, rx)
    }

    /// Makes the next `connect` fail.
    pub fn refuse_connect(&self, reason: impl Into<String>) {
        *self.refuse_connect.lock() = Some(reason.into());
    }

    /// Makes the next `subscribe` fail.
    pub fn refuse_subscribe(&self, reason: impl Into<String>) {
        *self.refuse_subscribe.lock() = Some(reason.into());
    }

    /// Delivers an inbound message.
    pub fn deliver(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        self.emit(PushEvent::MessageReceived {
            topic: topic.to_string(),
            payload: payload.into(),
        });
    }

    /// Reports a lost connection.
    pub fn drop_connection(&self) {
        self.emit(PushEvent::Disconnected);
    }

    /// Reports a session error.
    pub fn report_error(&self, message: impl Into<String>) {
        self.emit(PushEvent::Error(message.into()));
    }

    /// Closes the event channel; the receiver sees the end of the stream.
    pub fn close(&self) {
        self.events.lock().take();
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    /// Returns the payloads published to `topic`.
    pub fn published_to(&self, topic: &str) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                SessionCall::Publish { topic: t, payload } if t == topic => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    fn emit(&self, event: PushEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl PushSession for MockSession {
    async fn connect(&self, config: &PushConfig) -> PushResult<()> {
        self.calls.lock().push(SessionCall::Connect(config.client_id()));
        match self.refuse_connect.lock().take() {
            Some(reason) => Err(PushError::ConnectionFailed(reason)),
            None => Ok(()),
        }
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> PushResult<()> {
        self.calls
            .lock()
            .push(SessionCall::Subscribe(topic.to_string(), qos));
        match self.refuse_subscribe.lock().take() {
            Some(reason) => Err(PushError::Session(reason)),
            None => Ok(()),
        }
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, _qos: QoS) -> PushResult<()> {
        self.calls.lock().push(SessionCall::Publish {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn disconnect(&self) -> PushResult<()> {
        self.calls.lock().push(SessionCall::Disconnect);
        Ok(())
    }
}
