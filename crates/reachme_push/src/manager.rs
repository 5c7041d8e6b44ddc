//! Push channel state machine and event dispatch.

use crate::config::PushConfig;
use crate::error::{PushError, PushResult};
use crate::preview::{derive_preview, NotificationPreview};
use crate::session::{PushEvent, PushSession, QoS};
use async_trait::async_trait;
use parking_lot::RwLock;
use reachme_sync_engine::{FetchMode, SyncCoordinator, Transport};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connection state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushState {
    /// No connection.
    #[default]
    Disconnected,
    /// `connect` is in flight.
    Connecting,
    /// Connected but not yet subscribed.
    Connected,
    /// Subscribed to the device topic; messages can arrive.
    Subscribed,
}

/// Starts a background delta fetch when a push arrives.
#[async_trait]
pub trait FetchTrigger: Send + Sync {
    /// Runs one background fetch.
    async fn fetch_in_background(&self) -> PushResult<()>;
}

#[async_trait]
impl<T: Transport> FetchTrigger for SyncCoordinator<T> {
    async fn fetch_in_background(&self) -> PushResult<()> {
        let merge = self.fetch_messages(FetchMode::Background).await?;
        debug!(inserted = merge.inserted, "push-triggered fetch merged");
        Ok(())
    }
}

/// Receives notification previews.
pub trait NotificationSink: Send + Sync {
    /// Shows a preview.
    fn notify(&self, preview: NotificationPreview);
}

impl NotificationSink for UnboundedSender<NotificationPreview> {
    fn notify(&self, preview: NotificationPreview) {
        if self.send(preview).is_err() {
            debug!("notification receiver dropped");
        }
    }
}

/// Counters kept by the event loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Inbound messages handled.
    pub messages: u64,
    /// Fetches that failed.
    pub fetch_failures: u64,
    /// Previews handed to the sink.
    pub previews: u64,
    /// Error events reported by the session.
    pub errors: u64,
}

/// Drives a [`PushSession`] through connect, subscribe and presence.
pub struct PushManager<S: PushSession> {
    config: PushConfig,
    session: Arc<S>,
    state: Arc<RwLock<PushState>>,
}

impl<S: PushSession + 'static> PushManager<S> {
    /// Creates a manager in the disconnected state.
    pub fn new(config: PushConfig, session: Arc<S>) -> Self {
        Self {
            config,
            session,
            state: Arc::new(RwLock::new(PushState::Disconnected)),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    /// Returns the session.
    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    /// Returns the current state.
    pub fn state(&self) -> PushState {
        *self.state.read()
    }

    /// Connects, subscribes to the device topic and announces presence.
    ///
    /// A failed subscribe closes the connection again. A failed presence
    /// publish is logged and doesn't undo the subscription.
    pub async fn connect(&self) -> PushResult<()> {
        {
            let mut state = self.state.write();
            if *state != PushState::Disconnected {
                return Err(PushError::InvalidState {
                    expected: PushState::Disconnected,
                    actual: *state,
                });
            }
            *state = PushState::Connecting;
        }

        let client_id = self.config.client_id();
        info!(host = %self.config.host, port = self.config.port, %client_id, "connecting push channel");
        if let Err(e) = self.session.connect(&self.config).await {
            warn!(error = %e, "push connect failed");
            self.set_state(PushState::Disconnected);
            return Err(e);
        }
        self.set_state(PushState::Connected);

        if let Err(e) = self.session.subscribe(&client_id, QoS::AtLeastOnce).await {
            warn!(error = %e, "push subscribe failed");
            if let Err(close) = self.session.disconnect().await {
                debug!(error = %close, "disconnect after failed subscribe");
            }
            self.set_state(PushState::Disconnected);
            return Err(e);
        }
        self.set_state(PushState::Subscribed);

        if let Err(e) = self.publish_presence("online").await {
            warn!(error = %e, "presence publish failed");
        }
        Ok(())
    }

    /// Announces presence and closes the connection.
    pub async fn disconnect(&self) -> PushResult<()> {
        let state = self.state();
        if state == PushState::Disconnected {
            return Ok(());
        }
        if state == PushState::Subscribed {
            if let Err(e) = self.publish_presence("offline").await {
                warn!(error = %e, "presence publish failed");
            }
        }
        let result = self.session.disconnect().await;
        self.set_state(PushState::Disconnected);
        info!("push channel disconnected");
        result
    }

    /// Returns an event loop bound to this manager's state.
    pub fn dispatcher<F, N>(&self, trigger: Arc<F>, sink: N) -> EventDispatcher<F, N>
    where
        F: FetchTrigger + ?Sized,
        N: NotificationSink,
    {
        EventDispatcher {
            trigger,
            sink,
            state: Arc::clone(&self.state),
        }
    }

    async fn publish_presence(&self, presence: &str) -> PushResult<()> {
        let payload = serde_json::to_vec(&json!({
            "iv_user_device_id": self.config.device_id,
            "client_id": self.config.client_id(),
            "state": presence,
        }))?;
        self.session
            .publish(&self.config.chat_topic, payload, QoS::AtLeastOnce)
            .await
    }

    fn set_state(&self, state: PushState) {
        *self.state.write() = state;
    }
}

/// Consumes session events.
///
/// Every inbound message triggers exactly one background fetch, whether or
/// not a preview can be derived from its payload.
pub struct EventDispatcher<F: ?Sized, N> {
    trigger: Arc<F>,
    sink: N,
    state: Arc<RwLock<PushState>>,
}

impl<F, N> EventDispatcher<F, N>
where
    F: FetchTrigger + ?Sized + 'static,
    N: NotificationSink + 'static,
{
    /// Handles events until the channel closes.
    pub async fn run(self, mut events: UnboundedReceiver<PushEvent>) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(event) = events.recv().await {
            self.handle(event, &mut stats).await;
        }
        debug!(messages = stats.messages, "push event stream ended");
        stats
    }

    /// Runs the loop on a tokio task.
    pub fn spawn(self, events: UnboundedReceiver<PushEvent>) -> JoinHandle<DispatchStats> {
        tokio::spawn(self.run(events))
    }

    async fn handle(&self, event: PushEvent, stats: &mut DispatchStats) {
        match event {
            PushEvent::MessageReceived { topic, payload } => {
                stats.messages += 1;
                debug!(%topic, bytes = payload.len(), "push message received");

                if let Some(preview) = derive_preview(&payload) {
                    stats.previews += 1;
                    self.sink.notify(preview);
                }
                if let Err(e) = self.trigger.fetch_in_background().await {
                    stats.fetch_failures += 1;
                    warn!(error = %e, "push-triggered fetch failed");
                }
            }
            PushEvent::Disconnected => {
                *self.state.write() = PushState::Disconnected;
                info!("push connection lost");
            }
            PushEvent::Error(message) => {
                stats.errors += 1;
                warn!(%message, "push session error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MockSession, SessionCall};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::unbounded_channel;

    #[derive(Default)]
    struct CountingTrigger {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FetchTrigger for CountingTrigger {
        async fn fetch_in_background(&self) -> PushResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PushError::session("offline"))
            } else {
                Ok(())
            }
        }
    }

    fn manager() -> (PushManager<MockSession>, UnboundedReceiver<PushEvent>) {
        let (session, events) = MockSession::new();
        let config = PushConfig::new("mqtt.example.net", 31337, "iv/chat/4242");
        (PushManager::new(config, Arc::new(session)), events)
    }

    fn presence(payload: &[u8]) -> Value {
        serde_json::from_slice(payload).unwrap()
    }

    #[tokio::test]
    async fn connect_subscribes_then_announces() {
        let (manager, _events) = manager();
        manager.connect().await.unwrap();
        assert_eq!(manager.state(), PushState::Subscribed);

        let calls = manager.session().calls();
        let client_id = "iv/pn/device000000031337".to_string();
        assert_eq!(calls[0], SessionCall::Connect(client_id.clone()));
        assert_eq!(calls[1], SessionCall::Subscribe(client_id.clone(), QoS::AtLeastOnce));

        let published = manager.session().published_to("iv/chat/4242");
        assert_eq!(published.len(), 1);
        let body = presence(&published[0]);
        assert_eq!(body["client_id"], client_id.as_str());
        assert_eq!(body["iv_user_device_id"], 31337);
        assert_eq!(body["state"], "online");
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let (manager, _events) = manager();
        manager.connect().await.unwrap();
        let err = manager.connect().await.unwrap_err();
        assert!(matches!(
            err,
            PushError::InvalidState { actual: PushState::Subscribed, .. }
        ));
    }

    #[tokio::test]
    async fn refused_connect_returns_to_disconnected() {
        let (manager, _events) = manager();
        manager.session().refuse_connect("broker down");

        assert!(matches!(
            manager.connect().await,
            Err(PushError::ConnectionFailed(_))
        ));
        assert_eq!(manager.state(), PushState::Disconnected);
        assert!(manager.session().published_to("iv/chat/4242").is_empty());

        manager.connect().await.unwrap();
        assert_eq!(manager.state(), PushState::Subscribed);
    }

    #[tokio::test]
    async fn failed_subscribe_closes_the_connection() {
        let (manager, _events) = manager();
        manager.session().refuse_subscribe("not authorized");

        assert!(manager.connect().await.is_err());
        assert_eq!(manager.state(), PushState::Disconnected);
        assert_eq!(manager.session().calls().last(), Some(&SessionCall::Disconnect));
    }

    #[tokio::test]
    async fn disconnect_announces_then_closes() {
        let (manager, _events) = manager();
        manager.connect().await.unwrap();
        manager.disconnect().await.unwrap();
        assert_eq!(manager.state(), PushState::Disconnected);

        let calls = manager.session().calls();
        assert_eq!(calls.last(), Some(&SessionCall::Disconnect));
        let published = manager.session().published_to("iv/chat/4242");
        assert_eq!(presence(&published[1])["state"], "offline");

        // Already disconnected: nothing more is sent.
        manager.disconnect().await.unwrap();
        assert_eq!(manager.session().calls().len(), calls.len());
    }

    #[tokio::test]
    async fn every_message_triggers_one_fetch() {
        let (manager, events) = manager();
        let trigger = Arc::new(CountingTrigger::default());
        let (tx, mut previews) = unbounded_channel();
        let dispatcher = manager.dispatcher(Arc::clone(&trigger), tx);

        let session = manager.session();
        session.deliver("t", b"not json".to_vec());
        session.deliver(
            "t",
            serde_json::to_vec(&serde_json::json!({"aps": {"alert": {"body": "New voicemail"}}}))
                .unwrap(),
        );
        session.close();

        let stats = dispatcher.run(events).await;
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.previews, 1);
        assert_eq!(previews.recv().await.unwrap().body, "New voicemail");
        assert!(previews.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_fetch_does_not_stop_the_loop() {
        let (manager, events) = manager();
        let trigger = Arc::new(CountingTrigger {
            fail: true,
            ..CountingTrigger::default()
        });
        let (tx, _previews) = unbounded_channel();
        let handle = manager.dispatcher(Arc::clone(&trigger), tx).spawn(events);

        manager.session().deliver("t", b"{}".to_vec());
        manager.session().report_error("ping timeout");
        manager.session().deliver("t", b"{}".to_vec());
        manager.session().close();

        let stats = handle.await.unwrap();
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.fetch_failures, 2);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn lost_connection_updates_state() {
        let (manager, events) = manager();
        manager.connect().await.unwrap();
        let (tx, _previews) = unbounded_channel();
        let dispatcher = manager.dispatcher(Arc::new(CountingTrigger::default()), tx);

        manager.session().drop_connection();
        manager.session().close();
        dispatcher.run(events).await;

        assert_eq!(manager.state(), PushState::Disconnected);
        manager.connect().await.unwrap();
    }
}
