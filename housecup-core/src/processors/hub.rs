//! Fan-out of stream updates to connected sessions, plus the control
//! commands sessions may send.

use crate::aggregator::WindowAggregator;
use crate::events::{
    DEFAULT_SESSION_BUFFER, SessionReceiver, SessionSender, StreamUpdateReceiver, session_channel,
};
use crate::processors::producer::StreamProducer;
use housecup_sdk::objects::{
    ALL_WINDOWS_KEY, ControlCommand, ControlReply, ReplyStatus, StreamUpdate, Window,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Why an update did not reach a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The session's receiver is gone; the session is removed.
    #[error("session closed")]
    Closed,
    /// The session's queue is full; this update is dropped for it.
    #[error("session queue full")]
    Full,
}

/// Outcome of one [`SubscriberHub::broadcast`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    pub removed: usize,
}

/// The receiving end of one registered session.
#[derive(Debug)]
pub struct SubscriberSession {
    id: Uuid,
    updates: SessionReceiver,
}

impl SubscriberSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next update for this session, in append order. `None` once the hub
    /// has removed the session.
    pub async fn recv(&mut self) -> Option<Arc<StreamUpdate>> {
        self.updates.recv().await
    }
}

struct SessionHandle {
    sender: SessionSender,
    live: bool,
}

/// Registry of sessions.
///
/// Delivery never waits on a session: each has a bounded queue, and a
/// failure on one session never affects the others.
#[derive(Clone)]
pub struct SubscriberHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    producer: StreamProducer,
    aggregator: WindowAggregator,
    session_buffer: usize,
}

impl SubscriberHub {
    pub fn new(producer: StreamProducer, aggregator: WindowAggregator) -> Self {
        Self::with_session_buffer(producer, aggregator, DEFAULT_SESSION_BUFFER)
    }

    pub fn with_session_buffer(
        producer: StreamProducer,
        aggregator: WindowAggregator,
        session_buffer: usize,
    ) -> Self {
        Self {
            inner: Arc::new(HubInner {
                sessions: RwLock::new(HashMap::new()),
                producer,
                aggregator,
                session_buffer,
            }),
        }
    }

    pub fn producer(&self) -> &StreamProducer {
        &self.inner.producer
    }

    /// Register a new session. It receives every update broadcast from now
    /// on until it unsubscribes or is unregistered.
    pub async fn register(&self) -> SubscriberSession {
        let id = Uuid::now_v7();
        let (sender, updates) = session_channel(self.inner.session_buffer);
        let mut sessions = self.inner.sessions.write().await;
        sessions.insert(id, SessionHandle { sender, live: true });
        debug!(session = %id, total = sessions.len(), "Session registered");
        SubscriberSession { id, updates }
    }

    /// Remove a session. Unknown ids are ignored.
    pub async fn unregister(&self, id: Uuid) {
        let mut sessions = self.inner.sessions.write().await;
        if sessions.remove(&id).is_some() {
            debug!(session = %id, total = sessions.len(), "Session unregistered");
        }
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    /// Deliver `update` to every live session.
    ///
    /// Closed sessions are removed. A session whose queue is full misses
    /// this update. Never fails.
    pub async fn broadcast(&self, update: Arc<StreamUpdate>) -> BroadcastReport {
        let targets: Vec<(Uuid, SessionSender)> = {
            let sessions = self.inner.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, handle)| handle.live)
                .map(|(id, handle)| (*id, handle.sender.clone()))
                .collect()
        };

        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();
        for (id, sender) in targets {
            match deliver(&sender, Arc::clone(&update)) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Full) => {
                    report.dropped += 1;
                    warn!(
                        session = %id,
                        event = %update.event.id,
                        "Session is lagging, dropping update"
                    );
                }
                Err(DeliveryError::Closed) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut sessions = self.inner.sessions.write().await;
            for id in closed {
                if sessions.remove(&id).is_some() {
                    report.removed += 1;
                    debug!(session = %id, "Removed closed session");
                }
            }
        }

        report
    }

    /// Apply a control command on behalf of session `id`.
    pub async fn handle_control(&self, id: Uuid, command: ControlCommand) -> ControlReply {
        match command {
            ControlCommand::Start => ControlReply::status(self.inner.producer.start().await),
            ControlCommand::Stop => ControlReply::status(self.inner.producer.stop().await),
            ControlCommand::GetPoints { time_window } => {
                match Window::from_request(time_window.as_deref()) {
                    Ok(window) => {
                        let key = time_window.unwrap_or_else(|| ALL_WINDOWS_KEY.to_owned());
                        self.points_reply(window, key).await
                    }
                    Err(e) => ControlReply::error(e.to_string()),
                }
            }
            ControlCommand::Subscribe => self.set_live(id, true).await,
            ControlCommand::Unsubscribe => self.set_live(id, false).await,
        }
    }

    /// Decode and apply one raw control frame. Malformed frames get an error
    /// reply; they never end the session.
    pub async fn handle_message(&self, id: Uuid, text: &str) -> ControlReply {
        match serde_json::from_str::<ControlCommand>(text) {
            Ok(command) => self.handle_control(id, command).await,
            Err(e) => {
                debug!(session = %id, error = %e, "Rejected control frame");
                ControlReply::error(format!("unrecognized command: {e}"))
            }
        }
    }

    /// Pump updates from the producer to the sessions until shutdown is
    /// signaled or every producer handle is gone.
    pub async fn run(
        self,
        mut update_rx: StreamUpdateReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("SubscriberHub started");
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("SubscriberHub received shutdown signal");
                        break;
                    }
                }

                Some(update) = update_rx.recv() => {
                    let report = self.broadcast(update).await;
                    debug!(
                        delivered = report.delivered,
                        dropped = report.dropped,
                        removed = report.removed,
                        "Broadcast update"
                    );
                }

                else => {
                    info!("Update channel closed");
                    break;
                }
            }
        }

        // Dropping the senders ends every session's update stream.
        self.inner.sessions.write().await.clear();
        info!("SubscriberHub shutdown complete");
    }

    /// Totals of `window`, keyed by the name the client asked for.
    async fn points_reply(&self, window: Window, key: String) -> ControlReply {
        match self.inner.aggregator.snapshot_window(window).await {
            Ok(totals) => ControlReply::totals(key, totals),
            Err(e) => {
                error!(error = %e, %window, "Failed to compute totals");
                ControlReply::error("totals are temporarily unavailable")
            }
        }
    }

    async fn set_live(&self, id: Uuid, live: bool) -> ControlReply {
        let mut sessions = self.inner.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(handle) => {
                handle.live = live;
                ControlReply::status(if live {
                    ReplyStatus::Subscribed
                } else {
                    ReplyStatus::Unsubscribed
                })
            }
            None => ControlReply::error("unknown session"),
        }
    }
}

fn deliver(sender: &SessionSender, update: Arc<StreamUpdate>) -> Result<(), DeliveryError> {
    sender.try_send(update).map_err(|e| match e {
        TrySendError::Full(_) => DeliveryError::Full,
        TrySendError::Closed(_) => DeliveryError::Closed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::events::stream_update_channel;
    use crate::processors::source::EventSource;
    use crate::test_support::{GaugeSource, ScriptedSource, event_at, fast_config, memory_store};
    use housecup_sdk::objects::{AllWindowTotals, Category, StreamStatus, WindowTotals};
    use std::time::Duration;
    use time::OffsetDateTime;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn hub_with(
        source: Arc<dyn EventSource>,
        session_buffer: usize,
    ) -> (SubscriberHub, StreamUpdateReceiver, WindowAggregator) {
        let aggregator = WindowAggregator::new(memory_store().await);
        let (update_tx, update_rx) = stream_update_channel();
        let producer = StreamProducer::new(
            aggregator.clone(),
            source,
            ConfigStore::new(fast_config()),
            update_tx,
        );
        let hub = SubscriberHub::with_session_buffer(producer, aggregator.clone(), session_buffer);
        (hub, update_rx, aggregator)
    }

    async fn idle_hub() -> (SubscriberHub, StreamUpdateReceiver, WindowAggregator) {
        hub_with(Arc::new(ScriptedSource::new(Vec::new())), 8).await
    }

    fn update(id: &str) -> Arc<StreamUpdate> {
        Arc::new(StreamUpdate {
            event: event_at(id, Category::Huff, 1, OffsetDateTime::now_utc()),
            totals: AllWindowTotals::default(),
        })
    }

    #[tokio::test]
    async fn test_failing_session_is_removed_and_others_receive() {
        let (hub, _rx, _) = idle_hub().await;
        let mut first = hub.register().await;
        let broken = hub.register().await;
        let mut third = hub.register().await;
        assert_eq!(hub.session_count().await, 3);
        drop(broken);

        let report = hub.broadcast(update("u1")).await;
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 2,
                dropped: 0,
                removed: 1
            }
        );
        assert_eq!(hub.session_count().await, 2);
        assert_eq!(first.recv().await.unwrap().event.id, "u1");
        assert_eq!(third.recv().await.unwrap().event.id, "u1");
    }

    #[tokio::test]
    async fn test_full_session_drops_update_without_blocking_others() {
        let (hub, _rx, _) = hub_with(Arc::new(ScriptedSource::new(Vec::new())), 1).await;
        let mut slow = hub.register().await;
        let mut fast = hub.register().await;

        assert_eq!(hub.broadcast(update("u1")).await.delivered, 2);
        assert_eq!(fast.recv().await.unwrap().event.id, "u1");

        let report = hub.broadcast(update("u2")).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.removed, 0);
        assert_eq!(hub.session_count().await, 2);

        assert_eq!(fast.recv().await.unwrap().event.id, "u2");
        assert_eq!(slow.recv().await.unwrap().event.id, "u1");
    }

    #[tokio::test]
    async fn test_updates_arrive_in_broadcast_order() {
        let (hub, _rx, _) = idle_hub().await;
        let mut session = hub.register().await;
        for id in ["a", "b", "c"] {
            hub.broadcast(update(id)).await;
        }
        for id in ["a", "b", "c"] {
            assert_eq!(session.recv().await.unwrap().event.id, id);
        }
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let (hub, _rx, _) = idle_hub().await;
        let mut session = hub.register().await;
        hub.unregister(session.id()).await;
        hub.unregister(session.id()).await;
        assert_eq!(hub.session_count().await, 0);

        assert_eq!(hub.broadcast(update("late")).await, BroadcastReport::default());
        assert!(session.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribed_session_is_skipped() {
        let (hub, _rx, _) = idle_hub().await;
        let mut session = hub.register().await;

        let reply = hub.handle_control(session.id(), ControlCommand::Unsubscribe).await;
        assert_eq!(reply, ControlReply::status(ReplyStatus::Unsubscribed));
        assert_eq!(hub.broadcast(update("hidden")).await.delivered, 0);

        let reply = hub.handle_control(session.id(), ControlCommand::Subscribe).await;
        assert_eq!(reply, ControlReply::status(ReplyStatus::Subscribed));
        hub.broadcast(update("seen")).await;
        assert_eq!(session.recv().await.unwrap().event.id, "seen");
    }

    #[tokio::test]
    async fn test_get_points_replies_with_window_totals() {
        let (hub, _rx, aggregator) = idle_hub().await;
        let now = OffsetDateTime::now_utc();
        let store = aggregator.store();
        store.append(&event_at("g1", Category::Gryff, 10, now)).await.unwrap();
        store.append(&event_at("s1", Category::Slyth, 5, now)).await.unwrap();
        store.append(&event_at("g2", Category::Gryff, 7, now)).await.unwrap();

        let session = hub.register().await;
        let reply = hub
            .handle_control(session.id(), ControlCommand::get_points(Window::Short))
            .await;
        let expected = WindowTotals::from_sums([(Category::Gryff, 17), (Category::Slyth, 5)]);
        assert_eq!(reply, ControlReply::totals("short", expected.clone()));

        // Replies are keyed by the name the client sent; an omitted window
        // means all time and is keyed "all".
        for (frame, key) in [
            (r#"{"action":"get_points"}"#, "all"),
            (r#"{"action":"get_points","time_window":"all"}"#, "all"),
            (r#"{"action":"get_points","time_window":"5m"}"#, "5m"),
            (r#"{"action":"get_points","time_window":"unbounded"}"#, "unbounded"),
        ] {
            let reply = hub.handle_message(session.id(), frame).await;
            assert_eq!(reply, ControlReply::totals(key, expected.clone()), "{frame}");
        }

        // Queries leave the producer alone.
        assert_eq!(hub.producer().status().await, StreamStatus::Stopped);
    }

    #[tokio::test]
    async fn test_bad_frames_get_error_replies() {
        let (hub, _rx, _) = idle_hub().await;
        let session = hub.register().await;

        for frame in [
            r#"{"action":"dance"}"#,
            "not json",
            r#"{"action":"get_points","time_window":"week"}"#,
        ] {
            let reply = hub.handle_message(session.id(), frame).await;
            assert!(matches!(reply, ControlReply::Error { .. }), "{frame}: {reply:?}");
        }
        assert_eq!(hub.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_start_and_stop_delegate_to_producer() {
        let (hub, mut update_rx, _) =
            hub_with(Arc::new(GaugeSource::new(Duration::from_millis(1))), 8).await;
        let session = hub.register().await;

        let reply = hub.handle_message(session.id(), r#"{"action":"start"}"#).await;
        assert_eq!(reply, ControlReply::status(StreamStatus::Started));
        timeout(WAIT, update_rx.recv()).await.unwrap().unwrap();

        let reply = hub.handle_message(session.id(), r#"{"action":"stop"}"#).await;
        assert_eq!(reply, ControlReply::status(StreamStatus::Stopped));
        let reply = hub.handle_message(session.id(), r#"{"action":"stop"}"#).await;
        assert_eq!(reply, ControlReply::status(StreamStatus::Stopped));
    }

    #[tokio::test]
    async fn test_run_pumps_producer_updates_to_sessions() {
        let (hub, update_rx, _) =
            hub_with(Arc::new(GaugeSource::new(Duration::from_millis(1))), 64).await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pump = tokio::spawn(hub.clone().run(update_rx, shutdown_rx));

        let mut a = hub.register().await;
        let mut b = hub.register().await;
        hub.producer().start().await;

        let from_a = timeout(WAIT, a.recv()).await.unwrap().unwrap();
        let from_b = timeout(WAIT, b.recv()).await.unwrap().unwrap();
        assert_eq!(from_a.event.id, from_b.event.id);
        hub.producer().stop().await;

        shutdown_tx.send(true).unwrap();
        timeout(WAIT, pump).await.unwrap().unwrap();
        assert_eq!(hub.session_count().await, 0);
    }
}
