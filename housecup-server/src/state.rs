//! Application state shared across all request handlers.

use housecup_core::aggregator::WindowAggregator;
use housecup_core::config::{ConfigStore, StreamConfig};
use housecup_core::events::{StreamUpdateReceiver, stream_update_channel};
use housecup_core::processors::{RandomEventSource, StreamProducer, SubscriberHub};
use housecup_core::store::EventStore;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// Cheap to clone; every field is a handle over shared state.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: WindowAggregator,
    /// Owns the sessions and the stream producer.
    pub hub: SubscriberHub,
    /// Stream pacing; replaced on SIGHUP.
    pub stream_config: ConfigStore<StreamConfig>,
}

impl AppState {
    /// Wire the store, aggregator, producer and hub together.
    ///
    /// Returns the receiving end of the producer's update channel, to be
    /// handed to [`SubscriberHub::run`].
    pub fn new(
        store: EventStore,
        stream_config: ConfigStore<StreamConfig>,
        subscriber_buffer: usize,
    ) -> (Self, StreamUpdateReceiver) {
        let aggregator = WindowAggregator::new(store);
        let (update_tx, update_rx) = stream_update_channel();
        let producer = StreamProducer::new(
            aggregator.clone(),
            Arc::new(RandomEventSource),
            stream_config.clone(),
            update_tx,
        );
        let hub = SubscriberHub::with_session_buffer(producer, aggregator.clone(), subscriber_buffer);

        let state = Self {
            aggregator,
            hub,
            stream_config,
        };
        (state, update_rx)
    }

    pub fn producer(&self) -> &StreamProducer {
        self.hub.producer()
    }
}
