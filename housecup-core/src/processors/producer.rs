//! The event stream: a cancellable background loop that records events and
//! emits one [`StreamUpdate`] per recorded event.

use crate::aggregator::WindowAggregator;
use crate::config::{ConfigStore, ConfigWatcher, StreamConfig};
use crate::events::StreamUpdateSender;
use crate::processors::source::EventSource;
use crate::store::StoreError;
use crate::utils::backoff::storage_backoff;
use housecup_sdk::objects::{HousePointEvent, StreamStatus, StreamUpdate};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Owns the emission loop and its `Stopped`/`Running` state.
///
/// At most one loop runs at a time. `start` and `stop` are serialized by one
/// mutex, and `stop` waits for the loop to finish, so a following `start`
/// never overlaps the previous loop.
#[derive(Clone)]
pub struct StreamProducer {
    inner: Arc<ProducerInner>,
}

struct ProducerInner {
    aggregator: WindowAggregator,
    source: Arc<dyn EventSource>,
    config: ConfigStore<StreamConfig>,
    update_tx: StreamUpdateSender,
    running: Mutex<Option<RunningLoop>>,
}

struct RunningLoop {
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl StreamProducer {
    pub fn new(
        aggregator: WindowAggregator,
        source: Arc<dyn EventSource>,
        config: ConfigStore<StreamConfig>,
        update_tx: StreamUpdateSender,
    ) -> Self {
        Self {
            inner: Arc::new(ProducerInner {
                aggregator,
                source,
                config,
                update_tx,
                running: Mutex::new(None),
            }),
        }
    }

    /// Launch the emission loop unless it is already running.
    pub async fn start(&self) -> StreamStatus {
        let mut running = self.inner.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("Event stream already running");
            return StreamStatus::Started;
        }

        // A loop that ended on its own (exhausted source, closed channel,
        // panic) still needs reaping.
        if let Some(finished) = running.take() {
            if let Err(e) = finished.handle.await {
                warn!(error = %e, "Previous emission loop ended abnormally");
            }
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let emission = EmissionLoop {
            aggregator: self.inner.aggregator.clone(),
            source: Arc::clone(&self.inner.source),
            config: self.inner.config.clone(),
            update_tx: self.inner.update_tx.clone(),
        };
        let handle = tokio::spawn(emission.run(cancel_rx));
        *running = Some(RunningLoop { cancel_tx, handle });

        info!("Event stream started");
        StreamStatus::Started
    }

    /// Cancel the emission loop and wait for it to finish.
    ///
    /// An update already being published completes; no new one starts.
    pub async fn stop(&self) -> StreamStatus {
        let mut running = self.inner.running.lock().await;
        let Some(RunningLoop { cancel_tx, handle }) = running.take() else {
            debug!("Event stream already stopped");
            return StreamStatus::Stopped;
        };

        let _ = cancel_tx.send(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "Emission loop ended abnormally");
        }
        info!("Event stream stopped");
        StreamStatus::Stopped
    }

    pub async fn status(&self) -> StreamStatus {
        let running = self.inner.running.lock().await;
        match running.as_ref() {
            Some(r) if !r.handle.is_finished() => StreamStatus::Started,
            _ => StreamStatus::Stopped,
        }
    }

    /// Stop the stream for process exit.
    pub async fn shutdown(&self) {
        self.stop().await;
        info!("StreamProducer shutdown complete");
    }
}

#[derive(Debug)]
enum EmitError {
    Storage(StoreError),
    Cancelled,
    Closed,
}

impl From<StoreError> for EmitError {
    fn from(e: StoreError) -> Self {
        EmitError::Storage(e)
    }
}

/// State owned by one run of the loop.
struct EmissionLoop {
    aggregator: WindowAggregator,
    source: Arc<dyn EventSource>,
    config: ConfigStore<StreamConfig>,
    update_tx: StreamUpdateSender,
}

impl EmissionLoop {
    async fn run(self, mut cancel_rx: watch::Receiver<bool>) {
        let mut config_watcher = self.config.subscribe();
        let mut failures: u32 = 0;

        loop {
            if *cancel_rx.borrow() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = cancel_rx.changed() => break,
                next = self.source.next_event() => next,
            };
            let Some(event) = next else {
                info!("Event source exhausted, stopping stream");
                break;
            };

            match self.emit_once(event, &mut cancel_rx).await {
                Ok(()) => failures = 0,
                Err(EmitError::Storage(StoreError::DuplicateId(id))) => {
                    warn!(%id, "Event id already recorded, skipping broadcast");
                }
                Err(EmitError::Storage(e)) => {
                    failures = failures.saturating_add(1);
                    let backoff = storage_backoff(failures);
                    error!(error = %e, failures, ?backoff, "Failed to record event");
                    tokio::select! {
                        biased;
                        _ = cancel_rx.changed() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    continue;
                }
                Err(EmitError::Cancelled) => break,
                Err(EmitError::Closed) => {
                    info!("Update channel closed, stopping stream");
                    break;
                }
            }

            if !self.pause(&mut cancel_rx, &mut config_watcher).await {
                break;
            }
        }

        debug!("Emission loop exited");
    }

    /// Record `event`, take a snapshot and publish the update.
    async fn emit_once(
        &self,
        event: HousePointEvent,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<(), EmitError> {
        self.aggregator.store().append(&event).await?;
        let totals = self.aggregator.snapshot().await?;
        debug!(
            id = %event.id,
            category = %event.category,
            points = event.points,
            "Publishing update"
        );

        let update = Arc::new(StreamUpdate { event, totals });
        tokio::select! {
            biased;
            _ = cancel_rx.changed() => Err(EmitError::Cancelled),
            sent = self.update_tx.send(update) => sent.map_err(|_| EmitError::Closed),
        }
    }

    /// Wait a randomized delay. A config reload restarts the wait with the
    /// new range. Returns `false` when cancelled.
    async fn pause(
        &self,
        cancel_rx: &mut watch::Receiver<bool>,
        config_watcher: &mut ConfigWatcher,
    ) -> bool {
        loop {
            let delay = self.config.read().await.sample_delay();
            tokio::select! {
                biased;
                _ = cancel_rx.changed() => return false,
                Ok(()) = config_watcher.changed() => {
                    debug!("Stream pacing changed, resampling delay");
                }
                _ = tokio::time::sleep(delay) => return true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{StreamUpdateReceiver, stream_update_channel};
    use crate::test_support::{GaugeSource, ScriptedSource, event_at, fast_config, memory_store};
    use housecup_sdk::objects::Category;
    use std::time::Duration;
    use time::OffsetDateTime;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn producer_with(
        source: Arc<dyn EventSource>,
        config: StreamConfig,
    ) -> (StreamProducer, StreamUpdateReceiver, WindowAggregator) {
        let aggregator = WindowAggregator::new(memory_store().await);
        let (update_tx, update_rx) = stream_update_channel();
        let producer =
            StreamProducer::new(aggregator.clone(), source, ConfigStore::new(config), update_tx);
        (producer, update_rx, aggregator)
    }

    async fn wait_until_stopped(producer: &StreamProducer) {
        timeout(WAIT, async {
            while producer.status().await == StreamStatus::Started {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_initial_state_is_stopped() {
        let (producer, _rx, _) =
            producer_with(Arc::new(ScriptedSource::new(Vec::new())), fast_config()).await;
        assert_eq!(producer.status().await, StreamStatus::Stopped);
        assert_eq!(producer.stop().await, StreamStatus::Stopped);
        assert_eq!(producer.status().await, StreamStatus::Stopped);
    }

    #[tokio::test]
    async fn test_start_twice_runs_one_loop() {
        let source = Arc::new(GaugeSource::new(Duration::from_millis(20)));
        let (producer, mut rx, _) = producer_with(source.clone(), fast_config()).await;

        assert_eq!(producer.start().await, StreamStatus::Started);
        assert_eq!(producer.start().await, StreamStatus::Started);
        assert_eq!(producer.status().await, StreamStatus::Started);

        for _ in 0..5 {
            timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        }
        assert_eq!(producer.stop().await, StreamStatus::Stopped);
        assert_eq!(source.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_stop_ends_updates_and_start_resumes() {
        let source = Arc::new(GaugeSource::new(Duration::from_millis(1)));
        let (producer, mut rx, _) = producer_with(source, fast_config()).await;

        producer.start().await;
        timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(producer.stop().await, StreamStatus::Stopped);
        assert_eq!(producer.status().await, StreamStatus::Stopped);

        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

        assert_eq!(producer.start().await, StreamStatus::Started);
        timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        producer.shutdown().await;
        assert_eq!(producer.status().await, StreamStatus::Stopped);
    }

    #[tokio::test]
    async fn test_duplicate_event_is_recorded_once_and_not_broadcast() {
        let now = OffsetDateTime::now_utc();
        let source = ScriptedSource::new([
            event_at("a", Category::Gryff, 10, now),
            event_at("a", Category::Gryff, 10, now),
            event_at("b", Category::Raven, 4, now),
        ]);
        let (producer, mut rx, aggregator) = producer_with(Arc::new(source), fast_config()).await;

        producer.start().await;
        let first = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        let second = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.event.id, "a");
        assert_eq!(second.event.id, "b");
        assert_eq!(second.totals.unbounded.get(Category::Gryff), 10);
        assert_eq!(second.totals.short.get(Category::Raven), 4);

        // The scripted source is exhausted, so the loop ends by itself.
        wait_until_stopped(&producer).await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
        assert_eq!(aggregator.store().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_carries_totals_including_its_event() {
        let now = OffsetDateTime::now_utc();
        let source = ScriptedSource::new([
            event_at("g1", Category::Gryff, 10, now),
            event_at("s1", Category::Slyth, 5, now),
            event_at("g2", Category::Gryff, 7, now),
        ]);
        let (producer, mut rx, _) = producer_with(Arc::new(source), fast_config()).await;

        producer.start().await;
        let mut last = None;
        for _ in 0..3 {
            last = Some(timeout(WAIT, rx.recv()).await.unwrap().unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.event.id, "g2");
        assert_eq!(last.totals.short.get(Category::Gryff), 17);
        assert_eq!(last.totals.short.get(Category::Slyth), 5);
        assert_eq!(last.totals.short.get(Category::Huff), 0);
    }

    #[tokio::test]
    async fn test_stop_is_prompt_during_storage_backoff() {
        let source = Arc::new(GaugeSource::new(Duration::from_millis(1)));
        let (producer, mut rx, aggregator) = producer_with(source, fast_config()).await;
        aggregator.store().pool().close().await;

        producer.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Storage failures never end the loop on their own.
        assert_eq!(producer.status().await, StreamStatus::Started);

        let stopped = timeout(Duration::from_millis(400), producer.stop()).await;
        assert_eq!(stopped.unwrap(), StreamStatus::Stopped);
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn test_loop_ends_when_update_channel_closes() {
        let source = Arc::new(GaugeSource::new(Duration::from_millis(1)));
        let (producer, rx, _) = producer_with(source, fast_config()).await;
        drop(rx);

        producer.start().await;
        wait_until_stopped(&producer).await;
        // A finished loop does not block a restart.
        assert_eq!(producer.start().await, StreamStatus::Started);
        producer.stop().await;
    }

    #[tokio::test]
    async fn test_config_reload_applies_to_running_loop() {
        let source = Arc::new(GaugeSource::new(Duration::from_millis(1)));
        let slow = StreamConfig::new(Duration::from_secs(60), Duration::from_secs(60)).unwrap();
        let aggregator = WindowAggregator::new(memory_store().await);
        let (update_tx, mut rx) = stream_update_channel();
        let config = ConfigStore::new(slow);
        let producer = StreamProducer::new(aggregator, source, config.clone(), update_tx);

        producer.start().await;
        timeout(WAIT, rx.recv()).await.unwrap().unwrap();

        config.update(fast_config()).await;
        timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        producer.stop().await;
    }
}
