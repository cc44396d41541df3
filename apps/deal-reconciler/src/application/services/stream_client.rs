//! Live Deal Stream Client
//!
//! One client per account. A single background task owns the subscription,
//! the reconnect loop and the rolling window, so messages for an account are
//! handled strictly in order. Window updates and state changes reach
//! subscribers through channels:
//!
//! - a `watch` channel for the latest state and the latest window
//! - a `broadcast` channel carrying every [`StreamEvent`]
//!
//! ```text
//! Idle -> Connecting -> Open -> Reconnecting{n} -> Connecting -> ...
//!                                    \-> RetriesExhausted (until reconnect())
//! any state -> Stopped (stop())
//! ```

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use super::retry::{RetryConfig, RetryPolicy};
use crate::application::ports::{LiveDealFeedPort, RawMessageStream};
use crate::domain::aggregation::{Group, group};
use crate::domain::deal::normalizer::parse_deal_message;
use crate::domain::deal::{
    DealField, DealRecord, DealSource, MANAGER_VOLUME_DIVISOR, STREAM_WINDOW_CAPACITY,
    StreamWindow, normalize_batch, scale_volumes,
};
use crate::infrastructure::metrics;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

// =============================================================================
// State and Events
// =============================================================================

/// Connection state of a stream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Never started.
    Idle,
    /// Opening a subscription.
    Connecting,
    /// Subscription open, messages flowing.
    Open,
    /// Closed; waiting to make automatic reconnect number `attempt`.
    Reconnecting {
        /// 1-based reconnect attempt.
        attempt: u32,
    },
    /// Closed after the last allowed reconnect; waits for `reconnect()`.
    RetriesExhausted,
    /// Stopped by the owner.
    Stopped,
}

impl StreamState {
    /// Whether a worker task is driving the stream.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Open | Self::Reconnecting { .. }
        )
    }
}

/// Notification sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The connection state changed.
    StateChanged(StreamState),
    /// New window contents, newest first.
    WindowUpdated(Arc<Vec<DealRecord>>),
}

// =============================================================================
// Configuration
// =============================================================================

/// Stream client settings.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// Which feed layout the messages use.
    pub source: DealSource,
    /// Reconnect limits.
    pub retry: RetryConfig,
    /// Deals kept in the window.
    pub window_capacity: usize,
    /// Buffered events per subscriber before it lags.
    pub event_capacity: usize,
    /// Divisor applied to volumes by [`StreamClient::grouped`].
    pub volume_divisor: Option<Decimal>,
}

impl StreamClientConfig {
    /// Defaults for a feed; manager volumes are scaled to lots when grouped.
    #[must_use]
    pub fn for_source(source: DealSource) -> Self {
        Self {
            source,
            retry: RetryConfig::default(),
            window_capacity: STREAM_WINDOW_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            volume_divisor: match source {
                DealSource::Manager => Some(MANAGER_VOLUME_DIVISOR),
                DealSource::Terminal => None,
            },
        }
    }
}

impl Default for StreamClientConfig {
    fn default() -> Self {
        Self::for_source(DealSource::Manager)
    }
}

// =============================================================================
// Client
// =============================================================================

struct Shared {
    state: watch::Sender<StreamState>,
    window: watch::Sender<Arc<Vec<DealRecord>>>,
    events: broadcast::Sender<StreamEvent>,
}

impl Shared {
    fn set_state(&self, state: StreamState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            let _ = self.events.send(StreamEvent::StateChanged(state));
        }
    }

    fn publish_window(&self, window: &StreamWindow) {
        let snapshot = Arc::new(window.snapshot());
        self.window.send_replace(Arc::clone(&snapshot));
        let _ = self.events.send(StreamEvent::WindowUpdated(snapshot));
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Live deal subscription for one account.
pub struct StreamClient<F: LiveDealFeedPort + 'static> {
    account_id: String,
    feed: Arc<F>,
    config: StreamClientConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl<F: LiveDealFeedPort + 'static> StreamClient<F> {
    /// Create an idle client.
    #[must_use]
    pub fn new(account_id: impl Into<String>, feed: Arc<F>, config: StreamClientConfig) -> Self {
        let (state, _) = watch::channel(StreamState::Idle);
        let (window, _) = watch::channel(Arc::new(Vec::new()));
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            account_id: account_id.into(),
            feed,
            config,
            shared: Arc::new(Shared {
                state,
                window,
                events,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Account this client streams.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Start streaming. A no-op while a worker is active or after retries
    /// are exhausted; returns the resulting state.
    pub fn start(&self) -> StreamState {
        let mut worker = self.worker.lock();
        let current = self.state();
        if current.is_active() || current == StreamState::RetriesExhausted {
            return current;
        }
        *worker = Some(self.spawn_worker());
        self.state()
    }

    /// Stop streaming from any state. No reconnect is scheduled afterwards.
    pub async fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                tracing::warn!(account = %self.account_id, error = %e, "Stream worker ended abnormally");
            }
        }
        self.shared.set_state(StreamState::Stopped);
        tracing::info!(account = %self.account_id, "Deal stream stopped");
    }

    /// Tear down any worker and start over with a fresh retry budget.
    pub async fn reconnect(&self) -> StreamState {
        let previous = self.worker.lock().take();
        if let Some(worker) = previous {
            worker.cancel.cancel();
            let _ = worker.handle.await;
        }

        let mut worker = self.worker.lock();
        if worker.is_none() {
            tracing::info!(account = %self.account_id, "Manual reconnect requested");
            *worker = Some(self.spawn_worker());
        }
        drop(worker);
        self.state()
    }

    fn spawn_worker(&self) -> Worker {
        let cancel = CancellationToken::new();
        self.shared.set_state(StreamState::Connecting);

        let mut window = StreamWindow::new(self.config.window_capacity);
        window.push_batch(self.window().as_ref().clone());

        let task = StreamTask {
            account_id: self.account_id.clone(),
            feed: Arc::clone(&self.feed),
            source: self.config.source,
            policy: RetryPolicy::new(self.config.retry),
            window,
            shared: Arc::clone(&self.shared),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run());
        Worker { cancel, handle }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        *self.shared.state.borrow()
    }

    /// Watch the state.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<StreamState> {
        self.shared.state.subscribe()
    }

    /// Latest window, newest first.
    #[must_use]
    pub fn window(&self) -> Arc<Vec<DealRecord>> {
        Arc::clone(&self.shared.window.borrow())
    }

    /// Watch the window.
    #[must_use]
    pub fn window_changes(&self) -> watch::Receiver<Arc<Vec<DealRecord>>> {
        self.shared.window.subscribe()
    }

    /// Receive every event from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.shared.events.subscribe()
    }

    /// Events as a stream; lagged receivers skip ahead.
    #[must_use]
    pub fn updates(&self) -> impl futures::Stream<Item = StreamEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|event| async move { event.ok() })
    }

    /// Group the current window, volumes scaled per configuration.
    #[must_use]
    pub fn grouped(&self, key_fields: &[DealField]) -> Vec<Group> {
        self.group_snapshot(&self.window(), key_fields)
    }

    /// Group a window snapshot, such as one carried by
    /// [`StreamEvent::WindowUpdated`], with the same volume scaling.
    #[must_use]
    pub fn group_snapshot(&self, window: &[DealRecord], key_fields: &[DealField]) -> Vec<Group> {
        match self.config.volume_divisor {
            Some(divisor) => group(&scale_volumes(window, divisor), key_fields),
            None => group(window, key_fields),
        }
    }
}

impl<F: LiveDealFeedPort + 'static> Drop for StreamClient<F> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}

// =============================================================================
// Worker Task
// =============================================================================

enum SessionEnd {
    Cancelled,
    Lost(String),
}

struct StreamTask<F: LiveDealFeedPort> {
    account_id: String,
    feed: Arc<F>,
    source: DealSource,
    policy: RetryPolicy,
    window: StreamWindow,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl<F: LiveDealFeedPort> StreamTask<F> {
    async fn run(mut self) {
        loop {
            self.shared.set_state(StreamState::Connecting);
            tracing::info!(account = %self.account_id, source = %self.source, "Connecting deal stream");

            let subscribed = tokio::select! {
                () = self.cancel.cancelled() => return,
                result = self.feed.subscribe(&self.account_id) => result,
            };

            match subscribed {
                Ok(messages) => {
                    self.policy.reset();
                    self.shared.set_state(StreamState::Open);
                    metrics::stream_opened(self.source);
                    tracing::info!(account = %self.account_id, "Deal stream open");

                    let end = self.pump(messages).await;
                    metrics::stream_closed(self.source);
                    match end {
                        SessionEnd::Cancelled => return,
                        SessionEnd::Lost(reason) => {
                            tracing::warn!(account = %self.account_id, reason = %reason, "Deal stream closed");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(account = %self.account_id, error = %e, "Deal stream connect failed");
                }
            }

            if let Some(delay) = self.policy.next_delay() {
                let attempt = self.policy.attempt_count();
                self.shared.set_state(StreamState::Reconnecting { attempt });
                metrics::record_reconnect(self.source);
                tracing::info!(
                    account = %self.account_id,
                    attempt,
                    max_retries = self.policy.config().max_retries,
                    delay_ms = delay.as_millis(),
                    "Reconnecting deal stream"
                );

                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = self.cancel.cancelled() => return,
                }
            } else {
                self.shared.set_state(StreamState::RetriesExhausted);
                metrics::record_retries_exhausted(self.source);
                tracing::error!(
                    account = %self.account_id,
                    attempts = self.policy.attempt_count(),
                    "Deal stream reconnection attempts exhausted"
                );
                return;
            }
        }
    }

    async fn pump(&mut self, mut messages: RawMessageStream) -> SessionEnd {
        loop {
            let next = tokio::select! {
                () = self.cancel.cancelled() => return SessionEnd::Cancelled,
                next = messages.next() => next,
            };

            match next {
                Some(Ok(text)) => self.handle_message(&text),
                Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                None => return SessionEnd::Lost("stream ended".to_string()),
            }
        }
    }

    fn handle_message(&mut self, text: &str) {
        let raws = match parse_deal_message(text) {
            Ok(raws) => raws,
            Err(e) => {
                metrics::record_malformed(self.source, 1);
                tracing::warn!(account = %self.account_id, error = %e, "Dropping malformed deal message");
                return;
            }
        };

        let batch = normalize_batch(&raws, self.source);
        metrics::record_malformed(self.source, batch.dropped as u64);
        metrics::record_deals_received(self.source, batch.records.len() as u64);
        tracing::debug!(
            account = %self.account_id,
            received = batch.records.len(),
            dropped = batch.dropped,
            "Deal batch received"
        );

        self.window.push_batch(batch.records);
        self.shared.publish_window(&self.window);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::ports::FeedError;

    /// One scripted `subscribe` outcome.
    enum Session {
        Refuse,
        Messages(Vec<&'static str>),
        Hold(Vec<&'static str>),
    }

    struct ScriptedFeed {
        sessions: Mutex<VecDeque<Session>>,
        calls: Mutex<u32>,
    }

    impl ScriptedFeed {
        fn new(sessions: Vec<Session>) -> Arc<Self> {
            Arc::new(Self {
                sessions: Mutex::new(sessions.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl LiveDealFeedPort for ScriptedFeed {
        async fn subscribe(&self, _account_id: &str) -> Result<RawMessageStream, FeedError> {
            *self.calls.lock() += 1;
            let next = self.sessions.lock().pop_front();
            match next {
                None | Some(Session::Refuse) => Err(FeedError::ConnectionLost("refused".into())),
                Some(Session::Messages(msgs)) => Ok(stream::iter(
                    msgs.into_iter().map(|m| Ok(m.to_string())).collect::<Vec<_>>(),
                )
                .boxed()),
                Some(Session::Hold(msgs)) => Ok(stream::iter(
                    msgs.into_iter().map(|m| Ok(m.to_string())).collect::<Vec<_>>(),
                )
                .chain(stream::pending())
                .boxed()),
            }
        }
    }

    fn config() -> StreamClientConfig {
        StreamClientConfig {
            retry: RetryConfig::new(5, Duration::from_secs(5)),
            ..StreamClientConfig::for_source(DealSource::Manager)
        }
    }

    const BATCH_A: &str = r#"{"deals":[
        {"ticket":1,"order":11,"login":5001,"action":0,"symbol":"EURUSD","volume":10000,"profit":"5","time":1700000000},
        {"ticket":2,"order":12,"login":5001,"action":1,"symbol":"EURUSD","volume":20000,"profit":"-1","time":1700000001}
    ]}"#;
    const BATCH_B: &str = r#"{"deals":[
        {"ticket":3,"order":13,"login":5002,"action":0,"symbol":"XAUUSD","volume":5000,"profit":"2","time_msc":1700000002000}
    ]}"#;

    async fn wait_for_state(client: &StreamClient<ScriptedFeed>, target: StreamState) {
        let mut rx = client.state_changes();
        tokio::time::timeout(Duration::from_secs(120), rx.wait_for(|s| *s == target))
            .await
            .expect("state not reached")
            .expect("state channel closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_is_newest_first() {
        let feed = ScriptedFeed::new(vec![Session::Hold(vec![BATCH_A, BATCH_B])]);
        let client = StreamClient::new("mgr-1", Arc::clone(&feed), config());
        let mut windows = client.window_changes();

        client.start();
        windows
            .wait_for(|w| w.len() == 3)
            .await
            .expect("window channel closed");

        let tickets: Vec<u64> = client.window().iter().map(|d| d.ticket).collect();
        assert_eq!(tickets, vec![3, 1, 2]);
        assert_eq!(client.state(), StreamState::Open);
        client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_message_keeps_connection() {
        let feed = ScriptedFeed::new(vec![Session::Hold(vec!["not json", "{\"deals\":\"x\"}", BATCH_B])]);
        let client = StreamClient::new("mgr-1", Arc::clone(&feed), config());
        let mut windows = client.window_changes();

        client.start();
        windows
            .wait_for(|w| w.len() == 1)
            .await
            .expect("window channel closed");

        assert_eq!(client.state(), StreamState::Open);
        assert_eq!(feed.calls(), 1);
        client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_is_bounded() {
        let feed = ScriptedFeed::new(vec![Session::Hold(vec![BATCH_A, BATCH_A, BATCH_B])]);
        let client = StreamClient::new(
            "mgr-1",
            Arc::clone(&feed),
            StreamClientConfig {
                window_capacity: 2,
                ..config()
            },
        );
        let mut events = client.subscribe();

        client.start();
        let mut updates = 0;
        while updates < 3 {
            if let Ok(StreamEvent::WindowUpdated(window)) = events.recv().await {
                assert!(window.len() <= 2);
                updates += 1;
            }
        }
        let tickets: Vec<u64> = client.window().iter().map(|d| d.ticket).collect();
        assert_eq!(tickets, vec![3, 1]);
        client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhaust_after_five_reconnects() {
        let feed = ScriptedFeed::new(vec![Session::Messages(vec![BATCH_A])]);
        let client = StreamClient::new("mgr-1", Arc::clone(&feed), config());

        client.start();
        wait_for_state(&client, StreamState::RetriesExhausted).await;

        // initial open plus five refused reconnects
        assert_eq!(feed.calls(), 6);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(feed.calls(), 6);
        assert_eq!(client.state(), StreamState::RetriesExhausted);
        assert_eq!(client.start(), StreamState::RetriesExhausted);
        assert_eq!(client.window().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_open_resets_retry_budget() {
        let feed = ScriptedFeed::new(vec![
            Session::Messages(vec![]),
            Session::Refuse,
            Session::Refuse,
            Session::Refuse,
            Session::Messages(vec![]),
            Session::Refuse,
            Session::Refuse,
            Session::Refuse,
            Session::Refuse,
            Session::Hold(vec![]),
        ]);
        let client = StreamClient::new("mgr-1", Arc::clone(&feed), config());

        client.start();
        let mut rx = client.state_changes();
        tokio::time::timeout(
            Duration::from_secs(120),
            rx.wait_for(|_| feed.calls() == 10),
        )
        .await
        .expect("feed not reached")
        .expect("state channel closed");
        wait_for_state(&client, StreamState::Open).await;
        client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_reconnect_resets_counter() {
        let feed = ScriptedFeed::new(vec![]);
        let client = StreamClient::new("mgr-1", Arc::clone(&feed), config());

        client.start();
        wait_for_state(&client, StreamState::RetriesExhausted).await;
        assert_eq!(feed.calls(), 6);

        client.reconnect().await;
        wait_for_state(&client, StreamState::RetriesExhausted).await;
        assert_eq!(feed.calls(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_reconnect() {
        let feed = ScriptedFeed::new(vec![]);
        let client = StreamClient::new("mgr-1", Arc::clone(&feed), config());

        client.start();
        wait_for_state(&client, StreamState::Reconnecting { attempt: 1 }).await;
        client.stop().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(feed.calls(), 1);
        assert_eq!(client.state(), StreamState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_open_is_noop() {
        let feed = ScriptedFeed::new(vec![Session::Hold(vec![])]);
        let client = StreamClient::new("mgr-1", Arc::clone(&feed), config());

        client.start();
        wait_for_state(&client, StreamState::Open).await;
        assert_eq!(client.start(), StreamState::Open);
        assert_eq!(feed.calls(), 1);
        client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_events_are_broadcast() {
        let feed = ScriptedFeed::new(vec![Session::Hold(vec![])]);
        let client = StreamClient::new("mgr-1", Arc::clone(&feed), config());
        let mut events = client.subscribe();

        client.start();
        assert_eq!(
            events.recv().await.unwrap(),
            StreamEvent::StateChanged(StreamState::Connecting)
        );
        assert_eq!(
            events.recv().await.unwrap(),
            StreamEvent::StateChanged(StreamState::Open)
        );
        client.stop().await;
        assert_eq!(
            events.recv().await.unwrap(),
            StreamEvent::StateChanged(StreamState::Stopped)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_grouped_scales_manager_volume() {
        let feed = ScriptedFeed::new(vec![Session::Hold(vec![BATCH_A])]);
        let client = StreamClient::new("mgr-1", Arc::clone(&feed), config());
        let mut windows = client.window_changes();

        client.start();
        windows
            .wait_for(|w| w.len() == 2)
            .await
            .expect("window channel closed");

        let groups = client.grouped(&[DealField::Symbol]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].totals().volume, dec!(3));
        assert_eq!(groups[0].totals().profit, dec!(4));
        client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_snapshot_uses_the_given_window() {
        let feed = ScriptedFeed::new(vec![Session::Hold(vec![BATCH_A, BATCH_B])]);
        let client = StreamClient::new("mgr-1", Arc::clone(&feed), config());
        let mut events = client.subscribe();

        client.start();
        let first = loop {
            if let StreamEvent::WindowUpdated(window) = events.recv().await.unwrap() {
                break window;
            }
        };
        let mut windows = client.window_changes();
        windows
            .wait_for(|w| w.len() == 3)
            .await
            .expect("window channel closed");

        let groups = client.group_snapshot(&first, &[DealField::Symbol]);
        assert_eq!(first.len(), 2);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key_label(), "EURUSD");
        assert_eq!(groups[0].totals().volume, dec!(3));
        assert_eq!(client.grouped(&[DealField::Symbol]).len(), 2);
        client.stop().await;
    }
}
