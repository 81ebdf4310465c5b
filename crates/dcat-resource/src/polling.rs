//! Interval polling with subscriber-driven lifetime
//!
//! A [`PollingResource`] runs at most one poll at a time. Each poll is a
//! tokio task that calls the fetch function every `interval`, never starting
//! a fetch while the previous one is still running, and publishes outcomes
//! to subscribers through a `watch` channel.
//!
//! The poll stops when:
//! - it is cancelled through its [`PollHandle`]
//! - the resource is stopped, dropped, or started with different arguments
//! - every [`PollSubscription`] has been dropped
//!
//! An interval below [`MIN_POLL_INTERVAL`] is raised to it.
//!
//! A fetch that is in flight when the poll stops is abandoned and its result
//! is never published.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cache::FetchFn;

/// Shortest interval a poll runs at; zero is raised to this
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Time between fetch starts
    #[serde(rename = "interval_ms", with = "crate::duration_ms")]
    pub interval: Duration,
}

impl PollingConfig {
    #[inline]
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    #[inline]
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Latest published state of a poll
#[derive(Debug)]
pub struct PollSnapshot<V, E> {
    /// Most recent successful value
    pub value: Option<V>,
    /// Error from the most recent fetch, cleared by the next success
    pub error: Option<Arc<E>>,
    /// Number of fetch outcomes published so far
    pub generation: u64,
    /// When the last outcome was published
    pub updated_at: Option<Instant>,
}

impl<V, E> PollSnapshot<V, E> {
    fn empty() -> Self {
        Self {
            value: None,
            error: None,
            generation: 0,
            updated_at: None,
        }
    }

    /// Check if no fetch has completed yet
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.generation == 0
    }

    fn record(&mut self, outcome: Result<V, E>) {
        match outcome {
            Ok(value) => {
                self.value = Some(value);
                self.error = None;
            }
            Err(err) => self.error = Some(Arc::new(err)),
        }
        self.generation += 1;
        self.updated_at = Some(Instant::now());
    }
}

impl<V: Clone, E> Clone for PollSnapshot<V, E> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            error: self.error.clone(),
            generation: self.generation,
            updated_at: self.updated_at,
        }
    }
}

/// Cancels one poll
#[derive(Debug, Clone)]
pub struct PollHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl PollHandle {
    fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel: Arc::new(cancel),
        }
    }

    /// Stop the poll; an in-flight fetch result is discarded
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }
}

/// Receives outcomes of a poll; dropping every subscription ends the poll
pub struct PollSubscription<V, E> {
    rx: watch::Receiver<PollSnapshot<V, E>>,
    handle: PollHandle,
}

impl<V: Clone, E> PollSubscription<V, E> {
    /// Current snapshot without waiting
    #[must_use]
    pub fn latest(&self) -> PollSnapshot<V, E> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published outcome
    ///
    /// Only the latest snapshot is kept: a subscriber that falls behind
    /// skips straight to it. Compare `generation` with the last one seen
    /// to detect skipped outcomes. Returns `None` once the poll has ended.
    pub async fn changed(&mut self) -> Option<PollSnapshot<V, E>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Handle that cancels the poll for every subscriber
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &PollHandle {
        &self.handle
    }
}

impl<V, E> fmt::Debug for PollSubscription<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSubscription")
            .field("cancelled", &self.handle.is_cancelled())
            .finish_non_exhaustive()
    }
}

struct ActivePoll<A, V, E> {
    args: A,
    state: Weak<watch::Sender<PollSnapshot<V, E>>>,
    handle: PollHandle,
    task: JoinHandle<()>,
}

impl<A, V, E> ActivePoll<A, V, E> {
    /// Open a subscription if the poll is still running
    fn subscribe(&self) -> Option<PollSubscription<V, E>> {
        if self.handle.is_cancelled() || self.task.is_finished() {
            return None;
        }
        let state = self.state.upgrade()?;
        if state.is_closed() {
            return None;
        }
        Some(PollSubscription {
            rx: state.subscribe(),
            handle: self.handle.clone(),
        })
    }
}

/// Periodically re-fetches a value while anyone is subscribed
pub struct PollingResource<A, V, E> {
    fetch: FetchFn<A, V, E>,
    config: PollingConfig,
    active: Mutex<Option<ActivePoll<A, V, E>>>,
}

impl<A, V, E> PollingResource<A, V, E>
where
    A: Clone + PartialEq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new<F, Fut>(fetch: F, config: PollingConfig) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let mut config = config;
        if config.interval < MIN_POLL_INTERVAL {
            tracing::warn!(interval = ?config.interval, min = ?MIN_POLL_INTERVAL, "poll interval too short, raised");
            config.interval = MIN_POLL_INTERVAL;
        }
        Self {
            fetch: Arc::new(move |args| fetch(args).boxed()),
            config,
            active: Mutex::new(None),
        }
    }

    /// Subscribe to polling with `args`, starting a poll if needed
    ///
    /// Joins the running poll when its arguments are equal to `args`;
    /// otherwise the running poll is cancelled and replaced. The first
    /// fetch starts immediately.
    ///
    /// Must be called within a tokio runtime.
    pub fn subscribe(&self, args: A) -> PollSubscription<V, E> {
        let mut active = self.active.lock();

        if let Some(poll) = active.as_ref() {
            if poll.args == args {
                if let Some(subscription) = poll.subscribe() {
                    return subscription;
                }
            }
        }
        if let Some(previous) = active.take() {
            tracing::debug!("replacing active poll");
            previous.handle.cancel();
        }

        let handle = PollHandle::new();
        let (state, rx) = watch::channel(PollSnapshot::empty());
        let state = Arc::new(state);
        let task = tokio::spawn(run_poll(
            Arc::clone(&self.fetch),
            args.clone(),
            self.config.interval,
            Arc::clone(&state),
            handle.subscribe(),
        ));
        tracing::debug!(interval = ?self.config.interval, "poll started");

        *active = Some(ActivePoll {
            args,
            state: Arc::downgrade(&state),
            handle: handle.clone(),
            task,
        });
        PollSubscription { rx, handle }
    }

    /// Cancel the active poll, if any
    pub fn stop(&self) {
        if let Some(poll) = self.active.lock().take() {
            poll.handle.cancel();
        }
    }

    /// Check if a poll is currently running
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|poll| poll.subscribe().is_some())
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PollingConfig {
        &self.config
    }
}

impl<A, V, E> Drop for PollingResource<A, V, E> {
    fn drop(&mut self) {
        if let Some(poll) = self.active.get_mut().take() {
            poll.handle.cancel();
        }
    }
}

impl<A, V, E> fmt::Debug for PollingResource<A, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingResource")
            .field("config", &self.config)
            .field("active", &self.active.lock().is_some())
            .finish_non_exhaustive()
    }
}

/// Resolves once the poll is cancelled; pends forever if it no longer can be
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn run_poll<A, V, E>(
    fetch: FetchFn<A, V, E>,
    args: A,
    interval: Duration,
    state: Arc<watch::Sender<PollSnapshot<V, E>>>,
    mut cancel: watch::Receiver<bool>,
) where
    A: Clone + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    // A tick that lands while a fetch is running waits for it
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancelled(&mut cancel) => break,
            _ = ticker.tick() => {}
        }
        if state.is_closed() {
            tracing::debug!("all subscribers detached");
            break;
        }

        metrics::counter!("dcat_poll_tick_total").increment(1);
        let outcome = tokio::select! {
            biased;
            () = cancelled(&mut cancel) => {
                tracing::debug!("poll cancelled, discarding in-flight fetch");
                break;
            }
            () = state.closed() => {
                tracing::debug!("all subscribers detached, discarding in-flight fetch");
                break;
            }
            outcome = fetch(args.clone()) => outcome,
        };

        if let Err(err) = &outcome {
            metrics::counter!("dcat_poll_error_total").increment(1);
            tracing::warn!(error = %err, "poll fetch failed");
        }
        state.send_modify(|snapshot| snapshot.record(outcome));
    }
    tracing::debug!("poll stopped");
}
