//! Collaborator boundaries injected into the coordinator, plus in-memory
//! implementations used by hosts without persistence and by tests.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use serde::{Deserialize, Serialize};
use squeeze_core::{CompressionResult, SubscriptionStatus};
use squeeze_pipeline::CompressionService;
use thiserror::Error;
use tokio::sync::watch;

use crate::analytics::AnalyticsEvent;

/// Failure reported by a non-critical collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{collaborator} failed: {message}")]
pub struct CollaboratorError {
    /// Collaborator name.
    pub collaborator: &'static str,
    /// Failure description.
    pub message: String,
}

impl CollaboratorError {
    /// Builds a collaborator error.
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

/// Store of completed compression results.
pub trait HistoryStore: Send + Sync {
    /// Records one successful result.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] when the result cannot be stored.
    fn record(&self, result: &CompressionResult) -> Result<(), CollaboratorError>;

    /// Sum of bytes saved over all recorded results.
    fn total_bytes_saved(&self) -> u64;
}

/// Source of the user's subscription status.
pub trait SubscriptionService: Send + Sync {
    /// Latest known status.
    fn current_status(&self) -> SubscriptionStatus;

    /// Change-notification stream.
    fn subscribe(&self) -> watch::Receiver<SubscriptionStatus>;

    /// Counts one completed compression against the free-tier allowance.
    fn record_usage(&self);
}

/// Fire-and-forget analytics sink.
pub trait AnalyticsSink: Send + Sync {
    /// Tracks one event.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] on delivery failure; callers ignore it.
    fn track(&self, event: &AnalyticsEvent) -> Result<(), CollaboratorError>;

    /// Tracks an error with free-form context.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] on delivery failure; callers ignore it.
    fn track_error(&self, error: &str, context: &str) -> Result<(), CollaboratorError>;
}

/// Per-user flags that drive follow-up screens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    /// Onboarding has been completed once.
    pub onboarding_completed: bool,
    /// Commitment prompt has been shown.
    pub commitment_shown: bool,
    /// Rating request has been shown.
    pub rating_requested: bool,
    /// Successful compressions so far.
    pub successful_runs: u32,
}

/// Persistence boundary for [`UserProgress`].
pub trait ProgressStore: Send + Sync {
    /// Loads the stored flags.
    fn load(&self) -> UserProgress;

    /// Stores the flags.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] when the flags cannot be stored.
    fn save(&self, progress: &UserProgress) -> Result<(), CollaboratorError>;
}

/// Wall clock used for subscription expiry checks.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Everything the coordinator talks to, injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    /// Shared compression engine.
    pub compression: Arc<dyn CompressionService>,
    /// Result history.
    pub history: Arc<dyn HistoryStore>,
    /// Subscription status source.
    pub subscription: Arc<dyn SubscriptionService>,
    /// Analytics sink.
    pub analytics: Arc<dyn AnalyticsSink>,
    /// Follow-up flags store.
    pub progress: Arc<dyn ProgressStore>,
    /// Wall clock.
    pub clock: Arc<dyn Clock>,
}

/// [`ProgressStore`] kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryProgressStore {
    state: Mutex<UserProgress>,
}

impl InMemoryProgressStore {
    /// Creates a store seeded with `initial`.
    pub fn new(initial: UserProgress) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }
}

impl ProgressStore for InMemoryProgressStore {
    fn load(&self) -> UserProgress {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save(&self, progress: &UserProgress) -> Result<(), CollaboratorError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CollaboratorError::new("progress_store", "lock poisoned"))?;
        *state = progress.clone();
        Ok(())
    }
}

/// [`HistoryStore`] kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    results: Mutex<Vec<CompressionResult>>,
}

impl InMemoryHistoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded results in insertion order.
    pub fn results(&self) -> Vec<CompressionResult> {
        match self.results.lock() {
            Ok(results) => results.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn record(&self, result: &CompressionResult) -> Result<(), CollaboratorError> {
        let mut results = self
            .results
            .lock()
            .map_err(|_| CollaboratorError::new("history_store", "lock poisoned"))?;
        results.push(result.clone());
        Ok(())
    }

    fn total_bytes_saved(&self) -> u64 {
        self.results()
            .iter()
            .map(CompressionResult::bytes_saved)
            .sum()
    }
}

/// [`SubscriptionService`] backed by a `watch` channel.
///
/// Stands in for the store-backed service; purchases are simulated with
/// [`WatchSubscriptionService::set_status`].
#[derive(Debug)]
pub struct WatchSubscriptionService {
    sender: watch::Sender<SubscriptionStatus>,
}

impl WatchSubscriptionService {
    /// Creates a service publishing `initial`.
    pub fn new(initial: SubscriptionStatus) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Replaces the status and notifies subscribers.
    pub fn set_status(&self, status: SubscriptionStatus) {
        debug!(
            "subscription: status plan={:?} active={} used={}/{}",
            status.plan, status.active, status.usage.used, status.usage.limit
        );
        self.sender.send_replace(status);
    }
}

impl SubscriptionService for WatchSubscriptionService {
    fn current_status(&self) -> SubscriptionStatus {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<SubscriptionStatus> {
        self.sender.subscribe()
    }

    fn record_usage(&self) {
        self.sender.send_modify(|status| {
            status.usage.used = status.usage.used.saturating_add(1);
        });
    }
}

/// [`AnalyticsSink`] that writes events to the log at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnalyticsSink;

impl AnalyticsSink for LogAnalyticsSink {
    fn track(&self, event: &AnalyticsEvent) -> Result<(), CollaboratorError> {
        let encoded = serde_json::to_string(event)
            .map_err(|error| CollaboratorError::new("analytics", error.to_string()))?;
        debug!("analytics: event {encoded}");
        Ok(())
    }

    fn track_error(&self, error: &str, context: &str) -> Result<(), CollaboratorError> {
        debug!("analytics: error context={context} error={error}");
        Ok(())
    }
}
