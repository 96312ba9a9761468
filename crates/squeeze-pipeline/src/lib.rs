#![warn(missing_docs)]
//! # squeeze-pipeline
//!
//! ## Purpose
//! Runs the analyze and compress steps as cancellable background work and
//! turns their completions into typed outcomes.
//!
//! ## Responsibilities
//! - Define the [`CompressionService`] collaborator boundary.
//! - Reset shared service progress before every invocation.
//! - Tag every run so completions from superseded runs are dropped.
//! - Classify collaborator failures and apply the user-confirmed retry bound.
//!
//! ## Data flow
//! Coordinator -> [`PipelineOrchestrator::start_analyze`] /
//! [`PipelineOrchestrator::start_compress`] -> task spawned on the injected
//! runtime -> [`PipelineEvent`] on the outcome channel -> coordinator feeds it
//! back through [`PipelineOrchestrator::accept`] -> [`PipelineUpdate`].
//!
//! ## Ownership and lifetimes
//! Spawned tasks own clones of their inputs and a sender half of the outcome
//! channel. The orchestrator never joins or aborts them; detaching a run only
//! signals its [`CancellationToken`] and forgets its tag.
//!
//! ## Error model
//! Raw [`ServiceError`]s never leave this crate unclassified: every failure is
//! wrapped in a [`PipelineFailure`] carrying its [`FailureClass`].
//! Orchestrator misuse returns [`PipelineError`].

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::Serialize;
use squeeze_core::{AnalysisResult, CompressionPreset, CompressionResult, FileInfo};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default number of user-confirmed retries per run.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 2;

/// Failure categories reported by the compression service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    /// Source could not be read.
    Unreadable,
    /// Format is not supported by any encoder.
    UnsupportedFormat,
    /// Source is damaged.
    Corrupt,
    /// Transient I/O failure.
    Io,
    /// Encoder is busy with other work.
    Busy,
    /// Operation timed out.
    Timeout,
    /// Not enough storage for the output.
    OutOfSpace,
    /// Service observed the cancellation token.
    Cancelled,
    /// Unexpected service failure.
    Internal,
}

/// Error returned by the compression service.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind:?}: {message}")]
pub struct ServiceError {
    /// Failure category.
    pub kind: ServiceErrorKind,
    /// Service-provided description.
    pub message: String,
}

impl ServiceError {
    /// Builds a service error.
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Coordinator-facing failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Problem with the user's file; never retried.
    Input,
    /// Transient failure; may be retried within the bound.
    Retryable,
    /// Unrecoverable failure or retries exhausted.
    Fatal,
    /// The run observed cancellation.
    Cancelled,
}

/// Classifies a service error into the coordinator taxonomy.
pub fn classify_service_error(error: &ServiceError) -> FailureClass {
    match error.kind {
        ServiceErrorKind::Unreadable
        | ServiceErrorKind::UnsupportedFormat
        | ServiceErrorKind::Corrupt => FailureClass::Input,
        ServiceErrorKind::Io | ServiceErrorKind::Busy | ServiceErrorKind::Timeout => {
            FailureClass::Retryable
        }
        ServiceErrorKind::OutOfSpace | ServiceErrorKind::Internal => FailureClass::Fatal,
        ServiceErrorKind::Cancelled => FailureClass::Cancelled,
    }
}

/// Classified failure handed to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineFailure {
    /// Final class after retry-bound reclassification.
    pub class: FailureClass,
    /// Underlying service error.
    pub error: ServiceError,
}

/// Pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// File analysis.
    Analyze,
    /// File compression.
    Compress,
}

/// Identity of one orchestrator run.
///
/// A completion is honored only when its whole tag matches the run in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RunTag {
    /// Unique id of this invocation.
    pub run_id: Uuid,
    /// Step being run.
    pub step: StepKind,
    /// File the run operates on.
    pub file_id: String,
    /// Preset in use, for compression runs.
    pub preset_id: Option<String>,
}

/// Input retained for the run in flight and for retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunInput {
    /// Analyze a file.
    Analyze(FileInfo),
    /// Compress a file with a preset.
    Compress(FileInfo, CompressionPreset),
}

impl RunInput {
    /// Step this input runs.
    pub fn step(&self) -> StepKind {
        match self {
            Self::Analyze(_) => StepKind::Analyze,
            Self::Compress(..) => StepKind::Compress,
        }
    }

    /// File this input operates on.
    pub fn file(&self) -> &FileInfo {
        match self {
            Self::Analyze(file) | Self::Compress(file, _) => file,
        }
    }

    fn tag(&self) -> RunTag {
        RunTag {
            run_id: Uuid::new_v4(),
            step: self.step(),
            file_id: self.file().id().to_string(),
            preset_id: match self {
                Self::Analyze(_) => None,
                Self::Compress(_, preset) => Some(preset.id.clone()),
            },
        }
    }
}

/// Successful step output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
    /// Analysis finished.
    Analysis(AnalysisResult),
    /// Compression finished.
    Compression(CompressionResult),
}

/// Message sent from a run task to the coordinator context.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Incremental progress in `0.0..=1.0`.
    Progress {
        /// Run that reported progress.
        tag: RunTag,
        /// Completed fraction.
        fraction: f32,
    },
    /// Terminal service result.
    Finished {
        /// Run that finished.
        tag: RunTag,
        /// Raw service result, classified by [`PipelineOrchestrator::accept`].
        result: Result<StepOutput, ServiceError>,
    },
}

impl PipelineEvent {
    /// Tag of the run that produced this event.
    pub fn tag(&self) -> &RunTag {
        match self {
            Self::Progress { tag, .. } | Self::Finished { tag, .. } => tag,
        }
    }
}

/// Terminal outcome of a run (single typed channel per run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Step succeeded.
    Success(StepOutput),
    /// Step failed transiently and a user-confirmed retry is available.
    RetryableFailure {
        /// Classified failure.
        failure: PipelineFailure,
        /// Failed attempts so far (1-based).
        attempt: u32,
        /// Retry bound.
        max_attempts: u32,
    },
    /// Step failed for good.
    FatalFailure(PipelineFailure),
    /// Service honored cancellation.
    Cancelled,
}

/// Update produced by accepting a current-run event.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineUpdate {
    /// Progress changed.
    Progress {
        /// Step reporting progress.
        step: StepKind,
        /// Completed fraction.
        fraction: f32,
    },
    /// Run reached a terminal outcome.
    Finished {
        /// Tag of the finished run.
        tag: RunTag,
        /// Retained run input.
        input: RunInput,
        /// Classified outcome.
        outcome: RunOutcome,
    },
}

/// Progress sink handed to the service for one run.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tag: RunTag,
    events: UnboundedSender<PipelineEvent>,
}

impl ProgressReporter {
    /// Reports completed fraction; values are clamped to `0.0..=1.0`.
    pub fn report(&self, fraction: f32) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let _ = self.events.send(PipelineEvent::Progress {
            tag: self.tag.clone(),
            fraction,
        });
    }

    /// Tag of the run this reporter belongs to.
    pub fn tag(&self) -> &RunTag {
        &self.tag
    }
}

/// Shared compression service (process-wide singleton in the host app).
#[async_trait]
pub trait CompressionService: Send + Sync {
    /// Derives analysis facts for `file`.
    ///
    /// # Errors
    /// Returns [`ServiceError`] on any analysis failure.
    async fn analyze(
        &self,
        file: FileInfo,
        cancel: CancellationToken,
    ) -> Result<AnalysisResult, ServiceError>;

    /// Compresses `file` with `preset`, reporting progress through `progress`.
    ///
    /// # Errors
    /// Returns [`ServiceError`] on any compression failure.
    async fn compress(
        &self,
        file: FileInfo,
        preset: CompressionPreset,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<CompressionResult, ServiceError>;

    /// Clears in-flight progress left by a previous run.
    fn reset_progress(&self);
}

/// Retry bound configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// User-confirmed retries allowed per run.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
        }
    }
}

/// Retry bookkeeping for the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryState {
    /// Retryable failures observed so far.
    pub attempts: u32,
    /// Retry bound.
    pub max_attempts: u32,
    /// Most recent failure.
    pub last_error: Option<ServiceError>,
}

impl RetryState {
    /// Creates a zeroed state with the given bound.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            last_error: None,
        }
    }

    /// Returns `true` while another retry may be offered.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Records a retryable failure and returns the new attempt count.
    pub fn record_failure(&mut self, error: ServiceError) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error);
        self.attempts
    }

    /// Resets to zero attempts.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_error = None;
    }
}

struct InFlightRun {
    tag: RunTag,
    input: RunInput,
    cancel: CancellationToken,
}

/// Drives one workflow session's analyze/compress runs.
///
/// At most one run is in flight; starting another supersedes it.
pub struct PipelineOrchestrator {
    service: Arc<dyn CompressionService>,
    runtime: Handle,
    events: UnboundedSender<PipelineEvent>,
    in_flight: Option<InFlightRun>,
    pending_retry: Option<RunInput>,
    retry: RetryState,
    progress: Option<f32>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator and the receiving half of its outcome channel.
    pub fn new(
        service: Arc<dyn CompressionService>,
        runtime: Handle,
        policy: RetryPolicy,
    ) -> (Self, UnboundedReceiver<PipelineEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let orchestrator = Self {
            service,
            runtime,
            events,
            in_flight: None,
            pending_retry: None,
            retry: RetryState::new(policy.max_attempts),
            progress: None,
        };
        (orchestrator, receiver)
    }

    /// Starts a fresh analysis run.
    pub fn start_analyze(&mut self, file: FileInfo) -> RunTag {
        self.launch(RunInput::Analyze(file), true)
    }

    /// Starts a fresh compression run.
    pub fn start_compress(&mut self, file: FileInfo, preset: CompressionPreset) -> RunTag {
        self.launch(RunInput::Compress(file, preset), true)
    }

    /// Re-invokes the run that last failed retryably.
    ///
    /// # Errors
    /// Returns [`PipelineError::NothingToRetry`] when no retry is pending.
    pub fn retry(&mut self) -> Result<RunTag, PipelineError> {
        let input = self.pending_retry.take().ok_or(PipelineError::NothingToRetry)?;
        info!(
            "pipeline: retry step={:?} file_id={} attempt={}/{}",
            input.step(),
            input.file().id(),
            self.retry.attempts,
            self.retry.max_attempts
        );
        Ok(self.launch(input, false))
    }

    /// Detaches from the run in flight and forgets any pending retry.
    ///
    /// The run's token is signalled, but its task is left to finish; its
    /// completion will be dropped as stale.
    pub fn cancel(&mut self) -> Option<RunTag> {
        self.pending_retry = None;
        self.retry.reset();
        self.progress = None;

        let run = self.in_flight.take()?;
        run.cancel.cancel();
        info!(
            "pipeline: detached step={:?} file_id={} run_id={}",
            run.tag.step, run.tag.file_id, run.tag.run_id
        );
        Some(run.tag)
    }

    /// Applies one event from the outcome channel.
    ///
    /// Returns `None` for events of superseded runs.
    pub fn accept(&mut self, event: PipelineEvent) -> Option<PipelineUpdate> {
        if !self.is_current(event.tag()) {
            debug!(
                "pipeline: dropped stale event step={:?} file_id={} run_id={}",
                event.tag().step,
                event.tag().file_id,
                event.tag().run_id
            );
            return None;
        }

        match event {
            PipelineEvent::Progress { tag, fraction } => {
                self.progress = Some(fraction);
                Some(PipelineUpdate::Progress {
                    step: tag.step,
                    fraction,
                })
            }
            PipelineEvent::Finished { tag, result } => {
                let run = self.in_flight.take()?;
                let outcome = self.classify(&run.input, result);
                Some(PipelineUpdate::Finished {
                    tag,
                    input: run.input,
                    outcome,
                })
            }
        }
    }

    /// Returns `true` while a run is in flight.
    pub fn is_running(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Tag of the run in flight.
    pub fn in_flight(&self) -> Option<&RunTag> {
        self.in_flight.as_ref().map(|run| &run.tag)
    }

    /// Returns `true` when a retryable failure awaits the user's decision.
    pub fn has_pending_retry(&self) -> bool {
        self.pending_retry.is_some()
    }

    /// Input of the run awaiting a retry decision.
    pub fn pending_retry(&self) -> Option<&RunInput> {
        self.pending_retry.as_ref()
    }

    /// Retry bookkeeping of the current run.
    pub fn retry_state(&self) -> &RetryState {
        &self.retry
    }

    /// Latest progress of the run in flight.
    pub fn progress(&self) -> Option<f32> {
        self.progress
    }

    fn is_current(&self, tag: &RunTag) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|run| run.tag == *tag)
    }

    fn launch(&mut self, input: RunInput, fresh: bool) -> RunTag {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel.cancel();
            info!(
                "pipeline: superseded step={:?} file_id={} run_id={}",
                previous.tag.step, previous.tag.file_id, previous.tag.run_id
            );
        }
        if fresh {
            self.retry.reset();
        }
        self.pending_retry = None;
        self.service.reset_progress();
        self.progress = Some(0.0);

        let tag = input.tag();
        let cancel = CancellationToken::new();
        info!(
            "pipeline: start step={:?} file_id={} preset_id={:?} run_id={}",
            tag.step, tag.file_id, tag.preset_id, tag.run_id
        );

        let service = Arc::clone(&self.service);
        let reporter = ProgressReporter {
            tag: tag.clone(),
            events: self.events.clone(),
        };
        let task_input = input.clone();
        let task_cancel = cancel.clone();
        let work = self.runtime.spawn(async move {
            match task_input {
                RunInput::Analyze(file) => service
                    .analyze(file, task_cancel)
                    .await
                    .map(StepOutput::Analysis),
                RunInput::Compress(file, preset) => service
                    .compress(file, preset, reporter, task_cancel)
                    .await
                    .map(StepOutput::Compression),
            }
        });

        // A panicking service still yields a terminal event for the run.
        let events = self.events.clone();
        let task_tag = tag.clone();
        self.runtime.spawn(async move {
            let result = work.await.unwrap_or_else(|join_error| {
                error!(
                    "pipeline: service task failed step={:?} file_id={} run_id={} error={join_error}",
                    task_tag.step, task_tag.file_id, task_tag.run_id
                );
                Err(ServiceError::new(
                    ServiceErrorKind::Internal,
                    format!("service task failed: {join_error}"),
                ))
            });
            let _ = events.send(PipelineEvent::Finished {
                tag: task_tag,
                result,
            });
        });

        self.in_flight = Some(InFlightRun {
            tag: tag.clone(),
            input,
            cancel,
        });
        tag
    }

    fn classify(&mut self, input: &RunInput, result: Result<StepOutput, ServiceError>) -> RunOutcome {
        self.progress = None;

        let error = match result.and_then(|output| verify_output(input, output)) {
            Ok(output) => {
                self.retry.reset();
                return RunOutcome::Success(output);
            }
            Err(error) => error,
        };

        match classify_service_error(&error) {
            FailureClass::Cancelled => {
                self.retry.reset();
                RunOutcome::Cancelled
            }
            FailureClass::Retryable if self.retry.can_retry() => {
                let attempt = self.retry.record_failure(error.clone());
                self.pending_retry = Some(input.clone());
                warn!(
                    "pipeline: retryable failure step={:?} attempt={}/{} error={}",
                    input.step(),
                    attempt,
                    self.retry.max_attempts,
                    error
                );
                RunOutcome::RetryableFailure {
                    failure: PipelineFailure {
                        class: FailureClass::Retryable,
                        error,
                    },
                    attempt,
                    max_attempts: self.retry.max_attempts,
                }
            }
            class => {
                let class = match class {
                    FailureClass::Input => FailureClass::Input,
                    _ => FailureClass::Fatal,
                };
                warn!(
                    "pipeline: fatal failure step={:?} class={:?} attempts={} error={}",
                    input.step(),
                    class,
                    self.retry.attempts,
                    error
                );
                self.retry.reset();
                RunOutcome::FatalFailure(PipelineFailure { class, error })
            }
        }
    }
}

fn verify_output(input: &RunInput, output: StepOutput) -> Result<StepOutput, ServiceError> {
    let (expected_step, produced_for, belongs) = match &output {
        StepOutput::Analysis(analysis) => (
            StepKind::Analyze,
            analysis.file_id.as_str(),
            analysis.belongs_to(input.file()),
        ),
        StepOutput::Compression(result) => (
            StepKind::Compress,
            result.file_id(),
            result.belongs_to(input.file()),
        ),
    };

    if expected_step != input.step() || !belongs {
        return Err(ServiceError::new(
            ServiceErrorKind::Internal,
            format!(
                "service returned {expected_step:?} output for file '{produced_for}' while running {:?} for '{}'",
                input.step(),
                input.file().id()
            ),
        ));
    }

    Ok(output)
}

/// Orchestrator misuse errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// Retry requested without a pending retryable failure.
    #[error("no retryable failure is pending")]
    NothingToRetry,
}

#[cfg(test)]
mod tests {
    //! Unit tests for classification and retry bookkeeping.

    use super::*;

    #[test]
    fn classification_covers_taxonomy() {
        let cases = [
            (ServiceErrorKind::Unreadable, FailureClass::Input),
            (ServiceErrorKind::Corrupt, FailureClass::Input),
            (ServiceErrorKind::Busy, FailureClass::Retryable),
            (ServiceErrorKind::Timeout, FailureClass::Retryable),
            (ServiceErrorKind::OutOfSpace, FailureClass::Fatal),
            (ServiceErrorKind::Cancelled, FailureClass::Cancelled),
        ];
        for (kind, expected) in cases {
            assert_eq!(classify_service_error(&ServiceError::new(kind, "x")), expected);
        }
    }

    #[test]
    fn retry_state_respects_bound() {
        let mut state = RetryState::new(2);
        assert!(state.can_retry());
        state.record_failure(ServiceError::new(ServiceErrorKind::Io, "a"));
        assert!(state.can_retry());
        state.record_failure(ServiceError::new(ServiceErrorKind::Io, "b"));
        assert!(!state.can_retry());
        state.reset();
        assert_eq!(state, RetryState::new(2));
    }
}
