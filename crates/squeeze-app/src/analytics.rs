//! Analytics events emitted by the coordinator.

use serde::Serialize;
use squeeze_core::{FileCategory, SavingsPotential};
use squeeze_entitlement::{DenialReason, GateStage};
use squeeze_navigation::ScreenKey;
use squeeze_pipeline::{FailureClass, ServiceErrorKind, StepKind};

/// One analytics event, serialized with an `event` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    /// Visible screen changed.
    ScreenViewed {
        /// Identity of the visible screen.
        screen: ScreenKey,
    },
    /// A file passed the pick-stage gate.
    FileSelected {
        /// File id.
        file_id: String,
        /// File category.
        category: FileCategory,
        /// File size.
        size_bytes: u64,
    },
    /// Gate denied a step and the paywall was shown.
    PaywallShown {
        /// Denial reason.
        reason: DenialReason,
        /// Stage that denied.
        stage: GateStage,
    },
    /// Analysis finished for the workflow file.
    AnalysisCompleted {
        /// File id.
        file_id: String,
        /// Estimated savings level.
        savings_potential: SavingsPotential,
    },
    /// Compression run started.
    CompressionStarted {
        /// File id.
        file_id: String,
        /// Preset id.
        preset_id: String,
    },
    /// Compression run succeeded.
    CompressionCompleted {
        /// File id.
        file_id: String,
        /// Preset id.
        preset_id: String,
        /// Savings percentage.
        savings_percent: u8,
        /// Bytes saved.
        bytes_saved: u64,
    },
    /// A step failed for good.
    CompressionFailed {
        /// Step that failed.
        step: StepKind,
        /// File id.
        file_id: String,
        /// Final failure class.
        class: FailureClass,
        /// Service error kind.
        error_kind: ServiceErrorKind,
    },
    /// A retry confirmation was offered.
    RetryOffered {
        /// Step that failed.
        step: StepKind,
        /// Failed attempts so far.
        attempt: u32,
        /// Retry bound.
        max_attempts: u32,
    },
    /// The user abandoned a run.
    RunCancelled {
        /// Step that was in flight or awaiting retry.
        step: StepKind,
        /// File id.
        file_id: String,
    },
}
