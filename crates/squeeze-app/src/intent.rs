//! User and system intents accepted by [`crate::WorkflowCoordinator::dispatch`].

use squeeze_core::{CompressionPreset, FileInfo};
use squeeze_navigation::Screen;
use squeeze_overlay::OverlayKind;

/// One request from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Launch animation finished.
    SplashFinished,
    /// User finished onboarding.
    OnboardingCompleted,
    /// User asked to pick a file.
    OpenFilePicker,
    /// File picker returned a file.
    FilePicked(FileInfo),
    /// File picker could not produce a usable file.
    FilePickFailed {
        /// Description from the picker.
        message: String,
    },
    /// User confirmed a preset on the preset-selection screen.
    ConfirmPreset(CompressionPreset),
    /// User accepted the retry confirmation.
    ConfirmRetry,
    /// User declined the retry confirmation.
    DeclineRetry,
    /// User cancelled the run in progress.
    CancelRun,
    /// Back button or gesture.
    Back,
    /// Return to Home, clearing history.
    GoHome,
    /// Open the history screen.
    OpenHistory,
    /// Open the settings screen.
    OpenSettings,
    /// External link to a stacked screen.
    DeepLink(Screen),
    /// Share the current result.
    ShareResult,
    /// Save the current result to files.
    SaveResult,
    /// Overlay closed by the user or the system.
    DismissOverlay(OverlayKind),
    /// Commitment prompt closed.
    DismissCommitment,
    /// Rating request closed without an answer.
    DismissRatingRequest,
    /// Rating request answered.
    RatingResponded {
        /// Whether the user agreed to rate.
        accepted: bool,
    },
}

impl Intent {
    /// Stable name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SplashFinished => "splash_finished",
            Self::OnboardingCompleted => "onboarding_completed",
            Self::OpenFilePicker => "open_file_picker",
            Self::FilePicked(_) => "file_picked",
            Self::FilePickFailed { .. } => "file_pick_failed",
            Self::ConfirmPreset(_) => "confirm_preset",
            Self::ConfirmRetry => "confirm_retry",
            Self::DeclineRetry => "decline_retry",
            Self::CancelRun => "cancel_run",
            Self::Back => "back",
            Self::GoHome => "go_home",
            Self::OpenHistory => "open_history",
            Self::OpenSettings => "open_settings",
            Self::DeepLink(_) => "deep_link",
            Self::ShareResult => "share_result",
            Self::SaveResult => "save_result",
            Self::DismissOverlay(_) => "dismiss_overlay",
            Self::DismissCommitment => "dismiss_commitment",
            Self::DismissRatingRequest => "dismiss_rating_request",
            Self::RatingResponded { .. } => "rating_responded",
        }
    }
}
