#![warn(missing_docs)]
//! # squeeze-overlay
//!
//! ## Purpose
//! Tracks transient presentation state layered over the current screen.
//!
//! ## Responsibilities
//! - Keep at most one blocking overlay (paywall, error alert, retry
//!   confirmation) visible.
//! - Keep at most one sheet (file picker, share sheet, save dialog) visible.
//! - Project overlay state into a flat, serializable snapshot.
//!
//! ## Data flow
//! Coordinator decisions -> [`OverlayManager::present`] /
//! [`OverlayManager::dismiss`] -> [`OverlaySnapshot`] rendered by the host.
//!
//! ## Ownership and lifetimes
//! The manager owns every overlay payload. Presenting returns the displaced
//! overlay by value so the caller can log or discard it.
//!
//! ## Error model
//! Invalid combinations are unrepresentable: each class is a single slot.
//! Dismissing something that is not shown is a no-op reported as `None`.

use log::debug;
use serde::Serialize;
use squeeze_entitlement::{DenialReason, GateDenial};

/// Dismissible alert with a short title and a full explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorAlert {
    /// Short title.
    pub title: String,
    /// Full explanatory message.
    pub message: String,
}

impl ErrorAlert {
    /// Builds an alert from title and message.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Retry / cancel choice offered after a retryable failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryPrompt {
    /// Failed attempts so far in this run.
    pub attempt: u32,
    /// Retry bound for the run.
    pub max_attempts: u32,
    /// Message describing the failure.
    pub message: String,
}

/// One overlay with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    /// Upsell gate with the denial that triggered it.
    Paywall(GateDenial),
    /// Non-retryable error alert.
    ErrorAlert(ErrorAlert),
    /// Retry confirmation.
    RetryConfirmation(RetryPrompt),
    /// System file picker.
    FilePicker,
    /// Share sheet for the current result.
    ShareSheet,
    /// Save-to-files dialog for the current result.
    SaveDialog,
}

/// Payload-free overlay discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    /// See [`Overlay::Paywall`].
    Paywall,
    /// See [`Overlay::ErrorAlert`].
    ErrorAlert,
    /// See [`Overlay::RetryConfirmation`].
    RetryConfirmation,
    /// See [`Overlay::FilePicker`].
    FilePicker,
    /// See [`Overlay::ShareSheet`].
    ShareSheet,
    /// See [`Overlay::SaveDialog`].
    SaveDialog,
}

impl OverlayKind {
    /// Returns `true` for paywall, error alert, and retry confirmation.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::Paywall | Self::ErrorAlert | Self::RetryConfirmation
        )
    }
}

impl Overlay {
    /// Returns the payload-free kind.
    pub fn kind(&self) -> OverlayKind {
        match self {
            Self::Paywall(_) => OverlayKind::Paywall,
            Self::ErrorAlert(_) => OverlayKind::ErrorAlert,
            Self::RetryConfirmation(_) => OverlayKind::RetryConfirmation,
            Self::FilePicker => OverlayKind::FilePicker,
            Self::ShareSheet => OverlayKind::ShareSheet,
            Self::SaveDialog => OverlayKind::SaveDialog,
        }
    }
}

/// Paywall projection with reason-specific copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaywallView {
    /// Denial reason.
    pub reason: DenialReason,
    /// Headline copy.
    pub headline: String,
    /// Body copy.
    pub message: String,
}

/// Flat overlay projection for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlaySnapshot {
    /// Visible paywall.
    pub paywall: Option<PaywallView>,
    /// Visible error alert.
    pub error_alert: Option<ErrorAlert>,
    /// Visible retry confirmation.
    pub retry_confirmation: Option<RetryPrompt>,
    /// Whether the file picker is shown.
    pub file_picker_visible: bool,
    /// Whether the share sheet is shown.
    pub share_sheet_visible: bool,
    /// Whether the save dialog is shown.
    pub save_dialog_visible: bool,
}

/// Overlay state with one blocking slot and one sheet slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayManager {
    blocking: Option<Overlay>,
    sheet: Option<Overlay>,
}

impl OverlayManager {
    /// Creates a manager with nothing shown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `overlay`, replacing any overlay of the same class.
    ///
    /// # Returns
    /// The displaced overlay, if one was visible in the same class.
    pub fn present(&mut self, overlay: Overlay) -> Option<Overlay> {
        let slot = if overlay.kind().is_blocking() {
            &mut self.blocking
        } else {
            &mut self.sheet
        };

        let displaced = slot.replace(overlay);
        if let Some(previous) = &displaced {
            debug!("overlay: displaced kind={:?}", previous.kind());
        }
        displaced
    }

    /// Hides the overlay of `kind` if it is the one shown.
    pub fn dismiss(&mut self, kind: OverlayKind) -> Option<Overlay> {
        let slot = if kind.is_blocking() {
            &mut self.blocking
        } else {
            &mut self.sheet
        };

        if slot.as_ref().is_some_and(|overlay| overlay.kind() == kind) {
            debug!("overlay: dismiss kind={kind:?}");
            return slot.take();
        }

        None
    }

    /// Hides whatever blocking overlay is shown.
    pub fn clear_blocking(&mut self) -> Option<Overlay> {
        self.blocking.take()
    }

    /// Returns `true` when an overlay of `kind` is visible.
    pub fn is_visible(&self, kind: OverlayKind) -> bool {
        self.blocking
            .iter()
            .chain(self.sheet.iter())
            .any(|overlay| overlay.kind() == kind)
    }

    /// Visible blocking overlay.
    pub fn blocking(&self) -> Option<&Overlay> {
        self.blocking.as_ref()
    }

    /// Visible sheet.
    pub fn sheet(&self) -> Option<&Overlay> {
        self.sheet.as_ref()
    }

    /// Denial attached to the visible paywall.
    pub fn paywall(&self) -> Option<&GateDenial> {
        match &self.blocking {
            Some(Overlay::Paywall(denial)) => Some(denial),
            _ => None,
        }
    }

    /// Projects overlay state into a flat snapshot.
    pub fn snapshot(&self) -> OverlaySnapshot {
        let mut snapshot = OverlaySnapshot {
            paywall: None,
            error_alert: None,
            retry_confirmation: None,
            file_picker_visible: false,
            share_sheet_visible: false,
            save_dialog_visible: false,
        };

        match &self.blocking {
            Some(Overlay::Paywall(denial)) => {
                snapshot.paywall = Some(PaywallView {
                    reason: denial.reason,
                    headline: denial.reason.headline().to_string(),
                    message: denial.reason.message().to_string(),
                });
            }
            Some(Overlay::ErrorAlert(alert)) => snapshot.error_alert = Some(alert.clone()),
            Some(Overlay::RetryConfirmation(prompt)) => {
                snapshot.retry_confirmation = Some(prompt.clone());
            }
            _ => {}
        }

        match &self.sheet {
            Some(Overlay::FilePicker) => snapshot.file_picker_visible = true,
            Some(Overlay::ShareSheet) => snapshot.share_sheet_visible = true,
            Some(Overlay::SaveDialog) => snapshot.save_dialog_visible = true,
            _ => {}
        }

        snapshot
    }
}
