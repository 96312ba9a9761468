#![warn(missing_docs)]
//! # squeeze-navigation
//!
//! ## Purpose
//! Owns the screen model and the navigation state machine of the workflow.
//!
//! ## Responsibilities
//! - Define [`Screen`] variants with per-variant identity ([`ScreenKey`]).
//! - Keep the stacked layer ([`NavigationHistory`]) free of standalone screens.
//! - Apply push / back / pop-to-root / standalone transitions with explicit
//!   outcomes.
//!
//! ## Data flow
//! Coordinator intent -> [`ScreenStateMachine`] transition -> two read-only
//! projections ([`ScreenStateMachine::standalone`] and
//! [`ScreenStateMachine::stack`]) consumed by the presentation layer.
//!
//! ## Ownership and lifetimes
//! Screens own their payloads (file, analysis, preset, result), so a screen in
//! history stays valid after the coordinator moves on to another workflow run.
//!
//! ## Error model
//! Transitions that break a layer invariant return [`NavigationError`]; the
//! coordinator treats those as programming errors.
//!
//! ## Example
//! ```rust
//! use squeeze_navigation::{Screen, ScreenStateMachine};
//!
//! let mut machine = ScreenStateMachine::new();
//! assert_eq!(machine.current(), &Screen::Splash);
//! machine.dismiss_standalone();
//! assert_eq!(machine.current(), &Screen::Home);
//! ```

use log::debug;
use serde::Serialize;
use squeeze_core::{AnalysisResult, CompressionPreset, CompressionResult, FileInfo};
use thiserror::Error;

static HOME_SCREEN: Screen = Screen::Home;

/// How a screen is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationClass {
    /// Participates in back-navigation history.
    Stacked,
    /// Replaces the whole view, never enters history.
    Standalone,
}

/// One navigable unit of the workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    /// Launch screen.
    Splash,
    /// First-run onboarding.
    Onboarding,
    /// Commitment prompt shown after the first successful run.
    Commitment,
    /// App-store rating request.
    RatingRequest,
    /// Recurrent root of the stacked layer.
    Home,
    /// Analysis of a picked file.
    Analyze {
        /// File being analyzed.
        file: FileInfo,
    },
    /// Preset selection for an analyzed file.
    PresetSelect {
        /// File being compressed.
        file: FileInfo,
        /// Analysis of `file`.
        analysis: AnalysisResult,
    },
    /// Compression progress.
    Progress {
        /// File being compressed.
        file: FileInfo,
        /// Preset in use.
        preset: CompressionPreset,
    },
    /// Outcome of a successful compression.
    Result {
        /// Compression result.
        result: CompressionResult,
    },
    /// Past results.
    History,
    /// App settings.
    Settings,
}

/// Payload-free identity of a [`Screen`].
///
/// Two screens are equal iff their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ScreenKey {
    /// See [`Screen::Splash`].
    Splash,
    /// See [`Screen::Onboarding`].
    Onboarding,
    /// See [`Screen::Commitment`].
    Commitment,
    /// See [`Screen::RatingRequest`].
    RatingRequest,
    /// See [`Screen::Home`].
    Home,
    /// See [`Screen::Analyze`].
    Analyze {
        /// Identity of the analyzed file.
        file_id: String,
    },
    /// See [`Screen::PresetSelect`].
    PresetSelect {
        /// Identity of the file.
        file_id: String,
    },
    /// See [`Screen::Progress`].
    Progress {
        /// Identity of the file.
        file_id: String,
        /// Identity of the preset.
        preset_id: String,
    },
    /// See [`Screen::Result`].
    Result {
        /// Identity of the result.
        result_id: String,
    },
    /// See [`Screen::History`].
    History,
    /// See [`Screen::Settings`].
    Settings,
}

impl Screen {
    /// Returns the per-variant identity of this screen.
    pub fn key(&self) -> ScreenKey {
        match self {
            Self::Splash => ScreenKey::Splash,
            Self::Onboarding => ScreenKey::Onboarding,
            Self::Commitment => ScreenKey::Commitment,
            Self::RatingRequest => ScreenKey::RatingRequest,
            Self::Home => ScreenKey::Home,
            Self::Analyze { file } => ScreenKey::Analyze {
                file_id: file.id().to_string(),
            },
            Self::PresetSelect { file, .. } => ScreenKey::PresetSelect {
                file_id: file.id().to_string(),
            },
            Self::Progress { file, preset } => ScreenKey::Progress {
                file_id: file.id().to_string(),
                preset_id: preset.id.clone(),
            },
            Self::Result { result } => ScreenKey::Result {
                result_id: result.id().to_string(),
            },
            Self::History => ScreenKey::History,
            Self::Settings => ScreenKey::Settings,
        }
    }

    /// Returns how this screen is presented.
    pub fn presentation(&self) -> PresentationClass {
        match self {
            Self::Splash | Self::Onboarding | Self::Commitment | Self::RatingRequest => {
                PresentationClass::Standalone
            }
            Self::Home
            | Self::Analyze { .. }
            | Self::PresetSelect { .. }
            | Self::Progress { .. }
            | Self::Result { .. }
            | Self::History
            | Self::Settings => PresentationClass::Stacked,
        }
    }

    /// File this screen operates on, if any.
    pub fn file(&self) -> Option<&FileInfo> {
        match self {
            Self::Analyze { file }
            | Self::PresetSelect { file, .. }
            | Self::Progress { file, .. } => Some(file),
            _ => None,
        }
    }

    /// Target of "back" when history is empty.
    ///
    /// `PresetSelect` returns to analysis of its file while that file is still
    /// the workflow's current file; every other stacked screen returns Home.
    pub fn back_fallback(&self, workflow_file: Option<&FileInfo>) -> Screen {
        match self {
            Self::PresetSelect { file, .. }
                if workflow_file.is_some_and(|current| current.id() == file.id()) =>
            {
                Self::Analyze { file: file.clone() }
            }
            _ => Self::Home,
        }
    }
}

impl PartialEq for Screen {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Screen {}

/// Ordered history of stacked screens above Home.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationHistory {
    entries: Vec<Screen>,
}

impl NavigationHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stacked screen.
    ///
    /// # Errors
    /// Returns [`NavigationError::WrongPresentationClass`] for standalone
    /// screens and for Home, which is the implicit root.
    pub fn push(&mut self, screen: Screen) -> Result<(), NavigationError> {
        if screen.presentation() != PresentationClass::Stacked || screen == Screen::Home {
            return Err(NavigationError::WrongPresentationClass {
                screen: screen.key(),
                expected: PresentationClass::Stacked,
            });
        }

        self.entries.push(screen);
        Ok(())
    }

    /// Removes and returns the tail entry.
    pub fn pop(&mut self) -> Option<Screen> {
        self.entries.pop()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Tail entry.
    pub fn last(&self) -> Option<&Screen> {
        self.entries.last()
    }

    /// Entries in push order.
    pub fn entries(&self) -> &[Screen] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no screen sits above Home.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of a push request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The screen became the new tail.
    Pushed,
    /// The screen was already current; history did not grow.
    Unchanged,
    /// Pushing Home cleared the history.
    PoppedToRoot,
}

/// Result of a back request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackOutcome {
    /// The tail entry was removed.
    Popped(Screen),
    /// History was empty; the screen-specific fallback was applied.
    FellBack(Screen),
    /// Already at Home with nothing to pop.
    AtRoot,
}

/// Navigation state machine with a standalone layer over a stacked layer.
///
/// The visible screen is the standalone screen when one is shown, otherwise
/// the history tail, otherwise a deep-linked entry, otherwise Home.
#[derive(Debug, Clone)]
pub struct ScreenStateMachine {
    standalone: Option<Screen>,
    history: NavigationHistory,
    detached: Option<Screen>,
}

impl ScreenStateMachine {
    /// Creates a machine showing Splash over an empty stack.
    pub fn new() -> Self {
        Self {
            standalone: Some(Screen::Splash),
            history: NavigationHistory::new(),
            detached: None,
        }
    }

    /// Visible screen.
    pub fn current(&self) -> &Screen {
        self.standalone
            .as_ref()
            .unwrap_or_else(|| self.stacked_current())
    }

    /// Top of the stacked layer, ignoring any standalone screen.
    pub fn stacked_current(&self) -> &Screen {
        self.history
            .last()
            .or(self.detached.as_ref())
            .unwrap_or(&HOME_SCREEN)
    }

    /// Standalone-layer projection.
    pub fn standalone(&self) -> Option<&Screen> {
        self.standalone.as_ref()
    }

    /// Stacked-layer projection (history entries in push order).
    pub fn stack(&self) -> &[Screen] {
        self.history.entries()
    }

    /// Navigation history.
    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    /// Pushes a stacked screen.
    ///
    /// Pushing the current stacked screen again is a no-op and pushing Home
    /// pops to root.
    ///
    /// # Errors
    /// Returns [`NavigationError::WrongPresentationClass`] for standalone
    /// screens.
    pub fn push(&mut self, screen: Screen) -> Result<PushOutcome, NavigationError> {
        if screen.presentation() != PresentationClass::Stacked {
            return Err(NavigationError::WrongPresentationClass {
                screen: screen.key(),
                expected: PresentationClass::Stacked,
            });
        }

        if screen == Screen::Home {
            self.pop_to_root();
            return Ok(PushOutcome::PoppedToRoot);
        }

        if self.stacked_current() == &screen {
            debug!("nav: push ignored screen={:?} reason=already_current", screen.key());
            return Ok(PushOutcome::Unchanged);
        }

        debug!("nav: push screen={:?} depth={}", screen.key(), self.history.len() + 1);
        self.history.push(screen)?;
        Ok(PushOutcome::Pushed)
    }

    /// Navigates back on the stacked layer.
    ///
    /// History is always preferred; the screen-specific fallback applies only
    /// when history is empty and a deep-linked entry is visible.
    pub fn back(&mut self, workflow_file: Option<&FileInfo>) -> BackOutcome {
        if let Some(popped) = self.history.pop() {
            debug!("nav: back popped={:?} depth={}", popped.key(), self.history.len());
            return BackOutcome::Popped(popped);
        }

        let Some(detached) = self.detached.take() else {
            return BackOutcome::AtRoot;
        };

        let target = detached.back_fallback(workflow_file);
        debug!("nav: back fallback from={:?} to={:?}", detached.key(), target.key());
        if target != Screen::Home {
            self.detached = Some(target.clone());
        }
        BackOutcome::FellBack(target)
    }

    /// Clears the stacked layer so Home is visible below any standalone screen.
    pub fn pop_to_root(&mut self) {
        debug!("nav: pop_to_root cleared={}", self.history.len());
        self.history.clear();
        self.detached = None;
    }

    /// Shows a stacked screen as the sole entry without history.
    ///
    /// # Errors
    /// Returns [`NavigationError::WrongPresentationClass`] for standalone
    /// screens.
    pub fn deep_link(&mut self, screen: Screen) -> Result<(), NavigationError> {
        if screen.presentation() != PresentationClass::Stacked {
            return Err(NavigationError::WrongPresentationClass {
                screen: screen.key(),
                expected: PresentationClass::Stacked,
            });
        }

        self.pop_to_root();
        if screen != Screen::Home {
            debug!("nav: deep_link screen={:?}", screen.key());
            self.detached = Some(screen);
        }
        Ok(())
    }

    /// Shows a standalone screen over the stacked layer.
    ///
    /// # Errors
    /// Returns [`NavigationError::WrongPresentationClass`] for stacked screens.
    pub fn present_standalone(&mut self, screen: Screen) -> Result<(), NavigationError> {
        if screen.presentation() != PresentationClass::Standalone {
            return Err(NavigationError::WrongPresentationClass {
                screen: screen.key(),
                expected: PresentationClass::Standalone,
            });
        }

        debug!("nav: standalone screen={:?}", screen.key());
        self.standalone = Some(screen);
        Ok(())
    }

    /// Hides the standalone screen, revealing the stacked layer.
    pub fn dismiss_standalone(&mut self) -> Option<Screen> {
        self.standalone.take()
    }
}

impl Default for ScreenStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Navigation invariant violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavigationError {
    /// Screen was routed to the wrong presentation layer.
    #[error("screen {screen:?} cannot be presented as {expected:?}")]
    WrongPresentationClass {
        /// Offending screen.
        screen: ScreenKey,
        /// Layer the operation requires.
        expected: PresentationClass,
    },
    /// Transition requires a payload the current state does not hold.
    #[error("transition '{intent}' from {from:?} is missing {missing}")]
    MissingPayload {
        /// Screen the transition started from.
        from: ScreenKey,
        /// Name of the requested transition.
        intent: &'static str,
        /// Description of the missing payload.
        missing: &'static str,
    },
    /// Transition requested from a screen that does not accept it.
    #[error("transition '{intent}' is not valid from {from:?}; expected {expected}")]
    UnexpectedScreen {
        /// Screen the transition started from.
        from: ScreenKey,
        /// Name of the requested transition.
        intent: &'static str,
        /// Screen the transition requires.
        expected: &'static str,
    },
}
