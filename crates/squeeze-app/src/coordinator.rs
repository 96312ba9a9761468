//! The workflow coordinator: single owner of navigation, overlay, gate and run
//! state.

use std::sync::Arc;

use log::{debug, error, info, warn};
use squeeze_core::{AnalysisResult, CompressionPreset, CompressionResult, FileInfo, SubscriptionStatus};
use squeeze_entitlement::{EntitlementPolicy, GateDenial, check, stage_for, still_denied};
use squeeze_navigation::{
    BackOutcome, NavigationError, NavigationHistory, Screen, ScreenKey, ScreenStateMachine,
};
use squeeze_overlay::{ErrorAlert, Overlay, OverlayKind, OverlayManager, RetryPrompt};
use squeeze_pipeline::{
    FailureClass, PipelineEvent, PipelineFailure, PipelineOrchestrator, PipelineUpdate,
    RetryState, RunInput, RunOutcome, RunTag, StepKind, StepOutput,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;

use crate::analytics::AnalyticsEvent;
use crate::collaborators::{Collaborators, UserProgress};
use crate::config::CoordinatorConfig;
use crate::follow_up::{FollowUp, follow_up_after_success};
use crate::intent::Intent;
use crate::snapshot::CoordinatorSnapshot;
use crate::{CoordinatorError, app_version, redact_locator};

/// What one call to [`WorkflowCoordinator::next_event`] applied.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    /// Event of a superseded run; nothing changed.
    Stale,
    /// Progress of the run in flight.
    Progress {
        /// Step reporting progress.
        step: StepKind,
        /// Completed fraction.
        fraction: f32,
    },
    /// The run in flight reached a terminal outcome.
    RunFinished {
        /// Step that finished.
        step: StepKind,
    },
    /// Subscription status changed and pending gates were re-evaluated.
    SubscriptionChanged,
}

/// References that drive the screens of the current workflow run.
#[derive(Debug, Clone, Default)]
struct WorkflowRun {
    file: Option<FileInfo>,
    analysis: Option<AnalysisResult>,
    preset: Option<CompressionPreset>,
    result: Option<CompressionResult>,
}

impl WorkflowRun {
    fn for_file(file: FileInfo) -> Self {
        Self {
            file: Some(file),
            ..Self::default()
        }
    }
}

/// Intent held back by a gate denial until the paywall resolves.
#[derive(Debug, Clone)]
enum GatedIntent {
    PickFile(FileInfo),
    ConfirmPreset {
        file: FileInfo,
        analysis: AnalysisResult,
        preset: CompressionPreset,
    },
}

impl GatedIntent {
    fn file(&self) -> &FileInfo {
        match self {
            Self::PickFile(file) | Self::ConfirmPreset { file, .. } => file,
        }
    }

    fn preset(&self) -> Option<&CompressionPreset> {
        match self {
            Self::PickFile(_) => None,
            Self::ConfirmPreset { preset, .. } => Some(preset),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingGate {
    intent: GatedIntent,
    denial: GateDenial,
}

enum Wake {
    Pipeline(Option<PipelineEvent>),
    Subscription(bool),
}

/// Drives the pick -> analyze -> preset -> compress -> result workflow.
///
/// All state mutation happens through `&mut self`; background work reports
/// back over the pipeline channel and is applied by [`Self::next_event`],
/// [`Self::drain_events`] or [`Self::await_run`].
pub struct WorkflowCoordinator {
    config: CoordinatorConfig,
    policy: EntitlementPolicy,
    collaborators: Collaborators,
    navigation: ScreenStateMachine,
    overlays: OverlayManager,
    pipeline: PipelineOrchestrator,
    pipeline_events: UnboundedReceiver<PipelineEvent>,
    subscription_updates: watch::Receiver<SubscriptionStatus>,
    subscription_open: bool,
    subscription: SubscriptionStatus,
    user_progress: UserProgress,
    workflow: WorkflowRun,
    pending_gate: Option<PendingGate>,
}

impl WorkflowCoordinator {
    /// Creates a coordinator showing Splash.
    ///
    /// Background runs are spawned on `runtime`.
    ///
    /// # Errors
    /// Returns [`CoordinatorError::Config`] when `config` fails validation.
    pub fn new(
        config: CoordinatorConfig,
        collaborators: Collaborators,
        runtime: Handle,
    ) -> Result<Self, CoordinatorError> {
        config.validate()?;

        let (pipeline, pipeline_events) = PipelineOrchestrator::new(
            Arc::clone(&collaborators.compression),
            runtime,
            config.retry_policy(),
        );
        let subscription_updates = collaborators.subscription.subscribe();
        let subscription = collaborators.subscription.current_status();
        let user_progress = collaborators.progress.load();

        info!(
            "coordinator: start version={} plan={:?} onboarding_completed={} strict_invariants={}",
            app_version(),
            subscription.plan,
            user_progress.onboarding_completed,
            config.strict_invariants
        );

        Ok(Self {
            policy: config.entitlement_policy(),
            config,
            collaborators,
            navigation: ScreenStateMachine::new(),
            overlays: OverlayManager::new(),
            pipeline,
            pipeline_events,
            subscription_updates,
            subscription_open: true,
            subscription,
            user_progress,
            workflow: WorkflowRun::default(),
            pending_gate: None,
        })
    }

    /// Applies one intent.
    ///
    /// # Errors
    /// Returns [`CoordinatorError::InvariantViolation`] when the intent is not
    /// valid in the current state. With `strict_invariants` this panics
    /// instead; otherwise the coordinator has already recovered to Home.
    pub fn dispatch(&mut self, intent: Intent) -> Result<(), CoordinatorError> {
        let name = intent.name();
        debug!("coordinator: dispatch intent={name}");
        self.guarded(name, |coordinator| coordinator.apply_intent(intent))
    }

    /// Waits for one pipeline event or subscription change and applies it.
    ///
    /// Returns `Ok(None)` without waiting when nothing is in flight and the
    /// subscription stream has closed, since no event can change state then.
    ///
    /// # Errors
    /// See [`Self::dispatch`].
    pub async fn next_event(&mut self) -> Result<Option<CoordinatorEvent>, CoordinatorError> {
        if !self.pipeline.is_running() && !self.subscription_open {
            return Ok(None);
        }

        let wake = tokio::select! {
            event = self.pipeline_events.recv() => Wake::Pipeline(event),
            changed = self.subscription_updates.changed(), if self.subscription_open => {
                Wake::Subscription(changed.is_ok())
            }
        };

        match wake {
            Wake::Pipeline(None) => Ok(None),
            Wake::Pipeline(Some(event)) => self.apply_pipeline_event(event).map(Some),
            Wake::Subscription(false) => {
                warn!("subscription: change stream closed");
                self.subscription_open = false;
                Ok(Some(CoordinatorEvent::SubscriptionChanged))
            }
            Wake::Subscription(true) => self
                .apply_latest_subscription()
                .map(|()| Some(CoordinatorEvent::SubscriptionChanged)),
        }
    }

    /// Applies every event already queued without waiting.
    ///
    /// Returns the number of events applied.
    ///
    /// # Errors
    /// See [`Self::dispatch`].
    pub fn drain_events(&mut self) -> Result<usize, CoordinatorError> {
        let mut applied = 0;

        if self.subscription_open {
            match self.subscription_updates.has_changed() {
                Ok(true) => {
                    self.apply_latest_subscription()?;
                    applied += 1;
                }
                Ok(false) => {}
                Err(_) => self.subscription_open = false,
            }
        }

        while let Ok(event) = self.pipeline_events.try_recv() {
            self.apply_pipeline_event(event)?;
            applied += 1;
        }

        Ok(applied)
    }

    /// Applies events until the run in flight reaches a terminal outcome.
    ///
    /// Returns immediately when nothing is in flight.
    ///
    /// # Errors
    /// See [`Self::dispatch`].
    pub async fn await_run(&mut self) -> Result<(), CoordinatorError> {
        while self.pipeline.is_running() {
            if self.next_event().await?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Serializable projection for the presentation layer.
    pub fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            version: app_version().to_string(),
            current: self.navigation.current().clone(),
            standalone: self.navigation.standalone().map(Screen::key),
            stack: self.navigation.stack().iter().map(Screen::key).collect(),
            overlays: self.overlays.snapshot(),
            progress: self.pipeline.progress(),
            retry: self.pipeline.retry_state().clone(),
            run_in_flight: self.pipeline.in_flight().cloned(),
        }
    }

    /// Visible screen.
    pub fn current(&self) -> &Screen {
        self.navigation.current()
    }

    /// Stacked history.
    pub fn history(&self) -> &NavigationHistory {
        self.navigation.history()
    }

    /// Overlay state.
    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    /// Retry bookkeeping of the current run.
    pub fn retry_state(&self) -> &RetryState {
        self.pipeline.retry_state()
    }

    /// Tag of the run in flight.
    pub fn run_in_flight(&self) -> Option<&RunTag> {
        self.pipeline.in_flight()
    }

    /// Returns `true` while a gated intent waits behind the paywall.
    pub fn has_pending_gate(&self) -> bool {
        self.pending_gate.is_some()
    }

    /// Follow-up flags as last saved.
    pub fn user_progress(&self) -> &UserProgress {
        &self.user_progress
    }

    /// Active configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn guarded<T, F>(&mut self, context: &'static str, apply: F) -> Result<T, CoordinatorError>
    where
        F: FnOnce(&mut Self) -> Result<T, NavigationError>,
    {
        let before = self.navigation.current().key();
        let result = apply(self).map_err(|source| self.recover(context, source));
        let after = self.navigation.current().key();
        if after != before {
            debug!("nav: visible from={before:?} to={after:?}");
            self.track(AnalyticsEvent::ScreenViewed { screen: after });
        }
        result
    }

    fn recover(&mut self, context: &'static str, source: NavigationError) -> CoordinatorError {
        if self.config.strict_invariants {
            panic!("coordinator: invariant violated intent={context} error={source}");
        }

        error!("coordinator: invariant violated intent={context} error={source}; recovering to home");
        self.report_error(&source.to_string(), context);
        self.abandon_run();
        self.overlays.clear_blocking();
        self.pending_gate = None;
        self.navigation.dismiss_standalone();
        self.navigation.pop_to_root();
        self.workflow = WorkflowRun::default();

        CoordinatorError::InvariantViolation {
            intent: context,
            source,
        }
    }

    fn apply_intent(&mut self, intent: Intent) -> Result<(), NavigationError> {
        match intent {
            Intent::SplashFinished => {
                self.expect_standalone(ScreenKey::Splash, "splash_finished", "splash")?;
                if self.user_progress.onboarding_completed {
                    self.navigation.dismiss_standalone();
                } else {
                    self.navigation.present_standalone(Screen::Onboarding)?;
                }
            }
            Intent::OnboardingCompleted => {
                self.expect_standalone(ScreenKey::Onboarding, "onboarding_completed", "onboarding")?;
                self.user_progress.onboarding_completed = true;
                self.save_progress();
                self.navigation.dismiss_standalone();
            }
            Intent::OpenFilePicker => {
                self.overlays.present(Overlay::FilePicker);
            }
            Intent::FilePicked(file) => {
                self.overlays.dismiss(OverlayKind::FilePicker);
                self.request_file_pick(file)?;
            }
            Intent::FilePickFailed { message } => {
                self.overlays.dismiss(OverlayKind::FilePicker);
                warn!("coordinator: file pick failed message={message}");
                self.report_error(&message, "file_pick");
                self.present_blocking(Overlay::ErrorAlert(ErrorAlert::new(
                    "Can't open this file",
                    format!("The selected file could not be opened: {message}"),
                )));
            }
            Intent::ConfirmPreset(preset) => {
                let Screen::PresetSelect { file, analysis } = self.navigation.current().clone()
                else {
                    return Err(self.missing("confirm_preset", "analyzed file"));
                };
                self.request_compression(file, analysis, preset)?;
            }
            Intent::ConfirmRetry => {
                if self.pipeline.retry().is_err() {
                    return Err(self.missing("confirm_retry", "retryable failure"));
                }
                self.overlays.dismiss(OverlayKind::RetryConfirmation);
            }
            Intent::DeclineRetry
            | Intent::DismissOverlay(OverlayKind::RetryConfirmation)
            | Intent::CancelRun
            | Intent::GoHome => self.go_home(),
            Intent::Back => self.back()?,
            Intent::OpenHistory => self.open_secondary(Screen::History)?,
            Intent::OpenSettings => self.open_secondary(Screen::Settings)?,
            Intent::DeepLink(screen) => self.deep_link(screen)?,
            Intent::ShareResult => self.present_result_sheet(Overlay::ShareSheet, "share_result")?,
            Intent::SaveResult => self.present_result_sheet(Overlay::SaveDialog, "save_result")?,
            Intent::DismissOverlay(OverlayKind::Paywall) => self.dismiss_paywall(),
            Intent::DismissOverlay(kind) => {
                self.overlays.dismiss(kind);
            }
            Intent::DismissCommitment => {
                self.expect_standalone(ScreenKey::Commitment, "dismiss_commitment", "commitment")?;
                self.navigation.dismiss_standalone();
            }
            Intent::DismissRatingRequest => {
                self.expect_standalone(
                    ScreenKey::RatingRequest,
                    "dismiss_rating_request",
                    "rating request",
                )?;
                self.navigation.dismiss_standalone();
            }
            Intent::RatingResponded { accepted } => {
                self.expect_standalone(ScreenKey::RatingRequest, "rating_responded", "rating request")?;
                info!("coordinator: rating answered accepted={accepted}");
                self.navigation.dismiss_standalone();
            }
        }
        Ok(())
    }

    fn expect_standalone(
        &self,
        expected_key: ScreenKey,
        intent: &'static str,
        expected: &'static str,
    ) -> Result<(), NavigationError> {
        let current = self.navigation.current().key();
        if current == expected_key {
            return Ok(());
        }
        Err(NavigationError::UnexpectedScreen {
            from: current,
            intent,
            expected,
        })
    }

    fn missing(&self, intent: &'static str, missing: &'static str) -> NavigationError {
        NavigationError::MissingPayload {
            from: self.navigation.current().key(),
            intent,
            missing,
        }
    }

    fn request_file_pick(&mut self, file: FileInfo) -> Result<(), NavigationError> {
        let now_ms = self.collaborators.clock.now_ms();
        if let Some(denial) = check(&self.subscription, &self.policy, &file, None, now_ms) {
            self.show_paywall(GatedIntent::PickFile(file), denial);
            return Ok(());
        }
        self.start_workflow(file)
    }

    fn start_workflow(&mut self, file: FileInfo) -> Result<(), NavigationError> {
        self.abandon_run();
        self.navigation.pop_to_root();

        info!(
            "coordinator: file selected file_id={} category={:?} size_bytes={} source={}",
            file.id(),
            file.category(),
            file.size_bytes(),
            redact_locator(file.source())
        );
        self.track(AnalyticsEvent::FileSelected {
            file_id: file.id().to_string(),
            category: file.category(),
            size_bytes: file.size_bytes(),
        });

        self.enter_analyze(file)
    }

    fn enter_analyze(&mut self, file: FileInfo) -> Result<(), NavigationError> {
        self.workflow = WorkflowRun::for_file(file.clone());
        self.navigation.push(Screen::Analyze { file: file.clone() })?;
        self.pipeline.start_analyze(file);
        Ok(())
    }

    fn request_compression(
        &mut self,
        file: FileInfo,
        analysis: AnalysisResult,
        preset: CompressionPreset,
    ) -> Result<(), NavigationError> {
        let now_ms = self.collaborators.clock.now_ms();
        if let Some(denial) = check(&self.subscription, &self.policy, &file, Some(&preset), now_ms) {
            self.show_paywall(
                GatedIntent::ConfirmPreset {
                    file,
                    analysis,
                    preset,
                },
                denial,
            );
            return Ok(());
        }
        self.enter_progress(file, analysis, preset)
    }

    fn enter_progress(
        &mut self,
        file: FileInfo,
        analysis: AnalysisResult,
        preset: CompressionPreset,
    ) -> Result<(), NavigationError> {
        self.navigation.push(Screen::Progress {
            file: file.clone(),
            preset: preset.clone(),
        })?;

        self.track(AnalyticsEvent::CompressionStarted {
            file_id: file.id().to_string(),
            preset_id: preset.id.clone(),
        });
        self.workflow = WorkflowRun {
            file: Some(file.clone()),
            analysis: Some(analysis),
            preset: Some(preset.clone()),
            result: None,
        };
        self.pipeline.start_compress(file, preset);
        Ok(())
    }

    fn show_paywall(&mut self, intent: GatedIntent, denial: GateDenial) {
        info!(
            "gate: denied reason={:?} stage={:?} file_id={} observed={:?} limit={:?}",
            denial.reason,
            denial.context.stage,
            denial.context.file_id,
            denial.context.observed,
            denial.context.limit
        );
        self.track(AnalyticsEvent::PaywallShown {
            reason: denial.reason,
            stage: stage_for(intent.preset()),
        });
        self.present_blocking(Overlay::Paywall(denial.clone()));
        self.pending_gate = Some(PendingGate { intent, denial });
    }

    /// Shows a blocking overlay. Displacing a retry confirmation declines the
    /// retry, so no failed run is left without a retry or cancel choice.
    fn present_blocking(&mut self, overlay: Overlay) {
        let displaces_retry = overlay.kind() != OverlayKind::RetryConfirmation
            && self.overlays.is_visible(OverlayKind::RetryConfirmation);
        if displaces_retry {
            info!(
                "coordinator: retry declined by overlay kind={:?}",
                overlay.kind()
            );
            self.go_home();
        }
        self.overlays.present(overlay);
    }

    fn dismiss_paywall(&mut self) {
        if self.overlays.dismiss(OverlayKind::Paywall).is_none() {
            return;
        }
        if let Some(pending) = self.pending_gate.take() {
            info!(
                "gate: pending intent discarded reason={:?} file_id={}",
                pending.denial.reason,
                pending.intent.file().id()
            );
        }
    }

    fn apply_latest_subscription(&mut self) -> Result<(), CoordinatorError> {
        let status = self.subscription_updates.borrow_and_update().clone();
        self.guarded("subscription_changed", |coordinator| {
            coordinator.apply_subscription(status)
        })
    }

    fn apply_subscription(&mut self, status: SubscriptionStatus) -> Result<(), NavigationError> {
        debug!(
            "subscription: changed plan={:?} active={} used={}/{}",
            status.plan, status.active, status.usage.used, status.usage.limit
        );
        self.subscription = status;

        let Some(pending) = self.pending_gate.take() else {
            return Ok(());
        };
        if self.overlays.paywall().is_none() {
            debug!("gate: pending intent dropped reason=paywall_not_visible");
            return Ok(());
        }

        let now_ms = self.collaborators.clock.now_ms();
        let file = pending.intent.file();
        let preset = pending.intent.preset();
        if still_denied(&pending.denial, &self.subscription, &self.policy, file, preset, now_ms) {
            self.pending_gate = Some(pending);
            return Ok(());
        }

        match check(&self.subscription, &self.policy, file, preset, now_ms) {
            Some(denial) => {
                info!(
                    "gate: denial changed from={:?} to={:?} file_id={}",
                    pending.denial.reason,
                    denial.reason,
                    file.id()
                );
                self.show_paywall(pending.intent, denial);
                Ok(())
            }
            None => {
                info!(
                    "gate: cleared reason={:?} file_id={}; resuming",
                    pending.denial.reason,
                    file.id()
                );
                self.overlays.dismiss(OverlayKind::Paywall);
                self.resume(pending.intent)
            }
        }
    }

    fn resume(&mut self, intent: GatedIntent) -> Result<(), NavigationError> {
        match intent {
            GatedIntent::PickFile(file) => self.start_workflow(file),
            GatedIntent::ConfirmPreset {
                file,
                analysis,
                preset,
            } => {
                let still_selecting = matches!(
                    self.navigation.current(),
                    Screen::PresetSelect { file: current, .. } if current.id() == file.id()
                );
                if !still_selecting {
                    debug!(
                        "gate: resume dropped file_id={} reason=left_preset_selection",
                        file.id()
                    );
                    return Ok(());
                }
                self.enter_progress(file, analysis, preset)
            }
        }
    }

    fn go_home(&mut self) {
        self.abandon_run();
        self.navigation.pop_to_root();
        self.workflow = WorkflowRun::default();
    }

    fn abandon_run(&mut self) {
        let abandoned = self
            .pipeline
            .in_flight()
            .map(|tag| (tag.step, tag.file_id.clone()))
            .or_else(|| {
                self.pipeline
                    .pending_retry()
                    .map(|input| (input.step(), input.file().id().to_string()))
            });

        self.pipeline.cancel();
        self.overlays.dismiss(OverlayKind::RetryConfirmation);

        if let Some((step, file_id)) = abandoned {
            info!("coordinator: run abandoned step={step:?} file_id={file_id}");
            self.track(AnalyticsEvent::RunCancelled { step, file_id });
        }
    }

    fn back(&mut self) -> Result<(), NavigationError> {
        match self.navigation.standalone().map(Screen::key) {
            Some(ScreenKey::Commitment | ScreenKey::RatingRequest) => {
                self.navigation.dismiss_standalone();
                return Ok(());
            }
            Some(_) => {
                debug!("nav: back ignored reason=standalone_entry");
                return Ok(());
            }
            None => {}
        }

        if let Some(sheet) = self.overlays.sheet().map(Overlay::kind) {
            self.overlays.dismiss(sheet);
            return Ok(());
        }

        match self.overlays.blocking().map(Overlay::kind) {
            Some(OverlayKind::RetryConfirmation) => {
                self.go_home();
                return Ok(());
            }
            Some(OverlayKind::Paywall) => {
                self.dismiss_paywall();
                return Ok(());
            }
            Some(kind) => {
                self.overlays.dismiss(kind);
                return Ok(());
            }
            None => {}
        }

        self.abandon_run();
        match self.navigation.back(self.workflow.file.as_ref()) {
            BackOutcome::AtRoot => Ok(()),
            BackOutcome::Popped(_) | BackOutcome::FellBack(_) => self.reenter_stacked(),
        }
    }

    /// Restores workflow state for the stacked screen revealed by "back".
    ///
    /// Analyze re-runs analysis; Progress is never re-entered without a run,
    /// so it is popped as well.
    fn reenter_stacked(&mut self) -> Result<(), NavigationError> {
        match self.navigation.stacked_current().clone() {
            Screen::Home => self.workflow = WorkflowRun::default(),
            Screen::Analyze { file } => {
                self.workflow = WorkflowRun::for_file(file.clone());
                self.pipeline.start_analyze(file);
            }
            Screen::PresetSelect { file, analysis } => {
                self.workflow = WorkflowRun {
                    file: Some(file),
                    analysis: Some(analysis),
                    preset: None,
                    result: None,
                };
            }
            Screen::Progress { .. } => {
                debug!("nav: back skipped idle progress screen");
                self.navigation.back(self.workflow.file.as_ref());
                return self.reenter_stacked();
            }
            Screen::Result { result } => {
                self.workflow.result = Some(result);
            }
            Screen::History
            | Screen::Settings
            | Screen::Splash
            | Screen::Onboarding
            | Screen::Commitment
            | Screen::RatingRequest => {}
        }
        Ok(())
    }

    fn open_secondary(&mut self, screen: Screen) -> Result<(), NavigationError> {
        self.abandon_run();
        self.navigation.push(screen)?;
        Ok(())
    }

    fn deep_link(&mut self, screen: Screen) -> Result<(), NavigationError> {
        match screen {
            Screen::Analyze { file } => {
                self.go_home();
                self.request_file_pick(file)
            }
            Screen::Progress { .. } => Err(NavigationError::UnexpectedScreen {
                from: self.navigation.current().key(),
                intent: "deep_link",
                expected: "a screen that does not start a run",
            }),
            screen => {
                self.navigation.deep_link(screen.clone())?;
                self.abandon_run();
                self.workflow = match screen {
                    Screen::PresetSelect { file, analysis } => WorkflowRun {
                        file: Some(file),
                        analysis: Some(analysis),
                        ..WorkflowRun::default()
                    },
                    Screen::Result { result } => WorkflowRun {
                        result: Some(result),
                        ..WorkflowRun::default()
                    },
                    _ => WorkflowRun::default(),
                };
                Ok(())
            }
        }
    }

    fn present_result_sheet(
        &mut self,
        sheet: Overlay,
        intent: &'static str,
    ) -> Result<(), NavigationError> {
        if !matches!(self.navigation.current(), Screen::Result { .. }) {
            return Err(self.missing(intent, "compression result"));
        }
        self.overlays.present(sheet);
        Ok(())
    }

    fn apply_pipeline_event(
        &mut self,
        event: PipelineEvent,
    ) -> Result<CoordinatorEvent, CoordinatorError> {
        let Some(update) = self.pipeline.accept(event) else {
            return Ok(CoordinatorEvent::Stale);
        };

        match update {
            PipelineUpdate::Progress { step, fraction } => {
                Ok(CoordinatorEvent::Progress { step, fraction })
            }
            PipelineUpdate::Finished {
                tag,
                input,
                outcome,
            } => {
                let step = tag.step;
                self.guarded("run_finished", |coordinator| {
                    coordinator.apply_outcome(input, outcome)
                })?;
                Ok(CoordinatorEvent::RunFinished { step })
            }
        }
    }

    fn apply_outcome(&mut self, input: RunInput, outcome: RunOutcome) -> Result<(), NavigationError> {
        let step = input.step();
        match outcome {
            RunOutcome::Success(StepOutput::Analysis(analysis)) => {
                let file = input.file().clone();
                info!(
                    "coordinator: analysis ready file_id={} potential={:?} already_optimized={}",
                    file.id(),
                    analysis.savings_potential,
                    analysis.already_optimized
                );
                self.track(AnalyticsEvent::AnalysisCompleted {
                    file_id: file.id().to_string(),
                    savings_potential: analysis.savings_potential,
                });
                self.workflow.analysis = Some(analysis.clone());
                self.navigation.push(Screen::PresetSelect { file, analysis })?;
            }
            RunOutcome::Success(StepOutput::Compression(result)) => {
                self.complete_compression(result)?;
            }
            RunOutcome::RetryableFailure {
                failure,
                attempt,
                max_attempts,
            } => {
                self.track(AnalyticsEvent::RetryOffered {
                    step,
                    attempt,
                    max_attempts,
                });
                self.overlays.present(Overlay::RetryConfirmation(RetryPrompt {
                    attempt,
                    max_attempts,
                    message: retry_message(step, &failure),
                }));
            }
            RunOutcome::FatalFailure(failure) => {
                self.track(AnalyticsEvent::CompressionFailed {
                    step,
                    file_id: input.file().id().to_string(),
                    class: failure.class,
                    error_kind: failure.error.kind,
                });
                self.report_error(&failure.error.to_string(), step_label(step));
                self.navigation.pop_to_root();
                self.workflow = WorkflowRun::default();
                self.present_blocking(Overlay::ErrorAlert(failure_alert(step, &failure)));
            }
            RunOutcome::Cancelled => {
                info!(
                    "coordinator: run cancelled by service step={step:?} file_id={}",
                    input.file().id()
                );
                self.navigation.pop_to_root();
                self.workflow = WorkflowRun::default();
            }
        }
        Ok(())
    }

    fn complete_compression(&mut self, result: CompressionResult) -> Result<(), NavigationError> {
        info!(
            "coordinator: compression done file_id={} preset_id={} saved={}%",
            result.file_id(),
            result.preset_id(),
            result.savings_percent()
        );

        if let Err(error) = self.collaborators.history.record(&result) {
            warn!("coordinator: history record failed error={error}");
            self.report_error(&error.to_string(), "history_record");
        }
        self.collaborators.subscription.record_usage();
        self.subscription = self.collaborators.subscription.current_status();
        self.user_progress.successful_runs = self.user_progress.successful_runs.saturating_add(1);

        self.track(AnalyticsEvent::CompressionCompleted {
            file_id: result.file_id().to_string(),
            preset_id: result.preset_id().to_string(),
            savings_percent: result.savings_percent(),
            bytes_saved: result.bytes_saved(),
        });

        self.workflow.result = Some(result.clone());
        self.navigation.push(Screen::Result { result })?;
        self.apply_follow_up()?;
        self.save_progress();
        Ok(())
    }

    fn apply_follow_up(&mut self) -> Result<(), NavigationError> {
        let total_bytes_saved = self.collaborators.history.total_bytes_saved();
        let Some(follow_up) =
            follow_up_after_success(&self.user_progress, total_bytes_saved, &self.config)
        else {
            return Ok(());
        };

        match follow_up {
            FollowUp::Commitment => self.user_progress.commitment_shown = true,
            FollowUp::RatingRequest => self.user_progress.rating_requested = true,
        }
        info!(
            "coordinator: follow-up {follow_up:?} successful_runs={} total_saved={total_bytes_saved}",
            self.user_progress.successful_runs
        );
        self.navigation.present_standalone(follow_up.screen())
    }

    fn save_progress(&self) {
        if let Err(error) = self.collaborators.progress.save(&self.user_progress) {
            warn!("coordinator: progress save failed error={error}");
        }
    }

    fn track(&self, event: AnalyticsEvent) {
        if let Err(error) = self.collaborators.analytics.track(&event) {
            debug!("coordinator: analytics dropped error={error}");
        }
    }

    fn report_error(&self, error: &str, context: &str) {
        if let Err(sink_error) = self.collaborators.analytics.track_error(error, context) {
            debug!("coordinator: analytics dropped error={sink_error}");
        }
    }
}

fn step_label(step: StepKind) -> &'static str {
    match step {
        StepKind::Analyze => "analysis",
        StepKind::Compress => "compression",
    }
}

fn retry_message(step: StepKind, failure: &PipelineFailure) -> String {
    format!(
        "The {} was interrupted ({}). Try again?",
        step_label(step),
        failure.error.message
    )
}

fn failure_alert(step: StepKind, failure: &PipelineFailure) -> ErrorAlert {
    match failure.class {
        FailureClass::Input => ErrorAlert::new(
            "Can't open this file",
            format!(
                "The file could not be processed ({}). Try a different file.",
                failure.error.message
            ),
        ),
        _ => ErrorAlert::new(
            match step {
                StepKind::Analyze => "Analysis failed",
                StepKind::Compress => "Compression failed",
            },
            format!(
                "The {} could not be completed ({}). Your original file is unchanged.",
                step_label(step),
                failure.error.message
            ),
        ),
    }
}
