//! Shared fakes and fixtures for coordinator integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use squeeze_app::{
    AnalyticsEvent, AnalyticsSink, Clock, CollaboratorError, Collaborators, CoordinatorConfig,
    InMemoryHistoryStore, InMemoryProgressStore, Intent, UserProgress, WatchSubscriptionService,
    WorkflowCoordinator,
};
use squeeze_core::{
    AnalysisResult, CompressionPreset, CompressionResult, ContentDensity, FileInfo,
    SavingsPotential, SubscriptionStatus, builtin_presets,
};
use squeeze_navigation::Screen;
use squeeze_pipeline::{CompressionService, ProgressReporter, ServiceError, ServiceErrorKind};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Installs the test logger once.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scripted behavior of one service call.
pub enum Step {
    /// Return a valid output for the requested file.
    Succeed,
    /// Fail with the given kind.
    Fail(ServiceErrorKind),
    /// Wait until the gate is released (or dropped), then continue.
    Wait(oneshot::Receiver<()>, Box<Step>),
    /// Panic inside the service call.
    Panic,
}

impl Step {
    /// Builds a gated step and the sender that releases it.
    pub fn gated(then: Step) -> (oneshot::Sender<()>, Step) {
        let (release, gate) = oneshot::channel();
        (release, Step::Wait(gate, Box::new(then)))
    }
}

async fn resolve(mut step: Step) -> Result<(), ServiceErrorKind> {
    loop {
        match step {
            Step::Succeed => return Ok(()),
            Step::Fail(kind) => return Err(kind),
            Step::Panic => panic!("scripted service panic"),
            Step::Wait(gate, next) => {
                let _ = gate.await;
                step = *next;
            }
        }
    }
}

type Script = Mutex<HashMap<String, VecDeque<Step>>>;

/// Compression service driven by per-file scripts; unscripted calls succeed.
#[derive(Default)]
pub struct ScriptedCompressionService {
    analyze_script: Script,
    compress_script: Script,
    analyze_calls: AtomicUsize,
    compress_calls: AtomicUsize,
    reset_calls: AtomicUsize,
}

impl ScriptedCompressionService {
    /// Queues behavior for the next analyze call on `file_id`.
    pub fn script_analyze(&self, file_id: &str, step: Step) {
        Self::push(&self.analyze_script, file_id, step);
    }

    /// Queues behavior for the next compress call on `file_id`.
    pub fn script_compress(&self, file_id: &str, step: Step) {
        Self::push(&self.compress_script, file_id, step);
    }

    /// Number of analyze invocations.
    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    /// Number of compress invocations.
    pub fn compress_calls(&self) -> usize {
        self.compress_calls.load(Ordering::SeqCst)
    }

    /// Number of progress resets.
    pub fn reset_calls(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }

    fn push(script: &Script, file_id: &str, step: Step) {
        script
            .lock()
            .expect("script lock should not be poisoned")
            .entry(file_id.to_string())
            .or_default()
            .push_back(step);
    }

    fn next(script: &Script, file_id: &str) -> Step {
        script
            .lock()
            .expect("script lock should not be poisoned")
            .get_mut(file_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Succeed)
    }
}

#[async_trait]
impl CompressionService for ScriptedCompressionService {
    async fn analyze(
        &self,
        file: FileInfo,
        _cancel: CancellationToken,
    ) -> Result<AnalysisResult, ServiceError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        let step = Self::next(&self.analyze_script, file.id());
        resolve(step)
            .await
            .map(|()| analysis_for(&file))
            .map_err(|kind| ServiceError::new(kind, "scripted analyze failure"))
    }

    async fn compress(
        &self,
        file: FileInfo,
        preset: CompressionPreset,
        progress: ProgressReporter,
        _cancel: CancellationToken,
    ) -> Result<CompressionResult, ServiceError> {
        let call = self.compress_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let step = Self::next(&self.compress_script, file.id());
        progress.report(0.5);
        resolve(step)
            .await
            .map_err(|kind| ServiceError::new(kind, "scripted compress failure"))?;

        let output = Url::parse(&format!("file:///out/{}-{call}.bin", file.id()))
            .map_err(|error| ServiceError::new(ServiceErrorKind::Internal, error.to_string()))?;
        CompressionResult::new(
            format!("result-{}-{call}", file.id()),
            &file,
            preset.id,
            output,
            file.size_bytes() / 2,
            1_700_000_000_000,
        )
        .map_err(|error| ServiceError::new(ServiceErrorKind::Internal, error.to_string()))
    }

    fn reset_progress(&self) {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Analytics sink that records everything.
#[derive(Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
    errors: Mutex<Vec<(String, String)>>,
}

impl RecordingAnalytics {
    /// Recorded events.
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events
            .lock()
            .expect("analytics lock should not be poisoned")
            .clone()
    }

    /// Recorded `(error, context)` pairs.
    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors
            .lock()
            .expect("analytics lock should not be poisoned")
            .clone()
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn track(&self, event: &AnalyticsEvent) -> Result<(), CollaboratorError> {
        self.events
            .lock()
            .map_err(|_| CollaboratorError::new("analytics", "lock poisoned"))?
            .push(event.clone());
        Ok(())
    }

    fn track_error(&self, error: &str, context: &str) -> Result<(), CollaboratorError> {
        self.errors
            .lock()
            .map_err(|_| CollaboratorError::new("analytics", "lock poisoned"))?
            .push((error.to_string(), context.to_string()));
        Ok(())
    }
}

/// Clock pinned to one instant.
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}

/// Coordinator plus handles on every fake behind it.
pub struct Harness {
    pub coordinator: WorkflowCoordinator,
    pub service: Arc<ScriptedCompressionService>,
    pub history: Arc<InMemoryHistoryStore>,
    pub subscription: Arc<WatchSubscriptionService>,
    pub analytics: Arc<RecordingAnalytics>,
    pub progress: Arc<InMemoryProgressStore>,
}

/// Config used by most tests: non-strict so violations are observable.
pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        strict_invariants: false,
        ..CoordinatorConfig::default()
    }
}

/// Progress of a returning user who already saw every follow-up.
pub fn returning_user() -> UserProgress {
    UserProgress {
        onboarding_completed: true,
        commitment_shown: true,
        rating_requested: true,
        successful_runs: 10,
    }
}

/// Builds a harness; must run inside a tokio runtime.
pub fn harness_with(
    config: CoordinatorConfig,
    status: SubscriptionStatus,
    user_progress: UserProgress,
) -> Harness {
    init_logging();
    let service = Arc::new(ScriptedCompressionService::default());
    let history = Arc::new(InMemoryHistoryStore::new());
    let subscription = Arc::new(WatchSubscriptionService::new(status));
    let analytics = Arc::new(RecordingAnalytics::default());
    let progress = Arc::new(InMemoryProgressStore::new(user_progress));

    let collaborators = Collaborators {
        compression: service.clone(),
        history: history.clone(),
        subscription: subscription.clone(),
        analytics: analytics.clone(),
        progress: progress.clone(),
        clock: Arc::new(FixedClock(1_000)),
    };
    let coordinator = WorkflowCoordinator::new(config, collaborators, Handle::current())
        .expect("coordinator should build");

    Harness {
        coordinator,
        service,
        history,
        subscription,
        analytics,
        progress,
    }
}

/// Returning free user with allowance left, already on Home.
pub fn harness_at_home() -> Harness {
    let mut harness = harness_with(test_config(), SubscriptionStatus::free(0, 3), returning_user());
    harness
        .coordinator
        .dispatch(Intent::SplashFinished)
        .expect("splash should finish");
    assert_eq!(harness.coordinator.current(), &Screen::Home);
    harness
}

/// File fixture.
pub fn file(id: &str, size_bytes: u64) -> FileInfo {
    FileInfo::new(
        id,
        format!("{id}.pdf"),
        Url::parse(&format!("file:///docs/{id}.pdf")).expect("url should parse"),
        size_bytes,
        Some(4),
    )
    .expect("file fixture should be valid")
}

/// Catalog preset by id.
pub fn preset(id: &str) -> CompressionPreset {
    builtin_presets()
        .into_iter()
        .find(|preset| preset.id == id)
        .expect("preset should exist in catalog")
}

/// Analysis the scripted service returns for `file`.
pub fn analysis_for(file: &FileInfo) -> AnalysisResult {
    AnalysisResult {
        file_id: file.id().to_string(),
        page_count: file.page_count(),
        image_count: 2,
        density: ContentDensity::Medium,
        savings_potential: SavingsPotential::High,
        already_optimized: false,
        estimated_output_bytes: Some(file.size_bytes() / 2),
    }
}

/// Picks `file` and waits until preset selection is shown.
pub async fn reach_preset_select(harness: &mut Harness, file: &FileInfo) {
    harness
        .coordinator
        .dispatch(Intent::FilePicked(file.clone()))
        .expect("file pick should dispatch");
    harness
        .coordinator
        .await_run()
        .await
        .expect("analysis should apply");
    assert_eq!(
        harness.coordinator.current(),
        &Screen::PresetSelect {
            file: file.clone(),
            analysis: analysis_for(file),
        }
    );
}
