//! Integration tests for dropping completions of superseded runs.

mod common;

use common::{Step, analysis_for, file, harness_at_home, preset, reach_preset_select};
use squeeze_app::{CoordinatorEvent, Intent};
use squeeze_navigation::Screen;

#[tokio::test]
async fn stale_completion_tests_new_pick_supersedes_running_analysis() {
    let mut harness = harness_at_home();
    let first = file("first", 10_000);
    let second = file("second", 10_000);
    let (release_first, gated_first) = Step::gated(Step::Succeed);
    let (release_second, gated_second) = Step::gated(Step::Succeed);
    harness.service.script_analyze("first", gated_first);
    harness.service.script_analyze("second", gated_second);

    harness
        .coordinator
        .dispatch(Intent::FilePicked(first.clone()))
        .expect("first pick should dispatch");
    harness
        .coordinator
        .dispatch(Intent::FilePicked(second.clone()))
        .expect("second pick should dispatch");
    assert_eq!(harness.coordinator.history().len(), 1);

    release_first.send(()).expect("first run should be waiting");
    let event = harness
        .coordinator
        .next_event()
        .await
        .expect("event should apply");
    assert_eq!(event, Some(CoordinatorEvent::Stale));
    assert_eq!(harness.coordinator.current(), &Screen::Analyze { file: second.clone() });

    release_second.send(()).expect("second run should be waiting");
    harness.coordinator.await_run().await.expect("run should apply");
    assert_eq!(
        harness.coordinator.current(),
        &Screen::PresetSelect {
            file: second.clone(),
            analysis: analysis_for(&second),
        }
    );
}

#[tokio::test]
async fn stale_completion_tests_back_during_compression_ignores_late_result() {
    let mut harness = harness_at_home();
    let target = file("report", 10_000);
    let (release, gated) = Step::gated(Step::Succeed);
    harness.service.script_compress("report", gated);
    reach_preset_select(&mut harness, &target).await;

    harness
        .coordinator
        .dispatch(Intent::ConfirmPreset(preset("balanced")))
        .expect("confirm should dispatch");
    harness.coordinator.dispatch(Intent::Back).expect("back should dispatch");
    assert!(harness.coordinator.run_in_flight().is_none());
    assert_eq!(harness.coordinator.snapshot().progress, None);

    let _ = release.send(());
    for _ in 0..2 {
        let event = harness
            .coordinator
            .next_event()
            .await
            .expect("event should apply");
        assert_eq!(event, Some(CoordinatorEvent::Stale));
    }

    assert!(matches!(harness.coordinator.current(), Screen::PresetSelect { .. }));
    assert!(harness.history.results().is_empty());
}
