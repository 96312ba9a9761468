//! Integration tests for coordinator navigation: push idempotence, back and
//! pop-to-root.

mod common;

use common::{analysis_for, file, harness_at_home, harness_with, reach_preset_select, test_config};
use squeeze_app::{Intent, UserProgress};
use squeeze_core::SubscriptionStatus;
use squeeze_navigation::{Screen, ScreenKey};

#[tokio::test]
async fn navigation_flow_tests_first_launch_goes_through_onboarding_once() {
    let mut harness = harness_with(
        test_config(),
        SubscriptionStatus::free(0, 3),
        UserProgress::default(),
    );
    assert_eq!(harness.coordinator.current(), &Screen::Splash);

    harness
        .coordinator
        .dispatch(Intent::SplashFinished)
        .expect("splash should finish");
    assert_eq!(harness.coordinator.current(), &Screen::Onboarding);
    assert!(harness.coordinator.history().is_empty());

    harness
        .coordinator
        .dispatch(Intent::OnboardingCompleted)
        .expect("onboarding should complete");
    assert_eq!(harness.coordinator.current(), &Screen::Home);
    assert!(harness.coordinator.user_progress().onboarding_completed);
}

#[tokio::test]
async fn navigation_flow_tests_same_push_twice_does_not_grow_history() {
    let mut harness = harness_at_home();

    harness
        .coordinator
        .dispatch(Intent::OpenHistory)
        .expect("history should open");
    harness
        .coordinator
        .dispatch(Intent::OpenHistory)
        .expect("history should open again");

    assert_eq!(harness.coordinator.history().len(), 1);
    assert_eq!(harness.coordinator.current(), &Screen::History);
}

#[tokio::test]
async fn navigation_flow_tests_back_restores_previous_push() {
    let mut harness = harness_at_home();
    let target = file("report", 10_000);
    reach_preset_select(&mut harness, &target).await;
    harness
        .coordinator
        .dispatch(Intent::OpenSettings)
        .expect("settings should open");
    assert_eq!(harness.coordinator.history().len(), 3);

    harness.coordinator.dispatch(Intent::Back).expect("back should work");

    assert_eq!(harness.coordinator.history().len(), 2);
    assert_eq!(
        harness.coordinator.current(),
        &Screen::PresetSelect {
            file: target.clone(),
            analysis: analysis_for(&target),
        }
    );
}

#[tokio::test]
async fn navigation_flow_tests_back_to_analyze_reruns_analysis() {
    let mut harness = harness_at_home();
    let target = file("report", 10_000);
    reach_preset_select(&mut harness, &target).await;
    assert_eq!(harness.service.analyze_calls(), 1);

    harness.coordinator.dispatch(Intent::Back).expect("back should work");
    assert_eq!(harness.coordinator.current(), &Screen::Analyze { file: target.clone() });
    assert!(harness.coordinator.run_in_flight().is_some());

    harness.coordinator.await_run().await.expect("analysis should apply");
    assert_eq!(harness.service.analyze_calls(), 2);
    assert_eq!(harness.coordinator.history().len(), 2);
}

#[tokio::test]
async fn navigation_flow_tests_go_home_clears_history_from_any_depth() {
    let mut harness = harness_at_home();
    let target = file("report", 10_000);
    reach_preset_select(&mut harness, &target).await;
    harness
        .coordinator
        .dispatch(Intent::ConfirmPreset(common::preset("balanced")))
        .expect("preset should confirm");
    harness.coordinator.await_run().await.expect("compression should apply");
    harness
        .coordinator
        .dispatch(Intent::OpenHistory)
        .expect("history should open");
    assert_eq!(harness.coordinator.history().len(), 5);

    harness.coordinator.dispatch(Intent::GoHome).expect("go home should work");

    assert!(harness.coordinator.history().is_empty());
    assert_eq!(harness.coordinator.current(), &Screen::Home);
    assert!(harness.coordinator.run_in_flight().is_none());
}

#[tokio::test]
async fn navigation_flow_tests_back_from_result_skips_idle_progress() {
    let mut harness = harness_at_home();
    let target = file("report", 10_000);
    reach_preset_select(&mut harness, &target).await;
    harness
        .coordinator
        .dispatch(Intent::ConfirmPreset(common::preset("balanced")))
        .expect("preset should confirm");
    harness.coordinator.await_run().await.expect("compression should apply");
    assert!(matches!(harness.coordinator.current(), Screen::Result { .. }));

    harness.coordinator.dispatch(Intent::Back).expect("back should work");

    assert_eq!(harness.coordinator.current().key(), ScreenKey::PresetSelect {
        file_id: "report".to_string()
    });
    assert_eq!(harness.service.compress_calls(), 1);
}

#[tokio::test]
async fn navigation_flow_tests_deep_linked_preset_select_falls_back_to_analyze() {
    let mut harness = harness_at_home();
    let target = file("linked", 10_000);
    harness
        .coordinator
        .dispatch(Intent::DeepLink(Screen::PresetSelect {
            file: target.clone(),
            analysis: analysis_for(&target),
        }))
        .expect("deep link should apply");
    assert!(harness.coordinator.history().is_empty());

    harness.coordinator.dispatch(Intent::Back).expect("back should work");
    assert_eq!(harness.coordinator.current(), &Screen::Analyze { file: target });

    harness.coordinator.dispatch(Intent::Back).expect("back should work");
    assert_eq!(harness.coordinator.current(), &Screen::Home);
    assert!(harness.coordinator.run_in_flight().is_none());
}
