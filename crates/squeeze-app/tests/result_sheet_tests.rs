//! Integration tests for sheets offered on the result screen.

mod common;

use common::{file, harness_at_home, preset, reach_preset_select};
use squeeze_app::Intent;
use squeeze_navigation::Screen;
use squeeze_overlay::OverlayKind;

#[tokio::test]
async fn result_sheet_tests_sheets_are_exclusive_and_close_on_back() {
    let mut harness = harness_at_home();
    reach_preset_select(&mut harness, &file("report", 10_000)).await;
    harness
        .coordinator
        .dispatch(Intent::ConfirmPreset(preset("email")))
        .expect("confirm should dispatch");
    harness.coordinator.await_run().await.expect("run should apply");

    harness.coordinator.dispatch(Intent::ShareResult).expect("share should open");
    harness.coordinator.dispatch(Intent::SaveResult).expect("save should open");
    let overlays = harness.coordinator.snapshot().overlays;
    assert!(overlays.save_dialog_visible);
    assert!(!overlays.share_sheet_visible);

    harness.coordinator.dispatch(Intent::Back).expect("back should dispatch");
    assert!(!harness.coordinator.overlays().is_visible(OverlayKind::SaveDialog));
    assert!(matches!(harness.coordinator.current(), Screen::Result { .. }));
}

#[tokio::test]
async fn result_sheet_tests_file_picker_failure_shows_alert_on_home() {
    let mut harness = harness_at_home();
    harness
        .coordinator
        .dispatch(Intent::OpenFilePicker)
        .expect("picker should open");
    assert!(harness.coordinator.overlays().is_visible(OverlayKind::FilePicker));

    harness
        .coordinator
        .dispatch(Intent::FilePickFailed {
            message: "permission denied".to_string(),
        })
        .expect("failure should dispatch");

    assert!(!harness.coordinator.overlays().is_visible(OverlayKind::FilePicker));
    let alert = harness
        .coordinator
        .snapshot()
        .overlays
        .error_alert
        .expect("alert should be visible");
    assert!(alert.message.contains("permission denied"));
    assert_eq!(harness.coordinator.current(), &Screen::Home);
}
