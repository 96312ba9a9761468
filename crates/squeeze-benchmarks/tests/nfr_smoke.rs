//! Benchmark smoke test for the synchronous gate/navigation/overlay loop.

use std::time::Instant;

use squeeze_core::{FileInfo, SubscriptionStatus, builtin_presets};
use squeeze_entitlement::{EntitlementPolicy, check};
use squeeze_navigation::{Screen, ScreenStateMachine};
use squeeze_overlay::{Overlay, OverlayManager};
use url::Url;

#[test]
fn benchmark_dispatch_loop_smoke_prints_latency() {
    let files: Vec<FileInfo> = (0..16_u64)
        .map(|index| {
            FileInfo::new(
                format!("file-{index}"),
                format!("scan-{index}.pdf"),
                Url::parse(&format!("file:///docs/scan-{index}.pdf")).expect("url should parse"),
                (index + 1) * 1_000_000,
                Some(4),
            )
            .expect("file should be valid")
        })
        .collect();
    let presets = builtin_presets();
    let policy = EntitlementPolicy {
        free_tier_max_file_bytes: 8_000_000,
    };
    let status = SubscriptionStatus::free(1, 3);

    let start = Instant::now();
    let mut denials = 0usize;
    let mut max_depth = 0usize;
    let mut navigation = ScreenStateMachine::new();
    let mut overlays = OverlayManager::new();
    navigation.dismiss_standalone();

    for round in 0..10_000_usize {
        let file = &files[round % files.len()];
        let preset = &presets[round % presets.len()];

        if let Some(denial) = check(&status, &policy, file, None, 0)
            .or_else(|| check(&status, &policy, file, Some(preset), 0))
        {
            denials += 1;
            overlays.present(Overlay::Paywall(denial));
            let _ = overlays.snapshot();
            overlays.clear_blocking();
            continue;
        }

        navigation
            .push(Screen::Analyze { file: file.clone() })
            .expect("analyze push should work");
        navigation
            .push(Screen::History)
            .expect("history push should work");
        max_depth = max_depth.max(navigation.stack().len());
        navigation.back(Some(file));
        navigation.back(Some(file));
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_dispatch_elapsed_ms={elapsed_ms}");
    println!("benchmark_dispatch_denials={denials}");

    assert!(navigation.stack().is_empty());
    assert_eq!(max_depth, 2);
    assert!(
        elapsed_ms < 5_000,
        "dispatch smoke benchmark should stay bounded"
    );
}
