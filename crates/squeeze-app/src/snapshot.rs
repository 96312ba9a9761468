//! Read-only projection consumed by the presentation layer.

use serde::Serialize;
use squeeze_navigation::{Screen, ScreenKey};
use squeeze_overlay::OverlaySnapshot;
use squeeze_pipeline::{RetryState, RunTag};

/// Serializable coordinator state.
///
/// Matches `contracts/coordinator-snapshot.schema.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorSnapshot {
    /// Build version.
    pub version: String,
    /// Visible screen with its payload.
    pub current: Screen,
    /// Standalone-layer projection.
    pub standalone: Option<ScreenKey>,
    /// Stacked-layer projection in push order.
    pub stack: Vec<ScreenKey>,
    /// Overlay projection.
    pub overlays: OverlaySnapshot,
    /// Progress of the run in flight.
    pub progress: Option<f32>,
    /// Retry bookkeeping.
    pub retry: RetryState,
    /// Run in flight.
    pub run_in_flight: Option<RunTag>,
}
