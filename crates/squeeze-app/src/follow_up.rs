//! Follow-up rules evaluated after a successful compression.
//!
//! These rules sit outside the transition table: they only choose which
//! standalone screen, if any, covers the freshly pushed result.

use squeeze_navigation::Screen;

use crate::collaborators::UserProgress;
use crate::config::CoordinatorConfig;

/// Standalone screen shown after a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    /// Commitment prompt after the first success.
    Commitment,
    /// App-store rating request.
    RatingRequest,
}

impl FollowUp {
    /// Standalone screen for this follow-up.
    pub fn screen(&self) -> Screen {
        match self {
            Self::Commitment => Screen::Commitment,
            Self::RatingRequest => Screen::RatingRequest,
        }
    }
}

/// Picks the follow-up for a success.
///
/// `progress.successful_runs` must already include the success being
/// evaluated.
pub fn follow_up_after_success(
    progress: &UserProgress,
    total_bytes_saved: u64,
    config: &CoordinatorConfig,
) -> Option<FollowUp> {
    if progress.successful_runs == 1 && !progress.commitment_shown {
        return Some(FollowUp::Commitment);
    }

    if progress.rating_requested {
        return None;
    }

    let enough_runs = progress.successful_runs >= config.rating_prompt_after_successes;
    let milestone = total_bytes_saved >= config.savings_milestone_bytes;
    (enough_runs || milestone).then_some(FollowUp::RatingRequest)
}
