#![warn(missing_docs)]
//! # squeeze-entitlement
//!
//! ## Purpose
//! Decides whether the current subscription allows a workflow step.
//!
//! ## Responsibilities
//! - Gate file picks on the free-tier size ceiling and daily usage counter.
//! - Gate preset confirmation on the preset's premium flag.
//! - Provide distinct paywall copy per denial reason.
//!
//! ## Data flow
//! Coordinator intent -> [`check`] with the cached [`SubscriptionStatus`] ->
//! `None` lets the transition proceed, `Some(`[`GateDenial`]`)` routes to the
//! paywall overlay instead.
//!
//! ## Ownership and lifetimes
//! The gate borrows every input and returns an owned denial, so the caller can
//! keep the denial attached to a paywall after the inputs change.
//!
//! ## Error model
//! None. A denial is an expected outcome, never an error.
//!
//! ## Example
//! ```rust
//! use squeeze_core::{FileInfo, SubscriptionStatus};
//! use squeeze_entitlement::{check, DenialReason, EntitlementPolicy};
//! use url::Url;
//!
//! let policy = EntitlementPolicy { free_tier_max_file_bytes: 1_500_000 };
//! let file = FileInfo::new("f", "big.pdf", Url::parse("file:///big.pdf").unwrap(), 2_000_000, None).unwrap();
//! let denial = check(&SubscriptionStatus::free(0, 3), &policy, &file, None, 0).unwrap();
//! assert_eq!(denial.reason, DenialReason::FileSizeLimit);
//! ```

use serde::Serialize;
use squeeze_core::{CompressionPreset, FileInfo, SubscriptionStatus};

/// Default free-tier file size ceiling (25 MiB).
pub const DEFAULT_FREE_TIER_MAX_FILE_BYTES: u64 = 25 * 1024 * 1024;

/// Static limits the gate enforces for free-tier users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementPolicy {
    /// Largest file a free-tier user may pick.
    pub free_tier_max_file_bytes: u64,
}

impl Default for EntitlementPolicy {
    fn default() -> Self {
        Self {
            free_tier_max_file_bytes: DEFAULT_FREE_TIER_MAX_FILE_BYTES,
        }
    }
}

/// Workflow point at which the gate is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    /// Before entering analysis for a picked file.
    FilePick,
    /// Before starting compression with a chosen preset.
    PresetConfirm,
}

/// Why the gate refused a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// File exceeds the free-tier size ceiling.
    FileSizeLimit,
    /// Free-tier daily run allowance is used up.
    DailyLimit,
    /// Preset requires a premium plan.
    FeatureLocked,
}

impl DenialReason {
    /// Paywall headline for this reason.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::FileSizeLimit => "This file is too large for the free plan",
            Self::DailyLimit => "You've used today's free compressions",
            Self::FeatureLocked => "This preset is a premium feature",
        }
    }

    /// Paywall body copy for this reason.
    pub fn message(&self) -> &'static str {
        match self {
            Self::FileSizeLimit => {
                "Upgrade to compress files of any size without limits."
            }
            Self::DailyLimit => {
                "Upgrade for unlimited compressions, or come back tomorrow."
            }
            Self::FeatureLocked => {
                "Upgrade to unlock every preset, including maximum savings."
            }
        }
    }
}

/// Facts that produced a denial, kept for paywall copy and analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialContext {
    /// Stage that denied.
    pub stage: GateStage,
    /// File the intent referred to.
    pub file_id: String,
    /// Preset the intent referred to, for preset-stage denials.
    pub preset_id: Option<String>,
    /// Measured value (bytes or runs used) when the reason is quantitative.
    pub observed: Option<u64>,
    /// Limit the measured value was compared against.
    pub limit: Option<u64>,
}

/// Gate refusal attached to a paywall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateDenial {
    /// Why the step was refused.
    pub reason: DenialReason,
    /// Context of the refusal.
    pub context: DenialContext,
}

/// Evaluates the gate for one step.
///
/// With `preset == None` the file stage is evaluated (size ceiling first,
/// then daily usage). With `Some(preset)` the preset stage is evaluated.
/// Premium access at `now_ms` bypasses every rule.
pub fn check(
    status: &SubscriptionStatus,
    policy: &EntitlementPolicy,
    file: &FileInfo,
    preset: Option<&CompressionPreset>,
    now_ms: u64,
) -> Option<GateDenial> {
    if status.has_premium_access(now_ms) {
        return None;
    }

    match preset {
        None => check_file(status, policy, file),
        Some(preset) => check_preset(file, preset),
    }
}

/// Returns the stage [`check`] evaluates for the given preset argument.
pub fn stage_for(preset: Option<&CompressionPreset>) -> GateStage {
    if preset.is_some() {
        GateStage::PresetConfirm
    } else {
        GateStage::FilePick
    }
}

/// Returns `true` when `denial` still holds for the current inputs.
///
/// A denial holds only when the gate would refuse again with the same reason.
pub fn still_denied(
    denial: &GateDenial,
    status: &SubscriptionStatus,
    policy: &EntitlementPolicy,
    file: &FileInfo,
    preset: Option<&CompressionPreset>,
    now_ms: u64,
) -> bool {
    check(status, policy, file, preset, now_ms)
        .map(|current| current.reason == denial.reason)
        .unwrap_or(false)
}

fn check_file(
    status: &SubscriptionStatus,
    policy: &EntitlementPolicy,
    file: &FileInfo,
) -> Option<GateDenial> {
    if file.size_bytes() > policy.free_tier_max_file_bytes {
        return Some(GateDenial {
            reason: DenialReason::FileSizeLimit,
            context: DenialContext {
                stage: GateStage::FilePick,
                file_id: file.id().to_string(),
                preset_id: None,
                observed: Some(file.size_bytes()),
                limit: Some(policy.free_tier_max_file_bytes),
            },
        });
    }

    if status.usage.is_exhausted() {
        return Some(GateDenial {
            reason: DenialReason::DailyLimit,
            context: DenialContext {
                stage: GateStage::FilePick,
                file_id: file.id().to_string(),
                preset_id: None,
                observed: Some(u64::from(status.usage.used)),
                limit: Some(u64::from(status.usage.limit)),
            },
        });
    }

    None
}

fn check_preset(file: &FileInfo, preset: &CompressionPreset) -> Option<GateDenial> {
    if !preset.gated {
        return None;
    }

    Some(GateDenial {
        reason: DenialReason::FeatureLocked,
        context: DenialContext {
            stage: GateStage::PresetConfirm,
            file_id: file.id().to_string(),
            preset_id: Some(preset.id.clone()),
            observed: None,
            limit: None,
        },
    })
}

#[cfg(test)]
mod tests {
    //! Unit tests for gate rule ordering.

    use squeeze_core::{PlanTier, builtin_presets};
    use url::Url;

    use super::*;

    fn file(size_bytes: u64) -> FileInfo {
        FileInfo::new(
            "file-1",
            "report.pdf",
            Url::parse("file:///report.pdf").expect("url should parse"),
            size_bytes,
            Some(3),
        )
        .expect("file should build")
    }

    #[test]
    fn size_limit_wins_over_daily_limit() {
        let policy = EntitlementPolicy {
            free_tier_max_file_bytes: 100,
        };
        let denial = check(&SubscriptionStatus::free(3, 3), &policy, &file(200), None, 0)
            .expect("gate should deny");
        assert_eq!(denial.reason, DenialReason::FileSizeLimit);
        assert_eq!(denial.context.observed, Some(200));
        assert_eq!(denial.context.limit, Some(100));
    }

    #[test]
    fn premium_bypasses_every_rule() {
        let policy = EntitlementPolicy {
            free_tier_max_file_bytes: 1,
        };
        let status = SubscriptionStatus::premium(PlanTier::Lifetime);
        let gated = builtin_presets()
            .into_iter()
            .find(|preset| preset.gated)
            .expect("catalog should contain a gated preset");

        assert!(check(&status, &policy, &file(500), None, 0).is_none());
        assert!(check(&status, &policy, &file(500), Some(&gated), 0).is_none());
    }

    #[test]
    fn still_denied_requires_same_reason() {
        let policy = EntitlementPolicy::default();
        let exhausted = SubscriptionStatus::free(3, 3);
        let denial = check(&exhausted, &policy, &file(10), None, 0).expect("gate should deny");

        assert!(still_denied(&denial, &exhausted, &policy, &file(10), None, 0));
        assert!(!still_denied(
            &denial,
            &SubscriptionStatus::free(0, 3),
            &policy,
            &file(10),
            None,
            0
        ));
    }

    #[test]
    fn reasons_have_distinct_copy() {
        let reasons = [
            DenialReason::FileSizeLimit,
            DenialReason::DailyLimit,
            DenialReason::FeatureLocked,
        ];
        for (index, left) in reasons.iter().enumerate() {
            for right in &reasons[index + 1..] {
                assert_ne!(left.headline(), right.headline());
                assert_ne!(left.message(), right.message());
            }
        }
    }
}
