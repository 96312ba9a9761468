#![warn(missing_docs)]
//! # squeeze-core
//!
//! ## Purpose
//! Defines the pure data model shared by every `squeeze` workflow component.
//!
//! ## Responsibilities
//! - Represent picked files, their analysis, compression presets, and results.
//! - Represent the read-only subscription snapshot consulted by the gate.
//! - Ship the built-in preset catalog and the preset recommendation rule.
//!
//! ## Data flow
//! The host picks a file and builds a [`FileInfo`]. The compression service
//! derives an [`AnalysisResult`] from it; the user picks a
//! [`CompressionPreset`]; a successful run produces a [`CompressionResult`].
//! [`SubscriptionStatus`] is produced externally and only read here.
//!
//! ## Ownership and lifetimes
//! Every value owns its strings and locators so snapshots can cross the
//! worker/coordinator boundary without borrowing from either side.
//! [`FileInfo`] and [`CompressionResult`] keep private fields and expose
//! accessors only; they are immutable once constructed.
//!
//! ## Error model
//! Constructor validation failures return [`CoreError`] variants. An empty or
//! anonymous file is a user input error, not a programming error.
//!
//! ## Example
//! ```rust
//! use squeeze_core::{FileCategory, FileInfo};
//! use url::Url;
//!
//! let source = Url::parse("file:///tmp/report.pdf").unwrap();
//! let file = FileInfo::new("file-1", "report.pdf", source, 2_000_000, Some(12)).unwrap();
//! assert_eq!(file.category(), FileCategory::Pdf);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Broad file family used for analysis and preset recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    /// Portable document format.
    Pdf,
    /// Raster image.
    Image,
    /// Video container.
    Video,
    /// Office or text document.
    Document,
    /// Anything the classifier does not recognize.
    Unknown,
}

impl FileCategory {
    /// Classifies a file by its extension (case-insensitive, without dot).
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim().to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "jpg" | "jpeg" | "png" | "heic" | "heif" | "webp" | "gif" | "tif" | "tiff" | "bmp" => {
                Self::Image
            }
            "mp4" | "mov" | "m4v" | "avi" | "mkv" | "webm" | "3gp" => Self::Video,
            "doc" | "docx" | "ppt" | "pptx" | "xls" | "xlsx" | "pages" | "key" | "numbers"
            | "txt" | "rtf" => Self::Document,
            _ => Self::Unknown,
        }
    }

    /// Classifies a file from the extension of a name or path.
    pub fn from_name(name: &str) -> Self {
        name.rsplit_once('.')
            .map(|(_, extension)| Self::from_extension(extension))
            .unwrap_or(Self::Unknown)
    }
}

/// Immutable description of one picked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    id: String,
    display_name: String,
    source: Url,
    size_bytes: u64,
    page_count: Option<u32>,
    category: FileCategory,
}

impl FileInfo {
    /// Constructs a validated file description.
    ///
    /// The category is derived from the display name, falling back to the
    /// last path segment of `source`.
    ///
    /// # Errors
    /// Returns [`CoreError::BlankField`] when `id` or `display_name` is blank.
    /// Returns [`CoreError::EmptyFile`] when `size_bytes == 0`.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        source: Url,
        size_bytes: u64,
        page_count: Option<u32>,
    ) -> Result<Self, CoreError> {
        let display_name = display_name.into();
        let mut category = FileCategory::from_name(&display_name);
        if category == FileCategory::Unknown
            && let Some(segment) = source.path_segments().and_then(|mut segments| segments.next_back())
        {
            category = FileCategory::from_name(segment);
        }

        Self::with_category(id, display_name, source, size_bytes, page_count, category)
    }

    /// Constructs a validated file description with an explicit category.
    ///
    /// # Errors
    /// Same as [`FileInfo::new`].
    pub fn with_category(
        id: impl Into<String>,
        display_name: impl Into<String>,
        source: Url,
        size_bytes: u64,
        page_count: Option<u32>,
        category: FileCategory,
    ) -> Result<Self, CoreError> {
        let id = id.into();
        let display_name = display_name.into();
        if id.trim().is_empty() {
            return Err(CoreError::BlankField("file id"));
        }
        if display_name.trim().is_empty() {
            return Err(CoreError::BlankField("display name"));
        }
        if size_bytes == 0 {
            return Err(CoreError::EmptyFile(display_name));
        }

        Ok(Self {
            id,
            display_name,
            source,
            size_bytes,
            page_count,
            category,
        })
    }

    /// Stable opaque identity of the file.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Locator the compression service reads from.
    pub fn source(&self) -> &Url {
        &self.source
    }

    /// File size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Page count when known (documents only).
    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    /// File family.
    pub fn category(&self) -> FileCategory {
        self.category
    }
}

/// How much visual content the file carries per page/frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentDensity {
    /// Mostly text or flat color.
    Low,
    /// Mixed content.
    Medium,
    /// Image-heavy or high-bitrate content.
    High,
}

/// Enumerated estimate of achievable savings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsPotential {
    /// Little to gain; the file is already lean.
    Minimal,
    /// Modest savings expected.
    Low,
    /// Noticeable savings expected.
    Moderate,
    /// Large savings expected.
    High,
}

/// Read-only facts derived from one [`FileInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Identity of the analyzed file.
    pub file_id: String,
    /// Page count for paged documents.
    pub page_count: Option<u32>,
    /// Number of embedded images (or 1 for a single image file).
    pub image_count: u32,
    /// Content density classification.
    pub density: ContentDensity,
    /// Savings estimate.
    pub savings_potential: SavingsPotential,
    /// `true` when the file appears to be compressed already.
    pub already_optimized: bool,
    /// Estimated output size with the recommended preset, when known.
    pub estimated_output_bytes: Option<u64>,
}

impl AnalysisResult {
    /// Returns `true` when this analysis was produced for `file`.
    pub fn belongs_to(&self, file: &FileInfo) -> bool {
        self.file_id == file.id()
    }
}

/// Quality tier applied by a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Visually lossless.
    Maximum,
    /// Light compression.
    High,
    /// Default trade-off.
    Balanced,
    /// Smallest output, visible quality loss allowed.
    Small,
}

/// One user-selectable compression configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionPreset {
    /// Stable preset identity.
    pub id: String,
    /// Short display name.
    pub name: String,
    /// Human-readable descriptor.
    pub description: String,
    /// Optional output size target in bytes.
    pub target_size_bytes: Option<u64>,
    /// Quality tier.
    pub quality: QualityTier,
    /// `true` when the preset requires a premium entitlement.
    pub gated: bool,
}

impl CompressionPreset {
    fn builtin(
        id: &str,
        name: &str,
        description: &str,
        target_size_bytes: Option<u64>,
        quality: QualityTier,
        gated: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            target_size_bytes,
            quality,
            gated,
        }
    }
}

/// Identity of the default free preset.
pub const BALANCED_PRESET_ID: &str = "balanced";

/// Returns the built-in preset catalog in display order.
pub fn builtin_presets() -> Vec<CompressionPreset> {
    vec![
        CompressionPreset::builtin(
            BALANCED_PRESET_ID,
            "Balanced",
            "Good quality with solid savings",
            None,
            QualityTier::Balanced,
            false,
        ),
        CompressionPreset::builtin(
            "high-quality",
            "High quality",
            "Light compression, keeps detail",
            None,
            QualityTier::High,
            false,
        ),
        CompressionPreset::builtin(
            "email",
            "Email",
            "Fits common 25 MB attachment limits",
            Some(25 * 1_000_000),
            QualityTier::Balanced,
            false,
        ),
        CompressionPreset::builtin(
            "maximum",
            "Maximum savings",
            "Smallest file, visible quality loss",
            None,
            QualityTier::Small,
            true,
        ),
        CompressionPreset::builtin(
            "messaging",
            "Messaging",
            "Fits 16 MB messenger limits",
            Some(16 * 1_000_000),
            QualityTier::Small,
            true,
        ),
    ]
}

/// Picks the catalog preset id recommended for an analysis.
///
/// Lean files get the light preset, high-potential files the default one.
pub fn recommended_preset(analysis: &AnalysisResult) -> &'static str {
    if analysis.already_optimized {
        return "high-quality";
    }

    match analysis.savings_potential {
        SavingsPotential::Minimal | SavingsPotential::Low => "high-quality",
        SavingsPotential::Moderate | SavingsPotential::High => BALANCED_PRESET_ID,
    }
}

/// Output of one successful compression run. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionResult {
    id: String,
    file_id: String,
    preset_id: String,
    original_size_bytes: u64,
    output: Url,
    output_size_bytes: u64,
    savings_percent: u8,
    completed_at_ms: u64,
}

impl CompressionResult {
    /// Builds a result and derives its savings percentage.
    ///
    /// # Errors
    /// Returns [`CoreError::BlankField`] when `id` or `preset_id` is blank.
    pub fn new(
        id: impl Into<String>,
        file: &FileInfo,
        preset_id: impl Into<String>,
        output: Url,
        output_size_bytes: u64,
        completed_at_ms: u64,
    ) -> Result<Self, CoreError> {
        let id = id.into();
        let preset_id = preset_id.into();
        if id.trim().is_empty() {
            return Err(CoreError::BlankField("result id"));
        }
        if preset_id.trim().is_empty() {
            return Err(CoreError::BlankField("preset id"));
        }

        Ok(Self {
            id,
            file_id: file.id().to_string(),
            preset_id,
            original_size_bytes: file.size_bytes(),
            output,
            output_size_bytes,
            savings_percent: savings_percent(file.size_bytes(), output_size_bytes),
            completed_at_ms,
        })
    }

    /// Returns `true` when this result was produced from `file`.
    pub fn belongs_to(&self, file: &FileInfo) -> bool {
        self.file_id == file.id()
    }

    /// Stable result identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identity of the originating file.
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Identity of the preset that produced this result.
    pub fn preset_id(&self) -> &str {
        &self.preset_id
    }

    /// Input size in bytes.
    pub fn original_size_bytes(&self) -> u64 {
        self.original_size_bytes
    }

    /// Locator of the compressed output.
    pub fn output(&self) -> &Url {
        &self.output
    }

    /// Output size in bytes.
    pub fn output_size_bytes(&self) -> u64 {
        self.output_size_bytes
    }

    /// Savings in whole percent, `0` when the output did not shrink.
    pub fn savings_percent(&self) -> u8 {
        self.savings_percent
    }

    /// Bytes saved, `0` when the output did not shrink.
    pub fn bytes_saved(&self) -> u64 {
        self.original_size_bytes
            .saturating_sub(self.output_size_bytes)
    }

    /// Completion time in Unix epoch milliseconds.
    pub fn completed_at_ms(&self) -> u64 {
        self.completed_at_ms
    }
}

fn savings_percent(original: u64, output: u64) -> u8 {
    if original == 0 || output >= original {
        return 0;
    }

    let saved = u128::from(original - output);
    (saved * 100 / u128::from(original)) as u8
}

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Free tier with size and daily limits.
    Free,
    /// Recurring premium subscription.
    Pro,
    /// One-time premium purchase.
    Lifetime,
}

/// Free-tier usage counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    /// Runs used in the current window.
    pub used: u32,
    /// Runs allowed per window.
    pub limit: u32,
}

impl UsageCounter {
    /// Returns `true` when no runs remain in the current window.
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    /// Remaining runs in the current window.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }
}

/// Read-only subscription snapshot owned by the subscription collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    /// Plan tier.
    pub plan: PlanTier,
    /// Whether the plan is currently active.
    pub active: bool,
    /// Absolute expiry in Unix epoch milliseconds, when the plan expires.
    pub expires_at_ms: Option<u64>,
    /// Free-tier usage counters.
    pub usage: UsageCounter,
}

impl SubscriptionStatus {
    /// Free-tier status with `used` of `limit` daily runs consumed.
    pub fn free(used: u32, limit: u32) -> Self {
        Self {
            plan: PlanTier::Free,
            active: true,
            expires_at_ms: None,
            usage: UsageCounter { used, limit },
        }
    }

    /// Active premium status without expiry.
    pub fn premium(plan: PlanTier) -> Self {
        Self {
            plan,
            active: true,
            expires_at_ms: None,
            usage: UsageCounter { used: 0, limit: 0 },
        }
    }

    /// Returns `true` when premium features are unlocked at `now_ms`.
    pub fn has_premium_access(&self, now_ms: u64) -> bool {
        if self.plan == PlanTier::Free || !self.active {
            return false;
        }

        self.expires_at_ms
            .map(|expires_at_ms| now_ms < expires_at_ms)
            .unwrap_or(true)
    }
}

/// Error type for data model validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A mandatory identity or label was blank.
    #[error("{0} must not be blank")]
    BlankField(&'static str),
    /// The picked file has no content.
    #[error("file '{0}' is empty or unreadable")]
    EmptyFile(String),
}
