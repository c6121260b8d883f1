use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Per-model result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// All matched files were handled and every output was written.
    Succeeded,
    /// No file matched the model.
    NoInput,
    /// Outputs are incomplete: an individual write failed, the run was
    /// cancelled, or none of the model's files could be read.
    Partial,
    /// The model produced no usable output.
    Failed,
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::NoInput => write!(f, "no_input"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipCause {
    Decode,
    Io,
    HeaderMismatch,
    Cancelled,
}

impl fmt::Display for SkipCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => write!(f, "decode"),
            Self::Io => write!(f, "io"),
            Self::HeaderMismatch => write!(f, "header_mismatch"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSkip {
    pub file: String,
    pub cause: SkipCause,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelRunResult {
    pub model: String,
    pub status: ModelStatus,
    pub files_seen: usize,
    pub files_matched: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub records_read: usize,
    pub records_accepted: usize,
    pub records_rejected: usize,
    pub rejected_by_reason: BTreeMap<String, usize>,
    pub duplicates_skipped: usize,
    pub duplicates_by_file: BTreeMap<String, usize>,
    pub encodings: BTreeMap<String, usize>,
    pub skipped: Vec<FileSkip>,
    pub outputs: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl ModelRunResult {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            status: ModelStatus::NoInput,
            files_seen: 0,
            files_matched: 0,
            files_processed: 0,
            files_skipped: 0,
            records_read: 0,
            records_accepted: 0,
            records_rejected: 0,
            rejected_by_reason: BTreeMap::new(),
            duplicates_skipped: 0,
            duplicates_by_file: BTreeMap::new(),
            encodings: BTreeMap::new(),
            skipped: Vec::new(),
            outputs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// A model that could not run at all.
    pub fn failed(model: &str, error: impl Into<String>) -> Self {
        let mut result = Self::new(model);
        result.status = ModelStatus::Failed;
        result.errors.push(error.into());
        result
    }

    pub fn skips_by_cause(&self) -> BTreeMap<SkipCause, usize> {
        let mut out = BTreeMap::new();
        for skip in &self.skipped {
            *out.entry(skip.cause).or_insert(0) += 1;
        }
        out
    }

    /// Downgrade the status; never upgrades.
    pub fn degrade(&mut self, status: ModelStatus, error: impl Into<String>) {
        let rank = |s: ModelStatus| match s {
            ModelStatus::Succeeded | ModelStatus::NoInput => 0,
            ModelStatus::Partial => 1,
            ModelStatus::Failed => 2,
        };
        if rank(status) > rank(self.status) {
            self.status = status;
        }
        self.errors.push(error.into());
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// At least one model failed.
    Partial,
    /// Nothing was processed by any model.
    NoInput,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::NoInput => write!(f, "no_input"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub files_discovered: usize,
    pub files_unrouted: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub records_accepted: usize,
    pub records_rejected: usize,
    pub duplicates_skipped: usize,
    pub outputs: usize,
    pub models_failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub totals: Totals,
    pub models: Vec<ModelRunResult>,
}

impl RunSummary {
    pub fn new(
        models: Vec<ModelRunResult>,
        files_discovered: usize,
        files_unrouted: usize,
        cancelled: bool,
    ) -> Self {
        let mut totals = Totals {
            files_discovered,
            files_unrouted,
            ..Totals::default()
        };
        for m in &models {
            totals.files_processed += m.files_processed;
            totals.files_skipped += m.files_skipped;
            totals.records_accepted += m.records_accepted;
            totals.records_rejected += m.records_rejected;
            totals.duplicates_skipped += m.duplicates_skipped;
            totals.outputs += m.outputs.len();
            if m.status == ModelStatus::Failed {
                totals.models_failed += 1;
            }
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else if totals.files_processed == 0 {
            RunStatus::NoInput
        } else if totals.models_failed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };

        Self {
            status,
            totals,
            models,
        }
    }

    pub fn model(&self, id: &str) -> Option<&ModelRunResult> {
        self.models.iter().find(|m| m.model == id)
    }
}
