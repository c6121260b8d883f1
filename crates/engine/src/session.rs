use crate::assemble::{AssembledOutput, OutputAssembler};
use crate::config::ModelConfig;
use crate::dedup::{DuplicateDetector, DuplicateKeys, DEFAULT_GEOMETRY_PRECISION};
use crate::extract::{extract_all, FileExtraction};
use crate::record::RawRecord;
use crate::summary::{FileSkip, ModelRunResult, ModelStatus, SkipCause};

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub deduplicate: bool,
    pub precision: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            deduplicate: true,
            precision: DEFAULT_GEOMETRY_PRECISION,
        }
    }
}

/// What happened to one matched file before duplicate detection.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Extracted {
        /// Path relative to the input directory, `/`-separated.
        source: String,
        stem: String,
        encoding: String,
        records_read: usize,
        extraction: FileExtraction,
    },
    Skipped {
        source: String,
        cause: SkipCause,
        detail: String,
    },
}

impl FileOutcome {
    pub fn source(&self) -> &str {
        match self {
            Self::Extracted { source, .. } | Self::Skipped { source, .. } => source,
        }
    }
}

/// Header check plus extraction for one decoded file. Safe to run in parallel.
pub fn prepare_file(
    model: &ModelConfig,
    source: &str,
    stem: &str,
    encoding: &str,
    records: &[RawRecord],
    headers: &[String],
) -> FileOutcome {
    if model.match_headers && !model.headers_match(headers) {
        return FileOutcome::Skipped {
            source: source.to_string(),
            cause: SkipCause::HeaderMismatch,
            detail: format!("required fields of '{}' not found in file properties", model.id),
        };
    }
    FileOutcome::Extracted {
        source: source.to_string(),
        stem: stem.to_string(),
        encoding: encoding.to_string(),
        records_read: records.len(),
        extraction: extract_all(records, model),
    }
}

/// One model's run: owns the seen set and the assembler.
///
/// Files must be ingested in a fixed order (sorted source path) for the
/// output to be reproducible; extraction itself may happen in any order.
pub struct ModelSession<'m> {
    model: &'m ModelConfig,
    detector: DuplicateDetector,
    assembler: OutputAssembler,
    result: ModelRunResult,
}

impl<'m> ModelSession<'m> {
    pub fn new(model: &'m ModelConfig, options: SessionOptions) -> Self {
        Self {
            model,
            detector: DuplicateDetector::new(
                DuplicateKeys::for_model(model, options.precision),
                options.deduplicate,
            ),
            assembler: OutputAssembler::new(model),
            result: ModelRunResult::new(&model.id),
        }
    }

    pub fn model(&self) -> &ModelConfig {
        self.model
    }

    /// Record how many files were looked at and how many routed here.
    pub fn set_candidates(&mut self, seen: usize, matched: usize) {
        self.result.files_seen = seen;
        self.result.files_matched = matched;
    }

    pub fn ingest(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Skipped {
                source,
                cause,
                detail,
            } => self.skip_file(&source, cause, &detail),
            FileOutcome::Extracted {
                source,
                stem,
                encoding,
                records_read,
                extraction,
            } => {
                let r = &mut self.result;
                r.files_processed += 1;
                r.records_read += records_read;
                *r.encodings.entry(encoding).or_insert(0) += 1;
                r.records_rejected += extraction.rejected_total();
                for (reason, count) in extraction.rejected {
                    *r.rejected_by_reason.entry(reason).or_insert(0) += count;
                }

                let locality = self.model.source_locality(&stem);
                self.assembler.begin_source(&stem, &locality);

                let mut duplicates = 0;
                for record in extraction.accepted {
                    if self.detector.check(&record) {
                        duplicates += 1;
                    } else {
                        self.assembler.push(record);
                    }
                }
                if duplicates > 0 {
                    log::debug!("{}: {duplicates} duplicate(s) in {source}", self.model.id);
                    self.result.duplicates_skipped += duplicates;
                    *self.result.duplicates_by_file.entry(source).or_insert(0) += duplicates;
                }
            }
        }
    }

    pub fn skip_file(&mut self, source: &str, cause: SkipCause, detail: &str) {
        if cause != SkipCause::Cancelled {
            log::warn!("{}: skipping {source}: {detail}", self.model.id);
        }
        self.result.files_skipped += 1;
        self.result.skipped.push(FileSkip {
            file: source.to_string(),
            cause,
            detail: detail.to_string(),
        });
    }

    pub fn finish(self) -> (AssembledOutput, ModelRunResult) {
        let mut result = self.result;
        result.records_accepted = self.assembler.len();
        // files refused by the header check were never this model's input
        let unconfirmed = result
            .skipped
            .iter()
            .all(|s| s.cause == SkipCause::HeaderMismatch);
        result.status = if result.files_processed > 0 {
            ModelStatus::Succeeded
        } else if result.files_matched == 0 || unconfirmed {
            ModelStatus::NoInput
        } else {
            ModelStatus::Failed
        };
        if result.status == ModelStatus::Failed {
            result.errors.push(format!(
                "none of the {} matched file(s) could be processed",
                result.files_matched
            ));
        }
        (self.assembler.finalize(), result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
