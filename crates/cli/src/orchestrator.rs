//! Run orchestration: enumerate input files, route them, drive each model's
//! session and write its outputs.
//!
//! Models run in parallel on a rayon pool, and so do the files of a model up to
//! extraction. Duplicate detection and assembly consume file results in sorted
//! path order, so the output does not depend on scheduling.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use walkdir::WalkDir;

use netsieve_config::RunSettings;
use netsieve_engine::{
    prepare_file, Catalog, FileOutcome, ModelConfig, ModelRunResult, ModelSession, ModelStatus,
    RunSummary, SessionOptions, SkipCause,
};
use netsieve_io::{probe_writable, read_feature_file, write_centralized, write_individual};

/// Errors that abort the whole run before any model output is written.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("input directory {} does not exist or is not a directory", .0.display())]
    InputMissing(PathBuf),

    #[error("output directory {} is not writable: {source}", path.display())]
    OutputNotWritable { path: PathBuf, source: io::Error },

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("cannot start worker pool: {0}")]
    WorkerPool(String),
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Explicit model ids; `None` runs every model in the catalog.
    pub models: Option<Vec<String>>,
}

/// Shared flag; once set, no new file is started.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An input file found under the input directory.
#[derive(Debug, Clone)]
struct SourceFile {
    path: PathBuf,
    /// Relative to the input directory, `/`-separated.
    rel: String,
    name: String,
    stem: String,
}

pub struct Orchestrator {
    catalog: Catalog,
    settings: RunSettings,
    cancel: CancelFlag,
}

impl Orchestrator {
    pub fn new(catalog: Catalog, settings: RunSettings) -> Self {
        Self {
            catalog,
            settings,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn run(&self, request: &RunRequest) -> Result<RunSummary, FatalError> {
        if !request.input.is_dir() {
            return Err(FatalError::InputMissing(request.input.clone()));
        }
        let not_writable = |source: io::Error| FatalError::OutputNotWritable {
            path: request.output.clone(),
            source,
        };
        std::fs::create_dir_all(&request.output).map_err(not_writable)?;
        probe_writable(&request.output).map_err(not_writable)?;

        let selected = self.select_models(request.models.as_deref())?;
        let files = self.enumerate(&request.input, &request.output);
        log::info!("{} input file(s) under {}", files.len(), request.input.display());

        // model id -> indices into `files`, in sorted path order
        let mut assigned: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut unrouted = 0;
        for (index, file) in files.iter().enumerate() {
            let mut routed = false;
            for decision in self.catalog.route(&file.name) {
                if let Some(id) = decision.model {
                    routed = true;
                    if let Some(id) = selected.iter().find(|s| **s == id) {
                        assigned.entry(id.as_str()).or_default().push(index);
                    }
                }
            }
            if !routed {
                log::info!("no model matches {}", file.rel);
                unrouted += 1;
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.effective_workers())
            .build()
            .map_err(|e| FatalError::WorkerPool(e.to_string()))?;

        let empty = Vec::new();
        let results: Vec<ModelRunResult> = pool.install(|| {
            selected
                .par_iter()
                .map(|id| {
                    let matched = assigned.get(id.as_str()).unwrap_or(&empty);
                    let matched: Vec<&SourceFile> = matched.iter().map(|&i| &files[i]).collect();
                    self.run_model(id, &matched, files.len(), &request.output)
                })
                .collect()
        });

        Ok(RunSummary::new(
            results,
            files.len(),
            unrouted,
            self.cancel.is_cancelled(),
        ))
    }

    fn select_models(&self, requested: Option<&[String]>) -> Result<Vec<String>, FatalError> {
        let Some(requested) = requested else {
            return Ok(self.catalog.ids().map(str::to_string).collect());
        };
        let mut selected: Vec<String> = Vec::with_capacity(requested.len());
        for id in requested {
            let id = id.trim();
            if !self.catalog.contains(id) {
                return Err(FatalError::UnknownModel(id.to_string()));
            }
            if !selected.iter().any(|s| s == id) {
                selected.push(id.to_string());
            }
        }
        Ok(selected)
    }

    /// Candidate files sorted by relative path. The output directory is not
    /// descended into when it lives under the input directory.
    fn enumerate(&self, input: &Path, output: &Path) -> Vec<SourceFile> {
        let output = output.canonicalize().ok();
        let walker = WalkDir::new(input).follow_links(true).into_iter().filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().is_dir()
                && output.is_some()
                && entry.path().canonicalize().ok() == output)
        });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("cannot list {}: {err}", err.path().unwrap_or(input).display());
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.settings.accepts_extension(entry.path()) {
                continue;
            }
            let path = entry.path();
            let rel = path
                .strip_prefix(input)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(SourceFile {
                path: path.to_path_buf(),
                rel,
                name: entry.file_name().to_string_lossy().into_owned(),
                stem: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            });
        }
        files.sort_by(|a, b| a.rel.cmp(&b.rel));
        files
    }

    fn run_model(
        &self,
        id: &str,
        files: &[&SourceFile],
        files_seen: usize,
        out: &Path,
    ) -> ModelRunResult {
        let model = match self.catalog.get(id) {
            Ok(model) => model,
            Err(err) => {
                log::error!("{id}: {err}");
                let mut result = ModelRunResult::failed(id, err.to_string());
                result.files_seen = files_seen;
                result.files_matched = files.len();
                return result;
            }
        };

        let outcomes: Vec<FileOutcome> = files.par_iter().map(|file| self.process_file(model, file)).collect();

        let options = SessionOptions {
            deduplicate: self.settings.duplicate_detection,
            precision: self.settings.geometry_precision,
        };
        let mut session = ModelSession::new(model, options);
        session.set_candidates(files_seen, files.len());
        for outcome in outcomes {
            session.ingest(outcome);
        }
        let (output, mut result) = session.finish();

        // an interrupted model writes nothing, even if none of its files ran
        if result.skipped.iter().any(|s| s.cause == SkipCause::Cancelled) {
            result.status = ModelStatus::Partial;
            result
                .errors
                .push("cancelled before all files were processed; outputs not written".into());
            return result;
        }

        match result.status {
            ModelStatus::NoInput => {
                log::debug!("{id}: no matching files");
                return result;
            }
            ModelStatus::Failed => {
                log::error!("{id}: none of {} matched file(s) could be processed", result.files_matched);
                return result;
            }
            _ => {}
        }

        // centralized and individual outputs are written independently
        let file_name = self.settings.centralized_file_name(id);
        let collection = file_name.trim_end_matches(".geojson");
        match write_centralized(out, &file_name, collection, &output.centralized) {
            Ok(path) => result.outputs.push(path),
            Err(err) => {
                log::error!("{id}: {err}");
                result.degrade(ModelStatus::Failed, err.to_string());
            }
        }

        if let Some(individual) = &model.individual {
            let report = write_individual(out, &individual.directory, &self.settings.manifest_name, &output.individual);
            result.outputs.extend(report.written);
            result.outputs.extend(report.manifest);
            for err in report.errors {
                result.degrade(ModelStatus::Partial, err.to_string());
            }
        }

        log::info!(
            "{id}: {} record(s) from {} file(s), {} rejected, {} duplicate(s)",
            result.records_accepted,
            result.files_processed,
            result.records_rejected,
            result.duplicates_skipped
        );
        result
    }

    fn process_file(&self, model: &ModelConfig, file: &SourceFile) -> FileOutcome {
        if self.cancel.is_cancelled() {
            return FileOutcome::Skipped {
                source: file.rel.clone(),
                cause: SkipCause::Cancelled,
                detail: "run cancelled".into(),
            };
        }
        match read_feature_file(&file.path) {
            Ok(decoded) => prepare_file(
                model,
                &file.rel,
                &file.stem,
                decoded.encoding.name(),
                &decoded.records,
                &decoded.header_names,
            ),
            Err(err) => FileOutcome::Skipped {
                source: file.rel.clone(),
                cause: err.skip_cause(),
                detail: err.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
