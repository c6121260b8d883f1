//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `netsieve` exit codes.
//! Batch jobs and schedulers branch on them, so they are part of the contract.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success: every model that had input produced its outputs       |
//! | 1    | Partial: some model failed, the rest of the run completed      |
//! | 2    | Usage error (bad arguments, unknown model id)                  |
//! | 3    | Fatal I/O: input directory missing, output not writable        |
//! | 4    | Catalog or settings file unreadable or invalid                 |
//! | 5    | No input: nothing was processed by any model                   |
//! | 130  | Cancelled by interrupt                                         |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below with the condition that triggers it
//! 2. Update the table above
//! 3. Map it in `run_exit_code` or `fatal_exit_code`

use netsieve_engine::RunStatus;

use crate::orchestrator::FatalError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - every requested model with input succeeded.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown model id.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run outcome (1, 3-5)
// =============================================================================

/// At least one model failed, or an explicitly requested model matched files
/// but none of them could be processed.
pub const EXIT_PARTIAL: u8 = 1;

/// Input directory missing or output directory not writable.
pub const EXIT_FATAL_IO: u8 = 3;

/// Model catalog or run settings could not be read or parsed.
pub const EXIT_CONFIG: u8 = 4;

/// No file was processed by any model.
pub const EXIT_NO_INPUT: u8 = 5;

// =============================================================================
// Signals
// =============================================================================

/// Interrupted (128 + SIGINT).
pub const EXIT_CANCELLED: u8 = 130;

/// Exit code for a completed run.
pub fn run_exit_code(status: RunStatus) -> u8 {
    match status {
        RunStatus::Success => EXIT_SUCCESS,
        RunStatus::Partial => EXIT_PARTIAL,
        RunStatus::NoInput => EXIT_NO_INPUT,
        RunStatus::Cancelled => EXIT_CANCELLED,
    }
}

/// Exit code for a run that aborted before any model ran.
pub fn fatal_exit_code(err: &FatalError) -> u8 {
    match err {
        FatalError::UnknownModel(_) => EXIT_USAGE,
        FatalError::InputMissing(_) | FatalError::OutputNotWritable { .. } => EXIT_FATAL_IO,
        FatalError::WorkerPool(_) => EXIT_ERROR,
    }
}
