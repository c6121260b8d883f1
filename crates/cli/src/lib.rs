//! `netsieve-cli`: run orchestration and the exit-code contract for the
//! `netsieve` binary.

pub mod exit_codes;
pub mod orchestrator;

pub use orchestrator::{CancelFlag, FatalError, Orchestrator, RunRequest};
