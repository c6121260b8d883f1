//! `netsieve-engine`: config-driven engine for network-asset feature files.
//!
//! Pure engine crate: routes file names to models, validates records,
//! removes duplicates and assembles ordered outputs. No filesystem access.

pub mod assemble;
pub mod config;
pub mod dedup;
pub mod detect;
pub mod error;
pub mod extract;
pub mod record;
pub mod rules;
pub mod session;
pub mod summary;

pub use assemble::{AssembledOutput, IndividualFile, ManifestEntry, OutputAssembler};
pub use config::{Catalog, ModelConfig, OutputMode, RouteDecision};
pub use dedup::{DuplicateDetector, Fingerprint};
pub use detect::detect;
pub use error::ConfigError;
pub use extract::{extract, RejectReason};
pub use record::{ExtractedRecord, FieldValue, PropertyBag, RawRecord};
pub use session::{prepare_file, FileOutcome, ModelSession, SessionOptions};
pub use summary::{ModelRunResult, ModelStatus, RunStatus, RunSummary, SkipCause};
