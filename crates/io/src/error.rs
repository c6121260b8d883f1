use std::io;
use std::path::PathBuf;

use netsieve_engine::SkipCause;
use thiserror::Error;

use crate::decode::TextEncoding;

/// Every encoding in the trial list failed for this input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no encoding produced a feature collection ({})", describe(.attempts))]
pub struct DecodeError {
    pub attempts: Vec<(TextEncoding, String)>,
}

fn describe(attempts: &[(TextEncoding, String)]) -> String {
    attempts
        .iter()
        .map(|(enc, why)| format!("{}: {why}", enc.name()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reading one input file failed. The file is skipped; the run continues.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("{}: {source}", path.display())]
    Decode { path: PathBuf, source: DecodeError },
}

impl FileError {
    pub fn skip_cause(&self) -> SkipCause {
        match self {
            Self::Read { .. } => SkipCause::Io,
            Self::Decode { .. } => SkipCause::Decode,
        }
    }
}

/// Writing one output file failed.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot write {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("cannot serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl WriteError {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Io { path, .. } | Self::Serialize { path, .. } => path,
        }
    }
}
