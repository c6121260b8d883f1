use thiserror::Error;

/// Catalog and model configuration errors.
///
/// `Parse` is document-level: nothing in the catalog can be trusted. Every other
/// variant is scoped to one model and only takes that model out of a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// TOML parse / deserialization error for the whole catalog.
    #[error("catalog parse error: {0}")]
    Parse(String),
    /// A model entry could not be deserialized.
    #[error("model '{model}': {reason}")]
    Malformed { model: String, reason: String },
    /// A model deserialized but failed validation.
    #[error("model '{model}': invalid config: {reason}")]
    Invalid { model: String, reason: String },
    /// The same id was declared more than once.
    #[error("model '{0}' is declared more than once")]
    DuplicateModel(String),
    /// A requested model id is not in the catalog.
    #[error("unknown model: {0}")]
    UnknownModel(String),
}

impl ConfigError {
    pub(crate) fn invalid(model: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            model: model.to_string(),
            reason: reason.into(),
        }
    }
}
