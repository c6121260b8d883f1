use std::collections::BTreeMap;
use std::fmt;

use crate::config::{ModelConfig, TextCase};
use crate::record::{ExtractedRecord, FieldValue, RawRecord};

/// Why a record was not accepted. An ordinary value, counted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingRequiredField(String),
    ValidationFailed { field: String, rule: String },
}

impl RejectReason {
    /// Key used in reject counters: `missing:COD_FTTB`, `invalid:NR_FIRE`.
    pub fn counter_key(&self) -> String {
        match self {
            Self::MissingRequiredField(field) => format!("missing:{field}"),
            Self::ValidationFailed { field, .. } => format!("invalid:{field}"),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequiredField(field) => write!(f, "missing required field {field}"),
            Self::ValidationFailed { field, rule } => {
                write!(f, "field {field} failed validation ({rule})")
            }
        }
    }
}

/// Build the model's output record from one raw record.
///
/// Required fields must be present and valid. Optional fields that are absent
/// or fail their rule are left out of the output.
pub fn extract(record: &RawRecord, model: &ModelConfig) -> Result<ExtractedRecord, RejectReason> {
    let mut fields = Vec::with_capacity(model.fields.len());

    for spec in &model.fields {
        let Some(raw) = record.properties.lookup(&spec.sources) else {
            if spec.required {
                return Err(RejectReason::MissingRequiredField(spec.name.clone()));
            }
            continue;
        };

        let text = match spec.case {
            TextCase::Upper => raw.to_uppercase(),
            TextCase::Keep => raw.to_string(),
        };

        let value = match &spec.rule {
            None => FieldValue::Text(text),
            Some(rule) => match rule.check(&text) {
                Some(value) => value,
                None if spec.required => {
                    return Err(RejectReason::ValidationFailed {
                        field: spec.name.clone(),
                        rule: rule.to_string(),
                    });
                }
                None => {
                    log::debug!(
                        "{}: optional field {} dropped, '{}' fails {}",
                        model.id,
                        spec.name,
                        text,
                        rule
                    );
                    continue;
                }
            },
        };

        fields.push((spec.name.clone(), value));
    }

    Ok(ExtractedRecord {
        fields,
        geometry: record.geometry.clone(),
    })
}

/// Outcome of extracting every record of one file.
#[derive(Debug, Clone, Default)]
pub struct FileExtraction {
    pub accepted: Vec<ExtractedRecord>,
    pub rejected: BTreeMap<String, usize>,
}

impl FileExtraction {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

pub fn extract_all(records: &[RawRecord], model: &ModelConfig) -> FileExtraction {
    let mut out = FileExtraction::default();
    for (index, record) in records.iter().enumerate() {
        match extract(record, model) {
            Ok(extracted) => out.accepted.push(extracted),
            Err(reason) => {
                log::debug!("{}: record {index} rejected: {reason}", model.id);
                *out.rejected.entry(reason.counter_key()).or_insert(0) += 1;
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
