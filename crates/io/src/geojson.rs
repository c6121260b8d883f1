use std::path::Path;

use netsieve_engine::{ExtractedRecord, PropertyBag, RawRecord};
use serde_json::{Map, Value};

use crate::decode::{decode_with, TextEncoding};
use crate::error::FileError;

/// Records of one input file plus what the decoder learned about it.
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub records: Vec<RawRecord>,
    pub encoding: TextEncoding,
    /// Property names of the first feature, as written in the file.
    pub header_names: Vec<String>,
}

/// Parse a feature collection. Features that are not objects are skipped;
/// a missing geometry becomes `null` and missing properties an empty bag.
pub fn parse_feature_collection(text: &str) -> Result<(Vec<RawRecord>, Vec<String>), String> {
    let doc: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))?;
    let Value::Object(mut doc) = doc else {
        return Err("top level is not an object".into());
    };
    match doc.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {}
        Some(other) => return Err(format!("type is '{other}', expected FeatureCollection")),
        None => return Err("missing \"type\"".into()),
    }
    let Some(Value::Array(features)) = doc.remove("features") else {
        return Err("missing \"features\" array".into());
    };

    let mut header_names = None;
    let mut records = Vec::with_capacity(features.len());
    for (index, feature) in features.into_iter().enumerate() {
        let Value::Object(mut feature) = feature else {
            log::debug!("feature {index} is not an object, skipped");
            continue;
        };
        let properties = match feature.remove("properties") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let bag = PropertyBag::from_json(&properties);
        if header_names.is_none() {
            header_names = Some(bag.names().to_vec());
        }
        records.push(RawRecord {
            properties: bag,
            geometry: feature.remove("geometry").unwrap_or(Value::Null),
        });
    }

    Ok((records, header_names.unwrap_or_default()))
}

/// Read, decode and parse one file. The handle is closed before returning.
pub fn read_feature_file(path: &Path) -> Result<DecodedFile, FileError> {
    let bytes = std::fs::read(path).map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let ((records, header_names), encoding) =
        decode_with(&bytes, parse_feature_collection).map_err(|source| FileError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(DecodedFile {
        records,
        encoding,
        header_names,
    })
}

/// Serialize records as a single-line feature collection.
pub fn to_compact_string(name: &str, records: &[ExtractedRecord]) -> String {
    let mut doc = Map::new();
    doc.insert("type".into(), Value::String("FeatureCollection".into()));
    doc.insert("name".into(), Value::String(name.to_string()));
    doc.insert(
        "features".into(),
        Value::Array(records.iter().map(ExtractedRecord::to_feature).collect()),
    );
    Value::Object(doc).to_string()
}
