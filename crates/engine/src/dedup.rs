use std::collections::HashSet;
use std::fmt::Write as _;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::{KeyCase, ModelConfig};
use crate::record::ExtractedRecord;

pub const DEFAULT_GEOMETRY_PRECISION: usize = 7;

const UNIT_SEP: &[u8] = b"\x1f";
const RECORD_SEP: &[u8] = b"\x1e";

/// SHA-256 identity of a record within one model run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

pub type SeenSet = HashSet<Fingerprint>;

// ---------------------------------------------------------------------------
// Canonical geometry
// ---------------------------------------------------------------------------

/// Deterministic text form of a geometry: object keys sorted, numbers at a
/// fixed number of decimals, `-0` folded to `0`.
pub fn canonical_geometry(value: &Value, precision: usize) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value, precision);
    out
}

fn write_canonical(out: &mut String, value: &Value, precision: usize) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => match n.as_f64() {
            Some(x) => out.push_str(&format_number(x, precision)),
            None => out.push_str(&n.to_string()),
        },
        Value::String(_) => out.push_str(&value.to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item, precision);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(out, &map[key], precision);
            }
            out.push('}');
        }
    }
}

fn format_number(x: f64, precision: usize) -> String {
    let text = format!("{x:.precision$}");
    match text.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_string(),
        _ => text,
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// How a model's records are fingerprinted.
///
/// With no configured key fields, every extracted field takes part.
#[derive(Debug, Clone)]
pub struct DuplicateKeys {
    pub fields: Vec<String>,
    pub case: KeyCase,
    pub precision: usize,
}

impl DuplicateKeys {
    pub fn for_model(model: &ModelConfig, precision: usize) -> Self {
        Self {
            fields: model.duplicate_keys.clone(),
            case: model.key_case,
            precision,
        }
    }

    pub fn fingerprint(&self, record: &ExtractedRecord) -> Fingerprint {
        let mut hasher = Sha256::new();

        let pairs: Vec<(&str, String)> = if self.fields.is_empty() {
            record
                .fields
                .iter()
                .map(|(name, value)| (name.as_str(), value.to_string()))
                .collect()
        } else {
            self.fields
                .iter()
                .map(|name| {
                    let value = record.get(name).map(ToString::to_string).unwrap_or_default();
                    (name.as_str(), value)
                })
                .collect()
        };

        for (i, (name, value)) in pairs.iter().enumerate() {
            if i > 0 {
                hasher.update(UNIT_SEP);
            }
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            match self.case {
                KeyCase::Insensitive => hasher.update(value.to_uppercase().as_bytes()),
                KeyCase::Exact => hasher.update(value.as_bytes()),
            }
        }
        hasher.update(RECORD_SEP);
        hasher.update(canonical_geometry(&record.geometry, self.precision).as_bytes());

        Fingerprint(hasher.finalize().into())
    }
}

/// Returns true if `record` was already seen; otherwise remembers it.
pub fn is_duplicate(record: &ExtractedRecord, keys: &DuplicateKeys, seen: &mut SeenSet) -> bool {
    !seen.insert(keys.fingerprint(record))
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Per-model duplicate detector. Owns the seen set for exactly one model run.
#[derive(Debug)]
pub struct DuplicateDetector {
    keys: DuplicateKeys,
    seen: SeenSet,
    enabled: bool,
}

impl DuplicateDetector {
    pub fn new(keys: DuplicateKeys, enabled: bool) -> Self {
        Self {
            keys,
            seen: SeenSet::new(),
            enabled,
        }
    }

    /// Every record is first-seen when detection is disabled.
    pub fn check(&mut self, record: &ExtractedRecord) -> bool {
        self.enabled && is_duplicate(record, &self.keys, &mut self.seen)
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(cod: &str, loc: &str, geometry: Value) -> ExtractedRecord {
        ExtractedRecord {
            fields: vec![
                ("COD_FTTB".into(), FieldValue::Text(cod.into())),
                ("LOCALITATE".into(), FieldValue::Text(loc.into())),
            ],
            geometry,
        }
    }

    fn keys(case: KeyCase) -> DuplicateKeys {
        DuplicateKeys {
            fields: vec!["COD_FTTB".into()],
            case,
            precision: DEFAULT_GEOMETRY_PRECISION,
        }
    }

    fn point(x: f64, y: f64) -> Value {
        json!({ "type": "Point", "coordinates": [x, y] })
    }

    #[test]
    fn canonical_form_sorts_keys_and_fixes_precision() {
        let geometry = json!({ "coordinates": [27.5, -0.0], "type": "Point" });
        assert_eq!(
            canonical_geometry(&geometry, 3),
            r#"{"coordinates":[27.500,0.000],"type":"Point"}"#
        );
        assert_eq!(canonical_geometry(&Value::Null, 3), "null");
        assert_eq!(format_number(-0.00000001, 7), "0.0000000");
        assert_eq!(format_number(-1.5, 1), "-1.5");
    }

    #[test]
    fn fingerprint_byte_layout() {
        let k = DuplicateKeys {
            fields: vec!["COD_FTTB".into(), "LOCALITATE".into()],
            case: KeyCase::Insensitive,
            precision: 1,
        };
        let rec = record("vs00001", "Vaslui", point(27.5, 46.2));
        let expected: [u8; 32] = Sha256::digest(
            b"COD_FTTB=VS00001\x1fLOCALITATE=VASLUI\x1e{\"coordinates\":[27.5,46.2],\"type\":\"Point\"}",
        )
        .into();
        assert_eq!(k.fingerprint(&rec), Fingerprint(expected));
    }

    #[test]
    fn same_record_twice_is_one_duplicate() {
        let mut seen = SeenSet::new();
        let k = keys(KeyCase::Insensitive);
        let a = record("VS00001", "VASLUI", point(27.7, 46.6));
        assert!(!is_duplicate(&a, &k, &mut seen));
        assert!(is_duplicate(&a.clone(), &k, &mut seen));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn non_key_fields_do_not_matter() {
        let k = keys(KeyCase::Exact);
        let a = record("VS00001", "VASLUI", point(27.7, 46.6));
        let b = record("VS00001", "HUSI", point(27.7, 46.6));
        assert_eq!(k.fingerprint(&a), k.fingerprint(&b));
    }

    #[test]
    fn geometry_is_part_of_identity() {
        let k = keys(KeyCase::Exact);
        let a = record("VS00001", "VASLUI", point(27.7, 46.6));
        let b = record("VS00001", "VASLUI", point(27.8, 46.6));
        assert_ne!(k.fingerprint(&a), k.fingerprint(&b));
    }

    #[test]
    fn key_case_policy() {
        let a = record("vs00001", "VASLUI", point(1.0, 2.0));
        let b = record("VS00001", "VASLUI", point(1.0, 2.0));
        let insensitive = keys(KeyCase::Insensitive);
        assert_eq!(insensitive.fingerprint(&a), insensitive.fingerprint(&b));
        let exact = keys(KeyCase::Exact);
        assert_ne!(exact.fingerprint(&a), exact.fingerprint(&b));
    }

    #[test]
    fn missing_key_value_is_empty_string() {
        let k = keys(KeyCase::Exact);
        let a = ExtractedRecord {
            fields: vec![],
            geometry: point(1.0, 2.0),
        };
        let b = record("", "VASLUI", point(1.0, 2.0));
        assert_eq!(k.fingerprint(&a), k.fingerprint(&b));
    }

    #[test]
    fn no_keys_means_whole_record() {
        let k = DuplicateKeys {
            fields: vec![],
            case: KeyCase::Exact,
            precision: DEFAULT_GEOMETRY_PRECISION,
        };
        let a = record("VS00001", "VASLUI", point(1.0, 2.0));
        let b = record("VS00001", "HUSI", point(1.0, 2.0));
        assert_ne!(k.fingerprint(&a), k.fingerprint(&b));
        assert_eq!(k.fingerprint(&a), k.fingerprint(&a.clone()));
    }

    #[test]
    fn disabled_detector_accepts_everything() {
        let a = record("VS00001", "VASLUI", point(1.0, 2.0));
        let mut off = DuplicateDetector::new(keys(KeyCase::Exact), false);
        assert!(!off.check(&a));
        assert!(!off.check(&a));
        let mut on = DuplicateDetector::new(keys(KeyCase::Exact), true);
        assert!(!on.check(&a));
        assert!(on.check(&a));
        assert_eq!(on.seen(), 1);
    }

    #[test]
    fn hex_is_64_chars() {
        let k = keys(KeyCase::Exact);
        let hex = k.fingerprint(&record("A", "B", Value::Null)).to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    proptest! {
        #[test]
        fn fingerprint_ignores_float_noise(x in -180_000i32..180_000, y in -90_000i32..90_000) {
            let k = keys(KeyCase::Exact);
            let (fx, fy) = (x as f64 / 1000.0, y as f64 / 1000.0);
            let a = record("VS00001", "VASLUI", point(fx, fy));
            let b = record("VS00001", "VASLUI", point(fx + 1e-12, fy - 1e-12));
            prop_assert_eq!(k.fingerprint(&a), k.fingerprint(&b));
        }

        #[test]
        fn distinct_codes_never_collide(a in "[A-Z]{2}[0-9]{5}", b in "[A-Z]{2}[0-9]{5}") {
            prop_assume!(a != b);
            let k = keys(KeyCase::Exact);
            let ra = record(&a, "VASLUI", point(1.0, 2.0));
            let rb = record(&b, "VASLUI", point(1.0, 2.0));
            prop_assert_ne!(k.fingerprint(&ra), k.fingerprint(&rb));
        }
    }
}
