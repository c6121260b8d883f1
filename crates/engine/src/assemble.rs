use serde::Serialize;

use crate::config::ModelConfig;
use crate::record::ExtractedRecord;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One per-source output of an individual-output model.
#[derive(Debug, Clone)]
pub struct IndividualFile {
    /// File name written under the model's individual directory.
    pub name: String,
    pub stem: String,
    pub locality: String,
    pub records: Vec<ExtractedRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct AssembledOutput {
    /// Every accepted record, sorted by locality.
    pub centralized: Vec<ExtractedRecord>,
    /// Per-source files in manifest order. Empty for centralized-only models.
    pub individual: Vec<IndividualFile>,
}

/// Manifest line for one written individual file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub locality: String,
    pub records: usize,
    pub size: u64,
    pub path: String,
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

struct SourceGroup {
    stem: String,
    locality: String,
    records: Vec<ExtractedRecord>,
}

/// Collects deduplicated records for one model, in encounter order.
pub struct OutputAssembler {
    locality_field: String,
    individual: bool,
    priority: Vec<String>,
    extension: String,
    records: Vec<ExtractedRecord>,
    groups: Vec<SourceGroup>,
    current: Option<usize>,
}

impl OutputAssembler {
    pub fn new(model: &ModelConfig) -> Self {
        Self {
            locality_field: model.locality_field.clone(),
            individual: model.individual.is_some(),
            priority: model
                .individual
                .as_ref()
                .map(|i| i.priority.clone())
                .unwrap_or_default(),
            extension: "geojson".into(),
            records: Vec::new(),
            groups: Vec::new(),
            current: None,
        }
    }

    /// Subsequent `push` calls belong to this source. Sources with the same
    /// stem share one individual output.
    pub fn begin_source(&mut self, stem: &str, locality: &str) {
        if !self.individual {
            return;
        }
        let index = match self.groups.iter().position(|g| g.stem == stem) {
            Some(index) => index,
            None => {
                self.groups.push(SourceGroup {
                    stem: stem.to_string(),
                    locality: locality.to_string(),
                    records: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        self.current = Some(index);
    }

    pub fn push(&mut self, record: ExtractedRecord) {
        if let Some(index) = self.current {
            self.groups[index].records.push(record.clone());
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn finalize(self) -> AssembledOutput {
        let mut centralized = self.records;
        let field = self.locality_field;
        sort_by_locality(&mut centralized, &field);

        let extension = self.extension;
        let files: Vec<IndividualFile> = self
            .groups
            .into_iter()
            .filter(|g| !g.records.is_empty())
            .map(|g| IndividualFile {
                name: format!("{}.{}", g.stem, extension),
                stem: g.stem,
                locality: g.locality,
                records: g.records,
            })
            .collect();
        let individual = manifest_order(&self.priority, files);

        AssembledOutput {
            centralized,
            individual,
        }
    }
}

/// Lower-cased locality value; `None` when the record has no locality.
pub fn locality_key(record: &ExtractedRecord, field: &str) -> Option<String> {
    record.get(field).map(|v| v.to_string().to_lowercase())
}

/// Stable sort by locality, compared case-insensitively. Records without the
/// field come first.
pub fn sort_by_locality(records: &mut [ExtractedRecord], field: &str) {
    records.sort_by_cached_key(|r| locality_key(r, field));
}

/// Priority localities first, in the given order, then the rest by file name.
///
/// A priority entry matches a file by locality or by file name, both
/// case-insensitively.
pub fn manifest_order(priority: &[String], mut files: Vec<IndividualFile>) -> Vec<IndividualFile> {
    let rank = |file: &IndividualFile| {
        priority
            .iter()
            .position(|p| p.eq_ignore_ascii_case(&file.locality) || p.eq_ignore_ascii_case(&file.name))
            .unwrap_or(priority.len())
    };
    files.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name)));
    files
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Catalog;
    use crate::record::FieldValue;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::Value;

    const CASE: &str = r#"
[[models]]
id = "case"
patterns = [{ kind = "contains", value = "CASE_" }]
fields = [{ name = "COD_FTTB" }, { name = "LOCALITATE" }]
output = "individual"

[models.individual]
directory = "case"
priority = ["BARLAD", "VASLUI"]
"#;

    fn model(toml: &str, id: &str) -> ModelConfig {
        Catalog::from_toml(toml).unwrap().get(id).unwrap().clone()
    }

    fn rec(cod: &str, loc: Option<&str>) -> ExtractedRecord {
        let mut fields = vec![("COD_FTTB".to_string(), FieldValue::Text(cod.into()))];
        if let Some(loc) = loc {
            fields.push(("LOCALITATE".to_string(), FieldValue::Text(loc.into())));
        }
        ExtractedRecord {
            fields,
            geometry: Value::Null,
        }
    }

    fn file(name: &str, locality: &str) -> IndividualFile {
        IndividualFile {
            name: name.into(),
            stem: name.trim_end_matches(".geojson").into(),
            locality: locality.into(),
            records: vec![],
        }
    }

    fn codes(records: &[ExtractedRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.get("COD_FTTB").map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn manifest_priority_then_alphabetical() {
        let priority = vec!["BARLAD".to_string(), "VASLUI".to_string()];
        let files = vec![
            file("CASE_VASLUI.geojson", "VASLUI"),
            file("CASE_ALBESTI.geojson", "ALBESTI"),
            file("CASE_BARLAD.geojson", "BARLAD"),
        ];
        let names: Vec<String> = manifest_order(&priority, files)
            .into_iter()
            .map(|f| f.locality)
            .collect();
        assert_eq!(names, vec!["BARLAD", "VASLUI", "ALBESTI"]);
    }

    #[test]
    fn manifest_priority_by_file_name() {
        let priority = vec!["case_vaslui.geojson".to_string()];
        let files = vec![
            file("CASE_ALBESTI.geojson", "ALBESTI"),
            file("CASE_VASLUI.geojson", "VASLUI"),
            file("CASE_HUSI.geojson", "HUSI"),
        ];
        let names: Vec<String> = manifest_order(&priority, files)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(
            names,
            vec!["CASE_VASLUI.geojson", "CASE_ALBESTI.geojson", "CASE_HUSI.geojson"]
        );
    }

    #[test]
    fn centralized_sorted_with_stable_ties() {
        let m = model(CASE, "case");
        let mut asm = OutputAssembler::new(&m);
        asm.begin_source("CASE_VASLUI", "VASLUI");
        asm.push(rec("1", Some("vaslui")));
        asm.push(rec("2", Some("Albesti")));
        asm.push(rec("3", None));
        asm.begin_source("CASE_BARLAD", "BARLAD");
        asm.push(rec("4", Some("VASLUI")));
        asm.push(rec("5", Some("albesti")));
        let out = asm.finalize();
        assert_eq!(codes(&out.centralized), vec!["3", "2", "5", "1", "4"]);
    }

    #[test]
    fn individual_files_grouped_by_stem() {
        let m = model(CASE, "case");
        let mut asm = OutputAssembler::new(&m);
        asm.begin_source("CASE_VASLUI", "VASLUI");
        asm.push(rec("1", Some("VASLUI")));
        asm.begin_source("CASE_ALBESTI", "ALBESTI");
        asm.push(rec("2", Some("ALBESTI")));
        asm.begin_source("CASE_VASLUI", "VASLUI");
        asm.push(rec("3", Some("VASLUI")));
        asm.begin_source("CASE_EMPTY", "EMPTY");
        asm.begin_source("CASE_BARLAD", "BARLAD");
        asm.push(rec("4", Some("BARLAD")));
        let out = asm.finalize();

        let names: Vec<&str> = out.individual.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["CASE_BARLAD.geojson", "CASE_VASLUI.geojson", "CASE_ALBESTI.geojson"]
        );
        assert_eq!(codes(&out.individual[1].records), vec!["1", "3"]);
        assert_eq!(out.centralized.len(), 4);
    }

    #[test]
    fn centralized_only_model_has_no_individual_files() {
        let m = model(
            r#"
[[models]]
id = "hub"
patterns = [{ kind = "contains", value = "HUB_" }]
fields = [{ name = "COD_FTTB" }, { name = "LOCALITATE" }]
"#,
            "hub",
        );
        let mut asm = OutputAssembler::new(&m);
        asm.begin_source("HUB_VASLUI", "VASLUI");
        asm.push(rec("1", Some("VASLUI")));
        assert_eq!(asm.len(), 1);
        let out = asm.finalize();
        assert!(out.individual.is_empty());
        assert_eq!(out.centralized.len(), 1);
    }

    proptest! {
        #[test]
        fn centralized_is_non_decreasing(locs in proptest::collection::vec(proptest::option::of("[A-Za-z]{0,6}"), 0..40)) {
            let mut records: Vec<ExtractedRecord> = locs
                .iter()
                .enumerate()
                .map(|(i, l)| rec(&i.to_string(), l.as_deref()))
                .collect();
            sort_by_locality(&mut records, "LOCALITATE");
            for pair in records.windows(2) {
                let a = locality_key(&pair[0], "LOCALITATE");
                let b = locality_key(&pair[1], "LOCALITATE");
                prop_assert!(a <= b);
                if a == b {
                    let ia: usize = pair[0].get("COD_FTTB").unwrap().to_string().parse().unwrap();
                    let ib: usize = pair[1].get("COD_FTTB").unwrap().to_string().parse().unwrap();
                    prop_assert!(ia < ib);
                }
            }
        }

        #[test]
        fn manifest_lists_every_file_once(names in proptest::collection::btree_set("[A-Z]{1,5}", 0..12)) {
            let priority = vec!["BARLAD".to_string(), "VASLUI".to_string()];
            let files: Vec<IndividualFile> = names
                .iter()
                .map(|n| file(&format!("CASE_{n}.geojson"), n))
                .collect();
            let ordered = manifest_order(&priority, files);
            prop_assert_eq!(ordered.len(), names.len());
            let rest: Vec<&str> = ordered
                .iter()
                .filter(|f| !priority.contains(&f.locality))
                .map(|f| f.name.as_str())
                .collect();
            let mut sorted = rest.clone();
            sorted.sort();
            prop_assert_eq!(rest, sorted);
        }
    }
}
