use std::path::{Path, PathBuf};

use netsieve_engine::{ExtractedRecord, IndividualFile, ManifestEntry};

use crate::atomic::write_atomic;
use crate::error::WriteError;
use crate::geojson::to_compact_string;

/// Write a model's combined output as `<dir>/<file_name>`.
pub fn write_centralized(
    dir: &Path,
    file_name: &str,
    collection_name: &str,
    records: &[ExtractedRecord],
) -> Result<PathBuf, WriteError> {
    let path = dir.join(file_name);
    write_atomic(&path, to_compact_string(collection_name, records).as_bytes())?;
    Ok(path)
}

#[derive(Debug, Default)]
pub struct IndividualReport {
    pub written: Vec<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub entries: Vec<ManifestEntry>,
    pub errors: Vec<WriteError>,
}

/// Write one file per source plus the manifest, all under `<out>/<directory>`.
///
/// A failed file is left out of the manifest and reported; the remaining
/// files are still written.
pub fn write_individual(
    out: &Path,
    directory: &str,
    manifest_name: &str,
    files: &[IndividualFile],
) -> IndividualReport {
    let mut report = IndividualReport::default();
    if files.is_empty() {
        return report;
    }

    let dir = out.join(directory);
    if let Err(source) = std::fs::create_dir_all(&dir) {
        report.errors.push(WriteError::Io { path: dir, source });
        return report;
    }

    for file in files {
        let path = dir.join(&file.name);
        let text = to_compact_string(&file.stem, &file.records);
        match write_atomic(&path, text.as_bytes()) {
            Ok(size) => {
                report.entries.push(ManifestEntry {
                    name: file.name.clone(),
                    locality: file.locality.clone(),
                    records: file.records.len(),
                    size,
                    path: format!("{directory}/{}", file.name),
                });
                report.written.push(path);
            }
            Err(err) => {
                log::error!("{err}");
                report.errors.push(err);
            }
        }
    }

    let manifest_path = dir.join(manifest_name);
    match write_manifest(&manifest_path, &report.entries) {
        Ok(()) => report.manifest = Some(manifest_path),
        Err(err) => {
            log::error!("{err}");
            report.errors.push(err);
        }
    }
    report
}

/// Pretty-printed JSON array, in the given order.
pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<(), WriteError> {
    let mut text = serde_json::to_string_pretty(entries).map_err(|source| WriteError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    text.push('\n');
    write_atomic(path, text.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsieve_engine::FieldValue;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn file(stem: &str, locality: &str, n: usize) -> IndividualFile {
        IndividualFile {
            name: format!("{stem}.geojson"),
            stem: stem.into(),
            locality: locality.into(),
            records: (0..n)
                .map(|i| ExtractedRecord {
                    fields: vec![("NR_ART".into(), FieldValue::Integer(i as i64))],
                    geometry: Value::Null,
                })
                .collect(),
        }
    }

    #[test]
    fn individual_files_and_manifest() {
        let out = tempfile::tempdir().unwrap();
        let files = vec![file("CASE_BARLAD", "BARLAD", 2), file("CASE_ALBESTI", "ALBESTI", 1)];
        let report = write_individual(out.path(), "case", "manifest.json", &files);
        assert!(report.errors.is_empty());
        assert_eq!(report.written.len(), 2);

        let manifest = std::fs::read_to_string(out.path().join("case/manifest.json")).unwrap();
        let entries: Vec<Value> = serde_json::from_str(&manifest).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["CASE_BARLAD.geojson", "CASE_ALBESTI.geojson"]);
        assert_eq!(entries[0]["records"], 2);
        assert_eq!(entries[0]["path"], "case/CASE_BARLAD.geojson");

        let size = std::fs::metadata(out.path().join("case/CASE_BARLAD.geojson")).unwrap().len();
        assert_eq!(entries[0]["size"], size);
    }

    #[test]
    fn nothing_to_write_creates_nothing() {
        let out = tempfile::tempdir().unwrap();
        let report = write_individual(out.path(), "case", "manifest.json", &[]);
        assert!(report.manifest.is_none());
        assert!(!out.path().join("case").exists());
    }

    #[test]
    fn centralized_is_one_line() {
        let out = tempfile::tempdir().unwrap();
        let path = write_centralized(out.path(), "case_centralized.geojson", "case", &file("X", "X", 3).records)
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(!text.contains('\n'));
        assert!(text.starts_with(r#"{"type":"FeatureCollection","name":"case""#));
    }
}
