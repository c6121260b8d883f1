use std::path::Path;

use netsieve_engine::config::Catalog;
use netsieve_engine::extract::extract_all;
use netsieve_io::{read_feature_file, TextEncoding};
use pretty_assertions::assert_eq;

const CATALOG: &str = r#"
[[models]]
id = "localitati"
patterns = [{ kind = "contains", value = "LOCALITATI" }]
fields = [
    { name = "NUME", required = true },
    { name = "COMUNA" },
    { name = "SIRUTA", rule = { kind = "integer", min = 1 } },
]
locality_field = "NUME"
"#;

const DOCUMENT: &str = r#"{"type":"FeatureCollection","features":[
{"type":"Feature","properties":{"NUME":"Bârlad","COMUNA":"Bârlad","SIRUTA":161954},"geometry":{"type":"Point","coordinates":[27.67,46.23]}},
{"type":"Feature","properties":{"nume":"Tutova","Comuna":"Tutova","SIRUTA":"166160"},"geometry":{"type":"Point","coordinates":[27.55,46.11]}}
]}"#;

fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).expect("latin-1 only"))
        .collect()
}

#[test]
fn latin1_file_extracts_like_utf8_file() {
    let dir = tempfile::tempdir().unwrap();
    let utf8_path = write(dir.path(), "LOCALITATI_utf8.geojson", DOCUMENT.as_bytes());
    let latin1_path = write(dir.path(), "LOCALITATI_latin1.geojson", &latin1(DOCUMENT));

    let utf8 = read_feature_file(&utf8_path).unwrap();
    let legacy = read_feature_file(&latin1_path).unwrap();
    assert_eq!(utf8.encoding, TextEncoding::Utf8);
    assert_eq!(legacy.encoding, TextEncoding::Latin1);
    assert_eq!(utf8.header_names, legacy.header_names);

    let catalog = Catalog::from_toml(CATALOG).unwrap();
    let model = catalog.get("localitati").unwrap();
    let a = extract_all(&utf8.records, model);
    let b = extract_all(&legacy.records, model);
    assert_eq!(a.accepted.len(), 2);
    assert_eq!(a.accepted, b.accepted);
}

#[test]
fn windows1252_file_is_read() {
    let dir = tempfile::tempdir().unwrap();
    // 0x92 is a right single quote in windows-1252 and a C1 control in latin-1
    let mut bytes = br#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"NUME":"Sat"#.to_vec();
    bytes.push(0x92);
    bytes.extend_from_slice(br#"s"},"geometry":null}]}"#);
    let path = write(dir.path(), "LOCALITATI_1252.geojson", &bytes);

    let decoded = read_feature_file(&path).unwrap();
    assert_eq!(decoded.encoding, TextEncoding::Windows1252);
    assert_eq!(decoded.records[0].properties.get("NUME"), Some("Sat\u{2019}s"));
}

#[test]
fn undecodable_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "LOCALITATI_bad.geojson", b"{\"type\":\"Feature\"}");
    let err = read_feature_file(&path).unwrap_err();
    assert_eq!(err.skip_cause(), netsieve_engine::SkipCause::Decode);

    let missing = dir.path().join("missing.geojson");
    let err = read_feature_file(&missing).unwrap_err();
    assert_eq!(err.skip_cause(), netsieve_engine::SkipCause::Io);
}
