use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::WriteError;

/// Write `bytes` to `path` through a temp file in the same directory, then
/// rename. Readers never see a partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<u64, WriteError> {
    let io_err = |source: io::Error| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(bytes.len() as u64)
}

/// Check that files can be created in `dir`.
pub fn probe_writable(dir: &Path) -> io::Result<()> {
    NamedTempFile::new_in(dir).map(drop)
}
