// Model catalog source
// The built-in catalog is compiled into the binary; `--catalog` replaces it.

use std::fs;
use std::path::Path;

use crate::settings::SettingsError;

/// TOML text of the catalog shipped with the tool.
pub const BUILTIN_CATALOG: &str = include_str!("../catalog/models.toml");

/// Catalog text from `path`, or the built-in catalog when `path` is `None`.
pub fn load_catalog_source(path: Option<&Path>) -> Result<String, SettingsError> {
    match path {
        None => Ok(BUILTIN_CATALOG.to_string()),
        Some(path) => fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
