// Configuration loading

pub mod catalog;
pub mod settings;

pub use catalog::{load_catalog_source, BUILTIN_CATALOG};
pub use settings::{RunSettings, SettingsError};
