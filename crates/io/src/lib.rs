// File I/O: trial decoding, feature collections, atomic writes

pub mod atomic;
pub mod decode;
pub mod error;
pub mod geojson;
pub mod output;

pub use atomic::{probe_writable, write_atomic};
pub use decode::{decode, TextEncoding};
pub use error::{DecodeError, FileError, WriteError};
pub use geojson::{read_feature_file, DecodedFile};
pub use output::{write_centralized, write_individual, IndividualReport};
