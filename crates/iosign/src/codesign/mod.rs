//! Code signing structures and constants for iOS binaries

pub mod code_directory;
pub mod constants;
pub mod superblob;

pub use code_directory::{CodeDirectoryBuilder, DigestType};
pub use superblob::{BlobEntry, SuperBlob, SuperBlobBuilder};
