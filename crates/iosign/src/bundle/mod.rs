//! App bundle handling for iOS code signing.
//!
//! This module provides:
//! - [`BundleFileSystem`], the read/write/enumerate view of a bundle, with
//!   directory and in-memory implementations
//! - [`ApplicationMetadata`], the Info.plist document
//! - [`ResourceManifestBuilder`], which hashes bundle members into the
//!   `_CodeSignature/CodeResources` manifest
//!
//! # CodeResources Plist Structure
//!
//! | Key | Description |
//! |-----|-------------|
//! | `files` | SHA-1 hash of every member outside the exclusion set |
//! | `rules` | catch-all include rule plus omit rules for Info.plist and the rules file |
//!
//! # Examples
//!
//! ```no_run
//! use iosign::bundle::{ApplicationMetadata, DirectoryBundle, ResourceManifestBuilder};
//! use iosign::bundle::{BundleFileSystem, INFO_PLIST};
//!
//! let bundle = DirectoryBundle::new("/path/to/MyApp.app");
//! let mut metadata = ApplicationMetadata::from_bytes(&bundle.read_file(INFO_PLIST)?)?;
//! metadata.ensure_resource_rules();
//! let metadata = metadata.freeze()?;
//! let manifest = ResourceManifestBuilder::new(&bundle, &metadata).build(metadata.executable()?)?;
//! println!("{} files hashed", manifest.files.len());
//! # Ok::<(), iosign::Error>(())
//! ```

pub mod code_resources;
pub mod fs;
pub mod metadata;

pub use code_resources::{ResourceManifest, ResourceManifestBuilder, CODE_RESOURCES_PATH};
pub use fs::{BundleFileSystem, DirectoryBundle, MemoryBundle};
pub use metadata::{
    ApplicationMetadata, FrozenMetadata, InfoPlistLoader, MetadataLoader, INFO_PLIST,
};
