//! Resource manifest (CodeResources) generation
//!
//! The manifest records a SHA-1 hash of every bundle member except the few
//! files that are covered some other way: the Info.plist and the manifest
//! itself are hashed into code directory special slots, the executable
//! carries its own embedded signature, and the rules file is regenerated on
//! every run.

use super::fs::BundleFileSystem;
use super::metadata::{FrozenMetadata, INFO_PLIST, RESOURCE_RULES_KEY};
use crate::{Error, Result};
use plist::{Dictionary, Value};
use rayon::prelude::*;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Bundle-relative path the manifest is written to.
pub const CODE_RESOURCES_PATH: &str = "_CodeSignature/CodeResources";

/// Legacy root-level manifest path, never hashed.
pub const LEGACY_CODE_RESOURCES_PATH: &str = "CodeResources";

/// Tie-break weight of the Info.plist omit rule
const INFO_PLIST_WEIGHT: f64 = 10.0;

/// Tie-break weight of the rules file omit rule
const RULES_FILE_WEIGHT: f64 = 100.0;

/// Output of [`ResourceManifestBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceManifest {
    /// Bundle-relative path of the rules file.
    pub rules_path: String,
    /// Serialized rules file.
    pub rules_file: Vec<u8>,
    /// Serialized manifest, hashed into the resources special slot.
    pub manifest: Vec<u8>,
    /// Hashed members.
    pub files: BTreeMap<String, [u8; 20]>,
}

impl ResourceManifest {
    /// Write the rules file and the manifest into `bundle`.
    pub fn write_to(&self, bundle: &mut dyn BundleFileSystem) -> Result<()> {
        bundle.write_file(&self.rules_path, &self.rules_file)?;
        bundle.write_file(CODE_RESOURCES_PATH, &self.manifest)?;
        Ok(())
    }
}

/// Builds the resource manifest for one bundle.
pub struct ResourceManifestBuilder<'a> {
    bundle: &'a dyn BundleFileSystem,
    metadata: &'a FrozenMetadata,
}

impl<'a> ResourceManifestBuilder<'a> {
    /// Create a builder over `bundle` described by `metadata`.
    pub fn new(bundle: &'a dyn BundleFileSystem, metadata: &'a FrozenMetadata) -> Self {
        Self { bundle, metadata }
    }

    /// Hash the bundle and serialize the rules file and manifest.
    ///
    /// Nothing is written; see [`ResourceManifest::write_to`].
    pub fn build(&self, executable_name: &str) -> Result<ResourceManifest> {
        let rules_path = self
            .metadata
            .resource_rules_path()
            .ok_or(Error::MissingKey {
                key: RESOURCE_RULES_KEY,
                document: INFO_PLIST,
            })?
            .to_string();

        let rules = standard_rules(&rules_path);

        let mut rules_doc = Dictionary::new();
        rules_doc.insert("rules".to_string(), Value::Dictionary(rules.clone()));
        let rules_file = serialize(rules_doc)?;

        let excluded = exclusion_set(&rules_path, executable_name);
        let members: Vec<String> = self
            .bundle
            .enumerate_files()?
            .into_iter()
            .filter(|path| !excluded.contains(path.as_str()))
            .collect();

        let bundle = self.bundle;
        let files = members
            .par_iter()
            .map(|path| Ok((path.clone(), hash_data(&bundle.read_file(path)?))))
            .collect::<Result<BTreeMap<_, _>>>()?;
        debug!(count = files.len(), "hashed bundle resources");

        let mut file_hashes = Dictionary::new();
        for (path, hash) in &files {
            file_hashes.insert(path.clone(), Value::Data(hash.to_vec()));
        }

        let mut root = Dictionary::new();
        root.insert("files".to_string(), Value::Dictionary(file_hashes));
        root.insert("rules".to_string(), Value::Dictionary(rules));
        let manifest = serialize(root)?;

        Ok(ResourceManifest {
            rules_path,
            rules_file,
            manifest,
            files,
        })
    }
}

/// Paths that never appear in the manifest.
pub fn exclusion_set<'p>(rules_path: &'p str, executable_name: &'p str) -> BTreeSet<&'p str> {
    [
        INFO_PLIST,
        rules_path,
        executable_name,
        CODE_RESOURCES_PATH,
        LEGACY_CODE_RESOURCES_PATH,
    ]
    .into_iter()
    .collect()
}

/// Catch-all include plus omit rules for the Info.plist and the rules file.
fn standard_rules(rules_path: &str) -> Dictionary {
    let mut rules = Dictionary::new();

    rules.insert(".*".to_string(), Value::Boolean(true));

    let mut info_plist = Dictionary::new();
    info_plist.insert("omit".to_string(), Value::Boolean(true));
    info_plist.insert("weight".to_string(), Value::Real(INFO_PLIST_WEIGHT));
    rules.insert(INFO_PLIST.to_string(), Value::Dictionary(info_plist));

    let mut rules_file = Dictionary::new();
    rules_file.insert("omit".to_string(), Value::Boolean(true));
    rules_file.insert("weight".to_string(), Value::Real(RULES_FILE_WEIGHT));
    rules.insert(rules_path.to_string(), Value::Dictionary(rules_file));

    rules
}

fn serialize(dict: Dictionary) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    Value::Dictionary(dict).to_writer_xml(&mut buf)?;
    Ok(buf)
}

/// SHA-1 of `data`.
pub fn hash_data(data: &[u8]) -> [u8; 20] {
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&Sha1::digest(data));
    hash
}
