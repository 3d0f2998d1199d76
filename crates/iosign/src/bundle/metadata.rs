//! Info.plist view of the application being signed.
//!
//! [`ApplicationMetadata`] is the mutable form, read once at the start of a
//! signing run. Once the resource rules key is settled it is frozen into
//! [`FrozenMetadata`], which fixes the serialized bytes that get written back
//! and hashed into the code directory.

use super::fs::BundleFileSystem;
use crate::{Error, Result};
use plist::{Dictionary, Value};
use tracing::warn;

/// Bundle-relative path of the metadata plist.
pub const INFO_PLIST: &str = "Info.plist";

/// Key naming the main executable.
pub const BUNDLE_EXECUTABLE_KEY: &str = "CFBundleExecutable";

/// Key holding the bundle identifier.
pub const BUNDLE_IDENTIFIER_KEY: &str = "CFBundleIdentifier";

/// Key naming the resource rules file.
pub const RESOURCE_RULES_KEY: &str = "CFBundleResourceSpecification";

/// Rules file used when the metadata does not name one.
pub const DEFAULT_RESOURCE_RULES: &str = "CustomResourceRules.plist";

/// Mutable Info.plist document.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationMetadata {
    dict: Dictionary,
}

impl ApplicationMetadata {
    /// Decode an Info.plist (XML or binary).
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let value = Value::from_reader(std::io::Cursor::new(data))?;
        let dict = value
            .into_dictionary()
            .ok_or_else(|| Error::InvalidPlist(format!("{INFO_PLIST} is not a dictionary")))?;
        Ok(Self { dict })
    }

    /// Wrap an existing dictionary.
    pub fn from_dictionary(dict: Dictionary) -> Self {
        Self { dict }
    }

    /// Underlying dictionary.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// Main executable name.
    pub fn executable(&self) -> Result<&str> {
        required_string(&self.dict, BUNDLE_EXECUTABLE_KEY)
    }

    /// Bundle identifier.
    pub fn bundle_identifier(&self) -> Result<&str> {
        required_string(&self.dict, BUNDLE_IDENTIFIER_KEY)
    }

    /// Resource rules file named by the metadata, if any.
    pub fn resource_rules_path(&self) -> Option<&str> {
        self.dict.get(RESOURCE_RULES_KEY).and_then(Value::as_string)
    }

    /// Set a key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.dict.insert(key.into(), value)
    }

    /// Fill in the resource rules key with [`DEFAULT_RESOURCE_RULES`] when absent.
    pub fn ensure_resource_rules(&mut self) -> &str {
        if self.resource_rules_path().is_none() {
            warn!(
                key = RESOURCE_RULES_KEY,
                default = DEFAULT_RESOURCE_RULES,
                "Info.plist names no resource rules file, using default"
            );
            self.dict.insert(
                RESOURCE_RULES_KEY.to_string(),
                Value::String(DEFAULT_RESOURCE_RULES.to_string()),
            );
        }
        self.resource_rules_path().unwrap_or(DEFAULT_RESOURCE_RULES)
    }

    /// Serialize and make read-only.
    ///
    /// The serialized bytes are what gets written back to the bundle and
    /// hashed into the Info.plist special slot.
    pub fn freeze(self) -> Result<FrozenMetadata> {
        let mut bytes = Vec::new();
        Value::Dictionary(self.dict.clone()).to_writer_xml(&mut bytes)?;
        Ok(FrozenMetadata {
            dict: self.dict,
            bytes,
        })
    }
}

/// Read-only Info.plist with its final serialized form.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenMetadata {
    dict: Dictionary,
    bytes: Vec<u8>,
}

impl FrozenMetadata {
    /// Serialized bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Underlying dictionary.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// Main executable name.
    pub fn executable(&self) -> Result<&str> {
        required_string(&self.dict, BUNDLE_EXECUTABLE_KEY)
    }

    /// Bundle identifier.
    pub fn bundle_identifier(&self) -> Result<&str> {
        required_string(&self.dict, BUNDLE_IDENTIFIER_KEY)
    }

    /// Resource rules file named by the metadata, if any.
    pub fn resource_rules_path(&self) -> Option<&str> {
        self.dict.get(RESOURCE_RULES_KEY).and_then(Value::as_string)
    }
}

fn required_string<'a>(dict: &'a Dictionary, key: &'static str) -> Result<&'a str> {
    dict.get(key)
        .and_then(Value::as_string)
        .ok_or(Error::MissingKey {
            key,
            document: INFO_PLIST,
        })
}

/// Loads the application metadata for a signing run.
pub trait MetadataLoader {
    /// Produce the metadata for `bundle`.
    fn load(&self, bundle: &dyn BundleFileSystem) -> Result<ApplicationMetadata>;
}

/// Reads `Info.plist` from the bundle root.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfoPlistLoader;

impl MetadataLoader for InfoPlistLoader {
    fn load(&self, bundle: &dyn BundleFileSystem) -> Result<ApplicationMetadata> {
        ApplicationMetadata::from_bytes(&bundle.read_file(INFO_PLIST)?)
    }
}
