//! Entitlements override files and merging.

use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::path::{Path, PathBuf};

/// Extension of an entitlements override file.
pub const OVERRIDE_EXTENSION: &str = "entitlements";

/// Conventional override path for `target`: same directory and basename,
/// with the `.entitlements` extension.
pub fn override_path(target: impl AsRef<Path>) -> PathBuf {
    target.as_ref().with_extension(OVERRIDE_EXTENSION)
}

/// Load an override plist from disk.
pub fn load_override(path: impl AsRef<Path>) -> Result<Dictionary> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    parse_entitlements(&data).map_err(|e| match e {
        Error::Plist(_) | Error::Config(_) => {
            Error::Config(format!("invalid entitlements file {}: {e}", path.display()))
        }
        other => other,
    })
}

/// Decode an entitlements plist (XML or binary).
pub fn parse_entitlements(data: &[u8]) -> Result<Dictionary> {
    let value = Value::from_reader(std::io::Cursor::new(data))?;
    value
        .into_dictionary()
        .ok_or_else(|| Error::Config("entitlements plist is not a dictionary".into()))
}

/// Merge `overrides` on top of `base`.
///
/// Top level keys from `overrides` replace those in `base` wholesale; nested
/// dictionaries are not merged. Applying the same overrides again is a no-op.
pub fn merge_entitlements(base: &mut Dictionary, overrides: &Dictionary) {
    for (key, value) in overrides.iter() {
        base.insert(key.clone(), value.clone());
    }
}

/// Serialize entitlements to the XML text embedded in the signature.
pub fn to_xml(entitlements: &Dictionary) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    Value::Dictionary(entitlements.clone()).to_writer_xml(&mut buf)?;
    buf.push(b'\n');
    Ok(buf)
}
