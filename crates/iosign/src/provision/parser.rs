//! Extraction of the plist payload embedded in a `.mobileprovision` file.
//!
//! A provisioning profile is a signed container with the XML plist stored
//! verbatim inside. Rather than walking the container, the payload is found
//! by its `<?xml` marker and the two bytes in front of it are read as a
//! little-endian length.

use super::profile::ProvisioningProfile;
use crate::{Error, Result};
use tracing::debug;

/// Marker that starts the embedded plist payload.
const XML_MARKER: &[u8] = b"<?xml";

/// Width of the length prefix in front of the payload.
const LENGTH_PREFIX_SIZE: usize = 2;

/// Parse a provisioning profile from the raw bytes of a `.mobileprovision` file.
pub fn parse_profile(raw: &[u8]) -> Result<ProvisioningProfile> {
    let text = extract_plist_payload(raw)?;
    let value = plist::Value::from_reader_xml(text.as_bytes())?;
    let dict = value.into_dictionary().ok_or_else(|| {
        Error::ProvisioningProfile("embedded plist is not a dictionary".into())
    })?;

    ProvisioningProfile::from_plist(dict)
}

/// Locate and decode the embedded XML plist.
///
/// The returned text always ends with the last `>` found inside the declared
/// payload. Some profiles declare a length one byte longer than the plist,
/// which would otherwise leave a stray byte after `</plist>`.
pub fn extract_plist_payload(raw: &[u8]) -> Result<String> {
    let start = raw
        .windows(XML_MARKER.len())
        .position(|w| w == XML_MARKER)
        .ok_or_else(|| Error::ProvisioningProfile("no embedded plist found".into()))?;

    if start < LENGTH_PREFIX_SIZE {
        return Err(Error::ProvisioningProfile(
            "embedded plist has no length prefix".into(),
        ));
    }

    let declared = u16::from_le_bytes([raw[start - 2], raw[start - 1]]) as usize;
    let available = raw.len() - start;
    if declared > available {
        debug!(declared, available, "declared plist length overruns profile, clamping");
    }
    let end = start + declared.min(available);

    let text = String::from_utf8_lossy(&raw[start..end]);
    let last_close = text.rfind('>').ok_or_else(|| {
        Error::ProvisioningProfile("embedded plist is not terminated".into())
    })?;

    Ok(text[..=last_close].to_string())
}
