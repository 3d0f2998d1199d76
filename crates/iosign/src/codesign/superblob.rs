//! Embedded signature superblob.
//!
//! Everything is big-endian. A 12-byte header (`0xfade0cc0`, total length,
//! blob count) is followed by one `(slot, offset)` pair per blob and then
//! the blobs themselves, each starting with its own magic and length.
//!
//! Slots written here: code directory (0), requirements (2), entitlements
//! (5) and the CMS wrapper (0x10000). The total length is what the
//! `__LINKEDIT` and `LC_CODE_SIGNATURE` fields are patched for, so every
//! builder in this module is deterministic in its output size.

use super::constants::*;
use crate::{Error, Result};

/// Size of the SuperBlob header in bytes (magic + length + count)
const SUPERBLOB_HEADER_SIZE: u32 = 12;

/// Size of each index entry in bytes (slot_type + offset)
const INDEX_ENTRY_SIZE: u32 = 8;

/// Size of a generic blob header (magic + length)
const BLOB_HEADER_SIZE: u32 = 8;

/// A blob entry for inclusion in a SuperBlob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// The slot type identifying this blob's purpose.
    /// See `CSSLOT_*` constants for standard slot types.
    pub slot_type: u32,
    /// The raw blob data, including its own magic and length header.
    pub data: Vec<u8>,
}

impl BlobEntry {
    /// Create a new blob entry.
    pub fn new(slot_type: u32, data: Vec<u8>) -> Self {
        Self { slot_type, data }
    }
}

/// Build a SuperBlob containing all signature components.
///
/// Entries are serialized in the order given.
pub fn build_superblob(entries: Vec<BlobEntry>) -> Vec<u8> {
    let count = entries.len() as u32;
    let header_size = SUPERBLOB_HEADER_SIZE + (count * INDEX_ENTRY_SIZE);

    let mut offsets = Vec::with_capacity(entries.len());
    let mut current_offset = header_size;
    for entry in &entries {
        offsets.push(current_offset);
        current_offset += entry.data.len() as u32;
    }

    let total_length = current_offset;
    let mut buf = Vec::with_capacity(total_length as usize);

    // Header (big-endian)
    buf.extend(&CSMAGIC_EMBEDDED_SIGNATURE.to_be_bytes());
    buf.extend(&total_length.to_be_bytes());
    buf.extend(&count.to_be_bytes());

    for (entry, offset) in entries.iter().zip(&offsets) {
        buf.extend(&entry.slot_type.to_be_bytes());
        buf.extend(&offset.to_be_bytes());
    }

    for entry in entries {
        buf.extend(&entry.data);
    }

    buf
}

fn wrap_blob(magic: u32, payload: &[u8]) -> Vec<u8> {
    let total_len = BLOB_HEADER_SIZE + payload.len() as u32;
    let mut buf = Vec::with_capacity(total_len as usize);

    buf.extend(&magic.to_be_bytes());
    buf.extend(&total_len.to_be_bytes());
    buf.extend(payload);

    buf
}

/// Build an entitlements blob from XML plist data.
pub fn build_entitlements_blob(plist_data: &[u8]) -> Vec<u8> {
    wrap_blob(CSMAGIC_EMBEDDED_ENTITLEMENTS, plist_data)
}

/// Build a minimal empty requirements blob (12 bytes, count = 0).
pub fn build_requirements_blob() -> Vec<u8> {
    let mut buf = Vec::with_capacity(12);

    buf.extend(&CSMAGIC_REQUIREMENTS.to_be_bytes());
    buf.extend(&12u32.to_be_bytes()); // length = 12 (header only)
    buf.extend(&0u32.to_be_bytes()); // count = 0

    buf
}

/// Build a CMS signature wrapper blob around DER-encoded CMS data.
pub fn build_signature_blob(cms_data: &[u8]) -> Vec<u8> {
    wrap_blob(CSMAGIC_BLOBWRAPPER, cms_data)
}

/// Builder for constructing SuperBlobs in a structured way.
///
/// # Example
///
/// ```ignore
/// let superblob = SuperBlobBuilder::new()
///     .code_directory(cd)
///     .requirements(requirements)
///     .entitlements(entitlements_blob)
///     .cms_signature(signature_blob)
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct SuperBlobBuilder {
    /// CodeDirectory (slot 0x0000), the blob the CMS signature covers
    code_directory: Option<Vec<u8>>,
    /// Requirements blob (slot 0x0002)
    requirements: Option<Vec<u8>>,
    /// XML entitlements blob (slot 0x0005)
    entitlements: Option<Vec<u8>>,
    /// CMS signature blob (slot 0x10000)
    cms_signature: Option<Vec<u8>>,
}

impl SuperBlobBuilder {
    /// Create a new SuperBlobBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CodeDirectory blob.
    pub fn code_directory(mut self, cd: Vec<u8>) -> Self {
        self.code_directory = Some(cd);
        self
    }

    /// Set the requirements blob.
    ///
    /// If not provided, an empty requirements blob will be generated.
    pub fn requirements(mut self, req: Vec<u8>) -> Self {
        self.requirements = Some(req);
        self
    }

    /// Set the XML entitlements blob.
    pub fn entitlements(mut self, ent: Vec<u8>) -> Self {
        self.entitlements = Some(ent);
        self
    }

    /// Set the CMS signature wrapper blob.
    pub fn cms_signature(mut self, sig: Vec<u8>) -> Self {
        self.cms_signature = Some(sig);
        self
    }

    /// Build the SuperBlob.
    ///
    /// Components are ordered by slot type regardless of the order the
    /// setters were called in:
    /// 1. CodeDirectory (0x0000)
    /// 2. Requirements (0x0002)
    /// 3. Entitlements (0x0005), if present
    /// 4. CMS Signature (0x10000), if present
    pub fn build(self) -> Vec<u8> {
        let mut entries = Vec::with_capacity(4);

        if let Some(cd) = self.code_directory {
            entries.push(BlobEntry::new(CSSLOT_CODEDIRECTORY, cd));
        }

        let requirements = self.requirements.unwrap_or_else(build_requirements_blob);
        entries.push(BlobEntry::new(CSSLOT_REQUIREMENTS, requirements));

        if let Some(ent) = self.entitlements {
            entries.push(BlobEntry::new(CSSLOT_ENTITLEMENTS, ent));
        }

        if let Some(sig) = self.cms_signature {
            entries.push(BlobEntry::new(CSSLOT_SIGNATURESLOT, sig));
        }

        build_superblob(entries)
    }
}

/// A parsed embedded signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlob {
    /// Blobs in index order.
    pub entries: Vec<BlobEntry>,
}

impl SuperBlob {
    /// Parse a serialized SuperBlob.
    ///
    /// `data` may extend past the SuperBlob; the declared length bounds the
    /// parse. Each blob's extent is taken from its own length header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let magic = be_u32(data, 0)?;
        if magic != CSMAGIC_EMBEDDED_SIGNATURE {
            return Err(Error::MachO(format!(
                "bad embedded signature magic {magic:#010x}"
            )));
        }

        let length = be_u32(data, 4)? as usize;
        if length > data.len() {
            return Err(Error::MachO(format!(
                "embedded signature declares {length} bytes, only {} available",
                data.len()
            )));
        }
        let data = &data[..length];
        let count = be_u32(data, 8)? as usize;

        let mut entries = Vec::with_capacity(count.min(16));
        for i in 0..count {
            let index_at = SUPERBLOB_HEADER_SIZE as usize + i * INDEX_ENTRY_SIZE as usize;
            let slot_type = be_u32(data, index_at)?;
            let offset = be_u32(data, index_at + 4)? as usize;
            let blob_len = be_u32(data, offset + 4)? as usize;
            let blob = offset
                .checked_add(blob_len)
                .and_then(|end| data.get(offset..end))
                .ok_or_else(|| {
                    Error::MachO(format!(
                        "blob in slot {slot_type:#x} overruns embedded signature"
                    ))
                })?;
            entries.push(BlobEntry::new(slot_type, blob.to_vec()));
        }

        Ok(Self { entries })
    }

    /// Raw bytes of the first blob in `slot_type`.
    pub fn blob(&self, slot_type: u32) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.slot_type == slot_type)
            .map(|e| e.data.as_slice())
    }

    /// Payload of the first blob in `slot_type`, without its 8-byte header.
    pub fn payload(&self, slot_type: u32) -> Option<&[u8]> {
        self.blob(slot_type)
            .and_then(|b| b.get(BLOB_HEADER_SIZE as usize..))
    }
}

fn be_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::MachO(format!("embedded signature truncated at offset {offset}")))
}
