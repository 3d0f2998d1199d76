//! CodeDirectory blob builder for Apple code signing
//!
//! The CodeDirectory is the structure the CMS signature covers. It contains a
//! hash of every 4 KiB page of the signed region of the slice, and hashes of
//! the side artifacts (Info.plist, requirements, CodeResources, entitlements)
//! in the special slots that precede the page hashes.

use super::constants::*;
use sha1::{Digest, Sha1};
use sha2::Sha256;

/// CodeDirectory header size for version 0x20400 (with exec segment fields)
const CODEDIRECTORY_HEADER_SIZE: u32 = 88;

/// Digest algorithm used for page and special slot hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestType {
    /// SHA-1, 20 byte digests.
    Sha1,
    /// SHA-256, 32 byte digests.
    #[default]
    Sha256,
}

impl DigestType {
    /// Hash type byte stored in the CodeDirectory header.
    pub fn hash_type(self) -> u8 {
        match self {
            DigestType::Sha1 => CS_HASHTYPE_SHA1,
            DigestType::Sha256 => CS_HASHTYPE_SHA256,
        }
    }

    /// Digest length in bytes.
    pub fn len(self) -> usize {
        match self {
            DigestType::Sha1 => CS_SHA1_LEN,
            DigestType::Sha256 => CS_SHA256_LEN,
        }
    }

    /// Map a header hash type byte back to a digest.
    pub fn from_hash_type(hash_type: u8) -> Option<Self> {
        match hash_type {
            CS_HASHTYPE_SHA1 => Some(DigestType::Sha1),
            CS_HASHTYPE_SHA256 => Some(DigestType::Sha256),
            _ => None,
        }
    }

    /// Hash `data`.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestType::Sha1 => Sha1::digest(data).to_vec(),
            DigestType::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

/// Builder for creating CodeDirectory blobs.
///
/// # Example
///
/// ```ignore
/// let code_data = vec![0u8; 8192]; // 2 pages of code
/// let cd = CodeDirectoryBuilder::new("com.example.app", &code_data)
///     .team_id("TEAMID1234")
///     .exec_seg_limit(65536)
///     .exec_seg_flags(CS_EXECSEG_MAIN_BINARY)
///     .build(DigestType::Sha256);
/// ```
pub struct CodeDirectoryBuilder<'a> {
    /// Bundle identifier (e.g., "com.example.app")
    identifier: String,
    /// Team identifier
    team_id: Option<String>,
    /// Signed region of the slice (everything before the signature)
    code: &'a [u8],
    /// Info.plist hash (special slot -1)
    info_hash: Option<Vec<u8>>,
    /// Requirements blob hash (special slot -2)
    requirements_hash: Option<Vec<u8>>,
    /// CodeResources hash (special slot -3)
    resources_hash: Option<Vec<u8>>,
    /// Entitlements blob hash (special slot -5)
    entitlements_hash: Option<Vec<u8>>,
    /// Executable segment limit (__TEXT segment size)
    exec_seg_limit: u64,
    /// Executable segment flags
    exec_seg_flags: u64,
}

impl<'a> CodeDirectoryBuilder<'a> {
    /// Create a new CodeDirectory builder over the signed region `code`.
    pub fn new(identifier: impl Into<String>, code: &'a [u8]) -> Self {
        Self {
            identifier: identifier.into(),
            team_id: None,
            code,
            info_hash: None,
            requirements_hash: None,
            resources_hash: None,
            entitlements_hash: None,
            exec_seg_limit: 0,
            exec_seg_flags: 0,
        }
    }

    /// Set the team identifier.
    pub fn team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Set the Info.plist hash (special slot -1).
    pub fn info_hash(mut self, hash: Vec<u8>) -> Self {
        self.info_hash = Some(hash);
        self
    }

    /// Set the requirements blob hash (special slot -2).
    pub fn requirements_hash(mut self, hash: Vec<u8>) -> Self {
        self.requirements_hash = Some(hash);
        self
    }

    /// Set the CodeResources hash (special slot -3).
    pub fn resources_hash(mut self, hash: Vec<u8>) -> Self {
        self.resources_hash = Some(hash);
        self
    }

    /// Set the entitlements blob hash (special slot -5).
    pub fn entitlements_hash(mut self, hash: Vec<u8>) -> Self {
        self.entitlements_hash = Some(hash);
        self
    }

    /// Set the executable segment limit.
    pub fn exec_seg_limit(mut self, limit: u64) -> Self {
        self.exec_seg_limit = limit;
        self
    }

    /// Set the raw executable segment flags.
    pub fn exec_seg_flags(mut self, flags: u64) -> Self {
        self.exec_seg_flags = flags;
        self
    }

    fn code_slot_count(&self) -> usize {
        self.code.len().div_ceil(PAGE_SIZE)
    }

    /// Build the CodeDirectory blob with the given digest.
    pub fn build(&self, digest: DigestType) -> Vec<u8> {
        let hash_size = digest.len();
        let code_limit = self.code.len() as u32;
        let n_code_slots = self.code_slot_count() as u32;
        let n_special_slots = SPECIAL_SLOT_COUNT as u32;

        let ident_offset = CODEDIRECTORY_HEADER_SIZE;
        let ident_len = self.identifier.len() as u32 + 1; // null-terminated

        let team_offset = if self.team_id.is_some() {
            ident_offset + ident_len
        } else {
            0
        };
        let team_len = self
            .team_id
            .as_ref()
            .map(|t| t.len() as u32 + 1)
            .unwrap_or(0);

        // Hash offset points at slot 0; special slots sit just before it
        let hash_offset = ident_offset + ident_len + team_len + n_special_slots * hash_size as u32;
        let total_len = hash_offset + n_code_slots * hash_size as u32;

        let mut buf = Vec::with_capacity(total_len as usize);

        // Header (all fields are big-endian)
        buf.extend(&CSMAGIC_CODEDIRECTORY.to_be_bytes()); // magic
        buf.extend(&total_len.to_be_bytes()); // length
        buf.extend(&CODEDIRECTORY_VERSION.to_be_bytes()); // version
        buf.extend(&0u32.to_be_bytes()); // flags
        buf.extend(&hash_offset.to_be_bytes()); // hashOffset
        buf.extend(&ident_offset.to_be_bytes()); // identOffset
        buf.extend(&n_special_slots.to_be_bytes()); // nSpecialSlots
        buf.extend(&n_code_slots.to_be_bytes()); // nCodeSlots
        buf.extend(&code_limit.to_be_bytes()); // codeLimit
        buf.push(hash_size as u8); // hashSize
        buf.push(digest.hash_type()); // hashType
        buf.push(0); // spare1
        buf.push(PAGE_SIZE_LOG2); // pageSize (log2)
        buf.extend(&0u32.to_be_bytes()); // spare2
        buf.extend(&0u32.to_be_bytes()); // scatterOffset
        buf.extend(&team_offset.to_be_bytes()); // teamOffset
        buf.extend(&0u32.to_be_bytes()); // spare3
        buf.extend(&0u64.to_be_bytes()); // codeLimit64
        buf.extend(&0u64.to_be_bytes()); // execSegBase
        buf.extend(&self.exec_seg_limit.to_be_bytes()); // execSegLimit
        buf.extend(&self.exec_seg_flags.to_be_bytes()); // execSegFlags

        buf.extend(self.identifier.as_bytes());
        buf.push(0);

        if let Some(ref team) = self.team_id {
            buf.extend(team.as_bytes());
            buf.push(0);
        }

        buf.extend(self.build_special_slots(hash_size));

        for page in self.code.chunks(PAGE_SIZE) {
            buf.extend(digest.digest(page));
        }

        buf
    }

    /// Special slots are stored in reverse order from -5 to -1.
    fn build_special_slots(&self, hash_size: usize) -> Vec<u8> {
        let empty = vec![0u8; hash_size];
        let mut slots = Vec::with_capacity(SPECIAL_SLOT_COUNT * hash_size);

        for slot in (1..=SPECIAL_SLOT_COUNT).rev() {
            let hash = match slot {
                CSSLOT_SPECIAL_INFOSLOT => self.info_hash.as_ref(),
                CSSLOT_SPECIAL_REQUIREMENTS => self.requirements_hash.as_ref(),
                CSSLOT_SPECIAL_RESOURCEDIR => self.resources_hash.as_ref(),
                CSSLOT_SPECIAL_ENTITLEMENTS => self.entitlements_hash.as_ref(),
                _ => None,
            };
            slots.extend(hash.unwrap_or(&empty));
        }

        slots
    }
}

/// Read the digest type recorded in a serialized CodeDirectory.
pub fn code_directory_digest(code_directory: &[u8]) -> Option<DigestType> {
    if code_directory.len() < CODEDIRECTORY_HEADER_SIZE as usize
        || code_directory[0..4] != CSMAGIC_CODEDIRECTORY.to_be_bytes()
    {
        return None;
    }
    DigestType::from_hash_type(code_directory[37])
}
