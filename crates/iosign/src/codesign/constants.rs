//! Apple code signing constants and magic numbers
//!
//! These constants define the binary format for embedded code signatures:
//! the SuperBlob and the blob magics it indexes, slot tags, hash types and
//! CodeDirectory layout values.

// =============================================================================
// Blob Magic Numbers
// =============================================================================

/// SuperBlob containing all signature components (embedded signature)
pub const CSMAGIC_EMBEDDED_SIGNATURE: u32 = 0xfade0cc0;

/// CodeDirectory blob magic
pub const CSMAGIC_CODEDIRECTORY: u32 = 0xfade0c02;

/// Requirements set blob magic
pub const CSMAGIC_REQUIREMENTS: u32 = 0xfade0c01;

/// Embedded entitlements (XML plist format)
pub const CSMAGIC_EMBEDDED_ENTITLEMENTS: u32 = 0xfade7171;

/// CMS signature wrapper blob
pub const CSMAGIC_BLOBWRAPPER: u32 = 0xfade0b01;

// =============================================================================
// Slot Types (SuperBlob index tags)
// =============================================================================

/// Code directory slot
pub const CSSLOT_CODEDIRECTORY: u32 = 0x0000;

/// Code requirements slot
pub const CSSLOT_REQUIREMENTS: u32 = 0x0002;

/// Entitlements slot (XML format)
pub const CSSLOT_ENTITLEMENTS: u32 = 0x0005;

/// CMS signature slot
pub const CSSLOT_SIGNATURESLOT: u32 = 0x10000;

// =============================================================================
// Special Slots (negative CodeDirectory indices)
// =============================================================================

/// Info.plist
pub const CSSLOT_SPECIAL_INFOSLOT: usize = 1;

/// Requirements blob
pub const CSSLOT_SPECIAL_REQUIREMENTS: usize = 2;

/// CodeResources
pub const CSSLOT_SPECIAL_RESOURCEDIR: usize = 3;

/// Application specific, always empty
pub const CSSLOT_SPECIAL_APPLICATION: usize = 4;

/// Entitlements blob
pub const CSSLOT_SPECIAL_ENTITLEMENTS: usize = 5;

/// Number of special slots every CodeDirectory carries.
pub const SPECIAL_SLOT_COUNT: usize = CSSLOT_SPECIAL_ENTITLEMENTS;

// =============================================================================
// Hash Types
// =============================================================================

/// SHA-1
pub const CS_HASHTYPE_SHA1: u8 = 1;

/// SHA-256
pub const CS_HASHTYPE_SHA256: u8 = 2;

/// SHA-1 digest length
pub const CS_SHA1_LEN: usize = 20;

/// SHA-256 digest length
pub const CS_SHA256_LEN: usize = 32;

// =============================================================================
// Exec Segment Flags
// =============================================================================

/// Slice is the main executable of its bundle
pub const CS_EXECSEG_MAIN_BINARY: u64 = 0x0001;

// =============================================================================
// CodeDirectory Layout
// =============================================================================

/// Version that introduced the exec segment fields
pub const CODEDIRECTORY_VERSION_EXECSEG: u32 = 0x20400;

/// Version this crate emits
pub const CODEDIRECTORY_VERSION: u32 = CODEDIRECTORY_VERSION_EXECSEG;

/// Code page size covered by one hash slot
pub const PAGE_SIZE: usize = 4096;

/// log2 of [`PAGE_SIZE`], as stored in the header
pub const PAGE_SIZE_LOG2: u8 = 12;
