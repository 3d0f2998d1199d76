//! Read/patch model of a Mach-O or fat executable.
//!
//! Every architecture slice owns its bytes. The header values the signer
//! rewrites are addressed through [`FieldDescriptor`]s recorded while the
//! load commands are parsed, so patching is a bounds-checked write at a known
//! offset instead of re-parsing the binary.
//!
//! A slice is only accepted if it can be re-signed in place:
//! - it has a `__LINKEDIT` segment
//! - it already carries an `LC_CODE_SIGNATURE` command
//! - the signature is the last thing in `__LINKEDIT`

use crate::{Error, Result};
use goblin::mach::header::MH_EXECUTE;
use goblin::mach::load_command::CommandVariant;
use goblin::mach::{Mach, MachO};

/// Fat header magic (always big-endian on disk)
const FAT_MAGIC: u32 = 0xCAFE_BABE;

/// Size of the fat header before the arch table
const FAT_HEADER_SIZE: usize = 8;

/// Size of one `fat_arch` entry
const FAT_ARCH_SIZE: usize = 20;

/// Alignment of the first slice in a rebuilt fat container
const FAT_FIRST_SLICE_ALIGN: usize = 0x4000;

/// Alignment recorded for a thin binary
const DEFAULT_SLICE_ALIGN: u32 = 14;

/// Page size used when growing `__LINKEDIT` vmsize
pub const SEGMENT_PAGE_SIZE: u64 = 0x4000;

const LINKEDIT: &[u8] = b"__LINKEDIT";
const TEXT: &[u8] = b"__TEXT";

/// Location and width of one integer field inside a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Byte offset from the start of the slice.
    pub offset: usize,
    /// Width in bytes, 4 or 8.
    pub width: usize,
}

impl FieldDescriptor {
    /// A 32-bit field at `offset`.
    pub const fn u32(offset: usize) -> Self {
        Self { offset, width: 4 }
    }

    /// A 64-bit field at `offset`.
    pub const fn u64(offset: usize) -> Self {
        Self { offset, width: 8 }
    }

    /// Read the field from `data`.
    pub fn read(&self, data: &[u8], little_endian: bool) -> Result<u64> {
        let bytes = self.bytes(data)?;
        let value = match (self.width, little_endian) {
            (4, true) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
            (4, false) => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
            (8, true) => u64::from_le_bytes(self.eight(bytes)),
            (8, false) => u64::from_be_bytes(self.eight(bytes)),
            _ => return Err(self.bad_width()),
        };
        Ok(value)
    }

    /// Write `value` into the field, failing if it does not fit.
    pub fn write(&self, data: &mut [u8], value: u64, little_endian: bool) -> Result<()> {
        let encoded: Vec<u8> = match self.width {
            4 => {
                let value = u32::try_from(value).map_err(|_| {
                    Error::Unsupported(format!(
                        "value {value:#x} does not fit the 32-bit field at {:#x}",
                        self.offset
                    ))
                })?;
                if little_endian {
                    value.to_le_bytes().to_vec()
                } else {
                    value.to_be_bytes().to_vec()
                }
            }
            8 => {
                if little_endian {
                    value.to_le_bytes().to_vec()
                } else {
                    value.to_be_bytes().to_vec()
                }
            }
            _ => return Err(self.bad_width()),
        };

        let end = self.end()?;
        let target = data.get_mut(self.offset..end).ok_or_else(|| self.out_of_range())?;
        target.copy_from_slice(&encoded);
        Ok(())
    }

    fn bytes<'d>(&self, data: &'d [u8]) -> Result<&'d [u8]> {
        let end = self.end()?;
        data.get(self.offset..end).ok_or_else(|| self.out_of_range())
    }

    fn eight(&self, bytes: &[u8]) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&bytes[..8]);
        out
    }

    fn end(&self) -> Result<usize> {
        self.offset
            .checked_add(self.width)
            .ok_or_else(|| self.out_of_range())
    }

    fn out_of_range(&self) -> Error {
        Error::MachO(format!(
            "{}-byte field at {:#x} lies outside the slice",
            self.width, self.offset
        ))
    }

    fn bad_width(&self) -> Error {
        Error::MachO(format!("unsupported field width {}", self.width))
    }
}

/// Patchable fields of a segment command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentFields {
    pub vmsize: FieldDescriptor,
    pub fileoff: FieldDescriptor,
    pub filesize: FieldDescriptor,
}

impl SegmentFields {
    fn segment_64(command_offset: usize) -> Self {
        Self {
            vmsize: FieldDescriptor::u64(command_offset + 32),
            fileoff: FieldDescriptor::u64(command_offset + 40),
            filesize: FieldDescriptor::u64(command_offset + 48),
        }
    }

    fn segment_32(command_offset: usize) -> Self {
        Self {
            vmsize: FieldDescriptor::u32(command_offset + 28),
            fileoff: FieldDescriptor::u32(command_offset + 32),
            filesize: FieldDescriptor::u32(command_offset + 36),
        }
    }
}

/// Patchable fields of the `LC_CODE_SIGNATURE` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSignatureFields {
    pub dataoff: FieldDescriptor,
    pub datasize: FieldDescriptor,
}

impl CodeSignatureFields {
    fn new(command_offset: usize) -> Self {
        Self {
            dataoff: FieldDescriptor::u32(command_offset + 8),
            datasize: FieldDescriptor::u32(command_offset + 12),
        }
    }
}

/// One architecture of a binary, owning its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchSlice {
    /// Position in the fat arch table (0 for thin binaries).
    pub index: usize,
    /// CPU type.
    pub cputype: u32,
    /// CPU subtype.
    pub cpusubtype: u32,
    /// Alignment as a power of two.
    pub align: u32,
    /// Byte order of the slice's header.
    pub little_endian: bool,
    /// Is executable (MH_EXECUTE)
    pub is_executable: bool,
    /// __TEXT segment file size (for execSegLimit)
    pub text_size: u64,
    /// `__LINKEDIT` segment fields.
    pub linkedit: SegmentFields,
    /// `LC_CODE_SIGNATURE` fields.
    pub code_signature: CodeSignatureFields,
    data: Vec<u8>,
}

impl ArchSlice {
    /// Parse and validate one thin Mach-O image.
    pub fn parse(index: usize, data: Vec<u8>) -> Result<Self> {
        let macho = MachO::parse(&data, 0)
            .map_err(|e| Error::MachO(format!("Slice {}: {}", index, e)))?;
        let align = DEFAULT_SLICE_ALIGN;
        Self::from_macho(index, &macho, align, data.clone())
    }

    fn from_macho(index: usize, macho: &MachO, align: u32, data: Vec<u8>) -> Result<Self> {
        let mut linkedit = None;
        let mut code_signature = None;
        let mut text_size = 0u64;

        for lc in &macho.load_commands {
            match &lc.command {
                CommandVariant::Segment64(seg) => {
                    let name = segment_name(&seg.segname);
                    if name == TEXT {
                        text_size = seg.filesize;
                    } else if name == LINKEDIT {
                        set_once(&mut linkedit, SegmentFields::segment_64(lc.offset), index, "__LINKEDIT")?;
                    }
                }
                CommandVariant::Segment32(seg) => {
                    let name = segment_name(&seg.segname);
                    if name == TEXT {
                        text_size = seg.filesize as u64;
                    } else if name == LINKEDIT {
                        set_once(&mut linkedit, SegmentFields::segment_32(lc.offset), index, "__LINKEDIT")?;
                    }
                }
                CommandVariant::CodeSignature(_) => {
                    set_once(
                        &mut code_signature,
                        CodeSignatureFields::new(lc.offset),
                        index,
                        "LC_CODE_SIGNATURE",
                    )?;
                }
                _ => {}
            }
        }

        let linkedit = linkedit.ok_or_else(|| {
            Error::MachO(format!("Slice {}: no __LINKEDIT segment", index))
        })?;
        let code_signature = code_signature.ok_or_else(|| {
            Error::Unsupported(format!(
                "Slice {}: binary has no LC_CODE_SIGNATURE command to re-sign",
                index
            ))
        })?;

        let slice = Self {
            index,
            cputype: macho.header.cputype as u32,
            cpusubtype: macho.header.cpusubtype as u32,
            align,
            little_endian: macho.little_endian,
            is_executable: macho.header.filetype == MH_EXECUTE,
            text_size,
            linkedit,
            code_signature,
            data,
        };
        slice.validate()?;
        Ok(slice)
    }

    /// Check that the signature ends exactly where `__LINKEDIT` ends.
    pub fn validate(&self) -> Result<()> {
        let (offset, size) = self.signature_range()?;
        let signature_end = offset + size;
        let linkedit_end = self.linkedit_end()?;

        if signature_end != linkedit_end {
            return Err(Error::MachO(format!(
                "Slice {}: code signature ends at {:#x} but __LINKEDIT ends at {:#x}",
                self.index, signature_end, linkedit_end
            )));
        }
        if signature_end > self.data.len() as u64 {
            return Err(Error::MachO(format!(
                "Slice {}: code signature ends at {:#x}, past the end of the slice",
                self.index, signature_end
            )));
        }
        Ok(())
    }

    /// Slice bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the slice, returning its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Read a header field.
    pub fn read(&self, field: FieldDescriptor) -> Result<u64> {
        field.read(&self.data, self.little_endian)
    }

    /// Overwrite a header field in place.
    pub fn patch(&mut self, field: FieldDescriptor, value: u64) -> Result<()> {
        field.write(&mut self.data, value, self.little_endian)
    }

    /// Offset and size of the embedded signature.
    pub fn signature_range(&self) -> Result<(u64, u64)> {
        Ok((
            self.read(self.code_signature.dataoff)?,
            self.read(self.code_signature.datasize)?,
        ))
    }

    /// File offset one past the end of `__LINKEDIT`.
    pub fn linkedit_end(&self) -> Result<u64> {
        let fileoff = self.read(self.linkedit.fileoff)?;
        let filesize = self.read(self.linkedit.filesize)?;
        fileoff
            .checked_add(filesize)
            .ok_or_else(|| Error::MachO(format!("Slice {}: __LINKEDIT overflows", self.index)))
    }

    /// The current embedded signature, if any bytes are present.
    pub fn existing_signature(&self) -> Option<&[u8]> {
        let (offset, size) = self.signature_range().ok()?;
        if size == 0 {
            return None;
        }
        self.data.get(offset as usize..(offset + size) as usize)
    }

    /// Record a signature of `new_size` bytes in the header.
    ///
    /// The signature keeps its offset. `__LINKEDIT` filesize changes by the
    /// size difference and vmsize grows to the next page when exceeded.
    pub fn resize_signature(&mut self, new_size: usize) -> Result<()> {
        let (offset, old_size) = self.signature_range()?;
        let filesize = self.read(self.linkedit.filesize)?;
        let new_size = new_size as u64;

        let new_filesize = filesize
            .checked_sub(old_size)
            .and_then(|s| s.checked_add(new_size))
            .ok_or_else(|| {
                Error::MachO(format!("Slice {}: __LINKEDIT smaller than its signature", self.index))
            })?;

        self.patch(self.linkedit.filesize, new_filesize)?;
        if new_filesize > self.read(self.linkedit.vmsize)? {
            self.patch(self.linkedit.vmsize, align_to(new_filesize, SEGMENT_PAGE_SIZE))?;
        }
        self.patch(self.code_signature.dataoff, offset)?;
        self.patch(self.code_signature.datasize, new_size)?;
        Ok(())
    }

    /// Place `superblob` at the signature offset and trim the slice to the
    /// end of `__LINKEDIT`.
    pub fn write_signature(&mut self, superblob: &[u8]) -> Result<()> {
        let (offset, size) = self.signature_range()?;
        if size != superblob.len() as u64 {
            return Err(Error::MachO(format!(
                "Slice {}: header records a {} byte signature, got {}",
                self.index,
                size,
                superblob.len()
            )));
        }

        let end = usize::try_from(self.linkedit_end()?)
            .map_err(|_| Error::MachO(format!("Slice {}: __LINKEDIT too large", self.index)))?;
        self.data.truncate(offset as usize);
        self.data.resize(offset as usize, 0);
        self.data.extend_from_slice(superblob);
        self.data.resize(end, 0);
        Ok(())
    }
}

/// A parsed executable: one thin slice or a fat container of slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryContainer {
    fat: bool,
    slices: Vec<ArchSlice>,
}

impl BinaryContainer {
    /// Parse and validate a thin or fat binary.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let mach =
            Mach::parse(bytes).map_err(|e| Error::MachO(format!("Failed to parse: {}", e)))?;

        match mach {
            Mach::Binary(macho) => {
                let slice = ArchSlice::from_macho(0, &macho, DEFAULT_SLICE_ALIGN, bytes.to_vec())?;
                Ok(Self {
                    fat: false,
                    slices: vec![slice],
                })
            }
            Mach::Fat(fat) => {
                let mut slices = Vec::new();
                for (i, arch) in fat.iter_arches().enumerate() {
                    let arch = arch.map_err(|e| Error::MachO(format!("Fat arch {}: {}", i, e)))?;
                    if arch.align >= 32 {
                        return Err(Error::MachO(format!(
                            "Fat arch {}: alignment 2^{} is not supported",
                            i, arch.align
                        )));
                    }
                    let offset = arch.offset as usize;
                    let end = offset + arch.size as usize;
                    let slice_data = bytes.get(offset..end).ok_or_else(|| {
                        Error::MachO(format!("Fat arch {}: slice lies outside the file", i))
                    })?;

                    let macho = MachO::parse(slice_data, 0)
                        .map_err(|e| Error::MachO(format!("Slice {}: {}", i, e)))?;
                    slices.push(ArchSlice::from_macho(
                        i,
                        &macho,
                        arch.align,
                        slice_data.to_vec(),
                    )?);
                }
                if slices.is_empty() {
                    return Err(Error::MachO("Empty FAT binary".into()));
                }
                Ok(Self { fat: true, slices })
            }
        }
    }

    /// Whether the binary has a fat header.
    pub fn is_fat(&self) -> bool {
        self.fat
    }

    /// Architecture slices in file order.
    pub fn slices(&self) -> &[ArchSlice] {
        &self.slices
    }

    /// Mutable access to the slices.
    pub fn slices_mut(&mut self) -> &mut [ArchSlice] {
        &mut self.slices
    }

    /// Serialize the container.
    ///
    /// Thin binaries are the slice bytes. Fat binaries are re-laid out with
    /// each slice at an offset aligned to its recorded alignment.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.fat {
            return Ok(self.slices.first().map(|s| s.data().to_vec()).unwrap_or_default());
        }

        let header_size = FAT_HEADER_SIZE + self.slices.len() * FAT_ARCH_SIZE;
        let mut current_offset = align_to(header_size as u64, FAT_FIRST_SLICE_ALIGN as u64);
        let mut layout: Vec<(u32, u32)> = Vec::with_capacity(self.slices.len());

        for slice in &self.slices {
            current_offset = align_to(current_offset, 1u64 << slice.align);
            let offset = fat_u32(current_offset, "offset")?;
            let size = fat_u32(slice.data().len() as u64, "size")?;
            layout.push((offset, size));
            current_offset += slice.data().len() as u64;
        }

        let mut output = vec![0u8; current_offset as usize];
        write_u32_be(&mut output, 0, FAT_MAGIC);
        write_u32_be(&mut output, 4, self.slices.len() as u32);

        for (i, (slice, (offset, size))) in self.slices.iter().zip(&layout).enumerate() {
            let entry = FAT_HEADER_SIZE + i * FAT_ARCH_SIZE;
            write_u32_be(&mut output, entry, slice.cputype);
            write_u32_be(&mut output, entry + 4, slice.cpusubtype);
            write_u32_be(&mut output, entry + 8, *offset);
            write_u32_be(&mut output, entry + 12, *size);
            write_u32_be(&mut output, entry + 16, slice.align);

            let start = *offset as usize;
            output[start..start + slice.data().len()].copy_from_slice(slice.data());
        }

        Ok(output)
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, index: usize, what: &str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::MachO(format!("Slice {}: more than one {}", index, what)));
    }
    *slot = Some(value);
    Ok(())
}

fn segment_name(raw: &[u8; 16]) -> &[u8] {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..len]
}

fn fat_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        Error::Unsupported(format!("fat slice {} {:#x} exceeds 32 bits", what, value))
    })
}

/// Writes a u32 in big-endian format.
fn write_u32_be(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Aligns a value up to the specified power-of-two alignment.
pub fn align_to(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINKEDIT_OFF: usize = 0x4000;
    const LINKEDIT_DATA: usize = 0x40;

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_u64(buf: &mut Vec<u8>, v: u64) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn segment(buf: &mut Vec<u8>, name: &[u8], vmsize: u64, fileoff: u64, filesize: u64) {
        push_u32(buf, 0x19);
        push_u32(buf, 72);
        let mut segname = [0u8; 16];
        segname[..name.len()].copy_from_slice(name);
        buf.extend_from_slice(&segname);
        push_u64(buf, fileoff);
        push_u64(buf, vmsize);
        push_u64(buf, fileoff);
        push_u64(buf, filesize);
        push_u32(buf, 5);
        push_u32(buf, 5);
        push_u32(buf, 0);
        push_u32(buf, 0);
    }

    /// 64-bit little-endian executable with a signature of `sig_size` bytes.
    fn thin(sig_size: usize, with_signature: bool) -> Vec<u8> {
        let ncmds = if with_signature { 3 } else { 2 };
        let sizeofcmds = if with_signature { 160 } else { 144 };
        let linkedit_size = (LINKEDIT_DATA + sig_size) as u64;

        let mut buf = Vec::new();
        push_u32(&mut buf, 0xfeed_facf);
        push_u32(&mut buf, 0x0100_000c);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 2);
        push_u32(&mut buf, ncmds);
        push_u32(&mut buf, sizeofcmds);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 0);
        segment(&mut buf, b"__TEXT", 0x4000, 0, 0x4000);
        segment(&mut buf, b"__LINKEDIT", 0x4000, LINKEDIT_OFF as u64, linkedit_size);
        if with_signature {
            push_u32(&mut buf, 0x1d);
            push_u32(&mut buf, 16);
            push_u32(&mut buf, (LINKEDIT_OFF + LINKEDIT_DATA) as u32);
            push_u32(&mut buf, sig_size as u32);
        }
        buf.resize(LINKEDIT_OFF + LINKEDIT_DATA + sig_size, 0xab);
        buf
    }

    #[test]
    fn test_field_descriptor_endianness() {
        let mut data = vec![0u8; 12];
        FieldDescriptor::u32(0).write(&mut data, 0x1234_5678, true).unwrap();
        FieldDescriptor::u64(4).write(&mut data, 0x0102, false).unwrap();

        assert_eq!(&data[0..4], &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(&data[4..12], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(FieldDescriptor::u32(0).read(&data, true).unwrap(), 0x1234_5678);
        assert_eq!(FieldDescriptor::u64(4).read(&data, false).unwrap(), 0x0102);
    }

    #[test]
    fn test_field_descriptor_bounds() {
        let mut data = vec![0u8; 6];
        assert!(matches!(
            FieldDescriptor::u32(4).read(&data, true),
            Err(Error::MachO(_))
        ));
        assert!(matches!(
            FieldDescriptor::u32(0).write(&mut data, u64::from(u32::MAX) + 1, true),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_load_thin() {
        let container = BinaryContainer::load(&thin(0x20, true)).unwrap();
        assert!(!container.is_fat());

        let slice = &container.slices()[0];
        assert!(slice.is_executable);
        assert!(slice.little_endian);
        assert_eq!(slice.text_size, 0x4000);
        assert_eq!(slice.signature_range().unwrap(), (0x4040, 0x20));
        assert_eq!(slice.linkedit_end().unwrap(), 0x4060);
        assert_eq!(slice.existing_signature().map(<[u8]>::len), Some(0x20));
    }

    #[test]
    fn test_missing_code_signature_is_unsupported() {
        let mut data = thin(0, false);
        data.truncate(LINKEDIT_OFF + LINKEDIT_DATA);
        assert!(matches!(
            BinaryContainer::load(&data),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_signature_not_at_linkedit_end() {
        let mut data = thin(0x20, true);
        // Shrink datasize so something follows the signature inside __LINKEDIT
        let datasize_at = 32 + 72 + 72 + 12;
        data[datasize_at..datasize_at + 4].copy_from_slice(&0x10u32.to_le_bytes());
        assert!(matches!(BinaryContainer::load(&data), Err(Error::MachO(_))));
    }

    #[test]
    fn test_resize_and_write_signature() {
        let mut container = BinaryContainer::load(&thin(0, true)).unwrap();
        let slice = &mut container.slices_mut()[0];

        slice.resize_signature(0x5000).unwrap();
        assert_eq!(slice.signature_range().unwrap(), (0x4040, 0x5000));
        assert_eq!(slice.read(slice.linkedit.filesize).unwrap(), 0x5040);
        assert_eq!(slice.read(slice.linkedit.vmsize).unwrap(), 0x8000);

        slice.write_signature(&vec![0x11; 0x5000]).unwrap();
        assert_eq!(slice.data().len(), 0x4000 + 0x5040);
        assert_eq!(slice.data()[0x4040], 0x11);
        assert!(matches!(
            slice.write_signature(&[0u8; 4]),
            Err(Error::MachO(_))
        ));
    }

    #[test]
    fn test_fat_round_trip_layout() {
        let slice = ArchSlice::parse(0, thin(0x10, true)).unwrap();
        let mut second = slice.clone();
        second.index = 1;
        second.cpusubtype = 1;
        let container = BinaryContainer {
            fat: true,
            slices: vec![slice, second],
        };

        let bytes = container.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &FAT_MAGIC.to_be_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_be_bytes());
        // First slice at 16 KiB, second at the next 16 KiB boundary
        assert_eq!(&bytes[16..20], &0x4000u32.to_be_bytes());
        assert_eq!(&bytes[36..40], &0xc000u32.to_be_bytes());

        let reloaded = BinaryContainer::load(&bytes).unwrap();
        assert!(reloaded.is_fat());
        assert_eq!(reloaded.slices().len(), 2);
        assert_eq!(reloaded.slices()[1].cpusubtype, 1);
        assert_eq!(reloaded.slices()[1].data(), container.slices()[1].data());
    }

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 16), 0);
        assert_eq!(align_to(1, 16), 16);
        assert_eq!(align_to(17, 16), 32);
        assert_eq!(align_to(100, 0x4000), 0x4000);
    }
}
