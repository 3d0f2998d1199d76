#![allow(dead_code)]

use iosign::{CertificateStore, MemoryBundle, SigningCredentials, SigningIdentity};
use plist::{Dictionary, Value};
use std::cell::Cell;

pub const KEY_PEM: &str = include_str!("../data/unit-tester.key.pem");
pub const CERT_PEM: &str = include_str!("../data/unit-tester.crt.pem");

pub const CPU_TYPE_ARM64: u32 = 0x0100_000c;
pub const CPU_TYPE_X86_64: u32 = 0x0100_0007;

pub const TEXT_SIZE: usize = 0x4000;
pub const LINKEDIT_DATA: usize = 0x30;

const MH_MAGIC_64: u32 = 0xfeed_facf;
const LC_SEGMENT_64: u32 = 0x19;
const LC_CODE_SIGNATURE: u32 = 0x1d;

pub fn credentials() -> SigningCredentials {
    SigningCredentials::from_pem(CERT_PEM.as_bytes(), KEY_PEM.as_bytes()).unwrap()
}

pub fn certificate_der() -> Vec<u8> {
    credentials().identity().der.clone()
}

fn segment(buf: &mut Vec<u8>, name: &[u8], fileoff: u64, vmsize: u64, filesize: u64) {
    buf.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
    buf.extend_from_slice(&72u32.to_le_bytes());
    let mut segname = [0u8; 16];
    segname[..name.len()].copy_from_slice(name);
    buf.extend_from_slice(&segname);
    buf.extend_from_slice(&fileoff.to_le_bytes()); // vmaddr
    buf.extend_from_slice(&vmsize.to_le_bytes());
    buf.extend_from_slice(&fileoff.to_le_bytes());
    buf.extend_from_slice(&filesize.to_le_bytes());
    buf.extend_from_slice(&[0u8; 16]); // maxprot, initprot, nsects, flags
}

fn macho(cputype: u32, signature: Option<&[u8]>) -> Vec<u8> {
    let sig_len = signature.map(<[u8]>::len).unwrap_or(0);
    let (ncmds, sizeofcmds) = if signature.is_some() {
        (3u32, 160u32)
    } else {
        (2, 144)
    };

    let mut buf = Vec::new();
    for word in [MH_MAGIC_64, cputype, 0, 2, ncmds, sizeofcmds, 0, 0] {
        buf.extend_from_slice(&word.to_le_bytes());
    }
    segment(&mut buf, b"__TEXT", 0, TEXT_SIZE as u64, TEXT_SIZE as u64);
    segment(
        &mut buf,
        b"__LINKEDIT",
        TEXT_SIZE as u64,
        0x4000,
        (LINKEDIT_DATA + sig_len) as u64,
    );
    if signature.is_some() {
        for word in [
            LC_CODE_SIGNATURE,
            16,
            (TEXT_SIZE + LINKEDIT_DATA) as u32,
            sig_len as u32,
        ] {
            buf.extend_from_slice(&word.to_le_bytes());
        }
    }

    // Recognizable code bytes after the load commands
    let code_start = buf.len();
    buf.resize(TEXT_SIZE, 0);
    for (i, b) in buf[code_start..].iter_mut().enumerate() {
        *b = (i % 251) as u8;
    }
    buf.extend(std::iter::repeat(0xee).take(LINKEDIT_DATA));
    if let Some(signature) = signature {
        buf.extend_from_slice(signature);
    }
    buf
}

/// 64-bit executable whose existing signature is `signature`.
pub fn thin_macho(cputype: u32, signature: &[u8]) -> Vec<u8> {
    macho(cputype, Some(signature))
}

/// 64-bit executable without `LC_CODE_SIGNATURE`.
pub fn unsigned_macho() -> Vec<u8> {
    macho(CPU_TYPE_ARM64, None)
}

/// Fat container holding `slices`, each aligned to 16 KiB.
pub fn fat_macho(slices: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xcafe_babeu32.to_be_bytes());
    out.extend_from_slice(&(slices.len() as u32).to_be_bytes());

    let mut offset = 0x4000usize;
    let mut layout = Vec::new();
    for (cputype, data) in slices {
        for word in [*cputype, 0, offset as u32, data.len() as u32, 14] {
            out.extend_from_slice(&word.to_be_bytes());
        }
        layout.push(offset);
        offset = (offset + data.len() + 0x3fff) & !0x3fff;
    }
    for ((_, data), at) in slices.iter().zip(layout) {
        out.resize(at, 0);
        out.extend_from_slice(data);
    }
    out
}

pub fn info_plist(executable: &str, identifier: &str, rules: Option<&str>) -> Vec<u8> {
    let mut dict = Dictionary::new();
    dict.insert("CFBundleExecutable".into(), Value::String(executable.into()));
    dict.insert("CFBundleIdentifier".into(), Value::String(identifier.into()));
    if let Some(rules) = rules {
        dict.insert(
            "CFBundleResourceSpecification".into(),
            Value::String(rules.into()),
        );
    }
    let mut buf = Vec::new();
    Value::Dictionary(dict).to_writer_xml(&mut buf).unwrap();
    buf
}

pub fn profile_plist(app_id: &str, certificates: Vec<Vec<u8>>) -> Dictionary {
    let mut entitlements = Dictionary::new();
    entitlements.insert("application-identifier".into(), Value::String(app_id.into()));
    entitlements.insert(
        "keychain-access-groups".into(),
        Value::Array(vec![Value::String("ABCDE12345.*".into())]),
    );
    entitlements.insert("get-task-allow".into(), Value::Boolean(true));

    let mut dict = Dictionary::new();
    dict.insert(
        "ApplicationIdentifierPrefix".into(),
        Value::Array(vec![Value::String("ABCDE12345".into())]),
    );
    dict.insert(
        "DeveloperCertificates".into(),
        Value::Array(certificates.into_iter().map(Value::Data).collect()),
    );
    dict.insert("Name".into(), Value::String("Test Profile".into()));
    dict.insert(
        "ProvisionedDevices".into(),
        Value::Array(vec![Value::String("00008030-001A2B3C4D5E6F70".into())]),
    );
    dict.insert("Entitlements".into(), Value::Dictionary(entitlements));
    dict
}

/// Wrap a profile plist the way a `.mobileprovision` container stores it.
pub fn mobileprovision(plist: &Dictionary) -> Vec<u8> {
    let mut payload = Vec::new();
    Value::Dictionary(plist.clone())
        .to_writer_xml(&mut payload)
        .unwrap();

    let mut raw = vec![0x30, 0x82, 0x1f, 0x00, 0x06, 0x09, 0x2a, 0x04, 0x82];
    raw.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    raw.extend_from_slice(&payload);
    raw.extend_from_slice(b"\xa0\x82\x0d\x00 signer info follows");
    raw
}

/// Profile with a concrete application identifier listing the test certificate.
pub fn default_profile() -> Vec<u8> {
    mobileprovision(&profile_plist(
        "ABCDE12345.com.test.app",
        vec![certificate_der()],
    ))
}

pub fn bundle_with(executable: Vec<u8>) -> MemoryBundle {
    MemoryBundle::new()
        .with_file("Info.plist", info_plist("App", "com.test.app", None))
        .with_file("App", executable)
        .with_file("Assets.car", b"asset catalog".to_vec())
        .with_file("Base.lproj/Main.storyboardc/Info.plist", b"nib".to_vec())
        .with_file("Frameworks/Lib.framework/Lib", b"framework".to_vec())
        .with_file("_CodeSignature/CodeResources", b"stale manifest".to_vec())
}

/// Certificate store returning fixed-length fake signatures.
pub struct FakeStore {
    identity: Option<SigningIdentity>,
    signature_len: usize,
    growth: usize,
    calls: Cell<usize>,
}

impl FakeStore {
    /// Store holding the test certificate.
    pub fn new() -> Self {
        Self {
            identity: Some(credentials().identity().clone()),
            signature_len: 512,
            growth: 0,
            calls: Cell::new(0),
        }
    }

    /// Store holding no certificate at all.
    pub fn empty() -> Self {
        Self {
            identity: None,
            ..Self::new()
        }
    }

    /// Store whose signatures grow by `growth` bytes on every call.
    pub fn growing(growth: usize) -> Self {
        Self {
            growth,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl CertificateStore for FakeStore {
    fn find_certificate(&self, serial: &[u8]) -> Option<SigningIdentity> {
        self.identity
            .as_ref()
            .filter(|identity| identity.matches_serial(serial))
            .cloned()
    }

    fn sign(&self, _identity: &SigningIdentity, code_directory: &[u8]) -> iosign::Result<Vec<u8>> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        let len = self.signature_len + call * self.growth;
        let seed = code_directory.len() as u8;
        Ok((0..len).map(|i| seed.wrapping_add(i as u8)).collect())
    }
}

/// Read a big-endian u32 out of a blob.
pub fn be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Hash stored in special slot `slot` (1-based) of a code directory.
pub fn special_slot(code_directory: &[u8], slot: usize) -> &[u8] {
    let hash_offset = be_u32(code_directory, 16) as usize;
    let hash_size = code_directory[36] as usize;
    let start = hash_offset - slot * hash_size;
    &code_directory[start..start + hash_size]
}

/// Hash of code page `page` in a code directory.
pub fn code_slot(code_directory: &[u8], page: usize) -> &[u8] {
    let hash_offset = be_u32(code_directory, 16) as usize;
    let hash_size = code_directory[36] as usize;
    let start = hash_offset + page * hash_size;
    &code_directory[start..start + hash_size]
}
