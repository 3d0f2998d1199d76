//! CMS signing with Apple CDHash attributes
//!
//! The signature is detached: the signed content is the code directory blob,
//! which is not embedded. Two Apple signed attributes carry the code
//! directory hash so the kernel can match the signature to the directory.

use crate::codesign::code_directory::{code_directory_digest, DigestType};
use crate::{Error, Result};
use bcder::{encode::Values, Captured, Mode, OctetString, Oid};
use cryptographic_message_syntax::{SignedDataBuilder, SignerBuilder};
use plist::{Dictionary, Value};
use x509_certificate::{rfc5652::AttributeValue, CapturedX509Certificate, KeyInfoSigner};

/// Apple CDHash v1 OID: 1.2.840.113635.100.9.1
/// Contains a plist with the truncated CDHash
pub const APPLE_CDHASH_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x63, 0x64, 0x09, 0x01];

/// Apple CDHash v2 OID: 1.2.840.113635.100.9.2
/// Contains SEQUENCE { OID digest, OCTET STRING hash }
pub const APPLE_CDHASH_V2_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x63, 0x64, 0x09, 0x02];

/// SHA-1 OID: 1.3.14.3.2.26
const SHA1_OID: &[u8] = &[0x2b, 0x0e, 0x03, 0x02, 0x1a];

/// SHA-256 OID: 2.16.840.1.101.3.4.2.1
const SHA256_OID: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];

/// Length of a CDHash as it appears in the v1 plist
const TRUNCATED_CDHASH_LEN: usize = 20;

/// Generate a detached CMS signature over a code directory.
///
/// The CDHash is computed with the digest the code directory itself declares.
///
/// # Arguments
///
/// * `code_directory` - The serialized code directory blob
/// * `signing_key` - The private key implementing KeyInfoSigner trait
/// * `signing_cert` - The signing certificate
/// * `cert_chain` - Certificate chain (intermediate CAs)
pub fn sign_code_directory<K: KeyInfoSigner>(
    code_directory: &[u8],
    signing_key: &K,
    signing_cert: &CapturedX509Certificate,
    cert_chain: &[CapturedX509Certificate],
) -> Result<Vec<u8>> {
    let digest = code_directory_digest(code_directory).ok_or_else(|| {
        Error::Signing("code directory declares no supported hash type".into())
    })?;
    let cdhash = digest.digest(code_directory);

    let cdhash_plist = build_cdhash_plist(&cdhash)?;
    let cdhash_v2_value = build_cdhash_v2_attribute(digest, &cdhash);

    let cdhash_v1_oid = Oid(cryptographic_message_syntax::Bytes::copy_from_slice(
        APPLE_CDHASH_OID,
    ));
    let cdhash_v2_oid = Oid(cryptographic_message_syntax::Bytes::copy_from_slice(
        APPLE_CDHASH_V2_OID,
    ));

    let cdhash_v1_attr_value = AttributeValue::new(Captured::from_values(
        Mode::Der,
        OctetString::encode_slice(&cdhash_plist),
    ));
    let cdhash_v2_attr_value = AttributeValue::new(Captured::from_values(
        Mode::Der,
        CdHashV2Encoder(&cdhash_v2_value),
    ));

    let signer = SignerBuilder::new(signing_key, signing_cert.clone())
        .signed_attribute(cdhash_v1_oid, vec![cdhash_v1_attr_value])
        .signed_attribute(cdhash_v2_oid, vec![cdhash_v2_attr_value]);

    let mut builder = SignedDataBuilder::default()
        .content_external(code_directory.to_vec())
        .signer(signer);

    for cert in cert_chain {
        builder = builder.certificate(cert.clone());
    }

    builder
        .build_der()
        .map_err(|e| Error::Signing(format!("Failed to build CMS signature: {}", e)))
}

/// Build the CDHash v1 attribute plist.
///
/// A dictionary with a single `cdhashes` array holding the CDHash truncated
/// to 20 bytes.
pub fn build_cdhash_plist(cdhash: &[u8]) -> Result<Vec<u8>> {
    let truncated = &cdhash[..cdhash.len().min(TRUNCATED_CDHASH_LEN)];

    let mut dict = Dictionary::new();
    dict.insert(
        "cdhashes".to_string(),
        Value::Array(vec![Value::Data(truncated.to_vec())]),
    );

    let mut buf = Vec::new();
    Value::Dictionary(dict).to_writer_xml(&mut buf)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Build the CDHash v2 attribute value.
///
/// Format: SEQUENCE { OBJECT digest, OCTET STRING hash }
fn build_cdhash_v2_attribute(digest: DigestType, cdhash: &[u8]) -> Vec<u8> {
    let digest_oid = match digest {
        DigestType::Sha1 => SHA1_OID,
        DigestType::Sha256 => SHA256_OID,
    };

    let mut oid = vec![0x06, digest_oid.len() as u8];
    oid.extend_from_slice(digest_oid);

    let mut hash_octet = vec![0x04, cdhash.len() as u8];
    hash_octet.extend_from_slice(cdhash);

    let mut result = vec![0x30, (oid.len() + hash_octet.len()) as u8];
    result.extend_from_slice(&oid);
    result.extend_from_slice(&hash_octet);
    result
}

struct CdHashV2Encoder<'a>(&'a [u8]);

impl<'a> Values for CdHashV2Encoder<'a> {
    fn encoded_len(&self, _mode: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: std::io::Write>(
        &self,
        _mode: Mode,
        target: &mut W,
    ) -> std::result::Result<(), std::io::Error> {
        target.write_all(self.0)
    }
}
