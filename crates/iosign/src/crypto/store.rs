//! Certificate store abstraction.
//!
//! The signing core never reaches for a platform keychain. It asks a
//! [`CertificateStore`] for a certificate by serial number and hands it the
//! code directory to sign.

use crate::provision::ProvisioningProfile;
use crate::{Error, Result};
use tracing::{debug, info};
use x509_certificate::CapturedX509Certificate;

/// A certificate the store is able to sign with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    /// Serial number, big-endian, as encoded in the certificate.
    pub serial: Vec<u8>,
    /// Subject common name.
    pub common_name: Option<String>,
    /// Apple team id from the subject's organizational unit.
    pub team_id: Option<String>,
    /// DER encoded certificate.
    pub der: Vec<u8>,
}

impl SigningIdentity {
    /// Describe a DER encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let cert = CapturedX509Certificate::from_der(der.to_vec())
            .map_err(|e| Error::Certificate(format!("Failed to parse certificate DER: {}", e)))?;
        Ok(Self::from_certificate(&cert))
    }

    /// Describe a parsed certificate.
    pub fn from_certificate(cert: &CapturedX509Certificate) -> Self {
        let subject = cert.subject_name();
        let common_name = subject
            .iter_common_name()
            .find_map(|atav| atav.to_string().ok());
        let team_id = subject
            .iter_organizational_unit()
            .find_map(|atav| atav.to_string().ok());

        Self {
            serial: cert.serial_number_asn1().as_slice().to_vec(),
            common_name,
            team_id,
            der: cert.constructed_data().to_vec(),
        }
    }

    /// Whether this identity carries `serial`, ignoring DER sign padding.
    pub fn matches_serial(&self, serial: &[u8]) -> bool {
        serials_equal(&self.serial, serial)
    }
}

/// Compare two serial numbers, ignoring leading zero bytes.
pub fn serials_equal(a: &[u8], b: &[u8]) -> bool {
    fn trim(s: &[u8]) -> &[u8] {
        let start = s.iter().position(|&b| b != 0).unwrap_or(s.len());
        &s[start..]
    }
    trim(a) == trim(b)
}

/// Source of signing certificates and detached signatures.
///
/// Lookups must be side-effect free; the signing run may query the store
/// several times.
pub trait CertificateStore {
    /// Find an installed certificate with the given serial number.
    fn find_certificate(&self, serial: &[u8]) -> Option<SigningIdentity>;

    /// Produce a detached CMS signature over `code_directory` with `identity`.
    fn sign(&self, identity: &SigningIdentity, code_directory: &[u8]) -> Result<Vec<u8>>;
}

/// Find the first profile certificate the store can sign with.
///
/// Certificates are tried in profile order.
pub fn resolve_certificate(
    store: &dyn CertificateStore,
    profile: &ProvisioningProfile,
) -> Result<SigningIdentity> {
    let serials = profile.certificate_serials();
    for serial in &serials {
        if let Some(identity) = store.find_certificate(serial) {
            info!(
                common_name = identity.common_name.as_deref().unwrap_or("?"),
                team_id = identity.team_id.as_deref().unwrap_or("?"),
                "using signing certificate"
            );
            return Ok(identity);
        }
        debug!(serial = %hex(serial), "no installed certificate for profile serial");
    }

    Err(Error::CertificateNotFound {
        profile: profile.name().to_string(),
        candidates: serials.len(),
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
