//! Certificate and private key handling for code signing.
//!
//! This module loads signing credentials from PEM-encoded files or PKCS#12 (.p12)
//! containers and exposes them through [`CredentialStore`], the in-process
//! [`CertificateStore`] implementation.
//!
//! # Supported Formats
//!
//! - **PEM**: Separate certificate and PKCS#8 private key (unencrypted keys only)
//! - **PKCS#12**: Combined certificate and key in a password-protected container
//!
//! # Examples
//!
//! ```no_run
//! use iosign::crypto::{CredentialStore, SigningCredentials};
//! use secrecy::SecretString;
//!
//! let p12_data = std::fs::read("certificate.p12")?;
//! let password = SecretString::new("password".into());
//! let credentials = SigningCredentials::from_p12(&p12_data, &password)?;
//!
//! let store = CredentialStore::new().with_credentials(credentials);
//! # Ok::<(), iosign::Error>(())
//! ```

use super::cms::sign_code_directory;
use super::store::{CertificateStore, SigningIdentity};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use x509_certificate::{CapturedX509Certificate, InMemorySigningKeyPair};

/// Code signing credentials containing certificate, private key, and certificate chain.
///
/// # Security
///
/// The private key contained in this struct should be treated as sensitive data.
/// [`SigningCredentials`] does not implement `Debug`.
pub struct SigningCredentials {
    /// X.509 signing certificate identifying the developer or organization.
    pub certificate: CapturedX509Certificate,

    /// Private key corresponding to the certificate's public key.
    pub signing_key: InMemorySigningKeyPair,

    /// Intermediate CA certificates embedded alongside the signing certificate.
    pub cert_chain: Vec<CapturedX509Certificate>,

    identity: SigningIdentity,
}

impl SigningCredentials {
    /// Assemble credentials from parsed parts.
    pub fn new(
        certificate: CapturedX509Certificate,
        signing_key: InMemorySigningKeyPair,
        cert_chain: Vec<CapturedX509Certificate>,
    ) -> Self {
        let identity = SigningIdentity::from_certificate(&certificate);
        Self {
            certificate,
            signing_key,
            cert_chain,
            identity,
        }
    }

    /// Load credentials from a PEM-encoded certificate and PKCS#8 private key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] if either document is malformed or the
    /// key algorithm is not supported.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let certificate = CapturedX509Certificate::from_pem(cert_pem)
            .map_err(|e| Error::Certificate(format!("Failed to parse certificate PEM: {}", e)))?;

        let signing_key = InMemorySigningKeyPair::from_pkcs8_pem(key_pem)
            .map_err(|e| Error::Certificate(format!("Failed to parse private key PEM: {}", e)))?;

        Ok(Self::new(certificate, signing_key, Vec::new()))
    }

    /// Load credentials from a PKCS#12 (.p12) container.
    ///
    /// The first certificate is the signing certificate; any further
    /// certificates form the chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] if:
    /// - The PKCS#12 data is malformed
    /// - The password is incorrect
    /// - No certificate or no private key is found in the container
    pub fn from_p12(p12_data: &[u8], password: &SecretString) -> Result<Self> {
        let password = password.expose_secret();

        let pfx = p12::PFX::parse(p12_data)
            .map_err(|e| Error::Certificate(format!("Failed to parse PKCS#12: {:?}", e)))?;

        let keys = pfx.key_bags(password).map_err(|e| {
            Error::Certificate(format!("Failed to extract keys from PKCS#12: {:?}", e))
        })?;

        let certs = pfx.cert_x509_bags(password).map_err(|e| {
            Error::Certificate(format!("Failed to extract certs from PKCS#12: {:?}", e))
        })?;

        let Some(cert_der) = certs.first() else {
            return Err(Error::Certificate("No certificate in PKCS#12".into()));
        };
        let Some(key_der) = keys.first() else {
            return Err(Error::Certificate("No private key in PKCS#12".into()));
        };

        let certificate = CapturedX509Certificate::from_der(cert_der.clone())
            .map_err(|e| Error::Certificate(format!("Failed to parse certificate DER: {}", e)))?;

        let signing_key = InMemorySigningKeyPair::from_pkcs8_der(key_der)
            .map_err(|e| Error::Certificate(format!("Failed to parse private key DER: {}", e)))?;

        let cert_chain: Vec<CapturedX509Certificate> = certs
            .iter()
            .skip(1)
            .filter_map(|der| CapturedX509Certificate::from_der(der.clone()).ok())
            .collect();

        Ok(Self::new(certificate, signing_key, cert_chain))
    }

    /// Description of the signing certificate.
    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    /// Apple Team ID from the certificate's organizational unit.
    pub fn team_id(&self) -> Option<&str> {
        self.identity.team_id.as_deref()
    }
}

/// A [`CertificateStore`] holding credentials loaded into the process.
#[derive(Default)]
pub struct CredentialStore {
    credentials: Vec<SigningCredentials>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add credentials.
    pub fn add(&mut self, credentials: SigningCredentials) {
        debug!(
            common_name = credentials.identity.common_name.as_deref().unwrap_or("?"),
            "loaded signing credentials"
        );
        self.credentials.push(credentials);
    }

    /// Add credentials, builder style.
    pub fn with_credentials(mut self, credentials: SigningCredentials) -> Self {
        self.add(credentials);
        self
    }

    /// Number of loaded credentials.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    fn lookup(&self, serial: &[u8]) -> Option<&SigningCredentials> {
        self.credentials
            .iter()
            .find(|c| c.identity.matches_serial(serial))
    }
}

impl CertificateStore for CredentialStore {
    fn find_certificate(&self, serial: &[u8]) -> Option<SigningIdentity> {
        self.lookup(serial).map(|c| c.identity.clone())
    }

    fn sign(&self, identity: &SigningIdentity, code_directory: &[u8]) -> Result<Vec<u8>> {
        let credentials = self.lookup(&identity.serial).ok_or_else(|| {
            Error::Signing("certificate is no longer present in the credential store".into())
        })?;

        sign_code_directory(
            code_directory,
            &credentials.signing_key,
            &credentials.certificate,
            &credentials.cert_chain,
        )
    }
}
