//! Error types for iosign operations.
//!
//! This module defines the [`enum@Error`] enum covering every way a signing run
//! can fail, and [`ErrorKind`], which buckets those failures into the classes a
//! caller needs to decide what to tell the user:
//!
//! | Kind | Meaning |
//! |------|---------|
//! | [`ErrorKind::Configuration`] | missing profile, unmatched certificate, missing override file |
//! | [`ErrorKind::MalformedInput`] | plist without a required key, profile without a payload, broken Mach-O |
//! | [`ErrorKind::InternalConsistency`] | the two signing passes disagreed on the signature size |
//! | [`ErrorKind::Unsupported`] | binaries that were never signed, 32-bit fields that overflow |
//! | [`ErrorKind::Io`] | reading or writing bundle members |
//!
//! No error is retried inside the crate. Every failure is terminal for the
//! binary being signed and nothing is persisted after one.

use thiserror::Error;

/// Error type for iosign operations.
///
/// # Examples
///
/// ```no_run
/// use iosign::{CodeSignatureBuilder, CredentialStore, DirectoryBundle, Error, ErrorKind};
///
/// let store = CredentialStore::new();
/// let mut bundle = DirectoryBundle::new("Payload/App.app");
/// let profile = std::fs::read("App.mobileprovision")?;
///
/// match CodeSignatureBuilder::new(&store).provisioning_profile(profile).sign(&mut bundle) {
///     Ok(report) => println!("signed {} slice(s)", report.slices.len()),
///     Err(e) if e.kind() == ErrorKind::Configuration => eprintln!("fix your setup: {e}"),
///     Err(e) => eprintln!("signing failed: {e}"),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A bundle member the run depends on does not exist.
    #[error("Bundle file not found: {0}")]
    FileNotFound(String),

    /// Property list parsing or serialization failed.
    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),

    /// A property list decoded but has the wrong shape.
    #[error("Invalid plist: {0}")]
    InvalidPlist(String),

    /// A property list is missing a key the signing run requires.
    #[error("Missing required key `{key}` in {document}")]
    MissingKey {
        /// Name of the absent key.
        key: &'static str,
        /// Human readable name of the document that was searched.
        document: &'static str,
    },

    /// Invalid or malformed provisioning profile.
    #[error("Invalid provisioning profile: {0}")]
    ProvisioningProfile(String),

    /// Invalid Mach-O or fat container structure.
    #[error("Invalid Mach-O: {0}")]
    MachO(String),

    /// Invalid or unusable certificate material.
    #[error("Invalid certificate: {0}")]
    Certificate(String),

    /// Invalid or incomplete signing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The certificate store holds no certificate matching the profile.
    #[error("No installed certificate matches any of the {candidates} certificate(s) in provisioning profile '{profile}'")]
    CertificateNotFound {
        /// Name of the provisioning profile.
        profile: String,
        /// Number of developer certificates the profile listed.
        candidates: usize,
    },

    /// Signature generation failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The final superblob differs in size from the sizing pass.
    ///
    /// The header was already patched for `expected` bytes, so the output
    /// would be inconsistent. Retrying with the same inputs reproduces it.
    #[error("Signature size changed between passes for slice {slice}: sized {expected} bytes, final {actual} bytes")]
    SignatureSizeMismatch {
        /// Index of the architecture slice.
        slice: usize,
        /// Superblob length from the sizing pass.
        expected: usize,
        /// Superblob length from the final pass.
        actual: usize,
    },

    /// The input uses a configuration this crate rejects.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Coarse classification of an [`enum@Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller's setup is incomplete or does not match.
    Configuration,
    /// An input document or binary is structurally broken.
    MalformedInput,
    /// An algorithm invariant was violated.
    InternalConsistency,
    /// The input is valid but outside what this crate handles.
    Unsupported,
    /// The underlying file system failed.
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Config(_) | Error::CertificateNotFound { .. } | Error::Certificate(_) => {
                ErrorKind::Configuration
            }
            Error::FileNotFound(_)
            | Error::Plist(_)
            | Error::InvalidPlist(_)
            | Error::MissingKey { .. }
            | Error::ProvisioningProfile(_)
            | Error::MachO(_) => ErrorKind::MalformedInput,
            Error::Signing(_) | Error::SignatureSizeMismatch { .. } => {
                ErrorKind::InternalConsistency
            }
            Error::Unsupported(_) => ErrorKind::Unsupported,
        }
    }
}
