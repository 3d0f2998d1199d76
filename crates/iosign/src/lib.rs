//! iOS code signing core.
//!
//! Parses a provisioning profile, derives the entitlements, hashes the
//! bundle's resources and embeds a CMS-signed code signature into the main
//! executable, re-signing each slice of a fat binary in place.
//!
//! The entry point is [`CodeSignatureBuilder`]. Certificates come from a
//! [`CertificateStore`]; [`CredentialStore`] is the in-process implementation
//! backed by PEM or PKCS#12 credentials.

pub mod builder;
pub mod bundle;
pub mod codesign;
pub mod crypto;
pub mod error;
pub mod macho;
pub mod provision;

pub use builder::{CodeSignatureBuilder, SigningReport};
pub use bundle::{BundleFileSystem, DirectoryBundle, MemoryBundle};
pub use codesign::DigestType;
pub use crypto::{CertificateStore, CredentialStore, SigningCredentials, SigningIdentity};
pub use error::{Error, ErrorKind};
pub use macho::BinaryContainer;
pub use provision::ProvisioningProfile;

pub type Result<T> = std::result::Result<T, Error>;
