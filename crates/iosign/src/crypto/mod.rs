//! Signing identities and CMS signature generation.

pub mod cms;
pub mod credentials;
pub mod store;

pub use credentials::{CredentialStore, SigningCredentials};
pub use store::{resolve_certificate, CertificateStore, SigningIdentity};
