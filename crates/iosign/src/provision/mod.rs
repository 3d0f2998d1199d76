//! Provisioning profiles and the entitlements derived from them

pub mod entitlements;
pub mod parser;
pub mod profile;

pub use parser::parse_profile;
pub use profile::ProvisioningProfile;
