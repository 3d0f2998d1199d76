//! Provisioning profile model.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use plist::{Dictionary, Value};
use tracing::warn;
use x509_certificate::X509Certificate;

/// Name reported for profiles without a `Name` key.
pub const UNKNOWN_PROFILE_NAME: &str = "(unknown)";

/// A parsed provisioning profile.
///
/// Constructed once from the profile bytes and immutable afterwards. The raw
/// plist is retained so the entitlements template can be derived on demand
/// for any bundle identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningProfile {
    app_id_prefix: Option<String>,
    developer_certificates: Vec<Vec<u8>>,
    name: String,
    provisioned_devices: Vec<String>,
    plist: Dictionary,
}

impl ProvisioningProfile {
    /// Parse a profile from the raw bytes of a `.mobileprovision` file.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        super::parser::parse_profile(raw)
    }

    /// Build a profile from an already decoded plist dictionary.
    pub fn from_plist(plist: Dictionary) -> Result<Self> {
        let app_id_prefix = match plist.get("ApplicationIdentifierPrefix") {
            Some(Value::Array(prefixes)) => {
                if prefixes.len() > 1 {
                    warn!(
                        count = prefixes.len(),
                        "profile lists multiple application identifier prefixes, using the first"
                    );
                }
                prefixes
                    .first()
                    .map(|p| {
                        p.as_string().map(str::to_string).ok_or_else(|| {
                            Error::ProvisioningProfile(
                                "ApplicationIdentifierPrefix entries must be strings".into(),
                            )
                        })
                    })
                    .transpose()?
            }
            Some(Value::String(prefix)) => Some(prefix.clone()),
            Some(_) => {
                return Err(Error::ProvisioningProfile(
                    "ApplicationIdentifierPrefix is not an array".into(),
                ))
            }
            None => None,
        };

        let developer_certificates = match plist.get("DeveloperCertificates") {
            Some(Value::Array(certs)) => certs
                .iter()
                .enumerate()
                .map(|(i, cert)| decode_certificate(i, cert))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(Error::ProvisioningProfile(
                    "DeveloperCertificates is not an array".into(),
                ))
            }
            None => Vec::new(),
        };
        if developer_certificates.is_empty() {
            warn!("profile lists no developer certificates");
        }

        let name = plist
            .get("Name")
            .and_then(Value::as_string)
            .unwrap_or(UNKNOWN_PROFILE_NAME)
            .to_string();

        let provisioned_devices = plist
            .get("ProvisionedDevices")
            .and_then(Value::as_array)
            .map(|devices| {
                devices
                    .iter()
                    .filter_map(Value::as_string)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            app_id_prefix,
            developer_certificates,
            name,
            provisioned_devices,
            plist,
        })
    }

    /// First application identifier prefix (usually the team id).
    pub fn app_id_prefix(&self) -> Option<&str> {
        self.app_id_prefix.as_deref()
    }

    /// DER encoded developer certificates in profile order.
    pub fn developer_certificates(&self) -> &[Vec<u8>] {
        &self.developer_certificates
    }

    /// Human readable profile name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device identifiers as listed in the profile.
    pub fn provisioned_devices(&self) -> &[String] {
        &self.provisioned_devices
    }

    /// Whether `udid` is provisioned. Comparison ignores ASCII case.
    pub fn contains_device(&self, udid: &str) -> bool {
        self.provisioned_devices
            .iter()
            .any(|d| d.eq_ignore_ascii_case(udid))
    }

    /// Serial numbers of the developer certificates, in profile order.
    ///
    /// Certificates that fail to decode are skipped with a warning.
    pub fn certificate_serials(&self) -> Vec<Vec<u8>> {
        self.developer_certificates
            .iter()
            .enumerate()
            .filter_map(|(i, der)| match X509Certificate::from_der(der) {
                Ok(cert) => Some(cert.serial_number_asn1().as_slice().to_vec()),
                Err(e) => {
                    warn!(index = i, error = %e, "skipping undecodable developer certificate");
                    None
                }
            })
            .collect()
    }

    /// The decoded profile plist.
    pub fn plist(&self) -> &Dictionary {
        &self.plist
    }

    /// Serialize the profile plist back to XML.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        Value::Dictionary(self.plist.clone()).to_writer_xml(&mut buf)?;
        Ok(buf)
    }

    /// Entitlements template specialized for `bundle_id`.
    ///
    /// A wildcard `application-identifier` becomes `{prefix}.{bundle_id}` and
    /// every `keychain-access-groups` entry containing a wildcard is replaced
    /// in full by that same identifier. Without a wildcard the entitlements
    /// are returned as listed in the profile.
    pub fn entitlements(&self, bundle_id: &str) -> Result<Dictionary> {
        let mut entitlements = self
            .plist
            .get("Entitlements")
            .and_then(Value::as_dictionary)
            .cloned()
            .ok_or(Error::MissingKey {
                key: "Entitlements",
                document: "provisioning profile",
            })?;

        let wildcard = entitlements
            .get("application-identifier")
            .and_then(Value::as_string)
            .is_some_and(|id| id.contains('*'));
        if !wildcard {
            return Ok(entitlements);
        }

        let prefix = self.app_id_prefix.as_deref().ok_or_else(|| {
            Error::ProvisioningProfile(
                "wildcard application-identifier without an ApplicationIdentifierPrefix".into(),
            )
        })?;
        let qualified = format!("{prefix}.{bundle_id}");

        entitlements.insert(
            "application-identifier".to_string(),
            Value::String(qualified.clone()),
        );

        if let Some(Value::Array(groups)) = entitlements.get_mut("keychain-access-groups") {
            for group in groups.iter_mut() {
                if group.as_string().is_some_and(|g| g.contains('*')) {
                    *group = Value::String(qualified.clone());
                }
            }
        }

        Ok(entitlements)
    }
}

fn decode_certificate(index: usize, value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Data(der) => Ok(der.clone()),
        Value::String(encoded) => {
            let compact: String = encoded.split_whitespace().collect();
            STANDARD.decode(compact).map_err(|e| {
                Error::ProvisioningProfile(format!("developer certificate {index}: {e}"))
            })
        }
        _ => Err(Error::ProvisioningProfile(format!(
            "developer certificate {index} is neither data nor a string"
        ))),
    }
}
