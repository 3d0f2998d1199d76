//! CodeSignatureBuilder API
//!
//! Sequences one signing run over an app bundle:
//!
//! 1. load the Info.plist through the [`MetadataLoader`]
//! 2. parse the provisioning profile
//! 3. resolve a signing certificate from the [`CertificateStore`]
//! 4. derive the entitlements and merge the override file
//! 5. settle the resource rules key and hash the bundle
//! 6. parse the executable and sign every slice twice
//! 7. write Info.plist, rules file, CodeResources and the executable
//!
//! Everything up to step 7 happens in memory. A failure at any step leaves
//! the bundle exactly as it was.

use crate::bundle::{
    BundleFileSystem, InfoPlistLoader, MetadataLoader, ResourceManifestBuilder, INFO_PLIST,
};
use crate::codesign::DigestType;
use crate::crypto::{resolve_certificate, CertificateStore};
use crate::macho::{BinaryContainer, SignedSliceReport, SigningMaterial, SliceSigner};
use crate::provision::entitlements::{load_override, merge_entitlements, to_xml};
use crate::provision::ProvisioningProfile;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Summary of a completed signing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningReport {
    /// Bundle-relative path of the signed executable.
    pub executable: String,
    /// One entry per architecture slice.
    pub slices: Vec<SignedSliceReport>,
    /// Entitlements plist embedded in every slice.
    pub entitlements: String,
    /// Number of files recorded in CodeResources.
    pub resource_count: usize,
}

/// iOS code signing with builder pattern API.
///
/// # Example
///
/// ```no_run
/// use iosign::{CodeSignatureBuilder, CredentialStore, DirectoryBundle, SigningCredentials};
///
/// let credentials = SigningCredentials::from_pem(
///     &std::fs::read("cert.pem")?,
///     &std::fs::read("key.pem")?,
/// )?;
/// let store = CredentialStore::new().with_credentials(credentials);
///
/// let mut bundle = DirectoryBundle::new("Payload/App.app");
/// let report = CodeSignatureBuilder::new(&store)
///     .provisioning_profile(std::fs::read("App.mobileprovision")?)
///     .entitlements_override("App.entitlements")
///     .sign(&mut bundle)?;
/// println!("{} resources", report.resource_count);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct CodeSignatureBuilder<'s> {
    store: &'s dyn CertificateStore,
    provisioning_profile: Option<Vec<u8>>,
    entitlements_override: Option<PathBuf>,
    require_entitlements_override: bool,
    preserve_requirements: bool,
    digest: DigestType,
    metadata_loader: Box<dyn MetadataLoader + 's>,
}

impl<'s> CodeSignatureBuilder<'s> {
    /// Create a builder signing with certificates from `store`.
    pub fn new(store: &'s dyn CertificateStore) -> Self {
        Self {
            store,
            provisioning_profile: None,
            entitlements_override: None,
            require_entitlements_override: false,
            preserve_requirements: false,
            digest: DigestType::default(),
            metadata_loader: Box::new(InfoPlistLoader),
        }
    }

    /// Set the raw provisioning profile (.mobileprovision contents).
    pub fn provisioning_profile(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.provisioning_profile = Some(raw.into());
        self
    }

    /// Set the entitlements override file merged over the profile's
    /// entitlements when it exists.
    pub fn entitlements_override(mut self, path: impl AsRef<Path>) -> Self {
        self.entitlements_override = Some(path.as_ref().to_path_buf());
        self
    }

    /// Fail when the entitlements override file is absent.
    pub fn require_entitlements_override(mut self, required: bool) -> Self {
        self.require_entitlements_override = required;
        self
    }

    /// Keep the requirements blob of the existing signature instead of
    /// embedding an empty set.
    pub fn preserve_requirements(mut self, preserve: bool) -> Self {
        self.preserve_requirements = preserve;
        self
    }

    /// Set the code directory digest.
    pub fn digest(mut self, digest: DigestType) -> Self {
        self.digest = digest;
        self
    }

    /// Replace the Info.plist loader.
    pub fn metadata_loader(mut self, loader: Box<dyn MetadataLoader + 's>) -> Self {
        self.metadata_loader = loader;
        self
    }

    /// Sign the bundle's main executable.
    ///
    /// # Errors
    ///
    /// Every failure is terminal; see [`ErrorKind`](crate::ErrorKind) for how
    /// they are classified. Nothing is written to `bundle` unless every slice
    /// signed successfully.
    pub fn sign(&self, bundle: &mut dyn BundleFileSystem) -> Result<SigningReport> {
        let mut metadata = self.metadata_loader.load(bundle)?;

        let raw_profile = self
            .provisioning_profile
            .as_deref()
            .ok_or_else(|| Error::Config("no provisioning profile configured".into()))?;
        let profile = ProvisioningProfile::parse(raw_profile)?;
        debug!(profile = profile.name(), "parsed provisioning profile");

        let identity = resolve_certificate(self.store, &profile)?;

        let executable = metadata.executable()?.to_string();
        let bundle_identifier = metadata.bundle_identifier()?.to_string();

        let entitlements = self.entitlements(&profile, &bundle_identifier)?;

        metadata.ensure_resource_rules();
        let metadata = metadata.freeze()?;
        let manifest = ResourceManifestBuilder::new(bundle, &metadata).build(&executable)?;

        let binary = bundle.read_file(&executable)?;
        let mut container = BinaryContainer::load(&binary)?;
        debug!(
            executable = %executable,
            fat = container.is_fat(),
            slices = container.slices().len(),
            "loaded executable"
        );

        let material = SigningMaterial {
            identifier: &bundle_identifier,
            team_id: identity.team_id.as_deref(),
            digest: self.digest,
            info_plist: metadata.bytes(),
            code_resources: &manifest.manifest,
            entitlements: &entitlements,
            preserve_requirements: self.preserve_requirements,
        };
        let slices = SliceSigner::new(self.store, &identity, material).sign_container(&mut container)?;
        let signed = container.to_bytes()?;

        bundle.write_file(INFO_PLIST, metadata.bytes())?;
        manifest.write_to(bundle)?;
        bundle.write_file(&executable, &signed)?;

        info!(
            executable = %executable,
            slices = slices.len(),
            resources = manifest.files.len(),
            "signed bundle"
        );

        Ok(SigningReport {
            executable,
            slices,
            entitlements: String::from_utf8_lossy(&entitlements).into_owned(),
            resource_count: manifest.files.len(),
        })
    }

    /// Profile entitlements for `bundle_identifier` with the override merged on top.
    fn entitlements(&self, profile: &ProvisioningProfile, bundle_identifier: &str) -> Result<Vec<u8>> {
        let mut entitlements = profile.entitlements(bundle_identifier)?;

        match &self.entitlements_override {
            Some(path) if path.is_file() => {
                let overrides = load_override(path)?;
                debug!(
                    path = %path.display(),
                    keys = overrides.len(),
                    "merging entitlements override"
                );
                merge_entitlements(&mut entitlements, &overrides);
            }
            Some(path) if self.require_entitlements_override => {
                return Err(Error::Config(format!(
                    "entitlements override {} does not exist",
                    path.display()
                )));
            }
            None if self.require_entitlements_override => {
                return Err(Error::Config(
                    "an entitlements override is required but none was configured".into(),
                ));
            }
            Some(path) => debug!(path = %path.display(), "no entitlements override"),
            None => {}
        }

        to_xml(&entitlements)
    }
}
