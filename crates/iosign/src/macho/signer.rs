//! Two-pass signing of architecture slices
//!
//! The code directory hashes every page before the signature, header
//! included, and the header records how large the signature is. The
//! signature in turn signs the code directory. To break the cycle each slice
//! is signed twice:
//!
//! 1. A sizing pass builds and signs a provisional code directory over the
//!    unpatched slice. Only the resulting superblob length is kept.
//! 2. The `__LINKEDIT` and `LC_CODE_SIGNATURE` fields are patched for that
//!    length.
//! 3. A final pass hashes the patched slice and signs again. Its superblob
//!    must have exactly the sizing pass length, otherwise the slice fails
//!    with [`Error::SignatureSizeMismatch`].

use super::container::{ArchSlice, BinaryContainer};
use crate::codesign::code_directory::{CodeDirectoryBuilder, DigestType};
use crate::codesign::constants::{CSSLOT_REQUIREMENTS, CS_EXECSEG_MAIN_BINARY};
use crate::codesign::superblob::{
    build_entitlements_blob, build_requirements_blob, build_signature_blob, SuperBlob,
    SuperBlobBuilder,
};
use crate::crypto::store::{CertificateStore, SigningIdentity};
use crate::{Error, Result};
use tracing::{debug, warn};

/// Inputs shared by every slice of one signing run.
#[derive(Debug, Clone, Copy)]
pub struct SigningMaterial<'a> {
    /// Bundle identifier written into the code directory.
    pub identifier: &'a str,
    /// Team identifier, if the certificate carries one.
    pub team_id: Option<&'a str>,
    /// Code directory digest.
    pub digest: DigestType,
    /// Final Info.plist bytes.
    pub info_plist: &'a [u8],
    /// Final CodeResources bytes.
    pub code_resources: &'a [u8],
    /// Entitlements plist to embed.
    pub entitlements: &'a [u8],
    /// Carry the requirements blob over from the existing signature.
    pub preserve_requirements: bool,
}

/// Outcome of signing one slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSliceReport {
    /// Index of the slice in the container.
    pub index: usize,
    /// CPU type.
    pub cputype: u32,
    /// CPU subtype.
    pub cpusubtype: u32,
    /// Final `LC_CODE_SIGNATURE` dataoff.
    pub signature_offset: u64,
    /// Final `LC_CODE_SIGNATURE` datasize.
    pub signature_size: u64,
    /// Final `__LINKEDIT` filesize.
    pub linkedit_filesize: u64,
    /// Hash of the final code directory.
    pub cdhash: Vec<u8>,
}

/// Special slot hashes, identical for both passes.
struct SpecialSlots {
    info: Vec<u8>,
    requirements: Vec<u8>,
    resources: Vec<u8>,
    entitlements: Vec<u8>,
}

/// Signs architecture slices with one certificate.
pub struct SliceSigner<'a> {
    store: &'a dyn CertificateStore,
    identity: &'a SigningIdentity,
    material: SigningMaterial<'a>,
}

impl<'a> SliceSigner<'a> {
    pub fn new(
        store: &'a dyn CertificateStore,
        identity: &'a SigningIdentity,
        material: SigningMaterial<'a>,
    ) -> Self {
        Self {
            store,
            identity,
            material,
        }
    }

    /// Sign every slice of `container` in order.
    ///
    /// Stops at the first failing slice. Slices signed before the failure
    /// stay patched in memory; callers discard the container.
    pub fn sign_container(&self, container: &mut BinaryContainer) -> Result<Vec<SignedSliceReport>> {
        container
            .slices_mut()
            .iter_mut()
            .map(|slice| self.sign_slice(slice))
            .collect()
    }

    /// Run both passes over one slice.
    pub fn sign_slice(&self, slice: &mut ArchSlice) -> Result<SignedSliceReport> {
        let requirements = self.requirements_blob(slice);
        let entitlements = build_entitlements_blob(self.material.entitlements);
        let slots = self.special_slots(&requirements, &entitlements);

        // Sizing pass
        let provisional = self.code_directory(slice, &slots)?;
        let expected = self.assemble(provisional, &requirements, &entitlements)?.len();
        debug!(
            slice = slice.index,
            superblob_len = expected,
            "sizing pass complete"
        );

        slice.resize_signature(expected)?;

        // Final pass over the patched header
        let code_directory = self.code_directory(slice, &slots)?;
        let cdhash = self.material.digest.digest(&code_directory);
        let superblob = self.assemble(code_directory, &requirements, &entitlements)?;
        if superblob.len() != expected {
            return Err(Error::SignatureSizeMismatch {
                slice: slice.index,
                expected,
                actual: superblob.len(),
            });
        }

        slice.write_signature(&superblob)?;
        let (signature_offset, signature_size) = slice.signature_range()?;
        let report = SignedSliceReport {
            index: slice.index,
            cputype: slice.cputype,
            cpusubtype: slice.cpusubtype,
            signature_offset,
            signature_size,
            linkedit_filesize: slice.read(slice.linkedit.filesize)?,
            cdhash,
        };
        debug!(
            slice = report.index,
            offset = report.signature_offset,
            size = report.signature_size,
            "slice signed"
        );
        Ok(report)
    }

    fn requirements_blob(&self, slice: &ArchSlice) -> Vec<u8> {
        if !self.material.preserve_requirements {
            return build_requirements_blob();
        }

        let existing = slice
            .existing_signature()
            .and_then(|sig| SuperBlob::parse(sig).ok())
            .and_then(|blob| blob.blob(CSSLOT_REQUIREMENTS).map(<[u8]>::to_vec));

        match existing {
            Some(requirements) => {
                debug!(slice = slice.index, len = requirements.len(), "keeping existing requirements");
                requirements
            }
            None => {
                warn!(
                    slice = slice.index,
                    "no existing requirements blob to preserve, embedding an empty set"
                );
                build_requirements_blob()
            }
        }
    }

    fn special_slots(&self, requirements: &[u8], entitlements: &[u8]) -> SpecialSlots {
        let digest = self.material.digest;
        SpecialSlots {
            info: digest.digest(self.material.info_plist),
            requirements: digest.digest(requirements),
            resources: digest.digest(self.material.code_resources),
            entitlements: digest.digest(entitlements),
        }
    }

    fn code_directory(&self, slice: &ArchSlice, slots: &SpecialSlots) -> Result<Vec<u8>> {
        let (offset, _) = slice.signature_range()?;
        let code = slice.data().get(..offset as usize).ok_or_else(|| {
            Error::MachO(format!("Slice {}: signature offset past end of slice", slice.index))
        })?;

        let exec_seg_flags = if slice.is_executable {
            CS_EXECSEG_MAIN_BINARY
        } else {
            0
        };

        let mut builder = CodeDirectoryBuilder::new(self.material.identifier, code)
            .info_hash(slots.info.clone())
            .requirements_hash(slots.requirements.clone())
            .resources_hash(slots.resources.clone())
            .entitlements_hash(slots.entitlements.clone())
            .exec_seg_limit(slice.text_size)
            .exec_seg_flags(exec_seg_flags);
        if let Some(team_id) = self.material.team_id {
            builder = builder.team_id(team_id);
        }

        Ok(builder.build(self.material.digest))
    }

    fn assemble(&self, code_directory: Vec<u8>, requirements: &[u8], entitlements: &[u8]) -> Result<Vec<u8>> {
        let cms = self.store.sign(self.identity, &code_directory)?;

        Ok(SuperBlobBuilder::new()
            .code_directory(code_directory)
            .requirements(requirements.to_vec())
            .entitlements(entitlements.to_vec())
            .cms_signature(build_signature_blob(&cms))
            .build())
    }
}
