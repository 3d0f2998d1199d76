mod common;

use common::*;
use iosign::bundle::BundleFileSystem;
use iosign::codesign::constants::{CSSLOT_CODEDIRECTORY, CSSLOT_ENTITLEMENTS, CSSLOT_SIGNATURESLOT};
use iosign::codesign::SuperBlob;
use iosign::{
    BinaryContainer, CodeSignatureBuilder, DigestType, DirectoryBundle, Error, ErrorKind,
};
use plist::Value;

fn signature_of(binary: &[u8], slice: usize) -> SuperBlob {
    let container = BinaryContainer::load(binary).unwrap();
    let slice = &container.slices()[slice];
    let (offset, size) = slice.signature_range().unwrap();
    SuperBlob::parse(&slice.data()[offset as usize..(offset + size) as usize]).unwrap()
}

#[test]
fn signs_thin_binary_end_to_end() {
    let original = thin_macho(CPU_TYPE_ARM64, &[]);
    let mut bundle = bundle_with(original.clone());
    let store = FakeStore::new();

    let report = CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .sign(&mut bundle)
        .unwrap();

    assert_eq!(report.executable, "App");
    assert_eq!(report.slices.len(), 1);
    assert_eq!(store.calls(), 2);

    // Offset is unchanged: prior __LINKEDIT end minus prior signature size
    let before = BinaryContainer::load(&original).unwrap();
    let before = &before.slices()[0];
    let (old_offset, old_size) = before.signature_range().unwrap();
    assert_eq!(report.slices[0].signature_offset, before.linkedit_end().unwrap() - old_size);
    assert_eq!(report.slices[0].signature_offset, old_offset);

    // File ends exactly at the end of __LINKEDIT
    let signed = bundle.read_file("App").unwrap();
    let after = BinaryContainer::load(&signed).unwrap();
    let slice = &after.slices()[0];
    assert_eq!(signed.len() as u64, slice.linkedit_end().unwrap());
    assert_eq!(
        slice.read(slice.linkedit.filesize).unwrap(),
        LINKEDIT_DATA as u64 + report.slices[0].signature_size
    );

    // Everything before the signature is untouched apart from the header
    assert_eq!(&signed[0x1000..old_offset as usize], &original[0x1000..old_offset as usize]);
}

#[test]
fn code_directory_covers_written_artifacts() {
    let mut bundle = bundle_with(thin_macho(CPU_TYPE_ARM64, &[]));
    let store = FakeStore::new();

    CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .sign(&mut bundle)
        .unwrap();

    let signed = bundle.read_file("App").unwrap();
    let superblob = signature_of(&signed, 0);
    let cd = superblob.blob(CSSLOT_CODEDIRECTORY).unwrap();
    let digest = DigestType::Sha256;

    let info = bundle.read_file("Info.plist").unwrap();
    let resources = bundle.read_file("_CodeSignature/CodeResources").unwrap();
    assert_eq!(special_slot(cd, 1), digest.digest(&info).as_slice());
    assert_eq!(special_slot(cd, 3), digest.digest(&resources).as_slice());
    assert_eq!(
        special_slot(cd, 5),
        digest
            .digest(superblob.blob(CSSLOT_ENTITLEMENTS).unwrap())
            .as_slice()
    );

    // Page hashes are taken over the patched header
    assert_eq!(code_slot(cd, 0), digest.digest(&signed[..4096]).as_slice());
    assert!(superblob.blob(CSSLOT_SIGNATURESLOT).is_some());
}

#[test]
fn manifest_excludes_signing_artifacts() {
    let mut bundle = bundle_with(thin_macho(CPU_TYPE_ARM64, &[]));
    let store = FakeStore::new();

    let report = CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .sign(&mut bundle)
        .unwrap();

    let manifest = bundle.read_file("_CodeSignature/CodeResources").unwrap();
    let manifest = Value::from_reader_xml(manifest.as_slice()).unwrap();
    let files = manifest
        .as_dictionary()
        .and_then(|d| d.get("files"))
        .and_then(Value::as_dictionary)
        .unwrap();

    let mut keys: Vec<_> = files.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "Assets.car",
            "Base.lproj/Main.storyboardc/Info.plist",
            "Frameworks/Lib.framework/Lib",
        ]
    );
    assert_eq!(report.resource_count, 3);

    // The defaulted rules file was written and recorded in Info.plist
    assert!(bundle.file_exists("CustomResourceRules.plist"));
    let info = bundle.read_file("Info.plist").unwrap();
    let info = Value::from_reader_xml(info.as_slice()).unwrap();
    assert_eq!(
        info.as_dictionary()
            .and_then(|d| d.get("CFBundleResourceSpecification"))
            .and_then(Value::as_string),
        Some("CustomResourceRules.plist")
    );
}

#[test]
fn signs_every_fat_slice() {
    let arm = thin_macho(CPU_TYPE_ARM64, &[0u8; 0x40]);
    let x86 = thin_macho(CPU_TYPE_X86_64, &[]);
    let original = fat_macho(&[(CPU_TYPE_ARM64, arm), (CPU_TYPE_X86_64, x86)]);
    let mut bundle = bundle_with(original);
    let store = FakeStore::new();

    let report = CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .sign(&mut bundle)
        .unwrap();

    assert_eq!(report.slices.len(), 2);
    assert_eq!(report.slices[0].cputype, CPU_TYPE_ARM64);
    assert_eq!(report.slices[1].cputype, CPU_TYPE_X86_64);
    assert_eq!(store.calls(), 4);

    let signed = bundle.read_file("App").unwrap();
    let container = BinaryContainer::load(&signed).unwrap();
    assert!(container.is_fat());
    for (slice, slice_report) in container.slices().iter().zip(&report.slices) {
        assert_eq!(slice.data().len() as u64, slice.linkedit_end().unwrap());
        assert_eq!(
            slice.signature_range().unwrap(),
            (slice_report.signature_offset, slice_report.signature_size)
        );
    }
    assert!(signature_of(&signed, 1).blob(CSSLOT_CODEDIRECTORY).is_some());
}

#[test]
fn wildcard_profile_is_specialized() {
    let profile = mobileprovision(&profile_plist("ABCDE12345.*", vec![certificate_der()]));
    let mut bundle = bundle_with(thin_macho(CPU_TYPE_ARM64, &[]));
    let store = FakeStore::new();

    let report = CodeSignatureBuilder::new(&store)
        .provisioning_profile(profile)
        .sign(&mut bundle)
        .unwrap();

    let entitlements = Value::from_reader_xml(report.entitlements.as_bytes()).unwrap();
    let entitlements = entitlements.as_dictionary().unwrap();
    assert_eq!(
        entitlements
            .get("application-identifier")
            .and_then(Value::as_string),
        Some("ABCDE12345.com.test.app")
    );
    assert_eq!(
        entitlements.get("keychain-access-groups"),
        Some(&Value::Array(vec![Value::String(
            "ABCDE12345.com.test.app".into()
        )]))
    );

    let signed = bundle.read_file("App").unwrap();
    let embedded = signature_of(&signed, 0);
    assert_eq!(
        embedded.payload(CSSLOT_ENTITLEMENTS),
        Some(report.entitlements.as_bytes())
    );
}

#[test]
fn entitlements_override_wins() {
    let dir = tempfile::tempdir().unwrap();
    let override_path = dir.path().join("App.entitlements");
    let mut overrides = plist::Dictionary::new();
    overrides.insert("get-task-allow".into(), Value::Boolean(false));
    overrides.insert(
        "com.apple.developer.team-identifier".into(),
        Value::String("ABCDE12345".into()),
    );
    Value::Dictionary(overrides)
        .to_file_xml(&override_path)
        .unwrap();

    let mut bundle = bundle_with(thin_macho(CPU_TYPE_ARM64, &[]));
    let store = FakeStore::new();
    let report = CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .entitlements_override(&override_path)
        .require_entitlements_override(true)
        .sign(&mut bundle)
        .unwrap();

    let entitlements = Value::from_reader_xml(report.entitlements.as_bytes()).unwrap();
    let entitlements = entitlements.as_dictionary().unwrap();
    assert_eq!(entitlements.get("get-task-allow"), Some(&Value::Boolean(false)));
    assert_eq!(
        entitlements
            .get("com.apple.developer.team-identifier")
            .and_then(Value::as_string),
        Some("ABCDE12345")
    );
    assert_eq!(
        entitlements
            .get("application-identifier")
            .and_then(Value::as_string),
        Some("ABCDE12345.com.test.app")
    );
}

#[test]
fn missing_required_override_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let original = bundle_with(thin_macho(CPU_TYPE_ARM64, &[]));
    let mut bundle = original.clone();
    let store = FakeStore::new();

    let err = CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .entitlements_override(dir.path().join("missing.entitlements"))
        .require_entitlements_override(true)
        .sign(&mut bundle)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(bundle, original);
}

#[test]
fn optional_override_may_be_absent() {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = bundle_with(thin_macho(CPU_TYPE_ARM64, &[]));
    let store = FakeStore::new();

    CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .entitlements_override(dir.path().join("missing.entitlements"))
        .sign(&mut bundle)
        .unwrap();
}

#[test]
fn unmatched_certificate_leaves_bundle_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let executable = thin_macho(CPU_TYPE_ARM64, &[]);
    std::fs::write(dir.path().join("App"), &executable).unwrap();
    std::fs::write(
        dir.path().join("Info.plist"),
        info_plist("App", "com.test.app", None),
    )
    .unwrap();
    std::fs::write(dir.path().join("icon.png"), b"png").unwrap();

    let mut bundle = DirectoryBundle::new(dir.path());
    let store = FakeStore::empty();
    let err = CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .sign(&mut bundle)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::CertificateNotFound { ref profile, candidates: 1 } if profile == "Test Profile"
    ));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(store.calls(), 0);
    assert_eq!(std::fs::read(dir.path().join("App")).unwrap(), executable);
    assert!(!dir.path().join("_CodeSignature").exists());
    assert!(!dir.path().join("CustomResourceRules.plist").exists());
}

#[test]
fn binary_without_code_signature_is_unsupported() {
    let original = bundle_with(unsigned_macho());
    let mut bundle = original.clone();
    let store = FakeStore::new();

    let err = CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .sign(&mut bundle)
        .unwrap_err();

    assert!(matches!(err, Error::Unsupported(_)));
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(bundle, original);
}

#[test]
fn size_mismatch_aborts_without_writing() {
    let original = bundle_with(thin_macho(CPU_TYPE_ARM64, &[]));
    let mut bundle = original.clone();
    let store = FakeStore::growing(4);

    let err = CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .sign(&mut bundle)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::SignatureSizeMismatch { slice: 0, expected, actual } if actual == expected + 4
    ));
    assert_eq!(err.kind(), ErrorKind::InternalConsistency);
    assert_eq!(bundle, original);
}

#[test]
fn resigning_a_signed_binary_is_stable() {
    let mut bundle = bundle_with(thin_macho(CPU_TYPE_ARM64, &[]));
    let store = FakeStore::new();
    let builder = CodeSignatureBuilder::new(&store).provisioning_profile(default_profile());

    let first = builder.sign(&mut bundle).unwrap();
    let once = bundle.read_file("App").unwrap();
    let second = builder.sign(&mut bundle).unwrap();
    let twice = bundle.read_file("App").unwrap();

    assert_eq!(first.slices[0].signature_offset, second.slices[0].signature_offset);
    assert_eq!(first.slices[0].signature_size, second.slices[0].signature_size);
    assert_eq!(once.len(), twice.len());
}

#[test]
fn signs_directory_bundle() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("App"), thin_macho(CPU_TYPE_ARM64, &[])).unwrap();
    std::fs::write(
        dir.path().join("Info.plist"),
        info_plist("App", "com.test.app", Some("Rules.plist")),
    )
    .unwrap();
    std::fs::create_dir_all(dir.path().join("en.lproj")).unwrap();
    std::fs::write(dir.path().join("en.lproj/Localizable.strings"), b"strings").unwrap();

    let mut bundle = DirectoryBundle::new(dir.path());
    let store = FakeStore::new();
    let report = CodeSignatureBuilder::new(&store)
        .provisioning_profile(default_profile())
        .digest(DigestType::Sha1)
        .sign(&mut bundle)
        .unwrap();

    assert_eq!(report.resource_count, 1);
    assert_eq!(report.slices[0].cdhash.len(), 20);
    assert!(dir.path().join("Rules.plist").is_file());
    assert!(dir.path().join("_CodeSignature/CodeResources").is_file());

    let signed = std::fs::read(dir.path().join("App")).unwrap();
    let container = BinaryContainer::load(&signed).unwrap();
    assert_eq!(signed.len() as u64, container.slices()[0].linkedit_end().unwrap());
}
