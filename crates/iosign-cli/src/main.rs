//! Command-line interface for the iosign code signing core.
//!
//! Signs the main executable of an unpacked app bundle in place using
//! PKCS#12 or PEM-format certificates and a provisioning profile.

use clap::{ArgAction, Parser};
use iosign::provision::entitlements::override_path;
use iosign::{CodeSignatureBuilder, CredentialStore, DigestType, DirectoryBundle, SigningCredentials};
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "iosign")]
#[command(about = "Sign an iOS app bundle in place")]
struct Cli {
    /// App bundle directory (e.g. Payload/App.app)
    bundle: PathBuf,

    /// Provisioning profile (.mobileprovision)
    #[arg(short = 'm', long)]
    profile: PathBuf,

    /// Certificate file (PEM format)
    #[arg(short = 'c', long, requires = "private_key")]
    certificate: Option<PathBuf>,

    /// Private key file (PKCS#8 PEM format)
    #[arg(short = 'k', long, requires = "certificate")]
    private_key: Option<PathBuf>,

    /// PKCS#12 file (.p12)
    #[arg(short = 'p', long, conflicts_with_all = ["certificate", "private_key"])]
    pkcs12: Option<PathBuf>,

    /// Password for the PKCS#12 file
    #[arg(long)]
    password: Option<String>,

    /// Entitlements override merged over the profile's entitlements
    /// [default: the profile path with an .entitlements extension]
    #[arg(short = 'e', long)]
    entitlements: Option<PathBuf>,

    /// Fail if the entitlements override file does not exist
    #[arg(long)]
    require_entitlements: bool,

    /// Keep the requirements blob of the existing signature
    #[arg(long)]
    preserve_requirements: bool,

    /// Hash the code directory with SHA-1 instead of SHA-256
    #[arg(long)]
    sha1: bool,

    /// Write the embedded entitlements to this file
    #[arg(long)]
    entitlements_out: Option<PathBuf>,

    /// Increase logging verbosity (warnings by default, -v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let credentials = load_credentials(&cli)?;
    let store = CredentialStore::new().with_credentials(credentials);

    let profile = std::fs::read(&cli.profile)?;
    let entitlements = cli
        .entitlements
        .clone()
        .unwrap_or_else(|| override_path(&cli.profile));
    let digest = if cli.sha1 {
        DigestType::Sha1
    } else {
        DigestType::Sha256
    };

    let mut bundle = DirectoryBundle::new(&cli.bundle);
    let report = CodeSignatureBuilder::new(&store)
        .provisioning_profile(profile)
        .entitlements_override(entitlements)
        .require_entitlements_override(cli.require_entitlements)
        .preserve_requirements(cli.preserve_requirements)
        .digest(digest)
        .sign(&mut bundle)?;

    if let Some(path) = &cli.entitlements_out {
        std::fs::write(path, &report.entitlements)?;
    }

    for slice in &report.slices {
        println!(
            "  slice {}: cputype {:#x}, signature {} bytes at {:#x}",
            slice.index, slice.cputype, slice.signature_size, slice.signature_offset
        );
    }
    println!(
        "Signed: {} ({} resources)",
        cli.bundle.join(&report.executable).display(),
        report.resource_count
    );
    Ok(())
}

fn log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

fn setup_logging(verbosity: u8) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(verbosity))
        .with_target(false)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_credentials(cli: &Cli) -> Result<SigningCredentials, Box<dyn std::error::Error>> {
    if let Some(ref p12_path) = cli.pkcs12 {
        let p12_data = std::fs::read(p12_path)?;
        let password = SecretString::new(cli.password.clone().unwrap_or_default());
        let creds = SigningCredentials::from_p12(&p12_data, &password)?;
        return Ok(creds);
    }

    if let (Some(ref cert_path), Some(ref key_path)) = (&cli.certificate, &cli.private_key) {
        let cert_data = std::fs::read(cert_path)?;
        let key_data = std::fs::read(key_path)?;
        let creds = SigningCredentials::from_pem(&cert_data, &key_data)?;
        return Ok(creds);
    }

    Err("Must provide either --pkcs12 or both --certificate and --private-key".into())
}
