//! Command line front end for the certmint engine.
//!
//! Create a root and a server certificate signed by it:
//! ```sh
//! certmint --authority "Test CA" --name www.example.org
//! ```
//!
//! Sign a request for a code signing certificate, writing it to a file:
//! ```sh
//! certmint -a "Test CA" --sign codehost.csr --usage code --out codehost.pem
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, ArgGroup, CommandFactory, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use certmint::authority::AuthorityManager;
use certmint::cert::Certificate;
use certmint::cert::params::DistinguishedName;
use certmint::config::EngineConfig;
use certmint::profile::Usage;
use certmint::store::{FileCertificateStore, StoreLocation};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "certmint", version)]
#[command(about = "Issue certificates from a private certificate authority")]
#[command(disable_help_flag = true)]
#[command(group(ArgGroup::new("subject").required(true).args(["name", "sign"])))]
struct Cli {
    /// Distinguished name of the root authority. Generating by name creates
    /// it if missing; signing a request needs it to exist.
    #[arg(short, long)]
    authority: Option<String>,

    /// Subject of the certificate to generate.
    #[arg(short, long)]
    name: Option<String>,

    /// What the certificate is for: Server, Client, Code or Authority.
    #[arg(short, long, default_value_t = Usage::Server)]
    usage: Usage,

    /// Write new records to the machine tier instead of the user tier.
    #[arg(short, long)]
    machine: bool,

    /// PEM certificate signing request to sign.
    #[arg(short, long, value_name = "CSR_FILE")]
    sign: Option<PathBuf>,

    /// Validity in days; 0 selects the default for the usage.
    #[arg(short, long, default_value_t = 0)]
    days: u32,

    /// Store directory; holds `machine` and `user` tiers.
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Encrypt stored private keys with this password.
    #[arg(long, env = "CERTMINT_KEY_PASSWORD", hide_env_values = true)]
    key_password: Option<String>,

    /// Sign with SHA-1 for legacy relying parties.
    #[arg(long)]
    legacy_sha1: bool,

    /// Write the issued certificate as PEM to this file.
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Log engine activity.
    #[arg(short, long)]
    verbose: bool,

    /// Print help.
    #[arg(short = 'h', long, short_alias = '?', action = ArgAction::Help)]
    help: Option<bool>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.authority.is_none() && (cli.usage != Usage::Authority || cli.sign.is_some()) {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "--authority is required unless --usage is Authority",
            )
            .exit();
    }

    let default_filter = if cli.verbose { "certmint=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .compact()
        .init();

    let authority = cli
        .authority
        .as_deref()
        .map(DistinguishedName::parse)
        .transpose()
        .context("invalid --authority")?;
    let mut store = match &cli.store {
        Some(dir) => FileCertificateStore::with_root(dir),
        None => FileCertificateStore::default_location()?,
    };
    if let Some(password) = &cli.key_password {
        store = store.with_key_password(password.clone());
    }
    let config = EngineConfig::builder()
        .legacy_sha1(cli.legacy_sha1)
        .location(if cli.machine {
            StoreLocation::Machine
        } else {
            StoreLocation::User
        })
        .build();
    debug!(?config, ?store, "starting");

    let mut manager = AuthorityManager::new(store, authority, config);
    let certificate = match (&cli.sign, &cli.name) {
        (Some(path), _) => {
            let pem = fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            manager.sign_certificate_request(&pem, cli.usage, cli.days)?
        }
        (None, Some(name)) => manager.generate_certificate(name, cli.usage, cli.days)?,
        (None, None) => anyhow::bail!("either --name or --sign is required"),
    };

    print!("{}", describe(&certificate)?);
    if let Some(out) = &cli.out {
        fs::write(out, certificate.to_pem()?)
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("Written to {}", out.display());
    }
    Ok(())
}

fn describe(certificate: &Certificate) -> Result<String> {
    let serial = hex::encode_upper(certificate.serial_number());
    let mut text = String::new();
    writeln!(text, "Subject:    {}", certificate.subject()?)?;
    writeln!(text, "Issuer:     {}", certificate.issuer()?)?;
    writeln!(text, "Serial:     {serial}")?;
    writeln!(text, "Not before: {}", certificate.not_before())?;
    writeln!(text, "Not after:  {}", certificate.not_after())?;
    Ok(text)
}
