//! Licensor command line tool
//!
//! Manages activation codes and issues, verifies and installs license keys.
//!
//! Usage:
//!   licensor keygen acme
//!   licensor codes --count 10
//!   licensor redeem AB12C-D34E5-F67G8-H90I1-J234K5 --first-name Jane --last-name Doe
//!   licensor verify license.lic
//!
//! Passwords are read from `LICENSOR_CIPHER_PASSWORD` and
//! `LICENSOR_KEY_PASSWORD`.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use licensor_cli::{
    build_issuer, build_manager, open_key_store, open_records, Secrets, Settings,
};
use licensor_license::{load_license_key, store_license_key, FileKeyStore, LicenseContent};
use licensor_registry::{ActivationCode, CertType, HolderDetails, LicenseRecord, RegistryError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "licensor")]
#[command(about = "Issue and verify signed license keys")]
struct Args {
    /// Settings file [default: licensor.toml when present]
    #[arg(short, long, env = "LICENSOR_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a signing key pair in the key store
    Keygen {
        /// Alias for the new key pair
        alias: String,
    },
    /// Create unredeemed activation codes
    Codes {
        #[arg(short = 't', long, default_value = "User")]
        license_type: String,
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
    /// List all activation codes in the registry
    List,
    /// Create a site license code covering existing codes
    Site {
        /// Comma separated member codes
        #[arg(value_delimiter = ',', required = true)]
        codes: Vec<String>,
    },
    /// Create an upgrade code for an existing activation code
    Upgrade { code: String },
    /// Check whether an activation code can still be upgraded
    CheckUpgrade { code: String },
    /// Redeem an activation code and print its license key
    Redeem {
        code: String,
        #[command(flatten)]
        holder: HolderArgs,
        /// Expiry date (YYYY-MM-DD) when the record has none
        #[arg(long)]
        expire: Option<NaiveDate>,
        /// Write the key to this file instead of printing it
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Issue a license key without an activation code record
    Issue {
        #[command(flatten)]
        holder: HolderArgs,
        #[arg(long, default_value = "user", value_parser = parse_cert)]
        cert: CertType,
        #[arg(short = 't', long, default_value = "User")]
        license_type: String,
        #[arg(short = 'q', long, default_value = "1")]
        quantity: u32,
        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expire: Option<NaiveDate>,
        /// Write the key to this file instead of printing it
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Verify a license key file without installing it
    Verify {
        path: PathBuf,
        #[arg(long, default_value = "user", value_parser = parse_cert)]
        cert: CertType,
    },
    /// Verify and install a license key file
    Install {
        path: PathBuf,
        #[arg(long, default_value = "user", value_parser = parse_cert)]
        cert: CertType,
    },
    /// Verify the installed license
    Status {
        #[arg(long, default_value = "user", value_parser = parse_cert)]
        cert: CertType,
    },
    /// Remove the installed license
    Uninstall {
        #[arg(long, default_value = "user", value_parser = parse_cert)]
        cert: CertType,
    },
    /// Import activation codes from JSON array files
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(ClapArgs, Debug, Default)]
struct HolderArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    /// Full name when first and last name are not given
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    organization: Option<String>,
    #[arg(long)]
    street: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    purchase_id: Option<String>,
    #[arg(long)]
    email: Option<String>,
}

impl From<HolderArgs> for HolderDetails {
    fn from(args: HolderArgs) -> Self {
        Self {
            first_name: args.first_name,
            last_name: args.last_name,
            canonical_name: args.name,
            organization: args.organization,
            street: args.street,
            city: args.city,
            state: args.state,
            country: args.country,
            purchase_id: args.purchase_id,
            email: args.email,
        }
    }
}

fn parse_cert(value: &str) -> Result<CertType, String> {
    value.parse()
}

fn init_logging(verbose: bool) {
    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    if std::env::var_os("RUST_LOG").is_some() {
        builder.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        let log_level = if verbose { Level::DEBUG } else { Level::INFO };
        builder.with_max_level(log_level).init();
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    let secrets = Secrets::from_env();

    match args.command {
        Command::Keygen { alias } => keygen(&settings, &secrets, &alias),
        Command::Codes {
            license_type,
            count,
        } => {
            for code in open_records(&settings)?.create_codes(&license_type, count)? {
                println!("{code}");
            }
            Ok(())
        }
        Command::List => {
            for code in open_records(&settings)?.list()? {
                println!("{code}");
            }
            Ok(())
        }
        Command::Site { codes } => {
            let codes = codes
                .iter()
                .map(|code| ActivationCode::parse(code))
                .collect::<Result<Vec<_>, _>>()?;
            let site = open_records(&settings)?.create_site_code(&codes)?;
            println!("{}", site.activation_code);
            Ok(())
        }
        Command::Upgrade { code } => {
            let record = open_records(&settings)?.upgrade(&code)?;
            println!("{}", record.activation_code);
            Ok(())
        }
        Command::CheckUpgrade { code } => {
            match open_records(&settings)?.is_upgradable(&code) {
                Ok(true) => println!("Activation code is upgradable."),
                Ok(false) => println!("Cannot upgrade activation code."),
                Err(RegistryError::NotFound(_)) => println!("Activation code not found."),
                Err(e) => return Err(e.into()),
            }
            Ok(())
        }
        Command::Redeem {
            code,
            holder,
            expire,
            out,
        } => {
            let issuer = build_issuer(&settings, &secrets)?;
            let key = open_records(&settings)?.redeem(&code, &holder.into(), expire, &issuer)?;
            emit_key(&key, out.as_deref())
        }
        Command::Issue {
            holder,
            cert,
            license_type,
            quantity,
            expire,
            out,
        } => {
            let issuer = build_issuer(&settings, &secrets)?;
            let mut record = LicenseRecord::new(ActivationCode::generate());
            record.holder = holder.into();
            record.cert = cert;
            record.license_type = license_type;
            record.quantity = quantity;
            record.expire = expire;
            record.check()?;
            let key = issuer.issue(&record)?;
            emit_key(&key, out.as_deref())
        }
        Command::Verify { path, cert } => {
            let manager = build_manager(&settings, cert, open_key_store(&settings)?, &secrets)?;
            let key = load_license_key(&path)
                .with_context(|| format!("cannot read license key {}", path.display()))?;
            print_content(&manager.verify_key(&key)?);
            Ok(())
        }
        Command::Install { path, cert } => {
            let installed = settings.installed_key_path(cert);
            if let Some(dir) = installed.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("cannot create {}", dir.display()))?;
            }
            let manager = build_manager(&settings, cert, open_key_store(&settings)?, &secrets)?;
            let content = manager.install_file(&path)?;
            info!(path = %installed.display(), "license installed");
            print_content(&content);
            Ok(())
        }
        Command::Status { cert } => {
            let manager = build_manager(&settings, cert, open_key_store(&settings)?, &secrets)?;
            print_content(&manager.verify()?);
            Ok(())
        }
        Command::Uninstall { cert } => {
            let manager = build_manager(&settings, cert, open_key_store(&settings)?, &secrets)?;
            manager.uninstall()?;
            println!("License removed.");
            Ok(())
        }
        Command::Import { files } => import(&settings, &files),
    }
}

fn keygen(settings: &Settings, secrets: &Secrets, alias: &str) -> Result<()> {
    let path = settings.key_store_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }
    let mut store = FileKeyStore::open_or_create(&path, settings.kdf_params())
        .with_context(|| format!("cannot open key store {}", path.display()))?;
    let public = store.generate(alias, secrets.key_password()?)?;
    println!("{}", STANDARD.encode(public.to_bytes()));
    Ok(())
}

fn import(settings: &Settings, files: &[PathBuf]) -> Result<()> {
    let records = open_records(settings)?;
    let mut failed = 0;
    for file in files {
        let report = records
            .import_file(file)
            .with_context(|| format!("cannot import {}", file.display()))?;
        for failure in &report.failed {
            warn!(
                file = %file.display(),
                index = failure.index,
                code = failure.code.as_deref().unwrap_or("-"),
                "{}",
                failure.reason
            );
        }
        println!(
            "{}: {} imported, {} skipped, {} failed",
            file.display(),
            report.imported.len(),
            report.skipped.len(),
            report.failed.len()
        );
        failed += report.failed.len();
    }
    if failed > 0 {
        bail!("{failed} items could not be imported");
    }
    Ok(())
}

fn emit_key(key: &[u8], out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            store_license_key(key, path)
                .with_context(|| format!("cannot write license key {}", path.display()))?;
            info!(path = %path.display(), "wrote license key");
        }
        None => println!("{}", STANDARD.encode(key)),
    }
    Ok(())
}

fn print_content(content: &LicenseContent) {
    let text = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    println!("Holder:    {}", text(content.holder.as_ref().map(ToString::to_string)));
    println!("Issuer:    {}", text(content.issuer.as_ref().map(ToString::to_string)));
    println!("Subject:   {}", text(content.subject.clone()));
    println!("Issued:    {}", text(content.issued.map(|t| t.to_rfc3339())));
    println!("Not after: {}", text(content.not_after.map(|t| t.to_rfc3339())));
    println!(
        "Consumers: {} x {}",
        content.consumer_amount,
        text(content.consumer_type.clone())
    );
    if let Some(info) = &content.info {
        println!("Info:      {info}");
    }
}
