use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::builder::build;
use crate::cert::params::CertificateOptions;
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::cli::args::*;
use crate::cli::completions::handle_completion_command;
use crate::cli::show::{format_json, format_text};
use crate::csr::{CertificateRequest, create_request};
use crate::error::{MissingSignerPart, PcertError, Result};
use crate::issuer::{self, Signer};
use crate::key::{KeyAlgorithm, KeyPair, generate_key};
use crate::profile::apply_profiles;
use crate::promote::PromotionPolicy;
use crate::usage::{EXT_KEY_USAGES, KEY_USAGES};

/// Path argument standing for stdin or stdout.
pub const STDIO: &str = "-";

/// Mode of written private key files.
pub const KEY_FILE_MODE: u32 = 0o600;

/// Mode of written certificate and CSR files.
pub const PUBLIC_FILE_MODE: u32 = 0o644;

pub fn handle_command(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);

    let stdin = io::stdin();
    let stdout = io::stdout();
    run(cli.command, &mut stdin.lock(), &mut stdout.lock())
}

/// Logging goes to stderr. `RUST_LOG` takes precedence over `-v`.
fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "pcert=warn",
        1 => "pcert=info",
        2 => "pcert=debug",
        _ => "pcert=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // a subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// Executes a parsed command against the given standard streams.
///
/// Everything is computed before the first file is written, and a failed key
/// write removes the certificate or CSR written just before, so a failing
/// command leaves no files behind.
pub fn run(command: Commands, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<()> {
    let mut stdin = Stdin::new(stdin);
    match command {
        Commands::Create(args) => handle_create(args, &mut stdin, stdout),
        Commands::Request(args) => handle_request(args, stdout),
        Commands::Sign(args) => handle_sign(args, &mut stdin, stdout),
        Commands::Show(args) => handle_show(args, &mut stdin, stdout),
        Commands::List { option } => handle_list(option, stdout),
        Commands::Completion { shell } => handle_completion_command(shell, stdout),
    }
}

/// Stdin, read completely on first use. Several inputs given as `-` are all
/// taken from the same buffered data.
struct Stdin<'a> {
    reader: &'a mut dyn Read,
    data: Option<Vec<u8>>,
}

impl<'a> Stdin<'a> {
    fn new(reader: &'a mut dyn Read) -> Self {
        Self { reader, data: None }
    }

    fn read(&mut self) -> Result<&[u8]> {
        let data = match self.data.take() {
            Some(data) => data,
            None => {
                let mut buf = Vec::new();
                self.reader.read_to_end(&mut buf)?;
                debug!(bytes = buf.len(), "read stdin");
                buf
            }
        };
        Ok(self.data.insert(data).as_slice())
    }
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO
}

/// `None` for an omitted path or `-`.
fn file_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !is_stdio(p))
}

/// The key file belonging to a certificate or CSR file: same directory,
/// extension replaced by `.key`.
pub fn key_relative_to(path: &Path) -> PathBuf {
    path.with_extension("key")
}

/// Resolves the two positional output arguments of `create` and `request`.
///
/// A single file argument puts the key next to it. Stdout is `None`.
/// Both outputs naming the same file is an error.
fn output_paths(
    first: Option<PathBuf>,
    second: Option<PathBuf>,
) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
    let first = file_path(first);
    let second = match second {
        Some(second) => file_path(Some(second)),
        None => first.as_deref().map(key_relative_to),
    };
    if let (Some(first), Some(second)) = (&first, &second) {
        if first == second {
            return Err(PcertError::InvalidInput(format!(
                "certificate and key would both be written to '{}'",
                first.display()
            )));
        }
    }
    Ok((first, second))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        PcertError::Io(io::Error::new(e.kind(), format!("{}: {e}", path.display())))
    })
}

fn read_source(path: Option<&Path>, stdin: &mut Stdin) -> Result<Vec<u8>> {
    match path {
        Some(path) if !is_stdio(path) => read_file(path),
        _ => Ok(stdin.read()?.to_vec()),
    }
}

#[cfg(unix)]
fn write_file(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    // mode() only applies to newly created files
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_file(path: &Path, contents: &[u8], _mode: u32) -> io::Result<()> {
    fs::write(path, contents)
}

fn write_output(
    path: Option<&Path>,
    contents: &str,
    mode: u32,
    stdout: &mut dyn Write,
) -> Result<()> {
    match path {
        Some(path) => {
            write_file(path, contents.as_bytes(), mode).map_err(|e| {
                PcertError::Io(io::Error::new(e.kind(), format!("{}: {e}", path.display())))
            })?;
            info!(path = %path.display(), "wrote file");
        }
        None => stdout.write_all(contents.as_bytes())?,
    }
    Ok(())
}

/// Writes a certificate or CSR followed by its key. When the key cannot be
/// written the first file is removed again.
fn write_pair(
    public_out: Option<&Path>,
    public_pem: &str,
    key_out: Option<&Path>,
    key_pem: &str,
    stdout: &mut dyn Write,
) -> Result<()> {
    write_output(public_out, public_pem, PUBLIC_FILE_MODE, stdout)?;
    if let Err(e) = write_output(key_out, key_pem, KEY_FILE_MODE, stdout) {
        if let Some(path) = public_out {
            if let Err(remove) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %remove, "failed to remove partial output");
            }
        }
        return Err(e);
    }
    Ok(())
}

fn read_signer_key(path: &Path, stdin: &mut Stdin) -> Result<KeyPair> {
    if is_stdio(path) {
        return KeyPair::from_pem(stdin.read()?);
    }
    if !path.is_file() {
        debug!(path = %path.display(), "issuer key file not found");
        return Err(PcertError::IncompleteSigner(MissingSignerPart::PrivateKey));
    }
    KeyPair::from_pem(&read_file(path)?)
}

/// Loads issuer certificate and key.
///
/// With `sign_cert` set to `-` both halves come from stdin unless `sign_key`
/// names a file. Otherwise the key defaults to the `.key` file next to the
/// certificate.
fn load_signer(sign_cert: &Path, sign_key: Option<&Path>, stdin: &mut Stdin) -> Result<Signer> {
    let certificate = if is_stdio(sign_cert) {
        Certificate::from_pem(stdin.read()?)?
    } else if sign_cert.is_file() {
        Certificate::from_pem(&read_file(sign_cert)?)?
    } else {
        return Err(PcertError::InvalidInput(format!(
            "sign cert '{}' does not exist, set --sign-cert accordingly",
            sign_cert.display()
        )));
    };

    let key = match sign_key {
        Some(path) => read_signer_key(path, stdin)?,
        None if is_stdio(sign_cert) => KeyPair::from_pem(stdin.read()?)?,
        None => read_signer_key(&key_relative_to(sign_cert), stdin)?,
    };
    debug!(issuer = %certificate.subject(), "loaded issuer");
    Signer::new(certificate, key)
}

fn handle_create(args: CreateArgs, stdin: &mut Stdin, stdout: &mut dyn Write) -> Result<()> {
    let (cert_out, key_out) = output_paths(args.cert_out, args.key_out)?;

    let signer = match (args.sign_cert.as_deref(), args.sign_key.as_deref()) {
        (None, None) => None,
        (None, Some(_)) => return Err(PcertError::IncompleteSigner(MissingSignerPart::Certificate)),
        (Some(cert), key) => Some(load_signer(cert, key, stdin)?),
    };

    let options = CertificateOptions {
        signature_algorithm: args.sign_alg,
        ..args.certificate.to_options()?
    };
    let template = apply_profiles(build(options)?, &args.profile)?;
    let key = generate_key(&args.key.to_options())?;
    let certificate = issuer::create(template, &key, signer.as_ref())?;

    let cert_pem = certificate.to_pem()?;
    let key_pem = key.to_pkcs8_pem()?;
    write_pair(cert_out.as_deref(), &cert_pem, key_out.as_deref(), &key_pem, stdout)
}

fn handle_request(args: RequestArgs, stdout: &mut dyn Write) -> Result<()> {
    let (csr_out, key_out) = output_paths(args.csr_out, args.key_out)?;

    let options = CertificateOptions {
        signature_algorithm: args.sign_alg,
        ..args.request.to_options()?
    };
    let template = build(options)?;
    let key = generate_key(&args.key.to_options())?;
    let request = create_request(&template, &key, None)?;

    let csr_pem = request.to_pem()?;
    let key_pem = key.to_pkcs8_pem()?;
    write_pair(csr_out.as_deref(), &csr_pem, key_out.as_deref(), &key_pem, stdout)
}

fn handle_sign(args: SignArgs, stdin: &mut Stdin, stdout: &mut dyn Write) -> Result<()> {
    let request = CertificateRequest::from_pem(&read_source(args.csr_in.as_deref(), stdin)?)?;
    request.verify()?;
    let signer = load_signer(&args.sign_cert, args.sign_key.as_deref(), stdin)?;

    let template = apply_profiles(build(args.certificate.to_options()?)?, &args.profile)?;
    let policy = if args.requester_wins {
        PromotionPolicy::RequesterWins
    } else {
        PromotionPolicy::IssuerWins
    };
    let certificate = issuer::sign_request(&request, template, policy, &signer)?;

    let cert_out = file_path(args.cert_out);
    write_output(cert_out.as_deref(), &certificate.to_pem()?, PUBLIC_FILE_MODE, stdout)
}

fn handle_show(args: ShowArgs, stdin: &mut Stdin, stdout: &mut dyn Write) -> Result<()> {
    let input = read_source(args.file.as_deref(), stdin)?;
    for certificate in Certificate::parse_all(&input)? {
        let rendered = match args.format {
            ShowFormat::Text => format_text(&certificate)?,
            ShowFormat::Json => format_json(&certificate)?,
            ShowFormat::Pem => certificate.to_pem()?,
        };
        stdout.write_all(rendered.as_bytes())?;
    }
    Ok(())
}

/// Canonical names for `pcert list`, sorted.
pub fn list_names(option: ListOption) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = match option {
        ListOption::KeyUsage => KEY_USAGES.iter().map(|(name, _)| *name).collect(),
        ListOption::ExtKeyUsage => EXT_KEY_USAGES.iter().map(|(name, _)| *name).collect(),
        ListOption::SignAlg => SignatureAlgorithm::ALL.iter().map(|alg| alg.name()).collect(),
        ListOption::KeyAlg => KeyAlgorithm::ALL.iter().map(|alg| alg.name()).collect(),
    };
    names.sort_unstable();
    names
}

fn handle_list(option: ListOption, stdout: &mut dyn Write) -> Result<()> {
    for name in list_names(option) {
        writeln!(stdout, "{name}")?;
    }
    Ok(())
}
