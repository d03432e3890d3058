use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use der::flagset::FlagSet;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use url::Url;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{CertificateOptions, DistinguishedName, SubjectAltNames};
use crate::cert::subject;
use crate::error::{PcertError, Result};
use crate::key::{KeyAlgorithm, KeyOptions};
use crate::profile::Profile;
use crate::usage::{ExtendedKeyUsageOption, KeyUsages, add_ext_usage, string_to_usage};

#[derive(Parser, Debug)]
#[command(name = "pcert")]
#[command(version)]
#[command(about = "Create, request, sign and inspect X.509 certificates and keys")]
#[command(long_about = None)]
pub struct Cli {
    /// Enable verbose logging (repeat for more verbosity: -v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a key and a certificate, self-signed unless a signer is given
    Create(CreateArgs),
    /// Create a key and a certificate signing request
    Request(RequestArgs),
    /// Sign a certificate signing request
    Sign(SignArgs),
    /// Print the certificates found in a file or on stdin
    Show(ShowArgs),
    /// List the names accepted by the usage and algorithm flags
    List {
        #[arg(value_enum)]
        option: ListOption,
    },
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Certificate output file, '-' for stdout
    pub cert_out: Option<PathBuf>,

    /// Key output file, defaults to CERT-OUT with a .key extension
    pub key_out: Option<PathBuf>,

    /// Certificate of the issuer, '-' reads certificate and key from stdin
    #[arg(short = 's', long, env = "PCERT_SIGN_CERT")]
    pub sign_cert: Option<PathBuf>,

    /// Private key of the issuer, defaults to the .key file next to --sign-cert
    #[arg(long, env = "PCERT_SIGN_KEY")]
    pub sign_key: Option<PathBuf>,

    /// Profiles to apply in order
    #[arg(long, env = "PCERT_PROFILE", value_delimiter = ',')]
    pub profile: Vec<Profile>,

    /// Signature algorithm, see 'pcert list sign-alg'
    #[arg(long, env = "PCERT_SIGN_ALG")]
    pub sign_alg: Option<SignatureAlgorithm>,

    #[command(flatten)]
    pub certificate: CertificateArgs,

    #[command(flatten)]
    pub key: KeyArgs,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// CSR output file, '-' for stdout
    pub csr_out: Option<PathBuf>,

    /// Key output file, defaults to CSR-OUT with a .key extension
    pub key_out: Option<PathBuf>,

    /// Signature algorithm, see 'pcert list sign-alg'
    #[arg(long, env = "PCERT_SIGN_ALG")]
    pub sign_alg: Option<SignatureAlgorithm>,

    #[command(flatten)]
    pub request: RequestFlags,

    #[command(flatten)]
    pub key: KeyArgs,
}

#[derive(Args, Debug)]
pub struct SignArgs {
    /// CSR input file, '-' or nothing reads stdin
    pub csr_in: Option<PathBuf>,

    /// Certificate output file, '-' or nothing writes stdout
    pub cert_out: Option<PathBuf>,

    /// Certificate of the issuer, '-' reads it from stdin
    #[arg(short = 's', long, env = "PCERT_SIGN_CERT", default_value = "ca.crt")]
    pub sign_cert: PathBuf,

    /// Private key of the issuer, defaults to the .key file next to --sign-cert
    #[arg(long, env = "PCERT_SIGN_KEY")]
    pub sign_key: Option<PathBuf>,

    /// Profiles to apply in order
    #[arg(long, env = "PCERT_PROFILE", value_delimiter = ',')]
    pub profile: Vec<Profile>,

    /// Let subject and SANs of the request replace the ones given by flags
    #[arg(long, env = "PCERT_REQUESTER_WINS")]
    pub requester_wins: bool,

    #[command(flatten)]
    pub certificate: CertificateArgs,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// File with PEM encoded certificates, '-' or nothing reads stdin
    pub file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, env = "PCERT_FORMAT", value_enum, default_value_t = ShowFormat::Text)]
    pub format: ShowFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowFormat {
    Text,
    Json,
    Pem,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListOption {
    KeyUsage,
    ExtKeyUsage,
    SignAlg,
    KeyAlg,
}

#[derive(Args, Debug, Default)]
pub struct KeyArgs {
    /// Public key algorithm, see 'pcert list key-alg'
    #[arg(long, env = "PCERT_KEY_ALG")]
    pub key_alg: Option<KeyAlgorithm>,

    /// Key size, defaults to 256 for ECDSA and 2048 for RSA
    #[arg(long, env = "PCERT_KEY_SIZE")]
    pub key_size: Option<usize>,
}

impl KeyArgs {
    pub fn to_options(&self) -> KeyOptions {
        KeyOptions {
            algorithm: self.key_alg,
            size: self.key_size,
        }
    }
}

/// Subject flags.
#[derive(Args, Debug, Default)]
pub struct SubjectArgs {
    /// Subject in the form '/C=CH/O=My Org/OU=My Team', may be repeated
    #[arg(long, env = "PCERT_SUBJECT")]
    pub subject: Vec<String>,

    /// Subject country (C)
    #[arg(long, env = "PCERT_SUBJECT_COUNTRY", value_delimiter = ',')]
    pub subject_country: Vec<String>,

    /// Subject organization (O)
    #[arg(long, env = "PCERT_SUBJECT_ORG", value_delimiter = ',')]
    pub subject_org: Vec<String>,

    /// Subject organizational unit (OU)
    #[arg(long, env = "PCERT_SUBJECT_OU", value_delimiter = ',')]
    pub subject_ou: Vec<String>,

    /// Subject locality (L)
    #[arg(long, env = "PCERT_SUBJECT_LOCALITY", value_delimiter = ',')]
    pub subject_locality: Vec<String>,

    /// Subject province (ST)
    #[arg(long, env = "PCERT_SUBJECT_PROVINCE", value_delimiter = ',')]
    pub subject_province: Vec<String>,

    /// Subject street address (STREET)
    #[arg(long, env = "PCERT_SUBJECT_STREET_ADDRESS", value_delimiter = ',')]
    pub subject_street_address: Vec<String>,

    /// Subject postal code (POSTALCODE)
    #[arg(long, env = "PCERT_SUBJECT_POSTAL_CODE", value_delimiter = ',')]
    pub subject_postal_code: Vec<String>,

    /// Subject serial number (SERIALNUMBER)
    #[arg(long, env = "PCERT_SUBJECT_SERIAL_NUMBER")]
    pub subject_serial_number: Option<String>,

    /// Subject common name (CN)
    #[arg(
        short = 'n',
        long = "subject-common-name",
        visible_alias = "name",
        env = "PCERT_SUBJECT_COMMON_NAME"
    )]
    pub subject_common_name: Option<String>,
}

impl SubjectArgs {
    /// Combines the `--subject` strings with the per-attribute flags.
    ///
    /// Subject strings are applied in order, the attribute flags are appended
    /// after them and a common name or serial number flag replaces the one
    /// from the strings.
    pub fn to_distinguished_name(&self) -> Result<DistinguishedName> {
        let mut dn = DistinguishedName::default();
        for value in &self.subject {
            subject::parse_into(value, &mut dn)?;
        }
        dn.country.extend(self.subject_country.iter().cloned());
        dn.organization.extend(self.subject_org.iter().cloned());
        dn.organizational_unit.extend(self.subject_ou.iter().cloned());
        dn.locality.extend(self.subject_locality.iter().cloned());
        dn.province.extend(self.subject_province.iter().cloned());
        dn.street_address
            .extend(self.subject_street_address.iter().cloned());
        dn.postal_code.extend(self.subject_postal_code.iter().cloned());
        if self.subject_serial_number.is_some() {
            dn.serial_number = self.subject_serial_number.clone();
        }
        if self.subject_common_name.is_some() {
            dn.common_name = self.subject_common_name.clone();
        }
        Ok(dn)
    }
}

/// Subject alternative name flags.
#[derive(Args, Debug, Default)]
pub struct SanArgs {
    /// DNS subject alternative name
    #[arg(long, env = "PCERT_DNS", value_delimiter = ',')]
    pub dns: Vec<String>,

    /// Email subject alternative name
    #[arg(long, env = "PCERT_EMAIL", value_delimiter = ',')]
    pub email: Vec<String>,

    /// IP subject alternative name
    #[arg(long, env = "PCERT_IP", value_delimiter = ',')]
    pub ip: Vec<IpAddr>,

    /// URI subject alternative name
    #[arg(long, env = "PCERT_URI", value_delimiter = ',')]
    pub uri: Vec<Url>,
}

impl SanArgs {
    pub fn to_names(&self) -> SubjectAltNames {
        SubjectAltNames {
            dns_names: self.dns.clone(),
            email_addresses: self.email.clone(),
            ip_addresses: self.ip.clone(),
            uris: self.uri.clone(),
        }
    }
}

/// Flags shared by certificates and certificate signing requests.
///
/// The signature algorithm is not among them: `sign` always uses the one of
/// the request, so only `create` and `request` take `--sign-alg`.
#[derive(Args, Debug, Default)]
pub struct RequestFlags {
    #[command(flatten)]
    pub subject: SubjectArgs,

    #[command(flatten)]
    pub san: SanArgs,

    /// Key usage, see 'pcert list key-usage'
    #[arg(long, env = "PCERT_KEY_USAGE", value_delimiter = ',', value_parser = parse_key_usage)]
    pub key_usage: Vec<FlagSet<KeyUsages>>,

    /// Extended key usage, see 'pcert list ext-key-usage'
    #[arg(long, env = "PCERT_EXT_KEY_USAGE", value_delimiter = ',')]
    pub ext_key_usage: Vec<ExtendedKeyUsageOption>,
}

impl RequestFlags {
    pub fn to_options(&self) -> Result<CertificateOptions> {
        let mut ext_key_usage = Vec::new();
        for usage in &self.ext_key_usage {
            add_ext_usage(&mut ext_key_usage, *usage);
        }
        Ok(CertificateOptions {
            subject: self.subject.to_distinguished_name()?,
            key_usage: self
                .key_usage
                .iter()
                .fold(FlagSet::default(), |acc, usage| acc | *usage),
            ext_key_usage,
            san: self.san.to_names(),
            ..Default::default()
        })
    }
}

/// Flags describing a certificate.
#[derive(Args, Debug, Default)]
pub struct CertificateArgs {
    #[command(flatten)]
    pub request: RequestFlags,

    /// Not valid before time in RFC 3339 format, e.g. '2020-01-01T00:00:00Z'
    #[arg(long, env = "PCERT_NOT_BEFORE", value_parser = parse_time)]
    pub not_before: Option<OffsetDateTime>,

    /// Not valid after time in RFC 3339 format, takes precedence over --expiry
    #[arg(long, env = "PCERT_NOT_AFTER", value_parser = parse_time)]
    pub not_after: Option<OffsetDateTime>,

    /// Validity period of the certificate, '<n>d' for days or '<n>y' for years
    #[arg(long, env = "PCERT_EXPIRY", value_parser = parse_duration)]
    pub expiry: Option<Duration>,

    /// Add the basic constraints extension
    #[arg(long, env = "PCERT_BASIC_CONSTRAINTS")]
    pub basic_constraints: bool,

    /// Mark the certificate as CA in the basic constraints
    #[arg(long, env = "PCERT_IS_CA")]
    pub is_ca: bool,

    /// Max path length in the basic constraints, an integer or 'none'
    #[arg(long, env = "PCERT_MAX_PATH_LENGTH", value_parser = parse_max_path_length)]
    pub max_path_length: Option<MaxPathLength>,
}

impl CertificateArgs {
    /// Builds library options from the flags.
    ///
    /// `--is-ca` and `--max-path-length` imply `--basic-constraints`.
    pub fn to_options(&self) -> Result<CertificateOptions> {
        let max_path_length = self.max_path_length.and_then(|m| m.0);
        Ok(CertificateOptions {
            not_before: self.not_before,
            not_after: self.not_after,
            expiry: self.expiry,
            basic_constraints_valid: self.basic_constraints
                || self.is_ca
                || self.max_path_length.is_some(),
            is_ca: self.is_ca,
            max_path_length,
            ..self.request.to_options()?
        })
    }
}

/// Value of `--max-path-length`, `None` for "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPathLength(pub Option<u8>);

pub fn parse_max_path_length(s: &str) -> Result<MaxPathLength> {
    if s.eq_ignore_ascii_case("none") {
        return Ok(MaxPathLength(None));
    }
    s.parse::<u8>()
        .map(|n| MaxPathLength(Some(n)))
        .map_err(|_| PcertError::InvalidInput(format!("max path length '{s}': expected an integer or 'none'")))
}

/// Parses `<n>d` (days) or `<n>y` (years of 365 days).
pub fn parse_duration(s: &str) -> Result<Duration> {
    let invalid = || PcertError::InvalidDuration(s.to_string());
    let (value, days_per_unit) = if let Some(value) = s.strip_suffix('d') {
        (value, 1)
    } else if let Some(value) = s.strip_suffix('y') {
        (value, 365)
    } else {
        return Err(invalid());
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: i64 = value.parse().map_err(|_| invalid())?;
    value
        .checked_mul(days_per_unit)
        .filter(|days| *days <= Duration::MAX.whole_days())
        .map(Duration::days)
        .ok_or_else(invalid)
}

pub fn parse_time(s: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339)
        .map_err(|e| PcertError::InvalidInput(format!("time '{s}' is not in RFC 3339 format: {e}")))
}

fn parse_key_usage(s: &str) -> Result<FlagSet<KeyUsages>> {
    string_to_usage(s)
}
