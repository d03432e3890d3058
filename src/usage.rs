//! Key usage and extended key usage names.
//!
//! The tables in this module are the only place where human readable usage names
//! are mapped to their X.509 values. String forms are sorted and comma separated
//! so that converting a value to a string and back yields the same value.

use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use der::flagset::FlagSet;
pub use x509_cert::ext::pkix::KeyUsages;

use crate::error::{PcertError, Result};
use crate::oid;

/// Canonical key usage names in bit order.
pub const KEY_USAGES: &[(&str, KeyUsages)] = &[
    ("DigitalSignature", KeyUsages::DigitalSignature),
    ("ContentCommitment", KeyUsages::NonRepudiation),
    ("KeyEncipherment", KeyUsages::KeyEncipherment),
    ("DataEncipherment", KeyUsages::DataEncipherment),
    ("KeyAgreement", KeyUsages::KeyAgreement),
    ("CertSign", KeyUsages::KeyCertSign),
    ("CRLSign", KeyUsages::CRLSign),
    ("EncipherOnly", KeyUsages::EncipherOnly),
    ("DecipherOnly", KeyUsages::DecipherOnly),
];

/// Key usage applied by the server and client profiles.
pub fn default_key_usage() -> FlagSet<KeyUsages> {
    KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendedKeyUsageOption {
    Any,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    IpsecEndSystem,
    IpsecTunnel,
    IpsecUser,
    TimeStamping,
    OcspSigning,
    MicrosoftServerGatedCrypto,
    NetscapeServerGatedCrypto,
    MicrosoftCommercialCodeSigning,
    MicrosoftKernelCodeSigning,
    /// A usage without a name in this crate, kept by OID.
    Other(ObjectIdentifier),
}

/// Canonical extended key usage names.
pub const EXT_KEY_USAGES: &[(&str, ExtendedKeyUsageOption)] = &[
    ("Any", ExtendedKeyUsageOption::Any),
    ("ServerAuth", ExtendedKeyUsageOption::ServerAuth),
    ("ClientAuth", ExtendedKeyUsageOption::ClientAuth),
    ("CodeSigning", ExtendedKeyUsageOption::CodeSigning),
    ("EmailProtection", ExtendedKeyUsageOption::EmailProtection),
    ("IPSECEndSystem", ExtendedKeyUsageOption::IpsecEndSystem),
    ("IPSECTunnel", ExtendedKeyUsageOption::IpsecTunnel),
    ("IPSECUser", ExtendedKeyUsageOption::IpsecUser),
    ("TimeStamping", ExtendedKeyUsageOption::TimeStamping),
    ("OCSPSigning", ExtendedKeyUsageOption::OcspSigning),
    (
        "MicrosoftServerGatedCrypto",
        ExtendedKeyUsageOption::MicrosoftServerGatedCrypto,
    ),
    (
        "NetscapeServerGatedCrypto",
        ExtendedKeyUsageOption::NetscapeServerGatedCrypto,
    ),
    (
        "MicrosoftCommercialCodeSigning",
        ExtendedKeyUsageOption::MicrosoftCommercialCodeSigning,
    ),
    (
        "MicrosoftKernelCodeSigning",
        ExtendedKeyUsageOption::MicrosoftKernelCodeSigning,
    ),
];

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::Any => oid::ANY_EXTENDED_KEY_USAGE,
            ExtendedKeyUsageOption::ServerAuth => oid::KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => oid::KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::CodeSigning => oid::KP_CODE_SIGNING,
            ExtendedKeyUsageOption::EmailProtection => oid::KP_EMAIL_PROTECTION,
            ExtendedKeyUsageOption::IpsecEndSystem => oid::KP_IPSEC_END_SYSTEM,
            ExtendedKeyUsageOption::IpsecTunnel => oid::KP_IPSEC_TUNNEL,
            ExtendedKeyUsageOption::IpsecUser => oid::KP_IPSEC_USER,
            ExtendedKeyUsageOption::TimeStamping => oid::KP_TIME_STAMPING,
            ExtendedKeyUsageOption::OcspSigning => oid::KP_OCSP_SIGNING,
            ExtendedKeyUsageOption::MicrosoftServerGatedCrypto => oid::MS_SERVER_GATED_CRYPTO,
            ExtendedKeyUsageOption::NetscapeServerGatedCrypto => oid::NETSCAPE_SERVER_GATED_CRYPTO,
            ExtendedKeyUsageOption::MicrosoftCommercialCodeSigning => {
                oid::MS_COMMERCIAL_CODE_SIGNING
            }
            ExtendedKeyUsageOption::MicrosoftKernelCodeSigning => oid::MS_KERNEL_CODE_SIGNING,
            ExtendedKeyUsageOption::Other(oid) => oid,
        }
    }
}

impl From<ObjectIdentifier> for ExtendedKeyUsageOption {
    fn from(value: ObjectIdentifier) -> Self {
        EXT_KEY_USAGES
            .iter()
            .map(|(_, usage)| *usage)
            .find(|usage| ObjectIdentifier::from(*usage) == value)
            .unwrap_or(ExtendedKeyUsageOption::Other(value))
    }
}

impl fmt::Display for ExtendedKeyUsageOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match EXT_KEY_USAGES.iter().find(|(_, usage)| usage == self) {
            Some((name, _)) => f.write_str(name),
            None => write!(f, "{}", ObjectIdentifier::from(*self)),
        }
    }
}

/// Accepts a canonical name, case-insensitively, or a dotted OID.
impl FromStr for ExtendedKeyUsageOption {
    type Err = PcertError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some((_, usage)) = EXT_KEY_USAGES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
        {
            return Ok(*usage);
        }
        if s.starts_with(|c: char| c.is_ascii_digit()) {
            if let Ok(oid) = ObjectIdentifier::new(s) {
                return Ok(oid.into());
            }
        }
        Err(PcertError::UnknownUsage(s.to_string()))
    }
}

fn split_names(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|name| !name.is_empty())
}

/// Returns the sorted, comma separated names of the bits set in `usage`.
pub fn usage_to_string(usage: FlagSet<KeyUsages>) -> String {
    let mut names = usage_to_names(usage);
    names.sort_unstable();
    names.join(",")
}

/// Returns the names of the bits set in `usage` in bit order.
pub fn usage_to_names(usage: FlagSet<KeyUsages>) -> Vec<&'static str> {
    KEY_USAGES
        .iter()
        .filter(|(_, bit)| usage.contains(*bit))
        .map(|(name, _)| *name)
        .collect()
}

/// Parses a comma separated list of key usage names into a bitmask.
///
/// Names are matched case-insensitively. An empty string yields an empty mask.
///
/// # Errors
/// `UnknownUsage` naming the first name that is not in [`KEY_USAGES`].
pub fn string_to_usage(s: &str) -> Result<FlagSet<KeyUsages>> {
    let mut usage = FlagSet::<KeyUsages>::default();
    for name in split_names(s) {
        let bit = KEY_USAGES
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, bit)| *bit)
            .ok_or_else(|| PcertError::UnknownUsage(name.to_string()))?;
        usage |= bit;
    }
    Ok(usage)
}

/// Returns the sorted, deduplicated, comma separated names of `usages`.
pub fn ext_usage_to_string(usages: &[ExtendedKeyUsageOption]) -> String {
    let mut names: Vec<String> = usages.iter().map(ToString::to_string).collect();
    names.sort_unstable();
    names.dedup();
    names.join(",")
}

/// Parses a comma separated list of extended key usage names.
///
/// Duplicates are dropped and the first occurrence keeps its position.
pub fn string_to_ext_usage(s: &str) -> Result<Vec<ExtendedKeyUsageOption>> {
    let mut usages = Vec::new();
    for name in split_names(s) {
        add_ext_usage(&mut usages, name.parse()?);
    }
    Ok(usages)
}

/// Appends `usage` unless it is already present.
pub fn add_ext_usage(usages: &mut Vec<ExtendedKeyUsageOption>, usage: ExtendedKeyUsageOption) {
    if !usages.contains(&usage) {
        usages.push(usage);
    }
}
