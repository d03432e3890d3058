//! Parsing and formatting of `/KEY=value` subject strings.
//!
//! ```rust
//! use pcert::cert::subject;
//!
//! let dn = subject::parse("/C=CH/O=Acme/OU=Ops/OU=Dev/CN=example.com").unwrap();
//! assert_eq!(dn.organizational_unit, vec!["Ops", "Dev"]);
//! assert_eq!(dn.common_name.as_deref(), Some("example.com"));
//! ```

use super::params::DistinguishedName;
use crate::error::{PcertError, Result};

/// Recognized attribute keys.
pub const SUBJECT_KEYS: &[&str] = &[
    "C",
    "O",
    "OU",
    "L",
    "P",
    "ST",
    "STREET",
    "POSTALCODE",
    "SERIALNUMBER",
    "CN",
];

/// Parses a subject string into a new distinguished name.
pub fn parse(subject: &str) -> Result<DistinguishedName> {
    let mut dn = DistinguishedName::default();
    parse_into(subject, &mut dn)?;
    Ok(dn)
}

/// Parses a subject string on top of an existing distinguished name.
///
/// Multi-valued attributes are appended in encounter order, `CN` and
/// `SERIALNUMBER` are replaced. On error `dn` may hold the segments parsed
/// before the failing one.
///
/// # Errors
/// * `MalformedSubject` for a non-empty segment without `=`.
/// * `UnknownAttribute` for a key not in [`SUBJECT_KEYS`].
pub fn parse_into(subject: &str, dn: &mut DistinguishedName) -> Result<()> {
    for segment in subject.split('/').filter(|s| !s.is_empty()) {
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| PcertError::MalformedSubject(segment.to_string()))?;
        let value = value.to_string();
        match key.to_ascii_uppercase().as_str() {
            "C" => dn.country.push(value),
            "O" => dn.organization.push(value),
            "OU" => dn.organizational_unit.push(value),
            "L" => dn.locality.push(value),
            "P" | "ST" => dn.province.push(value),
            "STREET" => dn.street_address.push(value),
            "POSTALCODE" => dn.postal_code.push(value),
            "SERIALNUMBER" => dn.serial_number = Some(value),
            "CN" => dn.common_name = Some(value),
            _ => return Err(PcertError::UnknownAttribute(key.to_string())),
        }
    }
    Ok(())
}

/// Formats a distinguished name as a `/KEY=value` string.
pub fn format(dn: &DistinguishedName) -> String {
    let multi = [
        ("C", &dn.country),
        ("ST", &dn.province),
        ("L", &dn.locality),
        ("STREET", &dn.street_address),
        ("POSTALCODE", &dn.postal_code),
        ("O", &dn.organization),
        ("OU", &dn.organizational_unit),
    ];
    let mut out = String::new();
    for (key, values) in multi {
        for value in values {
            out.push_str(&format!("/{key}={value}"));
        }
    }
    if let Some(cn) = &dn.common_name {
        out.push_str(&format!("/CN={cn}"));
    }
    if let Some(serial) = &dn.serial_number {
        out.push_str(&format!("/SERIALNUMBER={serial}"));
    }
    out
}
