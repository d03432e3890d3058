//! Text and JSON renderings of certificates for `pcert show`.

use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc5280;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::cert::Certificate;
use crate::cert::params::CertificateTemplate;
use crate::error::{PcertError, Result};
use crate::key::PublicKey;
use crate::usage::{ext_usage_to_string, usage_to_names, usage_to_string};

const EXTENSION_NAMES: &[(ObjectIdentifier, &str)] = &[
    (rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER, "SubjectKeyId"),
    (rfc5280::ID_CE_KEY_USAGE, "KeyUsage"),
    (rfc5280::ID_CE_EXT_KEY_USAGE, "ExtendedKeyUsage"),
    (rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER, "AuthorityKeyId"),
    (rfc5280::ID_CE_BASIC_CONSTRAINTS, "BasicConstraints"),
    (rfc5280::ID_CE_SUBJECT_ALT_NAME, "SubjectAltName"),
    (rfc5280::ID_CE_CERTIFICATE_POLICIES, "CertificatePolicies"),
    (rfc5280::ID_CE_NAME_CONSTRAINTS, "NameConstraints"),
    (rfc5280::ID_CE_CRL_DISTRIBUTION_POINTS, "CRLDistributionPoints"),
    (rfc5280::ID_PE_AUTHORITY_INFO_ACCESS, "AuthorityInfoAccess"),
    (rfc5280::ID_CE_CRL_NUMBER, "CRLNumber"),
];

fn extension_name(oid: &ObjectIdentifier) -> &'static str {
    EXTENSION_NAMES
        .iter()
        .find(|(known, _)| known == oid)
        .map(|(_, name)| *name)
        .unwrap_or("unknown")
}

fn rfc3339(value: OffsetDateTime) -> Result<String> {
    value
        .format(&Rfc3339)
        .map_err(|e| PcertError::EncodingError(e.to_string()))
}

fn signature_name(cert: &Certificate) -> String {
    cert.signature_algorithm()
        .map(|alg| alg.to_string())
        .unwrap_or_else(|| cert.inner.signature_algorithm.oid.to_string())
}

fn public_key(template: &CertificateTemplate) -> Result<&PublicKey> {
    template
        .public_key
        .as_ref()
        .ok_or_else(|| PcertError::InvalidInput("certificate has no public key".to_string()))
}

/// Renders the human readable description of a certificate, terminated by an empty line.
pub fn format_text(cert: &Certificate) -> Result<String> {
    let template = cert.to_template()?;
    let key = public_key(&template)?.algorithm();

    let mut out = String::new();
    let _ = writeln!(out, "subject:    {}", template.subject);
    let _ = writeln!(out, "serial:     {}", template.serial_number);
    let _ = writeln!(out, "issuer:     {}", cert.issuer());
    let _ = writeln!(out, "version:    {}", cert.version());
    let _ = writeln!(out, "not before: {}", rfc3339(template.not_before)?);
    let _ = writeln!(out, "not after:  {}", rfc3339(template.not_after)?);
    match key.bits() {
        Some(bits) => {
            let _ = writeln!(out, "public key: {} ({bits} bit)", key.name());
        }
        None => {
            let _ = writeln!(out, "public key: {}", key.name());
        }
    }
    let _ = writeln!(out, "signature:  {}", signature_name(cert));
    let _ = writeln!(out, "key usage: {}", usage_to_string(template.key_usage));
    let _ = writeln!(
        out,
        "extended key usage: {}",
        ext_usage_to_string(&template.ext_key_usage)
    );
    if template.basic_constraints_valid {
        let _ = write!(out, "basic constraints: CA:{}", template.is_ca);
        if let Some(path_length) = template.max_path_length {
            let _ = write!(out, " pathLen:{path_length}");
        }
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "subject key identifier: {}",
        hex::encode(template.subject_key_id.unwrap_or_default())
    );
    let _ = writeln!(
        out,
        "authority key identifier: {}",
        hex::encode(template.authority_key_id.unwrap_or_default())
    );

    let san = &template.san;
    if !san.is_empty() {
        out.push_str("subject alternative names\n");
        for dns in &san.dns_names {
            let _ = writeln!(out, "    dns:{dns}");
        }
        for ip in &san.ip_addresses {
            let _ = writeln!(out, "    ip:{ip}");
        }
        for email in &san.email_addresses {
            let _ = writeln!(out, "    email:{email}");
        }
        for uri in &san.uris {
            let _ = writeln!(out, "    uri:{uri}");
        }
    }
    out.push('\n');
    Ok(out)
}

#[derive(Serialize)]
struct JsonPublicKey {
    algorithm: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
}

#[derive(Serialize)]
struct JsonSan {
    dns: Vec<String>,
    ip: Vec<String>,
    email: Vec<String>,
    uri: Vec<String>,
}

#[derive(Serialize)]
struct JsonBasicConstraints {
    is_ca: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_path_len: Option<u8>,
}

#[derive(Serialize)]
struct JsonCertificate {
    signature_algorithm: String,
    signature: String,
    public_key: JsonPublicKey,
    version: u8,
    serial_number: String,
    issuer: String,
    subject: String,
    not_before: String,
    not_after: String,
    key_usage: Vec<&'static str>,
    extended_key_usage: Vec<String>,
    san: JsonSan,
    extensions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    basic_constraints: Option<JsonBasicConstraints>,
}

/// Renders a certificate as a pretty printed JSON object followed by a newline.
pub fn format_json(cert: &Certificate) -> Result<String> {
    let template = cert.to_template()?;
    let key = public_key(&template)?.algorithm();

    let json = JsonCertificate {
        signature_algorithm: signature_name(cert),
        signature: STANDARD.encode(cert.signature()),
        public_key: JsonPublicKey {
            algorithm: key.name(),
            size: key.bits(),
        },
        version: cert.version(),
        serial_number: template.serial_number.to_string(),
        issuer: cert.issuer().to_string(),
        subject: template.subject.to_string(),
        not_before: rfc3339(template.not_before)?,
        not_after: rfc3339(template.not_after)?,
        key_usage: usage_to_names(template.key_usage),
        extended_key_usage: template
            .ext_key_usage
            .iter()
            .map(ToString::to_string)
            .collect(),
        san: JsonSan {
            dns: template.san.dns_names.clone(),
            ip: template.san.ip_addresses.iter().map(ToString::to_string).collect(),
            email: template.san.email_addresses.clone(),
            uri: template.san.uris.iter().map(ToString::to_string).collect(),
        },
        extensions: cert
            .extensions()
            .iter()
            .map(|ext| format!("{} ({})", ext.oid, extension_name(&ext.oid)))
            .collect(),
        basic_constraints: template
            .basic_constraints_valid
            .then_some(JsonBasicConstraints {
                is_ca: template.is_ca,
                max_path_len: template.max_path_length,
            }),
    };

    let mut out = serde_json::to_string_pretty(&json)
        .map_err(|e| PcertError::EncodingError(e.to_string()))?;
    out.push('\n');
    Ok(out)
}
