use std::fmt;
use std::net::IpAddr;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::SetOfVec;
use der::flagset::FlagSet;
use der::{Any, Tag};
use time::{Duration, OffsetDateTime};
use url::Url;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::SignatureAlgorithm;
use super::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName,
    SubjectKeyIdentifier, ToAndFromX509Extension,
};
use crate::error::{PcertError, Result};
use crate::key::PublicKey;
use crate::oid;
use crate::serial::SerialNumber;
use crate::usage::{ExtendedKeyUsageOption, KeyUsages};

/// Distinguished name of a certificate subject or issuer.
///
/// Country, organization, organizational unit, locality, province, street address and
/// postal code may carry several values. Common name and serial number carry at most one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Builder)]
pub struct DistinguishedName {
    #[builder(default)]
    pub country: Vec<String>,
    #[builder(default)]
    pub organization: Vec<String>,
    #[builder(default)]
    pub organizational_unit: Vec<String>,
    #[builder(default)]
    pub locality: Vec<String>,
    #[builder(default)]
    pub province: Vec<String>,
    #[builder(default)]
    pub street_address: Vec<String>,
    #[builder(default)]
    pub postal_code: Vec<String>,
    #[builder(into)]
    pub serial_number: Option<String>,
    #[builder(into)]
    pub common_name: Option<String>,
}

impl DistinguishedName {
    pub fn is_empty(&self) -> bool {
        self.attributes().is_empty()
    }

    /// Attribute type and value pairs in encoding order.
    fn attributes(&self) -> Vec<(ObjectIdentifier, &str)> {
        let multi = [
            (oid::COUNTRY_NAME, &self.country),
            (oid::STATE_OR_PROVINCE_NAME, &self.province),
            (oid::LOCALITY_NAME, &self.locality),
            (oid::STREET_ADDRESS, &self.street_address),
            (oid::POSTAL_CODE, &self.postal_code),
            (oid::ORGANIZATION_NAME, &self.organization),
            (oid::ORGANIZATIONAL_UNIT_NAME, &self.organizational_unit),
        ];
        let mut attributes: Vec<(ObjectIdentifier, &str)> = multi
            .into_iter()
            .flat_map(|(attribute, values)| values.iter().map(move |v| (attribute, v.as_str())))
            .collect();
        if let Some(cn) = &self.common_name {
            attributes.push((oid::COMMON_NAME, cn));
        }
        if let Some(serial) = &self.serial_number {
            attributes.push((oid::SERIAL_NUMBER, serial));
        }
        attributes
    }

    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// # Returns
    /// An `x509_cert::name::Name` with one relative distinguished name per value.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::Name> {
        let rdns = self
            .attributes()
            .into_iter()
            .map(|(attribute, value)| {
                let tag = if (attribute == oid::COUNTRY_NAME || attribute == oid::SERIAL_NUMBER)
                    && is_printable(value)
                {
                    Tag::PrintableString
                } else {
                    Tag::Utf8String
                };
                let atv = AttributeTypeAndValue {
                    oid: attribute,
                    value: Any::new(tag, value.as_bytes())?,
                };
                Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attribute types without a field in this struct are skipped.
    pub fn from_x509_name(x509dn: &x509_cert::name::Name) -> Self {
        let mut dn = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let value = String::from_utf8_lossy(attr.value.value()).into_owned();
                match attr.oid {
                    oid::COUNTRY_NAME => dn.country.push(value),
                    oid::ORGANIZATION_NAME => dn.organization.push(value),
                    oid::ORGANIZATIONAL_UNIT_NAME => dn.organizational_unit.push(value),
                    oid::LOCALITY_NAME => dn.locality.push(value),
                    oid::STATE_OR_PROVINCE_NAME => dn.province.push(value),
                    oid::STREET_ADDRESS => dn.street_address.push(value),
                    oid::POSTAL_CODE => dn.postal_code.push(value),
                    oid::SERIAL_NUMBER => dn.serial_number = Some(value),
                    oid::COMMON_NAME => dn.common_name = Some(value),
                    _ => {}
                }
            }
        }
        dn
    }
}

fn is_printable(value: &str) -> bool {
    value.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || matches!(c, ' ' | '\'' | '(' | ')' | '+' | ',' | '-' | '.' | '/' | ':' | '=' | '?')
    })
}

fn attribute_short_name(attribute: ObjectIdentifier) -> &'static str {
    match attribute {
        oid::COUNTRY_NAME => "C",
        oid::STATE_OR_PROVINCE_NAME => "ST",
        oid::LOCALITY_NAME => "L",
        oid::STREET_ADDRESS => "STREET",
        oid::POSTAL_CODE => "POSTALCODE",
        oid::ORGANIZATION_NAME => "O",
        oid::ORGANIZATIONAL_UNIT_NAME => "OU",
        oid::COMMON_NAME => "CN",
        _ => "SERIALNUMBER",
    }
}

fn escape_rfc4514(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let leading = i == 0 && matches!(c, ' ' | '#');
        let trailing = i == last && c == ' ';
        if leading || trailing || matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Formats the name most-specific first, e.g. `CN=example,O=Acme,C=CH`.
impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .attributes()
            .into_iter()
            .rev()
            .map(|(attribute, value)| {
                format!("{}={}", attribute_short_name(attribute), escape_rfc4514(value))
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Subject alternative names of a certificate or request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubjectAltNames {
    pub dns_names: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub uris: Vec<Url>,
}

impl SubjectAltNames {
    pub fn is_empty(&self) -> bool {
        self.dns_names.is_empty()
            && self.email_addresses.is_empty()
            && self.ip_addresses.is_empty()
            && self.uris.is_empty()
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        if self.oid != E::OID {
            return Err(PcertError::InvalidInput(format!(
                "extension {} is not {}",
                self.oid,
                E::OID
            )));
        }
        E::from_x509_extension_value(&self.value)
    }

    pub fn to_x509(&self) -> Result<x509_cert::ext::Extension> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: der::asn1::OctetString::new(self.value.clone())?,
        })
    }

    pub fn from_x509(extension: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: extension.extn_id,
            critical: extension.critical,
            value: extension.extn_value.as_bytes().to_vec(),
        }
    }
}

/// Caller supplied description of a certificate.
///
/// Every field is optional; [`crate::builder::build`] fills in the defaults.
///
/// ```rust
/// use pcert::cert::params::{CertificateOptions, DistinguishedName};
///
/// let options = CertificateOptions::builder()
///     .subject(DistinguishedName::builder().common_name("example.com").build())
///     .expiry(time::Duration::days(90))
///     .build();
/// assert!(options.not_before.is_none());
/// ```
#[derive(Clone, Debug, Default, Builder)]
pub struct CertificateOptions {
    #[builder(default)]
    pub subject: DistinguishedName,
    pub not_before: Option<OffsetDateTime>,
    pub not_after: Option<OffsetDateTime>,
    /// Validity period used when `not_after` is not set.
    pub expiry: Option<Duration>,
    pub serial_number: Option<SerialNumber>,
    #[builder(default)]
    pub key_usage: FlagSet<KeyUsages>,
    #[builder(default)]
    pub ext_key_usage: Vec<ExtendedKeyUsageOption>,
    pub subject_key_id: Option<Vec<u8>>,
    pub authority_key_id: Option<Vec<u8>>,
    #[builder(default)]
    pub basic_constraints_valid: bool,
    #[builder(default)]
    pub is_ca: bool,
    /// `None` asserts no path length, `Some(0)` asserts exactly zero.
    pub max_path_length: Option<u8>,
    #[builder(default)]
    pub san: SubjectAltNames,
    pub signature_algorithm: Option<SignatureAlgorithm>,
    pub public_key: Option<PublicKey>,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// A fully defaulted certificate description, ready to be signed.
///
/// Produced by [`crate::builder::build`], refined by the profile and promotion
/// steps and consumed by the signing step. Decoding a certificate with
/// [`super::Certificate::to_template`] yields the same structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateTemplate {
    pub subject: DistinguishedName,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub serial_number: SerialNumber,
    pub key_usage: FlagSet<KeyUsages>,
    pub ext_key_usage: Vec<ExtendedKeyUsageOption>,
    pub subject_key_id: Option<Vec<u8>>,
    pub authority_key_id: Option<Vec<u8>>,
    pub basic_constraints_valid: bool,
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
    pub san: SubjectAltNames,
    pub signature_algorithm: Option<SignatureAlgorithm>,
    pub public_key: Option<PublicKey>,
    /// Extensions without a dedicated field.
    pub extensions: Vec<ExtensionParam>,
}

impl CertificateTemplate {
    /// Encodes the template fields as X.509 extensions.
    ///
    /// # Returns
    /// The key identifiers, key usage, extended key usage, basic constraints and
    /// subject alternative names that are set, followed by the free-form
    /// extensions whose OID is not already present.
    pub fn encode_extensions(&self) -> Result<Vec<ExtensionParam>> {
        let mut encoded = Vec::new();
        if let Some(ski) = &self.subject_key_id {
            encoded.push(ExtensionParam::from_extension(
                &SubjectKeyIdentifier(ski.clone()),
                false,
            )?);
        }
        if let Some(aki) = &self.authority_key_id {
            encoded.push(ExtensionParam::from_extension(
                &AuthorityKeyIdentifier {
                    key_identifier: aki.clone(),
                },
                false,
            )?);
        }
        if !self.key_usage.is_empty() {
            encoded.push(ExtensionParam::from_extension(&KeyUsage(self.key_usage), true)?);
        }
        if !self.ext_key_usage.is_empty() {
            encoded.push(ExtensionParam::from_extension(
                &ExtendedKeyUsage {
                    usage: self.ext_key_usage.clone(),
                },
                false,
            )?);
        }
        if self.basic_constraints_valid {
            encoded.push(ExtensionParam::from_extension(
                &BasicConstraints {
                    is_ca: self.is_ca,
                    max_path_length: self.max_path_length,
                },
                true,
            )?);
        }
        if !self.san.is_empty() {
            encoded.push(ExtensionParam::from_extension(
                &SubjectAltName {
                    names: self.san.clone(),
                },
                false,
            )?);
        }
        for extension in &self.extensions {
            if !encoded.iter().any(|e| e.oid == extension.oid) {
                encoded.push(extension.clone());
            }
        }
        Ok(encoded)
    }

    /// Moves a decoded extension into its dedicated field, or into the
    /// free-form list when the OID has none.
    pub fn apply_extension(&mut self, extension: &ExtensionParam) -> Result<()> {
        match extension.oid {
            SubjectKeyIdentifier::OID => {
                self.subject_key_id = Some(extension.to_extension::<SubjectKeyIdentifier>()?.0);
            }
            AuthorityKeyIdentifier::OID => {
                let aki = extension.to_extension::<AuthorityKeyIdentifier>()?;
                if !aki.key_identifier.is_empty() {
                    self.authority_key_id = Some(aki.key_identifier);
                }
            }
            KeyUsage::OID => self.key_usage = extension.to_extension::<KeyUsage>()?.0,
            ExtendedKeyUsage::OID => {
                self.ext_key_usage = extension.to_extension::<ExtendedKeyUsage>()?.usage;
            }
            BasicConstraints::OID => {
                let bc = extension.to_extension::<BasicConstraints>()?;
                self.basic_constraints_valid = true;
                self.is_ca = bc.is_ca;
                self.max_path_length = bc.max_path_length;
            }
            SubjectAltName::OID => self.san = extension.to_extension::<SubjectAltName>()?.names,
            _ => self.extensions.push(extension.clone()),
        }
        Ok(())
    }
}
