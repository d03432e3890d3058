use std::time::SystemTime;

use der::Encode;
use der::asn1::{GeneralizedTime, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::time::{Time, Validity};

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{CertificateTemplate, DistinguishedName, ExtensionParam};
use crate::error::{PcertError, Result};
use crate::key::PublicKey;
use crate::serial::SerialNumber;

/// First year that no longer fits into an ASN.1 UTCTime.
const UTC_TIME_END_YEAR: i32 = 2050;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The encoded name of the certificate issuer.
/// * `not_before` - The start of the certificate's validity period.
/// * `not_after` - The end of the certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - The encoded X.509 extensions for the certificate.
pub struct TbsCertificate {
    pub serial_number: SerialNumber,
    pub signature_algorithm: SignatureAlgorithm,
    /// Kept in encoded form so that it matches the issuer's subject byte for byte.
    pub issuer: Name,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Collects the to-be-signed fields of a template.
    ///
    /// # Arguments
    /// * `template` - The fully defaulted template.
    /// * `issuer` - The issuer name, the subject itself for self-signed certificates.
    /// * `signature_algorithm` - The algorithm the issuer key will sign with.
    ///
    /// # Errors
    /// `InvalidInput` if the template has no public key.
    pub fn from_template(
        template: &CertificateTemplate,
        issuer: Name,
        signature_algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        let subject_public_key = template.public_key.clone().ok_or_else(|| {
            PcertError::InvalidInput("certificate template has no public key".to_string())
        })?;

        Ok(Self {
            serial_number: template.serial_number.clone(),
            signature_algorithm,
            issuer,
            not_before: template.not_before,
            not_after: template.not_after,
            subject: template.subject.clone(),
            subject_public_key,
            extensions: template.encode_extensions()?,
        })
    }

    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    ///
    /// # Returns
    /// A version 3 `TbsCertificateInner`. Extensions are omitted when there are none.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>>>()?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: self.serial_number.to_x509()?,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity: Validity {
                not_before: to_x509_time(self.not_before)?,
                not_after: to_x509_time(self.not_after)?,
            },
            subject: self.subject.as_x509_name()?,
            subject_public_key_info: self.subject_public_key.as_spki().clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }
}

/// Encodes a point in time as UTCTime before 2050 and as GeneralizedTime from then on.
pub fn to_x509_time(value: OffsetDateTime) -> Result<Time> {
    let system_time = SystemTime::from(value);
    if value.year() < UTC_TIME_END_YEAR {
        Ok(Time::UtcTime(UtcTime::from_system_time(system_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_system_time(
            system_time,
        )?))
    }
}
