pub mod extensions;
pub mod params;
pub mod subject;

use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use der::asn1::AnyRef;
use der::{Any, Decode, Encode};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{PcertError, Result};
use crate::key::PublicKey;
use crate::oid;
use crate::pem_utils;
use crate::serial::SerialNumber;
use params::{CertificateTemplate, DistinguishedName, ExtensionParam};

/// Represents the supported signature algorithms for certificates and requests.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// PKCS#1 v1.5 with SHA-256.
    Sha256WithRsa,
    /// PKCS#1 v1.5 with SHA-384.
    Sha384WithRsa,
    /// PKCS#1 v1.5 with SHA-512.
    Sha512WithRsa,
    /// ECDSA over P-224 with SHA-224.
    EcdsaWithSha224,
    /// ECDSA over P-256 with SHA-256.
    EcdsaWithSha256,
    /// ECDSA over P-384 with SHA-384.
    EcdsaWithSha384,
    /// ECDSA over P-521 with SHA-512.
    EcdsaWithSha512,
    /// Pure EdDSA over edwards25519.
    Ed25519,
}

impl SignatureAlgorithm {
    pub const ALL: [SignatureAlgorithm; 8] = [
        SignatureAlgorithm::Sha256WithRsa,
        SignatureAlgorithm::Sha384WithRsa,
        SignatureAlgorithm::Sha512WithRsa,
        SignatureAlgorithm::EcdsaWithSha224,
        SignatureAlgorithm::EcdsaWithSha256,
        SignatureAlgorithm::EcdsaWithSha384,
        SignatureAlgorithm::EcdsaWithSha512,
        SignatureAlgorithm::Ed25519,
    ];

    /// Canonical name, as accepted by `--sign-alg`.
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256WithRsa => "SHA256-RSA",
            SignatureAlgorithm::Sha384WithRsa => "SHA384-RSA",
            SignatureAlgorithm::Sha512WithRsa => "SHA512-RSA",
            SignatureAlgorithm::EcdsaWithSha224 => "ECDSA-SHA224",
            SignatureAlgorithm::EcdsaWithSha256 => "ECDSA-SHA256",
            SignatureAlgorithm::EcdsaWithSha384 => "ECDSA-SHA384",
            SignatureAlgorithm::EcdsaWithSha512 => "ECDSA-SHA512",
            SignatureAlgorithm::Ed25519 => "Ed25519",
        }
    }

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRsa => oid::SHA256_WITH_RSA,
            SignatureAlgorithm::Sha384WithRsa => oid::SHA384_WITH_RSA,
            SignatureAlgorithm::Sha512WithRsa => oid::SHA512_WITH_RSA,
            SignatureAlgorithm::EcdsaWithSha224 => oid::ECDSA_WITH_SHA224,
            SignatureAlgorithm::EcdsaWithSha256 => oid::ECDSA_WITH_SHA256,
            SignatureAlgorithm::EcdsaWithSha384 => oid::ECDSA_WITH_SHA384,
            SignatureAlgorithm::EcdsaWithSha512 => oid::ECDSA_WITH_SHA512,
            SignatureAlgorithm::Ed25519 => oid::ED25519,
        }
    }

    pub fn from_oid(algorithm: &ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.oid() == *algorithm)
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = PcertError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| PcertError::UnknownSignatureAlgorithm(s.to_string()))
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// # Returns
    /// The algorithm OID, with NULL parameters for RSA and absent parameters otherwise.
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value {
            SignatureAlgorithm::Sha256WithRsa
            | SignatureAlgorithm::Sha384WithRsa
            | SignatureAlgorithm::Sha512WithRsa => Some(Any::from(AnyRef::NULL)),
            _ => None,
        };
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

/// Decodes an X.509 time value into an `OffsetDateTime`.
pub(crate) fn from_x509_time(value: &x509_cert::time::Time) -> OffsetDateTime {
    OffsetDateTime::from(value.to_system_time())
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM formats
/// and to decode it back into a [`CertificateTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    /// Decodes the first `CERTIFICATE` block of a PEM input.
    pub fn from_pem(input: &[u8]) -> Result<Self> {
        Self::from_der(&pem_utils::first_block(input, pem_utils::CERTIFICATE)?)
    }

    /// Decodes every `CERTIFICATE` block of a PEM input.
    ///
    /// # Errors
    /// `DecodingError` when the input holds no certificate at all.
    pub fn parse_all(input: &[u8]) -> Result<Vec<Self>> {
        let certificates = pem_utils::blocks_with_label(input, pem_utils::CERTIFICATE)?
            .iter()
            .map(|der| Self::from_der(der))
            .collect::<Result<Vec<_>>>()?;
        if certificates.is_empty() {
            return Err(PcertError::DecodingError(
                "no PEM encoded certificates found in input".to_string(),
            ));
        }
        Ok(certificates)
    }

    /// Encodes the certificate into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PcertError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    ///
    /// # Returns
    /// A string containing the PEM-encoded certificate.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::encode(pem_utils::CERTIFICATE, &self.to_der()?))
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn serial_number(&self) -> Result<SerialNumber> {
        SerialNumber::from_x509(&self.inner.tbs_certificate.serial_number)
    }

    /// The certificate version as a number, `3` for X.509 v3.
    pub fn version(&self) -> u8 {
        match self.inner.tbs_certificate.version {
            x509_cert::Version::V1 => 1,
            x509_cert::Version::V2 => 2,
            x509_cert::Version::V3 => 3,
        }
    }

    /// The outer signature algorithm, `None` if it is not one this crate produces.
    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(&self.inner.signature_algorithm.oid)
    }

    pub fn signature(&self) -> &[u8] {
        self.inner.signature.raw_bytes()
    }

    /// All extensions in encoding order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(ExtensionParam::from_x509)
            .collect()
    }

    /// Decodes the certificate into a template.
    ///
    /// Extensions with a dedicated template field are decoded into it, every
    /// other extension is kept in `extensions`.
    pub fn to_template(&self) -> Result<CertificateTemplate> {
        let tbs = &self.inner.tbs_certificate;
        let mut template = CertificateTemplate {
            subject: self.subject(),
            not_before: from_x509_time(&tbs.validity.not_before),
            not_after: from_x509_time(&tbs.validity.not_after),
            serial_number: self.serial_number()?,
            key_usage: Default::default(),
            ext_key_usage: Vec::new(),
            subject_key_id: None,
            authority_key_id: None,
            basic_constraints_valid: false,
            is_ca: false,
            max_path_length: None,
            san: Default::default(),
            signature_algorithm: self.signature_algorithm(),
            public_key: Some(self.public_key()?),
            extensions: Vec::new(),
        };
        for extension in self.extensions() {
            template.apply_extension(&extension)?;
        }
        Ok(template)
    }

    /// Verifies the signature of this certificate with an issuer public key.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<()> {
        let algorithm = self.signature_algorithm().ok_or_else(|| {
            PcertError::UnknownSignatureAlgorithm(self.inner.signature_algorithm.oid.to_string())
        })?;
        let tbs = self.inner.tbs_certificate.to_der()?;
        issuer_key.verify(algorithm, &tbs, self.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_algorithm_names() {
        for alg in SignatureAlgorithm::ALL {
            assert_eq!(alg.name().to_lowercase().parse::<SignatureAlgorithm>().unwrap(), alg);
            assert_eq!(SignatureAlgorithm::from_oid(&alg.oid()), Some(alg));
        }
        assert!(matches!(
            "MD5-RSA".parse::<SignatureAlgorithm>(),
            Err(PcertError::UnknownSignatureAlgorithm(name)) if name == "MD5-RSA"
        ));
    }

    #[test]
    fn test_algorithm_identifier_parameters() {
        let rsa = AlgorithmIdentifierOwned::from(SignatureAlgorithm::Sha384WithRsa);
        assert_eq!(rsa.oid, const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION);
        assert!(rsa.parameters.is_some());

        let ec = AlgorithmIdentifierOwned::from(SignatureAlgorithm::EcdsaWithSha256);
        assert_eq!(ec.oid, const_oid::db::rfc5912::ECDSA_WITH_SHA_256);
        assert!(ec.parameters.is_none());

        let ed = AlgorithmIdentifierOwned::from(SignatureAlgorithm::Ed25519);
        assert_eq!(ed.oid, const_oid::db::rfc8410::ID_ED_25519);
    }

    #[test]
    fn test_parse_all_without_certificates() {
        let err = Certificate::parse_all(b"").unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to decode data: no PEM encoded certificates found in input"
        );
    }
}
