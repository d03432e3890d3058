//! PKCS#10 certificate signing requests.

use der::asn1::{BitString, SetOfVec};
use der::{Any, Decode, Encode};
use tracing::debug;
use x509_cert::attr::Attribute;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq, Version};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{ExtendedKeyUsage, KeyUsage, SubjectAltName, ToAndFromX509Extension};
use crate::cert::params::{CertificateTemplate, DistinguishedName, ExtensionParam, SubjectAltNames};
use crate::error::{PcertError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::oid;
use crate::pem_utils;

/// A parsed certificate signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub inner: CertReq,
}

impl CertificateRequest {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(der)?,
        })
    }

    /// Decodes the first `CERTIFICATE REQUEST` block of a PEM input.
    pub fn from_pem(input: &[u8]) -> Result<Self> {
        Self::from_der(&pem_utils::first_block(input, pem_utils::CERTIFICATE_REQUEST)?)
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PcertError::EncodingError(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::encode(pem_utils::CERTIFICATE_REQUEST, &self.to_der()?))
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.info.subject)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.info.public_key)
    }

    /// The algorithm of the requester's self-signature, `None` if unsupported.
    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(&self.inner.algorithm.oid)
    }

    pub fn signature(&self) -> &[u8] {
        self.inner.signature.raw_bytes()
    }

    /// Extensions carried in the PKCS#9 `extensionRequest` attribute.
    pub fn requested_extensions(&self) -> Result<Vec<ExtensionParam>> {
        let mut extensions = Vec::new();
        for attribute in self.inner.info.attributes.iter() {
            if attribute.oid != oid::PKCS_9_AT_EXTENSION_REQUEST {
                continue;
            }
            for value in attribute.values.iter() {
                let requested = ExtensionReq::from_der(&value.to_der()?)?;
                extensions.extend(requested.0.iter().map(ExtensionParam::from_x509));
            }
        }
        Ok(extensions)
    }

    /// Subject alternative names asked for by the requester.
    pub fn san(&self) -> Result<SubjectAltNames> {
        for extension in self.requested_extensions()? {
            if extension.oid == SubjectAltName::OID {
                return Ok(extension.to_extension::<SubjectAltName>()?.names);
            }
        }
        Ok(SubjectAltNames::default())
    }

    /// Checks the requester's self-signature against the enclosed public key.
    ///
    /// # Errors
    /// `UnknownSignatureAlgorithm` for an algorithm this crate cannot verify,
    /// `KeyError` for a bad signature.
    pub fn verify(&self) -> Result<()> {
        let algorithm = self.signature_algorithm().ok_or_else(|| {
            PcertError::UnknownSignatureAlgorithm(self.inner.algorithm.oid.to_string())
        })?;
        let info = self.inner.info.to_der()?;
        self.public_key()?.verify(algorithm, &info, self.signature())
    }
}

/// Builds and self-signs a request for the subject, names and usages of `template`.
///
/// # Arguments
/// * `template` - Supplies the subject, SANs, key usages and free-form extensions.
/// * `key` - The requester key; its public half goes into the request.
/// * `signature_algorithm` - Overrides the template's algorithm; the key's default
///   is used when neither is set.
pub fn create_request(
    template: &CertificateTemplate,
    key: &KeyPair,
    signature_algorithm: Option<SignatureAlgorithm>,
) -> Result<CertificateRequest> {
    let algorithm =
        key.select_signature_algorithm(signature_algorithm.or(template.signature_algorithm))?;

    let mut requested = Vec::new();
    if !template.san.is_empty() {
        requested.push(ExtensionParam::from_extension(
            &SubjectAltName {
                names: template.san.clone(),
            },
            false,
        )?);
    }
    if !template.key_usage.is_empty() {
        requested.push(ExtensionParam::from_extension(&KeyUsage(template.key_usage), true)?);
    }
    if !template.ext_key_usage.is_empty() {
        requested.push(ExtensionParam::from_extension(
            &ExtendedKeyUsage {
                usage: template.ext_key_usage.clone(),
            },
            false,
        )?);
    }
    requested.extend(template.extensions.iter().cloned());

    let mut attributes = Vec::new();
    if !requested.is_empty() {
        let extensions = requested
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>>>()?;
        attributes.push(Attribute {
            oid: oid::PKCS_9_AT_EXTENSION_REQUEST,
            values: SetOfVec::try_from(vec![Any::encode_from(&ExtensionReq(extensions))?])?,
        });
    }

    let info = CertReqInfo {
        version: Version::V1,
        subject: template.subject.as_x509_name()?,
        public_key: key.public_key()?.as_spki().clone(),
        attributes: SetOfVec::try_from(attributes)?,
    };
    let signature = key.sign(algorithm, &info.to_der()?)?;
    debug!(subject = %template.subject, %algorithm, "signed certificate request");

    Ok(CertificateRequest {
        inner: CertReq {
            info,
            algorithm: AlgorithmIdentifierOwned::from(algorithm),
            signature: BitString::from_bytes(&signature)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::cert::params::CertificateOptions;
    use crate::key::{EcCurve, KeySpec};
    use crate::usage::{ExtendedKeyUsageOption, KeyUsages};

    fn template() -> CertificateTemplate {
        let mut san = SubjectAltNames::default();
        san.dns_names.push("req.example.com".to_string());
        san.ip_addresses.push("10.0.0.1".parse().unwrap());
        build(
            CertificateOptions::builder()
                .subject(DistinguishedName::builder().common_name("req.example.com").build())
                .san(san)
                .key_usage(KeyUsages::DigitalSignature.into())
                .ext_key_usage(vec![ExtendedKeyUsageOption::ClientAuth])
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn test_request_carries_subject_key_and_names() {
        let key = KeyPair::generate(KeySpec::Ecdsa(EcCurve::P384)).unwrap();
        let request = create_request(&template(), &key, None).unwrap();
        let parsed = CertificateRequest::from_pem(request.to_pem().unwrap().as_bytes()).unwrap();

        assert_eq!(parsed.subject().common_name.as_deref(), Some("req.example.com"));
        assert_eq!(parsed.public_key().unwrap(), key.public_key().unwrap());
        assert_eq!(parsed.signature_algorithm(), Some(SignatureAlgorithm::EcdsaWithSha384));
        assert_eq!(parsed.san().unwrap(), template().san);
        assert_eq!(parsed.requested_extensions().unwrap().len(), 3);
        parsed.verify().unwrap();
    }

    #[test]
    fn test_request_without_extensions() {
        let key = KeyPair::generate(KeySpec::Ed25519).unwrap();
        let bare = build(CertificateOptions::default()).unwrap();
        let request = create_request(&bare, &key, None).unwrap();
        assert!(request.inner.info.attributes.is_empty());
        assert!(request.san().unwrap().is_empty());
        request.verify().unwrap();
    }

    #[test]
    fn test_tampered_request_fails_verification() {
        let key = KeyPair::generate(KeySpec::Ecdsa(EcCurve::P256)).unwrap();
        let mut request = create_request(&template(), &key, None).unwrap();
        request.inner.info.subject = DistinguishedName::builder()
            .common_name("evil")
            .build()
            .as_x509_name()
            .unwrap();
        assert!(request.verify().is_err());
    }

    #[test]
    fn test_incompatible_algorithm_is_rejected() {
        let key = KeyPair::generate(KeySpec::Ed25519).unwrap();
        let err = create_request(&template(), &key, Some(SignatureAlgorithm::Sha256WithRsa))
            .unwrap_err();
        assert!(matches!(err, PcertError::IncompatibleSignatureAlgorithm { .. }));
    }
}
