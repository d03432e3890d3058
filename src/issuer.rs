//! Issuing certificates: self-signed or with an issuer certificate and key.
//!
//! ```rust
//! use pcert::builder::build;
//! use pcert::cert::params::{CertificateOptions, DistinguishedName};
//! use pcert::issuer::{create, resolve_signer};
//! use pcert::key::{KeyOptions, generate_key};
//! use pcert::profile::apply_ca;
//!
//! # fn main() -> pcert::error::Result<()> {
//! let ca_key = generate_key(&KeyOptions::default())?;
//! let ca_options = CertificateOptions::builder()
//!     .subject(DistinguishedName::builder().common_name("Example CA").build())
//!     .build();
//! let ca = create(apply_ca(build(ca_options)?), &ca_key, None)?;
//!
//! let signer = resolve_signer(Some(ca), Some(ca_key))?;
//! let leaf_key = generate_key(&KeyOptions::default())?;
//! let leaf_options = CertificateOptions::builder()
//!     .subject(DistinguishedName::builder().common_name("leaf").build())
//!     .build();
//! let leaf = create(build(leaf_options)?, &leaf_key, signer.as_ref())?;
//! assert_eq!(leaf.issuer().common_name.as_deref(), Some("Example CA"));
//! # Ok(())
//! # }
//! ```

use der::Encode;
use der::asn1::BitString;
use tracing::info;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::{SubjectKeyIdentifier, ToAndFromX509Extension};
use crate::cert::params::CertificateTemplate;
use crate::csr::CertificateRequest;
use crate::error::{MissingSignerPart, PcertError, Result};
use crate::key::KeyPair;
use crate::promote::{PromotionPolicy, promote};
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the encoded name placed in the issuer field.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the key identifier used as authority key identifier, if any.
    fn key_identifier(&self) -> Option<Vec<u8>>;

    /// Signs a certificate for `template`.
    ///
    /// # Arguments
    /// * `template` - The fully defaulted template; it must carry the subject public key.
    ///
    /// # Returns
    /// The signed certificate. An unset authority key identifier is taken from
    /// [`Issuer::key_identifier`].
    ///
    /// # Errors
    /// `IncompatibleSignatureAlgorithm` if the template asks for an algorithm
    /// the issuer key cannot produce.
    fn issue(&self, mut template: CertificateTemplate) -> Result<Certificate> {
        if template.authority_key_id.is_none() {
            template.authority_key_id = self.key_identifier();
        }
        let algorithm = self
            .signing_key()
            .select_signature_algorithm(template.signature_algorithm)?;

        let tbs_certificate =
            TbsCertificate::from_template(&template, self.issuer_name(), algorithm)?
                .to_tbs_certificate_inner()?;
        let signature = self
            .signing_key()
            .sign(algorithm, &tbs_certificate.to_der()?)?;

        Ok(Certificate {
            inner: CertificateInner {
                tbs_certificate,
                signature_algorithm: algorithm.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }
}

/// Issuer for self-signed certificates: the subject signs itself.
struct SelfIssuer<'a> {
    name: Name,
    key: &'a KeyPair,
    key_identifier: Option<Vec<u8>>,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Name {
        self.name.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn key_identifier(&self) -> Option<Vec<u8>> {
        self.key_identifier.clone()
    }
}

/// An issuer certificate together with its private key.
#[derive(Debug, Clone)]
pub struct Signer {
    certificate: Certificate,
    key: KeyPair,
}

impl Signer {
    /// Pairs an issuer certificate with its private key.
    ///
    /// # Errors
    /// `SignerKeyMismatch` if `key` is not the key certified by `certificate`.
    pub fn new(certificate: Certificate, key: KeyPair) -> Result<Self> {
        if certificate.public_key()? != key.public_key()? {
            return Err(PcertError::SignerKeyMismatch);
        }
        Ok(Self { certificate, key })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}

impl Issuer for Signer {
    fn issuer_name(&self) -> Name {
        self.certificate.inner.tbs_certificate.subject.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    /// The subject key identifier of the issuer certificate.
    fn key_identifier(&self) -> Option<Vec<u8>> {
        self.certificate
            .extensions()
            .iter()
            .find(|ext| ext.oid == SubjectKeyIdentifier::OID)
            .and_then(|ext| ext.to_extension::<SubjectKeyIdentifier>().ok())
            .map(|ski| ski.0)
    }
}

/// Turns the optional halves of the issuer material into a signer.
///
/// # Returns
/// `None` when neither half is given, which selects self-signing.
///
/// # Errors
/// `IncompleteSigner` naming the missing half when only one is given.
pub fn resolve_signer(
    certificate: Option<Certificate>,
    key: Option<KeyPair>,
) -> Result<Option<Signer>> {
    match (certificate, key) {
        (None, None) => Ok(None),
        (Some(certificate), Some(key)) => Signer::new(certificate, key).map(Some),
        (Some(_), None) => Err(PcertError::IncompleteSigner(MissingSignerPart::PrivateKey)),
        (None, Some(_)) => Err(PcertError::IncompleteSigner(MissingSignerPart::Certificate)),
    }
}

/// Certifies `key` with the fields of `template`.
///
/// The template's public key is set to the public half of `key`, and its subject
/// key identifier is derived from it when unset.
///
/// Without a signer the certificate is self-signed: the issuer is the subject and
/// the authority key identifier equals the subject key identifier. With a signer
/// the issuer is the signer's subject and the authority key identifier defaults
/// to the signer's subject key identifier.
pub fn create(
    mut template: CertificateTemplate,
    key: &KeyPair,
    signer: Option<&Signer>,
) -> Result<Certificate> {
    let public_key = key.public_key()?;
    if template.subject_key_id.is_none() {
        template.subject_key_id = Some(public_key.key_identifier());
    }
    template.public_key = Some(public_key);

    match signer {
        Some(signer) => sign_template(template, signer),
        None => {
            info!(subject = %template.subject, "self-signing certificate");
            template.authority_key_id = template.subject_key_id.clone();
            let issuer = SelfIssuer {
                name: template.subject.as_x509_name()?,
                key,
                key_identifier: template.subject_key_id.clone(),
            };
            issuer.issue(template)
        }
    }
}

/// Signs a template that already carries its subject public key with `signer`.
pub fn sign_template(template: CertificateTemplate, signer: &Signer) -> Result<Certificate> {
    info!(
        subject = %template.subject,
        issuer = %signer.certificate.subject(),
        "signing certificate with issuer"
    );
    signer.issue(template)
}

/// Promotes `request` onto `template` and signs the result with `signer`.
pub fn sign_request(
    request: &CertificateRequest,
    template: CertificateTemplate,
    policy: PromotionPolicy,
    signer: &Signer,
) -> Result<Certificate> {
    sign_template(promote(request, template, policy)?, signer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::cert::SignatureAlgorithm;
    use crate::cert::params::{CertificateOptions, DistinguishedName};
    use crate::key::{EcCurve, KeySpec};
    use crate::profile::apply_ca;

    fn template(common_name: &str) -> CertificateTemplate {
        build(
            CertificateOptions::builder()
                .subject(DistinguishedName::builder().common_name(common_name).build())
                .build(),
        )
        .unwrap()
    }

    fn ca() -> (Certificate, KeyPair) {
        let key = KeyPair::generate(KeySpec::Ecdsa(EcCurve::P256)).unwrap();
        let cert = create(apply_ca(template("root")), &key, None).unwrap();
        (cert, key)
    }

    #[test]
    fn test_self_signed_issuer_is_subject() {
        let (cert, key) = ca();
        assert_eq!(cert.issuer(), cert.subject());
        let decoded = cert.to_template().unwrap();
        assert!(decoded.subject_key_id.is_some());
        assert_eq!(decoded.authority_key_id, decoded.subject_key_id);
        cert.verify_signature(&key.public_key().unwrap()).unwrap();
    }

    #[test]
    fn test_signed_by_issuer() {
        let (ca_cert, ca_key) = ca();
        let ca_ski = ca_cert.to_template().unwrap().subject_key_id;
        let signer = Signer::new(ca_cert.clone(), ca_key.clone()).unwrap();

        let leaf_key = KeyPair::generate(KeySpec::Ed25519).unwrap();
        let leaf = create(template("leaf"), &leaf_key, Some(&signer)).unwrap();
        assert_eq!(leaf.issuer(), ca_cert.subject());
        assert_eq!(
            leaf.inner.tbs_certificate.issuer,
            ca_cert.inner.tbs_certificate.subject
        );
        let decoded = leaf.to_template().unwrap();
        assert_eq!(decoded.authority_key_id, ca_ski);
        assert_eq!(decoded.public_key, Some(leaf_key.public_key().unwrap()));
        assert_eq!(leaf.signature_algorithm(), Some(SignatureAlgorithm::EcdsaWithSha256));
        leaf.verify_signature(&ca_key.public_key().unwrap()).unwrap();
    }

    #[test]
    fn test_explicit_authority_key_id_is_kept() {
        let (ca_cert, ca_key) = ca();
        let signer = Signer::new(ca_cert, ca_key).unwrap();
        let mut leaf = template("leaf");
        leaf.authority_key_id = Some(vec![0xaa; 8]);
        let key = KeyPair::generate(KeySpec::Ed25519).unwrap();
        let cert = create(leaf, &key, Some(&signer)).unwrap();
        assert_eq!(cert.to_template().unwrap().authority_key_id, Some(vec![0xaa; 8]));
    }

    #[test]
    fn test_incomplete_signer() {
        let (ca_cert, ca_key) = ca();
        assert!(matches!(
            resolve_signer(Some(ca_cert), None),
            Err(PcertError::IncompleteSigner(MissingSignerPart::PrivateKey))
        ));
        assert!(matches!(
            resolve_signer(None, Some(ca_key)),
            Err(PcertError::IncompleteSigner(MissingSignerPart::Certificate))
        ));
        assert!(resolve_signer(None, None).unwrap().is_none());
    }

    #[test]
    fn test_signer_key_must_match_certificate() {
        let (ca_cert, _) = ca();
        let other = KeyPair::generate(KeySpec::Ecdsa(EcCurve::P256)).unwrap();
        assert!(matches!(
            Signer::new(ca_cert, other),
            Err(PcertError::SignerKeyMismatch)
        ));
    }

    #[test]
    fn test_requested_algorithm_must_fit_issuer_key() {
        let key = KeyPair::generate(KeySpec::Ed25519).unwrap();
        let mut rsa_template = template("x");
        rsa_template.signature_algorithm = Some(SignatureAlgorithm::Sha256WithRsa);
        assert!(matches!(
            create(rsa_template, &key, None),
            Err(PcertError::IncompatibleSignatureAlgorithm { .. })
        ));
    }
}
