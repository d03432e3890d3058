//! Merging a certificate signing request into an issuer controlled template.

use tracing::debug;

use crate::cert::params::CertificateTemplate;
use crate::csr::CertificateRequest;
use crate::error::Result;

/// Decides who wins when both the issuer template and the request name a subject
/// or subject alternative names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromotionPolicy {
    /// Request values are only used for fields the issuer left empty.
    #[default]
    IssuerWins,
    /// Non-empty request values replace the issuer's.
    RequesterWins,
}

/// Copies the requester supplied fields of `request` onto `template`.
///
/// The public key and the signature algorithm always come from the request, and
/// an unset subject key identifier is derived from that public key. The
/// subject and each SAN list (DNS, email, IP, URI) follow `policy`. Validity,
/// serial number, usages, basic constraints and issuer extensions are left
/// untouched. The request signature is not checked here, see
/// [`CertificateRequest::verify`].
pub fn promote(
    request: &CertificateRequest,
    mut template: CertificateTemplate,
    policy: PromotionPolicy,
) -> Result<CertificateTemplate> {
    let public_key = request.public_key()?;
    if template.subject_key_id.is_none() {
        template.subject_key_id = Some(public_key.key_identifier());
    }
    template.public_key = Some(public_key);
    template.signature_algorithm = request.signature_algorithm();

    let subject = request.subject();
    let san = request.san()?;

    merge(&mut template.subject, subject, policy, |dn| dn.is_empty());
    merge(&mut template.san.dns_names, san.dns_names, policy, Vec::is_empty);
    merge(
        &mut template.san.email_addresses,
        san.email_addresses,
        policy,
        Vec::is_empty,
    );
    merge(
        &mut template.san.ip_addresses,
        san.ip_addresses,
        policy,
        Vec::is_empty,
    );
    merge(&mut template.san.uris, san.uris, policy, Vec::is_empty);

    debug!(?policy, subject = %template.subject, "promoted certificate request");
    Ok(template)
}

fn merge<T>(target: &mut T, requested: T, policy: PromotionPolicy, is_empty: impl Fn(&T) -> bool) {
    let take = match policy {
        PromotionPolicy::IssuerWins => is_empty(target),
        PromotionPolicy::RequesterWins => !is_empty(&requested),
    };
    if take {
        *target = requested;
    }
}
