mod util;

use std::collections::HashSet;

use der::flagset::FlagSet;
use pcert::builder::build;
use pcert::cert::params::{CertificateOptions, DistinguishedName, SubjectAltNames};
use pcert::cert::{Certificate, SignatureAlgorithm};
use pcert::csr::{CertificateRequest, create_request};
use pcert::error::{MissingSignerPart, PcertError, Result};
use pcert::issuer::{create, resolve_signer, sign_request};
use pcert::key::{EcCurve, KeyPair, KeySpec};
use pcert::profile::{Profile, apply_profiles};
use pcert::promote::PromotionPolicy;
use pcert::serial::generate_serial;
use pcert::usage::{ExtendedKeyUsageOption, KeyUsages, string_to_usage, usage_to_string};
use time::macros::datetime;

/// A self-signed CA carries its own name as issuer and its subject key
/// identifier as authority key identifier.
#[test]
fn generate_ca_cert() -> Result<()> {
    let (ca_cert, ca_key) = util::generate_ca_cert(KeySpec::Ecdsa(EcCurve::P256));
    let template = ca_cert.to_template()?;

    assert_eq!(ca_cert.issuer(), ca_cert.subject());
    assert!(template.basic_constraints_valid && template.is_ca);
    assert!(template.key_usage.contains(KeyUsages::KeyCertSign));
    assert_eq!(template.authority_key_id, template.subject_key_id);
    ca_cert.verify_signature(&ca_key.public_key()?)?;

    let reparsed = Certificate::from_pem(ca_cert.to_pem()?.as_bytes())?;
    assert_eq!(reparsed, ca_cert);
    Ok(())
}

/// Profiles and explicit options end up in the issued server certificate.
#[test]
fn generate_server_cert() -> Result<()> {
    let signer = util::generate_signer(KeySpec::Ecdsa(EcCurve::P384));

    let options = CertificateOptions::builder()
        .subject(
            DistinguishedName::builder()
                .common_name("server.myca.local")
                .organization(vec!["My Org".to_string()])
                .build(),
        )
        .not_before(datetime!(2020-01-01 0:00 UTC))
        .expiry(time::Duration::days(90))
        .build();
    let template = apply_profiles(build(options)?, &[Profile::Server])?;
    let server_key = KeyPair::generate(KeySpec::Ed25519)?;
    let server_cert = create(template, &server_key, Some(&signer))?;

    let decoded = server_cert.to_template()?;
    assert_eq!(decoded.not_before, datetime!(2020-01-01 0:00 UTC));
    assert_eq!(decoded.not_after, datetime!(2020-03-31 0:00 UTC));
    assert_eq!(decoded.san.dns_names, vec!["server.myca.local"]);
    assert_eq!(decoded.ext_key_usage, vec![ExtendedKeyUsageOption::ServerAuth]);
    assert!(decoded.basic_constraints_valid && !decoded.is_ca);
    assert_eq!(decoded.subject.organization, vec!["My Org"]);
    assert_eq!(decoded.signature_algorithm, Some(SignatureAlgorithm::EcdsaWithSha384));
    assert_eq!(server_cert.issuer(), signer.certificate().subject());
    server_cert.verify_signature(&signer.certificate().public_key()?)?;
    Ok(())
}

/// Client certificates promoted from a request keep the requester's key.
#[test]
fn generate_client_cert_from_request() -> Result<()> {
    let signer = util::generate_signer(KeySpec::Ecdsa(EcCurve::P256));

    let client_key = KeyPair::generate(KeySpec::Ecdsa(EcCurve::P256))?;
    let mut requested = util::template("client.myca.local");
    requested.san = SubjectAltNames {
        email_addresses: vec!["client@myca.local".to_string()],
        ..Default::default()
    };
    let request = create_request(&requested, &client_key, None)?;
    let request = CertificateRequest::from_der(&request.to_der()?)?;
    request.verify()?;

    let template = apply_profiles(build(CertificateOptions::default())?, &[Profile::Client])?;
    let client_cert = sign_request(&request, template, PromotionPolicy::default(), &signer)?;

    let decoded = client_cert.to_template()?;
    assert_eq!(decoded.subject.common_name.as_deref(), Some("client.myca.local"));
    assert_eq!(decoded.san.email_addresses, vec!["client@myca.local"]);
    assert_eq!(decoded.public_key, Some(client_key.public_key()?));
    assert!(decoded.ext_key_usage.contains(&ExtendedKeyUsageOption::ClientAuth));
    client_cert.verify_signature(&signer.certificate().public_key()?)?;
    Ok(())
}

#[test]
fn request_algorithm_must_match_issuer_key() -> Result<()> {
    let signer = util::generate_signer(KeySpec::Ecdsa(EcCurve::P256));
    let requester_key = KeyPair::generate(KeySpec::Ed25519)?;
    let request = create_request(&util::template("ed"), &requester_key, None)?;

    let result = sign_request(
        &request,
        build(CertificateOptions::default())?,
        PromotionPolicy::IssuerWins,
        &signer,
    );
    assert!(matches!(
        result,
        Err(PcertError::IncompatibleSignatureAlgorithm { .. })
    ));
    Ok(())
}

#[test]
fn requester_wins_replaces_issuer_subject() -> Result<()> {
    let signer = util::generate_signer(KeySpec::Ed25519);
    let key = KeyPair::generate(KeySpec::Ed25519)?;
    let request = create_request(&util::template("requested"), &key, None)?;

    let issuer_wins = sign_request(
        &request,
        util::template("chosen by issuer"),
        PromotionPolicy::IssuerWins,
        &signer,
    )?;
    assert_eq!(
        issuer_wins.subject().common_name.as_deref(),
        Some("chosen by issuer")
    );

    let requester_wins = sign_request(
        &request,
        util::template("chosen by issuer"),
        PromotionPolicy::RequesterWins,
        &signer,
    )?;
    assert_eq!(requester_wins.subject().common_name.as_deref(), Some("requested"));
    Ok(())
}

#[test]
fn incomplete_signer_is_rejected() {
    let (ca_cert, _) = util::generate_ca_cert(KeySpec::Ed25519);
    assert!(matches!(
        resolve_signer(Some(ca_cert), None),
        Err(PcertError::IncompleteSigner(MissingSignerPart::PrivateKey))
    ));
}

#[test]
fn ca_profile_conflicts_with_server() {
    assert!(matches!(
        apply_profiles(util::template("x"), &[Profile::Ca, Profile::Server]),
        Err(PcertError::ConflictingProfiles(_, _))
    ));
}

#[test]
fn random_usage_masks_round_trip() {
    for _ in 0..1_000 {
        let bits: u16 = rand::random::<u16>() & 0x01ff;
        let usage = FlagSet::<KeyUsages>::new_truncated(bits);
        assert_eq!(string_to_usage(&usage_to_string(usage)).unwrap(), usage);
    }
}

#[test]
fn serials_do_not_repeat() {
    let mut seen = HashSet::new();
    for _ in 0..1_000 {
        assert!(seen.insert(generate_serial().unwrap()));
    }
}
