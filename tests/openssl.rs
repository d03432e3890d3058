mod util;

use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509, X509Req, X509StoreContext};
use pcert::cert::params::SubjectAltNames;
use pcert::csr::create_request;
use pcert::issuer::create;
use pcert::key::{EcCurve, KeyPair, KeySpec};
use pcert::profile::{apply_client, apply_server};
use regex::Regex;

fn common_name(name: &openssl::x509::X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap()
        .to_string()
}

fn verify_chain(ca: &X509, leaf: &X509) -> bool {
    let mut builder = X509StoreBuilder::new().unwrap();
    builder.add_cert(ca.clone()).unwrap();
    let store = builder.build();
    let chain: Stack<X509> = Stack::new().unwrap();
    let mut context = X509StoreContext::new().unwrap();
    context
        .init(&store, leaf, &chain, |c| c.verify_cert())
        .unwrap()
}

#[test]
fn test_openssl_crate_validate_server_cert() {
    let (ca_cert, ca_key) = util::generate_ca_cert(KeySpec::Ecdsa(EcCurve::P256));
    let signer = pcert::issuer::Signer::new(ca_cert.clone(), ca_key).unwrap();

    let server_key = KeyPair::generate(KeySpec::Ecdsa(EcCurve::P256)).unwrap();
    let server = apply_server(
        util::template("server.myca.local"),
        Some("server.myca.local"),
    );
    let serial = server.serial_number.clone();
    let server_cert = create(server, &server_key, Some(&signer)).unwrap();

    let ca_x509 = X509::from_pem(ca_cert.to_pem().unwrap().as_bytes()).expect("Failed to parse CA PEM");
    let x509 = X509::from_pem(server_cert.to_pem().unwrap().as_bytes()).expect("Failed to parse PEM");

    assert_eq!(common_name(x509.subject_name()), "server.myca.local");
    assert_eq!(common_name(x509.issuer_name()), "myca.local");
    assert_eq!(x509.version(), 2, "X509 version should be 3 (0-based index)");

    let expected_serial: Vec<u8> = serial
        .as_bytes()
        .iter()
        .copied()
        .skip_while(|b| *b == 0)
        .collect();
    assert_eq!(x509.serial_number().to_bn().unwrap().to_vec(), expected_serial);

    assert_eq!(
        x509.signature_algorithm().object().nid(),
        Nid::ECDSA_WITH_SHA256
    );
    let dns: Vec<String> = x509
        .subject_alt_names()
        .unwrap()
        .iter()
        .filter_map(|name| name.dnsname().map(str::to_string))
        .collect();
    assert_eq!(dns, vec!["server.myca.local"]);

    assert!(x509.verify(&ca_x509.public_key().unwrap()).unwrap());
    assert!(verify_chain(&ca_x509, &x509), "chain verification failed");
}

#[test]
fn test_openssl_text_output() {
    let (ca_cert, _) = util::generate_ca_cert(KeySpec::Ed25519);
    let x509 = X509::from_pem(ca_cert.to_pem().unwrap().as_bytes()).unwrap();
    let text = String::from_utf8(x509.to_text().unwrap()).unwrap();

    assert!(text.contains("Version: 3 (0x2)"), "Version field is incorrect");
    assert!(text.contains("CA:TRUE"), "basic constraints missing");
    assert!(text.contains("Certificate Sign, CRL Sign"), "key usage missing");

    let not_before_regex = Regex::new(r"Not Before: .+").unwrap();
    let not_after_regex = Regex::new(r"Not After : .+").unwrap();
    assert!(not_before_regex.is_match(&text), "Missing or incorrect Not Before field");
    assert!(not_after_regex.is_match(&text), "Missing or incorrect Not After field");
    assert!(text.contains("ED25519"), "Signature Algorithm field is incorrect");
}

#[test]
fn test_openssl_verifies_every_key_type() {
    let cases = [
        (KeySpec::Rsa(2048), Nid::SHA256WITHRSAENCRYPTION),
        (KeySpec::Ecdsa(EcCurve::P224), Nid::ECDSA_WITH_SHA224),
        (KeySpec::Ecdsa(EcCurve::P384), Nid::ECDSA_WITH_SHA384),
        (KeySpec::Ecdsa(EcCurve::P521), Nid::ECDSA_WITH_SHA512),
        (KeySpec::Ed25519, Nid::from_raw(openssl::pkey::Id::ED25519.as_raw())),
    ];
    for (spec, nid) in cases {
        let (ca_cert, ca_key) = util::generate_ca_cert(spec);
        let signer = pcert::issuer::Signer::new(ca_cert.clone(), ca_key).unwrap();
        let leaf_key = KeyPair::generate(KeySpec::Ecdsa(EcCurve::P256)).unwrap();
        let leaf = create(apply_client(util::template("client")), &leaf_key, Some(&signer)).unwrap();

        let ca_x509 = X509::from_der(&ca_cert.to_der().unwrap()).unwrap();
        let leaf_x509 = X509::from_der(&leaf.to_der().unwrap()).unwrap();
        assert_eq!(ca_x509.signature_algorithm().object().nid(), nid, "{spec:?}");
        assert!(ca_x509.verify(&ca_x509.public_key().unwrap()).unwrap(), "{spec:?}");
        assert!(verify_chain(&ca_x509, &leaf_x509), "{spec:?}");
    }
}

#[test]
fn test_openssl_validate_csr() {
    let key = KeyPair::generate(KeySpec::Rsa(2048)).unwrap();
    let mut template = util::template("req.myca.local");
    template.san = SubjectAltNames {
        dns_names: vec!["req.myca.local".to_string()],
        ..Default::default()
    };
    let request = create_request(&template, &key, None).unwrap();

    let req = X509Req::from_pem(request.to_pem().unwrap().as_bytes()).unwrap();
    assert_eq!(common_name(req.subject_name()), "req.myca.local");
    assert!(req.verify(&req.public_key().unwrap()).unwrap());
    assert_eq!(req.extensions().unwrap().len(), 1);
}

#[test]
fn test_key_exchange_with_openssl() {
    let key = KeyPair::generate(KeySpec::Ecdsa(EcCurve::P384)).unwrap();
    let pkey = PKey::private_key_from_pem(key.to_pkcs8_pem().unwrap().as_bytes()).unwrap();
    assert_eq!(
        pkey.public_key_to_der().unwrap(),
        key.public_key().unwrap().to_der()
    );

    // SEC1 "EC PRIVATE KEY" as written by openssl
    let group = EcGroup::from_curve_name(Nid::SECP224R1).unwrap();
    let ec_key = EcKey::generate(&group).unwrap();
    let loaded = KeyPair::from_pem(&ec_key.private_key_to_pem().unwrap()).unwrap();
    assert_eq!(loaded.spec(), KeySpec::Ecdsa(EcCurve::P224));
    let openssl_public = PKey::from_ec_key(ec_key).unwrap().public_key_to_der().unwrap();
    assert_eq!(loaded.public_key().unwrap().to_der(), openssl_public.as_slice());
}
