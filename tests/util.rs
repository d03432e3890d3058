#![allow(dead_code)]

use pcert::builder::build;
use pcert::cert::Certificate;
use pcert::cert::params::{CertificateOptions, CertificateTemplate, DistinguishedName};
use pcert::issuer::{Signer, create};
use pcert::key::{KeyPair, KeySpec};
use pcert::profile::apply_ca;

pub fn template(common_name: &str) -> CertificateTemplate {
    build(
        CertificateOptions::builder()
            .subject(DistinguishedName::builder().common_name(common_name).build())
            .build(),
    )
    .unwrap()
}

/// A self-signed CA certificate named `myca.local` and its key.
pub fn generate_ca_cert(spec: KeySpec) -> (Certificate, KeyPair) {
    let ca_key = KeyPair::generate(spec).unwrap();
    let ca_cert = create(apply_ca(template("myca.local")), &ca_key, None).unwrap();
    (ca_cert, ca_key)
}

pub fn generate_signer(spec: KeySpec) -> Signer {
    let (cert, key) = generate_ca_cert(spec);
    Signer::new(cert, key).unwrap()
}
