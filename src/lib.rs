//! # pcert - X.509 certificates, requests and keys
//!
//! pcert creates self-signed and CA-signed certificates, certificate signing
//! requests and private keys. It is built on the RustCrypto crates and ships a
//! `pcert` command line tool on top of the library.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 1024 bits and up, 2048 by default
//! - **ECDSA**: P-224, P-256, P-384 and P-521
//! - **Ed25519**
//!
//! ## Key Features
//!
//! - **Templates**: [`builder::build`] turns [`cert::params::CertificateOptions`] into a
//!   fully defaulted [`cert::params::CertificateTemplate`] with validity, serial
//!   number and key identifiers filled in
//! - **Profiles**: CA, server and client presets in [`profile`]
//! - **Requests**: create PKCS#10 requests and promote them into certificates
//!   under an issuer chosen [`promote::PromotionPolicy`]
//! - **Usages**: bidirectional mapping between usage names and bits in [`usage`]
//! - **Formats**: DER and PEM for certificates, requests and PKCS#8 keys
//!
//! ## Quick Start
//!
//! ### A CA and a server certificate
//!
//! ```rust
//! use pcert::builder::build;
//! use pcert::cert::params::{CertificateOptions, DistinguishedName};
//! use pcert::issuer::{Signer, create};
//! use pcert::key::{KeyOptions, generate_key};
//! use pcert::profile::{Profile, apply_profiles};
//!
//! # fn main() -> pcert::error::Result<()> {
//! let ca_key = generate_key(&KeyOptions::default())?;
//! let ca_template = apply_profiles(
//!     build(
//!         CertificateOptions::builder()
//!             .subject(DistinguishedName::builder().common_name("My CA").build())
//!             .build(),
//!     )?,
//!     &[Profile::Ca],
//! )?;
//! let ca = create(ca_template, &ca_key, None)?;
//! let signer = Signer::new(ca, ca_key)?;
//!
//! let server_key = generate_key(&KeyOptions::default())?;
//! let server_template = apply_profiles(
//!     build(
//!         CertificateOptions::builder()
//!             .subject(DistinguishedName::builder().common_name("www.example.com").build())
//!             .expiry(time::Duration::days(90))
//!             .build(),
//!     )?,
//!     &[Profile::Server],
//! )?;
//! let server = create(server_template, &server_key, Some(&signer))?;
//! assert_eq!(
//!     server.to_template()?.san.dns_names,
//!     vec!["www.example.com".to_string()]
//! );
//! println!("{}", server.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Signing a request
//!
//! ```rust
//! use pcert::builder::build;
//! use pcert::cert::params::{CertificateOptions, DistinguishedName};
//! use pcert::csr::create_request;
//! use pcert::issuer::{Signer, create, sign_request};
//! use pcert::key::{KeyOptions, generate_key};
//! use pcert::profile::apply_ca;
//! use pcert::promote::PromotionPolicy;
//!
//! # fn main() -> pcert::error::Result<()> {
//! let ca_key = generate_key(&KeyOptions::default())?;
//! let ca = create(apply_ca(build(CertificateOptions::default())?), &ca_key, None)?;
//! let signer = Signer::new(ca, ca_key)?;
//!
//! let requester_key = generate_key(&KeyOptions::default())?;
//! let request = create_request(
//!     &build(
//!         CertificateOptions::builder()
//!             .subject(DistinguishedName::builder().common_name("client").build())
//!             .build(),
//!     )?,
//!     &requester_key,
//!     None,
//! )?;
//! request.verify()?;
//!
//! let cert = sign_request(
//!     &request,
//!     build(CertificateOptions::default())?,
//!     PromotionPolicy::IssuerWins,
//!     &signer,
//! )?;
//! assert_eq!(cert.subject().common_name.as_deref(), Some("client"));
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cert;
pub mod cli;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod oid;
pub mod pem_utils;
pub mod profile;
pub mod promote;
pub mod serial;
pub mod tbs_certificate;
pub mod usage;
