//! CA, server and client presets.
//!
//! Each preset takes a template and returns the adjusted template. Applying a
//! preset twice yields the same template as applying it once.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::cert::params::CertificateTemplate;
use crate::error::{PcertError, Result};
use crate::usage::{ExtendedKeyUsageOption, KeyUsages, add_ext_usage, default_key_usage};

/// A named certificate preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    Ca,
    Server,
    Client,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Ca, Profile::Server, Profile::Client];

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Ca => "ca",
            Profile::Server => "server",
            Profile::Client => "client",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = PcertError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| PcertError::UnknownProfile(s.to_string()))
    }
}

/// Turns the template into a certificate authority.
///
/// Clears the extended key usages, adds `CertSign` and `CRLSign` and asserts
/// `CA:TRUE` in valid basic constraints.
pub fn apply_ca(mut template: CertificateTemplate) -> CertificateTemplate {
    template.ext_key_usage.clear();
    template.key_usage |= KeyUsages::KeyCertSign | KeyUsages::CRLSign;
    template.basic_constraints_valid = true;
    template.is_ca = true;
    template
}

/// Turns the template into a TLS server certificate for `common_name`.
///
/// A non-empty common name is added to the DNS names unless already listed.
pub fn apply_server(mut template: CertificateTemplate, common_name: Option<&str>) -> CertificateTemplate {
    if let Some(name) = common_name.filter(|name| !name.is_empty()) {
        if !template.san.dns_names.iter().any(|dns| dns == name) {
            template.san.dns_names.push(name.to_string());
        }
    }
    add_ext_usage(&mut template.ext_key_usage, ExtendedKeyUsageOption::ServerAuth);
    template.basic_constraints_valid = true;
    template.is_ca = false;
    template.key_usage |= default_key_usage();
    template
}

/// Turns the template into a TLS client certificate.
pub fn apply_client(mut template: CertificateTemplate) -> CertificateTemplate {
    add_ext_usage(&mut template.ext_key_usage, ExtendedKeyUsageOption::ClientAuth);
    template.basic_constraints_valid = true;
    template.is_ca = false;
    template.key_usage |= default_key_usage();
    template
}

/// Applies `profiles` in order.
///
/// The server profile uses the template's own common name.
///
/// # Errors
/// `ConflictingProfiles` when `ca` is combined with `server` or `client`.
pub fn apply_profiles(
    mut template: CertificateTemplate,
    profiles: &[Profile],
) -> Result<CertificateTemplate> {
    if profiles.contains(&Profile::Ca) {
        if let Some(other) = profiles.iter().find(|p| **p != Profile::Ca) {
            return Err(PcertError::ConflictingProfiles(
                Profile::Ca.to_string(),
                other.to_string(),
            ));
        }
    }
    for profile in profiles {
        debug!(%profile, "applying profile");
        template = match profile {
            Profile::Ca => apply_ca(template),
            Profile::Server => {
                let common_name = template.subject.common_name.clone();
                apply_server(template, common_name.as_deref())
            }
            Profile::Client => apply_client(template),
        };
    }
    Ok(template)
}
