//! Turns caller supplied [`CertificateOptions`] into a fully defaulted
//! [`CertificateTemplate`]. No signing happens here.

use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::cert::params::{CertificateOptions, CertificateTemplate};
use crate::error::{PcertError, Result};
use crate::serial::generate_serial;

/// Validity period used when neither `not_after` nor `expiry` is set.
pub const DEFAULT_VALIDITY: Duration = Duration::days(365);

/// Builds a certificate template, filling every unset field with its default.
///
/// # Arguments
/// * `options` - The caller supplied description.
///
/// # Returns
/// A template where:
/// * `not_before` is the current time when unset,
/// * `not_after` is `not_before + expiry`, or `not_before` plus [`DEFAULT_VALIDITY`],
/// * the serial number is freshly generated when unset,
/// * the subject key identifier is derived from the public key when unset and known.
///
/// # Errors
/// A `not_after` that falls outside the representable date range is rejected.
/// Serial number generation failures are returned as is; there is no fallback
/// to a predictable serial number.
pub fn build(options: CertificateOptions) -> Result<CertificateTemplate> {
    let not_before = match options.not_before {
        Some(not_before) => not_before,
        None => {
            debug!("not_before defaulted to now");
            OffsetDateTime::now_utc()
        }
    };
    let not_before = truncate_to_seconds(not_before)?;

    let not_after = match (options.not_after, options.expiry) {
        (Some(not_after), _) => not_after,
        (None, Some(expiry)) => not_before
            .checked_add(expiry)
            .ok_or_else(|| {
                PcertError::InvalidInput(format!(
                    "expiry of {} days after {not_before} is out of range",
                    expiry.whole_days()
                ))
            })?,
        (None, None) => {
            debug!(days = DEFAULT_VALIDITY.whole_days(), "not_after defaulted");
            not_before.checked_add(DEFAULT_VALIDITY).ok_or_else(|| {
                PcertError::InvalidInput(format!(
                    "not_before {not_before} leaves no room for the default validity"
                ))
            })?
        }
    };
    let not_after = truncate_to_seconds(not_after)?;

    let serial_number = match options.serial_number {
        Some(serial) => serial,
        None => generate_serial()?,
    };

    let subject_key_id = match (options.subject_key_id, &options.public_key) {
        (Some(ski), _) => Some(ski),
        (None, Some(public_key)) => Some(public_key.key_identifier()),
        (None, None) => None,
    };

    Ok(CertificateTemplate {
        subject: options.subject,
        not_before,
        not_after,
        serial_number,
        key_usage: options.key_usage,
        ext_key_usage: options.ext_key_usage,
        subject_key_id,
        authority_key_id: options.authority_key_id,
        basic_constraints_valid: options.basic_constraints_valid,
        is_ca: options.is_ca,
        max_path_length: options.max_path_length,
        san: options.san,
        signature_algorithm: options.signature_algorithm,
        public_key: options.public_key,
        extensions: options.extensions,
    })
}

fn truncate_to_seconds(value: OffsetDateTime) -> Result<OffsetDateTime> {
    value
        .replace_nanosecond(0)
        .map_err(|e| PcertError::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::DistinguishedName;
    use crate::key::{KeyPair, KeySpec};
    use crate::serial::SerialNumber;
    use time::macros::datetime;

    #[test]
    fn test_expiry_counts_from_explicit_not_before() {
        let options = CertificateOptions::builder()
            .not_before(datetime!(2020-01-01 0:00 UTC))
            .expiry(Duration::days(90))
            .build();
        let template = build(options).unwrap();
        assert_eq!(template.not_after, datetime!(2020-03-31 0:00 UTC));
    }

    #[test]
    fn test_expiry_out_of_range_is_an_error() {
        let options = CertificateOptions::builder()
            .expiry(Duration::days(365 * 100_000))
            .build();
        assert!(matches!(build(options), Err(PcertError::InvalidInput(_))));
    }

    #[test]
    fn test_default_validity_out_of_range_is_an_error() {
        let options = CertificateOptions::builder()
            .not_before(datetime!(9999-06-01 0:00 UTC))
            .build();
        assert!(matches!(build(options), Err(PcertError::InvalidInput(_))));
    }

    #[test]
    fn test_default_validity_is_one_year() {
        let template = build(CertificateOptions::default()).unwrap();
        assert_eq!(template.not_after - template.not_before, Duration::days(365));
        assert_eq!(template.not_before.nanosecond(), 0);
        assert!(template.not_before <= OffsetDateTime::now_utc());
    }

    #[test]
    fn test_explicit_not_after_wins_over_expiry() {
        let options = CertificateOptions::builder()
            .not_before(datetime!(2020-01-01 0:00 UTC))
            .not_after(datetime!(2020-01-02 12:30:15.75 UTC))
            .expiry(Duration::days(90))
            .build();
        let template = build(options).unwrap();
        assert_eq!(template.not_after, datetime!(2020-01-02 12:30:15 UTC));
    }

    #[test]
    fn test_explicit_fields_are_kept() {
        let serial = SerialNumber::from_be_bytes(&[0x42]).unwrap();
        let options = CertificateOptions::builder()
            .subject(DistinguishedName::builder().common_name("kept").build())
            .serial_number(serial.clone())
            .subject_key_id(vec![7; 4])
            .max_path_length(0)
            .build();
        let template = build(options).unwrap();
        assert_eq!(template.serial_number, serial);
        assert_eq!(template.subject_key_id, Some(vec![7; 4]));
        assert_eq!(template.max_path_length, Some(0));
        assert_eq!(template.subject.common_name.as_deref(), Some("kept"));
    }

    #[test]
    fn test_subject_key_id_derived_from_public_key() {
        let public_key = KeyPair::generate(KeySpec::Ed25519)
            .unwrap()
            .public_key()
            .unwrap();
        let expected = public_key.key_identifier();
        let options = CertificateOptions::builder().public_key(public_key).build();
        let template = build(options).unwrap();
        assert_eq!(template.subject_key_id, Some(expected));

        let without_key = build(CertificateOptions::default()).unwrap();
        assert_eq!(without_key.subject_key_id, None);
        assert_eq!(without_key.max_path_length, None);
    }

    #[test]
    fn test_serials_are_fresh() {
        let a = build(CertificateOptions::default()).unwrap();
        let b = build(CertificateOptions::default()).unwrap();
        assert_ne!(a.serial_number, b.serial_number);
    }
}
