//! Random certificate serial numbers.
//!
//! Serial numbers are drawn from the operating system entropy source as 20 random
//! bytes with the most significant bit cleared, so that the DER INTEGER encoding is
//! positive and fits into the 20 octets allowed by RFC 5280 section 4.1.2.2.

use std::fmt;

use rand_core::{OsRng, RngCore};
use tracing::{debug, warn};

use crate::error::{PcertError, Result};

/// Number of random bytes drawn for a serial number.
pub const SERIAL_LENGTH: usize = 20;

/// Number of draws before giving up on an all-zero entropy source.
pub const MAX_ATTEMPTS: usize = 10;

/// A positive certificate serial number stored as minimal big-endian bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber(Vec<u8>);

impl SerialNumber {
    /// Creates a serial number from big-endian bytes.
    ///
    /// Leading zero bytes are stripped. Zero, negative (top bit set after stripping)
    /// and over-long values are rejected.
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self> {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let magnitude = &bytes[start..];
        if magnitude.is_empty() {
            return Err(PcertError::InvalidInput(
                "serial number must be positive".to_string(),
            ));
        }
        if magnitude.len() > SERIAL_LENGTH {
            return Err(PcertError::InvalidInput(format!(
                "serial number is longer than {SERIAL_LENGTH} octets"
            )));
        }
        Ok(Self(magnitude.to_vec()))
    }

    /// Returns the minimal big-endian bytes of the serial number.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Converts into the x509 representation, adding the sign octet when needed.
    pub fn to_x509(&self) -> Result<x509_cert::serial_number::SerialNumber> {
        let mut encoded = Vec::with_capacity(self.0.len() + 1);
        if self.0[0] & 0x80 != 0 {
            encoded.push(0);
        }
        encoded.extend_from_slice(&self.0);
        Ok(x509_cert::serial_number::SerialNumber::new(&encoded)?)
    }

    /// Reads a serial number out of a parsed certificate.
    pub fn from_x509(serial: &x509_cert::serial_number::SerialNumber) -> Result<Self> {
        Self::from_be_bytes(serial.as_bytes())
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerialNumber({self})")
    }
}

/// Generates a random serial number from the operating system entropy source.
pub fn generate_serial() -> Result<SerialNumber> {
    generate_serial_with(&mut OsRng)
}

/// Generates a random serial number from the given entropy source.
///
/// # Errors
/// * `RandomnessExhausted` if every one of the [`MAX_ATTEMPTS`] draws is zero.
/// * `Entropy` if the source itself fails.
pub fn generate_serial_with<R: RngCore + ?Sized>(rng: &mut R) -> Result<SerialNumber> {
    for attempt in 1..=MAX_ATTEMPTS {
        let mut bytes = [0u8; SERIAL_LENGTH];
        rng.try_fill_bytes(&mut bytes)
            .map_err(|e| PcertError::Entropy(e.to_string()))?;
        bytes[0] &= 0x7f;

        if bytes.iter().all(|b| *b == 0) {
            warn!(attempt, "drew an all-zero serial number, retrying");
            continue;
        }

        let serial = SerialNumber::from_be_bytes(&bytes)?;
        debug!(serial = %serial, "generated serial number");
        return Ok(serial);
    }
    Err(PcertError::RandomnessExhausted(MAX_ATTEMPTS))
}
