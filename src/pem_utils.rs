//! PEM block types and helpers around the `pem` crate.

use crate::error::{PcertError, Result};

pub const CERTIFICATE: &str = "CERTIFICATE";
pub const CERTIFICATE_REQUEST: &str = "CERTIFICATE REQUEST";
pub const PRIVATE_KEY: &str = "PRIVATE KEY";
/// SEC1 elliptic curve key; accepted on input only.
pub const EC_PRIVATE_KEY: &str = "EC PRIVATE KEY";

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn encode(label: &str, der: &[u8]) -> String {
    let block = pem::Pem::new(label, der);
    pem::encode_config(&block, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF))
}

/// Parses every PEM block of `input`, skipping text between blocks.
pub fn parse_all(input: &[u8]) -> Result<Vec<pem::Pem>> {
    Ok(pem::parse_many(input)?)
}

/// Returns the contents of every block labelled `label`, in input order.
pub fn blocks_with_label(input: &[u8], label: &str) -> Result<Vec<Vec<u8>>> {
    Ok(parse_all(input)?
        .into_iter()
        .filter(|block| block.tag() == label)
        .map(|block| block.into_contents())
        .collect())
}

/// Returns the contents of the first block labelled `label`.
///
/// # Errors
/// `DecodingError` naming the label when no such block exists.
pub fn first_block(input: &[u8], label: &str) -> Result<Vec<u8>> {
    blocks_with_label(input, label)?
        .into_iter()
        .next()
        .ok_or_else(|| PcertError::DecodingError(format!("no {label} PEM block found")))
}
