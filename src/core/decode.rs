//! Output payload decoding
//!
//! Each stream event carries a base64 snapshot of the remote screen. The
//! server emits standard base64 without padding, so decoding is forgiving:
//! ASCII whitespace is ignored and padding is optional.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode a base64 payload into raw bytes
pub fn decode_bytes(payload: &str) -> Result<Vec<u8>> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(PAYLOAD_ENGINE.decode(compact.as_bytes())?)
}

/// Decode a base64 payload into display text.
///
/// Invalid UTF-8 sequences are replaced with U+FFFD rather than rejected.
pub fn decode_text(payload: &str) -> Result<String> {
    let bytes = decode_bytes(payload)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}
