//! Address normalization.
//!
//! Every address that enters the configuration record goes through
//! [`normalize`]: placeholders collapse to `None`, valid addresses come back in
//! EIP-55 checksummed form, and invalid input is handled according to the
//! caller's [`ValidationMode`].

use std::str::FromStr;

use alloy::primitives::Address;

use crate::error::AppError;
use crate::types::ValidationMode;

/// Values conventionally used to mean "no address set".
pub const PLACEHOLDERS: &[&str] = &["", "-", "0x", "0x...", "0x\u{2026}"];

/// Returns true when `value` is one of the [`PLACEHOLDERS`].
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    PLACEHOLDERS.iter().any(|p| p.eq_ignore_ascii_case(value))
}

/// Normalize an optional address candidate.
///
/// Returns `Ok(None)` for absent or placeholder input, `Ok(Some(checksummed))`
/// for a valid address. Invalid input yields `Ok(None)` in lenient mode and
/// `Err(AppError::InvalidAddress)` in strict mode.
pub fn normalize(candidate: Option<&str>, mode: ValidationMode) -> Result<Option<String>, AppError> {
    let Some(raw) = candidate else {
        return Ok(None);
    };
    if is_placeholder(raw) {
        return Ok(None);
    }

    match parse_address(raw) {
        Some(address) => Ok(Some(address.to_checksum(None))),
        None => match mode {
            ValidationMode::Lenient => {
                tracing::debug!(candidate = %raw, "Dropping invalid address");
                Ok(None)
            }
            ValidationMode::Strict => Err(AppError::InvalidAddress(raw.trim().to_string())),
        },
    }
}

/// Lenient shorthand for [`normalize`].
pub fn normalize_lenient(candidate: Option<&str>) -> Option<String> {
    normalize(candidate, ValidationMode::Lenient).unwrap_or(None)
}

/// Strict shorthand for [`normalize`].
pub fn normalize_strict(candidate: Option<&str>) -> Result<Option<String>, AppError> {
    normalize(candidate, ValidationMode::Strict)
}

/// Parse a `0x`-prefixed, 40-hex-digit address.
///
/// Single-case input is accepted as is. Mixed-case input must carry a valid
/// EIP-55 checksum.
pub fn parse_address(raw: &str) -> Option<Address> {
    let raw = raw.trim();
    let body = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    let prefixed = format!("0x{}", body);

    if has_lower && has_upper {
        Address::parse_checksummed(&prefixed, None).ok()
    } else {
        Address::from_str(&prefixed).ok()
    }
}
