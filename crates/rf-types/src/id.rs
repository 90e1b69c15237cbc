//! VM and datapath identifiers.
//!
//! Identifiers travel as strings. Static config files write them in hex,
//! IPC payloads in decimal; both forms accept an explicit `0x` prefix.

use crate::ParseError;

/// Parses an identifier, decimal unless prefixed with `0x`.
pub fn parse_id(s: &str) -> Result<u64, ParseError> {
    let trimmed = s.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|_| ParseError::InvalidId(s.to_string()))
}

/// Parses an identifier that is always hex, with or without a `0x` prefix.
pub fn parse_id_hex(s: &str) -> Result<u64, ParseError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).map_err(|_| ParseError::InvalidId(s.to_string()))
}

/// Formats an identifier for logs, as a zero-padded 16 digit hex string.
pub fn format_id(id: u64) -> String {
    format!("{:016x}", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_decimal_and_prefixed_hex() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert_eq!(parse_id("0x10").unwrap(), 16);
        assert_eq!(parse_id(" 7 ").unwrap(), 7);
    }

    #[test]
    fn test_parse_hex_without_prefix() {
        assert_eq!(parse_id_hex("10").unwrap(), 16);
        assert_eq!(parse_id_hex("0xff").unwrap(), 255);
        assert_eq!(parse_id_hex("7266767300000001").unwrap(), 0x7266_7673_0000_0001);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_id("").is_err());
        assert!(parse_id("12ab").is_err());
        assert!(parse_id_hex("zz").is_err());
        assert!(parse_id("-1").is_err());
    }

    #[test]
    fn test_format_id() {
        assert_eq!(format_id(0x10), "0000000000000010");
        assert_eq!(format_id(u64::MAX), "ffffffffffffffff");
    }
}
