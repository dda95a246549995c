//! Account address parsing.

use alloy_core::primitives::Address;
use anyhow::Result;

/// Parse an account address literal.
///
/// The literal must be `0x`-prefixed with exactly 40 hex characters. Mixed-case literals
/// must carry a valid EIP-55 checksum; all-lowercase and all-uppercase literals are
/// accepted as-is.
pub fn parse_address(literal: &str) -> Result<Address> {
    let Some(digits) = literal.strip_prefix("0x") else {
        anyhow::bail!(
            "Invalid address format: expected 0x-prefixed 40 hex chars, got '{}'",
            literal
        );
    };

    if digits.len() != 40 {
        anyhow::bail!(
            "Invalid address length: expected 40 hex chars, got {} in '{}'",
            digits.len(),
            literal
        );
    }

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid address: contains non-hex characters: '{}'", literal);
    }

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());

    if has_lower && has_upper {
        return Address::parse_checksummed(literal, None)
            .map_err(|_| anyhow::anyhow!("Invalid address checksum: '{}'", literal));
    }

    Ok(literal.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_valid() {
        assert!(parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_ok());
        assert!(parse_address("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").is_ok());
        assert!(parse_address("0x0000000000000000000000000000000000000000").is_ok());
        assert!(parse_address("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef").is_ok());
        assert!(parse_address("0xDEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEF").is_ok());
    }

    #[test]
    fn test_parse_address_invalid() {
        // 39 hex digits.
        assert!(parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb9226").is_err());
        // 41 hex digits.
        assert!(parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb922666").is_err());
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_err());
        assert!(parse_address("0xGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_parse_address_bad_checksum() {
        // Last two case flips of a valid checksummed address.
        assert!(parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_ok());
        assert!(parse_address("0xF39fd6e51aad88F6F4ce6aB8827279cffFb92266").is_err());
    }

    #[test]
    fn test_parse_address_case_insensitive_equality() {
        let checksummed = parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
        let lower = parse_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();
        assert_eq!(checksummed, lower);
    }
}
