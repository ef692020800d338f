//! Bluetooth address and offset encoding
//!
//! The device keeps the 6-byte Bluetooth address in little-endian byte
//! order: the display form `b0b448010203` is stored as `03 02 01 48 b4 b0`.
//! The upper three display bytes are a fixed vendor header, which is what
//! the address is located by in flash.

use core::fmt;

use crate::error::{Error, Result};

/// Fixed header of every address, in display order
pub const BTA_HEADER: &str = "b0b448";

/// Length of an address in hex characters
pub const BTA_HEX_LEN: usize = 12;

/// Length of an address in bytes
pub const BTA_LEN: usize = BTA_HEX_LEN / 2;

/// Bytes between the start of the stored address and the header
const HEADER_OFFSET: u32 = 3;

/// Normalize and validate a hex string
///
/// Whitespace is removed and a leading `0x`/`0X` stripped. The remainder
/// must be a non-empty run of hex digits and is returned as typed; case is
/// left for [`check_header_and_length`] to judge.
pub fn validate_hex(s: &str) -> Result<String> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidFormat(s.to_string()));
    }

    Ok(digits.to_string())
}

/// Check an address for the fixed header and exact length
pub fn check_header_and_length(addr: &str) -> Result<()> {
    if addr.len() != BTA_HEX_LEN || !addr.starts_with(BTA_HEADER) {
        return Err(Error::InvalidAddress(addr.to_string()));
    }
    Ok(())
}

/// Reverse the byte order of a hex string
///
/// The string is split into 2-character groups which are emitted in
/// reverse order. A trailing odd character forms its own group.
pub fn reverse_bytes(hex: &str) -> String {
    let bytes = hex.as_bytes();
    bytes
        .chunks(2)
        .rev()
        .map(|pair| String::from_utf8_lossy(pair))
        .collect()
}

/// Start of the stored address record, given where the header was found
///
/// `found` is the payload of a successful search; only the first reported
/// offset is used. The three unique address bytes precede the header in
/// storage order.
pub fn locate_header_offset(found: &str) -> Result<u32> {
    let first = found
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::InvalidFormat(found.to_string()))?;
    let header_at = parse_offset(first)?;
    header_at
        .checked_sub(HEADER_OFFSET)
        .ok_or_else(|| Error::InvalidFormat(first.to_string()))
}

/// Parse an offset written as `0x`-prefixed hex or decimal
pub fn parse_offset(s: &str) -> Result<u32> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|_| Error::InvalidFormat(s.to_string()))
}

/// Format an offset the way the tool expects it
pub fn format_offset(offset: u32) -> String {
    format!("0x{:x}", offset)
}

/// Byte pattern of the header as it appears in flash
pub fn header_search_pattern() -> String {
    format!("0x{}", reverse_bytes(BTA_HEADER))
}

/// A validated Bluetooth address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BluetoothAddress {
    display: String,
}

impl BluetoothAddress {
    /// Parse a user-supplied address in display order
    pub fn parse(s: &str) -> Result<Self> {
        let display = validate_hex(s)?;
        check_header_and_length(&display)?;
        Ok(Self { display })
    }

    /// Build an address from its device-stored hex form
    pub fn from_device_hex(s: &str) -> Result<Self> {
        Self::parse(&reverse_bytes(&validate_hex(s)?))
    }

    /// Hex digits in display order
    pub fn display_hex(&self) -> &str {
        &self.display
    }

    /// Hex digits in device-storage order
    pub fn device_hex(&self) -> String {
        reverse_bytes(&self.display)
    }
}

impl fmt::Display for BluetoothAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.display)
    }
}
