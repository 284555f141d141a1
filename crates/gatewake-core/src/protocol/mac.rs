//! Hardware (MAC) address parsing and formatting.
//!
//! Device inventories are rarely consistent about how they write MAC
//! addresses.  The parser accepts the three encodings seen in the wild and
//! normalizes them all to the same 6 raw bytes:
//!
//! ```text
//! "AA:BB:CC:DD:EE:FF"   colon-separated (Linux, macOS)
//! "AA-BB-CC-DD-EE-FF"   dash-separated  (Windows ipconfig)
//! "AABB.CCDD.EEFF"      dot-separated   (Cisco)
//! ```
//!
//! Case is ignored.  Anything that does not strip down to exactly 12 hex
//! characters is rejected — a malformed address must never reach the socket
//! layer.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when parsing a textual hardware address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacParseError {
    /// After separator stripping the address is not 12 hex characters long.
    #[error("invalid hardware address length: '{input}' strips to {stripped_len} hex chars, need 12")]
    InvalidLength { input: String, stripped_len: usize },

    /// The address contains a character that is neither hex nor a separator.
    #[error("hardware address contains non-hex character: '{input}'")]
    InvalidCharacter { input: String },
}

/// A 6-byte IEEE 802 hardware address.
///
/// Stored in network byte order.  Two textual encodings of the same address
/// always parse to the same `MacAddr` value, so magic packets built from
/// them are byte-identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// Constructs a `MacAddr` from 6 raw bytes.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Returns the 6 raw octets.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddr {
    type Err = MacParseError;

    /// Parses a colon-, dash-, or dot-separated hex address, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Strip the accepted separators, then uppercase for hex decoding.
        let stripped: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect::<String>()
            .to_uppercase();

        if stripped.len() != 12 {
            return Err(MacParseError::InvalidLength {
                input: s.to_string(),
                stripped_len: stripped.len(),
            });
        }

        if !stripped.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MacParseError::InvalidCharacter {
                input: s.to_string(),
            });
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            // Slicing is in-bounds: length and hex-ness were checked above.
            *octet = u8::from_str_radix(&stripped[2 * i..2 * i + 2], 16).map_err(|_| {
                MacParseError::InvalidCharacter {
                    input: s.to_string(),
                }
            })?;
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddr {
    /// Formats as the canonical colon-separated uppercase encoding.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const OCTETS: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];

    #[test]
    fn test_parse_colon_separated() {
        let mac: MacAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(mac.octets(), OCTETS);
    }

    #[test]
    fn test_parse_dash_separated() {
        let mac: MacAddr = "AA-BB-CC-DD-EE-FF".parse().unwrap();
        assert_eq!(mac.octets(), OCTETS);
    }

    #[test]
    fn test_parse_dot_separated() {
        let mac: MacAddr = "AABB.CCDD.EEFF".parse().unwrap();
        assert_eq!(mac.octets(), OCTETS);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let upper: MacAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let lower: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let mixed: MacAddr = "Aa-bB-cC-dD-eE-fF".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper, mixed);
    }

    #[test]
    fn test_all_encodings_of_same_address_are_equal() {
        // The same 6 bytes in every accepted textual form must compare equal.
        let forms = [
            "AA:BB:CC:DD:EE:FF",
            "aa:bb:cc:dd:ee:ff",
            "AA-BB-CC-DD-EE-FF",
            "AABB.CCDD.EEFF",
            "aabb.ccdd.eeff",
        ];
        let parsed: Vec<MacAddr> = forms.iter().map(|s| s.parse().unwrap()).collect();
        for mac in &parsed {
            assert_eq!(*mac, parsed[0]);
        }
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let result: Result<MacAddr, _> = "AA:BB:CC:DD:EE".parse();
        assert!(matches!(
            result,
            Err(MacParseError::InvalidLength { stripped_len: 10, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_non_hex_characters() {
        let result: Result<MacAddr, _> = "GG:BB:CC:DD:EE:FF".parse();
        assert!(matches!(result, Err(MacParseError::InvalidCharacter { .. })));
    }

    #[test]
    fn test_parse_rejects_arbitrary_string() {
        let result: Result<MacAddr, _> = "not-a-mac".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_empty_string() {
        let result: Result<MacAddr, _> = "".parse();
        assert!(matches!(
            result,
            Err(MacParseError::InvalidLength { stripped_len: 0, .. })
        ));
    }

    #[test]
    fn test_display_is_canonical_colon_uppercase() {
        let mac: MacAddr = "aabb.ccdd.eeff".parse().unwrap();
        assert_eq!(mac.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_round_trip_through_display() {
        let mac: MacAddr = "AABB.CCDD.EEFF".parse().unwrap();
        let restored: MacAddr = mac.to_string().parse().unwrap();
        assert_eq!(restored, mac);
    }
}
