//! Cardano networks and Shelley addresses.

use crate::digest::{KeyHash, ScriptHash};
use crate::error::{LedgerError, Result};
use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Cardano network to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Mainnet (production).
    Mainnet,
    /// Pre-production testnet.
    #[default]
    Preprod,
    /// Preview testnet.
    Preview,
}

impl Network {
    /// Network id carried in the low nibble of an address header.
    #[must_use]
    pub const fn network_id(&self) -> u8 {
        match self {
            Self::Mainnet => 1,
            Self::Preprod | Self::Preview => 0,
        }
    }

    /// Blockfrost API base URL for this network.
    #[must_use]
    pub const fn blockfrost_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://cardano-mainnet.blockfrost.io/api/v0",
            Self::Preprod => "https://cardano-preprod.blockfrost.io/api/v0",
            Self::Preview => "https://cardano-preview.blockfrost.io/api/v0",
        }
    }

    /// Block explorer URL for a transaction.
    #[must_use]
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        match self {
            Self::Mainnet => format!("https://cardanoscan.io/transaction/{tx_hash}"),
            Self::Preprod => format!("https://preprod.cardanoscan.io/transaction/{tx_hash}"),
            Self::Preview => format!("https://preview.cardanoscan.io/transaction/{tx_hash}"),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Preprod => write!(f, "preprod"),
            Self::Preview => write!(f, "preview"),
        }
    }
}

impl FromStr for Network {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "preprod" => Ok(Self::Preprod),
            "preview" => Ok(Self::Preview),
            other => Err(LedgerError::config(format!("unknown network: {other}"))),
        }
    }
}

const ENTERPRISE_KEY_HEADER: u8 = 0b0110_0000;
const ENTERPRISE_SCRIPT_HEADER: u8 = 0b0111_0000;
const MAINNET_HRP: &str = "addr";
const TESTNET_HRP: &str = "addr_test";

/// A Shelley-era address, held as its raw bytes.
///
/// Parses from bech32 (`addr1…`, `addr_test1…`) or from hex, which is what
/// CIP-30 wallets hand out. Displays as bech32.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(Vec<u8>);

impl Address {
    /// Create an address from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not a Shelley address.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some(&header) = bytes.first() else {
            return Err(LedgerError::invalid_address("empty address"));
        };
        if header >> 4 > 0b0111 {
            return Err(LedgerError::invalid_address(format!(
                "unsupported address type {:#x}",
                header >> 4
            )));
        }
        if bytes.len() != 29 && bytes.len() != 57 {
            return Err(LedgerError::invalid_address(format!(
                "address must be 29 or 57 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Parse a bech32-encoded address.
    pub fn from_bech32(s: &str) -> Result<Self> {
        let (hrp, data, variant) = bech32::decode(s)
            .map_err(|e| LedgerError::invalid_address(format!("invalid bech32: {e}")))?;
        if variant != Variant::Bech32 {
            return Err(LedgerError::invalid_address("expected bech32, got bech32m"));
        }
        if hrp != MAINNET_HRP && hrp != TESTNET_HRP {
            return Err(LedgerError::invalid_address(format!("unexpected prefix {hrp}")));
        }
        let bytes = Vec::<u8>::from_base32(&data)
            .map_err(|e| LedgerError::invalid_address(format!("invalid bech32 data: {e}")))?;
        let address = Self::from_bytes(&bytes)?;
        let expected_hrp = address.hrp();
        if hrp != expected_hrp {
            return Err(LedgerError::invalid_address(format!(
                "prefix {hrp} does not match network id {}",
                address.network_id()
            )));
        }
        Ok(address)
    }

    /// Parse a hex-encoded address.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| LedgerError::invalid_address(format!("invalid hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Parse either form.
    pub fn parse(s: &str) -> Result<Self> {
        if s.starts_with(MAINNET_HRP) {
            Self::from_bech32(s)
        } else {
            Self::from_hex(s)
        }
    }

    /// Enterprise address paying to a verification key hash.
    #[must_use]
    pub fn enterprise_key(network: Network, key_hash: &KeyHash) -> Self {
        let mut bytes = Vec::with_capacity(29);
        bytes.push(ENTERPRISE_KEY_HEADER | network.network_id());
        bytes.extend_from_slice(key_hash.as_bytes());
        Self(bytes)
    }

    /// Enterprise address locked by a script.
    #[must_use]
    pub fn enterprise_script(network: Network, script_hash: &ScriptHash) -> Self {
        let mut bytes = Vec::with_capacity(29);
        bytes.push(ENTERPRISE_SCRIPT_HEADER | network.network_id());
        bytes.extend_from_slice(script_hash.as_bytes());
        Self(bytes)
    }

    /// Network id from the header byte.
    #[must_use]
    pub fn network_id(&self) -> u8 {
        self.0[0] & 0x0f
    }

    fn hrp(&self) -> &'static str {
        if self.network_id() == 1 {
            MAINNET_HRP
        } else {
            TESTNET_HRP
        }
    }

    /// Key hash of the payment credential, if it is a key rather than a script.
    #[must_use]
    pub fn payment_key_hash(&self) -> Option<KeyHash> {
        // Address types 0, 2, 4 and 6 carry a key payment credential.
        if (self.0[0] >> 4) & 1 == 0 {
            KeyHash::from_slice(&self.0[1..29]).ok()
        } else {
            None
        }
    }

    /// Raw address bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Bech32 form.
    #[must_use]
    pub fn to_bech32(&self) -> String {
        // Encoding only fails for an invalid HRP; ours are constants.
        bech32::encode(self.hrp(), self.0.to_base32(), Variant::Bech32)
            .unwrap_or_else(|_| hex::encode(&self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bech32())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_bech32())
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_bech32())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enterprise_key_roundtrip() {
        let key_hash = KeyHash::new([0x11; 28]);
        let address = Address::enterprise_key(Network::Preprod, &key_hash);
        let text = address.to_bech32();
        assert!(text.starts_with("addr_test1"));
        let parsed = Address::from_bech32(&text).expect("parse");
        assert_eq!(parsed, address);
        assert_eq!(parsed.payment_key_hash(), Some(key_hash));
    }

    #[test]
    fn test_mainnet_prefix() {
        let address = Address::enterprise_script(Network::Mainnet, &ScriptHash::new([2; 28]));
        assert!(address.to_bech32().starts_with("addr1"));
        assert_eq!(address.network_id(), 1);
        assert_eq!(address.payment_key_hash(), None);
    }

    #[test]
    fn test_parse_hex_form() {
        let address = Address::enterprise_key(Network::Preview, &KeyHash::new([9; 28]));
        let hex_form = hex::encode(address.as_bytes());
        assert_eq!(Address::parse(&hex_form).expect("parse hex"), address);
    }

    #[test]
    fn test_parse_base_address_from_wallet() {
        // Base address: header 0x00 (key/key, testnet), 28 + 28 bytes.
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&[0xaa; 28]);
        bytes.extend_from_slice(&[0xbb; 28]);
        let address = Address::from_bytes(&bytes).expect("base address");
        assert_eq!(address.payment_key_hash(), Some(KeyHash::new([0xaa; 28])));
        let again = Address::parse(&address.to_bech32()).expect("bech32");
        assert_eq!(again, address);
    }

    #[test]
    fn test_rejects_bad_addresses() {
        assert!(Address::from_bytes(&[]).is_err());
        assert!(Address::from_bytes(&[0x60, 1, 2]).is_err());
        assert!(Address::from_bytes(&[0x80; 29]).is_err());
        assert!(Address::parse("addr_test1notvalid").is_err());
        assert!(Address::parse("zz").is_err());
    }

    #[test]
    fn test_network_parse_and_display() {
        assert_eq!("PREPROD".parse::<Network>().expect("parse"), Network::Preprod);
        assert_eq!(Network::Mainnet.to_string(), "mainnet");
        assert!("testnet".parse::<Network>().is_err());
        assert_eq!(Network::default(), Network::Preprod);
    }

    #[test]
    fn test_address_serialization() {
        let address = Address::enterprise_key(Network::Preprod, &KeyHash::new([3; 28]));
        let json = serde_json::to_string(&address).expect("serialize");
        let parsed: Address = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, address);
    }
}
