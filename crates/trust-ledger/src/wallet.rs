//! Key wallet.
//!
//! An Ed25519 payment key that signs transaction ids. Key files use the
//! `cardano-cli` text envelope: `{"type", "description", "cborHex"}` where
//! `cborHex` is the 32-byte secret wrapped in a CBOR byte string.

use crate::address::{Address, Network};
use crate::digest::KeyHash;
use crate::error::{LedgerError, Result};
use crate::provider::Signer;
use crate::transaction::{UnsignedTransaction, VkeyWitness, WitnessSet};
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

const ENVELOPE_TYPE: &str = "PaymentSigningKeyShelley_ed25519";
const ENVELOPE_DESCRIPTION: &str = "Payment Signing Key";
/// CBOR head of a 32-byte byte string.
const SECRET_PREFIX: [u8; 2] = [0x58, 0x20];

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextEnvelope {
    #[serde(rename = "type")]
    kind: String,
    description: String,
    cbor_hex: String,
}

/// A wallet holding one Ed25519 payment key.
pub struct KeyWallet {
    signing_key: SigningKey,
    key_hash: KeyHash,
}

impl KeyWallet {
    /// Generate a new random wallet.
    ///
    /// Key material comes straight from the operating system's CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut secret_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut secret_bytes);
        Ok(Self::from_signing_key(SigningKey::from_bytes(&secret_bytes)))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let key_hash = KeyHash::of_vkey(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            key_hash,
        }
    }

    /// Create a wallet from a 32-byte secret key.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not 32 bytes.
    pub fn from_secret_key(secret: &[u8]) -> Result<Self> {
        let secret: [u8; 32] = secret.try_into().map_err(|_| {
            LedgerError::validation(format!(
                "secret key must be 32 bytes, got {}",
                secret.len()
            ))
        })?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&secret)))
    }

    /// Create a wallet from a hex-encoded secret key.
    pub fn from_hex_secret(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| LedgerError::validation(format!("secret key is not valid hex: {e}")))?;
        Self::from_secret_key(&bytes)
    }

    /// Load a wallet from a text-envelope key file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let envelope: TextEnvelope = serde_json::from_str(&contents)?;
        if envelope.kind != ENVELOPE_TYPE {
            return Err(LedgerError::validation(format!(
                "unsupported key type: {}",
                envelope.kind
            )));
        }
        let bytes = hex::decode(&envelope.cbor_hex)
            .map_err(|e| LedgerError::validation(format!("cborHex is not valid hex: {e}")))?;
        let secret = bytes.strip_prefix(&SECRET_PREFIX).ok_or_else(|| {
            LedgerError::validation("cborHex must be a 32-byte CBOR byte string")
        })?;
        Self::from_secret_key(secret)
    }

    /// Save the wallet as a text-envelope key file.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut cbor = SECRET_PREFIX.to_vec();
        cbor.extend_from_slice(self.signing_key.as_bytes());
        let envelope = TextEnvelope {
            kind: ENVELOPE_TYPE.to_string(),
            description: ENVELOPE_DESCRIPTION.to_string(),
            cbor_hex: hex::encode(cbor),
        };
        std::fs::write(path, serde_json::to_string_pretty(&envelope)?)?;
        Ok(())
    }

    /// Hash of the verification key.
    #[must_use]
    pub const fn key_hash(&self) -> KeyHash {
        self.key_hash
    }

    /// Enterprise address paying to this key.
    #[must_use]
    pub fn address(&self, network: Network) -> Address {
        Address::enterprise_key(network, &self.key_hash)
    }

    /// The verification key.
    #[must_use]
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Witness for a transaction id.
    #[must_use]
    pub fn witness(&self, tx: &UnsignedTransaction) -> VkeyWitness {
        VkeyWitness {
            vkey: self.public_key().to_bytes(),
            signature: self.signing_key.sign(tx.id().as_bytes()).to_bytes(),
        }
    }
}

impl Signer for KeyWallet {
    async fn sign(&self, tx: &UnsignedTransaction) -> Result<WitnessSet> {
        debug!(tx_hash = %tx.id(), key_hash = %self.key_hash, "signing transaction");
        Ok(WitnessSet::new(vec![self.witness(tx)]))
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl fmt::Debug for KeyWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyWallet")
            .field("key_hash", &self.key_hash)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Lovelace;
    use crate::transaction::{TransactionBody, TxOutput};
    use crate::utxo::{OutputRef, Value};
    use crate::digest::TxHash;
    use tempfile::NamedTempFile;

    fn unsigned_for(wallet: &KeyWallet) -> UnsignedTransaction {
        let body = TransactionBody {
            inputs: vec![OutputRef::new(TxHash::new([1; 32]), 0)],
            outputs: vec![TxOutput::new(
                wallet.address(Network::Preprod),
                Value::coin(Lovelace::from_ada(1)),
            )],
            fee: Lovelace::new(170_000),
            required_signers: vec![wallet.key_hash()],
            ..TransactionBody::default()
        };
        UnsignedTransaction::from_body(body, &[0xa0])
    }

    #[test]
    fn test_secret_key_roundtrip() {
        let wallet1 = KeyWallet::generate().expect("should generate");
        let wallet2 =
            KeyWallet::from_secret_key(wallet1.signing_key.as_bytes()).expect("should create");
        assert_eq!(wallet1.key_hash(), wallet2.key_hash());
    }

    #[test]
    fn test_hex_secret() {
        let wallet = KeyWallet::from_hex_secret(&"11".repeat(32)).expect("should create");
        assert_eq!(
            wallet.address(Network::Preprod).payment_key_hash(),
            Some(wallet.key_hash())
        );
        assert!(KeyWallet::from_hex_secret("1234").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let wallet1 = KeyWallet::generate().expect("should generate");
        let temp_file = NamedTempFile::new().expect("should create temp file");
        wallet1.save(temp_file.path()).expect("should save");
        let contents = std::fs::read_to_string(temp_file.path()).expect("read");
        assert!(contents.contains("PaymentSigningKeyShelley_ed25519"));
        let wallet2 = KeyWallet::from_file(temp_file.path()).expect("should load");
        assert_eq!(wallet1.key_hash(), wallet2.key_hash());
    }

    #[test]
    fn test_rejects_wrong_envelope() {
        let temp_file = NamedTempFile::new().expect("should create temp file");
        std::fs::write(
            temp_file.path(),
            r#"{"type": "StakeSigningKeyShelley_ed25519", "description": "", "cborHex": "5820"}"#,
        )
        .expect("write");
        assert!(KeyWallet::from_file(temp_file.path()).is_err());
    }

    #[tokio::test]
    async fn test_signature_verifies_against_tx_id() {
        let wallet = KeyWallet::generate().expect("should generate");
        let tx = unsigned_for(&wallet);
        let witnesses = wallet.sign(&tx).await.expect("sign");
        assert_eq!(witnesses.vkeys().len(), 1);
        assert!(witnesses.vkeys()[0].verifies(&tx.id()));
        assert!(witnesses.missing_signers(tx.required_signers()).is_empty());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let wallet = KeyWallet::from_hex_secret(&"ab".repeat(32)).expect("should create");
        let debug_str = format!("{wallet:?}");
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains(&"ab".repeat(32)));
    }
}
