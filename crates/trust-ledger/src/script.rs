//! Compiled validator artifact.
//!
//! Loaded once from a CIP-57 blueprint (`plutus.json`), the format the
//! validator toolchain emits. Only the upvote path needs it.

use crate::address::{Address, Network};
use crate::digest::ScriptHash;
use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct Blueprint {
    #[serde(default)]
    validators: Vec<BlueprintValidator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlueprintValidator {
    title: Option<String>,
    compiled_code: Option<String>,
    hash: Option<String>,
}

/// A PlutusV3 validator program.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatorScript {
    title: Option<String>,
    code: Vec<u8>,
    hash: ScriptHash,
}

impl std::fmt::Debug for ValidatorScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorScript")
            .field("title", &self.title)
            .field("hash", &self.hash)
            .field("size", &self.code.len())
            .finish()
    }
}

impl ValidatorScript {
    /// Wrap compiled script bytes (flat-encoded program wrapped in a CBOR
    /// byte string, as blueprints carry it).
    pub fn from_compiled(code: Vec<u8>) -> Result<Self> {
        if code.is_empty() {
            return Err(LedgerError::script_unavailable("compiled code is empty"));
        }
        Ok(Self {
            title: None,
            hash: ScriptHash::of_plutus_v3(&code),
            code,
        })
    }

    /// Load from a blueprint file.
    pub fn from_blueprint_file(path: impl AsRef<Path>, title: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::script_unavailable(format!(
                "failed to read blueprint '{}': {e}",
                path.display()
            ))
        })?;
        let script = Self::from_blueprint_json(&content, title)?;
        info!(
            path = %path.display(),
            script_hash = %script.hash,
            "loaded validator script"
        );
        Ok(script)
    }

    /// Parse blueprint JSON, picking the validator with `title`, or the
    /// first validator that carries compiled code.
    pub fn from_blueprint_json(content: &str, title: Option<&str>) -> Result<Self> {
        let blueprint: Blueprint = serde_json::from_str(content)
            .map_err(|e| LedgerError::script_unavailable(format!("invalid blueprint: {e}")))?;
        let validator = match title {
            Some(title) => blueprint
                .validators
                .into_iter()
                .find(|v| v.title.as_deref() == Some(title))
                .ok_or_else(|| {
                    LedgerError::script_unavailable(format!("no validator titled '{title}'"))
                })?,
            None => blueprint
                .validators
                .into_iter()
                .find(|v| v.compiled_code.is_some())
                .ok_or_else(|| LedgerError::script_unavailable("blueprint has no validators"))?,
        };
        let code = validator.compiled_code.ok_or_else(|| {
            LedgerError::script_unavailable("validator has no compiled code")
        })?;
        let code = hex::decode(&code).map_err(|e| {
            LedgerError::script_unavailable(format!("compiled code is not valid hex: {e}"))
        })?;
        let mut script = Self::from_compiled(code)?;
        script.title = validator.title;
        if let Some(declared) = validator.hash {
            if declared != script.hash.to_hex() {
                warn!(
                    declared = %declared,
                    computed = %script.hash,
                    "blueprint hash differs from computed script hash"
                );
            }
        }
        Ok(script)
    }

    /// Validator title, if loaded from a blueprint.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Compiled script bytes.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Script hash.
    #[must_use]
    pub const fn hash(&self) -> ScriptHash {
        self.hash
    }

    /// Enterprise script address on `network`.
    #[must_use]
    pub fn address(&self, network: Network) -> Address {
        Address::enterprise_script(network, &self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BLUEPRINT: &str = r#"{
        "preamble": { "title": "trustchain/reviews", "plutusVersion": "v3" },
        "validators": [
            { "title": "review.review.spend", "compiledCode": "4e4d01000033222220051200120011", "hash": "00" },
            { "title": "review.other.spend", "compiledCode": "49480100002221200101" }
        ]
    }"#;

    #[test]
    fn test_first_validator_by_default() {
        let script = ValidatorScript::from_blueprint_json(BLUEPRINT, None).expect("load");
        assert_eq!(script.title(), Some("review.review.spend"));
        assert_eq!(
            script.hash(),
            ScriptHash::of_plutus_v3(&hex::decode("4e4d01000033222220051200120011").expect("hex"))
        );
    }

    #[test]
    fn test_select_by_title() {
        let script = ValidatorScript::from_blueprint_json(BLUEPRINT, Some("review.other.spend"))
            .expect("load");
        assert_eq!(script.code().len(), 10);
    }

    #[test]
    fn test_unknown_title() {
        let err = ValidatorScript::from_blueprint_json(BLUEPRINT, Some("nope")).expect_err("missing");
        assert!(matches!(err, LedgerError::ScriptUnavailable { .. }));
    }

    #[test]
    fn test_empty_blueprint() {
        let err = ValidatorScript::from_blueprint_json(r#"{"validators": []}"#, None)
            .expect_err("empty");
        assert!(matches!(err, LedgerError::ScriptUnavailable { .. }));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = ValidatorScript::from_blueprint_file("/nonexistent/plutus.json", None)
            .expect_err("missing");
        assert!(matches!(err, LedgerError::ScriptUnavailable { .. }));
    }

    #[test]
    fn test_from_file_and_address() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(BLUEPRINT.as_bytes()).expect("write");
        let script = ValidatorScript::from_blueprint_file(file.path(), None).expect("load");
        let address = script.address(Network::Preprod);
        assert!(address.to_bech32().starts_with("addr_test1w"));
        assert_eq!(address.payment_key_hash(), None);
    }
}
