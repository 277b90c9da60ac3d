//! Ledger configuration.
//!
//! Configuration for the review ledger client, including:
//! - Network selection and Blockfrost connection settings
//! - Location of the compiled validator blueprint
//! - Protocol parameters used for fee and collateral calculation

use crate::address::{Address, Network};
use crate::amount::Lovelace;
use crate::error::{LedgerError, Result};
use crate::transaction::ExUnits;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable holding the Blockfrost project id.
pub const ENV_BLOCKFROST_API_KEY: &str = "BLOCKFROST_API_KEY";

/// Environment variable selecting the network.
pub const ENV_NETWORK: &str = "NETWORK";

/// A non-negative rational, used for execution unit prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    /// Numerator.
    pub numerator: u64,
    /// Denominator, never zero.
    pub denominator: u64,
}

impl Ratio {
    /// Create a ratio.
    #[must_use]
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// Protocol parameters the builder needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Fee per transaction byte.
    pub min_fee_a: u64,
    /// Constant fee per transaction.
    pub min_fee_b: u64,
    /// Price of one memory unit.
    pub price_mem: Ratio,
    /// Price of one CPU step.
    pub price_steps: Ratio,
    /// Execution budget declared for the upvote redeemer.
    pub upvote_ex_units: ExUnits,
    /// Value locked with every review output.
    pub script_locked_lovelace: u64,
    /// Smallest change output worth creating.
    pub min_change_lovelace: u64,
    /// Collateral required, as a percentage of the fee.
    pub collateral_percent: u64,
    /// Smallest collateral input accepted.
    pub min_collateral_lovelace: u64,
    /// PlutusV3 cost model, in parameter order.
    pub cost_model_v3: Vec<i64>,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            price_mem: Ratio::new(577, 10_000),
            price_steps: Ratio::new(721, 10_000_000),
            upvote_ex_units: ExUnits {
                mem: 2_000_000,
                steps: 800_000_000,
            },
            script_locked_lovelace: crate::SCRIPT_LOCKED_LOVELACE,
            min_change_lovelace: 1_000_000,
            collateral_percent: 150,
            min_collateral_lovelace: 5_000_000,
            cost_model_v3: Vec::new(),
        }
    }
}

impl ProtocolParams {
    /// Linear fee for a transaction of `size` bytes.
    #[must_use]
    pub fn size_fee(&self, size: usize) -> Lovelace {
        Lovelace::new(
            self.min_fee_a
                .saturating_mul(size as u64)
                .saturating_add(self.min_fee_b),
        )
    }

    /// Fee for an execution budget, rounded up.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a price denominator is zero.
    pub fn script_fee(&self, ex_units: ExUnits) -> Result<Lovelace> {
        let (mem_num, mem_den) = (
            u128::from(self.price_mem.numerator),
            u128::from(self.price_mem.denominator),
        );
        let (steps_num, steps_den) = (
            u128::from(self.price_steps.numerator),
            u128::from(self.price_steps.denominator),
        );
        let denominator = mem_den * steps_den;
        if denominator == 0 {
            return Err(LedgerError::config(
                "execution price denominators must be greater than 0",
            ));
        }
        // Each term is a u64 times a u64 rational; overflow saturates.
        let mem_term = u128::from(ex_units.mem)
            .checked_mul(mem_num)
            .and_then(|v| v.checked_mul(steps_den));
        let steps_term = u128::from(ex_units.steps)
            .checked_mul(steps_num)
            .and_then(|v| v.checked_mul(mem_den));
        let Some(numerator) = mem_term.zip(steps_term).and_then(|(m, s)| m.checked_add(s))
        else {
            return Ok(Lovelace::MAX);
        };
        let fee = numerator.div_ceil(denominator);
        Ok(Lovelace::new(u64::try_from(fee).unwrap_or(u64::MAX)))
    }

    /// Collateral needed to cover `fee`.
    #[must_use]
    pub fn collateral_for(&self, fee: Lovelace) -> Lovelace {
        let by_percent = (u128::from(fee.lovelace()) * u128::from(self.collateral_percent))
            .div_ceil(100);
        let by_percent = u64::try_from(by_percent).unwrap_or(u64::MAX);
        Lovelace::new(by_percent.max(self.min_collateral_lovelace))
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.price_mem.denominator == 0 || self.price_steps.denominator == 0 {
            return Err(LedgerError::config(
                "execution price denominators must be greater than 0",
            ));
        }
        if self.script_locked_lovelace == 0 {
            return Err(LedgerError::config(
                "script_locked_lovelace must be greater than 0",
            ));
        }
        if self.collateral_percent == 0 {
            return Err(LedgerError::config(
                "collateral_percent must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Main ledger client configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LedgerConfig {
    /// Network to use.
    pub network: Network,
    /// Blockfrost base URL; the network default when unset.
    pub blockfrost_url: Option<String>,
    /// Blockfrost project id.
    pub blockfrost_project_id: Option<String>,
    /// Path to the compiled validator blueprint (`plutus.json`).
    pub blueprint_path: Option<PathBuf>,
    /// Validator title inside the blueprint; the first validator when unset.
    pub validator_title: Option<String>,
    /// Script address override; derived from the script hash when unset.
    pub script_address: Option<Address>,
    /// Protocol parameters.
    pub protocol: ProtocolParams,
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("network", &self.network)
            .field("blockfrost_url", &self.blockfrost_url)
            .field(
                "blockfrost_project_id",
                &self.blockfrost_project_id.as_ref().map(|_| "[REDACTED]"),
            )
            .field("blueprint_path", &self.blueprint_path)
            .field("validator_title", &self.validator_title)
            .field("script_address", &self.script_address)
            .field("protocol", &self.protocol)
            .finish()
    }
}

impl LedgerConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            LedgerError::config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| LedgerError::config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BLOCKFROST_API_KEY` and `NETWORK` from the environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(ENV_BLOCKFROST_API_KEY).ok(),
            std::env::var(ENV_NETWORK).ok(),
        )
    }

    /// Apply explicit overrides; empty values are ignored.
    pub fn apply_overrides(
        &mut self,
        project_id: Option<String>,
        network: Option<String>,
    ) -> Result<()> {
        if let Some(project_id) = project_id.filter(|p| !p.is_empty()) {
            self.blockfrost_project_id = Some(project_id);
        }
        if let Some(network) = network.filter(|n| !n.is_empty()) {
            self.network = network.parse()?;
        }
        Ok(())
    }

    /// Blockfrost base URL in effect.
    #[must_use]
    pub fn blockfrost_url(&self) -> &str {
        self.blockfrost_url
            .as_deref()
            .unwrap_or_else(|| self.network.blockfrost_url())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.blockfrost_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(LedgerError::config(
                    "blockfrost_url must start with http:// or https://",
                ));
            }
        }
        if let Some(address) = &self.script_address {
            if address.network_id() != self.network.network_id() {
                return Err(LedgerError::config(format!(
                    "script_address belongs to network id {}, configured network is {}",
                    address.network_id(),
                    self.network
                )));
            }
        }
        self.protocol.validate()
    }
}
