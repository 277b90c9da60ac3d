//! Network-backed ledger provider over the Blockfrost REST API.

use crate::address::Address;
use crate::amount::Lovelace;
use crate::config::LedgerConfig;
use crate::digest::{ScriptHash, TxHash};
use crate::error::{LedgerError, Result};
use crate::provider::{LedgerProvider, TransactionInfo};
use crate::transaction::SignedTransaction;
use crate::utxo::{Asset, OutputRef, Utxo, Value};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Page size Blockfrost uses when `count` is not given.
const PAGE_SIZE: usize = 100;

/// Hex length of a policy id at the start of an asset unit.
const POLICY_HEX_LEN: usize = 56;

const PROJECT_ID_HEADER: &str = "project_id";

/// Ledger error text marking an input that was already spent.
const SPENT_INPUT_MARKER: &str = "BadInputsUTxO";

#[derive(Debug, Deserialize)]
struct AmountEntry {
    unit: String,
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct UtxoEntry {
    address: String,
    tx_hash: String,
    output_index: u32,
    amount: Vec<AmountEntry>,
    inline_datum: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionEntry {
    hash: String,
    block: Option<String>,
    block_height: Option<u64>,
    block_time: Option<i64>,
    slot: Option<u64>,
    fees: String,
    size: u64,
    #[serde(default = "default_true")]
    valid_contract: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Blockfrost client.
#[derive(Clone)]
pub struct BlockfrostProvider {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
}

impl BlockfrostProvider {
    /// Create a provider for a base URL and project id.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("trustchain/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
        })
    }

    /// Create a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no project id is configured.
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        let project_id = config
            .blockfrost_project_id
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| LedgerError::config("a Blockfrost project id is required"))?;
        Self::new(config.blockfrost_url(), project_id)
    }

    /// Base URL requests go to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        debug!(path, "blockfrost request");
        self.client
            .get(self.url(path))
            .header(PROJECT_ID_HEADER, &self.project_id)
            .send()
            .await
            .map_err(|e| LedgerError::provider_unavailable(format!("request to {path} failed: {e}")))
    }
}

impl fmt::Debug for BlockfrostProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockfrostProvider")
            .field("base_url", &self.base_url)
            .field("project_id", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl LedgerProvider for BlockfrostProvider {
    async fn fetch_utxos(&self, address: &Address) -> Result<Vec<Utxo>> {
        let mut utxos = Vec::new();
        for page in 1.. {
            let path = format!("/addresses/{address}/utxos?page={page}");
            let response = self.get(&path).await?;
            if response.status() == StatusCode::NOT_FOUND {
                // Blockfrost answers 404 for an address that never appeared on chain.
                break;
            }
            let body = read_success(response).await?;
            let entries: Vec<UtxoEntry> = parse_json(&body)?;
            let count = entries.len();
            utxos.extend(convert_entries(entries));
            if count < PAGE_SIZE {
                break;
            }
        }
        debug!(address = %address, count = utxos.len(), "fetched utxos");
        Ok(utxos)
    }

    async fn fetch_transaction(&self, tx_hash: &TxHash) -> Result<TransactionInfo> {
        let response = self.get(&format!("/txs/{tx_hash}")).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(LedgerError::not_found(format!("transaction {tx_hash}")));
        }
        let body = read_success(response).await?;
        parse_json::<TransactionEntry>(&body)?.into_info()
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<TxHash> {
        let response = self
            .client
            .post(self.url("/tx/submit"))
            .header(PROJECT_ID_HEADER, &self.project_id)
            .header(CONTENT_TYPE, "application/cbor")
            .body(tx.as_bytes().to_vec())
            .send()
            .await
            .map_err(|e| LedgerError::provider_unavailable(format!("submit failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LedgerError::provider_unavailable(format!("submit failed: {e}")))?;

        if status.is_success() {
            let hash: String = parse_json(&body)?;
            let hash = TxHash::from_hex(&hash)?;
            info!(tx_hash = %hash, "submitted to blockfrost");
            return Ok(hash);
        }
        let err = classify_submit_failure(status, &body);
        warn!(tx_hash = %tx.id(), status = status.as_u16(), error = %err, "blockfrost rejected transaction");
        Err(err)
    }
}

async fn read_success(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| LedgerError::provider_unavailable(format!("failed to read response: {e}")))?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(LedgerError::provider_unavailable(format!(
            "blockfrost returned {status}: {}",
            error_message(&body)
        )))
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| LedgerError::provider_unavailable(format!("unexpected blockfrost response: {e}")))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.to_string())
}

fn classify_submit_failure(status: StatusCode, body: &str) -> LedgerError {
    let message = error_message(body);
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        let conflict = message.contains(SPENT_INPUT_MARKER);
        LedgerError::rejected(message, conflict)
    } else {
        LedgerError::provider_unavailable(format!("blockfrost returned {status}: {message}"))
    }
}

fn parse_quantity(quantity: &str) -> Result<u64> {
    quantity
        .parse()
        .map_err(|_| LedgerError::provider_unavailable(format!("invalid quantity: {quantity}")))
}

/// Convert a page of entries, skipping any that do not parse.
fn convert_entries(entries: Vec<UtxoEntry>) -> Vec<Utxo> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let out_ref = format!("{}#{}", entry.tx_hash, entry.output_index);
            match entry.into_utxo() {
                Ok(utxo) => Some(utxo),
                Err(e) => {
                    warn!(out_ref = %out_ref, error = %e, "skipping unparseable utxo entry");
                    None
                }
            }
        })
        .collect()
}

impl UtxoEntry {
    fn into_utxo(self) -> Result<Utxo> {
        let mut coin = 0u64;
        let mut assets = Vec::new();
        for entry in &self.amount {
            let quantity = parse_quantity(&entry.quantity)?;
            if entry.unit == "lovelace" {
                coin = coin.saturating_add(quantity);
                continue;
            }
            if entry.unit.len() < POLICY_HEX_LEN || !entry.unit.is_char_boundary(POLICY_HEX_LEN) {
                return Err(LedgerError::provider_unavailable(format!(
                    "invalid asset unit: {}",
                    entry.unit
                )));
            }
            let (policy, name) = entry.unit.split_at(POLICY_HEX_LEN);
            assets.push(Asset {
                policy_id: ScriptHash::from_hex(policy)?,
                name: hex::decode(name).map_err(|e| {
                    LedgerError::provider_unavailable(format!("invalid asset name: {e}"))
                })?,
                quantity,
            });
        }
        let inline_datum = self
            .inline_datum
            .map(|d| {
                hex::decode(&d).map_err(|e| {
                    LedgerError::provider_unavailable(format!("invalid inline datum hex: {e}"))
                })
            })
            .transpose()?;
        Ok(Utxo {
            out_ref: OutputRef::new(TxHash::from_hex(&self.tx_hash)?, self.output_index),
            address: Address::parse(&self.address)?,
            value: Value::with_assets(Lovelace::new(coin), assets),
            inline_datum,
        })
    }
}

impl TransactionEntry {
    fn into_info(self) -> Result<TransactionInfo> {
        Ok(TransactionInfo {
            hash: TxHash::from_hex(&self.hash)?,
            block: self.block,
            block_height: self.block_height,
            block_time: self.block_time,
            slot: self.slot,
            fees: Lovelace::new(parse_quantity(&self.fees)?),
            size: self.size,
            valid_contract: self.valid_contract,
        })
    }
}
