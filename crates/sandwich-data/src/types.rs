//! Type definitions for raw Solana block data and normalized swap events.
//!
//! The raw types mirror the JSON returned by the `getBlock` RPC method with
//! `encoding: "json"`. Only the fields the extraction pipeline reads are
//! modeled; everything else in the payload is ignored during decoding.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Full JSON-RPC response body for one `getBlock` call.
///
/// Both `result` and `error` are optional: a skipped slot comes back as an
/// error body with no result, and a block record without `result` simply
/// carries no transactions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockResponse {
    /// Block payload, absent for skipped or unavailable slots.
    pub result: Option<BlockResult>,
    /// JSON-RPC error object, if the node returned one.
    pub error: Option<RpcError>,
}

impl BlockResponse {
    /// Decodes a raw `getBlock` response body.
    ///
    /// # Errors
    /// Returns error if the body is not valid JSON or a transaction record is
    /// missing one of its required fields.
    pub fn from_json_str(body: &str) -> Result<Self> {
        serde_json::from_str(body).wrap_err("failed to decode getBlock response")
    }

    /// Transactions carried by the block, empty when `result` or
    /// `result.transactions` is absent.
    pub fn transactions(&self) -> &[EncodedTransaction] {
        self.result
            .as_ref()
            .and_then(|result| result.transactions.as_deref())
            .unwrap_or_default()
    }
}

/// JSON-RPC error object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code (e.g. `-32007` for a skipped slot).
    pub code: i64,
    /// Human readable message.
    pub message: String,
}

/// Block payload inside a `getBlock` response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockResult {
    /// Estimated production time in unix seconds.
    pub block_time: Option<i64>,
    /// Slot of the parent block.
    pub parent_slot: Option<u64>,
    /// Full transaction records in block order.
    pub transactions: Option<Vec<EncodedTransaction>>,
}

/// One transaction with its execution metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncodedTransaction {
    /// Signed transaction body.
    pub transaction: TransactionPayload,
    /// Execution status and balance snapshots.
    pub meta: Option<TransactionMeta>,
}

impl EncodedTransaction {
    /// First signature, which identifies the transaction.
    pub fn signature(&self) -> Option<&str> {
        self.transaction.signatures.first().map(String::as_str)
    }

    /// Fee payer and primary signer (first static account key).
    pub fn signer(&self) -> Option<&str> {
        self.transaction
            .message
            .account_keys
            .first()
            .map(AccountKey::pubkey)
    }

    /// Account keys in resolution order.
    ///
    /// For versioned transactions the keys loaded from address lookup tables
    /// follow the static keys: writable first, then readonly.
    pub fn account_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .transaction
            .message
            .account_keys
            .iter()
            .map(AccountKey::pubkey)
            .collect();

        if let Some(loaded) = self.meta.as_ref().and_then(|m| m.loaded_addresses.as_ref()) {
            keys.extend(loaded.writable.iter().map(String::as_str));
            keys.extend(loaded.readonly.iter().map(String::as_str));
        }

        keys
    }
}

/// Signatures and message of a transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionPayload {
    /// Base58 signatures; the first one is the transaction id.
    pub signatures: Vec<String>,
    /// Compiled message.
    pub message: Message,
}

/// Compiled transaction message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Static account keys.
    pub account_keys: Vec<AccountKey>,
    /// Top-level instructions.
    pub instructions: Vec<Instruction>,
}

/// Account key entry.
///
/// `json` encoding returns bare strings, `jsonParsed` returns objects with a
/// `pubkey` field. Both decode to the same key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountKey {
    /// Plain base58 key.
    Plain(String),
    /// Parsed key object.
    Parsed {
        /// Base58 key.
        pubkey: String,
    },
}

impl AccountKey {
    /// Base58 key regardless of encoding.
    pub fn pubkey(&self) -> &str {
        match self {
            AccountKey::Plain(key) => key,
            AccountKey::Parsed { pubkey } => pubkey,
        }
    }
}

/// Top-level instruction. Only the invoked program is of interest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    /// Index of the program id in the account key list (`json` encoding).
    pub program_id_index: Option<usize>,
    /// Program id spelled out (`jsonParsed` encoding).
    pub program_id: Option<String>,
}

impl Instruction {
    /// Resolves the invoked program against the transaction's key list.
    pub fn program<'a>(&'a self, account_keys: &[&'a str]) -> Option<&'a str> {
        if let Some(program_id) = self.program_id.as_deref() {
            return Some(program_id);
        }
        self.program_id_index
            .and_then(|index| account_keys.get(index).copied())
    }
}

/// Execution metadata of a transaction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    /// Token balances before execution.
    pub pre_token_balances: Option<Vec<TokenBalance>>,
    /// Token balances after execution.
    pub post_token_balances: Option<Vec<TokenBalance>>,
    /// Keys loaded from address lookup tables (versioned transactions).
    pub loaded_addresses: Option<LoadedAddresses>,
}

/// Keys loaded from address lookup tables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

/// SPL token balance of one account at one point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    /// Index into the transaction's account key list.
    pub account_index: usize,
    /// Token mint address.
    pub mint: String,
    /// Owner of the token account, when reported.
    pub owner: Option<String>,
    /// Raw amount and precision.
    pub ui_token_amount: UiTokenAmount,
}

/// Raw token amount as reported by the node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UiTokenAmount {
    /// Integer amount in base units (decimal text).
    pub amount: String,
    /// Number of decimal places of the mint.
    pub decimals: u8,
}

/// One normalized trade by a signer through a monitored venue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEvent {
    /// Slot the transaction landed in.
    pub slot: u64,
    /// Transaction signature.
    pub signature: String,
    /// Fee payer / primary signer.
    pub signer: String,
    /// Monitored program the transaction invoked.
    pub program_id: String,
    /// Mint the signer gave up.
    pub from_mint: String,
    /// Mint the signer received.
    pub to_mint: String,
    /// Amount given up, scaled by mint decimals.
    pub from_amount: f64,
    /// Amount received, scaled by mint decimals.
    pub to_amount: f64,
}

/// Swaps extracted from a single slot, in transaction order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotSwaps {
    /// Slot number.
    pub slot: u64,
    /// Extracted swaps.
    pub swaps: Vec<SwapEvent>,
}
