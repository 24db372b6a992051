//! Shared test helpers and utilities.
//!
//! Builds raw `getBlock` payloads and normalized swap events with sensible
//! defaults so scenarios only spell out what they test.

#![allow(dead_code)]

use sandwich_analysis::extract::{ExtractorConfig, TargetPrograms};
use sandwich_data::store::Store;
use sandwich_data::{BlockResponse, SwapEvent};
use serde_json::{json, Value};

/// Raydium AMM v4, one of the default monitored venues.
pub const VENUE: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

/// Creates an in-memory SQLite Store for tests.
///
/// # Panics
/// Panics if the in-memory database cannot be created (should never happen).
pub fn test_store() -> Store {
    Store::new(":memory:").expect("in-memory store should always open")
}

/// Extractor config monitoring the default venues.
pub fn venue_config() -> ExtractorConfig {
    ExtractorConfig::new(TargetPrograms::default_venues())
}

/// One signer-owned token balance change: `(mint, pre_raw, post_raw, decimals)`.
pub type Leg<'a> = (&'a str, u64, u64, u8);

/// Creates a raw transaction record where `signer` invokes `program` and
/// owns one token account per leg.
///
/// Account keys are `[signer, pool, program, token accounts...]`, so the
/// instruction's `programIdIndex` is 2 and leg `i` sits at account index `3 + i`.
///
/// # Example
/// ```ignore
/// let tx = swap_tx("sig", "S1", VENUE, &[("X", 100, 40, 6), ("Y", 0, 9, 6)]);
/// ```
pub fn swap_tx(signature: &str, signer: &str, program: &str, legs: &[Leg<'_>]) -> Value {
    let balances = |post: bool| -> Vec<Value> {
        legs.iter()
            .enumerate()
            .map(|(i, (mint, pre_raw, post_raw, decimals))| {
                let amount = if post { post_raw } else { pre_raw };
                json!({
                    "accountIndex": 3 + i,
                    "mint": mint,
                    "owner": signer,
                    "uiTokenAmount": { "amount": amount.to_string(), "decimals": decimals }
                })
            })
            .collect()
    };

    let mut keys = vec![signer.to_string(), "pool".to_string(), program.to_string()];
    keys.extend((0..legs.len()).map(|i| format!("{signer}-ata-{i}")));

    json!({
        "transaction": {
            "signatures": [signature],
            "message": {
                "accountKeys": keys,
                "instructions": [{ "programIdIndex": 2, "accounts": [0, 1], "data": "" }]
            }
        },
        "meta": {
            "err": null,
            "fee": 5000,
            "preTokenBalances": balances(false),
            "postTokenBalances": balances(true)
        }
    })
}

/// Wraps transaction records into a `getBlock` response.
pub fn block_with(txs: Vec<Value>) -> BlockResponse {
    serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": { "blockTime": 1_750_000_000, "parentSlot": 0, "transactions": txs }
    }))
    .expect("block payload should decode")
}

/// Creates a SwapEvent with the given legs.
pub fn swap_event(
    slot: u64,
    signature: &str,
    signer: &str,
    from: (&str, f64),
    to: (&str, f64),
) -> SwapEvent {
    SwapEvent {
        slot,
        signature: signature.to_string(),
        signer: signer.to_string(),
        program_id: VENUE.to_string(),
        from_mint: from.0.to_string(),
        to_mint: to.0.to_string(),
        from_amount: from.1,
        to_amount: to.1,
    }
}
