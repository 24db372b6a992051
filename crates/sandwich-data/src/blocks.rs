//! Solana JSON-RPC integration for fetching raw block data.
//!
//! Fetches full blocks slot by slot with `getBlock`, hands each response to
//! an extraction closure and records the resulting swaps in the store.

use eyre::{eyre, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::store::Store;
use crate::types::{BlockResponse, RpcError, SwapEvent};

/// Public mainnet endpoint used when no RPC URL is configured.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

const MAX_CONCURRENT_REQUESTS: usize = 10;
const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// JSON-RPC error codes meaning the slot will never produce a block:
/// skipped slot, and slot missing from long-term storage.
const PERMANENT_SLOT_ERROR_CODES: [i64; 2] = [-32007, -32009];

/// Counters for one `fetch_range` run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeFetchStats {
    /// Slots in the requested range.
    pub requested: u64,
    /// Slots skipped because the store already had them.
    pub already_stored: u64,
    /// Slots fetched and recorded in this run.
    pub fetched: u64,
    /// Slots that failed after all retries.
    pub failed: u64,
    /// Swaps extracted from the fetched slots.
    pub swaps: u64,
}

/// Outcome of one slot task.
struct FetchedSlot {
    slot: u64,
    swaps: Vec<SwapEvent>,
    rpc_error: Option<String>,
}

/// Fetches blocks from a Solana RPC endpoint.
#[derive(Clone)]
pub struct SlotFetcher {
    client: reqwest::Client,
    rpc_url: reqwest::Url,
}

impl SlotFetcher {
    /// Creates a fetcher for the given endpoint.
    ///
    /// No request is sent; the URL is only validated.
    ///
    /// # Errors
    /// Returns error if the URL does not parse, is not http(s), or the HTTP
    /// client cannot be built.
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: reqwest::Url = rpc_url.parse().wrap_err("invalid RPC URL format")?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(eyre!("unsupported RPC URL scheme '{}'", url.scheme()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .wrap_err("failed to build HTTP client")?;

        Ok(Self {
            client,
            rpc_url: url,
        })
    }

    /// Returns the latest finalized slot.
    ///
    /// # Errors
    /// Returns error if the request fails or the node answers with an error.
    #[tracing::instrument(skip(self), fields(rpc_url = %self.rpc_url))]
    pub async fn latest_slot(&self) -> Result<u64> {
        #[derive(Deserialize)]
        struct SlotResponse {
            result: Option<u64>,
            error: Option<RpcError>,
        }

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getSlot",
            "params": [{ "commitment": "finalized" }]
        });

        let response: SlotResponse = self
            .client
            .post(self.rpc_url.clone())
            .json(&body)
            .send()
            .await
            .wrap_err("getSlot request failed")?
            .error_for_status()
            .wrap_err("getSlot returned an HTTP error status")?
            .json()
            .await
            .wrap_err("failed to decode getSlot response")?;

        match (response.result, response.error) {
            (Some(slot), _) => {
                tracing::info!(latest_slot = slot, "resolved latest finalized slot");
                Ok(slot)
            }
            (None, Some(err)) => Err(eyre!("getSlot failed: {} (code {})", err.message, err.code)),
            (None, None) => Err(eyre!("getSlot returned neither result nor error")),
        }
    }

    /// Fetches one full block.
    ///
    /// A JSON-RPC error body is not an error here: it comes back as a
    /// [`BlockResponse`] with `error` set and no transactions.
    ///
    /// # Errors
    /// Returns error on transport failure, HTTP error status, or an
    /// undecodable body.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_block(&self, slot: u64) -> Result<BlockResponse> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getBlock",
            "params": [
                slot,
                {
                    "commitment": "finalized",
                    "encoding": "json",
                    "transactionDetails": "full",
                    "maxSupportedTransactionVersion": 0,
                    "rewards": false
                }
            ]
        });

        let text = self
            .client
            .post(self.rpc_url.clone())
            .json(&body)
            .send()
            .await
            .wrap_err_with(|| format!("getBlock request failed for slot {slot}"))?
            .error_for_status()
            .wrap_err_with(|| format!("getBlock returned an HTTP error status for slot {slot}"))?
            .text()
            .await
            .wrap_err_with(|| format!("failed to read getBlock body for slot {slot}"))?;

        let block = BlockResponse::from_json_str(&text)
            .wrap_err_with(|| format!("slot {slot}, body of {} bytes", text.len()))?;

        if let Some(err) = &block.error {
            tracing::debug!(slot, code = err.code, message = %err.message, "block unavailable");
        }

        Ok(block)
    }

    /// Fetches `[start, end]`, extracts swaps and records every slot in the store.
    ///
    /// `extractor` identifies the settings behind `extract` and is stored with
    /// each slot.
    ///
    /// - Skips slots the store already has for the same `extractor`
    /// - Limits to 10 concurrent RPC calls via `tokio::sync::Semaphore`
    /// - Retries failed slots up to 3 times with 500ms exponential backoff
    /// - Runs `extract` inside each fetch task so only swaps are kept in memory
    /// - Logs slots that still fail and continues with the rest of the range
    ///
    /// # Errors
    /// Returns error for an inverted range or a failing store operation.
    #[tracing::instrument(skip(self, store, extract))]
    pub async fn fetch_range<F>(
        &self,
        start: u64,
        end: u64,
        store: &Store,
        extractor: &str,
        extract: F,
    ) -> Result<RangeFetchStats>
    where
        F: Fn(u64, &BlockResponse) -> Vec<SwapEvent> + Send + Sync + 'static,
    {
        if start > end {
            return Err(eyre!("invalid slot range: {start} is greater than {end}"));
        }

        let mut stats = RangeFetchStats {
            requested: end - start + 1,
            ..RangeFetchStats::default()
        };

        let multi = MultiProgress::new();
        let slot_pb = multi.add(ProgressBar::new(stats.requested));
        let swap_pb = multi.add(ProgressBar::new_spinner());
        slot_pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} slots")
                .wrap_err("failed to create progress style")?,
        );
        swap_pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .wrap_err("failed to create progress style")?,
        );

        let mut to_fetch = Vec::new();
        for slot in start..=end {
            if store.is_slot_scanned(slot, extractor)? {
                stats.already_stored += 1;
                slot_pb.inc(1);
            } else {
                to_fetch.push(slot);
            }
        }

        tracing::info!(
            start,
            end,
            extractor,
            total_slots = stats.requested,
            slots_to_fetch = to_fetch.len(),
            "starting slot range fetch"
        );

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS));
        let extract = Arc::new(extract);
        let mut handles = Vec::with_capacity(to_fetch.len());

        for slot in to_fetch {
            let sem = semaphore.clone();
            let fetcher = self.clone();
            let extract = extract.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.ok();
                fetcher.fetch_with_retry(slot, extract.as_ref()).await
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(fetched)) => {
                    let count = store
                        .record_slot(
                            fetched.slot,
                            &fetched.swaps,
                            fetched.rpc_error.as_deref(),
                            extractor,
                        )
                        .wrap_err_with(|| format!("failed to record slot {}", fetched.slot))?;
                    stats.fetched += 1;
                    stats.swaps += count as u64;
                    swap_pb.set_message(format!("{} swaps extracted", stats.swaps));
                }
                Ok(Err((slot, e))) => {
                    tracing::error!(
                        slot,
                        attempts = MAX_ATTEMPTS,
                        "failed to fetch slot: {:#}",
                        e
                    );
                    stats.failed += 1;
                }
                Err(e) => {
                    tracing::error!("task join error: {}", e);
                    stats.failed += 1;
                }
            }
            slot_pb.inc(1);
        }

        slot_pb.finish_with_message("done");
        swap_pb.finish_with_message(format!("{} swaps extracted", stats.swaps));

        tracing::info!(
            fetched = stats.fetched,
            failed = stats.failed,
            already_stored = stats.already_stored,
            swaps = stats.swaps,
            "slot range fetch finished"
        );

        Ok(stats)
    }

    async fn fetch_with_retry<F>(
        &self,
        slot: u64,
        extract: &F,
    ) -> std::result::Result<FetchedSlot, (u64, eyre::Report)>
    where
        F: Fn(u64, &BlockResponse) -> Vec<SwapEvent>,
    {
        let mut attempt = 0;
        loop {
            let outcome = self.fetch_block(slot).await.and_then(|block| {
                let transient = block
                    .error
                    .as_ref()
                    .filter(|err| !PERMANENT_SLOT_ERROR_CODES.contains(&err.code))
                    .map(|err| {
                        eyre!(
                            "getBlock failed for slot {slot}: {} (code {})",
                            err.message,
                            err.code
                        )
                    });
                match transient {
                    Some(report) => Err(report),
                    None => Ok(block),
                }
            });

            match outcome {
                Ok(block) => {
                    let swaps = extract(slot, &block);
                    return Ok(FetchedSlot {
                        slot,
                        swaps,
                        rpc_error: block.error.map(|err| err.message),
                    });
                }
                Err(_) if attempt + 1 < MAX_ATTEMPTS => {
                    let backoff_ms = BASE_BACKOFF_MS * 2_u64.pow(attempt);
                    tracing::debug!(
                        slot,
                        attempt = attempt + 1,
                        backoff_ms,
                        "retrying failed slot fetch"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err((slot, e)),
            }
        }
    }
}
