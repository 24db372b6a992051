//! Swap extraction from raw block data.
//!
//! A transaction is a swap when it invokes a monitored program and its
//! signer both gave up one token and received another, as seen in the
//! pre/post token balance snapshots of signer-owned token accounts.
//! Everything else (fee-only transfers, account creation, liquidity moves
//! that only go one way) is dropped.

use std::collections::{HashMap, HashSet};

use sandwich_data::types::{BlockResponse, EncodedTransaction, TokenBalance, TransactionMeta};
use sandwich_data::SwapEvent;

/// AMM programs monitored when no explicit set is configured.
pub const DEFAULT_VENUE_PROGRAMS: [(&str, &str); 6] = [
    ("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8", "Raydium AMM v4"),
    ("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P", "Pump.fun"),
    ("cpamdpZCGKUy5JxQXB4dcpGPiikHawvSWAd6mEn1sGG", "Meteora DAMM v2"),
    ("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc", "Orca Whirlpool"),
    ("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA", "Pump.fun AMM"),
    ("CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK", "Raydium CLMM"),
];

/// Display name of a built-in venue program.
pub fn venue_name(program_id: &str) -> Option<&'static str> {
    DEFAULT_VENUE_PROGRAMS
        .iter()
        .find(|(id, _)| *id == program_id)
        .map(|(_, name)| *name)
}

/// Set of program ids treated as monitored venues. Matching is exact.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetPrograms {
    ids: HashSet<String>,
}

impl TargetPrograms {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// The built-in venue list, see [`DEFAULT_VENUE_PROGRAMS`].
    pub fn default_venues() -> Self {
        Self::new(DEFAULT_VENUE_PROGRAMS.iter().map(|(id, _)| *id))
    }

    pub fn contains(&self, program_id: &str) -> bool {
        self.ids.contains(program_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Program ids in lexical order.
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// How to resolve a transaction that moves more than one signer-owned
/// balance in the same direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MultiLegPolicy {
    /// The last negative and last positive delta (in pre-balance order)
    /// become the inbound and outbound legs.
    #[default]
    LastWins,
    /// Multi-leg transactions are not swaps.
    Reject,
}

impl MultiLegPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastWins => "last-wins",
            Self::Reject => "reject",
        }
    }
}

/// Extractor settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Monitored programs.
    pub targets: TargetPrograms,
    /// Multi-leg resolution.
    pub multi_leg: MultiLegPolicy,
}

impl ExtractorConfig {
    pub fn new(targets: TargetPrograms) -> Self {
        Self {
            targets,
            multi_leg: MultiLegPolicy::default(),
        }
    }

    /// Stable identifier of these settings: the multi-leg policy followed by
    /// the sorted program ids, e.g. `last-wins:675k...,whirL...`.
    ///
    /// Configs with equal fingerprints extract the same swaps from any block.
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.multi_leg.as_str(), self.targets.sorted_ids().join(","))
    }
}

/// Signed raw balance change on one signer-owned token account.
#[derive(Clone, Copy, Debug, PartialEq)]
struct BalanceDelta<'a> {
    mint: &'a str,
    delta: i128,
    decimals: u8,
}

impl BalanceDelta<'_> {
    fn scaled_magnitude(&self) -> f64 {
        self.delta.unsigned_abs() as f64 / 10_f64.powi(i32::from(self.decimals))
    }
}

/// Extracts the swaps of one block, in transaction order.
///
/// A block without `result` or `result.transactions` yields no swaps.
pub fn extract_swaps(slot: u64, block: &BlockResponse, config: &ExtractorConfig) -> Vec<SwapEvent> {
    let transactions = block.transactions();
    let swaps: Vec<SwapEvent> = transactions
        .iter()
        .filter_map(|tx| extract_swap(slot, tx, config))
        .collect();

    tracing::debug!(
        slot,
        transactions = transactions.len(),
        swaps = swaps.len(),
        "extracted swaps from block"
    );
    swaps
}

/// Classifies a single transaction, returning `Some` only for a swap
/// through a monitored program.
pub fn extract_swap(
    slot: u64,
    tx: &EncodedTransaction,
    config: &ExtractorConfig,
) -> Option<SwapEvent> {
    let account_keys = tx.account_keys();
    let program_id = tx
        .transaction
        .message
        .instructions
        .iter()
        .filter_map(|ix| ix.program(&account_keys))
        .find(|program| config.targets.contains(program))?;

    let signer = tx.signer()?;
    let signature = tx.signature()?;
    let meta = tx.meta.as_ref()?;

    let deltas = signer_deltas(signer, meta);

    let mut inbound: Option<BalanceDelta<'_>> = None;
    let mut outbound: Option<BalanceDelta<'_>> = None;
    let (mut negatives, mut positives) = (0_usize, 0_usize);
    for delta in deltas {
        if delta.delta < 0 {
            inbound = Some(delta);
            negatives += 1;
        } else {
            outbound = Some(delta);
            positives += 1;
        }
    }

    if config.multi_leg == MultiLegPolicy::Reject && (negatives > 1 || positives > 1) {
        tracing::trace!(signature, negatives, positives, "rejecting multi-leg transaction");
        return None;
    }

    let (inbound, outbound) = (inbound?, outbound?);
    if inbound.mint == outbound.mint {
        tracing::trace!(signature, mint = inbound.mint, "in and out legs share a mint");
        return None;
    }

    Some(SwapEvent {
        slot,
        signature: signature.to_string(),
        signer: signer.to_string(),
        program_id: program_id.to_string(),
        from_mint: inbound.mint.to_string(),
        to_mint: outbound.mint.to_string(),
        from_amount: inbound.scaled_magnitude(),
        to_amount: outbound.scaled_magnitude(),
    })
}

/// Non-zero balance changes on token accounts owned by `signer`, in
/// pre-balance order. Keys missing from either snapshot are skipped, as
/// are entries whose amount does not parse.
fn signer_deltas<'a>(signer: &str, meta: &'a TransactionMeta) -> Vec<BalanceDelta<'a>> {
    let pre = meta.pre_token_balances.as_deref().unwrap_or_default();
    let post = meta.post_token_balances.as_deref().unwrap_or_default();

    let post_by_key: HashMap<(usize, &str), &TokenBalance> = post
        .iter()
        .map(|balance| ((balance.account_index, balance.mint.as_str()), balance))
        .collect();

    let mut seen: HashSet<(usize, &str)> = HashSet::new();
    let mut deltas = Vec::new();

    for pre_balance in pre {
        let key = (pre_balance.account_index, pre_balance.mint.as_str());
        if !seen.insert(key) {
            continue;
        }

        let Some(post_balance) = post_by_key.get(&key) else {
            continue;
        };

        let owner = pre_balance
            .owner
            .as_deref()
            .or(post_balance.owner.as_deref());
        if owner != Some(signer) {
            continue;
        }

        let (Ok(pre_amount), Ok(post_amount)) = (
            pre_balance.ui_token_amount.amount.parse::<i128>(),
            post_balance.ui_token_amount.amount.parse::<i128>(),
        ) else {
            tracing::trace!(
                account_index = key.0,
                mint = key.1,
                "skipping unparsable token amount"
            );
            continue;
        };

        let delta = post_amount - pre_amount;
        if delta != 0 {
            deltas.push(BalanceDelta {
                mint: key.1,
                delta,
                decimals: pre_balance.ui_token_amount.decimals,
            });
        }
    }

    deltas
}
