//! Sandwich detection over swap activity spanning many slots.
//!
//! # Ethical Context
//! Sandwich-pattern detection in this project is for historical analysis
//! only. It quantifies harmful order flow; nothing here submits
//! transactions.
//!
//! An attacker round trip is a pair of swaps by the same signer where the
//! second exactly reverses the mints of the first. Any swap by another
//! signer landing strictly between the two slots is a victim candidate.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::str::FromStr;

use eyre::eyre;
use sandwich_data::SwapEvent;
use serde::{Deserialize, Serialize};

/// Disclaimer shown alongside detector outputs.
pub const HEURISTIC_DISCLAIMER: &str =
    "Heuristic detection. Mints are compared, not priced; amounts across legs may be denominated differently.";

/// A front-run, victim, back-run triple.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateAttack {
    /// Slots of the front-run, victim and back-run.
    pub attack_slots: [u64; 3],
    /// Attacker's entry swap.
    pub front_run: SwapEvent,
    /// Swap by another signer between the two attacker legs.
    pub victim: SwapEvent,
    /// Attacker's exit swap, reversing the entry mints.
    pub back_run: SwapEvent,
}

/// Which intervening swaps are reported as victims of a round trip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VictimPolicy {
    /// First non-attacker swap by slot, then transaction order.
    #[default]
    Earliest,
    /// One candidate per non-attacker swap in the window.
    All,
    /// The swap with the largest `from_amount`; earliest wins ties.
    LargestByVolume,
}

impl FromStr for VictimPolicy {
    type Err = eyre::Report;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "earliest" => Ok(Self::Earliest),
            "all" => Ok(Self::All),
            "largest" | "largest-by-volume" => Ok(Self::LargestByVolume),
            other => Err(eyre!(
                "unknown victim policy '{other}'; use 'earliest', 'all', or 'largest'"
            )),
        }
    }
}

/// Detector settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Which intervening swaps become victims.
    pub victim_policy: VictimPolicy,
    /// Maximum slot distance between front-run and back-run. `None` keeps
    /// every pair in a signer's history.
    pub max_slot_window: Option<u64>,
}

fn is_round_trip(front: &SwapEvent, back: &SwapEvent) -> bool {
    let complete = [&front.from_mint, &front.to_mint, &back.from_mint, &back.to_mint]
        .iter()
        .all(|mint| !mint.is_empty());

    complete && front.from_mint == back.to_mint && front.to_mint == back.from_mint
}

fn select_victims<'a, I>(window: I, policy: VictimPolicy) -> Vec<&'a SwapEvent>
where
    I: Iterator<Item = &'a SwapEvent>,
{
    match policy {
        VictimPolicy::Earliest => window.take(1).collect(),
        VictimPolicy::All => window.collect(),
        VictimPolicy::LargestByVolume => window
            .fold(None::<&SwapEvent>, |best, event| match best {
                Some(current) if current.from_amount >= event.from_amount => Some(current),
                _ => Some(event),
            })
            .into_iter()
            .collect(),
    }
}

/// Detects sandwich candidates across the given swaps.
///
/// Swaps are ordered by slot (stable, so arrival order breaks ties), grouped
/// by signer, and every ordered pair of a signer's swaps that forms a round
/// trip is checked for victims in the slots strictly between them.
///
/// Intervening swaps are looked up through a slot-indexed map, so each
/// window costs a range query rather than a pass over all events.
pub fn detect_sandwiches(events: &[SwapEvent], config: &DetectorConfig) -> Vec<CandidateAttack> {
    let mut ordered: Vec<&SwapEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.slot);

    let mut by_slot: BTreeMap<u64, Vec<&SwapEvent>> = BTreeMap::new();
    for &event in &ordered {
        by_slot.entry(event.slot).or_default().push(event);
    }

    // Signer groups in order of first appearance; each group is slot-sorted.
    let mut group_ix: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&SwapEvent>)> = Vec::new();
    for &event in &ordered {
        let ix = *group_ix.entry(event.signer.as_str()).or_insert_with(|| {
            groups.push((event.signer.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[ix].1.push(event);
    }

    let mut out = Vec::new();
    for (attacker, swaps) in &groups {
        if swaps.len() < 2 {
            continue;
        }

        for (i, front) in swaps.iter().enumerate() {
            for back in &swaps[i + 1..] {
                if front.slot >= back.slot {
                    continue;
                }
                if let Some(window) = config.max_slot_window {
                    if back.slot - front.slot > window {
                        continue;
                    }
                }
                if !is_round_trip(front, back) {
                    continue;
                }

                let between = by_slot
                    .range((Bound::Excluded(front.slot), Bound::Excluded(back.slot)))
                    .flat_map(|(_, slot_events)| slot_events.iter().copied())
                    .filter(|event| event.signer != *attacker);

                for victim in select_victims(between, config.victim_policy) {
                    out.push(CandidateAttack {
                        attack_slots: [front.slot, victim.slot, back.slot],
                        front_run: (*front).clone(),
                        victim: victim.clone(),
                        back_run: (*back).clone(),
                    });
                }
            }
        }
    }

    tracing::debug!(
        events = events.len(),
        signers = groups.len(),
        candidates = out.len(),
        "sandwich detection finished"
    );
    out
}
