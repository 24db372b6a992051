//! Spacing validation and economic scoring of sandwich candidates.
//!
//! Only tight sandwiches survive: the back-run lands exactly two slots after
//! the front-run, leaving one slot for the victim. Surviving triples get
//! profit, ROI and price-impact figures.
//!
//! The figures subtract and divide amounts read from different legs without
//! any price normalization, so they are only meaningful when the attacker
//! enters and exits through the same quote asset.

use serde::{Deserialize, Serialize};

use crate::detect::CandidateAttack;
use crate::summary::MevReport;

/// Required slot distance between front-run and back-run.
pub const TIGHT_SANDWICH_SLOT_GAP: u64 = 2;

/// Scoring block attached to a validated attack. Ratios whose denominator
/// is zero are `None` and serialize as `null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackAnalysis {
    /// `backRun.toAmount - frontRun.fromAmount`.
    pub bot_profit: f64,
    /// `backRun.toAmount / frontRun.fromAmount`.
    #[serde(rename = "ROI")]
    pub roi: Option<f64>,
    /// `frontRun.fromAmount / frontRun.toAmount`.
    pub front_price: Option<f64>,
    /// `backRun.toAmount / backRun.fromAmount`.
    pub back_price: Option<f64>,
    /// Relative move from front price to back price, in percent.
    pub price_impact_percent: Option<f64>,
}

/// A tight sandwich with its scoring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedAttack {
    #[serde(flatten)]
    pub attack: CandidateAttack,
    pub analysis: AttackAnalysis,
}

/// Returns whether the back-run lands exactly [`TIGHT_SANDWICH_SLOT_GAP`]
/// slots after the front-run.
pub fn is_tight_sandwich(attack: &CandidateAttack) -> bool {
    let [front, _, back] = attack.attack_slots;
    front.checked_add(TIGHT_SANDWICH_SLOT_GAP) == Some(back)
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}

/// Computes profit and price metrics for one triple.
pub fn score_attack(attack: &CandidateAttack) -> AttackAnalysis {
    let front = &attack.front_run;
    let back = &attack.back_run;

    let front_price = ratio(front.from_amount, front.to_amount);
    let back_price = ratio(back.to_amount, back.from_amount);

    let price_impact_percent = match (front_price, back_price) {
        (Some(fp), Some(bp)) if fp != 0.0 && bp != 0.0 => Some((bp - fp) / fp * 100.0),
        _ => None,
    };

    AttackAnalysis {
        bot_profit: back.to_amount - front.from_amount,
        roi: ratio(back.to_amount, front.from_amount),
        front_price,
        back_price,
        price_impact_percent,
    }
}

/// Keeps the tight sandwiches among `candidates` and scores them.
pub fn validate_attacks(candidates: &[CandidateAttack]) -> MevReport<AnalyzedAttack> {
    let analyzed: Vec<AnalyzedAttack> = candidates
        .iter()
        .filter(|attack| is_tight_sandwich(attack))
        .map(|attack| AnalyzedAttack {
            attack: attack.clone(),
            analysis: score_attack(attack),
        })
        .collect();

    tracing::debug!(
        candidates = candidates.len(),
        tight = analyzed.len(),
        "validated sandwich candidates"
    );
    MevReport::new(analyzed)
}
