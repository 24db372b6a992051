//! Report documents and aggregate statistics over a scanned range.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::validate::AnalyzedAttack;

/// Report document: `{ "total_mev_attacks": N, "mev_attacks": [...] }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MevReport<T> {
    pub total_mev_attacks: usize,
    pub mev_attacks: Vec<T>,
}

impl<T> MevReport<T> {
    pub fn new(mev_attacks: Vec<T>) -> Self {
        Self {
            total_mev_attacks: mev_attacks.len(),
            mev_attacks,
        }
    }
}

/// Aggregated statistics over scored attacks.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttackSummary {
    /// Number of scored attacks.
    pub attack_count: usize,
    /// Distinct attacker signers.
    pub unique_attackers: usize,
    /// Distinct victim signers.
    pub unique_victims: usize,
    /// Attacks with positive bot profit.
    pub profitable_count: usize,
    /// Sum of bot profit across attacks.
    pub total_bot_profit: f64,
    /// Mean ROI over attacks where ROI is defined.
    pub mean_roi: Option<f64>,
}

/// Aggregates summary statistics across scored attacks.
pub fn summarize(attacks: &[AnalyzedAttack]) -> AttackSummary {
    let unique_attackers: HashSet<&str> = attacks
        .iter()
        .map(|a| a.attack.front_run.signer.as_str())
        .collect();
    let unique_victims: HashSet<&str> = attacks
        .iter()
        .map(|a| a.attack.victim.signer.as_str())
        .collect();

    let rois: Vec<f64> = attacks.iter().filter_map(|a| a.analysis.roi).collect();
    let mean_roi = if rois.is_empty() {
        None
    } else {
        Some(rois.iter().sum::<f64>() / rois.len() as f64)
    };

    AttackSummary {
        attack_count: attacks.len(),
        unique_attackers: unique_attackers.len(),
        unique_victims: unique_victims.len(),
        profitable_count: attacks
            .iter()
            .filter(|a| a.analysis.bot_profit > 0.0)
            .count(),
        total_bot_profit: attacks.iter().map(|a| a.analysis.bot_profit).sum(),
        mean_roi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::CandidateAttack;
    use crate::validate::AttackAnalysis;
    use sandwich_data::SwapEvent;

    fn leg(signer: &str) -> SwapEvent {
        SwapEvent {
            slot: 1,
            signature: "sig".to_string(),
            signer: signer.to_string(),
            program_id: "prog".to_string(),
            from_mint: "X".to_string(),
            to_mint: "Y".to_string(),
            from_amount: 1.0,
            to_amount: 1.0,
        }
    }

    fn analyzed(attacker: &str, victim: &str, profit: f64, roi: Option<f64>) -> AnalyzedAttack {
        AnalyzedAttack {
            attack: CandidateAttack {
                attack_slots: [1, 2, 3],
                front_run: leg(attacker),
                victim: leg(victim),
                back_run: leg(attacker),
            },
            analysis: AttackAnalysis {
                bot_profit: profit,
                roi,
                front_price: None,
                back_price: None,
                price_impact_percent: None,
            },
        }
    }

    #[test]
    fn report_counts_its_attacks() {
        let report = MevReport::new(vec![1, 2, 3]);
        assert_eq!(report.total_mev_attacks, 3);

        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["total_mev_attacks"], 3);
        assert_eq!(value["mev_attacks"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn summarizes_attackers_victims_and_roi() {
        let attacks = vec![
            analyzed("bot1", "alice", 2.0, Some(1.2)),
            analyzed("bot1", "bob", -1.0, Some(0.8)),
            analyzed("bot2", "alice", 0.5, None),
        ];

        let summary = summarize(&attacks);
        assert_eq!(summary.attack_count, 3);
        assert_eq!(summary.unique_attackers, 2);
        assert_eq!(summary.unique_victims, 2);
        assert_eq!(summary.profitable_count, 2);
        assert!((summary.total_bot_profit - 1.5).abs() < 1e-12);
        assert!((summary.mean_roi.expect("mean roi") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_summary_has_no_mean_roi() {
        let summary = summarize(&[]);
        assert_eq!(summary.attack_count, 0);
        assert_eq!(summary.mean_roi, None);
        assert_eq!(summary.total_bot_profit, 0.0);
    }
}
