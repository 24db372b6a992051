//! End-to-end tests for extraction, detection and validation over raw
//! block payloads.

mod common;

use common::{block_with, swap_event, swap_tx, venue_config, VENUE};
use sandwich_analysis::detect::{detect_sandwiches, DetectorConfig, VictimPolicy};
use sandwich_analysis::extract::extract_swaps;
use sandwich_analysis::validate::validate_attacks;
use sandwich_data::{BlockResponse, SwapEvent};

/// Extracts the swaps of `(slot, block)` pairs in slot order.
fn extract_all(blocks: &[(u64, BlockResponse)]) -> Vec<SwapEvent> {
    let config = venue_config();
    blocks
        .iter()
        .flat_map(|(slot, block)| extract_swaps(*slot, block, &config))
        .collect()
}

/// S1 buys Y with X at 100, S2 trades Y for Z at 101, S1 sells Y back for
/// X at `back_slot`.
fn sandwich_blocks(back_slot: u64) -> Vec<(u64, BlockResponse)> {
    vec![
        (
            100,
            block_with(vec![swap_tx(
                "front",
                "S1",
                VENUE,
                &[("X", 10_000_000, 0, 6), ("Y", 0, 100_000_000, 6)],
            )]),
        ),
        (
            101,
            block_with(vec![swap_tx(
                "victim",
                "S2",
                VENUE,
                &[("Y", 50_000_000, 0, 6), ("Z", 0, 7_000_000, 6)],
            )]),
        ),
        (
            back_slot,
            block_with(vec![swap_tx(
                "back",
                "S1",
                VENUE,
                &[("Y", 100_000_000, 0, 6), ("X", 0, 12_000_000, 6)],
            )]),
        ),
    ]
}

#[test]
fn scaled_swap_from_signer_deltas() {
    let block = block_with(vec![swap_tx(
        "sigA",
        "trader",
        VENUE,
        &[("X", 250_000, 150_000, 6), ("Y", 10_000, 60_000, 6)],
    )]);

    let swaps = extract_swaps(100, &block, &venue_config());
    assert_eq!(swaps.len(), 1);

    let swap = &swaps[0];
    assert_eq!(swap.slot, 100);
    assert_eq!(swap.signature, "sigA");
    assert_eq!(swap.signer, "trader");
    assert_eq!(swap.program_id, VENUE);
    assert_eq!(swap.from_mint, "X");
    assert_eq!(swap.to_mint, "Y");
    assert!((swap.from_amount - 0.1).abs() < 1e-12);
    assert!((swap.to_amount - 0.05).abs() < 1e-12);
}

#[test]
fn unmonitored_program_yields_nothing() {
    let block = block_with(vec![swap_tx(
        "sig",
        "trader",
        "11111111111111111111111111111111",
        &[("X", 200, 100, 0), ("Y", 0, 50, 0)],
    )]);

    assert!(extract_swaps(7, &block, &venue_config()).is_empty());
}

#[test]
fn missing_result_yields_empty_sequence() {
    let errored: BlockResponse = serde_json::from_value(serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": -32007, "message": "Slot 5 was skipped" }
    }))
    .expect("error payload should decode");
    let empty: BlockResponse = serde_json::from_value(serde_json::json!({ "result": {} }))
        .expect("empty result should decode");

    assert!(extract_swaps(5, &errored, &venue_config()).is_empty());
    assert!(extract_swaps(5, &empty, &venue_config()).is_empty());
}

#[test]
fn tight_sandwich_detected_and_scored() {
    let swaps = extract_all(&sandwich_blocks(102));
    assert_eq!(swaps.len(), 3);

    let candidates = detect_sandwiches(&swaps, &DetectorConfig::default());
    assert_eq!(candidates.len(), 1);

    let attack = &candidates[0];
    assert_eq!(attack.attack_slots, [100, 101, 102]);
    assert_eq!(attack.front_run, swaps[0]);
    assert_eq!(attack.victim, swaps[1]);
    assert_eq!(attack.back_run, swaps[2]);

    let report = validate_attacks(&candidates);
    assert_eq!(report.total_mev_attacks, 1);

    // front: 10 X -> 100 Y, back: 100 Y -> 12 X
    let analysis = &report.mev_attacks[0].analysis;
    assert!((analysis.bot_profit - 2.0).abs() < 1e-9);
    assert!((analysis.roi.expect("roi defined") - 1.2).abs() < 1e-9);
    assert!((analysis.front_price.expect("front price") - 0.1).abs() < 1e-9);
    assert!((analysis.back_price.expect("back price") - 0.12).abs() < 1e-9);
    assert!((analysis.price_impact_percent.expect("impact") - 20.0).abs() < 1e-6);
}

#[test]
fn wide_sandwich_is_candidate_but_not_scored() {
    let swaps = extract_all(&sandwich_blocks(105));

    let candidates = detect_sandwiches(&swaps, &DetectorConfig::default());
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].attack_slots, [100, 101, 105]);

    let report = validate_attacks(&candidates);
    assert_eq!(report.total_mev_attacks, 0);
    assert!(report.mev_attacks.is_empty());
}

#[test]
fn zero_entry_amount_leaves_roi_absent() {
    let candidates = detect_sandwiches(
        &[
            swap_event(10, "f", "bot", ("SOL", 0.0), ("TOK", 5.0)),
            swap_event(11, "v", "user", ("SOL", 1.0), ("TOK", 0.9)),
            swap_event(12, "b", "bot", ("TOK", 5.0), ("SOL", 3.0)),
        ],
        &DetectorConfig::default(),
    );

    let report = validate_attacks(&candidates);
    assert_eq!(report.total_mev_attacks, 1);

    let analysis = &report.mev_attacks[0].analysis;
    assert!((analysis.bot_profit - 3.0).abs() < 1e-12);
    assert_eq!(analysis.roi, None);

    let json = serde_json::to_value(&report).expect("serialize report");
    assert!(json["mev_attacks"][0]["analysis"]["ROI"].is_null());
}

#[test]
fn victim_policy_controls_reported_victims() {
    let swaps = vec![
        swap_event(100, "f", "bot", ("SOL", 10.0), ("TOK", 100.0)),
        swap_event(101, "v1", "alice", ("SOL", 1.0), ("TOK", 9.0)),
        swap_event(101, "v2", "bob", ("SOL", 4.0), ("TOK", 30.0)),
        swap_event(102, "b", "bot", ("TOK", 100.0), ("SOL", 11.0)),
    ];

    let earliest = detect_sandwiches(&swaps, &DetectorConfig::default());
    assert_eq!(earliest.len(), 1);
    assert_eq!(earliest[0].victim.signature, "v1");

    let all = detect_sandwiches(
        &swaps,
        &DetectorConfig {
            victim_policy: VictimPolicy::All,
            ..DetectorConfig::default()
        },
    );
    let victims: Vec<&str> = all.iter().map(|a| a.victim.signature.as_str()).collect();
    assert_eq!(victims, vec!["v1", "v2"]);

    let largest = detect_sandwiches(
        &swaps,
        &DetectorConfig {
            victim_policy: VictimPolicy::LargestByVolume,
            ..DetectorConfig::default()
        },
    );
    assert_eq!(largest.len(), 1);
    assert_eq!(largest[0].victim.signature, "v2");
}

#[test]
fn pipeline_outputs_hold_their_invariants() {
    let mut blocks = sandwich_blocks(102);
    blocks.push((
        103,
        block_with(vec![
            swap_tx("noise1", "S3", VENUE, &[("Z", 9_000, 1_000, 3), ("X", 0, 4_000, 3)]),
            swap_tx("noise2", "S2", VENUE, &[("Z", 7_000_000, 0, 6), ("Y", 0, 45_000_000, 6)]),
        ]),
    ));
    blocks.push((
        108,
        block_with(vec![swap_tx(
            "exit",
            "S3",
            VENUE,
            &[("X", 4_000, 0, 3), ("Z", 1_000, 8_500, 3)],
        )]),
    ));

    let swaps = extract_all(&blocks);
    for swap in &swaps {
        assert_ne!(swap.from_mint, swap.to_mint);
        assert!(swap.from_amount >= 0.0);
        assert!(swap.to_amount >= 0.0);
    }

    let config = DetectorConfig {
        victim_policy: VictimPolicy::All,
        max_slot_window: None,
    };
    let candidates = detect_sandwiches(&swaps, &config);
    assert!(!candidates.is_empty());

    for attack in &candidates {
        let [front, victim, back] = attack.attack_slots;
        assert!(front < victim && victim < back);
        assert_eq!(attack.front_run.signer, attack.back_run.signer);
        assert_ne!(attack.victim.signer, attack.front_run.signer);
        assert_eq!(attack.front_run.from_mint, attack.back_run.to_mint);
        assert_eq!(attack.front_run.to_mint, attack.back_run.from_mint);
    }

    let report = validate_attacks(&candidates);
    assert_eq!(report.total_mev_attacks, report.mev_attacks.len());
    for analyzed in &report.mev_attacks {
        assert!(candidates.contains(&analyzed.attack));
        let [front, _, back] = analyzed.attack.attack_slots;
        assert_eq!(back, front + 2);
    }
}
