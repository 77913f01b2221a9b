// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_core::FakeClock;

struct Harness {
    gate: GovernanceGate<FakeClock>,
    clock: FakeClock,
    town: Town,
    _temp: tempfile::TempDir,
}

fn harness() -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let town = Town::new(temp.path());
    let clock = FakeClock::new();
    let gate = GovernanceGate::with_clock(town.clone(), clock.clone());
    Harness { gate, clock, town, _temp: temp }
}

fn write_health(town: &Town, score: f64) {
    std::fs::create_dir_all(town.governance_dir()).unwrap();
    std::fs::write(
        town.governance_dir().join("anchor_health.json"),
        serde_json::json!({"score": score, "checked_at_ms": 1}).to_string(),
    )
    .unwrap();
}

#[test]
fn default_mode_is_normal_and_allows_promotion() {
    let h = harness();
    assert_eq!(h.gate.current_mode().mode, "normal");
    h.gate.check_promotion_allowed().unwrap();
}

#[test]
fn freeze_blocks_promotion_with_reason() {
    let h = harness();
    h.gate.freeze_anchor("anchor drift detected").unwrap();

    let err = h.gate.check_promotion_allowed().unwrap_err();
    match err {
        GovernanceError::Frozen { reason } => assert_eq!(reason, "anchor drift detected"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn freeze_commits_mode_before_artifact() {
    let h = harness();
    let artifact = h.gate.freeze_anchor("drift").unwrap();

    // Both exist after the call; the artifact references the same freeze.
    assert!(h.gate.current_mode().is_frozen());
    let path = h
        .town
        .governance_dir()
        .join("anchor_freeze_artifacts")
        .join(format!("{}.json", artifact.id));
    let on_disk: FreezeArtifact =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(on_disk.reason, "drift");
}

#[test]
fn artifact_id_collisions_are_retried() {
    let h = harness();
    // Same clock tick for both freezes forces an id collision.
    h.clock.set_epoch_ms(777);
    let first = h.gate.freeze_anchor("one").unwrap();
    let second = h.gate.freeze_anchor("two").unwrap();
    assert_ne!(first.id, second.id);
}

#[test]
fn unfreeze_requires_frozen_state() {
    let h = harness();
    let err = h.gate.unfreeze_anchor("frz-x", "signed-off").unwrap_err();
    assert!(matches!(err, GovernanceError::NotFrozen));
}

#[test]
fn unfreeze_requires_artifact_linkage() {
    let h = harness();
    h.gate.freeze_anchor("drift").unwrap();
    write_health(&h.town, 1.0);

    let err = h.gate.unfreeze_anchor("frz-nonexistent", "signed-off").unwrap_err();
    assert!(matches!(err, GovernanceError::UnknownArtifact(_)));
}

#[test]
fn unfreeze_requires_attestation() {
    let h = harness();
    let artifact = h.gate.freeze_anchor("drift").unwrap();
    write_health(&h.town, 1.0);

    let err = h.gate.unfreeze_anchor(&artifact.id, "  ").unwrap_err();
    assert!(matches!(err, GovernanceError::MissingAttestation));
}

#[test]
fn unfreeze_revalidates_health() {
    let h = harness();
    let artifact = h.gate.freeze_anchor("drift").unwrap();

    // No snapshot at all.
    let err = h.gate.unfreeze_anchor(&artifact.id, "signed-off").unwrap_err();
    assert!(matches!(err, GovernanceError::HealthUnavailable));

    // Below threshold.
    write_health(&h.town, 0.5);
    let err = h.gate.unfreeze_anchor(&artifact.id, "signed-off").unwrap_err();
    assert!(matches!(err, GovernanceError::HealthBelowThreshold { .. }));

    // Passing.
    write_health(&h.town, 0.95);
    h.gate.unfreeze_anchor(&artifact.id, "signed-off").unwrap();
    assert_eq!(h.gate.current_mode().mode, "normal");
    h.gate.check_promotion_allowed().unwrap();
}

#[test]
fn journal_chains_and_verifies() {
    let h = harness();
    let artifact = h.gate.freeze_anchor("drift").unwrap();
    write_health(&h.town, 1.0);
    h.clock.advance(std::time::Duration::from_millis(10));
    h.gate.unfreeze_anchor(&artifact.id, "signed-off").unwrap();

    assert!(h.gate.verify_journal().unwrap());

    let journal = h.town.governance_dir().join("anchor_freeze_artifacts.jsonl");
    let raw = std::fs::read_to_string(&journal).unwrap();
    assert_eq!(raw.lines().count(), 2);

    // Tampering with any line breaks the chain.
    let tampered = raw.replace("drift", "clean");
    std::fs::write(&journal, tampered).unwrap();
    assert!(!h.gate.verify_journal().unwrap());
}

#[test]
fn empty_journal_verifies() {
    let h = harness();
    assert!(h.gate.verify_journal().unwrap());
}
