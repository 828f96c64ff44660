//! Golden wire-contract tests for the `/dedupe` endpoint.
//!
//! The golden files mirror what the matching service actually emits. If the
//! parser stops accepting them, the client no longer talks to the service.

use dedupe_client::{parse_response, DedupRequest, DedupResponse, Upload};
use dedupe_core::{Answer, ClusterId, TrainingPair};

fn load_golden(name: &str) -> serde_json::Value {
    let path = format!("{}/tests/golden/{}", env!("CARGO_MANIFEST_DIR"), name);
    serde_json::from_str(
        &std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Cannot read {}: {}", path, e)),
    )
    .unwrap_or_else(|e| panic!("Cannot parse {}: {}", path, e))
}

#[test]
fn golden_needs_training_pairs_parse_in_both_shapes() {
    let resp = parse_response(load_golden("needs-training.json")).unwrap();
    let DedupResponse::NeedsTraining(raw) = resp else {
        panic!("expected needs_training");
    };
    assert_eq!(raw.len(), 3);

    let pairs: Vec<TrainingPair> = raw
        .into_iter()
        .map(|p| TrainingPair::from_wire(p).unwrap())
        .collect();
    assert_eq!(pairs[0].left["Customer"], "200087");
    assert_eq!(pairs[1].right["City"], serde_json::Value::Null);
    assert_eq!(pairs[2].right["Name 1"], "tesco stores");
}

#[test]
fn golden_duplicates_parse() {
    let resp = parse_response(load_golden("duplicates.json")).unwrap();
    let DedupResponse::Groups(groups) = resp else {
        panic!("expected groups");
    };

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].cluster_id, ClusterId(15));
    assert_eq!(groups[0].cluster_id.display_number(), 16);
    assert_eq!(groups[1].members.len(), 3);

    let first = &groups[0].members[0];
    assert_eq!(first.id.index, 184);
    assert_eq!(first.id.source_file, "KNA2.xlsx");
    assert!(first.get("record_id").is_none());
    assert!(first.get("confidence_score").is_none());
    assert_eq!(first.get("Name 2").unwrap(), "N/A");
}

#[test]
fn training_payload_echoes_pairs_verbatim() {
    let DedupResponse::NeedsTraining(raw) =
        parse_response(load_golden("needs-training.json")).unwrap()
    else {
        panic!("expected needs_training");
    };
    let original = raw[0].clone();
    let labeled = TrainingPair::from_wire(original.clone())
        .unwrap()
        .with_answer(Answer::Yes);

    let req = DedupRequest::new(
        Upload::new("KNA2.csv", Vec::new()),
        vec!["Name 1".into(), "City".into()],
        Some(vec![labeled]),
        false,
    )
    .unwrap();

    let sent: serde_json::Value = serde_json::from_str(&req.training_data_json()).unwrap();
    assert_eq!(sent[0]["0"], original["0"]);
    assert_eq!(sent[0]["1"], original["1"]);
    assert_eq!(sent[0]["answer"], "y");
}
