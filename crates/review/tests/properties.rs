// Property-based tests for finish gating, cursor, selection and export.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::json;

use dedupe_config::TrainingSettings;
use dedupe_core::{
    Answer, ClusterId, DatasetLedger, DuplicateGroup, Fields, Record, RecordId, SelectionLedger,
    SourceRows,
};
use dedupe_review::{build_export, ReviewSession, SortOrder, TrainingSession};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn answer() -> impl Strategy<Value = Answer> {
    prop_oneof![Just(Answer::Yes), Just(Answer::No), Just(Answer::Unsure)]
}

fn signal_answer() -> impl Strategy<Value = Answer> {
    prop_oneof![Just(Answer::Yes), Just(Answer::No)]
}

#[derive(Debug, Clone)]
enum NavOp {
    Next,
    Previous,
    Skip,
    Unskip,
    Sort(SortOrder),
}

fn nav_op() -> impl Strategy<Value = NavOp> {
    prop_oneof![
        4 => Just(NavOp::Next),
        3 => Just(NavOp::Previous),
        1 => Just(NavOp::Skip),
        1 => Just(NavOp::Unskip),
        1 => prop_oneof![
            Just(SortOrder::ConfidenceDesc),
            Just(SortOrder::ConfidenceAsc),
            Just(SortOrder::ClusterId),
        ]
        .prop_map(NavOp::Sort),
    ]
}

fn batch(n: usize) -> Vec<serde_json::Value> {
    (0..n)
        .map(|i| json!({"0": {"k": i}, "1": {"k": i + 1}}))
        .collect()
}

/// Groups with unique member ids; sizes and scores vary.
fn result_set() -> impl Strategy<Value = Vec<DuplicateGroup>> {
    prop::collection::vec((1usize..5, 0u32..=100), 1..8).prop_map(|specs| {
        let mut next = 0usize;
        specs
            .into_iter()
            .enumerate()
            .map(|(cluster, (size, score))| {
                let members = (0..size)
                    .map(|_| {
                        let mut fields = Fields::new();
                        fields.insert("name".into(), json!(format!("n{next}")));
                        fields.insert("note".into(), json!("a,b\"c"));
                        let record = Record::new(RecordId::new(next, "data.csv"), fields);
                        next += 1;
                        record
                    })
                    .collect();
                DuplicateGroup::new(ClusterId(cluster as u64), score as f64 / 100.0, members)
            })
            .collect()
    })
}

fn ledger_for(groups: &[DuplicateGroup]) -> DatasetLedger {
    let rows = groups.iter().map(|g| g.len()).sum::<usize>();
    DatasetLedger::from_sources(vec![SourceRows::new("data.csv", vec![Fields::new(); rows])])
}

fn exported_ids(groups: &[DuplicateGroup], exclude: &BTreeSet<RecordId>) -> Vec<String> {
    let text = build_export(groups, &ledger_for(groups), exclude).to_csv().unwrap();
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers().unwrap().clone();
    let id_col = headers.iter().position(|h| h == "record_id").unwrap();
    reader
        .records()
        .map(|r| r.unwrap()[id_col].to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    /// Finish is offered iff yes >= 2, no >= 2 and yes + no >= 15.
    #[test]
    fn finish_gating_iff(labels in prop::collection::vec(signal_answer(), 10..40)) {
        let settings = TrainingSettings::default();
        let mut session = TrainingSession::start(batch(labels.len()), &settings).unwrap();
        let (mut yes, mut no) = (0usize, 0usize);
        for label in labels {
            session.record_response(label).unwrap();
            match label {
                Answer::Yes => yes += 1,
                _ => no += 1,
            }
            prop_assert_eq!(
                session.can_finish(),
                yes >= 2 && no >= 2 && yes + no >= 15
            );
        }
    }

    /// Unsure answers never move the gate.
    #[test]
    fn unsure_is_neutral(labels in prop::collection::vec(answer(), 10..40)) {
        let settings = TrainingSettings::default();
        let mut session = TrainingSession::start(batch(labels.len()), &settings).unwrap();
        for label in &labels {
            session.record_response(*label).unwrap();
        }
        let signal: Vec<Answer> = labels.iter().copied().filter(|a| a.is_signal()).collect();
        let yes = signal.iter().filter(|a| **a == Answer::Yes).count();
        let no = signal.len() - yes;
        prop_assert_eq!(session.can_finish(), yes >= 2 && no >= 2 && signal.len() >= 15);
        prop_assert_eq!(session.labeled_pairs().len(), signal.len());
    }

    /// The high-water mark never decreases, and bounds the cursor.
    #[test]
    fn max_visited_is_monotonic(groups in result_set(), ops in prop::collection::vec(nav_op(), 0..64)) {
        let mut review = ReviewSession::new(groups).unwrap();
        let mut last = review.max_visited();
        for op in ops {
            match op {
                NavOp::Next => review.next(),
                NavOp::Previous => review.previous(),
                NavOp::Skip => review.skip(),
                NavOp::Unskip => review.unskip(),
                NavOp::Sort(order) => review.set_sort(order),
            }
            prop_assert!(review.max_visited() >= last);
            prop_assert!(review.current_index() < review.len());
            last = review.max_visited();
        }
    }

    /// No cluster ever maps to an empty removal set, whatever mix of
    /// single toggles and bulk selection is applied.
    #[test]
    fn selection_never_holds_empty_sets(
        groups in result_set(),
        ops in prop::collection::vec((0usize..8, 0usize..5, any::<bool>(), any::<bool>()), 0..48),
    ) {
        let mut ledger = SelectionLedger::new();
        for (g, m, selected, bulk) in ops {
            if bulk && g == 0 {
                ledger.select_all_except_first(&groups);
            } else if let Some(group) = groups.get(g % groups.len()) {
                if let Some(member) = group.members.get(m % group.len()) {
                    ledger.toggle(group.cluster_id, member, selected);
                }
            }
            prop_assert!(ledger.holds_no_empty_sets());
        }
    }

    /// Exporting with a set S and with its complement partitions the members.
    #[test]
    fn export_partitions_members(groups in result_set(), picks in prop::collection::vec(any::<bool>(), 32)) {
        let all: Vec<RecordId> = groups.iter().flat_map(|g| g.members.iter().map(|m| m.id.clone())).collect();
        let left: BTreeSet<RecordId> = all
            .iter()
            .enumerate()
            .filter(|(i, _)| picks[i % picks.len()])
            .map(|(_, id)| id.clone())
            .collect();
        let right: BTreeSet<RecordId> = all.iter().filter(|id| !left.contains(*id)).cloned().collect();

        let kept_a = exported_ids(&groups, &left);
        let kept_b = exported_ids(&groups, &right);

        let a: BTreeSet<&String> = kept_a.iter().collect();
        let b: BTreeSet<&String> = kept_b.iter().collect();
        prop_assert!(a.is_disjoint(&b));
        prop_assert_eq!(a.len() + b.len(), all.len());

        let full = exported_ids(&groups, &BTreeSet::new());
        prop_assert_eq!(full.len(), all.len());
        let everything: BTreeSet<RecordId> = all.iter().cloned().collect();
        prop_assert!(exported_ids(&groups, &everything).is_empty());
    }
}
