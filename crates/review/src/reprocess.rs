//! Pairs inferred from review decisions.
//!
//! Within a reviewed group every kept member matches every other kept
//! member, and no removed member matches a kept one. Pairs between two
//! removed members say nothing and are not emitted.

use dedupe_core::{Answer, DuplicateGroup, SelectionLedger, TrainingPair};

/// Derive labeled pairs from processed groups, in group order:
/// all kept×kept matches of a group, then its kept×removed non-matches.
pub fn derive_pairs<'a>(
    processed: impl IntoIterator<Item = &'a DuplicateGroup>,
    selection: &SelectionLedger,
) -> Vec<TrainingPair> {
    let mut pairs = Vec::new();

    for group in processed {
        let (removed, kept): (Vec<_>, Vec<_>) = group
            .members
            .iter()
            .partition(|m| selection.is_selected(group.cluster_id, &m.id));

        for (i, a) in kept.iter().enumerate() {
            for b in &kept[i + 1..] {
                pairs.push(TrainingPair::labeled(a.to_wire(), b.to_wire(), Answer::Yes));
            }
        }
        for k in &kept {
            for r in &removed {
                pairs.push(TrainingPair::labeled(k.to_wire(), r.to_wire(), Answer::No));
            }
        }
    }

    pairs
}
