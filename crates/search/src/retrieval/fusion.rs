//! Best-score fusion for ensemble results
//!
//! Scores from the four indexes share one similarity scale, so they are
//! compared directly instead of being rank-fused:
//! - An entity seen by several indexes keeps its best hit. Identity is
//!   category plus id, since ids repeat across categories
//! - Order is descending score, then index priority, then entity id
//! - The list is cut to `k`

use graphqa_common::models::{Candidate, EntityKey};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Merge per-index hit lists into one ranked candidate list
pub fn merge(results: Vec<Vec<Candidate>>, k: usize) -> Vec<Candidate> {
    let mut best: HashMap<EntityKey, Candidate> = HashMap::new();

    for candidate in results.into_iter().flatten() {
        match best.get_mut(&candidate.key()) {
            Some(existing) => {
                if rank(&candidate, existing) == Ordering::Less {
                    *existing = candidate;
                }
            }
            None => {
                best.insert(candidate.key(), candidate);
            }
        }
    }

    let mut merged: Vec<Candidate> = best.into_values().collect();
    merged.sort_by(rank);
    merged.truncate(k);
    merged
}

/// `Less` means `a` ranks ahead of `b`
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.source.priority().cmp(&b.source.priority()))
        .then_with(|| a.entity_id.cmp(&b.entity_id))
}
