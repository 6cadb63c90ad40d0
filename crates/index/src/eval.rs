//! Brute-force ground truth for recall checks.

use hashbrown::HashSet;

use crate::record::dot;
use crate::{Neighbor, VectorRecord};

/// Exact top-`k` by dot product, ties by ascending id.
pub fn exact_knn(records: &[VectorRecord], query: &[f32], k: usize) -> Vec<Neighbor> {
    let mut scored: Vec<Neighbor> = records
        .iter()
        .map(|r| Neighbor {
            id: r.id.clone(),
            score: dot(query, &r.values),
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    scored.truncate(k);
    scored
}

/// Fraction of `truth` ids present in `found`.
pub fn recall_at_k(truth: &[Neighbor], found: &[Neighbor]) -> f64 {
    if truth.is_empty() {
        return 1.0;
    }
    let found: HashSet<&str> = found.iter().map(|n| n.id.as_str()).collect();
    let hits = truth.iter().filter(|n| found.contains(n.id.as_str())).count();
    hits as f64 / truth.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Level;

    #[test]
    fn exact_orders_and_truncates() {
        let records = vec![
            VectorRecord::new("b", Level::Sentence, vec![1.0, 0.0]),
            VectorRecord::new("a", Level::Sentence, vec![1.0, 0.0]),
            VectorRecord::new("c", Level::Sentence, vec![0.0, 1.0]),
        ];
        let hits = exact_knn(&records, &[1.0, 0.0], 2);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn recall_counts_overlap() {
        let n = |id: &str| Neighbor {
            id: id.into(),
            score: 0.0,
        };
        assert_eq!(recall_at_k(&[n("a"), n("b")], &[n("b"), n("z")]), 0.5);
        assert_eq!(recall_at_k(&[], &[n("x")]), 1.0);
    }
}
