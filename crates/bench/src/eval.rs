//! Quality evaluation against a brute-force baseline.
//!
//! Exact KNN under squared L2, recall@k, k-NN majority-vote classification,
//! and a column-normalized confusion matrix.

use smallworld_core::distance::l2;
use std::cmp::Ordering;
use std::fmt::Write as _;

/// Brute-force top-`k` ids under squared L2, nearest first.
pub fn exact_knn(data: &[Vec<f32>], query: &[f32], k: usize) -> Vec<u32> {
    let mut scored: Vec<(f32, u32)> = data
        .iter()
        .enumerate()
        .map(|(i, v)| (l2(query, v), i as u32))
        .collect();

    let k = k.min(scored.len());
    if k == 0 {
        return Vec::new();
    }
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, |a, b| {
            a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal)
        });
        scored.truncate(k);
    }
    scored.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(_, id)| id).collect()
}

/// Fraction of `exact` ids that appear in `approx`.
pub fn recall(approx: &[u32], exact: &[u32]) -> f32 {
    if exact.is_empty() {
        return 1.0;
    }
    let hits = exact.iter().filter(|id| approx.contains(id)).count();
    hits as f32 / exact.len() as f32
}

/// Index of the most frequent label; ties go to the lowest label.
pub fn majority_vote(labels: &[usize], clusters: usize) -> usize {
    let mut counts = vec![0usize; clusters];
    for &label in labels {
        counts[label] += 1;
    }
    counts
        .iter()
        .enumerate()
        .max_by_key(|&(i, &count)| (count, std::cmp::Reverse(i)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Micro-averaged recall: diagonal mass over total mass of the confusion
/// matrix (rows predicted, cols true).
pub fn recall_from_confusion(confusion: &[Vec<usize>]) -> f32 {
    let correct: usize = (0..confusion.len()).map(|c| confusion[c][c]).sum();
    let total: usize = confusion.iter().flatten().sum();
    if total == 0 {
        return 1.0;
    }
    correct as f32 / total as f32
}

/// Renders the column-normalized confusion matrix (rows predicted, cols true)
/// for human eyes.
pub fn format_confusion(confusion: &[Vec<usize>]) -> String {
    let clusters = confusion.len();
    let mut col_sum = vec![0usize; clusters];
    for row in confusion {
        for (true_c, &count) in row.iter().enumerate() {
            col_sum[true_c] += count;
        }
    }

    let mut out = String::new();
    out.push_str("    ");
    for j in 0..clusters {
        let _ = write!(out, "  T{j}  ");
    }
    out.push('\n');
    for (i, row) in confusion.iter().enumerate() {
        let _ = write!(out, "P{i}  ");
        for (j, &count) in row.iter().enumerate() {
            let v = if col_sum[j] > 0 {
                count as f32 / col_sum[j] as f32
            } else {
                0.0
            };
            let _ = write!(out, "{v:5.2} ");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_knn_orders_by_distance() {
        let data = vec![
            vec![5.0, 0.0],
            vec![1.0, 0.0],
            vec![3.0, 0.0],
            vec![0.5, 0.0],
        ];
        assert_eq!(exact_knn(&data, &[0.0, 0.0], 3), vec![3, 1, 2]);
    }

    #[test]
    fn test_exact_knn_k_exceeding_len() {
        let data = vec![vec![1.0], vec![2.0]];
        assert_eq!(exact_knn(&data, &[0.0], 10), vec![0, 1]);
    }

    #[test]
    fn test_recall_counts_hits() {
        assert_eq!(recall(&[1, 2, 3], &[1, 2, 3]), 1.0);
        assert_eq!(recall(&[1, 9, 8], &[1, 2, 3]), 1.0 / 3.0);
        assert_eq!(recall(&[], &[1]), 0.0);
        assert_eq!(recall(&[], &[]), 1.0);
    }

    #[test]
    fn test_majority_vote_ties_pick_lowest() {
        assert_eq!(majority_vote(&[0, 1, 1, 2], 3), 1);
        assert_eq!(majority_vote(&[2, 0, 2, 0], 3), 0);
        assert_eq!(majority_vote(&[], 3), 0);
    }

    #[test]
    fn test_confusion_recall_is_diagonal_share() {
        let confusion = vec![vec![8, 1], vec![2, 9]];
        let expected = 17.0 / 20.0;
        assert!((recall_from_confusion(&confusion) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_format_confusion_normalizes_columns() {
        let confusion = vec![vec![1, 0], vec![1, 2]];
        let rendered = format_confusion(&confusion);
        assert!(rendered.contains("T0"));
        assert!(rendered.contains("P1"));
        assert!(rendered.contains("0.50"));
    }
}
