//! Layer beam search and multi-layer KNN queries.
//!
//! Neighbor lists are snapshot-copied under each node's shared lock, so a
//! query racing concurrent inserts sees per-node-consistent (possibly
//! slightly stale) lists and never a torn one.

use crate::distance::l2;
use crate::graph::HnswIndex;
use crate::visited::{with_visited, VisitedSet};
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// Frontier entry: max-heap on negative distance pops the nearest first.
#[derive(Debug, PartialEq, Eq)]
struct Candidate {
    neg_distance: OrderedFloat<f32>,
    id: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.neg_distance.cmp(&other.neg_distance)
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Result entry: max-heap on distance keeps the current worst on top for
/// eviction once the beam is full.
#[derive(Debug, PartialEq, Eq)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    id: u32,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance.cmp(&other.distance)
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Beam search within one layer, starting from `entry` with beam width `ef`.
///
/// Returns up to `ef` `(squared distance, id)` pairs in ascending distance.
/// Each call is one traversal: the scratchpad epoch is bumped on entry.
pub(crate) fn search_layer(
    index: &HnswIndex,
    query: &[f32],
    entry: u32,
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
) -> Vec<(f32, u32)> {
    visited.begin(index.len());

    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);

    let entry_dist = l2(query, index.node(entry).vector());
    visited.insert(entry);
    candidates.push(Candidate {
        neg_distance: OrderedFloat(-entry_dist),
        id: entry,
    });
    results.push(ResultEntry {
        distance: OrderedFloat(entry_dist),
        id: entry,
    });
    // Cached worst distance in `results`; avoids heap peeks in the hot loop.
    let mut worst = entry_dist;

    while let Some(candidate) = candidates.pop() {
        let c_dist = -candidate.neg_distance.0;
        if results.len() >= ef && c_dist > worst {
            break;
        }

        for nb in index.node(candidate.id).neighbors(layer) {
            if !visited.insert(nb) {
                continue;
            }
            let dist = l2(query, index.node(nb).vector());
            if results.len() < ef || dist < worst {
                candidates.push(Candidate {
                    neg_distance: OrderedFloat(-dist),
                    id: nb,
                });
                results.push(ResultEntry {
                    distance: OrderedFloat(dist),
                    id: nb,
                });
                if results.len() > ef {
                    results.pop();
                }
                worst = results.peek().map_or(f32::MAX, |r| r.distance.0);
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|r| (r.distance.0, r.id))
        .collect()
}

/// Multi-layer KNN query.
///
/// Descends greedily from the top layer to layer 1 with beam width 1, then
/// runs the layer-0 beam with width `ef_search` (or `max(ef_construction, k)`
/// when `ef_search == 0`). Returns up to `k` `(squared distance, id)` pairs,
/// nearest first; an empty index yields an empty vector. `k == 0` is a
/// programmer error and panics, as is a query of the wrong dimension.
pub fn knn_search(index: &HnswIndex, query: &[f32], k: usize, ef_search: usize) -> Vec<(f32, u32)> {
    assert!(k >= 1, "k must be >= 1");
    assert_eq!(
        query.len(),
        index.dim(),
        "query dimension {} does not match index dimension {}",
        query.len(),
        index.dim()
    );

    let (mut ep, max_level) = match index.top() {
        Some(pair) => pair,
        None => return Vec::new(),
    };

    let ef = if ef_search > 0 {
        ef_search.max(k)
    } else {
        index.config().ef_construction.max(k)
    };

    with_visited(|visited| {
        for layer in (1..=max_level).rev() {
            let nearest = search_layer(index, query, ep, 1, layer, visited);
            if let Some(&(_, id)) = nearest.first() {
                ep = id;
            }
        }

        let mut results = search_layer(index, query, ep, ef, 0, visited);
        results.truncate(k);
        results
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::HnswConfig;

    fn unit_square_index() -> HnswIndex {
        let idx = HnswIndex::new(
            2,
            HnswConfig {
                m: 4,
                m_max0: 8,
                ef_construction: 10,
                seed: 42,
            },
        );
        idx.insert(&[0.0, 0.0]);
        idx.insert(&[0.0, 1.0]);
        idx.insert(&[1.0, 0.0]);
        idx.insert(&[1.0, 1.0]);
        idx
    }

    #[test]
    fn test_tiny_cluster_exact_corners() {
        let idx = unit_square_index();
        let near_origin = knn_search(&idx, &[0.1, 0.1], 1, 10);
        assert_eq!(near_origin[0].1, 0);
        let near_far = knn_search(&idx, &[0.9, 0.9], 1, 10);
        assert_eq!(near_far[0].1, 3);
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let idx = HnswIndex::with_default_config(8);
        assert!(knn_search(&idx, &[0.0; 8], 5, 50).is_empty());
    }

    #[test]
    fn test_k_exceeding_len_returns_all_ascending() {
        let idx = HnswIndex::with_default_config(4);
        idx.insert(&[0.0, 0.0, 0.0, 0.0]);
        idx.insert(&[1.0, 0.0, 0.0, 0.0]);
        idx.insert(&[2.0, 0.0, 0.0, 0.0]);

        let results = knn_search(&idx, &[0.1, 0.0, 0.0, 0.0], 10, 50);
        assert_eq!(results.len(), 3);
        let ids: Vec<u32> = results.iter().map(|&(_, id)| id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        for pair in results.windows(2) {
            assert!(pair[0].0 <= pair[1].0);
        }
    }

    #[test]
    fn test_results_distinct_and_ascending() {
        let idx = HnswIndex::with_default_config(4);
        for i in 0..120 {
            let v: Vec<f32> = (0..4)
                .map(|j| ((i * 31 + j * 17) % 113) as f32 / 113.0)
                .collect();
            idx.insert(&v);
        }
        let results = knn_search(&idx, &[0.5, 0.5, 0.5, 0.5], 10, 64);
        assert_eq!(results.len(), 10);
        let mut ids: Vec<u32> = results.iter().map(|&(_, id)| id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10, "duplicate id in results");
        for pair in results.windows(2) {
            assert!(pair[0].0 <= pair[1].0);
        }
    }

    #[test]
    fn test_insert_then_find_self() {
        let idx = HnswIndex::with_default_config(8);
        let vectors: Vec<Vec<f32>> = (0..50)
            .map(|i| {
                (0..8)
                    .map(|j| ((i * 7 + j * 13) % 97) as f32 / 97.0)
                    .collect()
            })
            .collect();
        for v in &vectors {
            idx.insert(v);
        }
        for (i, v) in vectors.iter().enumerate() {
            let results = knn_search(&idx, v, 1, 50);
            assert_eq!(results[0].1, i as u32, "vector {i} did not find itself");
            assert_eq!(results[0].0, 0.0);
        }
    }

    #[test]
    fn test_ef_search_zero_uses_construction_default() {
        let idx = unit_square_index();
        // ef_construction = 10 covers the whole square; the nearest corner wins.
        let results = knn_search(&idx, &[0.1, 0.1], 2, 0);
        assert_eq!(results[0].1, 0);
        assert_eq!(results.len(), 2);
    }
}
