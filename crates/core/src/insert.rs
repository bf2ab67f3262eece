//! Insertion: registration, greedy descent, layer linking, and the
//! relative-neighbor pruning heuristic.
//!
//! A new node's own out-edges are written before the reciprocal edges that
//! make it discoverable, so a searcher racing the tail of an insertion can
//! see a partially linked node; traversal stays correct, the node is merely
//! under-recalled until linking completes.

use crate::config;
use crate::distance::l2;
use crate::graph::{HnswIndex, Node};
use crate::search::search_layer;
use crate::visited::with_visited;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

impl HnswIndex {
    /// Inserts one vector and returns the id assigned to it.
    ///
    /// Safe to call from any number of threads at once, including while other
    /// threads search. The vector is copied; the caller's buffer is not
    /// retained. Passing a vector of the wrong dimension is a programmer
    /// error and panics.
    pub fn insert(&self, vector: &[f32]) -> u32 {
        assert_eq!(
            vector.len(),
            self.dim(),
            "vector dimension {} does not match index dimension {}",
            vector.len(),
            self.dim()
        );

        let level = self.random_level();
        let node = Arc::new(Node::new(vector.to_vec(), level));

        // Phase 1: registration. The first node becomes the entry point and
        // there is nothing to link.
        let (new_id, crown) = self.register(Arc::clone(&node));
        let (mut ep, top) = match crown {
            Some(pair) => pair,
            None => return new_id,
        };

        with_visited(|visited| {
            // Phase 2: greedy descent through the layers above the node's own.
            for layer in (level + 1..=top).rev() {
                let nearest = search_layer(self, vector, ep, 1, layer, visited);
                if let Some(&(_, id)) = nearest.first() {
                    ep = id;
                }
            }

            // Phase 3: link into each layer from min(level, top) down to 0.
            let ef = self.config().ef_construction;
            for layer in (0..=level.min(top)).rev() {
                let candidates = search_layer(self, vector, ep, ef, layer, visited);
                let cap = self.config().cap(layer);
                let selected = select_neighbors(self, &candidates, cap);

                // The node is not yet reachable through this layer, so its
                // own list has no readers to race; the lock is uncontended.
                node.links().write()[layer] = selected.iter().map(|&(_, id)| id).collect();

                for &(_, nb_id) in &selected {
                    let nb = self.node(nb_id);
                    let mut nb_links = nb.links().write();
                    if layer >= nb_links.len() {
                        continue;
                    }
                    nb_links[layer].push(new_id);
                    if nb_links[layer].len() > cap {
                        let rescored: Vec<(f32, u32)> = nb_links[layer]
                            .iter()
                            .map(|&cid| (l2(nb.vector(), self.node(cid).vector()), cid))
                            .collect();
                        nb_links[layer] = select_neighbors(self, &rescored, cap)
                            .into_iter()
                            .map(|(_, id)| id)
                            .collect();
                    }
                }

                if let Some(&(_, nearest)) = candidates.first() {
                    ep = nearest;
                }
            }
        });

        // Phase 4: crown update when this node raised the maximum level.
        if level > top {
            self.try_promote(new_id, level);
        }

        new_id
    }

    /// Bulk insertion with `threads` cooperating workers.
    ///
    /// The first [`config::SEQUENTIAL_BOOTSTRAP`] vectors go in on the
    /// calling thread to stabilize the top of the graph, then the workers
    /// drain the remainder through a shared cursor, each one running the
    /// single-item insert path. Returns after all workers join.
    /// `threads == 1` is equivalent to a plain loop over [`Self::insert`].
    pub fn insert_batch(&self, vectors: &[Vec<f32>], threads: usize) {
        assert!(threads >= 1, "threads must be >= 1");

        let bootstrap = vectors.len().min(config::SEQUENTIAL_BOOTSTRAP);
        for vector in &vectors[..bootstrap] {
            self.insert(vector);
        }
        if bootstrap == vectors.len() {
            return;
        }
        if threads == 1 {
            for vector in &vectors[bootstrap..] {
                self.insert(vector);
            }
            return;
        }

        let cursor = AtomicUsize::new(bootstrap);
        thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| loop {
                    let i = cursor.fetch_add(1, Ordering::Relaxed);
                    if i >= vectors.len() {
                        break;
                    }
                    self.insert(&vectors[i]);
                });
            }
        });
    }
}

/// Relative-neighbor selection: candidates are taken in ascending order of
/// distance to the base, and a candidate is kept only if every already-kept
/// neighbor is farther from it than the base is. Rejecting candidates that
/// sit behind a kept neighbor diversifies edge directions instead of
/// clustering them.
///
/// Input shorter than `cap` passes through unchanged.
fn select_neighbors(index: &HnswIndex, candidates: &[(f32, u32)], cap: usize) -> Vec<(f32, u32)> {
    if candidates.len() < cap {
        return candidates.to_vec();
    }

    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(cap);
    let mut kept: Vec<Arc<Node>> = Vec::with_capacity(cap);
    for &(dist, id) in &sorted {
        if selected.len() >= cap {
            break;
        }
        let cand = index.node(id);
        let diverse = kept.iter().all(|s| l2(cand.vector(), s.vector()) >= dist);
        if diverse {
            selected.push((dist, id));
            kept.push(cand);
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::HnswConfig;

    fn small_config() -> HnswConfig {
        HnswConfig {
            m: 4,
            m_max0: 8,
            ef_construction: 20,
            seed: 42,
        }
    }

    #[test]
    fn test_first_insert_takes_crown() {
        let idx = HnswIndex::new(3, small_config());
        let id = idx.insert(&[1.0, 2.0, 3.0]);
        assert_eq!(id, 0);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.entry_point(), Some(0));
        assert_eq!(idx.max_level(), Some(idx.node(0).level()));
    }

    #[test]
    #[should_panic(expected = "dimension")]
    fn test_dimension_mismatch_panics() {
        let idx = HnswIndex::new(4, small_config());
        idx.insert(&[1.0, 2.0]);
    }

    #[test]
    fn test_two_inserts_link_reciprocally() {
        let idx = HnswIndex::new(2, small_config());
        idx.insert(&[0.0, 0.0]);
        idx.insert(&[1.0, 0.0]);
        assert!(idx.neighbors(0, 0).contains(&1));
        assert!(idx.neighbors(1, 0).contains(&0));
    }

    #[test]
    fn test_ids_are_dense_and_ordered() {
        let idx = HnswIndex::new(2, small_config());
        for i in 0..50u32 {
            let id = idx.insert(&[i as f32, (i * 3) as f32]);
            assert_eq!(id, i);
        }
        assert_eq!(idx.len(), 50);
    }

    #[test]
    fn test_neighbor_caps_hold_after_build() {
        let idx = HnswIndex::new(2, small_config());
        for i in 0..200 {
            let x = ((i * 37) % 101) as f32 / 101.0;
            let y = ((i * 53) % 97) as f32 / 97.0;
            idx.insert(&[x, y]);
        }
        let cfg = idx.config().clone();
        for id in 0..idx.len() as u32 {
            let node = idx.node(id);
            for layer in 0..=node.level() {
                let n = idx.neighbors(id, layer).len();
                assert!(
                    n <= cfg.cap(layer),
                    "node {id} layer {layer}: {n} neighbors over cap"
                );
            }
        }
    }

    #[test]
    fn test_layer_coherence() {
        let idx = HnswIndex::new(2, small_config());
        for i in 0..200 {
            idx.insert(&[(i % 17) as f32, (i % 23) as f32]);
        }
        for id in 0..idx.len() as u32 {
            let node = idx.node(id);
            for layer in 0..=node.level() {
                for nb in idx.neighbors(id, layer) {
                    assert!(
                        idx.node(nb).level() >= layer,
                        "edge {id}->{nb} at layer {layer} exceeds target level"
                    );
                }
            }
        }
    }

    #[test]
    fn test_crown_tracks_highest_level() {
        let idx = HnswIndex::new(2, small_config());
        for i in 0..300 {
            idx.insert(&[i as f32, 0.0]);
        }
        let ep = idx.entry_point().unwrap();
        let max = idx.max_level().unwrap();
        assert_eq!(idx.node(ep).level(), max);
        for id in 0..idx.len() as u32 {
            assert!(idx.node(id).level() <= max);
        }
    }

    #[test]
    fn test_select_neighbors_passthrough_below_cap() {
        let idx = HnswIndex::new(2, small_config());
        idx.insert(&[0.0, 1.0]);
        idx.insert(&[1.0, 0.0]);
        let candidates = vec![(1.0, 0u32), (1.0, 1u32)];
        let selected = select_neighbors(&idx, &candidates, 8);
        assert_eq!(selected, candidates);
    }

    #[test]
    fn test_select_neighbors_prefers_diverse_directions() {
        let idx = HnswIndex::new(2, small_config());
        let east = idx.insert(&[1.0, 0.0]); // d=1 from origin
        let far_east = idx.insert(&[2.0, 0.0]); // d=4, shadowed by `east`
        let north = idx.insert(&[0.0, 1.0]); // d=1, different direction

        // Candidate distances are to an implied base at the origin.
        let candidates = vec![(1.0, east), (4.0, far_east), (1.0, north)];
        let selected = select_neighbors(&idx, &candidates, 2);
        let ids: Vec<u32> = selected.iter().map(|&(_, id)| id).collect();
        assert!(ids.contains(&east));
        assert!(ids.contains(&north));
        assert!(!ids.contains(&far_east));
    }

    #[test]
    fn test_insert_batch_small_input_stays_sequential() {
        let idx = HnswIndex::new(2, small_config());
        let vectors: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32, 1.0]).collect();
        idx.insert_batch(&vectors, 4);
        assert_eq!(idx.len(), 20);
    }

    #[test]
    fn test_insert_batch_parallel_inserts_everything() {
        let idx = HnswIndex::new(4, small_config());
        let vectors: Vec<Vec<f32>> = (0..800)
            .map(|i| {
                (0..4)
                    .map(|j| ((i * 7 + j * 13) % 97) as f32 / 97.0)
                    .collect()
            })
            .collect();
        idx.insert_batch(&vectors, 4);
        assert_eq!(idx.len(), 800);
    }
}
