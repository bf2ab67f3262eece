//! HNSW graph store: node slots, the entry point, and the two-tier locking
//! discipline that lets many threads insert while others search.
//!
//! Nodes are individually heap-allocated behind `Arc`, so the slot container
//! can grow without invalidating handles cloned out earlier. Edges are node
//! ids, never pointers; readers resolve ids through the store. A node's
//! vector and level are immutable once `register` has returned, which is what
//! allows them to be read without any lock after publication.

use crate::config;
use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Tuning parameters for an HNSW index.
///
/// Controls the trade-off between build speed, search speed, recall, and
/// memory usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Number of bidirectional links per node (except layer 0, which uses `m_max0`).
    pub m: usize,
    /// Maximum links per node at layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Seed for the level-sampling RNG; equal seeds give byte-identical
    /// single-threaded builds.
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::DEFAULT_M,
            m_max0: config::DEFAULT_M * 2,
            ef_construction: config::DEFAULT_EF_CONSTRUCTION,
            seed: config::DEFAULT_SEED,
        }
    }
}

impl HnswConfig {
    /// Neighbor cap at `layer`.
    #[inline]
    pub(crate) fn cap(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }
}

/// One data point: its vector, its sampled level, and per-layer out-edges.
///
/// `vec` and `level` never change after construction. `links` holds one
/// neighbor list per layer in `[0, level]` and is guarded by the per-node
/// reader/writer lock: shared for snapshot copies, exclusive for linking and
/// pruning.
#[derive(Debug)]
pub struct Node {
    vec: Vec<f32>,
    level: usize,
    links: RwLock<Vec<Vec<u32>>>,
}

impl Node {
    pub(crate) fn new(vec: Vec<f32>, level: usize) -> Self {
        Self {
            vec,
            level,
            links: RwLock::new(vec![Vec::new(); level + 1]),
        }
    }

    /// The stored vector. Immutable after publication, so no lock is taken.
    #[inline]
    pub fn vector(&self) -> &[f32] {
        &self.vec
    }

    /// The level sampled at insertion, fixed for the node's lifetime.
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Snapshot of the out-edges at `layer`, copied under the shared per-node
    /// lock. Layers above `level` read as empty.
    pub fn neighbors(&self, layer: usize) -> Vec<u32> {
        let links = self.links.read();
        links.get(layer).cloned().unwrap_or_default()
    }

    pub(crate) fn links(&self) -> &RwLock<Vec<Vec<u32>>> {
        &self.links
    }
}

/// Concurrent in-memory HNSW index over fixed-dimension f32 vectors under
/// squared Euclidean distance.
///
/// `insert` and `search` take `&self` and may run from any number of threads
/// at once. See the module docs for the locking discipline.
pub struct HnswIndex {
    config: HnswConfig,
    dim: usize,
    nodes: RwLock<Vec<Arc<Node>>>,
    /// Id of the node at the top of the hierarchy; -1 while empty.
    entry_point: AtomicI64,
    /// Largest level across all nodes; -1 while empty. Monotonic.
    max_level: AtomicI64,
    level_rng: Mutex<ChaCha8Rng>,
}

impl HnswIndex {
    /// Creates a new empty index for vectors of dimension `dim`.
    pub fn new(dim: usize, config: HnswConfig) -> Self {
        let level_rng = Mutex::new(ChaCha8Rng::seed_from_u64(config.seed));
        Self {
            config,
            dim,
            nodes: RwLock::new(Vec::new()),
            entry_point: AtomicI64::new(-1),
            max_level: AtomicI64::new(-1),
            level_rng,
        }
    }

    /// Creates a new empty index with default configuration (M=16, ef_c=200).
    pub fn with_default_config(dim: usize) -> Self {
        Self::new(dim, HnswConfig::default())
    }

    /// Number of nodes registered so far.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns `true` if the index holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured vector dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Current entry point, or `None` while the index is empty.
    pub fn entry_point(&self) -> Option<u32> {
        let ep = self.entry_point.load(Ordering::Acquire);
        (ep >= 0).then_some(ep as u32)
    }

    /// Highest level across all nodes, or `None` while the index is empty.
    pub fn max_level(&self) -> Option<usize> {
        let level = self.max_level.load(Ordering::Acquire);
        (level >= 0).then_some(level as usize)
    }

    /// Reads `(entry_point, max_level)` as one consistent pair under the
    /// shared global lock, so a concurrent crown update cannot tear them.
    pub(crate) fn top(&self) -> Option<(u32, usize)> {
        let _nodes = self.nodes.read();
        let ep = self.entry_point.load(Ordering::Acquire);
        (ep >= 0).then(|| {
            let level = self.max_level.load(Ordering::Acquire) as usize;
            (ep as u32, level)
        })
    }

    /// Resolves a node id to its stable handle.
    ///
    /// Ids observed anywhere (edges, results) are always already registered,
    /// so the slot exists by the time any caller can name it.
    #[inline]
    pub fn node(&self, id: u32) -> Arc<Node> {
        Arc::clone(&self.nodes.read()[id as usize])
    }

    /// Snapshot of the neighbor list of `id` at `layer`.
    pub fn neighbors(&self, id: u32, layer: usize) -> Vec<u32> {
        self.node(id).neighbors(layer)
    }

    /// Samples a level: the number of successful fair-coin trials, capped at
    /// [`config::LEVEL_CAP`]. Roughly half of nodes land on level 0, a
    /// quarter on level 1, and so on.
    pub(crate) fn random_level(&self) -> usize {
        let mut rng = self.level_rng.lock();
        let mut level = 0;
        while level < config::LEVEL_CAP && rng.gen::<f32>() < 0.5 {
            level += 1;
        }
        level
    }

    /// Registers `node` under the global exclusive lock, assigning the next
    /// dense id. The first node ever registered is promoted to entry point on
    /// the spot and `None` is returned for the crown; otherwise the
    /// `(entry_point, max_level)` pair observed at registration is returned.
    pub(crate) fn register(&self, node: Arc<Node>) -> (u32, Option<(u32, usize)>) {
        let mut nodes = self.nodes.write();
        let id = nodes.len() as u32;
        let level = node.level();
        nodes.push(node);

        let ep = self.entry_point.load(Ordering::Acquire);
        if ep < 0 {
            self.entry_point.store(id as i64, Ordering::Release);
            self.max_level.store(level as i64, Ordering::Release);
            (id, None)
        } else {
            let max = self.max_level.load(Ordering::Acquire) as usize;
            (id, Some((ep as u32, max)))
        }
    }

    /// Promotes `id` to entry point if `level` still exceeds the recorded
    /// maximum. Racing promoters may lose; the loser's node simply stays
    /// unpromoted and `max_level` remains monotonic.
    pub(crate) fn try_promote(&self, id: u32, level: usize) {
        let _nodes = self.nodes.write();
        if (level as i64) > self.max_level.load(Ordering::Acquire) {
            self.max_level.store(level as i64, Ordering::Release);
            self.entry_point.store(id as i64, Ordering::Release);
        }
    }
}
