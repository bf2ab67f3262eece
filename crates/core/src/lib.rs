//! # smallworld-core
//!
//! Concurrent in-memory approximate nearest neighbor index over
//! fixed-dimension f32 vectors, built on a hierarchical navigable small world
//! graph under squared Euclidean distance.
//!
//! Many threads may insert while others search: neighbor lists are guarded
//! per node, the node container by a single global lock, and a node's vector
//! and level are immutable once published. The index is ephemeral — there is
//! no persistence, no async, and no logging in this crate.

/// Global configuration constants: defaults and tuning parameters.
pub mod config;
/// Squared-L2 distance kernel: NEON/AVX2 with scalar fallback.
pub mod distance;
/// Graph store, node model, and the two-tier locking discipline.
pub mod graph;
/// Insertion: level sampling, descent, linking, and neighbor pruning.
pub mod insert;
/// Layer beam search and multi-layer KNN queries.
pub mod search;
/// Per-thread epoch-based visitation scratchpad.
pub mod visited;

pub use graph::{HnswConfig, HnswIndex, Node};
pub use search::knn_search;
