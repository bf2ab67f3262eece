//! Global configuration constants for the index.
//!
//! Compile-time defaults and tuning parameters; runtime configuration is
//! carried by [`crate::graph::HnswConfig`].

/// Default number of bidirectional links per node at layers >= 1.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64.
pub const DEFAULT_M: usize = 16;

/// Default ef parameter during index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default seed for the level-sampling RNG.
pub const DEFAULT_SEED: u64 = 42;

/// Hard upper bound on a node's level.
///
/// Levels are drawn geometrically with base 0.5, so the cap is reached
/// roughly once in 65k inserts.
pub const LEVEL_CAP: usize = 16;

/// Number of vectors inserted sequentially before `insert_batch` admits
/// parallel workers. Until the upper layers exist, parallel inserters racing
/// on a sparse crown produce poor graphs.
pub const SEQUENTIAL_BOOTSTRAP: usize = 500;

/// Extra visitation-scratchpad slots beyond the node count at the start of a
/// traversal, covering ids published by concurrent inserters mid-traversal.
pub const VISITED_HEADROOM: usize = 1024;
