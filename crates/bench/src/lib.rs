//! Benchmark harness for `smallworld-core`: synthetic Gaussian-cluster data
//! generation and quality evaluation against an exact-KNN baseline.

/// Exact KNN baseline, recall, and confusion-matrix evaluation.
pub mod eval;
/// Synthetic clustered datasets: well-separated centers plus Gaussian noise.
pub mod synth;
