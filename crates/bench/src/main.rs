//! Synthetic-cluster benchmark runner.
//!
//! Builds an index over well-separated Gaussian clusters (sequentially or
//! with parallel workers) and evaluates it two ways: recall against an exact
//! KNN baseline, and per-cluster precision via k-NN majority vote with a
//! confusion matrix.

use anyhow::{ensure, Context, Result};
use clap::{CommandFactory, Parser};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use smallworld_bench::{eval, synth};
use smallworld_core::{knn_search, HnswConfig, HnswIndex};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "smallworld-bench",
    about = "HNSW index benchmark on synthetic Gaussian clusters"
)]
struct Args {
    /// Vector dimension
    #[arg(long, default_value_t = 128)]
    dim: usize,

    /// Max neighbors per node (layer 0 allows twice this)
    #[arg(long, default_value_t = 16)]
    m: usize,

    /// Beam width during index construction
    #[arg(long, default_value_t = 200)]
    efc: usize,

    /// Neighbors returned per query
    #[arg(long, default_value_t = 15)]
    k: usize,

    /// Beam width during search (0 = max(efc, k))
    #[arg(long, default_value_t = 80)]
    efs: usize,

    /// Queries per cluster
    #[arg(long, default_value_t = 30)]
    queries: usize,

    /// Number of clusters
    #[arg(long, default_value_t = 6)]
    clusters: usize,

    /// Points per cluster
    #[arg(long, default_value_t = 200)]
    pts: usize,

    /// Intra-cluster noise sigma
    #[arg(long, default_value_t = 0.004)]
    sigma: f32,

    /// Minimum Euclidean distance between cluster centers
    #[arg(long, default_value_t = 8.0)]
    center_dist: f32,

    /// RNG seed for data generation and level sampling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Worker threads for the index build
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Evaluate recall against exact KNN
    #[arg(long)]
    recall: bool,

    /// Evaluate per-cluster precision with a confusion matrix
    #[arg(long)]
    confusion: bool,

    /// Emit a JSON run summary on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn index_config(&self) -> HnswConfig {
        HnswConfig {
            m: self.m,
            m_max0: self.m * 2,
            ef_construction: self.efc,
            seed: self.seed,
        }
    }
}

#[derive(Serialize)]
struct RecallSummary {
    config: HnswConfig,
    dim: usize,
    threads: usize,
    points: usize,
    queries: usize,
    k: usize,
    ef_search: usize,
    build_secs: f64,
    avg_search_secs: f64,
    recall_at_k: f32,
    top1_accuracy: f32,
}

#[derive(Serialize)]
struct ConfusionSummary {
    config: HnswConfig,
    dim: usize,
    points: usize,
    queries: usize,
    k: usize,
    ef_search: usize,
    build_secs: f64,
    avg_search_secs: f64,
    recall: f32,
    confusion: Vec<Vec<usize>>,
}

#[derive(Serialize)]
struct RunSummary {
    recall: Option<RecallSummary>,
    confusion: Option<ConfusionSummary>,
}

fn build_index(args: &Args, dataset: &[Vec<f32>]) -> (HnswIndex, f64) {
    let index = HnswIndex::new(args.dim, args.index_config());
    let start = Instant::now();
    if args.threads <= 1 {
        tracing::info!(points = dataset.len(), "building index single-threaded");
        for vector in dataset {
            index.insert(vector);
        }
    } else {
        tracing::info!(
            points = dataset.len(),
            threads = args.threads,
            "building index with parallel workers"
        );
        index.insert_batch(dataset, args.threads);
    }
    let build_secs = start.elapsed().as_secs_f64();
    tracing::info!(build_secs, "index build complete");
    (index, build_secs)
}

/// HNSW vs exact KNN: recall@k and top-1 accuracy over per-cluster queries.
fn run_recall(args: &Args) -> RecallSummary {
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let centers = synth::well_separated_centers(args.dim, args.clusters, args.center_dist, &mut rng);
    let (dataset, _labels) = synth::clustered_dataset(&centers, args.pts, args.sigma, &mut rng);

    let (index, build_secs) = build_index(args, &dataset);

    let queries: Vec<Vec<f32>> = centers
        .iter()
        .flat_map(|center| {
            (0..args.queries)
                .map(|_| synth::sample_near(center, args.sigma, &mut rng))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut recall_sum = 0.0f32;
    let mut top1_correct = 0usize;
    let mut search_secs = 0.0f64;
    for query in &queries {
        let exact = eval::exact_knn(&dataset, query, args.k);

        let start = Instant::now();
        let approx = knn_search(&index, query, args.k, args.efs);
        search_secs += start.elapsed().as_secs_f64();

        let approx_ids: Vec<u32> = approx.iter().map(|&(_, id)| id).collect();
        recall_sum += eval::recall(&approx_ids, &exact);
        if approx_ids.first() == exact.first() && !exact.is_empty() {
            top1_correct += 1;
        }
    }

    let total = queries.len();
    RecallSummary {
        config: index.config().clone(),
        dim: args.dim,
        threads: args.threads,
        points: dataset.len(),
        queries: total,
        k: args.k,
        ef_search: args.efs,
        build_secs,
        avg_search_secs: search_secs / total as f64,
        recall_at_k: recall_sum / total as f32,
        top1_accuracy: top1_correct as f32 / total as f32,
    }
}

/// Per-cluster precision: classify each query by majority vote over its k-NN
/// labels and tally the confusion matrix.
fn run_confusion(args: &Args) -> ConfusionSummary {
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let centers = synth::well_separated_centers(args.dim, args.clusters, args.center_dist, &mut rng);
    let (dataset, labels) = synth::clustered_dataset(&centers, args.pts, args.sigma, &mut rng);

    let (index, build_secs) = build_index(args, &dataset);

    let mut confusion = vec![vec![0usize; args.clusters]; args.clusters];
    let mut search_secs = 0.0f64;
    let mut total = 0usize;
    for (true_cluster, center) in centers.iter().enumerate() {
        for _ in 0..args.queries {
            let query = synth::sample_near(center, args.sigma, &mut rng);

            let start = Instant::now();
            let knn = knn_search(&index, &query, args.k, args.efs);
            search_secs += start.elapsed().as_secs_f64();

            let knn_labels: Vec<usize> = knn.iter().map(|&(_, id)| labels[id as usize]).collect();
            let predicted = eval::majority_vote(&knn_labels, args.clusters);
            confusion[predicted][true_cluster] += 1;
            total += 1;
        }
    }

    ConfusionSummary {
        config: index.config().clone(),
        dim: args.dim,
        points: dataset.len(),
        queries: total,
        k: args.k,
        ef_search: args.efs,
        build_secs,
        avg_search_secs: search_secs / total.max(1) as f64,
        recall: eval::recall_from_confusion(&confusion),
        confusion,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    ensure!(args.threads >= 1, "--threads must be >= 1");
    ensure!(args.dim >= 1, "--dim must be >= 1");
    ensure!(args.k >= 1, "--k must be >= 1");
    ensure!(args.clusters >= 1, "--clusters must be >= 1");
    ensure!(args.sigma >= 0.0, "--sigma must be non-negative");

    if !args.recall && !args.confusion {
        Args::command().print_help()?;
        return Ok(());
    }

    let mut summary = RunSummary {
        recall: None,
        confusion: None,
    };

    if args.recall {
        println!("[recall] HNSW vs exact KNN (squared L2)");
        let result = run_recall(&args);
        println!("build time:        {:.3} s", result.build_secs);
        println!("avg search time:   {:.6} s", result.avg_search_secs);
        println!("top-1 accuracy:    {:.3}", result.top1_accuracy);
        println!("recall@{}:         {:.3}", result.k, result.recall_at_k);
        summary.recall = Some(result);
    }

    if args.confusion {
        println!("[confusion] per-cluster precision");
        let result = run_confusion(&args);
        println!("build time:        {:.3} s", result.build_secs);
        println!("avg search time:   {:.6} s", result.avg_search_secs);
        println!("\nNormalized confusion matrix (rows = predicted, cols = true)\n");
        print!("{}", eval::format_confusion(&result.confusion));
        println!("\nmicro-averaged recall: {:.3}", result.recall);
        summary.confusion = Some(result);
    }

    if args.json {
        let encoded =
            serde_json::to_string_pretty(&summary).context("failed to encode run summary")?;
        println!("{encoded}");
    }

    Ok(())
}
