use lupin::common::*;
use lupin::correlation_cluster::*;
use lupin::feature_matrix::FeatureMatrix;
use lupin::network::Level;
use lupin::reports::write_tsv;

use clap::Parser;
use genomic_data::bed::write_interval_table;
use matrix_util::common_io::mkdir;
use matrix_util::sparse_io::NamedTriplets;
use rayon::ThreadPoolBuilder;

#[derive(Parser, Debug, Clone)]
pub struct CollapseArgs {
    #[arg(
        short = 'x',
        long,
        required = true,
        help = "Predictor matrix (sample x feature)",
        long_help = "Predictor matrix: header `sample<TAB>feature...`, \n\
		     one row per sample. `.gz` files are read transparently."
    )]
    predictors: Box<str>,

    #[arg(
        short = 'i',
        long,
        help = "Predictor interval table",
        long_help = "Interval table `id chr start end [strand [alias]]`. \n\
		     Features without an interval are never checked for overlap."
    )]
    intervals: Option<Box<str>>,

    #[arg(
        short = 'a',
        long,
        help = "Adjacency triplets over the original predictors",
        long_help = "Optional `predictor response weight` triplets. \n\
		     The rows are projected onto the collapsed predictors."
    )]
    adjacency: Option<Box<str>>,

    /// reachability radius on 1 - |correlation|
    #[arg(long, default_value_t = 1e-3)]
    eps: f64,

    /// minimum neighbourhood size (including the point itself)
    #[arg(long, default_value_t = 2)]
    min_pts: usize,

    /// block_size for parallel processing
    #[arg(long, default_value_t = 100)]
    block_size: usize,

    /// maximum number of threads
    #[arg(long, default_value_t = 16)]
    max_threads: usize,

    /// Output header
    #[arg(long, short, required = true)]
    out: Box<str>,

    #[arg(
        long,
        short,
        help = "verbosity",
        long_help = "Enable verbose output `RUST_LOG=info`"
    )]
    verbose: bool,
}

pub fn run_collapse(args: &CollapseArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    ThreadPoolBuilder::new()
        .num_threads(num_cpus::get().min(args.max_threads))
        .build_global()?;
    info!("will use {} threads", rayon::current_num_threads());

    let xx = FeatureMatrix::from_files(Level::X, &args.predictors, args.intervals.as_deref())?;

    let clusterer = CorrelationClusterer::new(CorrelationClusterArgs {
        eps: args.eps,
        min_pts: args.min_pts,
        block_size: args.block_size,
    })?;
    let collapsed = clusterer.collapse(&xx)?;

    mkdir(&args.out)?;
    let out = args.out.as_ref();

    collapsed
        .matrix
        .to_labeled()
        .to_tsv(&format!("{}.collapsed.tsv.gz", out), "sample")?;
    write_interval_table(
        &collapsed.matrix.interval_records(),
        &format!("{}.intervals.tsv.gz", out),
    )?;
    write_tsv(
        &collapsed.membership_records(),
        &format!("{}.clusters.tsv.gz", out),
    )?;

    if let Some(file) = args.adjacency.as_deref() {
        let trip = NamedTriplets::from_file(file)?;
        let collapsed_trip = collapse_triplets(&collapsed, &trip)?;
        collapsed_trip.to_file(&format!("{}.xy.tsv.gz", out))?;
        info!(
            "{} -> {} adjacency entries after collapsing",
            trip.len(),
            collapsed_trip.len()
        );
    }

    info!("done");
    Ok(())
}

/// Response columns keep the order of their first appearance
fn collapse_triplets(
    collapsed: &CollapsedFeatures,
    trip: &NamedTriplets,
) -> anyhow::Result<NamedTriplets> {
    let mut cols: Vec<Box<str>> = vec![];
    let mut seen: HashSet<&str> = HashSet::default();
    for (_, c, _) in &trip.triplets {
        if seen.insert(c.as_ref()) {
            cols.push(c.clone());
        }
    }

    let (adj, unmatched) = trip.to_csr(&collapsed.original_features, &cols);
    if !unmatched.is_empty() {
        return Err(NetworkError::data_integrity(format!(
            "{} adjacency rows are not predictors, e.g. {}",
            unmatched.len(),
            unmatched[0]
        )));
    }

    let adj = collapsed.collapse_adjacency_rows(&adj)?;
    let names = &collapsed.matrix.features;
    Ok(NamedTriplets {
        triplets: adj
            .triplet_iter()
            .map(|(i, j, &w)| (names[i].clone(), cols[j].clone(), w))
            .collect(),
    })
}
