use lupin::cis_trans::*;
use lupin::common::*;
use lupin::graph_io::{read_graph_json, write_graph_json};
use lupin::hub_rank::*;
use lupin::modules::*;
use lupin::network::Level;
use lupin::reports::*;

use clap::Parser;
use matrix_util::common_io::mkdir;
use rayon::ThreadPoolBuilder;

#[derive(Parser, Debug, Clone)]
pub struct AnnotateArgs {
    #[arg(
        short = 'g',
        long,
        required = true,
        help = "Network JSON from `build`",
        long_help = "Network JSON written by `build` (`.json` or `.json.gz`)."
    )]
    graph: Box<str>,

    #[arg(
        short = 'r',
        long,
        value_delimiter(','),
        help = "Bootstrap replicate triplet files (comma-separated)",
        long_help = "One `row col weight` triplet file per bootstrap replicate. \n\
		     Hubs are then ordered by mean rank across replicates."
    )]
    replicates: Option<Vec<Box<str>>>,

    /// cis window in base pairs
    #[arg(long, default_value_t = 2_000_000)]
    cis_window: u64,

    #[arg(
        short = 'm',
        long,
        help = "External module assignment",
        long_help = "`node_id module` lines. Replaces edge-betweenness \n\
		     community detection; every node must be assigned."
    )]
    modules: Option<Box<str>>,

    /// smallest module to report
    #[arg(long, default_value_t = 15)]
    min_module_size: usize,

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

pub fn run_annotate(args: &AnnotateArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    ThreadPoolBuilder::new()
        .num_threads(num_cpus::get().min(args.max_threads))
        .build_global()?;
    info!("will use {} threads", rayon::current_num_threads());

    let mut graph = read_graph_json(&args.graph)?;

    let ensemble = match args.replicates.as_deref() {
        Some(files) if !files.is_empty() => {
            let node_ids: Vec<Box<str>> = graph.nodes().iter().map(|n| n.id.clone()).collect();
            Some(BootstrapDegreeEnsemble::from_triplet_files(node_ids, files)?)
        }
        _ => None,
    };

    info!("ranking hubs");
    let mut hubs = HubRanker::new(Level::X).annotate(&mut graph, ensemble.as_ref())?;
    hubs.extend(HubRanker::new(Level::Y).annotate(&mut graph, ensemble.as_ref())?);

    info!("classifying cis/trans links");
    let cis_trans = CisTransClassifier::new(CisTransArgs {
        cis_window: args.cis_window,
    })
    .annotate(&mut graph);

    info!("detecting modules");
    let module_args = ModuleArgs {
        min_module_size: args.min_module_size,
    };
    let detector = match args.modules.as_deref() {
        Some(file) => ModuleDetector::external(ExternalAssignment::from_file(file)?, module_args),
        None => ModuleDetector::edge_betweenness(module_args),
    };
    let summary = detector.annotate(&mut graph)?;

    mkdir(&args.out)?;
    let out = args.out.as_ref();

    write_graph_json(&graph, &format!("{}.graph.json.gz", out))?;
    write_tsv(&hubs, &format!("{}.hubs.tsv.gz", out))?;
    write_tsv(&cis_trans, &format!("{}.cis_trans.tsv.gz", out))?;
    write_tsv(
        &module_membership_records(&graph, &summary),
        &format!("{}.modules.tsv.gz", out),
    )?;
    write_tsv(
        &cross_module_edge_records(&graph, &summary),
        &format!("{}.cross_module_edges.tsv.gz", out),
    )?;

    info!("done");
    Ok(())
}
