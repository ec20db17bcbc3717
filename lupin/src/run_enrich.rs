use lupin::common::*;
use lupin::enrichment::*;
use lupin::functional_sets::*;
use lupin::graph_io::{read_graph_json, write_graph_json};
use lupin::hub_neighborhood::HubNeighborhoodArgs;
use lupin::modules::{ModuleArgs, ModuleSummary};
use lupin::network::Level;
use lupin::reports::*;

use clap::Parser;
use matrix_util::common_io::mkdir;
use rayon::ThreadPoolBuilder;

#[derive(Parser, Debug, Clone)]
pub struct EnrichArgs {
    #[arg(
        short = 'g',
        long,
        required = true,
        help = "Annotated network JSON from `annotate`",
        long_help = "Network JSON written by `annotate`. Every node must carry a module; \n\
		     predictor ranks are used by --top-hubs."
    )]
    graph: Box<str>,

    #[arg(
        long,
        required = true,
        help = "Functional sets in GMT format",
        long_help = "GMT file: `name<TAB>description<TAB>member...`. \n\
		     Members are matched against response ids first, then aliases."
    )]
    gmt: Box<str>,

    /// false discovery rate for module enrichment
    #[arg(long, default_value_t = 0.05)]
    fdr: f64,

    /// smallest functional set to keep
    #[arg(long, default_value_t = 15)]
    min_set_size: usize,

    /// largest functional set to keep
    #[arg(long, default_value_t = 300)]
    max_set_size: usize,

    /// smallest module to test
    #[arg(long, default_value_t = 15)]
    min_module_size: usize,

    /// number of rewired null graphs
    #[arg(long, default_value_t = 100)]
    num_trials: usize,

    #[arg(
        long,
        help = "Random seed",
        long_help = "Base seed of the null model; trial t uses seed + t. \n\
		     A seed is drawn and logged when none is given."
    )]
    seed: Option<u64>,

    /// only score predictors ranked at or above this
    #[arg(long)]
    top_hubs: Option<usize>,

    #[arg(
        long,
        help = "Checkpoint file (JSON lines)",
        long_help = "One JSON line per finished null trial. Rerunning with the \n\
		     same file and seed skips the trials already recorded."
    )]
    checkpoint: Option<Box<str>>,

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

pub fn run_enrich(args: &EnrichArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    ThreadPoolBuilder::new()
        .num_threads(num_cpus::get().min(args.max_threads))
        .build_global()?;
    info!("will use {} threads", rayon::current_num_threads());

    let mut graph = read_graph_json(&args.graph)?;
    let universe = FunctionalSetUniverse::from_gmt(
        &args.gmt,
        &FunctionalSetArgs {
            min_size: args.min_set_size,
            max_size: args.max_set_size,
        },
    )?;

    let responses = graph.nodes_of_level(Level::Y);
    universe.coverage(responses.iter().map(|&i| graph.node(i)));

    let summary = ModuleSummary::from_graph(
        &graph,
        &ModuleArgs {
            min_module_size: args.min_module_size,
        },
    )?;

    let engine = EnrichmentEngine::new(EnrichmentArgs { fdr: args.fdr });

    info!("testing module enrichment");
    let enrichment = engine.module_enrichment(&graph, &summary, &universe)?;
    let ntagged = tag_functional_terms(&mut graph, &enrichment, &universe);
    info!("tagged {} nodes with functional terms", ntagged);

    info!("scoring hub neighbourhoods");
    let report = engine.hub_neighborhood(
        &graph,
        &universe,
        HubNeighborhoodArgs {
            num_trials: args.num_trials,
            seed: args.seed,
            top_hubs: args.top_hubs,
            checkpoint: args.checkpoint.clone(),
        },
    )?;

    mkdir(&args.out)?;
    let out = args.out.as_ref();

    write_graph_json(&graph, &format!("{}.graph.json.gz", out))?;
    write_tsv(&enrichment.tested, &format!("{}.enrichment.tsv.gz", out))?;
    write_tsv(&report.hubs, &format!("{}.hub_neighborhood.tsv.gz", out))?;
    write_null_summary(&report, &format!("{}.null.tsv", out))?;

    let warnings: Vec<StatisticalWarning> = enrichment
        .warnings
        .iter()
        .chain(report.warnings.iter())
        .cloned()
        .collect();
    write_tsv(&warnings, &format!("{}.warnings.tsv", out))?;

    info!("done");
    Ok(())
}
