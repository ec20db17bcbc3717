mod run_annotate;
mod run_build;
mod run_collapse;
mod run_enrich;

use clap::{Parser, Subcommand};
use run_annotate::*;
use run_build::*;
use run_collapse::*;
use run_enrich::*;

/// LUPIN
#[derive(Parser, Debug)]
#[command(
    version,
    about = "LUPIN",
    long_about = "Linked Unified Predictor-response Integrative Network analysis\n\n\
                  LUPIN turns a fitted sparse predictor-response model (e.g., copy-number \
                  segments predicting transcript or protein abundance) into an annotated \
                  bipartite network: it collapses multicollinear predictors before fitting, \
                  builds the graph from the fitted adjacency, ranks hubs, labels cis/trans \
                  links, finds modules and tests them for functional enrichment.\n\n\
                  Typical order: collapse -> (external model fit) -> build -> annotate -> enrich",
    term_width = 80
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Collapse highly correlated predictors",
        long_about = "Collapse multicollinear predictors by density-based clustering on \
                      1 - |Pearson correlation|.\n\n\
                      Each cluster is replaced by the mean of its members and a spanning \
                      genomic interval; members of one cluster must not overlap.\n\n\
                      Outputs:\n\
                      - {out}.collapsed.tsv.gz: sample x collapsed predictor matrix\n\
                      - {out}.intervals.tsv.gz: interval table of the collapsed predictors\n\
                      - {out}.clusters.tsv.gz: feature -> cluster -> collapsed name\n\
                      - {out}.xy.tsv.gz: collapsed adjacency (when --adjacency is given)"
    )]
    Collapse(CollapseArgs),

    #[command(
        about = "Build the network from fitted adjacency matrices",
        long_about = "Build the bipartite predictor-response network.\n\n\
                      Nodes follow the predictor then response attribute tables; edges \
                      are the nonzero predictor-response entries followed by the upper \
                      triangle of the optional response-response adjacency.\n\n\
                      Outputs:\n\
                      - {out}.graph.json.gz: node and edge lists with attributes"
    )]
    Build(BuildArgs),

    #[command(
        about = "Rank hubs, label cis/trans links, detect modules",
        long_about = "Annotate a network built by `build`.\n\n\
                      Pipeline stages:\n\
                      1. Hub ranks per level, stabilised over bootstrap replicates if given\n\
                      2. Cis/trans labels of predictor-response edges\n\
                      3. Modules by edge betweenness, or from an external assignment\n\n\
                      Outputs:\n\
                      - {out}.graph.json.gz: annotated network\n\
                      - {out}.hubs.tsv.gz: ranked hubs\n\
                      - {out}.cis_trans.tsv.gz: per-predictor cis/trans counts\n\
                      - {out}.modules.tsv.gz: module membership\n\
                      - {out}.cross_module_edges.tsv.gz: edges between modules"
    )]
    Annotate(AnnotateArgs),

    #[command(
        about = "Functional enrichment of modules and hub neighbourhoods",
        long_about = "Test an annotated network against a functional-set universe (GMT).\n\n\
                      Pipeline stages:\n\
                      1. Hypergeometric test per (module, functional set), BH-adjusted\n\
                      2. Tag nodes with the significant sets of their module\n\
                      3. Hub-neighbourhood coherence against degree-preserving rewiring\n\n\
                      Outputs:\n\
                      - {out}.graph.json.gz: network with functional terms\n\
                      - {out}.enrichment.tsv.gz: all tested pairs\n\
                      - {out}.hub_neighborhood.tsv.gz: observed per-hub scores\n\
                      - {out}.null.tsv: null summary (z-score, empirical p-value, seed)\n\
                      - {out}.warnings.tsv: skipped units and why"
    )]
    Enrich(EnrichArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Collapse(args) => {
            run_collapse(args)?;
        }
        Commands::Build(args) => {
            run_build(args)?;
        }
        Commands::Annotate(args) => {
            run_annotate(args)?;
        }
        Commands::Enrich(args) => {
            run_enrich(args)?;
        }
    }

    Ok(())
}
