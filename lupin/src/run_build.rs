use lupin::common::*;
use lupin::graph_io::write_graph_json;
use lupin::network::Level;
use lupin::network_builder::*;

use clap::Parser;
use matrix_util::common_io::mkdir;
use matrix_util::sparse_io::NamedTriplets;

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(
        long,
        required = true,
        help = "Predictor-response adjacency triplets",
        long_help = "Fitted predictor-response links as `predictor response weight` \n\
		     triplets. Zero weights are ignored."
    )]
    xy: Box<str>,

    #[arg(
        long,
        help = "Response-response adjacency triplets",
        long_help = "Optional response-response links as `response response weight`. \n\
		     Must be symmetric with an empty diagonal."
    )]
    yy: Option<Box<str>>,

    #[arg(
        short = 'x',
        long,
        required = true,
        help = "Predictor interval table",
        long_help = "Predictor attributes `id chr start end [strand [alias]]`. \n\
		     Node order follows this table."
    )]
    predictors: Box<str>,

    #[arg(
        short = 'y',
        long,
        required = true,
        help = "Response interval table",
        long_help = "Response attributes `id chr start end [strand [alias]]`. \n\
		     The alias (e.g., gene symbol) is what functional sets may refer to."
    )]
    responses: Box<str>,

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

pub fn run_build(args: &BuildArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let x_table = AttributeTable::from_file(Level::X, &args.predictors)?;
    let y_table = AttributeTable::from_file(Level::Y, &args.responses)?;
    info!(
        "{} predictors and {} responses in the attribute tables",
        x_table.len(),
        y_table.len()
    );

    let a_xy = Adjacency::from_triplets(
        &NamedTriplets::from_file(&args.xy)?,
        x_table.ids(),
        y_table.ids(),
    )?;

    let a_yy = match args.yy.as_deref() {
        Some(file) => Some(Adjacency::from_triplets(
            &NamedTriplets::from_file(file)?,
            y_table.ids(),
            y_table.ids(),
        )?),
        None => None,
    };

    info!(
        "{} predictor-response and {} response-response entries",
        a_xy.nnz(),
        a_yy.as_ref().map(|a| a.nnz()).unwrap_or(0)
    );

    let graph = NetworkBuilder::new(&x_table, &y_table)?.build(&a_xy, a_yy.as_ref())?;

    mkdir(&args.out)?;
    write_graph_json(&graph, &format!("{}.graph.json.gz", args.out))?;

    info!("done");
    Ok(())
}
