//! Functional coherence of predictor neighbourhoods.
//!
//! The neighbourhood of a predictor is the set of responses it links
//! to. Its score is the fraction of response pairs in the neighbourhood
//! that share at least one functional set. The observed mean score is
//! compared against the same statistic on degree-preserving rewirings
//! of the predictor-response edges.

use crate::common::*;
use crate::enrichment::EnrichmentEngine;
use crate::functional_sets::FunctionalSetUniverse;
use crate::network::{EdgeLevel, Level, NetworkGraph};
use matrix_util::utils::mean_and_sd;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::Mutex;

/// Null graphs over predictor-response edges `(predictor, response)`
pub trait RandomGraphGenerator: Sync {
    fn generate(&self, edges: &[(usize, usize)], seed: u64) -> Vec<(usize, usize)>;
}

/// Repeated double-edge swaps `(a,b),(c,d) -> (a,d),(c,b)` that keep
/// every node's degree and never create a duplicate edge
#[derive(Debug, Clone)]
pub struct DegreePreservingRewiring {
    pub swaps_per_edge: usize,
}

impl Default for DegreePreservingRewiring {
    fn default() -> Self {
        Self { swaps_per_edge: 10 }
    }
}

impl RandomGraphGenerator for DegreePreservingRewiring {
    fn generate(&self, edges: &[(usize, usize)], seed: u64) -> Vec<(usize, usize)> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut edges = edges.to_vec();
        let m = edges.len();
        if m < 2 {
            return edges;
        }

        let mut present: HashSet<(usize, usize)> = edges.iter().copied().collect();

        for _ in 0..(self.swaps_per_edge * m) {
            let e1 = rng.random_range(0..m);
            let e2 = rng.random_range(0..m);
            if e1 == e2 {
                continue;
            }
            let (a, b) = edges[e1];
            let (c, d) = edges[e2];
            if a == c || b == d || present.contains(&(a, d)) || present.contains(&(c, b)) {
                continue;
            }
            present.remove(&(a, b));
            present.remove(&(c, d));
            present.insert((a, d));
            present.insert((c, b));
            edges[e1] = (a, d);
            edges[e2] = (c, b);
        }
        edges
    }
}

#[derive(Debug, Clone)]
pub struct HubNeighborhoodArgs {
    pub num_trials: usize,
    pub seed: Option<u64>,
    /// restrict to predictors with `rank <= top_hubs`
    pub top_hubs: Option<usize>,
    /// JSON lines, one per finished trial
    pub checkpoint: Option<Box<str>>,
}

impl Default for HubNeighborhoodArgs {
    fn default() -> Self {
        Self {
            num_trials: 100,
            seed: None,
            top_hubs: None,
            checkpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodScore {
    pub size: usize,
    pub num_pairs: usize,
    pub num_shared: usize,
}

impl NeighborhoodScore {
    /// `None` for fewer than two neighbours
    pub fn proportion(&self) -> Option<f64> {
        (self.size >= 2).then(|| self.num_shared as f64 / self.num_pairs as f64)
    }
}

/// Score every predictor in `hubs` against the edge list
pub fn score_neighborhoods(
    edges: &[(usize, usize)],
    hubs: &[usize],
    num_nodes: usize,
    annotations: &[&[usize]],
) -> Vec<NeighborhoodScore> {
    let mut neighbors: Vec<Vec<usize>> = vec![vec![]; num_nodes];
    for &(x, y) in edges {
        neighbors[x].push(y);
    }

    hubs.iter()
        .map(|&x| {
            let nb = &neighbors[x];
            let mut num_shared = 0;
            for a in 0..nb.len() {
                for b in (a + 1)..nb.len() {
                    if FunctionalSetUniverse::share_any(annotations[nb[a]], annotations[nb[b]]) {
                        num_shared += 1;
                    }
                }
            }
            NeighborhoodScore {
                size: nb.len(),
                num_pairs: nb.len() * nb.len().saturating_sub(1) / 2,
                num_shared,
            }
        })
        .collect()
}

fn mean_proportion(scores: &[NeighborhoodScore]) -> Option<f64> {
    let props: Vec<f64> = scores.iter().filter_map(|s| s.proportion()).collect();
    (!props.is_empty()).then(|| props.iter().sum::<f64>() / props.len() as f64)
}

/// `(1 + #{null >= observed}) / (T + 1)`
pub fn empirical_pvalue(observed: f64, null: &[f64]) -> f64 {
    let nge = null.iter().filter(|&&x| x >= observed).count();
    (1 + nge) as f64 / (null.len() + 1) as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CheckpointLine {
    trial: usize,
    seed: u64,
    mean_proportion: Option<f64>,
}

/// Finished trials recorded by an earlier run with the same base seed.
///
/// A run killed mid-write leaves a partial last line; it is dropped and
/// the file is rewritten with the complete lines so that new trials
/// append cleanly. A malformed line anywhere else is an error.
fn read_checkpoint(
    file: &str,
    base_seed: u64,
    num_trials: usize,
) -> anyhow::Result<BTreeMap<usize, Option<f64>>> {
    let mut done = BTreeMap::new();
    if !std::path::Path::new(file).exists() {
        return Ok(done);
    }
    let reader = std::io::BufReader::new(std::fs::File::open(file)?);
    let lines: Vec<String> = reader
        .lines()
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|l| !l.trim().is_empty())
        .collect();

    let nlines = lines.len();
    let mut complete: Vec<&str> = Vec::with_capacity(nlines);
    for (i, line) in lines.iter().enumerate() {
        let rec: CheckpointLine = match serde_json::from_str(line) {
            Ok(rec) => rec,
            Err(e) if i + 1 == nlines => {
                warn!("{}: dropping incomplete last line ({})", file, e);
                break;
            }
            Err(e) => return Err(anyhow::anyhow!("{}: line {}: {}", file, i + 1, e)),
        };
        if rec.seed != base_seed.wrapping_add(rec.trial as u64) {
            return Err(NetworkError::validation(format!(
                "{}: trial {} was run with seed {}, not {}",
                file,
                rec.trial,
                rec.seed,
                base_seed.wrapping_add(rec.trial as u64)
            )));
        }
        complete.push(line);
        if rec.trial < num_trials {
            done.insert(rec.trial, rec.mean_proportion);
        }
    }

    if complete.len() < nlines {
        let mut writer = std::fs::File::create(file)?;
        for line in complete {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
    }

    info!("resuming: {} of {} trials already in {}", done.len(), num_trials, file);
    Ok(done)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HubNeighborhoodRecord {
    pub id: Box<str>,
    pub alias: Option<Box<str>>,
    pub size: usize,
    pub num_pairs: usize,
    pub num_shared: usize,
    pub proportion: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct HubNeighborhoodReport {
    pub hubs: Vec<HubNeighborhoodRecord>,
    pub observed_mean: Option<f64>,
    /// mean proportion per trial, by trial index
    pub null_means: Vec<Option<f64>>,
    pub null_mean: Option<f64>,
    pub null_sd: Option<f64>,
    pub z_score: Option<f64>,
    pub empirical_pvalue: Option<f64>,
    pub seed: u64,
    pub warnings: Vec<StatisticalWarning>,
}

pub struct HubNeighborhoodTest<'a> {
    args: HubNeighborhoodArgs,
    generator: &'a dyn RandomGraphGenerator,
}

impl<'a> HubNeighborhoodTest<'a> {
    pub fn new(args: HubNeighborhoodArgs, generator: &'a dyn RandomGraphGenerator) -> Self {
        Self { args, generator }
    }

    fn hubs(&self, graph: &NetworkGraph) -> Vec<usize> {
        graph
            .nodes_of_level(Level::X)
            .into_iter()
            .filter(|&i| match (self.args.top_hubs, graph.node(i).rank) {
                (Some(top), Some(r)) => r <= top,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect()
    }

    pub fn run(
        &self,
        graph: &NetworkGraph,
        universe: &FunctionalSetUniverse,
    ) -> anyhow::Result<HubNeighborhoodReport> {
        let seed = resolve_seed(self.args.seed, "hub neighbourhood null");
        let mut report = HubNeighborhoodReport {
            seed,
            ..Default::default()
        };

        let annotations: Vec<&[usize]> = graph
            .nodes()
            .iter()
            .map(|n| universe.sets_of_node(n))
            .collect();
        let responses = graph.nodes_of_level(Level::Y);
        let (ncovered, _) = universe.coverage(responses.iter().map(|&i| graph.node(i)));
        if ncovered == 0 {
            report.warnings.push(StatisticalWarning::new(
                "hub neighbourhood",
                "no response node is in the functional universe",
            ));
        }

        let edges: Vec<(usize, usize)> = graph
            .edges_of_level(EdgeLevel::XY)
            .into_iter()
            .map(|e| graph.endpoints(e))
            .collect();
        let hubs = self.hubs(graph);
        let nn = graph.num_nodes();

        let scores = score_neighborhoods(&edges, &hubs, nn, &annotations);
        for (&i, s) in hubs.iter().zip(scores.iter()) {
            let node = graph.node(i);
            if s.proportion().is_none() {
                report.warnings.push(StatisticalWarning::new(
                    node.id.clone(),
                    format!("neighbourhood of size {} has no pairs; skipped", s.size),
                ));
            }
            report.hubs.push(HubNeighborhoodRecord {
                id: node.id.clone(),
                alias: node.alias.clone(),
                size: s.size,
                num_pairs: s.num_pairs,
                num_shared: s.num_shared,
                proportion: s.proportion(),
            });
        }

        report.observed_mean = mean_proportion(&scores);
        let Some(observed) = report.observed_mean else {
            report.warnings.push(StatisticalWarning::new(
                "hub neighbourhood",
                "no neighbourhood with two or more responses; null not computed",
            ));
            return Ok(report);
        };

        let num_trials = self.args.num_trials;
        let mut done = match self.args.checkpoint.as_deref() {
            Some(file) => read_checkpoint(file, seed, num_trials)?,
            None => BTreeMap::new(),
        };

        let sink = match self.args.checkpoint.as_deref() {
            Some(file) => Some(Mutex::new(
                std::fs::OpenOptions::new().create(true).append(true).open(file)?,
            )),
            None => None,
        };

        let pending: Vec<usize> = (0..num_trials).filter(|t| !done.contains_key(t)).collect();
        let npending = pending.len() as u64;

        let fresh: Vec<(usize, Option<f64>)> = pending
            .into_par_iter()
            .progress_count(npending)
            .map(|t| -> anyhow::Result<(usize, Option<f64>)> {
                let trial_seed = seed.wrapping_add(t as u64);
                let null_edges = self.generator.generate(&edges, trial_seed);
                let m = mean_proportion(&score_neighborhoods(&null_edges, &hubs, nn, &annotations));

                if let Some(sink) = sink.as_ref() {
                    let line = serde_json::to_string(&CheckpointLine {
                        trial: t,
                        seed: trial_seed,
                        mean_proportion: m,
                    })?;
                    let mut file = sink
                        .lock()
                        .map_err(|_| anyhow::anyhow!("checkpoint lock poisoned"))?;
                    writeln!(file, "{}", line)?;
                    file.flush()?;
                }
                Ok((t, m))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        done.extend(fresh);
        report.null_means = done.into_values().collect();

        let null: Vec<f64> = report.null_means.iter().filter_map(|&m| m).collect();
        if null.is_empty() {
            return Ok(report);
        }

        let (mu, sd) = mean_and_sd(&null);
        report.null_mean = Some(mu);
        report.null_sd = Some(sd);
        report.z_score = (sd > 0.0).then(|| (observed - mu) / sd);
        report.empirical_pvalue = Some(empirical_pvalue(observed, &null));

        info!(
            "hub neighbourhood: observed {:.4}, null {:.4} +/- {:.4} over {} trials, p = {:.4}",
            observed,
            mu,
            sd,
            null.len(),
            empirical_pvalue(observed, &null)
        );
        Ok(report)
    }
}

impl EnrichmentEngine {
    /// Hub-neighbourhood coherence against degree-preserving rewiring
    pub fn hub_neighborhood(
        &self,
        graph: &NetworkGraph,
        universe: &FunctionalSetUniverse,
        args: HubNeighborhoodArgs,
    ) -> anyhow::Result<HubNeighborhoodReport> {
        let generator = DegreePreservingRewiring::default();
        HubNeighborhoodTest::new(args, &generator).run(graph, universe)
    }
}
