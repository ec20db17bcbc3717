use crate::common::*;
use crate::network::{CisTrans, EdgeLevel, Level, NetworkGraph};
use genomic_data::interval::{Distance, GenomicInterval};
use genomic_data::interval_index::GenomicIntervalIndex;

#[derive(Debug, Clone)]
pub struct CisTransArgs {
    /// maximum gap in bp, inclusive, for a cis link
    pub cis_window: u64,
}

impl Default for CisTransArgs {
    fn default() -> Self {
        Self {
            cis_window: 2_000_000,
        }
    }
}

/// `Cis` when both intervals sit on one chromosome at most `window`
/// apart (overlap is distance 0); `Trans` when farther or on different
/// chromosomes; `Unknown` when either side is unresolved
pub fn classify_pair(a: &GenomicInterval, b: &GenomicInterval, window: u64) -> CisTrans {
    match a.distance(b) {
        Distance::Unknown => CisTrans::Unknown,
        d => match d.within(window) {
            Some(true) => CisTrans::Cis,
            _ => CisTrans::Trans,
        },
    }
}

/// Per-predictor cis/trans counts
#[derive(Debug, Clone, PartialEq)]
pub struct CisTransSummary {
    pub id: Box<str>,
    pub alias: Option<Box<str>>,
    pub num_cis: usize,
    pub num_trans: usize,
    pub num_unknown: usize,
    /// responses within the window, linked or not; `None` when the
    /// predictor has no usable interval
    pub num_potential_cis: Option<usize>,
    pub cis_aliases: Vec<Box<str>>,
}

pub struct CisTransClassifier {
    args: CisTransArgs,
}

impl CisTransClassifier {
    pub fn new(args: CisTransArgs) -> Self {
        Self { args }
    }

    /// Label of every x-y edge, by edge index
    pub fn classify_edges(&self, graph: &NetworkGraph) -> Vec<(usize, CisTrans)> {
        graph
            .edges_of_level(EdgeLevel::XY)
            .into_iter()
            .map(|e| {
                let (s, t) = graph.endpoints(e);
                let label = classify_pair(
                    &graph.node(s).interval,
                    &graph.node(t).interval,
                    self.args.cis_window,
                );
                (e, label)
            })
            .collect()
    }

    /// Label x-y edges and fill in the cis/trans fields of predictor
    /// nodes. Returns one summary per predictor in node order.
    pub fn annotate(&self, graph: &mut NetworkGraph) -> Vec<CisTransSummary> {
        let labels = self.classify_edges(graph);

        let responses = graph.nodes_of_level(Level::Y);
        let response_index = GenomicIntervalIndex::new(
            responses
                .iter()
                .map(|&i| graph.node(i).interval.clone())
                .collect(),
        );
        if response_index.num_unresolved() > 0 {
            warn!(
                "{} of {} responses have no usable interval",
                response_index.num_unresolved(),
                response_index.len()
            );
        }

        let predictors = graph.nodes_of_level(Level::X);
        let mut summaries: Vec<CisTransSummary> = predictors
            .iter()
            .map(|&i| {
                let node = graph.node(i);
                let num_potential_cis = node.interval.is_resolved().then(|| {
                    response_index
                        .within(&node.interval, self.args.cis_window)
                        .len()
                });
                CisTransSummary {
                    id: node.id.clone(),
                    alias: node.alias.clone(),
                    num_cis: 0,
                    num_trans: 0,
                    num_unknown: 0,
                    num_potential_cis,
                    cis_aliases: vec![],
                }
            })
            .collect();

        let slot: HashMap<usize, usize> = predictors
            .iter()
            .enumerate()
            .map(|(k, &i)| (i, k))
            .collect();

        for &(e, label) in &labels {
            let (s, t) = graph.endpoints(e);
            if let Some(&k) = slot.get(&s) {
                let summary = &mut summaries[k];
                match label {
                    CisTrans::Cis => {
                        summary.num_cis += 1;
                        summary.cis_aliases.push(graph.node(t).display_name().into());
                    }
                    CisTrans::Trans => summary.num_trans += 1,
                    CisTrans::Unknown => summary.num_unknown += 1,
                }
            }
        }

        for (e, label) in labels.iter().copied() {
            graph.set_edge_cis_trans(e, label);
        }

        for (k, &i) in predictors.iter().enumerate() {
            let summary = &summaries[k];
            let node = graph.node_mut(i);
            node.num_cis = Some(summary.num_cis);
            node.num_trans = Some(summary.num_trans);
            node.num_potential_cis = summary.num_potential_cis;
            node.cis_aliases = summary.cis_aliases.clone();
        }

        let ncis: usize = summaries.iter().map(|s| s.num_cis).sum();
        let ntrans: usize = summaries.iter().map(|s| s.num_trans).sum();
        info!(
            "{} cis, {} trans, {} unknown x-y edges (window = {} bp)",
            ncis,
            ntrans,
            labels.len() - ncis - ntrans,
            self.args.cis_window
        );

        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{NetworkEdge, NetworkNode};

    fn iv(chr: &str, s: i64, e: i64) -> GenomicInterval {
        GenomicInterval::from_coords(chr, s, e).unwrap()
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let cw = 1_000;
        let x = iv("1", 100, 200);
        assert_eq!(classify_pair(&x, &iv("1", 200 + cw as i64, 2_000), cw), CisTrans::Cis);
        assert_eq!(classify_pair(&x, &iv("1", 201 + cw as i64, 2_000), cw), CisTrans::Trans);
        assert_eq!(classify_pair(&x, &iv("1", 150, 160), cw), CisTrans::Cis);
        assert_eq!(classify_pair(&x, &iv("2", 100, 200), cw), CisTrans::Trans);
        assert_eq!(classify_pair(&x, &GenomicInterval::default(), cw), CisTrans::Unknown);
    }

    #[test]
    fn test_annotate_predictors() -> anyhow::Result<()> {
        let node = |id: &str, level, interval| {
            NetworkNode::new(id.into(), level, Some(format!("{}_a", id).into()), interval)
        };
        let nodes = vec![
            node("c1", Level::X, iv("chr1", 1_000, 2_000)),
            node("c2", Level::X, GenomicInterval::default()),
            node("g1", Level::Y, iv("1", 2_500, 3_000)),
            node("g2", Level::Y, iv("1", 900_000, 901_000)),
            node("g3", Level::Y, iv("2", 1_000, 2_000)),
            node("g4", Level::Y, iv("1", 1_500, 1_600)),
        ];
        let edge = |s: &str, t: &str| NetworkEdge {
            source: s.into(),
            target: t.into(),
            level: EdgeLevel::XY,
            weight: 1.0,
            cis_trans: None,
        };
        let mut g = NetworkGraph::from_parts(
            nodes,
            vec![edge("c1", "g1"), edge("c1", "g2"), edge("c1", "g3"), edge("c2", "g1")],
        )?;

        let summaries =
            CisTransClassifier::new(CisTransArgs { cis_window: 10_000 }).annotate(&mut g);

        assert_eq!(summaries[0].num_cis, 1);
        assert_eq!(summaries[0].num_trans, 2);
        assert_eq!(summaries[0].num_potential_cis, Some(2));
        assert_eq!(summaries[0].cis_aliases, vec![Box::from("g1_a")]);
        assert_eq!(summaries[1].num_unknown, 1);
        assert_eq!(summaries[1].num_potential_cis, None);

        assert_eq!(g.edge(0).cis_trans, Some(CisTrans::Cis));
        assert_eq!(g.edge(2).cis_trans, Some(CisTrans::Trans));
        assert_eq!(g.edge(3).cis_trans, Some(CisTrans::Unknown));
        assert_eq!(g.node(0).num_potential_cis, Some(2));
        Ok(())
    }
}
