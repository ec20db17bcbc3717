//! Hub ranking by degree, optionally stabilised over bootstrap
//! replicates of the fitted network.

use crate::common::*;
use crate::network::{Level, NetworkGraph};
use matrix_util::sparse_io::NamedTriplets;
use matrix_util::utils::mean_and_sd;

/// Degree of every node in every bootstrap replicate
#[derive(Debug, Clone)]
pub struct BootstrapDegreeEnsemble {
    pub node_ids: Vec<Box<str>>,
    /// `degrees[r][i]`: degree of `node_ids[i]` in replicate `r`
    pub degrees: Vec<Vec<usize>>,
}

impl BootstrapDegreeEnsemble {
    pub fn from_degrees(node_ids: Vec<Box<str>>, degrees: Vec<Vec<usize>>) -> anyhow::Result<Self> {
        let mut seen: HashSet<&str> = HashSet::default();
        for x in &node_ids {
            if !seen.insert(x.as_ref()) {
                return Err(NetworkError::validation(format!("duplicate ensemble node: {}", x)));
            }
        }
        if let Some(r) = degrees.iter().position(|d| d.len() != node_ids.len()) {
            return Err(NetworkError::validation(format!(
                "replicate {} has {} degrees for {} nodes",
                r,
                degrees[r].len(),
                node_ids.len()
            )));
        }
        Ok(Self { node_ids, degrees })
    }

    /// Count degrees from each replicate's edge list. Repeated pairs
    /// count once; nodes missing from a replicate have degree 0.
    pub fn from_replicate_edges(
        node_ids: Vec<Box<str>>,
        replicates: &[Vec<(Box<str>, Box<str>)>],
    ) -> anyhow::Result<Self> {
        let index: HashMap<&str, usize> = node_ids
            .iter()
            .enumerate()
            .map(|(i, x)| (x.as_ref(), i))
            .collect();
        let nn = node_ids.len();

        let degrees: Vec<Vec<usize>> = replicates
            .par_iter()
            .progress_count(replicates.len() as u64)
            .map(|edges| {
                let mut seen: HashSet<(&str, &str)> = HashSet::default();
                let mut deg = vec![0; nn];
                for (a, b) in edges {
                    let (a, b) = (a.as_ref(), b.as_ref());
                    if a == b || !seen.insert((a.min(b), a.max(b))) {
                        continue;
                    }
                    if let Some(&i) = index.get(a) {
                        deg[i] += 1;
                    }
                    if let Some(&j) = index.get(b) {
                        deg[j] += 1;
                    }
                }
                deg
            })
            .collect();

        info!("degrees of {} nodes over {} replicates", nn, degrees.len());
        Self::from_degrees(node_ids, degrees)
    }

    /// One `row col weight` triplet file per replicate
    pub fn from_triplet_files(node_ids: Vec<Box<str>>, files: &[Box<str>]) -> anyhow::Result<Self> {
        let replicates = files
            .iter()
            .map(|f| {
                let trip = NamedTriplets::from_file(f)?;
                Ok(trip.triplets.into_iter().map(|(r, c, _)| (r, c)).collect())
            })
            .collect::<anyhow::Result<Vec<Vec<_>>>>()?;
        Self::from_replicate_edges(node_ids, &replicates)
    }

    pub fn num_replicates(&self) -> usize {
        self.degrees.len()
    }
}

/// 1-based ranks by descending degree, ties by ascending id
pub fn rank_by_degree(ids: &[&str], degrees: &[usize]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..ids.len()).collect();
    order.sort_by(|&a, &b| degrees[b].cmp(&degrees[a]).then_with(|| ids[a].cmp(ids[b])));
    let mut ranks = vec![0; ids.len()];
    for (r, &i) in order.iter().enumerate() {
        ranks[i] = r + 1;
    }
    ranks
}

#[derive(Debug, Clone, PartialEq)]
pub struct HubRecord {
    pub id: Box<str>,
    pub alias: Option<Box<str>>,
    pub level: Level,
    pub degree: usize,
    /// position in the final order, starting at 1
    pub rank: usize,
    pub mean_rank: f64,
    /// only defined with an ensemble
    pub sd_rank: Option<f64>,
}

pub struct HubRanker {
    level: Level,
}

impl HubRanker {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Hub records of one level in final order
    pub fn rank(
        &self,
        graph: &NetworkGraph,
        ensemble: Option<&BootstrapDegreeEnsemble>,
    ) -> anyhow::Result<Vec<HubRecord>> {
        let members = graph.nodes_of_level(self.level);
        let ids: Vec<&str> = members.iter().map(|&i| graph.node(i).id.as_ref()).collect();
        let degrees: Vec<usize> = members.iter().map(|&i| graph.degree(i)).collect();

        let ensemble = ensemble.filter(|ens| {
            if ens.num_replicates() == 0 {
                warn!("empty bootstrap ensemble; ranking by degree only");
            }
            ens.num_replicates() > 0
        });

        let stats: Vec<(f64, Option<f64>)> = match ensemble {
            None => rank_by_degree(&ids, &degrees)
                .into_iter()
                .map(|r| (r as f64, None))
                .collect(),
            Some(ens) => self
                .replicate_rank_stats(graph, &members, &ids, ens)?
                .into_iter()
                .map(|(m, s)| (m, Some(s)))
                .collect(),
        };

        let mut order: Vec<usize> = (0..members.len()).collect();
        order.sort_by(|&a, &b| {
            stats[a]
                .0
                .total_cmp(&stats[b].0)
                .then_with(|| {
                    let sa = stats[a].1.unwrap_or(0.0);
                    let sb = stats[b].1.unwrap_or(0.0);
                    sa.total_cmp(&sb)
                })
                .then_with(|| ids[a].cmp(ids[b]))
        });

        Ok(order
            .into_iter()
            .enumerate()
            .map(|(r, k)| {
                let node = graph.node(members[k]);
                HubRecord {
                    id: node.id.clone(),
                    alias: node.alias.clone(),
                    level: self.level,
                    degree: degrees[k],
                    rank: r + 1,
                    mean_rank: stats[k].0,
                    sd_rank: stats[k].1,
                }
            })
            .collect())
    }

    /// Mean and sample standard deviation of each member's
    /// within-replicate rank
    fn replicate_rank_stats(
        &self,
        graph: &NetworkGraph,
        members: &[usize],
        ids: &[&str],
        ens: &BootstrapDegreeEnsemble,
    ) -> anyhow::Result<Vec<(f64, f64)>> {
        // ensemble column of each level member, if any
        let mut column: Vec<Option<usize>> = vec![None; members.len()];
        let position: HashMap<usize, usize> = members
            .iter()
            .enumerate()
            .map(|(k, &i)| (i, k))
            .collect();

        for (c, id) in ens.node_ids.iter().enumerate() {
            let Some(i) = graph.node_index(id) else {
                return Err(NetworkError::validation(format!(
                    "ensemble node {} is not in the network",
                    id
                )));
            };
            if let Some(&k) = position.get(&i) {
                column[k] = Some(c);
            }
        }

        let nmissing = column.iter().filter(|c| c.is_none()).count();
        if nmissing > 0 {
            warn!("{} {} nodes absent from every replicate", nmissing, self.level);
        }

        let replicate_ranks: Vec<Vec<usize>> = ens
            .degrees
            .par_iter()
            .map(|deg| {
                let local: Vec<usize> = column
                    .iter()
                    .map(|c| c.map(|c| deg[c]).unwrap_or(0))
                    .collect();
                rank_by_degree(ids, &local)
            })
            .collect();

        Ok((0..members.len())
            .map(|k| {
                let rr: Vec<f64> = replicate_ranks.iter().map(|r| r[k] as f64).collect();
                mean_and_sd(&rr)
            })
            .collect())
    }

    /// Rank and write `rank`, `mean_rank`, `sd_rank` into the graph
    pub fn annotate(
        &self,
        graph: &mut NetworkGraph,
        ensemble: Option<&BootstrapDegreeEnsemble>,
    ) -> anyhow::Result<Vec<HubRecord>> {
        let records = self.rank(graph, ensemble)?;
        for rec in &records {
            if let Some(i) = graph.node_index(&rec.id) {
                let node = graph.node_mut(i);
                node.rank = Some(rec.rank);
                node.mean_rank = Some(rec.mean_rank);
                node.sd_rank = rec.sd_rank;
            }
        }
        info!("ranked {} {} nodes", records.len(), self.level);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::*;
    use approx::assert_abs_diff_eq;
    use genomic_data::interval::GenomicInterval;

    fn star_graph() -> NetworkGraph {
        // x:A -> 3 responses, x:B -> 1, x:C -> 3
        let mut nodes = vec![];
        for id in ["A", "B", "C"] {
            nodes.push(NetworkNode::new(id.into(), Level::X, None, GenomicInterval::default()));
        }
        for id in ["g1", "g2", "g3"] {
            nodes.push(NetworkNode::new(id.into(), Level::Y, None, GenomicInterval::default()));
        }
        let mut edges = vec![];
        for (s, t) in [
            ("A", "g1"),
            ("A", "g2"),
            ("A", "g3"),
            ("B", "g1"),
            ("C", "g1"),
            ("C", "g2"),
            ("C", "g3"),
        ] {
            edges.push(NetworkEdge {
                source: s.into(),
                target: t.into(),
                level: EdgeLevel::XY,
                weight: 1.0,
                cis_trans: None,
            });
        }
        NetworkGraph::from_parts(nodes, edges).unwrap()
    }

    #[test]
    fn test_rank_by_degree_ties_by_id() {
        assert_eq!(rank_by_degree(&["b", "a", "c"], &[2, 2, 5]), vec![3, 2, 1]);
    }

    #[test]
    fn test_degree_only() -> anyhow::Result<()> {
        let mut g = star_graph();
        let recs = HubRanker::new(Level::X).annotate(&mut g, None)?;
        let ids: Vec<&str> = recs.iter().map(|r| r.id.as_ref()).collect();
        assert_eq!(ids, vec!["A", "C", "B"]);
        assert_eq!(recs[0].mean_rank, 1.0);
        assert!(recs.iter().all(|r| r.sd_rank.is_none()));
        assert_eq!(g.node(2).rank, Some(2));
        assert!(g.node(3).rank.is_none());
        Ok(())
    }

    #[test]
    fn test_stable_hub_precedes_alternating_one() -> anyhow::Result<()> {
        let g = star_graph();
        let ens = BootstrapDegreeEnsemble::from_degrees(
            vec!["A".into(), "B".into(), "C".into()],
            vec![vec![10, 5, 3], vec![10, 2, 3], vec![10, 5, 3], vec![10, 2, 3]],
        )?;
        let recs = HubRanker::new(Level::X).rank(&g, Some(&ens))?;
        let ids: Vec<&str> = recs.iter().map(|r| r.id.as_ref()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(recs[0].mean_rank, 1.0);
        assert_eq!(recs[0].sd_rank, Some(0.0));
        assert_abs_diff_eq!(recs[1].mean_rank, 2.5);
        assert!(recs[0].mean_rank < recs[1].mean_rank);
        Ok(())
    }

    #[test]
    fn test_lower_sd_breaks_mean_ties() -> anyhow::Result<()> {
        let g = star_graph();
        // B stays at rank 2; A and C alternate between 1 and 3
        let ens = BootstrapDegreeEnsemble::from_degrees(
            vec!["A".into(), "B".into(), "C".into()],
            vec![vec![9, 5, 1], vec![1, 5, 9], vec![9, 5, 1], vec![1, 5, 9]],
        )?;
        let recs = HubRanker::new(Level::X).rank(&g, Some(&ens))?;
        let ids: Vec<&str> = recs.iter().map(|r| r.id.as_ref()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
        Ok(())
    }

    #[test]
    fn test_from_replicate_edges() -> anyhow::Result<()> {
        let e = |a: &str, b: &str| (Box::<str>::from(a), Box::<str>::from(b));
        let ens = BootstrapDegreeEnsemble::from_replicate_edges(
            vec!["A".into(), "B".into(), "g1".into()],
            &[vec![e("A", "g1"), e("g1", "A"), e("B", "g1")], vec![e("A", "g2")]],
        )?;
        assert_eq!(ens.degrees, vec![vec![1, 1, 2], vec![1, 0, 0]]);
        Ok(())
    }

    #[test]
    fn test_unknown_ensemble_node() -> anyhow::Result<()> {
        let g = star_graph();
        let ens = BootstrapDegreeEnsemble::from_degrees(vec!["Z".into()], vec![vec![1]])?;
        let err = HubRanker::new(Level::X).rank(&g, Some(&ens)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NetworkError>(),
            Some(NetworkError::Validation(_))
        ));
        Ok(())
    }
}
