//! Over-representation of functional sets in network modules.

use crate::common::*;
use crate::functional_sets::FunctionalSetUniverse;
use crate::modules::ModuleSummary;
use crate::network::{Level, NetworkGraph};
use statrs::distribution::{DiscreteCDF, Hypergeometric};

/// One-sided test for over-representation
pub trait HypergeometricTest: Sync {
    /// `P(X >= observed)` where `X` counts successes among `draws`
    /// taken without replacement from `population` items, `successes`
    /// of which are successes
    fn upper_tail(
        &self,
        population: u64,
        successes: u64,
        draws: u64,
        observed: u64,
    ) -> anyhow::Result<f64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatrsHypergeometric;

impl HypergeometricTest for StatrsHypergeometric {
    fn upper_tail(
        &self,
        population: u64,
        successes: u64,
        draws: u64,
        observed: u64,
    ) -> anyhow::Result<f64> {
        if observed == 0 {
            return Ok(1.0);
        }
        let distrib = Hypergeometric::new(population, successes, draws)?;
        // P(X >= k) = sf(k - 1)
        Ok(distrib.sf(observed - 1).clamp(0.0, 1.0))
    }
}

/// Benjamini–Hochberg adjusted p-values in input order. Adjusted
/// values never decrease with the raw p-value rank.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));

    let mut adjusted = vec![0.0; n];
    let mut prev = f64::INFINITY;
    for r in (0..n).rev() {
        let i = order[r];
        let adj = (pvalues[i] * n as f64 / (r + 1) as f64).min(1.0).min(prev);
        adjusted[i] = adj;
        prev = adj;
    }
    adjusted
}

#[derive(Debug, Clone)]
pub struct EnrichmentArgs {
    /// report pairs with adjusted p-value at or below this
    pub fdr: f64,
}

impl Default for EnrichmentArgs {
    fn default() -> Self {
        Self { fdr: 0.05 }
    }
}

/// One tested (module, functional set) pair
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRecord {
    pub module: usize,
    /// index into the functional universe
    pub set: usize,
    pub set_name: Box<str>,
    /// annotated responses in the network
    pub population: usize,
    /// members of the set among them
    pub successes: usize,
    /// annotated responses in the module
    pub draws: usize,
    /// members of the set in the module
    pub observed: usize,
    pub pvalue: f64,
    pub padj: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleEnrichment {
    pub fdr: f64,
    /// every tested pair, by module then set
    pub tested: Vec<EnrichmentRecord>,
    pub warnings: Vec<StatisticalWarning>,
}

impl ModuleEnrichment {
    /// Pairs passing the FDR threshold, smallest adjusted p first
    pub fn significant(&self) -> Vec<&EnrichmentRecord> {
        let mut ret: Vec<&EnrichmentRecord> = self
            .tested
            .iter()
            .filter(|r| r.padj <= self.fdr)
            .collect();
        ret.sort_by(|a, b| {
            a.padj
                .total_cmp(&b.padj)
                .then(a.pvalue.total_cmp(&b.pvalue))
                .then(a.module.cmp(&b.module))
                .then(a.set.cmp(&b.set))
        });
        ret
    }
}

/// Records of one module and the warning raised when it is skipped
type ModuleTests = (Vec<EnrichmentRecord>, Option<StatisticalWarning>);

pub struct EnrichmentEngine {
    pub(crate) args: EnrichmentArgs,
    test: Box<dyn HypergeometricTest>,
}

impl EnrichmentEngine {
    pub fn new(args: EnrichmentArgs) -> Self {
        Self::with_test(args, Box::new(StatrsHypergeometric))
    }

    pub fn with_test(args: EnrichmentArgs, test: Box<dyn HypergeometricTest>) -> Self {
        Self { args, test }
    }

    /// Hypergeometric test of every reported module against every
    /// functional set, with BH correction across all pairs.
    /// The population is the set of annotated response nodes.
    pub fn module_enrichment(
        &self,
        graph: &NetworkGraph,
        modules: &ModuleSummary,
        universe: &FunctionalSetUniverse,
    ) -> anyhow::Result<ModuleEnrichment> {
        let annotated: Vec<usize> = graph
            .nodes_of_level(Level::Y)
            .into_iter()
            .filter(|&i| !universe.sets_of_node(graph.node(i)).is_empty())
            .collect();
        let population = annotated.len();

        let mut ret = ModuleEnrichment {
            fdr: self.args.fdr,
            ..Default::default()
        };

        if population == 0 {
            ret.warnings.push(StatisticalWarning::new(
                "module enrichment",
                "no response node is in the functional universe",
            ));
            return Ok(ret);
        }

        let mut successes = vec![0_usize; universe.len()];
        for &i in &annotated {
            for &k in universe.sets_of_node(graph.node(i)) {
                successes[k] += 1;
            }
        }

        let is_annotated: HashSet<usize> = annotated.iter().copied().collect();

        let per_module: Vec<anyhow::Result<ModuleTests>> = modules
            .reported
            .par_iter()
            .map(|&m| {
                let members: Vec<usize> = modules
                    .modules
                    .get(&m)
                    .map(|v| v.iter().copied().filter(|i| is_annotated.contains(i)).collect())
                    .unwrap_or_default();

                if members.is_empty() {
                    let w = StatisticalWarning::new(
                        format!("module {}", m),
                        "no annotated response nodes; not tested",
                    );
                    return Ok((vec![], Some(w)));
                }

                let mut observed = vec![0_usize; universe.len()];
                for &i in &members {
                    for &k in universe.sets_of_node(graph.node(i)) {
                        observed[k] += 1;
                    }
                }

                // every set is tested, including those with no overlap
                let mut records = Vec::with_capacity(universe.len());
                for (k, obs) in observed.into_iter().enumerate() {
                    let pvalue = self.test.upper_tail(
                        population as u64,
                        successes[k] as u64,
                        members.len() as u64,
                        obs as u64,
                    )?;
                    records.push(EnrichmentRecord {
                        module: m,
                        set: k,
                        set_name: universe.get(k).name.clone(),
                        population,
                        successes: successes[k],
                        draws: members.len(),
                        observed: obs,
                        pvalue,
                        padj: 1.0,
                    });
                }
                Ok((records, None))
            })
            .collect();

        for res in per_module {
            let (records, warning) = res?;
            ret.tested.extend(records);
            ret.warnings.extend(warning);
        }

        let pvalues: Vec<f64> = ret.tested.iter().map(|r| r.pvalue).collect();
        for (r, padj) in ret.tested.iter_mut().zip(benjamini_hochberg(&pvalues)) {
            r.padj = padj;
        }

        info!(
            "tested {} module x set pairs over {} modules; {} at FDR {}",
            ret.tested.len(),
            modules.reported.len(),
            ret.significant().len(),
            self.args.fdr
        );
        Ok(ret)
    }
}

/// Tag each node with the significant sets of its module that contain
/// it. Returns the number of tagged nodes.
pub fn tag_functional_terms(
    graph: &mut NetworkGraph,
    enrichment: &ModuleEnrichment,
    universe: &FunctionalSetUniverse,
) -> usize {
    let mut by_module: HashMap<usize, Vec<usize>> = HashMap::default();
    for r in enrichment.significant() {
        by_module.entry(r.module).or_default().push(r.set);
    }

    let mut ntagged = 0;
    for i in 0..graph.num_nodes() {
        let node = graph.node(i);
        let Some(sets) = node.module.and_then(|m| by_module.get(&m)) else {
            continue;
        };
        let own = universe.sets_of_node(node);
        let mut terms: Vec<Box<str>> = sets
            .iter()
            .filter(|&&k| own.binary_search(&k).is_ok())
            .map(|&k| universe.get(k).name.clone())
            .collect();
        terms.sort();
        if !terms.is_empty() {
            ntagged += 1;
        }
        graph.node_mut(i).functional_terms = terms;
    }
    ntagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functional_sets::{FunctionalSet, FunctionalSetArgs};
    use crate::modules::{ExternalAssignment, ModuleArgs, ModuleDetector};
    use crate::network::*;
    use approx::assert_relative_eq;
    use genomic_data::interval::GenomicInterval;
    use statrs::function::factorial::binomial;

    fn ids(prefix: &str, range: std::ops::Range<usize>) -> Vec<Box<str>> {
        range.map(|i| format!("{}{}", prefix, i).into()).collect()
    }

    /// 20 responses and one predictor; module "a" = g0..g4 plus the
    /// predictor, module "b" = g5..g19
    fn fixture() -> anyhow::Result<(NetworkGraph, ModuleSummary, FunctionalSetUniverse)> {
        let mut nodes = vec![NetworkNode::new(
            "c0".into(),
            Level::X,
            None,
            GenomicInterval::default(),
        )];
        for id in ids("g", 0..20) {
            nodes.push(NetworkNode::new(id, Level::Y, None, GenomicInterval::default()));
        }
        let mut g = NetworkGraph::from_parts(nodes, vec![])?;

        let mut pairs = vec![("c0".into(), "a".into())];
        for (i, id) in ids("g", 0..20).into_iter().enumerate() {
            pairs.push((id, if i < 5 { "a".into() } else { "b".into() }));
        }
        let summary = ModuleDetector::external(
            ExternalAssignment::from_pairs(pairs)?,
            ModuleArgs { min_module_size: 1 },
        )
        .annotate(&mut g)?;

        let universe = FunctionalSetUniverse::new(
            vec![
                FunctionalSet::new("S".into(), None, ids("g", 0..5)),
                FunctionalSet::new("T".into(), None, ids("g", 5..20)),
                FunctionalSet::new("U".into(), None, ids("g", 3..8)),
            ],
            &FunctionalSetArgs {
                min_size: 1,
                max_size: 100,
            },
        )?;
        Ok((g, summary, universe))
    }

    #[test]
    fn test_identical_module_has_minimal_pvalue() -> anyhow::Result<()> {
        let (g, summary, universe) = fixture()?;
        let res = EnrichmentEngine::new(EnrichmentArgs::default())
            .module_enrichment(&g, &summary, &universe)?;

        let rec = res
            .tested
            .iter()
            .find(|r| r.module == 0 && &*r.set_name == "S")
            .unwrap();
        assert_eq!((rec.population, rec.successes, rec.draws, rec.observed), (20, 5, 5, 5));
        assert_relative_eq!(rec.pvalue, 1.0 / binomial(20, 5), max_relative = 1e-6);

        assert!(res.significant().iter().any(|r| &*r.set_name == "S"));
        assert!(res.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn test_every_module_set_pair_is_corrected() -> anyhow::Result<()> {
        let (g, summary, universe) = fixture()?;
        let res = EnrichmentEngine::new(EnrichmentArgs::default())
            .module_enrichment(&g, &summary, &universe)?;
        assert_eq!(res.tested.len(), summary.reported.len() * universe.len());

        // module "a" never touches T
        let none = res
            .tested
            .iter()
            .find(|r| r.module == 0 && &*r.set_name == "T")
            .unwrap();
        assert_eq!(none.observed, 0);
        assert_eq!(none.pvalue, 1.0);

        // two pairs share the smallest p over six tests
        let p = 1.0 / binomial(20, 5);
        let rec = res
            .tested
            .iter()
            .find(|r| r.module == 0 && &*r.set_name == "S")
            .unwrap();
        assert_relative_eq!(rec.padj, p * 6.0 / 2.0, max_relative = 1e-6);
        Ok(())
    }

    #[test]
    fn test_tagging_follows_significant_sets() -> anyhow::Result<()> {
        let (mut g, summary, universe) = fixture()?;
        let res = EnrichmentEngine::new(EnrichmentArgs::default())
            .module_enrichment(&g, &summary, &universe)?;
        let ntagged = tag_functional_terms(&mut g, &res, &universe);
        assert!(ntagged > 0);
        let g0 = g.node_index("g0").unwrap();
        assert_eq!(g.node(g0).functional_terms, vec![Box::<str>::from("S")]);
        assert!(g.node(0).functional_terms.is_empty());
        Ok(())
    }

    #[test]
    fn test_unannotated_module_warns() -> anyhow::Result<()> {
        let (g, mut summary, universe) = fixture()?;
        summary.modules.insert(7, vec![0]);
        summary.reported.push(7);
        let res = EnrichmentEngine::new(EnrichmentArgs::default())
            .module_enrichment(&g, &summary, &universe)?;
        assert_eq!(res.warnings.len(), 1);
        assert_eq!(&*res.warnings[0].unit, "module 7");
        Ok(())
    }

    #[test]
    fn test_empty_universe_is_not_an_error() -> anyhow::Result<()> {
        let (g, summary, _) = fixture()?;
        let res = EnrichmentEngine::new(EnrichmentArgs::default()).module_enrichment(
            &g,
            &summary,
            &FunctionalSetUniverse::default(),
        )?;
        assert!(res.tested.is_empty());
        assert_eq!(res.warnings.len(), 1);
        Ok(())
    }

    #[test]
    fn test_bh_known_values() {
        let adj = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.005]);
        for (a, b) in adj.iter().zip([0.02, 0.04, 0.04, 0.02]) {
            assert_relative_eq!(*a, b, max_relative = 1e-12);
        }
        assert!(benjamini_hochberg(&[]).is_empty());
    }

    #[test]
    fn test_bh_monotone_in_raw_rank() {
        let p = [0.2, 0.001, 0.05, 0.01, 0.5, 0.049];
        let adj = benjamini_hochberg(&p);
        let mut pairs: Vec<(f64, f64)> = p.iter().copied().zip(adj).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert!(pairs.windows(2).all(|w| w[0].1 <= w[1].1));
        assert!(pairs.iter().all(|&(raw, adj)| adj >= raw && adj <= 1.0));
    }
}
