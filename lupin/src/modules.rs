//! Community structure of the network.
//!
//! The default detector is Girvan–Newman: repeatedly drop the edge of
//! highest betweenness, record each partition into connected
//! components, and keep the partition of highest modularity measured on
//! the full graph. A precomputed assignment can be used instead.

use crate::common::*;
use crate::network::NetworkGraph;
use matrix_util::common_io::read_lines_of_words_delim;
use matrix_util::utils::partition_by_membership;
use std::collections::VecDeque;

/// Anything that partitions the nodes of a graph. Returns a module id
/// per node, in node order.
pub trait CommunityDetector {
    fn detect(&self, graph: &NetworkGraph) -> anyhow::Result<Vec<usize>>;
}

#[derive(Debug, Clone)]
pub struct ModuleArgs {
    /// smallest module to report
    pub min_module_size: usize,
}

impl Default for ModuleArgs {
    fn default() -> Self {
        Self {
            min_module_size: 15,
        }
    }
}

/// Newman–Girvan modularity of `membership` on the graph
pub fn modularity(graph: &NetworkGraph, membership: &[usize]) -> f64 {
    let m = graph.num_edges() as f64;
    if graph.num_edges() == 0 {
        return 0.0;
    }

    let mut internal: HashMap<usize, f64> = HashMap::default();
    let mut total_degree: HashMap<usize, f64> = HashMap::default();

    for e in 0..graph.num_edges() {
        let (i, j) = graph.endpoints(e);
        if membership[i] == membership[j] {
            *internal.entry(membership[i]).or_default() += 1.0;
        }
    }
    for (i, &k) in membership.iter().enumerate() {
        *total_degree.entry(k).or_default() += graph.degree(i) as f64;
    }

    total_degree
        .iter()
        .map(|(k, &d)| {
            let l = internal.get(k).copied().unwrap_or(0.0);
            l / m - (d / (2.0 * m)).powi(2)
        })
        .sum()
}

/// Connected components over the active edges, labelled in order of
/// their smallest node index
fn components(adj: &[Vec<(usize, usize)>]) -> (Vec<usize>, usize) {
    let nn = adj.len();
    let mut label = vec![usize::MAX; nn];
    let mut ncomp = 0;
    for s in 0..nn {
        if label[s] != usize::MAX {
            continue;
        }
        label[s] = ncomp;
        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            for &(w, _) in &adj[v] {
                if label[w] == usize::MAX {
                    label[w] = ncomp;
                    queue.push_back(w);
                }
            }
        }
        ncomp += 1;
    }
    (label, ncomp)
}

/// Brandes accumulation of shortest-path edge dependencies from `s`
fn accumulate_from_source(adj: &[Vec<(usize, usize)>], s: usize, betweenness: &mut [f64]) {
    let nn = adj.len();
    let mut sigma = vec![0.0_f64; nn];
    let mut dist = vec![usize::MAX; nn];
    let mut preds: Vec<Vec<(usize, usize)>> = vec![vec![]; nn];
    let mut stack = Vec::with_capacity(nn);
    let mut queue = VecDeque::from([s]);

    sigma[s] = 1.0;
    dist[s] = 0;

    while let Some(v) = queue.pop_front() {
        stack.push(v);
        for &(w, e) in &adj[v] {
            if dist[w] == usize::MAX {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1 {
                sigma[w] += sigma[v];
                preds[w].push((v, e));
            }
        }
    }

    let mut delta = vec![0.0_f64; nn];
    while let Some(w) = stack.pop() {
        for &(v, e) in &preds[w] {
            let c = sigma[v] / sigma[w] * (1.0 + delta[w]);
            betweenness[e] += c;
            delta[v] += c;
        }
    }
}

/// Shortest-path betweenness of every edge; inactive edges stay 0
pub fn edge_betweenness(adj: &[Vec<(usize, usize)>], num_edges: usize) -> Vec<f64> {
    (0..adj.len())
        .into_par_iter()
        .fold(
            || vec![0.0; num_edges],
            |mut acc, s| {
                accumulate_from_source(adj, s, &mut acc);
                acc
            },
        )
        .reduce(
            || vec![0.0; num_edges],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        )
        .into_iter()
        .map(|x| x / 2.0)
        .collect()
}

#[derive(Debug, Clone)]
pub struct PartitionStep {
    /// edges removed so far
    pub num_removed: usize,
    pub num_modules: usize,
    pub modularity: f64,
    pub membership: Vec<usize>,
}

/// Sequence of partitions produced by edge removal
#[derive(Debug, Clone, Default)]
pub struct ModuleDendrogram {
    pub steps: Vec<PartitionStep>,
}

impl ModuleDendrogram {
    /// Highest modularity; the earliest step wins ties
    pub fn best(&self) -> Option<&PartitionStep> {
        let mut best: Option<&PartitionStep> = None;
        for step in &self.steps {
            match best {
                Some(b) if b.modularity >= step.modularity => {}
                _ => best = Some(step),
            }
        }
        best
    }
}

/// Girvan–Newman on the unweighted graph
#[derive(Debug, Clone, Default)]
pub struct EdgeBetweennessDetector;

impl EdgeBetweennessDetector {
    pub fn dendrogram(&self, graph: &NetworkGraph) -> ModuleDendrogram {
        let nn = graph.num_nodes();
        let ne = graph.num_edges();
        let mut active = vec![true; ne];

        let active_adjacency = |active: &[bool]| -> Vec<Vec<(usize, usize)>> {
            (0..nn)
                .map(|i| {
                    graph
                        .incident_edges(i)
                        .iter()
                        .filter(|&&e| active[e])
                        .map(|&e| {
                            let (s, t) = graph.endpoints(e);
                            (if s == i { t } else { s }, e)
                        })
                        .collect()
                })
                .collect()
        };

        let mut adj = active_adjacency(&active);
        let (membership, num_modules) = components(&adj);
        let mut dendrogram = ModuleDendrogram {
            steps: vec![PartitionStep {
                num_removed: 0,
                modularity: modularity(graph, &membership),
                num_modules,
                membership,
            }],
        };

        for removed in 1..=ne {
            let betweenness = edge_betweenness(&adj, ne);

            let top = betweenness
                .iter()
                .enumerate()
                .filter(|&(e, _)| active[e])
                .map(|(_, &b)| b)
                .fold(f64::NEG_INFINITY, f64::max);
            let tol = 1e-9 * top.abs().max(1.0);

            // lowest index among the (numerically) tied maxima
            let Some(cut) = (0..ne).find(|&e| active[e] && betweenness[e] >= top - tol) else {
                break;
            };
            active[cut] = false;
            adj = active_adjacency(&active);

            let (membership, num_modules) = components(&adj);
            let last = dendrogram.steps.last().map(|s| s.num_modules).unwrap_or(0);
            if num_modules != last {
                let q = modularity(graph, &membership);
                debug!(
                    "removed {} edges: {} modules, modularity {:.4}",
                    removed, num_modules, q
                );
                dendrogram.steps.push(PartitionStep {
                    num_removed: removed,
                    num_modules,
                    modularity: q,
                    membership,
                });
            }
        }

        dendrogram
    }
}

impl CommunityDetector for EdgeBetweennessDetector {
    fn detect(&self, graph: &NetworkGraph) -> anyhow::Result<Vec<usize>> {
        let dendrogram = self.dendrogram(graph);
        match dendrogram.best() {
            Some(best) => {
                info!(
                    "edge betweenness: {} modules at modularity {:.4} after removing {} edges",
                    best.num_modules, best.modularity, best.num_removed
                );
                Ok(best.membership.clone())
            }
            None => Ok(vec![]),
        }
    }
}

/// Node to module labels supplied from elsewhere
#[derive(Debug, Clone)]
pub struct ExternalAssignment {
    labels: HashMap<Box<str>, Box<str>>,
}

impl ExternalAssignment {
    pub fn from_pairs(pairs: Vec<(Box<str>, Box<str>)>) -> anyhow::Result<Self> {
        let mut labels: HashMap<Box<str>, Box<str>> = HashMap::default();
        for (node, module) in pairs {
            if labels.contains_key(&node) {
                return Err(NetworkError::validation(format!(
                    "node {} assigned to more than one module",
                    node
                )));
            }
            labels.insert(node, module);
        }
        Ok(Self { labels })
    }

    /// `node_id module` per line; a first line `node ...` is a header
    pub fn from_file(file: &str) -> anyhow::Result<Self> {
        let read_out = read_lines_of_words_delim(file, &['\t', ',', ' '], -1)?;
        let mut pairs = Vec::with_capacity(read_out.lines.len());
        for (i, words) in read_out.lines.into_iter().enumerate() {
            if words.len() < 2 {
                return Err(NetworkError::validation(format!(
                    "{}: line {} needs `node module`",
                    file,
                    i + 1
                )));
            }
            if i == 0 && words[0].starts_with("node") {
                continue;
            }
            pairs.push((words[0].clone(), words[1].clone()));
        }
        Self::from_pairs(pairs)
    }
}

impl CommunityDetector for ExternalAssignment {
    /// Module ids follow the first appearance of each label in node order
    fn detect(&self, graph: &NetworkGraph) -> anyhow::Result<Vec<usize>> {
        let mut ids: HashMap<&str, usize> = HashMap::default();
        let mut membership = Vec::with_capacity(graph.num_nodes());
        for node in graph.nodes() {
            let label = self.labels.get(&node.id).ok_or_else(|| {
                NetworkError::validation(format!("node {} has no module assignment", node.id))
            })?;
            let next = ids.len();
            membership.push(*ids.entry(label.as_ref()).or_insert(next));
        }
        let unused = self.labels.len().saturating_sub(graph.num_nodes());
        if unused > 0 {
            warn!("{} assigned nodes are not in the network", unused);
        }
        Ok(membership)
    }
}

/// Module membership plus what gets reported
#[derive(Debug, Clone)]
pub struct ModuleSummary {
    pub membership: Vec<usize>,
    pub modularity: f64,
    /// node indexes per module id
    pub modules: BTreeMap<usize, Vec<usize>>,
    /// modules with at least `min_module_size` nodes
    pub reported: Vec<usize>,
    /// edges whose endpoints fall in different modules
    pub cross_module_edges: Vec<usize>,
}

pub struct ModuleDetector {
    detector: Box<dyn CommunityDetector>,
    args: ModuleArgs,
}

impl ModuleDetector {
    pub fn new(detector: Box<dyn CommunityDetector>, args: ModuleArgs) -> Self {
        Self { detector, args }
    }

    pub fn edge_betweenness(args: ModuleArgs) -> Self {
        Self::new(Box::new(EdgeBetweennessDetector), args)
    }

    pub fn external(assignment: ExternalAssignment, args: ModuleArgs) -> Self {
        Self::new(Box::new(assignment), args)
    }

    /// Partition the graph and write `module` into every node
    pub fn annotate(&self, graph: &mut NetworkGraph) -> anyhow::Result<ModuleSummary> {
        let membership = self.detector.detect(graph)?;
        if membership.len() != graph.num_nodes() {
            return Err(NetworkError::validation(format!(
                "{} module labels for {} nodes",
                membership.len(),
                graph.num_nodes()
            )));
        }

        for (i, &k) in membership.iter().enumerate() {
            graph.node_mut(i).module = Some(k);
        }

        Ok(ModuleSummary::new(graph, membership, &self.args))
    }
}

impl ModuleSummary {
    fn new(graph: &NetworkGraph, membership: Vec<usize>, args: &ModuleArgs) -> Self {
        let modules = partition_by_membership(&membership);
        let reported: Vec<usize> = modules
            .iter()
            .filter(|(_, nodes)| nodes.len() >= args.min_module_size)
            .map(|(&k, _)| k)
            .collect();

        let cross_module_edges: Vec<usize> = (0..graph.num_edges())
            .filter(|&e| {
                let (i, j) = graph.endpoints(e);
                membership[i] != membership[j]
            })
            .collect();

        let q = modularity(graph, &membership);
        info!(
            "{} modules ({} with >= {} nodes), {} cross-module edges, modularity {:.4}",
            modules.len(),
            reported.len(),
            args.min_module_size,
            cross_module_edges.len(),
            q
        );

        Self {
            membership,
            modularity: q,
            modules,
            reported,
            cross_module_edges,
        }
    }

    /// Summarise the `module` ids already written into the graph
    pub fn from_graph(graph: &NetworkGraph, args: &ModuleArgs) -> anyhow::Result<Self> {
        let membership = graph
            .nodes()
            .iter()
            .map(|n| {
                n.module.ok_or_else(|| {
                    NetworkError::validation(format!("node {} carries no module", n.id))
                })
            })
            .collect::<anyhow::Result<Vec<usize>>>()?;
        Ok(Self::new(graph, membership, args))
    }
}
