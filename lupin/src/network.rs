//! Attributed predictor/response graph.
//!
//! Nodes and edges carry a fixed attribute schema. Structural fields are
//! set once at construction; the annotation fields (`rank`, `module`,
//! cis/trans counts, functional terms) are filled in later stages.

use crate::common::*;
use genomic_data::interval::GenomicInterval;
use serde::{Deserialize, Serialize};

/// Predictor (`x`, e.g. copy-number interval) or response (`y`, e.g.
/// transcript or protein abundance)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "x")]
    X,
    #[serde(rename = "y")]
    Y,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::X => write!(f, "x"),
            Level::Y => write!(f, "y"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeLevel {
    #[serde(rename = "x-y")]
    XY,
    #[serde(rename = "y-y")]
    YY,
}

impl std::fmt::Display for EdgeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeLevel::XY => write!(f, "x-y"),
            EdgeLevel::YY => write!(f, "y-y"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CisTrans {
    Cis,
    Trans,
    Unknown,
}

impl std::fmt::Display for CisTrans {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CisTrans::Cis => write!(f, "cis"),
            CisTrans::Trans => write!(f, "trans"),
            CisTrans::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: Box<str>,
    pub level: Level,
    #[serde(default)]
    pub alias: Option<Box<str>>,
    #[serde(flatten)]
    pub interval: GenomicInterval,

    #[serde(default)]
    pub rank: Option<usize>,
    #[serde(default)]
    pub mean_rank: Option<f64>,
    #[serde(default)]
    pub sd_rank: Option<f64>,

    #[serde(default)]
    pub module: Option<usize>,

    #[serde(default)]
    pub num_cis: Option<usize>,
    #[serde(default)]
    pub num_trans: Option<usize>,
    #[serde(default)]
    pub num_potential_cis: Option<usize>,
    #[serde(default)]
    pub cis_aliases: Vec<Box<str>>,

    #[serde(default)]
    pub functional_terms: Vec<Box<str>>,
}

impl NetworkNode {
    pub fn new(
        id: Box<str>,
        level: Level,
        alias: Option<Box<str>>,
        interval: GenomicInterval,
    ) -> Self {
        Self {
            id,
            level,
            alias,
            interval,
            rank: None,
            mean_rank: None,
            sd_rank: None,
            module: None,
            num_cis: None,
            num_trans: None,
            num_potential_cis: None,
            cis_aliases: vec![],
            functional_terms: vec![],
        }
    }

    /// Alias if present, otherwise the id
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub source: Box<str>,
    pub target: Box<str>,
    pub level: EdgeLevel,
    pub weight: f32,
    #[serde(default)]
    pub cis_trans: Option<CisTrans>,
}

/// Undirected simple graph over predictor and response nodes
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    nodes: Vec<NetworkNode>,
    edges: Vec<NetworkEdge>,
    node_index: HashMap<Box<str>, usize>,
    endpoints: Vec<(usize, usize)>,
    /// neighbour node indexes per node, ascending
    adjacency: Vec<Vec<usize>>,
    /// incident edge indexes per node, ascending
    incidence: Vec<Vec<usize>>,
}

impl NetworkGraph {
    /// Assemble a graph and check its structural invariants: unique
    /// node ids, edges between known nodes, no self-loops or duplicate
    /// edges, and edge levels consistent with node levels.
    pub fn from_parts(nodes: Vec<NetworkNode>, edges: Vec<NetworkEdge>) -> anyhow::Result<Self> {
        let mut node_index: HashMap<Box<str>, usize> = HashMap::default();
        for (i, n) in nodes.iter().enumerate() {
            if node_index.insert(n.id.clone(), i).is_some() {
                return Err(NetworkError::validation(format!("duplicate node id: {}", n.id)));
            }
        }

        let nn = nodes.len();
        let mut endpoints = Vec::with_capacity(edges.len());
        let mut adjacency: Vec<Vec<usize>> = vec![vec![]; nn];
        let mut incidence: Vec<Vec<usize>> = vec![vec![]; nn];
        let mut seen: HashSet<(usize, usize)> = HashSet::default();

        for (e, edge) in edges.iter().enumerate() {
            let lookup = |id: &str| {
                node_index.get(id).copied().ok_or_else(|| {
                    NetworkError::data_integrity(format!("edge refers to unknown node: {}", id))
                })
            };
            let i = lookup(&edge.source)?;
            let j = lookup(&edge.target)?;

            if i == j {
                return Err(NetworkError::validation(format!("self-loop on {}", edge.source)));
            }

            let expected = match (nodes[i].level, nodes[j].level) {
                (Level::X, Level::Y) => Some(EdgeLevel::XY),
                (Level::Y, Level::Y) => Some(EdgeLevel::YY),
                _ => None,
            };
            if expected != Some(edge.level) {
                return Err(NetworkError::validation(format!(
                    "edge {} -- {} has level {} but joins {} and {} nodes",
                    edge.source, edge.target, edge.level, nodes[i].level, nodes[j].level
                )));
            }

            if !seen.insert((i.min(j), i.max(j))) {
                return Err(NetworkError::validation(format!(
                    "duplicate edge {} -- {}",
                    edge.source, edge.target
                )));
            }

            endpoints.push((i, j));
            adjacency[i].push(j);
            adjacency[j].push(i);
            incidence[i].push(e);
            incidence[j].push(e);
        }

        adjacency.iter_mut().for_each(|x| x.sort_unstable());

        Ok(Self {
            nodes,
            edges,
            node_index,
            endpoints,
            adjacency,
            incidence,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[NetworkNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[NetworkEdge] {
        &self.edges
    }

    pub fn node(&self, i: usize) -> &NetworkNode {
        &self.nodes[i]
    }

    pub fn edge(&self, e: usize) -> &NetworkEdge {
        &self.edges[e]
    }

    /// Attribute fields only; structure is fixed after construction
    pub fn node_mut(&mut self, i: usize) -> &mut NetworkNode {
        &mut self.nodes[i]
    }

    pub fn set_edge_cis_trans(&mut self, e: usize, label: CisTrans) {
        self.edges[e].cis_trans = Some(label);
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    /// Node indexes `(source, target)` of an edge
    pub fn endpoints(&self, e: usize) -> (usize, usize) {
        self.endpoints[e]
    }

    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.adjacency[i]
    }

    pub fn incident_edges(&self, i: usize) -> &[usize] {
        &self.incidence[i]
    }

    pub fn degree(&self, i: usize) -> usize {
        self.adjacency[i].len()
    }

    pub fn nodes_of_level(&self, level: Level) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].level == level)
            .collect()
    }

    pub fn edges_of_level(&self, level: EdgeLevel) -> Vec<usize> {
        (0..self.edges.len())
            .filter(|&e| self.edges[e].level == level)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, level: Level) -> NetworkNode {
        NetworkNode::new(id.into(), level, None, GenomicInterval::default())
    }

    fn edge(s: &str, t: &str, level: EdgeLevel) -> NetworkEdge {
        NetworkEdge {
            source: s.into(),
            target: t.into(),
            level,
            weight: 1.0,
            cis_trans: None,
        }
    }

    #[test]
    fn test_adjacency_and_degree() -> anyhow::Result<()> {
        let g = NetworkGraph::from_parts(
            vec![node("c1", Level::X), node("g1", Level::Y), node("g2", Level::Y)],
            vec![
                edge("c1", "g2", EdgeLevel::XY),
                edge("c1", "g1", EdgeLevel::XY),
                edge("g1", "g2", EdgeLevel::YY),
            ],
        )?;
        assert_eq!(g.neighbors(0), &[1, 2]);
        assert_eq!(g.degree(1), 2);
        assert_eq!(g.incident_edges(2), &[0, 2]);
        assert_eq!(g.nodes_of_level(Level::Y), vec![1, 2]);
        assert_eq!(g.edges_of_level(EdgeLevel::YY), vec![2]);
        Ok(())
    }

    #[test]
    fn test_invalid_structures() {
        let dup = NetworkGraph::from_parts(vec![node("a", Level::X), node("a", Level::Y)], vec![]);
        assert!(matches!(
            dup.unwrap_err().downcast_ref::<NetworkError>(),
            Some(NetworkError::Validation(_))
        ));

        let dangling = NetworkGraph::from_parts(
            vec![node("a", Level::X)],
            vec![edge("a", "b", EdgeLevel::XY)],
        );
        assert!(matches!(
            dangling.unwrap_err().downcast_ref::<NetworkError>(),
            Some(NetworkError::DataIntegrity(_))
        ));

        let wrong_level = NetworkGraph::from_parts(
            vec![node("a", Level::X), node("b", Level::Y)],
            vec![edge("a", "b", EdgeLevel::YY)],
        );
        assert!(wrong_level.is_err());

        let twice = NetworkGraph::from_parts(
            vec![node("a", Level::Y), node("b", Level::Y)],
            vec![edge("a", "b", EdgeLevel::YY), edge("b", "a", EdgeLevel::YY)],
        );
        assert!(twice.is_err());
    }
}
