use crate::common::*;
use crate::feature_matrix::FeatureMatrix;
use crate::network::*;
use genomic_data::bed::{read_interval_table, IntervalRecord};
use matrix_util::sparse_io::NamedTriplets;

/// Sparse adjacency whose rows and columns are addressed by node id
#[derive(Debug, Clone)]
pub struct Adjacency {
    pub row_ids: Vec<Box<str>>,
    pub col_ids: Vec<Box<str>>,
    pub values: CsrMat,
}

fn check_unique(ids: &[Box<str>], what: &str) -> anyhow::Result<()> {
    let mut seen: HashSet<&str> = HashSet::default();
    for x in ids {
        if !seen.insert(x.as_ref()) {
            return Err(NetworkError::validation(format!("duplicate {} id: {}", what, x)));
        }
    }
    Ok(())
}

impl Adjacency {
    pub fn new(
        row_ids: Vec<Box<str>>,
        col_ids: Vec<Box<str>>,
        values: CsrMat,
    ) -> anyhow::Result<Self> {
        if values.nrows() != row_ids.len() || values.ncols() != col_ids.len() {
            return Err(NetworkError::validation(format!(
                "adjacency is {} x {} but has {} row and {} column ids",
                values.nrows(),
                values.ncols(),
                row_ids.len(),
                col_ids.len()
            )));
        }
        check_unique(&row_ids, "row")?;
        check_unique(&col_ids, "column")?;
        Ok(Self {
            row_ids,
            col_ids,
            values,
        })
    }

    /// Place named triplets on the given row/column order. A triplet
    /// naming an id outside these orders is a dangling reference.
    pub fn from_triplets(
        triplets: &NamedTriplets,
        row_ids: Vec<Box<str>>,
        col_ids: Vec<Box<str>>,
    ) -> anyhow::Result<Self> {
        let (values, unmatched) = triplets.to_csr(&row_ids, &col_ids);
        if !unmatched.is_empty() {
            return Err(NetworkError::data_integrity(format!(
                "{} adjacency ids have no attribute record, e.g. {}",
                unmatched.len(),
                unmatched[0]
            )));
        }
        Self::new(row_ids, col_ids, values)
    }

    pub fn nnz(&self) -> usize {
        self.values.nnz()
    }
}

/// Node attributes of one level, keyed by id
#[derive(Debug, Clone)]
pub struct AttributeTable {
    pub level: Level,
    records: Vec<IntervalRecord>,
    index: HashMap<Box<str>, usize>,
}

impl AttributeTable {
    pub fn new(level: Level, records: Vec<IntervalRecord>) -> anyhow::Result<Self> {
        let mut index: HashMap<Box<str>, usize> = HashMap::default();
        for (i, r) in records.iter().enumerate() {
            if index.insert(r.id.clone(), i).is_some() {
                return Err(NetworkError::validation(format!(
                    "duplicate {} attribute id: {}",
                    level, r.id
                )));
            }
        }
        Ok(Self {
            level,
            records,
            index,
        })
    }

    pub fn from_file(level: Level, file: &str) -> anyhow::Result<Self> {
        Self::new(level, read_interval_table(file)?)
    }

    pub fn from_features(xx: &FeatureMatrix) -> anyhow::Result<Self> {
        Self::new(xx.level, xx.interval_records())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<Box<str>> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&IntervalRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    fn node(&self, id: &str) -> anyhow::Result<NetworkNode> {
        let rec = self.get(id).ok_or_else(|| {
            NetworkError::data_integrity(format!(
                "{} node {} has no attribute record",
                self.level, id
            ))
        })?;
        Ok(NetworkNode::new(
            rec.id.clone(),
            self.level,
            rec.alias.clone(),
            rec.interval.clone(),
        ))
    }
}

/// Assemble the attributed predictor/response graph from fitted
/// adjacency matrices
pub struct NetworkBuilder<'a> {
    predictors: &'a AttributeTable,
    responses: &'a AttributeTable,
}

impl<'a> NetworkBuilder<'a> {
    pub fn new(
        predictors: &'a AttributeTable,
        responses: &'a AttributeTable,
    ) -> anyhow::Result<Self> {
        if predictors.level != Level::X || responses.level != Level::Y {
            return Err(NetworkError::validation(format!(
                "expected x and y attribute tables, got {} and {}",
                predictors.level, responses.level
            )));
        }
        Ok(Self {
            predictors,
            responses,
        })
    }

    /// Nodes are the predictors in `a_xy` row order followed by the
    /// responses in `a_xy` column order. Edges are the nonzero entries
    /// of `a_xy` (row-major) followed by the upper triangle of `a_yy`.
    pub fn build(
        &self,
        a_xy: &Adjacency,
        a_yy: Option<&Adjacency>,
    ) -> anyhow::Result<NetworkGraph> {
        if a_xy.row_ids.len() != self.predictors.len()
            || a_xy.col_ids.len() != self.responses.len()
        {
            return Err(NetworkError::validation(format!(
                "A_xy is {} x {} but there are {} predictor and {} response records",
                a_xy.row_ids.len(),
                a_xy.col_ids.len(),
                self.predictors.len(),
                self.responses.len()
            )));
        }

        let mut nodes = Vec::with_capacity(a_xy.row_ids.len() + a_xy.col_ids.len());
        for id in &a_xy.row_ids {
            nodes.push(self.predictors.node(id)?);
        }
        for id in &a_xy.col_ids {
            nodes.push(self.responses.node(id)?);
        }

        let mut edges: Vec<NetworkEdge> = a_xy
            .values
            .triplet_iter()
            .filter(|&(_, _, &w)| w != 0.0)
            .map(|(i, j, &w)| NetworkEdge {
                source: a_xy.row_ids[i].clone(),
                target: a_xy.col_ids[j].clone(),
                level: EdgeLevel::XY,
                weight: w,
                cis_trans: None,
            })
            .collect();
        let num_xy = edges.len();

        if let Some(a_yy) = a_yy {
            check_response_adjacency(a_yy, &a_xy.col_ids)?;
            edges.extend(
                a_yy.values
                    .triplet_iter()
                    .filter(|&(i, j, &w)| i < j && w != 0.0)
                    .map(|(i, j, &w)| NetworkEdge {
                        source: a_yy.row_ids[i].clone(),
                        target: a_yy.col_ids[j].clone(),
                        level: EdgeLevel::YY,
                        weight: w,
                        cis_trans: None,
                    }),
            );
        }

        info!(
            "network: {} + {} nodes, {} x-y and {} y-y edges",
            a_xy.row_ids.len(),
            a_xy.col_ids.len(),
            num_xy,
            edges.len() - num_xy
        );

        NetworkGraph::from_parts(nodes, edges)
    }
}

/// `a_yy` must be square over the response ids, symmetric and free of
/// self-links
fn check_response_adjacency(a_yy: &Adjacency, responses: &[Box<str>]) -> anyhow::Result<()> {
    if a_yy.row_ids != a_yy.col_ids {
        return Err(NetworkError::validation(
            "A_yy rows and columns must list the same ids in the same order",
        ));
    }
    if a_yy.row_ids.len() != responses.len() {
        return Err(NetworkError::validation(format!(
            "A_yy is {} x {} but A_xy has {} responses",
            a_yy.row_ids.len(),
            a_yy.row_ids.len(),
            responses.len()
        )));
    }

    let known: HashSet<&str> = responses.iter().map(|x| x.as_ref()).collect();
    if let Some(x) = a_yy.row_ids.iter().find(|x| !known.contains(x.as_ref())) {
        return Err(NetworkError::data_integrity(format!(
            "A_yy id {} is not a response of A_xy",
            x
        )));
    }

    let entries: HashMap<(usize, usize), f32> = a_yy
        .values
        .triplet_iter()
        .filter(|&(_, _, &w)| w != 0.0)
        .map(|(i, j, &w)| ((i, j), w))
        .collect();

    for (&(i, j), &w) in entries.iter() {
        if i == j {
            return Err(NetworkError::validation(format!(
                "A_yy has a nonzero diagonal at {}",
                a_yy.row_ids[i]
            )));
        }
        if entries.get(&(j, i)) != Some(&w) {
            return Err(NetworkError::validation(format!(
                "A_yy is not symmetric at ({}, {})",
                a_yy.row_ids[i], a_yy.col_ids[j]
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use genomic_data::interval::GenomicInterval;
    use nalgebra_sparse::CooMatrix;

    fn ids(xs: &[&str]) -> Vec<Box<str>> {
        xs.iter().map(|&x| x.into()).collect()
    }

    fn table(level: Level, xs: &[&str]) -> AttributeTable {
        let records = xs
            .iter()
            .map(|&x| IntervalRecord {
                id: x.into(),
                interval: GenomicInterval::default(),
                alias: Some(format!("{}_alias", x).into()),
            })
            .collect();
        AttributeTable::new(level, records).unwrap()
    }

    fn csr(nrow: usize, ncol: usize, entries: &[(usize, usize, f32)]) -> CsrMat {
        let mut coo = CooMatrix::new(nrow, ncol);
        for &(i, j, w) in entries {
            coo.push(i, j, w);
        }
        CsrMat::from(&coo)
    }

    #[test]
    fn test_build_orders_nodes_and_edges() -> anyhow::Result<()> {
        let xs = table(Level::X, &["c2", "c1"]);
        let ys = table(Level::Y, &["g1", "g2", "g3"]);
        let a_xy = Adjacency::new(
            ids(&["c1", "c2"]),
            ids(&["g1", "g2", "g3"]),
            csr(2, 3, &[(1, 0, 0.5), (0, 2, -0.3)]),
        )?;
        let a_yy = Adjacency::new(
            ids(&["g1", "g2", "g3"]),
            ids(&["g1", "g2", "g3"]),
            csr(3, 3, &[(0, 1, 0.2), (1, 0, 0.2)]),
        )?;

        let g = NetworkBuilder::new(&xs, &ys)?.build(&a_xy, Some(&a_yy))?;
        let node_ids: Vec<&str> = g.nodes().iter().map(|n| n.id.as_ref()).collect();
        assert_eq!(node_ids, vec!["c1", "c2", "g1", "g2", "g3"]);
        assert_eq!(g.node(0).alias.as_deref(), Some("c1_alias"));

        let edge_list: Vec<(&str, &str, f32)> = g
            .edges()
            .iter()
            .map(|e| (e.source.as_ref(), e.target.as_ref(), e.weight))
            .collect();
        assert_eq!(
            edge_list,
            vec![("c1", "g3", -0.3), ("c2", "g1", 0.5), ("g1", "g2", 0.2)]
        );
        assert_eq!(g.edge(2).level, EdgeLevel::YY);
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch() -> anyhow::Result<()> {
        let xs = table(Level::X, &["c1"]);
        let ys = table(Level::Y, &["g1", "g2"]);
        let a_xy = Adjacency::new(ids(&["c1"]), ids(&["g1"]), csr(1, 1, &[(0, 0, 1.0)]))?;
        let err = NetworkBuilder::new(&xs, &ys)?.build(&a_xy, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NetworkError>(),
            Some(NetworkError::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_dangling_id() -> anyhow::Result<()> {
        let xs = table(Level::X, &["c1"]);
        let ys = table(Level::Y, &["g1"]);
        let a_xy = Adjacency::new(ids(&["c9"]), ids(&["g1"]), csr(1, 1, &[(0, 0, 1.0)]))?;
        let err = NetworkBuilder::new(&xs, &ys)?.build(&a_xy, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NetworkError>(),
            Some(NetworkError::DataIntegrity(_))
        ));

        let trip = NamedTriplets {
            triplets: vec![("c1".into(), "g7".into(), 1.0)],
        };
        let err = Adjacency::from_triplets(&trip, ids(&["c1"]), ids(&["g1"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NetworkError>(),
            Some(NetworkError::DataIntegrity(_))
        ));
        Ok(())
    }

    #[test]
    fn test_asymmetric_or_looped_response_adjacency() -> anyhow::Result<()> {
        let xs = table(Level::X, &["c1"]);
        let ys = table(Level::Y, &["g1", "g2"]);
        let a_xy = Adjacency::new(ids(&["c1"]), ids(&["g1", "g2"]), csr(1, 2, &[(0, 0, 1.0)]))?;
        let builder = NetworkBuilder::new(&xs, &ys)?;

        let asym = Adjacency::new(
            ids(&["g1", "g2"]),
            ids(&["g1", "g2"]),
            csr(2, 2, &[(0, 1, 1.0)]),
        )?;
        assert!(builder.build(&a_xy, Some(&asym)).is_err());

        let looped = Adjacency::new(
            ids(&["g1", "g2"]),
            ids(&["g1", "g2"]),
            csr(2, 2, &[(1, 1, 1.0)]),
        )?;
        assert!(builder.build(&a_xy, Some(&looped)).is_err());
        Ok(())
    }

    #[test]
    fn test_shared_id_across_levels_rejected() -> anyhow::Result<()> {
        let xs = table(Level::X, &["a"]);
        let ys = table(Level::Y, &["a"]);
        let a_xy = Adjacency::new(ids(&["a"]), ids(&["a"]), csr(1, 1, &[]))?;
        let err = NetworkBuilder::new(&xs, &ys)?.build(&a_xy, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NetworkError>(),
            Some(NetworkError::Validation(_))
        ));
        Ok(())
    }
}
