//! Density-based clustering of highly correlated feature columns.
//!
//! Dissimilarity between two features is `1 - |cor(x_i, x_j)|`. A
//! feature is a core point when at least `min_pts` features (itself
//! included) lie within `eps`; clusters are the sets connected through
//! chains of core points. Features reachable from no core point stay
//! in cluster 0. Each non-trivial cluster is collapsed into one feature
//! whose values are the mean of its members.

use crate::common::*;
use crate::feature_matrix::FeatureMatrix;
use genomic_data::interval::{cytoband_arm, normalize_chr, GenomicInterval};
use matrix_util::correlation::{abs_correlation_dissimilarity, mean_of_columns};
use nalgebra_sparse::CooMatrix;
use ndarray::Array2;

/// cluster id reserved for features that were not clustered
pub const INDEPENDENT: usize = 0;

#[derive(Debug, Clone)]
pub struct CorrelationClusterArgs {
    /// reachability radius on `1 - |correlation|`
    pub eps: f64,
    /// minimum neighbourhood size, counting the point itself
    pub min_pts: usize,
    /// features per parallel job when computing dissimilarities
    pub block_size: usize,
}

impl Default for CorrelationClusterArgs {
    fn default() -> Self {
        Self {
            eps: 1e-3,
            min_pts: 2,
            block_size: 100,
        }
    }
}

/// Cluster assignment per feature
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationClusters {
    /// cluster id per feature; 0 = independent
    pub membership: Vec<usize>,
    /// whether each feature is a core point
    pub is_core: Vec<bool>,
    /// number of clusters with id > 0
    pub num_clusters: usize,
}

impl CorrelationClusters {
    /// Member feature indexes of cluster `k`, in input order
    pub fn members(&self, k: usize) -> Vec<usize> {
        (0..self.membership.len())
            .filter(|&i| self.membership[i] == k)
            .collect()
    }
}

/// DBSCAN over a precomputed dissimilarity matrix. Features are visited
/// in input order and expansion proceeds in ascending index order, so
/// a border point reachable from two clusters joins the one found first.
pub fn density_clusters(dissim: &Array2<f64>, eps: f64, min_pts: usize) -> CorrelationClusters {
    let nn = dissim.nrows();

    let neighbourhoods: Vec<Vec<usize>> = (0..nn)
        .into_par_iter()
        .map(|i| {
            (0..nn)
                .filter(|&j| j == i || dissim[[i, j]] <= eps)
                .collect::<Vec<_>>()
        })
        .collect();

    let is_core: Vec<bool> = neighbourhoods.iter().map(|nb| nb.len() >= min_pts).collect();

    let mut membership = vec![INDEPENDENT; nn];
    let mut num_clusters = 0;

    for i in 0..nn {
        if membership[i] != INDEPENDENT || !is_core[i] {
            continue;
        }

        num_clusters += 1;
        membership[i] = num_clusters;

        let mut queue: std::collections::VecDeque<usize> =
            neighbourhoods[i].iter().copied().collect();
        while let Some(j) = queue.pop_front() {
            if membership[j] != INDEPENDENT {
                continue;
            }
            membership[j] = num_clusters;
            if is_core[j] {
                queue.extend(
                    neighbourhoods[j]
                        .iter()
                        .copied()
                        .filter(|&k| membership[k] == INDEPENDENT),
                );
            }
        }
    }

    CorrelationClusters {
        membership,
        is_core,
        num_clusters,
    }
}

/// Name for a collapsed cluster.
///
/// Identical member names collapse to that name. Otherwise the unique
/// `-`-separated tokens, sorted by [`token_order`], become a range
/// `first-last` when the members are adjacent columns. Non-adjacent
/// members on one chromosome arm are joined with `,`; anything else
/// with `|`.
pub fn cluster_name(names: &[Box<str>], members: &[usize]) -> Box<str> {
    let mut unique: Vec<&str> = vec![];
    for &i in members {
        if !unique.contains(&names[i].as_ref()) {
            unique.push(&names[i]);
        }
    }
    unique.sort_by(|a, b| token_order(a, b));

    if unique.len() == 1 {
        return unique[0].into();
    }

    let mut tokens: Vec<&str> = vec![];
    for name in &unique {
        for tok in name.split('-').filter(|t| !t.is_empty()) {
            if !tokens.contains(&tok) {
                tokens.push(tok);
            }
        }
    }

    tokens.sort_by(|a, b| token_order(a, b));

    let adjacent = members.windows(2).all(|w| w[1] == w[0] + 1);

    if adjacent {
        match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) if first != last => {
                return format!("{}-{}", first, last).into();
            }
            (Some(only), _) => return (*only).into(),
            _ => {}
        }
    }

    let arms: Vec<_> = unique.iter().map(|x| cytoband_arm(x)).collect();
    let same_arm = arms[0].is_some() && arms.iter().all(|a| *a == arms[0]);

    if same_arm {
        tokens.join(",").into()
    } else {
        unique.join("|").into()
    }
}

/// Cytoband names go first, from pter to qter along each chromosome;
/// other names follow in lexical order
pub fn token_order(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (cytoband_position(a), cytoband_position(b)) {
        (Some((ca, pa)), Some((cb, pb))) => ca
            .cmp(&cb)
            .then(pa.total_cmp(&pb))
            .then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// `(chromosome rank, signed band)`; p bands are negative so that they
/// count down towards the centromere
fn cytoband_position(name: &str) -> Option<(u32, f64)> {
    let (chr, arm) = cytoband_arm(name)?;
    let rank = match chr {
        "X" => 23,
        "Y" => 24,
        "M" | "MT" => 25,
        c => c.parse::<u32>().unwrap_or(u32::MAX),
    };
    let band: f64 = normalize_chr(name)[(chr.len() + 1)..].parse().unwrap_or(0.0);
    Some((rank, if arm == 'p' { -band } else { band }))
}

/// Members of a collapsed cluster must not overlap each other on the
/// genome; overlapping members mean the input has duplicated entries.
fn check_member_overlaps(
    xx: &FeatureMatrix,
    cluster: usize,
    members: &[usize],
) -> anyhow::Result<()> {
    for (a, &i) in members.iter().enumerate() {
        for &j in &members[(a + 1)..] {
            if xx.intervals[i].overlap(&xx.intervals[j]) == Some(true) {
                return Err(NetworkError::data_integrity(format!(
                    "cluster {}: {} ({}) overlaps {} ({})",
                    cluster,
                    xx.features[i],
                    xx.intervals[i],
                    xx.features[j],
                    xx.intervals[j]
                )));
            }
        }
    }
    Ok(())
}

/// The reduced feature set plus the bookkeeping that maps it back
#[derive(Debug, Clone)]
pub struct CollapsedFeatures {
    pub clusters: CorrelationClusters,
    /// original feature indexes behind each output feature
    pub groups: Vec<Vec<usize>>,
    /// output feature index per original feature
    pub output_of: Vec<usize>,
    pub original_features: Vec<Box<str>>,
    /// one column per independent feature and per cluster
    pub matrix: FeatureMatrix,
}

/// One line of the membership table
pub struct ClusterMembershipRecord {
    pub feature: Box<str>,
    pub cluster: usize,
    pub collapsed: Box<str>,
}

impl CollapsedFeatures {
    pub fn num_output(&self) -> usize {
        self.groups.len()
    }

    pub fn membership_records(&self) -> Vec<ClusterMembershipRecord> {
        self.original_features
            .iter()
            .enumerate()
            .map(|(i, f)| ClusterMembershipRecord {
                feature: f.clone(),
                cluster: self.clusters.membership[i],
                collapsed: self.matrix.features[self.output_of[i]].clone(),
            })
            .collect()
    }

    /// Project an adjacency whose rows are the original features onto
    /// the collapsed features. A collapsed row links to the union of
    /// its members' neighbours; each link keeps the member weight with
    /// the largest magnitude (first member on ties).
    pub fn collapse_adjacency_rows(&self, adj: &CsrMat) -> anyhow::Result<CsrMat> {
        if adj.nrows() != self.original_features.len() {
            return Err(NetworkError::validation(format!(
                "adjacency has {} rows but {} features were clustered",
                adj.nrows(),
                self.original_features.len()
            )));
        }

        let mut strongest: BTreeMap<(usize, usize), f32> = BTreeMap::new();
        for (i, j, &w) in adj.triplet_iter() {
            if w == 0.0 {
                continue;
            }
            let key = (self.output_of[i], j);
            match strongest.get(&key) {
                Some(prev) if prev.abs() >= w.abs() => {}
                _ => {
                    strongest.insert(key, w);
                }
            }
        }

        let mut coo = CooMatrix::new(self.num_output(), adj.ncols());
        for ((i, j), w) in strongest {
            coo.push(i, j, w);
        }
        Ok(CsrMat::from(&coo))
    }
}

pub struct CorrelationClusterer {
    args: CorrelationClusterArgs,
}

impl CorrelationClusterer {
    pub fn new(args: CorrelationClusterArgs) -> anyhow::Result<Self> {
        if !(args.eps >= 0.0) {
            return Err(NetworkError::validation(format!("eps must be >= 0: {}", args.eps)));
        }
        if args.min_pts == 0 {
            return Err(NetworkError::validation("min_pts must be >= 1"));
        }
        Ok(Self { args })
    }

    pub fn cluster(&self, xx: &FeatureMatrix) -> anyhow::Result<CorrelationClusters> {
        let dissim = abs_correlation_dissimilarity(&xx.data, self.args.block_size)?;
        let clusters = density_clusters(&dissim, self.args.eps, self.args.min_pts);
        info!(
            "{} features -> {} clusters, {} independent (eps = {}, min_pts = {})",
            xx.num_features(),
            clusters.num_clusters,
            clusters.membership.iter().filter(|&&k| k == INDEPENDENT).count(),
            self.args.eps,
            self.args.min_pts
        );
        Ok(clusters)
    }

    /// Cluster, check genomic independence of cluster members, and
    /// average each cluster into one feature. Output features follow
    /// the input order of their first member.
    pub fn collapse(&self, xx: &FeatureMatrix) -> anyhow::Result<CollapsedFeatures> {
        let clusters = self.cluster(xx)?;
        let nfeat = xx.num_features();

        let mut groups: Vec<Vec<usize>> = vec![];
        let mut output_of = vec![0; nfeat];
        let mut group_of_cluster: HashMap<usize, usize> = HashMap::default();

        for i in 0..nfeat {
            let k = clusters.membership[i];
            if k == INDEPENDENT {
                output_of[i] = groups.len();
                groups.push(vec![i]);
            } else if let Some(&g) = group_of_cluster.get(&k) {
                output_of[i] = g;
                groups[g].push(i);
            } else {
                group_of_cluster.insert(k, groups.len());
                output_of[i] = groups.len();
                groups.push(vec![i]);
            }
        }

        for (g, members) in groups.iter().enumerate() {
            if members.len() > 1 {
                check_member_overlaps(xx, clusters.membership[members[0]], members)
                    .map_err(|e| e.context(format!("collapsed feature {}", g)))?;
            }
        }

        let mut names: Vec<Box<str>> = Vec::with_capacity(groups.len());
        let mut used: HashSet<Box<str>> = HashSet::default();
        for members in &groups {
            let mut name = cluster_name(&xx.features, members);
            if used.contains(&name) {
                name = format!("{}#{}", name, clusters.membership[members[0]]).into();
            }
            used.insert(name.clone());
            names.push(name);
        }

        let columns: Vec<ndarray::Array1<f32>> = groups
            .par_iter()
            .map(|members| mean_of_columns(&xx.data, members))
            .collect();

        let mut data = Mat::zeros((xx.num_samples(), groups.len()));
        for (g, col) in columns.into_iter().enumerate() {
            data.column_mut(g).assign(&col);
        }

        let intervals = groups
            .iter()
            .map(|members| GenomicInterval::span(members.iter().map(|&i| &xx.intervals[i])))
            .collect();

        let matrix = FeatureMatrix::new(xx.level, xx.samples.clone(), names, data, intervals)?;

        info!(
            "collapsed {} features into {}",
            nfeat,
            matrix.num_features()
        );

        Ok(CollapsedFeatures {
            clusters,
            groups,
            output_of,
            original_features: xx.features.clone(),
            matrix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Level;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal};

    fn names(xs: &[&str]) -> Vec<Box<str>> {
        xs.iter().map(|&x| x.into()).collect()
    }

    fn random_matrix(nn: usize, dd: usize, seed: u64) -> Mat {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        Mat::from_shape_fn((nn, dd), |_| StandardNormal.sample(&mut rng))
    }

    fn features(data: Mat) -> FeatureMatrix {
        let samples = (0..data.nrows()).map(|i| format!("s{}", i).into()).collect();
        let feats = (0..data.ncols()).map(|j| format!("f{}", j).into()).collect();
        FeatureMatrix::without_intervals(Level::X, samples, feats, data).unwrap()
    }

    fn is_partition(cl: &CorrelationClusters) -> bool {
        let mut count = 0;
        for k in 0..=cl.num_clusters {
            count += cl.members(k).len();
        }
        count == cl.membership.len() && (1..=cl.num_clusters).all(|k| !cl.members(k).is_empty())
    }

    #[test]
    fn test_tiny_eps_leaves_everything_independent() -> anyhow::Result<()> {
        let xx = features(random_matrix(30, 8, 1));
        let clusterer = CorrelationClusterer::new(CorrelationClusterArgs {
            eps: 1e-9,
            ..Default::default()
        })?;
        let cl = clusterer.cluster(&xx)?;
        assert_eq!(cl.num_clusters, 0);
        assert!(cl.membership.iter().all(|&k| k == INDEPENDENT));
        assert!(is_partition(&cl));
        Ok(())
    }

    #[test]
    fn test_eps_one_collapses_everything() -> anyhow::Result<()> {
        let xx = features(random_matrix(30, 8, 2));
        let clusterer = CorrelationClusterer::new(CorrelationClusterArgs {
            eps: 1.0,
            ..Default::default()
        })?;
        let cl = clusterer.cluster(&xx)?;
        assert_eq!(cl.num_clusters, 1);
        assert!(cl.membership.iter().all(|&k| k == 1));
        assert!(is_partition(&cl));
        Ok(())
    }

    #[test]
    fn test_identical_columns_collapse_to_their_mean() -> anyhow::Result<()> {
        let data = array![
            [1.0f32, 1.0, 0.3],
            [2.0, 2.0, -1.0],
            [3.0, 3.0, 0.7],
            [5.0, 5.0, 0.1]
        ];
        let xx = features(data.clone());
        let clusterer = CorrelationClusterer::new(CorrelationClusterArgs {
            eps: 1e-9,
            ..Default::default()
        })?;
        let out = clusterer.collapse(&xx)?;
        assert_eq!(out.clusters.membership, vec![1, 1, 0]);
        assert_eq!(out.num_output(), 2);
        assert_eq!(out.matrix.data.column(0), data.column(0));
        assert_eq!(out.matrix.data.column(1), data.column(2));
        assert_eq!(&*out.matrix.features[0], "f0-f1");
        Ok(())
    }

    #[test]
    fn test_scaled_columns_average_exactly() -> anyhow::Result<()> {
        let data = array![[1.0f32, 3.0, 0.0], [2.0, 6.0, 1.0], [4.0, 12.0, 0.0]];
        let xx = features(data);
        let out = CorrelationClusterer::new(Default::default())?.collapse(&xx)?;
        assert_eq!(out.matrix.data.column(0), array![2.0f32, 4.0, 8.0]);
        assert_eq!(out.output_of, vec![0, 0, 1]);
        Ok(())
    }

    #[test]
    fn test_border_point_joins_first_cluster() {
        // 1 is the only core point; 0 and 2 border it, 3 is isolated
        let dd = array![
            [0.0, 0.1, 0.5, 1.0],
            [0.1, 0.0, 0.2, 1.0],
            [0.5, 0.2, 0.0, 1.0],
            [1.0, 1.0, 1.0, 0.0]
        ];
        let cl = density_clusters(&dd, 0.2, 3);
        assert_eq!(cl.is_core, vec![false, true, false, false]);
        assert_eq!(cl.membership, vec![1, 1, 1, 0]);
    }

    #[test]
    fn test_overlapping_members_are_fatal() -> anyhow::Result<()> {
        let data = array![[1.0f32, 2.0], [2.0, 4.0], [3.0, 6.1]];
        let mut xx = features(data);
        xx.intervals = vec![
            GenomicInterval::from_coords("1", 100, 200)?,
            GenomicInterval::from_coords("1", 150, 250)?,
        ];
        let err = CorrelationClusterer::new(Default::default())?
            .collapse(&xx)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NetworkError>(),
            Some(NetworkError::DataIntegrity(_))
        ));
        Ok(())
    }

    #[test]
    fn test_cluster_names() {
        let nn = names(&["1p36.33", "1p36.32", "1p36.31", "1p36.33", "2q11"]);
        assert_eq!(&*cluster_name(&nn, &[0, 3]), "1p36.33");
        assert_eq!(&*cluster_name(&nn, &[0, 1, 2]), "1p36.33-1p36.31");
        assert_eq!(&*cluster_name(&nn, &[1, 3]), "1p36.33,1p36.32");
        assert_eq!(&*cluster_name(&nn, &[2, 4]), "1p36.31|2q11");

        let ranged = names(&["1p36.33-1p36.32", "1p36.31-1p36.21"]);
        assert_eq!(&*cluster_name(&ranged, &[0, 1]), "1p36.33-1p36.21");

        // tokens are sorted, not taken in column order
        let reversed = names(&["1q21.2", "1q21.1", "10p12"]);
        assert_eq!(&*cluster_name(&reversed, &[0, 1]), "1q21.1-1q21.2");
        assert_eq!(&*cluster_name(&reversed, &[0, 2]), "1q21.2|10p12");
        let genes = names(&["s9", "s10", "s2"]);
        assert_eq!(&*cluster_name(&genes, &[0, 1, 2]), "s10-s9");
    }

    #[test]
    fn test_token_order() {
        let mut toks = vec!["Xp11", "1q21", "geneA", "1p36.33", "1p36.1", "2p25"];
        toks.sort_by(|a, b| token_order(a, b));
        assert_eq!(toks, vec!["1p36.33", "1p36.1", "1q21", "2p25", "Xp11", "geneA"]);
    }

    #[test]
    fn test_collapse_adjacency_rows_takes_union() -> anyhow::Result<()> {
        let data = array![[1.0f32, 2.0, 0.5], [2.0, 4.0, -0.5], [3.0, 6.0, 0.2]];
        let out = CorrelationClusterer::new(Default::default())?.collapse(&features(data))?;
        assert_eq!(out.num_output(), 2);

        let mut coo = CooMatrix::new(3, 4);
        coo.push(0, 0, 0.5);
        coo.push(0, 1, -0.2);
        coo.push(1, 1, 0.7);
        coo.push(1, 2, 0.1);
        coo.push(2, 3, 1.0);
        let merged = out.collapse_adjacency_rows(&CsrMat::from(&coo))?;

        let entries: Vec<_> = merged.triplet_iter().map(|(i, j, &w)| (i, j, w)).collect();
        assert_eq!(entries, vec![(0, 0, 0.5), (0, 1, 0.7), (0, 2, 0.1), (1, 3, 1.0)]);
        Ok(())
    }
}
