//! Column-wise Pearson correlation for dense feature matrices.
//!
//! Columns are centred and scaled to unit norm once; each row of the
//! dissimilarity matrix is then a block of dot products computed in
//! parallel.

use crate::utils::create_jobs;
use indicatif::ParallelProgressIterator;
use log::{info, warn};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;

/// Dissimilarities this close to zero are snapped to exactly zero so
/// that identical columns always fall within any `eps >= 0`
pub const ZERO_TOLERANCE: f64 = 1e-12;

/// Centre a column and scale it to unit Euclidean norm. Returns `None`
/// if the column has no variance or contains non-finite values.
fn standardize(col: ArrayView1<f32>) -> Option<Array1<f64>> {
    let n = col.len();
    if n < 2 || col.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let mean = col.iter().map(|&x| x as f64).sum::<f64>() / n as f64;
    let centred: Array1<f64> = col.mapv(|x| x as f64 - mean);
    let norm = centred.dot(&centred).sqrt();
    if norm <= f64::EPSILON {
        None
    } else {
        Some(centred / norm)
    }
}

/// Pearson correlation between two columns; `None` when undefined
pub fn pearson(x: ArrayView1<f32>, y: ArrayView1<f32>) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    let zx = standardize(x)?;
    let zy = standardize(y)?;
    Some(zx.dot(&zy).clamp(-1.0, 1.0))
}

/// `1 - |cor(X[:,i], X[:,j])|` for every pair of columns.
///
/// * `xx` - samples x features
/// * `block_size` - number of columns per parallel job (0 = default)
///
/// Columns without variance are treated as uncorrelated with everything
/// (dissimilarity 1) and reported once.
pub fn abs_correlation_dissimilarity(
    xx: &Array2<f32>,
    block_size: usize,
) -> anyhow::Result<Array2<f64>> {
    let nfeat = xx.ncols();
    let zz: Vec<Option<Array1<f64>>> = xx.axis_iter(Axis(1)).map(standardize).collect();

    let n_degenerate = zz.iter().filter(|z| z.is_none()).count();
    if n_degenerate > 0 {
        warn!(
            "{} of {} features have zero variance or missing values",
            n_degenerate, nfeat
        );
    }

    let jobs = create_jobs(nfeat, block_size);
    let njobs = jobs.len() as u64;

    let blocks: Vec<(usize, Vec<Vec<f64>>)> = jobs
        .into_par_iter()
        .progress_count(njobs)
        .map(|(lb, ub)| {
            let rows = (lb..ub)
                .map(|i| {
                    (0..nfeat)
                        .map(|j| {
                            if i == j {
                                return 0.0;
                            }
                            match (&zz[i], &zz[j]) {
                                (Some(zi), Some(zj)) => {
                                    let d = 1.0 - zi.dot(zj).clamp(-1.0, 1.0).abs();
                                    if d < ZERO_TOLERANCE {
                                        0.0
                                    } else {
                                        d
                                    }
                                }
                                _ => 1.0,
                            }
                        })
                        .collect::<Vec<f64>>()
                })
                .collect();
            (lb, rows)
        })
        .collect();

    let mut dist = Array2::<f64>::zeros((nfeat, nfeat));
    for (lb, rows) in blocks {
        for (r, row) in rows.into_iter().enumerate() {
            for (j, d) in row.into_iter().enumerate() {
                dist[(lb + r, j)] = d;
            }
        }
    }

    info!("computed {} x {} dissimilarity matrix", nfeat, nfeat);
    Ok(dist)
}

/// Mean of the selected columns, one value per row
pub fn mean_of_columns(xx: &Array2<f32>, columns: &[usize]) -> Array1<f32> {
    let mut ret = Array1::<f32>::zeros(xx.nrows());
    if columns.is_empty() {
        return ret;
    }
    for &j in columns {
        ret += &xx.column(j);
    }
    ret / columns.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_identical_columns_have_zero_dissimilarity() -> anyhow::Result<()> {
        let xx = array![[1.0f32, 1.0, 3.0], [2.0, 2.0, 1.0], [4.0, 4.0, 2.0], [0.5, 0.5, 7.0]];
        let dd = abs_correlation_dissimilarity(&xx, 2)?;
        assert_eq!(dd[(0, 1)], 0.0);
        assert_eq!(dd[(1, 0)], 0.0);
        assert!(dd[(0, 2)] > 0.0);
        assert_abs_diff_eq!(dd[(0, 2)], dd[(2, 0)], epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_anticorrelated_columns() -> anyhow::Result<()> {
        let xx = array![[1.0f32, -1.0], [2.0, -2.0], [3.0, -3.0]];
        let dd = abs_correlation_dissimilarity(&xx, 0)?;
        assert_eq!(dd[(0, 1)], 0.0);
        Ok(())
    }

    #[test]
    fn test_constant_column_is_uncorrelated() -> anyhow::Result<()> {
        let xx = array![[1.0f32, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let dd = abs_correlation_dissimilarity(&xx, 0)?;
        assert_eq!(dd[(0, 1)], 1.0);
        assert!(pearson(xx.column(0), xx.column(1)).is_none());
        Ok(())
    }

    #[test]
    fn test_mean_of_columns() {
        let xx = array![[1.0f32, 3.0, 10.0], [2.0, 6.0, 10.0]];
        let mu = mean_of_columns(&xx, &[0, 1]);
        assert_eq!(mu, array![2.0f32, 4.0]);
    }
}
