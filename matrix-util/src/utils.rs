use std::collections::BTreeMap;

const DEFAULT_BLOCK_SIZE: usize = 100;

/// Split `0..ntot` into contiguous `(lb, ub)` blocks for parallel jobs
/// * `ntot` - number of total elements
/// * `block_size` - elements per block (0 = default)
pub fn create_jobs(ntot: usize, block_size: usize) -> Vec<(usize, usize)> {
    let block_size = if block_size == 0 {
        DEFAULT_BLOCK_SIZE
    } else {
        block_size
    };
    (0..ntot.div_ceil(block_size))
        .map(|b| (b * block_size, ((b + 1) * block_size).min(ntot)))
        .collect()
}

/// Group element indexes by their membership label. Groups are ordered
/// by label and indexes within a group stay in input order.
pub fn partition_by_membership<T>(membership: &[T]) -> BTreeMap<T, Vec<usize>>
where
    T: Ord + Clone,
{
    let mut ret: BTreeMap<T, Vec<usize>> = BTreeMap::new();
    for (i, k) in membership.iter().enumerate() {
        ret.entry(k.clone()).or_default().push(i);
    }
    ret
}

/// Sample mean and standard deviation (`n - 1` denominator). The
/// deviation is zero for fewer than two values.
pub fn mean_and_sd(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let ss = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    (mean, (ss / (n - 1) as f64).sqrt())
}
