pub use crate::error::{NetworkError, StatisticalWarning};

pub use indicatif::ParallelProgressIterator;
pub use log::{debug, info, warn};
pub use rayon::prelude::*;

pub use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
pub use std::collections::{BTreeMap, BTreeSet};

pub type CsrMat = nalgebra_sparse::CsrMatrix<f32>;
pub type Mat = ndarray::Array2<f32>;

/// Use the given seed, or draw one and say so. Either way the seed
/// that drives `what` ends up in the log.
pub fn resolve_seed(seed: Option<u64>, what: &str) -> u64 {
    match seed {
        Some(s) => {
            info!("{}: seed = {}", what, s);
            s
        }
        None => {
            let s: u64 = rand::random();
            warn!(
                "{}: no seed given; drew seed = {} (pass it explicitly to reproduce)",
                what, s
            );
            s
        }
    }
}
