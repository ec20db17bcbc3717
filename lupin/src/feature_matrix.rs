use crate::common::*;
use crate::network::Level;
use genomic_data::bed::{read_interval_table, IntervalRecord};
use genomic_data::interval::GenomicInterval;
use matrix_util::ndarray_io::LabeledMatrix;

/// samples x features, with one genomic interval per feature
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub level: Level,
    pub samples: Vec<Box<str>>,
    pub features: Vec<Box<str>>,
    pub data: Mat,
    pub intervals: Vec<GenomicInterval>,
}

impl FeatureMatrix {
    /// Check dimensions and feature id uniqueness
    pub fn new(
        level: Level,
        samples: Vec<Box<str>>,
        features: Vec<Box<str>>,
        data: Mat,
        intervals: Vec<GenomicInterval>,
    ) -> anyhow::Result<Self> {
        if data.nrows() != samples.len() || data.ncols() != features.len() {
            return Err(NetworkError::validation(format!(
                "matrix is {} x {} but got {} samples and {} features",
                data.nrows(),
                data.ncols(),
                samples.len(),
                features.len()
            )));
        }
        if intervals.len() != features.len() {
            return Err(NetworkError::validation(format!(
                "{} intervals for {} features",
                intervals.len(),
                features.len()
            )));
        }
        let mut seen: HashSet<&str> = HashSet::default();
        for f in &features {
            if !seen.insert(f.as_ref()) {
                return Err(NetworkError::validation(format!("duplicate feature id: {}", f)));
            }
        }
        Ok(Self {
            level,
            samples,
            features,
            data,
            intervals,
        })
    }

    /// Features without interval information
    pub fn without_intervals(
        level: Level,
        samples: Vec<Box<str>>,
        features: Vec<Box<str>>,
        data: Mat,
    ) -> anyhow::Result<Self> {
        let intervals = vec![GenomicInterval::default(); features.len()];
        Self::new(level, samples, features, data, intervals)
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Read a `sample x feature` table and, optionally, an interval
    /// table keyed by feature id. Features missing from the interval
    /// table get an unresolved interval.
    pub fn from_files(
        level: Level,
        matrix_file: &str,
        interval_file: Option<&str>,
    ) -> anyhow::Result<Self> {
        let LabeledMatrix { rows, cols, data } = LabeledMatrix::from_tsv(matrix_file)?;
        info!(
            "read {} samples x {} features from {}",
            rows.len(),
            cols.len(),
            matrix_file
        );

        match interval_file {
            Some(file) => {
                let records = read_interval_table(file)?;
                let intervals = match_intervals(&cols, &records)?;
                Self::new(level, rows, cols, data, intervals)
            }
            None => Self::without_intervals(level, rows, cols, data),
        }
    }

    pub fn to_labeled(&self) -> LabeledMatrix {
        LabeledMatrix {
            rows: self.samples.clone(),
            cols: self.features.clone(),
            data: self.data.clone(),
        }
    }

    pub fn interval_records(&self) -> Vec<IntervalRecord> {
        self.features
            .iter()
            .zip(self.intervals.iter())
            .map(|(id, interval)| IntervalRecord {
                id: id.clone(),
                interval: interval.clone(),
                alias: None,
            })
            .collect()
    }
}

fn match_intervals(
    features: &[Box<str>],
    records: &[IntervalRecord],
) -> anyhow::Result<Vec<GenomicInterval>> {
    let mut by_id: HashMap<&str, &GenomicInterval> = HashMap::default();
    for r in records {
        if by_id.insert(r.id.as_ref(), &r.interval).is_some() {
            return Err(NetworkError::validation(format!(
                "duplicate id in interval table: {}",
                r.id
            )));
        }
    }

    let mut nmissing = 0;
    let ret: Vec<GenomicInterval> = features
        .iter()
        .map(|f| match by_id.get(f.as_ref()) {
            Some(&x) => x.clone(),
            None => {
                nmissing += 1;
                GenomicInterval::default()
            }
        })
        .collect();

    if nmissing > 0 {
        warn!("{} features have no interval record", nmissing);
    }
    Ok(ret)
}
