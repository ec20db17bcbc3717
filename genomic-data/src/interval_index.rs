use crate::interval::{normalize_chr, Distance, GenomicInterval};
use fnv::FnvHashMap as HashMap;

/// Resolved intervals grouped by chromosome and sorted by start, for
/// window queries over a fixed list of features
pub struct GenomicIntervalIndex {
    intervals: Vec<GenomicInterval>,
    by_chr: HashMap<Box<str>, ChrBlock>,
}

struct ChrBlock {
    /// (start, stop, feature index) sorted by start
    entries: Vec<(i64, i64, usize)>,
    max_len: i64,
}

impl GenomicIntervalIndex {
    pub fn new(intervals: Vec<GenomicInterval>) -> Self {
        let mut by_chr: HashMap<Box<str>, ChrBlock> = HashMap::default();

        for (i, x) in intervals.iter().enumerate() {
            if let (Some(c), Some(s), Some(e)) = (&x.chr, x.start, x.stop) {
                let block = by_chr
                    .entry(normalize_chr(c).into())
                    .or_insert_with(|| ChrBlock {
                        entries: vec![],
                        max_len: 0,
                    });
                block.entries.push((s, e, i));
                block.max_len = block.max_len.max(e - s);
            }
        }

        for block in by_chr.values_mut() {
            block.entries.sort();
        }

        Self { intervals, by_chr }
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&GenomicInterval> {
        self.intervals.get(i)
    }

    /// Number of features without a usable chromosome or coordinates
    pub fn num_unresolved(&self) -> usize {
        self.intervals.iter().filter(|x| !x.is_resolved()).count()
    }

    pub fn overlap(&self, i: usize, j: usize) -> Option<bool> {
        self.intervals[i].overlap(&self.intervals[j])
    }

    pub fn distance(&self, i: usize, j: usize) -> Distance {
        self.intervals[i].distance(&self.intervals[j])
    }

    /// Indexes of all resolved features on the same chromosome as
    /// `query` whose distance to it is at most `window`, in ascending
    /// order. An unresolved query matches nothing.
    pub fn within(&self, query: &GenomicInterval, window: u64) -> Vec<usize> {
        let (Some(c), Some(qs), Some(qe)) = (&query.chr, query.start, query.stop) else {
            return vec![];
        };
        let Some(block) = self.by_chr.get(normalize_chr(c)) else {
            return vec![];
        };

        let window = i64::try_from(window).unwrap_or(i64::MAX);
        let lb = qs.saturating_sub(window).saturating_sub(block.max_len);
        let ub = qe.saturating_add(window);

        let first = block.entries.partition_point(|&(s, _, _)| s < lb);

        let mut ret: Vec<usize> = block.entries[first..]
            .iter()
            .take_while(|&&(s, _, _)| s <= ub)
            .filter(|&&(s, e, _)| {
                let gap = if s > qe {
                    s - qe
                } else if qs > e {
                    qs - e
                } else {
                    0
                };
                gap <= window
            })
            .map(|&(_, _, i)| i)
            .collect();
        ret.sort_unstable();
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(chr: &str, s: i64, e: i64) -> GenomicInterval {
        GenomicInterval::from_coords(chr, s, e).unwrap()
    }

    #[test]
    fn test_window_query() {
        let index = GenomicIntervalIndex::new(vec![
            iv("1", 1_000, 2_000),
            iv("1", 10_000, 50_000),
            iv("chr1", 100_000, 100_500),
            iv("2", 1_000, 2_000),
            GenomicInterval::default(),
        ]);
        assert_eq!(index.num_unresolved(), 1);

        let q = iv("1", 2_500, 3_000);
        assert_eq!(index.within(&q, 500), vec![0]);
        assert_eq!(index.within(&q, 7_000), vec![0, 1]);
        assert_eq!(index.within(&q, 97_000), vec![0, 1, 2]);
        assert!(index.within(&GenomicInterval::default(), 1_000_000).is_empty());
    }

    #[test]
    fn test_long_interval_found_from_left() {
        // the long interval starts far left of the window but reaches into it
        let index = GenomicIntervalIndex::new(vec![iv("3", 0, 1_000_000), iv("3", 10, 20)]);
        let q = iv("3", 999_990, 999_995);
        assert_eq!(index.within(&q, 0), vec![0]);
        assert_eq!(index.overlap(0, 1), Some(true));
        assert_eq!(index.distance(0, 1), Distance::Finite(0));
    }
}
