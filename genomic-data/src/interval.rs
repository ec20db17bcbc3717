use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// forward vs. backward(reverse) strand
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize)]
pub enum Strand {
    #[serde(rename = "+")]
    Forward,
    #[serde(rename = "-")]
    Backward,
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Backward => write!(f, "-"),
        }
    }
}

impl Strand {
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "+" | "1" | "+1" => Some(Strand::Forward),
            "-" | "-1" => Some(Strand::Backward),
            _ => None,
        }
    }
}

/// Strip an optional `chr` prefix so that `chr1` and `1` compare equal
pub fn normalize_chr(chr: &str) -> &str {
    chr.strip_prefix("chr").unwrap_or(chr)
}

/// Split a cytoband name such as `1p36.33` or `chrXq28` into its
/// chromosome and arm (`p` or `q`)
pub fn cytoband_arm(name: &str) -> Option<(&str, char)> {
    let name = normalize_chr(name);
    let pos = name.find(['p', 'q'])?;
    let chr = &name[..pos];
    let valid_chr = !chr.is_empty()
        && chr
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, 'X' | 'Y' | 'M' | 'T'));
    if !valid_chr {
        return None;
    }
    let arm = name[pos..].chars().next()?;
    Some((chr, arm))
}

/// Genomic distance between two intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// Same chromosome; zero when the intervals overlap
    Finite(u64),
    /// Different chromosomes
    Infinite,
    /// Chromosome or coordinates missing on either side
    Unknown,
}

impl Distance {
    pub fn within(&self, window: u64) -> Option<bool> {
        match self {
            Distance::Finite(d) => Some(*d <= window),
            Distance::Infinite => Some(false),
            Distance::Unknown => None,
        }
    }
}

/// A closed interval `[start, stop]` on a chromosome. Any part may be
/// missing; comparisons involving a missing part are `Unknown`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomicInterval {
    #[serde(rename = "chromosome")]
    pub chr: Option<Box<str>>,
    pub start: Option<i64>,
    #[serde(rename = "end")]
    pub stop: Option<i64>,
    pub strand: Option<Strand>,
}

impl std::fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn opt<T: std::fmt::Display>(x: &Option<T>) -> String {
            x.as_ref().map(|v| v.to_string()).unwrap_or(".".to_string())
        }
        write!(
            f,
            "{}:{}-{}",
            opt(&self.chr),
            opt(&self.start),
            opt(&self.stop)
        )
    }
}

impl GenomicInterval {
    /// Create an interval, checking `start <= stop` when both are given
    pub fn new(
        chr: Option<&str>,
        start: Option<i64>,
        stop: Option<i64>,
        strand: Option<Strand>,
    ) -> anyhow::Result<Self> {
        if let (Some(s), Some(e)) = (start, stop) {
            if s > e {
                return Err(anyhow::anyhow!("interval start {} > stop {}", s, e));
            }
        }
        Ok(Self {
            chr: chr.map(Box::from),
            start,
            stop,
            strand,
        })
    }

    /// Fully specified interval on one chromosome
    pub fn from_coords(chr: &str, start: i64, stop: i64) -> anyhow::Result<Self> {
        Self::new(Some(chr), Some(start), Some(stop), None)
    }

    /// Chromosome and both coordinates are present
    pub fn is_resolved(&self) -> bool {
        self.chr.is_some() && self.start.is_some() && self.stop.is_some()
    }

    fn resolved(&self) -> Option<(&str, i64, i64)> {
        match (&self.chr, self.start, self.stop) {
            (Some(c), Some(s), Some(e)) => Some((normalize_chr(c), s, e)),
            _ => None,
        }
    }

    /// `Some(true)` iff both intervals are on the same chromosome and
    /// their ranges intersect; `None` if either side is unresolved
    pub fn overlap(&self, other: &Self) -> Option<bool> {
        let (c1, s1, e1) = self.resolved()?;
        let (c2, s2, e2) = other.resolved()?;
        Some(c1 == c2 && s1 <= e2 && s2 <= e1)
    }

    /// Gap between the two ranges on the same chromosome
    pub fn distance(&self, other: &Self) -> Distance {
        match (self.resolved(), other.resolved()) {
            (Some((c1, s1, e1)), Some((c2, s2, e2))) => {
                if c1 != c2 {
                    Distance::Infinite
                } else if s2 > e1 {
                    Distance::Finite((s2 - e1) as u64)
                } else if s1 > e2 {
                    Distance::Finite((s1 - e2) as u64)
                } else {
                    Distance::Finite(0)
                }
            }
            _ => Distance::Unknown,
        }
    }

    /// Smallest interval covering all resolved inputs if they share a
    /// chromosome; otherwise an unresolved interval
    pub fn span<'a, I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = &'a GenomicInterval>,
    {
        let mut chr: Option<Box<str>> = None;
        let mut lb = i64::MAX;
        let mut ub = i64::MIN;

        for x in intervals {
            let Some((c, s, e)) = x.resolved() else {
                return Self::default();
            };
            match &chr {
                Some(prev) if normalize_chr(prev) != c => return Self::default(),
                Some(_) => {}
                None => chr = x.chr.clone(),
            }
            lb = lb.min(s);
            ub = ub.max(e);
        }

        match chr {
            Some(c) => Self {
                chr: Some(c),
                start: Some(lb),
                stop: Some(ub),
                strand: None,
            },
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(chr: &str, s: i64, e: i64) -> GenomicInterval {
        GenomicInterval::from_coords(chr, s, e).unwrap()
    }

    #[test]
    fn test_mixed_chr_prefix() {
        assert_eq!(normalize_chr("chr1"), normalize_chr("1"));
        assert_eq!(iv("chrX", 1, 5).overlap(&iv("X", 5, 9)), Some(true));
        assert_eq!(iv("chr1", 1, 5).overlap(&iv("2", 1, 5)), Some(false));
    }

    #[test]
    fn test_start_after_stop_rejected() {
        assert!(GenomicInterval::from_coords("1", 10, 5).is_err());
        assert!(GenomicInterval::new(Some("1"), Some(10), None, None).is_ok());
    }

    #[test]
    fn test_overlap() {
        assert_eq!(iv("1", 100, 200).overlap(&iv("chr1", 200, 300)), Some(true));
        assert_eq!(iv("1", 100, 200).overlap(&iv("1", 201, 300)), Some(false));
        assert_eq!(iv("1", 100, 200).overlap(&iv("2", 100, 200)), Some(false));
        let partial = GenomicInterval::new(Some("1"), Some(100), None, None).unwrap();
        assert_eq!(partial.overlap(&iv("1", 100, 200)), None);
    }

    #[test]
    fn test_distance() {
        assert_eq!(iv("1", 100, 200).distance(&iv("1", 150, 160)), Distance::Finite(0));
        assert_eq!(iv("1", 100, 200).distance(&iv("1", 250, 300)), Distance::Finite(50));
        assert_eq!(iv("1", 250, 300).distance(&iv("1", 100, 200)), Distance::Finite(50));
        assert_eq!(iv("1", 100, 200).distance(&iv("2", 100, 200)), Distance::Infinite);
        assert_eq!(
            GenomicInterval::default().distance(&iv("1", 1, 2)),
            Distance::Unknown
        );
        assert_eq!(Distance::Finite(10).within(10), Some(true));
        assert_eq!(Distance::Finite(11).within(10), Some(false));
        assert_eq!(Distance::Unknown.within(10), None);
    }

    #[test]
    fn test_cytoband_arm() {
        assert_eq!(cytoband_arm("1p36.33"), Some(("1", 'p')));
        assert_eq!(cytoband_arm("chr17q21.31"), Some(("17", 'q')));
        assert_eq!(cytoband_arm("Xq28"), Some(("X", 'q')));
        assert_eq!(cytoband_arm("ENSG000001"), None);
    }

    #[test]
    fn test_span() {
        let s = GenomicInterval::span(&[iv("1", 100, 200), iv("chr1", 50, 120)]);
        assert_eq!((s.start, s.stop), (Some(50), Some(200)));
        let s = GenomicInterval::span(&[iv("1", 100, 200), iv("2", 50, 120)]);
        assert!(!s.is_resolved());
    }
}
