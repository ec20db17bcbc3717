use crate::common_io::{open_buf_writer, read_lines_of_words_delim};
use fnv::FnvHashMap as HashMap;
use log::info;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::io::Write;

/// Nonzero entries of a sparse matrix addressed by row and column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedTriplets {
    pub triplets: Vec<(Box<str>, Box<str>, f32)>,
}

impl NamedTriplets {
    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    /// Read `row_name col_name value` lines (tab, comma or space
    /// separated). Zero values are kept out.
    pub fn from_file(file: &str) -> anyhow::Result<Self> {
        let read_out = read_lines_of_words_delim(file, &['\t', ',', ' '], -1)?;
        let mut triplets = Vec::with_capacity(read_out.lines.len());

        for (i, words) in read_out.lines.iter().enumerate() {
            if words.len() < 3 {
                return Err(anyhow::anyhow!(
                    "{}: line {} needs `row col value`",
                    file,
                    i + 1
                ));
            }
            let value = words[2]
                .parse::<f32>()
                .map_err(|e| anyhow::anyhow!("{}: line {}: {}", file, i + 1, e))?;
            if value != 0.0 {
                triplets.push((words[0].clone(), words[1].clone(), value));
            }
        }
        info!("read {} nonzero triplets from {}", triplets.len(), file);
        Ok(Self { triplets })
    }

    pub fn to_file(&self, file: &str) -> anyhow::Result<()> {
        let mut buf = open_buf_writer(file)?;
        for (r, c, v) in &self.triplets {
            writeln!(buf, "{}\t{}\t{}", r, c, v)?;
        }
        buf.flush()?;
        Ok(())
    }

    /// Lay the triplets onto a CSR matrix with the given row and column
    /// orders. Names missing from either order are returned separately
    /// so the caller can decide whether they are fatal.
    pub fn to_csr(
        &self,
        row_names: &[Box<str>],
        col_names: &[Box<str>],
    ) -> (CsrMatrix<f32>, Vec<Box<str>>) {
        let row_index: HashMap<&str, usize> = row_names
            .iter()
            .enumerate()
            .map(|(i, x)| (x.as_ref(), i))
            .collect();
        let col_index: HashMap<&str, usize> = col_names
            .iter()
            .enumerate()
            .map(|(i, x)| (x.as_ref(), i))
            .collect();

        let mut coo = CooMatrix::new(row_names.len(), col_names.len());
        let mut unmatched = vec![];

        for (r, c, v) in &self.triplets {
            match (row_index.get(r.as_ref()), col_index.get(c.as_ref())) {
                (Some(&i), Some(&j)) => coo.push(i, j, *v),
                (None, _) => unmatched.push(r.clone()),
                (_, None) => unmatched.push(c.clone()),
            }
        }

        unmatched.sort();
        unmatched.dedup();
        (CsrMatrix::from(&coo), unmatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_io::{create_temp_dir_file, write_lines};

    #[test]
    fn test_triplets_to_csr() -> anyhow::Result<()> {
        let file = create_temp_dir_file(".tsv")?;
        let file = file.to_str().unwrap();
        write_lines(&["a\tx\t1.5", "b\ty\t-2", "a\ty\t0", "c\tx\t3"], file)?;

        let trip = NamedTriplets::from_file(file)?;
        assert_eq!(trip.len(), 3);

        let rows: Vec<Box<str>> = vec!["a".into(), "b".into()];
        let cols: Vec<Box<str>> = vec!["x".into(), "y".into()];
        let (csr, unmatched) = trip.to_csr(&rows, &cols);

        assert_eq!(unmatched, vec![Box::from("c")]);
        assert_eq!(csr.nnz(), 2);
        let entries: Vec<_> = csr.triplet_iter().map(|(i, j, &v)| (i, j, v)).collect();
        assert_eq!(entries, vec![(0, 0, 1.5), (1, 1, -2.0)]);
        Ok(())
    }
}
