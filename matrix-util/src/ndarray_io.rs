use crate::common_io::{open_buf_writer, read_lines_of_words_delim};
use ndarray::Array2;
use std::io::Write;

/// A dense `f32` matrix with row and column names
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    pub rows: Vec<Box<str>>,
    pub cols: Vec<Box<str>>,
    pub data: Array2<f32>,
}

fn parse_value(word: &str) -> anyhow::Result<f32> {
    match word {
        "NA" | "NaN" | "nan" | "." => Ok(f32::NAN),
        _ => word
            .parse::<f32>()
            .map_err(|e| anyhow::anyhow!("failed to parse '{}': {}", word, e)),
    }
}

impl LabeledMatrix {
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Read a delimited table whose first line is `corner col1 col2 ...`
    /// and whose remaining lines are `row_name v1 v2 ...`.
    pub fn from_tsv(file: &str) -> anyhow::Result<Self> {
        let read_out = read_lines_of_words_delim(file, "\t", 0)?;

        if read_out.header.is_empty() {
            return Err(anyhow::anyhow!("{}: empty header", file));
        }
        let cols: Vec<Box<str>> = read_out.header[1..].to_vec();
        let ncols = cols.len();
        let nrows = read_out.lines.len();

        let mut rows = Vec::with_capacity(nrows);
        let mut values = Vec::with_capacity(nrows * ncols);

        for (i, words) in read_out.lines.iter().enumerate() {
            if words.len() != ncols + 1 {
                return Err(anyhow::anyhow!(
                    "{}: line {} has {} fields, expected {}",
                    file,
                    i + 2,
                    words.len(),
                    ncols + 1
                ));
            }
            rows.push(words[0].clone());
            for w in &words[1..] {
                values.push(parse_value(w)?);
            }
        }

        let data = Array2::from_shape_vec((nrows, ncols), values)?;
        Ok(Self { rows, cols, data })
    }

    /// Write in the same layout `from_tsv` reads
    pub fn to_tsv(&self, file: &str, corner: &str) -> anyhow::Result<()> {
        let mut buf = open_buf_writer(file)?;

        write!(buf, "{}", corner)?;
        for c in &self.cols {
            write!(buf, "\t{}", c)?;
        }
        writeln!(buf)?;

        for (name, row) in self.rows.iter().zip(self.data.rows()) {
            write!(buf, "{}", name)?;
            for v in row {
                if v.is_nan() {
                    write!(buf, "\tNA")?;
                } else {
                    write!(buf, "\t{}", v)?;
                }
            }
            writeln!(buf)?;
        }
        buf.flush()?;
        Ok(())
    }
}
