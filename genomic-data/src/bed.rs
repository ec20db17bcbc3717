use crate::interval::{GenomicInterval, Strand};
use log::info;
use matrix_util::common_io::{open_buf_writer, read_lines_of_words_delim};
use std::io::Write;

/// One row of a feature interval table: `id chr start end [strand [alias]]`
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRecord {
    pub id: Box<str>,
    pub interval: GenomicInterval,
    pub alias: Option<Box<str>>,
}

fn is_missing(word: &str) -> bool {
    matches!(word, "" | "." | "NA" | "na" | "NaN")
}

fn parse_coord(word: &str) -> anyhow::Result<Option<i64>> {
    if is_missing(word) {
        Ok(None)
    } else {
        Ok(Some(word.parse::<i64>().map_err(|e| {
            anyhow::anyhow!("failed to parse coordinate '{}': {}", word, e)
        })?))
    }
}

impl IntervalRecord {
    fn from_words(words: &[Box<str>]) -> anyhow::Result<Self> {
        if words.len() < 4 {
            return Err(anyhow::anyhow!(
                "need at least `id chr start end`, got {} fields",
                words.len()
            ));
        }
        let chr = (!is_missing(&words[1])).then_some(words[1].as_ref());
        let strand = words.get(4).and_then(|s| Strand::parse(s));
        let alias = words
            .get(5)
            .filter(|s| !is_missing(s))
            .cloned();

        Ok(Self {
            id: words[0].clone(),
            interval: GenomicInterval::new(
                chr,
                parse_coord(&words[2])?,
                parse_coord(&words[3])?,
                strand,
            )?,
            alias,
        })
    }
}

/// Read a feature interval table. A first line starting with `id` is
/// taken as a header.
pub fn read_interval_table(file: &str) -> anyhow::Result<Vec<IntervalRecord>> {
    let read_out = read_lines_of_words_delim(file, "\t", -1)?;

    let mut records = Vec::with_capacity(read_out.lines.len());
    for (i, words) in read_out.lines.iter().enumerate() {
        if i == 0 && words.first().is_some_and(|w| w.eq_ignore_ascii_case("id")) {
            continue;
        }
        let rec = IntervalRecord::from_words(words)
            .map_err(|e| anyhow::anyhow!("{}: line {}: {}", file, i + 1, e))?;
        records.push(rec);
    }

    info!("read {} interval records from {}", records.len(), file);
    Ok(records)
}

pub fn write_interval_table(records: &[IntervalRecord], file: &str) -> anyhow::Result<()> {
    fn opt<T: std::fmt::Display>(x: &Option<T>) -> String {
        x.as_ref().map(|v| v.to_string()).unwrap_or("NA".to_string())
    }

    let mut buf = open_buf_writer(file)?;
    writeln!(buf, "id\tchr\tstart\tend\tstrand\talias")?;
    for r in records {
        writeln!(
            buf,
            "{}\t{}\t{}\t{}\t{}\t{}",
            r.id,
            opt(&r.interval.chr),
            opt(&r.interval.start),
            opt(&r.interval.stop),
            r.interval.strand.map(|s| s.to_string()).unwrap_or(".".into()),
            opt(&r.alias),
        )?;
    }
    buf.flush()?;
    Ok(())
}
