//! Best-effort row/column statistics for delimited text files.
//!
//! The first record is the header and defines the column count; every
//! following non-blank record counts as a row. Double-quoted fields may
//! contain delimiters and newlines.

use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableStats {
    pub rows: u64,
    pub columns: u64,
}

/// Statistics for `path`, or zeros when it cannot be read.
pub fn table_stats(path: &Path) -> TableStats {
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    };
    let scanned = File::open(path)
        .map_err(csv::Error::from)
        .and_then(|f| scan(BufReader::new(f), delimiter));
    match scanned {
        Ok(stats) => stats,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "table statistics unavailable");
            TableStats::default()
        }
    }
}

pub fn scan<R: Read>(reader: R, delimiter: u8) -> csv::Result<TableStats> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = rdr.byte_headers()?.len() as u64;
    let mut rows = 0u64;
    let mut record = csv::ByteRecord::new();
    while rdr.read_byte_record(&mut record)? {
        rows += 1;
    }
    Ok(TableStats { rows, columns })
}
