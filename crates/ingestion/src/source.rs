//! Raw table sources.
//!
//! A source is read exactly once into an in-memory [`RawTable`]; the handle
//! is consumed by the read so nothing stays open while the loader works.

use rebid_core::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Header plus string rows, as read from a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    /// Rows the source read but did not keep (comments, other tables).
    skipped_rows: usize,
}

impl RawTable {
    /// Create an empty table with the given header.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            skipped_rows: 0,
        }
    }

    /// Build a table from string slices (handy for tests and embedding).
    pub fn from_rows(columns: &[&str], rows: &[Vec<&str>]) -> Self {
        let mut table = Self::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(row.iter().map(|v| v.to_string()).collect());
        }
        table
    }

    /// Append a data row.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of a column, matched case-insensitively on trimmed names.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.columns
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(name))
    }

    /// Index of a column the caller cannot work without.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            Error::schema(format!(
                "missing required column {} (have: {})",
                name,
                self.columns.join(", ")
            ))
        })
    }

    /// Data rows.
    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

/// Cell value of a row, empty for short rows.
#[inline]
pub fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

/// A scoped data source: consumed by a single bulk read.
pub trait TableSource {
    fn read_table(self) -> Result<RawTable>;
}

/// Already materialised table.
pub struct MemorySource(pub RawTable);

impl TableSource for MemorySource {
    fn read_table(self) -> Result<RawTable> {
        Ok(self.0)
    }
}

/// Market operator multi-record CSV.
///
/// Each line starts with a record type: `C` (comment/metadata), `I` (header
/// for the following data rows) or `D` (data). The first four fields of `I`
/// and `D` rows describe the record (type, report, table, version); the
/// remaining fields are the columns.
pub struct AemoCsvSource<R: Read> {
    reader: R,
    table: Option<String>,
}

impl<R: Read> AemoCsvSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, table: None }
    }

    /// Only keep rows of the named table (third record descriptor field).
    pub fn with_table(mut self, table: Option<&str>) -> Self {
        self.table = table.map(str::to_string);
        self
    }
}

impl AemoCsvSource<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(File::open(path.as_ref())?))
    }
}

/// Number of record descriptor fields ahead of the columns.
const DESCRIPTOR_FIELDS: usize = 4;

impl<R: Read> TableSource for AemoCsvSource<R> {
    fn read_table(self) -> Result<RawTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(self.reader);

        let mut table: Option<RawTable> = None;
        let mut active = false;
        let mut skipped = 0usize;

        for (line, result) in reader.records().enumerate() {
            let record = result?;
            match record.get(0).map(str::trim) {
                Some("I") => {
                    let name = record.get(2).unwrap_or("").trim();
                    active = match &self.table {
                        Some(wanted) => name.eq_ignore_ascii_case(wanted),
                        None => true,
                    };
                    if !active {
                        skipped += 1;
                        continue;
                    }
                    let columns: Vec<String> = record
                        .iter()
                        .skip(DESCRIPTOR_FIELDS)
                        .map(|c| c.trim().to_string())
                        .collect();
                    if let Some(existing) = &table {
                        if existing.columns != columns {
                            return Err(Error::schema(format!(
                                "line {}: header for table {} changes the column layout",
                                line + 1,
                                name
                            )));
                        }
                    } else {
                        table = Some(RawTable::new(columns));
                    }
                }
                Some("D") if active => match table.as_mut() {
                    Some(t) => t.push_row(
                        record
                            .iter()
                            .skip(DESCRIPTOR_FIELDS)
                            .map(str::to_string)
                            .collect(),
                    ),
                    None => skipped += 1,
                },
                _ => skipped += 1,
            }
        }

        let mut table = table.ok_or_else(|| {
            Error::schema(match &self.table {
                Some(name) => format!("no header row for table {}", name),
                None => "no header row found".to_string(),
            })
        })?;
        table.skipped_rows = skipped;

        debug!(rows = table.len(), skipped, "read multi-record table");
        Ok(table)
    }
}

/// Plain CSV with a single header line.
pub struct PlainCsvSource<R: Read> {
    reader: R,
}

impl<R: Read> PlainCsvSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl PlainCsvSource<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(File::open(path.as_ref())?))
    }
}

impl<R: Read> TableSource for PlainCsvSource<R> {
    fn read_table(self) -> Result<RawTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(self.reader);

        let columns = reader
            .headers()?
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        let mut table = RawTable::new(columns);

        for result in reader.records() {
            let record = result?;
            table.push_row(record.iter().map(str::to_string).collect());
        }

        debug!(rows = table.len(), "read plain table");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI: &str = "\
C,NEMP.WORLD,BIDS,AEMO,PUBLIC,2025/10/01,04:00:00
I,BIDS,BIDDAYOFFER,3,SETTLEMENTDATE,DUID,BIDTYPE,PRICEBAND1
D,BIDS,BIDDAYOFFER,3,\"2025/10/01 00:00:00\",HPR1,RAISEREG,12.5
I,BIDS,BIDOFFERPERIOD,1,TRADINGDATE,DUID,PERIODID
D,BIDS,BIDOFFERPERIOD,1,\"2025/10/01 00:00:00\",HPR1,1
D,BIDS,BIDDAYOFFER,3,\"2025/10/01 00:00:00\",BALB1,RAISEREG,-1000
C,\"END OF REPORT\",5
";

    #[test]
    fn test_multi_record_filters_table() {
        let table = AemoCsvSource::new(MULTI.as_bytes())
            .with_table(Some("BIDDAYOFFER"))
            .read_table()
            .unwrap();

        assert_eq!(table.columns(), &["SETTLEMENTDATE", "DUID", "BIDTYPE", "PRICEBAND1"]);
        // The second BIDDAYOFFER row follows a BIDOFFERPERIOD header and is not kept.
        assert_eq!(table.len(), 1);
        assert_eq!(table.skipped_rows(), 5);
        let row: Vec<&[String]> = table.rows().collect();
        assert_eq!(cell(row[0], 1), "HPR1");
    }

    #[test]
    fn test_multi_record_missing_table() {
        let result = AemoCsvSource::new(MULTI.as_bytes())
            .with_table(Some("DISPATCHOFFERTRK"))
            .read_table();
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_multi_record_changed_layout() {
        let data = "\
I,BIDS,BIDDAYOFFER,3,DUID,BIDTYPE
D,BIDS,BIDDAYOFFER,3,HPR1,RAISEREG
I,BIDS,BIDDAYOFFER,3,DUID,PRICEBAND1
";
        let result = AemoCsvSource::new(data.as_bytes()).read_table();
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_plain_csv() {
        let data = "DUID,BIDTYPE\nHPR1,RAISEREG\nBALB1\n";
        let table = PlainCsvSource::new(data.as_bytes()).read_table().unwrap();
        assert_eq!(table.len(), 2);
        let rows: Vec<&[String]> = table.rows().collect();
        assert_eq!(cell(rows[1], 1), "");
    }

    #[test]
    fn test_column_lookup() {
        let table = RawTable::from_rows(&["DUID", " BidType "], &[]);
        assert_eq!(table.column_index("bidtype"), Some(1));
        assert!(matches!(table.require_column("PERIODID"), Err(Error::Schema(_))));
    }
}
