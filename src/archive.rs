use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use jiff::civil::{Date, DateTime};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::LoadError;
use crate::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

/// Parse options for one csv entry, mirroring what the source exports need:
/// declared date columns, per-column type declarations, and whether the
/// pandas-style NA strings count as missing.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Columns that must parse as a date or datetime on every non-missing row.
    pub date_columns: Vec<String>,
    /// Column -> declared type, validated on every non-missing row.
    pub dtype_overrides: HashMap<String, ColumnType>,
    /// When true (default) `""`, `"NA"`, `"NaN"`, `"null"` ... read as missing;
    /// when false only the empty string does.  `country_code.csv` needs false,
    /// otherwise Namibia ("NA") disappears.
    pub keep_default_na: bool,
    /// Affects type-inference chunking in dataframe loaders; recorded here for
    /// interface parity, no semantic effect.
    pub low_memory: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            date_columns: Vec::new(),
            dtype_overrides: HashMap::new(),
            keep_default_na: true,
            low_memory: false,
        }
    }
}

/// A zipped collection of csv files, one per destination table.
pub struct DataArchive {
    zip: ZipArchive<BufReader<File>>,
}

impl DataArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<DataArchive, LoadError> {
        let file = File::open(path.as_ref())?;
        let zip = ZipArchive::new(BufReader::new(file))?;
        Ok(DataArchive { zip })
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.zip.file_names().map(|s| s.to_string()).collect()
    }

    /// Parse one csv entry into a [`Frame`].  Fails with
    /// [`LoadError::EntryNotFound`] if the entry is absent and with
    /// [`LoadError::MalformedData`] if any value of a declared date or typed
    /// column does not parse; no partial result is returned.
    pub fn read_table(&mut self, entry: &str, options: &ReadOptions) -> Result<Frame, LoadError> {
        let file = match self.zip.by_name(entry) {
            Ok(f) => f,
            Err(ZipError::FileNotFound) => {
                return Err(LoadError::EntryNotFound(entry.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut rdr = csv::Reader::from_reader(file);
        let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

        let date_idx: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| options.date_columns.iter().any(|d| d == *c))
            .map(|(i, _)| i)
            .collect();
        let typed_idx: Vec<(usize, ColumnType)> = columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| options.dtype_overrides.get(c).map(|t| (i, *t)))
            .collect();

        let mut frame = Frame::new(columns);
        for record in rdr.records() {
            let record = record?;
            let row: Vec<Option<String>> = record
                .iter()
                .map(|v| {
                    if is_missing(v, options.keep_default_na) {
                        None
                    } else {
                        Some(v.to_string())
                    }
                })
                .collect();
            for &i in &date_idx {
                if let Some(v) = &row[i] {
                    if !parses_as_date(v) {
                        return Err(malformed(entry, &frame.columns[i], v));
                    }
                }
            }
            for &(i, t) in &typed_idx {
                if let Some(v) = &row[i] {
                    if !parses_as(v, t) {
                        return Err(malformed(entry, &frame.columns[i], v));
                    }
                }
            }
            frame.rows.push(row);
        }
        Ok(frame)
    }
}

fn malformed(entry: &str, column: &str, value: &str) -> LoadError {
    LoadError::MalformedData {
        entry: entry.to_string(),
        column: column.to_string(),
        value: value.to_string(),
    }
}

fn is_missing(v: &str, keep_default_na: bool) -> bool {
    if v.is_empty() {
        return true;
    }
    if !keep_default_na {
        return false;
    }
    matches!(v, "NA" | "N/A" | "NaN" | "nan" | "null" | "NULL")
}

fn parses_as_date(v: &str) -> bool {
    v.parse::<Date>().is_ok()
        || v.parse::<DateTime>().is_ok()
        || v.replacen(' ', "T", 1).parse::<DateTime>().is_ok()
}

fn parses_as(v: &str, t: ColumnType) -> bool {
    match t {
        ColumnType::Text => true,
        ColumnType::Integer => v.trim().parse::<i64>().is_ok(),
        ColumnType::Real => v.trim().parse::<f64>().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_zip(entries: &[(&str, &str)]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "eutl_archive_test_{}_{}.zip",
            std::process::id(),
            entries.len()
        ));
        let file = File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(name.to_string(), options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn read_table_parses_missing_values() {
        let path = write_zip(&[(
            "unit_type.csv",
            "id,description\nAAU,Assigned Amount Unit\nCER,\n",
        )]);
        let mut archive = DataArchive::open(&path).unwrap();
        let frame = archive
            .read_table("unit_type.csv", &ReadOptions::default())
            .unwrap();
        assert_eq!(frame.columns, vec!["id", "description"]);
        assert_eq!(frame.rows[1][1], None);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn na_string_survives_when_default_na_off() {
        let path = write_zip(&[
            ("country_code.csv", "id,description\nNA,Namibia\n"),
            ("other.csv", "id,description\nNA,Namibia\n"),
        ]);
        let mut archive = DataArchive::open(&path).unwrap();
        let opts = ReadOptions {
            keep_default_na: false,
            ..Default::default()
        };
        let frame = archive.read_table("country_code.csv", &opts).unwrap();
        assert_eq!(frame.rows[0][0], Some("NA".to_string()));

        let frame = archive
            .read_table("other.csv", &ReadOptions::default())
            .unwrap();
        assert_eq!(frame.rows[0][0], None);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_entry_and_bad_date_fail() {
        let path = write_zip(&[(
            "transaction.csv",
            "id,date\n1,2021-03-04 00:00:00\n2,not-a-date\n",
        )]);
        let mut archive = DataArchive::open(&path).unwrap();
        match archive.read_table("account.csv", &ReadOptions::default()) {
            Err(LoadError::EntryNotFound(name)) => assert_eq!(name, "account.csv"),
            other => panic!("expected EntryNotFound, got {:?}", other.map(|f| f.len())),
        }
        let opts = ReadOptions {
            date_columns: vec!["date".to_string()],
            ..Default::default()
        };
        match archive.read_table("transaction.csv", &opts) {
            Err(LoadError::MalformedData { column, value, .. }) => {
                assert_eq!(column, "date");
                assert_eq!(value, "not-a-date");
            }
            other => panic!("expected MalformedData, got {:?}", other.map(|f| f.len())),
        }
        std::fs::remove_file(path).unwrap();
    }
}
