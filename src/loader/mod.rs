//! The bulk-loading pipeline: database reset, dependency-ordered table
//! population, row-level upserts for the lookup tables and chunked bulk
//! inserts for the fact tables.

pub mod bulk;
pub mod reset;
pub mod upsert;

use std::fs;

use duckdb::Connection;
use log::{info, warn};

use crate::archive::{ColumnType, DataArchive, ReadOptions};
use crate::download;
use crate::error::LoadError;
use crate::frame::Frame;
use crate::schema::{self, TableDef, TableKind};

/// Rows per bulk-insert statement.
pub const CHUNK_SIZE: usize = 1_000_000;

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn sql_literal(v: &Option<String>) -> String {
    match v {
        None => "NULL".to_string(),
        Some(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

#[derive(Clone)]
pub struct EutlArchive {
    /// Path to the zipped csv export.  When `None`, the archive for `year`
    /// is downloaded first and removed again after a successful load.
    pub archive_path: Option<String>,
    pub duckdb_path: String,
    pub year: u16,
}

impl EutlArchive {
    /// Reset the schema, then populate every table from the archive in
    /// foreign-key dependency order.  `confirm` guards the destructive drop;
    /// a refusal leaves the database untouched and skips the load.  Failures
    /// are not caught per table: a load that cannot complete fails visibly
    /// rather than continuing with missing upstream tables.
    pub fn load_all(
        &self,
        conn: &Connection,
        confirm: &mut dyn FnMut() -> bool,
    ) -> Result<(), LoadError> {
        let (path, fetched) = match &self.archive_path {
            Some(p) => (p.clone(), false),
            None => {
                let p = download::download_data(self.year, None)?;
                (p.to_string_lossy().into_owned(), true)
            }
        };
        if !reset::reset(conn, confirm)? {
            info!("schema reset declined; load not performed");
            if fetched {
                info!("downloaded archive kept at {}", path);
            }
            return Ok(());
        }
        self.load_tables(conn, &path)?;
        if fetched {
            remove_archive(&path);
        }
        Ok(())
    }

    fn load_tables(&self, conn: &Connection, path: &str) -> Result<(), LoadError> {
        let mut archive = DataArchive::open(path)?;
        for def in schema::load_order() {
            info!("---- insert {}", def.name);
            let frame = read_frame(&mut archive, def)?;
            match def.kind {
                TableKind::Lookup => {
                    let report = upsert::upsert(conn, def.name, &frame, def.primary_key, false)?;
                    info!(
                        "{}: {} rows inserted, {} skipped",
                        def.name, report.inserted, report.skipped
                    );
                }
                TableKind::Fact => {
                    let n = bulk::bulk_load(
                        conn,
                        def.name,
                        frame,
                        def.integer_columns,
                        CHUNK_SIZE,
                        bulk::OnExists::Append,
                    )?;
                    info!("{}: {} rows inserted", def.name, n);
                }
            }
        }
        info!("done");
        Ok(())
    }
}

/// Best-effort removal of a downloaded archive.  A cleanup failure after a
/// successful load is logged, not propagated.
fn remove_archive(path: &str) {
    match fs::remove_file(path) {
        Ok(()) => info!("removed downloaded archive {}", path),
        Err(e) => warn!("could not remove downloaded archive {} ({})", path, e),
    }
}

/// Read one table's csv entry with its declared parse options, prune the
/// columns to the destination schema and apply the pre-sort if any.
fn read_frame(archive: &mut DataArchive, def: &TableDef) -> Result<Frame, LoadError> {
    let options = ReadOptions {
        date_columns: def.date_columns.iter().map(|c| c.to_string()).collect(),
        dtype_overrides: def
            .text_columns
            .iter()
            .map(|c| (c.to_string(), ColumnType::Text))
            .collect(),
        keep_default_na: def.keep_default_na,
        ..Default::default()
    };
    let mut frame = archive.read_table(def.entry, &options)?;
    frame.retain_columns(def.columns);
    if let Some(col) = def.sort_by {
        frame.sort_by_numeric(col);
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use duckdb::Connection;

    use super::*;
    use crate::schema::TABLES;

    /// Build a minimal but complete archive: every registry entry present,
    /// most of them header-only.
    fn write_minimal_zip(tag: &str) -> std::path::PathBuf {
        let path =
            std::env::temp_dir().join(format!("eutl_e2e_{}_{}.zip", tag, std::process::id()));
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for def in TABLES {
            zip.start_file(def.entry.to_string(), options).unwrap();
            let mut content = def.columns.join(",") + "\n";
            match def.name {
                "country_code" => {
                    content.push_str("FR,France\nDE,Germany\n");
                }
                "account" => {
                    let row: Vec<&str> = def
                        .columns
                        .iter()
                        .map(|c| match *c {
                            "id" => "1",
                            "name" => "Operator Holding",
                            "registry_id" => "FR",
                            _ => "",
                        })
                        .collect();
                    content.push_str(&(row.join(",") + "\n"));
                }
                _ => {}
            }
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    fn row_count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(
            &format!("SELECT count(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn load_all_minimal_archive_twice_is_idempotent() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Info)
            .is_test(true)
            .try_init();
        let path = write_minimal_zip("idempotent");
        let conn = Connection::open_in_memory().unwrap();
        let archive = EutlArchive {
            archive_path: Some(path.to_string_lossy().into_owned()),
            duckdb_path: ":memory:".to_string(),
            year: download::MOST_RECENT_YEAR,
        };
        archive.load_all(&conn, &mut || true).unwrap();

        assert_eq!(row_count(&conn, "country_code"), 2);
        assert_eq!(row_count(&conn, "account"), 1);
        assert_eq!(row_count(&conn, "transaction"), 0);
        // the account's registry resolves to a country row
        let n: i64 = conn
            .query_row(
                "SELECT count(*) FROM account a JOIN country_code c ON a.registry_id = c.id",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 1);

        // a second full run leaves identical row counts
        archive.load_all(&conn, &mut || true).unwrap();
        assert_eq!(row_count(&conn, "country_code"), 2);
        assert_eq!(row_count(&conn, "account"), 1);
        assert_eq!(row_count(&conn, "transaction"), 0);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn declined_confirmation_skips_the_load() {
        let path = write_minimal_zip("declined");
        let conn = Connection::open_in_memory().unwrap();
        let archive = EutlArchive {
            archive_path: Some(path.to_string_lossy().into_owned()),
            duckdb_path: ":memory:".to_string(),
            year: download::MOST_RECENT_YEAR,
        };
        archive.load_all(&conn, &mut || true).unwrap();
        assert_eq!(row_count(&conn, "country_code"), 2);

        // second run declined: everything stays as it was
        archive.load_all(&conn, &mut || false).unwrap();
        assert_eq!(row_count(&conn, "country_code"), 2);
        assert_eq!(row_count(&conn, "account"), 1);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn archive_cleanup_failure_does_not_panic() {
        let missing = std::env::temp_dir().join("eutl_never_downloaded.zip");
        remove_archive(missing.to_str().unwrap());
    }
}
