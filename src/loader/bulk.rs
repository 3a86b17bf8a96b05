use duckdb::Connection;
use itertools::Itertools;
use log::info;

use super::{quote_ident, sql_literal};
use crate::coerce::coerce_integer_columns;
use crate::error::LoadError;
use crate::frame::Frame;

/// Behavior of [`bulk_load`] when the destination already holds rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnExists {
    Fail,
    Replace,
    Append,
}

/// High-throughput load of a fact table: integer coercion first, then one
/// multi-row insert per chunk of at most `chunk_size` rows, source order
/// preserved.  No per-row existence checks are made; the caller guarantees
/// primary-key uniqueness (a freshly reset table and `OnExists::Append`).
///
/// A failed chunk aborts the remaining chunks of this table; chunks already
/// committed remain.  Returns the number of rows inserted.
pub fn bulk_load(
    conn: &Connection,
    table: &str,
    mut frame: Frame,
    integer_columns: &[&str],
    chunk_size: usize,
    on_exists: OnExists,
) -> Result<usize, LoadError> {
    coerce_integer_columns(&mut frame, integer_columns);

    match on_exists {
        OnExists::Fail => {
            if row_count(conn, table)? > 0 {
                return Err(LoadError::TableExists(table.to_string()));
            }
        }
        OnExists::Replace => {
            conn.execute(&format!("DELETE FROM {}", quote_ident(table)), [])?;
        }
        OnExists::Append => {}
    }
    if frame.is_empty() {
        return Ok(0);
    }

    let chunk_size = chunk_size.max(1);
    let columns = frame.columns.iter().map(|c| quote_ident(c)).join(", ");
    let n_chunks = frame.rows.len().div_ceil(chunk_size);
    for (i, chunk) in frame.rows.chunks(chunk_size).enumerate() {
        if i % 10 == 0 && i > 0 {
            info!("{}: committing chunk {} of {}", table, i + 1, n_chunks);
        }
        let values = chunk
            .iter()
            .map(|row| format!("({})", row.iter().map(sql_literal).join(", ")))
            .join(",\n");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_ident(table),
            columns,
            values
        );
        conn.execute(&sql, []).map_err(|e| LoadError::Transfer {
            table: table.to_string(),
            source: e,
        })?;
    }
    Ok(frame.rows.len())
}

fn row_count(conn: &Connection, table: &str) -> Result<i64, duckdb::Error> {
    conn.query_row(
        &format!("SELECT count(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )
}
