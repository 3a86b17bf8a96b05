use duckdb::Connection;
use itertools::Itertools;
use log::{debug, info};

use super::{quote_ident, sql_literal};
use crate::error::LoadError;
use crate::frame::Frame;

/// Outcome of a row-level upsert over one table.
#[derive(Debug, Default, PartialEq)]
pub struct LoadReport {
    pub inserted: usize,
    pub skipped: usize,
    pub skipped_keys: Vec<String>,
    pub updated_keys: Vec<String>,
}

/// Insert `frame` row by row, checking existence by primary key against the
/// live table.  A row whose key is already present is skipped (and counted),
/// or replaced when `update_existing` is set.  Skipped keys are reported in a
/// single summary line, never one line per row.
///
/// An existence query that fails (typically because the table has not been
/// materialized yet) reads as "no such row"; any insert or delete error
/// aborts this table's load with the rows inserted so far retained.
pub fn upsert(
    conn: &Connection,
    table: &str,
    frame: &Frame,
    primary_key: &[&str],
    update_existing: bool,
) -> Result<LoadReport, LoadError> {
    let pk_idx: Vec<usize> = primary_key
        .iter()
        .map(|c| {
            frame.column_index(c).ok_or_else(|| LoadError::MissingColumn {
                table: table.to_string(),
                column: c.to_string(),
            })
        })
        .collect::<Result<_, _>>()?;

    let columns = frame.columns.iter().map(|c| quote_ident(c)).join(", ");
    let mut report = LoadReport::default();
    for row in &frame.rows {
        let key_clause = primary_key
            .iter()
            .zip(&pk_idx)
            .map(|(c, &i)| match &row[i] {
                Some(v) => format!("{} = {}", quote_ident(c), sql_literal(&Some(v.clone()))),
                None => format!("{} IS NULL", quote_ident(c)),
            })
            .join(" AND ");
        let key_display = pk_idx
            .iter()
            .map(|&i| row[i].clone().unwrap_or_else(|| "NULL".to_string()))
            .join("|");

        let exists = match count_where(conn, table, &key_clause) {
            Ok(n) => n > 0,
            Err(e) => {
                debug!(
                    "existence check on {} failed ({}); treating key as absent",
                    table, e
                );
                false
            }
        };
        if exists {
            if update_existing {
                conn.execute(
                    &format!("DELETE FROM {} WHERE {}", quote_ident(table), key_clause),
                    [],
                )?;
                report.updated_keys.push(key_display);
            } else {
                report.skipped += 1;
                report.skipped_keys.push(key_display);
                continue;
            }
        }
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns,
            row.iter().map(sql_literal).join(", ")
        );
        conn.execute(&insert, [])?;
        report.inserted += 1;
    }
    if report.skipped > 0 {
        info!(
            "{}: {} rows not inserted due to key duplication",
            table, report.skipped
        );
    }
    Ok(report)
}

fn count_where(conn: &Connection, table: &str, clause: &str) -> Result<i64, duckdb::Error> {
    conn.query_row(
        &format!(
            "SELECT count(*) FROM {} WHERE {}",
            quote_ident(table),
            clause
        ),
        [],
        |row| row.get(0),
    )
}
