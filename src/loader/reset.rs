use std::io::{self, Write};

use duckdb::Connection;
use log::info;

use super::quote_ident;
use crate::error::LoadError;
use crate::schema::{self, PROTECTED_TABLES};

/// Drop every existing table (live schema reflection, so orphaned legacy
/// tables are cleaned up too, protected extension tables excepted), then
/// recreate the full registry schema.  `confirm` guards the drop; on refusal
/// nothing is dropped or created and `Ok(false)` is returned.
pub fn reset(conn: &Connection, confirm: &mut dyn FnMut() -> bool) -> Result<bool, LoadError> {
    let existing = reflect_tables(conn)?;
    let to_drop: Vec<String> = existing
        .into_iter()
        .filter(|t| !PROTECTED_TABLES.contains(&t.as_str()))
        .collect();

    if !to_drop.is_empty() {
        if !confirm() {
            info!("#### tables still in database ####");
            return Ok(false);
        }
        // orphaned tables are not referenced by registry foreign keys; drop
        // them first, then the registry tables with referencing tables ahead
        // of the tables they reference
        let registry: Vec<&str> = schema::load_order().iter().map(|d| d.name).collect();
        for name in to_drop.iter().filter(|t| !registry.contains(&t.as_str())) {
            drop_table(conn, name)?;
        }
        for name in registry.iter().rev() {
            if to_drop.iter().any(|t| t == name) {
                drop_table(conn, name)?;
            }
        }
        info!("tables deleted");
    }

    for def in schema::load_order() {
        conn.execute_batch(def.create_sql)?;
    }
    Ok(true)
}

fn drop_table(conn: &Connection, name: &str) -> Result<(), LoadError> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(name)))?;
    info!("dropped table {}", name);
    Ok(())
}

/// Names of the base tables currently in the database.
pub fn reflect_tables(conn: &Connection) -> Result<Vec<String>, LoadError> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM information_schema.tables
         WHERE table_schema = 'main' AND table_type = 'BASE TABLE'
         ORDER BY table_name",
    )?;
    let iter = stmt.query_map([], |row| row.get::<usize, String>(0))?;
    let names: Vec<String> = iter.collect::<Result<_, _>>()?;
    Ok(names)
}

/// Interactive confirmation for the destructive drop: only a typed,
/// case-insensitive "yes" proceeds.
pub fn stdin_confirmation() -> impl FnMut() -> bool {
    || {
        print!("Do you really want to drop all tables? Enter Yes for confirmation: ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        line.trim().eq_ignore_ascii_case("yes")
    }
}

#[cfg(test)]
mod tests {
    use duckdb::Connection;

    use super::*;
    use crate::schema::TABLES;

    fn table_count(conn: &Connection) -> usize {
        reflect_tables(conn).unwrap().len()
    }

    #[test]
    fn reset_creates_the_full_schema() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(reset(&conn, &mut || panic!("no confirmation needed")).unwrap());
        assert_eq!(table_count(&conn), TABLES.len());
    }

    #[test]
    fn refusal_preserves_tables_and_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE legacy (id INTEGER);
             INSERT INTO legacy VALUES (1), (2), (3);",
        )
        .unwrap();
        assert!(!reset(&conn, &mut || false).unwrap());
        let n: i64 = conn
            .query_row("SELECT count(*) FROM legacy", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(table_count(&conn), 1);
    }

    #[test]
    fn confirmed_reset_drops_orphaned_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE legacy (id INTEGER);").unwrap();
        assert!(reset(&conn, &mut || true).unwrap());
        let names = reflect_tables(&conn).unwrap();
        assert!(!names.contains(&"legacy".to_string()));
        assert_eq!(names.len(), TABLES.len());
    }

    #[test]
    fn reset_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(reset(&conn, &mut || true).unwrap());
        conn.execute_batch("INSERT INTO country_code VALUES ('FR', 'France');")
            .unwrap();
        assert!(reset(&conn, &mut || true).unwrap());
        let n: i64 = conn
            .query_row("SELECT count(*) FROM country_code", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }
}
