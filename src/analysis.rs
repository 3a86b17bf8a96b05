//! Read-side helpers for downstream analysis: lookup mappers and joined
//! views over the loaded tables.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

use duckdb::Connection;
use jiff::civil::Date;
use jiff::ToSpan;
use serde::{Deserialize, Serialize};

use crate::loader::quote_ident;

/// id -> description map of a lookup table.
pub fn lookup_map(
    conn: &Connection,
    table: &str,
) -> Result<HashMap<String, String>, Box<dyn Error>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id::VARCHAR, description FROM {}",
        quote_ident(table)
    ))?;
    let iter = stmt.query_map([], |row| {
        Ok((row.get::<usize, String>(0)?, row.get::<usize, String>(1)?))
    })?;
    let map: HashMap<String, String> = iter.collect::<Result<_, _>>()?;
    Ok(map)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstallationInfo {
    pub id: String,
    pub name: Option<String>,
    pub registry: Option<String>,
    pub activity: Option<String>,
    pub nace: Option<String>,
}

/// Installations with their activity, registry and NACE labels resolved.
/// If `registry` is `None`, return all of them.
pub fn installations(
    conn: &Connection,
    registry: Option<&str>,
) -> Result<Vec<InstallationInfo>, Box<dyn Error>> {
    let mut query = String::from(
        r#"
SELECT i.id, i.name, c.description, a.description, n.description
FROM installation i
LEFT JOIN country_code c ON i.registry_id = c.id
LEFT JOIN activity_type_code a ON i.activity_id = a.id
LEFT JOIN nace_code n ON i.nace_id = n.id
WHERE 1=1
"#,
    );
    if let Some(registry) = registry {
        query.push_str(&format!("AND i.registry_id = '{}'\n", registry));
    }
    query.push_str("ORDER BY i.id;");
    let mut stmt = conn.prepare(&query)?;
    let iter = stmt.query_map([], |row| {
        Ok(InstallationInfo {
            id: row.get(0)?,
            name: row.get(1)?,
            registry: row.get(2)?,
            activity: row.get(3)?,
            nace: row.get(4)?,
        })
    })?;
    let rows: Vec<InstallationInfo> = iter.collect::<Result<_, _>>()?;
    Ok(rows)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: i64,
    pub name: Option<String>,
    pub registry: Option<String>,
    pub account_type: Option<String>,
    pub holder: Option<String>,
    pub is_open: Option<bool>,
}

/// Accounts with their registry, type and holder labels resolved.
pub fn accounts(
    conn: &Connection,
    registry: Option<&str>,
) -> Result<Vec<AccountInfo>, Box<dyn Error>> {
    let mut query = String::from(
        r#"
SELECT a.id, a.name, c.description, t.description, h.name, a."isOpen"
FROM account a
LEFT JOIN country_code c ON a.registry_id = c.id
LEFT JOIN account_type_code t ON a."accountType_id" = t.id
LEFT JOIN account_holder h ON a."accountHolder_id" = h.id
WHERE 1=1
"#,
    );
    if let Some(registry) = registry {
        query.push_str(&format!("AND a.registry_id = '{}'\n", registry));
    }
    query.push_str("ORDER BY a.id;");
    let mut stmt = conn.prepare(&query)?;
    let iter = stmt.query_map([], |row| {
        Ok(AccountInfo {
            id: row.get(0)?,
            name: row.get(1)?,
            registry: row.get(2)?,
            account_type: row.get(3)?,
            holder: row.get(4)?,
            is_open: row.get(5)?,
        })
    })?;
    let rows: Vec<AccountInfo> = iter.collect::<Result<_, _>>()?;
    Ok(rows)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Freq {
    Daily,
    Monthly,
    Yearly,
}

impl fmt::Display for Freq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Freq::Daily => write!(f, "day"),
            Freq::Monthly => write!(f, "month"),
            Freq::Yearly => write!(f, "year"),
        }
    }
}

impl FromStr for Freq {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "daily" => Ok(Freq::Daily),
            "month" | "monthly" => Ok(Freq::Monthly),
            "year" | "yearly" => Ok(Freq::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeRow {
    pub period: Date,
    pub transaction_type: Option<String>,
    pub amount: i64,
}

/// Transferred amounts summed per period and main transaction type.
pub fn transaction_volume(
    conn: &Connection,
    freq: Freq,
) -> Result<Vec<VolumeRow>, Box<dyn Error>> {
    let query = format!(
        r#"
SELECT
    date_trunc('{}', t.date)::DATE AS period,
    m.description,
    COALESCE(sum(t.amount), 0)::BIGINT AS amount
FROM "transaction" t
LEFT JOIN transaction_type_main_code m ON t."transactionTypeMain_id" = m.id
WHERE t.date IS NOT NULL
GROUP BY 1, 2
ORDER BY 1, 2;
"#,
        freq
    );
    let mut stmt = conn.prepare(&query)?;
    let iter = stmt.query_map([], |row| {
        let n = 719528 + row.get::<usize, i32>(0)?;
        Ok(VolumeRow {
            period: Date::ZERO + n.days(),
            transaction_type: row.get(1)?,
            amount: row.get(2)?,
        })
    })?;
    let rows: Vec<VolumeRow> = iter.collect::<Result<_, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use duckdb::Connection;
    use jiff::civil::date;

    use super::*;
    use crate::loader::reset;

    fn seeded_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        reset::reset(&conn, &mut || true).unwrap();
        conn.execute_batch(
            r#"
INSERT INTO country_code VALUES ('FR', 'France'), ('DE', 'Germany');
INSERT INTO activity_type_code VALUES (20, 'Combustion of fuels');
INSERT INTO account_type_code VALUES ('100-7', 'Operator Holding Account');
INSERT INTO transaction_type_main_code VALUES (10, 'Internal Transfer');
INSERT INTO installation VALUES
    ('FR_123', 'Cement plant', NULL, 'FR', 20, NULL, NULL, NULL, NULL, NULL, NULL,
     NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL,
     NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL);
INSERT INTO account_holder (id, name, country_id) VALUES (7, 'Cement SA', 'FR');
INSERT INTO account (id, name, registry_id, "accountHolder_id", "accountType_id", "isOpen")
    VALUES (1, 'FR account', 'FR', 7, '100-7', true),
           (2, 'DE account', 'DE', NULL, NULL, false);
INSERT INTO "transaction" (id, date, "transactionTypeMain_id", "transferringAccount_id",
                           "acquiringAccount_id", amount)
    VALUES (1, '2021-03-04 00:00:00', 10, 1, 2, 500),
           (2, '2021-03-04 12:00:00', 10, 2, 1, 250),
           (3, '2021-04-01 00:00:00', 10, 1, 2, 100);
"#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn lookup_map_reads_descriptions() {
        let conn = seeded_db();
        let map = lookup_map(&conn, "country_code").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["FR"], "France");
        let map = lookup_map(&conn, "activity_type_code").unwrap();
        assert_eq!(map["20"], "Combustion of fuels");
    }

    #[test]
    fn installations_resolve_labels() {
        let conn = seeded_db();
        let rows = installations(&conn, Some("FR")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].registry.as_deref(), Some("France"));
        assert_eq!(rows[0].activity.as_deref(), Some("Combustion of fuels"));
        assert_eq!(rows[0].nace, None);
    }

    #[test]
    fn accounts_resolve_holder_and_type() {
        let conn = seeded_db();
        let rows = accounts(&conn, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].holder.as_deref(), Some("Cement SA"));
        assert_eq!(rows[0].account_type.as_deref(), Some("Operator Holding Account"));
        assert_eq!(rows[1].holder, None);
    }

    #[test]
    fn transaction_volume_aggregates_per_period() {
        let conn = seeded_db();
        let daily = transaction_volume(&conn, Freq::Daily).unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].period, date(2021, 3, 4));
        assert_eq!(daily[0].amount, 750);
        assert_eq!(daily[0].transaction_type.as_deref(), Some("Internal Transfer"));

        let monthly = transaction_volume(&conn, Freq::Monthly).unwrap();
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].period, date(2021, 3, 1));
        assert_eq!(monthly[0].amount, 750);

        let yearly = transaction_volume(&conn, Freq::Yearly).unwrap();
        assert_eq!(yearly.len(), 1);
        assert_eq!(yearly[0].amount, 850);
    }
}
