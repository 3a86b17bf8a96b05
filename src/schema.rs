//! The fixed target schema of the emissions-trading registry: table names,
//! primary keys, destination columns, foreign-key edges, and the columns that
//! need integer coercion before a bulk insert.  The loader is agnostic to the
//! business meaning of the tables; everything it needs lives in [`TableDef`].

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableKind {
    /// Small reference table, loaded row-by-row with primary-key checks.
    Lookup,
    /// Large fact table, loaded with the chunked bulk loader.
    Fact,
}

pub struct TableDef {
    pub name: &'static str,
    /// Name of the csv entry inside the zip archive.
    pub entry: &'static str,
    pub kind: TableKind,
    pub primary_key: &'static [&'static str],
    /// Destination columns; source columns not listed here are dropped
    /// (notably `created_on`, `updated_on`, `source`).
    pub columns: &'static [&'static str],
    /// Columns rendered as canonical integer strings before bulk insert.
    pub integer_columns: &'static [&'static str],
    /// Columns that must parse as dates on read.
    pub date_columns: &'static [&'static str],
    /// Columns declared as text on read (nace ids would otherwise be
    /// float-widened by dataframe-style readers).
    pub text_columns: &'static [&'static str],
    /// (column, referenced table)
    pub foreign_keys: &'static [(&'static str, &'static str)],
    /// Numeric pre-sort before the row-level upsert; `nace_code` needs
    /// parents inserted before children.
    pub sort_by: Option<&'static str>,
    /// False only for `country_code.csv`, where "NA" is Namibia, not missing.
    pub keep_default_na: bool,
    pub create_sql: &'static str,
}

/// Tables never dropped by a database reset (owned by extensions).
pub const PROTECTED_TABLES: &[&str] = &["spatial_ref_sys"];

/// The original hand-maintained load sequence, kept as a documented override
/// of [`load_order`].  A test asserts it is a valid topological order of the
/// foreign-key graph.
pub static MANUAL_LOAD_ORDER: &[&str] = &[
    "trading_system_code",
    "nace_code",
    "compliance_code",
    "country_code",
    "unit_type",
    "activity_type_code",
    "account_type_code",
    "transaction_type_supplementary_code",
    "transaction_type_main_code",
    "offset_project",
    "installation",
    "compliance",
    "surrender",
    "account_holder",
    "account",
    "transaction",
];

pub static TABLES: &[TableDef] = &[
    TableDef {
        name: "trading_system_code",
        entry: "trading_system_code.csv",
        kind: TableKind::Lookup,
        primary_key: &["id"],
        columns: &["id", "description"],
        integer_columns: &[],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS trading_system_code (
    id VARCHAR PRIMARY KEY,
    description VARCHAR
);"#,
    },
    TableDef {
        name: "country_code",
        entry: "country_code.csv",
        kind: TableKind::Lookup,
        primary_key: &["id"],
        columns: &["id", "description"],
        integer_columns: &[],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[],
        sort_by: None,
        keep_default_na: false,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS country_code (
    id VARCHAR PRIMARY KEY,
    description VARCHAR NOT NULL
);"#,
    },
    TableDef {
        name: "unit_type",
        entry: "unit_type.csv",
        kind: TableKind::Lookup,
        primary_key: &["id"],
        columns: &["id", "description"],
        integer_columns: &[],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS unit_type (
    id VARCHAR PRIMARY KEY,
    description VARCHAR NOT NULL
);"#,
    },
    TableDef {
        name: "activity_type_code",
        entry: "activity_type.csv",
        kind: TableKind::Lookup,
        primary_key: &["id"],
        columns: &["id", "description"],
        integer_columns: &[],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS activity_type_code (
    id INTEGER PRIMARY KEY,
    description VARCHAR NOT NULL
);"#,
    },
    TableDef {
        name: "account_type_code",
        entry: "account_type.csv",
        kind: TableKind::Lookup,
        primary_key: &["id"],
        columns: &["id", "description"],
        integer_columns: &[],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS account_type_code (
    id VARCHAR PRIMARY KEY,
    description VARCHAR NOT NULL
);"#,
    },
    TableDef {
        name: "compliance_code",
        entry: "compliance_code.csv",
        kind: TableKind::Lookup,
        primary_key: &["id"],
        columns: &["id", "description"],
        integer_columns: &[],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS compliance_code (
    id VARCHAR PRIMARY KEY,
    description VARCHAR
);"#,
    },
    TableDef {
        name: "transaction_type_main_code",
        entry: "transaction_type_main.csv",
        kind: TableKind::Lookup,
        primary_key: &["id"],
        columns: &["id", "description"],
        integer_columns: &[],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS transaction_type_main_code (
    id INTEGER PRIMARY KEY,
    description VARCHAR NOT NULL
);"#,
    },
    TableDef {
        name: "transaction_type_supplementary_code",
        entry: "transaction_type_supplementary.csv",
        kind: TableKind::Lookup,
        primary_key: &["id"],
        columns: &["id", "description"],
        integer_columns: &[],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS transaction_type_supplementary_code (
    id INTEGER PRIMARY KEY,
    description VARCHAR
);"#,
    },
    TableDef {
        name: "nace_code",
        entry: "nace_code.csv",
        kind: TableKind::Lookup,
        primary_key: &["id"],
        columns: &[
            "id",
            "parent_id",
            "level",
            "description",
            "includes",
            "includesAlso",
            "ruling",
            "excludes",
            "isic4_id",
        ],
        integer_columns: &[],
        date_columns: &[],
        text_columns: &["id", "parent_id", "isic4_id"],
        // the self-referential parent_id edge is handled by the level
        // pre-sort, not by a constraint
        foreign_keys: &[],
        sort_by: Some("level"),
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS nace_code (
    id VARCHAR PRIMARY KEY,
    parent_id VARCHAR,
    level INTEGER,
    description VARCHAR,
    includes VARCHAR,
    "includesAlso" VARCHAR,
    ruling VARCHAR,
    excludes VARCHAR,
    isic4_id VARCHAR
);"#,
    },
    TableDef {
        name: "offset_project",
        entry: "project.csv",
        kind: TableKind::Fact,
        primary_key: &["id"],
        columns: &["id", "track", "country_id"],
        integer_columns: &["id", "track"],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[("country_id", "country_code")],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS offset_project (
    id INTEGER PRIMARY KEY,
    track INTEGER,
    country_id VARCHAR,
    FOREIGN KEY (country_id) REFERENCES country_code (id)
);"#,
    },
    TableDef {
        name: "installation",
        entry: "installation.csv",
        kind: TableKind::Fact,
        primary_key: &["id"],
        columns: &[
            "id",
            "name",
            "tradingSystem_id",
            "registry_id",
            "activity_id",
            "eprtrID",
            "parentCompany",
            "subsidiaryCompany",
            "permitID",
            "designatorICAO",
            "monitoringID",
            "monitoringExpiry",
            "monitoringFirstYear",
            "permitDateExpiry",
            "isAircraftOperator",
            "ec748_2009Code",
            "permitDateEntry",
            "addressMain",
            "addressSecondary",
            "postalCode",
            "city",
            "country_id",
            "latitudeEutl",
            "longitudeEutl",
            "latitudeGoogle",
            "longitudeGoogle",
            "nace15_id",
            "nace20_id",
            "nace_id",
            "euEntitlement",
            "chEntitlement",
            "isMaritimeOperator",
            "shippingCompanyCountry",
            "shippingCompanyType",
            "shippingCompany",
            "imoID",
            "region",
        ],
        integer_columns: &["euEntitlement", "chEntitlement"],
        date_columns: &[],
        text_columns: &["nace15_id", "nace20_id", "nace_id"],
        foreign_keys: &[
            ("tradingSystem_id", "trading_system_code"),
            ("registry_id", "country_code"),
            ("activity_id", "activity_type_code"),
            ("country_id", "country_code"),
            ("nace_id", "nace_code"),
        ],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS installation (
    id VARCHAR PRIMARY KEY,
    name VARCHAR,
    "tradingSystem_id" VARCHAR,
    registry_id VARCHAR,
    activity_id INTEGER,
    "eprtrID" VARCHAR,
    "parentCompany" VARCHAR,
    "subsidiaryCompany" VARCHAR,
    "permitID" VARCHAR,
    "designatorICAO" VARCHAR,
    "monitoringID" VARCHAR,
    "monitoringExpiry" VARCHAR,
    "monitoringFirstYear" VARCHAR,
    "permitDateExpiry" TIMESTAMP,
    "isAircraftOperator" BOOLEAN,
    "ec748_2009Code" VARCHAR,
    "permitDateEntry" TIMESTAMP,
    "addressMain" VARCHAR,
    "addressSecondary" VARCHAR,
    "postalCode" VARCHAR,
    city VARCHAR,
    country_id VARCHAR,
    "latitudeEutl" DOUBLE,
    "longitudeEutl" DOUBLE,
    "latitudeGoogle" DOUBLE,
    "longitudeGoogle" DOUBLE,
    nace15_id VARCHAR,
    nace20_id VARCHAR,
    nace_id VARCHAR,
    "euEntitlement" INTEGER,
    "chEntitlement" INTEGER,
    "isMaritimeOperator" BOOLEAN,
    "shippingCompanyCountry" VARCHAR,
    "shippingCompanyType" VARCHAR,
    "shippingCompany" VARCHAR,
    "imoID" VARCHAR,
    region VARCHAR,
    FOREIGN KEY ("tradingSystem_id") REFERENCES trading_system_code (id),
    FOREIGN KEY (registry_id) REFERENCES country_code (id),
    FOREIGN KEY (activity_id) REFERENCES activity_type_code (id),
    FOREIGN KEY (country_id) REFERENCES country_code (id),
    FOREIGN KEY (nace_id) REFERENCES nace_code (id)
);"#,
    },
    TableDef {
        name: "compliance",
        entry: "compliance.csv",
        kind: TableKind::Fact,
        primary_key: &["installation_id", "year", "reportedInSystem_id"],
        columns: &[
            "installation_id",
            "year",
            "reportedInSystem_id",
            "euetsPhase",
            "compliance_id",
            "allocatedFree",
            "allocatedNewEntrance",
            "allocatedTotal",
            "allocated10c",
            "verified",
            "verifiedCummulative",
            "verifiedUpdated",
            "surrendered",
            "surrenderedCummulative",
            "balance",
            "penalty",
        ],
        integer_columns: &[
            "allocatedFree",
            "allocatedNewEntrance",
            "allocatedTotal",
            "allocated10c",
            "verified",
            "verifiedCummulative",
            "verifiedUpdated",
            "surrendered",
            "surrenderedCummulative",
        ],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[
            ("installation_id", "installation"),
            ("reportedInSystem_id", "trading_system_code"),
            ("compliance_id", "compliance_code"),
        ],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS compliance (
    installation_id VARCHAR,
    year INTEGER,
    "reportedInSystem_id" VARCHAR,
    "euetsPhase" VARCHAR,
    compliance_id VARCHAR,
    "allocatedFree" INTEGER,
    "allocatedNewEntrance" INTEGER,
    "allocatedTotal" INTEGER,
    "allocated10c" INTEGER,
    verified INTEGER,
    "verifiedCummulative" INTEGER,
    "verifiedUpdated" BOOLEAN,
    surrendered INTEGER,
    "surrenderedCummulative" INTEGER,
    balance INTEGER,
    penalty INTEGER,
    PRIMARY KEY (installation_id, year, "reportedInSystem_id"),
    FOREIGN KEY (installation_id) REFERENCES installation (id),
    FOREIGN KEY ("reportedInSystem_id") REFERENCES trading_system_code (id),
    FOREIGN KEY (compliance_id) REFERENCES compliance_code (id)
);"#,
    },
    TableDef {
        name: "surrender",
        entry: "surrender.csv",
        kind: TableKind::Fact,
        primary_key: &["id"],
        columns: &[
            "id",
            "installation_id",
            "reportedInSystem_id",
            "year",
            "unitType_id",
            "amount",
            "originatingRegistry_id",
            "project_id",
        ],
        integer_columns: &["amount", "project_id", "id"],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[
            ("installation_id", "installation"),
            ("reportedInSystem_id", "trading_system_code"),
            ("unitType_id", "unit_type"),
            ("originatingRegistry_id", "country_code"),
            ("project_id", "offset_project"),
        ],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS surrender (
    id INTEGER PRIMARY KEY,
    installation_id VARCHAR,
    "reportedInSystem_id" VARCHAR,
    year INTEGER,
    "unitType_id" VARCHAR,
    amount INTEGER,
    "originatingRegistry_id" VARCHAR,
    project_id INTEGER,
    FOREIGN KEY (installation_id) REFERENCES installation (id),
    FOREIGN KEY ("reportedInSystem_id") REFERENCES trading_system_code (id),
    FOREIGN KEY ("unitType_id") REFERENCES unit_type (id),
    FOREIGN KEY ("originatingRegistry_id") REFERENCES country_code (id),
    FOREIGN KEY (project_id) REFERENCES offset_project (id)
);"#,
    },
    TableDef {
        name: "account_holder",
        entry: "account_holder.csv",
        kind: TableKind::Fact,
        primary_key: &["id"],
        columns: &[
            "id",
            "name",
            "tradingSystem_id",
            "addressMain",
            "addressSecondary",
            "postalCode",
            "city",
            "telephone1",
            "telephone2",
            "eMail",
            "legalEntityIdentifier",
            "country_id",
        ],
        integer_columns: &[],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[
            ("tradingSystem_id", "trading_system_code"),
            ("country_id", "country_code"),
        ],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS account_holder (
    id INTEGER PRIMARY KEY,
    name VARCHAR,
    "tradingSystem_id" VARCHAR,
    "addressMain" VARCHAR,
    "addressSecondary" VARCHAR,
    "postalCode" VARCHAR,
    city VARCHAR,
    telephone1 VARCHAR,
    telephone2 VARCHAR,
    "eMail" VARCHAR,
    "legalEntityIdentifier" VARCHAR,
    country_id VARCHAR,
    FOREIGN KEY ("tradingSystem_id") REFERENCES trading_system_code (id),
    FOREIGN KEY (country_id) REFERENCES country_code (id)
);"#,
    },
    TableDef {
        name: "account",
        entry: "account.csv",
        kind: TableKind::Fact,
        primary_key: &["id"],
        columns: &[
            "id",
            "tradingSystem_id",
            "accountIDEutl",
            "accountIDTransactions",
            "accountIDESD",
            "yearValid",
            "name",
            "registry_id",
            "accountHolder_id",
            "accountType_id",
            "isOpen",
            "openingDate",
            "closingDate",
            "commitmentPeriod",
            "companyRegistrationNumber",
            "companyRegistrationNumberType",
            "isRegisteredEutl",
            "installation_id",
            "bvdId",
        ],
        integer_columns: &["id", "accountHolder_id"],
        date_columns: &[],
        text_columns: &[],
        foreign_keys: &[
            ("tradingSystem_id", "trading_system_code"),
            ("registry_id", "country_code"),
            ("accountHolder_id", "account_holder"),
            ("accountType_id", "account_type_code"),
            ("installation_id", "installation"),
        ],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS account (
    id INTEGER PRIMARY KEY,
    "tradingSystem_id" VARCHAR,
    "accountIDEutl" INTEGER,
    "accountIDTransactions" VARCHAR,
    "accountIDESD" VARCHAR,
    "yearValid" INTEGER,
    name VARCHAR,
    registry_id VARCHAR,
    "accountHolder_id" INTEGER,
    "accountType_id" VARCHAR,
    "isOpen" BOOLEAN,
    "openingDate" TIMESTAMP,
    "closingDate" TIMESTAMP,
    "commitmentPeriod" VARCHAR,
    "companyRegistrationNumber" VARCHAR,
    "companyRegistrationNumberType" VARCHAR,
    "isRegisteredEutl" BOOLEAN,
    installation_id VARCHAR,
    "bvdId" VARCHAR,
    FOREIGN KEY ("tradingSystem_id") REFERENCES trading_system_code (id),
    FOREIGN KEY (registry_id) REFERENCES country_code (id),
    FOREIGN KEY ("accountHolder_id") REFERENCES account_holder (id),
    FOREIGN KEY ("accountType_id") REFERENCES account_type_code (id),
    FOREIGN KEY (installation_id) REFERENCES installation (id)
);"#,
    },
    TableDef {
        name: "transaction",
        entry: "transaction.csv",
        kind: TableKind::Fact,
        primary_key: &["id"],
        columns: &[
            "id",
            "transactionID",
            "tradingSystem_id",
            "date",
            "acquiringYear",
            "transferringYear",
            "transactionTypeMain_id",
            "transactionTypeSupplementary_id",
            "transferringAccount_id",
            "acquiringAccount_id",
            "unitType_id",
            "project_id",
            "amount",
        ],
        integer_columns: &[
            "id",
            "transactionTypeSupplementary_id",
            "transactionTypeMain_id",
            "project_id",
            "amount",
            "transferringAccount_id",
            "acquiringAccount_id",
        ],
        date_columns: &["date"],
        text_columns: &[],
        foreign_keys: &[
            ("tradingSystem_id", "trading_system_code"),
            ("transactionTypeMain_id", "transaction_type_main_code"),
            ("transactionTypeSupplementary_id", "transaction_type_supplementary_code"),
            ("transferringAccount_id", "account"),
            ("acquiringAccount_id", "account"),
            ("unitType_id", "unit_type"),
            ("project_id", "offset_project"),
        ],
        sort_by: None,
        keep_default_na: true,
        create_sql: r#"
CREATE TABLE IF NOT EXISTS "transaction" (
    id INTEGER PRIMARY KEY,
    "transactionID" VARCHAR,
    "tradingSystem_id" VARCHAR,
    date TIMESTAMP,
    "acquiringYear" INTEGER,
    "transferringYear" INTEGER,
    "transactionTypeMain_id" INTEGER,
    "transactionTypeSupplementary_id" INTEGER,
    "transferringAccount_id" INTEGER,
    "acquiringAccount_id" INTEGER,
    "unitType_id" VARCHAR,
    project_id INTEGER,
    amount BIGINT,
    FOREIGN KEY ("tradingSystem_id") REFERENCES trading_system_code (id),
    FOREIGN KEY ("transactionTypeMain_id") REFERENCES transaction_type_main_code (id),
    FOREIGN KEY ("transactionTypeSupplementary_id") REFERENCES transaction_type_supplementary_code (id),
    FOREIGN KEY ("transferringAccount_id") REFERENCES account (id),
    FOREIGN KEY ("acquiringAccount_id") REFERENCES account (id),
    FOREIGN KEY ("unitType_id") REFERENCES unit_type (id),
    FOREIGN KEY (project_id) REFERENCES offset_project (id)
);"#,
    },
];

pub fn table(name: &str) -> Option<&'static TableDef> {
    TABLES.iter().find(|t| t.name == name)
}

/// Load order computed from the foreign-key digraph: every table comes after
/// all tables it references, lookups before facts.  The registry is a static
/// DAG, so a cycle here is a programming error.
pub fn load_order() -> Vec<&'static TableDef> {
    let mut graph: DiGraph<&'static str, ()> = DiGraph::new();
    let mut nodes: HashMap<&'static str, NodeIndex> = HashMap::new();
    for def in TABLES {
        nodes.insert(def.name, graph.add_node(def.name));
    }
    for def in TABLES {
        for (_, target) in def.foreign_keys {
            if *target != def.name {
                graph.add_edge(nodes[target], nodes[def.name], ());
            }
        }
    }
    let sorted = toposort(&graph, None).expect("foreign-key graph has a cycle");
    let mut order: Vec<&'static TableDef> = sorted
        .into_iter()
        .map(|n| table(graph[n]).unwrap())
        .collect();
    // lookups have no incoming dependencies; pulling them to the front keeps
    // the order topological and matches the reference-data-first convention
    let facts: Vec<&'static TableDef> = order
        .iter()
        .filter(|d| d.kind == TableKind::Fact)
        .copied()
        .collect();
    order.retain(|d| d.kind == TableKind::Lookup);
    order.extend(facts);
    order
}

/// True if every table in `order` appears after all tables it references.
pub fn is_topological(order: &[&str]) -> bool {
    for (i, name) in order.iter().enumerate() {
        let Some(def) = table(name) else {
            return false;
        };
        for (_, target) in def.foreign_keys {
            if *target != def.name && !order[..i].contains(target) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_order_is_topological() {
        assert_eq!(MANUAL_LOAD_ORDER.len(), TABLES.len());
        assert!(is_topological(MANUAL_LOAD_ORDER));
    }

    #[test]
    fn computed_order_is_topological_and_complete() {
        let order = load_order();
        assert_eq!(order.len(), TABLES.len());
        let names: Vec<&str> = order.iter().map(|d| d.name).collect();
        assert!(is_topological(&names));
        // lookups strictly before facts
        let first_fact = order.iter().position(|d| d.kind == TableKind::Fact).unwrap();
        assert!(order[..first_fact]
            .iter()
            .all(|d| d.kind == TableKind::Lookup));
        assert!(order[first_fact..].iter().all(|d| d.kind == TableKind::Fact));
    }

    #[test]
    fn definitions_are_consistent() {
        for def in TABLES {
            assert!(def.entry.ends_with(".csv"), "{}", def.entry);
            for pk in def.primary_key {
                assert!(def.columns.contains(pk), "{}.{}", def.name, pk);
            }
            for c in def.integer_columns {
                assert!(def.columns.contains(c), "{}.{}", def.name, c);
            }
            for (col, target) in def.foreign_keys {
                assert!(def.columns.contains(col), "{}.{}", def.name, col);
                assert!(table(target).is_some(), "{} -> {}", def.name, target);
            }
            if let Some(col) = def.sort_by {
                assert!(def.columns.contains(&col), "{}.{}", def.name, col);
            }
        }
    }
}
