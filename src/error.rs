use thiserror::Error;

/// Failure modes of the zip-to-database pipeline.  Duplicate primary keys
/// during a row-level upsert are not errors; they are counted in the
/// [`crate::loader::upsert::LoadReport`].
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("archive has no entry named {0}")]
    EntryNotFound(String),

    #[error("malformed value {value:?} in column {column} of {entry}")]
    MalformedData {
        entry: String,
        column: String,
        value: String,
    },

    #[error("column {column} missing from the rows for table {table}")]
    MissingColumn { table: String, column: String },

    #[error("destination table {0} already holds rows")]
    TableExists(String),

    #[error("bulk transfer into {table} failed: {source}")]
    Transfer {
        table: String,
        source: duckdb::Error,
    },

    #[error("no download url registered for year {0}")]
    UnknownYear(u16),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Db(#[from] duckdb::Error),

    #[error(transparent)]
    Download(#[from] reqwest::Error),
}
