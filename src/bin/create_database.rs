use std::error::Error;
use std::path::Path;

use clap::Parser;
use duckdb::Connection;
use eutl::download;
use eutl::loader::{reset, EutlArchive};
use log::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the zipped csv export.  Downloaded if not provided.
    #[arg(short, long)]
    archive: Option<String>,

    /// Path of the DuckDB database to (re)create
    #[arg(short, long)]
    db: String,

    /// Vintage year to download when no archive is given
    #[arg(short, long, default_value_t = download::MOST_RECENT_YEAR)]
    year: u16,

    /// Drop existing tables without asking
    #[arg(long)]
    yes: bool,

    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let _ = dotenvy::from_path(Path::new(format!(".env/{}.env", args.env).as_str()));

    let archive = EutlArchive {
        archive_path: args.archive,
        duckdb_path: args.db,
        year: args.year,
    };
    let conn = Connection::open(&archive.duckdb_path)?;

    let mut confirm: Box<dyn FnMut() -> bool> = if args.yes {
        Box::new(|| true)
    } else {
        Box::new(reset::stdin_confirmation())
    };
    archive.load_all(&conn, &mut confirm)?;
    info!("database ready at {}", archive.duckdb_path);
    Ok(())
}
