use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use eutl::download;
use log::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Vintage year of the archive
    #[arg(short, long, default_value_t = download::MOST_RECENT_YEAR)]
    year: u16,

    /// Where to save the file.  Defaults to eutl_{year}.zip in the temp dir.
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let path = download::download_data(args.year, args.out)?;
    info!("archive saved to {}", path.display());
    Ok(())
}
