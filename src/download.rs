use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;

use lazy_static::lazy_static;
use log::info;
use reqwest::blocking::get;

use crate::error::LoadError;

pub const MOST_RECENT_YEAR: u16 = 2024;

lazy_static! {
    /// Public snapshots of the zipped csv export, keyed by vintage year.
    pub static ref URLS: HashMap<u16, &'static str> = HashMap::from([
        (
            2024u16,
            "https://euets-info-public.s3.eu-central-1.amazonaws.com/eutl_2024_202410.zip"
        ),
        (
            2023u16,
            "https://euets-info-public.s3.eu-central-1.amazonaws.com/eutl_2023.zip"
        ),
        (
            2022u16,
            "https://euets-info-public.s3.eu-central-1.amazonaws.com/eutl_2022.zip"
        ),
        (
            2021u16,
            "https://euets-info-public.s3.eu-central-1.amazonaws.com/eutl_2021.zip"
        ),
    ]);
}

/// Download the archive for `year` to `out` (a temp path when `None`) and
/// return the path of the saved file.
pub fn download_data(year: u16, out: Option<PathBuf>) -> Result<PathBuf, LoadError> {
    let url = URLS.get(&year).ok_or(LoadError::UnknownYear(year))?;
    let out = out.unwrap_or_else(|| std::env::temp_dir().join(format!("eutl_{}.zip", year)));
    info!("downloading {} ...", url);
    let mut resp = get(*url)?.error_for_status()?;
    let mut file = File::create(&out)?;
    std::io::copy(&mut resp, &mut file)?;
    info!("saved archive to {}", out.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_year_is_rejected() {
        match download_data(1999, None) {
            Err(LoadError::UnknownYear(y)) => assert_eq!(y, 1999),
            other => panic!("expected UnknownYear, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn most_recent_year_has_a_url() {
        assert!(URLS.contains_key(&MOST_RECENT_YEAR));
    }
}
