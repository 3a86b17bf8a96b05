pub mod analysis;
pub mod archive;
pub mod coerce;
pub mod download;
pub mod error;
pub mod frame;
pub mod loader;
pub mod schema;
