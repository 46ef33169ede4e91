//! Football statistics toolkit: crawl Understat league pages into a CSV
//! store, query it, study recent form, scrape starting lineups and work with
//! betting odds.

pub mod analysis;
pub mod config;
pub mod crawl;
pub mod error;
pub mod lineups;
pub mod monitoring;
pub mod odds;
pub mod store;
pub mod util;

pub use error::{Error, ErrorKind, Result};
