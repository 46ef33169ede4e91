//! Starting lineups scraped from rendered match pages.

pub mod driver;
pub mod models;
pub mod scraper;

pub use driver::{HttpDriver, PageDriver, WebDriverSession};
pub use models::{MatchLineup, TeamLineup};
pub use scraper::{parse_lineups, LineupScraper};
