//! Lineup tables from a rendered Sportsgambler page.
//!
//! Markup the parser relies on:
//!
//! ```text
//! .table-row-loneups                one match
//!   .fxs-team                       home then away team name
//!   .lineups-toggle-formation       home then away formation
//!   .lineups-home / .lineups-away
//!     .players-line                 <span>number</span><span>name</span>...
//! ```

use std::sync::Arc;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::config::SportsgamblerConfig;
use crate::error::{Error, Result};
use crate::lineups::driver::PageDriver;
use crate::lineups::models::{MatchLineup, TeamLineup};
use crate::util::get_url;

pub struct LineupScraper {
    driver: Arc<dyn PageDriver>,
    base_url: String,
    max_missing_rows: usize,
}

impl LineupScraper {
    pub fn new(driver: Arc<dyn PageDriver>, config: &SportsgamblerConfig) -> Self {
        Self {
            driver,
            base_url: config.base_url.clone(),
            max_missing_rows: config.max_missing_rows,
        }
    }

    /// `{base_url}/{league}/`
    pub fn league_url(&self, league: &str) -> String {
        format!("{}/", get_url(&[self.base_url.as_str(), league.trim_matches('/')]))
    }

    pub async fn scrape(&self, league: &str) -> Result<Vec<MatchLineup>> {
        let url = self.league_url(league);
        let html = self.driver.page_source(&url).await?;
        let lineups = parse_lineups(&html, self.max_missing_rows)?;
        info!(league, driver = self.driver.name(), matches = lineups.len(), "Scraped lineups");
        Ok(lineups)
    }
}

struct Selectors {
    row: Selector,
    home: Selector,
    away: Selector,
    team: Selector,
    formation: Selector,
    line: Selector,
    span: Regex,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            row: selector(".table-row-loneups")?,
            home: selector(".lineups-home")?,
            away: selector(".lineups-away")?,
            team: selector(".fxs-team")?,
            formation: selector(".lineups-toggle-formation")?,
            line: selector(".players-line")?,
            span: Regex::new(r"(?s)<span[^>]*>(.*?)</span>")
                .map_err(|e| Error::Parse(format!("bad span pattern: {e}")))?,
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("bad selector {css}: {e}")))
}

/// Every match row on the page.
///
/// Rows missing any lineup element are skipped; after `max_missing_rows`
/// of them the scan stops, since the rest of the table is page furniture.
pub fn parse_lineups(html: &str, max_missing_rows: usize) -> Result<Vec<MatchLineup>> {
    let sel = Selectors::new()?;
    let document = Html::parse_document(html);

    let mut lineups = Vec::new();
    let mut missing = 0;
    for row in document.select(&sel.row) {
        match parse_row(row, &sel) {
            Some(lineup) => lineups.push(lineup),
            None => {
                missing += 1;
                debug!(missing, "Row without lineup elements");
                if missing >= max_missing_rows {
                    break;
                }
            }
        }
    }
    Ok(lineups)
}

fn parse_row(row: ElementRef<'_>, sel: &Selectors) -> Option<MatchLineup> {
    let home = row.select(&sel.home).next()?;
    let away = row.select(&sel.away).next()?;
    let teams: Vec<String> = row.select(&sel.team).map(|t| t.inner_html().trim().to_string()).collect();
    let forms: Vec<String> = row
        .select(&sel.formation)
        .map(|f| f.inner_html().trim().to_string())
        .collect();
    if teams.len() < 2 || forms.len() < 2 {
        return None;
    }

    Some(MatchLineup {
        home: TeamLineup {
            team: teams[0].clone(),
            formation: forms[0].clone(),
            players: player_lines(home, sel),
        },
        away: TeamLineup {
            team: teams[1].clone(),
            formation: forms[1].clone(),
            players: player_lines(away, sel),
        },
    })
}

/// One list of names per `.players-line` of a side, goalkeeper first.
fn player_lines(side: ElementRef<'_>, sel: &Selectors) -> Vec<Vec<String>> {
    side.select(&sel.line)
        .map(|l| player_names(&l.inner_html(), &sel.span))
        .collect()
}

/// Spans alternate shirt number and name, so names are the odd-indexed
/// spans.
fn player_names(line_html: &str, span: &Regex) -> Vec<String> {
    span.captures_iter(line_html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .skip(1)
        .step_by(2)
        .collect()
}
