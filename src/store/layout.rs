//! On-disk layout of the league store:
//!
//! ```text
//! {base}/{league}/{year}/teamsData.csv
//! {base}/{league}/{year}/playersData.csv
//! {base}/{league}/{year}/datesData.csv
//! {base}/{league}/{year}/{Team_Name}/team_data.csv
//! ```

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};
use crate::util::get_dirs;

pub const TEAMS_DATA: &str = "teamsData";
pub const PLAYERS_DATA: &str = "playersData";
pub const GAMES_DATA: &str = "datesData";
pub const TEAM_HISTORY: &str = "team_data";
pub const FORMAT: &str = "csv";

#[derive(Debug, Clone)]
pub struct StoreLayout {
    base: PathBuf,
}

impl StoreLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn league_dir(&self, league: &str) -> PathBuf {
        self.base.join(league)
    }

    pub fn year_dir(&self, league: &str, year: &str) -> PathBuf {
        self.league_dir(league).join(year)
    }

    pub fn teams_file(&self, league: &str, year: &str) -> PathBuf {
        self.year_dir(league, year).join(data_file(TEAMS_DATA))
    }

    pub fn players_file(&self, league: &str, year: &str) -> PathBuf {
        self.year_dir(league, year).join(data_file(PLAYERS_DATA))
    }

    pub fn games_file(&self, league: &str, year: &str) -> PathBuf {
        self.year_dir(league, year).join(data_file(GAMES_DATA))
    }

    pub fn team_history_file(&self, league: &str, year: &str, team: &str) -> PathBuf {
        self.year_dir(league, year)
            .join(team_dir_name(team))
            .join(data_file(TEAM_HISTORY))
    }

    /// League directories present in the store.
    pub fn leagues(&self) -> Result<Vec<String>> {
        get_dirs(&self.base)
    }

    /// Season directories of a league, ignoring anything that is not a year.
    pub fn league_years(&self, league: &str) -> Result<Vec<String>> {
        let years = get_dirs(&self.league_dir(league))?
            .into_iter()
            .filter(|y| y.parse::<u32>().is_ok())
            .collect();
        Ok(years)
    }

    /// Latest season stored for a league, compared numerically.
    pub fn most_recent_year(&self, league: &str) -> Result<String> {
        self.league_years(league)?
            .into_iter()
            .filter_map(|y| y.parse::<u32>().ok())
            .max()
            .map(|y| y.to_string())
            .ok_or_else(|| Error::NotFound(format!("no seasons stored for league {league}")))
    }

    pub fn league_exists(&self, league: &str) -> bool {
        let exists = self.league_dir(league).is_dir();
        if !exists {
            warn!(league, "League not found");
        }
        exists
    }

    pub fn year_exists(&self, league: &str, year: &str) -> bool {
        let exists = self.year_dir(league, year).is_dir();
        if !exists {
            warn!(league, year, "Year not found in league");
        }
        exists
    }

    /// Path of a league season, if both the league and the year are stored.
    pub fn check_league_year(&self, league: &str, year: &str) -> Result<PathBuf> {
        if !self.league_exists(league) {
            return Err(Error::NotFound(format!("league {league}")));
        }
        if !self.year_exists(league, year) {
            return Err(Error::NotFound(format!("year {year} in league {league}")));
        }
        Ok(self.year_dir(league, year))
    }
}

/// Directory name for a team: display name with spaces replaced.
pub fn team_dir_name(team: &str) -> String {
    team.replace(' ', "_")
}

pub fn data_file(name: &str) -> String {
    format!("{name}.{FORMAT}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn store_with(dirs: &[&str]) -> (tempfile::TempDir, StoreLayout) {
        let tmp = tempfile::tempdir().unwrap();
        for d in dirs {
            std::fs::create_dir_all(tmp.path().join(d)).unwrap();
        }
        let layout = StoreLayout::new(tmp.path());
        (tmp, layout)
    }

    #[test]
    fn test_paths() {
        let layout = StoreLayout::new("data");
        assert_eq!(
            layout.team_history_file("EPL", "2020", "Manchester United"),
            Path::new("data/EPL/2020/Manchester_United/team_data.csv")
        );
        assert_eq!(
            layout.teams_file("EPL", "2020"),
            Path::new("data/EPL/2020/teamsData.csv")
        );
    }

    #[test]
    fn test_most_recent_year_is_numeric_max() {
        let (_tmp, layout) = store_with(&["EPL/2019", "EPL/2021", "EPL/999", "EPL/notes"]);
        assert_eq!(layout.league_years("EPL").unwrap(), vec!["2019", "2021", "999"]);
        assert_eq!(layout.most_recent_year("EPL").unwrap(), "2021");
    }

    #[test]
    fn test_most_recent_year_empty_league() {
        let (_tmp, layout) = store_with(&["EPL"]);
        assert_eq!(layout.most_recent_year("EPL").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_check_league_year() {
        let (_tmp, layout) = store_with(&["EPL/2020"]);
        assert!(layout.check_league_year("EPL", "2020").is_ok());
        assert_eq!(
            layout.check_league_year("EPL", "2018").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            layout.check_league_year("Serie_A", "2020").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
