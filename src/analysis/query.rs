//! Read-side queries over the league store.
//!
//! Nothing here writes to disk. Missing leagues and seasons are reported as
//! [`Error::NotFound`] after a warning; callers that want the lenient
//! behaviour match on [`crate::error::ErrorKind`].

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::{read_frame, read_rows, Frame, Row, StoreLayout};
use crate::util::str2num;

/// Column added to every history frame with the opponent's display name.
pub const OPPONENT_COLUMN: &str = "opp";

/// Which games of a team's history to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    Home,
    Away,
    #[default]
    Both,
}

impl Location {
    /// Value of the `h_a` column for this location.
    fn code(self) -> Option<&'static str> {
        match self {
            Location::Home => Some("h"),
            Location::Away => Some("a"),
            Location::Both => None,
        }
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "home" | "h" => Ok(Location::Home),
            "away" | "a" => Ok(Location::Away),
            "both" | "all" => Ok(Location::Both),
            other => Err(Error::Validation(format!(
                "invalid location '{other}', expected one of: home, away, both"
            ))),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Location::Home => "home",
            Location::Away => "away",
            Location::Both => "both",
        };
        f.write_str(s)
    }
}

/// One team's games for a season, with the opponent attached.
#[derive(Debug, Clone)]
pub struct TeamHistory {
    pub team: String,
    pub games: Frame,
}

/// Query layer bound to one store and its set of known leagues.
#[derive(Debug, Clone)]
pub struct LeagueQuery {
    layout: StoreLayout,
    leagues: Vec<String>,
}

impl LeagueQuery {
    /// Known leagues are the league directories currently in the store.
    pub fn open(layout: StoreLayout) -> Result<Self> {
        let leagues = layout.leagues()?;
        debug!(leagues = ?leagues, "Opened league store");
        Ok(Self { layout, leagues })
    }

    pub fn with_leagues(layout: StoreLayout, leagues: Vec<String>) -> Self {
        Self { layout, leagues }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn leagues(&self) -> &[String] {
        &self.leagues
    }

    fn check_known(&self, league: &str) -> Result<()> {
        if self.leagues.iter().any(|l| l == league) {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "invalid league '{league}', expected one of: {}",
                self.leagues.join(", ")
            )))
        }
    }

    /// `year` if the league has it, otherwise the latest stored season.
    fn resolve_year(&self, league: &str, year: Option<&str>) -> Result<String> {
        let years = self.layout.league_years(league)?;
        if let Some(y) = year.filter(|y| years.iter().any(|s| s == y)) {
            return Ok(y.to_string());
        }

        let recent = self.layout.most_recent_year(league)?;
        match year {
            None => warn!(league, year = %recent, "No year specified, using most recent"),
            Some(requested) => warn!(league, requested, year = %recent, "Year not found, using most recent"),
        }
        Ok(recent)
    }

    /// Display names of every team in `league` for `year` (latest if absent
    /// or not stored).
    pub fn teams_in_league(&self, league: &str, year: Option<&str>) -> Result<Vec<String>> {
        self.check_known(league)?;
        let year = self.resolve_year(league, year)?;

        let rows = read_rows(&self.layout.teams_file(league, &year))?;
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                row.get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| Error::Parse(format!("{league}/{year} teams row {i} has no title")))
            })
            .collect()
    }

    /// First known league whose team list for `year` contains `team`.
    ///
    /// With `fatal` a miss is [`Error::NotFound`]; otherwise it is logged and
    /// `Ok(None)` is returned.
    pub fn find_team_league(&self, team: &str, year: Option<&str>, fatal: bool) -> Result<Option<String>> {
        for league in &self.leagues {
            let teams = self.teams_in_league(league, year)?;
            if teams.iter().any(|t| t == team) {
                return Ok(Some(league.clone()));
            }
        }

        let message = format!(
            "team '{team}' could not be found in any league: {}",
            self.leagues.join(", ")
        );
        if fatal {
            return Err(Error::NotFound(message));
        }
        warn!(team, "{message}");
        Ok(None)
    }

    /// One flag per requested team, warning for each team that is missing.
    pub fn is_team_in_league<S: AsRef<str>>(&self, league: &str, teams: &[S], year: Option<&str>) -> Result<Vec<bool>> {
        let all = self.teams_in_league(league, year)?;
        Ok(teams
            .iter()
            .map(|t| {
                let t = t.as_ref();
                let found = all.iter().any(|a| a == t);
                if !found {
                    warn!(league, team = t, "Requested team not found");
                }
                found
            })
            .collect())
    }

    /// Players whose `team_title` names `team`, numeric fields coerced.
    ///
    /// Players who moved mid-season list several clubs separated by commas
    /// and match any of them. Without `league` the team's league is looked
    /// up and a miss is an error.
    pub fn players_in_team(&self, team: &str, year: Option<&str>, league: Option<&str>) -> Result<Vec<Row>> {
        let league = match league {
            Some(l) => l.to_string(),
            None => self
                .find_team_league(team, year, true)?
                .ok_or_else(|| Error::NotFound(format!("team '{team}'")))?,
        };
        self.check_known(&league)?;
        let year = self.resolve_year(&league, year)?;

        let rows = read_rows(&self.layout.players_file(&league, &year))?;
        let players = rows
            .into_iter()
            .filter(|row| {
                row.get("team_title")
                    .and_then(Value::as_str)
                    .is_some_and(|title| title.split(',').any(|t| t.trim() == team))
            })
            .filter_map(|row| match str2num(Value::Object(row)) {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        Ok(players)
    }

    /// Game history of `teams` (every team in the league if `None`).
    ///
    /// Each frame gets an [`OPPONENT_COLUMN`] from the season's fixture list,
    /// then is narrowed to `location` and to the last `n` games when `n` is
    /// non-zero.
    pub fn team_history(
        &self,
        league: &str,
        year: &str,
        n: usize,
        teams: Option<&[String]>,
        location: Location,
    ) -> Result<Vec<TeamHistory>> {
        self.layout.check_league_year(league, year)?;

        let teams = match teams {
            Some(t) if !t.is_empty() => t.to_vec(),
            _ => self.teams_in_league(league, Some(year))?,
        };

        let fixtures = read_frame(&self.layout.games_file(league, year))?;

        let mut history = Vec::with_capacity(teams.len());
        for team in teams {
            let mut games = read_frame(&self.layout.team_history_file(league, year, &team))?;
            let team_fixtures = fixtures.filter(|i| {
                fixtures.get_str(i, "h_title").as_deref() == Some(team.as_str())
                    || fixtures.get_str(i, "a_title").as_deref() == Some(team.as_str())
            });

            let opponents = attach_opponents(&team, &games, &team_fixtures)?;
            games.push_column(OPPONENT_COLUMN, opponents)?;

            if let Some(code) = location.code() {
                games = games.filter(|i| games.get_str(i, "h_a").as_deref() == Some(code));
            }
            if n > 0 {
                games = games.tail(n);
            }

            history.push(TeamHistory { team, games });
        }

        Ok(history)
    }
}

/// Opponent name for every game in `games`.
///
/// Games are matched to fixtures by calendar date when both sides carry
/// dates; otherwise the i-th game is paired with the i-th fixture.
fn attach_opponents(team: &str, games: &Frame, fixtures: &Frame) -> Result<Vec<Value>> {
    let by_date = games.column_index("date").is_some() && fixtures.column_index("datetime").is_some();

    if by_date {
        let fixture_dates: Option<Vec<NaiveDate>> = (0..fixtures.len())
            .map(|i| fixtures.get_str(i, "datetime").and_then(|s| parse_day(&s)))
            .collect();
        let game_dates: Option<Vec<NaiveDate>> = (0..games.len())
            .map(|i| games.get_str(i, "date").and_then(|s| parse_day(&s)))
            .collect();

        if let (Some(fixture_dates), Some(game_dates)) = (fixture_dates, game_dates) {
            return game_dates
                .iter()
                .enumerate()
                .map(|(i, day)| {
                    let idx = fixture_dates.iter().position(|d| d == day).ok_or_else(|| {
                        Error::Validation(format!("{team}: game {i} on {day} has no fixture"))
                    })?;
                    Ok(opponent_of(team, fixtures, idx))
                })
                .collect();
        }
        debug!(team, "Unparseable dates, aligning games to fixtures by position");
    }

    if fixtures.len() < games.len() {
        return Err(Error::Validation(format!(
            "{team}: {} games but only {} fixtures",
            games.len(),
            fixtures.len()
        )));
    }
    Ok((0..games.len()).map(|i| opponent_of(team, fixtures, i)).collect())
}

fn opponent_of(team: &str, fixtures: &Frame, idx: usize) -> Value {
    let home = fixtures.get_str(idx, "h_title").unwrap_or_default();
    let opponent = if home == team {
        fixtures.get_str(idx, "a_title").unwrap_or_default()
    } else {
        home
    };
    Value::String(opponent)
}

/// Calendar day of `2020-09-12` or `2020-09-12 17:30:00`.
fn parse_day(s: &str) -> Option<NaiveDate> {
    let day = s.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(columns: &[&str], rows: Vec<Vec<Value>>) -> Frame {
        Frame::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_location_parse() {
        assert_eq!("home".parse::<Location>().unwrap(), Location::Home);
        assert_eq!("A".parse::<Location>().unwrap(), Location::Away);
        assert!("neutral".parse::<Location>().is_err());
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day("2020-09-12 17:30:00"), NaiveDate::from_ymd_opt(2020, 9, 12));
        assert_eq!(parse_day("12/09/2020"), None);
        assert_eq!(parse_day("2020"), None);
    }

    #[test]
    fn test_attach_opponents_by_date_ignores_order() {
        let games = frame(
            &["h_a", "date"],
            vec![
                vec![json!("a"), json!("2020-09-19 15:00:00")],
                vec![json!("h"), json!("2020-09-12 12:30:00")],
            ],
        );
        let fixtures = frame(
            &["h_title", "a_title", "datetime"],
            vec![
                vec![json!("Fulham"), json!("Arsenal"), json!("2020-09-12 12:30:00")],
                vec![json!("West Ham"), json!("Fulham"), json!("2020-09-19 15:00:00")],
            ],
        );
        let opp = attach_opponents("Fulham", &games, &fixtures).unwrap();
        assert_eq!(opp, vec![json!("West Ham"), json!("Arsenal")]);
    }

    #[test]
    fn test_attach_opponents_missing_fixture_date() {
        let games = frame(&["date"], vec![vec![json!("2020-10-01")]]);
        let fixtures = frame(
            &["h_title", "a_title", "datetime"],
            vec![vec![json!("Fulham"), json!("Arsenal"), json!("2020-09-12")]],
        );
        let err = attach_opponents("Fulham", &games, &fixtures).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ValidationFailure);
    }

    #[test]
    fn test_attach_opponents_positional_fallback() {
        let games = frame(&["h_a"], vec![vec![json!("h")], vec![json!("a")]]);
        let fixtures = frame(
            &["h_title", "a_title"],
            vec![
                vec![json!("Fulham"), json!("Arsenal")],
                vec![json!("Leeds"), json!("Fulham")],
            ],
        );
        let opp = attach_opponents("Fulham", &games, &fixtures).unwrap();
        assert_eq!(opp, vec![json!("Arsenal"), json!("Leeds")]);

        let short = frame(&["h_title", "a_title"], vec![]);
        assert!(attach_opponents("Fulham", &games, &short).is_err());
    }
}
