//! Per-variable extraction strategies.
//!
//! Each embedded variable is turned into a flat table. Most variables are a
//! plain list of records; `teamsData` additionally carries every team's game
//! history, which becomes its own file next to an aggregated league table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::store::csv_io::{sum_column, Row};
use crate::store::layout::{data_file, team_dir_name, TEAMS_DATA, TEAM_HISTORY};
use crate::util::flatten_map;

pub const KEY_DELIMITER: &str = "_";

/// An extra file produced alongside the main table.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub rows: Vec<Row>,
}

/// A record left out of the main table, with the reason why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub key: String,
    pub reason: String,
}

/// Per-record outcome counts for one variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateReport {
    pub accepted: usize,
    pub skipped: Vec<SkippedRow>,
}

/// Normalized output of one strategy.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub rows: Vec<Row>,
    pub artifacts: Vec<Artifact>,
    pub report: AggregateReport,
}

/// Turns one decoded variable into table rows plus nested artifacts.
pub trait ExtractionStrategy: Send + Sync {
    /// Name of the variable this strategy is registered for.
    fn variable(&self) -> &str;

    /// `out_dir` is the directory the main table will be written into;
    /// artifact paths are resolved relative to it.
    fn extract(&self, value: Value, out_dir: &Path) -> Result<Extracted>;
}

/// Wrap a single object in a list and flatten every record.
#[derive(Debug, Clone)]
pub struct TableStrategy {
    variable: String,
}

impl TableStrategy {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl ExtractionStrategy for TableStrategy {
    fn variable(&self) -> &str {
        &self.variable
    }

    fn extract(&self, value: Value, _out_dir: &Path) -> Result<Extracted> {
        let records = match value {
            Value::Array(items) => items,
            obj @ Value::Object(_) => vec![obj],
            other => {
                return Err(Error::Parse(format!(
                    "{} is neither a list nor an object: {other}",
                    self.variable
                )))
            }
        };

        let mut out = Extracted::default();
        for (i, record) in records.into_iter().enumerate() {
            match record {
                Value::Object(map) => {
                    out.rows.push(flatten_map(&map, KEY_DELIMITER));
                    out.report.accepted += 1;
                }
                other => {
                    warn!(variable = %self.variable, index = i, "Skipping non-object record");
                    out.report.skipped.push(SkippedRow {
                        key: i.to_string(),
                        reason: format!("not an object: {other}"),
                    });
                }
            }
        }
        Ok(out)
    }
}

/// `teamsData`: a map of team id to `{id, title, history: [...]}`.
///
/// Writes `{Team_Name}/team_data.csv` per team and reduces the history to
/// one row per team by summing its numeric columns. Text columns are dropped
/// from the summary. A history that cannot be summed is still written; only
/// its summary row is skipped.
#[derive(Debug, Clone, Default)]
pub struct TeamsStrategy;

impl TeamsStrategy {
    /// Title and flattened games of one team entry. Games that are not
    /// objects are dropped.
    fn history(&self, team: &Row) -> std::result::Result<(String, Vec<Row>), String> {
        let title = team
            .get("title")
            .and_then(Value::as_str)
            .ok_or("missing title")?
            .to_string();

        let Some(Value::Array(history)) = team.get("history") else {
            return Err(format!("{title}: missing history"));
        };
        let games = history
            .iter()
            .enumerate()
            .filter_map(|(i, g)| match g {
                Value::Object(map) => Some(flatten_map(map, KEY_DELIMITER)),
                other => {
                    warn!(team = %title, game = i, value = %other, "Dropping non-object game");
                    None
                }
            })
            .collect();
        Ok((title, games))
    }

    fn summarize(&self, title: &str, team: &Row, games: &[Row]) -> std::result::Result<Row, String> {
        let first = games
            .first()
            .ok_or_else(|| format!("{title}: empty history"))?;

        let mut summary: Row = team
            .iter()
            .filter(|(key, _)| key.as_str() != "history")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, _) in first.iter().filter(|(_, v)| v.is_number()) {
            let total = sum_column(games, key).map_err(|e| format!("{title}: {e}"))?;
            summary.insert(key.clone(), total);
        }
        Ok(flatten_map(&summary, KEY_DELIMITER))
    }
}

impl ExtractionStrategy for TeamsStrategy {
    fn variable(&self) -> &str {
        TEAMS_DATA
    }

    fn extract(&self, value: Value, out_dir: &Path) -> Result<Extracted> {
        let teams: Vec<(String, Value)> = match value {
            Value::Object(map) => map.into_iter().collect(),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            other => return Err(Error::Parse(format!("teamsData is not a collection: {other}"))),
        };

        let mut out = Extracted::default();
        for (key, team) in teams {
            let Value::Object(team) = team else {
                out.report.skipped.push(SkippedRow {
                    key,
                    reason: "team entry is not an object".to_string(),
                });
                continue;
            };
            let (title, games) = match self.history(&team) {
                Ok(history) => history,
                Err(reason) => {
                    warn!(team = %key, reason = %reason, "Skipping team");
                    out.report.skipped.push(SkippedRow { key, reason });
                    continue;
                }
            };

            let summary = self.summarize(&title, &team, &games);
            if !games.is_empty() {
                out.artifacts.push(Artifact {
                    path: out_dir
                        .join(team_dir_name(&title))
                        .join(data_file(TEAM_HISTORY)),
                    rows: games,
                });
            }
            match summary {
                Ok(row) => {
                    out.rows.push(row);
                    out.report.accepted += 1;
                }
                Err(reason) => {
                    warn!(team = %key, reason = %reason, "Skipping team aggregate");
                    out.report.skipped.push(SkippedRow { key, reason });
                }
            }
        }
        Ok(out)
    }
}

/// Strategy lookup by variable name; unregistered names get [`TableStrategy`].
#[derive(Clone, Default)]
pub struct StrategySet {
    strategies: HashMap<String, Arc<dyn ExtractionStrategy>>,
}

impl StrategySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategies for Understat league pages.
    pub fn understat() -> Self {
        let mut set = Self::new();
        set.register(Arc::new(TeamsStrategy));
        set
    }

    pub fn register(&mut self, strategy: Arc<dyn ExtractionStrategy>) {
        self.strategies
            .insert(strategy.variable().to_string(), strategy);
    }

    pub fn for_variable(&self, variable: &str) -> Arc<dyn ExtractionStrategy> {
        self.strategies
            .get(variable)
            .cloned()
            .unwrap_or_else(|| Arc::new(TableStrategy::new(variable)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_wraps_single_object() {
        let out = TableStrategy::new("x")
            .extract(json!({"a": {"b": 1}}), Path::new("out"))
            .unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].get("a_b"), Some(&json!(1)));
        assert!(out.artifacts.is_empty());
    }

    #[test]
    fn test_table_flattens_fixture_list() {
        let dates = json!([
            {"id": "1", "h": {"title": "Fulham"}, "a": {"title": "Arsenal"}, "isResult": true},
            {"id": "2", "h": {"title": "Chelsea"}, "a": {"title": "Fulham"}, "isResult": false},
            7
        ]);
        let out = TableStrategy::new("datesData")
            .extract(dates, Path::new("out"))
            .unwrap();
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[1]["h_title"], json!("Chelsea"));
        assert_eq!(out.report.accepted, 2);
        assert_eq!(out.report.skipped.len(), 1);
        assert_eq!(out.report.skipped[0].key, "2");
    }

    #[test]
    fn test_table_rejects_scalar() {
        assert!(TableStrategy::new("x").extract(json!(3), Path::new("out")).is_err());
    }

    #[test]
    fn test_teams_aggregate_and_history() {
        let teams = json!({
            "89": {
                "id": "89",
                "title": "Manchester United",
                "history": [
                    {"h_a": "h", "xG": 1.5, "ppda": {"att": 200, "def": 20}, "scored": 1, "result": "w"},
                    {"h_a": "a", "xG": 0.5, "ppda": {"att": 100, "def": 10}, "scored": 0, "result": "l"}
                ]
            }
        });
        let out = TeamsStrategy.extract(teams, Path::new("out/EPL/2020")).unwrap();

        assert_eq!(out.rows.len(), 1);
        assert_eq!(
            Value::Object(out.rows[0].clone()),
            json!({"id": "89", "title": "Manchester United", "xG": 2.0, "ppda_att": 300, "ppda_def": 30, "scored": 1})
        );

        assert_eq!(out.artifacts.len(), 1);
        assert_eq!(
            out.artifacts[0].path,
            Path::new("out/EPL/2020/Manchester_United/team_data.csv")
        );
        assert_eq!(out.artifacts[0].rows.len(), 2);
        assert_eq!(out.artifacts[0].rows[1]["ppda_def"], json!(10));
    }

    #[test]
    fn test_teams_skips_bad_rows_and_reports() {
        let teams = json!({
            "1": {"id": "1", "title": "Good", "history": [{"xG": 1.0}]},
            "2": {"id": "2", "title": "Empty", "history": []},
            "3": {"id": "3", "title": "Ragged", "history": [{"xG": 1.0}, {"xGA": 2.0}]},
            "4": "junk"
        });
        let out = TeamsStrategy.extract(teams, Path::new("out")).unwrap();

        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0]["title"], json!("Good"));
        assert_eq!(out.report.accepted, 1);
        let skipped: Vec<&str> = out.report.skipped.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(skipped, vec!["2", "3", "4"]);
        assert!(out.report.skipped[0].reason.contains("empty history"));

        let written: Vec<&Path> = out.artifacts.iter().map(|a| a.path.as_path()).collect();
        assert_eq!(
            written,
            vec![Path::new("out/Good/team_data.csv"), Path::new("out/Ragged/team_data.csv")]
        );
    }

    #[test]
    fn test_teams_ragged_history_keeps_file() {
        let teams = json!({
            "3": {"title": "Ragged", "history": [{"xG": 1.0, "h_a": "h"}, {"xGA": 2.0, "h_a": "a"}, 5]}
        });
        let out = TeamsStrategy.extract(teams, Path::new("out")).unwrap();

        assert!(out.rows.is_empty());
        assert_eq!(out.report.accepted, 0);
        assert_eq!(out.report.skipped.len(), 1);
        assert!(out.report.skipped[0].reason.contains("missing column 'xG'"));

        assert_eq!(out.artifacts.len(), 1);
        let games = &out.artifacts[0].rows;
        assert_eq!(games.len(), 2);
        assert_eq!(games[1]["xGA"], json!(2.0));
    }

    #[test]
    fn test_strategy_set_lookup() {
        let set = StrategySet::understat();
        assert_eq!(set.for_variable("teamsData").variable(), "teamsData");
        assert_eq!(set.for_variable("playersData").variable(), "playersData");
    }
}
