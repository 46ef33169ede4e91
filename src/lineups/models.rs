use serde::Serialize;
use serde_json::Value;

use crate::store::Row;

/// Starting eleven of one side, players grouped by line from goalkeeper up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamLineup {
    pub team: String,
    pub formation: String,
    pub players: Vec<Vec<String>>,
}

impl TeamLineup {
    pub fn player_count(&self) -> usize {
        self.players.iter().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchLineup {
    pub home: TeamLineup,
    pub away: TeamLineup,
}

impl MatchLineup {
    /// Two CSV rows, home first. Lines are joined with ` | `, names within a
    /// line with `, `.
    pub fn to_rows(&self, league: &str) -> [Row; 2] {
        [
            side_row(league, "home", &self.home),
            side_row(league, "away", &self.away),
        ]
    }
}

fn side_row(league: &str, side: &str, lineup: &TeamLineup) -> Row {
    let players = lineup
        .players
        .iter()
        .map(|line| line.join(", "))
        .collect::<Vec<_>>()
        .join(" | ");

    let mut row = Row::new();
    row.insert("league".to_string(), Value::from(league));
    row.insert("side".to_string(), Value::from(side));
    row.insert("team".to_string(), Value::from(lineup.team.as_str()));
    row.insert("formation".to_string(), Value::from(lineup.formation.as_str()));
    row.insert("players".to_string(), Value::from(players));
    row
}
