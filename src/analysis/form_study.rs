//! Does recent form predict the next game?
//!
//! For every team and every run of `window` consecutive games, the mean of
//! those games (and of the next opponent's games over the same run) is a
//! feature row; the target is a statistic of the game that follows. A linear
//! model is fitted on a seeded split and cross-validated.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::query::{TeamHistory, OPPONENT_COLUMN};
use crate::analysis::regression::{cross_val_rmse, mean_squared_error, select, train_test_split, LinearRegression};
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::store::{write_rows, Frame, Row};

pub const OPPONENT_PREFIX: &str = "opp_";

/// Feature matrix built from team histories.
#[derive(Debug, Clone, Default)]
pub struct Samples {
    /// `{team}{start}` for each row, e.g. `Arsenal4`.
    pub labels: Vec<String>,
    pub features: Vec<String>,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

impl Samples {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// One scatter point of a feature against the actual and predicted target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub feature: String,
    pub coefficient: f64,
    pub value: f64,
    pub actual: f64,
    pub predicted: f64,
}

#[derive(Debug, Clone)]
pub struct FormStudy {
    pub window: usize,
    pub target: String,
    pub samples: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub intercept: f64,
    /// Sorted by absolute value, largest first.
    pub coefficients: Vec<(String, f64)>,
    pub test_rmse: f64,
    pub cross_val_rmse: Vec<f64>,
    pub chart: Vec<ChartPoint>,
}

impl FormStudy {
    pub fn mean_cross_val_rmse(&self) -> f64 {
        if self.cross_val_rmse.is_empty() {
            return f64::NAN;
        }
        self.cross_val_rmse.iter().sum::<f64>() / self.cross_val_rmse.len() as f64
    }
}

/// Build one sample per team per window start.
///
/// Features whose name matches `exclude` are dropped. A window whose next
/// opponent has no history in `history` is skipped with a warning.
pub fn build_samples(history: &[TeamHistory], window: usize, target: &str, exclude: &str) -> Result<Samples> {
    if window == 0 {
        return Err(Error::Validation("window must be at least one game".to_string()));
    }
    let exclude = Regex::new(exclude)
        .map_err(|e| Error::Validation(format!("bad exclude pattern '{exclude}': {e}")))?;
    let by_team: HashMap<&str, &Frame> = history.iter().map(|h| (h.team.as_str(), &h.games)).collect();

    let mut samples = Samples::default();
    for entry in history {
        let games = &entry.games;
        for start in 0..games.len().saturating_sub(window) {
            let stop = start + window;
            let label = format!("{}{start}", entry.team);

            let next = games.row_numbers(stop);
            let y = next
                .iter()
                .find(|(name, _)| name == target)
                .map(|(_, v)| *v)
                .ok_or_else(|| Error::Parse(format!("{label}: next game has no numeric '{target}'")))?;

            let Some(opponent) = games.get_str(stop, OPPONENT_COLUMN) else {
                return Err(Error::Validation(format!("{}: history has no opponent column", entry.team)));
            };
            let Some(opp_games) = by_team.get(opponent.as_str()) else {
                warn!(sample = %label, opponent = %opponent, "Opponent history missing, skipping sample");
                continue;
            };

            let mut row: Vec<(String, f64)> = games.mean_numeric(start..stop);
            row.extend(
                opp_games
                    .mean_numeric(start..stop)
                    .into_iter()
                    .map(|(name, v)| (format!("{OPPONENT_PREFIX}{name}"), v)),
            );
            row.retain(|(name, _)| !exclude.is_match(name));

            if samples.features.is_empty() {
                samples.features = row.iter().map(|(name, _)| name.clone()).collect();
            }
            let values = align(&samples.features, &row)
                .ok_or_else(|| Error::Validation(format!("{label}: feature set differs from the first sample")))?;

            samples.labels.push(label);
            samples.x.push(values);
            samples.y.push(y);
        }
    }

    Ok(samples)
}

fn align(features: &[String], row: &[(String, f64)]) -> Option<Vec<f64>> {
    if row.len() != features.len() {
        return None;
    }
    features
        .iter()
        .map(|f| row.iter().find(|(name, _)| name == f).map(|(_, v)| *v))
        .collect()
}

/// Fit, score and chart the form model.
pub fn run_form_study(history: &[TeamHistory], config: &AnalysisConfig) -> Result<FormStudy> {
    let samples = build_samples(history, config.window, &config.target, &config.exclude_pattern)?;
    if samples.is_empty() {
        return Err(Error::Validation(format!(
            "no samples: every team has at most {} games",
            config.window
        )));
    }
    info!(samples = samples.len(), features = samples.features.len(), "Built form samples");

    let (train, test) = train_test_split(samples.len(), config.test_fraction, config.seed)?;
    let (train_x, train_y) = select(&samples.x, &samples.y, &train);
    let (test_x, test_y) = select(&samples.x, &samples.y, &test);

    let model = LinearRegression::fit(&train_x, &train_y)?;
    let predicted = model.predict(&test_x);
    let test_rmse = mean_squared_error(&test_y, &predicted)?.sqrt();

    let mut coefficients: Vec<(String, f64)> = samples
        .features
        .iter()
        .cloned()
        .zip(model.coefficients.iter().copied())
        .collect();
    coefficients.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

    let cross_val = cross_val_rmse(&samples.x, &samples.y, config.folds)?;

    let mut chart = Vec::new();
    for (name, coefficient) in coefficients.iter().take(config.top_features) {
        let Some(col) = samples.features.iter().position(|f| f == name) else {
            continue;
        };
        for ((row, actual), pred) in test_x.iter().zip(&test_y).zip(&predicted) {
            chart.push(ChartPoint {
                feature: name.clone(),
                coefficient: *coefficient,
                value: row[col],
                actual: *actual,
                predicted: *pred,
            });
        }
    }

    let study = FormStudy {
        window: config.window,
        target: config.target.clone(),
        samples: samples.len(),
        train_size: train.len(),
        test_size: test.len(),
        intercept: model.intercept,
        coefficients,
        test_rmse,
        cross_val_rmse: cross_val,
        chart,
    };
    info!(
        test_rmse = study.test_rmse,
        cv_rmse = study.mean_cross_val_rmse(),
        "Form study fitted"
    );
    Ok(study)
}

pub fn write_chart_data(points: &[ChartPoint], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::csv(path, e))?;
    for point in points {
        writer.serialize(point).map_err(|e| Error::csv(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Season mean of every numeric statistic, one column per team.
pub fn per_game_means(history: &[TeamHistory]) -> Frame {
    let per_team: Vec<Vec<(String, f64)>> = history
        .iter()
        .map(|h| h.games.mean_numeric(0..h.games.len()))
        .collect();
    let stats: Vec<String> = per_team
        .first()
        .map(|means| means.iter().map(|(name, _)| name.clone()).collect())
        .unwrap_or_default();

    let rows: Vec<Row> = stats
        .iter()
        .map(|stat| {
            let mut row = Row::new();
            row.insert("stat".to_string(), Value::String(stat.clone()));
            for (team, means) in history.iter().zip(&per_team) {
                let value = means
                    .iter()
                    .find(|(name, _)| name == stat)
                    .and_then(|(_, v)| serde_json::Number::from_f64(*v))
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
                row.insert(team.team.clone(), value);
            }
            row
        })
        .collect();

    Frame::from_rows(&rows)
}

pub fn write_per_game_means(history: &[TeamHistory], path: &Path) -> Result<()> {
    write_rows(&per_game_means(history).to_rows(), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn history(team: &str, opps: &[&str], xg: &[f64], npxg: &[f64]) -> TeamHistory {
        let rows = xg
            .iter()
            .zip(npxg)
            .zip(opps)
            .map(|((x, n), o)| vec![json!("h"), json!(x), json!(n), json!(o)])
            .collect();
        TeamHistory {
            team: team.to_string(),
            games: Frame::new(
                vec!["h_a".into(), "xG".into(), "npxG".into(), "opp".into()],
                rows,
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_build_samples_windows_and_opponents() {
        let hist = vec![
            history("A", &["B", "B", "B", "B"], &[1.0, 2.0, 3.0, 4.0], &[0.0; 4]),
            history("B", &["A", "A", "A", "A"], &[0.0, 2.0, 4.0, 6.0], &[0.0; 4]),
        ];
        let samples = build_samples(&hist, 2, "xG", "npx").unwrap();

        assert_eq!(samples.features, vec!["xG", "opp_xG"]);
        assert_eq!(samples.labels, vec!["A0", "A1", "B0", "B1"]);
        assert_eq!(samples.x[0], vec![1.5, 1.0]);
        assert_eq!(samples.x[3], vec![3.0, 2.5]);
        assert_eq!(samples.y, vec![3.0, 4.0, 4.0, 6.0]);
    }

    #[test]
    fn test_build_samples_skips_unknown_opponent() {
        let hist = vec![history("A", &["B", "Z", "B"], &[1.0, 2.0, 3.0], &[0.0; 3])];
        let samples = build_samples(&hist, 1, "xG", "npx").unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_build_samples_rejects_zero_window() {
        assert!(build_samples(&[], 0, "xG", "npx").is_err());
    }

    #[test]
    fn test_per_game_means_columns_per_team() {
        let hist = vec![
            history("A", &["B", "B"], &[1.0, 3.0], &[0.5, 0.5]),
            history("B", &["A", "A"], &[2.0, 2.0], &[1.0, 0.0]),
        ];
        let means = per_game_means(&hist);
        assert_eq!(means.columns(), &["stat", "A", "B"]);
        assert_eq!(means.get_str(0, "stat").as_deref(), Some("xG"));
        assert_eq!(means.get(0, "A"), Some(&json!(2.0)));
        assert_eq!(means.get(1, "B"), Some(&json!(0.5)));
    }

    #[test]
    fn test_run_form_study_recovers_linear_signal() {
        // next xG tracks the mean of the previous two, plus a periodic bump
        let mut xg = vec![1.0, 2.0];
        for i in 2..24 {
            let next = (xg[i - 1] + xg[i - 2]) / 2.0 + if i % 3 == 0 { 0.7 } else { 0.0 };
            xg.push(next);
        }
        let opps = vec!["B"; xg.len()];
        let hist = vec![
            history("A", &opps, &xg, &vec![0.0; xg.len()]),
            history("B", &vec!["A"; xg.len()], &xg, &vec![0.0; xg.len()]),
        ];
        let config = AnalysisConfig {
            window: 2,
            target: "xG".to_string(),
            exclude_pattern: "npx".to_string(),
            test_fraction: 0.2,
            folds: 4,
            seed: 0,
            top_features: 6,
            fuzzy_tolerance: 0.95,
        };

        let study = run_form_study(&hist, &config).unwrap();
        assert_eq!(study.samples, 44);
        assert_eq!(study.test_size, 9);
        assert_eq!(study.cross_val_rmse.len(), 4);
        assert_eq!(study.coefficients.len(), 2);
        assert!(study.test_rmse.is_finite());
        assert_eq!(study.chart.len(), 2 * 9);

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chart.csv");
        write_chart_data(&study.chart, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("feature,coefficient,value,actual,predicted"));
    }
}
