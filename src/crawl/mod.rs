//! Concurrent crawl of Understat league pages into the CSV store.
//!
//! One task per URL: fetch the page once, pull every requested variable out
//! of the body, run it through its [`ExtractionStrategy`] and write the
//! result. Failures are collected per URL and per variable in a
//! [`CrawlReport`]; one bad page never aborts the batch.

pub mod extract;
pub mod strategy;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::UnderstatConfig;
use crate::error::{Error, Result};
use crate::store::layout::data_file;
use crate::store::write_rows;
use crate::util::get_url;

pub use extract::{decode_escapes, extract_js_var};
pub use strategy::{AggregateReport, ExtractionStrategy, StrategySet, TableStrategy, TeamsStrategy};

/// GET `url` and return the body. Non-2xx is an error.
pub async fn fetch_html(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status {
            url: url.to_string(),
            status,
        });
    }
    let body = response.text().await?;
    info!(url, bytes = body.len(), "Fetched page");
    Ok(body)
}

/// One page to crawl and where its tables go.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlTarget {
    pub url: String,
    /// A directory (one `{var}.csv` per variable) or a literal file path.
    pub output: PathBuf,
}

impl CrawlTarget {
    /// `{base_url}/{league}/{year}` into `{store}/{league}/{year}` for every
    /// league and season.
    pub fn for_seasons(base_url: &str, store: &Path, leagues: &[String], years: &[u32]) -> Vec<Self> {
        leagues
            .iter()
            .flat_map(|league| {
                years.iter().map(move |year| {
                    let year = year.to_string();
                    CrawlTarget {
                        url: get_url(&[base_url, league.as_str(), year.as_str()]),
                        output: store.join(league).join(year),
                    }
                })
            })
            .collect()
    }
}

/// Every `{base_url}/{league}/{year}` combination, leagues outermost.
pub fn get_urls(base_url: &str, leagues: &[String], years: &[u32]) -> Vec<String> {
    leagues
        .iter()
        .flat_map(|league| {
            years.iter().map(move |year| {
                let year = year.to_string();
                get_url(&[base_url, league.as_str(), year.as_str()])
            })
        })
        .collect()
}

/// Output file for `var` under `path`.
///
/// A path with an extension is used as is; anything else is a directory that
/// receives `{var}.csv`. Missing directories are created.
pub fn resolve_output(path: &Path, var: &str) -> Result<PathBuf> {
    let file = if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.join(data_file(var))
    };
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(file)
}

/// What happened to one variable on one page.
#[derive(Debug)]
pub enum VariableOutcome {
    Written {
        var: String,
        path: PathBuf,
        rows: usize,
        artifacts: usize,
        report: AggregateReport,
    },
    /// The page has no assignment for this variable, or it held no records.
    Missing { var: String },
    Failed { var: String, error: Error },
}

#[derive(Debug)]
pub enum PageOutcome {
    Fetched(Vec<VariableOutcome>),
    Failed(Error),
}

#[derive(Debug)]
pub struct PageReport {
    pub url: String,
    pub outcome: PageOutcome,
}

/// Per-URL results of a crawl, in input order.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub pages: Vec<PageReport>,
}

impl CrawlReport {
    pub fn failed_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.outcome, PageOutcome::Failed(_)))
            .count()
    }

    pub fn written_files(&self) -> usize {
        self.variable_outcomes()
            .filter(|v| matches!(v, VariableOutcome::Written { .. }))
            .count()
    }

    pub fn failed_variables(&self) -> usize {
        self.variable_outcomes()
            .filter(|v| matches!(v, VariableOutcome::Failed { .. }))
            .count()
    }

    pub fn skipped_rows(&self) -> usize {
        self.variable_outcomes()
            .map(|v| match v {
                VariableOutcome::Written { report, .. } => report.skipped.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed_pages() == 0 && self.failed_variables() == 0
    }

    fn variable_outcomes(&self) -> impl Iterator<Item = &VariableOutcome> {
        self.pages.iter().flat_map(|p| match &p.outcome {
            PageOutcome::Fetched(vars) => vars.as_slice(),
            PageOutcome::Failed(_) => &[][..],
        })
    }
}

pub struct Crawler {
    client: reqwest::Client,
    strategies: Arc<StrategySet>,
}

impl Crawler {
    pub fn new(client: reqwest::Client, strategies: StrategySet) -> Self {
        Self {
            client,
            strategies: Arc::new(strategies),
        }
    }

    /// Client with the configured user agent and optional timeout, plus the
    /// Understat strategies.
    pub fn from_config(config: &UnderstatConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self::new(builder.build()?, StrategySet::understat()))
    }

    /// Crawl every target concurrently and write each requested variable.
    ///
    /// Targets must have disjoint outputs; nothing guards two tasks writing
    /// the same file.
    pub async fn bulk_crawl_and_write(&self, targets: &[CrawlTarget], vars: &[String]) -> CrawlReport {
        let vars: Arc<[String]> = vars.to_vec().into();
        let mut tasks = JoinSet::new();

        for (index, target) in targets.iter().cloned().enumerate() {
            let client = self.client.clone();
            let strategies = Arc::clone(&self.strategies);
            let vars = Arc::clone(&vars);
            tasks.spawn(async move {
                let outcome = crawl_one(&client, &strategies, &target, &vars).await;
                (index, PageReport {
                    url: target.url,
                    outcome,
                })
            });
        }

        let mut slots: Vec<Option<PageReport>> = targets.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => warn!(error = %e, "Crawl task panicked or was cancelled"),
            }
        }

        let pages = slots
            .into_iter()
            .zip(targets)
            .map(|(slot, target)| {
                slot.unwrap_or_else(|| PageReport {
                    url: target.url.clone(),
                    outcome: PageOutcome::Failed(Error::Validation("crawl task did not complete".to_string())),
                })
            })
            .collect();
        let report = CrawlReport { pages };

        info!(
            pages = report.pages.len(),
            failed_pages = report.failed_pages(),
            files = report.written_files(),
            failed_variables = report.failed_variables(),
            skipped_rows = report.skipped_rows(),
            "Crawl finished"
        );
        report
    }
}

async fn crawl_one(
    client: &reqwest::Client,
    strategies: &StrategySet,
    target: &CrawlTarget,
    vars: &[String],
) -> PageOutcome {
    let html = match fetch_html(client, &target.url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(url = %target.url, error = %e, "Fetch failed");
            return PageOutcome::Failed(e);
        }
    };

    let outcomes = vars
        .iter()
        .map(|var| match write_variable(strategies, &html, &target.output, var) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(url = %target.url, var = %var, error = %error, "Variable failed");
                VariableOutcome::Failed {
                    var: var.clone(),
                    error,
                }
            }
        })
        .collect();
    PageOutcome::Fetched(outcomes)
}

fn write_variable(strategies: &StrategySet, html: &str, output: &Path, var: &str) -> Result<VariableOutcome> {
    let Some(value) = extract_js_var(html, var)? else {
        debug!(var, "Variable not present on page");
        return Ok(VariableOutcome::Missing { var: var.to_string() });
    };

    let path = resolve_output(output, var)?;
    let out_dir = path.parent().unwrap_or(Path::new("."));
    let extracted = strategies.for_variable(var).extract(value, out_dir)?;

    if extracted.rows.is_empty() && extracted.artifacts.is_empty() {
        debug!(var, "Variable holds no records");
        return Ok(VariableOutcome::Missing { var: var.to_string() });
    }

    for artifact in &extracted.artifacts {
        if artifact.rows.is_empty() {
            continue;
        }
        let artifact_path = resolve_output(&artifact.path, var)?;
        write_rows(&artifact.rows, &artifact_path)?;
    }
    if extracted.rows.is_empty() {
        warn!(var, skipped = extracted.report.skipped.len(), "No summary rows, table not written");
    } else {
        write_rows(&extracted.rows, &path)?;
        info!(var, path = %path.display(), rows = extracted.rows.len(), "Wrote table");
    }

    Ok(VariableOutcome::Written {
        var: var.to_string(),
        path,
        rows: extracted.rows.len(),
        artifacts: extracted.artifacts.len(),
        report: extracted.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_urls_product() {
        let urls = get_urls(
            "https://understat.com/league",
            &["EPL".to_string(), "La_liga".to_string()],
            &[2020, 2021],
        );
        assert_eq!(
            urls,
            vec![
                "https://understat.com/league/EPL/2020",
                "https://understat.com/league/EPL/2021",
                "https://understat.com/league/La_liga/2020",
                "https://understat.com/league/La_liga/2021",
            ]
        );
    }

    #[test]
    fn test_for_seasons_outputs() {
        let targets = CrawlTarget::for_seasons("http://x/league", Path::new("data"), &["EPL".to_string()], &[2020]);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].url, "http://x/league/EPL/2020");
        assert_eq!(targets[0].output, Path::new("data/EPL/2020"));
    }

    #[test]
    fn test_resolve_output_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("EPL").join("2020");

        let file = resolve_output(&dir, "teamsData").unwrap();
        assert_eq!(file, dir.join("teamsData.csv"));
        assert!(dir.is_dir());

        let literal = tmp.path().join("custom").join("out.csv");
        assert_eq!(resolve_output(&literal, "teamsData").unwrap(), literal);
        assert!(tmp.path().join("custom").is_dir());
    }

    #[test]
    fn test_resolve_output_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let first = resolve_output(tmp.path(), "datesData").unwrap();
        let second = resolve_output(tmp.path(), "datesData").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_variable_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome = write_variable(&StrategySet::understat(), "<html/>", tmp.path(), "teamsData").unwrap();
        assert!(matches!(outcome, VariableOutcome::Missing { .. }));
        assert!(!tmp.path().join("teamsData.csv").exists());
    }
}
