use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use footy_stats::analysis::form_study::{write_chart_data, write_per_game_means};
use footy_stats::analysis::{run_form_study, LeagueQuery, Location};
use footy_stats::config::AppConfig;
use footy_stats::crawl::{CrawlTarget, Crawler, PageOutcome, VariableOutcome};
use footy_stats::error::ErrorKind;
use footy_stats::lineups::{HttpDriver, LineupScraper, PageDriver, WebDriverSession};
use footy_stats::monitoring::logger;
use footy_stats::odds::{best_line_stakes, combined_odds, odds_to_prob};
use footy_stats::store::{write_rows, Row, StoreLayout};
use footy_stats::util::fuzzy_string_match;

/// Football statistics toolkit
#[derive(Parser)]
#[command(name = "footy-stats")]
#[command(about = "Crawl, query and model football statistics")]
struct Cli {
    /// Config file (defaults to FOOTY_CONFIG or config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch league pages and write their tables into the store
    Crawl {
        /// Leagues to crawl (default: all configured)
        #[arg(long = "league")]
        leagues: Vec<String>,
        /// Seasons to crawl (default: all configured)
        #[arg(long = "year")]
        years: Vec<u32>,
    },
    /// List the teams of a league season
    Teams {
        #[arg(long)]
        league: String,
        /// Defaults to the most recent stored season
        #[arg(long)]
        year: Option<String>,
    },
    /// Find which league a team plays in
    FindLeague {
        team: String,
        #[arg(long)]
        year: Option<String>,
        /// Fail instead of warning when the team is not found
        #[arg(long)]
        fatal: bool,
    },
    /// Game history of one or more teams, with opponents attached
    History {
        #[arg(long)]
        league: String,
        #[arg(long)]
        year: String,
        /// Only the last N games (0 = whole season)
        #[arg(short, long, default_value = "0")]
        n: usize,
        /// Teams to include (default: every team in the league)
        #[arg(long = "team")]
        teams: Vec<String>,
        /// home, away or both
        #[arg(long, default_value = "both")]
        location: String,
        /// Write one CSV per team into this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Players of a team, league detected when omitted
    Players {
        team: String,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        league: Option<String>,
    },
    /// Scrape starting lineups
    Lineups {
        /// Leagues to scrape (default: all configured)
        #[arg(long = "league")]
        leagues: Vec<String>,
        /// Fetch pages with plain HTTP instead of a WebDriver browser
        #[arg(long)]
        http: bool,
        /// Write all lineups to this CSV file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Fit next-game xG against recent form
    Study {
        #[arg(long)]
        league: String,
        #[arg(long)]
        year: String,
        /// Games per form window (default from config)
        #[arg(long)]
        window: Option<usize>,
        /// Directory for chart data and per-game means
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Implied probabilities and combined price of a set of odds
    Odds {
        #[arg(required = true)]
        odds: Vec<f64>,
    },
    /// Split a stake over the best price per outcome across books
    Stakes {
        #[arg(long, default_value = "100")]
        stake: Decimal,
        /// Comma-separated odds of one book, outcomes in the same order
        #[arg(long = "book", required = true)]
        books: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    logger::init_logging(&config.monitoring)?;

    tracing::info!(store = %config.store.base_dir.display(), "footy-stats starting");

    match cli.command {
        Commands::Crawl { leagues, years } => run_crawl(&config, leagues, years).await,
        Commands::Teams { league, year } => {
            let query = open_store(&config)?;
            for team in query.teams_in_league(&league, year.as_deref())? {
                println!("{team}");
            }
            Ok(())
        }
        Commands::FindLeague { team, year, fatal } => run_find_league(&config, &team, year.as_deref(), fatal),
        Commands::History {
            league,
            year,
            n,
            teams,
            location,
            out,
        } => {
            let location: Location = location.parse()?;
            run_history(&config, &league, &year, n, &teams, location, out.as_deref())
        }
        Commands::Players { team, year, league } => {
            let query = open_store(&config)?;
            let players = query.players_in_team(&team, year.as_deref(), league.as_deref())?;
            for player in players {
                println!("{}", serde_json::Value::Object(player));
            }
            Ok(())
        }
        Commands::Lineups { leagues, http, out } => run_lineups(&config, leagues, http, out.as_deref()).await,
        Commands::Study {
            league,
            year,
            window,
            out,
        } => run_study(&config, &league, &year, window, out.as_deref()),
        Commands::Odds { odds } => {
            for (o, p) in odds.iter().zip(odds_to_prob(&odds)) {
                println!("{o:>10.3}  {p:.4}");
            }
            println!("combined: {:.4}", combined_odds(&odds));
            Ok(())
        }
        Commands::Stakes { stake, books } => run_stakes(stake, &books),
    }
}

fn open_store(config: &AppConfig) -> Result<LeagueQuery> {
    let layout = StoreLayout::new(&config.store.base_dir);
    LeagueQuery::open(layout)
        .with_context(|| format!("Failed to open store at {}", config.store.base_dir.display()))
}

async fn run_crawl(config: &AppConfig, leagues: Vec<String>, years: Vec<u32>) -> Result<()> {
    let leagues = if leagues.is_empty() { config.understat.leagues.clone() } else { leagues };
    let years = if years.is_empty() { config.understat.years.clone() } else { years };

    let crawler = Crawler::from_config(&config.understat)?;
    let targets = CrawlTarget::for_seasons(&config.understat.base_url, &config.store.base_dir, &leagues, &years);
    let report = crawler
        .bulk_crawl_and_write(&targets, &config.understat.variables)
        .await;

    for page in &report.pages {
        match &page.outcome {
            PageOutcome::Failed(e) => println!("{}  FAILED  {e}", page.url),
            PageOutcome::Fetched(vars) => {
                for var in vars {
                    match var {
                        VariableOutcome::Written {
                            var, path, rows, report, ..
                        } => println!(
                            "{}  {var}: {rows} rows -> {} ({} skipped)",
                            page.url,
                            path.display(),
                            report.skipped.len()
                        ),
                        VariableOutcome::Missing { var } => println!("{}  {var}: not on page", page.url),
                        VariableOutcome::Failed { var, error } => println!("{}  {var}: FAILED  {error}", page.url),
                    }
                }
            }
        }
    }

    if !report.is_clean() {
        anyhow::bail!(
            "crawl finished with {} failed pages and {} failed variables",
            report.failed_pages(),
            report.failed_variables()
        );
    }
    Ok(())
}

fn run_find_league(config: &AppConfig, team: &str, year: Option<&str>, fatal: bool) -> Result<()> {
    let query = open_store(config)?;
    if let Some(league) = query.find_team_league(team, year, fatal)? {
        println!("{league}");
        return Ok(());
    }

    // Suggest the closest stored name
    let mut candidates = Vec::new();
    for league in query.leagues() {
        match query.teams_in_league(league, year) {
            Ok(teams) => candidates.extend(teams),
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if !candidates.is_empty() {
        let best = fuzzy_string_match(team, &candidates, config.analysis.fuzzy_tolerance)?;
        println!("not found; closest match: {} ({:.2})", best.candidate, best.ratio);
    }
    Ok(())
}

fn run_history(
    config: &AppConfig,
    league: &str,
    year: &str,
    n: usize,
    teams: &[String],
    location: Location,
    out: Option<&Path>,
) -> Result<()> {
    let query = open_store(config)?;
    let teams = (!teams.is_empty()).then_some(teams);
    let history = query.team_history(league, year, n, teams, location)?;

    for entry in &history {
        match out {
            Some(dir) => {
                std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
                let path = dir.join(format!("{}.csv", entry.team.replace(' ', "_")));
                if entry.games.is_empty() {
                    println!("{}: no games", entry.team);
                    continue;
                }
                write_rows(&entry.games.to_rows(), &path)?;
                println!("{}: {} games -> {}", entry.team, entry.games.len(), path.display());
            }
            None => {
                println!("{} ({} games, {location})", entry.team, entry.games.len());
                for row in entry.games.to_rows() {
                    println!("  {}", serde_json::Value::Object(row));
                }
            }
        }
    }
    Ok(())
}

async fn run_lineups(config: &AppConfig, leagues: Vec<String>, http: bool, out: Option<&Path>) -> Result<()> {
    let leagues = if leagues.is_empty() { config.sportsgambler.leagues.clone() } else { leagues };
    let client = reqwest::Client::builder()
        .user_agent(config.understat.user_agent.clone())
        .build()?;

    let driver: Arc<dyn PageDriver> = if http {
        Arc::new(HttpDriver::new(client))
    } else {
        Arc::new(
            WebDriverSession::start(client, &config.sportsgambler)
                .await
                .context("Failed to start WebDriver session")?,
        )
    };
    let scraper = LineupScraper::new(Arc::clone(&driver), &config.sportsgambler);

    let mut rows: Vec<Row> = Vec::new();
    let mut result = Ok(());
    for league in &leagues {
        match scraper.scrape(league).await {
            Ok(lineups) => {
                for m in &lineups {
                    println!(
                        "{league}: {} ({}) vs {} ({})",
                        m.home.team, m.home.formation, m.away.team, m.away.formation
                    );
                    rows.extend(m.to_rows(league));
                }
            }
            Err(e) => {
                tracing::error!(league = %league, error = %e, "Lineup scrape failed");
                result = Err(anyhow::Error::new(e).context(format!("Failed to scrape {league}")));
                break;
            }
        }
    }

    if let Err(e) = driver.close().await {
        tracing::warn!(error = %e, "Failed to close page driver");
    }
    result?;

    if let Some(path) = out {
        if rows.is_empty() {
            tracing::warn!("No lineups found, nothing written");
        } else {
            write_rows(&rows, path)?;
            println!("{} rows -> {}", rows.len(), path.display());
        }
    }
    Ok(())
}

fn run_study(config: &AppConfig, league: &str, year: &str, window: Option<usize>, out: Option<&Path>) -> Result<()> {
    let query = open_store(config)?;
    let history = query.team_history(league, year, 0, None, Location::Both)?;

    let mut analysis = config.analysis.clone();
    if let Some(w) = window {
        analysis.window = w;
    }
    let study = run_form_study(&history, &analysis)?;

    println!(
        "{} prediction by previous {} games: {} samples ({} train / {} test)",
        study.target, study.window, study.samples, study.train_size, study.test_size
    );
    println!("test RMSE: {:.4}", study.test_rmse);
    println!(
        "{}-fold CV RMSE: {:.4} (per fold: {:?})",
        study.cross_val_rmse.len(),
        study.mean_cross_val_rmse(),
        study.cross_val_rmse
    );
    println!("intercept: {:.4}", study.intercept);
    for (name, coef) in &study.coefficients {
        println!("  {name:<24} {coef:>10.4}");
    }

    if let Some(dir) = out {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let chart = dir.join(format!("{league}_{year}_chart.csv"));
        write_chart_data(&study.chart, &chart)?;
        let means = dir.join(format!("{league}_{year}_per_game.csv"));
        write_per_game_means(&history, &means)?;
        println!("chart data -> {}\nper-game means -> {}", chart.display(), means.display());
    }
    Ok(())
}

fn run_stakes(stake: Decimal, books: &[String]) -> Result<()> {
    let books: Vec<Vec<f64>> = books
        .iter()
        .map(|b| {
            b.split(',')
                .map(|o| o.trim().parse::<f64>().with_context(|| format!("Invalid odds '{o}'")))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<_>>()?;

    let plan = best_line_stakes(&books, stake)?;
    println!("summed probability: {:.4}", plan.summed_probability);
    for leg in &plan.legs {
        println!(
            "outcome {}: book {} @ {:.3}  p={:.4}  stake {}",
            leg.outcome, leg.book, leg.odds, leg.probability, leg.stake
        );
    }
    println!("guaranteed return: {}  (profit {})", plan.guaranteed_return, plan.profit());
    Ok(())
}
