//! Lineup scraping through both page drivers against mock servers.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use footy_stats::config::SportsgamblerConfig;
use footy_stats::error::ErrorKind;
use footy_stats::lineups::{HttpDriver, LineupScraper, PageDriver, WebDriverSession};

fn config(base_url: &str, webdriver_url: &str) -> SportsgamblerConfig {
    SportsgamblerConfig {
        base_url: base_url.to_string(),
        leagues: vec!["england-premier-league".to_string()],
        webdriver_url: webdriver_url.to_string(),
        browser_args: vec!["--disable-extensions".to_string()],
        headless: true,
        settle_millis: 0,
        max_missing_rows: 5,
    }
}

fn lineup_page() -> String {
    r#"<html><body><div class="table">
        <div class="table-row-loneups">
            <div class="fxs-team">Liverpool</div><div class="fxs-team">Leeds</div>
            <span class="lineups-toggle-formation">4-3-3</span>
            <span class="lineups-toggle-formation">4-1-4-1</span>
            <div class="lineups-home">
                <div class="players-line"><span>1</span><span>Alisson</span></div>
                <div class="players-line"><span>66</span><span>Alexander-Arnold</span><span>4</span><span>van Dijk</span></div>
            </div>
            <div class="lineups-away">
                <div class="players-line"><span>1</span><span>Meslier</span></div>
            </div>
        </div>
        <div class="table-row-loneups"><div class="advert">Bet now</div></div>
    </div></body></html>"#
        .to_string()
}

// ──────────────────────────────────────────
// Plain HTTP driver
// ──────────────────────────────────────────

#[tokio::test]
async fn http_driver_scrapes_league_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lineups/football/england-premier-league/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(lineup_page()))
        .mount(&server)
        .await;

    let cfg = config(&format!("{}/lineups/football", server.uri()), "http://unused");
    let driver: Arc<dyn PageDriver> = Arc::new(HttpDriver::new(reqwest::Client::new()));
    let scraper = LineupScraper::new(driver, &cfg);

    let lineups = scraper.scrape("england-premier-league").await.unwrap();
    assert_eq!(lineups.len(), 1);
    assert_eq!(lineups[0].home.team, "Liverpool");
    assert_eq!(lineups[0].away.formation, "4-1-4-1");
    assert_eq!(
        lineups[0].home.players,
        vec![vec!["Alisson"], vec!["Alexander-Arnold", "van Dijk"]]
    );
}

#[tokio::test]
async fn http_driver_missing_page_is_transport_error() {
    let server = MockServer::start().await;
    let cfg = config(&format!("{}/lineups/football", server.uri()), "http://unused");
    let scraper = LineupScraper::new(Arc::new(HttpDriver::new(reqwest::Client::new())), &cfg);

    let err = scraper.scrape("france-ligue-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

// ──────────────────────────────────────────
// WebDriver session
// ──────────────────────────────────────────

#[tokio::test]
async fn webdriver_session_round_trip() {
    let site = "https://www.sportsgambler.com/lineups/football";
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_json(json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": ["--disable-extensions", "--headless=new"] }
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": "abc123", "capabilities": {} }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/abc123/url"))
        .and(body_json(json!({ "url": format!("{site}/england-premier-league/") })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/session/abc123/source"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": lineup_page() })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/session/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config(site, &server.uri());
    let session = WebDriverSession::start(reqwest::Client::new(), &cfg).await.unwrap();
    assert_eq!(session.session_id(), "abc123");

    let driver: Arc<dyn PageDriver> = Arc::new(session);
    let scraper = LineupScraper::new(Arc::clone(&driver), &cfg);
    let lineups = scraper.scrape("england-premier-league").await.unwrap();
    assert_eq!(lineups.len(), 1);
    assert_eq!(lineups[0].away.players, vec![vec!["Meslier"]]);

    driver.close().await.unwrap();
}

#[tokio::test]
async fn webdriver_protocol_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": {
                "error": "session not created",
                "message": "This version of ChromeDriver only supports Chrome version 91"
            }
        })))
        .mount(&server)
        .await;

    let cfg = config("http://unused", &server.uri());
    let err = match WebDriverSession::start(reqwest::Client::new(), &cfg).await {
        Ok(_) => panic!("session should not start"),
        Err(e) => e,
    };
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("session not created"));
}
