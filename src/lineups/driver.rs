//! Page drivers: something that can turn a URL into rendered HTML.
//!
//! Lineup pages fill in their tables with JavaScript, so the production
//! driver is a browser controlled over the W3C WebDriver protocol (e.g. a
//! local chromedriver). [`HttpDriver`] serves pages that need no rendering.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::SportsgamblerConfig;
use crate::crawl::fetch_html;
use crate::error::{Error, Result};

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// HTML of `url` once it has rendered.
    async fn page_source(&self, url: &str) -> Result<String>;

    /// Release whatever the driver holds open.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}

/// Plain GET, no script execution.
pub struct HttpDriver {
    client: reqwest::Client,
}

impl HttpDriver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageDriver for HttpDriver {
    async fn page_source(&self, url: &str) -> Result<String> {
        fetch_html(&self.client, url).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// One browser session on a WebDriver endpoint.
///
/// The session stays open until [`PageDriver::close`] is called.
pub struct WebDriverSession {
    client: reqwest::Client,
    endpoint: String,
    session_id: String,
    settle: Duration,
}

impl WebDriverSession {
    /// `POST /session` with Chrome options built from config.
    pub async fn start(client: reqwest::Client, config: &SportsgamblerConfig) -> Result<Self> {
        let endpoint = config.webdriver_url.trim_end_matches('/').to_string();

        let mut args = config.browser_args.clone();
        if config.headless {
            args.push("--headless=new".to_string());
        }
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let response = client
            .post(format!("{endpoint}/session"))
            .json(&capabilities)
            .send()
            .await?;
        let value = unwrap_value(response).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::WebDriver("new session response has no sessionId".to_string()))?
            .to_string();

        info!(endpoint = %endpoint, session = %session_id, "WebDriver session started");
        Ok(Self {
            client,
            endpoint,
            session_id,
            settle: Duration::from_millis(config.settle_millis),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn session_url(&self, command: &str) -> String {
        if command.is_empty() {
            format!("{}/session/{}", self.endpoint, self.session_id)
        } else {
            format!("{}/session/{}/{command}", self.endpoint, self.session_id)
        }
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .post(self.session_url("url"))
            .json(&json!({ "url": url }))
            .send()
            .await?;
        unwrap_value(response).await?;
        debug!(url, "Navigated");
        Ok(())
    }

    pub async fn source(&self) -> Result<String> {
        let response = self.client.get(self.session_url("source")).send().await?;
        match unwrap_value(response).await? {
            Value::String(html) => Ok(html),
            other => Err(Error::WebDriver(format!("page source is not a string: {other}"))),
        }
    }
}

#[async_trait]
impl PageDriver for WebDriverSession {
    async fn page_source(&self, url: &str) -> Result<String> {
        self.navigate(url).await?;
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        self.source().await
    }

    async fn close(&self) -> Result<()> {
        let response = self.client.delete(self.session_url("")).send().await?;
        unwrap_value(response).await?;
        info!(session = %self.session_id, "WebDriver session closed");
        Ok(())
    }

    fn name(&self) -> &str {
        "webdriver"
    }
}

/// Pull `value` out of a WebDriver response, turning protocol errors
/// (`{"value": {"error": ..., "message": ...}}`) into [`Error::WebDriver`].
async fn unwrap_value(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
        warn!(status = %status, error, message, "WebDriver command failed");
        return Err(Error::WebDriver(format!("{error}: {message}")));
    }
    if !status.is_success() {
        return Err(Error::WebDriver(format!("HTTP {status}")));
    }
    Ok(value)
}
