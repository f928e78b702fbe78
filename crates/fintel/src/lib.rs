//! Ownership-structure metrics scraped from fintel.io ticker pages.
//!
//! The page shows a two-column table of labelled metrics; the value cell
//! follows the label cell. Layout changes on their side surface as
//! [`FintelError::NoMetrics`] rather than as wrong numbers.

use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

use common::OwnershipMetrics;
use edgar::Throttle;

pub const BASE_URL: &str = "https://fintel.io";

const INSIDER: &str = "Insider Ownership";
const INSTITUTIONAL: &str = "Institutional Ownership";
const FLOAT: &str = "Float";
const SHORT_INTEREST: &str = "Short Interest";

#[derive(Debug, Error)]
pub enum FintelError {
    #[error("HTTP error for {ticker}: {reason}")]
    Http { ticker: String, reason: String },

    #[error("no ownership metrics found for {0}")]
    NoMetrics(String),

    #[error("empty ticker")]
    EmptyTicker,
}

#[derive(Debug, Clone)]
pub struct FintelSettings {
    pub user_agent: String,
    pub request_timeout: Duration,
    pub request_delay: Duration,
}

/// Scrapes one ticker page per call, spaced by the configured delay.
pub struct FintelClient {
    http: Client,
    base_url: String,
    throttle: Throttle,
}

impl FintelClient {
    pub fn new(settings: &FintelSettings) -> Result<Self, FintelError> {
        let http = Client::builder()
            .use_rustls_tls()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| FintelError::Http {
                ticker: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            throttle: Throttle::new(settings.request_delay),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn page_url(&self, ticker: &str) -> String {
        format!("{}/s/us/{}", self.base_url, ticker.to_ascii_lowercase())
    }

    pub async fn metrics(&self, ticker: &str) -> Result<OwnershipMetrics, FintelError> {
        if ticker.trim().is_empty() {
            return Err(FintelError::EmptyTicker);
        }
        self.throttle.wait().await;

        let url = self.page_url(ticker);
        debug!(%url, "Fetching ownership metrics");
        let http_err = |reason: String| FintelError::Http {
            ticker: ticker.to_string(),
            reason,
        };
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| http_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(http_err(format!("HTTP {status}")));
        }
        let html = resp.text().await.map_err(|e| http_err(e.to_string()))?;

        let metrics = parse_metrics(&html);
        if metrics.insider_pct.is_none()
            && metrics.institutional_pct.is_none()
            && metrics.float_m.is_none()
            && metrics.short_interest_pct.is_none()
        {
            return Err(FintelError::NoMetrics(ticker.to_string()));
        }
        Ok(metrics)
    }
}

/// Extract the four metrics from a ticker page and score them.
pub fn parse_metrics(html: &str) -> OwnershipMetrics {
    let doc = Html::parse_document(html);
    let Ok(cells) = Selector::parse("td") else {
        return OwnershipMetrics::default();
    };

    let lookup = |label: &str| -> Option<f64> {
        let label_cell = doc
            .select(&cells)
            .find(|td| td.text().collect::<String>().trim() == label)?;
        let value_cell = label_cell.next_siblings().find_map(ElementRef::wrap)?;
        parse_value(&value_cell.text().collect::<String>())
    };

    let mut metrics = OwnershipMetrics {
        insider_pct: lookup(INSIDER),
        institutional_pct: lookup(INSTITUTIONAL),
        float_m: lookup(FLOAT),
        short_interest_pct: lookup(SHORT_INTEREST),
        structure_score: 0,
        squeeze_score: 0,
    };
    metrics.structure_score = structure_score(&metrics);
    metrics.squeeze_score = squeeze_score(&metrics);
    metrics
}

/// "61.2 %", "12.34 M", "1,234" -> number. Other suffixes are not understood.
fn parse_value(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_end_matches('%')
        .trim_end_matches('M')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    cleaned.parse().ok()
}

/// Tight ownership structure, out of 3: insiders above 60%, institutions
/// below 20%, float under 20M shares.
pub fn structure_score(m: &OwnershipMetrics) -> u8 {
    [
        m.insider_pct.is_some_and(|v| v > 60.0),
        m.institutional_pct.is_some_and(|v| v < 20.0),
        m.float_m.is_some_and(|v| v < 20.0),
    ]
    .into_iter()
    .filter(|hit| *hit)
    .count() as u8
}

/// Short-squeeze potential, out of 4.
pub fn squeeze_score(m: &OwnershipMetrics) -> u8 {
    [
        m.short_interest_pct.is_some_and(|v| v > 10.0),
        m.short_interest_pct.is_some_and(|v| v > 20.0),
        m.float_m.is_some_and(|v| v < 20.0),
        m.insider_pct.is_some_and(|v| v > 60.0),
    ]
    .into_iter()
    .filter(|hit| *hit)
    .count() as u8
}
