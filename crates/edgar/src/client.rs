use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use common::{DateWindow, Error, FetchError, FilingRef, RawFiling, Result, SourceKind};

use crate::daily_index::{index_file_name, index_url, parse_index};
use crate::feed::{feed_url, parse_feed};
use crate::source::{FilingSource, Listing};
use crate::throttle::Throttle;

pub const BASE_URL: &str = "https://www.sec.gov";

const FEED_PAGE_SIZE: u32 = 100;

/// Connection settings for sec.gov.
#[derive(Debug, Clone)]
pub struct EdgarSettings {
    pub source: SourceKind,
    /// SEC rejects requests without a descriptive User-Agent.
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Minimum delay between any two requests.
    pub request_delay: Duration,
    /// Where completed daily indexes are cached. `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    /// Upper bound on Atom feed pages walked per listing.
    pub feed_max_pages: u32,
}

/// HTTP client for the EDGAR archive. Used for listings and filing downloads.
pub struct EdgarClient {
    http: Client,
    base_url: String,
    settings: EdgarSettings,
    throttle: Throttle,
}

enum Body {
    Found(String),
    NotFound,
}

impl EdgarClient {
    pub fn new(settings: EdgarSettings) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            throttle: Throttle::new(settings.request_delay),
            settings,
        })
    }

    /// Point the client at a mirror or a local test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_text(&self, url: &str) -> std::result::Result<Body, String> {
        self.throttle.wait().await;
        debug!(url, "GET");

        let resp = self.http.get(url).send().await.map_err(|e| e.to_string())?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Body::NotFound);
        }
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        resp.text().await.map(Body::Found).map_err(|e| e.to_string())
    }

    async fn list_current_feed(&self, window: &DateWindow) -> Listing {
        let mut listing = Listing::default();

        for page in 0..self.settings.feed_max_pages.max(1) {
            let url = feed_url(&self.base_url, page, FEED_PAGE_SIZE);
            let text = match self.get_text(&url).await {
                Ok(Body::Found(text)) => text,
                Ok(Body::NotFound) => break,
                Err(reason) => {
                    listing.errors.push(FetchError::Listing { url, reason });
                    break;
                }
            };
            let entries = match parse_feed(&text) {
                Ok(entries) => entries,
                Err(reason) => {
                    listing.errors.push(FetchError::Listing { url, reason });
                    break;
                }
            };
            if entries.is_empty() {
                break;
            }

            // The feed is newest first; once a page reaches past the window
            // start there is nothing older worth reading.
            let mut reached_start = false;
            for entry in entries {
                match entry.filed_on() {
                    Some(day) if day < window.start => reached_start = true,
                    Some(day) if day > window.end => {}
                    _ => listing.refs.push(entry.filing),
                }
            }
            if reached_start {
                break;
            }
        }

        listing
    }

    async fn list_daily_index(&self, window: &DateWindow) -> Listing {
        let mut listing = Listing::default();
        let today = Utc::now().date_naive();

        for day in window.days() {
            if let Some(text) = self.read_cached_index(day).await {
                listing.refs.extend(parse_index(&self.base_url, &text));
                continue;
            }

            let url = index_url(&self.base_url, day);
            match self.get_text(&url).await {
                Ok(Body::Found(text)) => {
                    // Today's index is still growing; only completed days are cached.
                    if day < today {
                        self.write_cached_index(day, &text).await;
                    }
                    listing.refs.extend(parse_index(&self.base_url, &text));
                }
                Ok(Body::NotFound) => {
                    debug!(%day, "No daily index published (weekend or holiday)");
                }
                Err(reason) => listing.errors.push(FetchError::Listing { url, reason }),
            }
        }

        listing
    }

    async fn read_cached_index(&self, day: NaiveDate) -> Option<String> {
        let path = self.settings.cache_dir.as_ref()?.join(index_file_name(day));
        let text = tokio::fs::read_to_string(&path).await.ok()?;
        debug!(path = %path.display(), "Using cached daily index");
        Some(text)
    }

    async fn write_cached_index(&self, day: NaiveDate, text: &str) {
        let Some(dir) = &self.settings.cache_dir else {
            return;
        };
        let path = dir.join(index_file_name(day));
        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, text).await
        }
        .await;
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to cache daily index");
        }
    }
}

#[async_trait]
impl FilingSource for EdgarClient {
    fn name(&self) -> &str {
        match self.settings.source {
            SourceKind::CurrentFeed => "current_feed",
            SourceKind::DailyIndex => "daily_index",
        }
    }

    async fn list(&self, window: &DateWindow) -> Listing {
        let listing = match self.settings.source {
            SourceKind::CurrentFeed => self.list_current_feed(window).await,
            SourceKind::DailyIndex => self.list_daily_index(window).await,
        };
        info!(
            source = self.name(),
            start = %window.start,
            end = %window.end,
            filings = listing.refs.len(),
            errors = listing.errors.len(),
            "Listed Form 4 filings"
        );
        listing
    }

    async fn download(&self, filing: &FilingRef) -> std::result::Result<RawFiling, FetchError> {
        let failed = |reason: String| FetchError::Download {
            url: filing.url.clone(),
            attempts: 1,
            reason,
        };
        match self.get_text(&filing.url).await {
            Ok(Body::Found(body)) => Ok(RawFiling {
                accession: filing.accession.clone(),
                source_url: filing.url.clone(),
                retrieved_at: Utc::now(),
                body,
            }),
            Ok(Body::NotFound) => Err(failed("HTTP 404 Not Found".into())),
            Err(reason) => Err(failed(reason)),
        }
    }
}
