use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, Stream, StreamExt};
use tracing::{info, warn};

use common::{DateWindow, FetchBatch, FetchError, FilingRef, RawFiling};

use crate::source::FilingSource;

/// Re-attempt and volume limits for one fetch.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Total attempts per filing, including the first. At least 1.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Cap on filings downloaded per window, applied after deduplication.
    pub max_filings: Option<usize>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay: Duration::from_millis(500),
            max_filings: None,
        }
    }
}

/// Pulls raw filings for a window out of a [`FilingSource`].
///
/// Failures are isolated per item: a listing or download that fails becomes
/// one `Err` in the stream and every other item is still produced.
pub struct Fetcher {
    source: Arc<dyn FilingSource>,
    settings: FetchSettings,
}

impl Fetcher {
    pub fn new(source: Arc<dyn FilingSource>, settings: FetchSettings) -> Self {
        Self { source, settings }
    }

    /// Lazily list, then download one filing per poll.
    pub fn stream(
        &self,
        window: DateWindow,
    ) -> impl Stream<Item = Result<RawFiling, FetchError>> + Send + '_ {
        stream::unfold(None, move |queue: Option<VecDeque<Result<FilingRef, FetchError>>>| async move {
            let mut queue = match queue {
                Some(queue) => queue,
                None => self.plan(&window).await,
            };
            let item = match queue.pop_front()? {
                Ok(filing) => self.download_with_retry(&filing).await,
                Err(e) => Err(e),
            };
            Some((item, Some(queue)))
        })
    }

    /// Drain [`Fetcher::stream`] into a batch.
    pub async fn fetch(&self, window: DateWindow) -> FetchBatch {
        let batch = self
            .stream(window)
            .fold(FetchBatch::default(), |mut batch, item| async move {
                match item {
                    Ok(filing) => batch.filings.push(filing),
                    Err(e) => {
                        warn!(error = %e, "Skipping filing");
                        batch.errors.push(e);
                    }
                }
                batch
            })
            .await;
        info!(
            source = self.source.name(),
            downloaded = batch.filings.len(),
            failed = batch.errors.len(),
            "Fetch complete"
        );
        batch
    }

    async fn plan(&self, window: &DateWindow) -> VecDeque<Result<FilingRef, FetchError>> {
        let listing = self.source.list(window).await;
        let mut seen = HashSet::new();
        let refs = listing
            .refs
            .into_iter()
            .filter(|r| seen.insert(r.accession.clone()))
            .take(self.settings.max_filings.unwrap_or(usize::MAX));

        listing
            .errors
            .into_iter()
            .map(Err)
            .chain(refs.map(Ok))
            .collect()
    }

    async fn download_with_retry(&self, filing: &FilingRef) -> Result<RawFiling, FetchError> {
        let attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.source.download(filing).await {
                Ok(raw) => return Ok(raw),
                Err(e) if attempt < attempts => {
                    warn!(
                        url = %filing.url,
                        attempt,
                        of = attempts,
                        error = %e,
                        "Download failed, retrying"
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(with_attempts(e, attempt)),
            }
        }
    }
}

fn with_attempts(e: FetchError, attempts: u32) -> FetchError {
    match e {
        FetchError::Download { url, reason, .. } => FetchError::Download {
            url,
            attempts,
            reason,
        },
        other => other,
    }
}
