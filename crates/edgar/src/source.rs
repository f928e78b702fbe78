use async_trait::async_trait;

use common::{DateWindow, FetchError, FilingRef, RawFiling};

/// Result of listing the filings available in a window. Listing is itself
/// partial: one failing index page does not hide the others.
#[derive(Debug, Default)]
pub struct Listing {
    pub refs: Vec<FilingRef>,
    pub errors: Vec<FetchError>,
}

/// Abstraction over a remote filing archive.
///
/// `EdgarClient` implements this against sec.gov. Tests use in-memory fakes.
/// Implementations make exactly one attempt per call; the `Fetcher` owns
/// re-attempts.
#[async_trait]
pub trait FilingSource: Send + Sync {
    /// Short identifier used in logs, e.g. "current_feed".
    fn name(&self) -> &str;

    /// Discover the filings published inside `window`.
    async fn list(&self, window: &DateWindow) -> Listing;

    /// Download one filing document.
    async fn download(&self, filing: &FilingRef) -> Result<RawFiling, FetchError>;
}
