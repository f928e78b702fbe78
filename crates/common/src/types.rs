use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, ParseError};

/// Where the fetcher discovers Form 4 filings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// EDGAR "latest filings" Atom feed (`browse-edgar?action=getcurrent`).
    #[default]
    CurrentFeed,
    /// EDGAR daily `master.YYYYMMDD.idx` files.
    DailyIndex,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::CurrentFeed => write!(f, "current_feed"),
            SourceKind::DailyIndex => write!(f, "daily_index"),
        }
    }
}

/// Inclusive range of calendar days to fetch filings for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The `days_back` days ending on (and including) `end`.
    pub fn ending_on(end: NaiveDate, days_back: u32) -> Self {
        let span = days_back.saturating_sub(1) as i64;
        Self {
            start: end
                .checked_sub_signed(chrono::Duration::days(span))
                .unwrap_or(NaiveDate::MIN),
            end,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Every day in the window, oldest first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// A filing discovered in a listing, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRef {
    /// Accession number, e.g. `0001127602-24-001234`.
    pub accession: String,
    /// Company or filer name as shown in the listing.
    pub company: String,
    /// URL of the full submission document.
    pub url: String,
}

/// One downloaded filing document. The body is opaque text until parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFiling {
    pub accession: String,
    pub source_url: String,
    pub retrieved_at: DateTime<Utc>,
    pub body: String,
}

/// Outcome of fetching one window: every document that downloaded plus one
/// error per item that did not.
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub filings: Vec<RawFiling>,
    pub errors: Vec<FetchError>,
}

/// Insider seniority, lowest first. Ordering is meaningful: rule sets compare
/// against a minimum tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SeniorityTier {
    #[default]
    Other,
    TenPercentOwner,
    Director,
    Officer,
    ChiefExecutive,
}

impl std::fmt::Display for SeniorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeniorityTier::Other => write!(f, "other"),
            SeniorityTier::TenPercentOwner => write!(f, "10% owner"),
            SeniorityTier::Director => write!(f, "director"),
            SeniorityTier::Officer => write!(f, "officer"),
            SeniorityTier::ChiefExecutive => write!(f, "CEO"),
        }
    }
}

/// One insider transaction normalized out of a Form 4.
///
/// Construct through [`FilingRecord::new`], which rejects negative share
/// counts and transactions dated after the document was retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingRecord {
    pub issuer_cik: String,
    pub issuer_name: String,
    pub ticker: String,
    pub insider_name: String,
    /// Officer title or relationship summary, e.g. "Chief Executive Officer".
    pub insider_role: String,
    pub seniority: SeniorityTier,
    pub transaction_date: NaiveDate,
    /// SEC transaction code: `P` purchase, `S` sale, `A` award, ...
    pub transaction_code: String,
    pub shares: f64,
    pub price: f64,
    /// `shares * price`, in USD.
    pub value: f64,
    pub source_url: String,
}

/// Fields of a transaction before invariants are checked.
#[derive(Debug, Clone)]
pub struct TransactionFields {
    pub issuer_cik: String,
    pub issuer_name: String,
    pub ticker: String,
    pub insider_name: String,
    pub insider_role: String,
    pub seniority: SeniorityTier,
    pub transaction_date: NaiveDate,
    pub transaction_code: String,
    pub shares: f64,
    pub price: f64,
    pub source_url: String,
}

impl FilingRecord {
    /// Returns `None` when shares are negative or non-finite, or the
    /// transaction is dated after `fetched_on`.
    pub fn new(fields: TransactionFields, fetched_on: NaiveDate) -> Option<Self> {
        if !fields.shares.is_finite() || fields.shares < 0.0 {
            return None;
        }
        if fields.transaction_date > fetched_on {
            return None;
        }
        let price = if fields.price.is_finite() && fields.price > 0.0 {
            fields.price
        } else {
            0.0
        };
        Some(Self {
            issuer_cik: fields.issuer_cik,
            issuer_name: fields.issuer_name,
            ticker: fields.ticker,
            insider_name: fields.insider_name,
            insider_role: fields.insider_role,
            seniority: fields.seniority,
            transaction_date: fields.transaction_date,
            transaction_code: fields.transaction_code,
            shares: fields.shares,
            price,
            value: fields.shares * price,
            source_url: fields.source_url,
        })
    }
}

/// Ownership-structure metrics scraped for a ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnershipMetrics {
    /// Insider ownership, percent.
    pub insider_pct: Option<f64>,
    /// Institutional ownership, percent.
    pub institutional_pct: Option<f64>,
    /// Float, millions of shares.
    pub float_m: Option<f64>,
    /// Short interest, percent of float.
    pub short_interest_pct: Option<f64>,
    /// 0..=3
    pub structure_score: u8,
    /// 0..=4
    pub squeeze_score: u8,
}

/// A record the selector chose for notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub record: FilingRecord,
    /// 1-based position in the ranked output.
    pub rank: usize,
    /// Ranking score; the transaction value in USD.
    pub score: f64,
    pub reason: String,
    pub ownership: Option<OwnershipMetrics>,
}

/// Runner lifecycle. Transitions are strictly sequential; `Failed` is
/// reachable from every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Fetching,
    Parsing,
    Selecting,
    Notifying,
    Done,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Fetching => write!(f, "fetching"),
            RunState::Parsing => write!(f, "parsing"),
            RunState::Selecting => write!(f, "selecting"),
            RunState::Notifying => write!(f, "notifying"),
            RunState::Done => write!(f, "done"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A soft or fatal error recorded during a run, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "message", rename_all = "snake_case")]
pub enum RunError {
    Fetch(String),
    Parse(String),
    Selection(String),
    Enrichment(String),
    Output(String),
    Delivery(String),
    Fatal(String),
}

impl From<&FetchError> for RunError {
    fn from(e: &FetchError) -> Self {
        RunError::Fetch(e.to_string())
    }
}

impl From<&ParseError> for RunError {
    fn from(e: &ParseError) -> Self {
        RunError::Parse(e.to_string())
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Fetch(m) => write!(f, "fetch: {m}"),
            RunError::Parse(m) => write!(f, "parse: {m}"),
            RunError::Selection(m) => write!(f, "selection: {m}"),
            RunError::Enrichment(m) => write!(f, "enrichment: {m}"),
            RunError::Output(m) => write!(f, "output: {m}"),
            RunError::Delivery(m) => write!(f, "delivery: {m}"),
            RunError::Fatal(m) => write!(f, "fatal: {m}"),
        }
    }
}

/// Summary of one strategy run. Logged and optionally printed; not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: uuid::Uuid,
    pub strategy: String,
    pub status: RunStatus,
    pub final_state: RunState,
    pub records_processed: usize,
    pub candidates_selected: usize,
    pub messages_delivered: usize,
    pub errors: Vec<RunError>,
    pub output_path: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One line of the schedule config: when a strategy should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub name: String,
    /// Five-field crontab (`min hour dom month dow`) or six-field with seconds.
    pub schedule: String,
    pub enabled: bool,
    pub notify_on_failure: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(shares: f64, price: f64, date: NaiveDate) -> TransactionFields {
        TransactionFields {
            issuer_cik: "0000320193".into(),
            issuer_name: "Apple Inc.".into(),
            ticker: "AAPL".into(),
            insider_name: "Jane Doe".into(),
            insider_role: "Chief Executive Officer".into(),
            seniority: SeniorityTier::ChiefExecutive,
            transaction_date: date,
            transaction_code: "P".into(),
            shares,
            price,
            source_url: "https://www.sec.gov/x.txt".into(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn record_derives_value() {
        let r = FilingRecord::new(fields(1_000.0, 12.5, day(4)), day(5)).unwrap();
        assert_eq!(r.value, 12_500.0);
    }

    #[test]
    fn negative_shares_are_dropped() {
        assert!(FilingRecord::new(fields(-1.0, 10.0, day(4)), day(5)).is_none());
    }

    #[test]
    fn future_dated_transactions_are_dropped() {
        assert!(FilingRecord::new(fields(10.0, 10.0, day(6)), day(5)).is_none());
        assert!(FilingRecord::new(fields(10.0, 10.0, day(5)), day(5)).is_some());
    }

    #[test]
    fn missing_price_counts_as_zero_value() {
        let r = FilingRecord::new(fields(500.0, f64::NAN, day(4)), day(5)).unwrap();
        assert_eq!(r.price, 0.0);
        assert_eq!(r.value, 0.0);
    }

    #[test]
    fn seniority_orders_ceo_highest() {
        assert!(SeniorityTier::ChiefExecutive > SeniorityTier::Officer);
        assert!(SeniorityTier::Officer > SeniorityTier::Director);
        assert!(SeniorityTier::Director > SeniorityTier::TenPercentOwner);
        assert!(SeniorityTier::TenPercentOwner > SeniorityTier::Other);
    }

    #[test]
    fn window_days_are_inclusive() {
        let w = DateWindow::ending_on(day(5), 3);
        let days: Vec<_> = w.days().collect();
        assert_eq!(days, vec![day(3), day(4), day(5)]);
        assert!(w.contains(day(3)));
        assert!(!w.contains(day(2)));
    }

    #[test]
    fn window_start_saturates_at_the_earliest_date() {
        let w = DateWindow::ending_on(day(5), u32::MAX);
        assert_eq!(w.start, NaiveDate::MIN);
        assert_eq!(w.end, day(5));
    }
}
