pub mod config;
pub mod context;
pub mod insider_ceo;
pub mod output;
pub mod registry;
pub mod runner;
pub mod scheduler;

pub use config::{InsiderCeoSettings, ScheduleFile, ScheduleSpec, StrategySettings};
pub use context::{Clock, FixedClock, RunContext, SystemClock};
pub use insider_ceo::InsiderCeo;
pub use registry::StrategyRegistry;
pub use runner::{run, run_named};
pub use scheduler::{ScheduleReport, Scheduler};

use async_trait::async_trait;
use chrono::NaiveDate;

use common::{
    CandidateRecord, DateWindow, FetchBatch, FilingRecord, ParseError, RawFiling, RunError,
    SelectionConfigError,
};
use selector::RuleSet;
use telegram_notify::format::TELEGRAM_MAX_LEN;
use telegram_notify::{Notifier, PartialDelivery};

/// One named fetch → parse → select → notify pipeline.
///
/// The runner drives the stages in order and owns error bookkeeping;
/// implementations only do the work of each stage.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Registry name, also used for the output directory and message headers.
    fn name(&self) -> &str;

    fn rules(&self) -> &RuleSet;

    fn max_message_len(&self) -> usize {
        TELEGRAM_MAX_LEN
    }

    /// Download every filing in `window`. Per-item failures are in the batch.
    async fn fetch(&self, window: DateWindow) -> FetchBatch;

    fn parse(&self, raw: &RawFiling) -> Result<Vec<FilingRecord>, ParseError>;

    fn select(
        &self,
        records: &[FilingRecord],
        as_of: NaiveDate,
    ) -> Result<Vec<CandidateRecord>, SelectionConfigError> {
        selector::select(records, self.rules(), as_of)
    }

    /// Attach extra data to selected candidates. Failures are soft.
    async fn enrich(&self, _candidates: &mut [CandidateRecord]) -> Vec<RunError> {
        Vec::new()
    }

    async fn notify(
        &self,
        ctx: &RunContext,
        candidates: &[CandidateRecord],
    ) -> Result<usize, PartialDelivery> {
        Notifier::new(ctx.sink.clone(), self.max_message_len())
            .deliver(self.name(), candidates)
            .await
    }
}
