use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use common::{
    CandidateRecord, DateWindow, FilingRecord, RunError, RunResult, RunState, RunStatus,
    ScheduleConfigError,
};
use telegram_notify::Notifier;

use crate::context::RunContext;
use crate::output::write_candidates;
use crate::registry::StrategyRegistry;
use crate::Strategy;

/// Bookkeeping for one run; turned into a [`RunResult`] at the end.
struct Tracker {
    result: RunResult,
}

impl Tracker {
    fn new(strategy: &str) -> Self {
        let now = Utc::now();
        Self {
            result: RunResult {
                run_id: Uuid::new_v4(),
                strategy: strategy.to_string(),
                status: RunStatus::Success,
                final_state: RunState::Idle,
                records_processed: 0,
                candidates_selected: 0,
                messages_delivered: 0,
                errors: Vec::new(),
                output_path: None,
                started_at: now,
                finished_at: now,
            },
        }
    }

    fn enter(&mut self, state: RunState) {
        info!(
            run_id = %self.result.run_id,
            strategy = %self.result.strategy,
            from = %self.result.final_state,
            to = %state,
            "Run state"
        );
        self.result.final_state = state;
    }

    fn soft(&mut self, e: RunError) {
        self.result.errors.push(e);
    }

    fn fatal(&mut self, e: RunError) {
        error!(strategy = %self.result.strategy, error = %e, "Run failed");
        self.result.errors.push(e);
        self.enter(RunState::Failed);
    }

    fn finish(mut self) -> RunResult {
        let r = &mut self.result;
        r.finished_at = Utc::now();
        r.status = if r.final_state == RunState::Failed {
            RunStatus::Failed
        } else if r.errors.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Partial
        };
        info!(
            run_id = %r.run_id,
            strategy = %r.strategy,
            status = %r.status,
            records = r.records_processed,
            candidates = r.candidates_selected,
            messages = r.messages_delivered,
            errors = r.errors.len(),
            "Run finished"
        );
        self.result
    }
}

/// Run `strategy` end to end as of the context's current day.
///
/// Never panics and never returns early without a result: per-item and
/// delivery problems are recorded as soft errors, invalid selection rules
/// end the run as `Failed` before anything is fetched.
pub async fn run(strategy: &dyn Strategy, ctx: &RunContext, notify_on_failure: bool) -> RunResult {
    let mut t = Tracker::new(strategy.name());
    let as_of = ctx.today();

    if let Err(e) = strategy.rules().validate() {
        t.fatal(RunError::Selection(e.to_string()));
        return fail(t, ctx, notify_on_failure).await;
    }

    t.enter(RunState::Fetching);
    let window = DateWindow::ending_on(as_of, strategy.rules().lookback_days);
    let batch = strategy.fetch(window).await;
    for e in &batch.errors {
        t.soft(RunError::from(e));
    }

    t.enter(RunState::Parsing);
    let mut records: Vec<FilingRecord> = Vec::new();
    for raw in &batch.filings {
        match strategy.parse(raw) {
            Ok(parsed) => records.extend(parsed),
            Err(e) => {
                warn!(url = %raw.source_url, error = %e, "Skipping unparseable filing");
                t.soft(RunError::from(&e));
            }
        }
    }
    t.result.records_processed = records.len();

    t.enter(RunState::Selecting);
    let mut candidates: Vec<CandidateRecord> = match strategy.select(&records, as_of) {
        Ok(c) => c,
        Err(e) => {
            t.fatal(RunError::Selection(e.to_string()));
            return fail(t, ctx, notify_on_failure).await;
        }
    };
    t.result.candidates_selected = candidates.len();
    for e in strategy.enrich(&mut candidates).await {
        warn!(error = %e, "Enrichment incomplete");
        t.soft(e);
    }

    if !candidates.is_empty() {
        match write_candidates(&ctx.output_dir(strategy.name()), as_of, &candidates) {
            Ok(path) => t.result.output_path = Some(path.display().to_string()),
            Err(e) => {
                warn!(error = %e, "Failed to write candidates");
                t.soft(RunError::Output(e.to_string()));
            }
        }
    }

    t.enter(RunState::Notifying);
    match strategy.notify(ctx, &candidates).await {
        Ok(delivered) => t.result.messages_delivered = delivered,
        Err(e) => {
            t.result.messages_delivered = e.delivered;
            t.soft(RunError::Delivery(e.to_string()));
        }
    }

    t.enter(RunState::Done);
    t.finish()
}

/// Build `name` from the registry and run it. An unknown name is a config
/// error; a constructor failure is a failed run.
pub async fn run_named(
    registry: &StrategyRegistry,
    name: &str,
    ctx: &RunContext,
    notify_on_failure: bool,
) -> Result<RunResult, ScheduleConfigError> {
    match registry.build(name, ctx) {
        Ok(strategy) => Ok(run(strategy.as_ref(), ctx, notify_on_failure).await),
        Err(e @ ScheduleConfigError::UnknownStrategy(_)) => Err(e),
        Err(e) => {
            let mut t = Tracker::new(name);
            t.fatal(RunError::Fatal(e.to_string()));
            Ok(fail(t, ctx, notify_on_failure).await)
        }
    }
}

async fn fail(mut t: Tracker, ctx: &RunContext, notify_on_failure: bool) -> RunResult {
    if notify_on_failure {
        let reason = t
            .result
            .errors
            .last()
            .map(ToString::to_string)
            .unwrap_or_default();
        let notifier = Notifier::telegram_limits(ctx.sink.clone());
        if let Err(e) = notifier.notify_failure(&t.result.strategy, &reason).await {
            warn!(error = %e, "Failure notification not delivered");
            t.soft(RunError::Delivery(e.to_string()));
        }
    }
    t.finish()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};

    use common::{
        Config, DeliveryError, FetchBatch, FetchError, MessageSink, ParseError, RawFiling,
        SeniorityTier,
    };
    use selector::RuleSet;

    use crate::config::StrategySettings;
    use crate::context::FixedClock;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub sent: Mutex<Vec<String>>,
        pub fail: bool,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send(&self, text: &str) -> Result<(), DeliveryError> {
            if self.fail {
                return Err(DeliveryError::Rejected("Unauthorized".into()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    pub(crate) fn context_with_sink(data_dir: &Path, sink: Arc<dyn MessageSink>) -> RunContext {
        RunContext {
            config: Config {
                schedule_config_path: "config/schedule.yaml".into(),
                data_dir: data_dir.to_path_buf(),
                cache_dir: data_dir.join(".cache"),
                sec_user_agent: "test admin@example.com".into(),
            },
            settings: StrategySettings::default(),
            sink,
            // 2024-03-07 15:00 UTC, a Thursday.
            clock: Arc::new(FixedClock(chrono::Utc.with_ymd_and_hms(2024, 3, 7, 15, 0, 0).unwrap())),
            utc_offset: chrono::FixedOffset::east_opt(0).unwrap(),
        }
    }

    pub(crate) fn context(data_dir: &Path) -> RunContext {
        context_with_sink(data_dir, Arc::new(RecordingSink::default()))
    }

    /// Parses each raw body as `ticker,value` lines.
    pub(crate) struct FakeStrategy {
        pub name: String,
        pub rules: RuleSet,
        pub bodies: Vec<&'static str>,
        pub fetch_errors: usize,
        pub fetches: AtomicUsize,
    }

    impl FakeStrategy {
        pub(crate) fn new(name: &str, bodies: Vec<&'static str>) -> Self {
            Self {
                name: name.to_string(),
                rules: RuleSet {
                    min_transaction_value: 200_000.0,
                    ..RuleSet::default()
                },
                bodies,
                fetch_errors: 0,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Strategy for FakeStrategy {
        fn name(&self) -> &str {
            &self.name
        }

        fn rules(&self) -> &RuleSet {
            &self.rules
        }

        async fn fetch(&self, _window: DateWindow) -> FetchBatch {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            FetchBatch {
                filings: self
                    .bodies
                    .iter()
                    .enumerate()
                    .map(|(i, body)| RawFiling {
                        accession: format!("acc-{i}"),
                        source_url: format!("https://example.test/{i}.txt"),
                        retrieved_at: chrono::Utc::now(),
                        body: body.to_string(),
                    })
                    .collect(),
                errors: (0..self.fetch_errors)
                    .map(|i| FetchError::Download {
                        url: format!("https://example.test/missing-{i}.txt"),
                        attempts: 2,
                        reason: "HTTP 503".into(),
                    })
                    .collect(),
            }
        }

        fn parse(&self, raw: &RawFiling) -> Result<Vec<FilingRecord>, ParseError> {
            raw.body
                .lines()
                .map(|line| -> Result<FilingRecord, ParseError> {
                    let (ticker, value) = line
                        .split_once(',')
                        .ok_or_else(|| ParseError::Malformed(line.to_string()))?;
                    let value: f64 = value
                        .parse()
                        .map_err(|_| ParseError::MissingField("value"))?;
                    Ok(FilingRecord {
                        issuer_cik: ticker.into(),
                        issuer_name: ticker.into(),
                        ticker: ticker.into(),
                        insider_name: "Doe Jane".into(),
                        insider_role: "CEO".into(),
                        seniority: SeniorityTier::ChiefExecutive,
                        transaction_date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
                        transaction_code: "P".into(),
                        shares: value,
                        price: 1.0,
                        value,
                        source_url: raw.source_url.clone(),
                    })
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn clean_run_succeeds_and_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let ctx = context_with_sink(dir.path(), sink.clone());
        let strategy = FakeStrategy::new("fake", vec!["AAA,500000\nBBB,2000000", "CCC,100000"]);

        let result = run(&strategy, &ctx, false).await;

        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.final_state, RunState::Done);
        assert_eq!(result.records_processed, 3);
        assert_eq!(result.candidates_selected, 2);
        assert_eq!(result.messages_delivered, 1);
        let path = result.output_path.unwrap();
        assert!(path.ends_with("candidates_2024-03-07.csv"));
        assert!(Path::new(&path).exists());

        let sent = sink.sent.lock().unwrap();
        let bbb = sent[0].find("BBB").unwrap();
        let aaa = sent[0].find("AAA").unwrap();
        assert!(bbb < aaa, "larger purchase ranks first");
        assert!(!sent[0].contains("CCC"));
    }

    #[tokio::test]
    async fn delivery_failure_is_partial_and_keeps_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let ctx = context_with_sink(dir.path(), sink);
        let strategy = FakeStrategy::new("fake", vec!["AAA,500000"]);

        let result = run(&strategy, &ctx, true).await;

        assert_eq!(result.status, RunStatus::Partial);
        assert_eq!(result.final_state, RunState::Done);
        assert_eq!(result.candidates_selected, 1);
        assert_eq!(result.messages_delivered, 0);
        assert!(matches!(result.errors.as_slice(), [RunError::Delivery(_)]));
    }

    #[tokio::test]
    async fn item_errors_make_the_run_partial() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let mut strategy = FakeStrategy::new("fake", vec!["AAA,500000", "garbage"]);
        strategy.fetch_errors = 1;

        let result = run(&strategy, &ctx, false).await;

        assert_eq!(result.status, RunStatus::Partial);
        assert_eq!(result.candidates_selected, 1);
        assert!(matches!(
            result.errors.as_slice(),
            [RunError::Fetch(_), RunError::Parse(_)]
        ));
    }

    #[tokio::test]
    async fn no_candidates_still_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let ctx = context_with_sink(dir.path(), sink.clone());
        let strategy = FakeStrategy::new("fake", vec!["AAA,10"]);

        let result = run(&strategy, &ctx, false).await;

        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.candidates_selected, 0);
        assert!(result.output_path.is_none());
        assert_eq!(sink.sent.lock().unwrap()[0], "😕 fake: no candidates today");
    }

    #[tokio::test]
    async fn invalid_rules_fail_the_run_and_notify() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let ctx = context_with_sink(dir.path(), sink.clone());
        let mut strategy = FakeStrategy::new("fake", vec!["AAA,500000"]);
        strategy.rules.transaction_codes.clear();

        let result = run(&strategy, &ctx, true).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.final_state, RunState::Failed);
        assert_eq!(result.messages_delivered, 0);
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("💥 fake failed: selection:"));
        assert_eq!(strategy.fetches.load(Ordering::SeqCst), 0, "nothing fetched");
    }

    #[tokio::test]
    async fn oversized_lookback_fails_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let mut strategy = FakeStrategy::new("fake", vec!["AAA,500000"]);
        strategy.rules.lookback_days = 200_000_000;

        let result = run(&strategy, &ctx, false).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.records_processed, 0);
        assert!(matches!(result.errors.as_slice(), [RunError::Selection(_)]));
        assert_eq!(strategy.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn constructor_failure_is_a_failed_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let mut registry = StrategyRegistry::empty();
        registry.register("broken", |_| Err(common::Error::Config("bad".into())));

        let result = run_named(&registry, "broken", &ctx, false).await.unwrap();
        assert_eq!(result.status, RunStatus::Failed);
        assert!(matches!(result.errors.as_slice(), [RunError::Fatal(_)]));

        assert!(run_named(&registry, "missing", &ctx, false).await.is_err());
    }
}
