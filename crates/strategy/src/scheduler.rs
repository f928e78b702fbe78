use std::str::FromStr;

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use cron::Schedule;
use tracing::{info, warn};

use common::{RunResult, ScheduleConfigError, ScheduleEntry};

use crate::config::ScheduleFile;
use crate::context::RunContext;
use crate::registry::StrategyRegistry;
use crate::runner::run_named;

/// What one scheduler pass did, entry by entry.
#[derive(Debug, Default)]
pub struct ScheduleReport {
    pub runs: Vec<RunResult>,
    pub not_due: Vec<String>,
    pub disabled: Vec<String>,
    pub config_errors: Vec<ScheduleConfigError>,
}

/// Runs every enabled entry whose schedule fires today.
///
/// The external trigger decides when the process starts; this is the second
/// check that keeps an off-day trigger from running anything.
pub struct Scheduler {
    entries: Vec<ScheduleEntry>,
    malformed: Vec<ScheduleConfigError>,
    registry: StrategyRegistry,
}

impl Scheduler {
    pub fn new(entries: Vec<ScheduleEntry>, registry: StrategyRegistry) -> Self {
        Self {
            entries,
            malformed: Vec::new(),
            registry,
        }
    }

    /// Well-formed entries from `file`; the malformed ones are reported by
    /// every pass without blocking the rest.
    pub fn from_file(file: &ScheduleFile, registry: StrategyRegistry) -> Self {
        Self {
            entries: file.entries(),
            malformed: file.malformed(),
            registry,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// One pass over all entries. An entry's misconfiguration or failure
    /// never stops the entries after it.
    pub async fn run_due(&self, ctx: &RunContext) -> ScheduleReport {
        let today = ctx.today();
        let mut report = ScheduleReport::default();
        for e in &self.malformed {
            warn!(error = %e, "Skipping schedule entry");
            report.config_errors.push(e.clone());
        }

        for entry in &self.entries {
            if !entry.enabled {
                info!(strategy = %entry.name, "Schedule disabled, skipping");
                report.disabled.push(entry.name.clone());
                continue;
            }

            match is_due(&entry.schedule, today, ctx.utc_offset) {
                Ok(true) => {}
                Ok(false) => {
                    info!(strategy = %entry.name, %today, "Not scheduled today");
                    report.not_due.push(entry.name.clone());
                    continue;
                }
                Err(reason) => {
                    let e = ScheduleConfigError::InvalidExpression {
                        strategy: entry.name.clone(),
                        expr: entry.schedule.clone(),
                        reason,
                    };
                    warn!(error = %e, "Skipping schedule entry");
                    report.config_errors.push(e);
                    continue;
                }
            }

            info!(strategy = %entry.name, %today, "Running scheduled strategy");
            match run_named(&self.registry, &entry.name, ctx, entry.notify_on_failure).await {
                Ok(result) => report.runs.push(result),
                Err(e) => {
                    warn!(error = %e, "Skipping schedule entry");
                    report.config_errors.push(e);
                }
            }
        }

        info!(
            ran = report.runs.len(),
            not_due = report.not_due.len(),
            disabled = report.disabled.len(),
            config_errors = report.config_errors.len(),
            "Scheduler pass complete"
        );
        report
    }
}

/// Parse a crontab expression into the schedules whose union it denotes.
///
/// Five fields are read as standard crontab (`min hour dom month dow`, Sunday
/// = 0 or 7) and converted to the six-field form with a zero seconds column.
/// When both day-of-month and day-of-week are restricted, crontab fires on
/// either, while `cron` requires both; such expressions split into one
/// schedule per day field. Six or seven fields are passed through unchanged
/// (Sunday = 1, both day fields must match).
pub fn parse_schedule(expr: &str) -> Result<Vec<Schedule>, String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let normalized = match fields.as_slice() {
        [min, hour, dom, month, dow] => {
            let dow = crontab_dow(dow);
            if is_restricted(dom) && is_restricted(&dow) {
                vec![
                    format!("0 {min} {hour} {dom} {month} *"),
                    format!("0 {min} {hour} * {month} {dow}"),
                ]
            } else {
                vec![format!("0 {min} {hour} {dom} {month} {dow}")]
            }
        }
        f if f.len() == 6 || f.len() == 7 => vec![f.join(" ")],
        f => return Err(format!("expected 5 to 7 fields, got {}", f.len())),
    };
    normalized
        .iter()
        .map(|n| Schedule::from_str(n).map_err(|e| e.to_string()))
        .collect()
}

/// Crontab treats any field starting with `*` (including `*/n`) as unrestricted.
fn is_restricted(field: &str) -> bool {
    !field.starts_with('*') && field != "?"
}

/// Whether `expr` fires at any moment of `day` in `offset`.
pub fn is_due(expr: &str, day: NaiveDate, offset: FixedOffset) -> Result<bool, String> {
    let schedules = parse_schedule(expr)?;
    let start = offset
        .from_local_datetime(&day.and_time(NaiveTime::MIN))
        .single()
        .ok_or_else(|| format!("no local midnight for {day}"))?;
    let end = start + Duration::days(1);
    Ok(schedules.iter().any(|schedule| {
        schedule
            .after(&(start - Duration::seconds(1)))
            .next()
            .is_some_and(|at| at < end)
    }))
}

/// Numeric crontab weekdays (0-7, Sunday = 0 and 7) to the 1-7 numbering
/// with Sunday = 1. Names and wildcards pass through.
fn crontab_dow(field: &str) -> String {
    let shift = |n: u8| (n % 7) + 1;
    field
        .split(',')
        .map(|part| {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (part, None),
            };
            let converted = match range.split_once('-') {
                Some((a, b)) => match (a.parse::<u8>(), b.parse::<u8>()) {
                    (Ok(0), Ok(7)) => "1-7".to_string(),
                    (Ok(a), Ok(7)) if a <= 7 && step.is_none() => format!("{}-7,1", a + 1),
                    (Ok(a), Ok(b)) if a <= 7 && b < 7 => format!("{}-{}", shift(a), shift(b)),
                    _ => range.to_string(),
                },
                None => match range.parse::<u8>() {
                    Ok(n) if n <= 7 => shift(n).to_string(),
                    _ => range.to_string(),
                },
            };
            match step {
                Some(step) => format!("{converted}/{step}"),
                None => converted,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
