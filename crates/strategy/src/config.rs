use std::collections::BTreeMap;
use std::path::Path;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use common::{Error, Result, ScheduleConfigError, ScheduleEntry, SourceKind};
use selector::RuleSet;

/// Top-level schedule and strategy settings file (YAML).
///
/// Example `config/schedule.yaml`:
/// ```yaml
/// utc_offset_hours: -5
/// schedules:
///   insider_ceo:
///     cron: "30 13 * * 1-5"
///     enabled: true
///     notify_on_failure: true
/// strategies:
///   insider_ceo:
///     source: daily_index
///     rules:
///       min_transaction_value: 25000
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleFile {
    /// Offset of the local day used for due checks and output file names.
    pub utc_offset_hours: i32,
    /// Kept raw so one malformed entry only disables itself.
    pub schedules: BTreeMap<String, serde_yaml::Value>,
    pub strategies: StrategySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleSpec {
    /// Crontab expression; `cron` is accepted as an alias.
    #[serde(alias = "cron")]
    pub schedule: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub notify_on_failure: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Typed settings for every registered strategy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategySettings {
    pub insider_ceo: InsiderCeoSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsiderCeoSettings {
    pub source: SourceKind,
    pub rules: RuleSet,
    /// Minimum spacing between sec.gov requests.
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Download attempts per filing, including the first.
    pub max_attempts: u32,
    pub feed_max_pages: u32,
    pub max_filings: Option<usize>,
    /// Scrape Fintel ownership metrics for selected candidates.
    pub enrich: bool,
    pub fintel_delay_ms: u64,
    /// Sent to Fintel only; SEC contact details stay with sec.gov.
    pub fintel_user_agent: String,
    pub max_message_len: usize,
}

pub const DEFAULT_FINTEL_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

impl Default for InsiderCeoSettings {
    fn default() -> Self {
        Self {
            source: SourceKind::CurrentFeed,
            rules: RuleSet::default(),
            request_delay_ms: 500,
            request_timeout_secs: 30,
            max_attempts: 2,
            feed_max_pages: 10,
            max_filings: None,
            enrich: true,
            fintel_delay_ms: 1_000,
            fintel_user_agent: DEFAULT_FINTEL_USER_AGENT.to_string(),
            max_message_len: 4096,
        }
    }
}

impl ScheduleFile {
    /// Load from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read schedule config at '{}': {e}", path.display()))
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => {
                Error::Config(format!("Failed to parse schedule config at '{}': {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: Self = serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        file.offset()?;
        Ok(file)
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        if !(-23..=23).contains(&self.utc_offset_hours) {
            return Err(Error::Config(format!(
                "utc_offset_hours must be within -23..=23, got {}",
                self.utc_offset_hours
            )));
        }
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .ok_or_else(|| Error::Config("invalid utc_offset_hours".into()))
    }

    /// Every schedule entry in name order, each decoded on its own.
    pub fn resolve(&self) -> Vec<std::result::Result<ScheduleEntry, ScheduleConfigError>> {
        self.schedules
            .iter()
            .map(|(name, raw)| decode_entry(name, raw))
            .collect()
    }

    /// Well-formed schedule entries in name order.
    pub fn entries(&self) -> Vec<ScheduleEntry> {
        self.resolve().into_iter().filter_map(|r| r.ok()).collect()
    }

    /// One error per schedule entry that could not be decoded.
    pub fn malformed(&self) -> Vec<ScheduleConfigError> {
        self.resolve().into_iter().filter_map(|r| r.err()).collect()
    }

    pub fn entry(&self, name: &str) -> Option<ScheduleEntry> {
        let raw = self.schedules.get(name)?;
        decode_entry(name, raw).ok()
    }
}

fn decode_entry(
    name: &str,
    raw: &serde_yaml::Value,
) -> std::result::Result<ScheduleEntry, ScheduleConfigError> {
    let spec: ScheduleSpec =
        serde_yaml::from_value(raw.clone()).map_err(|e| ScheduleConfigError::Malformed {
            strategy: name.to_string(),
            reason: e.to_string(),
        })?;
    Ok(ScheduleEntry {
        name: name.to_string(),
        schedule: spec.schedule,
        enabled: spec.enabled,
        notify_on_failure: spec.notify_on_failure,
    })
}
