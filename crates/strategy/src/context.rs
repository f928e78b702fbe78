use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use common::{Config, MessageSink};

use crate::config::StrategySettings;

/// Source of the current time. Swapped for a fixed instant in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Everything a run needs from the outside world, passed explicitly.
#[derive(Clone)]
pub struct RunContext {
    pub config: Config,
    pub settings: StrategySettings,
    pub sink: Arc<dyn MessageSink>,
    pub clock: Arc<dyn Clock>,
    pub utc_offset: FixedOffset,
}

impl RunContext {
    /// Current calendar day in the configured offset.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.utc_offset).date_naive()
    }

    /// `{data_dir}/{strategy}`
    pub fn output_dir(&self, strategy: &str) -> PathBuf {
        self.config.data_dir.join(strategy)
    }
}
