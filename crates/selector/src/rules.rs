use serde::{Deserialize, Serialize};

use common::{SelectionConfigError, SeniorityTier};

/// Ten years; anything longer is a typo.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// User-configurable selection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleSet {
    /// Minimum `shares * price` in USD (e.g. 5000.0).
    pub min_transaction_value: f64,
    /// Least senior insider tier that still qualifies.
    pub min_seniority: SeniorityTier,
    /// Only transactions dated within this many days up to `as_of` count.
    pub lookback_days: u32,
    /// SEC transaction codes that qualify, e.g. `["P"]` for open-market buys.
    pub transaction_codes: Vec<String>,
    /// Keep at most this many candidates after ranking.
    pub top_n: Option<usize>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            min_transaction_value: 5_000.0,
            min_seniority: SeniorityTier::ChiefExecutive,
            lookback_days: 3,
            transaction_codes: vec!["P".to_string()],
            top_n: Some(20),
        }
    }
}

impl RuleSet {
    pub fn validate(&self) -> Result<(), SelectionConfigError> {
        if !self.min_transaction_value.is_finite() || self.min_transaction_value < 0.0 {
            return Err(SelectionConfigError::InvalidThreshold(
                self.min_transaction_value,
            ));
        }
        if self.lookback_days == 0 {
            return Err(SelectionConfigError::ZeroLookback);
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(SelectionConfigError::LookbackTooLarge {
                got: self.lookback_days,
                max: MAX_LOOKBACK_DAYS,
            });
        }
        if self.transaction_codes.iter().all(|c| c.trim().is_empty()) {
            return Err(SelectionConfigError::NoTransactionCodes);
        }
        if self.top_n == Some(0) {
            return Err(SelectionConfigError::ZeroTopN);
        }
        Ok(())
    }

    pub(crate) fn allows_code(&self, code: &str) -> bool {
        self.transaction_codes
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case(code.trim()))
    }
}

/// Human label for a transaction code.
pub fn code_label(code: &str) -> &'static str {
    match code {
        "P" => "open-market purchase",
        "S" => "open-market sale",
        "A" => "award",
        "M" => "option exercise",
        "G" => "gift",
        "F" => "tax withholding",
        _ => "transaction",
    }
}
