//! Filtering and ranking of parsed insider transactions.
//!
//! [`select`] is a pure function of its inputs so identical record sets
//! always produce identical rankings.

pub mod rules;

pub use rules::{code_label, RuleSet, MAX_LOOKBACK_DAYS};

use std::cmp::Ordering;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use common::{CandidateRecord, FilingRecord, SelectionConfigError};

/// Filter `records` by `rules` as of `as_of`, rank them, and cap at `top_n`.
///
/// A record qualifies when its value meets the threshold, its insider is at
/// least `min_seniority`, its code is allowed, and its date falls in
/// `(as_of - lookback_days, as_of]`. Ranking is value descending, then date
/// descending, then issuer and insider name ascending.
pub fn select(
    records: &[FilingRecord],
    rules: &RuleSet,
    as_of: NaiveDate,
) -> Result<Vec<CandidateRecord>, SelectionConfigError> {
    rules.validate()?;

    let earliest = as_of
        .checked_sub_signed(Duration::days(i64::from(rules.lookback_days)))
        .unwrap_or(NaiveDate::MIN);
    let mut kept: Vec<&FilingRecord> = records
        .iter()
        .filter(|r| r.value >= rules.min_transaction_value)
        .filter(|r| r.seniority >= rules.min_seniority)
        .filter(|r| rules.allows_code(&r.transaction_code))
        .filter(|r| r.transaction_date > earliest && r.transaction_date <= as_of)
        .collect();

    kept.sort_by(|a, b| rank_order(a, b));
    if let Some(n) = rules.top_n {
        kept.truncate(n);
    }

    debug!(
        input = records.len(),
        selected = kept.len(),
        min_value = rules.min_transaction_value,
        "Selection complete"
    );

    Ok(kept
        .into_iter()
        .enumerate()
        .map(|(i, r)| CandidateRecord {
            rank: i + 1,
            score: r.value,
            reason: reason(r, rules),
            record: r.clone(),
            ownership: None,
        })
        .collect())
}

/// Total order used for ranking.
pub fn rank_order(a: &FilingRecord, b: &FilingRecord) -> Ordering {
    b.value
        .total_cmp(&a.value)
        .then_with(|| b.transaction_date.cmp(&a.transaction_date))
        .then_with(|| a.issuer_cik.cmp(&b.issuer_cik))
        .then_with(|| a.insider_name.cmp(&b.insider_name))
}

fn reason(r: &FilingRecord, rules: &RuleSet) -> String {
    format!(
        "{} {} of ${:.0} (min ${:.0}, last {}d)",
        r.seniority,
        code_label(&r.transaction_code),
        r.value,
        rules.min_transaction_value,
        rules.lookback_days
    )
}
