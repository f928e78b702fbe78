use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use common::{CandidateRecord, SeniorityTier};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot create {path}: {source}")]
    Dir {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

/// One CSV row: the candidate flattened with its ownership metrics.
#[derive(Debug, Serialize)]
struct CandidateRow<'a> {
    rank: usize,
    score: f64,
    ticker: &'a str,
    issuer_cik: &'a str,
    issuer_name: &'a str,
    insider_name: &'a str,
    insider_role: &'a str,
    seniority: SeniorityTier,
    transaction_date: NaiveDate,
    transaction_code: &'a str,
    shares: f64,
    price: f64,
    value: f64,
    insider_pct: Option<f64>,
    institutional_pct: Option<f64>,
    float_m: Option<f64>,
    short_interest_pct: Option<f64>,
    structure_score: Option<u8>,
    squeeze_score: Option<u8>,
    reason: &'a str,
    source_url: &'a str,
}

impl<'a> From<&'a CandidateRecord> for CandidateRow<'a> {
    fn from(c: &'a CandidateRecord) -> Self {
        let r = &c.record;
        let m = c.ownership.as_ref();
        Self {
            rank: c.rank,
            score: c.score,
            ticker: &r.ticker,
            issuer_cik: &r.issuer_cik,
            issuer_name: &r.issuer_name,
            insider_name: &r.insider_name,
            insider_role: &r.insider_role,
            seniority: r.seniority,
            transaction_date: r.transaction_date,
            transaction_code: &r.transaction_code,
            shares: r.shares,
            price: r.price,
            value: r.value,
            insider_pct: m.and_then(|m| m.insider_pct),
            institutional_pct: m.and_then(|m| m.institutional_pct),
            float_m: m.and_then(|m| m.float_m),
            short_interest_pct: m.and_then(|m| m.short_interest_pct),
            structure_score: m.map(|m| m.structure_score),
            squeeze_score: m.map(|m| m.squeeze_score),
            reason: &c.reason,
            source_url: &r.source_url,
        }
    }
}

pub fn candidates_path(dir: &Path, day: NaiveDate) -> PathBuf {
    dir.join(format!("candidates_{}.csv", day.format("%Y-%m-%d")))
}

/// Write `candidates` to `{dir}/candidates_{day}.csv`, replacing any file
/// from an earlier run the same day.
pub fn write_candidates(
    dir: &Path,
    day: NaiveDate,
    candidates: &[CandidateRecord],
) -> Result<PathBuf, OutputError> {
    std::fs::create_dir_all(dir).map_err(|source| OutputError::Dir {
        path: dir.display().to_string(),
        source,
    })?;
    let path = candidates_path(dir, day);
    let csv_err = |source| OutputError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;
    for c in candidates {
        writer.serialize(CandidateRow::from(c)).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| csv_err(csv::Error::from(e)))?;

    info!(path = %path.display(), rows = candidates.len(), "Candidates written");
    Ok(path)
}
