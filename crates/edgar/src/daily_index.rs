//! EDGAR daily `master.YYYYMMDD.idx` files.
//!
//! Pipe-separated rows `CIK|Company Name|Form Type|Date Filed|Filename`
//! after a free-text preamble.

use chrono::{Datelike, NaiveDate};
use common::FilingRef;

const HEADER_PREFIX: &str = "CIK|Company Name";

pub fn index_url(base: &str, day: NaiveDate) -> String {
    let quarter = (day.month() - 1) / 3 + 1;
    format!(
        "{base}/Archives/edgar/daily-index/{}/QTR{quarter}/{}",
        day.year(),
        index_file_name(day)
    )
}

pub fn index_file_name(day: NaiveDate) -> String {
    format!("master.{}.idx", day.format("%Y%m%d"))
}

/// Extract the Form 4 rows. Malformed rows are skipped; an index without a
/// header yields nothing.
pub fn parse_index(base: &str, text: &str) -> Vec<FilingRef> {
    let mut started = false;
    let mut refs = Vec::new();

    for line in text.lines() {
        if !started {
            started = line.trim_start().starts_with(HEADER_PREFIX);
            continue;
        }

        let parts: Vec<&str> = line.trim().split('|').collect();
        let [_cik, company, form_type, _filed, filename] = parts.as_slice() else {
            continue;
        };
        if form_type.trim() != "4" {
            continue;
        }
        let filename = filename.trim();
        let Some(accession) = filename
            .rsplit('/')
            .next()
            .and_then(|f| f.strip_suffix(".txt"))
        else {
            continue;
        };

        refs.push(FilingRef {
            accession: accession.to_string(),
            company: company.trim().to_string(),
            url: format!("{base}/Archives/{filename}"),
        });
    }

    refs
}
