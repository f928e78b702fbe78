//! EDGAR "latest filings" Atom feed.
//!
//! `browse-edgar?action=getcurrent&type=4&output=atom` lists the most recent
//! Form 4 submissions, newest first, 100 per page. Every submission appears
//! twice (once for the issuer, once for the reporting owner), so entries are
//! deduplicated by accession number.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDate};
use common::FilingRef;

use crate::strip_xml_declaration;

const ACCESSION_MARKER: &str = "accession-number=";

/// One parsed feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub filing: FilingRef,
    pub form_type: String,
    pub updated: Option<DateTime<FixedOffset>>,
}

impl FeedEntry {
    pub fn filed_on(&self) -> Option<NaiveDate> {
        self.updated.map(|u| u.date_naive())
    }
}

/// Build the feed URL for one page.
pub fn feed_url(base: &str, page: u32, page_size: u32) -> String {
    format!(
        "{base}/cgi-bin/browse-edgar?action=getcurrent&type=4&owner=include&count={page_size}&start={}&output=atom",
        page * page_size
    )
}

/// Parse an Atom document into Form 4 entries, in feed order, without
/// duplicates. Entries with a form type other than `4`/`4/A` are skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, String> {
    let doc =
        roxmltree::Document::parse(strip_xml_declaration(xml)).map_err(|e| e.to_string())?;
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for entry in doc.descendants().filter(|n| n.has_tag_name("entry")) {
        let form_type = entry
            .children()
            .find(|n| n.has_tag_name("category"))
            .and_then(|c| c.attribute("term"))
            .unwrap_or("4")
            .trim()
            .to_string();
        if form_type != "4" && form_type != "4/A" {
            continue;
        }

        let Some(href) = entry
            .children()
            .find(|n| n.has_tag_name("link"))
            .and_then(|l| l.attribute("href"))
        else {
            continue;
        };
        let Some(url) = submission_url(href) else {
            continue;
        };

        let accession = entry
            .children()
            .find(|n| n.has_tag_name("id"))
            .and_then(|n| n.text())
            .and_then(|id| id.split(ACCESSION_MARKER).nth(1))
            .map(|a| a.trim().to_string())
            .or_else(|| accession_from_url(&url));
        let Some(accession) = accession else {
            continue;
        };
        if !seen.insert(accession.clone()) {
            continue;
        }

        let title = entry
            .children()
            .find(|n| n.has_tag_name("title"))
            .and_then(|n| n.text())
            .unwrap_or_default();
        let updated = entry
            .children()
            .find(|n| n.has_tag_name("updated"))
            .and_then(|n| n.text())
            .and_then(|t| DateTime::parse_from_rfc3339(t.trim()).ok());

        entries.push(FeedEntry {
            filing: FilingRef {
                accession,
                company: company_from_title(title),
                url,
            },
            form_type,
            updated,
        });
    }

    Ok(entries)
}

/// Map an index page link (`...-index.htm`) to the full submission text file
/// (`....txt`), which embeds the ownership XML.
pub fn submission_url(href: &str) -> Option<String> {
    let parsed = url::Url::parse(href.trim()).ok()?;
    if parsed.host_str().is_none() {
        return None;
    }
    let path = parsed.path();
    let stem = path
        .strip_suffix("-index.html")
        .or_else(|| path.strip_suffix("-index.htm"))?;
    let mut out = parsed.clone();
    out.set_path(&format!("{stem}.txt"));
    out.set_query(None);
    Some(out.to_string())
}

fn accession_from_url(url: &str) -> Option<String> {
    let file = url.rsplit('/').next()?;
    file.strip_suffix(".txt").map(str::to_string)
}

/// "4 - Doe Jane (0001234567) (Reporting)" -> "Doe Jane"
fn company_from_title(title: &str) -> String {
    let rest = title.split_once(" - ").map(|(_, r)| r).unwrap_or(title);
    rest.split(" (").next().unwrap_or(rest).trim().to_string()
}
