//! Form 4 `ownershipDocument` parser.
//!
//! Accepts either the bare XML document or a full EDGAR submission text file
//! that wraps it in `<XML>...</XML>`. Parsing is pure: the result depends only
//! on the input bytes and its retrieval timestamp.

use chrono::NaiveDate;
use roxmltree::Node;

use common::{FilingRecord, ParseError, RawFiling, SeniorityTier, TransactionFields};

use crate::strip_xml_declaration;

const SUPPORTED_FORMS: [&str; 2] = ["4", "4/A"];

/// Expand one filing into one record per non-derivative transaction.
///
/// Transactions that break record invariants (negative shares, dated after
/// retrieval) are dropped. A filing with no qualifying transactions yields
/// an empty vector.
pub fn parse_filing(raw: &RawFiling) -> Result<Vec<FilingRecord>, ParseError> {
    let xml = ownership_xml(&raw.body)?;
    let doc = roxmltree::Document::parse(xml).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let root = doc
        .descendants()
        .find(|n| n.has_tag_name("ownershipDocument"))
        .ok_or_else(|| ParseError::Malformed("no ownershipDocument element".into()))?;

    let form = text_at(root, &["documentType"]).ok_or(ParseError::MissingField("documentType"))?;
    if !SUPPORTED_FORMS.contains(&form) {
        return Err(ParseError::UnsupportedForm(form.to_string()));
    }

    let issuer_cik = text_at(root, &["issuer", "issuerCik"])
        .ok_or(ParseError::MissingField("issuerCik"))?
        .to_string();
    let issuer_name = text_at(root, &["issuer", "issuerName"])
        .unwrap_or_default()
        .to_string();
    let ticker = text_at(root, &["issuer", "issuerTradingSymbol"])
        .map(normalize_ticker)
        .unwrap_or_default();

    let owner = primary_owner(root)?;
    let fetched_on = raw.retrieved_at.date_naive();

    let Some(table) = child(root, "nonDerivativeTable") else {
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for tx in table
        .children()
        .filter(|n| n.has_tag_name("nonDerivativeTransaction"))
    {
        let date = text_at(tx, &["transactionDate", "value"])
            .ok_or(ParseError::MissingField("transactionDate"))
            .and_then(parse_date)?;
        let code = text_at(tx, &["transactionCoding", "transactionCode"])
            .ok_or(ParseError::MissingField("transactionCode"))?;
        let shares = text_at(tx, &["transactionAmounts", "transactionShares", "value"])
            .ok_or(ParseError::MissingField("transactionShares"))
            .and_then(parse_number)?;
        let price = match text_at(tx, &["transactionAmounts", "transactionPricePerShare", "value"]) {
            Some(p) => parse_number(p)?,
            None => 0.0,
        };

        let fields = TransactionFields {
            issuer_cik: issuer_cik.clone(),
            issuer_name: issuer_name.clone(),
            ticker: ticker.clone(),
            insider_name: owner.name.clone(),
            insider_role: owner.role.clone(),
            seniority: owner.tier,
            transaction_date: date,
            transaction_code: code.to_string(),
            shares,
            price,
            source_url: raw.source_url.clone(),
        };
        if let Some(record) = FilingRecord::new(fields, fetched_on) {
            records.push(record);
        }
    }

    Ok(records)
}

struct Owner {
    name: String,
    role: String,
    tier: SeniorityTier,
}

/// The most senior reporting owner; the first one listed wins ties.
fn primary_owner(root: Node) -> Result<Owner, ParseError> {
    let mut best: Option<Owner> = None;
    for node in root.children().filter(|n| n.has_tag_name("reportingOwner")) {
        let Some(name) = text_at(node, &["reportingOwnerId", "rptOwnerName"]) else {
            continue;
        };
        let (tier, role) = classify(child(node, "reportingOwnerRelationship"));
        let candidate = Owner {
            name: name.to_string(),
            role,
            tier,
        };
        if best.as_ref().map_or(true, |b| candidate.tier > b.tier) {
            best = Some(candidate);
        }
    }
    best.ok_or(ParseError::MissingField("rptOwnerName"))
}

fn classify(rel: Option<Node>) -> (SeniorityTier, String) {
    let Some(rel) = rel else {
        return (SeniorityTier::Other, String::new());
    };
    let flag = |name: &str| text_at(rel, &[name]).map(is_true).unwrap_or(false);
    let title = text_at(rel, &["officerTitle"]).unwrap_or_default();

    let is_officer = flag("isOfficer");
    let tier = if is_officer && names_chief_executive(title) {
        SeniorityTier::ChiefExecutive
    } else if is_officer {
        SeniorityTier::Officer
    } else if flag("isDirector") {
        SeniorityTier::Director
    } else if flag("isTenPercentOwner") {
        SeniorityTier::TenPercentOwner
    } else {
        SeniorityTier::Other
    };

    let role = if !title.is_empty() {
        title.to_string()
    } else {
        let mut parts = Vec::new();
        if flag("isDirector") {
            parts.push("Director");
        }
        if flag("isTenPercentOwner") {
            parts.push("10% Owner");
        }
        if flag("isOther") {
            parts.push(text_at(rel, &["otherText"]).unwrap_or("Other"));
        }
        parts.join(", ")
    };

    (tier, role)
}

fn names_chief_executive(title: &str) -> bool {
    let upper = title.to_ascii_uppercase();
    upper.contains("CHIEF EXECUTIVE")
        || upper
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == "CEO")
}

fn is_true(v: &str) -> bool {
    matches!(v, "1" | "true" | "TRUE" | "True")
}

/// Locate the ownership XML inside a submission wrapper, or take the whole
/// body when it is already bare XML.
fn ownership_xml(body: &str) -> Result<&str, ParseError> {
    let mut rest = body;
    while let Some(start) = rest.find("<XML>") {
        let after = &rest[start + "<XML>".len()..];
        let end = after
            .find("</XML>")
            .ok_or_else(|| ParseError::Malformed("unterminated <XML> block".into()))?;
        let block = &after[..end];
        if block.contains("<ownershipDocument") {
            return Ok(strip_xml_declaration(block));
        }
        rest = &after[end..];
    }
    if body.contains("<ownershipDocument") {
        return Ok(strip_xml_declaration(body));
    }
    Err(ParseError::Malformed("no ownership document found".into()))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

/// Trimmed, non-empty text at the end of a child path.
fn text_at<'a>(node: Node<'a, '_>, path: &[&str]) -> Option<&'a str> {
    let mut current = node;
    for name in path {
        current = child(current, name)?;
    }
    current.text().map(str::trim).filter(|t| !t.is_empty())
}

/// Dates may carry a trailing zone offset ("2024-03-05-05:00").
fn parse_date(s: &str) -> Result<NaiveDate, ParseError> {
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| ParseError::Malformed(format!("bad date `{s}`")))
}

fn parse_number(s: &str) -> Result<f64, ParseError> {
    s.replace(',', "")
        .parse::<f64>()
        .map_err(|_| ParseError::Malformed(format!("bad number `{s}`")))
}

fn normalize_ticker(s: &str) -> String {
    let t = s.trim().to_ascii_uppercase();
    match t.as_str() {
        "NONE" | "N/A" | "NA" => String::new(),
        _ => t,
    }
}
