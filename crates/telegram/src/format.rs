//! Plain-text rendering of candidate batches.
//!
//! Lengths are counted in UTF-16 code units because that is how the Bot API
//! measures its 4096 limit; emoji count as two.

use common::{CandidateRecord, OwnershipMetrics};

/// Telegram's per-message limit.
pub const TELEGRAM_MAX_LEN: usize = 4096;

const SEPARATOR: &str = "\n\n";

pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

pub fn header(strategy: &str, count: usize, part: Option<(usize, usize)>) -> String {
    let noun = if count == 1 { "candidate" } else { "candidates" };
    match part {
        Some((i, n)) => format!("🚨 {strategy}: {count} {noun} (part {i}/{n})"),
        None => format!("🚨 {strategy}: {count} {noun}"),
    }
}

pub fn no_candidates(strategy: &str) -> String {
    format!("😕 {strategy}: no candidates today")
}

pub fn failure(strategy: &str, reason: &str) -> String {
    format!("💥 {strategy} failed: {reason}")
}

/// One candidate as a self-contained block of lines.
pub fn candidate_block(c: &CandidateRecord) -> String {
    let r = &c.record;
    let ticker = if r.ticker.is_empty() { "?" } else { r.ticker.as_str() };
    let mut lines = vec![
        format!("#{} {} ({})", c.rank, ticker, r.issuer_name),
        format!("👤 {}, {}", r.insider_name, r.insider_role),
        format!(
            "🧮 +{} shares @ ${:.2} = ${}",
            group_thousands(r.shares),
            r.price,
            group_thousands(r.value)
        ),
        format!("📅 {} code {}", r.transaction_date, r.transaction_code),
    ];
    if let Some(m) = &c.ownership {
        lines.push(ownership_line(m));
        lines.push(format!(
            "⭐ Structure {}/3  🔥 Squeeze {}/4",
            m.structure_score, m.squeeze_score
        ));
    }
    lines.push(format!("🔗 {}", r.source_url));
    if !r.ticker.is_empty() {
        lines.push(format!("🔗 https://fintel.io/s/us/{}", r.ticker.to_ascii_lowercase()));
    }
    lines.join("\n")
}

fn ownership_line(m: &OwnershipMetrics) -> String {
    let show = |v: Option<f64>, unit: &str| match v {
        Some(v) => format!("{v}{unit}"),
        None => "N/A".to_string(),
    };
    format!(
        "🏦 Insider {}  Inst {}  Float {}  SI {}",
        show(m.insider_pct, "%"),
        show(m.institutional_pct, "%"),
        show(m.float_m, "M"),
        show(m.short_interest_pct, "%"),
    )
}

/// Whole-number rendering with comma separators: 1234567.8 -> "1,234,568".
fn group_thousands(v: f64) -> String {
    let digits = format!("{:.0}", v.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if v < 0.0 && digits != "0" {
        out.insert(0, '-');
    }
    out
}

/// Split `text` into pieces of at most `max_len` UTF-16 units, never inside
/// a character.
pub fn split_at_chars(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(2);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for ch in text.chars() {
        let w = ch.len_utf16();
        if current_len + w > max_len {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(ch);
        current_len += w;
    }
    if !current.is_empty() || pieces.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Render a batch into ordered messages, each at most `max_len` UTF-16 units.
///
/// Blocks are packed greedily; a block that does not fit even on its own is
/// cut at character boundaries. When more than one message is needed each
/// header carries "part i/n".
pub fn render_batch(strategy: &str, candidates: &[CandidateRecord], max_len: usize) -> Vec<String> {
    if candidates.is_empty() {
        return split_at_chars(&no_candidates(strategy), max_len);
    }
    let count = candidates.len();
    let blocks: Vec<String> = candidates.iter().map(candidate_block).collect();

    let single = format!("{}{SEPARATOR}{}", header(strategy, count, None), blocks.join(SEPARATOR));
    if utf16_len(&single) <= max_len {
        return vec![single];
    }

    // Every part holds at least one chunk, so the chunk count bounds n and
    // reserving for it keeps every real header within budget.
    let mut reserve = blocks.len();
    loop {
        let widest = utf16_len(&header(strategy, count, Some((reserve, reserve))));
        let budget = max_len.saturating_sub(widest + utf16_len(SEPARATOR)).max(2);
        let chunks: Vec<String> = blocks
            .iter()
            .flat_map(|b| {
                if utf16_len(b) > budget {
                    split_at_chars(b, budget)
                } else {
                    vec![b.clone()]
                }
            })
            .collect();
        if chunks.len() > reserve && digits(chunks.len()) > digits(reserve) {
            reserve = chunks.len();
            continue;
        }
        let bodies = pack(chunks, budget);
        let n = bodies.len();
        return bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| format!("{}{SEPARATOR}{body}", header(strategy, count, Some((i + 1, n)))))
            .collect();
    }
}

fn pack(chunks: Vec<String>, budget: usize) -> Vec<String> {
    let mut bodies: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for chunk in chunks {
        let len = utf16_len(&chunk);
        if current.is_empty() {
            current = chunk;
            current_len = len;
        } else if current_len + utf16_len(SEPARATOR) + len <= budget {
            current.push_str(SEPARATOR);
            current.push_str(&chunk);
            current_len += utf16_len(SEPARATOR) + len;
        } else {
            bodies.push(std::mem::replace(&mut current, chunk));
            current_len = len;
        }
    }
    if !current.is_empty() {
        bodies.push(current);
    }
    bodies
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::{FilingRecord, SeniorityTier};

    pub(crate) fn candidate(rank: usize, ticker: &str, value: f64) -> CandidateRecord {
        CandidateRecord {
            record: FilingRecord {
                issuer_cik: "0000001".into(),
                issuer_name: format!("{ticker} Corp"),
                ticker: ticker.into(),
                insider_name: "Doe Jane".into(),
                insider_role: "Chief Executive Officer".into(),
                seniority: SeniorityTier::ChiefExecutive,
                transaction_date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
                transaction_code: "P".into(),
                shares: value / 10.0,
                price: 10.0,
                value,
                source_url: "https://www.sec.gov/Archives/edgar/data/1/x.txt".into(),
            },
            rank,
            score: value,
            reason: "CEO open-market purchase".into(),
            ownership: None,
        }
    }

    #[test]
    fn block_shows_the_essentials() {
        let block = candidate_block(&candidate(1, "ACME", 1_234_567.0));
        assert!(block.starts_with("#1 ACME (ACME Corp)"));
        assert!(block.contains("= $1,234,567"));
        assert!(block.contains("+123,457 shares @ $10.00"));
        assert!(block.contains("https://fintel.io/s/us/acme"));
        assert!(!block.contains("Structure"));
    }

    #[test]
    fn block_includes_ownership_when_enriched() {
        let mut c = candidate(1, "ACME", 1000.0);
        c.ownership = Some(OwnershipMetrics {
            insider_pct: Some(64.5),
            structure_score: 1,
            ..OwnershipMetrics::default()
        });
        let block = candidate_block(&c);
        assert!(block.contains("Insider 64.5%"));
        assert!(block.contains("Inst N/A"));
        assert!(block.contains("Structure 1/3"));
    }

    #[test]
    fn small_batch_is_one_message_without_part_marker() {
        let batch = vec![candidate(1, "AAA", 2e6), candidate(2, "BBB", 5e5)];
        let msgs = render_batch("insider_ceo", &batch, TELEGRAM_MAX_LEN);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].starts_with("🚨 insider_ceo: 2 candidates\n\n#1 AAA"));
        assert!(!msgs[0].contains("part"));
    }

    #[test]
    fn empty_batch_has_its_own_message() {
        let msgs = render_batch("insider_ceo", &[], TELEGRAM_MAX_LEN);
        assert_eq!(msgs, vec!["😕 insider_ceo: no candidates today".to_string()]);
    }

    #[test]
    fn large_batch_is_split_in_order_within_limit() {
        let batch: Vec<_> = (1..=60).map(|i| candidate(i, &format!("T{i}"), 1e6)).collect();
        let msgs = render_batch("insider_ceo", &batch, 1000);

        assert!(msgs.len() > 1);
        let n = msgs.len();
        for (i, m) in msgs.iter().enumerate() {
            assert!(utf16_len(m) <= 1000, "message {i} is {} long", utf16_len(m));
            assert!(m.contains(&format!("(part {}/{n})", i + 1)));
        }
        // Every block appears exactly once, in rank order.
        let joined = msgs.join("\n");
        let mut last = 0;
        for i in 1..=60 {
            let at = joined.find(&format!("#{i} T{i} ")).unwrap();
            assert!(at >= last);
            last = at;
        }
    }

    #[test]
    fn oversized_block_is_cut_not_truncated() {
        let mut c = candidate(1, "ACME", 1e6);
        c.record.insider_role = "q".repeat(500);
        let msgs = render_batch("s", &[c.clone()], 200);

        assert!(msgs.len() > 1);
        assert!(msgs.iter().all(|m| utf16_len(m) <= 200));
        let total_q: usize = msgs.iter().map(|m| m.matches('q').count()).sum();
        assert_eq!(total_q, 500);
    }

    #[test]
    fn splitting_respects_surrogate_pairs() {
        let text = "🚀".repeat(5);
        let pieces = split_at_chars(&text, 3);
        assert!(pieces.iter().all(|p| utf16_len(p) <= 3));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.0), "999");
        assert_eq!(group_thousands(1000.0), "1,000");
        assert_eq!(group_thousands(2_000_000.4), "2,000,000");
    }
}
