pub mod client;
pub mod daily_index;
pub mod feed;
pub mod fetcher;
pub mod form4;
pub mod source;
pub mod throttle;

pub use client::{EdgarClient, EdgarSettings};
pub use fetcher::{FetchSettings, Fetcher};
pub use form4::parse_filing;
pub use source::{FilingSource, Listing};
pub use throttle::Throttle;

/// Drop a leading `<?xml ...?>` declaration. Input is already decoded text,
/// so a declared non-UTF-8 encoding is irrelevant.
pub(crate) fn strip_xml_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return trimmed[end + 2..].trim_start();
        }
    }
    trimmed
}
