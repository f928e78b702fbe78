use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use common::{
    CandidateRecord, DateWindow, Error, FetchBatch, FilingRecord, OwnershipMetrics, ParseError,
    RawFiling, Result, RunError,
};
use edgar::{parse_filing, EdgarClient, EdgarSettings, FetchSettings, Fetcher, FilingSource};
use fintel::{FintelClient, FintelSettings};
use selector::RuleSet;

use crate::config::InsiderCeoSettings;
use crate::context::RunContext;
use crate::Strategy;

/// Open-market purchases by chief executives, ranked by size and optionally
/// enriched with Fintel ownership structure.
pub struct InsiderCeo {
    settings: InsiderCeoSettings,
    fetcher: Fetcher,
    fintel: Option<FintelClient>,
}

impl InsiderCeo {
    pub const NAME: &'static str = "insider_ceo";

    pub fn new(
        settings: InsiderCeoSettings,
        source: Arc<dyn FilingSource>,
        fintel: Option<FintelClient>,
    ) -> Self {
        let fetcher = Fetcher::new(
            source,
            FetchSettings {
                max_attempts: settings.max_attempts,
                retry_delay: Duration::from_millis(settings.request_delay_ms),
                max_filings: settings.max_filings,
            },
        );
        Self {
            settings,
            fetcher,
            fintel,
        }
    }

    /// Registry constructor: live EDGAR client, Fintel when enabled.
    pub fn build(ctx: &RunContext) -> Result<Box<dyn Strategy>> {
        let settings = ctx.settings.insider_ceo.clone();
        let timeout = Duration::from_secs(settings.request_timeout_secs);

        let edgar = EdgarClient::new(EdgarSettings {
            source: settings.source,
            user_agent: ctx.config.sec_user_agent.clone(),
            request_timeout: timeout,
            request_delay: Duration::from_millis(settings.request_delay_ms),
            cache_dir: Some(ctx.config.cache_dir.clone()),
            feed_max_pages: settings.feed_max_pages,
        })?;

        let fintel = if settings.enrich {
            let client = FintelClient::new(&FintelSettings {
                user_agent: settings.fintel_user_agent.clone(),
                request_timeout: timeout,
                request_delay: Duration::from_millis(settings.fintel_delay_ms),
            })
            .map_err(|e| Error::Http(e.to_string()))?;
            Some(client)
        } else {
            None
        };

        info!(
            source = %settings.source,
            enrich = settings.enrich,
            min_value = settings.rules.min_transaction_value,
            "insider_ceo configured"
        );
        Ok(Box::new(Self::new(settings, Arc::new(edgar), fintel)))
    }
}

#[async_trait]
impl Strategy for InsiderCeo {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn rules(&self) -> &RuleSet {
        &self.settings.rules
    }

    fn max_message_len(&self) -> usize {
        self.settings.max_message_len
    }

    async fn fetch(&self, window: DateWindow) -> FetchBatch {
        self.fetcher.fetch(window).await
    }

    fn parse(&self, raw: &RawFiling) -> std::result::Result<Vec<FilingRecord>, ParseError> {
        parse_filing(raw)
    }

    /// One Fintel lookup per distinct ticker; a failed lookup leaves the
    /// candidate without ownership data.
    async fn enrich(&self, candidates: &mut [CandidateRecord]) -> Vec<RunError> {
        let Some(fintel) = &self.fintel else {
            return Vec::new();
        };
        let mut seen: HashMap<String, Option<OwnershipMetrics>> = HashMap::new();
        let mut errors = Vec::new();

        for c in candidates.iter_mut() {
            let ticker = c.record.ticker.clone();
            if ticker.is_empty() {
                debug!(issuer = %c.record.issuer_name, "No ticker, skipping enrichment");
                continue;
            }
            if let Some(cached) = seen.get(&ticker) {
                c.ownership = cached.clone();
                continue;
            }
            let metrics = match fintel.metrics(&ticker).await {
                Ok(m) => Some(m),
                Err(e) => {
                    errors.push(RunError::Enrichment(e.to_string()));
                    None
                }
            };
            c.ownership = metrics.clone();
            seen.insert(ticker, metrics);
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use common::{FetchError, FilingRef, SeniorityTier};
    use edgar::Listing;

    const FORM4: &str = r#"<?xml version="1.0"?>
<ownershipDocument>
  <documentType>4</documentType>
  <issuer>
    <issuerCik>0000320193</issuerCik>
    <issuerName>Acme Inc</issuerName>
    <issuerTradingSymbol>acme</issuerTradingSymbol>
  </issuer>
  <reportingOwner>
    <reportingOwnerId><rptOwnerName>Doe Jane</rptOwnerName></reportingOwnerId>
    <reportingOwnerRelationship>
      <isOfficer>1</isOfficer>
      <officerTitle>Chief Executive Officer</officerTitle>
    </reportingOwnerRelationship>
  </reportingOwner>
  <nonDerivativeTable>
    <nonDerivativeTransaction>
      <transactionDate><value>2024-03-06</value></transactionDate>
      <transactionCoding><transactionCode>P</transactionCode></transactionCoding>
      <transactionAmounts>
        <transactionShares><value>20000</value></transactionShares>
        <transactionPricePerShare><value>12.50</value></transactionPricePerShare>
      </transactionAmounts>
    </nonDerivativeTransaction>
  </nonDerivativeTable>
</ownershipDocument>"#;

    struct OneFiling;

    #[async_trait]
    impl FilingSource for OneFiling {
        fn name(&self) -> &str {
            "one"
        }

        async fn list(&self, _window: &DateWindow) -> Listing {
            Listing {
                refs: vec![FilingRef {
                    accession: "0000000001-24-000001".into(),
                    company: "Acme Inc".into(),
                    url: "https://example.test/a.txt".into(),
                }],
                errors: Vec::new(),
            }
        }

        async fn download(&self, filing: &FilingRef) -> std::result::Result<RawFiling, FetchError> {
            Ok(RawFiling {
                accession: filing.accession.clone(),
                source_url: filing.url.clone(),
                retrieved_at: Utc::now(),
                body: FORM4.to_string(),
            })
        }
    }

    fn settings(enrich: bool) -> InsiderCeoSettings {
        InsiderCeoSettings {
            enrich,
            request_delay_ms: 0,
            ..InsiderCeoSettings::default()
        }
    }

    #[test]
    fn defaults_target_ceo_purchases() {
        let s = InsiderCeoSettings::default();
        assert_eq!(s.rules.min_seniority, SeniorityTier::ChiefExecutive);
        assert_eq!(s.rules.transaction_codes, vec!["P".to_string()]);
        assert_eq!(s.rules.min_transaction_value, 5_000.0);
        assert_eq!(s.rules.lookback_days, 3);
        assert_eq!(s.rules.top_n, Some(20));
        assert!(s.enrich);
        assert!(!s.fintel_user_agent.contains('@'), "no SEC contact details");
    }

    #[tokio::test]
    async fn fetch_parse_select_pipeline() {
        let strategy = InsiderCeo::new(settings(false), Arc::new(OneFiling), None);
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();

        let batch = strategy.fetch(DateWindow::ending_on(day, 3)).await;
        assert_eq!(batch.filings.len(), 1);

        let records = strategy.parse(&batch.filings[0]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ticker, "ACME");
        assert_eq!(records[0].value, 250_000.0);

        let candidates = strategy.select(&records, day).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].rank, 1);
    }

    #[tokio::test]
    async fn enrichment_disabled_is_a_no_op() {
        let strategy = InsiderCeo::new(settings(false), Arc::new(OneFiling), None);
        let mut candidates = Vec::new();
        assert!(strategy.enrich(&mut candidates).await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_fintel_leaves_candidates_unenriched() {
        let fintel = FintelClient::new(&FintelSettings {
            user_agent: "test".into(),
            request_timeout: Duration::from_secs(1),
            request_delay: Duration::ZERO,
        })
        .unwrap()
        .with_base_url("http://127.0.0.1:9");
        let strategy = InsiderCeo::new(settings(true), Arc::new(OneFiling), Some(fintel));
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();

        let batch = strategy.fetch(DateWindow::ending_on(day, 3)).await;
        let records = strategy.parse(&batch.filings[0]).unwrap();
        let mut candidates = strategy.select(&[records[0].clone(), records[0].clone()], day).unwrap();

        let errors = strategy.enrich(&mut candidates).await;

        assert_eq!(errors.len(), 1, "one lookup per distinct ticker");
        assert!(matches!(errors[0], RunError::Enrichment(_)));
        assert!(candidates.iter().all(|c| c.ownership.is_none()));
    }
}
