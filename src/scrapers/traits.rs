use crate::error::Result;
use crate::models::{OfferIdentifier, OfferRecord, SearchCriteria, Site};
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::pacing::PacingPolicy;
use crate::session::SinkKey;
use scraper::Html;
use std::path::PathBuf;
use std::time::Duration;

/// Timeout and attempt budget for waits that refresh between attempts
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    pub timeout: Duration,
    pub max_retries: u32,
}

/// Turns search criteria into a sequence of listing pages and, per page,
/// a sequence of candidate offer links.
///
/// One implementation per site. Adding a site means implementing this and
/// `OfferDetailExtractor`; the orchestrator never looks at site identity
/// beyond `site()`.
pub trait ListingPageAdapter {
    fn site(&self) -> Site;

    /// First page to load for these criteria
    fn start_url(&self, criteria: &SearchCriteria) -> String;

    /// Apply location, radius and transaction filters on the loaded start page.
    ///
    /// A missing required control is a `SearchSetup` error.
    fn setup_search(
        &mut self,
        browser: &mut dyn BrowserSession,
        criteria: &SearchCriteria,
        pacing: &PacingPolicy,
    ) -> Result<()>;

    /// One-off adjustments made on the first listing page of a crawl
    fn prepare_listing(
        &mut self,
        _browser: &mut dyn BrowserSession,
        _pacing: &PacingPolicy,
    ) -> Result<()> {
        Ok(())
    }

    /// Wait until the listing grid has rendered; `false` when it never does
    fn await_listing(
        &mut self,
        browser: &mut dyn BrowserSession,
        budget: RetryBudget,
    ) -> Result<bool>;

    /// Raw (possibly relative) offer links in page order
    fn extract_candidate_links(&self, page: &Html) -> Result<Vec<String>>;

    fn has_more_pages(&mut self, browser: &mut dyn BrowserSession) -> Result<bool>;

    fn advance_page(&mut self, browser: &mut dyn BrowserSession) -> Result<()>;
}

/// Pulls a flat record out of an offer detail page already loaded in the
/// active tab
pub trait OfferDetailExtractor {
    fn site(&self) -> Site;

    /// Elements that must be present for the page to count as usable
    fn required_selectors(&self) -> Vec<&str>;

    /// `Ok(None)` when the required elements never appeared; partial
    /// records are never returned
    fn extract(
        &self,
        browser: &mut dyn BrowserSession,
        id: &OfferIdentifier,
        budget: RetryBudget,
    ) -> Result<Option<OfferRecord>>;
}

/// Append-only store for extracted records
pub trait RecordSink {
    fn append(&mut self, key: &SinkKey, record: &OfferRecord) -> Result<()>;

    /// Every location written so far
    fn locations(&self) -> Vec<PathBuf>;
}
