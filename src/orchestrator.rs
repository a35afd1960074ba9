//! Drives every site through search, listing pages and offer extraction.

use crate::error::{Result, ScrapeError};
use crate::models::{OfferIdentifier, SearchCriteria, Site, SiteDomains};
use crate::scrapers::browser::{BrowserSession, TabHandle};
use crate::scrapers::pacing::PacingPolicy;
use crate::scrapers::retry;
use crate::scrapers::traits::{ListingPageAdapter, OfferDetailExtractor, RecordSink, RetryBudget};
use crate::session::ScrapeSession;
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Failure handling and wait budget for a run
#[derive(Debug, Clone, Copy)]
pub struct CrawlPolicy {
    /// Stop the whole run on the first failure
    pub debug: bool,
    pub budget: RetryBudget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    QuotaReached,
    NoMoreOffers,
    PagesExhausted,
}

/// Where a site crawl is, or where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SiteState {
    NotStarted,
    Searching,
    Listing,
    Opening,
    Extracting,
    Closing,
    Advancing,
    Done(DoneReason),
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub site: Site,
    pub state: SiteState,
    pub pages: u32,
    pub records: u32,
    pub duplicates_skipped: u32,
    pub failed_offers: u32,
    pub abort_reason: Option<String>,
}

impl SiteReport {
    fn new(site: Site) -> Self {
        Self {
            site,
            state: SiteState::NotStarted,
            pages: 0,
            records: 0,
            duplicates_skipped: 0,
            failed_offers: 0,
            abort_reason: None,
        }
    }

    fn finish(&mut self, reason: DoneReason) {
        info!(site = %self.site, "Finished: {:?}", reason);
        self.state = SiteState::Done(reason);
    }

    fn abort(&mut self, err: &ScrapeError) {
        self.state = SiteState::Aborted;
        self.abort_reason = Some(err.to_string());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub criteria: SearchCriteria,
    /// Records sunk across all sites
    pub records: u32,
    pub sites: Vec<SiteReport>,
}

/// Sequential crawl over the registered sites, sharing one browser, one
/// sink and one quota.
///
/// Sites run in registration order. Each site goes through search setup,
/// then listing pages until the quota is met, the listing runs dry or
/// there is no next page. Every offer is opened in its own tab, which is
/// closed again before the next candidate.
pub struct ScrapeOrchestrator<'a> {
    browser: &'a mut dyn BrowserSession,
    sink: &'a mut dyn RecordSink,
    sites: Vec<Box<dyn ListingPageAdapter + 'a>>,
    extractors: Vec<Box<dyn OfferDetailExtractor + 'a>>,
    domains: SiteDomains,
    pacing: PacingPolicy,
    policy: CrawlPolicy,
}

impl<'a> ScrapeOrchestrator<'a> {
    pub fn new(
        browser: &'a mut dyn BrowserSession,
        sink: &'a mut dyn RecordSink,
        domains: SiteDomains,
        pacing: PacingPolicy,
        policy: CrawlPolicy,
    ) -> Self {
        Self {
            browser,
            sink,
            sites: Vec::new(),
            extractors: Vec::new(),
            domains,
            pacing,
            policy,
        }
    }

    /// Register a site to crawl
    pub fn with_site(mut self, listing: impl ListingPageAdapter + 'a) -> Self {
        self.sites.push(Box::new(listing));
        self
    }

    /// Register the extractor for offers hosted on `extractor.site()`.
    ///
    /// Offers are routed by their domain, so a listing on one site may
    /// link to offers extracted by another.
    pub fn with_extractor(mut self, extractor: impl OfferDetailExtractor + 'a) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn run(&mut self, criteria: SearchCriteria) -> Result<RunReport> {
        let mut session = ScrapeSession::new(criteria);
        info!(
            "Scraping {:?} within {} km, up to {} offers",
            session.criteria.location_query,
            session.criteria.area_radius.km(),
            session.criteria.offer_cap
        );

        let mut sites = std::mem::take(&mut self.sites);
        let mut reports = Vec::with_capacity(sites.len());
        let mut fatal = None;

        for adapter in sites.iter_mut() {
            let mut report = SiteReport::new(adapter.site());

            if let Err(err) = self.crawl_site(adapter.as_mut(), &mut session, &mut report) {
                report.abort(&err);

                if err.is_fatal(self.policy.debug) {
                    error!(site = %report.site, "Fatal error, stopping run: {}", err);
                    reports.push(report);
                    fatal = Some(err);
                    break;
                }

                error!(site = %report.site, "Abandoning site: {}", err);
            }

            reports.push(report);
        }

        self.sites = sites;
        if let Some(err) = fatal {
            return Err(err);
        }

        info!("Run finished with {} new offers", session.progress());

        Ok(RunReport {
            started_at: session.started_at,
            records: session.progress(),
            criteria: session.criteria,
            sites: reports,
        })
    }

    fn crawl_site(
        &mut self,
        adapter: &mut dyn ListingPageAdapter,
        session: &mut ScrapeSession,
        report: &mut SiteReport,
    ) -> Result<()> {
        let site = adapter.site();

        if session.quota_reached() {
            report.finish(DoneReason::QuotaReached);
            return Ok(());
        }

        report.state = SiteState::Searching;
        let start = adapter.start_url(&session.criteria);
        info!(site = %site, url = %start, "Starting search");

        self.pacing.pause();
        retry::navigate(&mut *self.browser, &start, self.policy.debug, &self.pacing)?;
        adapter.setup_search(&mut *self.browser, &session.criteria, &self.pacing)?;
        adapter.prepare_listing(&mut *self.browser, &self.pacing)?;

        loop {
            report.state = SiteState::Listing;

            if !adapter.await_listing(&mut *self.browser, self.policy.budget)? {
                return Err(ScrapeError::ListingUnavailable {
                    site,
                    url: self.browser.current_url().unwrap_or_default(),
                });
            }
            report.pages += 1;

            if session.quota_reached() {
                report.finish(DoneReason::QuotaReached);
                return Ok(());
            }

            let links = {
                let page = self.browser.read_markup()?;
                adapter.extract_candidate_links(&page)?
            };
            debug!(site = %site, page = report.pages, "{} candidate links", links.len());

            if links.is_empty() {
                report.finish(DoneReason::NoMoreOffers);
                return Ok(());
            }

            let listing_tab = self.browser.active_tab()?;

            for raw in links {
                if session.quota_reached() {
                    report.finish(DoneReason::QuotaReached);
                    return Ok(());
                }

                let id = match OfferIdentifier::normalize(&raw, self.domains.domain(site)) {
                    Ok(id) => id,
                    Err(err) => {
                        warn!(site = %site, "Skipping link: {}", err);
                        continue;
                    }
                };

                if session.seen.has(&id) {
                    debug!(url = %id, "Already saved, skipping");
                    report.duplicates_skipped += 1;
                    continue;
                }

                self.process_offer(&id, &listing_tab, session, report)?;
            }

            if session.quota_reached() {
                report.finish(DoneReason::QuotaReached);
                return Ok(());
            }

            if !adapter.has_more_pages(&mut *self.browser)? {
                report.finish(DoneReason::PagesExhausted);
                return Ok(());
            }

            report.state = SiteState::Advancing;
            self.pacing.pause();
            adapter.advance_page(&mut *self.browser)?;
        }
    }

    /// Open, extract and sink one offer, then return to the listing tab
    fn process_offer(
        &mut self,
        id: &OfferIdentifier,
        listing_tab: &TabHandle,
        session: &mut ScrapeSession,
        report: &mut SiteReport,
    ) -> Result<()> {
        let unrecognized = || ScrapeError::UnrecognizedDomain {
            url: id.to_string(),
        };
        let offer_site = self.domains.site_of(id).ok_or_else(unrecognized)?;
        let extractor = self
            .extractors
            .iter()
            .position(|extractor| extractor.site() == offer_site)
            .ok_or_else(unrecognized)?;

        report.state = SiteState::Opening;
        self.pacing.pause();
        let outcome = match self.open_offer(id) {
            Ok(()) => {
                report.state = SiteState::Extracting;
                self.pacing.pause();
                self.extractors[extractor].extract(&mut *self.browser, id, self.policy.budget)
            }
            Err(err) => Err(err),
        };

        report.state = SiteState::Closing;
        let returned = self.return_to_listing(listing_tab);

        match outcome {
            Ok(Some(record)) => {
                self.sink.append(&session.sink_key(), &record)?;
                session.seen.add(id.clone());
                session.quota.increment();
                report.records += 1;
                info!(
                    site = %offer_site,
                    "Saved offer {}/{}: {}",
                    session.progress(),
                    session.criteria.offer_cap,
                    id
                );
            }
            Ok(None) => {
                error!(url = %id, "Offer page never showed its required fields");
                if self.policy.debug {
                    return Err(ScrapeError::OfferProcessing { url: id.to_string() });
                }
                report.failed_offers += 1;
            }
            Err(err) if err.is_fatal(self.policy.debug) => return Err(err),
            Err(err) => {
                warn!(url = %id, "Skipping offer: {}", err);
                report.failed_offers += 1;
            }
        }

        returned
    }

    /// Open the offer in a new tab.
    ///
    /// A slow first load is not fatal to the offer: the tab is already open
    /// and extraction waits for the page with its own refresh budget.
    fn open_offer(&mut self, id: &OfferIdentifier) -> Result<()> {
        match self.browser.open_tab(id.as_str()) {
            Ok(tab) => {
                debug!(tab = %tab, "Opened {}", id);
                Ok(())
            }
            Err(err @ ScrapeError::NavigationTimeout { .. }) if !self.policy.debug => {
                warn!(url = %id, "Offer still loading, waiting for its fields: {}", err);
                Ok(())
            }
            Err(err) if err.is_connectivity() => retry::recover_connectivity(
                &mut *self.browser,
                id.as_str(),
                self.policy.debug,
                &self.pacing,
                err,
            ),
            Err(err) => Err(err),
        }
    }

    /// Close whatever offer tab is active and focus the listing again
    fn return_to_listing(&mut self, listing_tab: &TabHandle) -> Result<()> {
        match self.browser.active_tab() {
            Ok(active) if active == *listing_tab => {}
            Ok(_) => self.browser.close_tab()?,
            Err(ScrapeError::NoActiveTab) => {}
            Err(err) => return Err(err),
        }

        self.browser.switch_to(listing_tab)
    }
}
