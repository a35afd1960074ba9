use crate::error::{Result, ScrapeError};
use crate::models::{AreaRadius, OfferIdentifier, OfferRecord, SearchCriteria, Site};
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::extract::{self, fields_in, selector};
use crate::scrapers::pacing::PacingPolicy;
use crate::scrapers::traits::{ListingPageAdapter, OfferDetailExtractor, RetryBudget};
use crate::scrapers::types::OtodomSelectors;
use scraper::Html;
use std::time::Duration;
use tracing::{debug, info};

fn in_step(step: &'static str, result: Result<()>) -> Result<()> {
    result.map_err(|err| ScrapeError::setup(Site::Otodom, step, err))
}

/// Otodom search. Filters are applied through the search form on the
/// landing page.
pub struct OtodomListing {
    selectors: OtodomSelectors,
    domain: String,
    wait_timeout: Duration,
}

impl OtodomListing {
    pub fn new(
        selectors: OtodomSelectors,
        domain: impl Into<String>,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            selectors,
            domain: domain.into(),
            wait_timeout,
        }
    }

    fn select_for_rent(&self, browser: &mut dyn BrowserSession) -> Result<()> {
        let s = &self.selectors;
        browser.wait_for(&s.transaction_type, self.wait_timeout)?;
        browser.click(&s.transaction_type)?;
        browser.wait_for(&s.for_rent, self.wait_timeout)?;
        browser.click(&s.for_rent)
    }

    fn select_radius(&self, browser: &mut dyn BrowserSession, radius: AreaRadius) -> Result<()> {
        let s = &self.selectors;
        browser.wait_for(&s.distance_radius, self.wait_timeout)?;
        browser.click(&s.distance_radius)?;
        browser.wait_for(&s.distance_radius_options, self.wait_timeout)?;
        browser.click_nth(&s.distance_radius_option, radius.option_index())
    }

    fn write_location(
        &self,
        browser: &mut dyn BrowserSession,
        query: &str,
        pacing: &PacingPolicy,
    ) -> Result<()> {
        let s = &self.selectors;
        browser.wait_for(&s.location_button, self.wait_timeout)?;
        browser.click(&s.location_button)?;

        pacing.delay(0.2, 0.4);

        browser.wait_for(&s.location_input, self.wait_timeout)?;
        browser.type_text(&s.location_input, query)?;

        // First suggestion is the closest match
        browser.wait_for(&s.location_suggestion, self.wait_timeout)?;
        browser.click_nth(&s.location_suggestion, 0)
    }

    fn show_most_offers_per_page(&self, browser: &mut dyn BrowserSession) -> Result<()> {
        let s = &self.selectors;
        browser.wait_for(&s.entries_per_page, self.wait_timeout)?;
        browser.click(&s.entries_per_page)?;
        browser.wait_for(&s.entries_per_page_list, self.wait_timeout)?;

        let options = browser.count(&s.entries_per_page_option)?;
        if options == 0 {
            return Err(ScrapeError::ElementNotFound {
                selector: s.entries_per_page_option.clone(),
            });
        }

        browser.click_nth(&s.entries_per_page_option, options - 1)
    }
}

impl ListingPageAdapter for OtodomListing {
    fn site(&self) -> Site {
        Site::Otodom
    }

    fn start_url(&self, _criteria: &SearchCriteria) -> String {
        self.domain.clone()
    }

    fn setup_search(
        &mut self,
        browser: &mut dyn BrowserSession,
        criteria: &SearchCriteria,
        pacing: &PacingPolicy,
    ) -> Result<()> {
        let s = &self.selectors;

        if browser.is_present(&s.cookies_banner, self.wait_timeout)? {
            pacing.delay(0.2, 0.4);
            in_step("accept cookies", browser.click(&s.accept_cookies))?;
        }

        pacing.delay(0.15, 0.2);
        in_step("select the rent transaction", self.select_for_rent(browser))?;

        pacing.delay(0.15, 0.4);
        in_step(
            "select the search radius",
            self.select_radius(browser, criteria.area_radius),
        )?;

        pacing.delay(0.3, 0.5);
        in_step(
            "enter the location",
            self.write_location(browser, &criteria.location_query, pacing),
        )?;

        pacing.delay(0.3, 0.5);
        in_step("submit the search", browser.press_enter())?;

        info!(
            "Otodom search set for {:?} within {} km",
            criteria.location_query,
            criteria.area_radius.km()
        );
        Ok(())
    }

    fn prepare_listing(
        &mut self,
        browser: &mut dyn BrowserSession,
        pacing: &PacingPolicy,
    ) -> Result<()> {
        pacing.delay(0.3, 0.5);
        in_step(
            "show the most offers per page",
            self.show_most_offers_per_page(browser),
        )?;
        pacing.delay(0.2, 0.4);
        Ok(())
    }

    fn await_listing(
        &mut self,
        browser: &mut dyn BrowserSession,
        budget: RetryBudget,
    ) -> Result<bool> {
        let feed = [self.selectors.main_feed.as_str()];
        browser.wait_for_all(&feed, budget.timeout, budget.max_retries)
    }

    fn extract_candidate_links(&self, page: &Html) -> Result<Vec<String>> {
        let link_selector = selector(&self.selectors.listing_link)?;

        let mut links = Vec::new();
        for anchor in page.select(&link_selector) {
            match anchor.value().attr("href") {
                Some(href) => links.push(href.to_string()),
                None => debug!(
                    "Skipping Otodom listing item without href: {:?}",
                    extract::element_text(anchor).unwrap_or_default()
                ),
            }
        }

        debug!("Found {} offer links on Otodom page", links.len());
        Ok(links)
    }

    fn has_more_pages(&mut self, browser: &mut dyn BrowserSession) -> Result<bool> {
        browser.is_present(&self.selectors.next_page, self.wait_timeout)
    }

    fn advance_page(&mut self, browser: &mut dyn BrowserSession) -> Result<()> {
        browser.click(&self.selectors.next_page)
    }
}

/// Otodom offer detail page
pub struct OtodomOffer {
    selectors: OtodomSelectors,
}

impl OtodomOffer {
    pub fn new(selectors: OtodomSelectors) -> Self {
        Self { selectors }
    }

    pub fn parse_offer(&self, page: &Html, id: &OfferIdentifier) -> Result<OfferRecord> {
        let s = &self.selectors;

        let mut fields = vec![
            ("title".to_string(), extract::text_in_document(page, &s.title)?),
            ("location".to_string(), extract::text_in_document(page, &s.location)?),
            ("price".to_string(), extract::text_in_document(page, &s.price)?),
            (
                "summary_description".to_string(),
                extract::text_in_document(page, &s.description)?,
            ),
        ];

        let top = extract::first(page, &s.top_information)?;
        fields.extend(fields_in(top, &s.top_fields)?);

        let additional = extract::first(page, &s.additional_information)?;
        fields.extend(fields_in(additional, &s.additional_fields)?);

        Ok(OfferRecord::new(Site::Otodom, id, fields))
    }
}

impl OfferDetailExtractor for OtodomOffer {
    fn site(&self) -> Site {
        Site::Otodom
    }

    fn required_selectors(&self) -> Vec<&str> {
        let s = &self.selectors;
        vec![
            s.top_information.as_str(),
            s.additional_information.as_str(),
            s.title.as_str(),
            s.location.as_str(),
            s.price.as_str(),
            s.description.as_str(),
        ]
    }

    fn extract(
        &self,
        browser: &mut dyn BrowserSession,
        id: &OfferIdentifier,
        budget: RetryBudget,
    ) -> Result<Option<OfferRecord>> {
        let required = self.required_selectors();
        if !browser.wait_for_all(&required, budget.timeout, budget.max_retries)? {
            return Ok(None);
        }

        let page = browser.read_markup()?;
        self.parse_offer(&page, id).map(Some)
    }
}
