use crate::error::{Result, ScrapeError};
use crate::models::{OfferIdentifier, OfferRecord, SearchCriteria, Site};
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::extract::{self, fields_in, selector};
use crate::scrapers::pacing::PacingPolicy;
use crate::scrapers::traits::{ListingPageAdapter, OfferDetailExtractor, RetryBudget};
use crate::scrapers::types::OlxSelectors;
use scraper::Html;
use std::time::Duration;
use tracing::{debug, info};

/// Listing detail items, in the order OLX renders them
const DETAIL_FIELDS: [&str; 7] = [
    "ownership",
    "floor_level",
    "is_furnished",
    "building_type",
    "square_meters",
    "number_of_rooms",
    "rent",
];

/// Location as it appears in OLX search paths: spaces become dashes and
/// everything else is percent-encoded
pub fn location_slug(location: &str) -> String {
    urlencoding::encode(&location.trim().replace(' ', "-")).into_owned()
}

/// OLX search results. Filters live in the URL, so setup is only the
/// cookie banner.
pub struct OlxListing {
    selectors: OlxSelectors,
    domain: String,
    category: String,
    wait_timeout: Duration,
}

impl OlxListing {
    pub fn new(
        selectors: OlxSelectors,
        domain: impl Into<String>,
        category: impl Into<String>,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            selectors,
            domain: domain.into(),
            category: category.into(),
            wait_timeout,
        }
    }
}

impl ListingPageAdapter for OlxListing {
    fn site(&self) -> Site {
        Site::Olx
    }

    fn start_url(&self, criteria: &SearchCriteria) -> String {
        let mut url = format!(
            "{}/{}/q-{}/",
            self.domain.trim_end_matches('/'),
            self.category.trim_matches('/'),
            location_slug(&criteria.location_query)
        );

        let km = criteria.area_radius.km();
        if km > 0 {
            url.push_str(&format!("?search%5Bdist%5D={}", km));
        }

        url
    }

    fn setup_search(
        &mut self,
        browser: &mut dyn BrowserSession,
        _criteria: &SearchCriteria,
        pacing: &PacingPolicy,
    ) -> Result<()> {
        if browser.is_present(&self.selectors.accept_cookies, self.wait_timeout)? {
            browser
                .click(&self.selectors.accept_cookies)
                .map_err(|err| ScrapeError::setup(Site::Olx, "accept cookies", err))?;
            debug!("Accepted OLX cookies");
        } else {
            debug!("No OLX cookie banner shown");
        }

        pacing.delay(0.2, 0.4);
        Ok(())
    }

    fn await_listing(
        &mut self,
        browser: &mut dyn BrowserSession,
        budget: RetryBudget,
    ) -> Result<bool> {
        let grid = [self.selectors.listing_grid.as_str()];
        browser.wait_for_all(&grid, budget.timeout, budget.max_retries)
    }

    fn extract_candidate_links(&self, page: &Html) -> Result<Vec<String>> {
        // Without the flat marker OLX is showing suggestions, not results
        if extract::first(page, &self.selectors.flat_offer_icon)?.is_none() {
            info!("No flat offers on this OLX page");
            return Ok(Vec::new());
        }

        let Some(grid) = extract::first(page, &self.selectors.listing_grid)? else {
            return Ok(Vec::new());
        };

        let card_selector = selector(&self.selectors.offer_card)?;
        let link_selector = selector(&self.selectors.card_link)?;

        let mut links = Vec::new();
        for card in grid.select(&card_selector) {
            match card
                .select(&link_selector)
                .next()
                .and_then(|anchor| anchor.value().attr("href"))
            {
                Some(href) => links.push(href.to_string()),
                None => debug!(
                    "No link found in the offer with id={}",
                    card.value().attr("id").unwrap_or("Unknown")
                ),
            }
        }

        debug!("Found {} offer links on OLX page", links.len());
        Ok(links)
    }

    fn has_more_pages(&mut self, browser: &mut dyn BrowserSession) -> Result<bool> {
        Ok(browser.count(&self.selectors.next_page)? > 0)
    }

    fn advance_page(&mut self, browser: &mut dyn BrowserSession) -> Result<()> {
        browser.wait_for(&self.selectors.next_page, self.wait_timeout)?;
        browser.click(&self.selectors.next_page)
    }
}

/// OLX offer detail page
pub struct OlxOffer {
    selectors: OlxSelectors,
}

impl OlxOffer {
    pub fn new(selectors: OlxSelectors) -> Self {
        Self { selectors }
    }

    pub fn parse_offer(&self, page: &Html, id: &OfferIdentifier) -> Result<OfferRecord> {
        let s = &self.selectors;
        let main = extract::first(page, &s.main)?;

        let header = [
            ("title".to_string(), s.title.clone()),
            ("price".to_string(), s.price.clone()),
            ("summary_description".to_string(), s.description.clone()),
        ];
        let mut fields = fields_in(main, &header)?;

        fields.push(("date".to_string(), extract::text_in_document(page, &s.posted_at)?));

        let location = extract::first(page, &s.location_image)?
            .and_then(|image| image.value().attr("alt"))
            .map(|alt| alt.trim().to_string())
            .filter(|alt| !alt.is_empty());
        fields.push(("location".to_string(), location));

        let details: Vec<Option<String>> = match main {
            Some(main) => {
                let detail_selector = selector(&s.listing_details)?;
                main.select(&detail_selector).map(extract::element_text).collect()
            }
            None => Vec::new(),
        };

        for (index, name) in DETAIL_FIELDS.iter().enumerate() {
            let value = details.get(index).cloned().flatten();
            fields.push((name.to_string(), value));
        }

        Ok(OfferRecord::new(Site::Olx, id, fields))
    }
}

impl OfferDetailExtractor for OlxOffer {
    fn site(&self) -> Site {
        Site::Olx
    }

    fn required_selectors(&self) -> Vec<&str> {
        vec![
            self.selectors.main.as_str(),
            self.selectors.title.as_str(),
            self.selectors.price.as_str(),
            self.selectors.location_image.as_str(),
            self.selectors.description.as_str(),
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
