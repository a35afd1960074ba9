//! Error types for the scraper

use crate::models::Site;
use thiserror::Error;

/// Result type for scraper operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Error type for scraper operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Page did not finish loading in time
    #[error("Timed out loading {url}: {reason}")]
    NavigationTimeout { url: String, reason: String },

    /// Browser could not reach the URL
    #[error("Could not reach {url}: {reason}")]
    Connectivity { url: String, reason: String },

    /// Required element never appeared
    #[error("No element matching `{selector}` appeared in time")]
    ElementNotFound { selector: String },

    /// A search control was missing; the whole site crawl is abandoned
    #[error("Search setup on {site} failed while trying to {step}: {source}")]
    SearchSetup {
        site: Site,
        step: &'static str,
        #[source]
        source: Box<ScrapeError>,
    },

    /// Listing grid never rendered within the retry budget
    #[error("Listing page on {site} never finished loading: {url}")]
    ListingUnavailable { site: Site, url: String },

    /// Offer link outside every known site
    #[error("Unrecognized URL: {url}")]
    UnrecognizedDomain { url: String },

    /// Offer page loaded without its required fields (debug mode only)
    #[error("Failed to process offer URL: {url}")]
    OfferProcessing { url: String },

    #[error("Malformed offer link: {0:?}")]
    InvalidLink(String),

    #[error("No browser tab is active")]
    NoActiveTab,

    #[error("Unknown tab handle: {0}")]
    UnknownTab(String),

    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid area radius {0} km; expected one of 0, 5, 10, 15, 25, 50, 75")]
    InvalidRadius(u32),

    #[error("Offer cap must be a positive integer")]
    InvalidOfferCap,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Anything else reported by the browser backend
    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}

impl ScrapeError {
    /// Wrap an error raised while applying the search filters of `site`
    pub fn setup(site: Site, step: &'static str, source: ScrapeError) -> Self {
        ScrapeError::SearchSetup {
            site,
            step,
            source: Box::new(source),
        }
    }

    /// Element not rendered yet or page still loading; worth a refresh
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScrapeError::ElementNotFound { .. } | ScrapeError::NavigationTimeout { .. }
        )
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, ScrapeError::Connectivity { .. })
    }

    /// Whether this error ends the whole run rather than one offer or site.
    ///
    /// Debug mode turns every failure into a fatal one.
    pub fn is_fatal(&self, debug: bool) -> bool {
        if debug {
            return true;
        }

        matches!(
            self,
            ScrapeError::UnrecognizedDomain { .. }
                | ScrapeError::OfferProcessing { .. }
                | ScrapeError::Config(_)
                | ScrapeError::Io(_)
                | ScrapeError::Csv(_)
        )
    }
}
