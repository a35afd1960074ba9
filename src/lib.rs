//! Rental offer scraper for OLX and Otodom.
//!
//! A single browser session walks each site's search results, opens every
//! offer in its own tab and appends the extracted fields to per-site CSV
//! files. Offers are deduplicated and capped across all sites of a run.

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod scrapers;
pub mod session;
pub mod sink;

pub use config::Config;
pub use error::{Result, ScrapeError};
pub use models::{AreaRadius, OfferIdentifier, OfferRecord, SearchCriteria, Site, SiteDomains};
pub use orchestrator::{
    CrawlPolicy, DoneReason, RunReport, ScrapeOrchestrator, SiteReport, SiteState,
};
pub use session::{ScrapeSession, SinkKey};
pub use sink::{CsvRecordSink, ProgressSink};
