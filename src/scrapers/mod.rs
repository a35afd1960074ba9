pub mod browser;
pub mod extract;
pub mod olx;
pub mod otodom;
pub mod pacing;
pub mod retry;
#[cfg(test)]
mod testing;
pub mod traits;
pub mod types;

pub use browser::{BrowserSession, ChromeSession, TabHandle};
pub use olx::{OlxListing, OlxOffer};
pub use otodom::{OtodomListing, OtodomOffer};
pub use pacing::PacingPolicy;
pub use traits::{ListingPageAdapter, OfferDetailExtractor, RecordSink, RetryBudget};
pub use types::SitesConfig;
