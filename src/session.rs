use crate::models::{OfferIdentifier, SearchCriteria};
use chrono::{DateTime, Local};
use std::collections::HashSet;

/// Offers already sunk during this run, shared by every site
#[derive(Debug, Default)]
pub struct OfferDeduplicator {
    seen: HashSet<OfferIdentifier>,
}

impl OfferDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &OfferIdentifier) -> bool {
        self.seen.contains(id)
    }

    pub fn add(&mut self, id: OfferIdentifier) {
        self.seen.insert(id);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Count of sunk offers, shared by every site
#[derive(Debug, Default)]
pub struct QuotaTracker {
    count: u32,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn increment(&mut self) {
        self.count += 1;
    }

    pub fn is_exhausted(&self, cap: u32) -> bool {
        self.count >= cap
    }
}

/// Run-scoped state, created when a scrape starts and dropped when it ends
#[derive(Debug)]
pub struct ScrapeSession {
    pub started_at: DateTime<Local>,
    pub criteria: SearchCriteria,
    pub seen: OfferDeduplicator,
    pub quota: QuotaTracker,
}

impl ScrapeSession {
    pub fn new(criteria: SearchCriteria) -> Self {
        Self {
            started_at: Local::now(),
            criteria,
            seen: OfferDeduplicator::new(),
            quota: QuotaTracker::new(),
        }
    }

    /// Timestamp used to name this run's output directory
    pub fn timestamp(&self) -> String {
        self.started_at.format("%Y_%m_%d_%H_%M_%S").to_string()
    }

    pub fn sink_key(&self) -> SinkKey {
        SinkKey {
            timestamp: self.timestamp(),
            location_query: self.criteria.location_query.clone(),
        }
    }

    pub fn quota_reached(&self) -> bool {
        self.quota.is_exhausted(self.criteria.offer_cap)
    }

    pub fn progress(&self) -> u32 {
        self.quota.count()
    }
}

/// Identifies where a run's records are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkKey {
    pub timestamp: String,
    pub location_query: String,
}
