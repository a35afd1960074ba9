use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Source site of a rental offer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    Olx,
    Otodom,
}

impl Site {
    pub const ALL: [Site; 2] = [Site::Olx, Site::Otodom];

    pub fn name(&self) -> &'static str {
        match self {
            Site::Olx => "OLX",
            Site::Otodom => "Otodom",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Search radius around the queried location, in kilometers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u32", into = "u32")]
pub enum AreaRadius {
    Km0,
    Km5,
    Km10,
    Km15,
    Km25,
    Km50,
    Km75,
}

impl AreaRadius {
    pub const VALID_KM: [u32; 7] = [0, 5, 10, 15, 25, 50, 75];

    pub fn from_km(km: u32) -> Result<Self> {
        match km {
            0 => Ok(Self::Km0),
            5 => Ok(Self::Km5),
            10 => Ok(Self::Km10),
            15 => Ok(Self::Km15),
            25 => Ok(Self::Km25),
            50 => Ok(Self::Km50),
            75 => Ok(Self::Km75),
            other => Err(ScrapeError::InvalidRadius(other)),
        }
    }

    pub fn km(&self) -> u32 {
        match self {
            Self::Km0 => 0,
            Self::Km5 => 5,
            Self::Km10 => 10,
            Self::Km15 => 15,
            Self::Km25 => 25,
            Self::Km50 => 50,
            Self::Km75 => 75,
        }
    }

    /// Position of this radius in the site's distance dropdown
    pub fn option_index(&self) -> usize {
        match self {
            Self::Km0 => 0,
            Self::Km5 => 1,
            Self::Km10 => 2,
            Self::Km15 => 3,
            Self::Km25 => 4,
            Self::Km50 => 5,
            Self::Km75 => 6,
        }
    }
}

impl TryFrom<u32> for AreaRadius {
    type Error = ScrapeError;

    fn try_from(km: u32) -> Result<Self> {
        Self::from_km(km)
    }
}

impl From<AreaRadius> for u32 {
    fn from(radius: AreaRadius) -> u32 {
        radius.km()
    }
}

/// What to search for during one scrape run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub location_query: String,
    pub area_radius: AreaRadius,
    pub offer_cap: u32,
}

impl SearchCriteria {
    pub fn new(
        location_query: impl Into<String>,
        area_radius: AreaRadius,
        offer_cap: u32,
    ) -> Result<Self> {
        if offer_cap == 0 {
            return Err(ScrapeError::InvalidOfferCap);
        }

        Ok(Self {
            location_query: location_query.into(),
            area_radius,
            offer_cap,
        })
    }
}

/// Absolute URL uniquely identifying one offer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferIdentifier(String);

impl OfferIdentifier {
    /// Resolve a raw card link against the site's domain.
    ///
    /// Relative and absolute links both go through URL serialization, so
    /// every spelling of one offer yields the same percent-encoded
    /// identifier and normalizing twice is a no-op.
    pub fn normalize(raw: &str, domain: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ScrapeError::InvalidLink(raw.to_string()));
        }

        let base = Url::parse(domain).map_err(|_| ScrapeError::InvalidLink(domain.to_string()))?;
        let joined = base
            .join(raw)
            .map_err(|_| ScrapeError::InvalidLink(raw.to_string()))?;

        Ok(Self(joined.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host part of the URL, if it parses
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.0)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

impl fmt::Display for OfferIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base URLs of the supported sites
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SiteDomains {
    pub olx: String,
    pub otodom: String,
}

impl Default for SiteDomains {
    fn default() -> Self {
        Self {
            olx: "https://www.olx.pl".to_string(),
            otodom: "https://www.otodom.pl".to_string(),
        }
    }
}

impl SiteDomains {
    pub fn domain(&self, site: Site) -> &str {
        match site {
            Site::Olx => &self.olx,
            Site::Otodom => &self.otodom,
        }
    }

    /// Which site an identifier belongs to, judged by its host
    pub fn site_of(&self, id: &OfferIdentifier) -> Option<Site> {
        let host = id.host()?;
        Site::ALL
            .into_iter()
            .find(|site| host_matches(&host, self.domain(*site)))
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    let Some(base) = Url::parse(domain)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
    else {
        return false;
    };

    let host = host.strip_prefix("www.").unwrap_or(host);
    let base = base.strip_prefix("www.").unwrap_or(&base);

    host == base || host.ends_with(&format!(".{}", base))
}

/// Flat record of raw string fields pulled from one offer page.
///
/// Field order is the extraction order and always starts with `link`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferRecord {
    site: Site,
    fields: Vec<(String, Option<String>)>,
}

impl OfferRecord {
    pub fn new<I, K>(site: Site, link: &OfferIdentifier, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        let mut all = vec![("link".to_string(), Some(link.as_str().to_string()))];
        all.extend(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .filter(|(name, _)| name != "link"),
        );

        Self { site, fields: all }
    }

    pub fn site(&self) -> Site {
        self.site
    }

    pub fn link(&self) -> &str {
        self.fields[0].1.as_deref().unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = Option<&str>> {
        self.fields.iter().map(|(_, value)| value.as_deref())
    }
}
