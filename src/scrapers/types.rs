use crate::models::SiteDomains;
use serde::{Deserialize, Serialize};

/// Site addresses and page selectors.
///
/// The selectors track the live markup of each site and are expected to be
/// overridden from the config file whenever a site changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SitesConfig {
    pub domains: SiteDomains,
    /// Rental category path appended to the OLX domain
    pub olx_category: String,
    pub olx: OlxSelectors,
    pub otodom: OtodomSelectors,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            domains: SiteDomains::default(),
            olx_category: "nieruchomosci/mieszkania/wynajem/".to_string(),
            olx: OlxSelectors::default(),
            otodom: OtodomSelectors::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OlxSelectors {
    pub accept_cookies: String,
    /// Marker only present on real (non-suggested) flat offers
    pub flat_offer_icon: String,
    pub listing_grid: String,
    pub offer_card: String,
    pub card_link: String,
    pub next_page: String,

    pub main: String,
    pub title: String,
    pub price: String,
    pub description: String,
    pub posted_at: String,
    pub location_image: String,
    pub listing_details: String,
}

impl Default for OlxSelectors {
    fn default() -> Self {
        Self {
            accept_cookies: "button[id='onetrust-accept-btn-handler']".to_string(),
            flat_offer_icon: r#"[data-testid="blueprint-card-param-icon"]"#.to_string(),
            listing_grid: r#"[data-testid="listing-grid"]"#.to_string(),
            offer_card: r#"[data-testid="l-card"]"#.to_string(),
            card_link: "a".to_string(),
            next_page: r#"[data-testid="pagination-forward"]"#.to_string(),

            main: r#"[data-testid="main"]"#.to_string(),
            title: r#"[data-cy="ad_title"]"#.to_string(),
            price: r#"[data-testid="ad-price-container"]"#.to_string(),
            description: r#"[data-cy="ad_description"]"#.to_string(),
            posted_at: r#"[data-cy="ad-posted-at"]"#.to_string(),
            location_image: r#"img[src="/app/static/media/staticmap.65e20ad98.svg"]"#.to_string(),
            listing_details: "ul.css-sfcl1s > li".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OtodomSelectors {
    pub cookies_banner: String,
    pub accept_cookies: String,
    pub transaction_type: String,
    pub for_rent: String,
    pub distance_radius: String,
    pub distance_radius_options: String,
    pub distance_radius_option: String,
    pub location_button: String,
    pub location_input: String,
    pub location_suggestion: String,

    pub entries_per_page: String,
    pub entries_per_page_list: String,
    pub entries_per_page_option: String,
    pub main_feed: String,
    pub listing_link: String,
    pub next_page: String,

    pub top_information: String,
    pub additional_information: String,
    pub title: String,
    pub location: String,
    pub price: String,
    pub description: String,
    /// Fields read from the top information table, by field name
    pub top_fields: Vec<(String, String)>,
    /// Fields read from the additional information table, by field name
    pub additional_fields: Vec<(String, String)>,
}

impl Default for OtodomSelectors {
    fn default() -> Self {
        let field = |name: &str, testid: &str| {
            (name.to_string(), format!(r#"[data-testid="table-value-{}"]"#, testid))
        };

        Self {
            cookies_banner: "#onetrust-banner-sdk".to_string(),
            accept_cookies: "#onetrust-banner-sdk #onetrust-accept-btn-handler".to_string(),
            transaction_type: r#"[data-testid="form-wrapper"] [data-cy="search-form--field--transaction"]"#.to_string(),
            for_rent: "#react-select-transaction-option-0".to_string(),
            distance_radius: r#"[data-cy="search-form--field--distanceRadius"]"#.to_string(),
            distance_radius_options: "#react-select-distanceRadius-listbox".to_string(),
            distance_radius_option: r#"#react-select-distanceRadius-listbox div[id^="react-select-distanceRadius-option-"]"#.to_string(),
            location_button: r#"[data-testid="search.form.location.button"]"#.to_string(),
            location_input: "#location-picker-input".to_string(),
            location_suggestion: r#"[data-testid="search.form.location.container"] li[data-testid="suggestions-item"]"#.to_string(),

            entries_per_page: "div:has(> #react-select-entriesPerPage-live-region)".to_string(),
            entries_per_page_list: "#react-select-entriesPerPage-listbox".to_string(),
            entries_per_page_option: "#react-select-entriesPerPage-listbox div[id^='react-select-entriesPerPage-option-']".to_string(),
            main_feed: r#"[role="main"]"#.to_string(),
            listing_link: r#"a[data-cy="listing-item-link"]"#.to_string(),
            next_page: r#"ul[data-testid="frontend.search.base-pagination.nexus-pagination"] li[title="Go to next Page"]:not([aria-disabled="true"])"#.to_string(),

            top_information: r#"[data-testid="ad.top-information.table"]"#.to_string(),
            additional_information: r#"[data-testid="ad.additional-information.table"]"#.to_string(),
            title: r#"[data-cy="adPageAdTitle"]"#.to_string(),
            location: r#"[data-testid="map-link-container"]"#.to_string(),
            price: r#"[data-cy="adPageHeaderPrice"]"#.to_string(),
            description: r#"[data-testid="content-container"]"#.to_string(),
            top_fields: vec![
                field("square_meters", "area"),
                field("rent", "rent"),
                field("number_of_rooms", "rooms_num"),
                field("deposit", "deposit"),
                field("floor_level", "floor"),
                field("building_type", "building_type"),
                field("available_from", "free_from"),
                field("balcony_garden_terrace", "outdoor"),
                ("remote_service".to_string(), r#"[aria-label="Obsługa zdalna"]"#.to_string()),
                field("completion", "construction_status"),
            ],
            additional_fields: vec![
                field("ownership", "advertiser_type"),
                field("rent_to_students", "rent_to_students"),
                field("equipment", "equipment_types"),
                field("media_types", "media_types"),
                field("heating", "heating"),
                field("security", "security_types"),
                field("windows", "windows_type"),
                field("elevator", "lift"),
                field("parking_space", "car"),
                field("build_year", "build_year"),
                field("building_material", "building_material"),
                field("additional_information", "extras_types"),
            ],
        }
    }
}
