//! Run configuration and the site selector profile.
//!
//! A [`RunConfig`] is assembled once from the command line and treated as
//! immutable for the rest of the run. The [`SiteProfile`] gathers every
//! selector the harvester touches so a site markup change is a one-file fix.

use std::path::PathBuf;
use std::time::Duration;

use crate::driver::Locator;

pub const DEFAULT_BASE_URL: &str = "https://www.sahibinden.com/";
pub const DEFAULT_MAX_LISTINGS: usize = 40;
pub const DEFAULT_MAX_PAGES: u32 = 3;
pub const DEFAULT_OUTPUT: &str = "listings.csv";

/// Inclusive bounds for one randomized pause band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayBand {
    pub min: Duration,
    pub max: Duration,
}

impl DelayBand {
    pub fn from_secs(min: f64, max: f64) -> Self {
        debug_assert!(min <= max);
        Self {
            min: Duration::from_secs_f64(min),
            max: Duration::from_secs_f64(max),
        }
    }
}

/// The two pause bands used while walking the site: a short one after
/// in-page gestures and a long one between listing visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    pub short: DelayBand,
    pub long: DelayBand,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            short: DelayBand::from_secs(2.0, 5.0),
            long: DelayBand::from_secs(30.0, 60.0),
        }
    }
}

/// Everything a run needs, fixed before the browser launches.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: String,
    pub max_listings: usize,
    pub max_pages: u32,
    pub output: PathBuf,
    pub pacing: PacingConfig,
    pub headful: bool,
    pub event_log: Option<PathBuf>,
    /// Page loads and structural milestones (index table, detail content).
    pub nav_timeout: Duration,
    /// Consent banner lookup; the banner is optional, so this stays short.
    pub cookie_timeout: Duration,
    /// Submenu entries revealed by hovering the category menu.
    pub submenu_timeout: Duration,
    /// Phone number reveal after clicking the show button.
    pub reveal_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_listings: DEFAULT_MAX_LISTINGS,
            max_pages: DEFAULT_MAX_PAGES,
            output: PathBuf::from(DEFAULT_OUTPUT),
            pacing: PacingConfig::default(),
            headful: false,
            event_log: None,
            nav_timeout: Duration::from_secs(20),
            cookie_timeout: Duration::from_secs(10),
            submenu_timeout: Duration::from_secs(10),
            reveal_timeout: Duration::from_secs(10),
        }
    }
}

/// Every selector the harvester uses, in document order of the walk.
///
/// Defaults target sahibinden.com's vehicle catalog. The anchor/row
/// selectors are scoped: `attr_key`, `attr_value` and `phone_entry` are
/// looked up inside their respective containers, not the whole document.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub body: Locator,
    pub cookie_accept: Locator,
    pub category_menu: Locator,
    pub category_leaf: Locator,
    pub show_all: Locator,
    pub results_container: Locator,
    pub listing_anchor: Locator,
    /// Substring of the anchor's parent class that marks a sponsored row.
    pub sponsored_marker: String,
    pub next_page: Locator,
    pub detail_title: Locator,
    pub detail_price: Locator,
    pub detail_location: Locator,
    pub attr_container: Locator,
    pub attr_rows: Locator,
    pub attr_key: Locator,
    pub attr_value: Locator,
    pub phone_show: Locator,
    pub phone_probe: Locator,
    pub phone_list: Locator,
    pub phone_entry: Locator,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            body: Locator::css("body"),
            cookie_accept: Locator::xpath(r#"//*[@id="onetrust-accept-btn-handler"]"#),
            category_menu: Locator::xpath("//a[@title='Vasıta']"),
            category_leaf: Locator::xpath("//a[@title='Otomobil']"),
            show_all: Locator::css("a.all-classifieds-link"),
            results_container: Locator::css("#searchResultsTable"),
            listing_anchor: Locator::css("tr.searchResultsItem a.classifiedTitle"),
            sponsored_marker: "doping".to_string(),
            next_page: Locator::xpath("//a[@title='Sonraki']"),
            detail_title: Locator::css("h1.classifiedDetailTitle"),
            detail_price: Locator::css("div.classifiedInfo h3"),
            detail_location: Locator::css("h2.classified-location"),
            attr_container: Locator::css("ul.classifiedInfoList"),
            attr_rows: Locator::css("ul.classifiedInfoList li"),
            attr_key: Locator::css("strong"),
            attr_value: Locator::css("span"),
            phone_show: Locator::css("a.show-phone-number"),
            phone_probe: Locator::css("ul.user-phones li span:nth-of-type(2)"),
            phone_list: Locator::css("ul.user-phones"),
            phone_entry: Locator::css("li"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pacing_bands_are_ordered() {
        let pacing = PacingConfig::default();
        assert!(pacing.short.min <= pacing.short.max);
        assert!(pacing.long.min <= pacing.long.max);
        assert!(pacing.short.max <= pacing.long.min);
    }

    #[test]
    fn default_config_matches_documented_limits() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.max_listings, 40);
        assert_eq!(cfg.max_pages, 3);
        assert!(!cfg.headful);
        assert!(cfg.event_log.is_none());
    }

    #[test]
    fn delay_band_from_secs_converts_exactly() {
        let band = DelayBand::from_secs(2.0, 5.0);
        assert_eq!(band.min, Duration::from_secs(2));
        assert_eq!(band.max, Duration::from_secs(5));
    }
}
