//! Index page extraction — eligible listing links in document order.

use tracing::{info, warn};
use url::Url;

use crate::config::SiteProfile;
use crate::driver::{DriverResult, PageDriver};
use crate::events::{EventBus, ScrapeEvent};

/// Links harvested from one index page.
#[derive(Debug, Clone, Default)]
pub struct IndexLinks {
    pub links: Vec<String>,
    pub sponsored_skipped: usize,
}

/// Collect detail links from the index page on screen, skipping anchors
/// whose container class carries the sponsored marker.
///
/// Extraction failure downgrades to an empty result with a warning; an
/// unreadable index page ends the walk, never the process.
pub async fn collect_listing_links(
    driver: &dyn PageDriver,
    profile: &SiteProfile,
    base_url: &str,
    events: &EventBus,
) -> IndexLinks {
    match try_collect(driver, profile, base_url).await {
        Ok(found) => {
            info!(
                eligible = found.links.len(),
                sponsored = found.sponsored_skipped,
                "collected listing links"
            );
            found
        }
        Err(e) => {
            warn!("listing link collection failed: {e}");
            events.emit(ScrapeEvent::Warning {
                message: format!("listing link collection failed: {e}"),
            });
            IndexLinks::default()
        }
    }
}

async fn try_collect(
    driver: &dyn PageDriver,
    profile: &SiteProfile,
    base_url: &str,
) -> DriverResult<IndexLinks> {
    let anchors = driver.find_all(&profile.listing_anchor).await?;

    let mut found = IndexLinks::default();
    for anchor in anchors {
        // The sponsored marker sits on the anchor's container row.
        let container_class = match driver.parent(anchor).await? {
            Some(parent) => driver.attribute(parent, "class").await?.unwrap_or_default(),
            None => String::new(),
        };
        if container_class.contains(&profile.sponsored_marker) {
            found.sponsored_skipped += 1;
            continue;
        }

        let Some(href) = driver.attribute(anchor, "href").await? else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() {
            continue;
        }
        if let Some(absolute) = absolutize(base_url, href) {
            found.links.push(absolute);
        }
    }
    Ok(found)
}

/// Resolve a possibly relative href against the catalog base.
fn absolutize(base_url: &str, href: &str) -> Option<String> {
    if let Ok(absolute) = Url::parse(href) {
        return Some(absolute.to_string());
    }
    let base = Url::parse(base_url).ok()?;
    base.join(href).ok().map(|joined| joined.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_hrefs_pass_through() {
        let resolved = absolutize(
            "https://www.sahibinden.com/",
            "https://www.sahibinden.com/ilan/12345/detay",
        );
        assert_eq!(
            resolved.as_deref(),
            Some("https://www.sahibinden.com/ilan/12345/detay")
        );
    }

    #[test]
    fn relative_hrefs_join_the_base() {
        let resolved = absolutize("https://www.sahibinden.com/", "/ilan/12345/detay");
        assert_eq!(
            resolved.as_deref(),
            Some("https://www.sahibinden.com/ilan/12345/detay")
        );
    }

    #[test]
    fn unresolvable_hrefs_are_dropped() {
        assert_eq!(absolutize("not a base url", "/ilan/1"), None);
    }
}
