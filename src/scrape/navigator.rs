//! Catalog navigation — consent banner, category menu, index pagination.

use std::time::Duration;

use tracing::{debug, info};

use super::{require, ScrapeError};
use crate::config::{RunConfig, SiteProfile};
use crate::driver::{PageDriver, WaitCondition, WaitOutcome};
use crate::events::{EventBus, ScrapeEvent};
use crate::stealth::pacing::{PaceBand, Pacer};

/// Settle time after dismissing the consent banner.
const COOKIE_SETTLE: Duration = Duration::from_millis(1500);
/// Settle time between scrolling the next-page control into view and
/// clicking it.
const NEXT_SETTLE: Duration = Duration::from_secs(1);

/// Whether pagination moved to a fresh index page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAdvance {
    Advanced,
    NoMorePages,
}

/// Load the catalog front page and clear the consent banner if one shows.
///
/// The banner is optional; a quiet timeout means it never appeared and
/// the walk carries on.
pub async fn open_catalog(
    driver: &mut dyn PageDriver,
    profile: &SiteProfile,
    cfg: &RunConfig,
    events: &EventBus,
) -> Result<(), ScrapeError> {
    info!(url = cfg.base_url.as_str(), "opening catalog");
    driver.navigate(&cfg.base_url, cfg.nav_timeout).await?;
    let outcome = driver
        .wait_until(WaitCondition::Present(&profile.body), cfg.nav_timeout)
        .await?;
    require(outcome, "catalog front page", cfg.nav_timeout)?;

    let banner = driver
        .wait_until(
            WaitCondition::Clickable(&profile.cookie_accept),
            cfg.cookie_timeout,
        )
        .await?;
    match banner {
        WaitOutcome::Satisfied => match driver.find(&profile.cookie_accept).await? {
            Some(button) => {
                driver.click(button).await?;
                events.emit(ScrapeEvent::CookieBannerDismissed);
                tokio::time::sleep(COOKIE_SETTLE).await;
            }
            None => events.emit(ScrapeEvent::CookieBannerAbsent),
        },
        WaitOutcome::TimedOut => {
            debug!("no consent banner within {}ms", cfg.cookie_timeout.as_millis());
            events.emit(ScrapeEvent::CookieBannerAbsent);
        }
    }
    Ok(())
}

/// Hover the category menu so its submenu renders, then click the leaf
/// entry. Ends with a short pause, as a person would take.
pub async fn select_category(
    driver: &mut dyn PageDriver,
    profile: &SiteProfile,
    cfg: &RunConfig,
    pacer: &Pacer,
    events: &EventBus,
) -> Result<(), ScrapeError> {
    let outcome = driver
        .wait_until(WaitCondition::Visible(&profile.category_menu), cfg.nav_timeout)
        .await?;
    require(outcome, "category menu", cfg.nav_timeout)?;
    let menu = driver
        .find(&profile.category_menu)
        .await?
        .ok_or(ScrapeError::MilestoneMissing {
            what: "category menu",
        })?;
    driver.hover(menu).await?;

    let outcome = driver
        .wait_until(
            WaitCondition::Clickable(&profile.category_leaf),
            cfg.submenu_timeout,
        )
        .await?;
    require(outcome, "category submenu entry", cfg.submenu_timeout)?;
    let leaf = driver
        .find(&profile.category_leaf)
        .await?
        .ok_or(ScrapeError::MilestoneMissing {
            what: "category submenu entry",
        })?;
    driver.click(leaf).await?;
    events.emit(ScrapeEvent::CategorySelected);

    let pause = pacer.wait(PaceBand::Short).await;
    events.emit(ScrapeEvent::PacingWait {
        band: PaceBand::Short.label().to_string(),
        millis: pause.as_millis() as u64,
    });
    Ok(())
}

/// Click through to the full listing index and wait for the results
/// table to render.
pub async fn open_full_index(
    driver: &mut dyn PageDriver,
    profile: &SiteProfile,
    cfg: &RunConfig,
    events: &EventBus,
) -> Result<(), ScrapeError> {
    let outcome = driver
        .wait_until(WaitCondition::Clickable(&profile.show_all), cfg.nav_timeout)
        .await?;
    require(outcome, "show-all-listings link", cfg.nav_timeout)?;
    let link = driver
        .find(&profile.show_all)
        .await?
        .ok_or(ScrapeError::MilestoneMissing {
            what: "show-all-listings link",
        })?;
    driver.click(link).await?;

    let outcome = driver
        .wait_until(
            WaitCondition::Present(&profile.results_container),
            cfg.nav_timeout,
        )
        .await?;
    require(outcome, "results table", cfg.nav_timeout)?;
    events.emit(ScrapeEvent::IndexReached);
    Ok(())
}

/// Go back to the index page the detail visits navigated away from.
pub async fn reopen_index(
    driver: &mut dyn PageDriver,
    profile: &SiteProfile,
    cfg: &RunConfig,
    index_url: &str,
) -> Result<(), ScrapeError> {
    debug!(url = index_url, "returning to the index page");
    driver.navigate(index_url, cfg.nav_timeout).await?;
    let outcome = driver
        .wait_until(
            WaitCondition::Present(&profile.results_container),
            cfg.nav_timeout,
        )
        .await?;
    require(outcome, "results table", cfg.nav_timeout)
}

/// Move to the next index page.
///
/// Advancement is confirmed by the old control going stale; a control
/// that never goes stale is treated the same as no control at all.
pub async fn advance_page(
    driver: &mut dyn PageDriver,
    profile: &SiteProfile,
    cfg: &RunConfig,
) -> Result<PageAdvance, ScrapeError> {
    let Some(next) = driver.find(&profile.next_page).await? else {
        return Ok(PageAdvance::NoMorePages);
    };
    driver.scroll_into_view(next).await?;
    tokio::time::sleep(NEXT_SETTLE).await;
    driver.click(next).await?;

    let outcome = driver
        .wait_until(WaitCondition::Stale(next), cfg.nav_timeout)
        .await?;
    match outcome {
        WaitOutcome::Satisfied => Ok(PageAdvance::Advanced),
        WaitOutcome::TimedOut => Ok(PageAdvance::NoMorePages),
    }
}
