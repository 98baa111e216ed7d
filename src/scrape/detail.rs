//! Detail page extraction — one listing page into one record.
//!
//! Field lookups return explicit outcomes instead of throwing: a missing
//! element turns into a sentinel locally, while a browser failure is the
//! caller's problem. Only failing to reach the page content at all makes
//! the whole listing fail.

use tracing::{debug, warn};

use super::{require, ScrapeError};
use crate::config::{RunConfig, SiteProfile};
use crate::driver::{
    DriverError, DriverResult, ElementHandle, Locator, PageDriver, WaitCondition, WaitOutcome,
};
use crate::scrape::record::{
    ListingRecord, FIELD_LOCATION, FIELD_PHONE, FIELD_PRICE, FIELD_TITLE, SENTINEL_NOT_FOUND,
    SENTINEL_PHONE_ERROR, SENTINEL_PHONE_HIDDEN,
};
use crate::stealth::pacing;

/// Result of one optional field lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Found(String),
    NotFound,
    Error(DriverError),
}

/// Outcome of the phone-reveal sub-interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneOutcome {
    /// Numbers revealed; entries joined with ", ".
    Revealed(String),
    /// The list appeared but held no usable entries.
    NoEntries,
    /// Control absent, or the reveal never finished.
    Hidden,
    /// The interaction itself failed.
    Failed,
}

impl PhoneOutcome {
    /// The text that lands in the record's phone field.
    pub fn into_field(self) -> String {
        match self {
            PhoneOutcome::Revealed(numbers) => numbers,
            PhoneOutcome::NoEntries => SENTINEL_NOT_FOUND.to_string(),
            PhoneOutcome::Hidden => SENTINEL_PHONE_HIDDEN.to_string(),
            PhoneOutcome::Failed => SENTINEL_PHONE_ERROR.to_string(),
        }
    }
}

/// Visit one detail page and scrape it into a record.
///
/// An error here fails only this listing; the session skips it and moves
/// on.
pub async fn scrape_listing(
    driver: &mut dyn PageDriver,
    profile: &SiteProfile,
    cfg: &RunConfig,
    url: &str,
) -> Result<ListingRecord, ScrapeError> {
    driver.navigate(url, cfg.nav_timeout).await?;
    let outcome = driver
        .wait_until(
            WaitCondition::Present(&profile.attr_container),
            cfg.nav_timeout,
        )
        .await?;
    require(outcome, "listing detail content", cfg.nav_timeout)?;

    simulate_reading(&*driver).await?;

    let mut record = ListingRecord::new(url);

    // The headline fields are independent; a missing element leaves its
    // sentinel behind without touching the others.
    let fixed: [(&str, &Locator, bool); 3] = [
        (FIELD_TITLE, &profile.detail_title, false),
        (FIELD_PRICE, &profile.detail_price, false),
        (FIELD_LOCATION, &profile.detail_location, true),
    ];
    for (field, locator, flatten) in fixed {
        match read_field(&*driver, locator, flatten).await {
            FieldValue::Found(text) => record.insert(field, text),
            FieldValue::NotFound => record.insert(field, SENTINEL_NOT_FOUND),
            FieldValue::Error(e) => return Err(e.into()),
        }
    }

    collect_attribute_rows(&*driver, profile, &mut record).await;

    let phone = reveal_phone(&*driver, profile, cfg).await;
    debug!(outcome = ?phone, "phone reveal finished");
    record.insert(FIELD_PHONE, phone.into_field());

    Ok(record)
}

/// Scroll down the page a few times, holding between steps, the way a
/// reader skims a listing.
async fn simulate_reading(driver: &dyn PageDriver) -> DriverResult<()> {
    for (pixels, hold) in pacing::reading_scroll_steps() {
        driver.scroll_by(pixels).await?;
        tokio::time::sleep(hold).await;
    }
    Ok(())
}

async fn read_field(driver: &dyn PageDriver, locator: &Locator, flatten: bool) -> FieldValue {
    let element = match driver.find(locator).await {
        Ok(Some(element)) => element,
        Ok(None) => return FieldValue::NotFound,
        Err(e) => return FieldValue::Error(e),
    };
    match driver.text(element).await {
        Ok(text) => {
            let text = text.trim().to_string();
            FieldValue::Found(if flatten { text.replace('\n', " ") } else { text })
        }
        Err(e) => FieldValue::Error(e),
    }
}

/// Walk the attribute rows, adding one record field per row with a
/// non-empty key. A row missing its key or value element is skipped;
/// a browser failure abandons the remaining rows but not the listing.
async fn collect_attribute_rows(
    driver: &dyn PageDriver,
    profile: &SiteProfile,
    record: &mut ListingRecord,
) {
    let rows = match driver.find_all(&profile.attr_rows).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("attribute rows unreadable: {e}");
            return;
        }
    };
    for row in rows {
        match read_attribute_row(driver, profile, row).await {
            Ok(Some((key, value))) => record.insert(key, value),
            Ok(None) => continue,
            Err(e) => {
                warn!("attribute rows abandoned: {e}");
                break;
            }
        }
    }
}

async fn read_attribute_row(
    driver: &dyn PageDriver,
    profile: &SiteProfile,
    row: ElementHandle,
) -> DriverResult<Option<(String, String)>> {
    let Some(key_element) = driver.find_in(row, &profile.attr_key).await? else {
        return Ok(None);
    };
    let Some(value_element) = driver.find_in(row, &profile.attr_value).await? else {
        return Ok(None);
    };
    let key = driver.text(key_element).await?.trim().to_string();
    if key.is_empty() {
        return Ok(None);
    }
    let value = driver.text(value_element).await?.trim().to_string();
    Ok(Some((key, value)))
}

/// Click the phone-reveal control and read the numbers it uncovers.
///
/// Absence and timeouts are ordinary outcomes here; only a browser
/// failure counts as `Failed`. Both collapse into sentinels, but
/// different ones, so the export keeps them diagnosable.
pub async fn reveal_phone(
    driver: &dyn PageDriver,
    profile: &SiteProfile,
    cfg: &RunConfig,
) -> PhoneOutcome {
    let button = match driver.find(&profile.phone_show).await {
        Ok(Some(button)) => button,
        Ok(None) => return PhoneOutcome::Hidden,
        Err(_) => return PhoneOutcome::Failed,
    };
    if driver.click(button).await.is_err() {
        return PhoneOutcome::Failed;
    }

    let revealed = driver
        .wait_until(
            WaitCondition::Visible(&profile.phone_probe),
            cfg.reveal_timeout,
        )
        .await;
    match revealed {
        Ok(WaitOutcome::Satisfied) => {}
        Ok(WaitOutcome::TimedOut) => return PhoneOutcome::Hidden,
        Err(_) => return PhoneOutcome::Failed,
    }

    let list = match driver.find(&profile.phone_list).await {
        Ok(Some(list)) => list,
        Ok(None) => return PhoneOutcome::Hidden,
        Err(_) => return PhoneOutcome::Failed,
    };
    let entries = match driver.find_all_in(list, &profile.phone_entry).await {
        Ok(entries) => entries,
        Err(_) => return PhoneOutcome::Failed,
    };

    let mut numbers = Vec::new();
    for entry in entries {
        match driver.text(entry).await {
            Ok(text) => {
                let text = text.trim().replace('\n', " ");
                if !text.is_empty() {
                    numbers.push(text);
                }
            }
            Err(_) => return PhoneOutcome::Failed,
        }
    }

    if numbers.is_empty() {
        PhoneOutcome::NoEntries
    } else {
        PhoneOutcome::Revealed(numbers.join(", "))
    }
}
