//! The harvest session — category walk, index pagination, detail visits.
//!
//! Everything here is strictly sequential: one browser, one page, one
//! listing at a time. The pacing between steps is the point, so there is
//! nothing to parallelize.

pub mod detail;
pub mod index;
pub mod navigator;
pub mod record;

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{RunConfig, SiteProfile};
use crate::driver::{DriverError, PageDriver, WaitOutcome};
use crate::events::{EventBus, ScrapeEvent};
use crate::export::RecordSink;
use crate::scrape::navigator::PageAdvance;
use crate::scrape::record::{FIELD_TITLE, SENTINEL_NOT_FOUND};
use crate::stealth::pacing::{PaceBand, Pacer};

/// Errors that end a run: the browser gave out, or a structural
/// milestone never appeared. Single-listing failures never surface
/// here; they are absorbed as skips.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("timed out waiting for {what} after {timeout_ms}ms")]
    MilestoneTimeout { what: &'static str, timeout_ms: u64 },

    #[error("expected {what} was not on the page")]
    MilestoneMissing { what: &'static str },
}

/// Map a wait outcome on a structural milestone to pass/fail.
pub(crate) fn require(
    outcome: WaitOutcome,
    what: &'static str,
    timeout: Duration,
) -> Result<(), ScrapeError> {
    match outcome {
        WaitOutcome::Satisfied => Ok(()),
        WaitOutcome::TimedOut => Err(ScrapeError::MilestoneTimeout {
            what,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Quota accounting for one run.
///
/// Counters only grow, and the loop checks them before doing the work
/// they meter, so `listings_collected <= max_listings` and
/// `pages_visited <= max_pages` hold at every step.
#[derive(Debug, Clone)]
pub struct ScrapeSession {
    max_listings: usize,
    max_pages: u32,
    listings_collected: usize,
    pages_visited: u32,
}

impl ScrapeSession {
    pub fn new(max_listings: usize, max_pages: u32) -> Self {
        Self {
            max_listings,
            max_pages,
            listings_collected: 0,
            pages_visited: 0,
        }
    }

    pub fn listings_collected(&self) -> usize {
        self.listings_collected
    }

    pub fn pages_visited(&self) -> u32 {
        self.pages_visited
    }

    /// True once the listing quota is full.
    pub fn listings_full(&self) -> bool {
        self.listings_collected >= self.max_listings
    }

    /// True while another index page may still be read.
    pub fn can_advance(&self) -> bool {
        self.pages_visited < self.max_pages
    }

    fn note_page(&mut self) {
        self.pages_visited += 1;
        debug_assert!(self.pages_visited <= self.max_pages);
    }

    fn note_listing(&mut self) {
        self.listings_collected += 1;
        debug_assert!(self.listings_collected <= self.max_listings);
    }
}

/// What a finished session looked like.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub listings_collected: usize,
    pub pages_visited: u32,
    pub listings_skipped: usize,
    pub sponsored_skipped: usize,
    pub elapsed: Duration,
}

/// Walk the catalog end to end: front page, category menu, index pages,
/// one paced detail visit per listing. Collected records land in the
/// sink; the summary reports the totals.
pub async fn run_session(
    driver: &mut dyn PageDriver,
    cfg: &RunConfig,
    profile: &SiteProfile,
    pacer: &Pacer,
    events: &EventBus,
    sink: &mut RecordSink,
) -> Result<SessionSummary, ScrapeError> {
    let started = Instant::now();

    navigator::open_catalog(driver, profile, cfg, events).await?;
    navigator::select_category(driver, profile, cfg, pacer, events).await?;
    navigator::open_full_index(driver, profile, cfg, events).await?;

    // Detail visits leave the index, so its address is recorded here and
    // reopened before each pagination step.
    let mut index_url = driver.current_url().await?;

    let mut session = ScrapeSession::new(cfg.max_listings, cfg.max_pages);
    let mut listings_skipped = 0usize;
    let mut sponsored_skipped = 0usize;

    if session.can_advance() {
        // Reaching the index counts as the first page.
        session.note_page();

        'pages: loop {
            let page = session.pages_visited();
            events.emit(ScrapeEvent::PageStarted { page });

            let found = index::collect_listing_links(&*driver, profile, &cfg.base_url, events).await;
            sponsored_skipped += found.sponsored_skipped;
            events.emit(ScrapeEvent::LinksCollected {
                page,
                eligible: found.links.len(),
                sponsored_skipped: found.sponsored_skipped,
            });
            if found.links.is_empty() {
                warn!(page, "no eligible links on this index page");
                events.emit(ScrapeEvent::EmptyIndexPage { page });
                break;
            }

            let mut left_index = false;
            for url in found.links {
                if session.listings_full() {
                    events.emit(ScrapeEvent::ListingQuotaReached {
                        collected: session.listings_collected(),
                    });
                    break 'pages;
                }
                left_index = true;

                let pause = pacer.wait(PaceBand::Long).await;
                events.emit(ScrapeEvent::PacingWait {
                    band: PaceBand::Long.label().to_string(),
                    millis: pause.as_millis() as u64,
                });

                events.emit(ScrapeEvent::ListingStarted {
                    url: url.clone(),
                    position: session.listings_collected() + 1,
                    target: cfg.max_listings,
                });

                match detail::scrape_listing(driver, profile, cfg, &url).await {
                    Ok(listing) => {
                        session.note_listing();
                        let title = listing
                            .get(FIELD_TITLE)
                            .unwrap_or(SENTINEL_NOT_FOUND)
                            .to_string();
                        info!(
                            collected = session.listings_collected(),
                            title = title.as_str(),
                            "listing scraped"
                        );
                        events.emit(ScrapeEvent::ListingScraped {
                            url,
                            title,
                            fields: listing.len(),
                        });
                        sink.add(listing);
                    }
                    Err(e) => {
                        listings_skipped += 1;
                        warn!(url = url.as_str(), "listing skipped: {e}");
                        events.emit(ScrapeEvent::ListingSkipped {
                            url,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            if session.listings_full() {
                events.emit(ScrapeEvent::ListingQuotaReached {
                    collected: session.listings_collected(),
                });
                break;
            }
            if !session.can_advance() {
                events.emit(ScrapeEvent::PageQuotaReached {
                    pages: session.pages_visited(),
                });
                break;
            }

            if left_index {
                navigator::reopen_index(driver, profile, cfg, &index_url).await?;
            }
            match navigator::advance_page(driver, profile, cfg).await? {
                PageAdvance::Advanced => {
                    session.note_page();
                    index_url = driver.current_url().await?;
                }
                PageAdvance::NoMorePages => {
                    events.emit(ScrapeEvent::PaginationExhausted { page });
                    break;
                }
            }
        }
    }

    Ok(SessionSummary {
        listings_collected: session.listings_collected(),
        pages_visited: session.pages_visited(),
        listings_skipped,
        sponsored_skipped,
        elapsed: started.elapsed(),
    })
}
