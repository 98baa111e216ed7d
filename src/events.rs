// Copyright 2026 Ilanharvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Harvest event bus — typed events from every stage of a run.
//!
//! The EventBus is a `tokio::sync::broadcast` channel carrying
//! [`ScrapeEvent`] values. The console renderer subscribes and also
//! feeds the optional JSONL event log. When no subscribers exist,
//! events are silently dropped (zero overhead).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event a harvest run emits. Serialized to JSON for the event log.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScrapeEvent {
    // ── Run lifecycle ─────────────────────
    /// A run has started.
    RunStarted {
        run_id: String,
        base_url: String,
        max_listings: usize,
        max_pages: u32,
        timestamp: String,
    },
    /// The run finished; totals for the whole walk.
    RunFinished {
        listings: usize,
        pages: u32,
        skipped: usize,
        sponsored_skipped: usize,
        elapsed_ms: u64,
    },

    // ── Navigation ────────────────────────
    /// The consent banner was found and dismissed.
    CookieBannerDismissed,
    /// No consent banner appeared inside its wait window.
    CookieBannerAbsent,
    /// The category menu walk (hover + submenu click) completed.
    CategorySelected,
    /// The full listing index is on screen.
    IndexReached,
    /// An index page is about to be read.
    PageStarted { page: u32 },
    /// Links collected from one index page.
    LinksCollected {
        page: u32,
        eligible: usize,
        sponsored_skipped: usize,
    },
    /// An index page had no eligible links; the run stops.
    EmptyIndexPage { page: u32 },
    /// The next-page control was absent or did not advance.
    PaginationExhausted { page: u32 },

    // ── Listings ──────────────────────────
    /// A randomized pause before the next gesture.
    PacingWait { band: String, millis: u64 },
    /// A listing detail page is about to be visited.
    ListingStarted {
        url: String,
        position: usize,
        target: usize,
    },
    /// A listing was scraped into a record.
    ListingScraped {
        url: String,
        title: String,
        fields: usize,
    },
    /// A listing failed and was skipped; the run continues.
    ListingSkipped { url: String, reason: String },
    /// The listing quota is full.
    ListingQuotaReached { collected: usize },
    /// The page quota is full.
    PageQuotaReached { pages: u32 },

    // ── Output ────────────────────────────
    /// A component hit a recoverable problem.
    Warning { message: String },
    /// The CSV file is on disk.
    OutputWritten {
        path: String,
        rows: usize,
        columns: usize,
    },
    /// The run collected nothing, so no file was written.
    NothingToWrite,
}

/// The central event bus for a harvest run.
///
/// All stages emit events through this bus. Consumers subscribe to
/// receive a stream of all events.
pub struct EventBus {
    sender: broadcast::Sender<ScrapeEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: ScrapeEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScrapeEvent> {
        self.sender.subscribe()
    }
}

/// Append-only JSONL log of one run's events.
///
/// A run is bounded by its quotas, so the file stays small and no
/// rotation is needed.
pub struct EventLog {
    file: File,
}

impl EventLog {
    /// Open or create the event log file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open event log: {}", path.display()))?;

        Ok(Self { file })
    }

    /// Append one event as a JSON line.
    pub fn log(&mut self, event: &ScrapeEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        writeln!(self.file, "{json}")?;
        Ok(())
    }
}

/// RFC-3339 timestamp for the current time.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
