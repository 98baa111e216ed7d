//! The `run` subcommand: walk the catalog and write the CSV.

use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::cli::output::{self, Styled};
use crate::config::{DelayBand, RunConfig, SiteProfile};
use crate::driver::chromium::ChromiumDriver;
use crate::events::{now_timestamp, EventBus, EventLog, ScrapeEvent};
use crate::export::{RecordSink, WriteOutcome};
use crate::scrape::record::ListingRecord;
use crate::scrape::run_session;
use crate::scrape::SessionSummary;
use crate::stealth::pacing::Pacer;

/// Everything the end-of-run summary needs.
struct RunReport {
    summary: SessionSummary,
    outcome: WriteOutcome,
    sample: Option<ListingRecord>,
}

/// Run a full harvest: launch the browser, walk the catalog, export.
pub async fn run(cfg: RunConfig) -> Result<()> {
    // Initialize tracing. The console renderer owns the narration, so
    // tracing stays at warn unless --verbose asks for the full stream.
    let directive = if output::is_verbose() {
        "ilanharvest=debug"
    } else {
        "ilanharvest=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("starting ilanharvest v{}", env!("CARGO_PKG_VERSION"));

    let s = Styled::new();
    if !output::is_quiet() && !output::is_json() {
        eprintln!();
        eprintln!(
            "  {} v{}",
            s.bold("ilanharvest"),
            env!("CARGO_PKG_VERSION")
        );
        eprintln!("  {} {}", s.dim("catalog"), cfg.base_url);
        eprintln!(
            "  {} {} listings, {} pages",
            s.dim("quotas "),
            cfg.max_listings,
            cfg.max_pages
        );
        eprintln!(
            "  {} {} short, {} long",
            s.dim("pacing "),
            format_band(&cfg.pacing.short),
            format_band(&cfg.pacing.long)
        );
        eprintln!("  {} {}", s.dim("output "), cfg.output.display());
        eprintln!();
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let event_log = match &cfg.event_log {
        Some(path) => Some(EventLog::open(path)?),
        None => None,
    };

    let events = EventBus::new(256);
    let printer = spawn_event_printer(events.subscribe(), event_log);

    events.emit(ScrapeEvent::RunStarted {
        run_id: run_id.clone(),
        base_url: cfg.base_url.clone(),
        max_listings: cfg.max_listings,
        max_pages: cfg.max_pages,
        timestamp: now_timestamp(),
    });

    let report = scrape_and_export(&cfg, &events).await;

    // On success the printer stops at RunFinished; on failure it stops
    // when the bus closes. Either way it drains before the summary.
    drop(events);
    let _ = printer.await;

    let report = report?;
    print_summary(&s, &cfg, &run_id, &report);

    Ok(())
}

/// The browser-bound part of a run. Emits OutputWritten/NothingToWrite
/// and RunFinished on the way out.
async fn scrape_and_export(cfg: &RunConfig, events: &EventBus) -> Result<RunReport> {
    let mut driver = ChromiumDriver::launch(cfg.headful)
        .await
        .context("launching Chromium")?;

    let profile = SiteProfile::default();
    let pacer = Pacer::new(&cfg.pacing);
    let mut sink = RecordSink::new();

    let session = run_session(&mut driver, cfg, &profile, &pacer, events, &mut sink).await;

    // The browser comes down whether or not the walk survived.
    driver.shutdown().await;

    let summary = session.context("harvest session failed")?;

    let sample = sink.first().cloned();
    let outcome = sink
        .finalize(&cfg.output)
        .with_context(|| format!("writing {}", cfg.output.display()))?;

    match &outcome {
        WriteOutcome::Written { rows, columns } => events.emit(ScrapeEvent::OutputWritten {
            path: cfg.output.display().to_string(),
            rows: *rows,
            columns: *columns,
        }),
        WriteOutcome::NothingToWrite => events.emit(ScrapeEvent::NothingToWrite),
    }

    events.emit(ScrapeEvent::RunFinished {
        listings: summary.listings_collected,
        pages: summary.pages_visited,
        skipped: summary.listings_skipped,
        sponsored_skipped: summary.sponsored_skipped,
        elapsed_ms: summary.elapsed.as_millis() as u64,
    });

    Ok(RunReport {
        summary,
        outcome,
        sample,
    })
}

/// Console renderer: one task subscribed to the bus. Writes the JSONL
/// event log when one was requested, narrates unless --quiet/--json,
/// and drives the progress bar across listings.
fn spawn_event_printer(
    mut rx: broadcast::Receiver<ScrapeEvent>,
    mut event_log: Option<EventLog>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let s = Styled::new();
        let narrating = !output::is_quiet() && !output::is_json();
        let mut bar: Option<ProgressBar> = None;

        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("console renderer lagged by {n} events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if let Some(log) = event_log.as_mut() {
                if let Err(e) = log.log(&event) {
                    warn!("event log write failed: {e}");
                }
            }

            if narrating {
                narrate(&s, &mut bar, &event);
            }

            if matches!(event, ScrapeEvent::RunFinished { .. }) {
                break;
            }
        }

        if let Some(pb) = bar.take() {
            pb.finish_and_clear();
        }
    })
}

/// One human-readable line (or a bar update) per event. End-of-run
/// events stay silent here; the final summary covers them.
fn narrate(s: &Styled, bar: &mut Option<ProgressBar>, event: &ScrapeEvent) {
    match event {
        ScrapeEvent::CookieBannerDismissed => {
            say(bar, format!("  {} cookie banner dismissed", s.ok_sym()));
        }
        ScrapeEvent::CookieBannerAbsent => {
            say(bar, format!("  {}", s.dim("no cookie banner")));
        }
        ScrapeEvent::CategorySelected => {
            say(bar, format!("  {} category selected", s.ok_sym()));
        }
        ScrapeEvent::IndexReached => {
            say(bar, format!("  {} listing index reached", s.ok_sym()));
        }
        ScrapeEvent::LinksCollected {
            page,
            eligible,
            sponsored_skipped,
        } => {
            let mut line = format!("  {} page {page}: {eligible} listings", s.ok_sym());
            if *sponsored_skipped > 0 {
                line.push_str(&format!(" ({sponsored_skipped} sponsored skipped)"));
            }
            say(bar, line);
        }
        ScrapeEvent::EmptyIndexPage { page } => {
            say(bar, format!("  {} page {page} is empty", s.warn_sym()));
        }
        ScrapeEvent::PaginationExhausted { page } => {
            let line = format!("no next page after page {page}");
            say(bar, format!("  {}", s.dim(&line)));
        }
        ScrapeEvent::PacingWait { band, millis } => {
            let secs = millis / 1000;
            match bar {
                Some(pb) => pb.set_message(format!("{band} pause, {secs}s")),
                None => eprintln!("  {}", s.dim(&format!("{band} pause, {secs}s"))),
            }
        }
        ScrapeEvent::ListingStarted {
            url,
            position,
            target,
        } => {
            let pb = bar.get_or_insert_with(|| {
                let pb = ProgressBar::new(*target as u64);
                pb.set_style(
                    ProgressStyle::with_template(
                        "  {spinner:.cyan} [{bar:28.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap()
                    .progress_chars("=> "),
                );
                pb.enable_steady_tick(Duration::from_millis(120));
                pb
            });
            pb.set_position((*position - 1) as u64);
            pb.set_message(clip(url_tail(url), 48));
        }
        ScrapeEvent::ListingScraped { title, fields, .. } => {
            if let Some(pb) = bar {
                pb.inc(1);
            }
            say(
                bar,
                format!("  {} {} ({fields} fields)", s.ok_sym(), clip(title, 60)),
            );
        }
        ScrapeEvent::ListingSkipped { url, reason } => {
            say(
                bar,
                format!("  {} skipped {}: {reason}", s.warn_sym(), url_tail(url)),
            );
        }
        ScrapeEvent::ListingQuotaReached { collected } => {
            let line = format!("listing quota reached ({collected} collected)");
            say(bar, format!("  {}", s.dim(&line)));
        }
        ScrapeEvent::PageQuotaReached { pages } => {
            let line = format!("page quota reached ({pages} pages)");
            say(bar, format!("  {}", s.dim(&line)));
        }
        ScrapeEvent::Warning { message } => {
            say(bar, format!("  {} {message}", s.warn_sym()));
        }
        ScrapeEvent::RunStarted { .. }
        | ScrapeEvent::PageStarted { .. }
        | ScrapeEvent::OutputWritten { .. }
        | ScrapeEvent::NothingToWrite
        | ScrapeEvent::RunFinished { .. } => {}
    }
}

/// Print above the bar when one is running, on stderr otherwise.
fn say(bar: &Option<ProgressBar>, line: String) {
    match bar {
        Some(pb) => pb.println(line),
        None => eprintln!("{line}"),
    }
}

fn print_summary(s: &Styled, cfg: &RunConfig, run_id: &str, report: &RunReport) {
    let summary = &report.summary;
    let (rows, columns) = match &report.outcome {
        WriteOutcome::Written { rows, columns } => (*rows, *columns),
        WriteOutcome::NothingToWrite => (0, 0),
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "run_id": run_id,
            "listings": summary.listings_collected,
            "pages": summary.pages_visited,
            "skipped": summary.listings_skipped,
            "sponsored_skipped": summary.sponsored_skipped,
            "output": cfg.output.display().to_string(),
            "rows": rows,
            "columns": columns,
            "elapsed_ms": summary.elapsed.as_millis() as u64,
        }));
        return;
    }

    if output::is_quiet() {
        return;
    }

    eprintln!();
    eprintln!(
        "  {} Done: {} listings over {} pages in {}",
        s.ok_sym(),
        summary.listings_collected,
        summary.pages_visited,
        output::format_duration(summary.elapsed.as_secs())
    );
    if summary.listings_skipped > 0 {
        eprintln!(
            "  {} {} listings skipped",
            s.warn_sym(),
            summary.listings_skipped
        );
    }
    match &report.outcome {
        WriteOutcome::Written { rows, columns } => {
            eprintln!(
                "  {} Wrote {} ({rows} rows, {columns} columns)",
                s.ok_sym(),
                cfg.output.display()
            );
        }
        WriteOutcome::NothingToWrite => {
            eprintln!(
                "  {} No listings collected; nothing was written",
                s.warn_sym()
            );
        }
    }

    if let Some(record) = &report.sample {
        eprintln!();
        eprintln!("  {}", s.dim("First record:"));
        for (name, value) in record.iter() {
            eprintln!("    {} {}", s.bold(&format!("{name}:")), clip(value, 72));
        }
    }
    eprintln!();
}

/// "2-5s" for a band of 2.0..=5.0 seconds.
fn format_band(band: &DelayBand) -> String {
    format!(
        "{}-{}s",
        band.min.as_secs_f64(),
        band.max.as_secs_f64()
    )
}

/// Last path segment of a listing URL, for compact display.
fn url_tail(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(seg) if !seg.is_empty() => seg,
        _ => url,
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_band_trims_whole_seconds() {
        let band = DelayBand::from_secs(2.0, 5.0);
        assert_eq!(format_band(&band), "2-5s");

        let fractional = DelayBand::from_secs(1.5, 2.5);
        assert_eq!(format_band(&fractional), "1.5-2.5s");
    }

    #[test]
    fn test_url_tail_takes_last_segment() {
        assert_eq!(
            url_tail("https://example.test/otomobil/bmw-320d/detail-1041"),
            "detail-1041"
        );
        assert_eq!(url_tail("https://example.test/detail-7/"), "detail-7");
        assert_eq!(url_tail(""), "");
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        assert_eq!(clip("kısa", 10), "kısa");
        assert_eq!(clip("çok uzun bir başlık", 8), "çok uzun...");
    }
}
