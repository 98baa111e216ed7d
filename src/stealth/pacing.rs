//! Human-paced waiting between browser actions.
//!
//! Two bands: a short pause after in-page gestures and a long pause
//! between listing visits. Every pause is drawn fresh and uniformly from
//! its band, bounds inclusive, so no two runs produce the same rhythm.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::config::{DelayBand, PacingConfig};

/// Which pause band to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceBand {
    /// After clicks, menu hops and other small gestures.
    Short,
    /// Between one listing visit and the next.
    Long,
}

impl PaceBand {
    pub fn label(self) -> &'static str {
        match self {
            PaceBand::Short => "short",
            PaceBand::Long => "long",
        }
    }
}

/// Samples randomized pauses from the configured bands.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    config: PacingConfig,
}

impl Pacer {
    pub fn new(config: &PacingConfig) -> Self {
        Self { config: *config }
    }

    fn band(&self, band: PaceBand) -> DelayBand {
        match band {
            PaceBand::Short => self.config.short,
            PaceBand::Long => self.config.long,
        }
    }

    /// Draw one pause from the band. The rng lives only inside this call
    /// so async callers never hold it across an await.
    pub fn sample(&self, band: PaceBand) -> Duration {
        let DelayBand { min, max } = self.band(band);
        let mut rng = rand::thread_rng();
        let ms = rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64);
        Duration::from_millis(ms)
    }

    /// Sleep for a freshly sampled pause and report how long it was.
    pub async fn wait(&self, band: PaceBand) -> Duration {
        let pause = self.sample(band);
        debug!(
            band = band.label(),
            ms = pause.as_millis() as u64,
            "pacing pause"
        );
        tokio::time::sleep(pause).await;
        pause
    }
}

/// One simulated reading pass over a detail page: 2-4 downward scrolls of
/// 300-700px, each held for 0.5-1.5s, as a reader skimming the listing.
pub fn reading_scroll_steps() -> Vec<(i64, Duration)> {
    let mut rng = rand::thread_rng();
    let count = rng.gen_range(2..=4);
    (0..count)
        .map(|_| {
            let pixels = rng.gen_range(300..=700);
            let hold = Duration::from_millis(rng.gen_range(500..=1500));
            (pixels, hold)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pacer() -> Pacer {
        Pacer::new(&PacingConfig {
            short: DelayBand::from_secs(0.1, 0.3),
            long: DelayBand::from_secs(1.0, 2.0),
        })
    }

    #[test]
    fn samples_stay_inside_their_band() {
        let pacer = test_pacer();
        for _ in 0..500 {
            let short = pacer.sample(PaceBand::Short);
            assert!(short >= Duration::from_millis(100) && short <= Duration::from_millis(300));
            let long = pacer.sample(PaceBand::Long);
            assert!(long >= Duration::from_millis(1000) && long <= Duration::from_millis(2000));
        }
    }

    #[test]
    fn degenerate_band_always_yields_its_bound() {
        let pacer = Pacer::new(&PacingConfig {
            short: DelayBand::from_secs(0.25, 0.25),
            long: DelayBand::from_secs(1.0, 1.0),
        });
        for _ in 0..10 {
            assert_eq!(pacer.sample(PaceBand::Short), Duration::from_millis(250));
        }
    }

    #[test]
    fn reading_steps_are_bounded() {
        for _ in 0..100 {
            let steps = reading_scroll_steps();
            assert!((2..=4).contains(&steps.len()));
            for (pixels, hold) in steps {
                assert!((300..=700).contains(&pixels));
                assert!(hold >= Duration::from_millis(500) && hold <= Duration::from_millis(1500));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_reports_the_pause_it_slept() {
        let pacer = test_pacer();
        let slept = pacer.wait(PaceBand::Long).await;
        assert!(slept >= Duration::from_secs(1) && slept <= Duration::from_secs(2));
    }
}
