//! Stealth measures for browser automation.
//!
//! Patches browser fingerprint signals and paces every interaction so the
//! harvester reads like a person browsing, not a bot hammering pages.

pub mod fingerprint;
pub mod pacing;
