// Copyright 2026 Ilanharvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ilanharvest library — paced browser harvester for classified-listing catalogs.
//!
//! This library crate exposes the core modules for integration testing.

#![allow(dead_code, unused_imports, clippy::new_without_default)]

pub mod cli;
pub mod config;
pub mod driver;
pub mod events;
pub mod export;
pub mod scrape;
pub mod stealth;
