//! CLI subcommand implementations for the ilanharvest binary.

pub mod doctor;
pub mod output;
pub mod run_cmd;
