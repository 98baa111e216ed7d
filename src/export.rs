//! CSV export — collected records to one spreadsheet-friendly file.
//!
//! The header is the sorted union of every field name seen across the
//! run, so late-appearing attribute columns still line up. The file is
//! written with a UTF-8 BOM because the text is Turkish and the usual
//! consumer is Excel.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::scrape::record::ListingRecord;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// What `finalize` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { rows: usize, columns: usize },
    /// No records were collected, so no file was touched.
    NothingToWrite,
}

/// Accumulates records during the run and writes them out at the end.
#[derive(Debug, Default)]
pub struct RecordSink {
    records: Vec<ListingRecord>,
}

impl RecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: ListingRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&ListingRecord> {
        self.records.first()
    }

    /// Write everything collected to `path`, in collection order.
    ///
    /// Goes through a sibling temp file and a rename so an interrupted
    /// write cannot leave a half-finished CSV under the real name.
    pub fn finalize(&self, path: &Path) -> Result<WriteOutcome> {
        if self.records.is_empty() {
            return Ok(WriteOutcome::NothingToWrite);
        }

        let header = self.header();
        let tmp = tmp_path(path);
        {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            file.write_all(UTF8_BOM).context("failed to write BOM")?;

            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(&header)?;
            for record in &self.records {
                let row: Vec<&str> = header
                    .iter()
                    .map(|name| record.get(name).unwrap_or(""))
                    .collect();
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to move output into {}", path.display()))?;

        info!(
            rows = self.records.len(),
            columns = header.len(),
            path = %path.display(),
            "output written"
        );
        Ok(WriteOutcome::Written {
            rows: self.records.len(),
            columns: header.len(),
        })
    }

    /// Sorted union of every field name across all records.
    fn header(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for record in &self.records {
            for name in record.field_names() {
                names.insert(name.to_string());
            }
        }
        names.into_iter().collect()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output.csv");
    path.with_file_name(format!("{name}.tmp"))
}
