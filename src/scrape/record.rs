//! Listing records — the unit of collected data.

use std::collections::BTreeMap;

use serde::Serialize;

pub const FIELD_LINK: &str = "Link";
pub const FIELD_TITLE: &str = "Title";
pub const FIELD_PRICE: &str = "Price";
pub const FIELD_LOCATION: &str = "Location";
pub const FIELD_PHONE: &str = "Phone";

/// Placeholder for a fixed field whose element is missing, and for a
/// phone list that revealed no entries.
pub const SENTINEL_NOT_FOUND: &str = "Not found";
/// Phone placeholder when the reveal control is absent or the reveal
/// never finished.
pub const SENTINEL_PHONE_HIDDEN: &str = "Not found or hidden";
/// Phone placeholder when the reveal interaction itself blew up.
pub const SENTINEL_PHONE_ERROR: &str = "Error during retrieval";

/// One scraped listing.
///
/// Field names are open-ended: beyond the fixed fields, every attribute
/// row on a detail page contributes its own column. Keys are kept sorted
/// so iteration is deterministic. A field a page did not have is absent,
/// never an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ListingRecord {
    fields: BTreeMap<String, String>,
}

impl ListingRecord {
    /// Every record starts from, and always carries, its link.
    pub fn new(link: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_LINK.to_string(), link.into());
        Self { fields }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn link(&self) -> &str {
        self.get(FIELD_LINK).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `(name, value)` pairs in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
