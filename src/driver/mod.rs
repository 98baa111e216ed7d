//! Browser abstraction for driving live pages.
//!
//! Defines the [`PageDriver`] trait that the scrape flow is written
//! against (currently Chromium via chromiumoxide). Element lookups hand
//! out opaque [`ElementHandle`] tokens; a handle is only valid until the
//! next navigation.

pub mod chromium;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }

    /// The raw selector text, without the strategy prefix.
    pub fn raw(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::XPath(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Opaque reference to an element the driver has located.
///
/// The inner id is minted by the driver and means nothing outside it.
/// Handles are invalidated by navigation; using one afterwards yields
/// [`DriverError::StaleElement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u32);

/// Condition polled by [`PageDriver::wait_until`].
#[derive(Debug, Clone, Copy)]
pub enum WaitCondition<'a> {
    /// The locator matches at least one element.
    Present(&'a Locator),
    /// The first match is rendered with a non-zero box.
    Visible(&'a Locator),
    /// The first match is visible and not disabled.
    Clickable(&'a Locator),
    /// The handle's element is detached or its document is gone.
    Stale(ElementHandle),
}

impl fmt::Display for WaitCondition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::Present(l) => write!(f, "presence of {l}"),
            WaitCondition::Visible(l) => write!(f, "visibility of {l}"),
            WaitCondition::Clickable(l) => write!(f, "clickability of {l}"),
            WaitCondition::Stale(h) => write!(f, "staleness of element #{}", h.0),
        }
    }
}

/// Whether a wait finished inside its deadline.
///
/// Timing out is an expected outcome for optional page features, so it is
/// a value, not an error; callers decide what a timeout means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("element handle no longer attached to the page")]
    StaleElement,

    #[error("browser session error: {0}")]
    Session(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// A live page the harvester can look at and poke.
///
/// Lookups that find nothing return `Ok(None)` / an empty vec; an `Err`
/// always means the browser itself misbehaved.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL and wait for the load to settle.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> DriverResult<()>;

    /// URL of the document currently loaded.
    async fn current_url(&self) -> DriverResult<String>;

    /// First element matching the locator, if any.
    async fn find(&self, locator: &Locator) -> DriverResult<Option<ElementHandle>>;

    /// All elements matching the locator, in document order.
    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ElementHandle>>;

    /// First match of the locator inside the given element.
    async fn find_in(
        &self,
        scope: ElementHandle,
        locator: &Locator,
    ) -> DriverResult<Option<ElementHandle>>;

    /// All matches of the locator inside the given element.
    async fn find_all_in(
        &self,
        scope: ElementHandle,
        locator: &Locator,
    ) -> DriverResult<Vec<ElementHandle>>;

    /// Poll a condition until it holds or the deadline passes.
    async fn wait_until(
        &self,
        condition: WaitCondition<'_>,
        timeout: Duration,
    ) -> DriverResult<WaitOutcome>;

    async fn click(&self, element: ElementHandle) -> DriverResult<()>;

    async fn hover(&self, element: ElementHandle) -> DriverResult<()>;

    async fn scroll_into_view(&self, element: ElementHandle) -> DriverResult<()>;

    /// Scroll the viewport vertically by the given number of pixels.
    async fn scroll_by(&self, pixels: i64) -> DriverResult<()>;

    /// Rendered text content of the element.
    async fn text(&self, element: ElementHandle) -> DriverResult<String>;

    /// Attribute value, preferring the live DOM property over the HTML
    /// attribute so `href` comes back absolute.
    async fn attribute(&self, element: ElementHandle, name: &str)
        -> DriverResult<Option<String>>;

    /// Parent element, if the element is not the document root.
    async fn parent(&self, element: ElementHandle) -> DriverResult<Option<ElementHandle>>;

    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> DriverResult<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_display_carries_strategy() {
        assert_eq!(Locator::css("a.title").to_string(), "css:a.title");
        assert_eq!(
            Locator::xpath("//a[@title='Next']").to_string(),
            "xpath://a[@title='Next']"
        );
    }

    #[test]
    fn wait_condition_display_reads_naturally() {
        let loc = Locator::css("#searchResultsTable");
        assert_eq!(
            WaitCondition::Present(&loc).to_string(),
            "presence of css:#searchResultsTable"
        );
        assert_eq!(
            WaitCondition::Stale(ElementHandle(7)).to_string(),
            "staleness of element #7"
        );
    }

    #[test]
    fn driver_errors_format_with_context() {
        let err = DriverError::NavigationTimeout {
            url: "https://example.test/".into(),
            timeout_ms: 20_000,
        };
        assert!(err.to_string().contains("20000ms"));
    }
}
