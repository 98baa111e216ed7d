//! Chromium-based page driver using chromiumoxide.
//!
//! Element handles are indices into a JS-side registry (`window.__ihReg`)
//! that lives in the document; navigation replaces the document and with
//! it the registry, which is what makes staleness detectable.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    DriverError, DriverResult, ElementHandle, Locator, PageDriver, WaitCondition, WaitOutcome,
};
use crate::stealth::fingerprint::FINGERPRINT_PATCH;

/// How often wait conditions are re-evaluated.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. ILANHARVEST_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("ILANHARVEST_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.ilanharvest/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".ilanharvest/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".ilanharvest/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".ilanharvest/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".ilanharvest/chromium/chrome-linux64/chrome"),
                home.join(".ilanharvest/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    if let Ok(path) = which::which("google-chrome") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium-browser") {
        return Some(path);
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

fn js_str(s: &str) -> String {
    // A JSON string literal is a valid JS string literal.
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Expression yielding an array of nodes matching the locator, evaluated
/// against `context` (the `document` or an element variable).
fn query_js(locator: &Locator, context: &str) -> String {
    match locator {
        Locator::Css(selector) => format!(
            "Array.from({context}.querySelectorAll({lit}))",
            lit = js_str(selector)
        ),
        Locator::XPath(expression) => format!(
            "(() => {{ const found = []; \
             const it = document.evaluate({lit}, {context}, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
             for (let i = 0; i < it.snapshotLength; i++) {{ found.push(it.snapshotItem(i)); }} \
             return found; }})()",
            lit = js_str(expression)
        ),
    }
}

/// Wrap a script body so it runs with `el` bound to the handle's element
/// and `reg` to the registry, reporting staleness instead of throwing.
fn element_script(element: ElementHandle, body: &str) -> String {
    format!(
        "(() => {{\n\
         const reg = window.__ihReg = window.__ihReg || [];\n\
         const el = reg[{id}];\n\
         if (!el || !el.isConnected) {{ return {{ stale: true }}; }}\n\
         {body}\n\
         }})()",
        id = element.0,
    )
}

/// Unwrap the `{ stale } | { ok }` envelope produced by [`element_script`].
fn element_result(value: Value) -> DriverResult<Value> {
    if value.get("stale").and_then(Value::as_bool).unwrap_or(false) {
        return Err(DriverError::StaleElement);
    }
    match value {
        Value::Object(mut map) => Ok(map.remove("ok").unwrap_or(Value::Null)),
        other => Err(DriverError::Script(format!(
            "unexpected element result shape: {other}"
        ))),
    }
}

fn handle_from(value: &Value) -> Option<ElementHandle> {
    value.as_u64().map(|id| ElementHandle(id as u32))
}

fn handles_from(value: &Value) -> Vec<ElementHandle> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(handle_from).collect())
        .unwrap_or_default()
}

/// Chromium-backed [`PageDriver`].
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
}

impl ChromiumDriver {
    /// Launch a Chromium instance and open a blank page.
    pub async fn launch(headful: bool) -> Result<Self> {
        let chrome_path = find_chromium().context(
            "Chromium not found. Install Google Chrome or Chromium, or set ILANHARVEST_CHROMIUM_PATH.",
        )?;
        info!("launching Chromium at {}", chrome_path.display());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--window-size=1366,900")
            .arg("--lang=tr-TR");
        if headful {
            builder = builder.with_head();
        } else {
            builder = builder.arg("--headless=new");
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open a page")?;

        Ok(Self { browser, page })
    }

    /// Close the page; the browser process goes down when it is dropped.
    pub async fn shutdown(self) {
        let _ = self.page.close().await;
    }

    async fn eval(&self, script: &str) -> DriverResult<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| DriverError::Script(format!("failed to convert JS result: {e:?}")))
    }

    fn condition_script(condition: &WaitCondition<'_>) -> String {
        match condition {
            WaitCondition::Present(locator) => format!(
                "(() => {{ const nodes = {query}; return nodes.length > 0; }})()",
                query = query_js(locator, "document")
            ),
            WaitCondition::Visible(locator) | WaitCondition::Clickable(locator) => {
                let clickable = matches!(condition, WaitCondition::Clickable(_));
                format!(
                    "(() => {{\n\
                     const nodes = {query};\n\
                     const el = nodes[0];\n\
                     if (!el) {{ return false; }}\n\
                     const style = window.getComputedStyle(el);\n\
                     const visible = el.offsetWidth > 0 && el.offsetHeight > 0 \
                     && style.visibility !== 'hidden' && style.display !== 'none';\n\
                     return visible{enabled};\n\
                     }})()",
                    query = query_js(locator, "document"),
                    enabled = if clickable { " && !el.disabled" } else { "" },
                )
            }
            WaitCondition::Stale(handle) => format!(
                "(() => {{\n\
                 const reg = window.__ihReg;\n\
                 if (!reg) {{ return true; }}\n\
                 const el = reg[{id}];\n\
                 return !el || !el.isConnected;\n\
                 }})()",
                id = handle.0,
            ),
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> DriverResult<()> {
        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;

        match result {
            Ok(Ok(_response)) => {
                // Wait for page to be loaded
                let _ = self.page.wait_for_navigation().await;
                // The fresh document lost the fingerprint patches.
                let _ = self.eval(FINGERPRINT_PATCH).await;
                Ok(())
            }
            Ok(Err(e)) => Err(DriverError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DriverError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn current_url(&self) -> DriverResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| DriverError::Session(e.to_string()))?;
        url.ok_or_else(|| DriverError::Session("page reports no url".to_string()))
    }

    async fn find(&self, locator: &Locator) -> DriverResult<Option<ElementHandle>> {
        let script = format!(
            "(() => {{\n\
             const reg = window.__ihReg = window.__ihReg || [];\n\
             const nodes = {query};\n\
             if (nodes.length === 0) {{ return null; }}\n\
             return reg.push(nodes[0]) - 1;\n\
             }})()",
            query = query_js(locator, "document"),
        );
        let value = self.eval(&script).await?;
        Ok(handle_from(&value))
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ElementHandle>> {
        let script = format!(
            "(() => {{\n\
             const reg = window.__ihReg = window.__ihReg || [];\n\
             const nodes = {query};\n\
             return nodes.map((n) => reg.push(n) - 1);\n\
             }})()",
            query = query_js(locator, "document"),
        );
        let value = self.eval(&script).await?;
        Ok(handles_from(&value))
    }

    async fn find_in(
        &self,
        scope: ElementHandle,
        locator: &Locator,
    ) -> DriverResult<Option<ElementHandle>> {
        let body = format!(
            "const nodes = {query};\n\
             if (nodes.length === 0) {{ return {{ ok: null }}; }}\n\
             return {{ ok: reg.push(nodes[0]) - 1 }};",
            query = query_js(locator, "el"),
        );
        let value = element_result(self.eval(&element_script(scope, &body)).await?)?;
        Ok(handle_from(&value))
    }

    async fn find_all_in(
        &self,
        scope: ElementHandle,
        locator: &Locator,
    ) -> DriverResult<Vec<ElementHandle>> {
        let body = format!(
            "const nodes = {query};\n\
             return {{ ok: nodes.map((n) => reg.push(n) - 1) }};",
            query = query_js(locator, "el"),
        );
        let value = element_result(self.eval(&element_script(scope, &body)).await?)?;
        Ok(handles_from(&value))
    }

    async fn wait_until(
        &self,
        condition: WaitCondition<'_>,
        timeout: Duration,
    ) -> DriverResult<WaitOutcome> {
        let script = Self::condition_script(&condition);
        let deadline = Instant::now() + timeout;
        loop {
            match self.eval(&script).await {
                Ok(value) => {
                    if value.as_bool().unwrap_or(false) {
                        return Ok(WaitOutcome::Satisfied);
                    }
                }
                Err(e) => {
                    // A destroyed script context means the document went
                    // away, which is what a staleness wait is probing for.
                    if matches!(condition, WaitCondition::Stale(_)) {
                        return Ok(WaitOutcome::Satisfied);
                    }
                    debug!("wait poll failed: {e}");
                }
            }
            if Instant::now() >= deadline {
                return Ok(WaitOutcome::TimedOut);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&self, element: ElementHandle) -> DriverResult<()> {
        let script = element_script(element, "el.click(); return { ok: true };");
        element_result(self.eval(&script).await?)?;
        Ok(())
    }

    async fn hover(&self, element: ElementHandle) -> DriverResult<()> {
        let body = "for (const type of ['mouseover', 'mouseenter']) {\n\
                    el.dispatchEvent(new MouseEvent(type, { bubbles: true, cancelable: true, view: window }));\n\
                    }\n\
                    return { ok: true };";
        element_result(self.eval(&element_script(element, body)).await?)?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: ElementHandle) -> DriverResult<()> {
        let script = element_script(element, "el.scrollIntoView(true); return { ok: true };");
        element_result(self.eval(&script).await?)?;
        Ok(())
    }

    async fn scroll_by(&self, pixels: i64) -> DriverResult<()> {
        let script = format!("(() => {{ window.scrollBy(0, {pixels}); return true; }})()");
        self.eval(&script).await?;
        Ok(())
    }

    async fn text(&self, element: ElementHandle) -> DriverResult<String> {
        let body = "const text = el.innerText !== undefined ? el.innerText : el.textContent;\n\
                    return { ok: text || '' };";
        let value = element_result(self.eval(&element_script(element, body)).await?)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>> {
        // Property first so `href` comes back absolute, attribute second
        // for names that are not reflected as properties.
        let body = format!(
            "const name = {lit};\n\
             let value = null;\n\
             if (name in el) {{\n\
             const prop = el[name];\n\
             if (prop !== null && prop !== undefined && typeof prop !== 'object' && typeof prop !== 'function') {{\n\
             value = String(prop);\n\
             }}\n\
             }}\n\
             if (value === null) {{ value = el.getAttribute(name); }}\n\
             return {{ ok: value }};",
            lit = js_str(name),
        );
        let value = element_result(self.eval(&element_script(element, &body)).await?)?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn parent(&self, element: ElementHandle) -> DriverResult<Option<ElementHandle>> {
        let body = "const p = el.parentElement;\n\
                    if (!p) { return { ok: null }; }\n\
                    return { ok: reg.push(p) - 1 };";
        let value = element_result(self.eval(&element_script(element, body)).await?)?;
        Ok(handle_from(&value))
    }

    async fn execute_js(&self, script: &str) -> DriverResult<Value> {
        self.eval(script).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_find_text_and_staleness() {
        let mut driver = ChromiumDriver::launch(false)
            .await
            .expect("failed to launch driver");

        driver
            .navigate(
                "data:text/html,<h1>Merhaba</h1><p>bir</p><p>iki</p>",
                Duration::from_secs(10),
            )
            .await
            .expect("navigation failed");

        let heading_loc = Locator::css("h1");
        let outcome = driver
            .wait_until(WaitCondition::Present(&heading_loc), Duration::from_secs(5))
            .await
            .expect("wait failed");
        assert_eq!(outcome, WaitOutcome::Satisfied);

        let heading = driver
            .find(&heading_loc)
            .await
            .expect("find failed")
            .expect("h1 missing");
        assert_eq!(driver.text(heading).await.expect("text failed"), "Merhaba");

        let paragraphs = driver
            .find_all(&Locator::css("p"))
            .await
            .expect("find_all failed");
        assert_eq!(paragraphs.len(), 2);

        // Navigation invalidates handles from the previous document.
        driver
            .navigate("data:text/html,<h1>Yeni</h1>", Duration::from_secs(10))
            .await
            .expect("second navigation failed");
        let outcome = driver
            .wait_until(WaitCondition::Stale(heading), Duration::from_secs(5))
            .await
            .expect("stale wait failed");
        assert_eq!(outcome, WaitOutcome::Satisfied);

        driver.shutdown().await;
    }
}
