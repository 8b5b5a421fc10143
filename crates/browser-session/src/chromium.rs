//! Chromium-backed browser session using chromiumoxide.
//!
//! Elements are addressed through a page-side registry (`window.__ecotoxHandles`)
//! that maps handle ids to weak references to DOM nodes. A handle whose node is
//! no longer connected to the document (or has been collected) is stale, and its
//! entry is pruned on the next lookup.

use crate::errors::SessionError;
use crate::locator::{ElementHandle, Locator};
use crate::session::BrowserSession;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use which::which;

/// Search page the session opens on launch
pub const DEFAULT_START_URL: &str = "https://cfpub.epa.gov/ecotox/search.cfm";

const REGISTRY_PRELUDE: &str = "const reg = (window.__ecotoxHandles = window.__ecotoxHandles || { next: 1, nodes: new Map(), ids: new WeakMap() }); const resolve = (id) => { const node = reg.nodes.get(id)?.deref(); if (!node || !node.isConnected) { reg.nodes.delete(id); return undefined; } return node; };";

/// Launch settings for [`ChromiumSession`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromiumConfig {
    /// Chrome/Chromium binary; detected when empty
    pub executable: PathBuf,

    /// Run without a visible window
    pub headless: bool,

    /// Page opened once at launch; every query reuses it
    pub start_url: String,

    /// Profile directory; a throwaway profile when unset
    pub user_data_dir: Option<PathBuf>,

    /// Window size in pixels
    pub window_size: Option<(u32, u32)>,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            headless: resolve_headless_default(),
            start_url: DEFAULT_START_URL.to_string(),
            user_data_dir: None,
            window_size: Some((1400, 1000)),
        }
    }
}

impl ChromiumConfig {
    /// Configured executable if it exists, otherwise the detected one
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        if !self.executable.as_os_str().is_empty() && self.executable.exists() {
            return Some(self.executable.clone());
        }
        detect_chrome_executable()
    }
}

fn resolve_headless_default() -> bool {
    // ECOTOX_HEADLESS: "0", "false", "no", "off" means headful
    match env::var("ECOTOX_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

/// Locate a Chrome/Chromium binary: `ECOTOX_CHROME`, then PATH, then OS install paths
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("ECOTOX_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let root = PathBuf::from(value.trim());
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Chromium/Application/chrome.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct ScriptReply<T> {
    status: String,
    value: Option<T>,
}

/// A single Chromium tab driven over CDP
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    /// Launch Chromium and open the start page
    pub async fn launch(config: ChromiumConfig) -> Result<Self, SessionError> {
        let executable = config.resolve_executable().ok_or_else(|| {
            SessionError::Launch("Chrome/Chromium not found; set ECOTOX_CHROME".to_string())
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--log-level=3");
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        if let Some((width, height)) = config.window_size {
            builder = builder.window_size(width, height);
        }
        let browser_config = builder.build().map_err(SessionError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| SessionError::Launch(format!("failed to launch Chromium: {}", err)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!("cdp handler event error: {}", err);
                }
            }
        });

        let page = browser
            .new_page(config.start_url.as_str())
            .await
            .map_err(|err| SessionError::Launch(format!("failed to open start page: {}", err)))?;
        page.wait_for_navigation()
            .await
            .map_err(|err| SessionError::Launch(format!("start page did not load: {}", err)))?;

        info!(url = %config.start_url, headless = config.headless, "Chromium session ready");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Close the browser and stop the CDP handler
    pub async fn shutdown(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!("failed to close browser cleanly: {}", err);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }

    async fn evaluate<T: DeserializeOwned>(&self, expression: String) -> Result<T, SessionError> {
        self.page
            .evaluate(expression)
            .await
            .map_err(|err| SessionError::Script(err.to_string()))?
            .into_value::<T>()
            .map_err(|err| SessionError::Script(format!("unexpected script result: {}", err)))
    }

    /// Run `body` with `el` bound to the handle's node; `body` must return a reply object
    async fn on_element<T: DeserializeOwned>(
        &self,
        element: ElementHandle,
        body: &str,
    ) -> Result<ScriptReply<T>, SessionError> {
        let expression = element_expression(element, body);
        let reply: ScriptReply<T> = self.evaluate(expression).await?;
        if reply.status == "stale" {
            return Err(SessionError::StaleElement(element.to_string()));
        }
        Ok(reply)
    }

    async fn lookup(
        &self,
        parent: Option<ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, SessionError> {
        let expression = lookup_expression(parent, locator)?;
        let reply: ScriptReply<Vec<u64>> = self.evaluate(expression).await?;
        match reply.status.as_str() {
            "ok" => Ok(reply
                .value
                .unwrap_or_default()
                .into_iter()
                .map(ElementHandle)
                .collect()),
            "stale" => Err(SessionError::StaleElement(format!(
                "lookup root for {} is detached",
                locator
            ))),
            other => Err(SessionError::Script(format!(
                "unexpected lookup status: {}",
                other
            ))),
        }
    }
}

/// Script running `body` with `el` bound to the handle's node, or replying `stale`
fn element_expression(element: ElementHandle, body: &str) -> String {
    format!(
        "(() => {{\n            {prelude}\n            const el = resolve({id});\n            if (!el) {{ return {{ status: 'stale' }}; }}\n            {body}\n        }})()",
        prelude = REGISTRY_PRELUDE,
        id = element.0,
        body = body,
    )
}

/// Script registering every match of `locator` under `parent` (or the document) and replying with their ids
fn lookup_expression(
    parent: Option<ElementHandle>,
    locator: &Locator,
) -> Result<String, SessionError> {
    let root = match parent {
        Some(handle) => format!("resolve({})", handle.0),
        None => "document".to_string(),
    };
    let query = query_expression(locator)?;
    Ok(format!(
        "(() => {{\n            {prelude}\n            for (const [id, held] of reg.nodes) {{ const node = held.deref(); if (!node || !node.isConnected) {{ reg.nodes.delete(id); }} }}\n            const root = {root};\n            if (!root) {{ return {{ status: 'stale' }}; }}\n            const found = {query};\n            const ids = found.map((node) => {{\n                let id = reg.ids.get(node);\n                if (id === undefined) {{ id = reg.next++; reg.ids.set(node, id); }}\n                reg.nodes.set(id, new WeakRef(node));\n                return id;\n            }});\n            return {{ status: 'ok', value: ids }};\n        }})()",
        prelude = REGISTRY_PRELUDE,
        root = root,
        query = query,
    ))
}

/// JS expression evaluating to an array of nodes under `root`
fn query_expression(locator: &Locator) -> Result<String, SessionError> {
    let literal = |raw: &str| {
        serde_json::to_string(raw)
            .map_err(|err| SessionError::Internal(format!("invalid locator encoding: {}", err)))
    };
    Ok(match locator {
        Locator::XPath(expr) => format!(
            "(() => {{ const snap = document.evaluate({expr}, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; for (let i = 0; i < snap.snapshotLength; i++) {{ out.push(snap.snapshotItem(i)); }} return out; }})()",
            expr = literal(expr)?,
        ),
        Locator::Css(selector) => {
            format!("Array.from(root.querySelectorAll({}))", literal(selector)?)
        }
        Locator::TagName(name) => {
            format!("Array.from(root.getElementsByTagName({}))", literal(name)?)
        }
    })
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn find_element(&self, locator: &Locator) -> Result<ElementHandle, SessionError> {
        self.lookup(None, locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::ElementNotFound(locator.to_string()))
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>, SessionError> {
        self.lookup(None, locator).await
    }

    async fn find_elements_within(
        &self,
        parent: ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, SessionError> {
        self.lookup(Some(parent), locator).await
    }

    async fn click(&self, element: ElementHandle) -> Result<(), SessionError> {
        debug!("click {}", element);
        self.on_element::<serde_json::Value>(
            element,
            "el.scrollIntoView({ block: 'center' }); el.click(); return { status: 'ok' };",
        )
        .await
        .map(|_| ())
    }

    async fn clear(&self, element: ElementHandle) -> Result<(), SessionError> {
        debug!("clear {}", element);
        self.on_element::<serde_json::Value>(
            element,
            "el.focus(); el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true })); el.dispatchEvent(new Event('change', { bubbles: true })); return { status: 'ok' };",
        )
        .await
        .map(|_| ())
    }

    async fn type_text(&self, element: ElementHandle, text: &str) -> Result<(), SessionError> {
        debug!("type {} chars into {}", text.chars().count(), element);
        self.on_element::<serde_json::Value>(element, "el.focus(); return { status: 'ok' };")
            .await?;
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(|err| SessionError::Script(format!("insertText failed: {}", err)))?;
        Ok(())
    }

    async fn read_text(&self, element: ElementHandle) -> Result<String, SessionError> {
        let reply: ScriptReply<String> = self
            .on_element(
                element,
                "return { status: 'ok', value: String(el.innerText ?? el.textContent ?? '') };",
            )
            .await?;
        Ok(reply.value.unwrap_or_default().trim().to_string())
    }

    async fn select_option(
        &self,
        element: ElementHandle,
        value: &str,
    ) -> Result<(), SessionError> {
        debug!("select value '{}' on {}", value, element);
        let literal = serde_json::to_string(value)
            .map_err(|err| SessionError::Internal(format!("invalid option encoding: {}", err)))?;
        let body = format!(
            "const option = Array.from(el.options || []).find((o) => o.value === {value});\n            if (!option) {{ return {{ status: 'missing' }}; }}\n            el.value = {value};\n            el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n            return {{ status: 'ok' }};",
            value = literal,
        );
        let reply: ScriptReply<serde_json::Value> = self.on_element(element, &body).await?;
        if reply.status == "missing" {
            return Err(SessionError::ElementNotFound(format!(
                "option '{}' in {}",
                value, element
            )));
        }
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, SessionError> {
        let query = query_expression(locator)?;
        let expression = format!(
            "(() => {{\n            const root = document;\n            const el = {query}[0];\n            if (!el) {{ return false; }}\n            const style = window.getComputedStyle(el);\n            const rect = el.getBoundingClientRect();\n            return style.visibility !== 'hidden' && style.display !== 'none' && (rect.width > 0 || rect.height > 0 || el.getClientRects().length > 0);\n        }})()",
            query = query,
        );
        self.evaluate(expression).await
    }

    async fn is_stale(&self, element: ElementHandle) -> Result<bool, SessionError> {
        match self
            .on_element::<serde_json::Value>(element, "return { status: 'ok' };")
            .await
        {
            Ok(_) => Ok(false),
            Err(SessionError::StaleElement(_)) => Ok(true),
            Err(err) => Err(err),
        }
    }
}
