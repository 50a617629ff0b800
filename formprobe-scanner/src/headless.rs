// Headless Chrome implementation of the rendered session

use crate::error::{Result, ScanError};
use crate::session::{FrameHandle, RenderedSession};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const FRAME_QUERY: &str = "querySelectorAll('iframe, frame')";

/// Drives a single Chrome tab. Frames are addressed by their index path from
/// the top document and reached through `contentDocument`, so cross-origin
/// frames cannot be entered.
pub struct HeadlessSession {
    _browser: Browser,
    tab: Arc<Tab>,
    frame_path: Vec<usize>,
}

impl HeadlessSession {
    pub fn launch() -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .build()
            .map_err(|e| ScanError::DriverInit(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| ScanError::DriverInit(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ScanError::DriverInit(e.to_string()))?;

        info!("headless browser started");
        Ok(Self {
            _browser: browser,
            tab,
            frame_path: Vec::new(),
        })
    }

    fn document_expr(&self) -> String {
        self.frame_path
            .iter()
            .fold(String::from("document"), |expr, idx| {
                format!("{}.{}[{}].contentDocument", expr, FRAME_QUERY, idx)
            })
    }

    async fn evaluate(&self, script: String) -> Result<serde_json::Value> {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || {
            tab.evaluate(&script, false)
                .map(|object| object.value.unwrap_or(serde_json::Value::Null))
                .map_err(|e| ScanError::Render(e.to_string()))
        })
        .await?
    }
}

impl RenderedSession for HeadlessSession {
    async fn navigate(&mut self, url: &Url) -> Result<Url> {
        self.frame_path.clear();
        let tab = self.tab.clone();
        let target = url.to_string();

        let landed = tokio::task::spawn_blocking(move || -> std::result::Result<String, String> {
            tab.navigate_to(&target).map_err(|e| e.to_string())?;
            tab.wait_until_navigated().map_err(|e| e.to_string())?;
            Ok(tab.get_url())
        })
        .await?
        .map_err(ScanError::Render)?;

        debug!(url = %url, landed = %landed, "navigated");
        Url::parse(&landed).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", landed, e)))
    }

    fn current_url(&self) -> Option<Url> {
        Url::parse(&self.tab.get_url()).ok()
    }

    async fn context_url(&mut self) -> Result<Url> {
        let script = format!("{}.baseURI", self.document_expr());
        match self.evaluate(script).await? {
            serde_json::Value::String(url) => {
                Url::parse(&url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))
            }
            other => Err(ScanError::Render(format!("unexpected document URL: {}", other))),
        }
    }

    async fn wait_for_body(&mut self, timeout: Duration) -> Result<()> {
        let tab = self.tab.clone();
        let found = tokio::task::spawn_blocking(move || {
            tab.wait_for_element_with_custom_timeout("body", timeout)
                .is_ok()
        })
        .await?;

        if found {
            Ok(())
        } else {
            Err(ScanError::RenderTimeout {
                url: self.tab.get_url(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }

    async fn list_anchors(&mut self) -> Result<Vec<String>> {
        let script = format!(
            "JSON.stringify(Array.from({}.querySelectorAll('a[href]')).map(a => a.href))",
            self.document_expr()
        );
        match self.evaluate(script).await? {
            serde_json::Value::String(json) => serde_json::from_str(&json)
                .map_err(|e| ScanError::Render(format!("bad anchor list: {}", e))),
            _ => Ok(Vec::new()),
        }
    }

    async fn list_form_elements(&mut self) -> Result<String> {
        let script = format!("{}.documentElement.outerHTML", self.document_expr());
        match self.evaluate(script).await? {
            serde_json::Value::String(html) => Ok(html),
            other => Err(ScanError::Render(format!("unexpected DOM value: {}", other))),
        }
    }

    async fn enumerate_frames(&mut self) -> Result<Vec<FrameHandle>> {
        let script = format!("{}.{}.length", self.document_expr(), FRAME_QUERY);
        let count = self.evaluate(script).await?.as_u64().unwrap_or(0) as usize;
        Ok((0..count).map(FrameHandle).collect())
    }

    async fn switch_frame(&mut self, frame: FrameHandle) -> Result<()> {
        let script = format!(
            "(() => {{ const f = {}.{}[{}]; return !!(f && f.contentDocument); }})()",
            self.document_expr(),
            FRAME_QUERY,
            frame.0
        );
        match self.evaluate(script).await? {
            serde_json::Value::Bool(true) => {
                self.frame_path.push(frame.0);
                Ok(())
            }
            _ => Err(ScanError::Render(format!(
                "frame #{} is missing or cross-origin",
                frame.0
            ))),
        }
    }

    async fn switch_to_root(&mut self) -> Result<()> {
        self.frame_path.clear();
        Ok(())
    }
}
