// The rendered-session capability and a plain-HTTP implementation of it

use crate::error::{Result, ScanError};
use crate::extract::{extract_frame_sources, extract_links};
use reqwest::Client;
use reqwest::header::LOCATION;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Index of a child frame within the currently selected document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub usize);

/// A browser-like session with one active document context at a time.
///
/// `switch_frame` descends from the current context into one of its child
/// frames; `switch_to_root` returns to the top-level document.
#[allow(async_fn_in_trait)]
pub trait RenderedSession {
    /// Loads `url` and returns the URL the session ended up on after redirects.
    async fn navigate(&mut self, url: &Url) -> Result<Url>;

    fn current_url(&self) -> Option<Url>;

    /// URL of the currently selected context: the frame document after a
    /// `switch_frame`, the top-level document otherwise.
    async fn context_url(&mut self) -> Result<Url>;

    /// Fails with [`ScanError::RenderTimeout`] when no body shows up in time.
    async fn wait_for_body(&mut self, timeout: Duration) -> Result<()>;

    /// Absolute hrefs of every anchor in the current context.
    async fn list_anchors(&mut self) -> Result<Vec<String>>;

    /// Markup of the current context, forms included.
    async fn list_form_elements(&mut self) -> Result<String>;

    async fn enumerate_frames(&mut self) -> Result<Vec<FrameHandle>>;

    async fn switch_frame(&mut self, frame: FrameHandle) -> Result<()>;

    async fn switch_to_root(&mut self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct LoadedDocument {
    url: Url,
    html: String,
}

/// Session backed by plain HTTP fetches. No script runs, so it sees the
/// server-rendered DOM only; frames are fetched from their `src`.
pub struct HttpSession {
    client: Client,
    root: Option<LoadedDocument>,
    frames: Vec<LoadedDocument>,
}

impl HttpSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            root: None,
            frames: Vec::new(),
        }
    }

    fn current(&self) -> Result<&LoadedDocument> {
        self.frames
            .last()
            .or(self.root.as_ref())
            .ok_or_else(|| ScanError::Render("no document loaded".to_string()))
    }

    async fn load(&self, url: &Url) -> Result<LoadedDocument> {
        let response = self.client.get(url.clone()).send().await?;
        let final_url = response.url().clone();
        debug!(url = %url, final_url = %final_url, status = response.status().as_u16(), "document loaded");

        // The client does not follow redirects off the origin; report where
        // the hop pointed so the crawler can scope-check it.
        if response.status().is_redirection() {
            if let Some(target) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| final_url.join(v).ok())
            {
                return Ok(LoadedDocument {
                    url: target,
                    html: String::new(),
                });
            }
        }
        let html = response.text().await?;
        Ok(LoadedDocument {
            url: final_url,
            html,
        })
    }
}

impl RenderedSession for HttpSession {
    async fn navigate(&mut self, url: &Url) -> Result<Url> {
        self.frames.clear();
        self.root = None;
        let document = self.load(url).await?;
        let final_url = document.url.clone();
        self.root = Some(document);
        Ok(final_url)
    }

    fn current_url(&self) -> Option<Url> {
        self.root.as_ref().map(|doc| doc.url.clone())
    }

    async fn context_url(&mut self) -> Result<Url> {
        Ok(self.current()?.url.clone())
    }

    async fn wait_for_body(&mut self, timeout: Duration) -> Result<()> {
        match self.root {
            Some(_) => Ok(()),
            None => Err(ScanError::RenderTimeout {
                url: String::from("about:blank"),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    async fn list_anchors(&mut self) -> Result<Vec<String>> {
        let document = self.current()?;
        Ok(extract_links(&document.html, &document.url)
            .into_iter()
            .map(String::from)
            .collect())
    }

    async fn list_form_elements(&mut self) -> Result<String> {
        Ok(self.current()?.html.clone())
    }

    async fn enumerate_frames(&mut self) -> Result<Vec<FrameHandle>> {
        let document = self.current()?;
        let count = extract_frame_sources(&document.html, &document.url).len();
        Ok((0..count).map(FrameHandle).collect())
    }

    async fn switch_frame(&mut self, frame: FrameHandle) -> Result<()> {
        let source = {
            let document = self.current()?;
            extract_frame_sources(&document.html, &document.url)
                .into_iter()
                .nth(frame.0)
                .ok_or_else(|| ScanError::Render(format!("no frame #{} in {}", frame.0, document.url)))?
        };
        let document = self.load(&source).await?;
        self.frames.push(document);
        Ok(())
    }

    async fn switch_to_root(&mut self) -> Result<()> {
        self.frames.clear();
        Ok(())
    }
}
