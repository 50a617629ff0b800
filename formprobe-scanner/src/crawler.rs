use crate::error::{Result, ScanError};
use crate::extract::extract_links;
use crate::robots::RobotsPolicy;
use crate::scope::{Admission, Frontier, Origin};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Formprobe/0.1 (https://github.com/trapdoorsec/formprobe)";

const MAX_REDIRECTS: usize = 5;

/// Called with (pages visited so far, url) each time a page is dequeued.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Builds the HTTP client shared by the crawlers, the robots loader and the fuzzer.
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout / 2)
        .pool_max_idle_per_host(50)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(same_origin_redirects())
        .build()
        .map_err(ScanError::from)
}

/// Follows redirects only while they stay on the origin the chain started
/// on. A hop to another origin is not taken; the 3xx response is returned.
fn same_origin_redirects() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let next = attempt.url();
        let leaves_origin = attempt.previous().first().is_some_and(|first| {
            first.scheme() != next.scheme()
                || first.host_str() != next.host_str()
                || first.port_or_known_default() != next.port_or_known_default()
        });
        if leaves_origin {
            debug!(to = %next, "redirect leaves origin, not followed");
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

/// Link-following BFS over plain HTTP fetches, unbounded in depth.
pub struct StaticCrawler {
    client: Client,
    progress_callback: Option<ProgressCallback>,
}

impl StaticCrawler {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            progress_callback: None,
        }
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = build_client(Duration::from_secs(timeout_secs), DEFAULT_USER_AGENT)?;
        Ok(Self::new(client))
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawls from `start_url` until the frontier drains and returns the
    /// normalized URLs visited, in visit order.
    pub async fn crawl(&self, start_url: &str, robots: Arc<RobotsPolicy>) -> Result<Vec<String>> {
        let start = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        let mut frontier = Frontier::new(Origin::of(&start)?, robots);

        info!(url = %start, "starting static crawl");
        if frontier.try_enqueue(start.clone(), 0) != Admission::Queued {
            warn!(url = %start, "start URL is not crawlable, static crawl has nothing to do");
        }

        while let Some(task) = frontier.next_task() {
            if let Some(ref callback) = self.progress_callback {
                callback(frontier.visited().len(), task.url.to_string());
            }

            let (page_url, body) = match self.fetch(&task.url).await {
                Ok(Some(page)) => page,
                Ok(None) => continue,
                Err(e) => {
                    warn!(url = %task.url, error = %e, "static fetch failed, skipping");
                    continue;
                }
            };

            let mut queued = 0;
            for link in extract_links(&body, &page_url) {
                if frontier.try_enqueue(link, task.depth + 1) == Admission::Queued {
                    queued += 1;
                }
            }
            debug!(url = %task.url, depth = task.depth, queued, "page processed");
        }

        let visited = frontier.into_visited();
        info!(pages = visited.len(), "static crawl complete");
        Ok(visited)
    }

    /// Returns the final URL and body for a 200 response, `None` for any other status.
    async fn fetch(&self, url: &Url) -> Result<Option<(Url, String)>> {
        debug!(url = %url, "fetching");
        let response = self.client.get(url.clone()).send().await?;

        if response.status() != StatusCode::OK {
            warn!(
                url = %url,
                status = response.status().as_u16(),
                "unexpected status, skipping"
            );
            return Ok(None);
        }

        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok(Some((final_url, body)))
    }
}
