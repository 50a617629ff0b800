// Scope rules and the BFS frontier shared by both crawlers

use crate::error::{Result, ScanError};
use crate::robots::RobotsPolicy;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Canonical dedup key for a URL: fragment dropped, trailing slashes trimmed.
pub fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.as_str().trim_end_matches('/').to_string()
}

/// Resolves an href against the page it was found on.
pub fn resolve_href(page: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = page.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved)
}

/// Scheme, host and port of the crawl target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Origin {
    pub fn of(base: &Url) -> Result<Self> {
        if !is_web_scheme(base) {
            return Err(ScanError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                base.scheme(),
                base
            )));
        }
        let host = base
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("no host in {}", base)))?;

        Ok(Self {
            scheme: base.scheme().to_string(),
            host: host.to_lowercase(),
            port: base.port_or_known_default(),
        })
    }

    /// Same scheme, host and port, and the scheme is http or https.
    pub fn contains(&self, url: &Url) -> bool {
        is_web_scheme(url)
            && url.scheme() == self.scheme
            && url.host_str().map(str::to_lowercase).as_deref() == Some(self.host.as_str())
            && url.port_or_known_default() == self.port
    }

    pub fn robots_url(&self) -> String {
        match (self.scheme.as_str(), self.port) {
            ("http", Some(80)) | ("https", Some(443)) | (_, None) => {
                format!("{}://{}/robots.txt", self.scheme, self.host)
            }
            (_, Some(port)) => format!("{}://{}:{}/robots.txt", self.scheme, self.host, port),
        }
    }
}

fn is_web_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// A unit of crawl work. Depth grows by one along each followed link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: Url,
    pub key: String,
    pub depth: usize,
}

/// Why a discovered URL was or was not admitted into the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued,
    OutOfScope,
    RobotsDisallowed,
    AlreadySeen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlState {
    Queued,
    Visited,
}

/// BFS queue plus the per-URL `Unseen -> Queued -> Visited` state machine.
///
/// Dedup happens at enqueue time: a normalized URL is admitted at most once
/// for the lifetime of the frontier.
pub struct Frontier {
    origin: Origin,
    robots: Arc<RobotsPolicy>,
    states: HashMap<String, UrlState>,
    queue: VecDeque<CrawlTask>,
    visited: Vec<String>,
}

impl Frontier {
    pub fn new(origin: Origin, robots: Arc<RobotsPolicy>) -> Self {
        Self {
            origin,
            robots,
            states: HashMap::new(),
            queue: VecDeque::new(),
            visited: Vec::new(),
        }
    }

    pub fn in_scope(&self, url: &Url) -> bool {
        self.origin.contains(url)
    }

    pub fn robots_allowed(&self, url: &Url) -> bool {
        self.robots.can_fetch("*", url)
    }

    /// Admits `url` iff it is in scope, allowed by robots and never seen before.
    pub fn try_enqueue(&mut self, url: Url, depth: usize) -> Admission {
        if !self.in_scope(&url) {
            debug!(url = %url, "out of scope, not queued");
            return Admission::OutOfScope;
        }
        if !self.robots_allowed(&url) {
            debug!(url = %url, "disallowed by robots.txt, not queued");
            return Admission::RobotsDisallowed;
        }

        let key = normalize_url(&url);
        if self.states.contains_key(&key) {
            return Admission::AlreadySeen;
        }

        debug!(url = %url, depth, "queued");
        self.states.insert(key.clone(), UrlState::Queued);
        self.queue.push_back(CrawlTask { url, key, depth });
        Admission::Queued
    }

    /// Pops the next task and marks it visited. Tasks whose URL was already
    /// visited through another route (e.g. a redirect) are dropped.
    pub fn next_task(&mut self) -> Option<CrawlTask> {
        while let Some(task) = self.queue.pop_front() {
            if self.is_visited(&task.key) {
                debug!(url = %task.url, "already visited, skipping");
                continue;
            }
            self.mark_visited(&task.key);
            return Some(task);
        }
        None
    }

    /// Returns true if the key was not visited before.
    pub fn mark_visited(&mut self, key: &str) -> bool {
        match self.states.insert(key.to_string(), UrlState::Visited) {
            Some(UrlState::Visited) => false,
            _ => {
                self.visited.push(key.to_string());
                true
            }
        }
    }

    pub fn is_visited(&self, key: &str) -> bool {
        matches!(self.states.get(key), Some(UrlState::Visited))
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Visited keys in visit order.
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    pub fn into_visited(self) -> Vec<String> {
        self.visited
    }
}
