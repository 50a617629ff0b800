// End-to-end run: robots -> static crawl -> rendered crawl -> forms -> fuzz

use crate::error::{ProbeError, Result};
use crate::fuzz::{Attempt, FuzzOptions, FuzzOutcome, Vulnerability, execute_fuzz};
use crate::normalize::collect_forms;
use crate::payload::{Payload, default_payloads};
use formprobe_scanner::crawler::{DEFAULT_USER_AGENT, ProgressCallback, build_client};
use formprobe_scanner::render::RenderOutcome;
use formprobe_scanner::{
    ExtractionResult, Form, HttpSession, Origin, RenderCrawler, RenderedSession, RobotsPolicy,
    ScanError, StaticCrawler,
};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Which rendered-session implementation drives the dynamic crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Driver {
    /// Plain HTTP fetches, no script execution
    #[default]
    Http,
    /// Headless Chrome, requires the `headless` feature
    Chrome,
}

impl Driver {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(Driver::Http),
            "chrome" | "headless" => Some(Driver::Chrome),
            _ => None,
        }
    }
}

/// Options for configuring a scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub base_url: String,
    pub max_depth: usize,
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub body_timeout: Duration,
    pub user_agent: String,
    pub driver: Driver,
    /// Skip the rendered crawl (and therefore fuzzing) entirely
    pub render: bool,
    pub payloads: Vec<Payload>,
    pub show_progress_bars: bool,
}

impl ScanOptions {
    pub fn new(base_url: impl Into<String>, max_depth: usize) -> Self {
        Self {
            base_url: base_url.into(),
            max_depth,
            concurrency: 10,
            fetch_timeout: Duration::from_secs(10),
            body_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            driver: Driver::Http,
            render: true,
            payloads: default_payloads(),
            show_progress_bars: false,
        }
    }
}

/// Everything a scan produced, handed to the report sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub run_id: String,
    pub target: String,
    pub max_depth: usize,
    pub start_time: i64,
    pub end_time: i64,
    pub static_urls: Vec<String>,
    pub rendered_urls: Vec<String>,
    pub extraction_results: Vec<ExtractionResult>,
    pub forms: Vec<Form>,
    pub payload_count: usize,
    pub attempts: Vec<Attempt>,
    pub vulnerabilities: Vec<Vulnerability>,
}

impl ScanOutcome {
    /// Union of both crawls, sorted and deduplicated.
    pub fn combined_urls(&self) -> Vec<String> {
        self.static_urls
            .iter()
            .chain(self.rendered_urls.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Parses an operator-supplied crawl depth.
pub fn validate_max_depth(raw: &str) -> Result<usize> {
    raw.trim().parse::<usize>().map_err(|_| {
        ProbeError::InputValidation(format!(
            "max depth must be a non-negative integer, got '{}'",
            raw
        ))
    })
}

/// Parses the target URL; only http and https with a host are accepted.
pub fn validate_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ProbeError::InputValidation(format!("invalid target URL '{}': {}", raw, e)))?;
    Origin::of(&url).map_err(|e| ProbeError::InputValidation(e.to_string()))?;
    Ok(url)
}

/// Checks everything that must hold before the first request goes out.
pub fn validate_options(options: &ScanOptions) -> Result<Url> {
    let base = validate_base_url(&options.base_url)?;
    if options.concurrency == 0 {
        return Err(ProbeError::InputValidation(
            "concurrency must be at least 1".to_string(),
        ));
    }
    Ok(base)
}

/// Runs the whole pipeline with the session selected by `options.driver`.
pub async fn execute_scan(options: ScanOptions) -> Result<ScanOutcome> {
    let base = validate_options(&options)?;
    let client = build_client(options.fetch_timeout, &options.user_agent)?;

    if !options.render {
        return run_scan::<HttpSession>(&options, base, client, None).await;
    }

    match options.driver {
        Driver::Http => {
            let mut session = HttpSession::new(client.clone());
            run_scan(&options, base, client, Some(&mut session)).await
        }
        Driver::Chrome => {
            let mut session = launch_chrome()?;
            run_scan(&options, base, client, Some(&mut session)).await
        }
    }
}

#[cfg(feature = "headless")]
fn launch_chrome() -> Result<formprobe_scanner::HeadlessSession> {
    Ok(formprobe_scanner::HeadlessSession::launch()?)
}

#[cfg(not(feature = "headless"))]
fn launch_chrome() -> Result<HttpSession> {
    Err(ScanError::DriverInit(
        "this build has no headless browser support (enable the `headless` feature)".to_string(),
    )
    .into())
}

/// Runs the pipeline against a caller-provided session.
pub async fn execute_scan_with_session<S: RenderedSession>(
    options: ScanOptions,
    session: &mut S,
) -> Result<ScanOutcome> {
    let base = validate_options(&options)?;
    let client = build_client(options.fetch_timeout, &options.user_agent)?;
    run_scan(&options, base, client, Some(session)).await
}

async fn run_scan<S: RenderedSession>(
    options: &ScanOptions,
    base: Url,
    client: Client,
    session: Option<&mut S>,
) -> Result<ScanOutcome> {
    let start_time = chrono::Utc::now().timestamp();
    let run_id = uuid::Uuid::new_v4().to_string();
    info!(run_id = %run_id, target = %base, max_depth = options.max_depth, "scan started");

    let origin = Origin::of(&base)?;
    let robots = Arc::new(RobotsPolicy::load(&client, &origin).await);

    let spinner = if options.show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .map_err(|e| ScanError::Other(e.to_string()))?,
        );
        pb.set_message("Static crawl starting...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let mut static_crawler = StaticCrawler::new(client.clone());
    if let Some(ref pb) = spinner {
        let pb = pb.clone();
        let callback: ProgressCallback = Arc::new(move |count: usize, url: String| {
            pb.set_message(format!("Static crawl... {} pages ({})", count, url));
            pb.tick();
        });
        static_crawler = static_crawler.with_progress_callback(callback);
    }
    let static_urls = static_crawler.crawl(base.as_str(), robots.clone()).await?;

    let rendered = match session {
        Some(session) => {
            if let Some(ref pb) = spinner {
                pb.set_message("Rendered crawl...");
            }
            RenderCrawler::new(options.max_depth)
                .with_body_timeout(options.body_timeout)
                .crawl(session, base.as_str(), robots)
                .await?
        }
        None => {
            info!("rendered crawl disabled");
            RenderOutcome::default()
        }
    };

    if let Some(ref pb) = spinner {
        pb.finish_and_clear();
    }

    let forms = collect_forms(&rendered.pages);
    let fuzz = if forms.is_empty() {
        info!("no forms to fuzz");
        FuzzOutcome::default()
    } else {
        let fuzz_options = FuzzOptions {
            forms: forms.clone(),
            payloads: options.payloads.clone(),
            concurrency: options.concurrency,
            timeout: options.fetch_timeout,
            user_agent: options.user_agent.clone(),
            show_progress_bars: options.show_progress_bars,
        };
        execute_fuzz(fuzz_options).await?
    };

    info!(
        run_id = %run_id,
        pages = static_urls.len() + rendered.visited.len(),
        forms = forms.len(),
        vulnerabilities = fuzz.vulnerabilities.len(),
        "scan finished"
    );

    Ok(ScanOutcome {
        run_id,
        target: base.to_string(),
        max_depth: options.max_depth,
        start_time,
        end_time: chrono::Utc::now().timestamp(),
        static_urls,
        rendered_urls: rendered.visited,
        extraction_results: rendered.pages,
        forms,
        payload_count: options.payloads.len(),
        attempts: fuzz.attempts,
        vulnerabilities: fuzz.vulnerabilities,
    })
}
