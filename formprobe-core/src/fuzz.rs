// Fuzzing engine: every form against every payload, with bounded concurrency

use crate::classify::classify;
use crate::error::{ProbeError, Result};
use crate::payload::{Category, Payload};
use formprobe_scanner::crawler::{DEFAULT_USER_AGENT, build_client};
use formprobe_scanner::{Form, Method, ScanError};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// Field types that receive the payload; everything else gets [`PLACEHOLDER_VALUE`].
pub const INJECTABLE_TYPES: &[&str] = &["text", "search", "email", "url", "tel", "password"];

/// Sent in non-injectable fields so required controls do not block submission.
pub const PLACEHOLDER_VALUE: &str = "test";

/// One (form, payload) submission and what came of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub form_action: String,
    pub method: Method,
    pub payload: String,
    pub outcome: String,
    pub status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub category: Category,
    pub payload: String,
    pub form_action: String,
    pub status: u16,
}

/// Options for configuring a fuzz run
pub struct FuzzOptions {
    pub forms: Vec<Form>,
    pub payloads: Vec<Payload>,
    pub concurrency: usize,
    pub timeout: Duration,
    pub user_agent: String,
    pub show_progress_bars: bool,
}

impl FuzzOptions {
    pub fn new(forms: Vec<Form>, payloads: Vec<Payload>) -> Self {
        Self {
            forms,
            payloads,
            concurrency: 10,
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            show_progress_bars: false,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FuzzOutcome {
    pub attempts: Vec<Attempt>,
    pub vulnerabilities: Vec<Vulnerability>,
    /// Highest number of requests observed in flight at once.
    pub peak_in_flight: usize,
}

/// Builds the parameter list for one submission. Repeated names collapse to
/// one parameter holding the last value.
pub fn build_params(form: &Form, payload: &str) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = Vec::with_capacity(form.fields.len());

    for field in &form.fields {
        let value = if INJECTABLE_TYPES.contains(&field.field_type.to_lowercase().as_str()) {
            payload
        } else {
            PLACEHOLDER_VALUE
        };

        match params.iter_mut().find(|(name, _)| *name == field.name) {
            Some(existing) => existing.1 = value.to_string(),
            None => params.push((field.name.clone(), value.to_string())),
        }
    }

    params
}

fn build_request(client: &Client, form: &Form, params: &[(String, String)]) -> RequestBuilder {
    match form.method {
        Method::Get => client.get(&form.action).query(params),
        Method::Post => client.post(&form.action).form(params),
    }
}

/// Runs `|forms| x |payloads|` attempts and returns once every one of them
/// has resolved.
pub async fn execute_fuzz(options: FuzzOptions) -> Result<FuzzOutcome> {
    let FuzzOptions {
        forms,
        payloads,
        concurrency,
        timeout,
        user_agent,
        show_progress_bars,
    } = options;

    if concurrency == 0 {
        return Err(ProbeError::InputValidation(
            "concurrency must be at least 1".to_string(),
        ));
    }

    let total = forms.len() * payloads.len();
    info!(
        forms = forms.len(),
        payloads = payloads.len(),
        attempts = total,
        concurrency,
        "starting fuzz run"
    );
    if total == 0 {
        return Ok(FuzzOutcome::default());
    }

    let client = build_client(timeout, &user_agent)?;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} attempts {msg}")
                .map_err(|e| ScanError::Other(e.to_string()))?
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let attempts: Arc<Mutex<Vec<Attempt>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let vulnerabilities: Arc<Mutex<Vec<Vulnerability>>> = Arc::new(Mutex::new(Vec::new()));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    // Create semaphore to limit concurrent requests
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = Vec::with_capacity(total);

    for form in &forms {
        for payload in &payloads {
            // Wait for a free slot before launching the next attempt
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ScanError::Other(e.to_string()))?;

            let client = client.clone();
            let form = form.clone();
            let payload = payload.clone();
            let attempts = attempts.clone();
            let vulnerabilities = vulnerabilities.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            let pb = progress_bar.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);

                let (attempt, vulnerability) = run_attempt(&client, &form, &payload).await;

                in_flight.fetch_sub(1, Ordering::SeqCst);
                if let Some(vulnerability) = vulnerability {
                    vulnerabilities.lock().await.push(vulnerability);
                }
                attempts.lock().await.push(attempt);

                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
            }));
        }
    }

    // Wait for every attempt to resolve
    for result in join_all(tasks).await {
        result?;
    }

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message("done");
    }

    let attempts = std::mem::take(&mut *attempts.lock().await);
    let vulnerabilities = std::mem::take(&mut *vulnerabilities.lock().await);
    info!(
        attempts = attempts.len(),
        vulnerabilities = vulnerabilities.len(),
        "fuzz run complete"
    );

    Ok(FuzzOutcome {
        attempts,
        vulnerabilities,
        peak_in_flight: peak.load(Ordering::SeqCst),
    })
}

/// Makes a single submission. Never fails: transport errors become the outcome.
async fn run_attempt(
    client: &Client,
    form: &Form,
    payload: &Payload,
) -> (Attempt, Option<Vulnerability>) {
    let params = build_params(form, &payload.value);
    debug!(action = %form.action, method = %form.method, params = ?params, "sending");

    let failed = |reason: String| {
        warn!(action = %form.action, payload = %payload.value, error = %reason, "request failed");
        Attempt {
            form_action: form.action.clone(),
            method: form.method,
            payload: payload.value.clone(),
            outcome: format!("request failed: {}", reason),
            status: None,
        }
    };

    let response = match build_request(client, form, &params).send().await {
        Ok(response) => response,
        Err(e) => return (failed(e.to_string()), None),
    };
    let status = response.status().as_u16();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return (failed(e.to_string()), None),
    };

    let classification = classify(&body, &payload.value);
    debug!(action = %form.action, status, outcome = classification.outcome(), "response classified");

    let vulnerability = classification.category().map(|category| {
        info!(
            action = %form.action,
            payload = %payload.value,
            category = %category,
            status,
            "vulnerability found"
        );
        Vulnerability {
            category,
            payload: payload.value.clone(),
            form_action: form.action.clone(),
            status,
        }
    });

    let attempt = Attempt {
        form_action: form.action.clone(),
        method: form.method,
        payload: payload.value.clone(),
        outcome: classification.outcome().to_string(),
        status: Some(status),
    };

    (attempt, vulnerability)
}
