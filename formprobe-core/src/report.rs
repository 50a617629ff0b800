// Report generation from a finished scan

use crate::classify::Classification;
use crate::error::Result;
use crate::fuzz::{Attempt, Vulnerability};
use crate::payload::Category;
use crate::scan::ScanOutcome;
use formprobe_scanner::ExtractionResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const THIN_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub sqli: usize,
    pub xss: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub run_id: String,
    pub target: String,
    pub max_depth: usize,
    pub start_time: i64,
    pub end_time: i64,
    pub visited_urls: Vec<String>,
    pub extraction_results: Vec<ExtractionResult>,
    pub form_count: usize,
    pub payload_count: usize,
    pub attempts: Vec<Attempt>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub counts: CategoryCounts,
}

impl ReportData {
    pub fn from_outcome(outcome: &ScanOutcome) -> Self {
        let mut counts = CategoryCounts::default();
        for vulnerability in &outcome.vulnerabilities {
            match vulnerability.category {
                Category::Sqli => counts.sqli += 1,
                Category::Xss => counts.xss += 1,
            }
        }

        Self {
            run_id: outcome.run_id.clone(),
            target: outcome.target.clone(),
            max_depth: outcome.max_depth,
            start_time: outcome.start_time,
            end_time: outcome.end_time,
            visited_urls: outcome.combined_urls(),
            extraction_results: outcome.extraction_results.clone(),
            form_count: outcome.forms.len(),
            payload_count: outcome.payload_count,
            attempts: outcome.attempts.clone(),
            vulnerabilities: outcome.vulnerabilities.clone(),
            counts,
        }
    }

    pub fn failed_attempts(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.outcome.starts_with("request failed"))
            .count()
    }

    fn format_timestamp(&self, timestamp: i64) -> String {
        use chrono::{DateTime, Utc};
        let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
        datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}

/// Attempt groups in report order: findings by type, then clean, then failures.
fn attempt_rank(outcome: &str) -> usize {
    if outcome == Classification::SqlInjection.outcome() {
        0
    } else if outcome == Classification::ReflectedXss.outcome() {
        1
    } else if outcome == Classification::Clean.outcome() {
        2
    } else {
        3
    }
}

fn attempt_group_title(rank: usize) -> &'static str {
    match rank {
        0 => "SQL Injection",
        1 => "Reflected XSS",
        2 => "No Vulnerability",
        _ => "Request Failed",
    }
}

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push('\n');
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                        FORMPROBE SCAN REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Run ID:       {}\n", data.run_id));
    report.push_str(&format!("Target:       {}\n", data.target));
    report.push_str(&format!("Scan Date:    {}\n", data.format_timestamp(data.start_time)));
    report.push_str(&format!(
        "Duration:     {} seconds\n",
        data.end_time - data.start_time
    ));
    report.push_str(&format!("Max Depth:    {}\n", data.max_depth));
    report.push_str(&format!("Pages Found:  {}\n", data.visited_urls.len()));
    report.push_str(&format!("Forms:        {}\n", data.form_count));
    report.push_str(&format!(
        "Attempts:     {} ({} failed to send)\n",
        data.attempts.len(),
        data.failed_attempts()
    ));
    report.push('\n');

    section(&mut report, "SUMMARY");
    report.push_str(&format!(
        "Total Vulnerabilities: {}\n\n",
        data.vulnerabilities.len()
    ));
    if data.counts.sqli > 0 {
        report.push_str(&format!("  [SQLI]  {}\n", data.counts.sqli));
    }
    if data.counts.xss > 0 {
        report.push_str(&format!("  [XSS]   {}\n", data.counts.xss));
    }
    report.push('\n');

    if !data.vulnerabilities.is_empty() {
        section(&mut report, "VULNERABILITIES");
        for (idx, vulnerability) in data.vulnerabilities.iter().enumerate() {
            report.push_str(&format!("[{}] {}\n", idx + 1, vulnerability.category.title()));
            report.push_str(&format!("Form:         {}\n", vulnerability.form_action));
            report.push_str(&format!("Payload:      {}\n", vulnerability.payload));
            report.push_str(&format!("Status:       {}\n", vulnerability.status));
            report.push('\n');
            report.push_str(THIN_RULE);
            report.push('\n');
        }
    }

    if !data.attempts.is_empty() {
        section(&mut report, "ATTEMPTS");
        let mut ordered: Vec<&Attempt> = data.attempts.iter().collect();
        ordered.sort_by_key(|a| attempt_rank(&a.outcome));

        let mut current_group = None;
        for attempt in ordered {
            let rank = attempt_rank(&attempt.outcome);
            if current_group != Some(rank) {
                if current_group.is_some() {
                    report.push('\n');
                }
                let count = data
                    .attempts
                    .iter()
                    .filter(|a| attempt_rank(&a.outcome) == rank)
                    .count();
                report.push_str(&format!("{} ({})\n", attempt_group_title(rank), count));
                current_group = Some(rank);
            }
            let status = attempt
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            report.push_str(&format!(
                "  {} {}  payload: {}  result: {} [{}]\n",
                attempt.method.as_str().to_uppercase(),
                attempt.form_action,
                attempt.payload,
                attempt.outcome,
                status
            ));
        }
        report.push('\n');
    }

    section(&mut report, "VISITED URLS");
    for url in &data.visited_urls {
        report.push_str(&format!("  {}\n", url));
    }
    report.push('\n');

    let pages_with_forms: Vec<_> = data
        .extraction_results
        .iter()
        .filter(|r| !r.forms.is_empty() || !r.independent_fields.is_empty())
        .collect();
    if !pages_with_forms.is_empty() {
        section(&mut report, "FORMS");
        for result in pages_with_forms {
            report.push_str(&format!("{}\n", result.url));
            for form in &result.forms {
                let names: Vec<_> = form.fields.iter().map(|f| f.name.as_str()).collect();
                report.push_str(&format!(
                    "  {} {}  [{}]\n",
                    form.method.as_str().to_uppercase(),
                    form.action,
                    names.join(", ")
                ));
            }
            for field in &result.independent_fields {
                report.push_str(&format!("  (standalone) {} {}\n", field.field_type, field.name));
            }
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                          End of Report\n");
    report.push_str(RULE);
    report.push_str("\nGenerated by formprobe\n");
    report.push_str("For authorized security testing only.\n\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "formprobe",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json",
                "disclaimer": "For authorized security testing only"
            },
            "run": {
                "id": data.run_id,
                "target": data.target,
                "max_depth": data.max_depth,
                "start_time": format_iso8601_timestamp(data.start_time),
                "end_time": format_iso8601_timestamp(data.end_time),
                "duration_seconds": data.end_time - data.start_time
            },
            "summary": {
                "visited_urls": data.visited_urls.len(),
                "forms": data.form_count,
                "payloads": data.payload_count,
                "attempts": data.attempts.len(),
                "failed_attempts": data.failed_attempts(),
                "vulnerabilities": data.vulnerabilities.len(),
                "by_category": data.counts
            },
            "visited_urls": data.visited_urls,
            "extraction_results": data.extraction_results,
            "attempts": data.attempts,
            "vulnerabilities": data.vulnerabilities
        }
    });

    Ok(serde_json::to_string_pretty(&json_report)?)
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data),
    }
}

pub fn save_report(content: &str, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn format_iso8601_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}
