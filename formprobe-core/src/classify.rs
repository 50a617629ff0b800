// Response classification heuristics

use crate::payload::Category;
use regex::RegexSet;
use std::sync::LazyLock;

/// Database error strings that leak through when injected quotes break a query.
pub const SQL_ERROR_PATTERNS: &[&str] = &[
    r"syntax error",
    r"sql syntax",
    r"unclosed quotation mark",
    r"unterminated string constant",
    r"you have an error in your sql syntax",
    r"warning: mysql",
    r"sqlite error",
    r"pg_query\(\):",
    r"pdoexception",
];

static SQL_ERRORS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(SQL_ERROR_PATTERNS.iter().map(|p| format!("(?i){}", p)))
        .expect("SQL error patterns are valid regexes")
});

/// Outcome of checking one response. Checks run in order and the first hit wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    SqlInjection,
    ReflectedXss,
    Clean,
}

impl Classification {
    pub fn category(&self) -> Option<Category> {
        match self {
            Classification::SqlInjection => Some(Category::Sqli),
            Classification::ReflectedXss => Some(Category::Xss),
            Classification::Clean => None,
        }
    }

    /// Outcome string recorded on the attempt.
    pub fn outcome(&self) -> &'static str {
        match self {
            Classification::SqlInjection => "sql injection found",
            Classification::ReflectedXss => "reflected xss found",
            Classification::Clean => "no vulnerability",
        }
    }
}

pub fn has_sql_error(body: &str) -> bool {
    SQL_ERRORS.is_match(body)
}

pub fn reflects_payload(body: &str, payload: &str) -> bool {
    !payload.is_empty() && body.contains(payload)
}

/// Pure function of `(body, payload)`.
pub fn classify(body: &str, payload: &str) -> Classification {
    if has_sql_error(body) {
        Classification::SqlInjection
    } else if reflects_payload(body, payload) {
        Classification::ReflectedXss
    } else {
        Classification::Clean
    }
}
