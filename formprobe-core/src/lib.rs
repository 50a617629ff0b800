pub mod classify;
pub mod error;
pub mod fuzz;
pub mod normalize;
pub mod payload;
pub mod report;
pub mod scan;

pub use error::{ProbeError, Result};
pub use fuzz::{Attempt, FuzzOptions, FuzzOutcome, Vulnerability, execute_fuzz};
pub use normalize::collect_forms;
pub use payload::{Category, Payload, default_payloads};
pub use report::{
    ReportData, ReportFormat, generate_json_report, generate_report, generate_text_report,
    save_report,
};
pub use scan::{
    Driver, ScanOptions, ScanOutcome, execute_scan, execute_scan_with_session, validate_base_url,
    validate_max_depth, validate_options,
};
