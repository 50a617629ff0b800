// Turns per-page extraction results into the list of forms to fuzz

use formprobe_scanner::{ExtractionResult, Form, Method};
use tracing::debug;

/// Flattens extraction results into sendable forms.
///
/// Forms without named fields are dropped. Each named field found outside a
/// form becomes a single-field GET form targeting the page it was found on.
/// Duplicate forms across pages are kept.
pub fn collect_forms(results: &[ExtractionResult]) -> Vec<Form> {
    let mut forms = Vec::new();

    for result in results {
        for form in &result.forms {
            let fields: Vec<_> = form
                .fields
                .iter()
                .filter(|field| !field.name.is_empty())
                .cloned()
                .collect();
            if fields.is_empty() {
                debug!(page = %result.url, action = %form.action, "form has no named fields, dropped");
                continue;
            }
            forms.push(Form::new(form.action.clone(), form.method, fields));
        }

        for field in result
            .independent_fields
            .iter()
            .filter(|field| !field.name.is_empty())
        {
            forms.push(Form::new(
                result.url.clone(),
                Method::Get,
                vec![field.clone()],
            ));
        }
    }

    forms
}
