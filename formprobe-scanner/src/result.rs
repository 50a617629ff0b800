use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method a form submits with. Anything that is not `post` submits as `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    pub fn from_attr(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(ref v) if v == "post" => Method::Post,
            _ => Method::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, sendable form control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub tag: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub name: String,
}

impl Field {
    /// Builds a field, returning `None` for controls without a usable name.
    ///
    /// An `input` without a `type` is a text input, as browsers treat it;
    /// other tags take their tag name as the type.
    pub fn new(tag: &str, field_type: Option<&str>, name: Option<&str>) -> Option<Self> {
        let name = name.map(str::trim).filter(|n| !n.is_empty())?;
        let tag = tag.to_lowercase();
        let field_type = field_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(|| match tag.as_str() {
                "input" => "text".to_string(),
                other => other.to_string(),
            });

        Some(Self {
            tag,
            field_type,
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub action: String,
    pub method: Method,
    pub fields: Vec<Field>,
}

impl Form {
    pub fn new(action: String, method: Method, fields: Vec<Field>) -> Self {
        Self {
            action,
            method,
            fields,
        }
    }
}

/// Forms and free-standing fields found on one rendered page, frames included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub url: String,
    pub forms: Vec<Form>,
    pub independent_fields: Vec<Field>,
}

impl ExtractionResult {
    pub fn new(url: String) -> Self {
        Self {
            url,
            forms: Vec::new(),
            independent_fields: Vec::new(),
        }
    }

    pub fn merge(&mut self, forms: Vec<Form>, fields: Vec<Field>) {
        self.forms.extend(forms);
        self.independent_fields.extend(fields);
    }
}
