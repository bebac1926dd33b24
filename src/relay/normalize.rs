//! Validation and shaping of an incoming test request.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::{Headers, HttpMethod};

/// Test request exactly as submitted by a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTestRequest {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: Option<Map<String, Value>>,
    #[serde(default)]
    pub body: Option<Value>,
}

/// A validated request ready for the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSpec {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Request method and URL are required")]
    MissingMethodOrUrl,

    #[error("header '{name}' must be a string, number or boolean")]
    InvalidHeader { name: String },
}

/// Validate `raw` and shape it into a [`TestSpec`].
///
/// Only a missing/blank method or URL (or an unrepresentable header value) is
/// rejected. Unknown verbs and bodies on body-less verbs pass through.
pub fn normalize(raw: RawTestRequest) -> Result<TestSpec, ValidationError> {
    let method = non_blank(raw.method).ok_or(ValidationError::MissingMethodOrUrl)?;
    let url = non_blank(raw.url).ok_or(ValidationError::MissingMethodOrUrl)?;

    let method = HttpMethod::parse(&method.trim().to_ascii_uppercase());
    let headers = match raw.headers {
        Some(map) => flatten_headers(map)?,
        None => Headers::new(),
    };

    Ok(TestSpec {
        method,
        url,
        headers,
        body: raw.body.filter(|b| !b.is_null()),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn flatten_headers(map: Map<String, Value>) -> Result<Headers, ValidationError> {
    let mut headers = Headers::new();
    for (name, value) in map {
        let rendered = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ValidationError::InvalidHeader { name });
            }
        };
        headers.insert(name, rendered);
    }
    Ok(headers)
}
