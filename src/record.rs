//! The persisted audit record and the enums it carries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flattened header map. Repeated header names are joined with `", "`.
pub type Headers = BTreeMap<String, String>;

/// HTTP verb of a relayed request.
///
/// Verbs outside the enumerated set are kept verbatim in `Other` rather than
/// coerced to one of the known variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Other(String),
}

impl HttpMethod {
    /// Parse an already upper-cased method token.
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Other(s) => s,
        }
    }

    /// Whether a request body is attached to the outbound call for this verb.
    pub fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for HttpMethod {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<HttpMethod> for String {
    fn from(m: HttpMethod) -> Self {
        m.as_str().to_string()
    }
}

/// Classified result of one relay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// Remote answered with a 2xx status.
    Success,
    /// Remote answered with any other status.
    HttpError,
    /// No response frame was received (timeout, DNS, refused, reset).
    NetworkError,
    /// The request could not be built or dispatched.
    SetupError,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::HttpError => "HttpError",
            Self::NetworkError => "NetworkError",
            Self::SetupError => "SetupError",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutcomeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(Self::Success),
            "HttpError" => Ok(Self::HttpError),
            "NetworkError" => Ok(Self::NetworkError),
            "SetupError" => Ok(Self::SetupError),
            other => Err(format!("unknown outcome kind '{other}'")),
        }
    }
}

/// Immutable record of one request/response (or failure) cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub id: Uuid,
    pub method: HttpMethod,
    pub url: String,
    pub request_headers: Headers,
    pub request_body: Option<serde_json::Value>,
    pub response_status: Option<u16>,
    pub response_headers: Option<Headers>,
    pub response_body: Option<serde_json::Value>,
    pub response_time_ms: u64,
    pub outcome_kind: OutcomeKind,
    pub error_message: Option<String>,
    #[serde(with = "created_at_format")]
    pub created_at: DateTime<Utc>,
}

/// RFC 3339 with fixed microsecond precision, so stored strings sort in time order.
pub mod created_at_format {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}
