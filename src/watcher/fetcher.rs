use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Last build reported by a status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStatus {
    pub number: i64,
    pub state: Option<String>,
    pub message: Option<String>,
}

/// Outcome of polling one status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Transport failure, timeout or non-2xx answer. Worth retrying.
    Unreachable(String),
    /// The endpoint answered, but not with a build status document.
    Invalid(String),
    Valid(BuildStatus),
}

impl FetchResult {
    /// Whether the HTTP transaction completed.
    pub fn is_ok(&self) -> bool {
        !matches!(self, FetchResult::Unreachable(_))
    }

    /// Whether the body parsed into a build status.
    pub fn is_valid(&self) -> bool {
        matches!(self, FetchResult::Valid(_))
    }
}

#[derive(Deserialize)]
struct StatusDocument {
    build: BuildDocument,
}

#[derive(Deserialize)]
struct BuildDocument {
    number: Value,
    state: Option<String>,
    message: Option<String>,
}

/// Issues a single GET per status URL with a bounded timeout.
///
/// Holds no per-user state, so one instance can serve any number of
/// concurrent fetches.
#[derive(Debug, Clone)]
pub struct StatusFetcher {
    client: Client,
}

impl StatusFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("travisbot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, status_url: &str) -> FetchResult {
        let response = match self.client.get(status_url).send().await {
            Ok(res) => res,
            Err(e) => return FetchResult::Unreachable(format!("Request error: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchResult::Unreachable(format!("HTTP status code: {status}"));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return FetchResult::Unreachable(format!("Failed to read body: {e}")),
        };

        debug!("Fetched {} bytes from {}", body.len(), status_url);
        parse_status(&body)
    }
}

/// Parses a `{"build": {"number", "state", "message"}}` document.
///
/// The build number may be a JSON integer or a string holding one.
pub fn parse_status(body: &[u8]) -> FetchResult {
    let document: StatusDocument = match serde_json::from_slice(body) {
        Ok(document) => document,
        Err(e) => return FetchResult::Invalid(format!("Unexpected status document: {e}")),
    };

    let number = match &document.build.number {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match number {
        Some(number) => FetchResult::Valid(BuildStatus {
            number,
            state: document.build.state,
            message: document.build.message,
        }),
        None => FetchResult::Invalid(format!(
            "Build number is not an integer: {}",
            document.build.number
        )),
    }
}
