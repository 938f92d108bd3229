//! AsterixDB query service client
//!
//! POST /query/service with a JSON body `{"statement": ..., "format": "json"}`.
//! The response must carry a `results` array.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct QueryServiceResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    results: Option<Vec<Value>>,
    #[serde(default)]
    errors: Option<Vec<QueryServiceError>>,
}

#[derive(Debug, Deserialize)]
struct QueryServiceError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
}

/// Failure of one statement round trip. Callers map it onto their own
/// fault kind (metadata fetch vs. execution).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementError {
    pub message: String,
    /// Absent for transport errors and timeouts.
    pub status: Option<u16>,
    pub body: Option<String>,
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Clone)]
pub struct AsterixClient {
    endpoint: String,
    client: Client,
}

impl AsterixClient {
    /// `endpoint` is the full query service URL, e.g. `http://localhost:19002/query/service`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| {
                crate::error::NlqError::Config(format!("Failed to create HTTP client for AsterixDB: {}", e))
            })?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one statement and return its `results` rows.
    pub async fn run_statement(&self, statement: &str) -> Result<Vec<Value>, StatementError> {
        debug!("Submitting statement to {}: {}", self.endpoint, statement);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&StatementRequest {
                statement,
                format: "json",
            })
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("AsterixDB request timed out: {}", e)
                } else {
                    format!("AsterixDB request failed: {}", e)
                };
                error!("{}", message);
                StatementError {
                    message,
                    status: None,
                    body: None,
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| StatementError {
            message: format!("Failed to read AsterixDB response: {}", e),
            status: Some(status.as_u16()),
            body: None,
        })?;

        let parsed: Option<QueryServiceResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let detail = parsed
                .as_ref()
                .and_then(|r| r.errors.as_ref())
                .map(|errors| describe_errors(errors))
                .unwrap_or_else(|| "no error detail".to_string());
            error!("AsterixDB returned status {}: {}", status, detail);
            return Err(StatementError {
                message: format!("AsterixDB returned status {}: {}", status, detail),
                status: Some(status.as_u16()),
                body: Some(text),
            });
        }

        let parsed = parsed.ok_or_else(|| StatementError {
            message: "AsterixDB response is not a JSON object".to_string(),
            status: Some(status.as_u16()),
            body: Some(text.clone()),
        })?;

        if let Some(errors) = parsed.errors.as_ref().filter(|errors| !errors.is_empty()) {
            return Err(StatementError {
                message: format!("AsterixDB reported errors: {}", describe_errors(errors)),
                status: Some(status.as_u16()),
                body: Some(text),
            });
        }

        match parsed.results {
            Some(rows) => {
                debug!(
                    "AsterixDB statement finished with status {:?}, {} rows",
                    parsed.status,
                    rows.len()
                );
                Ok(rows)
            }
            None => Err(StatementError {
                message: "AsterixDB response has no results array".to_string(),
                status: Some(status.as_u16()),
                body: Some(text),
            }),
        }
    }
}

fn describe_errors(errors: &[QueryServiceError]) -> String {
    errors
        .iter()
        .map(|e| match (e.code, e.msg.as_deref()) {
            (Some(code), Some(msg)) => format!("[{}] {}", code, msg),
            (None, Some(msg)) => msg.to_string(),
            (Some(code), None) => format!("[{}]", code),
            (None, None) => "unknown error".to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(StatementRequest {
            statement: "SELECT VALUE 1;",
            format: "json",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"statement": "SELECT VALUE 1;", "format": "json"}));
    }

    #[test]
    fn test_describe_errors() {
        let errors: Vec<QueryServiceError> = serde_json::from_str(
            r#"[{"code": 1, "msg": "Cannot find dataset Users"}, {"msg": "second"}]"#,
        )
        .unwrap();
        assert_eq!(describe_errors(&errors), "[1] Cannot find dataset Users; second");
    }

    #[test]
    fn test_client_keeps_endpoint() {
        let client = AsterixClient::new("http://cc:19002/query/service", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint(), "http://cc:19002/query/service");
    }

    #[test]
    fn test_statement_error_display() {
        let err = StatementError {
            message: "boom".to_string(),
            status: Some(500),
            body: None,
        };
        assert_eq!(err.to_string(), "boom (status 500)");
    }
}
