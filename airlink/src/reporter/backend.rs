//! Virtual-airline backend client.
//!
//! [`AcarsBackend`] abstracts the remote ACARS API so the reporter can be
//! exercised against an in-memory fake. [`HttpBackend`] is the production
//! implementation: JSON over HTTPS with a bearer token and a 30 s transport
//! deadline, via a pooled `reqwest::Client`.

use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::report::PositionReport;

/// Transport deadline for every backend request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from backend requests.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The server answered with a status ≥ 400.
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },

    /// The request never completed: connect failure, timeout, DNS.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The response body was not the JSON we expected.
    #[error("parse response: {0}")]
    Parse(String),
}

/// The remote ACARS API surface used by the flight reporter.
pub trait AcarsBackend: Send + Sync {
    /// `POST /api/acars/start`: announce a new flight.
    fn start_flight(
        &self,
        callsign: &str,
        departure: &str,
        arrival: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// `POST /api/acars/stop`: cancel the active flight.
    fn stop_flight(&self, callsign: &str) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// `POST /api/acars/finish`: complete the active flight.
    fn finish_flight(
        &self,
        callsign: &str,
        departure: &str,
        arrival: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// `POST /api/acars/position`: deliver one position report.
    fn send_position(
        &self,
        report: &PositionReport,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// `GET /api/acars/booking`: fetch the pilot's current booking, opaque
    /// to the agent.
    fn booking(&self) -> impl Future<Output = Result<serde_json::Value, BackendError>> + Send;
}

#[derive(Serialize)]
struct FlightNotice<'a> {
    callsign: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    departure: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arrival: Option<&'a str>,
    timestamp: String,
}

impl<'a> FlightNotice<'a> {
    fn new(callsign: &'a str, departure: Option<&'a str>, arrival: Option<&'a str>) -> Self {
        Self {
            callsign,
            departure,
            arrival,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// HTTP implementation of the ACARS API.
pub struct HttpBackend {
    base_url: String,
    token: RwLock<Option<String>>,
    http: reqwest::Client,
}

impl HttpBackend {
    /// Create a client for `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            base_url: base_url.into(),
            token: RwLock::new(None),
            http,
        }
    }

    /// Install (or clear) the bearer token used for every request.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap() = token;
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = self.token.read().unwrap().as_deref() {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), BackendError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            // Prefer the server's own error message when the body carries one.
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or_else(|| format!("server returned {}", status.as_u16()));
            debug!(path, status = status.as_u16(), "backend rejected request");
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

impl AcarsBackend for HttpBackend {
    async fn start_flight(
        &self,
        callsign: &str,
        departure: &str,
        arrival: &str,
    ) -> Result<(), BackendError> {
        let notice = FlightNotice::new(callsign, Some(departure), Some(arrival));
        self.post_json("/api/acars/start", &notice).await
    }

    async fn stop_flight(&self, callsign: &str) -> Result<(), BackendError> {
        let notice = FlightNotice::new(callsign, None, None);
        self.post_json("/api/acars/stop", &notice).await
    }

    async fn finish_flight(
        &self,
        callsign: &str,
        departure: &str,
        arrival: &str,
    ) -> Result<(), BackendError> {
        let notice = FlightNotice::new(callsign, Some(departure), Some(arrival));
        self.post_json("/api/acars/finish", &notice).await
    }

    async fn send_position(&self, report: &PositionReport) -> Result<(), BackendError> {
        self.post_json("/api/acars/position", report).await
    }

    async fn booking(&self) -> Result<serde_json::Value, BackendError> {
        let response = self
            .request(reqwest::Method::GET, "/api/acars/booking")
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message: format!("server returned {}", status.as_u16()),
            });
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flight_notice_shape() {
        let notice = FlightNotice::new("BAW123", Some("EGLL"), Some("KJFK"));
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["callsign"], "BAW123");
        assert_eq!(json["departure"], "EGLL");
        assert_eq!(json["arrival"], "KJFK");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn stop_notice_omits_route() {
        let notice = FlightNotice::new("BAW123", None, None);
        let json = serde_json::to_value(&notice).unwrap();
        assert!(json.get("departure").is_none());
        assert!(json.get("arrival").is_none());
    }

    #[test]
    fn set_token_replaces_and_clears() {
        let backend = HttpBackend::new("http://127.0.0.1:1");
        backend.set_token(Some("abc".to_string()));
        assert_eq!(backend.token.read().unwrap().as_deref(), Some("abc"));
        backend.set_token(None);
        assert!(backend.token.read().unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_reports_transport_error() {
        // Port 1 is practically never listening.
        let backend = HttpBackend::new("http://127.0.0.1:1");
        let err = backend.stop_flight("BAW123").await.unwrap_err();
        assert!(matches!(err, BackendError::Unreachable(_)));
    }

    #[test]
    fn rejected_error_display_includes_status() {
        let err = BackendError::Rejected {
            status: 422,
            message: "no booking".to_string(),
        };
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("no booking"));
    }
}
