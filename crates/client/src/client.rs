//! Matching-service HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). One endpoint:
//! `POST {api_base}/dedupe` with a multipart form.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};

use crate::protocol::{parse_response, DedupRequest, DedupResponse};

/// The service may run expensive batch matching; two hours mirrors the
/// web client's budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Anything that can answer a dedup submission. The orchestrator only sees
/// this trait, so tests can stand in a scripted service.
pub trait DedupService {
    fn submit(&self, request: &DedupRequest) -> Result<DedupResponse, RemoteFailure>;
}

/// Error type for dedup service calls. Every variant is reported to the
/// user as a single failure; the caller owns rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    /// Connection / transport error
    Network(String),
    /// Request exceeded the configured timeout
    Timeout(String),
    /// Non-success status code with response body
    Http(u16, String),
    /// Body was not one of the two response shapes
    Parse(String),
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteFailure::Network(msg) => write!(f, "Network error: {}", msg),
            RemoteFailure::Timeout(msg) => write!(f, "Timeout: {}", msg),
            RemoteFailure::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            RemoteFailure::Parse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for RemoteFailure {}

/// Dedup service client (blocking).
#[derive(Clone)]
pub struct DedupClient {
    http: reqwest::blocking::Client,
    api_base: String,
}

impl DedupClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_timeout(api_base, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_base: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("dedupe/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/dedupe", self.api_base)
    }

    fn build_form(request: &DedupRequest) -> Result<Form, RemoteFailure> {
        let file_part = Part::bytes(request.file.bytes.clone())
            .file_name(request.file.file_name.clone())
            .mime_str(mime_for(&request.file.file_name))
            .map_err(|e| RemoteFailure::Network(e.to_string()))?;

        let mut form = Form::new().part("files", file_part);
        for (name, value) in request.text_parts() {
            form = form.text(name, value);
        }
        Ok(form)
    }
}

impl DedupService for DedupClient {
    fn submit(&self, request: &DedupRequest) -> Result<DedupResponse, RemoteFailure> {
        let url = self.endpoint();
        log::info!(
            "submitting {} ({} bytes, {} labeled pairs, reprocessing={}) to {}",
            request.file.file_name,
            request.file.bytes.len(),
            request.labeled_pair_count(),
            request.is_reprocessing,
            url,
        );

        let form = Self::build_form(request)?;
        let response = self.http.post(&url)
            .multipart(form)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteFailure::Timeout(e.to_string())
                } else {
                    RemoteFailure::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().unwrap_or_default();
            log::warn!("dedup service answered HTTP {}", status);
            return Err(RemoteFailure::Http(status, body));
        }

        let body: serde_json::Value = response.json()
            .map_err(|e| RemoteFailure::Parse(e.to_string()))?;
        let parsed = parse_response(body)?;

        match &parsed {
            DedupResponse::NeedsTraining(pairs) => {
                log::info!("service needs training: {} candidate pairs", pairs.len());
            }
            DedupResponse::Groups(groups) => {
                log::info!("service returned {} duplicate groups", groups.len());
            }
        }
        Ok(parsed)
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        "text/csv"
    } else if lower.ends_with(".xlsx") {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    } else if lower.ends_with(".xls") {
        "application/vnd.ms-excel"
    } else {
        "application/octet-stream"
    }
}
