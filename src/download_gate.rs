/// Email-gated pack downloads
///
/// A visitor leaves an email address, the gate posts it to the form endpoint
/// together with the pack title, and only then hands out the download
/// locator.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;

use crate::catalog::{find_pack, Pack};
use crate::error::FormError;

const FORM_TIMEOUT: Duration = Duration::from_secs(10);

static EMAIL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn email_pattern() -> Option<&'static Regex> {
    EMAIL_PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

/// Check an email address, returning it trimmed
pub fn validate_email(input: &str) -> Result<&str, FormError> {
    let email = input.trim();
    if email.is_empty() {
        return Err(FormError::MissingEmail);
    }

    match email_pattern() {
        Some(pattern) if pattern.is_match(email) => Ok(email),
        _ => Err(FormError::InvalidEmail),
    }
}

/// Payload posted to the form endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateSubmission {
    pub email: String,
    /// Pack title, as shown to the visitor
    pub pack: String,
    /// RFC 3339, UTC, millisecond precision
    pub timestamp: String,
}

impl GateSubmission {
    pub fn new(email: &str, pack: &str, at: DateTime<Utc>) -> Self {
        Self {
            email: email.to_string(),
            pack: pack.to_string(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Receives gate submissions
pub trait FormClient {
    fn submit(&self, submission: &GateSubmission) -> Result<(), FormError>;
}

/// Posts submissions as JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpFormClient {
    endpoint: String,
    timeout: Duration,
}

impl HttpFormClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: FORM_TIMEOUT,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FormClient for HttpFormClient {
    fn submit(&self, submission: &GateSubmission) -> Result<(), FormError> {
        tracing::info!("Submitting download request for {}", submission.pack);

        let response = ureq::post(&self.endpoint)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .timeout(self.timeout)
            .send_json(submission);

        match response {
            Ok(response) if (200..300).contains(&response.status()) => Ok(()),
            Ok(response) => Err(FormError::Rejected {
                status: response.status(),
            }),
            Err(ureq::Error::Status(status, _)) => {
                tracing::error!("Form endpoint returned status {}", status);
                Err(FormError::Rejected { status })
            }
            Err(e) => {
                tracing::error!("Form endpoint unreachable: {}", e);
                Err(FormError::Transport(Box::new(e)))
            }
        }
    }
}

/// Proof of a successful gate submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTicket {
    pub pack: &'static Pack,
    pub download_url: String,
    pub submitted_at: String,
}

pub struct DownloadGate<C> {
    client: C,
}

impl<C: FormClient> DownloadGate<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Validate, submit, and hand out the pack's download locator
    pub fn unlock(&self, email: &str, pack_id: &str) -> Result<DownloadTicket, FormError> {
        let email = validate_email(email)?;
        let pack = find_pack(pack_id).ok_or_else(|| FormError::UnknownPack(pack_id.to_string()))?;

        let submission = GateSubmission::new(email, pack.title, Utc::now());
        self.client.submit(&submission)?;

        tracing::info!("Download unlocked: {}", pack.id);
        Ok(DownloadTicket {
            pack,
            download_url: pack.download_url.to_string(),
            submitted_at: submission.timestamp,
        })
    }
}
