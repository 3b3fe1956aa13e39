use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// MailerError
///
/// Why a verification email could not be handed off.
#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail API unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail API responded with {0}")]
    Rejected(StatusCode),

    /// Raised by `MockMailer::new_failing`.
    #[error("simulated mailer failure")]
    Simulated,
}

// 1. Mailer Contract
/// Mailer
///
/// Outbound email used by the verification flow. Swapping the implementation
/// (real mail API, log-only fallback, test mock) does not affect the handlers.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends the link that completes email verification for `to`.
    async fn send_verification_email(&self, to: &str, link: &str) -> Result<(), MailerError>;
}

// 2. The Real Implementation
/// HttpMailer
///
/// Posts a JSON message to a transactional mail API authenticated with a bearer key.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(api_url: &str, api_key: &str, sender: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            sender: sender.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_verification_email(&self, to: &str, link: &str) -> Result<(), MailerError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.sender,
                "to": [to],
                "subject": "Verify your email address",
                "text": format!("Finish setting up your account by visiting {link}"),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MailerError::Rejected(response.status()));
        }
        Ok(())
    }
}

// 3. Local fallback
/// LogMailer
///
/// Used when no mail API is configured: the link is written to the log and
/// nothing is kept in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_email(&self, to: &str, link: &str) -> Result<(), MailerError> {
        tracing::info!(to, link, "verification email (mail API not configured)");
        Ok(())
    }
}

// 4. The Mock Implementation (tests)
/// SentEmail
///
/// One message captured by `MockMailer`.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub link: String,
}

/// MockMailer
///
/// Records messages instead of sending them. Test double only: the record grows
/// with every send.
#[derive(Default)]
pub struct MockMailer {
    /// When true, every send returns a simulated failure.
    pub should_fail: bool,
    sent: Mutex<Vec<SentEmail>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Messages recorded so far, oldest first.
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_verification_email(&self, to: &str, link: &str) -> Result<(), MailerError> {
        if self.should_fail {
            return Err(MailerError::Simulated);
        }

        tracing::debug!(to, link, "verification email recorded by mock mailer");
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentEmail {
                to: to.to_string(),
                link: link.to_string(),
            });
        }
        Ok(())
    }
}

/// MailerState
///
/// Shared handle stored in `AppState`.
pub type MailerState = Arc<dyn Mailer>;
