//! Notification dispatcher. Tells a candidate they were marked as a Hire.
//!
//! The pipeline only sees the `Notifier` trait; `SendGridNotifier` is the production
//! backend (SendGrid v3 mail send API). Failures are reported to the caller, which logs
//! them and moves on. Nothing here retries.
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub const SENDGRID_API_URL: &str = "https://api.sendgrid.com";
const MAIL_SEND_PATH: &str = "/v3/mail/send";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail provider rejected the message (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_hire(&self, recipient: &str, candidate_name: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: String,
    content: [Content; 1],
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: String,
}

pub fn hire_subject(candidate_name: &str) -> String {
    format!("Candidate {candidate_name} Marked as Hire")
}

pub fn hire_body(candidate_name: &str) -> String {
    format!("The candidate {candidate_name} has been marked as 'Hire' by FairAI Resume Screening.")
}

#[derive(Clone)]
pub struct SendGridNotifier {
    client: Client,
    api_key: String,
    from_email: String,
    base_url: String,
}

impl SendGridNotifier {
    pub fn new(api_key: String, from_email: String) -> Result<Self, NotifyError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            api_key,
            from_email,
            base_url: SENDGRID_API_URL.to_string(),
        })
    }

    /// Points the client at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn notify_hire(&self, recipient: &str, candidate_name: &str) -> Result<(), NotifyError> {
        let request = MailRequest {
            personalizations: [Personalization {
                to: [Address { email: recipient }],
            }],
            from: Address {
                email: &self.from_email,
            },
            subject: hire_subject(candidate_name),
            content: [Content {
                content_type: "text/plain",
                value: hire_body(candidate_name),
            }],
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, MAIL_SEND_PATH))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(recipient, status = status.as_u16(), "mail provider accepted message");
        Ok(())
    }
}
