//! Mail delivery through the Graph `sendMail` endpoint.

use super::{Notifier, NotifyError, NotifyResult, Substitutions};
use crate::config::NotificationConfig;
use crate::retry::{with_retry_if, RetryConfig};
use async_trait::async_trait;
use docrights_auth::{scope_for_resource, TokenProvider};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Sends plain-text mail from a service mailbox.
#[derive(Clone)]
pub struct GraphMailNotifier {
    client: Client,
    base_url: String,
    sender: String,
    scope: String,
    subject_prefix: String,
    tokens: Arc<dyn TokenProvider>,
    retry: RetryConfig,
}

impl GraphMailNotifier {
    /// Create a notifier sending as `sender`.
    pub fn new(
        config: &NotificationConfig,
        sender: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            Client::new()
        });

        Self {
            client,
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            sender: sender.into(),
            scope: scope_for_resource(&config.graph_resource),
            subject_prefix: config.subject_prefix.clone(),
            tokens,
            retry: RetryConfig::with_attempts(config.max_retries),
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1.0/users/{}/sendMail", self.base_url, self.sender)
    }

    async fn post(&self, request: &SendMailRequest<'_>) -> NotifyResult<()> {
        let token = self.tokens.acquire_token(&self.scope).await?;
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", token.bearer_header())
            .json(request)
            .send()
            .await?;
        handle_response(response).await
    }
}

#[async_trait]
impl Notifier for GraphMailNotifier {
    #[instrument(skip(self, body_template, substitutions), fields(file = %substitutions.file_name))]
    async fn send(
        &self,
        recipient: &str,
        subject_template: &str,
        body_template: &str,
        substitutions: &Substitutions,
    ) -> NotifyResult<()> {
        let recipient = recipient.trim();
        if recipient.is_empty() || !recipient.contains('@') {
            return Err(NotifyError::InvalidRecipient(recipient.to_string()));
        }

        let subject = format!(
            "{}{}",
            self.subject_prefix,
            substitutions.render(subject_template)
        );
        let content = substitutions.render(body_template);
        let request = SendMailRequest {
            message: Message {
                subject: &subject,
                body: Body {
                    content_type: "Text",
                    content: &content,
                },
                to_recipients: vec![Recipient {
                    email_address: EmailAddress { address: recipient },
                }],
            },
            save_to_sent_items: true,
        };

        with_retry_if(&self.retry, || self.post(&request), NotifyError::is_retryable).await?;
        debug!("Mail accepted");
        Ok(())
    }
}

impl std::fmt::Debug for GraphMailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphMailNotifier")
            .field("base_url", &self.base_url)
            .field("sender", &self.sender)
            .field("scope", &self.scope)
            .finish()
    }
}

async fn handle_response(response: reqwest::Response) -> NotifyResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        error!(status = status.as_u16(), "Mail API rejected credentials");
    } else {
        warn!("Mail API error ({}): {}", status.as_u16(), message);
    }
    Err(NotifyError::ApiError {
        status: status.as_u16(),
        message,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMailRequest<'a> {
    message: Message<'a>,
    save_to_sent_items: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Message<'a> {
    subject: &'a str,
    body: Body<'a>,
    to_recipients: Vec<Recipient<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Body<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient<'a> {
    email_address: EmailAddress<'a>,
}

#[derive(Serialize)]
struct EmailAddress<'a> {
    address: &'a str,
}
