//! Notifications.
//!
//! After a successful run the [`NotificationTrigger`] decides what to tell
//! the subjects of the request and hands one message per recipient to a
//! [`Notifier`]. Delivery failures are logged; they never turn a successful
//! protection into a failure.

pub mod graph;

pub use graph::GraphMailNotifier;

use crate::dispatcher::Operation;
use async_trait::async_trait;
use docrights_auth::AuthError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Notification errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Mail API returned an error response.
    #[error("API error ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Token acquisition failed.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Recipient address is unusable.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

impl NotifyError {
    /// Throttling, server errors and transport failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::RequestFailed(e) => !e.is_builder() && !e.is_decode(),
            NotifyError::ApiError { status, .. } => *status == 429 || *status >= 500,
            NotifyError::Auth(_) | NotifyError::InvalidRecipient(_) => false,
        }
    }
}

/// Result type for notification delivery.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Values substituted into notification templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitutions {
    /// Output file name, without directories.
    pub file_name: String,
    pub action: String,
}

impl Substitutions {
    /// Replace `{fileName}` and `{action}`.
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{fileName}", &self.file_name)
            .replace("{action}", &self.action)
    }
}

/// Outbound message delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject_template: &str,
        body_template: &str,
        substitutions: &Substitutions,
    ) -> NotifyResult<()>;
}

/// Subject and action wording for an operation.
pub fn wording(operation: Operation) -> (&'static str, &'static str) {
    match operation {
        Operation::AddPermissions => ("Additional Permissions Applied", "Additionally Protected"),
        Operation::Unprotect => ("Protection Removed", "Unprotected"),
        _ => ("Protection Applied", "Protected"),
    }
}

/// Decides whether and what to notify after a run.
#[derive(Clone)]
pub struct NotificationTrigger {
    notifier: Option<Arc<dyn Notifier>>,
    body_template: String,
}

impl NotificationTrigger {
    pub fn new(notifier: Arc<dyn Notifier>, body_template: impl Into<String>) -> Self {
        Self {
            notifier: Some(notifier),
            body_template: body_template.into(),
        }
    }

    /// A trigger that never sends.
    pub fn disabled() -> Self {
        Self {
            notifier: None,
            body_template: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.notifier.is_some()
    }

    /// Notify each recipient; returns how many messages were delivered.
    #[instrument(skip(self, recipients), fields(recipients = recipients.len()))]
    pub async fn fire(&self, operation: Operation, output_file_name: &str, recipients: &[String]) -> usize {
        let Some(notifier) = &self.notifier else {
            return 0;
        };
        if recipients.is_empty() {
            debug!("No recipients, skipping notification");
            return 0;
        }

        let (subject, action) = wording(operation);
        let substitutions = Substitutions {
            file_name: output_file_name.to_string(),
            action: action.to_string(),
        };

        let mut delivered = 0;
        for recipient in recipients {
            match notifier
                .send(recipient, subject, &self.body_template, &substitutions)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => warn!(recipient = %recipient, error = %e, "Notification failed"),
            }
        }
        info!(delivered, subject, "Notifications sent");
        delivered
    }
}

impl std::fmt::Debug for NotificationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationTrigger")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
