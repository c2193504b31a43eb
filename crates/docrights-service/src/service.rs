//! Request orchestration.
//!
//! [`ProtectionService::process`] runs one request end to end:
//!
//! 1. validate the request and resolve rights (no I/O)
//! 2. bootstrap the engine on first use
//! 3. stage the payload and allocate an output path
//! 4. run the workflow
//! 5. read the committed output back
//! 6. notify subjects
//! 7. clean up staged files, always

use crate::config::ServiceConfig;
use crate::dispatcher::Operation;
use crate::engine::EngineBootstrap;
use crate::error::{ProtectionError, ProtectionResult};
use crate::health::HealthChecker;
use crate::notify::NotificationTrigger;
use crate::request::ProtectionRequest;
use crate::resolution::RightsResolver;
use crate::staging::StagingManager;
use crate::workflow::{ProtectionWorkflow, WorkflowResult, WorkflowSettings};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A completed request.
#[derive(Debug, Clone, Serialize)]
pub struct ProtectionOutcome {
    pub operation: Operation,
    /// Name the caller should save the output under.
    pub output_file_name: String,
    #[serde(skip)]
    pub content: Vec<u8>,
    pub result: WorkflowResult,
    /// Notifications delivered.
    pub notified: usize,
}

/// The protection service.
#[derive(Debug, Clone)]
pub struct ProtectionService {
    config: Arc<ServiceConfig>,
    bootstrap: Arc<EngineBootstrap>,
    staging: StagingManager,
    resolver: RightsResolver,
    workflow: ProtectionWorkflow,
    notifications: NotificationTrigger,
}

impl ProtectionService {
    pub fn new(
        config: ServiceConfig,
        bootstrap: Arc<EngineBootstrap>,
        notifications: NotificationTrigger,
    ) -> Self {
        let staging = StagingManager::new(&config.staging);
        let resolver = RightsResolver::new(config.engine.service_account.clone(), config.rights.clone());
        let workflow = ProtectionWorkflow::new(WorkflowSettings {
            label_name: config.engine.label_to_apply.clone(),
            delegated_identity: config.engine.service_account.clone(),
            missing_label_policy: config.engine.missing_label_policy,
            deadline: config.deadline(),
        });

        Self {
            config: Arc::new(config),
            bootstrap,
            staging,
            resolver,
            workflow,
            notifications,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn staging(&self) -> &StagingManager {
        &self.staging
    }

    pub fn health_checker(&self) -> HealthChecker {
        HealthChecker::new(self.bootstrap.clone(), self.staging.clone())
    }

    /// Process one request.
    #[instrument(skip(self, request), fields(operation = %operation, file = %request.file_name))]
    pub async fn process(
        &self,
        operation: Operation,
        request: ProtectionRequest,
    ) -> ProtectionResult<ProtectionOutcome> {
        request.validate(&self.config.staging.unsupported_extensions)?;

        let config = operation.workflow_config();
        let plan = if config.apply_new {
            Some(self.resolver.resolve(operation, &request)?)
        } else {
            None
        };

        let engine = self.bootstrap.engine().await?;
        let input = self.staging.stage(&request.payload, &request.file_name).await?;
        debug!(input = %input.display(), "Payload staged");

        let output_file_name = operation.output_file_name(&request.file_name);
        let mut output = None;
        let outcome = async {
            let path = self
                .staging
                .allocate_output(operation.output_kind(), &output_file_name)
                .await?;
            output = Some(path.clone());

            let result = self
                .workflow
                .run(engine.as_ref(), config, plan, &input, &path)
                .await
                .into_result()?;
            let content = self.read_output(operation, &result.output_path).await?;
            Ok::<_, ProtectionError>((result, content))
        }
        .await;

        let retain_input = request.retain_input.unwrap_or(self.config.staging.retain_input);
        let retain_output = request.retain_output.unwrap_or(self.config.staging.retain_output);
        let report = self
            .staging
            .cleanup(Some(&input), output.as_deref(), retain_input, retain_output)
            .await;
        debug!(
            removed = report.removed.len(),
            retained = report.retained.len(),
            "Staging cleaned up"
        );

        let (result, content) = outcome?;
        let notified = self
            .notifications
            .fire(operation, &output_file_name, &notification_recipients(&request))
            .await;

        info!(bytes = content.len(), notified, "Request completed");
        Ok(ProtectionOutcome {
            operation,
            output_file_name,
            content,
            result,
            notified,
        })
    }

    async fn read_output(&self, operation: Operation, path: &Path) -> ProtectionResult<Vec<u8>> {
        let checked: PathBuf = self.staging.checked_output_path(path, operation.output_kind())?;
        Ok(tokio::fs::read(&checked).await?)
    }
}

/// Subjects of the request, deduplicated case-insensitively in order.
fn notification_recipients(request: &ProtectionRequest) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();
    for subject in request.subjects() {
        if !recipients.iter().any(|r| r.eq_ignore_ascii_case(&subject)) {
            recipients.push(subject);
        }
    }
    recipients
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipients_deduplicated() {
        let request = ProtectionRequest::from_bytes("a.pdf", b"x".to_vec())
            .with_subjects("a@x.com, A@X.com, b@x.com");
        assert_eq!(
            notification_recipients(&request),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
    }
}
