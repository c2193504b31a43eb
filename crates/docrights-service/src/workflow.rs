//! Protection workflow state machine.
//!
//! ```text
//! Staged -> HandleOpened -> [Unlabeled] -> [Relabeled -> Committed] -> Released -> Succeeded
//!                                                                          \-> Failed
//! ```
//!
//! `Unlabeled` runs when the configuration removes existing protection; a
//! remove-only run stops there. `Relabeled` and `Committed` run when new
//! protection is applied. `Released` always runs: the engine context is shut
//! down exactly once, whether the run succeeded, failed or hit the deadline.

use crate::config::MissingLabelPolicy;
use crate::dispatcher::WorkflowConfig;
use crate::engine::{select_label, EngineContext, LabelInfo, ProtectionEngine, ProtectionHandle};
use crate::error::{FailureKind, ProtectionError, ProtectionResult};
use docrights_model::{Capability, PlanBuilder, ProtectionPlan, RightsGrant};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Justification recorded when a label is removed.
pub const REMOVE_LABEL_JUSTIFICATION: &str = "Removing label via document protection service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Staged,
    HandleOpened,
    Unlabeled,
    Relabeled,
    Committed,
    Released,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Success,
    Failed,
}

/// Outcome of one workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub status: WorkflowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub transitions: Vec<WorkflowState>,
    /// The plan submitted to the engine, when protection was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<ProtectionPlan>,
    /// Label applied, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<LabelInfo>,
    #[serde(skip)]
    error: Option<ProtectionError>,
}

impl WorkflowResult {
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Success
    }

    pub fn final_state(&self) -> Option<WorkflowState> {
        self.transitions.last().copied()
    }

    /// Convert a failed result into its error.
    pub fn into_result(self) -> ProtectionResult<Self> {
        match self.error.clone() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Settings shared by every run.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Label to apply, matched by exact name.
    pub label_name: String,
    /// Identity the engine acts for when applying protection and label.
    pub delegated_identity: String,
    pub missing_label_policy: MissingLabelPolicy,
    /// Covers handle open through the final commit.
    pub deadline: Duration,
}

#[derive(Default)]
struct Applied {
    plan: Option<ProtectionPlan>,
    label: Option<LabelInfo>,
}

/// Drives one request through the engine.
#[derive(Debug, Clone)]
pub struct ProtectionWorkflow {
    settings: WorkflowSettings,
}

impl ProtectionWorkflow {
    pub fn new(settings: WorkflowSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Run the workflow on a staged input.
    ///
    /// `plan` is required when `config.apply_new` is set; grants already on
    /// the document are appended to it when `config.merge_existing` is set.
    #[instrument(skip(self, engine, plan), fields(input = %input.display(), output = %output.display()))]
    pub async fn run(
        &self,
        engine: &dyn ProtectionEngine,
        config: WorkflowConfig,
        plan: Option<PlanBuilder>,
        input: &Path,
        output: &Path,
    ) -> WorkflowResult {
        let mut transitions = vec![WorkflowState::Staged];

        let outcome = match engine.create_context().await {
            Ok(context) => {
                let deadline = self.settings.deadline;
                let driven = tokio::time::timeout(
                    deadline,
                    self.drive(context.as_ref(), config, plan, input, output, &mut transitions),
                )
                .await
                .unwrap_or_else(|_| {
                    warn!(deadline_ms = deadline.as_millis() as u64, "Protection workflow deadline expired");
                    Err(ProtectionError::Timeout(deadline))
                });

                release(context.as_ref()).await;
                driven
            }
            Err(e) => Err(ProtectionError::EngineHandle(format!(
                "cannot create engine context: {}",
                e
            ))),
        };
        transitions.push(WorkflowState::Released);

        match outcome {
            Ok(applied) => {
                transitions.push(WorkflowState::Succeeded);
                info!("Protection workflow succeeded");
                WorkflowResult {
                    input_path: input.to_path_buf(),
                    output_path: output.to_path_buf(),
                    status: WorkflowStatus::Success,
                    failure: None,
                    cause: None,
                    transitions,
                    plan: applied.plan,
                    label: applied.label,
                    error: None,
                }
            }
            Err(err) => {
                transitions.push(WorkflowState::Failed);
                error!(error = %err, "Protection workflow failed");
                WorkflowResult {
                    input_path: input.to_path_buf(),
                    output_path: output.to_path_buf(),
                    status: WorkflowStatus::Failed,
                    failure: Some(err.kind()),
                    cause: Some(err.to_string()),
                    transitions,
                    plan: None,
                    label: None,
                    error: Some(err),
                }
            }
        }
    }

    async fn drive(
        &self,
        context: &dyn EngineContext,
        config: WorkflowConfig,
        plan: Option<PlanBuilder>,
        input: &Path,
        output: &Path,
        transitions: &mut Vec<WorkflowState>,
    ) -> ProtectionResult<Applied> {
        let plan = match (config.apply_new, plan) {
            (true, Some(plan)) => Some(plan),
            (true, None) => {
                return Err(ProtectionError::NoValidPermissions(
                    "no rights plan for a protecting workflow".to_string(),
                ))
            }
            (false, _) => None,
        };

        let label = if config.apply_new {
            self.target_label(context).await?
        } else {
            None
        };

        let mut handle = context
            .open_handle(input)
            .await
            .map_err(|e| ProtectionError::EngineHandle(e.to_string()))?;
        transitions.push(WorkflowState::HandleOpened);
        debug!("Handle opened");

        let existing = if config.merge_existing {
            let grants = handle.current_grants().await.map_err(handle_error)?;
            debug!(grants = grants.len(), "Read existing grants");
            grants
        } else {
            Vec::new()
        };

        if config.remove_existing {
            self.unlabel(handle.as_mut(), output).await?;
            transitions.push(WorkflowState::Unlabeled);
            debug!("Existing label and protection removed");
        }

        let Some(builder) = plan else {
            return Ok(Applied::default());
        };

        let plan = finalize(builder, existing, config.owner_override);
        self.relabel(handle.as_mut(), &plan, label.as_ref()).await?;
        transitions.push(WorkflowState::Relabeled);

        handle.commit(output).await.map_err(commit_error)?;
        transitions.push(WorkflowState::Committed);
        debug!(grants = plan.len(), "Protected document committed");

        Ok(Applied {
            plan: Some(plan),
            label,
        })
    }

    async fn target_label(&self, context: &dyn EngineContext) -> ProtectionResult<Option<LabelInfo>> {
        let labels = context.labels().await.map_err(handle_error)?;
        match select_label(&labels, &self.settings.label_name) {
            Some(label) => Ok(Some(label.clone())),
            None => match self.settings.missing_label_policy {
                MissingLabelPolicy::Proceed => {
                    warn!(label = %self.settings.label_name, "Label not found, protecting without a label");
                    Ok(None)
                }
                MissingLabelPolicy::Fail => Err(ProtectionError::EngineHandle(format!(
                    "label '{}' not found in catalog",
                    self.settings.label_name
                ))),
            },
        }
    }

    async fn unlabel(&self, handle: &mut dyn ProtectionHandle, output: &Path) -> ProtectionResult<()> {
        if handle.has_protection().await.map_err(handle_error)? {
            handle.remove_protection().await.map_err(handle_error)?;
        }
        handle
            .delete_label(REMOVE_LABEL_JUSTIFICATION)
            .await
            .map_err(handle_error)?;
        handle.commit(output).await.map_err(commit_error)
    }

    async fn relabel(
        &self,
        handle: &mut dyn ProtectionHandle,
        plan: &ProtectionPlan,
        label: Option<&LabelInfo>,
    ) -> ProtectionResult<()> {
        let delegated = &self.settings.delegated_identity;
        handle
            .apply_protection(plan, delegated)
            .await
            .map_err(handle_error)?;
        if let Some(label) = label {
            handle
                .apply_label(&label.id, delegated)
                .await
                .map_err(handle_error)?;
        }
        Ok(())
    }
}

/// Append carried-over grants and freeze the plan.
///
/// With `owner_override`, a carried grant holding nothing but `OWNER` is
/// dropped rather than kept with an empty capability set.
pub fn finalize(builder: PlanBuilder, existing: Vec<RightsGrant>, owner_override: bool) -> ProtectionPlan {
    if owner_override {
        for grant in existing.iter().filter(|g| g.without(Capability::Owner).is_none()) {
            debug!(principals = ?grant.principals(), "Dropping carried grant that only held OWNER");
        }
    }
    builder.with_carried_over(existing, owner_override).build()
}

async fn release(context: &dyn EngineContext) {
    match context.shutdown().await {
        Ok(()) => debug!("Engine context released"),
        Err(e) => warn!(error = %e, "Engine context shutdown failed"),
    }
}

fn handle_error(e: crate::engine::EngineError) -> ProtectionError {
    ProtectionError::EngineHandle(e.to_string())
}

fn commit_error(e: crate::engine::EngineError) -> ProtectionError {
    ProtectionError::EngineCommit(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Operation;
    use crate::testing::{EngineCall, EngineStep, RecordingEngine};
    use docrights_model::Capability;
    use tempfile::TempDir;

    fn settings() -> WorkflowSettings {
        WorkflowSettings {
            label_name: "Confidential".to_string(),
            delegated_identity: "svc@contoso.com".to_string(),
            missing_label_policy: MissingLabelPolicy::Proceed,
            deadline: Duration::from_secs(5),
        }
    }

    fn builder() -> PlanBuilder {
        PlanBuilder::new("svc@contoso.com")
            .unwrap()
            .with_subject(RightsGrant::single("a@x.com", [Capability::Edit]).unwrap())
    }

    struct Paths {
        _dir: TempDir,
        input: PathBuf,
        output: PathBuf,
    }

    fn paths() -> Paths {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.docx");
        std::fs::write(&input, b"doc").unwrap();
        let output = dir.path().join("out.docx");
        Paths {
            _dir: dir,
            input,
            output,
        }
    }

    #[tokio::test]
    async fn test_protect_transitions() {
        let p = paths();
        let engine = RecordingEngine::new().with_label("lbl-1", "Confidential");
        let result = ProtectionWorkflow::new(settings())
            .run(
                &engine,
                Operation::Protect.workflow_config(),
                Some(builder()),
                &p.input,
                &p.output,
            )
            .await;

        assert!(result.is_success());
        assert_eq!(
            result.transitions,
            vec![
                WorkflowState::Staged,
                WorkflowState::HandleOpened,
                WorkflowState::Unlabeled,
                WorkflowState::Relabeled,
                WorkflowState::Committed,
                WorkflowState::Released,
                WorkflowState::Succeeded,
            ]
        );
        assert_eq!(result.label.unwrap().id, "lbl-1");
        assert_eq!(engine.shutdowns(), 1);
        assert!(p.output.exists());
    }

    #[tokio::test]
    async fn test_remove_only_stops_after_unlabel() {
        let p = paths();
        let engine = RecordingEngine::new().with_existing_protection(
            vec![RightsGrant::owner("old@x.com").unwrap()],
            Some("lbl-1"),
        );
        let result = ProtectionWorkflow::new(settings())
            .run(
                &engine,
                Operation::Unprotect.workflow_config(),
                None,
                &p.input,
                &p.output,
            )
            .await;

        assert!(result.is_success());
        assert_eq!(
            result.transitions,
            vec![
                WorkflowState::Staged,
                WorkflowState::HandleOpened,
                WorkflowState::Unlabeled,
                WorkflowState::Released,
                WorkflowState::Succeeded,
            ]
        );
        assert!(result.plan.is_none());
        assert!(engine.calls().contains(&EngineCall::RemoveProtection));
    }

    #[tokio::test]
    async fn test_missing_label_proceeds_by_default() {
        let p = paths();
        let engine = RecordingEngine::new();
        let result = ProtectionWorkflow::new(settings())
            .run(
                &engine,
                Operation::Protect.workflow_config(),
                Some(builder()),
                &p.input,
                &p.output,
            )
            .await;

        assert!(result.is_success());
        assert!(result.label.is_none());
        assert!(!engine
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::ApplyLabel { .. })));
    }

    #[tokio::test]
    async fn test_missing_label_can_fail_before_mutation() {
        let p = paths();
        let engine = RecordingEngine::new();
        let mut settings = settings();
        settings.missing_label_policy = MissingLabelPolicy::Fail;

        let result = ProtectionWorkflow::new(settings)
            .run(
                &engine,
                Operation::Protect.workflow_config(),
                Some(builder()),
                &p.input,
                &p.output,
            )
            .await;

        assert_eq!(result.failure, Some(FailureKind::EngineHandle));
        assert!(!engine.calls().iter().any(|c| matches!(c, EngineCall::Open(_))));
        assert_eq!(engine.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_commit_failure_still_releases() {
        let p = paths();
        let engine = RecordingEngine::new().failing(EngineStep::Commit);
        let result = ProtectionWorkflow::new(settings())
            .run(
                &engine,
                Operation::Protect.workflow_config(),
                Some(builder()),
                &p.input,
                &p.output,
            )
            .await;

        assert_eq!(result.failure, Some(FailureKind::EngineCommit));
        assert_eq!(result.final_state(), Some(WorkflowState::Failed));
        assert!(result.transitions.contains(&WorkflowState::Released));
        assert!(!result.transitions.contains(&WorkflowState::Unlabeled));
        assert_eq!(engine.shutdowns(), 1);
        assert!(result.into_result().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_failure_is_swallowed() {
        let p = paths();
        let engine = RecordingEngine::new().failing(EngineStep::Shutdown);
        let result = ProtectionWorkflow::new(settings())
            .run(
                &engine,
                Operation::Protect.workflow_config(),
                Some(builder()),
                &p.input,
                &p.output,
            )
            .await;

        assert!(result.is_success());
        assert_eq!(engine.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_deadline_expiry_releases_context() {
        let p = paths();
        let engine = RecordingEngine::new().with_commit_delay(Duration::from_secs(30));
        let mut settings = settings();
        settings.deadline = Duration::from_millis(50);

        let result = ProtectionWorkflow::new(settings)
            .run(
                &engine,
                Operation::Protect.workflow_config(),
                Some(builder()),
                &p.input,
                &p.output,
            )
            .await;

        assert_eq!(result.failure, Some(FailureKind::Timeout));
        assert_eq!(engine.shutdowns(), 1);
    }

    #[test]
    fn test_finalize_strips_owner_from_carried_grants() {
        let existing = vec![RightsGrant::single("c@x.com", [Capability::Owner, Capability::View]).unwrap()];
        let plan = finalize(builder(), existing, true);

        assert_eq!(
            plan.carried_grants()[0],
            RightsGrant::single("c@x.com", [Capability::View]).unwrap()
        );
    }

    #[test]
    fn test_finalize_drops_owner_only_grants() {
        let existing = vec![
            RightsGrant::single("old-owner@x.com", [Capability::Owner]).unwrap(),
            RightsGrant::single("c@x.com", [Capability::View]).unwrap(),
        ];

        let overridden = finalize(builder(), existing.clone(), true);
        assert_eq!(overridden.carried_grants().len(), 1);
        assert!(overridden.carried_grants()[0].has_principal("c@x.com"));

        let kept = finalize(builder(), existing, false);
        assert_eq!(kept.carried_grants().len(), 2);
    }
}
