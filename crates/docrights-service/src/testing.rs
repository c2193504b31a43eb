//! In-memory test doubles.
//!
//! [`RecordingEngine`] implements the engine traits over plain files and
//! records every call, so tests can assert on the exact sequence the
//! workflow drives. Failures and delays can be injected per step.
//! [`RecordingNotifier`] captures rendered messages instead of sending them.

use crate::engine::{
    EngineContext, EngineError, EngineResult, LabelInfo, ProtectionEngine, ProtectionHandle,
};
use crate::notify::{Notifier, NotifyError, NotifyResult, Substitutions};
use async_trait::async_trait;
use docrights_model::{ProtectionPlan, RightsGrant};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Engine steps that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStep {
    Initialize,
    CreateContext,
    Labels,
    Open,
    CurrentGrants,
    RemoveProtection,
    DeleteLabel,
    ApplyProtection,
    ApplyLabel,
    Commit,
    Shutdown,
}

/// A call observed by the [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Initialize,
    CreateContext,
    Labels,
    Open(PathBuf),
    CurrentGrants,
    HasProtection,
    RemoveProtection,
    DeleteLabel(String),
    ApplyProtection {
        grants: Vec<RightsGrant>,
        delegated: String,
    },
    ApplyLabel {
        label_id: String,
        delegated: String,
    },
    Commit {
        path: PathBuf,
        protected: bool,
        labeled: bool,
    },
    Shutdown,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<EngineCall>,
    failing: HashSet<EngineStep>,
    failing_once: HashSet<EngineStep>,
    labels: Vec<LabelInfo>,
    existing_grants: Vec<RightsGrant>,
    existing_label: Option<String>,
    commit_delay: Option<Duration>,
    initializations: usize,
    contexts: usize,
    shutdowns: usize,
    applied_plans: Vec<ProtectionPlan>,
    last_commit: Option<PathBuf>,
}

impl State {
    fn record(&mut self, call: EngineCall, step: Option<EngineStep>) -> EngineResult<()> {
        self.calls.push(call);
        let Some(step) = step else {
            return Ok(());
        };
        if self.failing.contains(&step) || self.failing_once.remove(&step) {
            return Err(EngineError::Rejected(format!("injected failure at {:?}", step)));
        }
        Ok(())
    }
}

type Shared = Arc<Mutex<State>>;

fn lock(state: &Shared) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scriptable engine that records every call.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect another.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    state: Shared,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label to the catalog.
    pub fn with_label(self, id: &str, name: &str) -> Self {
        lock(&self.state).labels.push(LabelInfo::new(id, name));
        self
    }

    /// Every opened document reports these grants and label.
    pub fn with_existing_protection(self, grants: Vec<RightsGrant>, label_id: Option<&str>) -> Self {
        {
            let mut state = lock(&self.state);
            state.existing_grants = grants;
            state.existing_label = label_id.map(str::to_string);
        }
        self
    }

    /// Fail `step` every time.
    pub fn failing(self, step: EngineStep) -> Self {
        lock(&self.state).failing.insert(step);
        self
    }

    /// Fail `step` the first time only.
    pub fn failing_once(self, step: EngineStep) -> Self {
        lock(&self.state).failing_once.insert(step);
        self
    }

    /// Sleep this long inside every commit.
    pub fn with_commit_delay(self, delay: Duration) -> Self {
        lock(&self.state).commit_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.state).calls.clone()
    }

    /// Initialization attempts, including failed ones.
    pub fn initializations(&self) -> usize {
        lock(&self.state).initializations
    }

    pub fn contexts(&self) -> usize {
        lock(&self.state).contexts
    }

    /// Shutdown calls, including failed ones.
    pub fn shutdowns(&self) -> usize {
        lock(&self.state).shutdowns
    }

    pub fn applied_plans(&self) -> Vec<ProtectionPlan> {
        lock(&self.state).applied_plans.clone()
    }

    pub fn last_commit(&self) -> Option<PathBuf> {
        lock(&self.state).last_commit.clone()
    }
}

#[async_trait]
impl ProtectionEngine for RecordingEngine {
    async fn initialize(&self) -> EngineResult<()> {
        let mut state = lock(&self.state);
        state.initializations += 1;
        state.record(EngineCall::Initialize, Some(EngineStep::Initialize))
    }

    async fn create_context(&self) -> EngineResult<Box<dyn EngineContext>> {
        let mut state = lock(&self.state);
        state.record(EngineCall::CreateContext, Some(EngineStep::CreateContext))?;
        state.contexts += 1;
        Ok(Box::new(RecordingContext {
            state: self.state.clone(),
        }))
    }
}

struct RecordingContext {
    state: Shared,
}

#[async_trait]
impl EngineContext for RecordingContext {
    async fn labels(&self) -> EngineResult<Vec<LabelInfo>> {
        let mut state = lock(&self.state);
        state.record(EngineCall::Labels, Some(EngineStep::Labels))?;
        Ok(state.labels.clone())
    }

    async fn open_handle(&self, path: &Path) -> EngineResult<Box<dyn ProtectionHandle>> {
        let mut state = lock(&self.state);
        state.record(EngineCall::Open(path.to_path_buf()), Some(EngineStep::Open))?;
        if !path.exists() {
            return Err(EngineError::UnsupportedDocument(format!(
                "{} does not exist",
                path.display()
            )));
        }
        Ok(Box::new(RecordingHandle {
            state: self.state.clone(),
            input: path.to_path_buf(),
            grants: state.existing_grants.clone(),
            labeled: state.existing_label.is_some(),
        }))
    }

    async fn shutdown(&self) -> EngineResult<()> {
        let mut state = lock(&self.state);
        state.shutdowns += 1;
        state.record(EngineCall::Shutdown, Some(EngineStep::Shutdown))
    }
}

struct RecordingHandle {
    state: Shared,
    input: PathBuf,
    grants: Vec<RightsGrant>,
    labeled: bool,
}

#[async_trait]
impl ProtectionHandle for RecordingHandle {
    async fn current_grants(&self) -> EngineResult<Vec<RightsGrant>> {
        lock(&self.state).record(EngineCall::CurrentGrants, Some(EngineStep::CurrentGrants))?;
        Ok(self.grants.clone())
    }

    async fn has_protection(&self) -> EngineResult<bool> {
        lock(&self.state).record(EngineCall::HasProtection, None)?;
        Ok(!self.grants.is_empty())
    }

    async fn remove_protection(&mut self) -> EngineResult<()> {
        lock(&self.state).record(EngineCall::RemoveProtection, Some(EngineStep::RemoveProtection))?;
        self.grants.clear();
        Ok(())
    }

    async fn delete_label(&mut self, justification: &str) -> EngineResult<()> {
        lock(&self.state).record(
            EngineCall::DeleteLabel(justification.to_string()),
            Some(EngineStep::DeleteLabel),
        )?;
        self.labeled = false;
        Ok(())
    }

    async fn apply_protection(
        &mut self,
        plan: &ProtectionPlan,
        delegated_identity: &str,
    ) -> EngineResult<()> {
        let mut state = lock(&self.state);
        state.record(
            EngineCall::ApplyProtection {
                grants: plan.grants().to_vec(),
                delegated: delegated_identity.to_string(),
            },
            Some(EngineStep::ApplyProtection),
        )?;
        state.applied_plans.push(plan.clone());
        self.grants = plan.grants().to_vec();
        Ok(())
    }

    async fn apply_label(&mut self, label_id: &str, delegated_identity: &str) -> EngineResult<()> {
        lock(&self.state).record(
            EngineCall::ApplyLabel {
                label_id: label_id.to_string(),
                delegated: delegated_identity.to_string(),
            },
            Some(EngineStep::ApplyLabel),
        )?;
        self.labeled = true;
        Ok(())
    }

    async fn commit(&mut self, output: &Path) -> EngineResult<()> {
        let delay = {
            let mut state = lock(&self.state);
            state.record(
                EngineCall::Commit {
                    path: output.to_path_buf(),
                    protected: !self.grants.is_empty(),
                    labeled: self.labeled,
                },
                Some(EngineStep::Commit),
            )?;
            state.commit_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let bytes = tokio::fs::read(&self.input).await?;
        tokio::fs::write(output, bytes).await?;
        lock(&self.state).last_commit = Some(output.to_path_buf());
        Ok(())
    }
}

/// A message captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Notifier that records rendered messages.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every message.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject_template: &str,
        body_template: &str,
        substitutions: &Substitutions,
    ) -> NotifyResult<()> {
        if self.fail {
            return Err(NotifyError::ApiError {
                status: 503,
                message: "mailbox unavailable".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentNotification {
                recipient: recipient.to_string(),
                subject: substitutions.render(subject_template),
                body: substitutions.render(body_template),
            });
        Ok(())
    }
}
