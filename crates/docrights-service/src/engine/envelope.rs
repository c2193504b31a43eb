//! Local envelope engine.
//!
//! A self-contained [`ProtectionEngine`] for development and integration
//! environments without access to a rights-management service. It records
//! label and grants in a JSON header in front of the original bytes:
//!
//! ```text
//! DOCRIGHTS-ENVELOPE/1\n
//! {"label":{...},"grants":[...],"delegated_identity":"..."}\n
//! <original document bytes>
//! ```
//!
//! No encryption is performed. A document with neither label nor grants is
//! written back as its plain payload.

use super::{
    AuthDelegate, EngineContext, EngineError, EngineResult, LabelInfo, ProtectionEngine,
    ProtectionHandle,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docrights_model::{ProtectionPlan, RightsGrant};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tracing::{debug, info, instrument};

const MAGIC: &[u8] = b"DOCRIGHTS-ENVELOPE/1\n";

/// A parsed envelope file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub label: Option<LabelInfo>,
    #[serde(default)]
    pub grants: Vec<RightsGrant>,
    #[serde(default)]
    pub delegated_identity: Option<String>,
    #[serde(default)]
    pub protected_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Parse file bytes; anything without the envelope marker is plain payload.
    pub fn read(bytes: &[u8]) -> EngineResult<Self> {
        let Some(rest) = bytes.strip_prefix(MAGIC) else {
            return Ok(Self {
                payload: bytes.to_vec(),
                ..Self::default()
            });
        };

        let newline = rest.iter().position(|b| *b == b'\n').ok_or_else(|| {
            EngineError::UnsupportedDocument("envelope header is not terminated".to_string())
        })?;
        let mut envelope: Envelope = serde_json::from_slice(&rest[..newline])
            .map_err(|e| EngineError::UnsupportedDocument(format!("bad envelope header: {}", e)))?;
        envelope.payload = rest[newline + 1..].to_vec();
        Ok(envelope)
    }

    pub fn is_protected(&self) -> bool {
        !self.grants.is_empty()
    }

    pub fn is_plain(&self) -> bool {
        self.label.is_none() && self.grants.is_empty()
    }

    pub fn to_bytes(&self) -> EngineResult<Vec<u8>> {
        if self.is_plain() {
            return Ok(self.payload.clone());
        }

        let header = serde_json::to_vec(self)
            .map_err(|e| EngineError::Rejected(format!("cannot encode envelope header: {}", e)))?;
        let mut bytes = Vec::with_capacity(MAGIC.len() + header.len() + 1 + self.payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&header);
        bytes.push(b'\n');
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }
}

/// Development engine writing [`Envelope`] files.
#[derive(Debug, Clone)]
pub struct EnvelopeEngine {
    cache_path: PathBuf,
    labels: Vec<LabelInfo>,
    auth: Option<(AuthDelegate, String)>,
}

impl EnvelopeEngine {
    pub fn new(cache_path: impl Into<PathBuf>, labels: Vec<LabelInfo>) -> Self {
        Self {
            cache_path: cache_path.into(),
            labels,
            auth: None,
        }
    }

    /// Acquire a token for `resource` during bootstrap, as a real engine
    /// would when it first contacts its service.
    pub fn with_auth(mut self, delegate: AuthDelegate, resource: impl Into<String>) -> Self {
        self.auth = Some((delegate, resource.into()));
        self
    }
}

#[async_trait]
impl ProtectionEngine for EnvelopeEngine {
    #[instrument(skip(self), fields(cache = %self.cache_path.display()))]
    async fn initialize(&self) -> EngineResult<()> {
        fs::create_dir_all(&self.cache_path).await?;
        if let Some((delegate, resource)) = &self.auth {
            delegate.acquire_token(resource).await?;
        }
        info!(labels = self.labels.len(), "Envelope engine ready");
        Ok(())
    }

    async fn create_context(&self) -> EngineResult<Box<dyn EngineContext>> {
        Ok(Box::new(EnvelopeContext {
            labels: self.labels.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct EnvelopeContext {
    labels: Vec<LabelInfo>,
    closed: AtomicBool,
}

#[async_trait]
impl EngineContext for EnvelopeContext {
    async fn labels(&self) -> EngineResult<Vec<LabelInfo>> {
        Ok(self.labels.clone())
    }

    async fn open_handle(&self, path: &Path) -> EngineResult<Box<dyn ProtectionHandle>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("context is shut down".to_string()));
        }
        let bytes = fs::read(path).await?;
        let envelope = Envelope::read(&bytes)?;
        debug!(
            path = %path.display(),
            protected = envelope.is_protected(),
            labeled = envelope.label.is_some(),
            "Opened envelope"
        );
        Ok(Box::new(EnvelopeHandle {
            envelope,
            catalog: self.labels.clone(),
        }))
    }

    async fn shutdown(&self) -> EngineResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct EnvelopeHandle {
    envelope: Envelope,
    catalog: Vec<LabelInfo>,
}

#[async_trait]
impl ProtectionHandle for EnvelopeHandle {
    async fn current_grants(&self) -> EngineResult<Vec<RightsGrant>> {
        Ok(self.envelope.grants.clone())
    }

    async fn has_protection(&self) -> EngineResult<bool> {
        Ok(self.envelope.is_protected())
    }

    async fn remove_protection(&mut self) -> EngineResult<()> {
        self.envelope.grants.clear();
        self.envelope.delegated_identity = None;
        self.envelope.protected_at = None;
        Ok(())
    }

    async fn delete_label(&mut self, justification: &str) -> EngineResult<()> {
        debug!(justification, "Deleting label");
        self.envelope.label = None;
        Ok(())
    }

    async fn apply_protection(
        &mut self,
        plan: &ProtectionPlan,
        delegated_identity: &str,
    ) -> EngineResult<()> {
        self.envelope.grants = plan.grants().to_vec();
        self.envelope.delegated_identity = Some(delegated_identity.to_string());
        self.envelope.protected_at = Some(Utc::now());
        Ok(())
    }

    async fn apply_label(&mut self, label_id: &str, delegated_identity: &str) -> EngineResult<()> {
        let label = self
            .catalog
            .iter()
            .find(|label| label.id == label_id)
            .cloned()
            .ok_or_else(|| EngineError::Rejected(format!("unknown label id {}", label_id)))?;
        self.envelope.label = Some(label);
        self.envelope.delegated_identity = Some(delegated_identity.to_string());
        Ok(())
    }

    async fn commit(&mut self, output: &Path) -> EngineResult<()> {
        fs::write(output, self.envelope.to_bytes()?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrights_model::{Capability, PlanBuilder};
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> EnvelopeEngine {
        EnvelopeEngine::new(
            dir.path().join("cache"),
            vec![LabelInfo::new("lbl-1", "Confidential")],
        )
    }

    #[test]
    fn test_plain_bytes_read_as_payload() {
        let envelope = Envelope::read(b"hello").unwrap();
        assert!(envelope.is_plain());
        assert_eq!(envelope.to_bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_truncated_header_is_unsupported() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(b"{\"label\":null");
        assert!(matches!(
            Envelope::read(&bytes),
            Err(EngineError::UnsupportedDocument(_))
        ));
    }

    #[test]
    fn test_header_with_invalid_grants_is_unsupported() {
        for grants in [
            r#"[{"principals":[],"capabilities":["VIEW"]}]"#,
            r#"[{"principals":["  "],"capabilities":["EDIT"]}]"#,
            r#"[{"principals":["a@x.com"],"capabilities":[]}]"#,
        ] {
            let mut bytes = MAGIC.to_vec();
            bytes.extend_from_slice(format!("{{\"grants\":{}}}\nbody", grants).as_bytes());
            assert!(matches!(
                Envelope::read(&bytes),
                Err(EngineError::UnsupportedDocument(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_protect_then_unprotect() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.initialize().await.unwrap();
        assert!(dir.path().join("cache").is_dir());

        let input = dir.path().join("doc.txt");
        let protected = dir.path().join("doc_protected.txt");
        let unprotected = dir.path().join("doc_unprotected.txt");
        std::fs::write(&input, b"body").unwrap();

        let plan = PlanBuilder::new("svc@x.com")
            .unwrap()
            .with_subject(RightsGrant::single("a@x.com", [Capability::View]).unwrap())
            .build();

        let context = engine.create_context().await.unwrap();
        let mut handle = context.open_handle(&input).await.unwrap();
        assert!(!handle.has_protection().await.unwrap());
        handle.apply_protection(&plan, "svc@x.com").await.unwrap();
        handle.apply_label("lbl-1", "svc@x.com").await.unwrap();
        handle.commit(&protected).await.unwrap();

        let envelope = Envelope::read(&std::fs::read(&protected).unwrap()).unwrap();
        assert_eq!(envelope.grants, plan.grants().to_vec());
        assert_eq!(envelope.label.as_ref().unwrap().name, "Confidential");
        assert_eq!(envelope.payload, b"body");

        let mut handle = context.open_handle(&protected).await.unwrap();
        assert_eq!(handle.current_grants().await.unwrap().len(), 2);
        handle.remove_protection().await.unwrap();
        handle.delete_label("test").await.unwrap();
        handle.commit(&unprotected).await.unwrap();
        assert_eq!(std::fs::read(&unprotected).unwrap(), b"body");

        context.shutdown().await.unwrap();
        assert!(matches!(
            context.open_handle(&input).await,
            Err(EngineError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_label_id_rejected() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.txt");
        std::fs::write(&input, b"body").unwrap();

        let context = engine(&dir).create_context().await.unwrap();
        let mut handle = context.open_handle(&input).await.unwrap();
        assert!(matches!(
            handle.apply_label("missing", "svc@x.com").await,
            Err(EngineError::Rejected(_))
        ));
    }
}
