//! # Docrights Service
//!
//! Protection workflow orchestration for document rights management.
//!
//! ## Overview
//!
//! The docrights-service crate handles:
//! - **Dispatch**: Mapping the five public operations onto one parameterized
//!   workflow ([`Operation::workflow_config`])
//! - **Rights resolution**: Turning subject lists and short rights codes into
//!   an owner-first [`docrights_model::ProtectionPlan`]
//! - **Workflow**: Driving a [`engine::ProtectionEngine`] through
//!   open, unlabel, relabel, commit and release
//! - **Staging**: Writing payloads to disk, allocating outputs and cleaning up
//! - **Notifications**: Mailing subjects after a successful run
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docrights_service::engine::{EngineBootstrap, EnvelopeEngine, LabelInfo};
//! use docrights_service::{
//!     NotificationTrigger, Operation, ProtectionRequest, ProtectionService, ServiceConfig,
//! };
//! use std::sync::Arc;
//!
//! async fn example() -> docrights_service::ProtectionResult<()> {
//!     let config = ServiceConfig::default();
//!     let engine = EnvelopeEngine::new(
//!         config.engine.cache_path.clone(),
//!         vec![LabelInfo::new("lbl-1", config.engine.label_to_apply.clone())],
//!     );
//!     let service = ProtectionService::new(
//!         config,
//!         Arc::new(EngineBootstrap::new(Arc::new(engine))),
//!         NotificationTrigger::disabled(),
//!     );
//!
//!     let request = ProtectionRequest::from_bytes("plan.docx", b"...".to_vec())
//!         .with_subjects("a@x.com,b@x.com")
//!         .with_rights_codes("1,2");
//!     let outcome = service.process(Operation::Protect, request).await?;
//!     assert_eq!(outcome.output_file_name, "plan_protected.docx");
//!     Ok(())
//! }
//! ```
//!
//! ## Failure semantics
//!
//! Every failure is a [`ProtectionError`]. Once an engine context exists it is
//! shut down exactly once, and staged files are removed unless retained,
//! whichever way the request ends.

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod health;
pub mod notify;
pub mod request;
pub mod resolution;
pub mod retry;
pub mod service;
pub mod staging;
pub mod testing;
pub mod workflow;

// Re-export main types for convenience
pub use config::{ConfigError, MissingLabelPolicy, ServiceConfig};
pub use dispatcher::{Operation, OutputKind, WorkflowConfig};
pub use error::{FailureKind, ProtectionError, ProtectionResult};
pub use health::{HealthChecker, HealthReport, HealthStatus};
pub use notify::{GraphMailNotifier, NotificationTrigger, Notifier};
pub use request::{FilePayload, ProtectionRequest};
pub use resolution::RightsResolver;
pub use service::{ProtectionOutcome, ProtectionService};
pub use staging::{CleanupReport, StagingManager};
pub use workflow::{ProtectionWorkflow, WorkflowResult, WorkflowState, WorkflowStatus};
