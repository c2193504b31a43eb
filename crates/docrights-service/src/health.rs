//! Health checks.
//!
//! - **Liveness**: the process is up.
//! - **Readiness**: the engine has bootstrapped and every staging root is
//!   writable.
//! - **Full**: readiness broken down per component, with latencies.

use crate::engine::EngineBootstrap;
use crate::staging::StagingManager;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Individual component status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

/// Health of one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: ComponentStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,

    /// Timestamp of the check (RFC 3339).
    pub timestamp: String,

    pub components: Vec<ComponentHealth>,
    pub check_duration_ms: u64,
    pub version: String,
    pub message: String,
}

/// Liveness check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResult {
    pub alive: bool,
    pub timestamp: String,
    pub uptime_secs: u64,
}

/// Readiness check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResult {
    pub ready: bool,
    pub timestamp: String,

    /// Reason if not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Health checker for the protection service.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    bootstrap: Arc<EngineBootstrap>,
    staging: StagingManager,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(bootstrap: Arc<EngineBootstrap>, staging: StagingManager) -> Self {
        Self {
            bootstrap,
            staging,
            start_time: Instant::now(),
        }
    }

    pub async fn check_liveness(&self) -> LivenessResult {
        LivenessResult {
            alive: true,
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Ready once the engine is up and staging is writable.
    #[instrument(skip(self))]
    pub async fn check_readiness(&self) -> ReadinessResult {
        debug!("Performing readiness check");
        let down: Vec<String> = self
            .components()
            .await
            .into_iter()
            .filter(|c| c.status == ComponentStatus::Down)
            .map(|c| c.name)
            .collect();

        ReadinessResult {
            ready: down.is_empty(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            reason: (!down.is_empty()).then(|| format!("Components unavailable: {}", down.join(", "))),
        }
    }

    #[instrument(skip(self))]
    pub async fn check_all(&self) -> HealthReport {
        info!("Performing full health check");
        let start = Instant::now();
        let components = self.components().await;

        let down: Vec<&str> = components
            .iter()
            .filter(|c| c.status == ComponentStatus::Down)
            .map(|c| c.name.as_str())
            .collect();
        let (status, message) = if down.is_empty() {
            (HealthStatus::Healthy, "All components operational".to_string())
        } else {
            (HealthStatus::Unhealthy, format!("Components down: {}", down.join(", ")))
        };
        let duration = start.elapsed();

        info!(status = ?status, duration_ms = duration.as_millis() as u64, "Health check complete");

        HealthReport {
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            components,
            check_duration_ms: duration.as_millis() as u64,
            version: env!("CARGO_PKG_VERSION").to_string(),
            message,
        }
    }

    async fn components(&self) -> Vec<ComponentHealth> {
        let mut components = vec![self.check_engine().await];
        for (name, root) in ["staging_input", "staging_protected", "staging_unprotected"]
            .into_iter()
            .zip(self.staging.roots())
        {
            components.push(check_writable(name, root).await);
        }
        components
    }

    async fn check_engine(&self) -> ComponentHealth {
        let start = Instant::now();
        let error = self.bootstrap.engine().await.err().map(|e| e.to_string());
        if let Some(error) = &error {
            warn!(error = %error, "Engine not ready");
        }
        component("engine", start, error)
    }
}

/// Create the directory if needed and write then remove a probe file.
async fn check_writable(name: &str, root: &Path) -> ComponentHealth {
    let start = Instant::now();
    let probe = root.join(format!(".probe-{}", Uuid::now_v7().simple()));

    let result = async {
        tokio::fs::create_dir_all(root).await?;
        tokio::fs::write(&probe, b"").await?;
        tokio::fs::remove_file(&probe).await
    }
    .await;

    let error = result.err().map(|e| {
        warn!(component = name, root = %root.display(), error = %e, "Staging root not writable");
        e.to_string()
    });
    component(name, start, error)
}

fn component(name: &str, start: Instant, error: Option<String>) -> ComponentHealth {
    ComponentHealth {
        name: name.to_string(),
        status: if error.is_none() {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        },
        latency_ms: start.elapsed().as_millis() as u64,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StagingConfig;
    use crate::testing::{EngineStep, RecordingEngine};
    use tempfile::TempDir;

    fn staging(dir: &TempDir) -> StagingManager {
        StagingManager::new(&StagingConfig {
            input_dir: dir.path().join("in"),
            protected_dir: dir.path().join("protected"),
            unprotected_dir: dir.path().join("unprotected"),
            retain_input: false,
            retain_output: false,
            unsupported_extensions: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_ready_when_engine_and_staging_up() {
        let dir = TempDir::new().unwrap();
        let engine = RecordingEngine::new();
        let checker = HealthChecker::new(
            Arc::new(EngineBootstrap::new(Arc::new(engine.clone()))),
            staging(&dir),
        );

        let readiness = checker.check_readiness().await;
        assert!(readiness.ready, "{:?}", readiness.reason);
        assert!(dir.path().join("protected").is_dir());
        assert_eq!(engine.initializations(), 1);

        let report = checker.check_all().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.components.len(), 4);
    }

    #[tokio::test]
    async fn test_engine_failure_reported() {
        let dir = TempDir::new().unwrap();
        let engine = RecordingEngine::new().failing(EngineStep::Initialize);
        let checker = HealthChecker::new(
            Arc::new(EngineBootstrap::new(Arc::new(engine))),
            staging(&dir),
        );

        let readiness = checker.check_readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.unwrap().contains("engine"));

        let report = checker.check_all().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.components[0].status, ComponentStatus::Down);
    }

    #[tokio::test]
    async fn test_liveness() {
        let dir = TempDir::new().unwrap();
        let checker = HealthChecker::new(
            Arc::new(EngineBootstrap::new(Arc::new(RecordingEngine::new()))),
            staging(&dir),
        );
        assert!(checker.check_liveness().await.alive);
    }
}
