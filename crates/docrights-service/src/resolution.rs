//! Rights resolution.
//!
//! Turns a request into a [`PlanBuilder`]: the owner grant first, then one
//! grant per subject. Grants already present on the document are added by
//! the workflow once the handle is open, because only then are they known.
//!
//! Rights codes pair positionally with subjects when there is more than one
//! subject and exactly as many codes; otherwise every subject receives every
//! resolved code. Unknown codes are dropped with a warning.

use crate::dispatcher::Operation;
use crate::error::{ProtectionError, ProtectionResult};
use crate::request::ProtectionRequest;
use docrights_model::{Capability, PlanBuilder, RightsCodeTable, RightsGrant};
use tracing::{debug, warn};

/// Builds per-request plans from the configured owner and rights table.
#[derive(Debug, Clone)]
pub struct RightsResolver {
    default_owner: String,
    table: RightsCodeTable,
}

impl RightsResolver {
    pub fn new(default_owner: impl Into<String>, table: RightsCodeTable) -> Self {
        Self {
            default_owner: default_owner.into(),
            table,
        }
    }

    pub fn default_owner(&self) -> &str {
        &self.default_owner
    }

    /// Owner for this request.
    ///
    /// Subject-owner mode uses the first subject; otherwise the request's
    /// owner when non-blank, else the service default.
    pub fn effective_owner(&self, operation: Operation, request: &ProtectionRequest) -> String {
        if operation.owner_from_subjects() {
            if let Some(first) = request.subjects().into_iter().next() {
                return first;
            }
        }
        request
            .explicit_owner()
            .map(str::to_string)
            .unwrap_or_else(|| self.default_owner.clone())
    }

    /// Resolve each code, keeping positions; unknown codes become `None`.
    pub fn resolve_codes(&self, codes: &[String]) -> Vec<Option<Capability>> {
        codes
            .iter()
            .map(|code| match self.table.resolve(code) {
                Ok(capability) => Some(capability),
                Err(e) => {
                    warn!(code = %code, error = %e, "Dropping unknown rights code");
                    None
                }
            })
            .collect()
    }

    /// Build the owner and subject grants for a request.
    pub fn resolve(
        &self,
        operation: Operation,
        request: &ProtectionRequest,
    ) -> ProtectionResult<PlanBuilder> {
        let owner = self.effective_owner(operation, request);
        let subjects = request.subjects();
        let resolved = self.resolve_codes(&request.codes());

        let mut builder = PlanBuilder::new(owner)?;

        if !subjects.is_empty() && !resolved.is_empty() {
            let positional = subjects.len() > 1 && resolved.len() == subjects.len();
            let all: Vec<Capability> = resolved.iter().flatten().copied().collect();

            for (index, subject) in subjects.iter().enumerate() {
                let capabilities: Vec<Capability> = if positional {
                    resolved[index].into_iter().collect()
                } else {
                    all.clone()
                };

                if capabilities.is_empty() {
                    return Err(ProtectionError::NoValidPermissions(format!(
                        "no resolvable rights for {}",
                        subject
                    )));
                }

                builder = builder.with_subject(RightsGrant::single(subject.clone(), capabilities)?);
            }
        } else if !resolved.is_empty() {
            debug!("Rights codes supplied without subjects");
        }

        if operation.requires_subject_grants() && builder.subject_count() == 0 {
            return Err(ProtectionError::NoValidPermissions(format!(
                "{} requires at least one subject and one rights code",
                operation
            )));
        }

        debug!(
            owner = %builder.owner(),
            subjects = builder.subject_count(),
            "Resolved rights"
        );

        Ok(builder)
    }
}
