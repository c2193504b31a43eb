//! Mode dispatch.
//!
//! Every public operation reduces to one workflow parameterized by a
//! [`WorkflowConfig`]. Dispatch is pure: no I/O happens here.
//!
//! | Operation               | remove | apply | merge | owner override |
//! |-------------------------|--------|-------|-------|----------------|
//! | Protect                 | yes    | yes   | no    | no             |
//! | Unprotect               | yes    | no    | no    | no             |
//! | AddPermissions          | yes    | yes   | yes   | yes            |
//! | ProtectWithOwner        | yes    | yes   | yes   | yes            |
//! | ProtectWithSubjectOwner | yes    | yes   | yes   | yes            |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Public operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Replace any protection with a fresh plan.
    Protect,
    /// Strip label and protection.
    Unprotect,
    /// Keep existing grants and add new ones.
    AddPermissions,
    /// Protect with the owner named in the request.
    ProtectWithOwner,
    /// Protect with the first subject as owner.
    ProtectWithSubjectOwner,
}

/// Where an operation's output is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Protected,
    Unprotected,
}

/// Flags consumed by the protection workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub remove_existing: bool,
    pub apply_new: bool,
    pub merge_existing: bool,
    pub owner_override: bool,
}

impl WorkflowConfig {
    /// Pure unprotect: remove and stop.
    pub fn is_remove_only(&self) -> bool {
        self.remove_existing && !self.apply_new
    }
}

impl Operation {
    /// All operations.
    pub fn all() -> &'static [Operation] {
        &[
            Operation::Protect,
            Operation::Unprotect,
            Operation::AddPermissions,
            Operation::ProtectWithOwner,
            Operation::ProtectWithSubjectOwner,
        ]
    }

    /// Name used in logs and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Protect => "protect",
            Operation::Unprotect => "unprotect",
            Operation::AddPermissions => "add_permissions",
            Operation::ProtectWithOwner => "protect_with_owner",
            Operation::ProtectWithSubjectOwner => "protect_with_subject_owner",
        }
    }

    /// The workflow flags for this operation.
    pub fn workflow_config(&self) -> WorkflowConfig {
        match self {
            Operation::Protect => WorkflowConfig {
                remove_existing: true,
                apply_new: true,
                merge_existing: false,
                owner_override: false,
            },
            Operation::Unprotect => WorkflowConfig {
                remove_existing: true,
                apply_new: false,
                merge_existing: false,
                owner_override: false,
            },
            Operation::AddPermissions
            | Operation::ProtectWithOwner
            | Operation::ProtectWithSubjectOwner => WorkflowConfig {
                remove_existing: true,
                apply_new: true,
                merge_existing: true,
                owner_override: true,
            },
        }
    }

    /// Whether the plan must contain at least one subject grant.
    pub fn requires_subject_grants(&self) -> bool {
        matches!(self, Operation::Protect | Operation::AddPermissions)
    }

    /// Whether the owner is taken from the first subject.
    pub fn owner_from_subjects(&self) -> bool {
        matches!(self, Operation::ProtectWithSubjectOwner)
    }

    pub fn output_kind(&self) -> OutputKind {
        match self {
            Operation::Unprotect => OutputKind::Unprotected,
            _ => OutputKind::Protected,
        }
    }

    /// Output file name derived from the declared name.
    ///
    /// ```
    /// use docrights_service::Operation;
    ///
    /// assert_eq!(Operation::Protect.output_file_name("plan.docx"), "plan_protected.docx");
    /// assert_eq!(Operation::Unprotect.output_file_name("plan.docx"), "plan_unprotected.docx");
    /// assert_eq!(Operation::ProtectWithOwner.output_file_name("plan.docx"), "plan.docx");
    /// assert_eq!(Operation::Protect.output_file_name("README"), "README_protected");
    /// ```
    pub fn output_file_name(&self, declared: &str) -> String {
        let suffix = match self {
            Operation::Protect | Operation::AddPermissions => "_protected",
            Operation::Unprotect => "_unprotected",
            Operation::ProtectWithOwner | Operation::ProtectWithSubjectOwner => "",
        };

        let path = Path::new(declared);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(declared);
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}{}.{}", stem, suffix, ext),
            None => format!("{}{}", stem, suffix),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protect_config() {
        let config = Operation::Protect.workflow_config();
        assert!(config.remove_existing && config.apply_new);
        assert!(!config.merge_existing && !config.owner_override);
    }

    #[test]
    fn test_unprotect_is_remove_only() {
        let config = Operation::Unprotect.workflow_config();
        assert!(config.is_remove_only());
        assert_eq!(Operation::Unprotect.output_kind(), OutputKind::Unprotected);
    }

    #[test]
    fn test_merging_operations_override_owner() {
        for op in [
            Operation::AddPermissions,
            Operation::ProtectWithOwner,
            Operation::ProtectWithSubjectOwner,
        ] {
            let config = op.workflow_config();
            assert!(config.merge_existing && config.owner_override, "{}", op);
            assert_eq!(op.output_kind(), OutputKind::Protected);
        }
    }

    #[test]
    fn test_subject_grant_requirement() {
        assert!(Operation::Protect.requires_subject_grants());
        assert!(Operation::AddPermissions.requires_subject_grants());
        assert!(!Operation::ProtectWithOwner.requires_subject_grants());
        assert!(!Operation::Unprotect.requires_subject_grants());
    }

    #[test]
    fn test_output_names_keep_multi_dot_stem() {
        assert_eq!(
            Operation::AddPermissions.output_file_name("q3.report.xlsx"),
            "q3.report_protected.xlsx"
        );
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Operation::ProtectWithSubjectOwner).unwrap();
        assert_eq!(json, "\"protect_with_subject_owner\"");
        assert_eq!(Operation::all().len(), 5);
    }
}
