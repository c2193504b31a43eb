//! # Docrights Model
//!
//! Data model shared by every docrights crate. Nothing in here performs I/O.
//!
//! ## Overview
//!
//! The docrights-model crate handles:
//! - **Capabilities**: The fixed vocabulary of rights a principal can hold on a
//!   protected document (`OWNER`, `VIEW`, `EDIT`, `EXTRACT`, `PRINT`, ...)
//! - **Grants**: A (principal set, capability set) pair
//! - **Plans**: The ordered list of grants submitted to the protection engine,
//!   built once per request through an immutable builder
//! - **Rights codes**: The configured lookup from short request codes
//!   (e.g. `"2"`) to capabilities (e.g. `EDIT`)
//!
//! ## Architecture
//!
//! ```text
//! ProtectionPlan = [ owner grant ] + [ subject grants ] + [ carried-over grants ]
//!
//! Owner grant:   ({owner}, {OWNER, EXTRACT})   always first, exactly one
//! Subject grant: ({a@x.com}, {EDIT})           one per requested subject
//! Carried grant: copied from the document's existing protection
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use docrights_model::{Capability, PlanBuilder, RightsCodeTable, RightsGrant};
//!
//! let table = RightsCodeTable::parse("1=VIEW,2=EDIT,3=PRINT").unwrap();
//! assert_eq!(table.resolve("2").unwrap(), Capability::Edit);
//!
//! let plan = PlanBuilder::new("svc@contoso.com")
//!     .unwrap()
//!     .with_subject(RightsGrant::single("a@x.com", [Capability::Edit]).unwrap())
//!     .build();
//!
//! assert_eq!(plan.owner(), "svc@contoso.com");
//! assert_eq!(plan.len(), 2);
//! ```
//!
//! ## Duplicate principals
//!
//! Plans never coalesce grants. The same principal may appear in several grants
//! (for instance once as a subject and once as a carried-over grant); the
//! protection engine treats the grants as a union.

pub mod capability;
pub mod error;
pub mod grant;
pub mod plan;
pub mod rights_code;

// Re-export main types for convenience
pub use capability::Capability;
pub use error::{ModelError, ModelResult};
pub use grant::{split_list, RightsGrant};
pub use plan::{PlanBuilder, ProtectionPlan};
pub use rights_code::RightsCodeTable;
