//! # Protection plans
//!
//! A protection plan is the ordered list of grants submitted to the protection
//! engine. It is assembled through [`PlanBuilder`], whose methods consume and
//! return the builder, and is read-only once built.

use serde::Serialize;

use crate::capability::Capability;
use crate::error::{ModelError, ModelResult};
use crate::grant::RightsGrant;

/// Immutable builder for a [`ProtectionPlan`].
///
/// The owner grant is fixed at construction. Subject grants and carried-over
/// grants are appended in call order.
///
/// # Example
///
/// ```
/// use docrights_model::{Capability, PlanBuilder, RightsGrant};
///
/// let existing = vec![
///     RightsGrant::single("c@x.com", [Capability::Owner, Capability::View]).unwrap(),
/// ];
///
/// let plan = PlanBuilder::new("new-owner@x.com")
///     .unwrap()
///     .with_subject(RightsGrant::single("a@x.com", [Capability::Edit]).unwrap())
///     .with_carried_over(existing, true)
///     .build();
///
/// assert_eq!(plan.len(), 3);
/// assert!(!plan.carried_grants()[0].has_capability(Capability::Owner));
/// ```
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    owner: RightsGrant,
    subjects: Vec<RightsGrant>,
    carried: Vec<RightsGrant>,
}

impl PlanBuilder {
    /// Start a plan for the given owner.
    pub fn new(owner: impl Into<String>) -> ModelResult<Self> {
        let owner = owner.into();
        if owner.trim().is_empty() {
            return Err(ModelError::BlankPrincipal);
        }

        Ok(Self {
            owner: RightsGrant::owner(owner)?,
            subjects: Vec::new(),
            carried: Vec::new(),
        })
    }

    /// Append a subject grant.
    pub fn with_subject(mut self, grant: RightsGrant) -> Self {
        self.subjects.push(grant);
        self
    }

    /// Append subject grants.
    pub fn with_subjects<I>(self, grants: I) -> Self
    where
        I: IntoIterator<Item = RightsGrant>,
    {
        grants.into_iter().fold(self, |builder, g| builder.with_subject(g))
    }

    /// Append grants already present on the document.
    ///
    /// Principals are copied verbatim. With `owner_override`, the `OWNER`
    /// capability is removed from each copied grant; a grant left with no
    /// capability is not carried over.
    pub fn with_carried_over<I>(mut self, existing: I, owner_override: bool) -> Self
    where
        I: IntoIterator<Item = RightsGrant>,
    {
        for grant in existing {
            let copied = if owner_override {
                grant.without(Capability::Owner)
            } else {
                Some(grant)
            };
            if let Some(copied) = copied {
                self.carried.push(copied);
            }
        }
        self
    }

    /// Number of subject grants added so far.
    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    /// Number of carried-over grants added so far.
    pub fn carried_count(&self) -> usize {
        self.carried.len()
    }

    /// The effective owner of the plan.
    pub fn owner(&self) -> &str {
        &self.owner.principals()[0]
    }

    /// Finalize the plan.
    pub fn build(self) -> ProtectionPlan {
        let subject_count = self.subjects.len();
        let carried_count = self.carried.len();

        let mut grants = Vec::with_capacity(1 + subject_count + carried_count);
        grants.push(self.owner);
        grants.extend(self.subjects);
        grants.extend(self.carried);

        ProtectionPlan {
            grants,
            subject_count,
            carried_count,
        }
    }
}

/// The finalized, ordered list of grants for one request.
///
/// The first grant is always the owner grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectionPlan {
    grants: Vec<RightsGrant>,
    #[serde(skip)]
    subject_count: usize,
    #[serde(skip)]
    carried_count: usize,
}

impl ProtectionPlan {
    /// All grants in submission order.
    pub fn grants(&self) -> &[RightsGrant] {
        &self.grants
    }

    /// The owner grant.
    pub fn owner_grant(&self) -> &RightsGrant {
        &self.grants[0]
    }

    /// The effective owner principal.
    pub fn owner(&self) -> &str {
        &self.owner_grant().principals()[0]
    }

    /// Grants built from the request's subjects.
    pub fn subject_grants(&self) -> &[RightsGrant] {
        &self.grants[1..1 + self.subject_count]
    }

    /// Grants carried over from the document's previous protection.
    pub fn carried_grants(&self) -> &[RightsGrant] {
        let start = 1 + self.subject_count;
        &self.grants[start..start + self.carried_count]
    }

    /// Total number of grants, owner included.
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// A plan always holds the owner grant.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over the grants.
    pub fn iter(&self) -> std::slice::Iter<'_, RightsGrant> {
        self.grants.iter()
    }
}

impl<'a> IntoIterator for &'a ProtectionPlan {
    type Item = &'a RightsGrant;
    type IntoIter = std::slice::Iter<'a, RightsGrant>;

    fn into_iter(self) -> Self::IntoIter {
        self.grants.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(principal: &str, caps: &[Capability]) -> RightsGrant {
        RightsGrant::single(principal, caps.iter().copied()).unwrap()
    }

    #[test]
    fn test_owner_grant_first() {
        let plan = PlanBuilder::new("svc@x.com")
            .unwrap()
            .with_subject(grant("a@x.com", &[Capability::Edit]))
            .build();

        assert_eq!(plan.owner(), "svc@x.com");
        assert!(plan.owner_grant().has_capability(Capability::Owner));
        assert!(plan.owner_grant().has_capability(Capability::Extract));
        assert_eq!(plan.subject_grants().len(), 1);
        assert!(plan.carried_grants().is_empty());
    }

    #[test]
    fn test_blank_owner_rejected() {
        assert_eq!(
            PlanBuilder::new("   ").unwrap_err(),
            ModelError::BlankPrincipal
        );
    }

    #[test]
    fn test_owner_only_plan() {
        let plan = PlanBuilder::new("svc@x.com").unwrap().build();
        assert_eq!(plan.len(), 1);
        assert!(plan.subject_grants().is_empty());
    }

    #[test]
    fn test_carry_over_keeps_owner_without_override() {
        let plan = PlanBuilder::new("svc@x.com")
            .unwrap()
            .with_carried_over(vec![grant("c@x.com", &[Capability::Owner, Capability::View])], false)
            .build();

        assert!(plan.carried_grants()[0].has_capability(Capability::Owner));
    }

    #[test]
    fn test_carry_over_strips_owner_with_override() {
        let plan = PlanBuilder::new("new@x.com")
            .unwrap()
            .with_carried_over(
                vec![
                    grant("c@x.com", &[Capability::Owner, Capability::View]),
                    grant("old-owner@x.com", &[Capability::Owner]),
                ],
                true,
            )
            .build();

        assert_eq!(plan.carried_grants().len(), 1);
        let carried = &plan.carried_grants()[0];
        assert_eq!(carried.principals(), ["c@x.com".to_string()]);
        assert_eq!(
            carried.capabilities().iter().copied().collect::<Vec<_>>(),
            vec![Capability::View]
        );
    }

    #[test]
    fn test_duplicate_principals_not_coalesced() {
        let plan = PlanBuilder::new("svc@x.com")
            .unwrap()
            .with_subject(grant("a@x.com", &[Capability::Edit]))
            .with_carried_over(vec![grant("a@x.com", &[Capability::View])], true)
            .build();

        let holders = plan.iter().filter(|g| g.has_principal("a@x.com")).count();
        assert_eq!(holders, 2);
    }

    #[test]
    fn test_builder_is_value_semantics() {
        let base = PlanBuilder::new("svc@x.com").unwrap();
        let with_subject = base.clone().with_subject(grant("a@x.com", &[Capability::Edit]));

        assert_eq!(base.build().len(), 1);
        assert_eq!(with_subject.build().len(), 2);
    }
}
