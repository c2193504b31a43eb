//! # Grants
//!
//! A grant pairs a set of principals with a set of capabilities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::capability::Capability;
use crate::error::{ModelError, ModelResult};

/// A (principal set, capability set) pair.
///
/// Principals keep the order in which they were supplied, since grants copied
/// from an existing document are carried over verbatim. Capabilities are a set.
///
/// Both sets are non-empty for every grant, including grants deserialized
/// from stored documents, which go through [`RightsGrant::new`] as well.
///
/// # Example
///
/// ```
/// use docrights_model::{Capability, RightsGrant};
///
/// let grant = RightsGrant::new(
///     vec!["a@x.com".to_string(), "b@x.com".to_string()],
///     [Capability::View, Capability::Print],
/// ).unwrap();
///
/// assert!(grant.has_principal("b@x.com"));
/// assert!(grant.has_capability(Capability::Print));
/// assert_eq!(grant.to_string(), "[a@x.com, b@x.com] -> [VIEW, PRINT]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGrant")]
pub struct RightsGrant {
    /// Principal identifiers (usually email addresses).
    principals: Vec<String>,
    /// Capabilities granted to every principal in the grant.
    capabilities: BTreeSet<Capability>,
}

impl RightsGrant {
    /// Create a grant, validating that both sets are non-empty.
    ///
    /// Principals are trimmed; a blank principal is an error.
    pub fn new<I>(principals: Vec<String>, capabilities: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = Capability>,
    {
        if principals.is_empty() {
            return Err(ModelError::EmptyPrincipalSet);
        }

        let principals = principals
            .into_iter()
            .map(|p| {
                let trimmed = p.trim();
                if trimmed.is_empty() {
                    Err(ModelError::BlankPrincipal)
                } else {
                    Ok(trimmed.to_string())
                }
            })
            .collect::<ModelResult<Vec<_>>>()?;

        let capabilities: BTreeSet<Capability> = capabilities.into_iter().collect();
        if capabilities.is_empty() {
            return Err(ModelError::EmptyCapabilitySet(principals.join(", ")));
        }

        Ok(Self {
            principals,
            capabilities,
        })
    }

    /// Create a grant for a single principal.
    pub fn single<I>(principal: impl Into<String>, capabilities: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = Capability>,
    {
        Self::new(vec![principal.into()], capabilities)
    }

    /// Create the owner grant: `({owner}, {OWNER, EXTRACT})`.
    pub fn owner(principal: impl Into<String>) -> ModelResult<Self> {
        Self::single(principal, Capability::owner_set())
    }

    /// Principals in this grant, in their original order.
    pub fn principals(&self) -> &[String] {
        &self.principals
    }

    /// Capabilities in this grant.
    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Check whether a principal is part of the grant (exact match).
    pub fn has_principal(&self, principal: &str) -> bool {
        self.principals.iter().any(|p| p == principal)
    }

    /// Check whether the grant carries a capability.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Copy this grant without one capability.
    ///
    /// Returns `None` when nothing would be left, since an empty capability
    /// set is not a valid grant.
    pub fn without(&self, capability: Capability) -> Option<Self> {
        let capabilities: BTreeSet<Capability> = self
            .capabilities
            .iter()
            .copied()
            .filter(|c| *c != capability)
            .collect();

        if capabilities.is_empty() {
            None
        } else {
            Some(Self {
                principals: self.principals.clone(),
                capabilities,
            })
        }
    }
}

/// Unchecked wire form of a grant.
#[derive(Deserialize)]
struct RawGrant {
    principals: Vec<String>,
    capabilities: Vec<Capability>,
}

impl TryFrom<RawGrant> for RightsGrant {
    type Error = ModelError;

    fn try_from(raw: RawGrant) -> ModelResult<Self> {
        Self::new(raw.principals, raw.capabilities)
    }
}

impl fmt::Display for RightsGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let caps: Vec<&str> = self.capabilities.iter().map(|c| c.as_str()).collect();
        write!(f, "[{}] -> [{}]", self.principals.join(", "), caps.join(", "))
    }
}

/// Split a comma-separated request field into its entries.
///
/// Entries are trimmed, empty entries are dropped, order and duplicates are
/// kept.
///
/// # Example
///
/// ```
/// use docrights_model::split_list;
///
/// assert_eq!(split_list(" a@x.com, ,b@x.com,a@x.com "), vec!["a@x.com", "b@x.com", "a@x.com"]);
/// assert!(split_list("").is_empty());
/// ```
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_requires_principals() {
        let err = RightsGrant::new(vec![], [Capability::View]).unwrap_err();
        assert_eq!(err, ModelError::EmptyPrincipalSet);
    }

    #[test]
    fn test_grant_rejects_blank_principal() {
        let err = RightsGrant::new(vec!["a@x.com".into(), "  ".into()], [Capability::View])
            .unwrap_err();
        assert_eq!(err, ModelError::BlankPrincipal);
    }

    #[test]
    fn test_grant_requires_capabilities() {
        let err = RightsGrant::single("a@x.com", []).unwrap_err();
        assert!(matches!(err, ModelError::EmptyCapabilitySet(_)));
    }

    #[test]
    fn test_deserialize_validates_grant() {
        let empty = serde_json::from_str::<RightsGrant>(r#"{"principals":[],"capabilities":["VIEW"]}"#);
        assert!(empty.unwrap_err().to_string().contains("principal"));

        assert!(serde_json::from_str::<RightsGrant>(r#"{"principals":["  "],"capabilities":["EDIT"]}"#).is_err());
        assert!(serde_json::from_str::<RightsGrant>(r#"{"principals":["a@x.com"],"capabilities":[]}"#).is_err());

        let grant: RightsGrant =
            serde_json::from_str(r#"{"principals":[" a@x.com "],"capabilities":["VIEW","VIEW"]}"#).unwrap();
        assert_eq!(grant.principals(), ["a@x.com".to_string()]);
        assert_eq!(grant.capabilities().len(), 1);
    }

    #[test]
    fn test_owner_grant() {
        let grant = RightsGrant::owner("svc@contoso.com").unwrap();
        assert_eq!(grant.principals(), ["svc@contoso.com".to_string()]);
        assert!(grant.has_capability(Capability::Owner));
        assert!(grant.has_capability(Capability::Extract));
        assert_eq!(grant.capabilities().len(), 2);
    }

    #[test]
    fn test_capabilities_deduplicate() {
        let grant =
            RightsGrant::single("a@x.com", [Capability::View, Capability::View]).unwrap();
        assert_eq!(grant.capabilities().len(), 1);
    }

    #[test]
    fn test_without_strips_capability() {
        let grant = RightsGrant::single("c@x.com", [Capability::Owner, Capability::View]).unwrap();
        let stripped = grant.without(Capability::Owner).unwrap();
        assert!(!stripped.has_capability(Capability::Owner));
        assert!(stripped.has_capability(Capability::View));
        assert_eq!(stripped.principals(), grant.principals());
    }

    #[test]
    fn test_without_last_capability_is_none() {
        let grant = RightsGrant::single("c@x.com", [Capability::Owner]).unwrap();
        assert!(grant.without(Capability::Owner).is_none());
    }

    #[test]
    fn test_principals_are_trimmed() {
        let grant = RightsGrant::single(" a@x.com ", [Capability::View]).unwrap();
        assert!(grant.has_principal("a@x.com"));
    }
}
