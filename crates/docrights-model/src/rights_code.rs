//! # Rights codes
//!
//! Requests carry short rights codes (`"1"`, `"2"`, ...) rather than capability
//! tokens. The service configuration maps each code to a capability.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::capability::Capability;
use crate::error::{ModelError, ModelResult};

/// Validated lookup table from rights code to capability.
///
/// Codes are matched case-sensitively. Every capability in the table is known
/// to be part of the vocabulary; an invalid token is rejected when the table
/// is built, not when a request is served.
///
/// # Example
///
/// ```
/// use docrights_model::{Capability, ModelError, RightsCodeTable};
///
/// let table = RightsCodeTable::from_pairs([("1", "VIEW"), ("2", "EDIT")]).unwrap();
///
/// assert_eq!(table.resolve("1"), Ok(Capability::View));
/// assert_eq!(table.resolve("9"), Err(ModelError::UnknownRightsCode("9".to_string())));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightsCodeTable {
    entries: BTreeMap<String, Capability>,
}

impl RightsCodeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from (code, capability token) pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries = BTreeMap::new();
        for (code, token) in pairs {
            let code = code.as_ref().trim();
            if code.is_empty() {
                return Err(ModelError::InvalidRightsMapEntry(format!(
                    "empty code for {}",
                    token.as_ref()
                )));
            }
            let capability = token.as_ref().parse::<Capability>()?;
            entries.insert(code.to_string(), capability);
        }
        Ok(Self { entries })
    }

    /// Parse a `code=TOKEN,code=TOKEN` specification.
    ///
    /// ```
    /// use docrights_model::{Capability, RightsCodeTable};
    ///
    /// let table = RightsCodeTable::parse("1=VIEW, 2=EDIT ,3=PRINT").unwrap();
    /// assert_eq!(table.len(), 3);
    /// assert_eq!(table.resolve("3").unwrap(), Capability::Print);
    /// assert!(RightsCodeTable::parse("1").is_err());
    /// ```
    pub fn parse(spec: &str) -> ModelResult<Self> {
        let pairs = spec
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry
                    .split_once('=')
                    .ok_or_else(|| ModelError::InvalidRightsMapEntry(entry.to_string()))
            })
            .collect::<ModelResult<Vec<_>>>()?;

        Self::from_pairs(pairs)
    }

    /// Add or replace an entry.
    pub fn with_entry(mut self, code: impl Into<String>, capability: Capability) -> Self {
        self.entries.insert(code.into(), capability);
        self
    }

    /// Resolve a single rights code.
    pub fn resolve(&self, code: &str) -> ModelResult<Capability> {
        self.entries
            .get(code)
            .copied()
            .ok_or_else(|| ModelError::UnknownRightsCode(code.to_string()))
    }

    /// Iterate over (code, capability) entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Capability)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_case_sensitive() {
        let table = RightsCodeTable::from_pairs([("v", "VIEW")]).unwrap();
        assert!(table.resolve("v").is_ok());
        assert_eq!(
            table.resolve("V"),
            Err(ModelError::UnknownRightsCode("V".to_string()))
        );
    }

    #[test]
    fn test_unknown_capability_rejected_at_build() {
        let err = RightsCodeTable::from_pairs([("1", "TELEPORT")]).unwrap_err();
        assert_eq!(err, ModelError::UnknownCapability("TELEPORT".to_string()));
    }

    #[test]
    fn test_empty_code_rejected() {
        assert!(matches!(
            RightsCodeTable::parse(" =VIEW"),
            Err(ModelError::InvalidRightsMapEntry(_))
        ));
    }

    #[test]
    fn test_parse_empty_spec() {
        let table = RightsCodeTable::parse("").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_with_entry_overrides() {
        let table = RightsCodeTable::parse("1=VIEW")
            .unwrap()
            .with_entry("1", Capability::FullControl);
        assert_eq!(table.resolve("1").unwrap(), Capability::FullControl);
    }

    #[test]
    fn test_iter_in_code_order() {
        let table = RightsCodeTable::parse("2=EDIT,1=VIEW").unwrap();
        let codes: Vec<&str> = table.iter().map(|(c, _)| c).collect();
        assert_eq!(codes, vec!["1", "2"]);
    }
}
