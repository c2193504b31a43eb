//! # Capabilities
//!
//! The fixed vocabulary of rights that can be granted on a protected document.
//! Tokens are the upper-case names understood by the protection engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// A right a principal can hold on a protected document.
///
/// The vocabulary is closed. Tokens coming from configuration or from a
/// document's existing protection are parsed with [`Capability::parse`];
/// anything outside the vocabulary is rejected rather than coerced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Owns the document; may change its protection.
    #[serde(rename = "OWNER")]
    Owner,

    /// May open and read the document.
    #[serde(rename = "VIEW")]
    View,

    /// May edit and save the document.
    #[serde(rename = "EDIT")]
    Edit,

    /// May edit the document content in place.
    #[serde(rename = "DOCEDIT")]
    DocEdit,

    /// May copy or extract content out of the document.
    #[serde(rename = "EXTRACT")]
    Extract,

    /// May print the document.
    #[serde(rename = "PRINT")]
    Print,

    /// May save an unprotected copy.
    #[serde(rename = "EXPORT")]
    Export,

    /// May add comments.
    #[serde(rename = "COMMENT")]
    Comment,

    /// May forward (mail items).
    #[serde(rename = "FORWARD")]
    Forward,

    /// May reply (mail items).
    #[serde(rename = "REPLY")]
    Reply,

    /// May reply to all (mail items).
    #[serde(rename = "REPLYALL")]
    ReplyAll,

    /// May access the document through its object model (macros).
    #[serde(rename = "OBJMODEL")]
    ObjModel,

    /// May read the protection policy itself.
    #[serde(rename = "VIEWRIGHTSDATA")]
    ViewRightsData,

    /// May change the protection policy.
    #[serde(rename = "EDITRIGHTSDATA")]
    EditRightsData,

    /// Every usage right short of ownership.
    #[serde(rename = "FULL_CONTROL")]
    FullControl,
}

impl Capability {
    /// Get the engine token for this capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Owner => "OWNER",
            Capability::View => "VIEW",
            Capability::Edit => "EDIT",
            Capability::DocEdit => "DOCEDIT",
            Capability::Extract => "EXTRACT",
            Capability::Print => "PRINT",
            Capability::Export => "EXPORT",
            Capability::Comment => "COMMENT",
            Capability::Forward => "FORWARD",
            Capability::Reply => "REPLY",
            Capability::ReplyAll => "REPLYALL",
            Capability::ObjModel => "OBJMODEL",
            Capability::ViewRightsData => "VIEWRIGHTSDATA",
            Capability::EditRightsData => "EDITRIGHTSDATA",
            Capability::FullControl => "FULL_CONTROL",
        }
    }

    /// Parse a capability token.
    ///
    /// Matching is case-insensitive and accepts a few common aliases.
    ///
    /// # Example
    ///
    /// ```
    /// use docrights_model::Capability;
    ///
    /// assert_eq!(Capability::parse("EDIT"), Some(Capability::Edit));
    /// assert_eq!(Capability::parse("read"), Some(Capability::View));
    /// assert_eq!(Capability::parse("FullControl"), Some(Capability::FullControl));
    /// assert_eq!(Capability::parse("teleport"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OWNER" => Some(Capability::Owner),
            "VIEW" | "READ" => Some(Capability::View),
            "EDIT" | "WRITE" => Some(Capability::Edit),
            "DOCEDIT" => Some(Capability::DocEdit),
            "EXTRACT" | "COPY" => Some(Capability::Extract),
            "PRINT" => Some(Capability::Print),
            "EXPORT" => Some(Capability::Export),
            "COMMENT" => Some(Capability::Comment),
            "FORWARD" => Some(Capability::Forward),
            "REPLY" => Some(Capability::Reply),
            "REPLYALL" | "REPLY_ALL" => Some(Capability::ReplyAll),
            "OBJMODEL" => Some(Capability::ObjModel),
            "VIEWRIGHTSDATA" => Some(Capability::ViewRightsData),
            "EDITRIGHTSDATA" => Some(Capability::EditRightsData),
            "FULL_CONTROL" | "FULLCONTROL" => Some(Capability::FullControl),
            _ => None,
        }
    }

    /// The capability set every owner grant carries.
    pub fn owner_set() -> [Capability; 2] {
        [Capability::Owner, Capability::Extract]
    }

    /// Get all capabilities.
    pub fn all() -> &'static [Capability] {
        &[
            Capability::Owner,
            Capability::View,
            Capability::Edit,
            Capability::DocEdit,
            Capability::Extract,
            Capability::Print,
            Capability::Export,
            Capability::Comment,
            Capability::Forward,
            Capability::Reply,
            Capability::ReplyAll,
            Capability::ObjModel,
            Capability::ViewRightsData,
            Capability::EditRightsData,
            Capability::FullControl,
        ]
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ModelError::UnknownCapability(s.to_string()))
    }
}
