//! Protection requests.
//!
//! A [`ProtectionRequest`] carries the document (raw bytes or base64 text),
//! its declared file name, the subjects and rights codes to grant, an
//! optional owner and per-call retention overrides.

use crate::error::{ProtectionError, ProtectionResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docrights_model::split_list;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Document content as received from the caller.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePayload {
    /// Raw bytes (multipart upload).
    Bytes(Vec<u8>),
    /// Base64-encoded content (JSON body).
    Encoded(String),
}

impl FilePayload {
    /// Decode into the bytes to write to disk.
    pub fn decode(&self) -> ProtectionResult<Vec<u8>> {
        match self {
            FilePayload::Bytes(bytes) => Ok(bytes.clone()),
            FilePayload::Encoded(text) => STANDARD.decode(text.trim()).map_err(|e| {
                ProtectionError::Validation(format!("fileContent is not valid base64: {}", e))
            }),
        }
    }

    /// Check whether the payload carries no content.
    pub fn is_empty(&self) -> bool {
        match self {
            FilePayload::Bytes(bytes) => bytes.is_empty(),
            FilePayload::Encoded(text) => text.trim().is_empty(),
        }
    }
}

impl std::fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilePayload::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            FilePayload::Encoded(text) => write!(f, "Encoded({} chars)", text.len()),
        }
    }
}

/// A single protect/unprotect/add-permissions call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionRequest {
    /// Declared logical file name.
    pub file_name: String,

    pub payload: FilePayload,

    /// Comma-separated principal identifiers.
    #[serde(default)]
    pub subject_emails: String,

    /// Comma-separated rights codes.
    #[serde(default)]
    pub rights_codes: String,

    #[serde(default)]
    pub owner_email: Option<String>,

    /// Overrides the configured input retention.
    #[serde(default)]
    pub retain_input: Option<bool>,

    /// Overrides the configured output retention.
    #[serde(default)]
    pub retain_output: Option<bool>,
}

impl ProtectionRequest {
    /// Request carrying raw bytes.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(file_name, FilePayload::Bytes(bytes))
    }

    /// Request carrying base64 content.
    pub fn from_encoded(file_name: impl Into<String>, encoded: impl Into<String>) -> Self {
        Self::new(file_name, FilePayload::Encoded(encoded.into()))
    }

    fn new(file_name: impl Into<String>, payload: FilePayload) -> Self {
        Self {
            file_name: file_name.into(),
            payload,
            subject_emails: String::new(),
            rights_codes: String::new(),
            owner_email: None,
            retain_input: None,
            retain_output: None,
        }
    }

    pub fn with_subjects(mut self, subjects: impl Into<String>) -> Self {
        self.subject_emails = subjects.into();
        self
    }

    pub fn with_rights_codes(mut self, codes: impl Into<String>) -> Self {
        self.rights_codes = codes.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_email = Some(owner.into());
        self
    }

    pub fn with_retention(mut self, retain_input: bool, retain_output: bool) -> Self {
        self.retain_input = Some(retain_input);
        self.retain_output = Some(retain_output);
        self
    }

    /// Subject principals, trimmed, empty entries dropped.
    pub fn subjects(&self) -> Vec<String> {
        split_list(&self.subject_emails)
    }

    /// Rights codes, trimmed, empty entries dropped.
    pub fn codes(&self) -> Vec<String> {
        split_list(&self.rights_codes)
    }

    /// The requested owner when it is non-blank.
    pub fn explicit_owner(&self) -> Option<&str> {
        self.owner_email
            .as_deref()
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
    }

    /// Lowercase extension of the declared name, including the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
    }

    /// Reject the request before anything is staged.
    ///
    /// `unsupported_extensions` holds lowercase entries such as `.exe`.
    pub fn validate(&self, unsupported_extensions: &[String]) -> ProtectionResult<()> {
        validate_file_name(&self.file_name)?;

        if self.payload.is_empty() {
            return Err(ProtectionError::Validation(
                "file content is required".to_string(),
            ));
        }

        if let Some(ext) = self.extension() {
            if unsupported_extensions.iter().any(|denied| *denied == ext) {
                return Err(ProtectionError::Validation(format!(
                    "Unsupported file format: {}",
                    ext
                )));
            }
        }

        Ok(())
    }
}

/// Check that a declared name is a bare, non-traversing file name.
pub fn validate_file_name(name: &str) -> ProtectionResult<()> {
    if name.trim().is_empty() {
        return Err(ProtectionError::Validation("fileName is required".to_string()));
    }
    if name.contains("..") {
        return Err(ProtectionError::Validation(format!(
            "fileName must not contain '..': {}",
            name
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(ProtectionError::Validation(format!(
            "fileName must not contain path separators: {}",
            name
        )));
    }
    Ok(())
}
