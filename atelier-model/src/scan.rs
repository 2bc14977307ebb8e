//! Values produced by the QR scan flow.

use std::fmt;

use crate::error::{ModelError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque token decoded from a QR code and exchanged with the server to
/// approve a session or device link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ScanToken(String);

impl ScanToken {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyToken);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded frame that matched a known payload format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Text exactly as the decoder produced it.
    pub raw: String,
    pub token: ScanToken,
    /// Redirect target carried inside the payload, if any.
    pub redirect: Option<String>,
}

/// Server verdict for an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ScanApproval {
    pub success: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub message: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, alias = "redirectUrl"))]
    pub redirect: Option<String>,
}

impl ScanApproval {
    pub fn approved(redirect: Option<String>) -> Self {
        Self {
            success: true,
            message: None,
            redirect,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            redirect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_token_trims_and_rejects_blank() {
        assert_eq!(ScanToken::new("  abc ").unwrap().as_str(), "abc");
        assert_eq!(ScanToken::new("   "), Err(ModelError::EmptyToken));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn approval_accepts_redirect_url_alias() {
        let approval: ScanApproval = serde_json::from_str(
            r#"{"success":true,"redirectUrl":"/studio"}"#,
        )
        .unwrap();
        assert!(approval.success);
        assert_eq!(approval.redirect.as_deref(), Some("/studio"));
        assert_eq!(approval.message, None);
    }
}
