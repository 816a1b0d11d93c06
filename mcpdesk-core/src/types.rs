//! Core data type definitions

use crate::error::{DeskError, DeskResult, ErrorContext};
use serde::{Deserialize, Deserializer, Serialize};

/// The unit of authentication state: bearer token plus identity and role flag
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredential {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub token: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl SessionCredential {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>, is_admin: bool) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            is_admin,
        }
    }

    /// `Authorization` header value for this credential
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Needs a user id and a token that can travel in an `Authorization` header
    pub fn is_well_formed(&self) -> bool {
        !self.user_id.trim().is_empty()
            && !self.token.is_empty()
            && self.token.bytes().all(|b| b.is_ascii_graphic())
    }
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

/// Accepts ids sent either as JSON strings or numbers
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Envelope every backend endpoint wraps its payload in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Business code, 0 means success
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Unwrap the payload, turning a non-zero business code into an error
    pub fn into_data(self) -> DeskResult<Option<T>> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(DeskError::Status {
                status: 200,
                message: if self.message.is_empty() {
                    format!("request failed with code {}", self.code)
                } else {
                    self.message
                },
                context: ErrorContext::new("api_response")
                    .with_operation("into_data")
                    .with_metadata("code", &self.code.to_string()),
            })
        }
    }

    /// Like `into_data` but a missing payload is an error too
    pub fn require_data(self) -> DeskResult<T> {
        self.into_data()?.ok_or_else(|| DeskError::Validation {
            message: "response has no data".to_string(),
            field: Some("data".to_string()),
            context: ErrorContext::new("api_response").with_operation("require_data"),
        })
    }
}
