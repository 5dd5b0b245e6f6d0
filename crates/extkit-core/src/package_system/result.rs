use serde::Serialize;
use serde_json::Value;

use crate::package_system::error::{ErrorKind, PackageError};

/// Structured outcome returned by every facade operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error_kind: None,
        }
    }

    pub fn ok_with<T: Serialize>(message: impl Into<String>, data: &T) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Cannot serialize operation data: {}", e);
                None
            }
        };
        Self {
            data,
            ..Self::ok(message)
        }
    }

    pub fn failure(err: &PackageError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            data: None,
            error_kind: Some(err.kind()),
        }
    }

    /// Convert an operation outcome, describing success with `describe`
    pub fn from_outcome<T, F>(outcome: Result<T, PackageError>, describe: F) -> Self
    where
        T: Serialize,
        F: FnOnce(&T) -> String,
    {
        match outcome {
            Ok(value) => Self::ok_with(describe(&value), &value),
            Err(e) => {
                log::error!("{}", e);
                Self::failure(&e)
            }
        }
    }

    /// Field of `data`, if present
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }
}
