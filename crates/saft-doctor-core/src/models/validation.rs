use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use super::issue::{Fix, Issue};

/// Backend validation operation. The two are mutually exclusive per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Dry check only
    Validar,
    /// Same check, then submission to the tax authority on success
    Enviar,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Validar => "validar",
            Operation::Enviar => "enviar",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query options shared by the validation endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Ask for full stdout/stderr and structured issues (`full=1`)
    pub full: bool,
    /// Only honoured by the multipart endpoint
    pub dry_run: Option<bool>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            full: true,
            dry_run: None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Outcome of one backend validation call. Produced fresh by every call and
/// never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returncode: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stdout: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stderr: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<Issue>,
    /// Audit trail of the invoked command, credentials redacted
    #[serde(default, deserialize_with = "null_as_default")]
    pub cmd_masked: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    /// The backend killed the validator after its configured timeout
    #[serde(default, deserialize_with = "null_as_default")]
    pub timeout: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Value>,
    /// Raw body kept when the response could not be parsed
    #[serde(skip)]
    pub raw: Option<String>,
    #[serde(skip)]
    pub http_status: Option<u16>,
}

impl ValidationResult {
    /// Display-only fallback for a body that is not valid structured data.
    pub fn unstructured(status: u16, text: impl Into<String>) -> Self {
        Self {
            ok: false,
            raw: Some(text.into()),
            http_status: Some(status),
            ..Default::default()
        }
    }

    /// Parse a response body. Never fails: anything that is not a JSON object
    /// degrades to [`ValidationResult::unstructured`].
    pub fn from_body(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Self::unstructured(status, String::new());
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value @ Value::Object(_)) => match serde_json::from_value::<Self>(value) {
                Ok(mut result) => {
                    result.http_status = Some(status);
                    if !(200..300).contains(&status) {
                        result.ok = false;
                    }
                    result
                }
                Err(_) => Self::unstructured(status, body),
            },
            _ => Self::unstructured(status, body),
        }
    }

    pub fn is_structured(&self) -> bool {
        self.raw.is_none()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Issues that carry at least one usable suggestion.
    pub fn fixable_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_fixable())
    }

    /// The backend's own failure description, if it gave one.
    pub fn failure_message(&self) -> Option<String> {
        if let Some(err) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return Some(err.to_string());
        }
        match &self.detail {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(v) if !v.is_null() => Some(v.to_string()),
            _ => None,
        }
    }

    /// Command line that the backend ran, joined for display.
    pub fn command_line(&self) -> Option<String> {
        if self.cmd_masked.is_empty() {
            None
        } else {
            Some(self.cmd_masked.join(" "))
        }
    }
}

/// Body of `POST /pt/upload/apply-fixes-and-validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyFixesRequest<'a> {
    pub upload_id: &'a str,
    pub fixes: &'a [Fix],
}

/// Response of `apply-fixes-and-validate`: the number of fixes the backend
/// applied plus the re-validation it ran atomically afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyFixesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub applied: u64,
    #[serde(flatten)]
    pub result: ValidationResult,
}

impl ApplyFixesResponse {
    pub fn from_body(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        let applied = serde_json::from_str::<Value>(trimmed)
            .ok()
            .and_then(|v| v.get("applied").and_then(Value::as_u64))
            .unwrap_or(0);
        Self {
            applied,
            result: ValidationResult::from_body(status, body),
        }
    }
}
