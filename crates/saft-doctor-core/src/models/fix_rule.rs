use serde::{Deserialize, Serialize};

use super::issue::Suggestion;
use crate::error::ClientError;

/// Matching pattern of a custom fix rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRulePattern {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "match")]
    pub matches: String,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// A user-defined rule that maps validator messages to suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRule {
    pub id: String,
    pub name: String,
    pub pattern: FixRulePattern,
    pub code: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    pub fix_type: String,
    pub enabled: bool,
}

impl FixRule {
    /// Case-insensitive regex rule with the given suggestions.
    pub fn regex(
        id: impl Into<String>,
        name: impl Into<String>,
        code: impl Into<String>,
        pattern: impl Into<String>,
        suggestions: Vec<Suggestion>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            pattern: FixRulePattern {
                kind: "regex".to_string(),
                matches: pattern.into(),
                flags: vec!["IGNORECASE".to_string()],
            },
            code: code.into(),
            suggestions,
            fix_type: "custom".to_string(),
            enabled: true,
        }
    }

    /// Reject rules the backend could never match: blank fields, an invalid
    /// pattern, or half-filled suggestions.
    pub fn validate(&self) -> Result<(), ClientError> {
        for (field, value) in [
            ("id", &self.id),
            ("name", &self.name),
            ("code", &self.code),
            ("pattern", &self.pattern.matches),
        ] {
            if value.trim().is_empty() {
                return Err(ClientError::InvalidInput(format!(
                    "Fix rule {} must not be empty",
                    field
                )));
            }
        }

        if self.pattern.kind == "regex" {
            let case_insensitive = self
                .pattern
                .flags
                .iter()
                .any(|f| f.eq_ignore_ascii_case("IGNORECASE"));
            regex::RegexBuilder::new(&self.pattern.matches)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| ClientError::InvalidInput(format!("Invalid rule pattern: {}", e)))?;
        }

        let incomplete = |s: &Suggestion| {
            s.label.trim().is_empty() || s.reason.trim().is_empty() || s.code.trim().is_empty()
        };
        if let Some(idx) = self.suggestions.iter().position(incomplete) {
            return Err(ClientError::InvalidInput(format!(
                "Suggestion {} needs a label, reason and code",
                idx + 1
            )));
        }

        Ok(())
    }
}

/// Response of `POST /pt/fix-rules`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixRuleResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
