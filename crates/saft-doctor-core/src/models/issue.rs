use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where an issue was found in the SAFT file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u64>,
    /// Snippet of the offending line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// A candidate automated correction for an issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub code: String,
}

/// The single-suggestion shape. The backend sends either a bare replacement value
/// (e.g. a corrected country code) or a full suggestion object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuggestedFix {
    Text(String),
    Structured(Suggestion),
    Other(Value),
}

impl SuggestedFix {
    /// An empty string or an empty object carries nothing to apply.
    pub fn is_usable(&self) -> bool {
        match self {
            SuggestedFix::Text(s) => !s.trim().is_empty(),
            SuggestedFix::Structured(s) => {
                !(s.label.is_empty() && s.reason.is_empty() && s.code.is_empty())
            }
            SuggestedFix::Other(v) => match v {
                Value::Null | Value::Bool(false) => false,
                Value::Array(a) => !a.is_empty(),
                Value::Object(o) => !o.is_empty(),
                _ => true,
            },
        }
    }

    pub fn display(&self) -> String {
        match self {
            SuggestedFix::Text(s) => s.clone(),
            SuggestedFix::Structured(s) => s.label.clone(),
            SuggestedFix::Other(v) => v.to_string(),
        }
    }
}

/// A single validation finding returned by the backend validator.
///
/// Fields the client does not model (such as the offending `value`) are kept in
/// `extra` so they travel back to the backend unchanged when the issue is
/// submitted as a fix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Category tag (e.g. "INVALID_COUNTRY", "JAR_ERROR")
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<IssueLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<SuggestedFix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Suggestion>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Issue {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn has_single_suggestion(&self) -> bool {
        self.suggestion.as_ref().is_some_and(SuggestedFix::is_usable)
    }

    /// Candidate fixes when the issue offers a choice; empty otherwise.
    pub fn suggestion_list(&self) -> &[Suggestion] {
        self.suggestions.as_deref().unwrap_or(&[])
    }

    /// An issue is fixable iff it carries a usable single suggestion or a
    /// non-empty list of suggestions.
    pub fn is_fixable(&self) -> bool {
        self.has_single_suggestion() || !self.suggestion_list().is_empty()
    }

    /// Message cut to 100 characters for one-line listings.
    pub fn short_message(&self) -> String {
        const MAX: usize = 100;
        let mut chars = self.message.chars();
        let head: String = chars.by_ref().take(MAX).collect();
        if chars.next().is_some() {
            format!("{}…", head)
        } else {
            head
        }
    }

    pub fn line(&self) -> Option<u64> {
        self.location.as_ref().and_then(|l| l.line)
    }
}

/// A fix submitted to `apply-fixes-and-validate`: the issue itself, plus the
/// chosen suggestion when the issue offered several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    #[serde(flatten)]
    pub issue: Issue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_suggestion: Option<Suggestion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_keeps_unknown_fields() {
        let raw = r#"{
            "code": "INVALID_COUNTRY",
            "message": "O valor (\"Portugal\") no elemento \"Country\"",
            "customer_id": "C001",
            "value": "Portugal",
            "suggestion": "PT",
            "location": {"line": 120, "column": 7, "context": "<Country>Portugal</Country>"}
        }"#;
        let issue: Issue = serde_json::from_str(raw).unwrap();
        assert_eq!(issue.code, "INVALID_COUNTRY");
        assert_eq!(issue.customer_id.as_deref(), Some("C001"));
        assert_eq!(issue.extra.get("value"), Some(&Value::from("Portugal")));
        assert_eq!(issue.line(), Some(120));
        assert!(issue.is_fixable());

        let back = serde_json::to_value(&issue).unwrap();
        assert_eq!(back["value"], "Portugal");
        assert_eq!(back["suggestion"], "PT");
    }

    #[test]
    fn null_or_empty_suggestion_is_not_fixable() {
        let issue: Issue =
            serde_json::from_str(r#"{"code":"INVALID_COUNTRY","message":"m","suggestion":null}"#)
                .unwrap();
        assert!(!issue.is_fixable());

        let issue: Issue =
            serde_json::from_str(r#"{"code":"INVALID_COUNTRY","message":"m","suggestion":""}"#)
                .unwrap();
        assert!(!issue.is_fixable());

        let issue: Issue =
            serde_json::from_str(r#"{"code":"X","message":"m","suggestions":[]}"#).unwrap();
        assert!(!issue.is_fixable());
    }

    #[test]
    fn generic_jar_error_is_not_fixable() {
        let issue: Issue =
            serde_json::from_str(r#"{"code":"JAR_ERROR","message":"Erro na linha 3"}"#).unwrap();
        assert!(!issue.is_fixable());
        assert!(issue.location.is_none());
        assert!(issue.extra.is_empty());
    }

    #[test]
    fn structured_single_suggestion_is_accepted() {
        let issue: Issue = serde_json::from_str(
            r#"{"code":"X","message":"m","suggestion":{"label":"A","reason":"r","code":"M16"}}"#,
        )
        .unwrap();
        assert!(matches!(issue.suggestion, Some(SuggestedFix::Structured(_))));
        assert!(issue.is_fixable());
    }

    #[test]
    fn short_message_truncates_long_messages() {
        let issue = Issue::new("JAR_ERROR", "é".repeat(150));
        let short = issue.short_message();
        assert_eq!(short.chars().count(), 101);
        assert!(short.ends_with('…'));
        assert_eq!(Issue::new("X", "curta").short_message(), "curta");
    }

    #[test]
    fn fix_serializes_as_issue_plus_selection() {
        let mut issue = Issue::new("EMPTY_TAX_EXEMPTION", "empty reason");
        issue.suggestions = Some(vec![Suggestion {
            label: "M16".to_string(),
            reason: "Isento Artigo 14.º do RITI".to_string(),
            code: "M16".to_string(),
        }]);
        let fix = Fix {
            selected_suggestion: issue.suggestion_list().first().cloned(),
            issue,
        };
        let json = serde_json::to_value(&fix).unwrap();
        assert_eq!(json["code"], "EMPTY_TAX_EXEMPTION");
        assert_eq!(json["selected_suggestion"]["code"], "M16");
        assert_eq!(json["suggestions"].as_array().map(Vec::len), Some(1));
    }
}
