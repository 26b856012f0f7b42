//! Turning validation issues into the fix list sent to the backend.
//!
//! An issue with a single `suggestion` is sent back unchanged. An issue with a
//! list of `suggestions` is sent with the chosen entry attached as
//! `selected_suggestion` (the first one unless the user picked another). Issues
//! with neither are skipped.

use std::collections::BTreeMap;

use crate::models::{Fix, Issue};

/// Per-issue choice among multiple suggestions, keyed by the issue's position in
/// the list it was made against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionSelections {
    chosen: BTreeMap<usize, usize>,
}

impl SuggestionSelections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose suggestion `suggestion_index` for issue `issue_index`.
    ///
    /// The index is clamped to the issue's suggestion list. Selecting on an
    /// out-of-range issue or one without a suggestion list changes nothing and
    /// returns `None`; otherwise the effective index is returned.
    pub fn select(
        &mut self,
        issues: &[Issue],
        issue_index: usize,
        suggestion_index: usize,
    ) -> Option<usize> {
        let available = issues.get(issue_index)?.suggestion_list().len();
        if available == 0 {
            return None;
        }
        let effective = suggestion_index.min(available - 1);
        self.chosen.insert(issue_index, effective);
        Some(effective)
    }

    /// Selected suggestion index for an issue, defaulting to the first.
    pub fn selected_index(&self, issue_index: usize) -> usize {
        self.chosen.get(&issue_index).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }

    pub fn clear(&mut self) {
        self.chosen.clear();
    }
}

/// Build the fix list for `issues` under the current selections.
///
/// Pure: the same inputs always produce the same list.
pub fn build_fix_list(issues: &[Issue], selections: &SuggestionSelections) -> Vec<Fix> {
    issues
        .iter()
        .enumerate()
        .filter_map(|(idx, issue)| {
            let mut issue = issue.clone();
            // A stale selection echoed back by the backend must not shadow ours.
            issue.extra.remove("selected_suggestion");

            if issue.has_single_suggestion() {
                return Some(Fix {
                    issue,
                    selected_suggestion: None,
                });
            }

            let list = issue.suggestion_list();
            if list.is_empty() {
                return None;
            }
            let chosen = selections.selected_index(idx).min(list.len() - 1);
            let selected_suggestion = Some(list[chosen].clone());
            Some(Fix {
                issue,
                selected_suggestion,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SuggestedFix, Suggestion};

    fn suggestion(label: &str) -> Suggestion {
        Suggestion {
            label: label.to_string(),
            reason: format!("reason {}", label),
            code: label.to_string(),
        }
    }

    fn multi(labels: &[&str]) -> Issue {
        let mut issue = Issue::new("EMPTY_TAX_EXEMPTION", "Motivo de isenção vazio");
        issue.suggestions = Some(labels.iter().map(|l| suggestion(l)).collect());
        issue
    }

    fn single(value: &str) -> Issue {
        let mut issue = Issue::new("INVALID_COUNTRY", "País inválido");
        issue.suggestion = Some(SuggestedFix::Text(value.to_string()));
        issue
    }

    #[test]
    fn skips_issues_without_suggestions() {
        let issues = vec![Issue::new("JAR_ERROR", "erro genérico"), single("PT")];
        let fixes = build_fix_list(&issues, &SuggestionSelections::new());
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].issue.code, "INVALID_COUNTRY");
        assert!(fixes[0].selected_suggestion.is_none());
    }

    #[test]
    fn defaults_to_first_suggestion() {
        let issues = vec![multi(&["A", "B"])];
        let fixes = build_fix_list(&issues, &SuggestionSelections::new());
        assert_eq!(fixes[0].selected_suggestion.as_ref().map(|s| s.label.as_str()), Some("A"));
    }

    #[test]
    fn selecting_second_suggestion_is_carried_into_fix() {
        let issues = vec![multi(&["A", "B"])];
        let mut selections = SuggestionSelections::new();
        assert_eq!(selections.select(&issues, 0, 1), Some(1));

        let fixes = build_fix_list(&issues, &selections);
        let json = serde_json::to_value(&fixes[0]).unwrap();
        assert_eq!(json["selected_suggestion"]["label"], "B");
    }

    #[test]
    fn select_is_clamped_and_ignores_invalid_targets() {
        let issues = vec![multi(&["A", "B"]), single("PT")];
        let mut selections = SuggestionSelections::new();

        assert_eq!(selections.select(&issues, 0, 9), Some(1));
        assert_eq!(selections.select(&issues, 1, 0), None);
        assert_eq!(selections.select(&issues, 7, 0), None);
        assert_eq!(selections.selected_index(0), 1);
        assert_eq!(selections.selected_index(1), 0);
    }

    #[test]
    fn build_is_idempotent_and_selection_changes_only_its_issue() {
        let issues = vec![multi(&["A", "B"]), single("PT"), multi(&["X", "Y", "Z"])];
        let mut selections = SuggestionSelections::new();

        let first = build_fix_list(&issues, &selections);
        let again = build_fix_list(&issues, &selections);
        assert_eq!(first, again);

        selections.select(&issues, 2, 2);
        let changed = build_fix_list(&issues, &selections);
        assert_eq!(changed.len(), first.len());
        assert_eq!(changed[0], first[0]);
        assert_eq!(changed[1], first[1]);
        assert_ne!(changed[2], first[2]);
        assert_eq!(changed[2].selected_suggestion.as_ref().map(|s| s.label.as_str()), Some("Z"));
    }

    #[test]
    fn stale_selected_suggestion_field_is_replaced() {
        let raw = r#"{
            "code": "EMPTY_TAX_EXEMPTION",
            "message": "m",
            "suggestions": [{"label": "A", "reason": "r", "code": "M07"}],
            "selected_suggestion": {"label": "old", "reason": "", "code": ""}
        }"#;
        let issue: Issue = serde_json::from_str(raw).unwrap();
        let fixes = build_fix_list(&[issue], &SuggestionSelections::new());
        let json = serde_json::to_value(&fixes[0]).unwrap();
        assert_eq!(json["selected_suggestion"]["label"], "A");
    }
}
