//! Presentation summary of a validation result.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::models::ValidationResult;

/// Remedy shown when the backend killed the validator for taking too long.
pub const TIMEOUT_HINT: &str =
    "Validation timed out: increase FACTEMICLI_TIMEOUT on the backend (e.g. 600-1200s)";

static SUCCESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)validado com sucesso|response code="200""#).expect("static pattern")
});
static BAD_PARAMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)parametro .*n[aã]o conhecido|parametros dispon[ií]veis|usage")
        .expect("static pattern")
});
static MISSING_CREDENTIALS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)no at password").expect("static pattern"));
static PROBLEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)erro|error|inv[aá]lid|falh[ao]").expect("static pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Ok => f.write_str("OK"),
            Severity::Warning => f.write_str("WARNINGS"),
            Severity::Error => f.write_str("ERRORS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub severity: Severity,
    pub summary: &'static str,
    /// The file passed validation and can be sent to the tax authority.
    pub ready_for_submission: bool,
    pub timeout_hint: Option<&'static str>,
}

impl Verdict {
    pub fn of(result: &ValidationResult) -> Self {
        let output = format!("{}\n{}", result.stdout, result.stderr);
        let succeeded = SUCCESS_RE.is_match(&output);
        let exit_ok = result.returncode == Some(0);
        let missing_credentials = !result.ok
            && result
                .error
                .as_deref()
                .is_some_and(|e| MISSING_CREDENTIALS_RE.is_match(e));

        let (severity, summary) = if BAD_PARAMS_RE.is_match(&output) {
            (Severity::Error, "Validator was invoked with invalid parameters")
        } else if missing_credentials {
            (
                Severity::Error,
                "No tax authority credentials stored for this taxpayer",
            )
        } else if !exit_ok {
            (Severity::Error, "Validator exited with a non-zero return code")
        } else if PROBLEM_RE.is_match(&output) && !succeeded {
            (Severity::Warning, "Output contains error or warning messages")
        } else {
            (Severity::Ok, "Validation finished")
        };

        Self {
            severity,
            summary,
            ready_for_submission: exit_ok && succeeded,
            timeout_hint: result.timeout.then_some(TIMEOUT_HINT),
        }
    }
}
