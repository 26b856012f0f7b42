use saft_doctor_core::models::{Issue, ValidationResult};
use serde::Serialize;
use std::fmt;

/// States of the auto-fix loop. The last five are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Validating,
    Fixing,
    Converged,
    Stalled,
    CapExceeded,
    Failed,
    Cancelled,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoopState::Validating | LoopState::Fixing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Validating => "validating",
            LoopState::Fixing => "fixing",
            LoopState::Converged => "converged",
            LoopState::Stalled => "stalled",
            LoopState::CapExceeded => "cap_exceeded",
            LoopState::Failed => "failed",
            LoopState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the submission made after convergence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Submission {
    /// The backend ran `enviar` and reported success
    Accepted(ValidationResult),
    /// The backend ran `enviar` but the result is not ok
    Rejected(ValidationResult),
    /// The request itself failed
    Error(String),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted(_))
    }
}

/// Final report of one loop run. Progress made before a failure is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoFixReport {
    pub upload_id: String,
    /// Every state the loop went through, ending with the terminal one
    pub trace: Vec<LoopState>,
    /// 1-based iteration the loop ended in; never above the iteration cap
    pub iterations: u32,
    pub total_fixed: u64,
    pub remaining_issues: Vec<Issue>,
    pub last_result: Option<ValidationResult>,
    pub failure: Option<String>,
    pub submission: Option<Submission>,
}

impl AutoFixReport {
    pub fn outcome(&self) -> LoopState {
        self.trace.last().copied().unwrap_or(LoopState::Validating)
    }

    pub fn converged(&self) -> bool {
        self.outcome() == LoopState::Converged
    }

    /// One-line status for the user.
    pub fn summary(&self) -> String {
        match self.outcome() {
            LoopState::Converged => format!(
                "File is clean after {} iteration(s); {} fix(es) applied",
                self.iterations, self.total_fixed
            ),
            LoopState::Stalled => format!(
                "No automatic fix available for the remaining {} issue(s); {} fix(es) applied",
                self.remaining_issues.len(),
                self.total_fixed
            ),
            LoopState::CapExceeded => format!(
                "Stopped after {} fix round(s) with {} issue(s) left; {} fix(es) applied",
                self.iterations,
                self.remaining_issues.len(),
                self.total_fixed
            ),
            LoopState::Failed => format!(
                "Auto-fix failed in iteration {}: {}; {} fix(es) applied",
                self.iterations,
                self.failure.as_deref().unwrap_or("unknown error"),
                self.total_fixed
            ),
            LoopState::Cancelled => format!(
                "Auto-fix cancelled in iteration {}; {} fix(es) applied",
                self.iterations, self.total_fixed
            ),
            LoopState::Validating | LoopState::Fixing => "Auto-fix still running".to_string(),
        }
    }
}
