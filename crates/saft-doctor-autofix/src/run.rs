use saft_doctor_core::models::{Issue, Operation, ValidationResult};
use saft_doctor_core::{
    build_fix_list, ClientConfig, ClientError, SuggestionSelections, TIMEOUT_HINT,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backend::FixBackend;
use crate::report::{AutoFixReport, LoopState, Submission};

const MAX_ITERATIONS: u32 = 20;
const DELAY_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct AutoFixConfig {
    /// Maximum number of fix applications
    pub max_iterations: u32,
    /// Pause between iterations
    pub delay: Duration,
    /// Submit to the tax authority once the file is clean
    pub should_submit: bool,
}

impl Default for AutoFixConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            delay: Duration::from_millis(DELAY_MS),
            should_submit: false,
        }
    }
}

impl AutoFixConfig {
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            max_iterations: config.max_fix_iterations,
            delay: config.fix_delay,
            should_submit: false,
        }
    }
}

/// What a validation result means for the loop.
enum Assessment {
    Clean,
    HasIssues,
    Failed(String),
}

fn judge(result: &ValidationResult) -> Assessment {
    if !result.is_structured() {
        let status = result
            .http_status
            .map(|s| format!(" (HTTP {})", s))
            .unwrap_or_default();
        return Assessment::Failed(format!("Backend returned an unreadable response{}", status));
    }
    if result.timeout {
        return Assessment::Failed(TIMEOUT_HINT.to_string());
    }
    if result.has_issues() {
        return Assessment::HasIssues;
    }
    match result.failure_message() {
        Some(message) => Assessment::Failed(message),
        None => Assessment::Clean,
    }
}

/// Bookkeeping for one run.
struct Run {
    upload_id: String,
    trace: Vec<LoopState>,
    iteration: u32,
    max_iterations: u32,
    total_fixed: u64,
    last_result: Option<ValidationResult>,
}

impl Run {
    fn enter(&mut self, state: LoopState) {
        tracing::debug!(
            upload_id = %self.upload_id,
            iteration = self.iteration,
            state = %state,
            "Auto-fix state"
        );
        self.trace.push(state);
    }

    fn finish(mut self, state: LoopState, failure: Option<String>) -> AutoFixReport {
        self.enter(state);
        // The counter moves past the cap once the last permitted round is applied.
        let iterations = self.iteration.min(self.max_iterations.max(1));
        let remaining_issues: Vec<Issue> = self
            .last_result
            .as_ref()
            .map(|r| r.issues.clone())
            .unwrap_or_default();

        tracing::info!(
            upload_id = %self.upload_id,
            outcome = %state,
            iterations = iterations,
            total_fixed = self.total_fixed,
            remaining = remaining_issues.len(),
            "Auto-fix finished"
        );

        AutoFixReport {
            upload_id: self.upload_id,
            trace: self.trace,
            iterations,
            total_fixed: self.total_fixed,
            remaining_issues,
            last_result: self.last_result,
            failure,
            submission: None,
        }
    }
}

/// Drives repeated fix application against one upload session.
pub struct AutoFixLoop<B> {
    backend: B,
    config: AutoFixConfig,
}

impl<B: FixBackend> AutoFixLoop<B> {
    pub fn new(backend: B, config: AutoFixConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &AutoFixConfig {
        &self.config
    }

    /// Validate `upload_id` and fix until a terminal state. `selections` apply
    /// to the first iteration's issues only; later iterations use each issue's
    /// first suggestion.
    pub async fn run(
        &self,
        upload_id: &str,
        selections: Option<&SuggestionSelections>,
        cancel: &CancellationToken,
    ) -> AutoFixReport {
        self.drive(upload_id, None, selections, cancel).await
    }

    /// Like [`run`](Self::run), but reuse a validation the caller already made
    /// instead of validating again.
    pub async fn resume(
        &self,
        upload_id: &str,
        initial: ValidationResult,
        selections: Option<&SuggestionSelections>,
        cancel: &CancellationToken,
    ) -> AutoFixReport {
        self.drive(upload_id, Some(initial), selections, cancel).await
    }

    async fn drive(
        &self,
        upload_id: &str,
        initial: Option<ValidationResult>,
        selections: Option<&SuggestionSelections>,
        cancel: &CancellationToken,
    ) -> AutoFixReport {
        let mut run = Run {
            upload_id: upload_id.to_string(),
            trace: Vec::new(),
            iteration: 1,
            max_iterations: self.config.max_iterations,
            total_fixed: 0,
            last_result: None,
        };
        let defaults = SuggestionSelections::new();

        tracing::info!(
            upload_id = %upload_id,
            max_iterations = self.config.max_iterations,
            should_submit = self.config.should_submit,
            "Starting auto-fix"
        );

        run.enter(LoopState::Validating);
        let mut current: Result<ValidationResult, ClientError> = match initial {
            Some(result) => Ok(result),
            None => {
                if cancel.is_cancelled() {
                    return run.finish(LoopState::Cancelled, None);
                }
                self.backend
                    .validate_upload(upload_id, Operation::Validar)
                    .await
            }
        };

        loop {
            let result = match current {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(upload_id = %upload_id, error = %err, "Auto-fix request failed");
                    return run.finish(LoopState::Failed, Some(err.to_string()));
                }
            };
            let assessment = judge(&result);
            run.last_result = Some(result);

            match assessment {
                Assessment::Clean => {
                    let mut report = run.finish(LoopState::Converged, None);
                    if self.config.should_submit {
                        report.submission = Some(self.submit(upload_id, cancel).await);
                    }
                    return report;
                }
                Assessment::Failed(message) => return run.finish(LoopState::Failed, Some(message)),
                Assessment::HasIssues => {}
            }

            if run.iteration > self.config.max_iterations {
                return run.finish(LoopState::CapExceeded, None);
            }

            run.enter(LoopState::Fixing);
            let selections = match selections {
                Some(chosen) if run.iteration == 1 => chosen,
                _ => &defaults,
            };
            let fixes = match run.last_result.as_ref() {
                Some(last) => build_fix_list(&last.issues, selections),
                None => Vec::new(),
            };
            if fixes.is_empty() {
                return run.finish(LoopState::Stalled, None);
            }

            if run.iteration > 1 && !self.config.delay.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => return run.finish(LoopState::Cancelled, None),
                    () = tokio::time::sleep(self.config.delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return run.finish(LoopState::Cancelled, None);
            }

            tracing::info!(
                upload_id = %upload_id,
                iteration = run.iteration,
                fixes = fixes.len(),
                "Applying fixes"
            );

            current = match self.backend.apply_fixes(upload_id, &fixes).await {
                Ok(response) => {
                    run.total_fixed = run.total_fixed.saturating_add(response.applied);
                    run.iteration += 1;
                    run.enter(LoopState::Validating);
                    Ok(response.result)
                }
                Err(err) => Err(err),
            };
        }
    }

    async fn submit(&self, upload_id: &str, cancel: &CancellationToken) -> Submission {
        if cancel.is_cancelled() {
            return Submission::Error("Cancelled before submission".to_string());
        }
        tracing::info!(upload_id = %upload_id, "Submitting corrected file");
        match self
            .backend
            .validate_upload(upload_id, Operation::Enviar)
            .await
        {
            Ok(result) if result.ok && !result.has_issues() => Submission::Accepted(result),
            Ok(result) => {
                tracing::warn!(
                    upload_id = %upload_id,
                    error = ?result.failure_message(),
                    "Submission not accepted"
                );
                Submission::Rejected(result)
            }
            Err(err) => {
                tracing::warn!(upload_id = %upload_id, error = %err, "Submission failed");
                Submission::Error(err.to_string())
            }
        }
    }
}
