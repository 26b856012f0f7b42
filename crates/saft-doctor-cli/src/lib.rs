//! Rendering and argument helpers for the `saft-doctor` binary.

use saft_doctor_autofix::{AutoFixReport, LoopState, Submission};
use saft_doctor_core::models::{
    DocumentsResponse, Issue, Suggestion, UploadProgress, ValidationResult,
};
use saft_doctor_core::{ClientError, Severity, Verdict};
use std::fmt::Write;

const OUTPUT_PREVIEW_LINES: usize = 40;
const RAW_PREVIEW_CHARS: usize = 2000;

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Parse an `ISSUE:SUGGESTION` pair of zero-based indices.
pub fn parse_selection(spec: &str) -> Result<(usize, usize), ClientError> {
    let invalid = || {
        ClientError::InvalidInput(format!(
            "Invalid selection '{}': expected ISSUE:SUGGESTION, e.g. 0:1",
            spec
        ))
    };
    let (issue, suggestion) = spec.split_once(':').ok_or_else(invalid)?;
    let issue = issue.trim().parse().map_err(|_| invalid())?;
    let suggestion = suggestion.trim().parse().map_err(|_| invalid())?;
    Ok((issue, suggestion))
}

/// Parse a `label:reason:code` suggestion. The reason may not contain ':'; the
/// code is everything after the second separator.
pub fn parse_suggestion(spec: &str) -> Result<Suggestion, ClientError> {
    let mut parts = spec.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(label), Some(reason), Some(code))
            if !label.trim().is_empty() && !reason.trim().is_empty() && !code.trim().is_empty() =>
        {
            Ok(Suggestion {
                label: label.trim().to_string(),
                reason: reason.trim().to_string(),
                code: code.trim().to_string(),
            })
        }
        _ => Err(ClientError::InvalidInput(format!(
            "Invalid suggestion '{}': expected label:reason:code",
            spec
        ))),
    }
}

pub fn format_progress(p: &UploadProgress) -> String {
    format!(
        "Uploading chunk {}/{} ({:.1} of {:.1} MB, {}%)",
        p.index + 1,
        p.total_chunks,
        p.bytes_sent as f64 / (1024.0 * 1024.0),
        p.total_size as f64 / (1024.0 * 1024.0),
        p.percent
    )
}

fn describe_fix(issue: &Issue) -> String {
    if let Some(single) = issue.suggestion.as_ref().filter(|s| s.is_usable()) {
        return format!("fix: {}", single.display());
    }
    match issue.suggestion_list() {
        [] => "no automatic fix".to_string(),
        list => format!(
            "{} options: {}",
            list.len(),
            list.iter()
                .map(|s| s.label.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Numbered issue listing, one line per issue.
pub fn render_issues(issues: &[Issue]) -> String {
    let mut out = String::new();
    for (idx, issue) in issues.iter().enumerate() {
        let line = issue
            .line()
            .map(|l| format!(" line {}", l))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:>3}. [{}]{}: {} ({})",
            idx,
            issue.code,
            line,
            issue.short_message(),
            describe_fix(issue)
        );
    }
    out
}

fn preview_block(out: &mut String, title: &str, text: &str) {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}:", title);
    for line in lines.iter().take(OUTPUT_PREVIEW_LINES) {
        let _ = writeln!(out, "   {}", line);
    }
    if lines.len() > OUTPUT_PREVIEW_LINES {
        let _ = writeln!(
            out,
            "   ... {} more line(s)",
            lines.len() - OUTPUT_PREVIEW_LINES
        );
    }
}

/// Human-readable summary of a validation result.
pub fn render_validation(result: &ValidationResult) -> String {
    let mut out = String::new();

    if !result.is_structured() {
        let status = result
            .http_status
            .map(|s| format!(" (HTTP {})", s))
            .unwrap_or_default();
        let _ = writeln!(out, "Backend returned an unstructured response{}:", status);
        let raw = result.raw.as_deref().unwrap_or("");
        if raw.trim().is_empty() {
            let _ = writeln!(out, "   (no body)");
        } else {
            let _ = writeln!(out, "{}", truncate_string(raw, RAW_PREVIEW_CHARS));
        }
        return out;
    }

    if let Some(cmd) = result.command_line() {
        let _ = writeln!(out, "Command: {}", cmd);
    }
    if let Some(code) = result.returncode {
        let _ = writeln!(out, "Return code: {}", code);
    }
    preview_block(&mut out, "Stdout", &result.stdout);
    preview_block(&mut out, "Stderr", &result.stderr);

    if let Some(message) = result.failure_message() {
        let _ = writeln!(out, "Backend error: {}", message);
    }
    if let Some(save_error) = result.save_error.as_deref() {
        let _ = writeln!(out, "History not saved: {}", save_error);
    }

    if result.has_issues() {
        let fixable = result.fixable_issues().count();
        let _ = writeln!(
            out,
            "Issues ({}, {} fixable automatically):",
            result.issues.len(),
            fixable
        );
        out.push_str(&render_issues(&result.issues));
    }

    let verdict = Verdict::of(result);
    let _ = writeln!(out, "Summary: {} - {}", verdict.severity, verdict.summary);
    if let Some(hint) = verdict.timeout_hint {
        let _ = writeln!(out, "Warning: {}", hint);
    }
    if verdict.ready_for_submission {
        let _ = writeln!(out, "File is ready to be submitted to the tax authority.");
    }
    out
}

pub fn render_report(report: &AutoFixReport) -> String {
    let mut out = String::new();
    let trace: Vec<&str> = report.trace.iter().map(LoopState::as_str).collect();
    let _ = writeln!(out, "Auto-fix: {}", report.summary());
    let _ = writeln!(out, "States: {}", trace.join(" -> "));

    if !report.remaining_issues.is_empty() && !report.converged() {
        let _ = writeln!(out, "Remaining issues ({}):", report.remaining_issues.len());
        out.push_str(&render_issues(&report.remaining_issues));
    }

    match &report.submission {
        Some(Submission::Accepted(_)) => {
            let _ = writeln!(out, "Submission: accepted");
        }
        Some(Submission::Rejected(result)) => {
            let reason = result
                .failure_message()
                .unwrap_or_else(|| Verdict::of(result).summary.to_string());
            let _ = writeln!(out, "Submission: rejected ({})", reason);
        }
        Some(Submission::Error(err)) => {
            let _ = writeln!(out, "Submission: failed ({})", err);
        }
        None => {}
    }
    out
}

pub fn render_documents_table(resp: &DocumentsResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== SAFT Documents ===\n");
    if let Some(message) = resp.failure_message() {
        let _ = writeln!(out, "Extraction failed: {}", message);
        return out;
    }
    let _ = writeln!(out, "Total: {} document(s)", resp.total());

    if resp.documents.is_empty() {
        let _ = writeln!(out, "\nNo documents found.");
        return out;
    }

    let _ = writeln!(
        out,
        "\n{:<20} {:<10} {:<4} {:<6} {:<12} {:<30} {:>12} {:>12} {:>12}",
        "Invoice", "Date", "Type", "Status", "Customer", "Name", "Net", "Tax", "Gross"
    );
    let _ = writeln!(out, "{}", "-".repeat(126));

    let cell = |v: &Option<String>| v.clone().unwrap_or_default();
    for doc in &resp.documents {
        let _ = writeln!(
            out,
            "{:<20} {:<10} {:<4} {:<6} {:<12} {:<30} {:>12} {:>12} {:>12}",
            truncate_string(&cell(&doc.invoice_no), 20),
            truncate_string(&cell(&doc.invoice_date), 10),
            truncate_string(&cell(&doc.invoice_type), 4),
            truncate_string(&cell(&doc.document_status), 6),
            truncate_string(&cell(&doc.customer_id), 12),
            truncate_string(&cell(&doc.customer_name), 30),
            cell(&doc.net_total),
            cell(&doc.tax_payable),
            cell(&doc.gross_total),
        );
    }

    let gross: f64 = resp.documents.iter().map(|d| d.gross_total_value()).sum();
    let _ = writeln!(out, "\nGross total: {:.2}", gross);
    out
}

/// Exit status for a document extraction: 0 on success, 2 when the backend refused.
pub fn documents_exit_code(resp: &DocumentsResponse) -> u8 {
    if resp.failure_message().is_some() {
        2
    } else {
        0
    }
}

/// Exit status for a finished validation: 0 clean, 2 when the file has problems.
pub fn validation_exit_code(result: &ValidationResult) -> u8 {
    let verdict = Verdict::of(result);
    if result.ok && !result.has_issues() && verdict.severity != Severity::Error {
        0
    } else {
        2
    }
}

/// Exit status for a loop run: 0 converged, 1 failed, 2 stopped with issues left.
pub fn report_exit_code(report: &AutoFixReport) -> u8 {
    match report.outcome() {
        LoopState::Converged => match &report.submission {
            Some(submission) if !submission.is_accepted() => 2,
            _ => 0,
        },
        LoopState::Failed => 1,
        _ => 2,
    }
}

/// Initialize tracing for the CLI.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
