//! Report rendering: commit message, change-request body, status comment.

use crate::schema::{ApplyRecord, RunOutcome};
use crate::util::truncate_string;

const COMMIT_MESSAGE_BYTES: usize = 72;
const TITLE_BYTES: usize = 80;

/// Commit message derived from the task text, truncated to a bounded length.
pub fn commit_message(task: &str) -> String {
    let task = task.trim();
    if task.is_empty() {
        return "patchbot: automated change".to_string();
    }
    truncate_string(&format!("patchbot: {task}"), COMMIT_MESSAGE_BYTES)
}

pub fn change_request_title(task: &str) -> String {
    let task = task.trim();
    if task.is_empty() {
        return "patchbot change".to_string();
    }
    truncate_string(task, TITLE_BYTES)
}

/// Change-request body: every applied record with its path, kind, and
/// rationale, plus the raw plan verbatim for audit.
pub fn change_request_body(task: &str, records: &[ApplyRecord], raw_plan: &str) -> String {
    let mut body = String::new();
    body.push_str("Automated change for the task:\n\n");
    for line in task.lines() {
        body.push_str("> ");
        body.push_str(line);
        body.push('\n');
    }
    body.push_str("\n## Applied edits\n\n");
    for record in records.iter().filter(|record| record.applied) {
        body.push_str(&format!("- `{}` ({})", record.path, record.kind.as_str()));
        if let Some(rationale) = &record.rationale {
            body.push_str(&format!(": {rationale}"));
        }
        body.push('\n');
    }
    body.push_str("\n## Raw plan\n\n```json\n");
    body.push_str(raw_plan);
    body.push_str("\n```\n");
    body
}

/// Human-readable summary of one run, posted back to the originating
/// conversation (or printed when no conversation is configured). For a
/// malformed plan the raw model output is included verbatim so the failure
/// can be diagnosed from the comment alone.
pub fn status_comment(outcome: &RunOutcome, reference: Option<&str>) -> String {
    match outcome {
        RunOutcome::MalformedPlan { raw, details } => format!(
            "patchbot could not parse the model's plan.\n\n{}\n\nRaw output:\n\n```\n{raw}\n```",
            details.join("\n")
        ),
        RunOutcome::EmptyPlan => "patchbot: the model proposed no changes.".to_string(),
        RunOutcome::NoApplicableEdits(records) => format!(
            "patchbot: none of the {} proposed edit(s) were applicable; nothing was changed.",
            records.len()
        ),
        RunOutcome::Applied(records) => {
            let applied = records.iter().filter(|record| record.applied).count();
            match reference {
                Some(reference) => {
                    format!("patchbot applied {applied} edit(s) and opened {reference}")
                }
                None => format!("patchbot applied {applied} edit(s)"),
            }
        }
    }
}
