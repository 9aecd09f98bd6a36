//! Run coordinator: one end-to-end invocation, classified into a terminal
//! outcome.
//!
//! The pipeline is strictly sequential: request plan, validate, apply each
//! operation in order, report. Application is best effort and non-atomic; a
//! failure partway through leaves earlier mutations in place and the audit
//! trail says exactly which operations ran. The four change-materializing
//! calls (branch, commit, push, change request) happen only when at least one
//! operation actually mutated the tree.

use crate::apply::apply_operation;
use crate::lm;
use crate::render;
use crate::schema::{ApplyRecord, RunOutcome};
use crate::validate;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the raw text blob for one task. Treated as adversarial input; the
/// validator is the only thing standing between it and the working tree.
pub trait InferenceClient {
    fn plan(&self, task: &str, context: &str) -> Result<String>;
}

pub trait VersionControl {
    fn create_branch(&self, name: &str) -> Result<()>;
    fn commit_all(&self, message: &str) -> Result<()>;
    fn push(&self, branch: &str) -> Result<()>;
    fn open_change_request(&self, head: &str, base: &str, title: &str, body: &str)
        -> Result<String>;
    fn post_comment(&self, conversation: &str, body: &str) -> Result<()>;
}

/// Explicit per-run identity and addressing; nothing is read from ambient
/// process state.
pub struct RunConfig {
    pub task: String,
    pub actor: String,
    pub base_branch: String,
    /// Issue or pull-request number to report back to. When absent the
    /// status summary only goes to stdout.
    pub conversation: Option<String>,
}

pub struct RunCoordinator<'a> {
    config: RunConfig,
    root: PathBuf,
    inference: &'a dyn InferenceClient,
    vcs: &'a dyn VersionControl,
}

impl<'a> RunCoordinator<'a> {
    pub fn new(
        config: RunConfig,
        root: PathBuf,
        inference: &'a dyn InferenceClient,
        vcs: &'a dyn VersionControl,
    ) -> Self {
        Self {
            config,
            root,
            inference,
            vcs,
        }
    }

    /// Execute one invocation end to end and report the terminal outcome.
    pub fn execute(&self) -> Result<RunOutcome> {
        let context = lm::sample_context(&self.root).context("sample repository context")?;
        let raw = self
            .inference
            .plan(&self.config.task, &context)
            .context("request plan")?;
        let outcome = self.classify_and_apply(&raw);
        tracing::info!(outcome = outcome.label(), "run classified");
        let reference = match &outcome {
            RunOutcome::Applied(records) => Some(self.publish(records, &raw)?),
            _ => None,
        };
        self.report(&outcome, reference.as_deref())?;
        Ok(outcome)
    }

    fn classify_and_apply(&self, raw: &str) -> RunOutcome {
        let value = match lm::extract_plan_json(raw) {
            Ok(value) => value,
            Err(details) => {
                return RunOutcome::MalformedPlan {
                    raw: raw.to_string(),
                    details,
                }
            }
        };
        let plan = match validate::admit_plan(&value) {
            Ok(plan) => plan,
            Err(details) => {
                return RunOutcome::MalformedPlan {
                    raw: raw.to_string(),
                    details,
                }
            }
        };
        if plan.operations.is_empty() {
            return RunOutcome::EmptyPlan;
        }
        let records: Vec<ApplyRecord> = plan
            .operations
            .iter()
            .map(|operation| apply_operation(&self.root, operation))
            .collect();
        if records.iter().any(|record| record.applied) {
            RunOutcome::Applied(records)
        } else {
            RunOutcome::NoApplicableEdits(records)
        }
    }

    /// Materialize an applied run: branch, commit, push, change request.
    /// Sequential and non-retryable; already-applied mutations are never
    /// rolled back on a partial failure.
    fn publish(&self, records: &[ApplyRecord], raw: &str) -> Result<String> {
        let branch = self.branch_name();
        self.vcs
            .create_branch(&branch)
            .context("create work branch")?;
        self.vcs
            .commit_all(&render::commit_message(&self.config.task))
            .context("commit applied edits")?;
        self.vcs.push(&branch).context("push work branch")?;
        let title = render::change_request_title(&self.config.task);
        let body = render::change_request_body(&self.config.task, records, raw);
        self.vcs
            .open_change_request(&branch, &self.config.base_branch, &title, &body)
            .context("open change request")
    }

    fn report(&self, outcome: &RunOutcome, reference: Option<&str>) -> Result<()> {
        let summary = render::status_comment(outcome, reference);
        println!("{summary}");
        if let Some(conversation) = &self.config.conversation {
            // Comments are posted for the diagnosable outcomes only; the
            // quiet no-op outcomes stay out of the conversation.
            match outcome {
                RunOutcome::MalformedPlan { .. } | RunOutcome::Applied(_) => {
                    self.vcs
                        .post_comment(conversation, &summary)
                        .context("post status comment")?;
                }
                RunOutcome::EmptyPlan | RunOutcome::NoApplicableEdits(_) => {}
            }
        }
        Ok(())
    }

    fn branch_name(&self) -> String {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        let actor: String = self
            .config
            .actor
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
            .collect();
        format!("patchbot/{actor}-{nonce}")
    }
}

/// Dry run for the `plan` subcommand: request and validate only, print the
/// admitted plan, touch nothing.
pub fn preview_plan(root: &Path, task: &str, inference: &dyn InferenceClient) -> Result<()> {
    let context = lm::sample_context(root).context("sample repository context")?;
    let raw = inference.plan(task, &context).context("request plan")?;
    match lm::extract_plan_json(&raw).and_then(|value| validate::admit_plan(&value)) {
        Ok(plan) => {
            let rendered = serde_json::to_string_pretty(&plan).context("render plan")?;
            println!("{rendered}");
        }
        Err(details) => {
            println!("plan is malformed:");
            for detail in details {
                println!("  {detail}");
            }
            println!("raw output:\n{raw}");
        }
    }
    Ok(())
}
