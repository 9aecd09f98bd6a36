//! Schema types for edit plans, audit records, and run outcomes.

use serde::{Deserialize, Serialize};

/// One requested file mutation. Immutable once admitted by the validator;
/// `rationale` is carried through for reporting only and never drives a
/// control decision.
#[derive(Debug, Clone, Serialize)]
pub struct EditOperation {
    pub path: String,
    pub kind: OperationKind,
    /// Exact substring to replace. Present only for `Replace`.
    pub find: Option<String>,
    pub content: String,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Append,
    Replace,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Append => "append",
            OperationKind::Replace => "replace",
        }
    }
}

/// Ordered sequence of admitted operations, already cap-truncated. Produced
/// only by the validator; the applier trusts its contents.
#[derive(Debug, Serialize)]
pub struct Plan {
    pub operations: Vec<EditOperation>,
    /// Operations discarded during admission or cap truncation.
    pub dropped: usize,
}

/// One entry in the audit trail. The set of records with `applied = true` is
/// exactly the set of filesystem mutations performed this run.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyRecord {
    pub path: String,
    pub kind: OperationKind,
    pub rationale: Option<String>,
    pub applied: bool,
    /// Why the operation was skipped or failed, when it was.
    pub note: Option<String>,
}

/// Terminal classification of one invocation. Computed once, consumed by the
/// coordinator to choose the reporting path, then discarded; the bot keeps no
/// state across invocations.
#[derive(Debug)]
pub enum RunOutcome {
    /// The model's output did not parse into the plan schema.
    MalformedPlan { raw: String, details: Vec<String> },
    /// The plan was valid but contained no admissible operations.
    EmptyPlan,
    /// Every operation reached the applier and was skipped.
    NoApplicableEdits(Vec<ApplyRecord>),
    /// At least one operation mutated the working tree.
    Applied(Vec<ApplyRecord>),
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::MalformedPlan { .. } => "malformed-plan",
            RunOutcome::EmptyPlan => "empty-plan",
            RunOutcome::NoApplicableEdits(_) => "no-applicable-edits",
            RunOutcome::Applied(_) => "applied",
        }
    }
}
