//! Plan parsing and the per-operation admission policy.
//!
//! The model's output is untrusted input; everything here is an allow-list.
//! Admission is pure: it produces a verdict and never touches the filesystem,
//! so the applier only ever sees pre-validated operations.
//!
//! ## Policy summary
//! - **Container**: the output must be an object with a `changes` array.
//! - **Per operation** (independent checks; failing one drops that operation
//!   silently, never the whole plan):
//!   - `path` present, non-empty, at most 200 bytes, and not under the
//!     version-control metadata directory.
//!   - recognized operation kind only (`create`, `append`, `replace`).
//!   - `replace` requires a non-empty `find` (the substring's presence in the
//!     target file is checked at apply time).
//! - **Global caps**: at most 5 distinct target files and 500 total content
//!   lines across the admitted plan. Operations are considered in input
//!   order; the first one that would breach a cap is dropped along with every
//!   operation after it, so truncation always removes a suffix.

use crate::schema::{EditOperation, OperationKind, Plan};
use crate::util::count_lines;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

pub const MAX_PATH_BYTES: usize = 200;
pub const MAX_TARGET_FILES: usize = 5;
pub const MAX_CONTENT_LINES: usize = 500;

/// Dot-prefixed VCS metadata directory; paths under it are never writable.
const VCS_META_PREFIX: &str = ".git";

#[derive(Deserialize)]
struct RawPlan {
    changes: Vec<RawChange>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawChange {
    path: Option<String>,
    operation: Option<String>,
    find: Option<String>,
    content: Option<String>,
    rationale: Option<String>,
}

/// Admit a parsed plan document, returning the cap-truncated plan or the
/// reasons it is malformed. A zero-length `changes` array is a valid "no
/// changes needed" answer and yields an empty plan, not an error.
pub fn admit_plan(value: &Value) -> Result<Plan, Vec<String>> {
    let raw_plan: RawPlan = match serde_json::from_value(value.clone()) {
        Ok(plan) => plan,
        Err(err) => return Err(vec![format!("plan schema mismatch: {err}")]),
    };

    let mut admitted = Vec::new();
    let mut dropped = 0usize;
    for change in &raw_plan.changes {
        match admit_operation(change) {
            Some(operation) => admitted.push(operation),
            None => dropped += 1,
        }
    }

    let (operations, truncated) = truncate_to_caps(admitted);
    dropped += truncated;
    if dropped > 0 {
        tracing::debug!(dropped, "operations dropped during admission");
    }
    Ok(Plan { operations, dropped })
}

fn admit_operation(change: &RawChange) -> Option<EditOperation> {
    let path = change.path.as_deref()?;
    if path.is_empty() || path.len() > MAX_PATH_BYTES || path.starts_with(VCS_META_PREFIX) {
        return None;
    }
    let kind = match change.operation.as_deref()? {
        "create" => OperationKind::Create,
        "append" => OperationKind::Append,
        "replace" => OperationKind::Replace,
        _ => return None,
    };
    let find = match kind {
        OperationKind::Replace => Some(change.find.clone().filter(|find| !find.is_empty())?),
        OperationKind::Create | OperationKind::Append => None,
    };
    Some(EditOperation {
        path: path.to_string(),
        kind,
        find,
        content: change.content.clone().unwrap_or_default(),
        rationale: change.rationale.clone(),
    })
}

/// Keep the longest prefix of `operations` that stays within both global
/// caps. Returns the kept prefix and the number of operations dropped.
fn truncate_to_caps(operations: Vec<EditOperation>) -> (Vec<EditOperation>, usize) {
    let total = operations.len();
    let mut files: BTreeSet<String> = BTreeSet::new();
    let mut lines = 0usize;
    let mut kept = Vec::new();
    for operation in operations {
        let new_file = !files.contains(&operation.path);
        if new_file && files.len() + 1 > MAX_TARGET_FILES {
            break;
        }
        let operation_lines = count_lines(&operation.content);
        if lines + operation_lines > MAX_CONTENT_LINES {
            break;
        }
        if new_file {
            files.insert(operation.path.clone());
        }
        lines += operation_lines;
        kept.push(operation);
    }
    let dropped = total - kept.len();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(path: &str, operation: &str, content: &str) -> Value {
        json!({"path": path, "operation": operation, "content": content})
    }

    #[test]
    fn missing_changes_field_is_malformed() {
        let err = admit_plan(&json!({"edits": []})).unwrap_err();
        assert!(err[0].contains("plan schema mismatch"));
    }

    #[test]
    fn changes_with_wrong_type_is_malformed() {
        assert!(admit_plan(&json!({"changes": "nope"})).is_err());
        assert!(admit_plan(&json!("just a string")).is_err());
    }

    #[test]
    fn empty_changes_yields_empty_plan() {
        let plan = admit_plan(&json!({"changes": []})).unwrap();
        assert!(plan.operations.is_empty());
        assert_eq!(plan.dropped, 0);
    }

    #[test]
    fn admits_well_formed_operations_in_order() {
        let plan = admit_plan(&json!({"changes": [
            change("a.txt", "create", "one"),
            {"path": "b.txt", "operation": "replace", "find": "old", "content": "new"},
        ]}))
        .unwrap();
        assert_eq!(plan.operations.len(), 2);
        assert_eq!(plan.operations[0].path, "a.txt");
        assert_eq!(plan.operations[0].kind, OperationKind::Create);
        assert_eq!(plan.operations[1].find.as_deref(), Some("old"));
    }

    #[test]
    fn drops_vcs_metadata_paths() {
        let plan = admit_plan(&json!({"changes": [
            change(".git/config", "create", "x"),
            change("src/ok.rs", "create", "x"),
        ]}))
        .unwrap();
        assert_eq!(plan.operations.len(), 1);
        assert_eq!(plan.operations[0].path, "src/ok.rs");
        assert_eq!(plan.dropped, 1);
    }

    #[test]
    fn drops_empty_and_overlong_paths() {
        let long_path = "a/".repeat(120);
        let plan = admit_plan(&json!({"changes": [
            change("", "create", "x"),
            change(&long_path, "create", "x"),
            json!({"operation": "create", "content": "x"}),
        ]}))
        .unwrap();
        assert!(plan.operations.is_empty());
        assert_eq!(plan.dropped, 3);
    }

    #[test]
    fn drops_unrecognized_operation_kinds() {
        let plan = admit_plan(&json!({"changes": [
            change("a.txt", "delete", "x"),
            change("a.txt", "append", "x"),
        ]}))
        .unwrap();
        assert_eq!(plan.operations.len(), 1);
        assert_eq!(plan.operations[0].kind, OperationKind::Append);
    }

    #[test]
    fn replace_without_find_is_dropped() {
        let plan = admit_plan(&json!({"changes": [
            {"path": "a.txt", "operation": "replace", "content": "new"},
            {"path": "a.txt", "operation": "replace", "find": "", "content": "new"},
        ]}))
        .unwrap();
        assert!(plan.operations.is_empty());
        assert_eq!(plan.dropped, 2);
    }

    #[test]
    fn create_with_missing_content_becomes_empty_file() {
        let plan = admit_plan(&json!({"changes": [
            {"path": "empty.txt", "operation": "create"},
        ]}))
        .unwrap();
        assert_eq!(plan.operations[0].content, "");
    }

    #[test]
    fn caps_distinct_target_files_at_five() {
        let changes: Vec<Value> = (0..7)
            .map(|idx| change(&format!("file{idx}.txt"), "create", "x"))
            .collect();
        let plan = admit_plan(&json!({ "changes": changes })).unwrap();
        assert_eq!(plan.operations.len(), 5);
        assert_eq!(plan.dropped, 2);
    }

    #[test]
    fn repeated_paths_count_as_one_target_file() {
        let changes: Vec<Value> = (0..7).map(|_| change("same.txt", "create", "x")).collect();
        let plan = admit_plan(&json!({ "changes": changes })).unwrap();
        assert_eq!(plan.operations.len(), 7);
    }

    #[test]
    fn caps_total_content_lines_at_five_hundred() {
        let big = "line\n".repeat(499);
        let plan = admit_plan(&json!({"changes": [
            change("a.txt", "create", &big),
            change("b.txt", "create", "one\ntwo"),
        ]}))
        .unwrap();
        assert_eq!(plan.operations.len(), 1);
        assert_eq!(plan.dropped, 1);
    }

    #[test]
    fn cap_truncation_drops_a_suffix_not_a_subset() {
        let big = "line\n".repeat(500);
        // The second operation breaches the line cap; the third would fit on
        // its own but must be dropped with it.
        let plan = admit_plan(&json!({"changes": [
            change("a.txt", "create", "x"),
            change("b.txt", "create", &big),
            change("c.txt", "create", "y"),
        ]}))
        .unwrap();
        assert_eq!(plan.operations.len(), 1);
        assert_eq!(plan.operations[0].path, "a.txt");
        assert_eq!(plan.dropped, 2);
    }

    #[test]
    fn single_oversized_operation_yields_empty_plan() {
        let big = "line\n".repeat(501);
        let plan = admit_plan(&json!({"changes": [change("a.txt", "create", &big)]})).unwrap();
        assert!(plan.operations.is_empty());
        assert_eq!(plan.dropped, 1);
    }
}
