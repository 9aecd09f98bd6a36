//! File operation applier.
//!
//! Executes one admitted operation at a time against the working tree and
//! records the result in the audit trail. Application is best effort: a
//! skipped or failed operation records `applied = false` and the run moves on
//! to the next operation. Each write is flushed immediately, so an operation
//! sees the effects of the operations before it in the same plan.
//!
//! Per-kind semantics:
//! - `create` writes the file, creating parent directories as needed and
//!   overwriting any existing file at the path.
//! - `append` inserts a separating newline and appends; it never creates a
//!   missing file.
//! - `replace` substitutes the first occurrence of `find` only; missing file
//!   or missing substring skips the operation and leaves the file untouched.

use crate::schema::{ApplyRecord, EditOperation, OperationKind};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Apply one validated operation beneath `root`, returning its audit record.
/// Never performs version-control or network activity.
pub fn apply_operation(root: &Path, operation: &EditOperation) -> ApplyRecord {
    let (applied, note) = match operation.kind {
        OperationKind::Create => apply_create(root, operation),
        OperationKind::Append => apply_append(root, operation),
        OperationKind::Replace => apply_replace(root, operation),
    };
    if !applied {
        tracing::debug!(
            path = %operation.path,
            kind = operation.kind.as_str(),
            note = note.as_deref().unwrap_or(""),
            "operation skipped"
        );
    }
    ApplyRecord {
        path: operation.path.clone(),
        kind: operation.kind,
        rationale: operation.rationale.clone(),
        applied,
        note,
    }
}

fn apply_create(root: &Path, operation: &EditOperation) -> (bool, Option<String>) {
    let target = root.join(&operation.path);
    if let Some(parent) = target.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            return (false, Some(format!("create parent directories: {err}")));
        }
    }
    // Overwrites without an existence check; see DESIGN.md.
    match fs::write(&target, &operation.content) {
        Ok(()) => (true, None),
        Err(err) => (false, Some(format!("write file: {err}"))),
    }
}

fn apply_append(root: &Path, operation: &EditOperation) -> (bool, Option<String>) {
    let target = root.join(&operation.path);
    if !target.is_file() {
        return (false, Some("target file does not exist".to_string()));
    }
    let result = fs::OpenOptions::new()
        .append(true)
        .open(&target)
        .and_then(|mut file| {
            file.write_all(b"\n")?;
            file.write_all(operation.content.as_bytes())
        });
    match result {
        Ok(()) => (true, None),
        Err(err) => (false, Some(format!("append to file: {err}"))),
    }
}

fn apply_replace(root: &Path, operation: &EditOperation) -> (bool, Option<String>) {
    let target = root.join(&operation.path);
    let Some(find) = operation.find.as_deref() else {
        // The validator only admits replace operations with a find string.
        return (false, Some("replace operation without find".to_string()));
    };
    if !target.is_file() {
        return (false, Some("target file does not exist".to_string()));
    }
    let existing = match fs::read_to_string(&target) {
        Ok(existing) => existing,
        Err(err) => return (false, Some(format!("read file: {err}"))),
    };
    if !existing.contains(find) {
        return (false, Some("find string not present in target".to_string()));
    }
    let updated = existing.replacen(find, &operation.content, 1);
    match fs::write(&target, updated) {
        Ok(()) => (true, None),
        Err(err) => (false, Some(format!("write file: {err}"))),
    }
}
