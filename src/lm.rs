//! LM prompt assembly and external command invocation.
//!
//! The inference collaborator is any external command that accepts a prompt
//! on stdin (or via a `{prompt}` placeholder) and prints its response on
//! stdout. The command is configured through `PATCHBOT_LM_COMMAND`, falling
//! back to a Claude CLI invocation. Responses are treated as adversarial
//! text: this module only extracts a candidate JSON document; the validator
//! decides whether it is an acceptable plan.

use crate::run::InferenceClient;
use crate::util::truncate_string;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Total bytes of repository context included in the prompt.
const CONTEXT_BYTE_BUDGET: usize = 16 * 1024;
/// Bytes sampled from any single file.
const CONTEXT_FILE_BYTES: usize = 2 * 1024;
/// Directories never sampled for context.
const CONTEXT_SKIP_DIRS: &[&str] = &[".git", "target", "node_modules"];

const PROMPT_HEADER: &str = "\
You are an automated code-change bot. Given a task and a sample of the \
repository, respond with a single JSON object and nothing else:
{\"changes\": [{\"path\": \"relative/file\", \"operation\": \"create|append|replace\", \
\"find\": \"exact substring (replace only)\", \"content\": \"new text\", \
\"rationale\": \"why\"}]}
Respond with {\"changes\": []} if no change is needed.";

pub struct LmCommand {
    pub argv: Vec<String>,
}

/// Load the LM command configuration, falling back to Claude defaults.
pub fn load_lm_command() -> Result<LmCommand> {
    if let Ok(raw) = env::var("PATCHBOT_LM_COMMAND") {
        let argv = shell_words::split(&raw).context("parse PATCHBOT_LM_COMMAND")?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        return Ok(LmCommand { argv });
    }
    Ok(default_lm_command())
}

fn default_lm_command() -> LmCommand {
    LmCommand {
        argv: vec![
            "claude".to_string(),
            "--print".to_string(),
            "--output-format".to_string(),
            "json".to_string(),
            "--no-session-persistence".to_string(),
            "--system-prompt".to_string(),
            "Return a single JSON object only. No prose or code fences.".to_string(),
        ],
    }
}

/// Production inference collaborator: one external command per plan request.
pub struct CommandInference {
    command: LmCommand,
}

impl CommandInference {
    pub fn new(command: LmCommand) -> Self {
        Self { command }
    }
}

impl InferenceClient for CommandInference {
    fn plan(&self, task: &str, context: &str) -> Result<String> {
        let prompt = build_prompt(task, context);
        run_lm(&prompt, &self.command)
    }
}

fn build_prompt(task: &str, context: &str) -> String {
    format!("{PROMPT_HEADER}\n\n# Task\n{task}\n\n# Repository sample\n{context}\n")
}

/// Invoke the configured LM command and capture its stdout as text.
fn run_lm(prompt: &str, command: &LmCommand) -> Result<String> {
    if command.argv.is_empty() {
        return Err(anyhow!("LM command is empty"));
    }
    let mut argv = command.argv.clone();
    let mut has_placeholder = false;
    for arg in &mut argv {
        if arg == "{prompt}" {
            *arg = prompt.to_string();
            has_placeholder = true;
        }
    }
    let program = argv.remove(0);
    let mut command = Command::new(program);
    command.args(argv);
    if has_placeholder {
        command.stdin(Stdio::null());
    } else {
        command.stdin(Stdio::piped());
    }
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let output = if has_placeholder {
        command.output().context("run LM command")?
    } else {
        let mut child = command.spawn().context("spawn LM command")?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .context("write LM prompt")?;
        }
        child.wait_with_output().context("wait LM output")?
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("LM command failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extract a candidate plan document from an LM response, unwrapping code
/// fences and Claude-style envelopes. The errors collect everything tried so
/// a malformed-plan diagnostic can explain itself.
pub fn extract_plan_json(response: &str) -> Result<Value, Vec<String>> {
    let mut details = Vec::new();
    let cleaned = strip_code_fences(response);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return unwrap_envelope(value, &mut details);
    }
    if let Some(value) = extract_json_from_text(&cleaned) {
        return unwrap_envelope(value, &mut details);
    }
    details.push("response is not JSON and contains no JSON object".to_string());
    Err(details)
}

fn unwrap_envelope(value: Value, details: &mut Vec<String>) -> Result<Value, Vec<String>> {
    if value.get("changes").is_some() {
        return Ok(value);
    }
    if let Some(structured) = value.get("structured_output") {
        return Ok(structured.clone());
    }
    if let Some(result) = value.get("result").and_then(Value::as_str) {
        let cleaned = strip_code_fences(result);
        match serde_json::from_str(&cleaned) {
            Ok(parsed) => return Ok(parsed),
            Err(err) => {
                if let Some(parsed) = extract_json_from_text(&cleaned) {
                    return Ok(parsed);
                }
                details.push(format!("result payload failed to parse: {err}"));
                return Err(details.clone());
            }
        }
    }
    // No envelope; let the validator report what is missing.
    Ok(value)
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if let Some(first) = lines.first() {
        if first.trim_start().starts_with("```") {
            lines.remove(0);
        }
    }
    if let Some(last) = lines.last() {
        if last.trim_start().starts_with("```") {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

fn extract_json_from_text(raw: &str) -> Option<Value> {
    for (idx, ch) in raw.char_indices() {
        if ch != '{' {
            continue;
        }
        let slice = &raw[idx..];
        let mut deserializer = serde_json::Deserializer::from_str(slice);
        if let Ok(value) = Value::deserialize(&mut deserializer) {
            return Some(value);
        }
    }
    None
}

/// Sample a bounded slice of the repository for the prompt: file listing plus
/// the head of each file, in path order, until the byte budget is spent.
pub fn sample_context(root: &Path) -> Result<String> {
    let files = collect_files_recursive(root)?;
    let mut context = String::new();
    for file in &files {
        if context.len() >= CONTEXT_BYTE_BUDGET {
            break;
        }
        let rel = file.strip_prefix(root).unwrap_or(file.as_path());
        let bytes = match fs::read(file) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        let text = String::from_utf8_lossy(&bytes);
        let remaining = CONTEXT_BYTE_BUDGET - context.len();
        let slice = truncate_string(&text, CONTEXT_FILE_BYTES.min(remaining));
        context.push_str(&format!("## {}\n{}\n\n", rel.display(), slice));
    }
    Ok(context)
}

fn collect_files_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        if path.is_dir() {
            if name
                .to_str()
                .is_some_and(|name| CONTEXT_SKIP_DIRS.contains(&name))
            {
                continue;
            }
            files.extend(collect_files_recursive(&path)?);
        } else if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
