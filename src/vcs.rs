//! Version-control collaborator: git CLI plus a GitHub-style HTTP API.
//!
//! Branch, commit, and push go through the `git` binary in the working tree;
//! change requests and comments go through the forge's JSON API via `ureq`.
//! Credentials are passed in explicitly at construction; nothing here reads
//! the process environment.

use crate::run::VersionControl;
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Command;

const DEFAULT_API_BASE: &str = "https://api.github.com";

pub struct ForgeConfig {
    /// `owner/name` of the repository on the API host.
    pub remote: Option<String>,
    pub token: String,
    pub api_base: Option<String>,
}

pub struct GitForge {
    root: PathBuf,
    remote: Option<String>,
    token: String,
    api_base: String,
}

impl GitForge {
    pub fn new(root: PathBuf, config: ForgeConfig) -> Self {
        Self {
            root,
            remote: config.remote,
            token: config.token,
            api_base: config
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .with_context(|| format!("run git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn remote(&self) -> Result<&str> {
        self.remote
            .as_deref()
            .ok_or_else(|| anyhow!("no --remote configured for API calls"))
    }

    fn post_api(&self, path: &str, payload: Value) -> Result<Value> {
        let url = format!("{}{path}", self.api_base);
        let mut response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "patchbot")
            .send_json(payload)
            .with_context(|| format!("POST {url}"))?;
        response
            .body_mut()
            .read_json()
            .with_context(|| format!("parse response from {url}"))
    }
}

impl VersionControl for GitForge {
    fn create_branch(&self, name: &str) -> Result<()> {
        self.git(&["checkout", "-b", name])?;
        Ok(())
    }

    fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-m", message])?;
        Ok(())
    }

    fn push(&self, branch: &str) -> Result<()> {
        self.git(&["push", "origin", branch])?;
        tracing::info!(branch, "pushed branch");
        Ok(())
    }

    fn open_change_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let remote = self.remote()?;
        let response = self.post_api(
            &format!("/repos/{remote}/pulls"),
            json!({"title": title, "head": head, "base": base, "body": body}),
        )?;
        let url = response
            .get("html_url")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("pull request response missing html_url"))?;
        tracing::info!(url, "opened change request");
        Ok(url.to_string())
    }

    fn post_comment(&self, conversation: &str, body: &str) -> Result<()> {
        let remote = self.remote()?;
        self.post_api(
            &format!("/repos/{remote}/issues/{conversation}/comments"),
            json!({ "body": body }),
        )?;
        Ok(())
    }
}
