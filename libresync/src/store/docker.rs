use super::{DigestRecord, HistoryEntry, ImageStore};
use crate::error::{Result, ResyncError};
use crate::reference::ImageIdentity;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Output;
use tracing::{debug, trace};

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectOutput {
    #[serde(default)]
    repo_digests: Vec<String>,
    #[serde(default, rename = "RootFS")]
    root_fs: RootFs,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RootFs {
    #[serde(default)]
    layers: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HistoryLine {
    #[serde(default)]
    created_by: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    size: String,
}

/// [`ImageStore`] backed by the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("docker"),
        }
    }
}

impl DockerCli {
    /// Creates a store that runs `docker` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses another `docker` compatible executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, operation: &str, reference: &str, args: &[&str]) -> Result<Output> {
        trace!(program = %self.program.display(), ?args, "running docker");
        tokio::process::Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                ResyncError::local_store_with_source(
                    operation,
                    reference,
                    format!("could not run {}", self.program.display()),
                    e,
                )
            })
    }

    /// Runs a command, failing on a non-zero exit status.
    async fn run_checked(&self, operation: &str, reference: &str, args: &[&str]) -> Result<Output> {
        let output = self.run(operation, reference, args).await?;
        if !output.status.success() {
            return Err(ResyncError::local_store(
                operation,
                reference,
                failure_message(&output),
            ));
        }
        Ok(output)
    }

    fn parse_inspect(reference: &str, stdout: &str) -> Result<DigestRecord> {
        let inspect: InspectOutput = serde_json::from_str(stdout.trim()).map_err(|e| {
            ResyncError::local_store_with_source("inspect", reference, "unreadable inspect output", e)
        })?;
        Ok(DigestRecord {
            repo_digests: inspect.repo_digests,
            root_layers: inspect.root_fs.layers,
            size_bytes: inspect.size,
        })
    }

    fn parse_history(reference: &str, stdout: &str) -> Result<Vec<HistoryEntry>> {
        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let entry: HistoryLine = serde_json::from_str(line).map_err(|e| {
                    ResyncError::local_store_with_source(
                        "history",
                        reference,
                        "unreadable history output",
                        e,
                    )
                })?;
                let size = match entry.size.trim() {
                    "" => "0B".to_string(),
                    size => size.to_string(),
                };
                Ok(HistoryEntry::new(entry.created_by, entry.created_at, size))
            })
            .collect()
    }
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("docker exited with {}", output.status)
    } else {
        stderr.to_string()
    }
}

fn is_missing_image(stderr: &str) -> bool {
    stderr.contains("No such image") || stderr.contains("No such object")
}

#[async_trait]
impl ImageStore for DockerCli {
    async fn inspect(&self, image: &ImageIdentity) -> Result<Option<DigestRecord>> {
        let reference = image.to_string();
        let output = self
            .run("inspect", &reference, &["image", "inspect", "--format", "{{json .}}", &reference])
            .await?;

        if !output.status.success() {
            if is_missing_image(&String::from_utf8_lossy(&output.stderr)) {
                debug!(%reference, "image not present locally");
                return Ok(None);
            }
            return Err(ResyncError::local_store("inspect", reference, failure_message(&output)));
        }

        Self::parse_inspect(&reference, &String::from_utf8_lossy(&output.stdout)).map(Some)
    }

    async fn pull(&self, image: &ImageIdentity) -> Result<()> {
        let reference = image.to_string();
        self.run_checked("pull", &reference, &["pull", "--quiet", &reference])
            .await
            .map(|_| ())
    }

    async fn tag(&self, image: &ImageIdentity, new_tag: &str) -> Result<()> {
        let reference = image.to_string();
        let target = image.with_tag(new_tag).to_string();
        self.run_checked("tag", &reference, &["tag", &reference, &target])
            .await
            .map(|_| ())
    }

    async fn remove_tag(&self, image: &ImageIdentity) -> Result<()> {
        let reference = image.to_string();
        self.run_checked("remove", &reference, &["rmi", &reference])
            .await
            .map(|_| ())
    }

    async fn history(&self, image: &ImageIdentity) -> Result<Vec<HistoryEntry>> {
        let reference = image.to_string();
        let output = self
            .run_checked(
                "load history for",
                &reference,
                &["history", "--no-trunc", "--human=false", "--format", "{{json .}}", &reference],
            )
            .await?;
        Self::parse_history(&reference, &String::from_utf8_lossy(&output.stdout))
    }
}
