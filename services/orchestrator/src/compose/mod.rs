//! Docker Compose platform implementation.
//!
//! Drives the `docker` CLI as a child process for every platform operation.
//! Output is captured: on success it is forwarded to the log at debug level,
//! on failure the tail of stderr is carried in the error.

pub mod command;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::platform::{Platform, PlatformError, ResetReport, ResetScope, ServiceHandle};

use command::ComposeTarget;

/// Lines of stderr kept in a [`PlatformError::CommandFailed`].
const STDERR_TAIL_LINES: usize = 20;

/// Configuration for the Compose platform.
#[derive(Debug, Clone)]
pub struct ComposePlatformConfig {
    /// Path to the docker binary.
    pub docker_binary: PathBuf,
    /// Compose project name (deployment identity).
    pub project: String,
    /// Compose file, if not the default lookup.
    pub compose_file: Option<PathBuf>,
}

/// Platform backed by `docker compose`.
pub struct ComposePlatform {
    docker_binary: PathBuf,
    target: ComposeTarget,
}

impl ComposePlatform {
    /// Create a new Compose platform.
    pub fn new(config: ComposePlatformConfig) -> Self {
        Self {
            docker_binary: config.docker_binary,
            target: ComposeTarget {
                project: config.project,
                compose_file: config.compose_file,
            },
        }
    }

    pub fn project(&self) -> &str {
        &self.target.project
    }

    /// Run the docker binary and fail on a non-zero exit.
    async fn run(&self, args: Vec<String>) -> Result<Output, PlatformError> {
        let binary = self.docker_binary.display().to_string();
        let command = command::render(&binary, &args);
        info!(command = %command, "Running platform command");

        let output = Command::new(&self.docker_binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PlatformError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            debug!(command = %command, "{}", line);
        }

        if !output.status.success() {
            warn!(command = %command, status = %output.status, "Platform command failed");
            return Err(PlatformError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            });
        }

        Ok(output)
    }

    fn handle(&self, service: &str, replicas: u32) -> ServiceHandle {
        ServiceHandle {
            project: self.target.project.clone(),
            service: service.to_string(),
            replicas,
        }
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[async_trait]
impl Platform for ComposePlatform {
    async fn reset(&self, scope: &ResetScope) -> Result<ResetReport, PlatformError> {
        let mut report = ResetReport::default();

        let project = match scope {
            ResetScope::Project(project) => {
                let output = self.run(self.target.down()).await?;
                // compose prints progress on stderr
                let progress = String::from_utf8_lossy(&output.stderr);
                report.containers_removed += command::count_removed(&progress, "Container");
                report.volumes_removed += command::count_removed(&progress, "Volume");
                Some(project.as_str())
            }
            ResetScope::Global => None,
        };

        let output = self.run(command::container_prune(project)).await?;
        report.containers_removed += command::count_pruned(&String::from_utf8_lossy(&output.stdout));

        let output = self.run(command::volume_prune(project)).await?;
        report.volumes_removed += command::count_pruned(&String::from_utf8_lossy(&output.stdout));

        Ok(report)
    }

    async fn start_service(&self, service: &str) -> Result<ServiceHandle, PlatformError> {
        self.run(self.target.up(service)).await?;
        Ok(self.handle(service, 1))
    }

    async fn build_service(
        &self,
        service: &str,
        build_args: &BTreeMap<String, String>,
    ) -> Result<(), PlatformError> {
        self.run(self.target.build(service, build_args)).await?;
        Ok(())
    }

    async fn scale_service(
        &self,
        service: &str,
        replicas: u32,
    ) -> Result<ServiceHandle, PlatformError> {
        self.run(self.target.scale(service, replicas)).await?;
        Ok(self.handle(service, replicas))
    }

    async fn running_replicas(&self, service: &str) -> Result<u32, PlatformError> {
        let output = self.run(self.target.running(service)).await?;
        Ok(command::count_ids(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn remove_service(&self, handle: &ServiceHandle) -> Result<(), PlatformError> {
        self.run(self.target.remove(&handle.service)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(binary: &str) -> ComposePlatform {
        ComposePlatform::new(ComposePlatformConfig {
            docker_binary: PathBuf::from(binary),
            project: "styx".to_string(),
            compose_file: None,
        })
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        let text = "a\nb\nc\nd";
        assert_eq!(tail(text, 2), "c\nd");
        assert_eq!(tail(text, 10), text);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let platform = platform("/nonexistent/docker");
        let err = platform.start_service("kafka").await.unwrap_err();

        assert!(matches!(err, PlatformError::Spawn { .. }));
        assert!(err.command().contains("up -d kafka"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_command_failed() {
        // `false` ignores its arguments and exits 1.
        let platform = platform("false");
        let err = platform.start_service("kafka").await.unwrap_err();
        assert!(matches!(err, PlatformError::CommandFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_command_yields_handle() {
        // `true` ignores its arguments and exits 0.
        let platform = platform("true");
        let handle = platform.scale_service("worker", 3).await.unwrap();
        assert_eq!(handle.replicas, 3);
        assert_eq!(handle.project, "styx");
        assert_eq!(platform.running_replicas("worker").await.unwrap(), 0);
    }
}
