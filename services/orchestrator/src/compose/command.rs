//! Docker Compose command lines and output parsing.
//!
//! Every builder returns the argument vector passed to the docker binary.
//! Project-scoped commands always carry `-p <project>` so they never touch
//! another deployment's containers.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Label Compose attaches to every resource it creates.
pub const PROJECT_LABEL: &str = "com.docker.compose.project";

/// Compose invocation context shared by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeTarget {
    pub project: String,
    pub compose_file: Option<PathBuf>,
}

impl ComposeTarget {
    fn base(&self) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-p".to_string(),
            self.project.clone(),
        ];
        if let Some(file) = &self.compose_file {
            args.push("-f".to_string());
            args.push(file.display().to_string());
        }
        args
    }

    /// `compose down` for this project, including anonymous volumes.
    pub fn down(&self) -> Vec<String> {
        let mut args = self.base();
        args.extend(
            ["down", "--volumes", "--remove-orphans"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    /// `compose up -d <service>`.
    pub fn up(&self, service: &str) -> Vec<String> {
        let mut args = self.base();
        args.extend(["up", "-d", service].iter().map(|s| s.to_string()));
        args
    }

    /// `compose build --build-arg k=v ... <service>`.
    pub fn build(&self, service: &str, build_args: &BTreeMap<String, String>) -> Vec<String> {
        let mut args = self.base();
        args.push("build".to_string());
        for (key, value) in build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(service.to_string());
        args
    }

    /// `compose up -d --no-deps --scale <service>=<n> <service>`.
    pub fn scale(&self, service: &str, replicas: u32) -> Vec<String> {
        let mut args = self.base();
        args.extend(
            ["up", "-d", "--no-deps", "--scale"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(format!("{}={}", service, replicas));
        args.push(service.to_string());
        args
    }

    /// `compose ps --status running --quiet <service>`.
    pub fn running(&self, service: &str) -> Vec<String> {
        let mut args = self.base();
        args.extend(
            ["ps", "--status", "running", "--quiet", service]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    /// `compose rm --stop --force -v <service>`.
    pub fn remove(&self, service: &str) -> Vec<String> {
        let mut args = self.base();
        args.extend(
            ["rm", "--stop", "--force", "-v", service]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }
}

/// `docker container prune`, optionally restricted to one project.
pub fn container_prune(project: Option<&str>) -> Vec<String> {
    prune("container", project)
}

/// `docker volume prune`, optionally restricted to one project.
///
/// Unscoped, this deletes every volume not attached to a container.
pub fn volume_prune(project: Option<&str>) -> Vec<String> {
    prune("volume", project)
}

fn prune(kind: &str, project: Option<&str>) -> Vec<String> {
    let mut args = vec![kind.to_string(), "prune".to_string(), "-f".to_string()];
    if let Some(project) = project {
        args.push("--filter".to_string());
        args.push(format!("label={}={}", PROJECT_LABEL, project));
    }
    args
}

/// Count IDs listed by a `prune` command.
///
/// Output looks like:
///
/// ```text
/// Deleted Containers:
/// 4a7f7eebae0f...
///
/// Total reclaimed space: 212B
/// ```
pub fn count_pruned(stdout: &str) -> u32 {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.ends_with(':'))
        .filter(|line| !line.starts_with("Total reclaimed space"))
        .count() as u32
}

/// Count `<kind> <name> Removed` progress lines printed by `compose down`.
pub fn count_removed(output: &str, kind: &str) -> u32 {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(kind) && line.ends_with("Removed"))
        .count() as u32
}

/// Count container IDs printed by `compose ps --quiet`.
pub fn count_ids(stdout: &str) -> u32 {
    stdout.lines().filter(|line| !line.trim().is_empty()).count() as u32
}

/// Render an argument vector for logs and errors.
pub fn render(binary: &str, args: &[String]) -> String {
    let mut line = binary.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ComposeTarget {
        ComposeTarget {
            project: "styx".to_string(),
            compose_file: Some(PathBuf::from("docker-compose.yml")),
        }
    }

    #[test]
    fn test_up_is_project_scoped() {
        assert_eq!(
            target().up("kafka"),
            vec!["compose", "-p", "styx", "-f", "docker-compose.yml", "up", "-d", "kafka"]
        );
    }

    #[test]
    fn test_build_carries_build_args() {
        let mut build_args = BTreeMap::new();
        build_args.insert("epoch_size".to_string(), "100".to_string());

        let args = target().build("worker", &build_args);
        assert_eq!(
            &args[5..],
            &["build", "--build-arg", "epoch_size=100", "worker"]
        );
    }

    #[test]
    fn test_scale_to_zero_is_explicit() {
        let target = ComposeTarget {
            project: "styx".to_string(),
            compose_file: None,
        };
        assert_eq!(
            target.scale("worker", 0),
            vec![
                "compose", "-p", "styx", "up", "-d", "--no-deps", "--scale", "worker=0",
                "worker"
            ]
        );
    }

    #[test]
    fn test_prune_scoping() {
        assert_eq!(container_prune(None), vec!["container", "prune", "-f"]);
        assert_eq!(
            volume_prune(Some("styx")),
            vec![
                "volume",
                "prune",
                "-f",
                "--filter",
                "label=com.docker.compose.project=styx"
            ]
        );
    }

    #[test]
    fn test_count_pruned() {
        let output = "Deleted Containers:\n4a7f7eebae0f\n9c1b2d3e4f5a\n\nTotal reclaimed space: 212B\n";
        assert_eq!(count_pruned(output), 2);
        assert_eq!(count_pruned("Total reclaimed space: 0B\n"), 0);
        assert_eq!(count_pruned(""), 0);
    }

    #[test]
    fn test_count_removed() {
        let output = " Container styx-worker-1  Removed\n Container styx-kafka-1  Removed\n Volume styx_data  Removed\n Network styx_default  Removed\n";
        assert_eq!(count_removed(output, "Container"), 2);
        assert_eq!(count_removed(output, "Volume"), 1);
    }

    #[test]
    fn test_count_ids() {
        assert_eq!(count_ids("abc\ndef\n\n"), 2);
        assert_eq!(count_ids(""), 0);
    }

    #[test]
    fn test_render() {
        assert_eq!(
            render("docker", &container_prune(None)),
            "docker container prune -f"
        );
    }
}
