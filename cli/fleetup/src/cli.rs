//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use fleetup_orchestrator::{
    BootstrapConfig, BootstrapError, ComposePlatform, ComposePlatformConfig, Orchestrator,
    ResetMode,
};
use fleetup_scale::{DeploymentRequest, ThreadsPerWorker};
use tracing::info;

use crate::logging::LogFormat;
use crate::output::{self, OutputFormat};

/// Bootstrap a message broker, an object store and a scaled pool of compute
/// workers, in dependency order, from a clean slate.
#[derive(Debug, Parser)]
#[command(name = "fleetup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Total requested parallelism units (non-negative integer).
    #[arg(value_name = "SCALE_FACTOR", allow_hyphen_values = true)]
    scale_factor: String,

    /// Epoch size baked into the worker image at build time (positive integer).
    #[arg(value_name = "EPOCH_SIZE", allow_hyphen_values = true)]
    epoch_size: String,

    /// Deployment manifest (TOML). Defaults apply when omitted.
    #[arg(long, env = "FLEETUP_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Compose project name; overrides the manifest.
    #[arg(long)]
    project: Option<String>,

    /// Compose file; overrides the manifest.
    #[arg(long)]
    compose_file: Option<PathBuf>,

    /// Threads each worker process runs; overrides the manifest.
    #[arg(long, allow_negative_numbers = true)]
    threads_per_worker: Option<i64>,

    /// Prune every stopped container and dangling volume on the host, not
    /// just this project's. Deletes data of unrelated deployments.
    #[arg(long)]
    global_reset: bool,

    /// Leave started services running when a phase fails.
    #[arg(long)]
    no_rollback: bool,

    /// Wait fixed delays (5s broker, 10s store, 5s workers) instead of probing.
    /// A run that launches zero workers skips the worker wait.
    #[arg(long)]
    fixed_waits: bool,

    /// Validate and print the plan without touching the platform.
    #[arg(long)]
    dry_run: bool,

    /// Summary output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table, env = "FLEETUP_FORMAT")]
    format: OutputFormat,

    /// Log output format. The filter is read from RUST_LOG.
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, env = "FLEETUP_LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Cli {
    /// Run the bootstrap.
    pub async fn run(self) -> Result<()> {
        let request = DeploymentRequest::parse(Some(&self.scale_factor), Some(&self.epoch_size))
            .map_err(BootstrapError::from)?;
        let config = self.resolve_config()?;

        let platform = Arc::new(ComposePlatform::new(ComposePlatformConfig {
            docker_binary: config.docker_binary.clone(),
            project: config.project.clone(),
            compose_file: config.compose_file.clone(),
        }));
        let orchestrator = Orchestrator::new(config, platform);

        if self.dry_run {
            let plan = orchestrator.plan(&request)?;
            return output::print_plan(&plan, self.format);
        }

        info!(
            version = env!("CARGO_PKG_VERSION"),
            project = %orchestrator.config().project,
            "fleetup starting"
        );
        let report = orchestrator.run(request).await?;
        output::print_report(&report, self.format)
    }

    /// Load the manifest and apply command-line overrides.
    fn resolve_config(&self) -> Result<BootstrapConfig, BootstrapError> {
        let mut config = BootstrapConfig::load(self.manifest.as_deref())?;

        if let Some(project) = &self.project {
            config.project = project.clone();
        }
        if let Some(compose_file) = &self.compose_file {
            config.compose_file = Some(compose_file.clone());
        }
        if let Some(threads) = self.threads_per_worker {
            config.threads_per_worker = ThreadsPerWorker::new(threads)?;
        }
        if self.global_reset {
            config.reset = ResetMode::Global;
        }
        if self.no_rollback {
            config.rollback_on_failure = false;
        }
        if self.fixed_waits {
            config = config.with_fixed_delays();
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use fleetup_orchestrator::config::ReadinessKind;
    use fleetup_orchestrator::ResetScope;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fleetup").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_positionals_are_required() {
        let err = Cli::try_parse_from(["fleetup", "16"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_negative_scale_factor_reaches_validation() {
        let cli = parse(&["-4", "100"]);
        assert_eq!(cli.scale_factor, "-4");
        assert!(DeploymentRequest::parse(Some(&cli.scale_factor), Some(&cli.epoch_size)).is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["16", "100"]);
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.project, "fleetup");
        assert_eq!(config.threads_per_worker.get(), 4);
        assert!(config.rollback_on_failure);
        assert_eq!(config.reset_scope(), ResetScope::Project("fleetup".to_string()));
    }

    #[test]
    fn test_overrides() {
        let cli = parse(&[
            "16",
            "100",
            "--project",
            "styx",
            "--threads-per-worker",
            "8",
            "--global-reset",
            "--no-rollback",
            "--fixed-waits",
            "--format",
            "json",
        ]);
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.project, "styx");
        assert_eq!(config.threads_per_worker.get(), 8);
        assert_eq!(config.reset_scope(), ResetScope::Global);
        assert!(!config.rollback_on_failure);
        assert_eq!(config.broker.readiness.kind, ReadinessKind::FixedDelay);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_fixed_waits_help_mentions_zero_workers() {
        use clap::CommandFactory;

        let command = Cli::command();
        let arg = command
            .get_arguments()
            .find(|arg| arg.get_id() == "fixed_waits")
            .unwrap();
        let help = arg.get_long_help().or(arg.get_help()).unwrap().to_string();
        assert!(help.contains("zero workers skips the worker wait"));
    }

    #[test]
    fn test_invalid_threads_per_worker() {
        let cli = parse(&["16", "100", "--threads-per-worker", "0"]);
        let err = cli.resolve_config().unwrap_err();
        assert!(err.is_configuration());

        let cli = parse(&["16", "100", "--threads-per-worker", "-2"]);
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn test_invalid_project_override() {
        let cli = parse(&["16", "100", "--project", "Not Valid"]);
        assert!(cli.resolve_config().unwrap_err().is_configuration());
    }
}
