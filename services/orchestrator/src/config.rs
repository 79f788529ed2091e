//! Deployment manifest.
//!
//! The manifest names the deployment identity, the services that make up
//! each tier, and how readiness of each tier is established. It is read
//! from a TOML file; every field has a default, so an empty file (or no
//! file) yields a complete configuration.
//!
//! ```toml
//! project = "styx"
//! compose_file = "docker-compose.yml"
//! threads_per_worker = 4
//!
//! [broker]
//! service = "kafka"
//! readiness = { kind = "tcp", address = "127.0.0.1:9092", timeout_secs = 60 }
//!
//! [store]
//! service = "minio"
//! readiness = { kind = "http", url = "http://127.0.0.1:9000/minio/health/live" }
//!
//! [workers]
//! service = "worker"
//! epoch_build_arg = "epoch_size"
//! readiness = { kind = "replicas" }
//! ```
//!
//! The scale factor and epoch size are never part of the manifest; they are
//! supplied per invocation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fleetup_readiness::{ReadinessError, ReadinessGate, ReadinessPolicy};
use fleetup_scale::{ScaleError, ThreadsPerWorker};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::ResetScope;

/// Reference wait after starting the broker.
pub const BROKER_FIXED_DELAY: Duration = Duration::from_secs(5);

/// Reference wait after starting the object store.
pub const STORE_FIXED_DELAY: Duration = Duration::from_secs(10);

/// Reference wait after launching the workers.
pub const WORKERS_FIXED_DELAY: Duration = Duration::from_secs(5);

/// Configuration errors. All of them are raised before any side effect.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read manifest {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Scale(#[from] ScaleError),

    #[error("{field}: {message}")]
    Invalid { field: String, message: String },

    #[error(transparent)]
    Readiness(#[from] ReadinessError),
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Which reset the bootstrap performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetMode {
    /// Only this project's resources.
    #[default]
    Project,
    /// Every stopped container and dangling volume on the platform.
    Global,
}

/// How readiness of a tier is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessKind {
    /// Sleep for `delay_secs`, then assume ready.
    FixedDelay,
    /// TCP connect to `address`.
    Tcp,
    /// HTTP GET `url` returning 2xx.
    Http,
    /// Platform reports the requested number of running replicas.
    Replicas,
}

/// Readiness settings for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    pub kind: ReadinessKind,

    /// `host:port` for `tcp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// URL for `http`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Delay for `fixed_delay`. Falls back to the tier's reference delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_secs: Option<u64>,

    #[serde(default)]
    pub grace_period_secs: u64,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_check_timeout_ms() -> u64 {
    2_000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_success_threshold() -> u32 {
    1
}

impl ReadinessConfig {
    fn with_kind(kind: ReadinessKind) -> Self {
        Self {
            kind,
            address: None,
            url: None,
            delay_secs: None,
            grace_period_secs: 0,
            interval_ms: default_interval_ms(),
            check_timeout_ms: default_check_timeout_ms(),
            timeout_secs: default_timeout_secs(),
            success_threshold: default_success_threshold(),
        }
    }

    /// TCP connect readiness.
    pub fn tcp(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::with_kind(ReadinessKind::Tcp)
        }
    }

    /// HTTP 2xx readiness.
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::with_kind(ReadinessKind::Http)
        }
    }

    /// Running-replica readiness.
    pub fn replicas() -> Self {
        Self::with_kind(ReadinessKind::Replicas)
    }

    /// Fixed delay, assumed readiness.
    pub fn fixed_delay(delay: Duration) -> Self {
        Self {
            delay_secs: Some(delay.as_secs()),
            ..Self::with_kind(ReadinessKind::FixedDelay)
        }
    }

    /// Set the overall probe deadline.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the polling interval.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Polling policy for probe kinds.
    pub fn policy(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            grace_period: Duration::from_secs(self.grace_period_secs),
            interval: Duration::from_millis(self.interval_ms),
            check_timeout: Duration::from_millis(self.check_timeout_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            success_threshold: self.success_threshold,
        }
    }

    /// Delay for `fixed_delay`, with the tier's reference value as fallback.
    pub fn delay_or(&self, fallback: Duration) -> Duration {
        self.delay_secs.map(Duration::from_secs).unwrap_or(fallback)
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        match self.kind {
            ReadinessKind::FixedDelay => {
                let delay = self.delay_secs.map(Duration::from_secs).unwrap_or_default();
                ReadinessGate::FixedDelay(delay).validate()?;
                return Ok(());
            }
            ReadinessKind::Tcp => {
                let address = self.address.as_deref().unwrap_or_default();
                let valid = address
                    .rsplit_once(':')
                    .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                    .unwrap_or(false);
                if !valid {
                    return Err(ConfigError::invalid(
                        format!("{}.address", field),
                        "tcp readiness requires address in host:port form",
                    ));
                }
            }
            ReadinessKind::Http => {
                let url = self.url.as_deref().unwrap_or_default();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::invalid(
                        format!("{}.url", field),
                        "http readiness requires an http:// or https:// url",
                    ));
                }
            }
            ReadinessKind::Replicas => {}
        }
        self.policy().validate()?;
        Ok(())
    }
}

/// A dependency tier (broker or store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name in the compose file.
    pub service: String,

    pub readiness: ReadinessConfig,
}

/// The compute tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Service name in the compose file.
    pub service: String,

    /// Build argument that receives the epoch size.
    #[serde(default = "default_epoch_build_arg")]
    pub epoch_build_arg: String,

    pub readiness: ReadinessConfig,
}

fn default_epoch_build_arg() -> String {
    "epoch_size".to_string()
}

/// Bootstrap configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Deployment identity; the compose project name.
    pub project: String,

    /// Compose file. Compose's own lookup applies when unset.
    pub compose_file: Option<PathBuf>,

    /// Docker CLI binary.
    pub docker_binary: PathBuf,

    /// Threads each worker process runs.
    pub threads_per_worker: ThreadsPerWorker,

    /// Reset scope.
    pub reset: ResetMode,

    /// Tear down what this run started when a phase fails.
    pub rollback_on_failure: bool,

    pub broker: ServiceConfig,
    pub store: ServiceConfig,
    pub workers: WorkerConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            project: "fleetup".to_string(),
            compose_file: None,
            docker_binary: PathBuf::from("docker"),
            threads_per_worker: ThreadsPerWorker::default(),
            reset: ResetMode::Project,
            rollback_on_failure: true,
            broker: ServiceConfig {
                service: "kafka".to_string(),
                readiness: ReadinessConfig::tcp("127.0.0.1:9092"),
            },
            store: ServiceConfig {
                service: "minio".to_string(),
                readiness: ReadinessConfig::http("http://127.0.0.1:9000/minio/health/live"),
            },
            workers: WorkerConfig {
                service: "worker".to_string(),
                epoch_build_arg: default_epoch_build_arg(),
                readiness: ReadinessConfig::replicas().with_timeout_secs(120),
            },
        }
    }
}

impl BootstrapConfig {
    /// Load a manifest, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&contents)
    }

    /// Parse a manifest from TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Replace every readiness gate with the reference fixed delays.
    pub fn with_fixed_delays(mut self) -> Self {
        self.broker.readiness = ReadinessConfig::fixed_delay(BROKER_FIXED_DELAY);
        self.store.readiness = ReadinessConfig::fixed_delay(STORE_FIXED_DELAY);
        self.workers.readiness = ReadinessConfig::fixed_delay(WORKERS_FIXED_DELAY);
        self
    }

    /// Reset scope for this deployment.
    pub fn reset_scope(&self) -> ResetScope {
        match self.reset {
            ResetMode::Project => ResetScope::Project(self.project.clone()),
            ResetMode::Global => ResetScope::Global,
        }
    }

    /// Validate everything that can be checked without the platform.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_project_name(&self.project)?;

        let services = [
            ("broker.service", &self.broker.service),
            ("store.service", &self.store.service),
            ("workers.service", &self.workers.service),
        ];
        for (field, service) in services {
            if service.trim().is_empty() {
                return Err(ConfigError::invalid(field, "service name cannot be empty"));
            }
        }
        if self.broker.service == self.store.service
            || self.broker.service == self.workers.service
            || self.store.service == self.workers.service
        {
            return Err(ConfigError::invalid(
                "services",
                "broker, store and workers must be distinct services",
            ));
        }

        if self.workers.epoch_build_arg.trim().is_empty() {
            return Err(ConfigError::invalid(
                "workers.epoch_build_arg",
                "build argument name cannot be empty",
            ));
        }

        self.broker.readiness.validate("broker.readiness")?;
        self.store.readiness.validate("store.readiness")?;
        self.workers.readiness.validate("workers.readiness")?;

        Ok(())
    }
}

/// Compose project names: lowercase letters, digits, `-` and `_`, starting
/// with a letter or digit.
fn validate_project_name(project: &str) -> Result<(), ConfigError> {
    let mut chars = project.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

    if !(valid_start && valid_rest) {
        return Err(ConfigError::invalid(
            "project",
            format!(
                "'{}' is not a valid project name (lowercase letters, digits, '-' and '_')",
                project
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = BootstrapConfig::default();
        config.validate().unwrap();
        assert_eq!(config.threads_per_worker.get(), 4);
        assert_eq!(config.reset_scope(), ResetScope::Project("fleetup".to_string()));
    }

    #[test]
    fn test_unbounded_readiness_waits_rejected() {
        let manifest = r#"
            [broker]
            service = "kafka"
            readiness = { kind = "tcp", address = "127.0.0.1:9092", timeout_secs = 9223372036854775807 }
        "#;
        let config = BootstrapConfig::from_toml_str(manifest).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Readiness(ReadinessError::InvalidPolicy(_))));

        let mut config = BootstrapConfig::default().with_fixed_delays();
        config.store.readiness.delay_secs = Some(u64::MAX);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Readiness(ReadinessError::InvalidPolicy(_)))
        ));
    }

    #[test]
    fn test_empty_manifest_yields_defaults() {
        let config = BootstrapConfig::from_toml_str("").unwrap();
        assert_eq!(config, BootstrapConfig::default());
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = r#"
            project = "styx"
            compose_file = "deploy/docker-compose.yml"
            threads_per_worker = 8
            reset = "global"

            [broker]
            service = "kafka"
            readiness = { kind = "tcp", address = "localhost:9092", timeout_secs = 30 }

            [store]
            service = "minio"
            readiness = { kind = "fixed_delay" }

            [workers]
            service = "styx-worker"
            readiness = { kind = "replicas", interval_ms = 500 }
        "#;

        let config = BootstrapConfig::from_toml_str(manifest).unwrap();
        config.validate().unwrap();

        assert_eq!(config.project, "styx");
        assert_eq!(config.threads_per_worker.get(), 8);
        assert_eq!(config.reset_scope(), ResetScope::Global);
        assert_eq!(config.broker.readiness.policy().timeout, Duration::from_secs(30));
        assert_eq!(config.store.readiness.delay_or(STORE_FIXED_DELAY), STORE_FIXED_DELAY);
        assert_eq!(config.workers.epoch_build_arg, "epoch_size");
        assert_eq!(
            config.workers.readiness.policy().interval,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_zero_threads_per_worker_rejected_at_parse() {
        let err = BootstrapConfig::from_toml_str("threads_per_worker = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_project_name() {
        let config = BootstrapConfig {
            project: "My Project".to_string(),
            ..BootstrapConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "project"
        ));
    }

    #[test]
    fn test_duplicate_services_rejected() {
        let mut config = BootstrapConfig::default();
        config.store.service = "kafka".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tcp_readiness_requires_address() {
        let mut config = BootstrapConfig::default();
        config.broker.readiness.address = Some("kafka".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broker.readiness.address"));
    }

    #[test]
    fn test_zero_success_threshold_rejected() {
        let mut config = BootstrapConfig::default();
        config.workers.readiness.success_threshold = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Readiness(_))));
    }

    #[test]
    fn test_with_fixed_delays() {
        let config = BootstrapConfig::default().with_fixed_delays();
        assert_eq!(config.broker.readiness.kind, ReadinessKind::FixedDelay);
        assert_eq!(
            config.broker.readiness.delay_or(Duration::ZERO),
            BROKER_FIXED_DELAY
        );
        assert_eq!(
            config.workers.readiness.delay_or(Duration::ZERO),
            WORKERS_FIXED_DELAY
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "project = \"demo\"").unwrap();

        let config = BootstrapConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.project, "demo");
        assert_eq!(config.broker.service, "kafka");
    }

    #[test]
    fn test_load_missing_file() {
        let err = BootstrapConfig::load(Some(Path::new("/nonexistent/fleetup.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        assert_eq!(BootstrapConfig::load(None).unwrap(), BootstrapConfig::default());
    }
}
