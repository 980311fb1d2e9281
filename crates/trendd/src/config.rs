//! trendd configuration.
//!
//! Every setting can come from a CLI flag, an environment variable, an
//! optional TOML file, or a built-in default, in that order of precedence.
//! clap handles flag over environment; [`TrendConfig::resolve`] layers the
//! result over the file.

use std::path::Path;
use std::time::Duration;

use anyhow::bail;
use serde::Deserialize;

use trend_watch::{ExperimentResource, UnexpectedErrorPolicy, WatcherConfig};

pub const DEFAULT_SCRAPE_PORT: u16 = 8888;
pub const DEFAULT_HEALTHCHECK_PORT: u16 = 8889;
pub const DEFAULT_PROMETHEUS_URL: &str = "http://prometheus.istio-system:9090";
pub const DEFAULT_K8S_FREQ_SECS: u64 = 30;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings given on the command line or through the environment.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// Port serving the iter8_trend exposition.
    #[arg(long, env = "TREND_SCRAPE_PORT")]
    pub scrape_port: Option<u16>,

    /// Port serving the health check.
    #[arg(long, env = "TREND_HEALTHCHECK_PORT")]
    pub healthcheck_port: Option<u16>,

    /// Base URL of the Prometheus server.
    #[arg(long, env = "TREND_PROMETHEUS_URL")]
    pub prometheus_url: Option<String>,

    /// Seconds between cluster polls.
    #[arg(long, env = "TREND_K8S_FREQ")]
    pub k8s_freq: Option<u64>,

    /// Seconds before a Prometheus query is abandoned.
    #[arg(long, env = "TREND_QUERY_TIMEOUT")]
    pub query_timeout: Option<u64>,

    /// Consecutive unexpected errors before shutting down (0 = never).
    #[arg(long, env = "TREND_MAX_UNEXPECTED_ERRORS")]
    pub max_unexpected_errors: Option<u32>,

    /// API group of the experiment resource.
    #[arg(long)]
    pub experiment_group: Option<String>,

    /// API version of the experiment resource.
    #[arg(long)]
    pub experiment_version: Option<String>,

    /// Plural name of the experiment resource.
    #[arg(long)]
    pub experiment_plural: Option<String>,

    /// Log output format.
    #[arg(long, env = "TREND_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Settings read from the TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub scrape_port: Option<u16>,
    pub healthcheck_port: Option<u16>,
    pub prometheus_url: Option<String>,
    pub k8s_freq: Option<u64>,
    pub query_timeout: Option<u64>,
    pub max_unexpected_errors: Option<u32>,
    pub experiment_group: Option<String>,
    pub experiment_version: Option<String>,
    pub experiment_plural: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: FileConfig = toml::from_str(content)?;
        Ok(config)
    }
}

/// Effective configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendConfig {
    pub scrape_port: u16,
    pub healthcheck_port: u16,
    pub prometheus_url: String,
    pub poll_interval: Duration,
    pub query_timeout: Duration,
    pub max_unexpected_errors: u32,
    pub experiment: ExperimentResource,
    pub log_format: LogFormat,
}

impl TrendConfig {
    /// Load the file at `path` (if any) and layer `overrides` on top.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => FileConfig::from_file(path)
                .map_err(|e| e.context(format!("reading config file {}", path.display())))?,
            None => FileConfig::default(),
        };
        Self::resolve(overrides, file)
    }

    pub fn resolve(overrides: Overrides, file: FileConfig) -> anyhow::Result<Self> {
        let k8s_freq = overrides
            .k8s_freq
            .or(file.k8s_freq)
            .unwrap_or(DEFAULT_K8S_FREQ_SECS);
        if k8s_freq == 0 {
            bail!("k8s-freq must be at least one second");
        }
        let query_timeout = overrides
            .query_timeout
            .or(file.query_timeout)
            .unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS);
        if query_timeout == 0 {
            bail!("query-timeout must be at least one second");
        }

        let defaults = ExperimentResource::default();
        let experiment = ExperimentResource {
            group: overrides
                .experiment_group
                .or(file.experiment_group)
                .unwrap_or(defaults.group),
            version: overrides
                .experiment_version
                .or(file.experiment_version)
                .unwrap_or(defaults.version),
            kind: defaults.kind,
            plural: overrides
                .experiment_plural
                .or(file.experiment_plural)
                .unwrap_or(defaults.plural),
        };

        Ok(Self {
            scrape_port: overrides
                .scrape_port
                .or(file.scrape_port)
                .unwrap_or(DEFAULT_SCRAPE_PORT),
            healthcheck_port: overrides
                .healthcheck_port
                .or(file.healthcheck_port)
                .unwrap_or(DEFAULT_HEALTHCHECK_PORT),
            prometheus_url: overrides
                .prometheus_url
                .or(file.prometheus_url)
                .unwrap_or_else(|| DEFAULT_PROMETHEUS_URL.to_string()),
            poll_interval: Duration::from_secs(k8s_freq),
            query_timeout: Duration::from_secs(query_timeout),
            max_unexpected_errors: overrides
                .max_unexpected_errors
                .or(file.max_unexpected_errors)
                .unwrap_or(UnexpectedErrorPolicy::default().max_consecutive),
            experiment,
            log_format: overrides.log_format.or(file.log_format).unwrap_or_default(),
        })
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: self.poll_interval,
            policy: UnexpectedErrorPolicy {
                max_consecutive: self.max_unexpected_errors,
            },
        }
    }
}
