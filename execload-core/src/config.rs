use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::ConfigurationError;

pub type EnvVars = Arc<[(Arc<str>, Arc<str>)]>;

pub mod vars {
    pub const RATE: &str = "RATE";
    pub const DURATION: &str = "DURATION";
    pub const SCENARIO: &str = "SCENARIO";
    pub const LOCATION: &str = "LOCATION";
    pub const RUN_ID: &str = "RUN_ID";
    pub const TEST_START_TIME: &str = "TEST_START_TIME";
    pub const PREALLOCATED_VUS: &str = "PREALLOCATED_VUS";
    pub const TARGET_URL: &str = "TARGET_URL";
    pub const SUMMARY_SINK_URLS: &str = "SUMMARY_SINK_URLS";
    pub const REAL_TIME_SINK_URL: &str = "REAL_TIME_SINK_URL";
    pub const PUBLISH_RESULTS: &str = "PUBLISH_RESULTS";
    pub const REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
    pub const TEST_OUTPUT_FILE_PREFIX: &str = "TEST_OUTPUT_FILE_PREFIX";
    pub const REAL_TIME_METRICS_FILE: &str = "REAL_TIME_METRICS_FILE";
}

pub const DEFAULT_RATE: u64 = 1;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_LOCATION: &str = "northcentralusstage";
pub const DEFAULT_RUN_ID: &str = "Test";
pub const DEFAULT_TARGET_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_OUTPUT_PREFIX: &str = "perf";
pub const DEFAULT_REAL_TIME_METRICS_FILE: &str = "real-time-metrics.json";

pub const PATH_SUMMARY_SINK: &str = "/publish-metrics-summary";
pub const PATH_REAL_TIME_SINK: &str = "/publish-metrics-real-time";

/// Snapshot of the current process environment, sorted by key.
pub fn process_env_snapshot() -> EnvVars {
    let mut vars: Vec<(Arc<str>, Arc<str>)> = std::env::vars()
        .map(|(k, v)| (Arc::<str>::from(k), Arc::<str>::from(v)))
        .collect();
    vars.sort_by(|(a, _), (b, _)| a.cmp(b));
    Arc::from(vars.into_boxed_slice())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScenarioKind {
    Fixed,
    Ramping,
    Constant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base url of the service under test, without a trailing slash.
    pub target_url: String,
    pub summary_sinks: Vec<String>,
    pub real_time_url: String,
}

impl Endpoints {
    pub fn execute_url(&self) -> String {
        format!("{}/execute", self.target_url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub out_dir: PathBuf,
    pub prefix: String,
    pub real_time_file: String,
}

impl OutputConfig {
    fn artifact(&self, suffix: &str) -> PathBuf {
        self.out_dir.join(format!("{}_{suffix}", self.prefix))
    }

    pub fn raw_json_path(&self) -> PathBuf {
        self.artifact("raw.json")
    }

    pub fn junit_path(&self) -> PathBuf {
        self.artifact("results.xml")
    }

    pub fn metrics_json_path(&self) -> PathBuf {
        self.artifact("metrics.json")
    }

    pub fn html_path(&self) -> PathBuf {
        self.artifact("report.html")
    }

    pub fn real_time_path(&self) -> PathBuf {
        self.out_dir.join(&self.real_time_file)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            real_time_file: DEFAULT_REAL_TIME_METRICS_FILE.to_string(),
        }
    }
}

/// Values given on the command line. Each one wins over its environment variable.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub rate: Option<u64>,
    pub duration: Option<Duration>,
    pub scenario: Option<String>,
    pub location: Option<String>,
    pub run_id: Option<String>,
    pub test_start_time: Option<String>,
    pub preallocated_vus: Option<u64>,
    pub target_url: Option<String>,
    pub sink_urls: Vec<String>,
    pub real_time_url: Option<String>,
    pub no_publish: bool,
    pub request_timeout: Option<Duration>,
    pub output_prefix: Option<String>,
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    pub scenario_kind: ScenarioKind,
    /// Iterations per second.
    pub target_rate: u64,
    pub duration: Duration,
    pub preallocated_workers: Option<u64>,
    pub region: String,
    pub run_id: String,
    pub test_start_time: Option<DateTime<Utc>>,
    pub endpoints: Endpoints,
    pub outputs: OutputConfig,
    pub request_timeout: Duration,
    pub publish: bool,
}

impl WorkloadConfig {
    /// Resolves the run configuration. Precedence is CLI, then environment, then defaults.
    pub fn resolve(env: &EnvVars, overrides: &Overrides) -> Result<Self, ConfigurationError> {
        let get = |key: &str| lookup(env, key);

        let scenario_raw = overrides
            .scenario
            .as_deref()
            .or_else(|| get(vars::SCENARIO))
            .unwrap_or("constant");
        let scenario_kind: ScenarioKind = scenario_raw
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::UnknownScenario(scenario_raw.to_string()))?;

        let target_rate = match overrides.rate {
            Some(v) => v,
            None => get(vars::RATE)
                .map(|raw| parse_u64(vars::RATE, raw))
                .transpose()?
                .unwrap_or(DEFAULT_RATE),
        };
        if target_rate == 0 {
            return Err(ConfigurationError::ZeroRate);
        }

        let duration = match overrides.duration {
            Some(v) => v,
            None => get(vars::DURATION)
                .map(|raw| parse_duration(vars::DURATION, raw))
                .transpose()?
                .unwrap_or(DEFAULT_DURATION),
        };
        if duration.is_zero() {
            return Err(ConfigurationError::ZeroDuration);
        }

        let preallocated_workers = match overrides.preallocated_vus {
            Some(v) => Some(v),
            None => get(vars::PREALLOCATED_VUS)
                .map(|raw| parse_u64(vars::PREALLOCATED_VUS, raw))
                .transpose()?,
        };
        if preallocated_workers == Some(0) {
            return Err(ConfigurationError::ZeroWorkers);
        }

        let test_start_time = overrides
            .test_start_time
            .as_deref()
            .or_else(|| get(vars::TEST_START_TIME))
            .map(|raw| parse_timestamp(vars::TEST_START_TIME, raw))
            .transpose()?;

        let target_url = overrides
            .target_url
            .as_deref()
            .or_else(|| get(vars::TARGET_URL))
            .unwrap_or(DEFAULT_TARGET_URL);
        let target_url = validate_url(vars::TARGET_URL, target_url)?;

        let summary_sinks = if !overrides.sink_urls.is_empty() {
            overrides.sink_urls.clone()
        } else if let Some(raw) = get(vars::SUMMARY_SINK_URLS) {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            vec![format!("{target_url}{PATH_SUMMARY_SINK}")]
        };
        let summary_sinks = summary_sinks
            .iter()
            .map(|s| validate_url(vars::SUMMARY_SINK_URLS, s))
            .collect::<Result<Vec<_>, _>>()?;

        let real_time_url = match overrides
            .real_time_url
            .as_deref()
            .or_else(|| get(vars::REAL_TIME_SINK_URL))
        {
            Some(raw) => validate_url(vars::REAL_TIME_SINK_URL, raw)?,
            None => format!("{target_url}{PATH_REAL_TIME_SINK}"),
        };

        let publish = if overrides.no_publish {
            false
        } else {
            get(vars::PUBLISH_RESULTS)
                .map(|raw| parse_bool(vars::PUBLISH_RESULTS, raw))
                .transpose()?
                .unwrap_or(true)
        };

        let request_timeout = match overrides.request_timeout {
            Some(v) => v,
            None => get(vars::REQUEST_TIMEOUT)
                .map(|raw| parse_duration(vars::REQUEST_TIMEOUT, raw))
                .transpose()?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };

        let text = |cli: &Option<String>, key: &str, default: &str| -> String {
            cli.as_deref()
                .or_else(|| get(key))
                .unwrap_or(default)
                .to_string()
        };

        let outputs = OutputConfig {
            out_dir: overrides
                .out_dir
                .clone()
                .unwrap_or_else(|| Path::new(".").to_path_buf()),
            prefix: text(
                &overrides.output_prefix,
                vars::TEST_OUTPUT_FILE_PREFIX,
                DEFAULT_OUTPUT_PREFIX,
            ),
            real_time_file: text(
                &None,
                vars::REAL_TIME_METRICS_FILE,
                DEFAULT_REAL_TIME_METRICS_FILE,
            ),
        };

        Ok(Self {
            scenario_kind,
            target_rate,
            duration,
            preallocated_workers,
            region: text(&overrides.location, vars::LOCATION, DEFAULT_LOCATION),
            run_id: text(&overrides.run_id, vars::RUN_ID, DEFAULT_RUN_ID),
            test_start_time,
            endpoints: Endpoints {
                target_url,
                summary_sinks,
                real_time_url,
            },
            outputs,
            request_timeout,
            publish,
        })
    }
}

/// Empty values count as unset.
fn lookup<'a>(env: &'a EnvVars, key: &str) -> Option<&'a str> {
    env.iter()
        .rev()
        .find(|(k, _)| k.as_ref() == key)
        .map(|(_, v)| v.as_ref())
        .filter(|v| !v.trim().is_empty())
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigurationError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidNumber {
            var,
            value: raw.to_string(),
        })
}

pub(crate) fn parse_duration(var: &'static str, raw: &str) -> Result<Duration, ConfigurationError> {
    humantime::parse_duration(raw.trim()).map_err(|err| ConfigurationError::InvalidDuration {
        var,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

fn parse_timestamp(var: &'static str, raw: &str) -> Result<DateTime<Utc>, ConfigurationError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ConfigurationError::InvalidTimestamp {
            var,
            value: raw.to_string(),
        })
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigurationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigurationError::InvalidBool {
            var,
            value: raw.to_string(),
        }),
    }
}

fn validate_url(var: &'static str, raw: &str) -> Result<String, ConfigurationError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed).map_err(|_| ConfigurationError::InvalidUrl {
        var,
        value: raw.to_string(),
    })?;
    if parsed.scheme() != "http" {
        return Err(ConfigurationError::UnsupportedScheme {
            var,
            value: raw.to_string(),
        });
    }
    Ok(trimmed.to_string())
}
