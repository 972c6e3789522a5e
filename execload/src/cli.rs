use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }
    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m): {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bar on stderr and a human-readable summary on stdout.
    HumanReadable,
    /// Emit JSON progress and summary lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "execload",
    author,
    version,
    about = "Load-test harness for a remote code-execution service",
    long_about = "execload drives the `/execute` endpoint of a code-execution service at a configured arrival rate, records latency and the service-reported X-Ms-* timing headers, and publishes a flat summary to downstream sinks.\n\nEvery option can also be given through the environment (RATE, DURATION, SCENARIO, ...). CLI flags take precedence over the environment.",
    after_help = "Examples:\n  execload run --rate 5 --duration 10s\n  execload run --scenario ramping --rate 20 --duration 2m --run-id nightly-42\n  execload run --target-url http://localhost:8080 --no-publish --output json\n  execload plan --scenario fixed --rate 3"
)]
pub struct Cli {
    /// Log format on stderr. Verbosity is controlled by RUST_LOG (default `info`).
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test and publish its summary
    Run(RunArgs),

    /// Resolve the configuration and print the scenario without sending requests
    Plan(WorkloadArgs),
}

#[derive(Debug, Args)]
pub struct WorkloadArgs {
    /// Target iterations per second [env: RATE]
    #[arg(long)]
    pub rate: Option<u64>,

    /// Test duration, e.g. 10s or 2m [env: DURATION]
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// fixed, ramping or constant [env: SCENARIO]
    #[arg(long)]
    pub scenario: Option<String>,

    /// Region label sent with every request [env: LOCATION]
    #[arg(long)]
    pub location: Option<String>,

    /// Correlation id for this run [env: RUN_ID]
    #[arg(long)]
    pub run_id: Option<String>,

    /// RFC 3339 start time reported in the summary [env: TEST_START_TIME]
    #[arg(long)]
    pub test_start_time: Option<String>,

    /// Worker pool size for arrival-rate scenarios [env: PREALLOCATED_VUS]
    #[arg(long)]
    pub preallocated_vus: Option<u64>,

    /// Base url of the service under test [env: TARGET_URL]
    #[arg(long)]
    pub target_url: Option<String>,

    /// Summary sink, repeatable [env: SUMMARY_SINK_URLS, comma separated]
    #[arg(long = "sink-url", value_name = "URL")]
    pub sink_urls: Vec<String>,

    /// Real-time signal endpoint [env: REAL_TIME_SINK_URL]
    #[arg(long)]
    pub real_time_url: Option<String>,

    /// Per-request timeout [env: REQUEST_TIMEOUT]
    #[arg(long, value_parser = parse_duration)]
    pub request_timeout: Option<Duration>,

    /// Add/override env vars (repeatable, KEY=VALUE).
    /// CLI-provided vars override the current process env.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub workload: WorkloadArgs,

    /// Skip publishing to the sinks [env: PUBLISH_RESULTS=false]
    #[arg(long)]
    pub no_publish: bool,

    /// Artifact file prefix [env: TEST_OUTPUT_FILE_PREFIX]
    #[arg(long)]
    pub output_prefix: Option<String>,

    /// Directory for report artifacts and the real-time point file
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_humantime_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m 30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(2 * 60 * 60)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn cli_parses_run_flags() {
        let parsed = Cli::try_parse_from([
            "execload",
            "run",
            "--rate",
            "5",
            "--duration",
            "10s",
            "--scenario",
            "ramping",
            "--run-id",
            "R1",
            "--sink-url",
            "http://a/x",
            "--sink-url",
            "http://b/y",
            "--env",
            "LOCATION=westus",
            "--env",
            "EMPTY=",
            "--no-publish",
            "--out-dir",
            "target/perf",
            "--output",
            "json",
            "--log-format",
            "json",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };
        assert_eq!(cli.log_format, LogFormat::Json);

        match cli.command {
            Command::Run(args) => {
                let w = &args.workload;
                assert_eq!(w.rate, Some(5));
                assert_eq!(w.duration, Some(Duration::from_secs(10)));
                assert_eq!(w.scenario.as_deref(), Some("ramping"));
                assert_eq!(w.run_id.as_deref(), Some("R1"));
                assert_eq!(w.sink_urls, ["http://a/x", "http://b/y"]);
                assert_eq!(w.env, ["LOCATION=westus", "EMPTY="]);
                assert!(args.no_publish);
                assert_eq!(args.out_dir, Some(PathBuf::from("target/perf")));
                assert_eq!(args.output, OutputFormat::Json);
            }
            Command::Plan(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_parses_plan_defaults() {
        let cli = match Cli::try_parse_from(["execload", "plan"]) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };
        assert_eq!(cli.log_format, LogFormat::Text);

        match cli.command {
            Command::Plan(args) => {
                assert_eq!(args.rate, None);
                assert_eq!(args.duration, None);
                assert!(args.sink_urls.is_empty());
            }
            Command::Run(_) => panic!("expected plan command"),
        }
    }

    #[test]
    fn bad_duration_is_a_parse_error() {
        assert!(Cli::try_parse_from(["execload", "run", "--duration", "10x"]).is_err());
    }
}
