use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context as _;
use execload_core::{EnvVars, Overrides, WorkloadConfig};

use crate::cli::{RunArgs, WorkloadArgs};
use crate::run_error::RunError;

pub(crate) fn merged_env(overrides: &[String]) -> anyhow::Result<EnvVars> {
    let mut map: BTreeMap<String, String> = execload_core::process_env_snapshot()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for raw in overrides {
        let (k, v) = parse_env_override(raw)?;
        map.insert(k, v);
    }

    let vars: Vec<(Arc<str>, Arc<str>)> = map
        .into_iter()
        .map(|(k, v)| (Arc::<str>::from(k), Arc::<str>::from(v)))
        .collect();

    Ok(Arc::from(vars.into_boxed_slice()))
}

fn parse_env_override(s: &str) -> anyhow::Result<(String, String)> {
    let (k, v) = s
        .split_once('=')
        .with_context(|| format!("invalid --env (expected KEY=VALUE): {s}"))?;
    if k.is_empty() {
        anyhow::bail!("invalid --env (empty KEY): {s}");
    }
    Ok((k.to_string(), v.to_string()))
}

pub(crate) fn workload_overrides(args: &WorkloadArgs) -> Overrides {
    Overrides {
        rate: args.rate,
        duration: args.duration,
        scenario: args.scenario.clone(),
        location: args.location.clone(),
        run_id: args.run_id.clone(),
        test_start_time: args.test_start_time.clone(),
        preallocated_vus: args.preallocated_vus,
        target_url: args.target_url.clone(),
        sink_urls: args.sink_urls.clone(),
        real_time_url: args.real_time_url.clone(),
        request_timeout: args.request_timeout,
        ..Overrides::default()
    }
}

pub(crate) fn run_overrides(args: &RunArgs) -> Overrides {
    Overrides {
        no_publish: args.no_publish,
        output_prefix: args.output_prefix.clone(),
        out_dir: args.out_dir.clone(),
        ..workload_overrides(&args.workload)
    }
}

/// Merges the environment with `--env` pairs and resolves the run configuration.
pub(crate) fn resolve_config(
    env_overrides: &[String],
    overrides: &Overrides,
) -> Result<WorkloadConfig, RunError> {
    let env = merged_env(env_overrides).map_err(RunError::InvalidInput)?;
    WorkloadConfig::resolve(&env, overrides).map_err(|e| {
        RunError::InvalidInput(anyhow::Error::new(e).context("invalid configuration"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn env_override_splits_on_first_equals() {
        let (k, v) = parse_env_override("A=b=c").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(k, "A");
        assert_eq!(v, "b=c");

        let (k, v) = parse_env_override("EMPTY=").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(k, "EMPTY");
        assert_eq!(v, "");
    }

    #[test]
    fn env_override_rejects_missing_key_or_separator() {
        assert!(parse_env_override("NOVALUE").is_err());
        assert!(parse_env_override("=x").is_err());
    }

    #[test]
    fn env_pairs_override_the_process_env() {
        let env = merged_env(&["EXECLOAD_TEST_ONLY=1".to_string()])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(
            env.iter()
                .any(|(k, v)| &**k == "EXECLOAD_TEST_ONLY" && &**v == "1")
        );
    }

    #[test]
    fn cli_flags_win_over_env_pairs() {
        let args = WorkloadArgs {
            rate: Some(7),
            duration: Some(Duration::from_secs(3)),
            scenario: None,
            location: None,
            run_id: None,
            test_start_time: None,
            preallocated_vus: None,
            target_url: None,
            sink_urls: Vec::new(),
            real_time_url: None,
            request_timeout: None,
            env: Vec::new(),
        };
        let cfg = resolve_config(
            &["RATE=2".to_string(), "RUN_ID=from-env".to_string()],
            &workload_overrides(&args),
        )
        .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(cfg.target_rate, 7);
        assert_eq!(cfg.duration, Duration::from_secs(3));
        assert_eq!(cfg.run_id, "from-env");
    }

    #[test]
    fn invalid_configuration_is_invalid_input() {
        let err = resolve_config(&["SCENARIO=burst".to_string()], &Overrides::default())
            .err()
            .unwrap_or_else(|| panic!("expected an error"));
        assert!(matches!(err, RunError::InvalidInput(_)));
    }
}
