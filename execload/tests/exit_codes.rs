use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::Context as _;
use execload_testserver::{Behavior, TestServer};

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn describe(out: &Output) -> String {
    format!(
        "exit code {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

async fn run_against(server: &TestServer, out_dir: PathBuf, args: &[&str]) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_execload");
    let base_url = server.base_url().to_string();
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();

    tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .args(&args)
            .arg("--target-url")
            .arg(&base_url)
            .arg("--out-dir")
            .arg(&out_dir)
            .env_remove("RUST_LOG")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run execload binary")
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_execload");

    let out = Command::new(exe)
        .arg("run")
        .arg("--duration")
        .arg("10x")
        .output()
        .context("run execload binary")?;

    anyhow::ensure!(status_code(out.status) == 30, "expected 30, {}", describe(&out));
    Ok(())
}

#[test]
fn invalid_environment_exits_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_execload");

    let out = Command::new(exe)
        .arg("plan")
        .arg("--env")
        .arg("SCENARIO=burst")
        .output()
        .context("run execload binary")?;

    anyhow::ensure!(status_code(out.status) == 30, "expected 30, {}", describe(&out));
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("unknown scenario `burst`"),
        "{}",
        describe(&out)
    );
    Ok(())
}

#[test]
fn plan_prints_the_resolved_scenario() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_execload");

    let out = Command::new(exe)
        .args(["plan", "--scenario", "constant", "--rate", "5", "--duration", "10s"])
        .output()
        .context("run execload binary")?;

    anyhow::ensure!(status_code(out.status) == 0, "expected 0, {}", describe(&out));
    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).context("plan json")?;
    anyhow::ensure!(
        doc["scenario"]["executor"] == "constant-arrival-rate",
        "{doc}"
    );
    anyhow::ensure!(doc["scenario"]["preallocated_vus"] == 25, "{doc}");
    Ok(())
}

#[tokio::test]
async fn passing_run_exits_0() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;

    let out = run_against(
        &server,
        dir.path().to_path_buf(),
        &[
            "--scenario",
            "fixed",
            "--rate",
            "2",
            "--duration",
            "1s",
            "--run-id",
            "E0",
            "--output",
            "json",
        ],
    )
    .await?;

    let sessions = server.stats().sessions();
    server.shutdown().await;

    anyhow::ensure!(status_code(out.status) == 0, "expected 0, {}", describe(&out));
    anyhow::ensure!(sessions.len() == 2, "sessions: {sessions:?}");

    let stdout = String::from_utf8_lossy(&out.stdout);
    let last = stdout.lines().last().context("no summary line")?;
    let summary: serde_json::Value = serde_json::from_str(last).context("summary json")?;
    anyhow::ensure!(summary["kind"] == "summary", "{summary}");
    anyhow::ensure!(summary["checks_failed"] == 0, "{summary}");
    anyhow::ensure!(summary["summary"]["RunID"] == "E0", "{summary}");
    anyhow::ensure!(dir.path().join("perf_results.xml").is_file(), "junit missing");
    Ok(())
}

#[tokio::test]
async fn checks_failed_exit_10() -> anyhow::Result<()> {
    let server = TestServer::start_with(Behavior::failing_execute(503))
        .await
        .context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;

    let out = run_against(
        &server,
        dir.path().to_path_buf(),
        &["--scenario", "fixed", "--rate", "1", "--duration", "1s"],
    )
    .await?;

    let summaries = server.stats().summaries();
    server.shutdown().await;

    anyhow::ensure!(status_code(out.status) == 10, "expected 10, {}", describe(&out));
    // The failed run still publishes and writes its artifacts.
    anyhow::ensure!(summaries.len() == 1, "summaries: {summaries:?}");
    anyhow::ensure!(dir.path().join("perf_report.html").is_file(), "html missing");
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("check failed"),
        "{}",
        describe(&out)
    );
    Ok(())
}

#[tokio::test]
async fn failing_sink_still_exits_0() -> anyhow::Result<()> {
    let server = TestServer::start_with(Behavior::failing_sink(500))
        .await
        .context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;

    let out = run_against(
        &server,
        dir.path().to_path_buf(),
        &["--scenario", "fixed", "--rate", "1", "--duration", "1s"],
    )
    .await?;
    server.shutdown().await;

    anyhow::ensure!(status_code(out.status) == 0, "expected 0, {}", describe(&out));
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("publish"),
        "{}",
        describe(&out)
    );
    Ok(())
}
