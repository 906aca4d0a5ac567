//! Integration test: real subprocess engines driven through `JobRunner`.
//!
//! The engine is stood in for by small shell scripts that honour the same
//! command line as the real one: `/<mode> /<dataset> /<input> /<output>`,
//! with paths relative to the install directory.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use climgate_core::Location;
use climgate_executor::{
    EngineInstall, EngineRegistry, ExecutorError, JobOutput, JobRequest, JobRunner, ProcessEngine,
    TimeoutPolicy,
};

const COPY_ENGINE: &str = "#!/bin/sh\ncp \"${3#/}\" \"${4#/}\"\n";
const FAILING_ENGINE: &str = "#!/bin/sh\necho \"cannot open normal file ${2#/}\" >&2\nexit 2\n";
const HANGING_ENGINE: &str = "#!/bin/sh\necho $$ > \"$PWD/engine.pid\"\nexec sleep 30\n";

fn install(script: &str) -> (tempfile::TempDir, JobRunner<ProcessEngine>) {
    let dir = match tempfile::tempdir() {
        Ok(d) => d,
        Err(e) => panic!("tempdir: {e}"),
    };
    let program = dir.path().join("engine.sh");
    if let Err(e) = std::fs::write(&program, script) {
        panic!("write script: {e}");
    }
    if let Err(e) = std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)) {
        panic!("chmod script: {e}");
    }
    let registry = EngineRegistry::new().with("na", EngineInstall::new(dir.path(), "engine.sh"));
    (dir, JobRunner::new(ProcessEngine::new(), registry))
}

fn request() -> JobRequest {
    JobRequest {
        locations: vec![
            Location::new("1", "a", 49.2, -123.1, 70.0),
            Location::new("2", "b", 53.9, -122.7, 690.0),
        ],
        ..JobRequest::default()
    }
}

/// Freshly written scripts can briefly fail with ETXTBSY while another test
/// thread is forking.
async fn execute(runner: &JobRunner<ProcessEngine>, job: &JobRequest) -> Result<JobOutput, ExecutorError> {
    let mut attempts = 0;
    loop {
        match runner.execute("na", job).await {
            Err(ExecutorError::SpawnFailed { reason, .. })
                if reason.contains("busy") && attempts < 5 =>
            {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            other => return other,
        }
    }
}

fn queries_left(install_dir: &Path) -> usize {
    match std::fs::read_dir(install_dir.join("api").join("queries")) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

#[tokio::test]
async fn copy_engine_round_trips_input_and_is_deterministic() {
    let (dir, runner) = install(COPY_ENGINE);
    let job = request();

    let mut hashes = Vec::with_capacity(3);
    for run in 1..=3u32 {
        let output = match execute(&runner, &job).await {
            Ok(o) => o,
            Err(e) => panic!("run {run} failed: {e}"),
        };
        assert_eq!(
            output.bytes,
            b"id1,id2,lat,long,elev\r\n1,a,49.2,-123.1,70\r\n2,b,53.9,-122.7,690\r\n"
        );
        hashes.push(output.output_hash);
    }

    assert!(hashes.windows(2).all(|w| w[0] == w[1]), "same input must hash the same: {hashes:?}");
    assert_eq!(queries_left(dir.path()), 0, "every workspace must be removed");
}

#[tokio::test]
async fn failing_engine_reports_exit_code_and_stderr() {
    let (dir, runner) = install(FAILING_ENGINE);

    match execute(&runner, &request()).await {
        Err(ExecutorError::EngineFailed { code, stderr, .. }) => {
            assert_eq!(code, Some(2));
            assert!(
                stderr.contains("cannot open normal file Normal_1991_2020.nrm"),
                "stderr must be captured, got {stderr:?}"
            );
        }
        other => panic!("expected EngineFailed, got {other:?}"),
    }
    assert_eq!(queries_left(dir.path()), 0);
}

#[tokio::test]
async fn hanging_engine_is_killed_at_deadline() {
    let (dir, runner) = install(HANGING_ENGINE);
    let runner = runner.with_timeouts(TimeoutPolicy::new(
        Duration::from_millis(300),
        Duration::from_millis(50),
    ));

    let started = std::time::Instant::now();
    match execute(&runner, &request()).await {
        Err(ExecutorError::Timeout { timeout, .. }) => {
            assert_eq!(timeout, Duration::from_millis(400));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "timeout must fire long before the engine would finish"
    );
    assert_eq!(queries_left(dir.path()), 0, "timed out workspace must be removed");

    let pid = match std::fs::read_to_string(dir.path().join("engine.pid")) {
        Ok(p) => p.trim().to_owned(),
        Err(e) => panic!("engine never wrote its pid: {e}"),
    };
    let alive = std::process::Command::new("kill")
        .args(["-0", &pid])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    assert!(!alive, "engine process {pid} must not outlive its deadline");
}

#[tokio::test]
async fn missing_executable_is_spawn_failure() {
    let (dir, _) = install(COPY_ENGINE);
    let registry = EngineRegistry::new().with("na", EngineInstall::new(dir.path(), "absent.exe"));
    let runner = JobRunner::new(ProcessEngine::new(), registry);

    let result = runner.execute("na", &request()).await;
    assert!(matches!(result, Err(ExecutorError::SpawnFailed { .. })), "got {result:?}");
    assert_eq!(queries_left(dir.path()), 0);
}
