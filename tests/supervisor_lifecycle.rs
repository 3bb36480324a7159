#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};

use devloop::exec::ProcessSupervisor;
use devloop_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

/// App that ignores the graceful interrupt and records its pid.
const STUBBORN_APP: &str = "trap '' INT\necho $$ >> \"$1\"\nexec sleep 30\n";

/// App that exits promptly on interrupt and records its pid.
const POLITE_APP: &str = "echo $$ >> \"$1\"\nexec sleep 30\n";

struct App {
    _dir: tempfile::TempDir,
    pids: PathBuf,
    artifact: String,
}

fn app(script: &str) -> Result<App, Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let script_path = dir.path().join("app.sh");
    fs::write(&script_path, script)?;
    let pids = dir.path().join("pids");
    let artifact = format!("sh {} {}", script_path.display(), pids.display());
    Ok(App {
        _dir: dir,
        pids,
        artifact,
    })
}

fn recorded_pids(path: &Path) -> Vec<i32> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

async fn wait_for_pids(path: &Path, count: usize) -> Vec<i32> {
    timeout(Duration::from_secs(5), async {
        loop {
            let pids = recorded_pids(path);
            if pids.len() >= count {
                return pids;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("app never recorded its pid")
}

fn is_alive(pid: i32) -> bool {
    // Signal 0 only checks existence; reaped children are gone.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[tokio::test]
async fn stubborn_app_is_killed_before_next_generation_starts() -> TestResult {
    init_tracing();
    let app = app(STUBBORN_APP)?;
    let grace = Duration::from_millis(300);
    let supervisor = ProcessSupervisor::new(grace);

    supervisor.restart_process(&app.artifact).await?;
    let first = wait_for_pids(&app.pids, 1).await[0];
    assert!(is_alive(first));

    let started = Instant::now();
    supervisor.restart_process(&app.artifact).await?;
    let elapsed = started.elapsed();

    // The old generation was interrupted, ignored it, and was killed only
    // after the grace period; by the time restart returns it is reaped.
    assert!(elapsed >= grace, "restart returned after {elapsed:?}");
    assert!(!is_alive(first));

    let pids = wait_for_pids(&app.pids, 2).await;
    let second = pids[1];
    assert_ne!(first, second);
    assert_eq!(supervisor.current_pid().await, Some(second as u32));

    supervisor.stop_process().await;
    assert!(!is_alive(second));
    assert_eq!(supervisor.current_pid().await, None);
    Ok(())
}

#[tokio::test]
async fn polite_app_stops_well_within_grace() -> TestResult {
    init_tracing();
    let app = app(POLITE_APP)?;
    let supervisor = ProcessSupervisor::new(Duration::from_secs(5));

    supervisor.restart_process(&app.artifact).await?;
    let pid = wait_for_pids(&app.pids, 1).await[0];

    let started = Instant::now();
    supervisor.stop_process().await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!is_alive(pid));
    Ok(())
}

#[tokio::test]
async fn stop_is_bounded_and_idempotent() -> TestResult {
    init_tracing();
    let app = app(STUBBORN_APP)?;
    let supervisor = ProcessSupervisor::new(Duration::from_millis(200));

    supervisor.restart_process(&app.artifact).await?;
    let pid = wait_for_pids(&app.pids, 1).await[0];

    timeout(Duration::from_secs(3), supervisor.stop_process()).await?;
    timeout(Duration::from_secs(1), supervisor.stop_process()).await?;
    assert!(!is_alive(pid));
    Ok(())
}

#[tokio::test]
async fn concurrent_restarts_leave_one_live_child() -> TestResult {
    init_tracing();
    let app = app(POLITE_APP)?;
    let supervisor = ProcessSupervisor::new(Duration::from_secs(2));

    let (a, b, c) = tokio::join!(
        supervisor.restart_process(&app.artifact),
        supervisor.restart_process(&app.artifact),
        supervisor.restart_process(&app.artifact),
    );
    a?;
    b?;
    c?;

    let current = supervisor
        .current_pid()
        .await
        .expect("one generation should be running") as i32;
    // Earlier generations may have been interrupted before recording
    // themselves; the survivor always gets there.
    let pids = timeout(Duration::from_secs(5), async {
        loop {
            let pids = recorded_pids(&app.pids);
            if pids.contains(&current) {
                return pids;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    let alive: Vec<i32> = pids.iter().copied().filter(|pid| is_alive(*pid)).collect();
    assert_eq!(alive, vec![current], "recorded: {pids:?}");

    supervisor.stop_process().await;
    assert!(pids.iter().all(|pid| !is_alive(*pid)));
    Ok(())
}

#[tokio::test]
async fn start_failure_keeps_the_slot_empty() -> TestResult {
    init_tracing();
    let app = app(POLITE_APP)?;
    let supervisor = ProcessSupervisor::new(Duration::from_secs(2));

    supervisor.restart_process(&app.artifact).await?;
    let pid = wait_for_pids(&app.pids, 1).await[0];

    let err = supervisor
        .restart_process("/nonexistent/devloop/app")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("/nonexistent/devloop/app"));

    // The previous generation was stopped before the failed start.
    assert!(!is_alive(pid));
    assert_eq!(supervisor.current_pid().await, None);
    Ok(())
}
