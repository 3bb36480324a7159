#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use devloop::config::Config;
use devloop::engine::{LoopStatus, Orchestrator};
use devloop_test_utils::builders::ConfigBuilder;
use devloop_test_utils::fakes::{RecordingReporter, Reported};
use devloop_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn app_source(log: &Path, version: u32) -> String {
    format!("# v{version}\necho $$ >> \"{}\"\nexec sleep 30\n", log.display())
}

fn recorded_pids(log: &Path) -> Vec<i32> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

async fn wait_for_starts(log: &Path, count: usize) -> Vec<i32> {
    timeout(Duration::from_secs(10), async {
        loop {
            let pids = recorded_pids(log);
            if pids.len() >= count {
                return pids;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("application did not (re)start in time")
}

fn is_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

/// A running loop whose build is a no-op and whose app just sleeps, for
/// checking which changes reach the rebuild queue.
struct Running {
    status: watch::Receiver<LoopStatus>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<devloop::errors::Result<()>>,
}

impl Running {
    async fn start(config: Config) -> Self {
        let orchestrator = Orchestrator::from_config(config, Arc::new(RecordingReporter::new()));
        let mut status = orchestrator.status();
        let (stop, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(orchestrator.run_until(async move {
            let _ = stop_rx.await;
        }));
        timeout(Duration::from_secs(5), status.wait_for(|s| s.cycles >= 1))
            .await
            .expect("startup build did not finish")
            .expect("status channel closed");
        Self {
            status,
            stop,
            handle,
        }
    }

    async fn rebuilt(&mut self, cycles: u64) -> bool {
        timeout(Duration::from_secs(5), self.status.wait_for(|s| s.cycles >= cycles))
            .await
            .is_ok_and(|changed| changed.is_ok())
    }

    async fn stop(self) -> TestResult {
        let _ = self.stop.send(());
        timeout(Duration::from_secs(5), self.handle).await???;
        Ok(())
    }
}

fn quiet_config(root: &Path) -> ConfigBuilder {
    ConfigBuilder::in_dir(root)
        .build_cmd("true")
        .bin("sleep 30")
        .debounce_ms(50)
        .grace_period_ms(1000)
}

/// Real notify backend, real shell build, real child processes.
#[tokio::test]
async fn edits_rebuild_and_restart_the_app() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    let log = root.join(".devloop/starts.log");
    fs::create_dir_all(root.join("tests"))?;
    fs::write(root.join("main.sh"), app_source(&log, 1))?;
    fs::write(root.join("README.md"), "docs")?;

    let artifact = root.join(".devloop/tmp/app.sh");
    let config = ConfigBuilder::in_dir(&root)
        .build_cmd("cp main.sh .devloop/tmp/app.sh")
        .bin(&format!("sh {}", artifact.display()))
        .extensions(&[".sh"])
        .debounce_ms(50)
        .grace_period_ms(2000)
        .build();

    let reporter = Arc::new(RecordingReporter::new());
    let orchestrator = Orchestrator::from_config(config, reporter.clone());
    let mut status = orchestrator.status();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(orchestrator.run_until(async move {
        let _ = stop_rx.await;
    }));

    let first = wait_for_starts(&log, 1).await[0];
    assert!(is_alive(first));

    // A qualifying edit rebuilds and replaces the running generation.
    fs::write(root.join("main.sh"), app_source(&log, 2))?;
    let pids = wait_for_starts(&log, 2).await;
    let second = pids[1];
    timeout(Duration::from_secs(5), status.wait_for(|s| s.cycles >= 2)).await??;
    assert!(!is_alive(first));
    assert!(is_alive(second));
    assert!(fs::read_to_string(&artifact)?.contains("# v2"));

    // Non-qualifying edits leave it alone.
    fs::write(root.join("README.md"), "more docs")?;
    fs::write(root.join("tests/helper.sh"), "true")?;
    sleep(Duration::from_millis(500)).await;
    assert_eq!(recorded_pids(&log).len(), 2);
    assert_eq!(status.borrow().cycles, 2);

    let _ = stop_tx.send(());
    timeout(Duration::from_secs(5), handle).await???;
    assert!(!is_alive(second));
    assert_eq!(reporter.count(&Reported::Restarted), 2);
    assert_eq!(reporter.events().last(), Some(&Reported::Stopped));
    Ok(())
}

#[tokio::test]
async fn recreated_directory_is_watched_again() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    let pkg = root.join("pkg");
    fs::create_dir_all(&pkg)?;
    fs::write(pkg.join("a.go"), "package pkg")?;

    let mut running = Running::start(quiet_config(&root).build()).await;

    fs::write(pkg.join("a.go"), "package pkg // edited")?;
    assert!(running.rebuilt(2).await);

    // What a branch switch or a code generator does.
    fs::remove_dir_all(&pkg)?;
    sleep(Duration::from_millis(200)).await;
    fs::create_dir_all(&pkg)?;
    sleep(Duration::from_millis(300)).await;
    fs::write(pkg.join("b.go"), "package pkg")?;
    assert!(running.rebuilt(3).await, "edit in recreated directory ignored");

    running.stop().await
}

#[tokio::test]
async fn atomic_save_triggers_a_rebuild() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let base = dir.path().canonicalize()?;
    let root = base.join("proj");
    let staging = base.join("staging");
    fs::create_dir_all(&root)?;
    fs::create_dir_all(&staging)?;
    fs::write(root.join("main.go"), "package main")?;

    let mut running = Running::start(quiet_config(&root).build()).await;

    // Write elsewhere, then rename over the original.
    let tmp = staging.join("main.go.tmp");
    fs::write(&tmp, "package main // saved")?;
    fs::rename(&tmp, root.join("main.go"))?;
    assert!(running.rebuilt(2).await, "atomic save ignored");

    running.stop().await
}

#[tokio::test]
async fn polling_backend_sees_edits_and_new_files() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    fs::create_dir_all(root.join("cmd"))?;
    fs::write(root.join("cmd/main.go"), "package main")?;

    let config = quiet_config(&root).poll_interval_ms(50).build();
    let mut running = Running::start(config).await;

    // Let the first scan settle before changing anything.
    sleep(Duration::from_millis(200)).await;
    fs::write(root.join("cmd/main.go"), "package main // edited")?;
    assert!(running.rebuilt(2).await, "edit not seen by polling backend");

    sleep(Duration::from_millis(200)).await;
    fs::write(root.join("cmd/extra.go"), "package main")?;
    assert!(running.rebuilt(3).await, "new file not seen by polling backend");

    // Files outside the allow-list are still filtered.
    fs::write(root.join("notes.txt"), "todo")?;
    sleep(Duration::from_millis(400)).await;
    assert_eq!(running.status.borrow().cycles, 3);

    running.stop().await
}
