// src/engine/runtime.rs

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use notify::Event;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{DevloopError, Result};
use crate::exec::{ACTIVE_ENV_VAR, Builder, CommandBuilder, ProcessSupervisor, Supervisor};
use crate::fs::{FileSystem, RealFileSystem};
use crate::report::Reporter;
use crate::types::{WatchEvent, WatchEventKind};
use crate::watch::{
    DirectoryWatcher, EventFilter, FileSystemWatcher, WatchStreams, create_backend,
};

use super::core::{LoopStatus, Phase, RebuildCycle};
use super::debounce::Debouncer;
use super::queue;

/// Top-level watch, debounce, build, supervise loop.
///
/// The notification path (this struct's `select!` loop) never waits on a
/// build: qualifying events only re-arm the [`Debouncer`], and a separate
/// consumer task drains the capacity-1 rebuild queue one cycle at a time.
pub struct Orchestrator<B, S> {
    config: Arc<Config>,
    builder: Arc<B>,
    supervisor: Arc<S>,
    reporter: Arc<dyn Reporter>,
    fs: Arc<dyn FileSystem>,
    status: watch::Sender<LoopStatus>,
}

impl<B, S> fmt::Debug for Orchestrator<B, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl Orchestrator<CommandBuilder, ProcessSupervisor> {
    /// Production wiring: shell build command, real processes, real disk.
    pub fn from_config(config: Config, reporter: Arc<dyn Reporter>) -> Self {
        let builder = CommandBuilder::from_config(&config, reporter.clone());
        let supervisor = ProcessSupervisor::new(config.grace_period());
        Self::new(
            config,
            Arc::new(builder),
            Arc::new(supervisor),
            reporter,
            Arc::new(RealFileSystem),
        )
    }
}

impl<B, S> Orchestrator<B, S>
where
    B: Builder + 'static,
    S: Supervisor + 'static,
{
    pub fn new(
        config: Config,
        builder: Arc<B>,
        supervisor: Arc<S>,
        reporter: Arc<dyn Reporter>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let (status, _) = watch::channel(LoopStatus::default());
        Self {
            config: Arc::new(config),
            builder,
            supervisor,
            reporter,
            fs,
            status,
        }
    }

    /// Observe phase changes and finished cycles.
    pub fn status(&self) -> watch::Receiver<LoopStatus> {
        self.status.subscribe()
    }

    /// Run until Ctrl+C / SIGTERM.
    pub async fn start(self) -> Result<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Run with the configured notification backend until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        ensure_not_nested()?;
        let (backend, streams) = create_backend(&self.config)?;
        self.run_with(backend, streams, shutdown).await
    }

    /// Run against an explicit backend. Returns after `shutdown` resolves (or
    /// the backend's event stream ends) and the application has been stopped.
    ///
    /// Fails only during startup: nested invocation, an artifact directory
    /// that cannot be created, or no directory that could be watched.
    pub async fn run_with<F>(
        self,
        backend: Box<dyn FileSystemWatcher>,
        mut streams: WatchStreams,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        ensure_not_nested()?;

        self.fs
            .create_dir_all(self.config.tmp_dir())
            .map_err(DevloopError::Other)?;

        let filter = EventFilter::new(&self.config);
        let mut watcher = DirectoryWatcher::new(
            backend,
            self.fs.clone(),
            filter.clone(),
            self.reporter.clone(),
        );
        self.subscribe_all(&mut watcher)?;

        self.reporter.banner(&self.config);

        let (trigger, mut rebuilds) = queue::channel();
        // The startup build goes through the queue like any other, so the
        // loop below is already listening while it runs.
        trigger.request();

        let cycle = RebuildCycle::new(
            self.builder.clone(),
            self.supervisor.clone(),
            self.reporter.clone(),
            self.config.bin(),
            self.status.clone(),
        );
        let consumer = tokio::spawn(async move {
            while rebuilds.next().await.is_some() {
                cycle.run().await;
            }
        });

        let debouncer = Debouncer::new(self.config.debounce(), trigger);

        tokio::pin!(shutdown);
        let mut errors_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                event = streams.events.recv() => match event {
                    Some(event) => self.on_event(&mut watcher, &filter, &debouncer, event),
                    None => {
                        warn!("watch backend closed its event stream; stopping");
                        break;
                    }
                },
                err = streams.errors.recv(), if errors_open => match err {
                    Some(err) => warn!(error = %err, paths = ?err.paths, "file watch error"),
                    None => errors_open = false,
                },
            }
        }

        debouncer.cancel();
        self.reporter.stopping();

        // No new cycle may start once we begin stopping the application.
        consumer.abort();
        if let Err(err) = consumer.await {
            if !err.is_cancelled() {
                warn!(error = %err, "rebuild consumer failed");
            }
        }

        self.supervisor.stop().await;
        self.status.send_modify(|status| status.phase = Phase::Stopped);
        self.reporter.stopped();
        info!("devloop stopped");
        Ok(())
    }

    fn subscribe_all(&self, watcher: &mut DirectoryWatcher) -> Result<()> {
        for dir in self.config.watch_dirs() {
            let dir = self.fs.canonicalize(dir).unwrap_or_else(|_| dir.clone());
            let added = watcher.add_recursive(&dir);
            debug!(path = ?dir, added, "subscribed watch root");
        }

        if watcher.watched_count() == 0 {
            let dirs: Vec<String> = self
                .config
                .watch_dirs()
                .iter()
                .map(|d| d.display().to_string())
                .collect();
            return Err(DevloopError::NoSubscriptions(dirs.join(", ")));
        }

        info!(directories = watcher.watched_count(), "watching for changes");
        Ok(())
    }

    fn on_event(
        &self,
        watcher: &mut DirectoryWatcher,
        filter: &EventFilter,
        debouncer: &Debouncer,
        event: Event,
    ) {
        for event in WatchEvent::from_notify(&event) {
            match event.kind {
                // Created or moved in; resubscribes a recreated directory.
                WatchEventKind::Create if self.fs.is_dir(&event.path) => {
                    let added = watcher.add_recursive(&event.path);
                    debug!(path = ?event.path, added, "new directory");
                    continue;
                }
                WatchEventKind::Other => {
                    watcher.forget_removed(&event.path);
                }
                _ => {}
            }

            if filter.should_handle(&event) {
                debug!(path = ?event.path, kind = ?event.kind, "change detected");
                debouncer.notify();
            }
        }
    }
}

/// Refuse to run inside a process that devloop itself started.
pub fn ensure_not_nested() -> Result<()> {
    if std::env::var_os(ACTIVE_ENV_VAR).is_some() {
        return Err(DevloopError::NestedSupervision(ACTIVE_ENV_VAR));
    }
    Ok(())
}

/// Resolves on Ctrl+C or (on unix) SIGTERM, whichever comes first.
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
