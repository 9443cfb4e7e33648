//! System coordinator for the daemon lifecycle.
//!
//! Owns the abort signal, the worker tasks, and the shared status line.
//! Startup is all-or-nothing: every module source must construct before the
//! first worker is spawned. Shutdown is broadcast-then-join, followed by a
//! final clear of the display.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    abort::AbortSignal,
    config::{ConfigManager, SinkCfg},
    sink::{Sink, StdoutSink, X11Sink},
    sources::{self, ModuleSource},
    status_line::StatusLine,
    task_manager::TaskManager,
    worker,
};

pub struct SystemCoordinator {
    task_manager: TaskManager,
    abort: Option<AbortSignal>,
    status_line: Option<Arc<StatusLine>>,
    pending_workers: Vec<PendingWorker>,
}

struct PendingWorker {
    name: String,
    source: Box<dyn ModuleSource>,
}

impl Default for SystemCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCoordinator {
    pub fn new() -> Self {
        Self {
            task_manager: TaskManager::new(),
            abort: None,
            status_line: None,
            pending_workers: Vec::new(),
        }
    }

    /// Installs signal handling and constructs the sink and every module
    /// source.
    ///
    /// Any failure here aborts startup before a single worker task exists;
    /// nothing has been published yet at that point.
    pub fn initialize(&mut self, config_manager: &ConfigManager) -> Result<()> {
        info!("Initializing coordinator...");

        self.abort = Some(AbortSignal::install().context("failed to set up signal handling")?);

        let config = config_manager.get();

        let sink = build_sink(&config.sink).context("failed to initialize sink")?;
        self.status_line = Some(Arc::new(StatusLine::new(config.modules.len(), sink)));

        let mut pending = Vec::with_capacity(config.modules.len());

        for (index, module) in config.modules.iter().enumerate() {
            let source = sources::build_source(module)
                .with_context(|| format!("failed to initialize module '{}'", module.key()))?;

            pending.push(PendingWorker {
                name: format!("{}-{index}", module.key()),
                source,
            });
        }

        self.pending_workers = pending;

        info!("Coordinator initialized with {} modules", self.pending_workers.len());
        Ok(())
    }

    /// Spawns one worker task per initialized module, in declaration order.
    pub fn start_all_workers(&mut self) -> Result<()> {
        let status_line = self
            .status_line
            .clone()
            .context("coordinator not initialized")?;

        for (slot_index, PendingWorker { name, source }) in
            self.pending_workers.drain(..).enumerate()
        {
            let status_line = status_line.clone();

            self.task_manager.spawn_worker(name, move |cancel| {
                worker::run_worker(slot_index, source, status_line, cancel)
            });
        }

        Ok(())
    }

    /// Blocks until termination is requested, then shuts everything down.
    ///
    /// The abort wait re-checks its flag on every wakeup, so a spurious
    /// notification never tears the daemon down.
    pub async fn run_main_loop(&mut self) -> Result<()> {
        let abort = self.abort.as_ref().context("coordinator not initialized")?;

        info!("Entering main loop");
        abort.wait().await;

        info!("Termination requested, shutting down...");
        self.shutdown().await
    }

    /// Requests termination as if an interrupt signal had been delivered.
    pub fn request_shutdown(&self) {
        if let Some(abort) = &self.abort {
            abort.trigger();
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.task_manager
            .shutdown_all()
            .await
            .context("failed to stop workers")?;

        // The display keeps showing the last value on its own; publish an
        // empty line so the shutdown is visible.
        if let Some(status_line) = &self.status_line {
            if let Err(e) = status_line.clear() {
                warn!("failed to clear display on shutdown: {e}");
            }
        }

        info!("Shutdown complete");
        Ok(())
    }
}

fn build_sink(cfg: &SinkCfg) -> Result<Box<dyn Sink>> {
    match cfg {
        SinkCfg::X11 => Ok(Box::new(X11Sink::connect()?)),
        SinkCfg::Stdout => Ok(Box::new(StdoutSink)),
    }
}
