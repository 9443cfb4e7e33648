//! # statuslined
//!
//! A status line daemon for X window managers.
//!
//! Several independent modules (clock, backlight brightness, mixer volume,
//! keyboard layout) each render their own text segment; the segments are
//! concatenated in configuration order and published as the root window's
//! `WM_NAME`, which window managers like dwm display as their status bar.
//!
//! ## Architecture
//!
//! - [`SystemCoordinator`](coordinator::SystemCoordinator): lifecycle
//!   manager for startup, signal handling, and shutdown
//! - [`StatusLine`](status_line::StatusLine): the shared slot buffer and
//!   its recompute/publish protocol
//! - [`ModuleSource`](sources::ModuleSource): the per-module sensor
//!   boundary, one worker task each
//! - [`template`]: exact-length token substitution for module formats
//!
//! Each module runs on its own task and suspends in a multiplexed wait over
//! its sensor's change notification and the shared cancellation token; a
//! delivered SIGINT/SIGTERM broadcasts cancellation, all workers are joined,
//! and the display is cleared.
//!
//! ## Example
//!
//! ```no_run
//! use statuslined::{application::Application, config::ConfigManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config_manager = ConfigManager::load(None)?;
//!     Application::builder()
//!         .with_config_manager(config_manager)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod abort;
pub mod application;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod sink;
pub mod sources;
pub mod status_line;
pub mod task_manager;
pub mod template;
pub mod worker;
