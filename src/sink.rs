//! Display sinks receiving the aggregated status text.
//!
//! A sink accepts the full concatenated line on every recompute. Zero-length
//! input means "clear whatever is currently displayed" and must be honored,
//! not skipped.

use std::io::Write;

use log::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, PropMode, Window};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::error::Error;

pub trait Sink: Send + Sync {
    fn publish_text(&self, text: &str) -> Result<(), Error>;
}

/// Publishes the status text as the `WM_NAME` property of the X root window,
/// which window managers such as dwm render as their status area.
pub struct X11Sink {
    connection: RustConnection,
    root: Window,
}

impl X11Sink {
    /// Connects to the display named in `$DISPLAY`.
    pub fn connect() -> Result<Self, Error> {
        let (connection, screen_num) = x11rb::connect(None)
            .map_err(|e| Error::resource(format!("failed to connect to X server: {e}")))?;

        let root = connection.setup().roots[screen_num].root;

        Ok(Self { connection, root })
    }
}

impl Sink for X11Sink {
    fn publish_text(&self, text: &str) -> Result<(), Error> {
        self.connection
            .change_property8(
                PropMode::REPLACE,
                self.root,
                AtomEnum::WM_NAME,
                AtomEnum::STRING,
                text.as_bytes(),
            )
            .map_err(|e| Error::resource(format!("failed to set WM_NAME: {e}")))?;

        self.connection
            .flush()
            .map_err(|e| Error::resource(format!("failed to flush X connection: {e}")))?;

        debug!("published {} bytes to WM_NAME", text.len());

        Ok(())
    }
}

/// Prints one line per publish. Useful in the foreground and for status bars
/// that read their input from a pipe.
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn publish_text(&self, text: &str) -> Result<(), Error> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();

        writeln!(handle, "{text}")
            .and_then(|()| handle.flush())
            .map_err(|e| Error::resource(format!("failed to write status line: {e}")))
    }
}
