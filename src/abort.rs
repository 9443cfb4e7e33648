//! Interrupt-to-cancellation bridge.
//!
//! Signal handlers may only write a flag, so termination is split in two:
//! a level-triggered atomic set from the handler context, and an
//! [`event_listener::Event`] that ordinary code waits on. A watcher thread
//! converts the delivered signal into the notification; the async side
//! re-checks the flag on every wakeup, so a spurious notification is waited
//! out rather than treated as termination.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use event_listener::Event;
use log::debug;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};

use crate::error::Error;

pub struct AbortSignal {
    flag: Arc<AtomicBool>,
    event: Arc<Event>,
}

impl AbortSignal {
    /// Registers SIGINT/SIGTERM handling and starts the watcher thread.
    ///
    /// The registered handler performs nothing but the flag write; the
    /// watcher thread does the notification from ordinary thread context.
    pub fn install() -> Result<Self, Error> {
        let flag = Arc::new(AtomicBool::new(false));
        let event = Arc::new(Event::new());

        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, flag.clone()).map_err(Error::SignalSetup)?;
        }

        let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(Error::SignalSetup)?;

        let watcher_flag = flag.clone();
        let watcher_event = event.clone();

        std::thread::Builder::new()
            .name("signal-watcher".into())
            .spawn(move || {
                // forever() retries interrupted syscalls internally, so the
                // first yielded item is a real delivery.
                if let Some(signal) = signals.forever().next() {
                    debug!("signal {signal} received, requesting termination");
                    watcher_flag.store(true, Ordering::SeqCst);
                    watcher_event.notify(usize::MAX);
                }
            })
            .map_err(Error::SignalSetup)?;

        Ok(Self { flag, event })
    }

    /// Requests termination from ordinary code, as if a signal had arrived.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.event.notify(usize::MAX);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once termination has been requested.
    ///
    /// The listener is armed before the flag is checked, so a request
    /// arriving between check and wait is never lost.
    pub async fn wait(&self) {
        loop {
            let listener = self.event.listen();

            if self.flag.load(Ordering::SeqCst) {
                return;
            }

            listener.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    #[serial]
    async fn trigger_wakes_a_pending_wait() {
        let abort = Arc::new(AbortSignal::install().unwrap());
        assert!(!abort.is_aborted());

        let waiter = {
            let abort = abort.clone();
            tokio::spawn(async move { abort.wait().await })
        };

        abort.trigger();

        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait did not wake")
            .unwrap();
        assert!(abort.is_aborted());
    }

    #[tokio::test]
    #[serial]
    async fn wait_returns_immediately_when_already_aborted() {
        let abort = AbortSignal::install().unwrap();
        abort.trigger();

        timeout(Duration::from_millis(100), abort.wait())
            .await
            .expect("wait should not block after abort");
    }

    #[tokio::test]
    #[serial]
    async fn delivered_signal_sets_the_flag_and_wakes() {
        let abort = AbortSignal::install().unwrap();

        signal_hook::low_level::raise(SIGTERM).unwrap();

        timeout(Duration::from_secs(2), abort.wait())
            .await
            .expect("signal did not wake the waiter");
        assert!(abort.is_aborted());
    }
}
