//! Keyboard layout module.
//!
//! Queries the XKB extension for the active layout group (name and symbol)
//! and the caps/num/scroll lock indicator states, exposed through the
//! `%name%`, `%symbol%`, `%caps%`, `%num%` and `%scroll%` tokens. Change
//! wakeups are driven by XKB notify events on the X connection socket.

use std::os::fd::{AsRawFd, RawFd};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::warn;
use tokio::io::unix::AsyncFd;
use tokio_util::sync::CancellationToken;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xkb::{self, ConnectionExt as _};
use x11rb::protocol::xproto::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use super::{ModuleSource, Snapshot, WaitOutcome};

const INDICATOR_CAPSLOCK: u32 = 1;
const INDICATOR_NUMLOCK: u32 = 2;
const INDICATOR_SCROLLLOCK: u32 = 4;
const INDICATOR_MASK: u32 = INDICATOR_CAPSLOCK | INDICATOR_NUMLOCK | INDICATOR_SCROLLLOCK;

fn core_kbd() -> xkb::DeviceSpec {
    xkb::ID::USE_CORE_KBD.into()
}

/// The X connection socket, registered with the runtime so event waits are
/// multiplexed with cancellation instead of blocking a thread.
struct StreamFd(RawFd);

impl AsRawFd for StreamFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

pub struct KeyboardSource {
    format: String,
    connection: RustConnection,
    socket: AsyncFd<StreamFd>,
    name: String,
    symbol: String,
    caps: bool,
    num: bool,
    scroll: bool,
}

impl KeyboardSource {
    /// Connects to the display in `$DISPLAY`, enables XKB, and registers for
    /// layout and indicator notifications.
    pub fn connect(format: String) -> Result<Self> {
        let (connection, _screen_num) =
            x11rb::connect(None).context("failed to connect to X server")?;

        let use_extension = connection
            .xkb_use_extension(1, 0)
            .context("failed to query for XKB extension")?
            .reply()
            .context("failed to query for XKB extension")?;

        if !use_extension.supported {
            bail!("XKB extension is not supported by the X server");
        }

        let events = xkb::EventType::NEW_KEYBOARD_NOTIFY
            | xkb::EventType::STATE_NOTIFY
            | xkb::EventType::INDICATOR_STATE_NOTIFY;

        connection
            .xkb_select_events(
                core_kbd(),
                xkb::EventType::default(),
                events,
                xkb::MapPart::default(),
                xkb::MapPart::default(),
                &xkb::SelectEventsAux::new(),
            )
            .context("failed to register for XKB events")?
            .check()
            .context("failed to register for XKB events")?;

        let socket = AsyncFd::new(StreamFd(connection.stream().as_raw_fd()))
            .context("failed to register X socket with the runtime")?;

        let mut source = Self {
            format,
            connection,
            socket,
            name: String::new(),
            symbol: String::new(),
            caps: false,
            num: false,
            scroll: false,
        };

        source.refresh_all()?;

        Ok(source)
    }

    /// Re-reads group, layout names, and indicators from scratch.
    fn refresh_all(&mut self) -> Result<()> {
        let group = self
            .connection
            .xkb_get_state(core_kbd())
            .context("failed to get keyboard state")?
            .reply()
            .context("failed to get keyboard state")?
            .group;

        self.refresh_layout(u8::from(group))?;

        let indicators = self
            .connection
            .xkb_get_indicator_state(core_kbd())
            .context("failed to get keyboard indicators")?
            .reply()
            .context("failed to get keyboard indicators")?
            .state;

        self.set_indicators(indicators);

        Ok(())
    }

    /// Resolves the layout name and two-letter symbol of `group`.
    fn refresh_layout(&mut self, group: u8) -> Result<()> {
        let which = u32::from(xkb::NameDetail::SYMBOLS | xkb::NameDetail::GROUP_NAMES);

        let names = self
            .connection
            .xkb_get_names(core_kbd(), which.into())
            .context("failed to get keyboard names")?
            .reply()
            .context("failed to get keyboard names")?;

        self.name = match names
            .value_list
            .groups
            .as_deref()
            .and_then(|groups| groups.get(usize::from(group)).copied())
        {
            Some(atom) if atom != 0 => self.atom_name(atom)?,
            _ => String::new(),
        };

        let symbols = match names.value_list.symbols_name {
            Some(atom) if atom != 0 => self.atom_name(atom)?,
            _ => String::new(),
        };

        self.symbol = symbol_for_group(&symbols, group).unwrap_or_default();

        Ok(())
    }

    fn atom_name(&self, atom: x11rb::protocol::xproto::Atom) -> Result<String> {
        let reply = self
            .connection
            .get_atom_name(atom)
            .context("failed to resolve atom name")?
            .reply()
            .context("failed to resolve atom name")?;

        Ok(String::from_utf8_lossy(&reply.name).into_owned())
    }

    fn set_indicators(&mut self, state: u32) {
        self.caps = state & INDICATOR_CAPSLOCK != 0;
        self.num = state & INDICATOR_NUMLOCK != 0;
        self.scroll = state & INDICATOR_SCROLLLOCK != 0;
    }

    /// Applies one X event; true when it changed something a render shows.
    fn handle_event(&mut self, event: Event) -> Result<bool> {
        match event {
            Event::XkbNewKeyboardNotify(_) => {
                self.refresh_all()?;
                Ok(true)
            }
            Event::XkbStateNotify(event)
                if u16::from(event.changed & xkb::StatePart::GROUP_STATE) != 0 =>
            {
                self.refresh_layout(u8::from(event.group))?;
                Ok(true)
            }
            Event::XkbIndicatorStateNotify(event) if event.state_changed & INDICATOR_MASK != 0 => {
                self.set_indicators(event.state);
                Ok(true)
            }
            Event::Error(e) => {
                warn!("X server reported an error event: {e:?}");
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Applies every queued event; true when any of them was relevant.
    fn drain_events(&mut self) -> Result<bool> {
        let mut changed = false;

        while let Some(event) = self
            .connection
            .poll_for_event()
            .context("lost connection to X server")?
        {
            changed |= self.handle_event(event)?;
        }

        Ok(changed)
    }
}

/// Picks the layout symbol of `group` out of an XKB symbols string such as
/// `pc+us+ru:2+inet(evdev)`: the leading keycodes section is skipped and the
/// symbol is truncated to its two-letter layout code.
fn symbol_for_group(symbols: &str, group: u8) -> Option<String> {
    symbols
        .split('+')
        .nth(1 + usize::from(group))
        .map(|token| token.chars().take(2).collect())
}

#[async_trait]
impl ModuleSource for KeyboardSource {
    async fn current(&mut self) -> Result<Option<Snapshot>> {
        Ok(Some(Snapshot {
            format: self.format.clone(),
            tokens: vec![
                ("%caps%", if self.caps { "C" } else { "c" }.to_string()),
                ("%num%", if self.num { "N" } else { "n" }.to_string()),
                ("%scroll%", if self.scroll { "S" } else { "s" }.to_string()),
                ("%symbol%", self.symbol.clone()),
                ("%name%", self.name.clone()),
            ],
        }))
    }

    async fn wait_for_change(&mut self, cancel: &CancellationToken) -> Result<WaitOutcome> {
        loop {
            // Events already read into the connection's queue would never
            // show up as socket readiness, so drain before waiting.
            if self.drain_events()? {
                return Ok(WaitOutcome::Changed);
            }

            tokio::select! {
                () = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
                guard = self.socket.readable() => {
                    guard
                        .context("failed to wait on X socket")?
                        .clear_ready();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn symbol_skips_the_keycodes_section() {
        assert_eq!(
            symbol_for_group("pc+us+inet(evdev)", 0),
            Some("us".to_string())
        );
    }

    #[test]
    fn symbol_resolves_secondary_groups() {
        assert_eq!(
            symbol_for_group("pc+us+ru:2+inet(evdev)", 1),
            Some("ru".to_string())
        );
    }

    #[test]
    fn symbol_truncates_to_two_letters() {
        assert_eq!(
            symbol_for_group("pc+de(nodeadkeys)+inet(evdev)", 0),
            Some("de".to_string())
        );
    }

    #[test]
    fn symbol_for_missing_group_is_none() {
        assert_eq!(symbol_for_group("pc+us", 5), None);
    }
}
