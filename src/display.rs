//! Outbound notifications for whatever renders the session.
//!
//! The core never draws anything. It pushes [`DisplayEvent`]s into an unbounded channel and the
//! front end decides what to do with them.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::{coordinator::EndReason, logic::Side, machine::Phase};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisplayEvent {
    /// Input should be enabled for player phases and disabled during the opponent's turn.
    PhaseChanged { phase: Phase },
    /// Elapsed time for one clock, formatted `h:mm:ss`.
    ClockTick { side: Side, elapsed: String },
    /// Highlight a clock while it runs.
    ClockHighlight { side: Side, active: bool },
    /// Free-form status line (window title in a GUI).
    Status { text: String },
    /// A move was appended to the log. `side` doubles as the styling tag.
    MoveLogged { side: Side, notation: String },
    SessionEnded { reason: EndReason },
}

/// Cloneable sender half. Emitting never fails: if nobody listens the event is dropped.
#[derive(Clone, Debug, Default)]
pub struct DisplayHandle {
    tx: Option<UnboundedSender<DisplayEvent>>,
}

impl DisplayHandle {
    /// A handle that discards everything.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: DisplayEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.send(event) {
            trace!("display receiver gone, dropping {:?}", e.0);
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.emit(DisplayEvent::Status { text: text.into() });
    }
}

pub fn channel() -> (DisplayHandle, UnboundedReceiver<DisplayEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DisplayHandle { tx: Some(tx) }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (display, mut rx) = channel();
        display.status("one");
        display.emit(DisplayEvent::ClockHighlight {
            side: Side::Local,
            active: true,
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            DisplayEvent::Status { text: "one".into() }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            DisplayEvent::ClockHighlight { active: true, .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn emitting_without_listener_is_harmless() {
        let (display, rx) = channel();
        drop(rx);
        display.status("nobody hears this");
        DisplayHandle::detached().status("nor this");
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let json = serde_json::to_string(&DisplayEvent::MoveLogged {
            side: Side::Remote,
            notation: "xx:xx".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"event":"move_logged","side":"Remote","notation":"xx:xx"}"#
        );
    }
}
