//! Outbound notification channel
//!
//! The emulation never calls back into its host; it pushes notifications
//! through mpsc subscriptions and the host drains them on its own schedule.

use std::sync::mpsc::{self, Receiver, Sender};

/// Activity states reported through [`EmulationEvent::StateChanged`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyState {
    /// The emulation is receiving user input.
    Normal,
    /// The program rang the bell.
    Bell,
    /// The emulation is receiving data from the process.
    Activity,
}

/// Keyboard cursor shapes reported by the escape-sequence layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorShape {
    Block,
    Underline,
    IBeam,
}

impl CursorShape {
    /// Numeric id used by the title-channel compatibility shim.
    pub fn as_index(self) -> u8 {
        match self {
            CursorShape::Block => 0,
            CursorShape::Underline => 1,
            CursorShape::IBeam => 2,
        }
    }
}

/// Notifications an emulation emits to attached hosts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmulationEvent {
    /// The screen image changed; redraw.
    OutputChanged,
    StateChanged(NotifyState),
    /// Title update; `channel` distinguishes icon/window/compat channels.
    TitleChanged { channel: u8, text: String },
    ImageSizeChanged { lines: usize, columns: usize },
    /// First successful resize only.
    ImageSizeInitialized,
    /// Zmodem transfer signature seen in the raw byte stream.
    ZmodemDetected,
    /// The foreground program toggled interest in mouse events.
    MouseUsageChanged(bool),
    PasteModeChanged(bool),
    CursorShapeChanged { shape: CursorShape, blinking: bool },
    /// Ctrl+S / Ctrl+Q pressed; `true` means suspend.
    FlowControlKeyPressed(bool),
    /// Bytes ready to forward to the process's stdin.
    OutboundData(Vec<u8>),
    /// The transport should switch its UTF-8 mode.
    UseUtf8Request(bool),
}

/// Fan-out bus: one sender side, any number of subscribed receivers.
/// Disconnected receivers are pruned on the next emit.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<EmulationEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<EmulationEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: EmulationEvent) {
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_events() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.emit(EmulationEvent::ZmodemDetected);

        assert_eq!(a.try_recv().unwrap(), EmulationEvent::ZmodemDetected);
        assert_eq!(b.try_recv().unwrap(), EmulationEvent::ZmodemDetected);
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        {
            let _dropped = bus.subscribe();
        }

        bus.emit(EmulationEvent::OutputChanged);
        bus.emit(EmulationEvent::OutputChanged);

        assert_eq!(a.try_recv().unwrap(), EmulationEvent::OutputChanged);
        assert_eq!(a.try_recv().unwrap(), EmulationEvent::OutputChanged);
    }
}
