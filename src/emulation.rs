//! Terminal emulation orchestrator
//!
//! `Emulation` owns the two screen buffers (primary and alternate), the
//! byte-stream decoder, the update coalescer and the view-attachment
//! registry. It ingests raw process output, dispatches control characters,
//! and publishes state changes over the event bus.
//!
//! # Architecture
//!
//! ```text
//! Emulation
//! ├── Screen x2 (grid + scroll-back; one is "current")
//! ├── StreamDecoder (UTF-8 / Latin-1, replaceable)
//! ├── UpdateCoalescer (debounce + max-latency deadlines)
//! ├── WindowRegistry (view attachments)
//! └── EventBus (outbound notifications)
//! ```

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::chartable::ExtendedCharTable;
use crate::coalesce::UpdateCoalescer;
use crate::config::EmulationConfig;
use crate::decoder::PlainTextDecoder;
use crate::encoding::{EmulationCodec, StreamDecoder};
use crate::event::{CursorShape, EmulationEvent, EventBus, NotifyState};
use crate::keybind::KeyBindingRegistry;
use crate::screen::{HistoryPolicy, Screen};
use crate::window::{WindowId, WindowRegistry};

/// Title channel used to mirror cursor-shape changes for hosts that only
/// watch the generic title notifications.
const CURSOR_SHAPE_TITLE_CHANNEL: u8 = 50;

/// Raw-byte prefix of the zmodem receiver handshake (CAN + "B00").
const ZMODEM_SIGNATURE: &[u8] = b"B00";

/// Core terminal emulation: byte stream in, screen state and events out.
pub struct Emulation {
    screens: [Screen; 2],
    current: usize,
    windows: WindowRegistry,
    decoder: StreamDecoder,
    key_bindings: KeyBindingRegistry,
    key_binding_name: String,
    coalescer: UpdateCoalescer,
    bus: EventBus,
    char_table: Arc<Mutex<ExtendedCharTable>>,
    uses_mouse: bool,
    bracketed_paste: bool,
    application_cursor: bool,
    size_initialized: bool,
}

impl Default for Emulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulation {
    pub fn new() -> Self {
        Self::with_config(&EmulationConfig::default())
    }

    pub fn with_config(config: &EmulationConfig) -> Self {
        let char_table = Arc::new(Mutex::new(ExtendedCharTable::new()));
        let mut screens = [
            Screen::new(config.lines, config.columns, char_table.clone()),
            Screen::new(config.lines, config.columns, char_table.clone()),
        ];
        // Scroll-back is a primary-screen-only concept; the alternate screen
        // never retains history.
        screens[0].set_history_policy(config.history_policy(), false);
        screens[1].set_history_policy(HistoryPolicy::None, false);

        Self {
            screens,
            current: 0,
            windows: WindowRegistry::new(),
            decoder: StreamDecoder::new(config.codec()),
            key_bindings: KeyBindingRegistry::new(),
            key_binding_name: config.key_bindings.clone(),
            coalescer: UpdateCoalescer::new(config.debounce(), config.max_latency()),
            bus: EventBus::new(),
            char_table,
            uses_mouse: false,
            bracketed_paste: false,
            application_cursor: false,
            size_initialized: false,
        }
    }

    /// Subscribe to the emulation's notifications.
    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<EmulationEvent> {
        self.bus.subscribe()
    }

    /// The shared intern table for combining-character sequences.
    pub fn char_table(&self) -> Arc<Mutex<ExtendedCharTable>> {
        self.char_table.clone()
    }

    // ----- view attachments -------------------------------------------------

    /// Attach a new view bound to the current screen.
    pub fn create_view(&mut self) -> WindowId {
        self.windows.create(self.current)
    }

    /// Release a view attachment.
    pub fn release_view(&mut self, id: WindowId) {
        self.windows.release(id);
    }

    /// The screen a view currently reads. Read-only by contract: views
    /// never mutate buffer memory.
    pub fn view_screen(&self, id: WindowId) -> Option<&Screen> {
        self.windows
            .get(id)
            .map(|window| &self.screens[window.screen_index()])
    }

    /// Consume a view's pending-redraw flag.
    pub fn take_view_redraw(&mut self, id: WindowId) -> bool {
        self.windows.take_redraw(id)
    }

    pub fn view_count(&self) -> usize {
        self.windows.len()
    }

    // ----- screen selection -------------------------------------------------

    /// Switch the current screen to `index & 1`.
    ///
    /// When the selection actually changes, every attached view is
    /// re-pointed and flagged for redraw; when it does not, this is a
    /// strict no-op with no notifications.
    pub fn set_screen(&mut self, index: usize) {
        let index = index & 1;
        if index == self.current {
            return;
        }
        self.current = index;
        let notified = self.windows.repoint_all(index);
        tracing::debug!(index, notified, "switched current screen");
    }

    pub fn current_screen(&self) -> &Screen {
        &self.screens[self.current]
    }

    pub fn current_screen_index(&self) -> usize {
        self.current
    }

    // ----- geometry ---------------------------------------------------------

    /// Resize both screens to `lines` x `columns`.
    ///
    /// Zero dimensions are silently ignored, as is a resize to the size
    /// both screens already have. Primary and alternate always share
    /// dimensions.
    pub fn set_image_size(&mut self, lines: usize, columns: usize) {
        if lines == 0 || columns == 0 {
            return;
        }
        let unchanged = self.screens.iter().all(|screen| {
            screen.lines() == lines && screen.columns() == columns
        });
        if unchanged {
            return;
        }

        for screen in &mut self.screens {
            screen.resize_image(lines, columns);
        }

        self.bus
            .emit(EmulationEvent::ImageSizeChanged { lines, columns });
        if !self.size_initialized {
            self.size_initialized = true;
            self.bus.emit(EmulationEvent::ImageSizeInitialized);
        }
        self.buffered_update(Instant::now());
    }

    /// Current screen size as (lines, columns).
    pub fn image_size(&self) -> (usize, usize) {
        let screen = self.current_screen();
        (screen.lines(), screen.columns())
    }

    /// On-screen lines plus scroll-back lines of the current screen.
    pub fn line_count(&self) -> usize {
        let screen = self.current_screen();
        screen.lines() + screen.history_line_count()
    }

    // ----- history (primary screen only) ------------------------------------

    /// Install a scroll-back policy on the primary screen, keeping its
    /// contents, and force an immediate redraw notification.
    pub fn set_history(&mut self, policy: HistoryPolicy) {
        self.screens[0].set_history_policy(policy, true);
        self.show_bulk();
    }

    pub fn history(&self) -> HistoryPolicy {
        self.screens[0].history_policy()
    }

    /// Drop the primary screen's scroll-back contents, keeping the policy.
    pub fn clear_history(&mut self) {
        let policy = self.screens[0].history_policy();
        self.screens[0].set_history_policy(policy, false);
    }

    // ----- encoding ---------------------------------------------------------

    /// Replace the stream decoder. Any buffered partial multi-byte
    /// sequence is discarded; the transport is asked to match UTF-8 mode.
    pub fn set_encoding(&mut self, codec: EmulationCodec) {
        self.decoder = StreamDecoder::new(codec);
        self.bus
            .emit(EmulationEvent::UseUtf8Request(codec == EmulationCodec::Utf8));
    }

    pub fn encoding(&self) -> EmulationCodec {
        self.decoder.codec()
    }

    // ----- ingestion --------------------------------------------------------

    /// Ingest a chunk of raw process output.
    ///
    /// Decodes through the current encoding, dispatches each character, and
    /// independently scans the raw bytes for the zmodem handshake
    /// signature. A signature split across two calls is not detected.
    pub fn receive_data(&mut self, bytes: &[u8]) {
        self.bus
            .emit(EmulationEvent::StateChanged(NotifyState::Activity));
        self.buffered_update(Instant::now());

        let text = self.decoder.decode(bytes);
        for ch in text.chars() {
            self.receive_char(ch);
        }

        for (i, &byte) in bytes.iter().enumerate() {
            if byte == 0x18 && bytes[i + 1..].starts_with(ZMODEM_SIGNATURE) {
                self.bus.emit(EmulationEvent::ZmodemDetected);
            }
        }
    }

    /// Dispatch one decoded character.
    ///
    /// The dispatch decision looks only at the low byte, so a control
    /// action fires regardless of the character's original width; anything
    /// else is placed as a glyph (the full character, not the masked byte).
    pub fn receive_char(&mut self, ch: char) {
        match (ch as u32) & 0xff {
            0x08 => self.screens[self.current].back_space(),
            0x09 => self.screens[self.current].tab(),
            0x0A => self.screens[self.current].new_line(),
            0x0D => self.screens[self.current].to_start_of_line(),
            0x07 => self
                .bus
                .emit(EmulationEvent::StateChanged(NotifyState::Bell)),
            _ => self.screens[self.current].display_character(ch),
        }
    }

    // ----- export -----------------------------------------------------------

    /// Export lines `start..=end` of the current screen through `decoder`.
    pub fn write_to_stream(
        &self,
        decoder: &mut PlainTextDecoder,
        start_line: usize,
        end_line: usize,
    ) {
        self.current_screen()
            .write_lines_to_stream(decoder, start_line, end_line);
    }

    /// Export the current screen's full scroll-back through `decoder`.
    pub fn write_history_to_stream(&self, decoder: &mut PlainTextDecoder) {
        let hist = self.current_screen().history_line_count();
        self.current_screen().write_lines_to_stream(decoder, 0, hist);
    }

    // ----- mode flags (escape-layer event path) -----------------------------

    pub fn program_uses_mouse(&self) -> bool {
        self.uses_mouse
    }

    pub fn set_uses_mouse(&mut self, uses_mouse: bool) {
        self.uses_mouse = uses_mouse;
        self.bus
            .emit(EmulationEvent::MouseUsageChanged(uses_mouse));
    }

    pub fn program_bracketed_paste_mode(&self) -> bool {
        self.bracketed_paste
    }

    pub fn set_bracketed_paste_mode(&mut self, enabled: bool) {
        self.bracketed_paste = enabled;
        self.bus.emit(EmulationEvent::PasteModeChanged(enabled));
    }

    /// DECCKM state, consulted when translating cursor keys.
    pub fn set_application_cursor_keys(&mut self, enabled: bool) {
        self.application_cursor = enabled;
    }

    /// Report a cursor-shape change, mirrored onto the title channel for
    /// hosts that only watch title notifications.
    pub fn set_cursor_shape(&mut self, shape: CursorShape, blinking: bool) {
        self.bus
            .emit(EmulationEvent::CursorShapeChanged { shape, blinking });
        self.bus.emit(EmulationEvent::TitleChanged {
            channel: CURSOR_SHAPE_TITLE_CHANNEL,
            text: format!(
                "CursorShape={};BlinkingCursorEnabled={}",
                shape.as_index(),
                blinking as u8
            ),
        });
    }

    // ----- user input -------------------------------------------------------

    /// Name of the active key-binding table.
    pub fn key_bindings(&self) -> &str {
        &self.key_binding_name
    }

    /// Select a key-binding table by name; unknown names fall back to the
    /// default table at translation time.
    pub fn set_key_bindings(&mut self, name: &str) {
        self.key_binding_name = name.to_string();
    }

    /// Translate a key event and forward the bytes to the process.
    pub fn send_key_event(&mut self, event: &KeyEvent) {
        self.bus
            .emit(EmulationEvent::StateChanged(NotifyState::Normal));

        if event.modifiers.contains(KeyModifiers::CONTROL) {
            match event.code {
                KeyCode::Char('s') => self
                    .bus
                    .emit(EmulationEvent::FlowControlKeyPressed(true)),
                KeyCode::Char('q') => self
                    .bus
                    .emit(EmulationEvent::FlowControlKeyPressed(false)),
                _ => {}
            }
        }

        let table = self.key_bindings.resolve(&self.key_binding_name);
        if let Some(bytes) = table.map(event, self.application_cursor) {
            if !bytes.is_empty() {
                self.bus.emit(EmulationEvent::OutboundData(bytes));
            }
        }
    }

    /// Forward literal text (e.g. a paste) to the process.
    pub fn send_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.bus
                .emit(EmulationEvent::OutboundData(text.as_bytes().to_vec()));
        }
    }

    /// The character the backspace key erases with.
    pub fn erase_char(&self) -> u8 {
        0x08
    }

    // ----- coalesced updates ------------------------------------------------

    fn buffered_update(&mut self, now: Instant) {
        self.coalescer.request_update(now);
    }

    /// Drive the coalescing deadlines. The host calls this from its event
    /// loop; when a deadline has expired, one output-changed notification
    /// is emitted and the current screen's scrolled/dropped counters reset
    /// atomically with it. Returns true if a notification fired.
    pub fn poll_timers(&mut self, now: Instant) -> bool {
        if self.coalescer.fire(now) {
            self.show_bulk();
            return true;
        }
        false
    }

    /// True if a coalesced update is waiting on a deadline.
    pub fn update_pending(&self) -> bool {
        self.coalescer.is_pending()
    }

    fn show_bulk(&mut self) {
        self.coalescer.flush();
        self.bus.emit(EmulationEvent::OutputChanged);
        self.windows.mark_all();
        self.screens[self.current].reset_scrolled_lines();
        self.screens[self.current].reset_dropped_lines();
    }
}
