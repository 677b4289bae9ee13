//! termcore - An embeddable terminal emulation core
//!
//! termcore provides the back-end state of a terminal widget: screen
//! buffers with scroll-back, a byte-stream ingestion path, keyboard
//! encoding, and regex search over the history. It draws nothing and
//! owns no process; a host embeds an [`Emulation`], feeds it process
//! output, and renders from the screen it exposes.
//!
//! # Features
//!
//! - **Dual screens**: primary buffer with scroll-back plus a separate
//!   alternate buffer, switched without losing either
//! - **Coalesced updates**: output bursts collapse into a single redraw
//!   notification with a bounded worst-case latency
//! - **Combining characters**: multi-codepoint cells interned into a
//!   shared 16-bit table so a cell stays one machine word
//! - **Scroll-back search**: forward/backward regex search in bounded
//!   blocks, with wrap-around and cooperative cancellation
//! - **Key encoding**: named binding tables map key events to the byte
//!   sequences a terminal application expects
//!
//! # Quick Start
//!
//! ```no_run
//! use termcore::{Emulation, HistorySearch, SearchDirection};
//!
//! let mut emulation = Emulation::new();
//! let events = emulation.subscribe();
//! emulation.set_image_size(24, 80);
//! emulation.receive_data(b"hello\r\nworld\r\n");
//!
//! let search = HistorySearch::new("world", SearchDirection::Forward, 0, 0)?;
//! let outcome = search.run(&emulation);
//! # let _ = (events, outcome);
//! # Ok::<(), termcore::SearchError>(())
//! ```

mod chartable;
mod coalesce;
mod config;
mod decoder;
mod emulation;
mod encoding;
mod event;
mod keybind;
mod screen;
mod search;
mod window;

pub use chartable::{CharTableError, ExtendedCharTable};
pub use coalesce::UpdateCoalescer;
pub use config::{ConfigError, EmulationConfig};
pub use decoder::PlainTextDecoder;
pub use emulation::Emulation;
pub use encoding::EmulationCodec;
pub use event::{CursorShape, EmulationEvent, NotifyState};
pub use keybind::{KeyBindingRegistry, KeyBindingTable, Modifiers};
pub use screen::{Cell, CellContent, HistoryPolicy, Rendition, Screen};
pub use search::{CancelToken, HistorySearch, SearchDirection, SearchError, SearchOutcome};
pub use window::WindowId;
