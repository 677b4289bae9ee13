//! Plain-text line decoder
//!
//! Linearizes a range of grid lines into text. Used by the emulation's
//! export path and by the scroll-back search, which needs the recorded
//! line-start offsets to map match offsets back to (line, column) pairs.

use crate::chartable::ExtendedCharTable;
use crate::screen::Cell;

/// Decodes cell rows into a text blob, one `\n`-terminated line per row,
/// with trailing blanks trimmed.
///
/// A session is bracketed by [`begin`](Self::begin) and [`end`](Self::end).
/// With offset recording enabled, `line_positions()` holds the byte offset
/// of each decoded line plus a final sentinel at the end of the text.
#[derive(Default)]
pub struct PlainTextDecoder {
    output: String,
    record_positions: bool,
    line_positions: Vec<usize>,
}

impl PlainTextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable recording of line-start offsets for this session.
    pub fn record_line_positions(&mut self, record: bool) {
        self.record_positions = record;
    }

    pub fn begin(&mut self) {
        self.output.clear();
        self.line_positions.clear();
    }

    pub fn decode_line(&mut self, cells: &[Cell], table: &ExtendedCharTable) {
        if self.record_positions {
            self.line_positions.push(self.output.len());
        }

        let mut line = String::with_capacity(cells.len());
        for cell in cells {
            if cell.is_continuation() {
                continue;
            }
            cell.append_text(&mut line, table);
        }
        let trimmed = line.trim_end_matches(' ');
        self.output.push_str(trimmed);
        self.output.push('\n');
    }

    pub fn end(&mut self) {
        if self.record_positions {
            self.line_positions.push(self.output.len());
        }
    }

    pub fn text(&self) -> &str {
        &self.output
    }

    pub fn into_text(self) -> String {
        self.output
    }

    pub fn line_positions(&self) -> &[usize] {
        &self.line_positions
    }
}
