//! Byte-to-text decoding for the incoming stream
//!
//! The emulation decodes raw process output through a replaceable decoder:
//! UTF-8 by default (incremental, so a multi-byte sequence may span two
//! reads), or a Latin-1 fallback for legacy locales. Replacing the decoder
//! wholesale discards any buffered partial sequence; that loss is accepted
//! and the host only sees the encoding-mode notification.

/// Which codec an emulation decodes with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmulationCodec {
    #[default]
    Utf8,
    /// Single-byte fallback; bytes map 1:1 to U+0000..U+00FF.
    Latin1,
}

/// Stateful stream decoder. UTF-8 buffers an incomplete trailing sequence
/// between calls; invalid bytes decode to U+FFFD.
pub enum StreamDecoder {
    Utf8 { pending: Vec<u8> },
    Latin1,
}

impl StreamDecoder {
    pub fn new(codec: EmulationCodec) -> Self {
        match codec {
            EmulationCodec::Utf8 => StreamDecoder::Utf8 { pending: Vec::new() },
            EmulationCodec::Latin1 => StreamDecoder::Latin1,
        }
    }

    pub fn codec(&self) -> EmulationCodec {
        match self {
            StreamDecoder::Utf8 { .. } => EmulationCodec::Utf8,
            StreamDecoder::Latin1 => EmulationCodec::Latin1,
        }
    }

    /// Decode a chunk of the byte stream, carrying partial state forward.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        match self {
            StreamDecoder::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            StreamDecoder::Utf8 { pending } => {
                let mut input;
                let buffer: &[u8] = if pending.is_empty() {
                    bytes
                } else {
                    input = std::mem::take(pending);
                    input.extend_from_slice(bytes);
                    &input
                };
                decode_utf8(buffer, pending)
            }
        }
    }
}

/// Decode `buffer` as UTF-8, stashing an incomplete trailing sequence in
/// `pending` and substituting U+FFFD for invalid bytes.
fn decode_utf8(buffer: &[u8], pending: &mut Vec<u8>) -> String {
    let mut out = String::with_capacity(buffer.len());
    let mut i = 0;

    while i < buffer.len() {
        let b = buffer[i];

        // ASCII fast path
        if b < 0x80 {
            out.push(b as char);
            i += 1;
            continue;
        }

        let seq_len = if b & 0xE0 == 0xC0 {
            2
        } else if b & 0xF0 == 0xE0 {
            3
        } else if b & 0xF8 == 0xF0 {
            4
        } else {
            // stray continuation or invalid lead byte
            out.push('\u{fffd}');
            i += 1;
            continue;
        };

        if i + seq_len > buffer.len() {
            // Incomplete tail: keep it for the next read, but only if the
            // bytes seen so far really are continuations of this sequence.
            if buffer[i + 1..].iter().all(|&c| c & 0xC0 == 0x80) {
                pending.extend_from_slice(&buffer[i..]);
                break;
            }
            out.push('\u{fffd}');
            i += 1;
            continue;
        }

        match std::str::from_utf8(&buffer[i..i + seq_len]) {
            Ok(s) => {
                out.push_str(s);
                i += seq_len;
            }
            Err(_) => {
                out.push('\u{fffd}');
                i += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passthrough() {
        let mut d = StreamDecoder::new(EmulationCodec::Utf8);
        assert_eq!(d.decode(b"hello"), "hello");
    }

    #[test]
    fn multibyte_split_across_reads() {
        let mut d = StreamDecoder::new(EmulationCodec::Utf8);
        let bytes = "漢".as_bytes(); // 3 bytes
        assert_eq!(d.decode(&bytes[..1]), "");
        assert_eq!(d.decode(&bytes[1..]), "漢");
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut d = StreamDecoder::new(EmulationCodec::Utf8);
        assert_eq!(d.decode(&[0xff, b'a']), "\u{fffd}a");
        // Truncated lead followed by ASCII resynchronizes.
        assert_eq!(d.decode(&[0xE4, b'x']), "\u{fffd}x");
    }

    #[test]
    fn latin1_maps_bytes_directly() {
        let mut d = StreamDecoder::new(EmulationCodec::Latin1);
        assert_eq!(d.decode(&[b'a', 0xE9]), "aé");
    }

    #[test]
    fn replacing_decoder_discards_partial_state() {
        let mut d = StreamDecoder::new(EmulationCodec::Utf8);
        let bytes = "漢".as_bytes();
        assert_eq!(d.decode(&bytes[..2]), "");

        // Wholesale replacement, as setEncoding does.
        d = StreamDecoder::new(EmulationCodec::Utf8);
        assert_eq!(d.decode(&bytes[2..]), "\u{fffd}");
    }
}
