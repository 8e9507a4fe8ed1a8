// Copyright 2026 The Pulsewire Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Brace-delimited JSON framing over a non-blocking byte stream.
//!
//! A frame is the maximal span starting at `{` and ending when a matching
//! `}` brings the nesting depth back to zero. No allocation happens beyond
//! the bytes of the object itself, and no state survives between calls: a
//! `WouldBlock` result means "nothing usable was available", full stop.
//!
//! This does not understand JSON string literals, so a `{` or `}` embedded
//! in a string value will misframe the object. Upstream clients are
//! expected not to embed raw braces in string values; a string-aware
//! scanner is future work, not attempted here.

use std::io::{self, ErrorKind, Read};

/// Outcome of one `read_frame` call.
#[derive(Debug)]
pub enum FrameOutcome {
    /// A full balanced `{...}` object.
    Complete(Vec<u8>),
    /// No data was available, and no object is partially read. Retry on the
    /// next readiness event.
    WouldBlock,
    /// Either the stream produced a byte that cannot start an object (not
    /// `{`, `\n`, or `\r`), or it went quiet partway through one. The
    /// connection that produced this must be torn down; the bytes already
    /// consumed are discarded, never retried.
    ProtocolError,
}

/// Reads exactly one brace-delimited JSON object from `source`.
///
/// `source` must be a non-blocking byte source: a `WouldBlock` I/O error is
/// how "no more bytes right now" is communicated. Leading `\n`/`\r` bytes
/// are skipped so a line-oriented terminal client can probe the server
/// interactively.
pub fn read_frame<R: Read>(source: &mut R) -> FrameOutcome {
    let mut object = Vec::new();
    let mut depth: u32 = 0;
    let mut started = false;
    let mut byte = [0u8; 1];

    loop {
        match source.read(&mut byte) {
            Ok(1) => {
                let c = byte[0];
                if !started {
                    match c {
                        b'{' => {
                            started = true;
                            depth = 1;
                            object.push(c);
                        }
                        b'\n' | b'\r' => continue,
                        _ => return FrameOutcome::ProtocolError,
                    }
                } else {
                    object.push(c);
                    match c {
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                return FrameOutcome::Complete(object);
                            }
                        }
                        _ => {}
                    }
                }
            }
            // A non-blocking read returning exactly zero bytes means "no
            // data is currently available" (mirrored from the original
            // server's treatment of a short read as end-of-buffer, not
            // end-of-stream; true peer closure is detected separately by
            // the Reader's peek probe before this function is ever called).
            Ok(_) => return would_block_or_protocol_error(started),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if is_transient(&e) => return would_block_or_protocol_error(started),
            Err(_) => return would_block_or_protocol_error(started),
        }
    }
}

fn would_block_or_protocol_error(started: bool) -> FrameOutcome {
    if started {
        FrameOutcome::ProtocolError
    } else {
        FrameOutcome::WouldBlock
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A `Read` impl that mimics a non-blocking socket: once the backing
    /// bytes are exhausted it reports `WouldBlock` forever, rather than an
    /// `Ok(0)` end-of-stream the way `Cursor` would.
    struct NonBlocking {
        inner: Cursor<Vec<u8>>,
    }

    impl NonBlocking {
        fn new(bytes: &[u8]) -> Self {
            Self {
                inner: Cursor::new(bytes.to_vec()),
            }
        }
    }

    impl Read for NonBlocking {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            if n == 0 {
                Err(io::Error::from(ErrorKind::WouldBlock))
            } else {
                Ok(n)
            }
        }
    }

    #[test]
    fn reads_single_object() {
        let mut source = NonBlocking::new(br#"{"type":"X","v":1}"#);
        match read_frame(&mut source) {
            FrameOutcome::Complete(bytes) => {
                assert_eq!(bytes, br#"{"type":"X","v":1}"#);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn reads_two_objects_back_to_back() {
        let mut source = NonBlocking::new(br#"{"type":"X"}{"type":"Y"}"#);
        let first = match read_frame(&mut source) {
            FrameOutcome::Complete(bytes) => bytes,
            other => panic!("expected Complete, got {other:?}"),
        };
        assert_eq!(first, br#"{"type":"X"}"#);

        let second = match read_frame(&mut source) {
            FrameOutcome::Complete(bytes) => bytes,
            other => panic!("expected Complete, got {other:?}"),
        };
        assert_eq!(second, br#"{"type":"Y"}"#);

        assert!(matches!(read_frame(&mut source), FrameOutcome::WouldBlock));
    }

    #[test]
    fn skips_leading_newlines_and_carriage_returns() {
        let mut source = NonBlocking::new(b"\n\r{\"type\":\"X\"}");
        match read_frame(&mut source) {
            FrameOutcome::Complete(bytes) => assert_eq!(bytes, br#"{"type":"X"}"#),
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn tracks_nested_braces() {
        let mut source = NonBlocking::new(br#"{"a":{"b":{}},"c":1}"#);
        match read_frame(&mut source) {
            FrameOutcome::Complete(bytes) => {
                assert_eq!(bytes, br#"{"a":{"b":{}},"c":1}"#);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn partial_object_is_a_protocol_error() {
        let mut source = NonBlocking::new(br#"{"type":"X""#);
        assert!(matches!(
            read_frame(&mut source),
            FrameOutcome::ProtocolError
        ));
    }

    #[test]
    fn non_brace_first_byte_is_a_protocol_error() {
        let mut source = NonBlocking::new(b"not json");
        assert!(matches!(
            read_frame(&mut source),
            FrameOutcome::ProtocolError
        ));
    }

    #[test]
    fn no_bytes_available_is_would_block() {
        let mut source = NonBlocking::new(b"");
        assert!(matches!(read_frame(&mut source), FrameOutcome::WouldBlock));
    }
}
