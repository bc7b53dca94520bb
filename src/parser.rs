use crate::constants::{self, COLON, CR, HYPHEN, LF, SPACE};
use crate::relay::Acceptance;
use bytes::Bytes;

/// Boundary followed by CR: another part follows.
const PART_BOUNDARY: u8 = 1;
/// Boundary followed by a hyphen: possibly the closing delimiter.
const LAST_BOUNDARY: u8 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Start,
    StartBoundary,
    HeaderFieldStart,
    HeaderField,
    HeaderValueStart,
    HeaderValue,
    HeaderValueAlmostDone,
    HeadersAlmostDone,
    PartDataStart,
    PartData,
    End,
}

impl State {
    pub(crate) fn name(self) -> &'static str {
        match self {
            State::Start => "Start",
            State::StartBoundary => "StartBoundary",
            State::HeaderFieldStart => "HeaderFieldStart",
            State::HeaderField => "HeaderField",
            State::HeaderValueStart => "HeaderValueStart",
            State::HeaderValue => "HeaderValue",
            State::HeaderValueAlmostDone => "HeaderValueAlmostDone",
            State::HeadersAlmostDone => "HeadersAlmostDone",
            State::PartDataStart => "PartDataStart",
            State::PartData => "PartData",
            State::End => "End",
        }
    }
}

/// Events produced while scanning a chunk. Byte-carrying variants hold
/// zero-copy slices of the chunk (or of the lookbehind buffer on replay).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParseEvent {
    PartBegin,
    HeaderField(Bytes),
    HeaderValue(Bytes),
    HeaderEnd,
    HeadersEnd,
    PartData(Bytes),
    PartEnd,
    End,
}

/// Receives the events of [`Parser::write`].
///
/// Only `PartData` may answer [`Acceptance::Pending`]; every other event
/// is expected to be accepted.
pub(crate) trait Handler {
    fn on_event(&mut self, event: ParseEvent) -> crate::Result<Acceptance>;
}

/// Start offsets, within the chunk being scanned, of the spans still open.
#[derive(Debug, Default)]
struct Markers {
    header_field: Option<usize>,
    header_value: Option<usize>,
    part_data: Option<usize>,
}

/// A resumable `multipart/form-data` state machine.
///
/// The parser never buffers a chunk: spans that straddle two chunks are
/// flushed at the end of the first one, and a boundary candidate spanning
/// two chunks is kept alive by `index`, `flags` and the lookbehind buffer.
#[derive(Debug)]
pub(crate) struct Parser {
    boundary: Vec<u8>,
    boundary_chars: [bool; 256],
    lookbehind: Vec<u8>,
    state: State,
    index: usize,
    flags: u8,
    markers: Markers,
    consumed: u64,
}

impl Parser {
    pub(crate) fn new(boundary: &str) -> Self {
        let mut delimiter =
            Vec::with_capacity(constants::CRLF.len() + constants::BOUNDARY_EXT.len() + boundary.len());
        delimiter.extend_from_slice(constants::CRLF);
        delimiter.extend_from_slice(constants::BOUNDARY_EXT);
        delimiter.extend_from_slice(boundary.as_bytes());

        let mut boundary_chars = [false; 256];
        for &b in &delimiter {
            boundary_chars[b as usize] = true;
        }

        Parser {
            lookbehind: vec![0; delimiter.len() + constants::LOOKBEHIND_MARGIN],
            boundary: delimiter,
            boundary_chars,
            state: State::Start,
            index: 0,
            flags: 0,
            markers: Markers::default(),
            consumed: 0,
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    /// Whether the closing delimiter has been seen.
    pub(crate) fn is_done(&self) -> bool {
        self.state == State::End
    }

    /// Scans `chunk`, dispatching events to `handler` in stream order.
    ///
    /// Returns [`Acceptance::Pending`] if any payload span was queued by a
    /// saturated consumer; the caller must not feed the next chunk until that
    /// consumer drains.
    pub(crate) fn write<H: Handler>(&mut self, chunk: &Bytes, handler: &mut H) -> crate::Result<Acceptance> {
        let buf = &chunk[..];
        let len = buf.len();
        let boundary_len = self.boundary.len();
        let boundary_end = boundary_len - 1;

        let mut acceptance = Acceptance::Accepted;
        let mut i = 0;

        while i < len {
            let mut c = buf[i];

            match self.state {
                State::Start => {
                    if c == CR || c == LF {
                        i += 1;
                        continue;
                    }
                    self.index = 0;
                    self.state = State::StartBoundary;
                    continue;
                }
                State::StartBoundary => {
                    // The leading CRLF of the delimiter is optional before the first boundary.
                    let token_len = boundary_len - 2;

                    if self.index == token_len {
                        if c != CR {
                            return Err(self.failure(i));
                        }
                        self.index += 1;
                    } else if self.index == token_len + 1 {
                        if c != LF {
                            return Err(self.failure(i));
                        }
                        self.index = 0;
                        handler.on_event(ParseEvent::PartBegin)?;
                        self.state = State::HeaderFieldStart;
                    } else {
                        if c != self.boundary[self.index + 2] {
                            return Err(self.failure(i));
                        }
                        self.index += 1;
                    }
                }
                State::HeaderFieldStart => {
                    self.state = State::HeaderField;
                    self.markers.header_field = Some(i);
                    self.index = 0;
                    continue;
                }
                State::HeaderField => {
                    if c == CR {
                        // Ends the header block, a dangling name is dropped.
                        self.markers.header_field = None;
                        self.state = State::HeadersAlmostDone;
                        i += 1;
                        continue;
                    }

                    self.index += 1;
                    if c == HYPHEN {
                        i += 1;
                        continue;
                    }

                    if c == COLON {
                        if self.index == 1 {
                            // empty header name
                            return Err(self.failure(i));
                        }
                        if let Some(start) = self.markers.header_field.take() {
                            emit_span(handler, ParseEvent::HeaderField, chunk, start, i)?;
                        }
                        self.state = State::HeaderValueStart;
                        i += 1;
                        continue;
                    }

                    if !c.is_ascii_alphabetic() {
                        return Err(self.failure(i));
                    }
                }
                State::HeaderValueStart => {
                    if c == SPACE {
                        i += 1;
                        continue;
                    }
                    self.markers.header_value = Some(i);
                    self.state = State::HeaderValue;
                    continue;
                }
                State::HeaderValue => match memchr::memchr(CR, &buf[i..]) {
                    Some(offset) => {
                        i += offset;
                        if let Some(start) = self.markers.header_value.take() {
                            emit_span(handler, ParseEvent::HeaderValue, chunk, start, i)?;
                        }
                        handler.on_event(ParseEvent::HeaderEnd)?;
                        self.state = State::HeaderValueAlmostDone;
                    }
                    None => {
                        i = len;
                        continue;
                    }
                },
                State::HeaderValueAlmostDone => {
                    if c != LF {
                        return Err(self.failure(i));
                    }
                    self.state = State::HeaderFieldStart;
                }
                State::HeadersAlmostDone => {
                    if c != LF {
                        return Err(self.failure(i));
                    }
                    handler.on_event(ParseEvent::HeadersEnd)?;
                    self.state = State::PartDataStart;
                }
                State::PartDataStart => {
                    self.state = State::PartData;
                    self.markers.part_data = Some(i);
                    continue;
                }
                State::PartData => {
                    let prev_index = self.index;

                    if self.index == 0 {
                        // Horspool-style skip: if the last byte of the window can't be part of
                        // the delimiter, no delimiter starts anywhere in the window.
                        i += boundary_end;
                        while i < len && !self.boundary_chars[buf[i] as usize] {
                            i += boundary_len;
                        }
                        i -= boundary_end;
                        if i >= len {
                            break;
                        }
                        c = buf[i];
                    }

                    if self.index < boundary_len {
                        if self.boundary[self.index] == c {
                            if self.index == 0 {
                                if let Some(start) = self.markers.part_data.take() {
                                    acceptance =
                                        acceptance.and(emit_span(handler, ParseEvent::PartData, chunk, start, i)?);
                                }
                            }
                            self.index += 1;
                        } else {
                            self.index = 0;
                        }
                    } else if self.index == boundary_len {
                        self.index += 1;
                        if c == CR {
                            self.flags |= PART_BOUNDARY;
                        } else if c == HYPHEN {
                            self.flags |= LAST_BOUNDARY;
                        } else {
                            self.index = 0;
                        }
                    } else if self.index - 1 == boundary_len {
                        if self.flags & PART_BOUNDARY != 0 {
                            self.index = 0;
                            if c == LF {
                                self.flags &= !PART_BOUNDARY;
                                handler.on_event(ParseEvent::PartEnd)?;
                                handler.on_event(ParseEvent::PartBegin)?;
                                self.state = State::HeaderFieldStart;
                                i += 1;
                                continue;
                            }
                        } else if self.flags & LAST_BOUNDARY != 0 {
                            if c == HYPHEN {
                                handler.on_event(ParseEvent::PartEnd)?;
                                handler.on_event(ParseEvent::End)?;
                                self.state = State::End;
                            } else {
                                self.index = 0;
                            }
                        } else {
                            self.index = 0;
                        }
                    }

                    if self.index > 0 {
                        self.lookbehind[self.index - 1] = c;
                    } else if prev_index > 0 {
                        // False lead: what looked like a delimiter is payload.
                        self.flags = 0;
                        let replay = Bytes::copy_from_slice(&self.lookbehind[..prev_index]);
                        acceptance = acceptance.and(handler.on_event(ParseEvent::PartData(replay))?);
                        self.markers.part_data = Some(i);
                        // Re-examine the byte that broke the sequence, it may start a new one.
                        continue;
                    }
                }
                State::End => {
                    i = len;
                    continue;
                }
            }

            i += 1;
        }

        if let Some(start) = self.markers.header_field {
            emit_span(handler, ParseEvent::HeaderField, chunk, start, len)?;
            self.markers.header_field = Some(0);
        }
        if let Some(start) = self.markers.header_value {
            emit_span(handler, ParseEvent::HeaderValue, chunk, start, len)?;
            self.markers.header_value = Some(0);
        }
        if let Some(start) = self.markers.part_data {
            acceptance = acceptance.and(emit_span(handler, ParseEvent::PartData, chunk, start, len)?);
            self.markers.part_data = Some(0);
        }

        self.consumed += len as u64;

        Ok(acceptance)
    }

    fn failure(&self, offset: usize) -> crate::Error {
        crate::Error::ParseFailed {
            state: self.state.name(),
            offset: self.consumed + offset as u64,
        }
    }
}

fn emit_span<H: Handler>(
    handler: &mut H,
    event: fn(Bytes) -> ParseEvent,
    chunk: &Bytes,
    start: usize,
    end: usize,
) -> crate::Result<Acceptance> {
    if start == end {
        return Ok(Acceptance::Accepted);
    }
    handler.on_event(event(chunk.slice(start..end)))
}
