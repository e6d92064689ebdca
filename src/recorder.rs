use crate::constants;
use crate::headers::PartHeaders;
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

/// What a committed region turns into. Events are pushed in production order
/// and the queue is drained in the same order, so body chunks reach the part
/// stream FIFO.
#[derive(Debug)]
pub(crate) enum Event {
    PartHeaders(PartHeaders),
    BodyChunk(Bytes),
    BodyEnd,
}

pub(crate) type EventQueue = VecDeque<Event>;

/// The wire forms of the configured boundary, derived once and shared by
/// every delimiter recorder.
#[derive(Debug)]
pub(crate) struct Boundary {
    /// `\r\n--BOUNDARY\r\n`
    pub(crate) delimiter: Vec<u8>,
    /// `\r\n--BOUNDARY--`
    pub(crate) close: Vec<u8>,
}

impl Boundary {
    pub(crate) fn new(boundary: &str) -> Self {
        let prefix = format!("{}{}{}", constants::CRLF, constants::BOUNDARY_EXT, boundary);

        Boundary {
            delimiter: format!("{}{}", prefix, constants::CRLF).into_bytes(),
            close: format!("{}{}", prefix, constants::BOUNDARY_EXT).into_bytes(),
        }
    }
}

/// A per-region byte consumer. The active recorder receives every byte of its
/// region, decides when the region is complete and, for the delimiter
/// recorder, can yield back tentatively consumed bytes when a boundary match
/// falls through.
#[derive(Debug)]
pub(crate) enum Recorder {
    /// Preamble, close and epilogue bytes flow through without retention.
    Discard,
    Delimiter(DelimiterRecorder),
    Headers(HeadersRecorder),
    Body(BodyRecorder),
}

impl Recorder {
    /// Feeds one byte. Returns whether the byte was consumed; a rejected byte
    /// on an incomplete recorder means the region was misidentified and must
    /// be rolled back.
    pub(crate) fn next(&mut self, b: u8, events: &mut EventQueue) -> crate::Result<bool> {
        match self {
            Recorder::Discard => Ok(true),
            Recorder::Delimiter(r) => Ok(r.next(b)),
            Recorder::Headers(r) => r.next(b),
            Recorder::Body(r) => {
                r.next(b, events);
                Ok(true)
            }
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        match self {
            Recorder::Discard => false,
            Recorder::Delimiter(r) => r.is_complete(),
            Recorder::Headers(r) => r.is_complete(),
            Recorder::Body(_) => false,
        }
    }

    /// Whether the recorded bytes are exactly the closing boundary form.
    pub(crate) fn is_close_delimiter(&self) -> bool {
        match self {
            Recorder::Delimiter(r) => r.is_close_delimiter(),
            _ => false,
        }
    }

    pub(crate) fn commit(self, events: &mut EventQueue) {
        match self {
            Recorder::Discard | Recorder::Delimiter(_) => {}
            Recorder::Headers(r) => r.commit(events),
            Recorder::Body(r) => r.commit(events),
        }
    }

    /// Yields the raw bytes to replay into the restored region.
    pub(crate) fn rollback(self) -> Vec<u8> {
        match self {
            Recorder::Delimiter(r) => r.buf,
            _ => Vec::new(),
        }
    }

    /// The upstream chunk ran dry; flush what can already go downstream.
    pub(crate) fn buffer_depleted(&mut self, events: &mut EventQueue) {
        if let Recorder::Body(r) = self {
            r.flush(events);
        }
    }
}

/// Matches either boundary form byte by byte. `boundary_pos` counts matched
/// boundary bytes only and stays put while transport padding streams by, so
/// padded delimiters line up with the unpadded forms.
#[derive(Debug)]
pub(crate) struct DelimiterRecorder {
    boundary: Arc<Boundary>,
    buf: Vec<u8>,
    boundary_pos: usize,
    in_padding: bool,
}

impl DelimiterRecorder {
    pub(crate) fn new(boundary: Arc<Boundary>) -> Self {
        // Room for padding, but bounded.
        let max = 2 * boundary.close.len();

        DelimiterRecorder {
            boundary,
            buf: Vec::with_capacity(max),
            boundary_pos: 0,
            in_padding: false,
        }
    }

    fn next(&mut self, b: u8) -> bool {
        if self.buf.len() == 2 * self.boundary.close.len() {
            // Padding overran the scratch buffer; record the byte anyway so
            // a rollback replays it, then treat the run as a failed match.
            self.buf.push(b);
            return false;
        }

        self.buf.push(b);

        let first_padding = constants::is_transport_padding(b)
            && self.buf.len() == self.boundary.delimiter.len() - 1;

        if !self.in_padding && first_padding {
            self.in_padding = true;
        }

        let padding = self.in_padding && constants::is_transport_padding(b);

        if !padding {
            self.boundary_pos += 1;
        }

        (self.in_padding && (padding || constants::is_line_end(b)))
            || self.matches(&self.boundary.delimiter, b)
            || self.matches(&self.boundary.close, b)
    }

    fn matches(&self, form: &[u8], b: u8) -> bool {
        form.get(self.boundary_pos.wrapping_sub(1))
            .map_or(false, |expected| *expected == b)
    }

    fn is_complete(&self) -> bool {
        let last = self.buf.last().copied();

        (self.boundary_pos == self.boundary.close.len() && last == Some(b'-'))
            || (self.boundary_pos == self.boundary.delimiter.len() && last == Some(b'\n'))
    }

    fn is_close_delimiter(&self) -> bool {
        self.buf == self.boundary.close
    }
}

/// Accumulates the raw header block and spots the terminating `\r\n\r\n`.
#[derive(Debug)]
pub(crate) struct HeadersRecorder {
    buf: Vec<u8>,
}

impl HeadersRecorder {
    pub(crate) fn new() -> Self {
        HeadersRecorder { buf: Vec::new() }
    }

    fn next(&mut self, b: u8) -> crate::Result<bool> {
        if self.is_complete() {
            return Ok(false);
        }

        if self.buf.len() == constants::MAX_HEADER_SIZE {
            return Err(crate::Error::HeadersTooLarge);
        }

        self.buf.push(b);

        Ok(true)
    }

    fn is_complete(&self) -> bool {
        self.buf.ends_with(constants::CRLF_CRLF.as_bytes())
    }

    fn commit(self, events: &mut EventQueue) {
        events.push_back(Event::PartHeaders(PartHeaders::parse(&self.buf)));
    }
}

/// Fills fixed-size chunks and hands each one off through the event queue.
/// Ownership of a handed-off chunk moves to the consumer side; a fresh chunk
/// is started in its place.
#[derive(Debug)]
pub(crate) struct BodyRecorder {
    chunk: BytesMut,
}

impl BodyRecorder {
    pub(crate) fn new() -> Self {
        BodyRecorder {
            chunk: BytesMut::with_capacity(constants::BODY_CHUNK_SIZE),
        }
    }

    fn next(&mut self, b: u8, events: &mut EventQueue) {
        if self.chunk.len() == constants::BODY_CHUNK_SIZE {
            self.flush(events);
        }

        self.chunk.extend_from_slice(&[b]);
    }

    fn flush(&mut self, events: &mut EventQueue) {
        if !self.chunk.is_empty() {
            let chunk = mem::replace(
                &mut self.chunk,
                BytesMut::with_capacity(constants::BODY_CHUNK_SIZE),
            );

            events.push_back(Event::BodyChunk(chunk.freeze()));
        }
    }

    fn commit(mut self, events: &mut EventQueue) {
        self.flush(events);
        events.push_back(Event::BodyEnd);
    }
}
