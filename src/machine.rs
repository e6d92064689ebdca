use crate::constants;
use crate::recorder::{
    Boundary, BodyRecorder, DelimiterRecorder, EventQueue, HeadersRecorder, Recorder,
};
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

/// One phase of multipart structure. Exactly one region is active at any
/// instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Region {
    Preamble,
    Delimiter,
    Headers,
    Body,
    Close,
    Epilogue,
}

struct StateTransition {
    from: Region,
    to: Region,
    signal: fn(&Recorder, u8) -> bool,
}

const TRANSITIONS: [StateTransition; 5] = [
    StateTransition {
        from: Region::Preamble,
        to: Region::Delimiter,
        signal: |_, b| b == constants::CR,
    },
    StateTransition {
        from: Region::Delimiter,
        to: Region::Headers,
        signal: |r, _| r.is_complete(),
    },
    StateTransition {
        from: Region::Headers,
        to: Region::Body,
        signal: |r, _| r.is_complete(),
    },
    StateTransition {
        from: Region::Body,
        to: Region::Delimiter,
        signal: |_, b| b == constants::CR,
    },
    StateTransition {
        from: Region::Close,
        to: Region::Epilogue,
        signal: |r, _| r.is_complete(),
    },
];

/// Drives byte-by-byte region classification. Holds the active region and
/// recorder plus at most one retired pair, which is what a single rollback
/// step restores when a tentative boundary match falls through.
pub(crate) struct StateMachine {
    boundary: Arc<Boundary>,
    region: Region,
    recorder: Recorder,
    previous: Option<(Region, Recorder)>,
    replay: VecDeque<u8>,
}

impl StateMachine {
    pub(crate) fn new(boundary: &str) -> Self {
        StateMachine {
            boundary: Arc::new(Boundary::new(boundary)),
            region: Region::Preamble,
            recorder: Recorder::Discard,
            previous: None,
            replay: VecDeque::new(),
        }
    }

    /// Consumes the chunk fully before returning. Replay bytes left over from
    /// a rollback are drained ahead of the live chunk.
    pub(crate) fn feed(&mut self, chunk: &[u8], events: &mut EventQueue) -> crate::Result<()> {
        let mut pos = 0;

        loop {
            let (b, mid_replay) = match self.replay.pop_front() {
                Some(b) => (b, !self.replay.is_empty()),
                None => {
                    if pos == chunk.len() {
                        break;
                    }

                    pos += 1;

                    (chunk[pos - 1], false)
                }
            };

            // Only the last byte of a replay may open a new region; anything
            // earlier was already judged to be plain payload when the match
            // attempt failed, and a CR among those bytes must not re-enter
            // the delimiter region.
            if !mid_replay {
                self.transition(b, events);
            }

            if !self.recorder.next(b, events)? && !self.recorder.is_complete() {
                self.rollback();
            }
        }

        self.recorder.buffer_depleted(events);

        Ok(())
    }

    /// Final wrap-up of the active recorder when the upstream ends, even if
    /// the stream ended abruptly.
    pub(crate) fn complete(&mut self, events: &mut EventQueue) {
        let retiring = mem::replace(&mut self.recorder, Recorder::Discard);
        let region = self.region;

        self.wrap_up(region, retiring, events);
    }

    fn transition(&mut self, b: u8, events: &mut EventQueue) {
        if self.region == Region::Delimiter && self.recorder.is_close_delimiter() {
            log::trace!("region transition {:?} -> {:?}", Region::Delimiter, Region::Close);
            self.region = Region::Close;
        }

        if let Some(transition) = TRANSITIONS
            .iter()
            .find(|t| t.from == self.region && t.from != t.to && (t.signal)(&self.recorder, b))
        {
            self.enter(transition.to, events);
        }
    }

    fn enter(&mut self, to: Region, events: &mut EventQueue) {
        log::trace!("region transition {:?} -> {:?}", self.region, to);

        let recorder = self.recorder_for(to);
        let retiring = mem::replace(&mut self.recorder, recorder);
        let from = mem::replace(&mut self.region, to);

        self.wrap_up(from, retiring, events);
    }

    fn recorder_for(&self, region: Region) -> Recorder {
        match region {
            Region::Delimiter => {
                Recorder::Delimiter(DelimiterRecorder::new(Arc::clone(&self.boundary)))
            }
            Region::Headers => Recorder::Headers(HeadersRecorder::new()),
            Region::Body => Recorder::Body(BodyRecorder::new()),
            Region::Preamble | Region::Close | Region::Epilogue => Recorder::Discard,
        }
    }

    /// A complete retiring recorder commits, after any still pending previous
    /// one so region order is preserved. An incomplete one retires into the
    /// previous slot instead, keeping one rollback step available.
    fn wrap_up(&mut self, from: Region, retiring: Recorder, events: &mut EventQueue) {
        if retiring.is_complete() {
            if let Some((_, previous)) = self.previous.take() {
                previous.commit(events);
            }

            retiring.commit(events);
        } else {
            self.previous = Some((from, retiring));
        }
    }

    fn rollback(&mut self) {
        let (region, recorder) = self
            .previous
            .take()
            .expect("state machine cannot go back to a previous region");

        log::trace!("rollback {:?} -> {:?}", self.region, region);

        let rejected = mem::replace(&mut self.recorder, recorder);

        self.replay.extend(rejected.rollback());
        self.region = region;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::Event;

    fn run(boundary: &str, data: &[u8]) -> EventQueue {
        let mut machine = StateMachine::new(boundary);
        let mut events = EventQueue::new();

        machine.feed(data, &mut events).unwrap();
        machine.complete(&mut events);

        events
    }

    fn body_of(events: &mut EventQueue) -> Vec<u8> {
        let mut body = Vec::new();

        loop {
            match events.pop_front() {
                Some(Event::BodyChunk(c)) => body.extend_from_slice(&c),
                Some(Event::BodyEnd) => return body,
                other => panic!("expected body event, got {:?}", other),
            }
        }
    }

    fn headers_of(events: &mut EventQueue) -> crate::PartHeaders {
        match events.pop_front() {
            Some(Event::PartHeaders(h)) => h,
            other => panic!("expected headers event, got {:?}", other),
        }
    }

    #[test]
    fn test_single_part() {
        let mut events = run("abc", b"\r\n--abc\r\nA: 1\r\n\r\nhello\r\n--abc--");

        let headers = headers_of(&mut events);
        assert_eq!(headers.get("A"), Some(&["1".to_owned()][..]));
        assert_eq!(body_of(&mut events), b"hello");
        assert!(events.is_empty());
    }

    #[test]
    fn test_two_parts_in_order() {
        let mut events = run(
            "abc",
            b"\r\n--abc\r\nN: 1\r\n\r\nfirst\r\n--abc\r\nN: 2\r\n\r\nsecond\r\n--abc--",
        );

        assert_eq!(headers_of(&mut events).get("N"), Some(&["1".to_owned()][..]));
        assert_eq!(body_of(&mut events), b"first");
        assert_eq!(headers_of(&mut events).get("N"), Some(&["2".to_owned()][..]));
        assert_eq!(body_of(&mut events), b"second");
        assert!(events.is_empty());
    }

    #[test]
    fn test_preamble_and_epilogue_discarded() {
        let mut events = run(
            "abc",
            b"junk before\r\nmore junk\r\n--abc\r\nA: 1\r\n\r\nhello\r\n--abc--trailing junk",
        );

        headers_of(&mut events);
        assert_eq!(body_of(&mut events), b"hello");
        assert!(events.is_empty());
    }

    #[test]
    fn test_rollback_keeps_near_boundary_bytes_in_body() {
        let mut events = run(
            "abc",
            b"\r\n--abc\r\nA: 1\r\n\r\nx\r\n--abX y\r\nz\r\n--abc--",
        );

        headers_of(&mut events);
        assert_eq!(body_of(&mut events), b"x\r\n--abX y\r\nz");
        assert!(events.is_empty());
    }

    #[test]
    fn test_one_byte_chunks() {
        let data: &[u8] = b"\r\n--abc\r\nA: 1\r\n\r\nhello\r\n--abc--";
        let chunks = data.iter().map(std::slice::from_ref).collect::<Vec<_>>();
        let mut machine = StateMachine::new("abc");
        let mut events = EventQueue::new();

        for chunk in chunks {
            machine.feed(chunk, &mut events).unwrap();
        }

        machine.complete(&mut events);

        headers_of(&mut events);
        assert_eq!(body_of(&mut events), b"hello");
        assert!(events.is_empty());
    }

    #[test]
    fn test_padded_delimiters() {
        let mut events = run(
            "abc",
            b"\r\n--abc \t\r\nA: 1\r\n\r\nhello\r\n--abc-- \t",
        );

        headers_of(&mut events);
        assert_eq!(body_of(&mut events), b"hello");
        assert!(events.is_empty());
    }

    #[test]
    fn test_padding_overflow_rolls_back_into_body() {
        // A boundary prefix followed by a padding run long enough to overrun
        // the delimiter scratch buffer must come back as body data in full.
        let body = b"x\r\n--abc            y";
        let mut data = b"\r\n--abc\r\nA: 1\r\n\r\n".to_vec();

        data.extend_from_slice(body);
        data.extend_from_slice(b"\r\n--abc--");

        let mut events = run("abc", &data);

        headers_of(&mut events);
        assert_eq!(body_of(&mut events), body);
        assert!(events.is_empty());
    }

    #[test]
    fn test_truncated_body_flushes_without_end_marker() {
        let mut events = run("abc", b"\r\n--abc\r\nA: 1\r\n\r\nhel");

        headers_of(&mut events);

        // The partial chunk is flushed when the input runs dry, but the body
        // region never completed, so no end marker follows.
        match events.pop_front() {
            Some(Event::BodyChunk(c)) => assert_eq!(&c[..], b"hel"),
            other => panic!("expected partial chunk, got {:?}", other),
        }

        assert!(events.is_empty());
    }

    #[test]
    fn test_headers_too_large() {
        let mut machine = StateMachine::new("abc");
        let mut events = EventQueue::new();

        machine.feed(b"\r\n--abc\r\n", &mut events).unwrap();

        let huge = vec![b'a'; crate::constants::MAX_HEADER_SIZE + 1];

        assert_eq!(
            machine.feed(&huge, &mut events),
            Err(crate::Error::HeadersTooLarge)
        );
    }
}
