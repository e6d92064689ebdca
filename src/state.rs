use crate::machine::StateMachine;
use crate::recorder::EventQueue;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use std::task::{Context, Poll, Waker};

pub(crate) type ByteStream = BoxStream<'static, crate::Result<Bytes>>;

/// State shared between a decoder and the body part it has out. All
/// mutations happen under the one mutex guarding this value, which is what
/// serializes upstream chunks, part demand, body demand and cancellation.
pub(crate) struct DecoderState {
    stream: ByteStream,
    machine: StateMachine,
    pub(crate) events: EventQueue,
    pub(crate) eof: bool,
    /// Set when an error was surfaced or the part stream completed; the
    /// decoder yields nothing afterwards.
    pub(crate) dead: bool,
    /// The previously emitted part finished or was dropped, so the decoder
    /// may move on to the next one.
    pub(crate) prev_part_consumed: bool,
    pub(crate) next_part_waker: Option<Waker>,
    pub(crate) next_part_idx: usize,
}

impl DecoderState {
    pub(crate) fn new(stream: ByteStream, boundary: &str) -> Self {
        DecoderState {
            stream,
            machine: StateMachine::new(boundary),
            events: EventQueue::new(),
            eof: false,
            dead: false,
            prev_part_consumed: true,
            next_part_waker: None,
            next_part_idx: 0,
        }
    }

    /// Requests exactly one upstream chunk and runs it through the state
    /// machine. `Ready(Ok(()))` means progress was made: either a chunk was
    /// drained into the event queue or the end of input was reached.
    pub(crate) fn pump(&mut self, cx: &mut Context<'_>) -> Poll<crate::Result<()>> {
        match self.stream.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                Poll::Ready(self.machine.feed(&chunk, &mut self.events))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Err(err)),
            Poll::Ready(None) => {
                self.eof = true;
                self.machine.complete(&mut self.events);

                Poll::Ready(Ok(()))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// The current part's body finished draining, naturally or by
    /// cancellation; either way the outer scan may resume.
    pub(crate) fn part_finished(&mut self) {
        self.prev_part_consumed = true;

        if let Some(waker) = self.next_part_waker.take() {
            waker.wake();
        }
    }
}
