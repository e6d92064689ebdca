use crate::error::BoxError;
use crate::part::BodyPart;
use crate::recorder::Event;
use crate::state::DecoderState;
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt, TryStreamExt};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
#[cfg(feature = "tokio-io")]
use tokio::io::AsyncRead;
#[cfg(feature = "tokio-io")]
use tokio_util::io::ReaderStream;

/// Takes a byte stream that starts with the MIME multipart preamble and
/// converts it into a stream of body parts. It also consumes the epilogue.
///
/// Parts are yielded via the [`Stream`] implementation or [`next_part`], in
/// the order their delimiters appear in the input. To keep the underlying
/// scan consistent, no more than one [`BodyPart`] is out at a time: the next
/// part is only yielded once the previous one has been drained or dropped.
///
/// The decoder requests one upstream chunk at a time, and only while a
/// consumer is asking for a part or for body bytes, so memory stays bounded
/// regardless of the total stream size.
///
/// [`next_part`]: MultipartDecoder::next_part
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use futures_util::stream::once;
/// use multipart_codec::MultipartDecoder;
/// use std::convert::Infallible;
///
/// # async fn run() {
/// let data = "\r\n--X-BOUNDARY\r\nHeader1: Value\r\n\r\nabcd\r\n--X-BOUNDARY--";
/// let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
/// let mut decoder = MultipartDecoder::new(stream, "X-BOUNDARY");
///
/// while let Some(part) = decoder.next_part().await.unwrap() {
///     println!("{:?}", part.text().await);
/// }
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run());
/// ```
pub struct MultipartDecoder {
    state: Arc<Mutex<DecoderState>>,
}

impl MultipartDecoder {
    /// Constructs a decoder over the given byte stream and boundary.
    pub fn new<S, O, E, B>(stream: S, boundary: B) -> MultipartDecoder
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
        B: AsRef<str>,
    {
        let stream = stream
            .map_ok(|b| b.into())
            .map_err(|err| crate::Error::StreamReadFailed(err.into()))
            .boxed();

        MultipartDecoder {
            state: Arc::new(Mutex::new(DecoderState::new(stream, boundary.as_ref()))),
        }
    }

    /// Constructs a decoder over the given [`AsyncRead`] reader and boundary.
    ///
    /// # Optional
    ///
    /// This requires the optional `tokio-io` feature to be enabled.
    #[cfg(feature = "tokio-io")]
    pub fn with_reader<R, B>(reader: R, boundary: B) -> MultipartDecoder
    where
        R: AsyncRead + Send + 'static,
        B: AsRef<str>,
    {
        MultipartDecoder::new(ReaderStream::new(reader), boundary)
    }

    /// Yields the next [`BodyPart`] if available.
    pub async fn next_part(&mut self) -> crate::Result<Option<BodyPart>> {
        self.try_next().await
    }

    /// Yields the next [`BodyPart`] with its positioning index as a tuple
    /// `(usize, BodyPart)`.
    pub async fn next_part_with_idx(&mut self) -> crate::Result<Option<(usize, BodyPart)>> {
        self.try_next()
            .await
            .map(|part| part.map(|part| (part.index(), part)))
    }
}

impl Stream for MultipartDecoder {
    type Item = crate::Result<BodyPart>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let mut state = match this.state.lock() {
            Ok(lock) => lock,
            Err(_) => return Poll::Ready(Some(Err(crate::Error::LockFailure))),
        };

        if state.dead {
            return Poll::Ready(None);
        }

        if !state.prev_part_consumed {
            state.next_part_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        loop {
            match state.events.pop_front() {
                Some(Event::PartHeaders(headers)) => {
                    state.prev_part_consumed = false;

                    let idx = state.next_part_idx;

                    state.next_part_idx += 1;
                    drop(state);

                    let part = BodyPart::from_decoder(headers, Arc::clone(&this.state), idx);

                    return Poll::Ready(Some(Ok(part)));
                }
                // Remnants of a part that was dropped before its body was
                // drained; discard them so the following parts stay
                // parseable.
                Some(Event::BodyChunk(_)) | Some(Event::BodyEnd) => {}
                None => {
                    if state.eof {
                        state.dead = true;
                        return Poll::Ready(None);
                    }

                    match state.pump(cx) {
                        Poll::Ready(Ok(())) => {}
                        Poll::Ready(Err(err)) => {
                            state.dead = true;
                            return Poll::Ready(Some(Err(err)));
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
            }
        }
    }
}
