use crate::error::BoxError;
use crate::headers::PartHeaders;
use crate::recorder::Event;
use crate::state::DecoderState;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{Stream, StreamExt, TryStreamExt};
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// A MIME multipart body part: a header map plus a nested byte stream.
///
/// The body bytes are consumed through the [`Stream`] implementation or the
/// reader methods, and arrive in production order. The decoder will not yield
/// the next part until this one is drained or dropped.
///
/// Dropping a part before its body is drained cancels the body but not the
/// outer scan: the decoder still consumes and discards the rest of the body's
/// bytes, so the parts that follow stay parseable.
///
/// A part can also be built from caller supplied bytes to feed a
/// [`MultipartEncoder`](crate::MultipartEncoder).
pub struct BodyPart {
    headers: PartHeaders,
    body: BodySource,
    idx: usize,
    done: bool,
}

enum BodySource {
    /// Fed by the decoder the part was emitted from.
    Decoder(Arc<Mutex<DecoderState>>),
    /// Supplied by the caller.
    Stream(crate::state::ByteStream),
}

impl BodyPart {
    /// Wraps caller supplied headers and body bytes.
    pub fn new<S, O, E>(headers: PartHeaders, body: S) -> Self
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
    {
        let body = body
            .map_ok(|b| b.into())
            .map_err(|err| crate::Error::StreamReadFailed(err.into()))
            .boxed();

        BodyPart {
            headers,
            body: BodySource::Stream(body),
            idx: 0,
            done: false,
        }
    }

    pub(crate) fn from_decoder(
        headers: PartHeaders,
        state: Arc<Mutex<DecoderState>>,
        idx: usize,
    ) -> Self {
        BodyPart {
            headers,
            body: BodySource::Decoder(state),
            idx,
            done: false,
        }
    }

    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    /// The zero-based position of this part in the decoded stream.
    pub fn index(&self) -> usize {
        self.idx
    }

    /// Yields the next body chunk.
    pub async fn chunk(&mut self) -> crate::Result<Option<Bytes>> {
        self.try_next().await
    }

    /// Reads the whole body.
    pub async fn bytes(mut self) -> crate::Result<Bytes> {
        let mut buf = BytesMut::new();

        while let Some(bytes) = self.chunk().await? {
            buf.extend_from_slice(&bytes);
        }

        Ok(buf.freeze())
    }

    /// Reads the whole body as text, replacing invalid UTF-8 sequences.
    pub async fn text(self) -> crate::Result<String> {
        self.bytes()
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads the whole body and decodes it as JSON.
    ///
    /// # Optional
    ///
    /// This requires the optional `json` feature to be enabled.
    #[cfg(feature = "json")]
    pub async fn json<T: DeserializeOwned>(self) -> crate::Result<T> {
        self.bytes()
            .await
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(crate::Error::DecodeJson))
    }
}

impl fmt::Debug for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyPart")
            .field("headers", &self.headers)
            .field("idx", &self.idx)
            .finish()
    }
}

impl Stream for BodyPart {
    type Item = crate::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.done {
            return Poll::Ready(None);
        }

        let state = match &mut this.body {
            BodySource::Stream(stream) => {
                return match stream.poll_next_unpin(cx) {
                    Poll::Ready(None) => {
                        this.done = true;
                        Poll::Ready(None)
                    }
                    other => other,
                };
            }
            BodySource::Decoder(state) => state,
        };

        let mut state = match state.lock() {
            Ok(lock) => lock,
            Err(_) => {
                this.done = true;
                return Poll::Ready(Some(Err(crate::Error::LockFailure)));
            }
        };

        if state.dead {
            this.done = true;
            return Poll::Ready(None);
        }

        loop {
            match state.events.pop_front() {
                Some(Event::BodyChunk(bytes)) => return Poll::Ready(Some(Ok(bytes))),
                Some(Event::BodyEnd) => {
                    this.done = true;
                    state.part_finished();

                    return Poll::Ready(None);
                }
                Some(headers @ Event::PartHeaders(_)) => {
                    // A headers event can only follow this body's end marker,
                    // which a previous poll already consumed. Leave it for
                    // the decoder.
                    state.events.push_front(headers);
                    this.done = true;
                    state.part_finished();

                    return Poll::Ready(None);
                }
                None => {
                    if state.eof {
                        // Truncated input: the body ends without a signal.
                        this.done = true;
                        state.part_finished();

                        return Poll::Ready(None);
                    }

                    match state.pump(cx) {
                        Poll::Ready(Ok(())) => {}
                        Poll::Ready(Err(err)) => {
                            state.dead = true;
                            this.done = true;
                            state.part_finished();

                            return Poll::Ready(Some(Err(err)));
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
            }
        }
    }
}

impl Drop for BodyPart {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        if let BodySource::Decoder(state) = &self.body {
            match state.lock() {
                Ok(mut state) => state.part_finished(),
                Err(_) => {
                    log::error!("failed to lock the decoder state while cancelling a body part")
                }
            }
        }
    }
}
