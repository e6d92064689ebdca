use crate::constants;
use crate::part::BodyPart;
use bytes::Bytes;
use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt};

/// Converts a stream of MIME multipart body parts into a byte stream.
///
/// Each part is framed with a delimiter line and its rendered header block,
/// and the stream ends with the closing delimiter. Pure forward composition:
/// the output stream pulls part bytes only as its own consumer demands them.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use futures_util::stream;
/// use multipart_codec::{BodyPart, MultipartEncoder, PartHeaders};
/// use std::convert::Infallible;
///
/// let mut headers = PartHeaders::new();
/// headers.append("Header1", vec!["Value"]);
///
/// let body = stream::once(async { Result::<Bytes, Infallible>::Ok(Bytes::from("abcd")) });
/// let part = BodyPart::new(headers, body);
/// let encoded = MultipartEncoder::new("X-BOUNDARY").encode(stream::iter(vec![part]));
/// # drop(encoded);
/// ```
pub struct MultipartEncoder {
    boundary: String,
    transport_padding: bool,
}

impl MultipartEncoder {
    pub fn new<B: Into<String>>(boundary: B) -> Self {
        MultipartEncoder {
            boundary: boundary.into(),
            transport_padding: false,
        }
    }

    /// Adds a space and a tab between each boundary and what terminates it.
    pub fn transport_padding(mut self, enabled: bool) -> Self {
        self.transport_padding = enabled;
        self
    }

    /// Serializes the parts into the multipart wire format.
    pub fn encode<S>(self, parts: S) -> impl Stream<Item = crate::Result<Bytes>> + Send
    where
        S: Stream<Item = BodyPart> + Send + 'static,
    {
        let padding = if self.transport_padding {
            constants::TRANSPORT_PADDING
        } else {
            ""
        };
        let delimiter = Bytes::from(format!(
            "{}{}{}{}{}",
            constants::CRLF,
            constants::BOUNDARY_EXT,
            self.boundary,
            padding,
            constants::CRLF
        ));
        let close = Bytes::from(format!(
            "{}{}{}{}{}",
            constants::CRLF,
            constants::BOUNDARY_EXT,
            self.boundary,
            constants::BOUNDARY_EXT,
            padding
        ));

        parts
            .map(move |part| {
                let framing = vec![Ok(delimiter.clone()), Ok(part.headers().render())];

                stream::iter(framing).chain(part)
            })
            .flatten()
            .chain(stream::once(future::ready(Ok(close))))
    }
}
