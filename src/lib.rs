//! A streaming codec for the MIME multipart wire format.
//!
//! [`MultipartDecoder`] converts an unbounded, chunked byte stream into a
//! sequence of [`BodyPart`]s (a header map plus a nested byte stream), and
//! [`MultipartEncoder`] does the reverse. Bytes may arrive in arbitrarily
//! sized chunks, backpressure is honored in both directions and memory use
//! stays bounded regardless of the total stream size.
//!
//! # Examples
//!
//! ```
//! use bytes::Bytes;
//! use futures_util::stream::once;
//! use multipart_codec::MultipartDecoder;
//! use std::convert::Infallible;
//!
//! # async fn run() {
//! let data = "\r\n--X-BOUNDARY\r\nHeader2: Value1, Value2\r\n\r\nabcd\r\n--X-BOUNDARY--";
//! let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
//! let mut decoder = MultipartDecoder::new(stream, "X-BOUNDARY");
//!
//! while let Some(part) = decoder.next_part().await.unwrap() {
//!     let headers = part.headers().clone();
//!     println!("{:?}: {:?}", headers.get("Header2"), part.bytes().await);
//! }
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(run());
//! ```

pub use decoder::MultipartDecoder;
pub use encoder::MultipartEncoder;
pub use error::Error;
pub use headers::PartHeaders;
pub use part::BodyPart;

mod constants;
mod decoder;
mod encoder;
mod error;
mod headers;
mod machine;
mod part;
mod recorder;
mod state;

/// A Result type often returned from methods that can have `multipart-codec`
/// errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Parses a `Content-Type` value to extract the multipart boundary.
pub fn parse_boundary<T: AsRef<str>>(content_type: T) -> crate::Result<String> {
    let m = content_type
        .as_ref()
        .parse::<mime::Mime>()
        .map_err(Error::DecodeContentType)?;

    if m.type_() != mime::MULTIPART {
        return Err(Error::NoMultipart);
    }

    m.get_param(mime::BOUNDARY)
        .map(|name| name.as_str().to_owned())
        .ok_or(Error::NoBoundary)
}
