use std::fmt::{self, Display, Formatter};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A set of errors that can occur while decoding a multipart stream and in
/// other operations.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A part's header block exceeded the maximum size.
    HeadersTooLarge,

    /// Failed to lock the shared decoder state for any changes.
    LockFailure,

    /// The `Content-Type` is not a multipart media type.
    NoMultipart,

    /// Failed to convert the `Content-Type` to a [`mime::Mime`] type.
    DecodeContentType(mime::FromStrError),

    /// No boundary found in the `Content-Type`.
    NoBoundary,

    /// The upstream byte stream produced an error.
    StreamReadFailed(BoxError),

    /// Failed to decode the part body as JSON in
    /// [`body_part.json()`](crate::BodyPart::json).
    #[cfg(feature = "json")]
    DecodeJson(serde_json::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::HeadersTooLarge => {
                write!(f, "part headers exceeded the maximum size")
            }
            Error::LockFailure => write!(f, "failed to lock the decoder state"),
            Error::NoMultipart => write!(f, "Content-Type is not a multipart media type"),
            Error::DecodeContentType(err) => {
                write!(f, "failed to decode Content-Type as a mime type: {}", err)
            }
            Error::NoBoundary => write!(f, "multipart boundary not found in Content-Type"),
            Error::StreamReadFailed(err) => write!(f, "stream read failed: {}", err),
            #[cfg(feature = "json")]
            Error::DecodeJson(err) => write!(f, "failed to decode part body as JSON: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DecodeContentType(err) => Some(err),
            Error::StreamReadFailed(err) => Some(err.as_ref()),
            #[cfg(feature = "json")]
            Error::DecodeJson(err) => Some(err),
            _ => None,
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq(&other.to_string())
    }
}

impl Eq for Error {}
