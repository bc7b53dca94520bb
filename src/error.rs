use std::fmt::{self, Debug, Display, Formatter};

use derive_more::Display;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A set of errors that can occur while parsing a multipart stream and in
/// other operations.
#[derive(Display)]
#[non_exhaustive]
pub enum Error {
    /// The part's payload was cut off before its closing boundary, e.g. the
    /// multipart stream failed while the part was still receiving data.
    #[display(
        fmt = "part '{}' received with incomplete data",
        "part_name.as_deref().unwrap_or(\"<unknown>\")"
    )]
    IncompletePartData { part_name: Option<String> },

    /// The byte stream doesn't follow the multipart grammar.
    #[display(fmt = "failed to parse multipart stream at offset {} (state: {})", offset, state)]
    ParseFailed { state: &'static str, offset: u64 },

    /// Failed to decode the part's raw header name to
    /// [`HeaderName`](http::header::HeaderName) type.
    #[display(fmt = "failed to decode part's raw header name: {:?} {}", name, cause)]
    DecodeHeaderName { name: String, cause: BoxError },

    /// Failed to decode the part's raw header value to
    /// [`HeaderValue`](http::header::HeaderValue) type.
    #[display(fmt = "failed to decode part's raw header value: {}", cause)]
    DecodeHeaderValue { value: Vec<u8>, cause: BoxError },

    /// Multipart stream ended before the terminal boundary.
    #[display(fmt = "incomplete multipart stream")]
    IncompleteStream,

    /// The incoming part size exceeded the maximum limit.
    #[display(
        fmt = "part '{}' exceeded the maximum size limit: {} bytes",
        "part_name.as_deref().unwrap_or(\"<unknown>\")",
        limit
    )]
    PartSizeExceeded { limit: u64, part_name: Option<String> },

    /// The incoming stream size exceeded the maximum limit.
    #[display(fmt = "stream size exceeded the maximum limit: {} bytes", limit)]
    StreamSizeExceeded { limit: u64 },

    /// Stream read failed.
    #[display(fmt = "stream read failed: {}", _0)]
    StreamReadFailed(BoxError),

    /// The `Content-Type` header is missing or is not a `multipart` type.
    #[display(fmt = "Content-Type is not multipart")]
    NoMultipart,

    /// Failed to convert the `Content-Type` to [`mime::Mime`] type.
    #[display(fmt = "Failed to convert Content-Type to `mime::Mime` type: {}", _0)]
    DecodeContentType(mime::FromStrError),

    /// No boundary found in `Content-Type` header.
    #[display(fmt = "multipart boundary not found in Content-Type")]
    NoBoundary,

    /// Failed to decode the part data as `JSON` in
    /// [`part.json()`](crate::Part::json) method.
    #[cfg(feature = "json")]
    #[display(fmt = "failed to decode part data as JSON: {}", _0)]
    DecodeJson(serde_json::Error),
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DecodeHeaderName { cause, .. } | Error::DecodeHeaderValue { cause, .. } => Some(cause.as_ref()),
            Error::StreamReadFailed(err) => Some(err.as_ref()),
            Error::DecodeContentType(err) => Some(err),
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
