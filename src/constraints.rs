use crate::constants;
use crate::size_limit::SizeLimit;
use encoding_rs::{Encoding, UTF_8};

/// Represents some rules to be applied on the stream and part's content size
/// and on the way parts are buffered and decoded.
///
/// # Examples
///
/// ```
/// use multiparser::{Constraints, Multipart, SizeLimit};
/// # use bytes::Bytes;
/// # use std::convert::Infallible;
/// # use futures_util::stream::once;
///
/// # async fn run() {
/// # let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
/// # let some_stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
/// let constraints = Constraints::new()
///     .size_limit(
///         SizeLimit::new()
///             // Set 15mb as size limit for the whole stream body.
///             .whole_stream(15 * 1024 * 1024)
///             // Set 10mb as size limit for all parts.
///             .per_part(10 * 1024 * 1024)
///             // Set 30kb as size limit for our text field only.
///             .for_part("my_text_field", 30 * 1024),
///     )
///     // Let a part buffer up to 64kb before the parser waits for its reader.
///     .high_water_mark(64 * 1024)
///     // Decode part headers as latin-1.
///     .header_encoding(encoding_rs::WINDOWS_1252);
///
/// let mut multipart = Multipart::with_constraints(some_stream, "X-BOUNDARY", constraints);
///
/// while let Some(part) = multipart.next_part().await.unwrap() {
///     println!("Text: {:?}", part.text().await.unwrap());
/// }
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run());
/// ```
#[derive(Debug, Clone)]
pub struct Constraints {
    pub(crate) size_limit: SizeLimit,
    pub(crate) high_water_mark: usize,
    pub(crate) header_encoding: &'static Encoding,
}

impl Constraints {
    /// Creates a set of rules with default behaviour.
    pub fn new() -> Constraints {
        Constraints::default()
    }

    /// Applies rules on the stream and part's content size.
    pub fn size_limit(self, size_limit: SizeLimit) -> Constraints {
        Constraints { size_limit, ..self }
    }

    /// Sets how many payload bytes a part may hold unread before the parser
    /// stops pulling chunks from the underlying stream. Defaults to 16 KiB.
    ///
    /// With `0`, every chunk waits until the part reader has taken all of it.
    pub fn high_water_mark(self, high_water_mark: usize) -> Constraints {
        Constraints { high_water_mark, ..self }
    }

    /// Sets the encoding used to decode raw part header bytes. Defaults to
    /// UTF-8.
    pub fn header_encoding(self, header_encoding: &'static Encoding) -> Constraints {
        Constraints {
            header_encoding,
            ..self
        }
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints {
            size_limit: SizeLimit::default(),
            high_water_mark: constants::DEFAULT_HIGH_WATER_MARK,
            header_encoding: UTF_8,
        }
    }
}
