//! An incremental, backpressure-aware parser for `multipart/form-data` streams.
//!
//! It accepts a [`Stream`](futures_util::stream::Stream) of [`Bytes`](bytes::Bytes) as
//! a source, chunked in any way, so that it can be plugged into any async Rust
//! environment e.g. any async server.
//!
//! Parts come out as soon as their headers are parsed and their payload is
//! streamed through them. A part whose reader falls behind holds the parser
//! back instead of growing its buffer without bound.
//!
//! To enable `log` output, use the `log` feature. Parse progress, part
//! lifecycles and backpressure stalls are reported at the `trace` and `debug`
//! levels.
//!
//! # Examples
//!
//! ```
//! use bytes::Bytes;
//! use futures_util::stream::Stream;
//! use multiparser::{Event, Multipart};
//! use futures_util::StreamExt;
//! use std::convert::Infallible;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Generate a byte stream and the boundary from somewhere e.g. server request body.
//!     let (stream, boundary) = get_byte_stream_from_somewhere().await;
//!
//!     // Create a `Multipart` instance from that byte stream and the boundary.
//!     let mut multipart = Multipart::new(stream, boundary);
//!
//!     // Iterate over the events, `Event::End` comes last.
//!     while let Some(event) = multipart.next().await {
//!         match event {
//!             Event::Progress { parsed, total } => println!("Parsed {} of {:?} bytes", parsed, total),
//!             Event::Part(part) => {
//!                 let name = part.name().map(|s| s.to_owned());
//!                 let text = part.text().await.unwrap();
//!                 println!("Part: name: {:?}, text: {}", name, text);
//!             }
//!             Event::Error(err) => println!("Error: {}", err),
//!             Event::End => println!("Done"),
//!         }
//!     }
//! }
//!
//! // Generate a byte stream and the boundary from somewhere e.g. server request body.
//! async fn get_byte_stream_from_somewhere() -> (impl Stream<Item = Result<Bytes, Infallible>>, &'static str) {
//!     let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
//!     let stream = futures_util::stream::iter(
//!         data.chars()
//!             .map(|ch| ch.to_string())
//!             .map(|part| Ok(Bytes::copy_from_slice(part.as_bytes()))),
//!     );
//!
//!     (stream, "X-BOUNDARY")
//! }
//! ```
//!
//! ## Prevent Denial of Service (DoS) Attacks
//!
//! This crate also provides some APIs to prevent potential DoS attacks with
//! fine grained control. It's recommended to add some constraints on the
//! stream and part sizes.
//!
//! ```
//! use multiparser::{Constraints, Multipart, SizeLimit};
//! # use bytes::Bytes;
//! # use std::convert::Infallible;
//! # use futures_util::stream::once;
//!
//! # async fn run() {
//! # let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
//! # let some_stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
//! let constraints = Constraints::new().size_limit(
//!     SizeLimit::new()
//!         // Set 15mb as size limit for the whole stream body.
//!         .whole_stream(15 * 1024 * 1024)
//!         // Set 10mb as size limit for all parts.
//!         .per_part(10 * 1024 * 1024)
//!         // Set 30kb as size limit for our text field only.
//!         .for_part("my_text_field", 30 * 1024),
//! );
//!
//! // Create a `Multipart` instance from a stream and the constraints.
//! let mut multipart = Multipart::with_constraints(some_stream, "X-BOUNDARY", constraints);
//!
//! while let Some(part) = multipart.next_part().await.unwrap() {
//!     let content = part.text().await.unwrap();
//!     assert_eq!(content, "abcd");
//! }
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(run());
//! ```
//!
//! Please refer [`Constraints`] for more info.
//!
//! ## Usage with [hyper.rs](https://hyper.rs/) server
//!
//! An [example](https://github.com/multiparser/multiparser/blob/master/demos/hyper_server.rs)
//! showing usage with [hyper.rs](https://hyper.rs/).

#[macro_use]
mod macros;

pub use bytes;
pub use constraints::Constraints;
pub use error::Error;
pub use multipart::{Event, Multipart};
pub use part::Part;
pub use size_limit::SizeLimit;

mod constants;
mod constraints;
mod content_disposition;
mod error;
mod multipart;
mod parser;
mod part;
mod relay;
mod size_limit;
mod state;

/// A Result type often returned from methods that can have `multiparser` errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Parses the `Content-Type` header to extract the boundary value.
///
/// Any `multipart/*` type is accepted. The boundary may be quoted.
///
/// # Examples
///
/// ```
/// # fn run(){
/// let content_type = "multipart/form-data; boundary=ABCDEFG";
///
/// assert_eq!(multiparser::parse_boundary(content_type), Ok("ABCDEFG".to_owned()));
/// # }
/// # run();
/// ```
pub fn parse_boundary<T: AsRef<str>>(content_type: T) -> Result<String> {
    let m = content_type
        .as_ref()
        .parse::<mime::Mime>()
        .map_err(Error::DecodeContentType)?;

    if m.type_() != mime::MULTIPART {
        return Err(Error::NoMultipart);
    }

    m.get_param(mime::BOUNDARY)
        .map(|name| name.as_str())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_owned())
        .ok_or(Error::NoBoundary)
}
