use crate::constraints::Constraints;
use crate::state::{MultipartState, Signal};
use crate::Part;
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt, TryStreamExt};
use http::header::{self, HeaderMap};
use spin::mutex::spin::SpinMutex as Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
#[cfg(feature = "tokio-io")]
use {tokio::io::AsyncRead, tokio_util::io::ReaderStream};

/// What a [`Multipart`] reports while it parses, in stream order.
#[derive(Debug)]
pub enum Event<'r> {
    /// A chunk was pulled from the underlying stream. `parsed` is the number
    /// of body bytes received so far, `total` the declared `Content-Length`,
    /// if any. Bytes after the closing boundary are pulled and counted too,
    /// so on a complete body the last `parsed` is the body length.
    Progress { parsed: u64, total: Option<u64> },
    /// The headers of a new part were parsed. Its payload follows through the
    /// [`Part`] stream.
    Part(Part<'r>),
    /// Parsing failed. Parts still receiving payload are aborted and no other
    /// part follows.
    Error(crate::Error),
    /// The last event: the body was read to its end (or an error occurred)
    /// and every part has ended.
    End,
}

/// Represents the implementation of `multipart/form-data` formatted data.
///
/// This will parse the source stream into [`Part`] instances, reported through
/// its [`Stream`] implementation as [`Event`]s, or through
/// [`next_part`](Multipart::next_part).
///
/// The source stream is consumed lazily, one chunk at a time, by whichever of
/// `Multipart` or its parts is polled. A part holding more unread bytes than
/// the configured [`high_water_mark`](crate::Constraints::high_water_mark)
/// holds the whole parser back until it is read or dropped.
///
/// # Examples
///
/// ```
/// use multiparser::Multipart;
/// use bytes::Bytes;
/// use std::convert::Infallible;
/// use futures_util::stream::once;
///
/// # async fn run() {
/// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
/// let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
/// let mut multipart = Multipart::new(stream, "X-BOUNDARY");
///
/// while let Some(part) = multipart.next_part().await.unwrap() {
///     println!("Part: {:?}", part.text().await)
/// }
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run());
/// ```
pub struct Multipart<'r> {
    state: Arc<Mutex<MultipartState<'r>>>,
    done: bool,
}

impl<'r> Multipart<'r> {
    /// Construct a new `Multipart` instance with the given [`Bytes`] stream and the boundary.
    ///
    /// The boundary must not be empty, otherwise the first event is
    /// [`Event::Error`] with [`Error::NoBoundary`](crate::Error::NoBoundary)
    /// and the stream is never polled.
    pub fn new<S, O, E, B>(stream: S, boundary: B) -> Self
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'r,
        B: Into<String>,
    {
        Multipart::with_constraints(stream, boundary, Constraints::default())
    }

    /// Construct a new `Multipart` instance with the given [`Bytes`] stream, the boundary and the
    /// [`Constraints`].
    ///
    /// The boundary must not be empty, see [`Multipart::new`].
    pub fn with_constraints<S, O, E, B>(stream: S, boundary: B, constraints: Constraints) -> Self
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'r,
        B: Into<String>,
    {
        Multipart::build(stream, &boundary.into(), None, constraints)
    }

    /// Construct a new `Multipart` instance from the request headers and body stream.
    ///
    /// The boundary is taken from the `Content-Type` header, and the optional
    /// `Content-Length` becomes the `total` of [`Event::Progress`]. Fails
    /// without touching the stream if the content type isn't `multipart` or
    /// carries no boundary.
    ///
    /// # Examples
    ///
    /// ```
    /// use multiparser::{Error, Multipart};
    /// use bytes::Bytes;
    /// use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
    /// use std::convert::Infallible;
    /// use futures_util::stream::empty;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    ///
    /// let stream = empty::<Result<Bytes, Infallible>>();
    /// assert_eq!(Multipart::from_headers(&headers, stream).err(), Some(Error::NoMultipart));
    /// ```
    pub fn from_headers<S, O, E>(headers: &HeaderMap, stream: S) -> crate::Result<Self>
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'r,
    {
        Multipart::from_headers_with_constraints(headers, stream, Constraints::default())
    }

    /// Construct a new `Multipart` instance from the request headers, body stream and the
    /// [`Constraints`].
    pub fn from_headers_with_constraints<S, O, E>(
        headers: &HeaderMap,
        stream: S,
        constraints: Constraints,
    ) -> crate::Result<Self>
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'r,
    {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .ok_or(crate::Error::NoMultipart)?;

        let boundary = crate::parse_boundary(content_type)?;

        let total = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.trim().parse::<u64>().ok());

        Ok(Multipart::build(stream, &boundary, total, constraints))
    }

    /// Construct a new `Multipart` instance with the given [`AsyncRead`] reader and the boundary.
    ///
    /// # Optional
    ///
    /// This requires the optional `tokio-io` feature to be enabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use multiparser::Multipart;
    ///
    /// # async fn run() {
    /// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
    /// let reader = data.as_bytes();
    /// let mut multipart = Multipart::with_reader(reader, "X-BOUNDARY");
    ///
    /// while let Some(mut part) = multipart.next_part().await.unwrap() {
    ///     while let Some(chunk) = part.chunk().await.unwrap() {
    ///         println!("Chunk: {:?}", chunk);
    ///     }
    /// }
    /// # }
    /// # tokio::runtime::Runtime::new().unwrap().block_on(run());
    /// ```
    #[cfg(feature = "tokio-io")]
    pub fn with_reader<R, B>(reader: R, boundary: B) -> Self
    where
        R: AsyncRead + Send + 'r,
        B: Into<String>,
    {
        let stream = ReaderStream::new(reader);
        Multipart::new(stream, boundary)
    }

    /// Construct a new `Multipart` instance with the given [`AsyncRead`] reader, the boundary
    /// and the [`Constraints`].
    ///
    /// # Optional
    ///
    /// This requires the optional `tokio-io` feature to be enabled.
    #[cfg(feature = "tokio-io")]
    pub fn with_reader_with_constraints<R, B>(reader: R, boundary: B, constraints: Constraints) -> Self
    where
        R: AsyncRead + Send + 'r,
        B: Into<String>,
    {
        let stream = ReaderStream::new(reader);
        Multipart::with_constraints(stream, boundary, constraints)
    }

    fn build<S, O, E>(stream: S, boundary: &str, total: Option<u64>, constraints: Constraints) -> Self
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'r,
    {
        let stream = stream
            .map_ok(|b| b.into())
            .map_err(|err| crate::Error::StreamReadFailed(err.into()));

        let state = MultipartState::new(Box::pin(stream), boundary, total, constraints);

        Multipart {
            state: Arc::new(Mutex::new(state)),
            done: false,
        }
    }

    /// Yields the next [`Event`], `None` after [`Event::End`].
    pub async fn next_event(&mut self) -> Option<Event<'r>> {
        self.next().await
    }

    /// Yields the next [`Part`] if available.
    ///
    /// Progress events are skipped, an [`Event::Error`] becomes `Err` and
    /// [`Event::End`] becomes `Ok(None)`.
    pub async fn next_part(&mut self) -> crate::Result<Option<Part<'r>>> {
        while let Some(event) = self.next().await {
            match event {
                Event::Progress { .. } => continue,
                Event::Part(part) => return Ok(Some(part)),
                Event::Error(err) => return Err(err),
                Event::End => return Ok(None),
            }
        }

        Ok(None)
    }
}

impl<'r> Stream for Multipart<'r> {
    type Item = Event<'r>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        let shared_state = Arc::clone(&self.state);
        let mut state = shared_state.lock();

        loop {
            if let Some(signal) = state.registry.pop_signal() {
                let event = match signal {
                    Signal::Progress { parsed, total } => Event::Progress { parsed, total },
                    Signal::Part { id, meta, shared } => Event::Part(Part::new(Arc::clone(&self.state), id, meta, shared)),
                    Signal::Error(err) => Event::Error(err),
                    Signal::End => {
                        self.done = true;
                        Event::End
                    }
                };

                return Poll::Ready(Some(event));
            }

            match state.poll_drive(cx) {
                Poll::Ready(true) => continue,
                Poll::Ready(false) | Poll::Pending => {
                    state.registry.park_signal_waiter(cx.waker());
                    return Poll::Pending;
                }
            }
        }
    }
}

impl Drop for Multipart<'_> {
    fn drop(&mut self) {
        self.state.lock().registry.detach();
    }
}
