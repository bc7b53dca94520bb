use crate::content_disposition::ContentDisposition;
use crate::relay::RelayRead;
use crate::state::MultipartState;
use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use futures_util::stream::{Stream, TryStreamExt};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;
use spin::mutex::spin::SpinMutex as Mutex;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// A single part (form field or file) of a multipart stream.
///
/// Its payload is exposed through the [`Stream`] implementation and the
/// reading helpers. Header bytes are never part of the payload.
///
/// # Backpressure
///
/// A part buffers up to the configured
/// [`high_water_mark`](crate::Constraints::high_water_mark) of unread bytes.
/// Past that, the parser stops pulling chunks from the underlying stream until
/// this part is read from, so read (or drop) every part you receive.
///
/// Dropping a part cancels it: unread bytes are discarded and the rest of its
/// payload is skipped.
pub struct Part<'r> {
    state: Arc<Mutex<MultipartState<'r>>>,
    id: usize,
    meta: PartMeta,
    shared: Arc<PartShared>,
    done: bool,
}

/// Header derived metadata of a part.
#[derive(Debug, Clone)]
pub(crate) struct PartMeta {
    pub(crate) name: Option<String>,
    pub(crate) file_name: Option<String>,
    pub(crate) mime_type: Option<String>,
    pub(crate) transfer_encoding: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) idx: usize,
}

impl PartMeta {
    pub(crate) fn new(idx: usize) -> Self {
        PartMeta {
            name: None,
            file_name: None,
            mime_type: None,
            transfer_encoding: None,
            headers: HeaderMap::new(),
            idx,
        }
    }

    pub(crate) fn apply_header(&mut self, name: HeaderName, value: HeaderValue, decoded: &str) {
        if name == header::CONTENT_DISPOSITION {
            let content_disposition = ContentDisposition::parse(decoded);
            if content_disposition.part_name.is_some() {
                self.name = content_disposition.part_name;
            }
            if content_disposition.file_name.is_some() {
                self.file_name = content_disposition.file_name;
            }
        } else if name == header::CONTENT_TYPE {
            self.mime_type = Some(decoded.to_owned());
        } else if name.as_str() == "content-transfer-encoding" {
            self.transfer_encoding = Some(decoded.to_owned());
        }

        self.headers.insert(name, value);
    }
}

/// Counters a part shares with the parser side without taking the lock.
#[derive(Debug, Default)]
pub(crate) struct PartShared {
    pub(crate) loaded: AtomicU64,
    pub(crate) aborted: AtomicBool,
}

impl<'r> Part<'r> {
    pub(crate) fn new(
        state: Arc<Mutex<MultipartState<'r>>>,
        id: usize,
        meta: PartMeta,
        shared: Arc<PartShared>,
    ) -> Self {
        Part {
            state,
            id,
            meta,
            shared,
            done: false,
        }
    }

    /// The part name found in the
    /// [`Content-Disposition`](https://developer.mozilla.org/en-US/docs/Web/HTTP/Headers/Content-Disposition)
    /// header.
    pub fn name(&self) -> Option<&str> {
        self.meta.name.as_deref()
    }

    /// The file name found in the
    /// [`Content-Disposition`](https://developer.mozilla.org/en-US/docs/Web/HTTP/Headers/Content-Disposition)
    /// header, without any client side directory.
    pub fn file_name(&self) -> Option<&str> {
        self.meta.file_name.as_deref()
    }

    /// The raw `Content-Type` header value of this part.
    pub fn mime_type(&self) -> Option<&str> {
        self.meta.mime_type.as_deref()
    }

    /// The `Content-Type` header parsed as [`mime::Mime`], if it is valid.
    pub fn content_type(&self) -> Option<mime::Mime> {
        self.meta.mime_type.as_deref().and_then(|val| val.parse::<mime::Mime>().ok())
    }

    /// The `Content-Transfer-Encoding` header value. The payload is never
    /// decoded accordingly.
    pub fn transfer_encoding(&self) -> Option<&str> {
        self.meta.transfer_encoding.as_deref()
    }

    /// All the part headers, with lowercase names.
    pub fn headers(&self) -> &HeaderMap {
        &self.meta.headers
    }

    /// The position of this part in the multipart body, starting at `0`.
    pub fn index(&self) -> usize {
        self.meta.idx
    }

    /// Payload bytes the parser has handed to this part so far, read or not.
    pub fn bytes_loaded(&self) -> u64 {
        self.shared.loaded.load(Ordering::SeqCst)
    }

    /// Registers a handler called with [`bytes_loaded`](Part::bytes_loaded)
    /// each time payload reaches this part.
    ///
    /// The handler runs while the multipart state is locked, it must not call
    /// into this part's reading methods or into [`Multipart`](crate::Multipart).
    pub fn on_progress<F>(&self, handler: F)
    where
        F: FnMut(u64) + Send + 'r,
    {
        self.state
            .lock()
            .registry
            .set_progress_handler(self.id, Box::new(handler));
    }

    /// Gets the next payload chunk, `None` once the part is complete.
    pub async fn chunk(&mut self) -> crate::Result<Option<Bytes>> {
        self.try_next().await
    }

    /// Gets the full payload as [`Bytes`].
    pub async fn bytes(mut self) -> crate::Result<Bytes> {
        let mut buf = BytesMut::new();

        while let Some(bytes) = self.chunk().await? {
            buf.extend_from_slice(&bytes);
        }

        Ok(buf.freeze())
    }

    /// Deserializes the payload as JSON.
    ///
    /// # Optional
    ///
    /// This requires the optional `json` feature to be enabled.
    #[cfg(feature = "json")]
    pub async fn json<T: DeserializeOwned>(self) -> crate::Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(crate::Error::DecodeJson)
    }

    /// Gets the full payload as text, decoded with the `charset` of the part
    /// content type or UTF-8.
    pub async fn text(self) -> crate::Result<String> {
        self.text_with_charset("utf-8").await
    }

    /// Gets the full payload as text, decoded with the `charset` of the part
    /// content type or `default_encoding`.
    pub async fn text_with_charset(self, default_encoding: &str) -> crate::Result<String> {
        let encoding_name = self
            .content_type()
            .and_then(|mime| mime.get_param(mime::CHARSET).map(|charset| charset.as_str().to_owned()))
            .unwrap_or_else(|| default_encoding.to_owned());

        let encoding = Encoding::for_label(encoding_name.as_bytes()).unwrap_or(UTF_8);

        let bytes = self.bytes().await?;

        let (text, _, _) = encoding.decode(&bytes);

        Ok(text.into_owned())
    }
}

impl Stream for Part<'_> {
    type Item = crate::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        let shared_state = Arc::clone(&self.state);
        let mut state = shared_state.lock();

        loop {
            match state.registry.read(self.id, cx.waker()) {
                RelayRead::Chunk(bytes) => return Poll::Ready(Some(Ok(bytes))),
                RelayRead::End => {
                    self.done = true;

                    if self.shared.aborted.load(Ordering::SeqCst) {
                        return Poll::Ready(Some(Err(crate::Error::IncompletePartData {
                            part_name: self.meta.name.clone(),
                        })));
                    }

                    return Poll::Ready(None);
                }
                RelayRead::Empty => match state.poll_drive(cx) {
                    Poll::Ready(true) => continue,
                    Poll::Ready(false) | Poll::Pending => return Poll::Pending,
                },
            }
        }
    }
}

impl Drop for Part<'_> {
    fn drop(&mut self) {
        self.state.lock().registry.release(self.id);
    }
}

impl fmt::Debug for Part<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("name", &self.meta.name)
            .field("file_name", &self.meta.file_name)
            .field("mime_type", &self.meta.mime_type)
            .field("index", &self.meta.idx)
            .field("bytes_loaded", &self.bytes_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_header() {
        let mut meta = PartMeta::new(3);

        let value = r#"form-data; name="avatar"; filename="C:\tmp\me.png""#;
        meta.apply_header(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(value).unwrap(),
            value,
        );
        meta.apply_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("image/png"),
            "image/png",
        );
        meta.apply_header(
            HeaderName::from_static("content-transfer-encoding"),
            HeaderValue::from_static("binary"),
            "binary",
        );

        assert_eq!(meta.name.as_deref(), Some("avatar"));
        assert_eq!(meta.file_name.as_deref(), Some("me.png"));
        assert_eq!(meta.mime_type.as_deref(), Some("image/png"));
        assert_eq!(meta.transfer_encoding.as_deref(), Some("binary"));
        assert_eq!(meta.headers.len(), 3);
        assert_eq!(meta.idx, 3);
    }

    #[test]
    fn test_apply_header_last_one_wins() {
        let mut meta = PartMeta::new(0);

        meta.apply_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"), "text/plain");
        meta.apply_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html"), "text/html");

        assert_eq!(meta.mime_type.as_deref(), Some("text/html"));
        assert_eq!(meta.headers.get(header::CONTENT_TYPE).unwrap(), "text/html");
    }
}
