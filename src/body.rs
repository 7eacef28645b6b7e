//! The response body.
//!
//! Handlers produce three body shapes: nothing at all (most WebDAV
//! methods), a document serialised up front (multi-status XML, lock
//! discovery, directory listings), and a chunked file stream (GET).
//! [`Body`] covers all three and implements both `futures_util::Stream`
//! and `http_body::Body`, so any transport built on the `http`
//! ecosystem can consume it.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{BoxStream, Stream};
use http::header::HeaderMap;
use http_body::{Body as HttpBody, SizeHint};

pub struct Body {
    inner: Inner,
}

enum Inner {
    Empty,
    Buffered(Option<Bytes>),
    Streaming(BoxStream<'static, io::Result<Bytes>>),
}

impl Body {
    /// An empty body.
    pub fn empty() -> Body {
        Body { inner: Inner::Empty }
    }

    /// A body produced chunk by chunk, e.g. a file being sent.
    pub fn stream(chunks: impl Stream<Item = io::Result<Bytes>> + Send + 'static) -> Body {
        Body {
            inner: Inner::Streaming(Box::pin(chunks)),
        }
    }

    fn buffered(bytes: Bytes) -> Body {
        Body {
            inner: Inner::Buffered(Some(bytes)),
        }
    }
}

impl Stream for Body {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        match &mut self.inner {
            Inner::Empty => Poll::Ready(None),
            Inner::Buffered(bytes) => Poll::Ready(bytes.take().map(Ok)),
            Inner::Streaming(chunks) => chunks.as_mut().poll_next(cx),
        }
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_data(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<io::Result<Bytes>>> {
        self.poll_next(cx)
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context,
    ) -> Poll<Result<Option<HeaderMap>, io::Error>> {
        Poll::Ready(Ok(None))
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Inner::Empty => true,
            Inner::Buffered(bytes) => bytes.is_none(),
            Inner::Streaming(_) => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Inner::Empty | Inner::Buffered(None) => SizeHint::with_exact(0),
            Inner::Buffered(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Inner::Streaming(_) => SizeHint::default(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Body {
        Body::buffered(bytes)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Body {
        Body::buffered(Bytes::from(text))
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Body {
        Body::buffered(Bytes::copy_from_slice(text.as_bytes()))
    }
}
