//! Users HTTP response body type.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Frame, SizeHint};

/// Response body for users HTTP responses.
///
/// Every response is a single buffered chunk (JSON) or nothing, so the body
/// yields at most one data frame.
#[derive(Debug, Default)]
pub struct UsersResponseBody {
    data: Option<Bytes>,
}

impl UsersResponseBody {
    /// Create a response body from raw bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        Self {
            data: (!data.is_empty()).then_some(data),
        }
    }

    /// Create an empty response body.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Borrow the buffered bytes, if any remain unsent.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    /// Number of bytes left to send.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Bytes::len)
    }

    /// Whether no bytes are left to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }
}

impl From<Vec<u8>> for UsersResponseBody {
    fn from(json: Vec<u8>) -> Self {
        Self::from_bytes(json)
    }
}

impl http_body::Body for UsersResponseBody {
    type Data = Bytes;
    type Error = std::convert::Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.get_mut().data.take().map(|d| Ok(Frame::data(d))))
    }

    fn is_end_stream(&self) -> bool {
        self.data.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.len() as u64)
    }
}
