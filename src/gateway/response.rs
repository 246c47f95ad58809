//! gateway::response
//!
//! Transport-neutral response sink for the gateway.
//!
//! The gateway decides the status and headers, sends them once through
//! [`PushResponse::send_head`], then streams the body. The HTTP host maps this
//! onto a streamed axum response; tests use [`BufferedResponse`].

use std::io::{self, Write};

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA};
use axum::http::{HeaderMap, HeaderValue, StatusCode};

/// Content type of a receive-pack result stream.
pub const RECEIVE_PACK_RESULT: &str = "application/x-git-receive-pack-result";

/// Content type of a receive-pack ref advertisement.
pub const RECEIVE_PACK_ADVERTISEMENT: &str = "application/x-git-receive-pack-advertisement";

/// Status line and headers of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// A head with caching suppressed.
    pub fn new(status: StatusCode) -> Self {
        let mut headers = HeaderMap::new();
        suppress_caching(&mut headers);
        Self { status, headers }
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Mark a response as uncacheable by clients and proxies.
pub fn suppress_caching(headers: &mut HeaderMap) {
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, max-age=0, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(
        EXPIRES,
        HeaderValue::from_static("Fri, 01 Jan 1990 00:00:00 GMT"),
    );
}

/// Where the gateway writes its response.
pub trait PushResponse: Send {
    /// Send the status and headers. Called at most once, before any body.
    fn send_head(&mut self, head: ResponseHead) -> io::Result<()>;

    /// The body stream.
    fn body(&mut self) -> &mut (dyn Write + Send);
}

/// In-memory [`PushResponse`].
#[derive(Debug, Default)]
pub struct BufferedResponse {
    pub head: Option<ResponseHead>,
    pub body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of the sent head, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|h| h.status)
    }
}

impl PushResponse for BufferedResponse {
    fn send_head(&mut self, head: ResponseHead) -> io::Result<()> {
        if self.head.is_some() {
            return Err(io::Error::other("response head already sent"));
        }
        self.head = Some(head);
        Ok(())
    }

    fn body(&mut self) -> &mut (dyn Write + Send) {
        &mut self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heads_suppress_caching() {
        let head = ResponseHead::new(StatusCode::CONFLICT);
        assert_eq!(
            head.headers.get(CACHE_CONTROL).unwrap(),
            "no-cache, no-store, max-age=0, must-revalidate"
        );
        assert_eq!(head.headers.get(PRAGMA).unwrap(), "no-cache");
        assert!(head.headers.contains_key(EXPIRES));
        assert_eq!(head.content_type(), None);
    }

    #[test]
    fn buffered_head_sent_once() {
        let mut response = BufferedResponse::new();
        response
            .send_head(ResponseHead::new(StatusCode::OK).with_content_type(RECEIVE_PACK_RESULT))
            .unwrap();
        assert!(response.send_head(ResponseHead::new(StatusCode::OK)).is_err());
        assert_eq!(response.status(), Some(StatusCode::OK));
        assert_eq!(
            response.head.unwrap().content_type(),
            Some(RECEIVE_PACK_RESULT)
        );
    }
}
