//! Wire-format encoding of cached HTTP responses.
//!
//! Stored values are the base64 of a plain HTTP/1.1 response dump: status
//! line, headers, blank line, body. The body is stored exactly as the
//! upstream sent it, `Content-Encoding` included, so a hit replays the
//! original bytes.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use chainmgr_traits::CacheError;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

/// A decoded cached HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers as received from the upstream.
    pub headers: HeaderMap,
    /// Response body, possibly still compressed.
    pub body: Bytes,
}

impl CachedResponse {
    /// Encode into the stored base64 wire format.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut wire = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or("")
        )
        .into_bytes();
        for (name, value) in &self.headers {
            wire.extend_from_slice(name.as_str().as_bytes());
            wire.extend_from_slice(b": ");
            wire.extend_from_slice(value.as_bytes());
            wire.extend_from_slice(b"\r\n");
        }
        wire.extend_from_slice(b"\r\n");
        wire.extend_from_slice(&self.body);
        STANDARD.encode(wire)
    }

    /// Decode a stored value.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] for invalid base64 or a malformed dump;
    /// callers treat that as a miss.
    pub fn decode(encoded: &[u8]) -> Result<Self, CacheError> {
        let wire = STANDARD
            .decode(encoded)
            .map_err(|e| CacheError(format!("invalid base64 cache entry: {e}")))?;

        let head_end = wire
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .ok_or_else(|| CacheError("cache entry missing header terminator".to_string()))?;
        let head = std::str::from_utf8(&wire[..head_end])
            .map_err(|e| CacheError(format!("cache entry head not utf-8: {e}")))?;
        let body = Bytes::copy_from_slice(&wire[head_end + 4..]);

        let mut lines = head.split("\r\n");
        let status_line = lines
            .next()
            .ok_or_else(|| CacheError("cache entry missing status line".to_string()))?;
        let status_code = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| CacheError(format!("malformed status line: {status_line}")))?;
        let status = StatusCode::from_u16(status_code)
            .map_err(|e| CacheError(format!("invalid status code {status_code}: {e}")))?;

        let mut headers = HeaderMap::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| CacheError(format!("malformed header line: {line}")))?;
            let name: HeaderName = name
                .trim()
                .parse()
                .map_err(|e| CacheError(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value.trim_start())
                .map_err(|e| CacheError(format!("invalid header value for {name}: {e}")))?;
            headers.append(name, value);
        }

        Ok(Self { status, headers, body })
    }
}
