//! Request fingerprinting for cache keys.

use http::{HeaderMap, Method, header::HOST};

/// Compute the cache key for a request bound to `chain`.
///
/// The key is `"{chain}:{hex(md5(dump))}"` where the dump covers method,
/// path, headers, and body. The `Host` header is cleared first so clients
/// addressing the proxy by different names share entries. MD5 is used for
/// keying, not security.
#[must_use]
pub fn cache_key(
    chain: &str,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> String {
    let digest = md5::compute(canonical_dump(method, path, headers, body));
    format!("{chain}:{digest:x}")
}

/// Deterministic textual dump of a request: request line, then headers
/// sorted by name (the `Host` value blanked), a blank line, and the body.
fn canonical_dump(method: &Method, path: &str, headers: &HeaderMap, body: &[u8]) -> Vec<u8> {
    let mut header_lines: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            if name == HOST {
                "host: ".to_string()
            } else {
                format!("{}: {}", name.as_str(), value.to_str().unwrap_or_default())
            }
        })
        .collect();
    header_lines.sort();

    let mut dump = format!("{method} {path} HTTP/1.1\r\n").into_bytes();
    for line in header_lines {
        dump.extend_from_slice(line.as_bytes());
        dump.extend_from_slice(b"\r\n");
    }
    dump.extend_from_slice(b"\r\n");
    dump.extend_from_slice(body);
    dump
}
