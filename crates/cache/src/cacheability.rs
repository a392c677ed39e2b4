//! JSON-RPC cacheability rules.

use std::io::Read;

use flate2::read::GzDecoder;
use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

/// The only part of a JSON-RPC response cacheability cares about: whether
/// `result` is present and non-null. The value itself can be any JSON and
/// is never typechecked.
#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Value,
}

/// Decide whether an upstream response may be cached.
///
/// A response is cacheable when the status is 200 and its (gzip-decoded,
/// if so encoded) body is a JSON-RPC envelope with a non-null `result`, or
/// a non-empty batch of such envelopes. Error responses, empty batches,
/// and anything that does not parse are never cached.
#[must_use]
pub fn is_cacheable(status: StatusCode, content_encoding: Option<&str>, body: &[u8]) -> bool {
    if status != StatusCode::OK {
        return false;
    }

    let inflated;
    let payload: &[u8] = match content_encoding {
        Some(encoding) if encoding.eq_ignore_ascii_case("gzip") => {
            let mut buffer = Vec::new();
            if GzDecoder::new(body).read_to_end(&mut buffer).is_err() {
                return false;
            }
            inflated = buffer;
            &inflated
        }
        _ => body,
    };

    has_result(payload)
}

fn has_result(payload: &[u8]) -> bool {
    match payload.iter().find(|byte| !byte.is_ascii_whitespace()) {
        Some(b'{') => serde_json::from_slice::<RpcEnvelope>(payload)
            .map(|envelope| !envelope.result.is_null())
            .unwrap_or(false),
        Some(b'[') => serde_json::from_slice::<Vec<RpcEnvelope>>(payload)
            .map(|batch| !batch.is_empty() && batch.iter().all(|e| !e.result.is_null()))
            .unwrap_or(false),
        _ => false,
    }
}
