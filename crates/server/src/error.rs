//! Pipeline errors surfaced to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chainmgr_types::ChainmgrError;
use derive_more::{Display, Error};

/// Errors the request pipeline returns to the client.
///
/// Selection failures are the caller's problem (bad chain, nothing
/// eligible) and map to 500; an exhausted upstream maps to 502 with a
/// plain-text reason, the way a reverse proxy reports a dead backend.
#[derive(Debug, Display, Error)]
pub enum ServerError {
    /// Endpoint selection failed for the requested chain.
    #[display("{_0}")]
    Selection(ChainmgrError),

    /// All upstream attempts failed without producing a response.
    #[display("{_0}")]
    #[error(ignore)]
    UpstreamExhausted(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Selection(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamExhausted(_) => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_maps_to_500() {
        let error = ServerError::Selection(ChainmgrError::NoSuchChain {
            chain: "nope".to_string(),
        });
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_exhausted_maps_to_502() {
        let error =
            ServerError::UpstreamExhausted("connection error. please try again".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_display_carries_reason() {
        let error = ServerError::UpstreamExhausted("boom".to_string());
        assert_eq!(error.to_string(), "boom");
    }
}
