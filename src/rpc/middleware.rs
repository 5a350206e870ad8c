use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::AppState;
use crate::auth::AuthDecision;

/// Name of the authenticated user, available to handlers after [`basic_auth`].
#[derive(Debug, Clone)]
pub struct RpcUser(pub String);

const REALM: &str = "Basic realm=\"jsonrpc\"";

/// Reject any request without valid Basic credentials.
///
/// Every failure produces the same bare `401`.
pub async fn basic_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match state.authenticator.authenticate(header) {
        AuthDecision::Accepted { username } => {
            request.extensions_mut().insert(RpcUser(username));
            next.run(request).await
        }
        AuthDecision::Rejected => {
            warn!("Incorrect RPC password attempt");
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, HeaderValue::from_static(REALM))],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_has_challenge_and_no_body() {
        let response = unauthorized();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE),
            Some(&HeaderValue::from_static(REALM))
        );
    }
}
