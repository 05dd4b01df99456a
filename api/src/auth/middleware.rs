use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use log::info;

use crate::auth::claims::AuthUser;

/// Logs method, path, and user ID (if authenticated) for each incoming
/// HTTP request. Skips CORS preflight `OPTIONS` requests.
pub async fn log_request(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let (mut parts, body) = req.into_parts();

    if parts.method == Method::OPTIONS {
        let req = Request::from_parts(parts, body);
        return Ok(next.run(req).await);
    }

    let user_id = AuthUser::from_request_parts(&mut parts, &())
        .await
        .ok()
        .map(|AuthUser(c)| c.sub)
        .unwrap_or(0);

    info!(
        "{} {} user={}",
        parts.method,
        parts.uri.path(),
        user_id
    );

    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}
