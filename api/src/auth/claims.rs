use serde::{Deserialize, Serialize};

/// JWT payload carried by every authenticated request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    /// Expiry, seconds since the epoch.
    pub exp: usize,
    /// Admins bypass the ownership checks on session creation, close, and
    /// the records view.
    pub admin: bool,
}

/// The verified claims of the requesting user, inserted into request
/// extensions by the auth guard.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);
