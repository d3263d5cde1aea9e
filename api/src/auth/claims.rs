use serde::{Deserialize, Serialize};

/// JWT claims supplied by the identity collaborator. The core trusts `sub`
/// as the authenticated subject identity without re-validating credentials.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
    pub admin: bool,
}

#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);
