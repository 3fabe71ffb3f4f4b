use crate::dispatch::Principal;
use anyhow::Result;
use jwt_simple::prelude::*;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const TOKEN_SUBJECT: &str = "vue-page";
const TOKEN_EXPIRE_HOURS: u64 = 2;
const TOKEN_TIME_TOLERANCE_MINS: u64 = 15;

#[derive(Debug, Serialize, Deserialize)]
struct CallerClaims {
    user: String,
    #[serde(default)]
    roles: Vec<String>,
}

/// Issues and verifies the bearer tokens identifying callers
///
/// A token carries the caller's name and roles. This struct is cheap to
/// clone (uses Arc internally) and can be shared across workers as
/// application data.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<TokenManagerInner>,
}

struct TokenManagerInner {
    key: HS256Key,
}

impl TokenManager {
    /// Create a new TokenManager
    ///
    /// # Arguments
    /// * `secret` - Secret key for HMAC-SHA256 signing
    pub fn new(secret: &str) -> Self {
        Self {
            inner: Arc::new(TokenManagerInner {
                key: HS256Key::from_bytes(secret.as_bytes()),
            }),
        }
    }

    /// Create a signed token for `user` holding `roles`
    pub fn create_token(&self, user: &str, roles: &[String]) -> Result<String> {
        let claims = Claims::with_custom_claims(
            CallerClaims {
                user: user.to_string(),
                roles: roles.to_vec(),
            },
            Duration::from_hours(TOKEN_EXPIRE_HOURS),
        )
        .with_subject(TOKEN_SUBJECT);

        self.inner
            .key
            .authenticate(claims)
            .map_err(|e| anyhow::anyhow!("failed to create token: {e}"))
    }

    /// Verify a token and return the caller it identifies
    ///
    /// Validates:
    /// - Signature
    /// - Expiration (with configurable time tolerance)
    /// - Max validity (token age)
    /// - Required subject claim
    ///
    /// Returns `None` for any invalid token.
    pub fn verify_token(&self, token: &str) -> Option<Principal> {
        let options = VerificationOptions {
            accept_future: true,
            time_tolerance: Some(Duration::from_mins(TOKEN_TIME_TOLERANCE_MINS)),
            max_validity: Some(Duration::from_hours(TOKEN_EXPIRE_HOURS)),
            required_subject: Some(TOKEN_SUBJECT.to_string()),
            ..Default::default()
        };

        match self
            .inner
            .key
            .verify_token::<CallerClaims>(token, Some(options))
        {
            Ok(claims) => Some(Principal {
                name: claims.custom.user,
                roles: claims.custom.roles,
            }),
            Err(e) => {
                debug!("rejected caller token: {e}");
                None
            }
        }
    }
}
